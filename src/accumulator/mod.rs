//! The accumulator is a forest of perfect merkle trees committing to an
//! unbounded, mutable set of 32-byte leaves. [stump::Stump] keeps only the
//! roots and the leaf count and can verify proofs; [map_pollard::MapPollard]
//! additionally caches a chosen subset of leaves with just enough
//! intermediate nodes to re-prove them as the set changes.

pub mod map_pollard;
pub mod node_hash;
pub mod proof;
pub mod stump;
pub mod util;

use thiserror::Error;

/// Everything that can go wrong while proving, verifying or updating the
/// accumulator.
#[derive(Error, Debug)]
pub enum UtreexoError {
    /// The proof's hash list is too short or too long for its targets.
    #[error("proof does not have the expected number of hashes")]
    MalformedProof,

    /// A caller-supplied value is unusable, like a duplicated target or a
    /// string that is not a hash.
    #[error("malformed input")]
    MalformedInput,

    /// The roots computed from a proof disagree with the stored roots.
    #[error("calculated roots do not match the stored roots")]
    RootMismatch,

    /// A proof was requested for a leaf that is not cached.
    #[error("leaf is not cached in the accumulator")]
    MissingCachedLeaf,

    /// A prune was requested for a leaf that is not cached.
    #[error("cannot forget a leaf that is not remembered")]
    NotCached,

    /// An internal invariant does not hold. This is a bug, not a user
    /// error, and the accumulator should be discarded.
    #[error("accumulator state is corrupted")]
    CorruptedState,

    /// Reading or writing a serialized accumulator failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
