//! A Rust implementation of the utreexo accumulator: a dynamic set
//! commitment built as a forest of perfect merkle trees. The accumulator
//! holds O(log n) root hashes for n elements, yet supports adding and
//! deleting elements and proving membership with logarithmic-size proofs.
//!
//! Three views of the same forest are provided, all under
//! [accumulator]:
//!
//! - [accumulator::stump::Stump]: roots and leaf count only. Enough to
//!   verify proofs and apply proven updates.
//! - [accumulator::map_pollard::MapPollard]: a stump plus a cache of
//!   chosen leaves and the intermediate hashes needed to re-prove them as
//!   blocks of additions and deletions go by.
//! - [accumulator::proof::Proof]: the inclusion proofs themselves, which
//!   can also be merged, shrunk and carried through deletions without any
//!   forest at hand.
//!
//! ```
//! use utreexo::accumulator::map_pollard::{Leaf, MapPollard};
//! use utreexo::accumulator::node_hash::NodeHash;
//! use utreexo::accumulator::proof::Proof;
//!
//! let mut pollard = MapPollard::new();
//! let leaves: Vec<Leaf> = (0u8..4)
//!     .map(|i| Leaf { hash: NodeHash::new([i; 32]), remember: i == 1 })
//!     .collect();
//! pollard.modify(&leaves, &[], &Proof::default()).unwrap();
//!
//! // the remembered leaf can be proven and spent later
//! let proof = pollard.prove(&[leaves[1].hash]).unwrap();
//! pollard.verify(&[leaves[1].hash], &proof, false).unwrap();
//! pollard.modify(&[], &[leaves[1].hash], &proof).unwrap();
//! ```

pub mod accumulator;
