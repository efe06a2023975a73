//! [NodeHash] is the fixed 32-byte digest this accumulator is built over.
//! The all-zero value is a sentinel meaning "absent" and marks deleted
//! leaves and empty roots; it is never produced by hashing real children.

use std::convert::TryFrom;
use std::fmt::{Debug, Display};
use std::ops::Deref;
use std::str::FromStr;

use bitcoin_hashes::sha512_256;
use bitcoin_hashes::Hash;
use bitcoin_hashes::HashEngine;

use super::UtreexoError;

/// A 32-byte hash of a forest node.
#[derive(Clone, Copy, PartialEq, PartialOrd, Eq, Ord, Hash, Default)]
#[cfg_attr(feature = "with-serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NodeHash([u8; 32]);

/// The first 12 bytes of a [NodeHash], used as the key of hash to position
/// maps. Collisions would need 2^48 leaves on average, far beyond any
/// realistic accumulator.
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd, Eq, Ord, Hash)]
#[cfg_attr(feature = "with-serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MiniHash([u8; 12]);

impl Deref for NodeHash {
    type Target = [u8; 32];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Deref for MiniHash {
    type Target = [u8; 12];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<[u8; 12]> for MiniHash {
    fn from(inner: [u8; 12]) -> Self {
        MiniHash(inner)
    }
}

impl Display for NodeHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut s = String::new();
        for byte in self.0.iter() {
            s.push_str(&format!("{:02x}", byte));
        }
        write!(f, "{}", s)
    }
}

impl Debug for NodeHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(self, f)
    }
}

impl From<[u8; 32]> for NodeHash {
    fn from(hash: [u8; 32]) -> Self {
        NodeHash(hash)
    }
}

impl From<&[u8; 32]> for NodeHash {
    fn from(hash: &[u8; 32]) -> Self {
        NodeHash(*hash)
    }
}

impl From<&[u8]> for NodeHash {
    fn from(hash: &[u8]) -> Self {
        let mut inner = [0; 32];
        inner.copy_from_slice(hash);
        NodeHash(inner)
    }
}

impl From<sha512_256::Hash> for NodeHash {
    fn from(hash: sha512_256::Hash) -> Self {
        NodeHash(hash.to_byte_array())
    }
}

impl TryFrom<&str> for NodeHash {
    type Error = UtreexoError;

    fn try_from(hash: &str) -> Result<Self, Self::Error> {
        if hash.len() != 64 {
            return Err(UtreexoError::MalformedInput);
        }
        let mut inner = [0; 32];
        for (i, byte) in inner.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&hash[i * 2..i * 2 + 2], 16)
                .map_err(|_| UtreexoError::MalformedInput)?;
        }
        Ok(NodeHash(inner))
    }
}

impl FromStr for NodeHash {
    type Err = UtreexoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NodeHash::try_from(s)
    }
}

impl NodeHash {
    /// Creates a new NodeHash from a 32 byte array.
    /// # Example
    /// ```
    /// use utreexo::accumulator::node_hash::NodeHash;
    /// let hash = NodeHash::new([0x41; 32]);
    /// assert_eq!(
    ///     hash.to_string().as_str(),
    ///     "4141414141414141414141414141414141414141414141414141414141414141"
    /// );
    /// ```
    pub fn new(inner: [u8; 32]) -> Self {
        NodeHash(inner)
    }

    /// The all-zero sentinel standing for a deleted leaf or an empty root.
    /// # Example
    /// ```
    /// use utreexo::accumulator::node_hash::NodeHash;
    /// assert!(NodeHash::empty().is_empty());
    /// ```
    pub const fn empty() -> Self {
        NodeHash([0; 32])
    }

    /// Tells whether this hash is the empty sentinel.
    pub fn is_empty(&self) -> bool {
        self.0.iter().all(|&b| b == 0)
    }

    /// Returns the merkle parent of the two passed in nodes.
    /// # Example
    /// ```
    /// use std::str::FromStr;
    /// use utreexo::accumulator::node_hash::NodeHash;
    /// let left = NodeHash::new([0; 32]);
    /// let right = NodeHash::new([1; 32]);
    /// let parent = NodeHash::parent_hash(&left, &right);
    /// let expected =
    ///     NodeHash::from_str("34e33ca0c40b7bd33d28932ca9e35170def7309a3bf91ecda5e1ceb067548a12")
    ///         .unwrap();
    /// assert_eq!(parent, expected);
    /// ```
    pub fn parent_hash(left: &NodeHash, right: &NodeHash) -> NodeHash {
        let mut engine = sha512_256::Hash::engine();
        engine.input(&**left);
        engine.input(&**right);
        sha512_256::Hash::from_engine(engine).into()
    }

    /// The truncated form of this hash used as a map key.
    pub fn mini(&self) -> MiniHash {
        let mut inner = [0; 12];
        inner.copy_from_slice(&self.0[..12]);
        MiniHash(inner)
    }
}
