//! A [Stump] is the lightest-weight form of the accumulator: just the
//! roots and the leaf count. It can verify any inclusion proof and apply
//! additions and proven deletions, but cannot produce proofs itself.

use std::io::Read;
use std::io::Write;

use super::node_hash::NodeHash;
use super::proof::read_hash;
use super::proof::read_u64;
use super::proof::read_varint;
use super::proof::write_varint;
use super::proof::Proof;
use super::util;
use super::UtreexoError;

/// The roots of the forest, tallest tree first, plus how many leaves were
/// ever added.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "with-serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Stump {
    pub roots: Vec<NodeHash>,
    pub leaves: u64,
}

impl Stump {
    /// Creates an empty Stump.
    /// # Example
    /// ```
    /// use utreexo::accumulator::stump::Stump;
    /// let stump = Stump::new();
    /// assert_eq!(stump.leaves, 0);
    /// assert!(stump.roots.is_empty());
    /// ```
    pub fn new() -> Self {
        Stump {
            roots: Vec::new(),
            leaves: 0,
        }
    }

    /// Checks a proof against this stump's roots.
    pub fn verify(&self, proof: &Proof, del_hashes: &[NodeHash]) -> Result<bool, UtreexoError> {
        proof.verify(del_hashes, self)
    }

    /// The external API to change the accumulator state. Since order
    /// matters, deletions are applied before additions; the deletions must
    /// come with a proof for them. Either list may be empty.
    /// # Example
    /// ```
    /// use utreexo::accumulator::node_hash::NodeHash;
    /// use utreexo::accumulator::proof::Proof;
    /// use utreexo::accumulator::stump::Stump;
    ///
    /// let mut stump = Stump::new();
    /// let utxos = vec![NodeHash::new([0; 32])];
    /// stump.modify(&utxos, &[], &Proof::default()).unwrap();
    /// assert_eq!(stump.leaves, 1);
    /// ```
    pub fn modify(
        &mut self,
        utxos: &[NodeHash],
        del_hashes: &[NodeHash],
        proof: &Proof,
    ) -> Result<(), UtreexoError> {
        let (_, old_roots) = proof.calculate_hashes(del_hashes, self.leaves)?;
        if !Proof::match_roots(&self.roots, &old_roots) {
            return Err(UtreexoError::RootMismatch);
        }

        // the roots as they stand once every deleted target is emptied out
        let empty = vec![NodeHash::empty(); del_hashes.len()];
        let (_, new_roots) = proof.calculate_hashes(&empty, self.leaves)?;

        let mut roots = self.roots.clone();
        for (pos, hash) in new_roots {
            let row = util::detect_row(pos, util::tree_rows(self.leaves));
            // roots are stored tallest first
            let idx = ((self.leaves >> row) >> 1).count_ones() as usize;
            *roots.get_mut(idx).ok_or(UtreexoError::CorruptedState)? = hash;
        }
        self.roots = roots;

        self.add(utxos);
        Ok(())
    }

    /// Rewinds to an older state, for handling reorgs. Takes ownership of
    /// `old_state`.
    /// # Example
    /// ```
    /// use utreexo::accumulator::node_hash::NodeHash;
    /// use utreexo::accumulator::proof::Proof;
    /// use utreexo::accumulator::stump::Stump;
    ///
    /// let mut stump = Stump::new();
    /// let old_state = stump.clone();
    /// let utxos = vec![NodeHash::new([7; 32])];
    /// stump.modify(&utxos, &[], &Proof::default()).unwrap();
    ///
    /// // a reorg happened
    /// stump.undo(old_state);
    /// assert_eq!(stump.leaves, 0);
    /// ```
    pub fn undo(&mut self, old_state: Stump) {
        self.leaves = old_state.leaves;
        self.roots = old_state.roots;
    }

    /// Serializes this stump as the leaf count followed by the roots.
    /// Returns the number of bytes written.
    pub fn serialize<W: Write>(&self, writer: &mut W) -> Result<usize, UtreexoError> {
        writer.write_all(&self.leaves.to_le_bytes())?;
        let mut len = 8 + write_varint(writer, self.roots.len() as u64)?;
        for root in &self.roots {
            writer.write_all(&**root)?;
            len += 32;
        }
        Ok(len)
    }

    /// Reads back a stump written by [Stump::serialize].
    pub fn deserialize<R: Read>(reader: &mut R) -> Result<Stump, UtreexoError> {
        let leaves = read_u64(reader)?;
        let n_roots = read_varint(reader)?;
        let mut roots = Vec::with_capacity(n_roots.min(64) as usize);
        for _ in 0..n_roots {
            roots.push(read_hash(reader)?);
        }
        Ok(Stump { leaves, roots })
    }

    fn add(&mut self, utxos: &[NodeHash]) {
        for utxo in utxos {
            self.add_single(*utxo);
        }
    }

    /// Iterates over the roots, merging the one we are adding with every
    /// tree already occupying a row, until a free row is found. Which rows
    /// are occupied can be read off the binary representation of the leaf
    /// count.
    fn add_single(&mut self, utxo: NodeHash) {
        let mut to_add = utxo;
        let mut row = 0;
        while (self.leaves >> row) & 1 == 1 {
            if let Some(root) = self.roots.pop() {
                // an empty root is a ghost left by deletions; the incoming
                // tree takes its place one row up without hashing
                if !root.is_empty() {
                    to_add = NodeHash::parent_hash(&root, &to_add);
                }
            }
            row += 1;
        }
        self.roots.push(to_add);
        self.leaves += 1;
    }
}
