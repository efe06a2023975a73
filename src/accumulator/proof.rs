//! A [Proof] ties a set of leaves to the accumulator roots. It carries the
//! positions being proven (targets) and the sibling hashes a verifier needs
//! to hash its way up to the roots. Proofs can also be operated on without
//! any forest at hand: merged, shrunk, and carried through deletions.

use std::collections::BTreeMap;
use std::io::Read;
use std::io::Write;

use super::node_hash::NodeHash;
use super::stump::Stump;
use super::util;
use super::UtreexoError;

/// A proof of inclusion for one or more targets.
///
/// `targets` stay in the order the caller asked for them, so they pair up
/// positionally with the caller's hash list. `hashes` are sorted ascending
/// by the position they belong to, which is the order
/// [util::proof_positions] enumerates.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "with-serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Proof {
    /// The positions being proven.
    pub targets: Vec<u64>,
    /// The sibling hashes needed to recompute the roots, sorted by the
    /// position each one sits at.
    pub hashes: Vec<NodeHash>,
}

/// Joins two children into their parent. An empty child stands for a
/// deleted subtree, so the surviving child is promoted unchanged instead
/// of being hashed.
pub(super) fn parent_or_promote(left: &NodeHash, right: &NodeHash) -> NodeHash {
    if left.is_empty() {
        *right
    } else if right.is_empty() {
        *left
    } else {
        NodeHash::parent_hash(left, right)
    }
}

impl Proof {
    /// Creates a proof from the positions to prove and the sibling hashes
    /// for them, as enumerated by [util::proof_positions].
    pub fn new(targets: Vec<u64>, hashes: Vec<NodeHash>) -> Self {
        Proof { targets, hashes }
    }

    /// How many positions this proof proves.
    pub fn n_targets(&self) -> usize {
        self.targets.len()
    }

    /// Checks this proof against a [Stump], returning whether the roots it
    /// hashes up to are the stump's roots.
    /// # Example
    /// ```
    /// use utreexo::accumulator::node_hash::NodeHash;
    /// use utreexo::accumulator::proof::Proof;
    /// use utreexo::accumulator::stump::Stump;
    ///
    /// let mut stump = Stump::new();
    /// let leaves: Vec<NodeHash> = (0u8..4).map(|i| NodeHash::new([i; 32])).collect();
    /// stump.modify(&leaves, &[], &Proof::default()).unwrap();
    ///
    /// // prove the second leaf: its sibling, then the pair to the right
    /// let proof = Proof::new(
    ///     vec![1],
    ///     vec![leaves[0], NodeHash::parent_hash(&leaves[2], &leaves[3])],
    /// );
    /// assert!(proof.verify(&[leaves[1]], &stump).unwrap());
    /// ```
    pub fn verify(&self, del_hashes: &[NodeHash], stump: &Stump) -> Result<bool, UtreexoError> {
        let (_, roots) = self.calculate_hashes(del_hashes, stump.leaves)?;
        Ok(Proof::match_roots(&stump.roots, &roots))
    }

    /// Matches computed root candidates against a stored root set. Stored
    /// roots are ordered tallest tree first while candidates surface
    /// shortest tree first, so the stored list is scanned in reverse.
    pub(super) fn match_roots(stored: &[NodeHash], candidates: &[(u64, NodeHash)]) -> bool {
        let mut matched = 0;
        for i in 0..stored.len() {
            let stored_root = stored[stored.len() - 1 - i];
            if matched < candidates.len() && candidates[matched].1 == stored_root {
                matched += 1;
            }
        }
        matched == candidates.len()
    }

    /// Hashes up from the targets to the roots of the trees they live in.
    ///
    /// Returns every `(position, hash)` this computes, targets included and
    /// sorted by position, along with the reached root candidates in the
    /// order they surface (shortest tree first). Deleted targets are passed
    /// as empty hashes and propagate by promoting their siblings, so the
    /// same walk yields post-deletion roots.
    pub fn calculate_hashes(
        &self,
        del_hashes: &[NodeHash],
        num_leaves: u64,
    ) -> Result<(Vec<(u64, NodeHash)>, Vec<(u64, NodeHash)>), UtreexoError> {
        if self.targets.len() != del_hashes.len() {
            return Err(UtreexoError::MalformedProof);
        }
        if self.targets.is_empty() {
            if !self.hashes.is_empty() {
                return Err(UtreexoError::MalformedProof);
            }
            return Ok((Vec::new(), Vec::new()));
        }

        let forest_rows = util::tree_rows(num_leaves);
        let mut positions: Vec<(u64, NodeHash)> = self
            .targets
            .iter()
            .copied()
            .zip(del_hashes.iter().copied())
            .collect();
        positions.sort_unstable_by_key(|(pos, _)| *pos);
        if positions.windows(2).any(|pair| pair[0].0 == pair[1].0) {
            return Err(UtreexoError::MalformedProof);
        }

        let mut computed = Vec::with_capacity(positions.len() * 2);
        let mut roots = Vec::new();
        let mut proof_hashes = self.hashes.iter();

        let mut i = 0;
        while i < positions.len() {
            let (pos, hash) = positions[i];
            computed.push((pos, hash));

            if util::is_root_position(pos, num_leaves, forest_rows) {
                roots.push((pos, hash));
                i += 1;
                continue;
            }

            let parent_hash;
            if i + 1 < positions.len() && positions[i + 1].0 == util::sibling(pos) {
                computed.push(positions[i + 1]);
                parent_hash = parent_or_promote(&hash, &positions[i + 1].1);
                i += 2;
            } else {
                let proof_hash = proof_hashes.next().ok_or(UtreexoError::MalformedProof)?;
                parent_hash = if util::is_left_niece(pos) {
                    parent_or_promote(&hash, proof_hash)
                } else {
                    parent_or_promote(proof_hash, &hash)
                };
                i += 1;
            }

            let parent_pos = util::parent(pos, forest_rows);
            match positions.binary_search_by_key(&parent_pos, |(pos, _)| *pos) {
                // a target may not be the ancestor of another target
                Ok(_) => return Err(UtreexoError::MalformedProof),
                Err(idx) => positions.insert(idx, (parent_pos, parent_hash)),
            }
        }

        if proof_hashes.next().is_some() {
            return Err(UtreexoError::MalformedProof);
        }
        Ok((computed, roots))
    }

    /// Pairs each proof hash with the position it vouches for. Fails if the
    /// hash count does not match what the targets require.
    pub(super) fn hash_pairs(
        &self,
        num_leaves: u64,
    ) -> Result<Vec<(u64, NodeHash)>, UtreexoError> {
        let forest_rows = util::tree_rows(num_leaves);
        let mut sorted = self.targets.clone();
        sorted.sort_unstable();
        sorted.dedup();
        if sorted.len() != self.targets.len() {
            return Err(UtreexoError::MalformedProof);
        }

        let (needed, _) = util::proof_positions(&sorted, num_leaves, forest_rows);
        if needed.len() != self.hashes.len() {
            return Err(UtreexoError::MalformedProof);
        }
        Ok(needed.into_iter().zip(self.hashes.iter().copied()).collect())
    }

    /// Turns this proof into the proof of the deleted targets' siblings,
    /// i.e. the proof that still holds once every target is replaced by an
    /// empty hash. Returns the new target hashes along with the new proof.
    ///
    /// Deleted roots stay behind as empty targets. When a target's sibling
    /// hash is carried by the proof it gets promoted into the parent slot;
    /// otherwise the entries tracked below the sibling collapse up one row.
    pub fn proof_after_deletion(
        &self,
        num_leaves: u64,
    ) -> Result<(Vec<NodeHash>, Proof), UtreexoError> {
        let forest_rows = util::tree_rows(num_leaves);
        let mut proof_pairs = self.hash_pairs(num_leaves)?;

        let mut sorted = self.targets.clone();
        sorted.sort_unstable();
        let dels = util::detwin(&sorted, forest_rows);

        let mut new_targets: Vec<(u64, NodeHash)> = Vec::new();
        for del in dels {
            if util::is_root_position(del, num_leaves, forest_rows) {
                new_targets.push((del, NodeHash::empty()));
                continue;
            }

            let sib = util::sibling(del);
            if let Some(idx) = proof_pairs.iter().position(|(pos, _)| *pos == sib) {
                let (_, sib_hash) = proof_pairs.remove(idx);
                new_targets.push((util::parent(del, forest_rows), sib_hash));
                continue;
            }

            for (pos, _) in new_targets.iter_mut().chain(proof_pairs.iter_mut()) {
                if *pos == sib || util::is_ancestor(sib, *pos, forest_rows) {
                    *pos = util::calc_next_position(*pos, del, forest_rows)?;
                }
            }
        }

        new_targets.sort_unstable_by_key(|(pos, _)| *pos);
        new_targets.dedup();
        proof_pairs.sort_unstable_by_key(|(pos, _)| *pos);

        let (positions, hashes): (Vec<u64>, Vec<NodeHash>) = new_targets.into_iter().unzip();
        let proof = Proof {
            targets: positions,
            hashes: proof_pairs.into_iter().map(|(_, hash)| hash).collect(),
        };
        Ok((hashes, proof))
    }

    /// Unions this proof with another over the same accumulator, yielding a
    /// proof for both target sets at once. Hashes whose positions become
    /// computable from the combined targets are dropped.
    pub fn merge(
        &self,
        other: &Proof,
        del_hashes: &[NodeHash],
        other_del_hashes: &[NodeHash],
        num_leaves: u64,
    ) -> Result<(Vec<NodeHash>, Proof), UtreexoError> {
        if self.targets.len() != del_hashes.len() || other.targets.len() != other_del_hashes.len()
        {
            return Err(UtreexoError::MalformedProof);
        }
        let forest_rows = util::tree_rows(num_leaves);

        let mut target_pairs: Vec<(u64, NodeHash)> = self
            .targets
            .iter()
            .copied()
            .zip(del_hashes.iter().copied())
            .chain(other.targets.iter().copied().zip(other_del_hashes.iter().copied()))
            .collect();
        target_pairs.sort_unstable_by_key(|(pos, _)| *pos);
        target_pairs.dedup_by_key(|(pos, _)| *pos);

        let mut known: BTreeMap<u64, NodeHash> = BTreeMap::new();
        for (pos, hash) in self
            .hash_pairs(num_leaves)?
            .into_iter()
            .chain(other.hash_pairs(num_leaves)?)
            .chain(target_pairs.iter().copied())
        {
            known.insert(pos, hash);
        }

        let targets: Vec<u64> = target_pairs.iter().map(|(pos, _)| *pos).collect();
        let (needed, _) = util::proof_positions(&targets, num_leaves, forest_rows);
        let hashes = needed
            .iter()
            .map(|pos| known.get(pos).copied().ok_or(UtreexoError::MalformedProof))
            .collect::<Result<Vec<_>, _>>()?;

        let merged_hashes = target_pairs.into_iter().map(|(_, hash)| hash).collect();
        Ok((merged_hashes, Proof { targets, hashes }))
    }

    /// Shrinks this proof to the targets not listed in `remove`. Subtrees
    /// that no longer hold any target contribute nothing to the result;
    /// hashes still required are taken from what the full proof already
    /// knows, hashing removed targets together where needed.
    pub fn remove_targets(
        &self,
        del_hashes: &[NodeHash],
        remove: &[u64],
        num_leaves: u64,
    ) -> Result<(Vec<NodeHash>, Proof), UtreexoError> {
        let forest_rows = util::tree_rows(num_leaves);

        let (computed, roots) = self.calculate_hashes(del_hashes, num_leaves)?;
        let mut known: BTreeMap<u64, NodeHash> = BTreeMap::new();
        for (pos, hash) in self
            .hash_pairs(num_leaves)?
            .into_iter()
            .chain(computed)
            .chain(roots)
        {
            known.insert(pos, hash);
        }

        let mut kept_targets = Vec::new();
        let mut kept_hashes = Vec::new();
        for (target, hash) in self.targets.iter().zip(del_hashes.iter()) {
            if !remove.contains(target) {
                kept_targets.push(*target);
                kept_hashes.push(*hash);
            }
        }

        let mut sorted = kept_targets.clone();
        sorted.sort_unstable();
        let (needed, _) = util::proof_positions(&sorted, num_leaves, forest_rows);
        let hashes = needed
            .iter()
            .map(|pos| known.get(pos).copied().ok_or(UtreexoError::MalformedProof))
            .collect::<Result<Vec<_>, _>>()?;

        Ok((kept_hashes, Proof { targets: kept_targets, hashes }))
    }

    /// Carries this cached proof through a deletion proven by
    /// `block_proof`. The result proves the cached targets that survive the
    /// deletion, against the roots as they stand after it, and equals what
    /// re-proving those leaves on the updated accumulator would return.
    pub fn update_after_deletion(
        &self,
        cached_del_hashes: &[NodeHash],
        block_proof: &Proof,
        block_del_hashes: &[NodeHash],
        num_leaves: u64,
    ) -> Result<(Vec<NodeHash>, Proof), UtreexoError> {
        let forest_rows = util::tree_rows(num_leaves);

        // Everything the union of both proofs knows, as position-hash
        // entries.
        let (_, union_proof) =
            self.merge(block_proof, cached_del_hashes, block_del_hashes, num_leaves)?;
        let mut entries: Vec<(u64, NodeHash)> = union_proof.hash_pairs(num_leaves)?;
        for (target, hash) in self.targets.iter().zip(cached_del_hashes.iter()) {
            entries.push((*target, *hash));
        }
        for (target, hash) in block_proof.targets.iter().zip(block_del_hashes.iter()) {
            entries.push((*target, *hash));
        }
        entries.sort_unstable_by_key(|(pos, _)| *pos);
        entries.dedup_by_key(|(pos, _)| *pos);

        // Where each cached target ends up, None once deleted.
        let mut tracked: Vec<Option<u64>> = self.targets.iter().map(|pos| Some(*pos)).collect();

        let mut block_targets = block_proof.targets.clone();
        block_targets.sort_unstable();
        for target in &block_targets {
            entries.retain(|(pos, _)| pos != target);
            for slot in tracked.iter_mut() {
                if *slot == Some(*target) {
                    *slot = None;
                }
            }
        }

        for del in util::detwin(&block_targets, forest_rows) {
            entries.retain(|(pos, _)| *pos != del);
            for slot in tracked.iter_mut() {
                if *slot == Some(del) {
                    *slot = None;
                }
            }
            if util::is_root_position(del, num_leaves, forest_rows) {
                continue;
            }

            let sib = util::sibling(del);
            for (pos, _) in entries.iter_mut() {
                if *pos == sib || util::is_ancestor(sib, *pos, forest_rows) {
                    *pos = util::calc_next_position(*pos, del, forest_rows)?;
                }
            }
            for slot in tracked.iter_mut() {
                if let Some(pos) = slot {
                    if *pos == sib || util::is_ancestor(sib, *pos, forest_rows) {
                        *pos = util::calc_next_position(*pos, del, forest_rows)?;
                    }
                }
            }
        }

        let known: BTreeMap<u64, NodeHash> = entries.into_iter().collect();

        let mut new_targets = Vec::new();
        let mut new_del_hashes = Vec::new();
        for (slot, hash) in tracked.iter().zip(cached_del_hashes.iter()) {
            if let Some(pos) = slot {
                new_targets.push(*pos);
                new_del_hashes.push(*hash);
            }
        }

        let mut sorted = new_targets.clone();
        sorted.sort_unstable();
        let (needed, _) = util::proof_positions(&sorted, num_leaves, forest_rows);
        let hashes = needed
            .iter()
            .map(|pos| {
                resolve_hash(&known, *pos, forest_rows).ok_or(UtreexoError::MalformedProof)
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok((new_del_hashes, Proof { targets: new_targets, hashes }))
    }

    /// Serializes this proof: a varint target count, the targets as u64
    /// little-endian in caller order, a varint hash count, then the raw
    /// 32-byte hashes. Returns the number of bytes written.
    pub fn serialize<W: Write>(&self, writer: &mut W) -> Result<usize, UtreexoError> {
        let mut len = write_varint(writer, self.targets.len() as u64)?;
        for target in &self.targets {
            writer.write_all(&target.to_le_bytes())?;
            len += 8;
        }
        len += write_varint(writer, self.hashes.len() as u64)?;
        for hash in &self.hashes {
            writer.write_all(&**hash)?;
            len += 32;
        }
        Ok(len)
    }

    /// Reads back a proof written by [Proof::serialize].
    pub fn deserialize<R: Read>(reader: &mut R) -> Result<Proof, UtreexoError> {
        let n_targets = read_varint(reader)?;
        let mut targets = Vec::with_capacity(n_targets.min(1 << 20) as usize);
        for _ in 0..n_targets {
            targets.push(read_u64(reader)?);
        }

        let n_hashes = read_varint(reader)?;
        let mut hashes = Vec::with_capacity(n_hashes.min(1 << 20) as usize);
        for _ in 0..n_hashes {
            hashes.push(read_hash(reader)?);
        }
        Ok(Proof { targets, hashes })
    }
}

/// The smallest set of positions one would have to fetch elsewhere to
/// extend a proof of `have` into a proof of `desired`: what the desired
/// targets need, minus everything the current targets already supply or
/// can compute. Sorted ascending.
pub fn get_missing_positions(num_leaves: u64, have: &[u64], desired: &[u64]) -> Vec<u64> {
    let forest_rows = util::tree_rows(num_leaves);

    let mut have = have.to_vec();
    have.sort_unstable();
    have.dedup();
    let mut desired = desired.to_vec();
    desired.sort_unstable();
    desired.dedup();

    let (have_needed, have_computable) = util::proof_positions(&have, num_leaves, forest_rows);
    let (desired_needed, _) = util::proof_positions(&desired, num_leaves, forest_rows);

    desired_needed
        .into_iter()
        .filter(|pos| {
            have_needed.binary_search(pos).is_err()
                && have_computable.binary_search(pos).is_err()
        })
        .collect()
}

/// Looks a position up in the table, or derives it by hashing the table's
/// entries below it together.
fn resolve_hash(
    known: &BTreeMap<u64, NodeHash>,
    pos: u64,
    forest_rows: u8,
) -> Option<NodeHash> {
    if let Some(hash) = known.get(&pos) {
        return Some(*hash);
    }
    if util::detect_row(pos, forest_rows) == 0 {
        return None;
    }
    let left = util::left_child(pos, forest_rows);
    let left_hash = resolve_hash(known, left, forest_rows)?;
    let right_hash = resolve_hash(known, util::right_sib(left), forest_rows)?;
    Some(parent_or_promote(&left_hash, &right_hash))
}

/// Bitcoin-style compact varint. One byte below 0xfd, otherwise a marker
/// byte followed by a little-endian u16, u32 or u64.
pub(super) fn write_varint<W: Write>(writer: &mut W, value: u64) -> Result<usize, UtreexoError> {
    if value < 0xfd {
        writer.write_all(&[value as u8])?;
        Ok(1)
    } else if value <= 0xffff {
        writer.write_all(&[0xfd])?;
        writer.write_all(&(value as u16).to_le_bytes())?;
        Ok(3)
    } else if value <= 0xffff_ffff {
        writer.write_all(&[0xfe])?;
        writer.write_all(&(value as u32).to_le_bytes())?;
        Ok(5)
    } else {
        writer.write_all(&[0xff])?;
        writer.write_all(&value.to_le_bytes())?;
        Ok(9)
    }
}

pub(super) fn read_varint<R: Read>(reader: &mut R) -> Result<u64, UtreexoError> {
    let mut marker = [0u8; 1];
    reader.read_exact(&mut marker)?;
    match marker[0] {
        0xfd => {
            let mut buf = [0u8; 2];
            reader.read_exact(&mut buf)?;
            Ok(u16::from_le_bytes(buf) as u64)
        }
        0xfe => {
            let mut buf = [0u8; 4];
            reader.read_exact(&mut buf)?;
            Ok(u32::from_le_bytes(buf) as u64)
        }
        0xff => {
            let mut buf = [0u8; 8];
            reader.read_exact(&mut buf)?;
            Ok(u64::from_le_bytes(buf))
        }
        value => Ok(value as u64),
    }
}

pub(super) fn read_u64<R: Read>(reader: &mut R) -> Result<u64, UtreexoError> {
    let mut buf = [0u8; 8];
    reader.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

pub(super) fn read_hash<R: Read>(reader: &mut R) -> Result<NodeHash, UtreexoError> {
    let mut buf = [0u8; 32];
    reader.read_exact(&mut buf)?;
    Ok(NodeHash::new(buf))
}

#[cfg(test)]
mod tests {
    use bitcoin_hashes::sha256;
    use bitcoin_hashes::Hash;
    use bitcoin_hashes::HashEngine;

    use super::get_missing_positions;
    use super::Proof;
    use crate::accumulator::node_hash::NodeHash;
    use crate::accumulator::stump::Stump;

    fn hash_from_u8(value: u8) -> NodeHash {
        let mut engine = sha256::Hash::engine();
        engine.input(&[value]);
        NodeHash::new(sha256::Hash::from_engine(engine).to_byte_array())
    }

    fn leaves(n: u8) -> Vec<NodeHash> {
        (0..n).map(hash_from_u8).collect()
    }

    /// A stump holding the first `n` test leaves.
    fn stump_with(n: u8) -> (Stump, Vec<NodeHash>) {
        let mut stump = Stump::new();
        let leaves = leaves(n);
        stump.modify(&leaves, &[], &Proof::default()).unwrap();
        (stump, leaves)
    }

    #[test]
    fn test_verify_single_branch() {
        let (stump, leaves) = stump_with(8);

        // prove leaf 4 with its branch: 5, then h(6,7), then h(h(0,1),h(2,3))
        let proof = Proof::new(
            vec![4],
            vec![
                leaves[5],
                NodeHash::parent_hash(&leaves[6], &leaves[7]),
                NodeHash::parent_hash(
                    &NodeHash::parent_hash(&leaves[0], &leaves[1]),
                    &NodeHash::parent_hash(&leaves[2], &leaves[3]),
                ),
            ],
        );
        assert!(proof.verify(&[leaves[4]], &stump).unwrap());
        // the wrong leaf hash fails
        assert!(!proof.verify(&[leaves[5]], &stump).unwrap());
    }

    #[test]
    fn test_verify_sibling_targets() {
        let (stump, leaves) = stump_with(4);
        let proof = Proof::new(
            vec![2, 3],
            vec![NodeHash::parent_hash(&leaves[0], &leaves[1])],
        );
        assert!(proof.verify(&[leaves[2], leaves[3]], &stump).unwrap());

        // caller order is preserved, pairing is positional
        let proof = Proof::new(
            vec![3, 2],
            vec![NodeHash::parent_hash(&leaves[0], &leaves[1])],
        );
        assert!(proof.verify(&[leaves[3], leaves[2]], &stump).unwrap());
    }

    #[test]
    fn test_verify_across_trees() {
        // 5 leaves: a 4-leaf tree and a loose leaf that is its own root
        let (stump, leaves) = stump_with(5);
        let proof = Proof::new(vec![1, 4], vec![leaves[0], NodeHash::parent_hash(&leaves[2], &leaves[3])]);
        assert!(proof.verify(&[leaves[1], leaves[4]], &stump).unwrap());
    }

    #[test]
    fn test_verify_empty_proof() {
        let (stump, _) = stump_with(3);
        assert!(Proof::default().verify(&[], &stump).unwrap());
    }

    #[test]
    fn test_malformed_proofs() {
        let (stump, leaves) = stump_with(8);

        // too short
        let proof = Proof::new(vec![4], vec![leaves[5]]);
        assert!(proof.verify(&[leaves[4]], &stump).is_err());

        // too long
        let proof = Proof::new(
            vec![2, 3],
            vec![
                NodeHash::parent_hash(&leaves[0], &leaves[1]),
                leaves[0],
                leaves[1],
            ],
        );
        assert!(proof.verify(&[leaves[2], leaves[3]], &stump).is_err());

        // hash count disagrees with target count
        let proof = Proof::new(vec![0, 1], vec![]);
        assert!(proof.verify(&[leaves[0]], &stump).is_err());
    }

    #[test]
    fn test_proof_after_deletion() {
        let (stump, leaves) = stump_with(4);

        // delete leaf 1; its sibling's hash moves up to the parent slot
        let proof = Proof::new(
            vec![1],
            vec![leaves[0], NodeHash::parent_hash(&leaves[2], &leaves[3])],
        );
        assert!(proof.verify(&[leaves[1]], &stump).unwrap());

        let (new_hashes, new_proof) = proof.proof_after_deletion(4).unwrap();
        assert_eq!(new_hashes, vec![leaves[0]]);
        assert_eq!(new_proof.targets, vec![4]);
        assert_eq!(
            new_proof.hashes,
            vec![NodeHash::parent_hash(&leaves[2], &leaves[3])]
        );

        // and it verifies against the post-deletion stump
        let mut post = stump.clone();
        post.modify(&[], &[leaves[1]], &proof).unwrap();
        assert!(new_proof.verify(&new_hashes, &post).unwrap());
    }

    #[test]
    fn test_proof_after_deleting_whole_tree() {
        let (stump, leaves) = stump_with(4);
        let proof = Proof::new(vec![0, 1, 2, 3], vec![]);
        assert!(proof
            .verify(&[leaves[0], leaves[1], leaves[2], leaves[3]], &stump)
            .unwrap());

        let (new_hashes, new_proof) = proof.proof_after_deletion(4).unwrap();
        // the root is all that remains, and it is empty
        assert_eq!(new_proof.targets, vec![6]);
        assert_eq!(new_hashes, vec![NodeHash::empty()]);
        assert!(new_proof.hashes.is_empty());
    }

    #[test]
    fn test_proof_after_deletion_double_promotion() {
        let (stump, leaves) = stump_with(8);

        // deleting 0, 1 and 2 promotes leaf 3 twice
        let proof = Proof::new(
            vec![0, 1, 2],
            vec![
                leaves[3],
                NodeHash::parent_hash(
                    &NodeHash::parent_hash(&leaves[4], &leaves[5]),
                    &NodeHash::parent_hash(&leaves[6], &leaves[7]),
                ),
            ],
        );
        assert!(proof
            .verify(&[leaves[0], leaves[1], leaves[2]], &stump)
            .unwrap());

        let (new_hashes, new_proof) = proof.proof_after_deletion(8).unwrap();
        assert_eq!(new_proof.targets, vec![12]);
        assert_eq!(new_hashes, vec![leaves[3]]);

        let mut post = stump.clone();
        post.modify(&[], &[leaves[0], leaves[1], leaves[2]], &proof)
            .unwrap();
        assert!(new_proof.verify(&new_hashes, &post).unwrap());
    }

    #[test]
    fn test_merge() {
        let (stump, leaves) = stump_with(4);

        let left = Proof::new(
            vec![0, 1],
            vec![NodeHash::parent_hash(&leaves[2], &leaves[3])],
        );
        let right = Proof::new(
            vec![2, 3],
            vec![NodeHash::parent_hash(&leaves[0], &leaves[1])],
        );

        let (merged_hashes, merged) = left
            .merge(&right, &leaves[0..2], &leaves[2..4], 4)
            .unwrap();
        // everything is computable from the union, no hashes remain
        assert_eq!(merged.targets, vec![0, 1, 2, 3]);
        assert!(merged.hashes.is_empty());
        assert!(merged.verify(&merged_hashes, &stump).unwrap());
    }

    #[test]
    fn test_merge_overlapping() {
        let (stump, leaves) = stump_with(8);
        let sub_0 = NodeHash::parent_hash(&leaves[2], &leaves[3]);
        let sub_1 = NodeHash::parent_hash(
            &NodeHash::parent_hash(&leaves[4], &leaves[5]),
            &NodeHash::parent_hash(&leaves[6], &leaves[7]),
        );

        let left = Proof::new(vec![0], vec![leaves[1], sub_0, sub_1]);
        let right = Proof::new(vec![1], vec![leaves[0], sub_0, sub_1]);

        let (merged_hashes, merged) = left
            .merge(&right, &leaves[0..1], &leaves[1..2], 8)
            .unwrap();
        assert_eq!(merged.targets, vec![0, 1]);
        // the leaf hashes are now targets, only the branch remains
        assert_eq!(merged.hashes, vec![sub_0, sub_1]);
        assert!(merged.verify(&merged_hashes, &stump).unwrap());
    }

    #[test]
    fn test_remove_targets() {
        let (stump, leaves) = stump_with(8);
        let full_targets: Vec<u64> = (0..8).collect();
        let full = Proof::new(full_targets, vec![]);
        assert!(full.verify(&leaves, &stump).unwrap());

        // shrink to just leaf 4; the removed targets supply its branch
        let (kept_hashes, shrunk) = full.remove_targets(&leaves, &[0, 1, 2, 3, 5, 6, 7], 8).unwrap();
        assert_eq!(shrunk.targets, vec![4]);
        assert_eq!(kept_hashes, vec![leaves[4]]);
        assert!(shrunk.verify(&kept_hashes, &stump).unwrap());

        // removing everything leaves an empty proof
        let (kept_hashes, empty) = full
            .remove_targets(&leaves, &(0..8).collect::<Vec<_>>(), 8)
            .unwrap();
        assert!(kept_hashes.is_empty());
        assert_eq!(empty, Proof::default());
    }

    #[test]
    fn test_get_missing_positions() {
        // proving 0 needs 1, 9 and 13; holding 2 and 3 supplies 9
        let missing = get_missing_positions(8, &[2, 3], &[0]);
        assert_eq!(missing, vec![1, 13]);

        // the desired target itself is never reported
        let missing = get_missing_positions(8, &[1], &[0]);
        assert_eq!(missing, vec![13]);

        // nothing is missing when coverage is already there
        assert!(get_missing_positions(8, &[0, 1, 2, 3, 4, 5, 6, 7], &[5]).is_empty());
    }

    #[test]
    fn test_update_after_deletion() {
        let (stump, leaves) = stump_with(8);

        // we cache leaf 6, the block deletes leaves 0 and 5
        let cached = Proof::new(
            vec![6],
            vec![
                leaves[7],
                NodeHash::parent_hash(&leaves[4], &leaves[5]),
                NodeHash::parent_hash(
                    &NodeHash::parent_hash(&leaves[0], &leaves[1]),
                    &NodeHash::parent_hash(&leaves[2], &leaves[3]),
                ),
            ],
        );
        assert!(cached.verify(&[leaves[6]], &stump).unwrap());

        let block = Proof::new(
            vec![0, 5],
            vec![
                leaves[1],
                leaves[4],
                NodeHash::parent_hash(&leaves[2], &leaves[3]),
                NodeHash::parent_hash(&leaves[6], &leaves[7]),
            ],
        );
        let block_hashes = [leaves[0], leaves[5]];
        assert!(block.verify(&block_hashes, &stump).unwrap());

        let mut post = stump.clone();
        post.modify(&[], &block_hashes, &block).unwrap();

        let (new_hashes, new_proof) = cached
            .update_after_deletion(&[leaves[6]], &block, &block_hashes, 8)
            .unwrap();
        assert_eq!(new_hashes, vec![leaves[6]]);
        assert_eq!(new_proof.targets, vec![6]);
        assert!(new_proof.verify(&new_hashes, &post).unwrap());
    }

    #[test]
    fn test_update_after_deleting_cached_target() {
        let (stump, leaves) = stump_with(4);

        let cached = Proof::new(
            vec![0, 3],
            vec![leaves[1], leaves[2]],
        );
        assert!(cached.verify(&[leaves[0], leaves[3]], &stump).unwrap());

        // the block deletes one of our own targets
        let block = Proof::new(
            vec![3],
            vec![leaves[2], NodeHash::parent_hash(&leaves[0], &leaves[1])],
        );
        let block_hashes = [leaves[3]];

        let mut post = stump.clone();
        post.modify(&[], &block_hashes, &block).unwrap();

        let (new_hashes, new_proof) = cached
            .update_after_deletion(&[leaves[0], leaves[3]], &block, &block_hashes, 4)
            .unwrap();
        assert_eq!(new_hashes, vec![leaves[0]]);
        assert_eq!(new_proof.targets, vec![0]);
        assert!(new_proof.verify(&new_hashes, &post).unwrap());
    }

    #[test]
    fn test_serialize_round_trip() {
        let proof = Proof::new(
            vec![3, 1, 4000],
            vec![hash_from_u8(1), hash_from_u8(2), hash_from_u8(3)],
        );
        let mut buf = Vec::new();
        let len = proof.serialize(&mut buf).unwrap();
        assert_eq!(len, buf.len());

        let read_back = Proof::deserialize(&mut buf.as_slice()).unwrap();
        // caller order survives the round trip
        assert_eq!(read_back, proof);

        let empty = Proof::default();
        let mut buf = Vec::new();
        let len = empty.serialize(&mut buf).unwrap();
        assert_eq!(len, buf.len());
        assert_eq!(Proof::deserialize(&mut buf.as_slice()).unwrap(), empty);
    }

    #[test]
    fn test_deserialize_truncated() {
        let proof = Proof::new(vec![0], vec![hash_from_u8(0), hash_from_u8(1)]);
        let mut buf = Vec::new();
        proof.serialize(&mut buf).unwrap();
        buf.truncate(buf.len() - 1);
        assert!(Proof::deserialize(&mut buf.as_slice()).is_err());
    }
}
