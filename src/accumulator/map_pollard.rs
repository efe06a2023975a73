//! A [MapPollard] is the partially-materialized accumulator. It keeps the
//! full root set like a [super::stump::Stump] does, and caches a chosen subset of
//! leaves together with exactly the intermediate nodes needed to re-prove
//! them, all indexed by position in one map. Instead of the niece pointers
//! a linked forest uses, deletions here rewrite the keys of the nodes that
//! collapse upward.

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::io::Read;
use std::io::Write;
use std::mem;

use super::node_hash::MiniHash;
use super::node_hash::NodeHash;
use super::proof::parent_or_promote;
use super::proof::read_hash;
use super::proof::read_u64;
use super::proof::read_varint;
use super::proof::write_varint;
use super::proof::Proof;
use super::util;
use super::UtreexoError;

/// A leaf to be added to the accumulator. Leaves flagged `remember` stay
/// cached and can be proven later.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "with-serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Leaf {
    pub hash: NodeHash,
    pub remember: bool,
}

/// One stored forest node. `remember` is set iff this is the position of a
/// cached leaf.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "with-serde", derive(serde::Serialize, serde::Deserialize))]
struct Node {
    hash: NodeHash,
    remember: bool,
}

/// The map-backed pollard.
///
/// `nodes` holds exactly the cached leaf positions, their proof positions,
/// and the current roots. `cached_leaves` maps a leaf hash back to its
/// position so callers can speak in hashes. The forest is laid out at a
/// fixed height `total_rows`, which may exceed the natural height for the
/// current leaf count; everything callers see is translated to the natural
/// height at the boundary.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "with-serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MapPollard {
    nodes: BTreeMap<u64, Node>,
    cached_leaves: BTreeMap<MiniHash, u64>,
    num_leaves: u64,
    total_rows: u8,
}

impl MapPollard {
    /// An empty pollard whose height tracks the leaf count.
    pub fn new() -> MapPollard {
        MapPollard::default()
    }

    /// An empty pollard pinned to the given height. Steady-state updates
    /// never re-key as long as the leaf count fits.
    pub fn new_with_rows(total_rows: u8) -> MapPollard {
        MapPollard {
            total_rows,
            ..MapPollard::default()
        }
    }

    /// Total leaves ever added. Deletions leave ghost slots behind and do
    /// not decrement this.
    pub fn num_leaves(&self) -> u64 {
        self.num_leaves
    }

    /// The fixed height the forest is laid out at.
    pub fn total_rows(&self) -> u8 {
        self.total_rows
    }

    /// The current roots, tallest tree first.
    pub fn get_roots(&self) -> Vec<NodeHash> {
        util::root_positions(self.num_leaves, self.total_rows)
            .iter()
            .map(|pos| {
                self.nodes
                    .get(pos)
                    .map(|node| node.hash)
                    .unwrap_or_else(NodeHash::empty)
            })
            .collect()
    }

    /// The hash stored for a position, if we track it. The position is in
    /// the natural row convention.
    pub fn get_hash(&self, pos: u64) -> Option<NodeHash> {
        let pos = util::translate_pos(pos, self.natural_rows(), self.total_rows);
        self.nodes.get(&pos).map(|node| node.hash)
    }

    /// Builds an inclusion proof for the given cached leaves. Targets come
    /// back paired with the input order. Proof hashes the map does not hold
    /// directly are derived by hashing cached content together.
    ///
    /// Fails with [UtreexoError::MissingCachedLeaf] if a hash is not
    /// cached, [UtreexoError::MalformedInput] if one repeats, and
    /// [UtreexoError::CorruptedState] if a needed hash cannot be produced.
    pub fn prove(&self, hashes: &[NodeHash]) -> Result<Proof, UtreexoError> {
        let mut targets = Vec::with_capacity(hashes.len());
        let mut seen = BTreeSet::new();
        for hash in hashes {
            let pos = *self
                .cached_leaves
                .get(&hash.mini())
                .ok_or(UtreexoError::MissingCachedLeaf)?;
            if !seen.insert(pos) {
                return Err(UtreexoError::MalformedInput);
            }
            targets.push(pos);
        }

        let mut sorted = targets.clone();
        sorted.sort_unstable();
        let (needed, _) = util::proof_positions(&sorted, self.num_leaves, self.total_rows);

        let mut proof_hashes = Vec::with_capacity(needed.len());
        for pos in needed {
            proof_hashes.push(self.resolve_hash(pos).ok_or(UtreexoError::CorruptedState)?);
        }

        Ok(Proof {
            targets: util::translate_positions(&targets, self.total_rows, self.natural_rows()),
            hashes: proof_hashes,
        })
    }

    /// Checks a proof against the current roots. On success with
    /// `remember`, the proven leaves and the hashes that came with them are
    /// taken into the cache so the pollard can serve them later. A failed
    /// check changes nothing.
    pub fn verify(
        &mut self,
        del_hashes: &[NodeHash],
        proof: &Proof,
        remember: bool,
    ) -> Result<(), UtreexoError> {
        let (computed, roots) = proof.calculate_hashes(del_hashes, self.num_leaves)?;
        if !Proof::match_roots(&self.get_roots(), &roots) {
            return Err(UtreexoError::RootMismatch);
        }

        if remember {
            self.ingest(del_hashes, proof, &computed)?;
            self.prune_step();
        }
        Ok(())
    }

    /// Applies a block of changes: the proven deletions first, then the
    /// additions, pruning back down to the needed node set afterwards.
    ///
    /// Everything fallible runs before the first mutation, so a proof that
    /// does not check out leaves the pollard untouched.
    pub fn modify(
        &mut self,
        adds: &[Leaf],
        del_hashes: &[NodeHash],
        proof: &Proof,
    ) -> Result<(), UtreexoError> {
        let (_, old_roots) = proof.calculate_hashes(del_hashes, self.num_leaves)?;
        if !Proof::match_roots(&self.get_roots(), &old_roots) {
            return Err(UtreexoError::RootMismatch);
        }

        // the same walk with emptied-out targets yields every hash as it
        // stands after the deletion
        let empty = vec![NodeHash::empty(); del_hashes.len()];
        let (new_nodes, new_roots) = proof.calculate_hashes(&empty, self.num_leaves)?;

        self.remove(proof, del_hashes, new_nodes, new_roots)?;
        self.add(adds)?;
        self.prune_step();
        Ok(())
    }

    /// Forgets the given leaves: they stop being provable and every node
    /// kept around only for them is dropped. Fails with
    /// [UtreexoError::NotCached] before touching anything if a hash is not
    /// cached.
    pub fn prune(&mut self, hashes: &[NodeHash]) -> Result<(), UtreexoError> {
        for hash in hashes {
            if !self.cached_leaves.contains_key(&hash.mini()) {
                return Err(UtreexoError::NotCached);
            }
        }

        for hash in hashes {
            if let Some(pos) = self.cached_leaves.remove(&hash.mini()) {
                if let Some(node) = self.nodes.get_mut(&pos) {
                    node.remember = false;
                }
            }
        }
        self.prune_step();
        Ok(())
    }

    /// Serializes the whole pollard, returning the number of bytes
    /// written.
    pub fn serialize<W: Write>(&self, writer: &mut W) -> Result<usize, UtreexoError> {
        writer.write_all(&[self.total_rows])?;
        writer.write_all(&self.num_leaves.to_le_bytes())?;
        let mut len = 9;

        len += write_varint(writer, self.nodes.len() as u64)?;
        for (pos, node) in &self.nodes {
            writer.write_all(&pos.to_le_bytes())?;
            writer.write_all(&*node.hash)?;
            writer.write_all(&[node.remember as u8])?;
            len += 41;
        }

        len += write_varint(writer, self.cached_leaves.len() as u64)?;
        for (mini, pos) in &self.cached_leaves {
            writer.write_all(&**mini)?;
            writer.write_all(&pos.to_le_bytes())?;
            len += 20;
        }
        Ok(len)
    }

    /// Reads back a pollard written by [MapPollard::serialize].
    pub fn deserialize<R: Read>(reader: &mut R) -> Result<MapPollard, UtreexoError> {
        let mut total_rows = [0u8; 1];
        reader.read_exact(&mut total_rows)?;
        let num_leaves = read_u64(reader)?;

        let n_nodes = read_varint(reader)?;
        let mut nodes = BTreeMap::new();
        for _ in 0..n_nodes {
            let pos = read_u64(reader)?;
            let hash = read_hash(reader)?;
            let mut flag = [0u8; 1];
            reader.read_exact(&mut flag)?;
            nodes.insert(
                pos,
                Node {
                    hash,
                    remember: flag[0] != 0,
                },
            );
        }

        let n_cached = read_varint(reader)?;
        let mut cached_leaves = BTreeMap::new();
        for _ in 0..n_cached {
            let mut mini = [0u8; 12];
            reader.read_exact(&mut mini)?;
            let pos = read_u64(reader)?;
            cached_leaves.insert(MiniHash::from(mini), pos);
        }

        Ok(MapPollard {
            nodes,
            cached_leaves,
            num_leaves,
            total_rows: total_rows[0],
        })
    }

    fn natural_rows(&self) -> u8 {
        util::tree_rows(self.num_leaves)
    }

    /// A position's hash: stored directly, or hashed together from the
    /// stored content below it.
    fn resolve_hash(&self, pos: u64) -> Option<NodeHash> {
        if let Some(node) = self.nodes.get(&pos) {
            return Some(node.hash);
        }
        if util::detect_row(pos, self.total_rows) == 0 {
            return None;
        }
        let left = util::left_child(pos, self.total_rows);
        let left_hash = self.resolve_hash(left)?;
        let right_hash = self.resolve_hash(util::right_sib(left))?;
        Some(parent_or_promote(&left_hash, &right_hash))
    }

    /// Takes the proven positions and hashes of a verified proof into the
    /// map, marking the targets as cached leaves. `computed` comes from
    /// [Proof::calculate_hashes], in the natural row convention.
    fn ingest(
        &mut self,
        del_hashes: &[NodeHash],
        proof: &Proof,
        computed: &[(u64, NodeHash)],
    ) -> Result<(), UtreexoError> {
        let natural = self.natural_rows();

        for (pos, hash) in proof.hash_pairs(self.num_leaves)?.iter().chain(computed) {
            let pos = util::translate_pos(*pos, natural, self.total_rows);
            self.nodes.entry(pos).or_insert(Node {
                hash: *hash,
                remember: false,
            });
        }

        for (target, hash) in proof.targets.iter().zip(del_hashes) {
            let pos = util::translate_pos(*target, natural, self.total_rows);
            self.nodes.insert(
                pos,
                Node {
                    hash: *hash,
                    remember: true,
                },
            );
            self.cached_leaves.insert(hash.mini(), pos);
        }
        Ok(())
    }

    /// Deletes the proof's targets.
    ///
    /// The map is reshaped first: target nodes go away, deleted roots
    /// become empty roots, and the sibling subtree of each deletion
    /// collapses up one row with its keys rewritten through
    /// [util::calc_next_position]. The relocations are authoritative for
    /// where surviving nodes sit, so the recomputed hashes afterwards only
    /// refresh values of keys still present, never place new ones.
    fn remove(
        &mut self,
        proof: &Proof,
        del_hashes: &[NodeHash],
        new_nodes: Vec<(u64, NodeHash)>,
        new_roots: Vec<(u64, NodeHash)>,
    ) -> Result<(), UtreexoError> {
        if proof.targets.is_empty() {
            return Ok(());
        }
        let natural = self.natural_rows();

        for hash in del_hashes {
            self.cached_leaves.remove(&hash.mini());
        }

        let mut targets = util::translate_positions(&proof.targets, natural, self.total_rows);
        targets.sort_unstable();
        for target in &targets {
            self.nodes.remove(target);
        }

        for del in util::detwin(&targets, self.total_rows) {
            self.nodes.remove(&del);
            if util::is_root_position(del, self.num_leaves, self.total_rows) {
                self.nodes.insert(
                    del,
                    Node {
                        hash: NodeHash::empty(),
                        remember: false,
                    },
                );
                continue;
            }

            let sib = util::sibling(del);
            let moved: Vec<u64> = self
                .nodes
                .keys()
                .copied()
                .filter(|&pos| pos == sib || util::is_ancestor(sib, pos, self.total_rows))
                .collect();
            let mut relocated = Vec::with_capacity(moved.len());
            for pos in moved {
                if let Some(node) = self.nodes.remove(&pos) {
                    let new_pos = util::calc_next_position(pos, del, self.total_rows)?;
                    if node.remember {
                        self.cached_leaves.insert(node.hash.mini(), new_pos);
                    }
                    relocated.push((new_pos, node));
                }
            }
            for (pos, node) in relocated {
                self.nodes.insert(pos, node);
            }
        }

        for (pos, hash) in new_nodes.into_iter().chain(new_roots) {
            let pos = util::translate_pos(pos, natural, self.total_rows);
            if hash.is_empty() {
                // emptied roots stay behind as ghosts; anything else the
                // deletion vacated is already gone
                if util::is_root_position(pos, self.num_leaves, self.total_rows) {
                    self.nodes.insert(
                        pos,
                        Node {
                            hash,
                            remember: false,
                        },
                    );
                }
            } else if let Some(node) = self.nodes.get_mut(&pos) {
                node.hash = hash;
            }
        }
        Ok(())
    }

    fn add(&mut self, adds: &[Leaf]) -> Result<(), UtreexoError> {
        for add in adds {
            self.add_single(add)?;
        }
        Ok(())
    }

    /// Appends one leaf at the next free slot and hashes up, merging with
    /// the root of every occupied row the way the stump add does. Climbing over an
    /// empty root promotes the whole climbed subtree one row instead of
    /// hashing the ghost in.
    fn add_single(&mut self, leaf: &Leaf) -> Result<(), UtreexoError> {
        let needed_rows = util::tree_rows(self.num_leaves + 1);
        if needed_rows > self.total_rows {
            self.grow(needed_rows);
        }

        // row 0 offsets are the same at every height
        let mut pos = self.num_leaves;
        self.nodes.insert(
            pos,
            Node {
                hash: leaf.hash,
                remember: leaf.remember,
            },
        );
        if leaf.remember {
            self.cached_leaves.insert(leaf.hash.mini(), pos);
        }

        let mut cur_hash = leaf.hash;
        let mut row = 0;
        while (self.num_leaves >> row) & 1 == 1 {
            let root_pos = util::root_position(self.num_leaves, row, self.total_rows);
            let root_hash = self
                .nodes
                .get(&root_pos)
                .map(|node| node.hash)
                .ok_or(UtreexoError::CorruptedState)?;

            if root_hash.is_empty() {
                // ghost root: lift the climbed subtree into the parent slot
                self.nodes.remove(&root_pos);
                let moved: Vec<u64> = self
                    .nodes
                    .keys()
                    .copied()
                    .filter(|&key| key == pos || util::is_ancestor(pos, key, self.total_rows))
                    .collect();
                let mut relocated = Vec::with_capacity(moved.len());
                for key in moved {
                    if let Some(node) = self.nodes.remove(&key) {
                        let new_key = util::calc_next_position(key, root_pos, self.total_rows)?;
                        if node.remember {
                            self.cached_leaves.insert(node.hash.mini(), new_key);
                        }
                        relocated.push((new_key, node));
                    }
                }
                for (key, node) in relocated {
                    self.nodes.insert(key, node);
                }
                pos = util::calc_next_position(pos, root_pos, self.total_rows)?;
            } else {
                let parent_pos = util::parent(pos, self.total_rows);
                cur_hash = NodeHash::parent_hash(&root_hash, &cur_hash);
                self.nodes.insert(
                    parent_pos,
                    Node {
                        hash: cur_hash,
                        remember: false,
                    },
                );
                pos = parent_pos;
            }
            row += 1;
        }
        self.num_leaves += 1;
        Ok(())
    }

    /// Re-keys the whole map to a taller forest.
    fn grow(&mut self, new_rows: u8) {
        let old_rows = self.total_rows;
        self.nodes = mem::take(&mut self.nodes)
            .into_iter()
            .map(|(pos, node)| (util::translate_pos(pos, old_rows, new_rows), node))
            .collect();
        for pos in self.cached_leaves.values_mut() {
            *pos = util::translate_pos(*pos, old_rows, new_rows);
        }
        self.total_rows = new_rows;
    }

    /// Drops every node that is not a cached leaf, one of their proof
    /// positions, or a root.
    fn prune_step(&mut self) {
        let mut cached: Vec<u64> = self.cached_leaves.values().copied().collect();
        cached.sort_unstable();
        let (needed, _) = util::proof_positions(&cached, self.num_leaves, self.total_rows);

        let mut keep: BTreeSet<u64> = cached.into_iter().collect();
        keep.extend(needed);
        keep.extend(util::root_positions(self.num_leaves, self.total_rows));
        self.nodes.retain(|pos, _| keep.contains(pos));
    }
}
