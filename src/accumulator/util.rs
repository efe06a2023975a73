//! Index arithmetic over the virtual forest.
//!
//! Positions are row-major: row 0 holds the leaves, and the positions of
//! row `r` all come after every position of row `r - 1`. A forest of
//! height `forest_rows` lays its trees out as if it were one perfect tree
//! with `1 << forest_rows` leaves; the trees actually present are given by
//! the binary expansion of the leaf count.
//!
//! ```text
//! 14
//! |---------------\
//! 12              13
//! |-------\       |-------\
//! 08      09      10      11
//! |---\   |---\   |---\   |---\
//! 00  01  02  03  04  05  06  07
//! ```

use super::UtreexoError;

/// Returns the number of rows needed to hold this many leaves, i.e. the
/// smallest `r` with `1 << r >= num_leaves`.
pub fn tree_rows(num_leaves: u64) -> u8 {
    if num_leaves <= 1 {
        0
    } else {
        (64 - (num_leaves - 1).leading_zeros()) as u8
    }
}

/// How many roots the forest for this many leaves has, one per set bit.
pub fn num_roots(num_leaves: u64) -> usize {
    num_leaves.count_ones() as usize
}

/// Shifts that may legally reach the bit width produce zero instead of
/// tripping the overflow check.
fn shift(value: u64, by: u32) -> u64 {
    value.checked_shl(by).unwrap_or(0)
}

/// The row a position sits on, given the forest height. Counts the leading
/// one-bits starting at bit `forest_rows`.
pub fn detect_row(pos: u64, forest_rows: u8) -> u8 {
    let mut marker = 1u64 << forest_rows;
    let mut row = 0;
    while pos & marker != 0 {
        marker >>= 1;
        row += 1;
    }
    row
}

/// The first position of the given row.
pub fn start_position_at_row(row: u8, forest_rows: u8) -> u64 {
    (2u64 << forest_rows) - (2u64 << (forest_rows - row))
}

/// The position of the parent of `pos`.
pub fn parent(pos: u64, forest_rows: u8) -> u64 {
    (pos >> 1) | (1u64 << forest_rows)
}

/// The position `rise` rows above `pos`.
pub fn parent_many(pos: u64, rise: u8, forest_rows: u8) -> u64 {
    if rise == 0 {
        return pos;
    }
    let mask = (2u64 << forest_rows) - 1;
    (pos >> rise | shift(mask, (forest_rows - (rise - 1)) as u32)) & mask
}

/// The position of the left child of `pos`.
pub fn left_child(pos: u64, forest_rows: u8) -> u64 {
    (pos << 1) & ((2u64 << forest_rows) - 1)
}

/// The position paired with `pos` under the same parent.
pub fn sibling(pos: u64) -> u64 {
    pos ^ 1
}

/// The even position of the pair `pos` belongs to.
pub fn left_sib(pos: u64) -> u64 {
    pos & !1
}

/// The odd position of the pair `pos` belongs to.
pub fn right_sib(pos: u64) -> u64 {
    pos | 1
}

/// Whether `pos` is the left (even) half of its pair.
pub fn is_left_niece(pos: u64) -> bool {
    pos & 1 == 0
}

/// The position of the root on the given row, assuming `num_leaves` has
/// that bit set.
pub fn root_position(num_leaves: u64, row: u8, forest_rows: u8) -> u64 {
    let mask = (2u64 << forest_rows) - 1;
    let before = num_leaves & shift(mask, (row + 1) as u32);
    let shifted = (before >> row) | shift(mask, ((forest_rows + 1) - row) as u32);
    shifted & mask
}

/// Every root position for this forest, tallest tree first.
pub fn root_positions(num_leaves: u64, forest_rows: u8) -> Vec<u64> {
    let mut positions = Vec::with_capacity(num_roots(num_leaves));
    for row in (0..=forest_rows).rev() {
        if num_leaves & (1u64 << row) != 0 {
            positions.push(root_position(num_leaves, row, forest_rows));
        }
    }
    positions
}

/// Whether `pos` is the root of one of the trees actually present.
pub fn is_root_position(pos: u64, num_leaves: u64, forest_rows: u8) -> bool {
    let row = detect_row(pos, forest_rows);
    num_leaves & (1u64 << row) != 0 && pos == root_position(num_leaves, row, forest_rows)
}

/// Whether `higher` is a strict ancestor of `lower`.
pub fn is_ancestor(higher: u64, lower: u64, forest_rows: u8) -> bool {
    if higher == lower {
        return false;
    }
    let lower_row = detect_row(lower, forest_rows);
    let higher_row = detect_row(higher, forest_rows);
    if higher_row <= lower_row {
        return false;
    }
    parent_many(lower, higher_row - lower_row, forest_rows) == higher
}

/// Locates a position within the forest: which tree it is in (0 is the
/// tallest), how many rows it sits below that tree's root, and the
/// inverted left/right branch bits leading down to it.
pub fn detect_offset(pos: u64, num_leaves: u64) -> Result<(u8, u8, u64), UtreexoError> {
    let mut tr = tree_rows(num_leaves);
    let nr = detect_row(pos, tr);

    let mut bigger_trees: u8 = 0;
    let mut marker = pos;

    // Walk down through the trees, subtracting each tree we pass until the
    // marker lands inside one.
    while (marker << nr) & ((2u64 << tr) - 1) >= (1u64 << tr) & num_leaves {
        let tree_size = (1u64 << tr) & num_leaves;
        if tree_size != 0 {
            marker -= tree_size;
            bigger_trees += 1;
        }
        if tr == 0 {
            return Err(UtreexoError::MalformedInput);
        }
        tr -= 1;
    }

    if tr < nr {
        return Err(UtreexoError::MalformedInput);
    }
    Ok((bigger_trees, tr - nr, !marker))
}

/// Where `pos` ends up after `del_pos` is deleted and the subtree rooted
/// at `del_pos`'s sibling collapses up one row. `pos` must be the sibling
/// or one of its descendants, and therefore on a row no higher than
/// `del_pos`'s.
pub fn calc_next_position(pos: u64, del_pos: u64, forest_rows: u8) -> Result<u64, UtreexoError> {
    let del_row = detect_row(del_pos, forest_rows);
    let pos_row = detect_row(pos, forest_rows);
    if del_row < pos_row {
        return Err(UtreexoError::CorruptedState);
    }

    let rise = del_row - pos_row;
    let mask = (2u64 << forest_rows) - 1;
    let branch = pos & (shift(1, rise as u32).wrapping_sub(1));
    Ok((shift(parent(del_pos, forest_rows), rise as u32) & mask) | branch)
}

/// Reinterprets a position at a different forest height, keeping its row
/// and its offset within the row.
pub fn translate_pos(pos: u64, from_rows: u8, to_rows: u8) -> u64 {
    let row = detect_row(pos, from_rows);
    let offset = pos - start_position_at_row(row, from_rows);
    start_position_at_row(row, to_rows) + offset
}

/// [translate_pos] over a whole slice.
pub fn translate_positions(positions: &[u64], from_rows: u8, to_rows: u8) -> Vec<u64> {
    positions
        .iter()
        .map(|pos| translate_pos(*pos, from_rows, to_rows))
        .collect()
}

/// Replaces every pair of sibling positions with their parent, recursively,
/// returning a sorted list in which no two entries share a parent.
pub fn detwin(dels: &[u64], forest_rows: u8) -> Vec<u64> {
    let mut dels = dels.to_vec();
    let mut i = 0;
    while i < dels.len() {
        if i + 1 < dels.len() && is_left_niece(dels[i]) && right_sib(dels[i]) == dels[i + 1] {
            let parent_pos = parent(dels[i], forest_rows);
            dels.remove(i + 1);
            dels.remove(i);
            if let Err(idx) = dels.binary_search(&parent_pos) {
                dels.insert(idx, parent_pos);
            }
            // stay put, the element shifted into i may pair as well
        } else {
            i += 1;
        }
    }
    dels
}

/// For a sorted, deduplicated target list, returns the positions whose
/// hashes a proof must supply (`needed`) and the positions whose hashes
/// hashing up from the targets will produce, targets and reached roots
/// included (`computable`). Both come back sorted ascending.
///
/// When two targets share a parent the parent is computable rather than
/// needed, and a target that already sits on a root adds nothing to
/// `needed`.
pub fn proof_positions(targets: &[u64], num_leaves: u64, forest_rows: u8) -> (Vec<u64>, Vec<u64>) {
    let mut needed = Vec::new();
    let mut computable = Vec::new();

    let mut positions = targets.to_vec();
    let mut i = 0;
    while i < positions.len() {
        let pos = positions[i];
        computable.push(pos);

        if is_root_position(pos, num_leaves, forest_rows) {
            i += 1;
            continue;
        }

        if i + 1 < positions.len() && positions[i + 1] == sibling(pos) {
            computable.push(positions[i + 1]);
            i += 2;
        } else {
            needed.push(sibling(pos));
            i += 1;
        }

        let parent_pos = parent(pos, forest_rows);
        if let Err(idx) = positions.binary_search(&parent_pos) {
            positions.insert(idx, parent_pos);
        }
    }

    (needed, computable)
}
