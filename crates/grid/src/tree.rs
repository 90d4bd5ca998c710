//! Three-level sparse hierarchy: root map → upper internal nodes (4096³) →
//! lower internal nodes (128³) → 8³ leaves.
//!
//! Lower nodes may also hold inactive constant tiles covering a single leaf
//! slot. Child maps are ordered, so traversal is deterministic and matches
//! the (root key, child offset) order.

use std::collections::BTreeMap;

use crate::coord::Coord;
use crate::leaf::{LeafNode, LEAF_DIM, LEAF_LOG2DIM};
use crate::value::GridValue;

const LOWER_LOG2DIM: u32 = 4;
const LOWER_TOTAL_LOG2DIM: u32 = LOWER_LOG2DIM + LEAF_LOG2DIM;
const UPPER_LOG2DIM: u32 = 5;
const UPPER_TOTAL_LOG2DIM: u32 = UPPER_LOG2DIM + LOWER_TOTAL_LOG2DIM;

#[inline]
fn child_offset(c: Coord, total_log2: u32, child_log2: u32) -> usize {
    let local = (1i32 << total_log2) - 1;
    let log2dim = total_log2 - child_log2;
    let x = ((c.x & local) >> child_log2) as usize;
    let y = ((c.y & local) >> child_log2) as usize;
    let z = ((c.z & local) >> child_log2) as usize;
    (x << (2 * log2dim)) | (y << log2dim) | z
}

#[inline]
fn lower_slot_origin(lower_origin: Coord, slot: usize) -> Coord {
    let m = (1usize << LOWER_LOG2DIM) - 1;
    let d = LEAF_DIM as i32;
    lower_origin
        + Coord::new(
            (slot >> (2 * LOWER_LOG2DIM)) as i32 * d,
            ((slot >> LOWER_LOG2DIM) & m) as i32 * d,
            (slot & m) as i32 * d,
        )
}

#[derive(Debug, Clone, PartialEq)]
struct LowerNode<T: GridValue> {
    origin: Coord,
    leaves: BTreeMap<usize, LeafNode<T>>,
    tiles: BTreeMap<usize, T>,
}

impl<T: GridValue> LowerNode<T> {
    fn new(origin: Coord) -> Self {
        Self {
            origin,
            leaves: BTreeMap::new(),
            tiles: BTreeMap::new(),
        }
    }

    fn is_empty(&self) -> bool {
        self.leaves.is_empty() && self.tiles.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
struct UpperNode<T: GridValue> {
    children: BTreeMap<usize, LowerNode<T>>,
}

impl<T: GridValue> UpperNode<T> {
    fn new() -> Self {
        Self {
            children: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Tree<T: GridValue> {
    background: T,
    roots: BTreeMap<Coord, UpperNode<T>>,
}

impl<T: GridValue> Tree<T> {
    pub fn new(background: T) -> Self {
        Self {
            background,
            roots: BTreeMap::new(),
        }
    }

    pub fn background(&self) -> T {
        self.background
    }

    /// Replaces the background without touching stored values.
    pub fn set_background(&mut self, background: T) {
        self.background = background;
    }

    pub fn clear(&mut self) {
        self.roots.clear();
    }

    fn lower(&self, c: Coord) -> Option<&LowerNode<T>> {
        let upper = self.roots.get(&c.align_down(UPPER_TOTAL_LOG2DIM))?;
        upper
            .children
            .get(&child_offset(c, UPPER_TOTAL_LOG2DIM, LOWER_TOTAL_LOG2DIM))
    }

    fn lower_mut(&mut self, c: Coord) -> Option<&mut LowerNode<T>> {
        let upper = self.roots.get_mut(&c.align_down(UPPER_TOTAL_LOG2DIM))?;
        upper
            .children
            .get_mut(&child_offset(c, UPPER_TOTAL_LOG2DIM, LOWER_TOTAL_LOG2DIM))
    }

    fn touch_lower(&mut self, c: Coord) -> &mut LowerNode<T> {
        let upper = self
            .roots
            .entry(c.align_down(UPPER_TOTAL_LOG2DIM))
            .or_insert_with(UpperNode::new);
        upper
            .children
            .entry(child_offset(c, UPPER_TOTAL_LOG2DIM, LOWER_TOTAL_LOG2DIM))
            .or_insert_with(|| LowerNode::new(c.align_down(LOWER_TOTAL_LOG2DIM)))
    }

    pub fn get_value(&self, c: Coord) -> T {
        let Some(lower) = self.lower(c) else {
            return self.background;
        };
        let slot = child_offset(c, LOWER_TOTAL_LOG2DIM, LEAF_LOG2DIM);
        if let Some(leaf) = lower.leaves.get(&slot) {
            return leaf.get_value(c);
        }
        lower.tiles.get(&slot).copied().unwrap_or(self.background)
    }

    pub fn is_value_on(&self, c: Coord) -> bool {
        self.probe_leaf(c).is_some_and(|leaf| leaf.is_value_on(c))
    }

    pub fn probe_leaf(&self, c: Coord) -> Option<&LeafNode<T>> {
        self.lower(c)?
            .leaves
            .get(&child_offset(c, LOWER_TOTAL_LOG2DIM, LEAF_LOG2DIM))
    }

    pub fn probe_leaf_mut(&mut self, c: Coord) -> Option<&mut LeafNode<T>> {
        self.lower_mut(c)?
            .leaves
            .get_mut(&child_offset(c, LOWER_TOTAL_LOG2DIM, LEAF_LOG2DIM))
    }

    /// Returns the leaf containing `c`, creating it (filled with the tile or
    /// background value it replaces) if necessary.
    pub fn touch_leaf(&mut self, c: Coord) -> &mut LeafNode<T> {
        let background = self.background;
        let lower = self.touch_lower(c);
        let slot = child_offset(c, LOWER_TOTAL_LOG2DIM, LEAF_LOG2DIM);
        let fill = lower.tiles.remove(&slot).unwrap_or(background);
        lower
            .leaves
            .entry(slot)
            .or_insert_with(|| LeafNode::new(c, fill))
    }

    /// Inserts `leaf`, replacing any leaf or tile at its position.
    pub fn insert_leaf(&mut self, leaf: LeafNode<T>) {
        let origin = leaf.origin();
        let lower = self.touch_lower(origin);
        let slot = child_offset(origin, LOWER_TOTAL_LOG2DIM, LEAF_LOG2DIM);
        lower.tiles.remove(&slot);
        lower.leaves.insert(slot, leaf);
    }

    pub fn remove_leaf(&mut self, c: Coord) -> Option<LeafNode<T>> {
        let slot = child_offset(c, LOWER_TOTAL_LOG2DIM, LEAF_LOG2DIM);
        let leaf = self.lower_mut(c)?.leaves.remove(&slot);
        self.prune_empty(c);
        leaf
    }

    /// Fills the leaf-sized region containing `c` with an inactive constant,
    /// discarding any leaf stored there.
    pub fn set_tile(&mut self, c: Coord, value: T) {
        let lower = self.touch_lower(c);
        let slot = child_offset(c, LOWER_TOTAL_LOG2DIM, LEAF_LOG2DIM);
        lower.leaves.remove(&slot);
        lower.tiles.insert(slot, value);
    }

    pub fn tile_value(&self, c: Coord) -> Option<T> {
        self.lower(c)?
            .tiles
            .get(&child_offset(c, LOWER_TOTAL_LOG2DIM, LEAF_LOG2DIM))
            .copied()
    }

    fn prune_empty(&mut self, c: Coord) {
        let key = c.align_down(UPPER_TOTAL_LOG2DIM);
        let Some(upper) = self.roots.get_mut(&key) else {
            return;
        };
        let offset = child_offset(c, UPPER_TOTAL_LOG2DIM, LOWER_TOTAL_LOG2DIM);
        if upper.children.get(&offset).is_some_and(LowerNode::is_empty) {
            upper.children.remove(&offset);
        }
        if upper.children.is_empty() {
            self.roots.remove(&key);
        }
    }

    pub fn leaves(&self) -> impl Iterator<Item = &LeafNode<T>> + '_ {
        self.roots
            .values()
            .flat_map(|upper| upper.children.values())
            .flat_map(|lower| lower.leaves.values())
    }

    pub fn leaves_mut(&mut self) -> impl Iterator<Item = &mut LeafNode<T>> + '_ {
        self.roots
            .values_mut()
            .flat_map(|upper| upper.children.values_mut())
            .flat_map(|lower| lower.leaves.values_mut())
    }

    /// Inactive tiles as (leaf-aligned origin, value) pairs.
    pub fn tiles(&self) -> impl Iterator<Item = (Coord, T)> + '_ {
        self.roots
            .values()
            .flat_map(|upper| upper.children.values())
            .flat_map(|lower| {
                lower
                    .tiles
                    .iter()
                    .map(move |(slot, value)| (lower_slot_origin(lower.origin, *slot), *value))
            })
    }

    pub fn tiles_mut(&mut self) -> impl Iterator<Item = &mut T> + '_ {
        self.roots
            .values_mut()
            .flat_map(|upper| upper.children.values_mut())
            .flat_map(|lower| lower.tiles.values_mut())
    }

    pub fn leaf_count(&self) -> usize {
        self.roots
            .values()
            .flat_map(|upper| upper.children.values())
            .map(|lower| lower.leaves.len())
            .sum()
    }

    /// Root plus every internal node.
    pub fn non_leaf_count(&self) -> usize {
        1 + self
            .roots
            .values()
            .map(|upper| 1 + upper.children.len())
            .sum::<usize>()
    }

    pub fn active_voxel_count(&self) -> u64 {
        self.leaves().map(|leaf| leaf.active_count() as u64).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_tree_reports_background() {
        let tree = Tree::new(1.5f32);
        assert_eq!(tree.get_value(Coord::new(100, -4, 9)), 1.5);
        assert_eq!(tree.leaf_count(), 0);
        assert_eq!(tree.non_leaf_count(), 1);
    }

    #[test]
    fn touch_leaf_builds_internal_nodes() {
        let mut tree = Tree::new(0.0f32);
        tree.touch_leaf(Coord::new(1, 2, 3))
            .set_value_on(Coord::new(1, 2, 3), 4.0);
        tree.touch_leaf(Coord::new(9, 2, 3))
            .set_value_on(Coord::new(9, 2, 3), 5.0);
        tree.touch_leaf(Coord::new(-1, 2, 3))
            .set_value_on(Coord::new(-1, 2, 3), 6.0);

        assert_eq!(tree.leaf_count(), 3);
        // root + two upper nodes (x >= 0 and x < 0) each with one lower node
        assert_eq!(tree.non_leaf_count(), 5);
        assert_eq!(tree.active_voxel_count(), 3);
        assert_eq!(tree.get_value(Coord::new(9, 2, 3)), 5.0);
        assert!(tree.is_value_on(Coord::new(-1, 2, 3)));
    }

    #[test]
    fn leaves_come_out_in_root_key_order() {
        let mut tree = Tree::new(0.0f32);
        for c in [Coord::new(8, 0, 0), Coord::new(-8, 0, 0), Coord::new(0, 0, 8)] {
            tree.touch_leaf(c).set_value_on(c, 1.0);
        }
        let origins: Vec<Coord> = tree.leaves().map(|leaf| leaf.origin()).collect();
        assert_eq!(
            origins,
            vec![Coord::new(-8, 0, 0), Coord::new(0, 0, 8), Coord::new(8, 0, 0)]
        );
    }

    #[test]
    fn tiles_fill_a_leaf_slot() {
        let mut tree = Tree::new(3.0f32);
        tree.set_tile(Coord::new(17, 17, 17), -3.0);
        assert_eq!(tree.get_value(Coord::new(16, 23, 20)), -3.0);
        assert_eq!(tree.get_value(Coord::new(24, 16, 16)), 3.0);
        let tiles: Vec<_> = tree.tiles().collect();
        assert_eq!(tiles, vec![(Coord::new(16, 16, 16), -3.0)]);

        let leaf = tree.touch_leaf(Coord::new(16, 16, 16));
        assert_eq!(leaf.get_value(Coord::new(20, 20, 20)), -3.0);
        assert!(tree.tile_value(Coord::new(16, 16, 16)).is_none());
    }

    #[test]
    fn remove_leaf_prunes_empty_nodes() {
        let mut tree = Tree::new(0.0f32);
        tree.touch_leaf(Coord::new(500, 0, 0));
        assert_eq!(tree.non_leaf_count(), 3);
        assert!(tree.remove_leaf(Coord::new(500, 0, 0)).is_some());
        assert_eq!(tree.non_leaf_count(), 1);
        assert_eq!(tree.leaf_count(), 0);
    }
}
