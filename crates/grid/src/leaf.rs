//! Fixed-size 8×8×8 voxel blocks, the bottom level of the tree.

use crate::coord::{Coord, CoordBBox};
use crate::value::GridValue;

pub const LEAF_LOG2DIM: u32 = 3;
pub const LEAF_DIM: usize = 1 << LEAF_LOG2DIM;
pub const LEAF_SIZE: usize = LEAF_DIM * LEAF_DIM * LEAF_DIM;

const MASK_WORDS: usize = LEAF_SIZE / 64;

/// One activity bit per voxel of a leaf.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValueMask {
    words: [u64; MASK_WORDS],
}

impl ValueMask {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all_on() -> Self {
        Self {
            words: [u64::MAX; MASK_WORDS],
        }
    }

    pub fn from_words(words: [u64; MASK_WORDS]) -> Self {
        Self { words }
    }

    pub fn words(&self) -> &[u64; MASK_WORDS] {
        &self.words
    }

    #[inline]
    pub fn is_on(&self, n: usize) -> bool {
        self.words[n >> 6] & (1u64 << (n & 63)) != 0
    }

    #[inline]
    pub fn set(&mut self, n: usize, on: bool) {
        let bit = 1u64 << (n & 63);
        if on {
            self.words[n >> 6] |= bit;
        } else {
            self.words[n >> 6] &= !bit;
        }
    }

    pub fn count_on(&self) -> u32 {
        self.words.iter().map(|w| w.count_ones()).sum()
    }

    pub fn is_off(&self) -> bool {
        self.words.iter().all(|w| *w == 0)
    }

    pub fn iter_on(&self) -> impl Iterator<Item = usize> + '_ {
        (0..LEAF_SIZE).filter(move |&n| self.is_on(n))
    }
}

/// Linear offset of a voxel inside its leaf: x-major, z varies fastest.
#[inline]
pub fn leaf_offset(c: Coord) -> usize {
    let m = LEAF_DIM as i32 - 1;
    (((c.x & m) as usize) << (2 * LEAF_LOG2DIM))
        | (((c.y & m) as usize) << LEAF_LOG2DIM)
        | ((c.z & m) as usize)
}

#[inline]
pub fn leaf_offset_to_local(n: usize) -> Coord {
    let m = LEAF_DIM - 1;
    Coord::new(
        (n >> (2 * LEAF_LOG2DIM)) as i32,
        ((n >> LEAF_LOG2DIM) & m) as i32,
        (n & m) as i32,
    )
}

#[derive(Debug, Clone, PartialEq)]
pub struct LeafNode<T: GridValue> {
    origin: Coord,
    values: Box<[T; LEAF_SIZE]>,
    mask: ValueMask,
}

impl<T: GridValue> LeafNode<T> {
    /// New leaf with every voxel inactive and set to `fill`. `origin` is
    /// snapped to the enclosing leaf boundary.
    pub fn new(origin: Coord, fill: T) -> Self {
        Self {
            origin: origin.align_down(LEAF_LOG2DIM),
            values: Box::new([fill; LEAF_SIZE]),
            mask: ValueMask::new(),
        }
    }

    pub fn from_buffer(origin: Coord, values: &[T; LEAF_SIZE], mask: ValueMask) -> Self {
        Self {
            origin: origin.align_down(LEAF_LOG2DIM),
            values: Box::new(*values),
            mask,
        }
    }

    pub fn origin(&self) -> Coord {
        self.origin
    }

    pub fn bbox(&self) -> CoordBBox {
        CoordBBox::from_min_dim(self.origin, LEAF_DIM as i32)
    }

    pub fn buffer(&self) -> &[T; LEAF_SIZE] {
        &self.values
    }

    pub fn buffer_mut(&mut self) -> &mut [T; LEAF_SIZE] {
        &mut self.values
    }

    pub fn value_mask(&self) -> &ValueMask {
        &self.mask
    }

    pub fn offset_to_global(&self, n: usize) -> Coord {
        self.origin + leaf_offset_to_local(n)
    }

    pub fn get_value(&self, c: Coord) -> T {
        self.values[leaf_offset(c)]
    }

    pub fn is_value_on(&self, c: Coord) -> bool {
        self.mask.is_on(leaf_offset(c))
    }

    pub fn set_value_on(&mut self, c: Coord, value: T) {
        self.set_value_at(leaf_offset(c), value, true);
    }

    pub fn set_value_off(&mut self, c: Coord, value: T) {
        self.set_value_at(leaf_offset(c), value, false);
    }

    pub fn set_active_state(&mut self, c: Coord, on: bool) {
        self.mask.set(leaf_offset(c), on);
    }

    #[inline]
    pub fn set_value_at(&mut self, n: usize, value: T, on: bool) {
        self.values[n] = value;
        self.mask.set(n, on);
    }

    pub fn active_count(&self) -> u32 {
        self.mask.count_on()
    }

    pub fn has_active(&self) -> bool {
        !self.mask.is_off()
    }

    /// True when no voxel is active and every value equals `value`.
    pub fn is_inactive_constant(&self, value: T) -> bool {
        self.mask.is_off() && self.values.iter().all(|v| *v == value)
    }

    pub fn iter_on(&self) -> impl Iterator<Item = (Coord, T)> + '_ {
        self.mask
            .iter_on()
            .map(move |n| (self.offset_to_global(n), self.values[n]))
    }

    pub fn active_bbox(&self) -> Option<CoordBBox> {
        let mut iter = self.mask.iter_on().map(|n| self.offset_to_global(n));
        let first = iter.next()?;
        let mut bbox = CoordBBox::from_point(first);
        for c in iter {
            bbox.expand(c);
        }
        Some(bbox)
    }

    /// Rewrites inactive voxels holding `from` to `to`.
    pub fn replace_inactive(&mut self, from: T, to: T) {
        for n in 0..LEAF_SIZE {
            if !self.mask.is_on(n) && self.values[n] == from {
                self.values[n] = to;
            }
        }
    }
}
