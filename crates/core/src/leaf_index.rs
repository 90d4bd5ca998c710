//! Flattened, array-backed view of a grid's 8×8×8 leaf blocks.
//!
//! The index owns a private deep copy of its source grid. Coordinates and
//! buffers are materialized once at construction and form a frozen
//! snapshot: later changes to the caller's grid are not observed, and
//! nothing handed out by the index aliases its cache.

use tracing::debug;
use voxleaf_grid::{
    AnyGrid, Coord, FloatGrid, GridClass, LeafNode, Transform, ValueMask, LEAF_DIM, LEAF_SIZE,
};

use crate::error::GridError;
use crate::options::LeafIndexOptions;
use crate::parallel;

pub const LEAF_SHAPE: [usize; 3] = [LEAF_DIM; 3];

/// One leaf: its index-space origin and its values in x-major order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LeafBlock<'a> {
    pub origin: [i32; 3],
    pub buffer: &'a [f32; LEAF_SIZE],
}

impl LeafBlock<'_> {
    /// Value at local position `(i, j, k)`, each in `0..8`.
    pub fn value(&self, i: usize, j: usize, k: usize) -> f32 {
        self.buffer[(i * LEAF_DIM + j) * LEAF_DIM + k]
    }
}

/// Owned copies of the stacked leaf arrays.
#[derive(Debug, Clone, PartialEq)]
pub struct LeafArrays {
    pub coords: Vec<[i32; 3]>,
    pub buffers: Vec<[f32; LEAF_SIZE]>,
}

impl LeafArrays {
    pub fn len(&self) -> usize {
        self.coords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coords.is_empty()
    }

    /// `[leaf_count, 8, 8, 8]`
    pub fn shape(&self) -> [usize; 4] {
        [self.buffers.len(), LEAF_DIM, LEAF_DIM, LEAF_DIM]
    }

    /// All buffers as one contiguous slice of `leaf_count * 512` values.
    pub fn flat_buffers(&self) -> &[f32] {
        self.buffers.as_flattened()
    }
}

#[derive(Debug, Clone)]
pub struct LeafNodeIndex {
    grid: FloatGrid,
    voxel_size: f64,
    background: f32,
    transform: Transform,
    grid_class: GridClass,
    normalized: bool,
    coords: Vec<[i32; 3]>,
    buffers: Vec<[f32; LEAF_SIZE]>,
    masks: Vec<ValueMask>,
    tiles: Vec<(Coord, f32)>,
}

impl LeafNodeIndex {
    /// Snapshots every leaf of `grid`.
    ///
    /// With `options.normalize` every cached value is divided by the
    /// background; a zero background is rejected with
    /// [`GridError::ZeroBackground`] and a NaN or infinite one with
    /// [`GridError::NonFiniteBackground`].
    pub fn new(grid: &FloatGrid, options: LeafIndexOptions) -> Result<Self, GridError> {
        let background = grid.background();
        if options.normalize {
            check_divisor(background)?;
        }

        let grid = grid.clone();
        let leaf_count = grid.leaf_count();
        let mut coords = Vec::with_capacity(leaf_count);
        let mut buffers = Vec::with_capacity(leaf_count);
        let mut masks = Vec::with_capacity(leaf_count);
        for leaf in grid.leaves() {
            coords.push(leaf.origin().to_array());
            buffers.push(*leaf.buffer());
            masks.push(*leaf.value_mask());
        }
        let tiles: Vec<(Coord, f32)> = grid.tree().tiles().collect();

        if options.normalize {
            parallel::for_each_indexed_mut(&mut buffers, |_, buffer| {
                for value in buffer.iter_mut() {
                    *value /= background;
                }
            });
        }

        debug!(
            "leaf index: {} leaves and {} tiles from grid '{}' (normalized: {})",
            coords.len(),
            tiles.len(),
            grid.name(),
            options.normalize
        );

        Ok(Self {
            voxel_size: grid.voxel_size(),
            background,
            transform: *grid.transform(),
            grid_class: grid.grid_class(),
            normalized: options.normalize,
            grid,
            coords,
            buffers,
            masks,
            tiles,
        })
    }

    pub fn from_any(grid: &AnyGrid, options: LeafIndexOptions) -> Result<Self, GridError> {
        match grid {
            AnyGrid::Float(grid) => Self::new(grid, options),
            other => Err(GridError::UnsupportedType {
                found: other.value_type(),
            }),
        }
    }

    pub fn len(&self) -> usize {
        self.coords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coords.is_empty()
    }

    pub fn get(&self, index: usize) -> Result<LeafBlock<'_>, GridError> {
        if index >= self.len() {
            return Err(GridError::OutOfRange {
                index,
                len: self.len(),
            });
        }
        Ok(LeafBlock {
            origin: self.coords[index],
            buffer: &self.buffers[index],
        })
    }

    /// Leaves in the source tree's hierarchical order (upper node, lower
    /// node, then leaf), which is not a plain lexicographic sort.
    pub fn iter(&self) -> impl Iterator<Item = LeafBlock<'_>> + '_ {
        self.coords
            .iter()
            .zip(&self.buffers)
            .map(|(origin, buffer)| LeafBlock {
                origin: *origin,
                buffer,
            })
    }

    pub fn to_array(&self) -> LeafArrays {
        LeafArrays {
            coords: self.coords.clone(),
            buffers: self.buffers.clone(),
        }
    }

    /// Rebuilds a sparse grid from the cached leaves and inactive tiles with
    /// the recorded background, transform and class. Normalized buffers are
    /// scaled back to world units; tiles are kept in world units throughout.
    pub fn to_grid(&self) -> FloatGrid {
        let mut grid = FloatGrid::new(self.background)
            .with_name(self.grid.name())
            .with_transform(self.transform)
            .with_grid_class(self.grid_class);

        for ((origin, buffer), mask) in self.coords.iter().zip(&self.buffers).zip(&self.masks) {
            let origin = Coord::from(*origin);
            let leaf = if self.normalized {
                let mut scaled = *buffer;
                for value in scaled.iter_mut() {
                    *value *= self.background;
                }
                LeafNode::from_buffer(origin, &scaled, *mask)
            } else {
                LeafNode::from_buffer(origin, buffer, *mask)
            };
            grid.insert_leaf(leaf);
        }
        for (origin, value) in &self.tiles {
            grid.set_tile(*origin, *value);
        }
        grid
    }

    pub fn leaf_shape(&self) -> [usize; 3] {
        LEAF_SHAPE
    }

    /// The background read as the signed-distance truncation distance.
    pub fn background_as_truncation(&self) -> f32 {
        self.background
    }

    pub fn voxel_size(&self) -> f64 {
        self.voxel_size
    }

    pub fn background(&self) -> f32 {
        self.background
    }

    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    pub fn grid_class(&self) -> GridClass {
        self.grid_class
    }

    pub fn is_normalized(&self) -> bool {
        self.normalized
    }

    /// Read-only access to the private copy taken at construction.
    pub fn source_grid(&self) -> &FloatGrid {
        &self.grid
    }
}

/// Rejects backgrounds that cannot be divided by.
pub(crate) fn check_divisor(background: f32) -> Result<(), GridError> {
    if !background.is_finite() {
        return Err(GridError::NonFiniteBackground);
    }
    if background == 0.0 {
        return Err(GridError::ZeroBackground);
    }
    Ok(())
}

impl TryFrom<&AnyGrid> for LeafNodeIndex {
    type Error = GridError;

    fn try_from(grid: &AnyGrid) -> Result<Self, Self::Error> {
        Self::from_any(grid, LeafIndexOptions::default())
    }
}

impl<'a> IntoIterator for &'a LeafNodeIndex {
    type Item = LeafBlock<'a>;
    type IntoIter = Box<dyn Iterator<Item = LeafBlock<'a>> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.iter())
    }
}

#[cfg(test)]
mod tests;
