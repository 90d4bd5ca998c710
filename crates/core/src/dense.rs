//! Sparse → dense extraction of a grid's active region.

use std::sync::atomic::{AtomicUsize, Ordering};

use glam::DVec3;
use tracing::debug;
use voxleaf_grid::tools::{copy_from_dense, copy_to_dense};
use voxleaf_grid::{AnyGrid, Coord, FloatGrid};

use crate::error::GridError;
use crate::parallel;

/// Owned 3-D array in C order: `values[(i * ny + j) * nz + k]`.
#[derive(Debug, Clone, PartialEq)]
pub struct DenseVolume {
    shape: [usize; 3],
    values: Vec<f32>,
}

impl DenseVolume {
    pub fn zeros(shape: [usize; 3]) -> Self {
        Self {
            shape,
            values: vec![0.0; shape[0] * shape[1] * shape[2]],
        }
    }

    /// `None` when `values` does not hold exactly one value per element.
    pub fn from_values(shape: [usize; 3], values: Vec<f32>) -> Option<Self> {
        (values.len() == shape[0] * shape[1] * shape[2]).then_some(Self { shape, values })
    }

    pub fn shape(&self) -> [usize; 3] {
        self.shape
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn values_mut(&mut self) -> &mut [f32] {
        &mut self.values
    }

    pub fn into_values(self) -> Vec<f32> {
        self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn value_index(&self, i: usize, j: usize, k: usize) -> usize {
        (i * self.shape[1] + j) * self.shape[2] + k
    }

    pub fn get(&self, i: usize, j: usize, k: usize) -> Option<f32> {
        if i >= self.shape[0] || j >= self.shape[1] || k >= self.shape[2] {
            return None;
        }
        Some(self.values[self.value_index(i, j, k)])
    }

    pub fn min_max(&self) -> Option<(f32, f32)> {
        self.values.iter().fold(None, |acc, &v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DenseExtraction {
    pub volume: DenseVolume,
    /// World-space position of `volume[0, 0, 0]`.
    pub origin: DVec3,
    /// Index-space coordinate of `volume[0, 0, 0]`.
    pub start: Coord,
}

impl DenseExtraction {
    pub fn into_parts(self) -> (DenseVolume, DVec3) {
        (self.volume, self.origin)
    }
}

/// Copies the active-voxel bounding box of `grid` into a dense array.
///
/// Inactive voxels inside the box carry whatever the grid stores for them,
/// except that any value below the minimum active value is reset to the
/// background. Level sets keep `-background` in interior inactive voxels and
/// tiles, and those must not leak into the dense copy. A grid without active
/// voxels yields an empty volume located at the index origin.
pub fn extract_dense(grid: &FloatGrid) -> DenseExtraction {
    let (Some(bbox), Some((min_active, _))) =
        (grid.eval_active_voxel_bounding_box(), grid.eval_min_max())
    else {
        debug!("dense extraction: grid '{}' has no active voxels", grid.name());
        return DenseExtraction {
            volume: DenseVolume::zeros([0; 3]),
            origin: grid.transform().index_to_world(Coord::ZERO),
            start: Coord::ZERO,
        };
    };

    let [nx, ny, nz] = bbox.dim();
    let mut volume = DenseVolume::zeros([nx as usize, ny as usize, nz as usize]);
    let copied = copy_to_dense(grid, &bbox, volume.values_mut());
    debug_assert!(copied.is_ok(), "dense volume is sized from the bounding box");

    let background = grid.background();
    let corrected = AtomicUsize::new(0);
    parallel::for_each_indexed_mut(volume.values_mut(), |_, value| {
        if *value < min_active {
            *value = background;
            corrected.fetch_add(1, Ordering::Relaxed);
        }
    });

    debug!(
        "dense extraction: shape {:?} from {:?}, {} value(s) below min {} reset to background",
        volume.shape(),
        bbox.min.to_array(),
        corrected.load(Ordering::Relaxed),
        min_active
    );

    DenseExtraction {
        volume,
        origin: grid.transform().index_to_world(bbox.min),
        start: bbox.min,
    }
}

pub fn extract_dense_any(grid: &AnyGrid) -> Result<DenseExtraction, GridError> {
    match grid {
        AnyGrid::Float(grid) => Ok(extract_dense(grid)),
        other => Err(GridError::UnsupportedType {
            found: other.value_type(),
        }),
    }
}

/// Extracts independent grids concurrently; results follow input order.
pub fn extract_dense_batch(grids: &[FloatGrid]) -> Vec<DenseExtraction> {
    parallel::map(grids, grids.len() > 1, extract_dense)
}

/// Writes `volume` back into `grid` with its `[0, 0, 0]` element at the
/// world-space `origin`. Elements equal to the background become inactive.
pub fn insert_dense(grid: &mut FloatGrid, volume: &DenseVolume, origin: DVec3) {
    let start = grid.transform().world_to_index_nearest(origin);
    let copied = copy_from_dense(grid, start, volume.shape(), volume.values(), 0.0);
    debug_assert!(copied.is_ok(), "dense volume length matches its shape");
}
