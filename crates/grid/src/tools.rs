//! Dense copies and level-set construction over [`Grid`]s.

use std::fmt;

use glam::DVec3;

use crate::coord::{Coord, CoordBBox};
use crate::grid::{FloatGrid, Grid, GridClass};
use crate::leaf::{LeafNode, LEAF_DIM, LEAF_LOG2DIM};
use crate::transform::Transform;
use crate::value::GridValue;

/// Default narrow-band half width, in voxels.
pub const LEVEL_SET_HALF_WIDTH: f64 = 3.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DenseShapeMismatch {
    pub expected: usize,
    pub actual: usize,
}

impl fmt::Display for DenseShapeMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "dense buffer holds {} values, region needs {}",
            self.actual, self.expected
        )
    }
}

impl std::error::Error for DenseShapeMismatch {}

/// C-order indexing into a dense copy of a bounding box.
#[derive(Clone, Copy)]
struct DenseLayout {
    min: Coord,
    ny: usize,
    nz: usize,
}

impl DenseLayout {
    fn new(bbox: &CoordBBox) -> Self {
        let [_, ny, nz] = bbox.dim();
        Self {
            min: bbox.min,
            ny: ny as usize,
            nz: nz as usize,
        }
    }

    #[inline]
    fn index(&self, c: Coord) -> usize {
        let i = (c.x - self.min.x) as usize;
        let j = (c.y - self.min.y) as usize;
        let k = (c.z - self.min.z) as usize;
        (i * self.ny + j) * self.nz + k
    }
}

/// Leaf-aligned blocks overlapping `bbox`, clipped to it.
fn for_each_block(bbox: &CoordBBox, mut f: impl FnMut(Coord, CoordBBox)) {
    let start = bbox.min.align_down(LEAF_LOG2DIM);
    let step = LEAF_DIM;
    for x in (start.x..=bbox.max.x).step_by(step) {
        for y in (start.y..=bbox.max.y).step_by(step) {
            for z in (start.z..=bbox.max.z).step_by(step) {
                let origin = Coord::new(x, y, z);
                let block = CoordBBox::from_min_dim(origin, LEAF_DIM as i32);
                if let Some(clipped) = block.intersection(bbox) {
                    f(origin, clipped);
                }
            }
        }
    }
}

/// Writes the value of every voxel in `bbox` into `out` (x-major, z fastest).
/// Inactive voxels contribute whatever the grid stores for them.
pub fn copy_to_dense<T: GridValue>(
    grid: &Grid<T>,
    bbox: &CoordBBox,
    out: &mut [T],
) -> Result<(), DenseShapeMismatch> {
    let expected = bbox.volume() as usize;
    if out.len() != expected {
        return Err(DenseShapeMismatch {
            expected,
            actual: out.len(),
        });
    }
    let tree = grid.tree();
    let layout = DenseLayout::new(bbox);
    for_each_block(bbox, |origin, clipped| match tree.probe_leaf(origin) {
        Some(leaf) => clipped.for_each(|c| out[layout.index(c)] = leaf.get_value(c)),
        None => {
            let fill = tree.get_value(origin);
            clipped.for_each(|c| out[layout.index(c)] = fill);
        }
    });
    Ok(())
}

/// Writes a dense block whose `[0, 0, 0]` element lands at `origin`. Values
/// within `tolerance` of the background become inactive background voxels;
/// everything else becomes active. Leaves that would only hold their fill
/// value are not created.
pub fn copy_from_dense(
    grid: &mut FloatGrid,
    origin: Coord,
    shape: [usize; 3],
    values: &[f32],
    tolerance: f32,
) -> Result<(), DenseShapeMismatch> {
    let expected = shape[0] * shape[1] * shape[2];
    if values.len() != expected {
        return Err(DenseShapeMismatch {
            expected,
            actual: values.len(),
        });
    }
    if expected == 0 {
        return Ok(());
    }
    let bbox = CoordBBox::new(
        origin,
        origin + Coord::new(shape[0] as i32 - 1, shape[1] as i32 - 1, shape[2] as i32 - 1),
    );
    let background = grid.background();
    let layout = DenseLayout::new(&bbox);
    let write = |leaf: &mut LeafNode<f32>, clipped: &CoordBBox| {
        clipped.for_each(|c| {
            let value = values[layout.index(c)];
            if (value - background).abs() <= tolerance {
                leaf.set_value_off(c, background);
            } else {
                leaf.set_value_on(c, value);
            }
        });
    };

    let tree = grid.tree_mut();
    for_each_block(&bbox, |block_origin, clipped| {
        if let Some(leaf) = tree.probe_leaf_mut(block_origin) {
            write(leaf, &clipped);
            return;
        }
        let fill = tree.get_value(block_origin);
        let mut leaf = LeafNode::new(block_origin, fill);
        write(&mut leaf, &clipped);
        if !leaf.is_inactive_constant(fill) {
            tree.insert_leaf(leaf);
        }
    });
    Ok(())
}

/// Narrow-band signed distance field of a sphere.
///
/// The background is `half_width * voxel_size`. Voxels with `|d| < background`
/// are active; inactive voxels of band leaves are saturated to `±background`
/// and interior leaf-sized regions without band voxels become `-background`
/// tiles.
pub fn level_set_sphere(radius: f64, center: DVec3, voxel_size: f64, half_width: f64) -> FloatGrid {
    let transform = Transform::linear(voxel_size);
    let band = half_width.max(1.0) * transform.voxel_size();
    let background = band as f32;
    let mut grid = FloatGrid::new(background)
        .with_transform(transform)
        .with_grid_class(GridClass::LevelSet)
        .with_name("sphere");

    let distance = |c: Coord| (transform.index_to_world(c) - center).length() - radius;
    let reach = DVec3::splat(radius.abs() + band);
    let lo = transform.world_to_index(center - reach).floor();
    let hi = transform.world_to_index(center + reach).ceil();
    let bbox = CoordBBox::new(
        Coord::new(lo.x as i32, lo.y as i32, lo.z as i32),
        Coord::new(hi.x as i32, hi.y as i32, hi.z as i32),
    );

    bbox.for_each(|c| {
        let d = distance(c) as f32;
        if d.abs() < background {
            grid.set_value_on(c, d);
        }
    });

    for leaf in grid.tree_mut().leaves_mut() {
        for n in 0..crate::leaf::LEAF_SIZE {
            if leaf.value_mask().is_on(n) {
                continue;
            }
            let value = if distance(leaf.offset_to_global(n)) < 0.0 {
                -background
            } else {
                background
            };
            leaf.set_value_at(n, value, false);
        }
    }

    let half = (LEAF_DIM as i32) / 2;
    for_each_block(&bbox, |origin, _| {
        if grid.probe_leaf(origin).is_some() {
            return;
        }
        if distance(origin + Coord::splat(half)) < 0.0 {
            grid.set_tile(origin, -background);
        }
    });

    grid
}
