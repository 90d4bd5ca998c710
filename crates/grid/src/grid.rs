use std::fmt;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::coord::{Coord, CoordBBox};
use crate::leaf::LeafNode;
use crate::transform::Transform;
use crate::tree::Tree;
use crate::value::{GridValue, GridValueType};

/// Semantic classification of a grid's contents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GridClass {
    #[default]
    Unknown,
    LevelSet,
    FogVolume,
    Staggered,
}

impl GridClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            GridClass::Unknown => "unknown",
            GridClass::LevelSet => "level set",
            GridClass::FogVolume => "fog volume",
            GridClass::Staggered => "staggered",
        }
    }
}

impl fmt::Display for GridClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sparse grid: a tree of voxel values plus the metadata needed to place it
/// in world space. `Clone` produces an independent deep copy.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid<T: GridValue> {
    name: String,
    tree: Tree<T>,
    transform: Transform,
    grid_class: GridClass,
}

pub type FloatGrid = Grid<f32>;
pub type BoolGrid = Grid<bool>;
pub type Vec3Grid = Grid<Vec3>;

impl<T: GridValue> Default for Grid<T> {
    fn default() -> Self {
        Self::new(T::zero())
    }
}

impl<T: GridValue> Grid<T> {
    pub fn new(background: T) -> Self {
        Self {
            name: String::new(),
            tree: Tree::new(background),
            transform: Transform::default(),
            grid_class: GridClass::Unknown,
        }
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    pub fn with_grid_class(mut self, grid_class: GridClass) -> Self {
        self.grid_class = grid_class;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn value_type(&self) -> GridValueType {
        T::VALUE_TYPE
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn background(&self) -> T {
        self.tree.background()
    }

    /// Sets the background without rewriting stored inactive values; see
    /// [`Grid::change_background`] for that.
    pub fn set_background(&mut self, background: T) {
        self.tree.set_background(background);
    }

    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    pub fn set_transform(&mut self, transform: Transform) {
        self.transform = transform;
    }

    pub fn voxel_size(&self) -> f64 {
        self.transform.voxel_size()
    }

    pub fn grid_class(&self) -> GridClass {
        self.grid_class
    }

    pub fn set_grid_class(&mut self, grid_class: GridClass) {
        self.grid_class = grid_class;
    }

    pub fn tree(&self) -> &Tree<T> {
        &self.tree
    }

    pub fn tree_mut(&mut self) -> &mut Tree<T> {
        &mut self.tree
    }

    pub fn get_value(&self, c: Coord) -> T {
        self.tree.get_value(c)
    }

    pub fn is_value_on(&self, c: Coord) -> bool {
        self.tree.is_value_on(c)
    }

    pub fn set_value_on(&mut self, c: Coord, value: T) {
        self.tree.touch_leaf(c).set_value_on(c, value);
    }

    /// Stores `value` at `c` and marks the voxel inactive.
    pub fn set_value_off(&mut self, c: Coord, value: T) {
        self.tree.touch_leaf(c).set_value_off(c, value);
    }

    pub fn set_active_state(&mut self, c: Coord, on: bool) {
        if on {
            self.tree.touch_leaf(c).set_active_state(c, true);
        } else if let Some(leaf) = self.tree.probe_leaf_mut(c) {
            leaf.set_active_state(c, false);
        }
    }

    pub fn set_tile(&mut self, c: Coord, value: T) {
        self.tree.set_tile(c, value);
    }

    pub fn probe_leaf(&self, c: Coord) -> Option<&LeafNode<T>> {
        self.tree.probe_leaf(c)
    }

    pub fn insert_leaf(&mut self, leaf: LeafNode<T>) {
        self.tree.insert_leaf(leaf);
    }

    pub fn leaves(&self) -> impl Iterator<Item = &LeafNode<T>> + '_ {
        self.tree.leaves()
    }

    pub fn leaf_count(&self) -> usize {
        self.tree.leaf_count()
    }

    pub fn non_leaf_count(&self) -> usize {
        self.tree.non_leaf_count()
    }

    pub fn active_voxel_count(&self) -> u64 {
        self.tree.active_voxel_count()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.leaf_count() == 0
    }

    /// Bounding box of all active voxels, `None` when nothing is active.
    pub fn eval_active_voxel_bounding_box(&self) -> Option<CoordBBox> {
        self.tree
            .leaves()
            .filter_map(LeafNode::active_bbox)
            .reduce(|a, b| a.union(&b))
    }

    pub fn eval_active_voxel_dim(&self) -> [u32; 3] {
        self.eval_active_voxel_bounding_box()
            .map(|bbox| bbox.dim())
            .unwrap_or([0; 3])
    }

    /// Bounding box covering every leaf node, active or not.
    pub fn eval_leaf_bounding_box(&self) -> Option<CoordBBox> {
        self.tree
            .leaves()
            .map(LeafNode::bbox)
            .reduce(|a, b| a.union(&b))
    }

    pub fn eval_leaf_dim(&self) -> [u32; 3] {
        self.eval_leaf_bounding_box()
            .map(|bbox| bbox.dim())
            .unwrap_or([0; 3])
    }

    /// Changes the background, rewriting inactive leaf values and tiles that
    /// held the old background.
    pub fn change_background(&mut self, background: T) {
        let old = self.tree.background();
        for leaf in self.tree.leaves_mut() {
            leaf.replace_inactive(old, background);
        }
        for tile in self.tree.tiles_mut() {
            if *tile == old {
                *tile = background;
            }
        }
        self.tree.set_background(background);
    }

    pub fn clear(&mut self) {
        self.tree.clear();
    }
}

impl FloatGrid {
    /// Minimum and maximum over active voxel values.
    pub fn eval_min_max(&self) -> Option<(f32, f32)> {
        self.tree
            .leaves()
            .flat_map(|leaf| leaf.iter_on().map(|(_, v)| v))
            .fold(None, |acc, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }
}

/// A grid of any supported value type. Consumers that only handle scalar
/// fields match on [`AnyGrid::Float`].
#[derive(Debug, Clone, PartialEq)]
pub enum AnyGrid {
    Float(FloatGrid),
    Bool(BoolGrid),
    Vec3(Vec3Grid),
}

impl AnyGrid {
    pub fn value_type(&self) -> GridValueType {
        match self {
            AnyGrid::Float(_) => GridValueType::Float,
            AnyGrid::Bool(_) => GridValueType::Bool,
            AnyGrid::Vec3(_) => GridValueType::Vec3,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            AnyGrid::Float(grid) => grid.name(),
            AnyGrid::Bool(grid) => grid.name(),
            AnyGrid::Vec3(grid) => grid.name(),
        }
    }

    pub fn grid_class(&self) -> GridClass {
        match self {
            AnyGrid::Float(grid) => grid.grid_class(),
            AnyGrid::Bool(grid) => grid.grid_class(),
            AnyGrid::Vec3(grid) => grid.grid_class(),
        }
    }

    pub fn transform(&self) -> &Transform {
        match self {
            AnyGrid::Float(grid) => grid.transform(),
            AnyGrid::Bool(grid) => grid.transform(),
            AnyGrid::Vec3(grid) => grid.transform(),
        }
    }

    pub fn leaf_count(&self) -> usize {
        match self {
            AnyGrid::Float(grid) => grid.leaf_count(),
            AnyGrid::Bool(grid) => grid.leaf_count(),
            AnyGrid::Vec3(grid) => grid.leaf_count(),
        }
    }

    pub fn active_voxel_count(&self) -> u64 {
        match self {
            AnyGrid::Float(grid) => grid.active_voxel_count(),
            AnyGrid::Bool(grid) => grid.active_voxel_count(),
            AnyGrid::Vec3(grid) => grid.active_voxel_count(),
        }
    }

    pub fn as_float(&self) -> Option<&FloatGrid> {
        match self {
            AnyGrid::Float(grid) => Some(grid),
            _ => None,
        }
    }

    pub fn into_float(self) -> Result<FloatGrid, AnyGrid> {
        match self {
            AnyGrid::Float(grid) => Ok(grid),
            other => Err(other),
        }
    }
}

impl From<FloatGrid> for AnyGrid {
    fn from(grid: FloatGrid) -> Self {
        AnyGrid::Float(grid)
    }
}

impl From<BoolGrid> for AnyGrid {
    fn from(grid: BoolGrid) -> Self {
        AnyGrid::Bool(grid)
    }
}

impl From<Vec3Grid> for AnyGrid {
    fn from(grid: Vec3Grid) -> Self {
        AnyGrid::Vec3(grid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_grid_metadata() {
        let grid = FloatGrid::default();
        assert_eq!(grid.background(), 0.0);
        assert_eq!(grid.eval_active_voxel_dim(), [0, 0, 0]);
        assert!(grid.eval_active_voxel_bounding_box().is_none());
        assert!(grid.eval_min_max().is_none());
        assert_eq!(grid.non_leaf_count(), 1);
    }

    #[test]
    fn bounding_boxes_track_active_and_leaf_extent() {
        let mut grid = FloatGrid::new(2.0);
        grid.set_value_on(Coord::new(1, 2, 3), -1.0);
        grid.set_value_on(Coord::new(10, -2, 3), 1.5);
        grid.set_value_off(Coord::new(30, 30, 30), -7.0);

        let active = grid.eval_active_voxel_bounding_box().expect("active bbox");
        assert_eq!(active.min, Coord::new(1, -2, 3));
        assert_eq!(active.max, Coord::new(10, 2, 3));
        assert_eq!(grid.eval_active_voxel_dim(), [10, 5, 1]);

        let leaves = grid.eval_leaf_bounding_box().expect("leaf bbox");
        assert_eq!(leaves.min, Coord::new(0, -8, 0));
        assert_eq!(leaves.max, Coord::new(31, 31, 31));
        assert_eq!(grid.eval_min_max(), Some((-1.0, 1.5)));
    }

    #[test]
    fn set_active_state_off_does_not_allocate() {
        let mut grid = FloatGrid::new(1.0);
        grid.set_active_state(Coord::new(4, 4, 4), false);
        assert_eq!(grid.leaf_count(), 0);
        grid.set_active_state(Coord::new(4, 4, 4), true);
        assert_eq!(grid.active_voxel_count(), 1);
        assert_eq!(grid.get_value(Coord::new(4, 4, 4)), 1.0);
    }

    #[test]
    fn change_background_rewrites_inactive_values() {
        let mut grid = FloatGrid::new(3.0);
        grid.set_value_on(Coord::new(0, 0, 0), 3.0);
        grid.set_tile(Coord::new(64, 0, 0), 3.0);
        grid.change_background(1.0);
        assert_eq!(grid.get_value(Coord::new(0, 0, 0)), 3.0);
        assert_eq!(grid.get_value(Coord::new(0, 0, 1)), 1.0);
        assert_eq!(grid.get_value(Coord::new(64, 0, 0)), 1.0);
        assert_eq!(grid.get_value(Coord::new(-500, 0, 0)), 1.0);
    }

    #[test]
    fn any_grid_reports_value_type() {
        let grid: AnyGrid = BoolGrid::new(false).into();
        assert_eq!(grid.value_type(), GridValueType::Bool);
        assert!(grid.as_float().is_none());
        assert!(grid.into_float().is_err());
    }
}
