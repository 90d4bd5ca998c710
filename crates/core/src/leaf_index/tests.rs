use glam::{DVec3, Vec3};
use voxleaf_grid::tools::level_set_sphere;
use voxleaf_grid::{AnyGrid, BoolGrid, Coord, FloatGrid, GridClass, GridValueType, Transform, Vec3Grid};

use super::*;

fn sphere() -> FloatGrid {
    level_set_sphere(2.0, DVec3::ZERO, 0.1, 3.0)
}

fn index(grid: &FloatGrid) -> LeafNodeIndex {
    LeafNodeIndex::new(grid, LeafIndexOptions::default()).expect("float grid")
}

fn assert_equivalent(a: &FloatGrid, b: &FloatGrid) {
    assert_eq!(a.background(), b.background());
    assert_eq!(a.grid_class(), b.grid_class());
    assert_eq!(a.transform(), b.transform());
    assert_eq!(a.leaf_count(), b.leaf_count());
    assert_eq!(a.non_leaf_count(), b.non_leaf_count());
    assert_eq!(a.active_voxel_count(), b.active_voxel_count());
    assert_eq!(a.eval_leaf_bounding_box(), b.eval_leaf_bounding_box());
    assert_eq!(a.eval_leaf_dim(), b.eval_leaf_dim());
    assert_eq!(
        a.eval_active_voxel_bounding_box(),
        b.eval_active_voxel_bounding_box()
    );
    assert_eq!(a.eval_active_voxel_dim(), b.eval_active_voxel_dim());
    assert_eq!(a.eval_min_max(), b.eval_min_max());
}

#[test]
fn counts_and_shapes_match_source() {
    let grid = sphere();
    let index = index(&grid);
    assert!(!index.is_empty());
    assert_eq!(index.len(), grid.leaf_count());

    let arrays = index.to_array();
    assert_eq!(arrays.len(), grid.leaf_count());
    assert_eq!(arrays.shape(), [grid.leaf_count(), 8, 8, 8]);
    assert_eq!(arrays.flat_buffers().len(), grid.leaf_count() * LEAF_SIZE);
    assert_eq!(index.leaf_shape(), [8, 8, 8]);
}

#[test]
fn rebuilt_grid_is_equivalent() {
    let grid = sphere();
    assert_equivalent(&index(&grid).to_grid(), &grid);
}

#[test]
fn rebuilt_grid_keeps_translation() {
    let grid = level_set_sphere(1.0, DVec3::new(3.0, -1.0, 0.5), 0.05, 3.0)
        .with_transform(Transform::linear(0.05).with_translation(DVec3::new(0.5, 0.0, -2.0)));
    let rebuilt = index(&grid).to_grid();
    assert_equivalent(&rebuilt, &grid);
    assert_eq!(rebuilt.name(), grid.name());
}

fn grid_with_detached_tiles() -> FloatGrid {
    let mut grid = FloatGrid::new(1.0).with_grid_class(GridClass::LevelSet);
    grid.set_value_on(Coord::new(1, 1, 1), 0.5);
    grid.set_value_on(Coord::new(2, 1, 1), -0.5);
    // a lower node of the same upper node, and a separate upper node
    grid.set_tile(Coord::new(200, 0, 0), -1.0);
    grid.set_tile(Coord::new(5000, 0, 0), -1.0);
    grid
}

#[test]
fn tile_only_nodes_round_trip() {
    let grid = grid_with_detached_tiles();
    assert_eq!(grid.leaf_count(), 1);
    assert_eq!(grid.non_leaf_count(), 6);

    let rebuilt = index(&grid).to_grid();
    assert_equivalent(&rebuilt, &grid);
    assert_eq!(rebuilt.tree().tile_value(Coord::new(5000, 0, 0)), Some(-1.0));
    assert_eq!(rebuilt.get_value(Coord::new(203, 4, 7)), -1.0);
}

#[test]
fn normalized_index_restores_tiles_in_world_units() {
    let mut grid = grid_with_detached_tiles();
    grid.change_background(2.0);
    let index = LeafNodeIndex::new(&grid, LeafIndexOptions::normalized()).expect("finite bg");
    let rebuilt = index.to_grid();
    assert_equivalent(&rebuilt, &grid);
    assert_eq!(rebuilt.get_value(Coord::new(5000, 0, 0)), -1.0);
}

#[test]
fn large_sphere_with_interior_lower_nodes_round_trips() {
    // radius 120 voxels: the lower node at the origin lies wholly inside
    let grid = level_set_sphere(12.0, DVec3::splat(6.4), 0.1, 3.0);
    assert!(grid.tree().tile_value(Coord::new(64, 64, 64)).is_some());
    assert_equivalent(&index(&grid).to_grid(), &grid);
}

#[test]
fn leaves_across_upper_nodes_round_trip() {
    let mut grid = FloatGrid::new(0.25)
        .with_transform(Transform::linear(0.2).with_translation(DVec3::new(-3.0, 1.0, 0.0)));
    for (c, value) in [
        (Coord::new(-5000, -5000, -5000), -0.1),
        (Coord::new(5000, 5000, 5000), 0.1),
        (Coord::new(-5000, 5000, 0), 0.0),
        (Coord::new(4095, -1, 4096), 0.2),
    ] {
        grid.set_value_on(c, value);
    }
    assert_eq!(grid.leaf_count(), 4);

    let index = index(&grid);
    let origins: Vec<[i32; 3]> = index.iter().map(|block| block.origin).collect();
    assert!(origins.contains(&[-5000, -5000, -5000]));
    assert!(origins.contains(&[4088, -8, 4096]));
    assert_equivalent(&index.to_grid(), &grid);

    let normalized = LeafNodeIndex::new(&grid, LeafIndexOptions::normalized()).expect("finite bg");
    assert_equivalent(&normalized.to_grid(), &grid);
}

#[test]
fn empty_grid_round_trips() {
    let grid = FloatGrid::new(0.3).with_grid_class(GridClass::FogVolume);
    let index = index(&grid);
    assert!(index.is_empty());
    assert!(index.to_array().is_empty());
    assert_eq!(index.to_array().shape(), [0, 8, 8, 8]);
    assert_equivalent(&index.to_grid(), &grid);
    assert_eq!(index.iter().count(), 0);
}

#[test]
fn reports_voxel_size_and_truncation() {
    let grid = sphere();
    let index = index(&grid);
    assert!((index.voxel_size() - 0.1).abs() < 1e-12);
    assert_eq!(index.background_as_truncation(), grid.background());
    assert_eq!(index.background(), grid.background());
    assert_eq!(index.grid_class(), GridClass::LevelSet);
    assert!(!index.is_normalized());
}

#[test]
fn get_checks_bounds() {
    let index = index(&sphere());
    let len = index.len();

    let first = index.get(0).expect("first leaf");
    assert_eq!(first.origin.iter().filter(|c| **c % 8 != 0).count(), 0);

    assert_eq!(index.get(len).unwrap_err(), GridError::OutOfRange { index: len, len });
    assert!(matches!(
        index.get(len + 1),
        Err(GridError::OutOfRange { .. })
    ));
}

#[test]
fn blocks_match_source_leaves() {
    let grid = sphere();
    let index = index(&grid);
    for (block, leaf) in index.iter().zip(grid.leaves()) {
        assert_eq!(Coord::from(block.origin), leaf.origin());
        assert_eq!(block.buffer, leaf.buffer());
        let local = Coord::new(1, 2, 3);
        assert_eq!(block.value(1, 2, 3), leaf.get_value(leaf.origin() + local));
    }
    assert_eq!((&index).into_iter().count(), index.len());
}

#[test]
fn rejects_non_float_grids() {
    let bool_grid = AnyGrid::from(BoolGrid::new(false));
    let err = LeafNodeIndex::try_from(&bool_grid).unwrap_err();
    assert_eq!(
        err,
        GridError::UnsupportedType {
            found: GridValueType::Bool
        }
    );

    let vec_grid = AnyGrid::from(Vec3Grid::new(Vec3::ZERO));
    assert!(LeafNodeIndex::from_any(&vec_grid, LeafIndexOptions::default()).is_err());

    let float_grid = AnyGrid::from(sphere());
    assert!(LeafNodeIndex::try_from(&float_grid).is_ok());
}

#[test]
fn normalization_scales_by_background() {
    let grid = sphere();
    let bg = grid.background();
    let index = LeafNodeIndex::new(&grid, LeafIndexOptions::normalized()).expect("non-zero bg");
    assert!(index.is_normalized());

    for (block, leaf) in index.iter().zip(grid.leaves()) {
        for (n, value) in leaf.buffer().iter().enumerate() {
            assert!((block.buffer[n] - value / bg).abs() < 1e-6);
            if !leaf.value_mask().is_on(n) {
                assert!((block.buffer[n].abs() - 1.0).abs() < 1e-6);
            }
        }
    }

    let rebuilt = index.to_grid();
    assert_eq!(rebuilt.active_voxel_count(), grid.active_voxel_count());
    let (min_a, max_a) = rebuilt.eval_min_max().expect("active");
    let (min_b, max_b) = grid.eval_min_max().expect("active");
    assert!((min_a - min_b).abs() < 1e-5);
    assert!((max_a - max_b).abs() < 1e-5);
}

#[test]
fn normalization_rejects_zero_background() {
    let mut grid = FloatGrid::new(0.0);
    grid.set_value_on(Coord::new(1, 1, 1), 0.5);
    let err = LeafNodeIndex::new(&grid, LeafIndexOptions::normalized()).unwrap_err();
    assert_eq!(err, GridError::ZeroBackground);
    assert!(LeafNodeIndex::new(&grid, LeafIndexOptions::default()).is_ok());
}

#[test]
fn normalization_rejects_non_finite_background() {
    for background in [f32::NAN, f32::INFINITY, f32::NEG_INFINITY] {
        let grid = FloatGrid::new(background);
        assert_eq!(
            LeafNodeIndex::new(&grid, LeafIndexOptions::normalized()).unwrap_err(),
            GridError::NonFiniteBackground
        );
    }
}

#[test]
fn arrays_are_copies() {
    let grid = sphere();
    let index = index(&grid);
    let mut arrays = index.to_array();
    let before = index.get(0).expect("leaf").buffer[0];
    arrays.buffers[0][0] = before + 10.0;
    arrays.coords[0] = [999, 999, 999];
    assert_eq!(index.get(0).expect("leaf").buffer[0], before);
    assert_ne!(index.get(0).expect("leaf").origin, [999, 999, 999]);
}

#[test]
fn snapshot_ignores_later_source_edits() {
    let mut grid = sphere();
    let index = index(&grid);
    let leaves = index.len();
    let far = Coord::new(400, 400, 400);
    grid.set_value_on(far, 0.0);
    assert_eq!(grid.leaf_count(), leaves + 1);
    assert_eq!(index.len(), leaves);
    assert_eq!(index.source_grid().leaf_count(), leaves);
    assert!(!index.to_grid().is_value_on(far));
}
