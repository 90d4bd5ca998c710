//! Whole-grid value operations used when preparing grids for indexing.

use std::collections::BTreeSet;

use tracing::{debug, warn};
use voxleaf_grid::{Coord, FloatGrid, LeafNode, ValueMask, LEAF_SIZE};

use crate::error::GridError;
use crate::leaf_index::check_divisor;
use crate::options::BlendOptions;
use crate::parallel;

/// Returns a copy of `grid` with every stored value divided by its
/// background. The copy's background becomes `1.0`.
pub fn normalize_grid(grid: &FloatGrid) -> Result<FloatGrid, GridError> {
    let background = grid.background();
    check_divisor(background)?;

    let mut normalized = grid.clone();
    {
        let tree = normalized.tree_mut();
        let mut leaves: Vec<&mut LeafNode<f32>> = tree.leaves_mut().collect();
        parallel::for_each_indexed_mut(&mut leaves, |_, leaf| {
            for value in leaf.buffer_mut().iter_mut() {
                *value /= background;
            }
        });
        for tile in tree.tiles_mut() {
            *tile /= background;
        }
    }
    normalized.set_background(1.0);
    Ok(normalized)
}

/// Blends `b` into `a` as `eta * a + (1 - eta) * b`.
///
/// Every leaf present in either grid ends up in `a`; a voxel is active when
/// it is active in either input. Where one side has no leaf its tile value
/// or background stands in. Tiles and backgrounds are blended the same way.
pub fn blend_grids(a: &mut FloatGrid, b: &FloatGrid, options: BlendOptions) -> Result<(), GridError> {
    let eta = options.eta;
    if !(0.0..=1.0).contains(&eta) {
        return Err(GridError::InvalidBlendFactor(eta));
    }
    if a.transform() != b.transform() {
        warn!(
            "blending '{}' and '{}' with different transforms; values are mixed by index",
            a.name(),
            b.name()
        );
    }

    let mix = |x: f32, y: f32| eta * x + (1.0 - eta) * y;

    let origins: Vec<Coord> = a
        .leaves()
        .chain(b.leaves())
        .map(LeafNode::origin)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let source: &FloatGrid = a;
    let blended = parallel::map(&origins, false, |origin| {
        let (values_a, mask_a) = leaf_state(source, *origin);
        let (values_b, mask_b) = leaf_state(b, *origin);
        let mut values = [0.0f32; LEAF_SIZE];
        for (n, value) in values.iter_mut().enumerate() {
            *value = mix(values_a[n], values_b[n]);
        }
        let mut words = *mask_a.words();
        for (word, other) in words.iter_mut().zip(mask_b.words()) {
            *word |= other;
        }
        LeafNode::from_buffer(*origin, &values, ValueMask::from_words(words))
    });

    let covered: BTreeSet<Coord> = origins.iter().copied().collect();
    let tiles: Vec<(Coord, f32)> = a
        .tree()
        .tiles()
        .chain(b.tree().tiles())
        .map(|(origin, _)| origin)
        .filter(|origin| !covered.contains(origin))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(|origin| (origin, mix(a.get_value(origin), b.get_value(origin))))
        .collect();

    let background = mix(a.background(), b.background());
    let leaf_count = blended.len();
    let tile_count = tiles.len();
    for leaf in blended {
        a.insert_leaf(leaf);
    }
    for (origin, value) in tiles {
        a.set_tile(origin, value);
    }
    a.set_background(background);

    debug!("blended {leaf_count} leaves and {tile_count} tiles with eta {eta}");
    Ok(())
}

fn leaf_state(grid: &FloatGrid, origin: Coord) -> ([f32; LEAF_SIZE], ValueMask) {
    match grid.probe_leaf(origin) {
        Some(leaf) => (*leaf.buffer(), *leaf.value_mask()),
        None => ([grid.get_value(origin); LEAF_SIZE], ValueMask::new()),
    }
}
