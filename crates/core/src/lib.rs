mod dense;
mod error;
mod leaf_index;
mod ops;
mod options;
mod parallel;

pub use dense::{
    extract_dense, extract_dense_any, extract_dense_batch, insert_dense, DenseExtraction,
    DenseVolume,
};
pub use error::GridError;
pub use leaf_index::{LeafArrays, LeafBlock, LeafNodeIndex, LEAF_SHAPE};
pub use ops::{blend_grids, normalize_grid};
pub use options::{BlendOptions, LeafIndexOptions};

pub use voxleaf_grid as grid;
