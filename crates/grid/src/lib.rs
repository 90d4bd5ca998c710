mod coord;
mod grid;
mod leaf;
mod transform;
mod tree;
mod value;

pub mod io;
pub mod tools;

pub use coord::{Coord, CoordBBox};
pub use grid::{AnyGrid, BoolGrid, FloatGrid, Grid, GridClass, Vec3Grid};
pub use leaf::{leaf_offset, LeafNode, ValueMask, LEAF_DIM, LEAF_LOG2DIM, LEAF_SIZE};
pub use transform::Transform;
pub use tree::Tree;
pub use value::{GridValue, GridValueType};
