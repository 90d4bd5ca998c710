use std::fmt;

use voxleaf_grid::GridValueType;

#[derive(Debug, Clone, PartialEq)]
pub enum GridError {
    /// Only scalar `f32` grids can be extracted or indexed.
    UnsupportedType { found: GridValueType },
    OutOfRange { index: usize, len: usize },
    /// Normalizing by a zero background would produce NaN/Inf.
    ZeroBackground,
    /// Normalizing by a NaN or infinite background would produce NaN/zeros.
    NonFiniteBackground,
    InvalidBlendFactor(f32),
}

impl fmt::Display for GridError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GridError::UnsupportedType { found } => {
                write!(f, "grid type '{found}' not supported, expected a float grid")
            }
            GridError::OutOfRange { index, len } => {
                write!(f, "leaf index {index} out of range for {len} leaves")
            }
            GridError::ZeroBackground => {
                write!(f, "cannot normalize a grid whose background is zero")
            }
            GridError::NonFiniteBackground => {
                write!(f, "cannot normalize a grid whose background is not finite")
            }
            GridError::InvalidBlendFactor(eta) => {
                write!(f, "blend factor {eta} outside [0, 1]")
            }
        }
    }
}

impl std::error::Error for GridError {}
