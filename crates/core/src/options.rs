use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LeafIndexOptions {
    /// Divide every cached leaf value by the grid background, mapping a
    /// level set's truncation band to roughly [-1, 1].
    pub normalize: bool,
}

impl LeafIndexOptions {
    pub fn normalized() -> Self {
        Self { normalize: true }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlendOptions {
    /// Weight of the first grid; the second gets `1 - eta`.
    pub eta: f32,
}

impl Default for BlendOptions {
    fn default() -> Self {
        Self { eta: 0.9 }
    }
}
