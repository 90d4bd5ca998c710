use glam::DVec3;
use serde::{Deserialize, Serialize};

use crate::coord::Coord;

/// Uniform linear index-to-world mapping. Voxel `ijk` has its center at
/// `translation + ijk * voxel_size`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    voxel_size: f64,
    translation: DVec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            voxel_size: 1.0,
            translation: DVec3::ZERO,
        }
    }
}

impl Transform {
    /// Non-positive or non-finite sizes fall back to `1.0`.
    pub fn linear(voxel_size: f64) -> Self {
        Self {
            voxel_size: sanitize_voxel_size(voxel_size),
            translation: DVec3::ZERO,
        }
    }

    pub fn with_translation(mut self, translation: DVec3) -> Self {
        self.translation = translation;
        self
    }

    pub fn voxel_size(&self) -> f64 {
        self.voxel_size
    }

    pub fn translation(&self) -> DVec3 {
        self.translation
    }

    pub fn index_to_world(&self, ijk: Coord) -> DVec3 {
        self.index_to_world_f(DVec3::new(ijk.x as f64, ijk.y as f64, ijk.z as f64))
    }

    pub fn index_to_world_f(&self, ijk: DVec3) -> DVec3 {
        self.translation + ijk * self.voxel_size
    }

    pub fn world_to_index(&self, world: DVec3) -> DVec3 {
        (world - self.translation) / self.voxel_size
    }

    pub fn world_to_index_nearest(&self, world: DVec3) -> Coord {
        let ijk = self.world_to_index(world).round();
        Coord::new(ijk.x as i32, ijk.y as i32, ijk.z as i32)
    }
}

fn sanitize_voxel_size(voxel_size: f64) -> f64 {
    if voxel_size.is_finite() && voxel_size > 0.0 {
        voxel_size
    } else {
        1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_world_round_trip() {
        let xform = Transform::linear(0.25).with_translation(DVec3::new(1.0, -2.0, 0.5));
        let ijk = Coord::new(-3, 4, 17);
        let world = xform.index_to_world(ijk);
        assert!((world.x - 0.25).abs() < 1.0e-12);
        assert!((world.y + 1.0).abs() < 1.0e-12);
        assert_eq!(xform.world_to_index_nearest(world), ijk);
    }

    #[test]
    fn invalid_voxel_size_falls_back() {
        assert_eq!(Transform::linear(0.0).voxel_size(), 1.0);
        assert_eq!(Transform::linear(f64::NAN).voxel_size(), 1.0);
    }
}
