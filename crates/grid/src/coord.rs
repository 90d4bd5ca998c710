use std::ops::{Add, Sub};

use serde::{Deserialize, Serialize};

/// Integer index-space coordinate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Coord {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl Coord {
    pub const ZERO: Coord = Coord { x: 0, y: 0, z: 0 };

    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    pub const fn splat(v: i32) -> Self {
        Self { x: v, y: v, z: v }
    }

    pub fn to_array(self) -> [i32; 3] {
        [self.x, self.y, self.z]
    }

    pub fn min(self, other: Coord) -> Coord {
        Coord::new(self.x.min(other.x), self.y.min(other.y), self.z.min(other.z))
    }

    pub fn max(self, other: Coord) -> Coord {
        Coord::new(self.x.max(other.x), self.y.max(other.y), self.z.max(other.z))
    }

    /// Clears the low `log2` bits of every component, rounding toward negative infinity.
    pub fn align_down(self, log2: u32) -> Coord {
        let mask = !((1i32 << log2) - 1);
        Coord::new(self.x & mask, self.y & mask, self.z & mask)
    }
}

impl From<[i32; 3]> for Coord {
    fn from(v: [i32; 3]) -> Self {
        Coord::new(v[0], v[1], v[2])
    }
}

impl From<Coord> for [i32; 3] {
    fn from(c: Coord) -> Self {
        c.to_array()
    }
}

impl Add for Coord {
    type Output = Coord;

    fn add(self, rhs: Coord) -> Coord {
        Coord::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Coord {
    type Output = Coord;

    fn sub(self, rhs: Coord) -> Coord {
        Coord::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

/// Axis-aligned box of index coordinates. Both corners are inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoordBBox {
    pub min: Coord,
    pub max: Coord,
}

impl CoordBBox {
    pub fn new(min: Coord, max: Coord) -> Self {
        Self { min, max }
    }

    pub fn from_point(c: Coord) -> Self {
        Self { min: c, max: c }
    }

    /// Box of `dim` voxels per axis starting at `min`.
    pub fn from_min_dim(min: Coord, dim: i32) -> Self {
        Self {
            min,
            max: min + Coord::splat(dim - 1),
        }
    }

    pub fn dim(&self) -> [u32; 3] {
        [
            (self.max.x - self.min.x + 1).max(0) as u32,
            (self.max.y - self.min.y + 1).max(0) as u32,
            (self.max.z - self.min.z + 1).max(0) as u32,
        ]
    }

    pub fn volume(&self) -> u64 {
        let [x, y, z] = self.dim();
        x as u64 * y as u64 * z as u64
    }

    pub fn contains(&self, c: Coord) -> bool {
        c.x >= self.min.x
            && c.y >= self.min.y
            && c.z >= self.min.z
            && c.x <= self.max.x
            && c.y <= self.max.y
            && c.z <= self.max.z
    }

    pub fn expand(&mut self, c: Coord) {
        self.min = self.min.min(c);
        self.max = self.max.max(c);
    }

    pub fn union(&self, other: &CoordBBox) -> CoordBBox {
        CoordBBox::new(self.min.min(other.min), self.max.max(other.max))
    }

    pub fn intersection(&self, other: &CoordBBox) -> Option<CoordBBox> {
        let min = self.min.max(other.min);
        let max = self.max.min(other.max);
        if min.x > max.x || min.y > max.y || min.z > max.z {
            None
        } else {
            Some(CoordBBox::new(min, max))
        }
    }

    /// Visits every coordinate in x-major order (z varies fastest).
    pub fn for_each(&self, mut f: impl FnMut(Coord)) {
        for x in self.min.x..=self.max.x {
            for y in self.min.y..=self.max.y {
                for z in self.min.z..=self.max.z {
                    f(Coord::new(x, y, z));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn align_down_floors_negative_coords() {
        assert_eq!(Coord::new(-1, 7, 8).align_down(3), Coord::new(-8, 0, 8));
        assert_eq!(Coord::new(-9, -8, 130).align_down(7), Coord::new(-128, -128, 128));
    }

    #[test]
    fn bbox_dim_is_inclusive() {
        let bbox = CoordBBox::new(Coord::new(-2, 0, 3), Coord::new(2, 0, 4));
        assert_eq!(bbox.dim(), [5, 1, 2]);
        assert_eq!(bbox.volume(), 10);
        assert!(bbox.contains(Coord::new(-2, 0, 4)));
        assert!(!bbox.contains(Coord::new(3, 0, 4)));
    }

    #[test]
    fn bbox_intersection_of_disjoint_boxes_is_none() {
        let a = CoordBBox::from_min_dim(Coord::ZERO, 8);
        let b = CoordBBox::from_min_dim(Coord::splat(8), 8);
        assert!(a.intersection(&b).is_none());
        let c = CoordBBox::from_min_dim(Coord::splat(4), 8);
        let hit = a.intersection(&c).expect("overlap");
        assert_eq!(hit.dim(), [4, 4, 4]);
    }
}
