//! Cube identifiers: stable addresses for nodes of the 2^d-ary space
//! partitioning tree.
//!
//! A cube covers a hyper-rectangle of the normalized `[0,1]^d` key space.
//! The root covers the unit hyper-cube; child `k` bisects every dimension,
//! taking the upper half of dimension `i` when bit `i` of `k` is set. A
//! `CubeId` records the child choices from the root as a bit-string, so
//! parent, children and depth are all computable from the identifier alone -
//! the tree is never materialized as a linked structure.
//!
//! Ordering is `(depth, bits)` lexicographic: ancestors sort before their
//! descendants.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{CoreError, Result};

/// Maximum supported number of indexed dimensions.
///
/// Child indices are stored as a byte, so a cube can have at most 2^8
/// children.
pub const MAX_DIMENSIONS: usize = 8;

/// A point in the normalized key space `[0,1]^d`.
#[derive(Debug, Clone, PartialEq)]
pub struct Point(pub Vec<f64>);

impl Point {
    pub fn dims(&self) -> usize {
        self.0.len()
    }
}

/// Identifier of one cube in the tree.
///
/// `path[level]` is the child index taken at `level`; the root has an empty
/// path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CubeId {
    dims: u8,
    path: Vec<u8>,
}

impl CubeId {
    /// The root cube, covering all of `[0,1]^d`.
    pub fn root(dims: usize) -> Self {
        debug_assert!(dims >= 1 && dims <= MAX_DIMENSIONS);
        Self {
            dims: dims as u8,
            path: Vec::new(),
        }
    }

    /// Number of indexed dimensions.
    #[inline]
    pub fn dims(&self) -> usize {
        self.dims as usize
    }

    /// Depth of this cube; the root has depth 0.
    #[inline]
    pub fn depth(&self) -> usize {
        self.path.len()
    }

    #[inline]
    pub fn is_root(&self) -> bool {
        self.path.is_empty()
    }

    /// Number of children per cube: 2^d.
    #[inline]
    pub fn fanout(&self) -> usize {
        1 << self.dims
    }

    /// The parent cube, or `None` for the root. Drops the last child choice.
    pub fn parent(&self) -> Option<CubeId> {
        if self.path.is_empty() {
            return None;
        }
        let mut path = self.path.clone();
        path.pop();
        Some(CubeId {
            dims: self.dims,
            path,
        })
    }

    /// The `k`-th child. Appends `d` bits encoding `k`.
    pub fn child(&self, k: u8) -> CubeId {
        debug_assert!((k as usize) < self.fanout());
        let mut path = Vec::with_capacity(self.path.len() + 1);
        path.extend_from_slice(&self.path);
        path.push(k);
        CubeId {
            dims: self.dims,
            path,
        }
    }

    /// All 2^d children in child-index order.
    pub fn children(&self) -> Vec<CubeId> {
        (0..self.fanout() as u8).map(|k| self.child(k)).collect()
    }

    /// True iff `self` is a proper ancestor of `other`.
    pub fn is_ancestor_of(&self, other: &CubeId) -> bool {
        self.dims == other.dims
            && self.path.len() < other.path.len()
            && other.path[..self.path.len()] == self.path[..]
    }

    /// The half-open bounds `[lo_i, hi_i)` of this cube in each dimension.
    pub fn bounds(&self) -> (Vec<f64>, Vec<f64>) {
        let d = self.dims();
        let mut lo = vec![0.0; d];
        let mut hi = vec![1.0; d];
        for &k in &self.path {
            for i in 0..d {
                let mid = (lo[i] + hi[i]) / 2.0;
                if (k >> i) & 1 == 1 {
                    lo[i] = mid;
                } else {
                    hi[i] = mid;
                }
            }
        }
        (lo, hi)
    }

    /// Whether this cube's region contains `point`.
    ///
    /// The upper face of the unit cube is closed: a coordinate of exactly
    /// 1.0 belongs to the cubes whose upper bound is 1.0.
    pub fn contains_point(&self, point: &Point) -> bool {
        if point.dims() != self.dims() {
            return false;
        }
        let (lo, hi) = self.bounds();
        point.0.iter().enumerate().all(|(i, &c)| {
            c >= lo[i] && (c < hi[i] || (hi[i] == 1.0 && c <= 1.0))
        })
    }

    /// The unique child of this cube containing `point`.
    pub fn child_containing(&self, point: &Point) -> CubeId {
        debug_assert_eq!(point.dims(), self.dims());
        let (lo, hi) = self.bounds();
        let mut k = 0u8;
        for i in 0..self.dims() {
            let mid = (lo[i] + hi[i]) / 2.0;
            if point.0[i] >= mid {
                k |= 1 << i;
            }
        }
        self.child(k)
    }

    /// The cube at `depth` containing `point`.
    pub fn containing(point: &Point, depth: usize) -> CubeId {
        let mut cube = CubeId::root(point.dims());
        for _ in 0..depth {
            cube = cube.child_containing(point);
        }
        cube
    }

    /// Child index taken at `level`, for levels below `depth()`.
    pub fn child_index_at(&self, level: usize) -> u8 {
        self.path[level]
    }

    /// Wire encoding: the path bit-string left-aligned in bytes, followed by
    /// one byte holding the bit-length modulo 8.
    ///
    /// Within each level, the bit for dimension 0 comes first; bits fill
    /// bytes most-significant first.
    pub fn to_bytes(&self) -> Vec<u8> {
        let total_bits = self.path.len() * self.dims();
        let mut out = vec![0u8; total_bits.div_ceil(8)];
        let mut bit = 0usize;
        for &k in &self.path {
            for i in 0..self.dims() {
                if (k >> i) & 1 == 1 {
                    out[bit / 8] |= 0x80 >> (bit % 8);
                }
                bit += 1;
            }
        }
        out.push((total_bits % 8) as u8);
        out
    }

    /// Decode the wire encoding produced by [`CubeId::to_bytes`].
    pub fn from_bytes(dims: usize, bytes: &[u8]) -> Result<CubeId> {
        if dims < 1 || dims > MAX_DIMENSIONS {
            return Err(CoreError::invalid_cube_id(format!(
                "unsupported dimension count {}",
                dims
            )));
        }
        let (rem, data) = match bytes.split_last() {
            Some(split) => split,
            None => return Err(CoreError::invalid_cube_id("empty encoding")),
        };
        if *rem >= 8 {
            return Err(CoreError::invalid_cube_id(format!(
                "bit remainder {} out of range",
                rem
            )));
        }
        let total_bits = if *rem == 0 {
            data.len() * 8
        } else {
            if data.is_empty() {
                return Err(CoreError::invalid_cube_id("missing bit-string bytes"));
            }
            (data.len() - 1) * 8 + *rem as usize
        };
        if total_bits % dims != 0 {
            return Err(CoreError::invalid_cube_id(format!(
                "bit length {} not divisible by dimension count {}",
                total_bits, dims
            )));
        }
        let mut path = Vec::with_capacity(total_bits / dims);
        let mut bit = 0usize;
        while bit < total_bits {
            let mut k = 0u8;
            for i in 0..dims {
                if data[bit / 8] & (0x80 >> (bit % 8)) != 0 {
                    k |= 1 << i;
                }
                bit += 1;
            }
            path.push(k);
        }
        Ok(CubeId {
            dims: dims as u8,
            path,
        })
    }
}

impl Ord for CubeId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.depth()
            .cmp(&other.depth())
            .then_with(|| self.path.cmp(&other.path))
    }
}

impl PartialOrd for CubeId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for CubeId {
    /// Compact textual form `{dims}:{hex of wire bytes}`, e.g. `2:6004`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.dims, hex::encode(self.to_bytes()))
    }
}

impl FromStr for CubeId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<CubeId> {
        let (dims_str, hex_str) = s
            .split_once(':')
            .ok_or_else(|| CoreError::invalid_cube_id(format!("missing separator in {:?}", s)))?;
        let dims: usize = dims_str
            .parse()
            .map_err(|_| CoreError::invalid_cube_id(format!("bad dimension count in {:?}", s)))?;
        let bytes = hex::decode(hex_str)
            .map_err(|e| CoreError::invalid_cube_id(format!("bad hex in {:?}: {}", s, e)))?;
        CubeId::from_bytes(dims, &bytes)
    }
}

impl Serialize for CubeId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for CubeId {
    fn deserialize<D: Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_and_children() {
        let root = CubeId::root(2);
        assert_eq!(root.depth(), 0);
        assert!(root.is_root());
        assert_eq!(root.parent(), None);

        let children = root.children();
        assert_eq!(children.len(), 4);
        for (k, child) in children.iter().enumerate() {
            assert_eq!(child.depth(), 1);
            assert_eq!(child.parent(), Some(root.clone()));
            assert_eq!(child.child_index_at(0), k as u8);
        }
    }

    #[test]
    fn test_child_bounds_bisect() {
        let root = CubeId::root(2);
        // Child 0: lower half of both dimensions
        let (lo, hi) = root.child(0).bounds();
        assert_eq!((lo, hi), (vec![0.0, 0.0], vec![0.5, 0.5]));
        // Child 1: upper half of dim 0, lower half of dim 1
        let (lo, hi) = root.child(1).bounds();
        assert_eq!((lo, hi), (vec![0.5, 0.0], vec![1.0, 0.5]));
        // Child 3: upper halves
        let (lo, hi) = root.child(3).bounds();
        assert_eq!((lo, hi), (vec![0.5, 0.5], vec![1.0, 1.0]));
    }

    #[test]
    fn test_containing_descends_correctly() {
        let p = Point(vec![0.3, 0.8]);
        let cube = CubeId::containing(&p, 3);
        assert_eq!(cube.depth(), 3);
        assert!(cube.contains_point(&p));
        // Every ancestor contains the point as well
        let mut anc = cube.parent();
        while let Some(a) = anc {
            assert!(a.contains_point(&p));
            anc = a.parent();
        }
    }

    #[test]
    fn test_unit_corner_belongs_to_upper_cubes() {
        let p = Point(vec![1.0, 1.0]);
        let cube = CubeId::containing(&p, 4);
        assert!(cube.contains_point(&p));
        let (_, hi) = cube.bounds();
        assert_eq!(hi, vec![1.0, 1.0]);
    }

    #[test]
    fn test_each_point_in_exactly_one_child() {
        let root = CubeId::root(3);
        let points = [
            Point(vec![0.1, 0.5, 0.9]),
            Point(vec![0.5, 0.5, 0.5]),
            Point(vec![0.0, 0.99, 0.49]),
        ];
        for p in &points {
            let holders: Vec<_> = root
                .children()
                .into_iter()
                .filter(|c| c.contains_point(p))
                .collect();
            assert_eq!(holders.len(), 1, "point {:?} in {} children", p, holders.len());
            assert_eq!(holders[0], root.child_containing(p));
        }
    }

    #[test]
    fn test_ordering_ancestors_first() {
        let root = CubeId::root(2);
        let c1 = root.child(3);
        let c2 = c1.child(0);
        assert!(root < c1);
        assert!(c1 < c2);
        // Same depth: bit-string lexicographic
        assert!(root.child(0) < root.child(1));
    }

    #[test]
    fn test_wire_round_trip() {
        let root = CubeId::root(2);
        let cubes = [
            root.clone(),
            root.child(2),
            root.child(2).child(1),
            root.child(3).child(0).child(3).child(1).child(2),
        ];
        for cube in &cubes {
            let bytes = cube.to_bytes();
            let back = CubeId::from_bytes(2, &bytes).unwrap();
            assert_eq!(&back, cube, "wire round trip for {}", cube);
        }
    }

    #[test]
    fn test_wire_root_is_single_length_byte() {
        let root = CubeId::root(4);
        assert_eq!(root.to_bytes(), vec![0u8]);
    }

    #[test]
    fn test_string_round_trip() {
        let cube = CubeId::root(3).child(5).child(2);
        let s = cube.to_string();
        let back: CubeId = s.parse().unwrap();
        assert_eq!(back, cube);
    }

    #[test]
    fn test_from_bytes_rejects_garbage() {
        assert!(CubeId::from_bytes(2, &[]).is_err());
        assert!(CubeId::from_bytes(2, &[0xff, 9]).is_err());
        // 3 bits with 2 dims: not divisible
        assert!(CubeId::from_bytes(2, &[0b1010_0000, 3]).is_err());
        assert!(CubeId::from_bytes(0, &[0]).is_err());
        assert!(CubeId::from_bytes(9, &[0]).is_err());
    }

    #[test]
    fn test_is_ancestor_of() {
        let root = CubeId::root(2);
        let child = root.child(1);
        let grandchild = child.child(2);
        assert!(root.is_ancestor_of(&grandchild));
        assert!(child.is_ancestor_of(&grandchild));
        assert!(!grandchild.is_ancestor_of(&child));
        assert!(!child.is_ancestor_of(&child));
        assert!(!root.child(0).is_ancestor_of(&grandchild));
    }
}
