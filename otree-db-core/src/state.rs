//! Per-revision index state: the in-memory reduction of all live block tags.
//!
//! The tree is never held as a mutable graph. Each log snapshot folds into an
//! immutable `IndexState` mapping `CubeId -> CubeNode`; parent and child
//! relationships are computed from the cube id's bit-string on the fly.
//! Writers clone a snapshot per batch and readers take one at query start.

use std::collections::BTreeMap;

use crate::block::{BlockTags, CubeState};
use crate::cube::{CubeId, Point};
use crate::weight::{Weight, MAX_WEIGHT};

/// Aggregated view of one cube across all of its live blocks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CubeNode {
    /// Effective weight cutoff: the tightest cutoff any block recorded.
    /// `MAX_WEIGHT` means the cube is still open and accepts every row that
    /// reaches it.
    pub max_weight: Weight,
    /// Total rows across the cube's live blocks.
    pub element_count: u64,
    /// Furthest lifecycle state among the cube's blocks.
    pub state: CubeState,
}

impl CubeNode {
    /// Whether the cube has no weight cutoff yet.
    #[inline]
    pub fn is_open(&self) -> bool {
        self.max_weight == MAX_WEIGHT
    }
}

/// Immutable index state for one revision.
#[derive(Debug, Clone)]
pub struct IndexState {
    revision_id: u64,
    dims: usize,
    cubes: BTreeMap<CubeId, CubeNode>,
}

impl IndexState {
    /// An empty state (no blocks written yet) for a revision.
    pub fn empty(revision_id: u64, dims: usize) -> Self {
        Self {
            revision_id,
            dims,
            cubes: BTreeMap::new(),
        }
    }

    /// Fold the tags of all live blocks of one revision into an index state.
    ///
    /// Per cube: element counts add up, the weight cutoff is the minimum
    /// across blocks (cutoffs only tighten), and the state is the furthest
    /// lifecycle state.
    pub fn from_blocks<'a>(
        revision_id: u64,
        dims: usize,
        tags: impl IntoIterator<Item = &'a BlockTags>,
    ) -> Self {
        let mut cubes: BTreeMap<CubeId, CubeNode> = BTreeMap::new();
        for tag in tags {
            debug_assert_eq!(tag.revision_id, revision_id);
            cubes
                .entry(tag.cube.clone())
                .and_modify(|node| {
                    node.max_weight = node.max_weight.min(tag.max_weight);
                    node.element_count += tag.element_count;
                    node.state = node.state.max(tag.state);
                })
                .or_insert(CubeNode {
                    max_weight: tag.max_weight,
                    element_count: tag.element_count,
                    state: tag.state,
                });
        }
        Self {
            revision_id,
            dims,
            cubes,
        }
    }

    #[inline]
    pub fn revision_id(&self) -> u64 {
        self.revision_id
    }

    #[inline]
    pub fn dims(&self) -> usize {
        self.dims
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.cubes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cubes.is_empty()
    }

    pub fn get(&self, cube: &CubeId) -> Option<&CubeNode> {
        self.cubes.get(cube)
    }

    /// Iterate cubes in (depth, bits) order: ancestors before descendants.
    pub fn cubes(&self) -> impl Iterator<Item = (&CubeId, &CubeNode)> {
        self.cubes.iter()
    }

    /// Total elements across all cubes.
    pub fn total_elements(&self) -> u64 {
        self.cubes.values().map(|n| n.element_count).sum()
    }

    /// Whether any direct child of `cube` exists in the state.
    pub fn has_children(&self, cube: &CubeId) -> bool {
        cube.children().iter().any(|c| self.cubes.contains_key(c))
    }

    /// The descent for a single row: find the shallowest cube that keeps a row
    /// with this point and weight.
    ///
    /// At each cube: an absent entry makes the row the first of a new leaf;
    /// an open cube or one whose cutoff exceeds the weight keeps the row;
    /// otherwise the row falls through to the unique child containing the
    /// point.
    pub fn find_placement(&self, point: &Point, weight: Weight) -> CubeId {
        self.find_placement_from(CubeId::root(self.dims), point, weight)
    }

    /// The same descent started at an arbitrary cube, used when recursing
    /// rows spilled past a freshly-computed cutoff.
    pub fn find_placement_from(&self, start: CubeId, point: &Point, weight: Weight) -> CubeId {
        let mut cube = start;
        loop {
            match self.cubes.get(&cube) {
                None => return cube,
                Some(node) if node.is_open() || weight < node.max_weight => return cube,
                Some(_) => cube = cube.child_containing(point),
            }
        }
    }

    /// Tree connectedness: every non-root cube's parent is present.
    pub fn is_connected(&self) -> bool {
        self.cubes.keys().all(|cube| match cube.parent() {
            None => true,
            Some(parent) => self.cubes.contains_key(&parent),
        })
    }

    /// Ancestor-descendant weight monotonicity: a parent's cutoff never
    /// exceeds a child's.
    pub fn is_weight_monotonic(&self) -> bool {
        self.cubes.iter().all(|(cube, node)| match cube.parent() {
            None => true,
            Some(parent) => self
                .cubes
                .get(&parent)
                .map_or(true, |p| p.max_weight <= node.max_weight),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::weight::MIN_WEIGHT;

    fn tags(cube: CubeId, max: Weight, count: u64) -> BlockTags {
        BlockTags {
            cube,
            min_weight: MIN_WEIGHT,
            max_weight: max,
            state: CubeState::Flooded,
            revision_id: 1,
            element_count: count,
        }
    }

    fn three_level_state() -> IndexState {
        let root = CubeId::root(2);
        let child = root.child(0);
        let grandchild = child.child(1);
        IndexState::from_blocks(
            1,
            2,
            [
                tags(root.clone(), Weight(0), 100),
                tags(child.clone(), Weight(1000), 100),
                tags(grandchild.clone(), MAX_WEIGHT, 30),
            ]
            .iter(),
        )
    }

    #[test]
    fn test_fold_multiple_blocks_per_cube() {
        let root = CubeId::root(2);
        let state = IndexState::from_blocks(
            1,
            2,
            [
                tags(root.clone(), MAX_WEIGHT, 50),
                tags(root.clone(), Weight(500), 20),
            ]
            .iter(),
        );
        let node = state.get(&root).unwrap();
        assert_eq!(node.element_count, 70);
        // Cutoffs only tighten: the finite cutoff wins over the open block
        assert_eq!(node.max_weight, Weight(500));
        assert!(!node.is_open());
    }

    #[test]
    fn test_find_placement_descends_past_cutoffs() {
        let state = three_level_state();
        let root = CubeId::root(2);
        let point = Point(vec![0.1, 0.1]); // inside child 0 at every level

        // Light row stays at the root
        assert_eq!(state.find_placement(&point, Weight(-5)), root);
        // Row past the root cutoff falls to the child
        assert_eq!(state.find_placement(&point, Weight(10)), root.child(0));
        // Row past both cutoffs lands in the open grandchild
        assert_eq!(
            state.find_placement(&point, Weight(5000)),
            root.child(0).child(1)
        );
    }

    #[test]
    fn test_find_placement_new_leaf() {
        let state = three_level_state();
        // Heavy row whose point leads outside existing grandchildren
        let point = Point(vec![0.4, 0.4]); // child 0, then grandchild 3
        let placed = state.find_placement(&point, Weight(5000));
        assert_eq!(placed, CubeId::root(2).child(0).child(3));
        assert!(state.get(&placed).is_none());
    }

    #[test]
    fn test_invariant_helpers() {
        let state = three_level_state();
        assert!(state.is_connected());
        assert!(state.is_weight_monotonic());
        assert_eq!(state.total_elements(), 230);
        assert!(state.has_children(&CubeId::root(2)));
        assert!(!state.has_children(&CubeId::root(2).child(0).child(1)));

        // A state with an orphan cube is not connected
        let orphan = IndexState::from_blocks(
            1,
            2,
            [tags(CubeId::root(2).child(2).child(0), MAX_WEIGHT, 5)].iter(),
        );
        assert!(!orphan.is_connected());
    }

    #[test]
    fn test_monotonicity_violation_detected() {
        let root = CubeId::root(2);
        let state = IndexState::from_blocks(
            1,
            2,
            [
                tags(root.clone(), Weight(100), 10),
                tags(root.child(0), Weight(-100), 10),
            ]
            .iter(),
        );
        assert!(!state.is_weight_monotonic());
    }
}
