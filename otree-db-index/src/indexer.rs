//! The indexer: assign every row of a batch to exactly one cube.
//!
//! Pure and synchronous - parallelism comes from partitioning the input, and
//! each worker runs this over its own clone of the index state snapshot.
//!
//! The algorithm, per batch:
//!
//! 1. Project each row's indexed values to a point in `[0,1]^d` and hash
//!    them to a weight.
//! 2. Descend from the root: a row stops at the first cube that is absent
//!    from the state, still open, or whose cutoff exceeds the row's weight.
//!    Rows stopping at flooded cubes are final immediately (a flooded cube
//!    accepts every row below its cutoff; the slight overshoot is bounded by
//!    the batch size).
//! 3. Open and new cubes accumulate their rows, shallowest cube first. A
//!    group that would push the cube past capacity picks the capacity-th
//!    smallest weight as the cube's cutoff, keeps the rows strictly below
//!    it, and spills the rest - each spilled row re-descends from the child
//!    containing its point.
//! 4. Cubes that received a cutoff this batch are flooded; the rest stay
//!    open with no cutoff recorded.
//!
//! Ties on weight are broken by row position in the batch, so the output is
//! a function only of the row set and the prior state - a conflicted commit
//! can re-run the indexer on the updated state and get the same answer the
//! winner would have.

use std::collections::BTreeMap;

use otree_db_core::{
    ColumnBatch, CubeId, CubeState, IndexState, Revision, Weight, weight_of, MAX_WEIGHT,
};

use crate::error::Result;
use crate::weights::CubeWeightBuffer;

/// One cube's share of an indexed batch: the block the writer will emit.
#[derive(Debug, Clone)]
pub struct CubeGroup {
    pub cube: CubeId,
    /// Row indices into the batch, in batch order.
    pub rows: Vec<usize>,
    /// Smallest weight among the kept rows.
    pub min_weight: Weight,
    /// The cube's cutoff as of this write: a fresh cutoff computed this
    /// batch, the snapshot's cutoff, or `MAX_WEIGHT` for open cubes.
    pub max_weight: Weight,
    /// Tag state for the emitted block.
    pub state: CubeState,
}

/// The indexer's output for one batch.
#[derive(Debug, Clone)]
pub struct BatchIndexResult {
    /// Per-cube row groups, in (depth, bits) cube order.
    pub groups: Vec<CubeGroup>,
    /// Per-row weights, aligned with the batch.
    pub weights: Vec<Weight>,
}

impl BatchIndexResult {
    pub fn empty() -> Self {
        Self {
            groups: Vec::new(),
            weights: Vec::new(),
        }
    }

    /// Total rows placed across all groups.
    pub fn rows_placed(&self) -> usize {
        self.groups.iter().map(|g| g.rows.len()).sum()
    }

    /// The cube each row was placed in.
    pub fn placements(&self) -> Vec<(usize, &CubeId)> {
        let mut out: Vec<(usize, &CubeId)> = self
            .groups
            .iter()
            .flat_map(|g| g.rows.iter().map(move |&i| (i, &g.cube)))
            .collect();
        out.sort_by_key(|(i, _)| *i);
        out
    }
}

/// Batch indexing over an immutable state snapshot.
#[derive(Debug, Clone)]
pub struct Indexer {
    buffer_capacity: usize,
}

impl Indexer {
    /// `buffer_capacity` bounds per-cube weight buffering during cutoff
    /// estimation (`cubeWeightsBufferCapacity`).
    pub fn new(buffer_capacity: usize) -> Self {
        Self {
            buffer_capacity: buffer_capacity.max(1),
        }
    }

    /// Index one batch against a revision and its state snapshot.
    pub fn index_batch(
        &self,
        batch: &ColumnBatch,
        revision: &Revision,
        state: &IndexState,
        seed: u32,
    ) -> Result<BatchIndexResult> {
        if batch.is_empty() {
            return Ok(BatchIndexResult::empty());
        }
        let columns = batch.schema().project(&revision.columns)?;
        let capacity = revision.desired_cube_size.max(1);

        // Step 1: weights and normalized points
        let n = batch.num_rows();
        let mut weights = Vec::with_capacity(n);
        let mut points = Vec::with_capacity(n);
        for i in 0..n {
            let values = batch.values_at(i, &columns);
            weights.push(weight_of(&values, seed));
            points.push(revision.project(&values).0);
        }

        // Step 2: initial descent over the snapshot
        let mut finals: BTreeMap<CubeId, Vec<(Weight, usize)>> = BTreeMap::new();
        let mut pending: BTreeMap<CubeId, Vec<(Weight, usize)>> = BTreeMap::new();
        let mut route = |cube: CubeId, pair: (Weight, usize)| {
            let is_flooded = state.get(&cube).is_some_and(|n| !n.is_open());
            let map = if is_flooded { &mut finals } else { &mut pending };
            map.entry(cube).or_default().push(pair);
        };
        for i in 0..n {
            let cube = state.find_placement(&points[i], weights[i]);
            route(cube, (weights[i], i));
        }

        // Step 3: resolve open/new cubes shallowest-first, spilling overflow
        // downward. Spilled rows only ever move to strictly deeper cubes, so
        // resolved groups never reopen.
        let mut cutoffs: BTreeMap<CubeId, Weight> = BTreeMap::new();
        while let Some((cube, rows)) = pending.pop_first() {
            let existing = state.get(&cube).map_or(0, |n| n.element_count as usize);
            let allowed = capacity.saturating_sub(existing);
            let bound = allowed.saturating_add(1).min(self.buffer_capacity);

            let mut buffer = CubeWeightBuffer::new(bound);
            let mut spill = Vec::new();
            for (w, i) in rows {
                if let Some(evicted) = buffer.push(w, i) {
                    spill.push(evicted);
                }
            }

            let overflowed = buffer.total_pushed() > allowed || !spill.is_empty();
            let held = buffer.into_sorted();

            if !overflowed {
                finals.entry(cube).or_default().extend(held);
                continue;
            }

            let cutoff = held.last().map(|(w, _)| *w).expect("overflowed cube holds rows");
            let boundary_start = held.partition_point(|(w, _)| *w < cutoff);
            let (kept, boundary) = held.split_at(boundary_start);

            if kept.is_empty() {
                // Every buffered row shares the cutoff weight, so no weight
                // cutoff can separate this group. Keep the whole group here
                // and leave the cube open: spilling from an open cube would
                // break cutoff monotonicity, and identical weights cannot be
                // split by the tree anyway.
                let entry = finals.entry(cube).or_default();
                entry.extend_from_slice(boundary);
                entry.append(&mut spill);
                continue;
            }

            cutoffs.insert(cube.clone(), cutoff);
            finals
                .entry(cube.clone())
                .or_default()
                .extend_from_slice(kept);
            spill.extend_from_slice(boundary);

            for (w, i) in spill {
                let child = cube.child_containing(&points[i]);
                let target = state.find_placement_from(child, &points[i], w);
                let is_flooded = state.get(&target).is_some_and(|n| !n.is_open());
                let map = if is_flooded { &mut finals } else { &mut pending };
                map.entry(target).or_default().push((w, i));
            }
        }

        // Step 4: assemble per-cube groups with their tag cutoffs
        let new_cutoffs = cutoffs.len();
        let mut groups = Vec::with_capacity(finals.len());
        for (cube, mut rows) in finals {
            rows.sort_by_key(|&(_, i)| i);
            let min_weight = rows
                .iter()
                .map(|(w, _)| *w)
                .min()
                .expect("group holds rows");
            let max_weight = cutoffs
                .get(&cube)
                .copied()
                .or_else(|| state.get(&cube).map(|n| n.max_weight))
                .unwrap_or(MAX_WEIGHT);
            groups.push(CubeGroup {
                cube,
                rows: rows.into_iter().map(|(_, i)| i).collect(),
                min_weight,
                max_weight,
                state: CubeState::Flooded,
            });
        }

        tracing::debug!(
            rows = n,
            groups = groups.len(),
            new_cutoffs,
            revision = revision.id,
            "batch indexed"
        );

        Ok(BatchIndexResult { groups, weights })
    }
}

/// Fold a batch result into the tags the state of the next snapshot will
/// see, for callers that need the post-write state without a log round trip.
pub fn apply_groups(state: &IndexState, groups: &[CubeGroup]) -> IndexState {
    use otree_db_core::BlockTags;
    let mut tags: Vec<BlockTags> = state
        .cubes()
        .map(|(cube, node)| BlockTags {
            cube: cube.clone(),
            min_weight: otree_db_core::MIN_WEIGHT,
            max_weight: node.max_weight,
            state: node.state,
            revision_id: state.revision_id(),
            element_count: node.element_count,
        })
        .collect();
    tags.extend(groups.iter().map(|g| BlockTags {
        cube: g.cube.clone(),
        min_weight: g.min_weight,
        max_weight: g.max_weight,
        state: g.state,
        revision_id: state.revision_id(),
        element_count: g.rows.len() as u64,
    }));
    IndexState::from_blocks(state.revision_id(), state.dims(), tags.iter())
}
