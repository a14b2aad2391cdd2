//! Analyzer and optimizer planning.
//!
//! `analyze` inspects one revision's live blocks and nominates cubes whose
//! samples have degraded: inner cubes far below capacity, cubes fragmented
//! across many small files, and announced cubes whose proposal went stale.
//! `plan_optimize` turns a cube selection into disjoint subtree rewrite
//! groups; executing the rewrite (read, re-index, commit) is the write
//! pipeline's job.

use otree_db_core::{CubeId, CubeState, EngineConfig, Revision};
use otree_db_log::LogSnapshot;

use crate::error::{IndexError, Result};

/// Tuning for the analyzer.
#[derive(Debug, Clone)]
pub struct AnalyzeOptions {
    /// An inner cube (one with children) holding less than this fraction of
    /// the desired cube size is under-filled.
    pub fill_ratio_threshold: f64,
    /// Announced cubes older than this are stale.
    pub announced_staleness_ms: i64,
}

impl Default for AnalyzeOptions {
    fn default() -> Self {
        Self {
            fill_ratio_threshold: 0.5,
            announced_staleness_ms: 60 * 60 * 1000,
        }
    }
}

/// Nominate cubes of one revision for optimization.
///
/// Purely advisory: nothing about the nomination affects read correctness.
pub fn analyze(
    snapshot: &LogSnapshot,
    revision: &Revision,
    config: &EngineConfig,
    options: &AnalyzeOptions,
    now_ms: i64,
) -> Vec<CubeId> {
    let state = snapshot.index_state(revision);
    let files = snapshot.files_for_revision(revision.id);
    let fill_floor =
        (revision.desired_cube_size as f64 * options.fill_ratio_threshold) as u64;

    let mut candidates = Vec::new();
    for (cube, node) in state.cubes() {
        // Under-filled inner cube: its sample is thinner than the tree
        // shape promises.
        let under_filled = node.element_count < fill_floor && state.has_children(cube);

        // Fragmentation: several files below the compaction floor.
        let small_files = files
            .iter()
            .filter(|f| {
                f.tags.cube == *cube && f.size < config.min_compaction_file_size_in_bytes
            })
            .count();
        let fragmented = small_files > 1;

        // Stale announcement: proposal never acted on.
        let newest_mtime = files
            .iter()
            .filter(|f| f.tags.cube == *cube)
            .map(|f| f.modification_time)
            .max()
            .unwrap_or(i64::MIN);
        let stale_announced = node.state == CubeState::Announced
            && now_ms.saturating_sub(newest_mtime) > options.announced_staleness_ms;

        if under_filled || fragmented || stale_announced {
            candidates.push(cube.clone());
        }
    }

    tracing::info!(
        revision = revision.id,
        cubes = state.len(),
        candidates = candidates.len(),
        "analyze complete"
    );
    candidates
}

/// One subtree to rewrite: a root cube, the state cubes under it, and the
/// live files holding their rows.
#[derive(Debug, Clone)]
pub struct OptimizeGroup {
    pub root: CubeId,
    pub cubes: Vec<CubeId>,
    pub file_paths: Vec<String>,
}

/// A full optimize pass: disjoint subtree groups.
#[derive(Debug, Clone, Default)]
pub struct OptimizePlan {
    pub groups: Vec<OptimizeGroup>,
}

impl OptimizePlan {
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Every file any group will rewrite.
    pub fn file_paths(&self) -> impl Iterator<Item = &str> {
        self.groups
            .iter()
            .flat_map(|g| g.file_paths.iter().map(String::as_str))
    }
}

/// Build the rewrite plan for a cube selection.
///
/// Selected cubes that sit inside another selected cube's subtree are folded
/// into the ancestor's group, so groups never overlap and each file is
/// rewritten at most once.
pub fn plan_optimize(
    snapshot: &LogSnapshot,
    revision: &Revision,
    cubes: &[CubeId],
) -> Result<OptimizePlan> {
    let state = snapshot.index_state(revision);
    for cube in cubes {
        if state.get(cube).is_none() {
            return Err(IndexError::unknown_cube(cube.to_string()));
        }
    }

    // Keep only subtree roots among the selection
    let mut roots: Vec<&CubeId> = cubes
        .iter()
        .filter(|c| !cubes.iter().any(|other| other.is_ancestor_of(c)))
        .collect();
    roots.sort();
    roots.dedup();

    let files = snapshot.files_for_revision(revision.id);
    let mut groups = Vec::with_capacity(roots.len());
    for root in roots {
        let cubes_in_subtree: Vec<CubeId> = state
            .cubes()
            .map(|(c, _)| c)
            .filter(|c| *c == root || root.is_ancestor_of(c))
            .cloned()
            .collect();
        let file_paths: Vec<String> = files
            .iter()
            .filter(|f| cubes_in_subtree.contains(&f.tags.cube))
            .map(|f| f.path.clone())
            .collect();
        groups.push(OptimizeGroup {
            root: root.clone(),
            cubes: cubes_in_subtree,
            file_paths,
        });
    }

    Ok(OptimizePlan { groups })
}
