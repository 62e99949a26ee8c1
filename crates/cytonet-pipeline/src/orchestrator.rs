//! Frame and repeat orchestration.
//!
//! # Overview
//!
//! Each frame runs independently: skeleton, detection and unification
//! produce one [`SimpleGraph`], which then feeds the real-graph chain and
//! every randomized repeat. Frames fan out over the rayon pool; repeats of a
//! frame fan out again over the same pool and share the simple graph
//! immutably.
//!
//! Failures never stop the run. An error on the frame's own path (skeleton
//! through the real graph's normalization) records one [`FailureRecord`]
//! with `repeat: None` and drops the frame's repeats; an error inside a
//! repeat records the `(frame, repeat)` pair alone. Results are
//! sorted by `(frame, repeat)` after the parallel section so output does
//! not depend on scheduling.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use cytonet_core::config::{PipelineConfig, RandomizePolicy};
use cytonet_core::error::{CytoError, ErrorCode, Result};
use cytonet_core::volume::{Mask, Volume};
use cytonet_extract::{detect_graph, extract_skeleton};
use cytonet_graph::graph::{NormalizedGraph, SimpleGraph, annotate, normalize, repair, unify};
use cytonet_graph::metrics::{MetricsRecord, compute_metrics};
use cytonet_graph::randomize::{randomize, repeat_rng};
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

// ---------------------------------------------------------------------------
// Stage
// ---------------------------------------------------------------------------

/// Pipeline step at which a unit of work aborted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Skeleton,
    Detect,
    Randomize,
    Repair,
    Normalize,
}

impl Stage {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Skeleton => "skeleton",
            Self::Detect => "detect",
            Self::Randomize => "randomize",
            Self::Repair => "repair",
            Self::Normalize => "normalize",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Cancellation
// ---------------------------------------------------------------------------

/// One cancellation flag per frame, checked at every stage boundary.
#[derive(Debug, Default)]
pub struct Cancellation {
    flags: Vec<AtomicBool>,
}

impl Cancellation {
    #[must_use]
    pub fn new(frames: usize) -> Self {
        Self {
            flags: (0..frames).map(|_| AtomicBool::new(false)).collect(),
        }
    }

    /// Request that `frame` stop at its next stage boundary.
    pub fn cancel(&self, frame: usize) {
        if let Some(flag) = self.flags.get(frame) {
            flag.store(true, Ordering::Relaxed);
        }
    }

    #[must_use]
    pub fn is_cancelled(&self, frame: usize) -> bool {
        self.flags
            .get(frame)
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }

    fn check(&self, frame: usize) -> Result<()> {
        if self.is_cancelled(frame) {
            Err(CytoError::Cancelled { frame })
        } else {
            Ok(())
        }
    }
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// One aborted unit of work, with enough context to reproduce it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureRecord {
    pub frame: usize,
    /// `None` when the whole frame aborted.
    pub repeat: Option<usize>,
    pub stage: Stage,
    pub code: ErrorCode,
    pub message: String,
}

impl FailureRecord {
    fn new(frame: usize, repeat: Option<usize>, stage: Stage, err: &CytoError) -> Self {
        let record = Self {
            frame,
            repeat,
            stage,
            code: err.code(),
            message: err.to_string(),
        };
        warn!(
            frame,
            repeat = ?repeat,
            stage = %stage,
            code = %record.code,
            error = %err,
            "unit of work aborted"
        );
        record
    }
}

/// Metrics of one real (`repeat: None`) or randomized graph.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsRow {
    pub frame: usize,
    pub repeat: Option<usize>,
    pub record: MetricsRecord,
}

/// Everything a run produced.
#[derive(Debug, Default)]
pub struct RunReport {
    pub frames: usize,
    /// Real-graph metrics, sorted by frame.
    pub real: Vec<MetricsRow>,
    /// Randomized-graph metrics, sorted by `(frame, repeat)`.
    pub randomized: Vec<MetricsRow>,
    /// Sorted by `(frame, repeat)`, frame-level failures first.
    pub failures: Vec<FailureRecord>,
    /// Normalized real graphs of the frames selected for export.
    pub graphs: BTreeMap<usize, NormalizedGraph>,
}

/// Counts for terminal and JSON summaries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub frames: usize,
    pub real_graphs: usize,
    pub randomized_graphs: usize,
    pub failed_frames: usize,
    pub failed_repeats: usize,
    pub exported_graphs: usize,
}

impl RunReport {
    #[must_use]
    pub fn summary(&self) -> RunSummary {
        let failed_frames = self.failures.iter().filter(|f| f.repeat.is_none()).count();
        RunSummary {
            frames: self.frames,
            real_graphs: self.real.len(),
            randomized_graphs: self.randomized.len(),
            failed_frames,
            failed_repeats: self.failures.len() - failed_frames,
            exported_graphs: self.graphs.len(),
        }
    }
}

/// Tag an error with the stage that raised it.
fn at(stage: Stage) -> impl FnOnce(CytoError) -> (Stage, CytoError) {
    move |err| (stage, err)
}

#[derive(Debug, Default)]
struct FrameOutcome {
    real: Option<MetricsRow>,
    randomized: Vec<MetricsRow>,
    failures: Vec<FailureRecord>,
    graph: Option<NormalizedGraph>,
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// Runs every frame of a stack through extraction, the real-graph chain and
/// the configured number of randomized repeats.
#[derive(Debug)]
pub struct Orchestrator {
    config: PipelineConfig,
    export_frames: BTreeSet<usize>,
    cancellation: Cancellation,
}

impl Orchestrator {
    #[must_use]
    pub fn new(config: PipelineConfig, frames: usize) -> Self {
        Self {
            config,
            export_frames: BTreeSet::new(),
            cancellation: Cancellation::new(frames),
        }
    }

    /// Keep the normalized real graphs of `frames` for export.
    #[must_use]
    pub fn with_export_frames(mut self, frames: impl IntoIterator<Item = usize>) -> Self {
        self.export_frames.extend(frames);
        self
    }

    #[must_use]
    pub const fn cancellation(&self) -> &Cancellation {
        &self.cancellation
    }

    #[must_use]
    pub const fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Process every frame in `frames` against `mask`.
    #[must_use]
    #[instrument(skip_all, fields(frames = frames.len(), repeats = self.config.randomize.repeats))]
    pub fn run(&self, frames: &[Volume], mask: &Mask) -> RunReport {
        let outcomes: Vec<FrameOutcome> = frames
            .par_iter()
            .enumerate()
            .map(|(frame, volume)| self.run_frame(frame, volume, mask))
            .collect();

        let mut report = RunReport {
            frames: frames.len(),
            ..RunReport::default()
        };
        for (frame, outcome) in outcomes.into_iter().enumerate() {
            report.real.extend(outcome.real);
            report.randomized.extend(outcome.randomized);
            report.failures.extend(outcome.failures);
            if let Some(graph) = outcome.graph {
                report.graphs.insert(frame, graph);
            }
        }
        report.randomized.sort_by_key(|row| (row.frame, row.repeat));
        report.failures.sort_by_key(|f| (f.frame, f.repeat));

        let summary = report.summary();
        info!(
            real = summary.real_graphs,
            randomized = summary.randomized_graphs,
            failed_frames = summary.failed_frames,
            failed_repeats = summary.failed_repeats,
            "run complete"
        );
        report
    }

    /// Skeleton, detection and unification of one frame.
    fn simple_graph(&self, frame: usize, volume: &Volume, mask: &Mask) -> Result<SimpleGraph, (Stage, CytoError)> {
        self.cancellation.check(frame).map_err(at(Stage::Skeleton))?;
        let extracted =
            extract_skeleton(volume, mask, &self.config.skeleton).map_err(at(Stage::Skeleton))?;

        self.cancellation.check(frame).map_err(at(Stage::Detect))?;
        let raw = detect_graph(
            &extracted.skeleton,
            &extracted.smoothed,
            self.config.geometry.z_spacing,
        )
        .map_err(at(Stage::Detect))?;
        Ok(unify(&raw))
    }

    #[instrument(skip(self, volume, mask), fields(stage = "frame"))]
    fn run_frame(&self, frame: usize, volume: &Volume, mask: &Mask) -> FrameOutcome {
        let mut outcome = FrameOutcome::default();

        let simple = match self.simple_graph(frame, volume, mask) {
            Ok(simple) => simple,
            Err((stage, err)) => {
                outcome.failures.push(FailureRecord::new(frame, None, stage, &err));
                return outcome;
            }
        };
        debug!(
            nodes = simple.graph.node_count(),
            edges = simple.graph.edge_count(),
            hash = %simple.content_hash,
            "frame unified"
        );

        match self.finish(frame, &simple, mask, false) {
            Ok((normalized, record)) => {
                outcome.real = Some(MetricsRow {
                    frame,
                    repeat: None,
                    record,
                });
                if self.export_frames.contains(&frame) {
                    outcome.graph = Some(normalized);
                }
            }
            Err((stage, err)) => {
                outcome.failures.push(FailureRecord::new(frame, None, stage, &err));
                return outcome;
            }
        }

        let repeats: Vec<std::result::Result<MetricsRow, FailureRecord>> = (0..self.config.randomize.repeats)
            .into_par_iter()
            .map(|repeat| {
                self.run_repeat(frame, repeat, &simple, mask)
                    .map(|record| MetricsRow {
                        frame,
                        repeat: Some(repeat),
                        record,
                    })
                    .map_err(|(stage, err)| FailureRecord::new(frame, Some(repeat), stage, &err))
            })
            .collect();
        for result in repeats {
            match result {
                Ok(row) => outcome.randomized.push(row),
                Err(failure) => outcome.failures.push(failure),
            }
        }
        info!(
            frame,
            randomized = outcome.randomized.len(),
            failed = outcome.failures.len(),
            "frame complete"
        );
        outcome
    }

    fn run_repeat(
        &self,
        frame: usize,
        repeat: usize,
        simple: &SimpleGraph,
        mask: &Mask,
    ) -> Result<MetricsRecord, (Stage, CytoError)> {
        let settings = &self.config.randomize;
        self.cancellation
            .check(frame)
            .map_err(at(Stage::Randomize))?;
        let mut rng = repeat_rng(settings.seed, frame, repeat);
        let raw = randomize(simple, mask, settings, &mut rng).map_err(at(Stage::Randomize))?;
        let planar = settings.policy == RandomizePolicy::Full && settings.planar;
        self.finish(frame, &unify(&raw), mask, planar)
            .map(|(_, record)| record)
    }

    /// Repair, centrality, normalization and metrics, tagging errors with
    /// the stage that raised them.
    fn finish(
        &self,
        frame: usize,
        simple: &SimpleGraph,
        mask: &Mask,
        planar: bool,
    ) -> Result<(NormalizedGraph, MetricsRecord), (Stage, CytoError)> {
        self.cancellation
            .check(frame)
            .map_err(at(Stage::Repair))?;
        let connected = repair(simple, mask, planar).map_err(at(Stage::Repair))?;

        self.cancellation
            .check(frame)
            .map_err(at(Stage::Normalize))?;
        let normalized = normalize(annotate(connected)).map_err(at(Stage::Normalize))?;
        let record = compute_metrics(&normalized);
        Ok((normalized, record))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
