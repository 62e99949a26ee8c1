//! Tabular and graph outputs of a run.
//!
//! Every table is `;`-delimited with a single header row. Undefined metric
//! values are written as `nan`.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use cytonet_core::tracks::{LINK_COLUMNS, Track};
use cytonet_graph::export::write_gml;
use cytonet_graph::metrics::MetricsRecord;
use tracing::{debug, instrument};

use crate::orchestrator::{FailureRecord, MetricsRow, RunReport};

/// Column header of `out_biol.csv` and `out_rand.csv`.
pub const METRICS_HEADER: [&str; 11] = [
    "time",
    "# nodes",
    "# edges",
    "# connected components",
    "avg. edge capacity",
    "assortativity",
    "avg. path length",
    "CV path length",
    "algebraic connectivity",
    "CV edge angles",
    "crossing number",
];

pub const FAILURE_HEADER: [&str; 5] = ["frame", "repeat", "stage", "code", "message"];

/// Column header of `out_track.csv`, one row per track link.
pub const TRACK_HEADER: [&str; 17] = LINK_COLUMNS;

pub const TRACK_SUMMARY_HEADER: [&str; 7] = [
    "ID",
    "points",
    "t_start",
    "t_end",
    "path_length",
    "mean_speed",
    "mean_intensity",
];

pub const REAL_TABLE: &str = "out_biol.csv";
pub const RANDOM_TABLE: &str = "out_rand.csv";
pub const FAILURE_TABLE: &str = "out_failures.csv";
pub const TRACK_TABLE: &str = "out_track.csv";
pub const TRACK_SUMMARY_TABLE: &str = "out_track_summary.csv";

/// File name of the GML export for `frame`.
#[must_use]
pub fn graph_file_name(frame: usize) -> String {
    format!("out_graph_{frame}.gml")
}

fn writer<W: Write>(out: W) -> csv::Writer<W> {
    csv::WriterBuilder::new().delimiter(b';').from_writer(out)
}

fn optional(value: Option<f64>) -> String {
    value.map_or_else(|| "nan".to_string(), |v| v.to_string())
}

fn metrics_fields(frame: usize, r: &MetricsRecord) -> [String; 11] {
    [
        frame.to_string(),
        r.node_count.to_string(),
        r.edge_count.to_string(),
        r.component_count.to_string(),
        optional(r.avg_capacity),
        optional(r.assortativity),
        optional(r.avg_path_length),
        optional(r.cv_path_length),
        optional(r.algebraic_connectivity),
        optional(r.cv_edge_angles),
        r.crossing_number.to_string(),
    ]
}

/// Write metric rows under [`METRICS_HEADER`]; the `time` column is the
/// frame index.
///
/// # Errors
///
/// Returns an I/O error if writing fails.
pub fn write_metrics<W: Write>(rows: &[MetricsRow], out: W) -> io::Result<()> {
    let mut w = writer(out);
    w.write_record(METRICS_HEADER)?;
    for row in rows {
        w.write_record(metrics_fields(row.frame, &row.record))?;
    }
    w.flush()
}

/// Write the failure ledger; frame-level failures leave `repeat` empty.
///
/// # Errors
///
/// Returns an I/O error if writing fails.
pub fn write_failures<W: Write>(failures: &[FailureRecord], out: W) -> io::Result<()> {
    let mut w = writer(out);
    w.write_record(FAILURE_HEADER)?;
    for f in failures {
        w.write_record([
            f.frame.to_string(),
            f.repeat.map(|r| r.to_string()).unwrap_or_default(),
            f.stage.as_str().to_string(),
            f.code.code().to_string(),
            f.message.clone(),
        ])?;
    }
    w.flush()
}

/// Write one row per link under [`TRACK_HEADER`]. The table reads back
/// through `load_tracks`.
///
/// # Errors
///
/// Returns an I/O error if writing fails.
pub fn write_tracks<W: Write>(tracks: &[Track], out: W) -> io::Result<()> {
    let mut w = writer(out);
    w.write_record(TRACK_HEADER)?;
    for track in tracks {
        for link in &track.links {
            let row = std::iter::once(track.id.to_string()).chain(
                link.source
                    .fields()
                    .into_iter()
                    .chain(link.target.fields())
                    .map(optional),
            );
            w.write_record(row)?;
        }
    }
    w.flush()
}

/// Write one summary row per track with at least one link.
///
/// # Errors
///
/// Returns an I/O error if writing fails.
pub fn write_track_summaries<W: Write>(tracks: &[Track], out: W) -> io::Result<()> {
    let mut w = writer(out);
    w.write_record(TRACK_SUMMARY_HEADER)?;
    for s in tracks.iter().filter_map(Track::summary) {
        w.write_record([
            s.id.to_string(),
            s.points.to_string(),
            s.t_start.to_string(),
            s.t_end.to_string(),
            s.path_length.to_string(),
            optional(s.mean_speed),
            optional(s.mean_intensity),
        ])?;
    }
    w.flush()
}

fn create(dir: &Path, name: &str) -> Result<BufWriter<File>> {
    let path = dir.join(name);
    let file = File::create(&path).with_context(|| format!("failed to create {}", path.display()))?;
    Ok(BufWriter::new(file))
}

/// Write every output of `report` (and `tracks`, when given) into `dir`.
/// Returns the paths written, tables first, then GML files by frame.
///
/// # Errors
///
/// Returns an error if `dir` cannot be created or any file fails to write.
#[instrument(skip(report, tracks), fields(dir = %dir.display()))]
pub fn write_outputs(dir: &Path, report: &RunReport, tracks: Option<&[Track]>) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create output directory {}", dir.display()))?;
    let mut written = Vec::new();

    write_metrics(&report.real, create(dir, REAL_TABLE)?)
        .with_context(|| format!("failed to write {REAL_TABLE}"))?;
    written.push(dir.join(REAL_TABLE));

    write_metrics(&report.randomized, create(dir, RANDOM_TABLE)?)
        .with_context(|| format!("failed to write {RANDOM_TABLE}"))?;
    written.push(dir.join(RANDOM_TABLE));

    write_failures(&report.failures, create(dir, FAILURE_TABLE)?)
        .with_context(|| format!("failed to write {FAILURE_TABLE}"))?;
    written.push(dir.join(FAILURE_TABLE));

    if let Some(tracks) = tracks {
        write_tracks(tracks, create(dir, TRACK_TABLE)?)
            .with_context(|| format!("failed to write {TRACK_TABLE}"))?;
        written.push(dir.join(TRACK_TABLE));

        write_track_summaries(tracks, create(dir, TRACK_SUMMARY_TABLE)?)
            .with_context(|| format!("failed to write {TRACK_SUMMARY_TABLE}"))?;
        written.push(dir.join(TRACK_SUMMARY_TABLE));
    }

    for (&frame, graph) in &report.graphs {
        let name = graph_file_name(frame);
        let mut out = create(dir, &name)?;
        write_gml(graph, &mut out)
            .and_then(|()| out.flush())
            .with_context(|| format!("failed to write {name}"))?;
        written.push(dir.join(name));
    }

    debug!(files = written.len(), "outputs written");
    Ok(written)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
