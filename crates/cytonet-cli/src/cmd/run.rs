use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use cytonet_core::config::{PipelineConfig, RandomizePolicy, resolve_config};
use cytonet_core::io::{load_mask, load_stack};
use cytonet_core::tracks::load_tracks;
use cytonet_pipeline::{FailureRecord, Orchestrator, RunSummary, write_outputs};
use serde::Serialize;
use std::io::{self, Write};
use std::path::PathBuf;
use tracing::info;

use crate::output::{OutputMode, Renderable, pretty_kv, pretty_section, render};

/// Arguments for `cytonet run`.
#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Image stack (`.npy`, `(t, x, y)` or `(t, x, y, z)`).
    #[arg(long, value_name = "NPY")]
    pub stack: PathBuf,

    /// Region-of-interest mask (`.npy`, `.png`, `.tif`).
    #[arg(long, value_name = "FILE")]
    pub mask: PathBuf,

    /// Directory for tables and graph exports (created if missing).
    #[arg(long, value_name = "DIR")]
    pub out: PathBuf,

    /// Particle tracks (TrackMate `.xml` or a link table) copied into
    /// `out_track.csv` and summarized in `out_track_summary.csv`.
    #[arg(long, value_name = "FILE")]
    pub tracks: Option<PathBuf>,

    /// Config file layered over the user config and the defaults.
    #[arg(long, value_name = "TOML")]
    pub config: Option<PathBuf>,

    #[arg(long, help_heading = "Skeleton")]
    pub line_width: Option<f64>,

    #[arg(long, help_heading = "Skeleton")]
    pub block_size: Option<usize>,

    #[arg(long = "min-size", help_heading = "Skeleton")]
    pub min_component_size: Option<usize>,

    #[arg(long = "fraction", help_heading = "Skeleton")]
    pub intensity_fraction: Option<f64>,

    #[arg(long, value_enum, help_heading = "Randomization")]
    pub policy: Option<PolicyArg>,

    /// Keep randomized networks planar (`true` or `false`).
    #[arg(long, help_heading = "Randomization")]
    pub planar: Option<bool>,

    #[arg(long, help_heading = "Randomization")]
    pub repeats: Option<usize>,

    #[arg(long, help_heading = "Randomization")]
    pub seed: Option<u64>,

    /// Slice spacing in lateral pixel units.
    #[arg(long, help_heading = "Geometry")]
    pub z_spacing: Option<f64>,

    /// Write `out_graph_<N>.gml` for frame N (repeatable).
    #[arg(long = "export-frame", value_name = "N")]
    pub export_frames: Vec<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PolicyArg {
    Weights,
    Full,
}

impl From<PolicyArg> for RandomizePolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::Weights => Self::Weights,
            PolicyArg::Full => Self::Full,
        }
    }
}

impl RunArgs {
    /// Apply command-line overrides on top of a resolved config.
    fn apply_overrides(&self, config: &mut PipelineConfig) {
        if let Some(v) = self.line_width {
            config.skeleton.line_width = v;
        }
        if let Some(v) = self.block_size {
            config.skeleton.block_size = v;
        }
        if let Some(v) = self.min_component_size {
            config.skeleton.min_component_size = v;
        }
        if let Some(v) = self.intensity_fraction {
            config.skeleton.intensity_fraction = v;
        }
        if let Some(v) = self.policy {
            config.randomize.policy = v.into();
        }
        if let Some(v) = self.planar {
            config.randomize.planar = v;
        }
        if let Some(v) = self.repeats {
            config.randomize.repeats = v;
        }
        if let Some(v) = self.seed {
            config.randomize.seed = v;
        }
        if let Some(v) = self.z_spacing {
            config.geometry.z_spacing = v;
        }
    }

    /// Flags over `--config` over the user config over defaults.
    fn effective_config(&self) -> Result<PipelineConfig> {
        let mut config = resolve_config(self.config.as_deref())?;
        self.apply_overrides(&mut config);
        config.validate()?;
        Ok(config)
    }
}

#[derive(Debug, Serialize)]
struct FailureView {
    frame: usize,
    repeat: Option<usize>,
    stage: &'static str,
    code: &'static str,
    message: String,
}

impl From<&FailureRecord> for FailureView {
    fn from(f: &FailureRecord) -> Self {
        Self {
            frame: f.frame,
            repeat: f.repeat,
            stage: f.stage.as_str(),
            code: f.code.code(),
            message: f.message.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
struct RunOutput {
    #[serde(flatten)]
    summary: RunSummary,
    out_dir: String,
    files: Vec<String>,
    failures: Vec<FailureView>,
}

impl Renderable for RunOutput {
    fn render_pretty(&self, w: &mut dyn Write) -> io::Result<()> {
        let s = &self.summary;
        pretty_section(w, "cytonet run")?;
        pretty_kv(w, "frames", s.frames.to_string())?;
        pretty_kv(w, "real graphs", s.real_graphs.to_string())?;
        pretty_kv(w, "randomized graphs", s.randomized_graphs.to_string())?;
        pretty_kv(w, "failed frames", s.failed_frames.to_string())?;
        pretty_kv(w, "failed repeats", s.failed_repeats.to_string())?;
        pretty_kv(w, "output", &self.out_dir)?;
        if !self.failures.is_empty() {
            writeln!(w)?;
            pretty_section(w, "Failures")?;
            for f in &self.failures {
                let unit = f
                    .repeat
                    .map_or_else(|| format!("frame {}", f.frame), |r| format!("frame {} repeat {r}", f.frame));
                writeln!(w, "{:<20} {:<10} {} {}", unit, f.stage, f.code, f.message)?;
            }
        }
        Ok(())
    }

    fn render_text(&self, w: &mut dyn Write) -> io::Result<()> {
        let s = &self.summary;
        writeln!(
            w,
            "frames={} real={} randomized={} failed_frames={} failed_repeats={} out={}",
            s.frames, s.real_graphs, s.randomized_graphs, s.failed_frames, s.failed_repeats, self.out_dir
        )?;
        for f in &self.failures {
            let repeat = f.repeat.map(|r| r.to_string()).unwrap_or_default();
            writeln!(w, "failure frame={} repeat={repeat} stage={} code={}", f.frame, f.stage, f.code)?;
        }
        Ok(())
    }
}

/// Load inputs, run every frame and write the outputs.
///
/// # Errors
///
/// Returns an error for invalid configuration, unreadable inputs or output
/// write failures. Per-frame and per-repeat failures are reported, not
/// returned.
pub fn run_pipeline(args: &RunArgs, output: OutputMode) -> Result<()> {
    let config = args.effective_config()?;

    let frames = load_stack(&args.stack)
        .with_context(|| format!("failed to load stack {}", args.stack.display()))?;
    let mask = load_mask(&args.mask)
        .with_context(|| format!("failed to load mask {}", args.mask.display()))?;
    let tracks = args
        .tracks
        .as_deref()
        .map(load_tracks)
        .transpose()
        .context("failed to load tracks")?;
    info!(frames = frames.len(), repeats = config.randomize.repeats, "inputs loaded");

    let report = Orchestrator::new(config, frames.len())
        .with_export_frames(args.export_frames.iter().copied())
        .run(&frames, &mask);
    let written = write_outputs(&args.out, &report, tracks.as_deref())?;

    let view = RunOutput {
        summary: report.summary(),
        out_dir: args.out.display().to_string(),
        files: written.iter().map(|p| p.display().to_string()).collect(),
        failures: report.failures.iter().map(FailureView::from).collect(),
    };
    render(&view, output)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_config_values() {
        let args = RunArgs {
            line_width: Some(1.5),
            policy: Some(PolicyArg::Full),
            planar: Some(false),
            repeats: Some(3),
            z_spacing: Some(2.0),
            ..RunArgs::default()
        };
        let mut config = PipelineConfig::default();
        args.apply_overrides(&mut config);
        assert!((config.skeleton.line_width - 1.5).abs() < f64::EPSILON);
        assert_eq!(config.randomize.policy, RandomizePolicy::Full);
        assert!(!config.randomize.planar);
        assert_eq!(config.randomize.repeats, 3);
        assert!((config.geometry.z_spacing - 2.0).abs() < f64::EPSILON);
        assert_eq!(config.skeleton.block_size, PipelineConfig::default().skeleton.block_size);
    }

    #[test]
    fn invalid_override_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "").expect("write");
        let args = RunArgs {
            config: Some(path),
            block_size: Some(10),
            ..RunArgs::default()
        };
        let err = args.effective_config().expect_err("even block size");
        assert!(err.to_string().contains("block_size"));
    }

    #[test]
    fn text_summary_lists_failures() {
        let view = RunOutput {
            summary: RunSummary {
                frames: 2,
                real_graphs: 1,
                randomized_graphs: 0,
                failed_frames: 1,
                failed_repeats: 0,
                exported_graphs: 0,
            },
            out_dir: "out".to_string(),
            files: Vec::new(),
            failures: vec![FailureView {
                frame: 1,
                repeat: None,
                stage: "skeleton",
                code: "E2001",
                message: "degenerate volume".to_string(),
            }],
        };
        let mut buf = Vec::new();
        view.render_text(&mut buf).expect("render");
        let text = String::from_utf8(buf).expect("utf8");
        assert!(text.starts_with("frames=2 real=1"));
        assert!(text.contains("failure frame=1 repeat= stage=skeleton code=E2001"));
    }
}
