//! Whole-run behaviour on small synthetic stacks.

use cytonet_core::config::{PipelineConfig, RandomizePolicy};
use cytonet_core::error::ErrorCode;
use cytonet_core::volume::{Mask, Volume};
use cytonet_pipeline::report::{REAL_TABLE, RANDOM_TABLE, graph_file_name};
use cytonet_pipeline::{Orchestrator, Stage, write_outputs};
use ndarray::Array2;

const SIDE: usize = 48;

fn cross() -> Volume {
    let mut plane = Array2::from_elem((SIDE, SIDE), 2.0);
    for i in 6..42 {
        for w in 0..3 {
            plane[[23 + w, i]] = 80.0;
            plane[[i, 23 + w]] = 80.0;
        }
    }
    Volume::from_plane(plane)
}

fn blank() -> Volume {
    Volume::from_plane(Array2::from_elem((SIDE, SIDE), 5.0))
}

fn config(repeats: usize) -> PipelineConfig {
    let mut config = PipelineConfig::default();
    config.skeleton.line_width = 1.0;
    config.skeleton.block_size = 15;
    config.skeleton.min_component_size = 5;
    config.randomize.repeats = repeats;
    config.randomize.seed = 11;
    config
}

#[test]
fn blank_frame_fails_alone() {
    let frames = vec![cross(), blank(), cross()];
    let orchestrator = Orchestrator::new(config(3), frames.len());
    let report = orchestrator.run(&frames, &Mask::full(SIDE, SIDE));

    let real: Vec<usize> = report.real.iter().map(|r| r.frame).collect();
    assert_eq!(real, vec![0, 2]);
    assert_eq!(report.randomized.len(), 6);
    let keys: Vec<_> = report.randomized.iter().map(|r| (r.frame, r.repeat)).collect();
    assert_eq!(
        keys,
        vec![(0, Some(0)), (0, Some(1)), (0, Some(2)), (2, Some(0)), (2, Some(1)), (2, Some(2))]
    );

    assert_eq!(report.failures.len(), 1);
    let failure = &report.failures[0];
    assert_eq!(failure.frame, 1);
    assert_eq!(failure.repeat, None);
    assert_eq!(failure.stage, Stage::Skeleton);
    assert_eq!(failure.code, ErrorCode::DegenerateVolume);
}

#[test]
fn identical_frames_give_identical_results() {
    let frames = vec![cross(), cross()];
    let report = Orchestrator::new(config(2), 2).run(&frames, &Mask::full(SIDE, SIDE));
    assert_eq!(report.real[0].record, report.real[1].record);

    // Weight shuffles only permute capacities, so counts match the real graph.
    for row in &report.randomized {
        assert_eq!(row.record.node_count, report.real[0].record.node_count);
        assert_eq!(row.record.edge_count, report.real[0].record.edge_count);
    }
}

#[test]
fn reruns_are_reproducible() {
    let mut cfg = config(4);
    cfg.randomize.policy = RandomizePolicy::Full;
    cfg.randomize.planar = false;
    let frames = vec![cross()];
    let mask = Mask::full(SIDE, SIDE);
    let a = Orchestrator::new(cfg.clone(), 1).run(&frames, &mask);
    let b = Orchestrator::new(cfg, 1).run(&frames, &mask);
    assert_eq!(a.randomized, b.randomized);
    assert_eq!(a.failures, b.failures);
}

#[test]
fn cancelled_frame_is_recorded() {
    let frames = vec![cross(), cross()];
    let orchestrator = Orchestrator::new(config(2), 2);
    orchestrator.cancellation().cancel(0);
    let report = orchestrator.run(&frames, &Mask::full(SIDE, SIDE));

    assert_eq!(report.real.len(), 1);
    assert_eq!(report.real[0].frame, 1);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].code, ErrorCode::Cancelled);
    assert!(report.randomized.iter().all(|r| r.frame == 1));
}

#[test]
fn outputs_include_requested_graphs() {
    let frames = vec![cross(), cross()];
    let report = Orchestrator::new(config(1), 2)
        .with_export_frames([1])
        .run(&frames, &Mask::full(SIDE, SIDE));
    assert_eq!(report.summary().exported_graphs, 1);

    let dir = tempfile::tempdir().expect("tempdir");
    let written = write_outputs(dir.path(), &report, None).expect("outputs");
    assert!(written.contains(&dir.path().join(graph_file_name(1))));
    assert!(!dir.path().join(graph_file_name(0)).exists());

    let biol = std::fs::read_to_string(dir.path().join(REAL_TABLE)).expect("biol");
    assert_eq!(biol.lines().count(), 3);
    let rand = std::fs::read_to_string(dir.path().join(RANDOM_TABLE)).expect("rand");
    assert_eq!(rand.lines().count(), 3);
    let gml = std::fs::read_to_string(dir.path().join(graph_file_name(1))).expect("gml");
    assert!(gml.starts_with("graph ["));
}
