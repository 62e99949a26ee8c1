//! End-to-end tests of the `cytonet` binary.

use assert_cmd::Command;
use ndarray::{Array2, Array3};
use ndarray_npy::write_npy;
use predicates::prelude::*;
use std::path::Path;

const SIDE: usize = 48;

fn cytonet() -> Command {
    let mut cmd = Command::cargo_bin("cytonet").expect("binary");
    cmd.env_remove("CYTONET_FORMAT").env("CYTONET_LOG", "off");
    cmd
}

/// Two frames: a bright cross, then a blank plane.
fn write_inputs(dir: &Path) {
    let mut stack = Array3::<f32>::from_elem((2, SIDE, SIDE), 2.0);
    for i in 6..42 {
        for w in 0..3 {
            stack[[0, 23 + w, i]] = 80.0;
            stack[[0, i, 23 + w]] = 80.0;
        }
    }
    write_npy(dir.join("stack.npy"), &stack).expect("stack");
    write_npy(dir.join("mask.npy"), &Array2::<u8>::from_elem((SIDE, SIDE), 1)).expect("mask");
    std::fs::write(
        dir.join("config.toml"),
        "[skeleton]\nline_width = 1.0\nblock_size = 15\nmin_component_size = 5\n\n[randomize]\nrepeats = 2\n",
    )
    .expect("config");
}

#[test]
fn config_prints_defaults_as_toml() {
    cytonet()
        .args(["config", "--format", "text"])
        .env("XDG_CONFIG_HOME", tempfile::tempdir().expect("tempdir").path())
        .assert()
        .success()
        .stdout(predicate::str::contains("[skeleton]").and(predicate::str::contains("z_spacing")));
}

#[test]
fn run_writes_tables_and_reports_the_blank_frame() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_inputs(dir.path());
    let out = dir.path().join("out");

    let assert = cytonet()
        .current_dir(dir.path())
        .args([
            "run", "--stack", "stack.npy", "--mask", "mask.npy", "--out", "out", "--config",
            "config.toml", "--export-frame", "0", "--format", "json",
        ])
        .assert()
        .success();

    let stdout = String::from_utf8(assert.get_output().stdout.clone()).expect("utf8");
    let json: serde_json::Value = serde_json::from_str(&stdout).expect("json summary");
    assert_eq!(json["frames"], 2);
    assert_eq!(json["real_graphs"], 1);
    assert_eq!(json["randomized_graphs"], 2);
    assert_eq!(json["failed_frames"], 1);
    assert_eq!(json["failures"][0]["code"], "E2001");

    for name in ["out_biol.csv", "out_rand.csv", "out_failures.csv", "out_graph_0.gml"] {
        assert!(out.join(name).exists(), "{name} missing");
    }
    let biol = std::fs::read_to_string(out.join("out_biol.csv")).expect("biol");
    assert!(biol.starts_with("time;# nodes;# edges;"));
}

#[test]
fn invalid_flag_value_fails_before_loading() {
    cytonet()
        .args([
            "run", "--stack", "missing.npy", "--mask", "missing.png", "--out", "out", "--fraction", "2.0",
        ])
        .env("XDG_CONFIG_HOME", tempfile::tempdir().expect("tempdir").path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("intensity_fraction"));
}

#[test]
fn missing_stack_is_an_input_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    cytonet()
        .current_dir(dir.path())
        .env("XDG_CONFIG_HOME", dir.path())
        .args(["run", "--stack", "nope.npy", "--mask", "nope.png", "--out", "out"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to load stack"));
}

#[test]
fn completions_are_generated() {
    cytonet()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("cytonet"));
}
