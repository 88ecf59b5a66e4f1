//! Command-line tests: run the binary against small panel and reaction files.

use assert_cmd::Command;
use predicates::prelude::*;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const PANELS_JSON: &str = r#"{
  "version": "1.0.0",
  "created_at": "2026-01-01T00:00:00Z",
  "panels": [
    {
      "id": "P1",
      "lot_number": "LOT-A",
      "name": "Screen-2",
      "expiration_date": "2030-12-31",
      "markers": ["D", "C", "Kpa", "Xyz"],
      "cells": {
        "1": {"D": "+", "C": "0", "Kpa": "0", "Xyz": "+"},
        "2": {"D": "0", "C": "+", "Kpa": "0", "Xyz": "0"}
      }
    },
    {
      "id": "OLD",
      "lot_number": "LOT-Z",
      "expiration_date": "2020-01-31",
      "markers": ["D"],
      "cells": {
        "1": {"D": "+"}
      }
    }
  ]
}"#;

const REACTIONS_TSV: &str = "panel\tcell\treaction\nP1\t1\t0\nP1\t2\t+\n";

fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path
}

fn fixtures() -> (TempDir, PathBuf, PathBuf) {
    let dir = TempDir::new().unwrap();
    let panels = write(dir.path(), "panels.json", PANELS_JSON);
    let reactions = write(dir.path(), "reactions.tsv", REACTIONS_TSV);
    (dir, panels, reactions)
}

fn solver() -> Command {
    Command::cargo_bin("antigram-solver").unwrap()
}

#[test]
fn test_identify_text() {
    let (_dir, panels, reactions) = fixtures();
    solver()
        .arg("identify")
        .arg("--panels")
        .arg(&panels)
        .arg("--reactions")
        .arg(&reactions)
        .assert()
        .success()
        .stdout(predicate::str::contains("Antibody Identification (2 reactions)"))
        .stdout(predicate::str::contains("Matched:           C"))
        .stdout(predicate::str::contains("Still to rule out: Xyz"));
}

#[test]
fn test_identify_json() {
    let (_dir, panels, reactions) = fixtures();
    let output = solver()
        .args(["--format", "json", "identify"])
        .arg("--panels")
        .arg(&panels)
        .arg("--reactions")
        .arg(&reactions)
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let ruled_out: Vec<&str> = json["ruled_out"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(serde_json::Value::as_str)
        .collect();
    assert!(ruled_out.contains(&"D"));
    assert!(ruled_out.contains(&"Kpa"));
    assert_eq!(json["suspected_antibodies"][0], "C");
}

#[test]
fn test_identify_marker_summary() {
    let (_dir, panels, reactions) = fixtures();
    solver()
        .args(["identify", "--marker", "D", "--format", "tsv"])
        .arg("--panels")
        .arg(&panels)
        .arg("--reactions")
        .arg(&reactions)
        .assert()
        .success()
        .stdout(predicate::str::contains("D\t3\t0\t0\t2\t0.00\ttrue\tfalse\tsingle"));
}

#[test]
fn test_identify_missing_reactions_file() {
    let (dir, panels, _reactions) = fixtures();
    solver()
        .arg("identify")
        .arg("--panels")
        .arg(&panels)
        .arg("--reactions")
        .arg(dir.path().join("missing.tsv"))
        .assert()
        .failure();
}

#[test]
fn test_coverage_reports_missing_marker() {
    let (_dir, panels, _reactions) = fixtures();
    solver()
        .arg("coverage")
        .arg("--panels")
        .arg(&panels)
        .assert()
        .success()
        .stdout(predicate::str::contains("Overall Status: FAILED"))
        .stdout(predicate::str::contains("Missing Markers: Xyz"));
}

#[test]
fn test_coverage_strict_fails() {
    let (_dir, panels, _reactions) = fixtures();
    solver()
        .args(["coverage", "--strict"])
        .arg("--panels")
        .arg(&panels)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Xyz"));
}

#[test]
fn test_rules_list_by_type() {
    solver()
        .args(["rules", "list", "--type", "lowf"])
        .assert()
        .success()
        .stdout(predicate::str::contains("LowF(Kpa)"))
        .stdout(predicate::str::contains("SingleAG").not());
}

#[test]
fn test_rules_show_unknown_marker() {
    solver()
        .args(["rules", "show", "Nope"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No rules target 'Nope'"));
}

#[test]
fn test_rules_export_reloads() {
    let dir = TempDir::new().unwrap();
    let exported = dir.path().join("rules.json");
    solver()
        .args(["rules", "export"])
        .arg(&exported)
        .assert()
        .success();

    solver()
        .args(["rules", "show", "Fya", "--rules"])
        .arg(&exported)
        .assert()
        .success()
        .stdout(predicate::str::contains("Homo[(Fya,Fyb)]"));
}

#[test]
fn test_panels_import_and_list() {
    let dir = TempDir::new().unwrap();
    let grid = write(dir.path(), "grid.csv", "cell,D,C,E\n1,+,0,+\n2,0,+,-\n");
    let catalog = dir.path().join("catalog.json");

    solver()
        .args(["panels", "import", "--id", "NEW", "--lot", "L-7", "--expires", "2031-05-01"])
        .arg(&grid)
        .arg("--output")
        .arg(&catalog)
        .assert()
        .success()
        .stdout(predicate::str::contains("Imported panel NEW"));

    solver()
        .args(["--format", "tsv", "panels", "list", "--catalog"])
        .arg(&catalog)
        .assert()
        .success()
        .stdout(predicate::str::contains("NEW\t\tL-7\t2031-05-01\t2\tD,C,E"));
}

#[test]
fn test_panels_import_duplicate_id_fails() {
    let (dir, panels, _reactions) = fixtures();
    let grid = write(dir.path(), "grid.tsv", "cell\tD\n1\t+\n");
    solver()
        .args(["panels", "import", "--id", "P1", "--lot", "LOT-B", "--catalog"])
        .arg(&panels)
        .arg(&grid)
        .arg("--output")
        .arg(dir.path().join("out.json"))
        .assert()
        .failure();
}

#[test]
fn test_cells_pattern() {
    let (_dir, panels, _reactions) = fixtures();
    solver()
        .args(["--format", "tsv", "cells", "-p", "D=+,C=0"])
        .arg("--panels")
        .arg(&panels)
        .assert()
        .success()
        .stdout(predicate::str::contains("P1\tScreen-2\tLOT-A\t2030-12-31\t1"))
        // OLD does not list C, which reads as untested
        .stdout(predicate::str::contains("OLD").not());
}

#[test]
fn test_cells_excluding_expired() {
    let (_dir, panels, _reactions) = fixtures();
    solver()
        .args(["cells", "-p", "D=+", "--exclude-expired", "--as-of", "2026-06-01"])
        .arg("--panels")
        .arg(&panels)
        .assert()
        .success()
        .stdout(predicate::str::contains("P1 cell 1"))
        .stdout(predicate::str::contains("OLD").not());
}
