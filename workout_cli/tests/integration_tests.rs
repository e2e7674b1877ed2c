//! Integration tests for the repset binary.
//!
//! These tests verify end-to-end behavior including:
//! - Building a workout across separate invocations
//! - Drag and swipe gestures over the synthetic list layout
//! - Editing sets
//! - Finishing into the outbox, upload acknowledgement and CSV rollup

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Helper to create a test data directory
fn setup_test_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

/// CLI bound to `data_dir`, with config lookups kept inside it
fn cli(data_dir: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("repset"));
    cmd.env("HOME", data_dir)
        .env("XDG_CONFIG_HOME", data_dir.join("config"))
        .arg("--data-dir")
        .arg(data_dir);
    cmd
}

fn add(data_dir: &Path, exercise_id: &str) {
    cli(data_dir).arg("add").arg(exercise_id).assert().success();
}

fn ack_all(data_dir: &Path) {
    cli(data_dir).args(["ack", "--all"]).assert().success();
}

fn pending_ids(data_dir: &Path) -> Vec<String> {
    let output = cli(data_dir).arg("pending").output().unwrap();
    assert!(output.status.success());
    String::from_utf8(output.stdout)
        .unwrap()
        .lines()
        .map(|line| {
            let value: serde_json::Value = serde_json::from_str(line).unwrap();
            value["id"].as_str().unwrap().to_string()
        })
        .collect()
}

fn stored_supersets(data_dir: &Path) -> serde_json::Map<String, serde_json::Value> {
    let contents = fs::read_to_string(data_dir.join("session/supersets.json"))
        .expect("Failed to read superset store");
    let value: serde_json::Value = serde_json::from_str(&contents).unwrap();
    value.as_object().cloned().unwrap_or_default()
}

#[test]
fn test_cli_help() {
    let temp_dir = setup_test_dir();
    cli(temp_dir.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Superset workout tracker"));
}

#[test]
fn test_catalog_lists_exercises() {
    let temp_dir = setup_test_dir();
    cli(temp_dir.path())
        .arg("catalog")
        .assert()
        .success()
        .stdout(predicate::str::contains("back_squat"))
        .stdout(predicate::str::contains("wall_sit"));
}

#[test]
fn test_empty_workout_show() {
    let temp_dir = setup_test_dir();
    cli(temp_dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("No exercises yet"));
}

#[test]
fn test_add_persists_between_runs() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();

    cli(data_dir)
        .arg("add")
        .arg("pushup")
        .assert()
        .success()
        .stdout(predicate::str::contains("Added Push-up as superset 1"));
    add(data_dir, "plank");

    assert_eq!(stored_supersets(data_dir).len(), 2);

    cli(data_dir)
        .arg("show")
        .assert()
        .success()
        .stdout(predicate::str::contains("Exercise 1"))
        .stdout(predicate::str::contains("1.1 Push-up"))
        .stdout(predicate::str::contains("2.1 Plank"));
}

#[test]
fn test_add_unknown_exercise_fails() {
    let temp_dir = setup_test_dir();
    cli(temp_dir.path())
        .arg("add")
        .arg("jumping_jacks")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown exercise"));
}

#[test]
fn test_drag_onto_superset_merges() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();
    add(data_dir, "pushup");
    add(data_dir, "pullup");

    // Superset 2 sits at y=300; dragging it up lands on superset 1
    cli(data_dir)
        .arg("drag")
        .arg("2.1")
        .arg("--dy=-280")
        .assert()
        .success()
        .stdout(predicate::str::contains("Moved 2.1 into another superset"));

    assert_eq!(stored_supersets(data_dir).len(), 1);
    cli(data_dir)
        .arg("show")
        .assert()
        .success()
        .stdout(predicate::str::contains("Superset 1"))
        .stdout(predicate::str::contains("1.2 Pull-up"));
}

#[test]
fn test_drag_within_superset_reorders() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();
    add(data_dir, "pushup");
    add(data_dir, "pullup");
    cli(data_dir)
        .args(["drag", "2.1", "--dy=-280"])
        .assert()
        .success();

    cli(data_dir)
        .args(["drag", "1.1", "--dy=100"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1.1 now at position 2"));

    cli(data_dir)
        .arg("show")
        .assert()
        .success()
        .stdout(predicate::str::contains("1.1 Pull-up"))
        .stdout(predicate::str::contains("1.2 Push-up"));
}

#[test]
fn test_drag_into_empty_space_splits() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();
    add(data_dir, "pushup");
    add(data_dir, "pullup");
    cli(data_dir)
        .args(["drag", "2.1", "--dy=-280"])
        .assert()
        .success();

    cli(data_dir)
        .args(["drag", "1.2", "--dy=900"])
        .assert()
        .success()
        .stdout(predicate::str::contains("split into its own superset"));

    assert_eq!(stored_supersets(data_dir).len(), 2);
    cli(data_dir)
        .arg("show")
        .assert()
        .success()
        .stdout(predicate::str::contains("Exercise 2"))
        .stdout(predicate::str::contains("2.1 Pull-up"));
}

#[test]
fn test_swipe_threshold() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();
    add(data_dir, "pushup");

    cli(data_dir)
        .args(["swipe", "1.1", "--dx", "300"])
        .assert()
        .success()
        .stdout(predicate::str::contains("snapped back"));
    assert_eq!(stored_supersets(data_dir).len(), 1);

    cli(data_dir)
        .args(["swipe", "1.1", "--dx=-520"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Removed 1.1"));
    assert_eq!(stored_supersets(data_dir).len(), 0);
}

#[test]
fn test_invalid_position_fails() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();
    add(data_dir, "pushup");

    for position in ["1", "1.5", "3.1", "a.b"] {
        cli(data_dir)
            .args(["drag", position, "--dy=50"])
            .assert()
            .failure();
    }
}

#[test]
fn test_done_completes_superset() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();
    add(data_dir, "pushup");

    for _ in 0..2 {
        cli(data_dir)
            .args(["done", "1"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Push-up set done"))
            .stdout(predicate::str::contains("Next: Push-up"));
    }

    cli(data_dir)
        .args(["done", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Superset 1 complete!"));

    cli(data_dir)
        .args(["done", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Nothing left to do"));

    cli(data_dir)
        .arg("show")
        .assert()
        .success()
        .stdout(predicate::str::contains("✓ done"))
        .stdout(predicate::str::contains("3/3 sets"));
}

#[test]
fn test_done_alternates_within_superset() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();
    add(data_dir, "pushup");
    add(data_dir, "pullup");
    cli(data_dir)
        .args(["drag", "2.1", "--dy=-280"])
        .assert()
        .success();

    cli(data_dir)
        .args(["done", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Next: Pull-up"));
    cli(data_dir)
        .args(["done", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Next: Push-up"));
}

#[test]
fn test_finish_writes_outbox_and_clears_session() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();
    add(data_dir, "back_squat");
    cli(data_dir).args(["done", "1"]).assert().success();

    cli(data_dir)
        .arg("finish")
        .assert()
        .success()
        .stdout(predicate::str::contains("1 sets done"));

    let outbox = fs::read_to_string(data_dir.join("outbox/completions.jsonl"))
        .expect("Failed to read outbox");
    assert_eq!(outbox.lines().count(), 1);
    assert!(outbox.contains("\"event\":\"queued\""));
    assert!(outbox.contains("\"setsDone\":1"));
    assert!(outbox.contains("\"back_squat\""));
    assert_eq!(stored_supersets(data_dir).len(), 0);

    cli(data_dir)
        .arg("finish")
        .assert()
        .success()
        .stdout(predicate::str::contains("No workout in progress"));
}

#[test]
fn test_rollup_creates_csv() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();

    for _ in 0..2 {
        add(data_dir, "pushup");
        cli(data_dir).arg("finish").assert().success();
    }
    cli(data_dir)
        .args(["ack", "--all"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Marked 2 workouts uploaded"));

    cli(data_dir)
        .arg("rollup")
        .assert()
        .success()
        .stdout(predicate::str::contains("Rolled up 2 workouts"));

    let csv_content =
        fs::read_to_string(data_dir.join("history.csv")).expect("Failed to read CSV");
    assert!(csv_content.starts_with("workout_id,finished_at,superset_id"));
    // 3 pending rep sets per workout plus the header
    assert_eq!(csv_content.lines().count(), 7);
    assert!(!data_dir.join("outbox/completions.jsonl").exists());
}

#[test]
fn test_rollup_with_cleanup() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();
    add(data_dir, "plank");
    cli(data_dir).arg("finish").assert().success();
    ack_all(data_dir);

    cli(data_dir)
        .args(["rollup", "--cleanup"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Cleaned up 1 processed outbox"));

    let leftovers = fs::read_dir(data_dir.join("outbox"))
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().ends_with(".processed"))
        .count();
    assert_eq!(leftovers, 0);
}

#[test]
fn test_unacknowledged_workouts_stay_pending() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();
    for exercise in ["pushup", "plank"] {
        add(data_dir, exercise);
        cli(data_dir).arg("finish").assert().success();
    }

    let ids = pending_ids(data_dir);
    assert_eq!(ids.len(), 2);

    cli(data_dir)
        .args(["ack", ids[0].as_str()])
        .assert()
        .success()
        .stdout(predicate::str::contains("Marked 1 workouts uploaded"));
    cli(data_dir)
        .args(["ack", ids[0].as_str()])
        .assert()
        .success()
        .stderr(predicate::str::contains("not waiting for upload"));

    cli(data_dir)
        .arg("rollup")
        .assert()
        .success()
        .stdout(predicate::str::contains("Rolled up 1 workouts"))
        .stdout(predicate::str::contains("1 workouts still waiting for upload"));

    assert_eq!(pending_ids(data_dir), vec![ids[1].clone()]);
    let csv_content = fs::read_to_string(data_dir.join("history.csv")).unwrap();
    assert!(csv_content.lines().skip(1).all(|l| l.starts_with(&ids[0])));
}

#[test]
fn test_pending_when_nothing_queued() {
    let temp_dir = setup_test_dir();
    cli(temp_dir.path())
        .arg("pending")
        .assert()
        .success()
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("No workouts waiting for upload"));
}

#[test]
fn test_set_commands() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();
    add(data_dir, "pushup");

    cli(data_dir)
        .args(["add-set", "1.1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1.1 now has 4 sets"));
    cli(data_dir)
        .args(["edit", "1.1", "4", "--value", "12", "--rest", "30"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Updated set 4 of 1.1"));

    let stored = stored_supersets(data_dir);
    let superset = stored.values().next().unwrap();
    let fourth = &superset["exercises"][0]["reps"][3];
    assert_eq!(fourth["value"], 12.0);
    assert_eq!(fourth["rest_time_seconds"], 30);

    cli(data_dir)
        .args(["remove-set", "1.1"])
        .assert()
        .success();
    cli(data_dir)
        .arg("show")
        .assert()
        .success()
        .stdout(predicate::str::contains("0/3 sets"));

    cli(data_dir).args(["done", "1"]).assert().success();
    cli(data_dir)
        .args(["edit", "1.1", "1", "--value", "5"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already completed"));
    cli(data_dir)
        .args(["edit", "1.1", "2", "--load", "20"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not a weighted exercise"));
    cli(data_dir)
        .args(["edit", "1.1", "9", "--value", "5"])
        .assert()
        .failure();
}

#[test]
fn test_add_set_reopens_done_superset() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();
    add(data_dir, "pushup");
    for _ in 0..3 {
        cli(data_dir).args(["done", "1"]).assert().success();
    }

    cli(data_dir).args(["add-set", "1.1"]).assert().success();
    cli(data_dir)
        .args(["done", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Superset 1 complete!"));
    cli(data_dir)
        .arg("show")
        .assert()
        .success()
        .stdout(predicate::str::contains("4/4 sets"));
}

#[test]
fn test_rollup_without_outbox() {
    let temp_dir = setup_test_dir();
    cli(temp_dir.path())
        .arg("rollup")
        .assert()
        .success()
        .stdout(predicate::str::contains("nothing to roll up"));
}
