use std::fs;
use std::path::PathBuf;

use assert_cmd::Command;
use predicates::prelude::*;

const OVERNIGHT: &str = r#"[
    {"id": "a", "range": {"start": "2024-03-10T22:00:00", "end": "2024-03-11T02:00:00"}}
]"#;

const WEEKLY: &str = r#"[
    {"id": 7, "owner": "alice",
     "range": {"start": "2024-03-04T12:00:00", "end": "2024-03-04T13:00:00"},
     "recurrence": {"frequency": "weekly"}},
    {"id": 8, "owner": "bob",
     "range": {"start": "2024-03-20T09:00:00", "end": "2024-03-20T10:00:00"}}
]"#;

fn blockouts() -> Command {
    let mut cmd = Command::cargo_bin("blockouts").unwrap();
    cmd.env_remove("BLOCKOUTS_TIMEZONE")
        .env_remove("BLOCKOUTS_WEEK_START")
        .env_remove("RUST_LOG");
    cmd
}

fn temp_file(name: &str, contents: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!("blockouts-{}-{name}", std::process::id()));
    fs::write(&path, contents).unwrap();
    path
}

// ── agenda ──────────────────────────────────────────────────────────────────

#[test]
fn test_agenda_splits_overnight_blockout() {
    blockouts()
        .args(["agenda", "--month", "2024-03"])
        .write_stdin(OVERNIGHT)
        .assert()
        .success()
        .stdout(predicate::str::contains("Sun 2024-03-10"))
        .stdout(predicate::str::contains("22:00-24:00  a"))
        .stdout(predicate::str::contains("Mon 2024-03-11"))
        .stdout(predicate::str::contains("00:00-02:00  a"));
}

#[test]
fn test_agenda_date_range_is_inclusive() {
    blockouts()
        .args(["agenda", "--from", "2024-03-10", "--to", "2024-03-10"])
        .write_stdin(OVERNIGHT)
        .assert()
        .success()
        .stdout(predicate::str::contains("22:00-24:00  a"))
        .stdout(predicate::str::contains("2024-03-11").not());
}

#[test]
fn test_agenda_json_groups_by_date() {
    let output = blockouts()
        .args(["agenda", "--month", "2024-03", "--format", "json"])
        .write_stdin(OVERNIGHT)
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let days = json.as_object().unwrap();
    assert_eq!(days.len(), 2);
    assert_eq!(days["2024-03-10"][0]["blockout_id"], "a");
    assert_eq!(days["2024-03-11"][0]["interval"]["start"], "2024-03-11T00:00:00");
}

#[test]
fn test_agenda_empty_window() {
    blockouts()
        .args(["agenda", "--month", "2024-05"])
        .write_stdin(OVERNIGHT)
        .assert()
        .success()
        .stdout(predicate::str::contains("No blockouts in this window"));
}

// ── expand ──────────────────────────────────────────────────────────────────

#[test]
fn test_expand_weekly_series_from_file() {
    let path = temp_file("weekly.json", WEEKLY);
    let output = blockouts()
        .args(["expand", "--month", "2024-03", "--owner", "alice", "--file"])
        .arg(&path)
        .output()
        .unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    let starts: Vec<_> = stdout.lines().map(|l| &l[..10]).collect();
    assert_eq!(
        starts,
        vec!["2024-03-04", "2024-03-11", "2024-03-18", "2024-03-25"]
    );
}

#[test]
fn test_expand_without_owner_includes_everyone() {
    blockouts()
        .args(["expand", "--month", "2024-03"])
        .write_stdin(WEEKLY)
        .assert()
        .success()
        .stdout(predicate::str::contains("2024-03-20 09:00  2024-03-20 10:00  8"));
}

// ── highlights ──────────────────────────────────────────────────────────────

#[test]
fn test_highlights_json() {
    let output = blockouts()
        .args(["highlights", "--month", "2024-03", "--format", "json"])
        .write_stdin(OVERNIGHT)
        .output()
        .unwrap();
    assert!(output.status.success());

    let days: Vec<String> = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(days, vec!["2024-03-10", "2024-03-11"]);
}

#[test]
fn test_highlights_with_padded_month_from_config() {
    let config = temp_file("padded.toml", "pad_to_weeks = true\nweek_start = \"monday\"\n");
    blockouts()
        .args(["highlights", "--month", "2024-03", "--config"])
        .arg(&config)
        .write_stdin(
            r#"[{"id": "p", "range": {"start": "2024-02-26T09:00:00", "end": "2024-02-26T10:00:00"}}]"#,
        )
        .assert()
        .success()
        .stdout("2024-02-26\n");
}

// ── errors ──────────────────────────────────────────────────────────────────

#[test]
fn test_invalid_month_fails() {
    blockouts()
        .args(["agenda", "--month", "March"])
        .write_stdin(OVERNIGHT)
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid --month 'March'"));
}

#[test]
fn test_invalid_range_in_input_fails() {
    blockouts()
        .args(["agenda", "--month", "2024-03"])
        .write_stdin(
            r#"[{"id": 1, "range": {"start": "2024-03-02T00:00:00", "end": "2024-03-01T00:00:00"}}]"#,
        )
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to read blockouts"));
}

#[test]
fn test_month_conflicts_with_date_range() {
    blockouts()
        .args(["agenda", "--month", "2024-03", "--from", "2024-03-01", "--to", "2024-03-02"])
        .write_stdin(OVERNIGHT)
        .assert()
        .failure();
}

#[test]
fn test_bad_timezone_env_fails() {
    blockouts()
        .env("BLOCKOUTS_TIMEZONE", "Mars/Olympus")
        .args(["agenda", "--month", "2024-03"])
        .write_stdin(OVERNIGHT)
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to load config"));
}
