//! End-to-end CLI integration tests
//!
//! These tests use assert_cmd to run the mission-workflow binary against scenario and
//! configuration files written to a temporary directory.

use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs::write;
use std::process::Command;
use tempfile::TempDir;

const SCENARIO: &str = r#"{
    "users": [
        {"id": 1, "name": "Admin", "role": "ADMIN"},
        {"id": 2, "name": "Sara", "role": "USER"},
        {"id": 3, "name": "Reza", "role": "JUDGE"},
        {"id": 4, "name": "Nima", "role": "JUDGE"},
        {"id": 9, "name": "Guest", "role": "OBSERVER"}
    ],
    "products": [{"id": "p-1", "name": "Core"}],
    "actions": [
        {"action": "create_mission", "as": 1, "ref": "launch", "title": "Launch", "product_id": "p-1"},
        {"action": "take_mission", "as": 9, "mission": "launch"},
        {"action": "take_mission", "as": 2, "mission": "launch"},
        {"action": "create_step", "as": 1, "ref": "one", "mission": "launch", "title": "One", "judge_id": 3},
        {"action": "create_step", "as": 1, "ref": "two", "mission": "launch", "title": "Two", "judge_id": 4},
        {"action": "advance_step", "as": 2, "step": "two", "status": "WAITING_JUDGE"},
        {"action": "advance_step", "as": 4, "step": "two", "status": "APPROVED"},
        {"action": "send_chat", "as": 3, "mission": "launch", "text": "Start with step one"}
    ]
}"#;

struct CliTestEnvironment {
    temp_dir: TempDir,
}

impl CliTestEnvironment {
    fn new() -> Self {
        Self {
            temp_dir: TempDir::new().unwrap(),
        }
    }

    fn file(&self, name: &str, content: &str) -> std::path::PathBuf {
        let path = self.temp_dir.path().join(name);
        write(&path, content).unwrap();
        path
    }

    fn command(&self) -> Command {
        let mut cmd = Command::cargo_bin("mission-workflow").unwrap();
        cmd.current_dir(self.temp_dir.path())
            .env("RUST_LOG", "off")
            .env_remove("MISSION_WORKFLOW__WORKFLOW__ENFORCE_STEP_ORDER");
        cmd
    }
}

#[test]
fn test_help_lists_commands() {
    let env = CliTestEnvironment::new();
    env.command()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("replay"))
        .stdout(predicate::str::contains("transitions"));
}

#[test]
fn test_transitions_lists_targets() {
    let env = CliTestEnvironment::new();
    env.command()
        .args(["transitions", "step", "WAITING_JUDGE"])
        .assert()
        .success()
        .stdout(predicate::str::contains("WAITING_JUDGE -> APPROVED, NEEDS_FIX"));
}

#[test]
fn test_rejected_transition_fails() {
    let env = CliTestEnvironment::new();
    env.command()
        .args(["transitions", "step", "APPROVED", "APPROVED"])
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "cannot move step from APPROVED to APPROVED",
        ));
}

#[test]
fn test_unknown_status_fails() {
    let env = CliTestEnvironment::new();
    env.command()
        .args(["transitions", "mission", "ARCHIVED"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown mission status 'ARCHIVED'"));
}

#[test]
fn test_replay_prints_outcomes_and_notifications() {
    let env = CliTestEnvironment::new();
    let scenario = env.file("scenario.json", SCENARIO);

    env.command()
        .arg("replay")
        .arg(&scenario)
        .assert()
        .success()
        .stdout(predicate::str::contains("#2 take_mission error FORBIDDEN"))
        .stdout(predicate::str::contains("#3 take_mission ok"))
        .stdout(predicate::str::contains("#7 advance_step error INVALID_STATE"))
        .stdout(predicate::str::contains("\"type\":\"CHAT\""))
        .stdout(predicate::str::contains("accepted by Sara"));
}

#[test]
fn test_replay_honours_config_file() {
    let env = CliTestEnvironment::new();
    let scenario = env.file("scenario.json", SCENARIO);
    let config = env.file("custom.toml", "[workflow]\nenforce_step_order = false\n");

    env.command()
        .arg("--config")
        .arg(&config)
        .arg("replay")
        .arg(&scenario)
        .assert()
        .success()
        .stdout(predicate::str::contains("#7 advance_step ok"));
}

#[test]
fn test_replay_of_missing_file_fails() {
    let env = CliTestEnvironment::new();
    env.command()
        .args(["replay", "does-not-exist.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read scenario"));
}
