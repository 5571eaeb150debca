use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;

/// iagent binary with no ambient config or credentials
fn iagent() -> Command {
    let mut cmd = Command::cargo_bin("iagent").expect("Failed to find iagent binary");
    cmd.env_remove("IAGENT_CONFIG")
        .env_remove("IAGENT_MODEL_ID")
        .env_remove("OPENAI_API_KEY")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_help_lists_flags() {
    iagent()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--model-type"))
        .stdout(predicate::str::contains("--tools"))
        .stdout(predicate::str::contains("--execute"));
}

#[test]
fn test_task_is_required() {
    iagent().assert().failure();
}

#[test]
fn test_unknown_model_type() {
    iagent()
        .args(["Check the disk", "--model-type", "foo"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("Unknown model type: foo"));
}

#[test]
fn test_unknown_agent_type() {
    iagent()
        .args(["Check the disk", "--agent-type", "planner"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("Unknown agent type: planner"));
}

#[test]
fn test_unknown_tool_fails_before_running() {
    iagent()
        .env("OPENAI_API_KEY", "test-key")
        .args(["Check the cluster", "--tools", "kubectl"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("Unknown tool: kubectl"))
        .stdout(predicate::str::contains("thinking").not());
}

#[test]
fn test_missing_api_key() {
    iagent()
        .arg("Check the disk")
        .assert()
        .code(1)
        .stdout(predicate::str::contains("OPENAI_API_KEY"));
}

#[test]
fn test_invalid_config_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(b"model_typo: openai\n").unwrap();

    iagent()
        .arg("Check the disk")
        .arg("--config")
        .arg(file.path())
        .assert()
        .code(1)
        .stdout(predicate::str::contains("Failed to parse config file"));
}
