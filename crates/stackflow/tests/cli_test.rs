#![allow(deprecated)] // TODO: cargo_bin → cargo_bin_cmd! once assert_cmd 2.1 is the floor

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::json;

const TEST_SECRETS_KEY: &str = "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA=";

fn stackflow() -> Command {
    let mut cmd = Command::cargo_bin("stackflow").unwrap();
    cmd.env_remove("STACKFLOW_CONFIG_PATH")
        .env_remove("STACKFLOW_SECRETS_KEY")
        .env_remove("RUST_LOG");
    cmd
}

/// Help lists every subcommand
#[test]
fn test_cli_help() {
    stackflow()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("serve"))
        .stdout(predicate::str::contains("config"))
        .stdout(predicate::str::contains("providers"))
        .stdout(predicate::str::contains("diff"));
}

#[test]
fn test_cli_version() {
    stackflow()
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains("stackflow"));
}

#[test]
fn test_invalid_command() {
    stackflow()
        .arg("apply")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unrecognized subcommand"));
}

/// Every built-in type token is listed
#[test]
fn test_providers_list() {
    stackflow()
        .arg("providers")
        .assert()
        .success()
        .stdout(predicate::str::contains("stackflow:schema:Schema"))
        .stdout(predicate::str::contains("stackflow:provisioners:CopyFile"))
        .stdout(predicate::str::contains("stackflow:provisioners:RemoteExec"));
}

#[test]
fn test_serve_help_shows_retry_options() {
    stackflow()
        .args(["serve", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--retry-attempts"))
        .stdout(predicate::str::contains("--retry-interval"));
}

/// Set then get through a stack file in the working directory
#[test]
fn test_config_set_and_get() {
    let temp_dir = tempfile::tempdir().unwrap();

    stackflow()
        .current_dir(temp_dir.path())
        .args(["config", "set", "dbName", "votes", "--stack", "dev", "--namespace", "votes"])
        .assert()
        .success()
        .stdout(predicate::str::contains("votes:dbName"));

    let written = std::fs::read_to_string(temp_dir.path().join("Stack.dev.yaml")).unwrap();
    assert!(written.contains("votes:dbName"));

    stackflow()
        .current_dir(temp_dir.path())
        .args(["config", "get", "dbName", "--stack", "dev", "--namespace", "votes"])
        .assert()
        .success()
        .stdout("votes\n");
}

#[test]
fn test_config_get_missing_key() {
    let temp_dir = tempfile::tempdir().unwrap();
    let file = temp_dir.path().join("Stack.dev.yaml");
    std::fs::write(&file, "config:\n  votes:dbName: votes\n").unwrap();

    stackflow()
        .args(["config", "get", "dbUser", "--namespace", "votes", "--file"])
        .arg(&file)
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "Missing required configuration variable 'votes:dbUser'",
        ));
}

#[test]
fn test_config_get_missing_file_names_the_path() {
    let temp_dir = tempfile::tempdir().unwrap();
    let file = temp_dir.path().join("Stack.absent.yaml");

    stackflow()
        .args(["config", "get", "dbName", "--file"])
        .arg(&file)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Stack.absent.yaml not found"))
        .stderr(predicate::str::contains("current directory").not());
}

/// Secrets are stored encrypted and masked unless asked for
#[test]
fn test_config_secret_round_trip() {
    let temp_dir = tempfile::tempdir().unwrap();
    let file = temp_dir.path().join("Stack.prod.yaml");

    stackflow()
        .env("STACKFLOW_SECRETS_KEY", TEST_SECRETS_KEY)
        .args(["config", "set", "dbPassword", "hunter2", "--secret", "--namespace", "votes", "--file"])
        .arg(&file)
        .assert()
        .success();

    let written = std::fs::read_to_string(&file).unwrap();
    assert!(written.contains("secure:"));
    assert!(!written.contains("hunter2"));

    stackflow()
        .env("STACKFLOW_SECRETS_KEY", TEST_SECRETS_KEY)
        .args(["config", "list", "--namespace", "votes", "--file"])
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::contains("votes:dbPassword"))
        .stdout(predicate::str::contains("[secret]"))
        .stdout(predicate::str::contains("hunter2").not());

    stackflow()
        .env("STACKFLOW_SECRETS_KEY", TEST_SECRETS_KEY)
        .args(["config", "get", "dbPassword", "--show-secrets", "--namespace", "votes", "--file"])
        .arg(&file)
        .assert()
        .success()
        .stdout("hunter2\n");
}

#[test]
fn test_config_secret_requires_key() {
    let temp_dir = tempfile::tempdir().unwrap();
    let file = temp_dir.path().join("Stack.dev.yaml");

    stackflow()
        .args(["config", "set", "dbPassword", "hunter2", "--secret", "--file"])
        .arg(&file)
        .assert()
        .failure()
        .stderr(predicate::str::contains("STACKFLOW_SECRETS_KEY"));
    assert!(!file.exists());
}

fn schema_inputs(creation_script: &str) -> serde_json::Value {
    json!({
        "creator_name": "admin",
        "creator_password": "hunter2",
        "server_address": "db.example.com",
        "database_name": "votes",
        "creation_script": creation_script,
        "deletion_script": "DROP TABLE votesTable;"
    })
}

#[test]
fn test_diff_reports_delete_replace() {
    let temp_dir = tempfile::tempdir().unwrap();
    let olds = temp_dir.path().join("olds.json");
    let news = temp_dir.path().join("news.json");
    std::fs::write(&olds, schema_inputs("CREATE TABLE t (id int);").to_string()).unwrap();
    std::fs::write(&news, schema_inputs("CREATE TABLE t (id bigint);").to_string()).unwrap();

    stackflow()
        .args(["diff", "stackflow:schema:Schema"])
        .arg(&olds)
        .arg(&news)
        .assert()
        .success()
        .stdout(predicate::str::contains("delete-replace"))
        .stdout(predicate::str::contains("creation_script"));
}

#[test]
fn test_diff_unknown_type() {
    let temp_dir = tempfile::tempdir().unwrap();
    let inputs = temp_dir.path().join("inputs.json");
    std::fs::write(&inputs, "{}").unwrap();

    stackflow()
        .args(["diff", "stackflow:nope:Nope"])
        .arg(&inputs)
        .arg(&inputs)
        .assert()
        .failure()
        .stderr(predicate::str::contains("stackflow:nope:Nope"));
}

/// One response line per request line, on stdout only
#[test]
fn test_serve_answers_on_stdout() {
    let values = schema_inputs("CREATE TABLE t (id int);");
    let requests = [
        json!({
            "method": "diff",
            "type_token": "stackflow:schema:Schema",
            "id": "schema-1",
            "olds": {"values": values},
            "news": {"values": values}
        })
        .to_string(),
        "not json".to_string(),
    ]
    .join("\n");

    let output = stackflow()
        .args(["serve", "--retry-attempts", "1", "--retry-interval", "0"])
        .write_stdin(requests)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let responses: Vec<serde_json::Value> = String::from_utf8(output)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(responses.len(), 2);
    assert_eq!(responses[0]["result"], "diff");
    assert_eq!(responses[0]["changes"], false);
    assert_eq!(responses[1]["result"], "error");
}

#[test]
fn test_serve_rejects_zero_attempts() {
    stackflow()
        .args(["serve", "--retry-attempts", "0"])
        .write_stdin("")
        .assert()
        .failure()
        .stderr(predicate::str::contains("at least 1"));
}
