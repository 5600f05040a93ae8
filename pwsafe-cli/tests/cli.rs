//! End-to-end runs of the `pwsafe` binary against generated vaults.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use pwsafe_core::fixture::{VaultBuilder, FIXTURE_PASSPHRASE};
use pwsafe_core::vault::format::{
    FIELD_EMAIL, FIELD_GROUP, FIELD_NOTES, FIELD_PASSWORD, FIELD_TITLE, FIELD_URL,
    FIELD_USERNAME, FIELD_UUID,
};
use serde_json::Value;
use tempfile::TempDir;

const EXIT_SUCCESS: i32 = 0;
const EXIT_FAILURE: i32 = 1;

fn base_command() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_pwsafe"));
    cmd.env_remove("PWSAFE_FILE");
    cmd.env_remove("PWSAFE_MAX_ITERATIONS");
    cmd.env_remove("RUST_LOG");
    cmd
}

fn run_cmd(args: &[&str], password: &str) -> Output {
    base_command()
        .args(args)
        .env("PWSAFE_PASSWORD", password)
        .output()
        .expect("run pwsafe")
}

fn path_str(path: &Path) -> &str {
    path.to_str().expect("utf-8 path")
}

fn assert_exit(output: &Output, expected: i32) {
    assert_eq!(
        output.status.code(),
        Some(expected),
        "stdout: {}\nstderr: {}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
}

fn write_vault(dir: &TempDir) -> PathBuf {
    let bytes = VaultBuilder::new(FIXTURE_PASSPHRASE)
        .record(&[
            (FIELD_UUID, &[0x11; 16]),
            (FIELD_GROUP, b"Work.Email"),
            (FIELD_TITLE, b"Example"),
            (FIELD_USERNAME, b"alice"),
            (FIELD_PASSWORD, b"secret"),
            (FIELD_URL, b"https://example.com"),
            (FIELD_EMAIL, b"alice@example.com"),
        ])
        .record(&[(FIELD_TITLE, b"Wifi"), (FIELD_NOTES, b"ssid: home")])
        .build();
    let path = dir.path().join("vault.psafe3");
    std::fs::write(&path, bytes).expect("write vault");
    path
}

#[test]
fn export_writes_bitwarden_json() {
    let dir = TempDir::new().unwrap();
    let vault = write_vault(&dir);
    let out = dir.path().join("bitwarden.json");

    let output = run_cmd(
        &["export", "-f", path_str(&vault), "-o", path_str(&out)],
        FIXTURE_PASSPHRASE,
    );
    assert_exit(&output, EXIT_SUCCESS);

    let json: Value = serde_json::from_slice(&std::fs::read(&out).unwrap()).unwrap();
    assert_eq!(json["encrypted"], false);
    assert_eq!(json["folders"][0]["name"], "Work/Email");

    let items = json["items"].as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["name"], "Example");
    assert_eq!(items[0]["login"]["password"], "secret");
    assert_eq!(items[0]["folderId"], json["folders"][0]["id"]);
    assert_eq!(items[1]["type"], 2);
    assert_eq!(items[1]["notes"], "ssid: home");
}

#[test]
fn export_to_stdout() {
    let dir = TempDir::new().unwrap();
    let vault = write_vault(&dir);

    let output = run_cmd(
        &["export", "-f", path_str(&vault), "-o", "-"],
        FIXTURE_PASSPHRASE,
    );
    assert_exit(&output, EXIT_SUCCESS);

    let json: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["items"][0]["login"]["username"], "alice");
}

#[test]
fn file_from_environment() {
    let dir = TempDir::new().unwrap();
    let vault = write_vault(&dir);

    let output = base_command()
        .args(["list"])
        .env("PWSAFE_FILE", &vault)
        .env("PWSAFE_PASSWORD", FIXTURE_PASSPHRASE)
        .output()
        .expect("run pwsafe");
    assert_exit(&output, EXIT_SUCCESS);
    assert!(String::from_utf8_lossy(&output.stdout).contains("Example"));
}

#[test]
fn list_table_hides_passwords() {
    let dir = TempDir::new().unwrap();
    let vault = write_vault(&dir);

    let output = run_cmd(&["list", "-f", path_str(&vault)], FIXTURE_PASSPHRASE);
    assert_exit(&output, EXIT_SUCCESS);

    let stdout = String::from_utf8_lossy(&output.stdout);
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("GROUP"));
    assert!(lines[1].contains("Work.Email"));
    assert!(lines[1].contains("alice"));
    assert!(lines[2].contains("Wifi"));
    assert!(!stdout.contains("secret"));
}

#[test]
fn list_json() {
    let dir = TempDir::new().unwrap();
    let vault = write_vault(&dir);

    let output = run_cmd(&["list", "-f", path_str(&vault), "--json"], FIXTURE_PASSPHRASE);
    assert_exit(&output, EXIT_SUCCESS);

    let json: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json[0]["title"], "Example");
    assert_eq!(json[0]["uuid"], "11111111-1111-1111-1111-111111111111");
    assert_eq!(json[1]["notes"], "ssid: home");
}

#[test]
fn info_reports_header() {
    let dir = TempDir::new().unwrap();
    let vault = write_vault(&dir);

    let output = run_cmd(&["info", "-f", path_str(&vault)], FIXTURE_PASSPHRASE);
    assert_exit(&output, EXIT_SUCCESS);

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("iterations:  2048"));
    assert!(stdout.contains(&format!("salt:        {}", "5a".repeat(32))));
    assert!(stdout.contains("records:     2"));
}

#[test]
fn wrong_password_fails() {
    let dir = TempDir::new().unwrap();
    let vault = write_vault(&dir);
    let out = dir.path().join("bitwarden.json");

    let output = run_cmd(
        &["export", "-f", path_str(&vault), "-o", path_str(&out)],
        "not the passphrase",
    );
    assert_exit(&output, EXIT_FAILURE);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert_eq!(stderr.matches("invalid passphrase").count(), 1, "stderr: {stderr}");
    assert!(!out.exists());
}

#[test]
fn iteration_limit_from_flag() {
    let dir = TempDir::new().unwrap();
    let vault = write_vault(&dir);

    let output = run_cmd(
        &["info", "-f", path_str(&vault), "--max-iterations", "1000"],
        FIXTURE_PASSPHRASE,
    );
    assert_exit(&output, EXIT_FAILURE);
    assert!(String::from_utf8_lossy(&output.stderr).contains("exceeds the configured limit"));
}

#[test]
fn missing_file_fails() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("missing.psafe3");

    let output = run_cmd(&["info", "-f", path_str(&missing)], FIXTURE_PASSPHRASE);
    assert_exit(&output, EXIT_FAILURE);
    assert!(String::from_utf8_lossy(&output.stderr).contains("missing.psafe3"));
}

#[test]
fn unknown_subcommand_fails() {
    let output = run_cmd(&["frobnicate"], FIXTURE_PASSPHRASE);
    assert_exit(&output, EXIT_FAILURE);
}
