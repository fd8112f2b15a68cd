//! # CLI Tests
//!
//! Drives the `voucher-node` binary against a file-backed store in a
//! temporary directory, one process per command, so every step also
//! exercises reopening the store.

use std::path::Path;
use std::process::{Command, Output};

use serde_json::Value;
use tempfile::TempDir;

fn node(data_dir: &Path, role: &str, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_voucher-node"))
        .env_remove("VR_STORAGE_BACKEND")
        .env_remove("VR_PUBLIC_TOKEN_STATUS")
        .env_remove("VR_DEFAULT_EXPIRY_DAYS")
        .env_remove("VR_ORG")
        .env_remove("VR_USER")
        .env_remove("VR_ROLE")
        .env("VR_LOG_LEVEL", "warn")
        .arg("--data-dir")
        .arg(data_dir)
        .arg("--backend")
        .arg("file")
        .arg("--compact")
        .arg("--role")
        .arg(role)
        .args(args)
        .output()
        .expect("spawn voucher-node")
}

fn json(output: &Output) -> Value {
    serde_json::from_slice(&output.stdout).unwrap_or_else(|e| {
        panic!(
            "stdout is not JSON ({}): {}\nstderr: {}",
            e,
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        )
    })
}

#[test]
fn test_issue_validate_redeem_across_processes() {
    let dir = TempDir::new().unwrap();

    let created = node(
        dir.path(),
        "admin",
        &["create-voucher", "--name", "Dessert", "--type", "free-item", "--max-total", "5"],
    );
    assert!(created.status.success());
    let voucher_id = json(&created)["id"].as_str().unwrap().to_string();

    let batch = node(dir.path(), "admin", &["generate", &voucher_id, "-n", "2"]);
    assert!(batch.status.success());
    let batch = json(&batch);
    assert_eq!(batch["created"], 2);
    let token = batch["tokens_preview"][0].as_str().unwrap().to_string();

    let verdict = json(&node(dir.path(), "operator", &["validate", &token]));
    assert_eq!(verdict["valid"], true);

    let redeemed = node(dir.path(), "operator", &["redeem", &token]);
    assert!(redeemed.status.success());
    assert_eq!(json(&redeemed)["redeemed"], true);

    let again = node(dir.path(), "operator", &["redeem", &token]);
    assert_eq!(again.status.code(), Some(1));
    let body = json(&again);
    assert_eq!(body["error"], "invalid");
    assert_eq!(body["reason"], "already_redeemed");

    let stats = json(&node(dir.path(), "admin", &["stats"]));
    assert_eq!(stats["vouchers"], 1);
    assert_eq!(stats["instances"], 2);
    assert_eq!(stats["redeemed"], 1);

    let scans = json(&node(dir.path(), "admin", &["scans"]));
    assert_eq!(scans.as_array().unwrap().len(), 1);
}

#[test]
fn test_operator_cannot_generate() {
    let dir = TempDir::new().unwrap();
    let created = json(&node(
        dir.path(),
        "admin",
        &["create-voucher", "--name", "X", "--type", "fixed", "--value", "3"],
    ));
    let voucher_id = created["id"].as_str().unwrap();

    let denied = node(dir.path(), "operator", &["generate", voucher_id, "-n", "1"]);
    assert_eq!(denied.status.code(), Some(1));
    assert_eq!(json(&denied)["error"], "forbidden");
}

#[test]
fn test_bad_configuration_exits_2() {
    let dir = TempDir::new().unwrap();
    let output = Command::new(env!("CARGO_BIN_EXE_voucher-node"))
        .env("VR_DEFAULT_EXPIRY_DAYS", "0")
        .arg("--data-dir")
        .arg(dir.path())
        .arg("stats")
        .output()
        .expect("spawn voucher-node");
    assert_eq!(output.status.code(), Some(2));
    assert!(output.stdout.is_empty());
}
