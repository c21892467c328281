use assert_cmd::cargo_bin;
use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::io::Write;
use std::process::Command;

mod common;

#[test]
fn test_cli_end_to_end() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::new(cargo_bin!("challenge-escrow"));
    cmd.arg("tests/fixtures/scenarios.csv");

    cmd.assert()
        .success()
        .stdout(predicate::str::starts_with("account,balance\n"))
        .stdout(predicate::str::contains("alice,170\n"))
        .stdout(predicate::str::contains("bob,20\n"))
        .stdout(predicate::str::contains("carol,90\n"))
        .stdout(predicate::str::contains("escrow,0\n"))
        .stdout(predicate::str::contains("commission,20\n"));

    Ok(())
}

#[test]
fn test_cli_reports_rejected_commands() {
    let mut script = tempfile::NamedTempFile::new().unwrap();
    writeln!(script, "at,op,actor,challenge,target,amount,expires_at,title").unwrap();
    writeln!(script, "2024-01-01T00:00:00Z,open,alice").unwrap();
    writeln!(script, "2024-01-01T00:00:00Z,open,bob").unwrap();
    writeln!(script, "2024-01-01T00:00:00Z,deposit,alice,,,50").unwrap();
    // Not enough funds
    writeln!(script, "2024-01-01T00:00:00Z,create,alice,c1,bob,80,2024-01-02T00:00:00Z,Big bet").unwrap();
    // Unknown operation
    writeln!(script, "2024-01-01T00:00:00Z,explode,alice").unwrap();
    // Confirm before accept
    writeln!(script, "2024-01-01T00:00:00Z,create,alice,c2,bob,40,2024-01-02T00:00:00Z,Small bet").unwrap();
    writeln!(script, "2024-01-01T00:00:00Z,confirm,alice,c2").unwrap();

    let mut cmd = Command::new(cargo_bin!("challenge-escrow"));
    cmd.arg(script.path());

    cmd.assert()
        .success()
        .stderr(predicate::str::contains("Error processing command: Insufficient balance"))
        .stderr(predicate::str::contains("Error reading command"))
        .stderr(predicate::str::contains("Cannot confirm a challenge in status pending"))
        .stdout(predicate::str::contains("alice,10\n"))
        .stdout(predicate::str::contains("escrow,40\n"));
}

#[test]
fn test_cli_config_file_overrides_commission() {
    let mut config = tempfile::NamedTempFile::new().unwrap();
    write!(config, r#"{{"fees": {{"commission": "0.25"}}}}"#).unwrap();

    let mut cmd = Command::new(cargo_bin!("challenge-escrow"));
    cmd.arg("tests/fixtures/scenarios.csv")
        .arg("--config")
        .arg(config.path());

    // c2: 25 commission, 20 inspirit, 55 back; c3: 25 commission, 75 paid.
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("alice,155\n"))
        .stdout(predicate::str::contains("carol,75\n"))
        .stdout(predicate::str::contains("commission,50\n"));
}

#[test]
fn test_cli_invalid_config_fails() {
    let mut config = tempfile::NamedTempFile::new().unwrap();
    write!(config, r#"{{"fees": {{"commission": "0.9", "streamer_inspirit": "0.2"}}}}"#).unwrap();

    let mut cmd = Command::new(cargo_bin!("challenge-escrow"));
    cmd.arg("tests/fixtures/scenarios.csv")
        .arg("--config")
        .arg(config.path());

    cmd.assert().failure();
}

#[test]
fn test_cli_generated_chain() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("chain.csv");
    common::generate_script(&path, 20).expect("Failed to generate script");

    let mut cmd = Command::new(cargo_bin!("challenge-escrow"));
    cmd.arg(&path);

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("user0,90\n"))
        .stdout(predicate::str::contains("user5,99\n"))
        .stdout(predicate::str::contains("user19,109\n"))
        .stdout(predicate::str::contains("commission,19\n"))
        .stderr(predicate::str::contains("Error").not());
}
