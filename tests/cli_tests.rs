mod common;

use assert_cmd::cargo_bin;
use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::process::Command;
use tempfile::tempdir;

#[test]
fn test_cli_buys_and_exports_numbers() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let catalog = dir.path().join("catalog.csv");
    common::generate_catalog(&catalog, 4)?;

    let mut cmd = Command::new(cargo_bin!("numwatch"));
    cmd.arg(&catalog)
        .arg("--data-dir")
        .arg(dir.path().join("data"))
        .args(["--deposit", "10.00"])
        .args(["--buy", "2"])
        .args(["--success-rate", "1.0"])
        .args(["--seed", "7"]);

    cmd.assert()
        .success()
        .stdout(predicate::str::contains(
            "number_id,listing_id,phone_value",
        ))
        // The two cheapest listings win the cart slots.
        .stdout(predicate::str::contains("sms_10001"))
        .stdout(predicate::str::contains("sms_10002"))
        .stdout(predicate::str::contains("active"));

    Ok(())
}

#[test]
fn test_cli_inventory_survives_across_runs() {
    let dir = tempdir().unwrap();
    let catalog = dir.path().join("catalog.csv");
    common::generate_catalog(&catalog, 4).unwrap();
    let data_dir = dir.path().join("data");

    let mut cmd1 = Command::new(cargo_bin!("numwatch"));
    cmd1.arg(&catalog)
        .arg("--data-dir")
        .arg(&data_dir)
        .args(["--buy", "1"])
        .args(["--success-rate", "1.0"])
        .args(["--seed", "1"]);

    let output1 = cmd1.output().expect("failed to execute command");
    assert!(output1.status.success());
    let stdout1 = String::from_utf8_lossy(&output1.stdout);
    assert_eq!(stdout1.lines().count(), 2, "header plus one owned number");

    // Second run reloads the same data dir, buys one more, exports both.
    let mut cmd2 = Command::new(cargo_bin!("numwatch"));
    cmd2.arg(&catalog)
        .arg("--data-dir")
        .arg(&data_dir)
        .args(["--buy", "1"])
        .args(["--success-rate", "1.0"])
        .args(["--seed", "2"]);

    let output2 = cmd2.output().expect("failed to execute command");
    assert!(output2.status.success());
    let stdout2 = String::from_utf8_lossy(&output2.stdout);
    assert_eq!(stdout2.lines().count(), 3, "header plus two owned numbers");
}

#[test]
fn test_cli_clear_journal_requires_confirmation() {
    let dir = tempdir().unwrap();
    let catalog = dir.path().join("catalog.csv");
    common::generate_catalog(&catalog, 1).unwrap();

    let mut cmd = Command::new(cargo_bin!("numwatch"));
    cmd.arg(&catalog)
        .arg("--data-dir")
        .arg(dir.path().join("data"))
        .arg("--clear-journal");

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("pass --yes"));
}

#[test]
fn test_cli_empty_catalog_exports_nothing() {
    let dir = tempdir().unwrap();
    let catalog = dir.path().join("catalog.csv");
    common::generate_catalog(&catalog, 0).unwrap();

    let mut cmd = Command::new(cargo_bin!("numwatch"));
    cmd.arg(&catalog)
        .arg("--data-dir")
        .arg(dir.path().join("data"))
        .args(["--buy", "2"]);

    cmd.assert().success().stdout(predicate::str::is_empty());
}

#[test]
fn test_cli_failed_orders_leave_inventory_empty() {
    let dir = tempdir().unwrap();
    let catalog = dir.path().join("catalog.csv");
    common::generate_catalog(&catalog, 3).unwrap();

    let mut cmd = Command::new(cargo_bin!("numwatch"));
    cmd.arg(&catalog)
        .arg("--data-dir")
        .arg(dir.path().join("data"))
        .args(["--buy", "2"])
        .args(["--success-rate", "0.0"])
        .args(["--seed", "7"]);

    cmd.assert().success().stdout(predicate::str::is_empty());
}
