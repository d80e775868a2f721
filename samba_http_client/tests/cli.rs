#![cfg(all(not(target_arch = "wasm32"), feature = "bin"))]

use assert_cmd::prelude::*; // Add methods on commands
use predicates::prelude::*; // Used for writing assertions
use std::process::Command; // Run programs

const CRATE_NAME: &str = "samba_http_client";
const TRACE: &str = "tests/fixtures/trace.json";

#[test]
fn file_doesnt_exist() -> Result<(), Box<dyn std::error::Error>> {
    replay_command("foobar", &[])?
        .assert()
        .failure()
        .stderr(predicate::str::contains("Could not open file"));

    Ok(())
}

#[test]
fn invalid_url() -> Result<(), Box<dyn std::error::Error>> {
    let url = "localhost";
    Command::cargo_bin(CRATE_NAME)?
        .args(["--url", url, "history"])
        .assert()
        .failure()
        .stderr(predicate::str::contains(format!(
            "invalid value \'{url}\' for '--url <URL>'"
        )));

    Ok(())
}

#[test]
fn unreachable_server_is_retried() -> Result<(), Box<dyn std::error::Error>> {
    Command::cargo_bin(CRATE_NAME)?
        .args(["--url", "http://127.0.0.1:1/samba", "history"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("The request failed after 2 attempts"));

    Ok(())
}

#[test]
fn replay_starts_at_the_beginning() -> Result<(), Box<dyn std::error::Error>> {
    replay_command(TRACE, &[])?
        .assert()
        .success()
        .stdout(predicate::str::contains("BEGIN"))
        .stdout(predicate::str::contains("DO2: reward 0, pulls 0"))
        .stdout(predicate::str::contains("DC knows PaillierPK, PaillierSK"));

    Ok(())
}

#[test]
fn replay_jumps_to_turn() -> Result<(), Box<dyn std::error::Error>> {
    replay_command(TRACE, &["--jump", "4"])?
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "CORE_OF_PROTOCOL STEP_2 turn 4: Each node sends his score to Controller",
        ))
        .stdout(predicate::str::contains("STEP_2 DO0 -> Controller: AES(0.75)"));

    replay_command(TRACE, &["--jump", "4", "--insecure"])?
        .assert()
        .success()
        .stdout(predicate::str::contains("STEP_2 DO0 -> Controller: 1.50"));

    Ok(())
}

#[test]
fn replay_ignores_out_of_range_jumps() -> Result<(), Box<dyn std::error::Error>> {
    replay_command(TRACE, &["--jump", "99"])?
        .assert()
        .success()
        .stdout(predicate::str::contains("jump to '99' ignored"))
        .stdout(predicate::str::contains("turn 3"));

    Ok(())
}

#[test]
fn replay_skips_to_cumulative_reward() -> Result<(), Box<dyn std::error::Error>> {
    replay_command(TRACE, &["--cumulative"])?
        .assert()
        .success()
        .stdout(predicate::str::contains("CUMULATIVE_REWARD_COMPUTATION STEP_6"))
        .stdout(predicate::str::contains("STEP_6 DO0 -> Controller: Paillier(1)"))
        .stdout(predicate::str::contains("STEP_7").not());

    Ok(())
}

#[test]
fn replay_plays_to_the_end() -> Result<(), Box<dyn std::error::Error>> {
    replay_command(TRACE, &["--play", "1", "--focus", "1"])?
        .assert()
        .success()
        .stdout(predicate::str::contains("STEP_6 DO1 -> Controller: Paillier(2)"))
        .stdout(predicate::str::contains("STEP_7 Controller -> DC: Paillier(4)"));

    Ok(())
}

fn replay_command(file: &str, args: &[&str]) -> Result<Command, Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin(CRATE_NAME)?;
    cmd.arg("replay").arg(file).args(args);

    Ok(cmd)
}
