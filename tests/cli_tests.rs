// CLI surface tests for the gym-workflow binary

use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn test_help_lists_workflow_commands() {
    let mut cmd = Command::cargo_bin("gym-workflow").unwrap();

    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("status"))
        .stdout(predicate::str::contains("trainers"))
        .stdout(predicate::str::contains("sessions"))
        .stdout(predicate::str::contains("activate"));
}

#[test]
fn test_activate_help_describes_step_arguments() {
    let mut cmd = Command::cargo_bin("gym-workflow").unwrap();

    cmd.args(["activate", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--branch"))
        .stdout(predicate::str::contains("--trainer"))
        .stdout(predicate::str::contains("--session"))
        .stdout(predicate::str::contains("--complete"));
}

#[test]
fn test_status_requires_registration_id() {
    let mut cmd = Command::cargo_bin("gym-workflow").unwrap();

    cmd.arg("status")
        .assert()
        .failure()
        .stderr(predicate::str::contains("REGISTRATION_ID"));
}
