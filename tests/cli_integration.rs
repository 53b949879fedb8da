use assert_cmd::Command;
use predicates::prelude::*;

fn tdauth_cmd() -> Command {
    Command::cargo_bin("tdauth").unwrap()
}

#[test]
fn help_lists_subcommands() {
    tdauth_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("login"))
        .stdout(predicate::str::contains("token"))
        .stdout(predicate::str::contains("headers"));
}

#[test]
fn missing_configuration_is_an_error() {
    tdauth_cmd()
        .arg("token")
        .env_remove("TDAUTH_CLIENT_ID")
        .env_remove("TDAUTH_REDIRECT_URI")
        .env_remove("TDAUTH_USER")
        .env_remove("TDAUTH_ACCOUNT_ID")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--client-id"));
}
