use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn ghe(config: &TempDir, cwd: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("ghe").unwrap();
    cmd.env("GHE_CONFIG_DIR", config.path())
        .env_remove("GHE_TOKEN")
        .env_remove("RUST_LOG")
        .current_dir(cwd.path());
    cmd
}

#[test]
fn test_help_lists_commands() {
    let config = TempDir::new().unwrap();
    let cwd = TempDir::new().unwrap();
    ghe(&config, &cwd)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("switch"))
        .stdout(predicate::str::contains("dl-release"));
}

#[test]
fn test_add_list_remove() {
    let config = TempDir::new().unwrap();
    let cwd = TempDir::new().unwrap();

    ghe(&config, &cwd)
        .args(["list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No accounts configured"));

    ghe(&config, &cwd)
        .args([
            "add",
            "work",
            "--user-name",
            "Jane Doe",
            "--email",
            "jane@corp.com",
            "--ssh-key",
            "~/.ssh/id_work",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Added account 'work'"));
    assert!(config.path().join("config.json").exists());

    ghe(&config, &cwd)
        .args(["add", "WORK"])
        .assert()
        .failure()
        .stderr(predicate::str::starts_with("Error:"));

    ghe(&config, &cwd)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("work"))
        .stdout(predicate::str::contains("<jane@corp.com>"))
        .stdout(predicate::str::contains("[ssh]"));

    ghe(&config, &cwd)
        .args(["remove", "work", "--yes"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Removed account 'work'"));

    ghe(&config, &cwd)
        .args(["remove", "work", "--yes"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Account 'work' not found"));
}

#[test]
fn test_declined_remove_keeps_account() {
    let config = TempDir::new().unwrap();
    let cwd = TempDir::new().unwrap();

    ghe(&config, &cwd).args(["add", "work", "--email", "a@b.c"]).assert().success();

    ghe(&config, &cwd)
        .args(["remove", "work"])
        .write_stdin("n\n")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Operation cancelled"));

    ghe(&config, &cwd)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("work"));
}

#[test]
fn test_token_is_never_printed() {
    let config = TempDir::new().unwrap();
    let cwd = TempDir::new().unwrap();

    ghe(&config, &cwd)
        .args(["add", "oss", "--token-user", "jane", "--token", "ghp_supersecret1234"])
        .assert()
        .success();

    ghe(&config, &cwd)
        .arg("health")
        .assert()
        .stdout(predicate::str::contains("ghp_supersecret1234").not());
}

#[test]
fn test_status_outside_repository() {
    let config = TempDir::new().unwrap();
    let cwd = TempDir::new().unwrap();
    ghe(&config, &cwd)
        .arg("status")
        .assert()
        .failure()
        .stderr(predicate::str::contains("not a git repository"));
}

#[test]
fn test_dl_requires_url() {
    let config = TempDir::new().unwrap();
    let cwd = TempDir::new().unwrap();
    ghe(&config, &cwd).arg("dl").assert().failure();
}

#[test]
fn test_log_empty() {
    let config = TempDir::new().unwrap();
    let cwd = TempDir::new().unwrap();
    ghe(&config, &cwd)
        .args(["log", "-n", "5"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No activity recorded yet"));
}
