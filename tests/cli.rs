//! End-to-end smoke tests for the packup binary.
//!
//! Every invocation points PACKUP_CONFIG into a temp directory so the
//! suite never touches the real config, cache, or package roots.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn packup(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("packup").expect("binary builds");
    cmd.env("PACKUP_CONFIG", home.path().join("config.toml"));
    cmd.env("HOME", home.path());
    cmd
}

fn write_config(home: &TempDir) {
    let config = format!(
        r#"
[repo]
url = ""

[paths]
plugins_dir = "{0}/plugins"
themes_dir = "{0}/themes"
backups_dir = "{0}/backups"
scratch_dir = "{0}/scratch"
"#,
        home.path().display()
    );
    std::fs::write(home.path().join("config.toml"), config).unwrap();
}

fn install_plugin(home: &TempDir, slug: &str, name: &str, version: &str) {
    let dir = home.path().join("plugins").join(slug);
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(
        dir.join("package.toml"),
        format!("name = \"{name}\"\nversion = \"{version}\"\n"),
    )
    .unwrap();
}

#[test]
fn help_lists_subcommands() {
    let home = TempDir::new().unwrap();
    packup(&home)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("install"))
        .stdout(predicate::str::contains("update"))
        .stdout(predicate::str::contains("backup"))
        .stdout(predicate::str::contains("upgrade"));
}

#[test]
fn version_flag_prints_version() {
    let home = TempDir::new().unwrap();
    packup(&home)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn list_shows_installed_packages() {
    let home = TempDir::new().unwrap();
    write_config(&home);
    install_plugin(&home, "alpha", "Alpha Tools", "1.5");

    packup(&home)
        .args(["list", "--no-remote"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Alpha Tools"))
        .stdout(predicate::str::contains("1.5"));
}

#[test]
fn list_without_packages_says_so() {
    let home = TempDir::new().unwrap();
    write_config(&home);

    packup(&home)
        .args(["list", "--no-remote"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No packages installed"));
}

#[test]
fn outdated_with_empty_repo_reports_up_to_date() {
    let home = TempDir::new().unwrap();
    write_config(&home);
    install_plugin(&home, "alpha", "Alpha Tools", "1.5");

    packup(&home)
        .arg("outdated")
        .assert()
        .success()
        .stdout(predicate::str::contains("up to date"));
}

#[test]
fn install_unknown_slug_fails_with_hint() {
    let home = TempDir::new().unwrap();
    write_config(&home);

    packup(&home)
        .args(["install", "ghost"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("ghost"));
}

#[test]
fn install_requires_a_slug() {
    let home = TempDir::new().unwrap();
    packup(&home).arg("install").assert().failure();
}

#[test]
fn backup_create_then_list_then_restore() {
    let home = TempDir::new().unwrap();
    write_config(&home);
    install_plugin(&home, "alpha", "Alpha Tools", "1.5");

    packup(&home)
        .args(["backup", "create", "alpha"])
        .assert()
        .success()
        .stdout(predicate::str::contains("plugin-alpha-v1.5-"));

    packup(&home)
        .args(["backup", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("plugin-alpha-v1.5-"))
        .stdout(predicate::str::contains("backup.zip"));

    // Damage the install, then restore the newest backup by slug.
    let manifest = home.path().join("plugins/alpha/package.toml");
    std::fs::write(&manifest, "name = \"Broken\"\nversion = \"0.0\"\n").unwrap();

    packup(&home)
        .args(["backup", "restore", "--slug", "alpha"])
        .assert()
        .success()
        .stdout(predicate::str::contains("restored"));

    let restored = std::fs::read_to_string(&manifest).unwrap();
    assert!(restored.contains("Alpha Tools"));
    assert!(restored.contains("1.5"));
}

#[test]
fn restore_missing_backup_fails() {
    let home = TempDir::new().unwrap();
    write_config(&home);

    packup(&home)
        .args(["backup", "restore", "plugin-ghost-backup.zip"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("plugin-ghost-backup.zip"));
}

#[test]
fn cache_clear_runs_on_empty_cache() {
    let home = TempDir::new().unwrap();
    write_config(&home);

    packup(&home)
        .args(["cache", "clear"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Removed 0"));
}

#[test]
fn config_show_prints_repo_url() {
    let home = TempDir::new().unwrap();
    write_config(&home);

    packup(&home)
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[repo]"));
}

#[test]
fn config_set_repo_persists() {
    let home = TempDir::new().unwrap();
    write_config(&home);

    packup(&home)
        .args(["config", "set-repo", "https://r.example.com/repo/"])
        .assert()
        .success();

    packup(&home)
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("https://r.example.com/repo/"));
}

#[test]
fn template_emits_valid_json() {
    let home = TempDir::new().unwrap();
    write_config(&home);

    let output = packup(&home).arg("template").assert().success();
    let stdout = String::from_utf8(output.get_output().stdout.clone()).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert!(parsed.is_array());
}
