use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::TempDir;

fn dockwright() -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("dockwright");
    for name in [
        "APP_CLIENT_ID",
        "APP_API_URL",
        "GITHUB_EVENT_NAME",
        "GITHUB_REF",
        "GITHUB_SHA",
        "RUST_LOG",
    ] {
        cmd.env_remove(name);
    }
    cmd
}

/// Minimal wrapped application under `app/`.
fn web_project() -> TempDir {
    let tmp = TempDir::new().unwrap();
    std::fs::create_dir(tmp.path().join("app")).unwrap();
    std::fs::write(tmp.path().join("app/package.json"), r#"{"name":"web"}"#).unwrap();
    tmp
}

// ── Help / Version ──

#[test]
fn shows_help() {
    dockwright()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("container images"));
}

#[test]
fn shows_version() {
    dockwright()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("dockwright"));
}

// ── Init ──

#[test]
fn init_creates_config_and_env_example() {
    let tmp = TempDir::new().unwrap();

    dockwright()
        .current_dir(tmp.path())
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("Created dockwright.toml"));

    let config = std::fs::read_to_string(tmp.path().join("dockwright.toml")).unwrap();
    assert!(config.contains("[[registries]]"));
    let env = std::fs::read_to_string(tmp.path().join(".env.example")).unwrap();
    assert!(env.contains("APP_CLIENT_ID"));
    assert!(env.contains("APP_API_URL"));
}

#[test]
fn init_skips_existing_files() {
    let tmp = TempDir::new().unwrap();
    std::fs::write(tmp.path().join("dockwright.toml"), "# mine\n").unwrap();

    dockwright()
        .current_dir(tmp.path())
        .arg("init")
        .assert()
        .success()
        .stderr(predicate::str::contains("already exists"));

    let config = std::fs::read_to_string(tmp.path().join("dockwright.toml")).unwrap();
    assert_eq!(config, "# mine\n");
}

#[test]
fn generated_config_loads() {
    let tmp = web_project();

    dockwright().current_dir(tmp.path()).arg("init").assert().success();

    dockwright()
        .current_dir(tmp.path())
        .args(["config", "--set", "APP_CLIENT_ID=abc"])
        .assert()
        .success();
}

// ── Config ──

#[test]
fn config_shows_origin_of_each_value() {
    let tmp = web_project();
    std::fs::write(tmp.path().join(".env"), "APP_CLIENT_ID=from-file\nLOG_LEVEL=debug\n").unwrap();

    dockwright()
        .current_dir(tmp.path())
        .args(["config", "--set", "APP_CLIENT_ID=from-flag"])
        .env("NODE_ENV", "staging")
        .assert()
        .success()
        .stdout(predicate::str::is_match(r"APP_CLIENT_ID\s+build\s+override\s+from-flag").unwrap())
        .stdout(predicate::str::is_match(r"APP_API_URL\s+build\s+default\s+https://api.example.com").unwrap())
        .stdout(predicate::str::is_match(r"LOG_LEVEL\s+run\s+file\s+debug").unwrap())
        .stdout(predicate::str::is_match(r"NODE_ENV\s+run\s+environment\s+staging").unwrap());
}

#[test]
fn empty_value_counts_as_unset() {
    let tmp = web_project();

    dockwright()
        .current_dir(tmp.path())
        .arg("config")
        .env("APP_CLIENT_ID", "")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("APP_CLIENT_ID"));
}

#[test]
fn malformed_override_is_rejected() {
    let tmp = web_project();

    dockwright()
        .current_dir(tmp.path())
        .args(["config", "--set", "NO_EQUALS_SIGN"])
        .assert()
        .failure();
}

// ── Build: validation gate ──

#[test]
fn build_reports_every_problem_and_runs_no_stage() {
    let tmp = web_project();

    dockwright()
        .current_dir(tmp.path())
        .args(["build", "--set", "APP_API_URL=not a url"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("2 problems"))
        .stderr(predicate::str::contains("APP_CLIENT_ID"))
        .stderr(predicate::str::contains("APP_API_URL"));

    assert!(!tmp.path().join(".dockwright").exists());
}

#[test]
fn build_fails_without_app_dir() {
    let tmp = TempDir::new().unwrap();

    dockwright()
        .current_dir(tmp.path())
        .args(["build", "--set", "APP_CLIENT_ID=abc"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("app"));
}

#[test]
fn scan_rejects_unknown_threshold_before_building() {
    let tmp = web_project();
    std::fs::write(
        tmp.path().join("dockwright.toml"),
        "[scan]\nthreshold = \"severe\"\n",
    )
    .unwrap();

    dockwright()
        .current_dir(tmp.path())
        .args(["scan", "--set", "APP_CLIENT_ID=abc"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("dockwright.toml"));

    assert!(!tmp.path().join(".dockwright").exists());
}

// ── Tags ──

#[test]
fn tags_for_default_branch() {
    let tmp = TempDir::new().unwrap();

    dockwright()
        .current_dir(tmp.path())
        .args(["tags", "--event", "push", "--ref", "refs/heads/main", "--sha", "abc1234"])
        .assert()
        .success()
        .stdout("latest\nmain\nmain-abc1234\n");
}

#[test]
fn tags_for_release_as_json() {
    let tmp = TempDir::new().unwrap();

    dockwright()
        .current_dir(tmp.path())
        .args(["tags", "--event", "push", "--ref", "refs/tags/v2.1.0", "--sha", "abc1234", "--json"])
        .assert()
        .success()
        .stdout(concat!(r#"["v2.1.0","v2.1","v2","2.1.0","2.1","2"]"#, "\n"));
}

#[test]
fn tags_read_github_environment() {
    let tmp = TempDir::new().unwrap();

    dockwright()
        .current_dir(tmp.path())
        .arg("tags")
        .env("GITHUB_EVENT_NAME", "pull_request")
        .env("GITHUB_REF", "refs/pull/42/merge")
        .env("GITHUB_SHA", "abc1234def")
        .assert()
        .success()
        .stdout("pr-42\n");
}

#[test]
fn tags_honor_configured_default_branch() {
    let tmp = TempDir::new().unwrap();
    std::fs::write(
        tmp.path().join("dockwright.toml"),
        "[project]\ndefault_branch = \"trunk\"\n",
    )
    .unwrap();

    dockwright()
        .current_dir(tmp.path())
        .args(["tags", "--event", "push", "--ref", "refs/heads/trunk", "--sha", "abc1234"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("latest\n"));
}

#[test]
fn unrecognized_tag_exits_with_dispatch_status() {
    let tmp = TempDir::new().unwrap();

    dockwright()
        .current_dir(tmp.path())
        .args(["tags", "--event", "push", "--ref", "refs/tags/nightly", "--sha", "abc1234"])
        .assert()
        .code(4)
        .stderr(predicate::str::contains("not a semantic version"));
}

// ── Release ──

#[test]
fn release_with_unmappable_event_builds_nothing() {
    let tmp = web_project();

    dockwright()
        .current_dir(tmp.path())
        .args([
            "release",
            "--event",
            "push",
            "--ref",
            "refs/tags/v1.2.3+build.7",
            "--sha",
            "abc1234",
            "--set",
            "APP_CLIENT_ID=abc",
        ])
        .assert()
        .code(4)
        .stderr(predicate::str::contains("build metadata"));

    assert!(!tmp.path().join(".dockwright").exists());
}

#[test]
fn manual_release_of_a_tag_ref_builds_nothing() {
    let tmp = web_project();

    dockwright()
        .current_dir(tmp.path())
        .args([
            "release",
            "--ref",
            "refs/tags/v1.2.3",
            "--set",
            "APP_CLIENT_ID=abc",
        ])
        .env("GITHUB_EVENT_NAME", "workflow_dispatch")
        .env("GITHUB_SHA", "abc1234def")
        .assert()
        .code(4)
        .stderr(predicate::str::contains("cannot carry reference"));

    assert!(!tmp.path().join(".dockwright").exists());
}

#[test]
fn release_validates_before_planning() {
    let tmp = web_project();

    dockwright()
        .current_dir(tmp.path())
        .args(["release", "--event", "push", "--ref", "refs/heads/main", "--sha", "abc1234"])
        .assert()
        .code(2);
}

// ── Eject ──

#[test]
fn eject_creates_dockerfile_in_work_dir() {
    let tmp = web_project();

    dockwright()
        .current_dir(tmp.path())
        .arg("eject")
        .assert()
        .success()
        .stdout(predicate::str::contains("Ejected"));

    let dockerfile = std::fs::read_to_string(tmp.path().join(".dockwright/Dockerfile")).unwrap();
    assert!(dockerfile.contains("AS deps"));
    assert!(dockerfile.contains("ARG APP_CLIENT_ID"));
    assert!(dockerfile.contains("RUN npm install"));
}

#[test]
fn eject_fails_on_second_run() {
    let tmp = web_project();

    dockwright().current_dir(tmp.path()).arg("eject").assert().success();

    dockwright()
        .current_dir(tmp.path())
        .arg("eject")
        .assert()
        .failure()
        .stderr(predicate::str::contains("already ejected"));
}

// ── CI ──

#[test]
fn ci_init_writes_both_workflows() {
    let tmp = TempDir::new().unwrap();

    dockwright()
        .current_dir(tmp.path())
        .args(["ci", "init"])
        .assert()
        .success()
        .stdout(predicate::str::contains("docker-publish.yml"))
        .stdout(predicate::str::contains("APP_CLIENT_ID"));

    let publish =
        std::fs::read_to_string(tmp.path().join(".github/workflows/docker-publish.yml")).unwrap();
    assert!(publish.contains("dockwright release"));
    let scan =
        std::fs::read_to_string(tmp.path().join(".github/workflows/security-scan.yml")).unwrap();
    assert!(scan.contains("dockwright scan"));
}

#[test]
fn ci_init_refuses_to_overwrite() {
    let tmp = TempDir::new().unwrap();
    let workflows = tmp.path().join(".github/workflows");
    std::fs::create_dir_all(&workflows).unwrap();
    std::fs::write(workflows.join("security-scan.yml"), "custom").unwrap();

    dockwright()
        .current_dir(tmp.path())
        .args(["ci", "init"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));

    assert!(!workflows.join("docker-publish.yml").exists());
    assert_eq!(
        std::fs::read_to_string(workflows.join("security-scan.yml")).unwrap(),
        "custom"
    );
}
