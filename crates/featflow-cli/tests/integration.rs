#![allow(deprecated)]
use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn featflow(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("featflow").unwrap();
    cmd.current_dir(dir.path()).env("FEATFLOW_ROOT", dir.path());
    cmd
}

fn init_project(dir: &TempDir) {
    featflow(dir).arg("init").assert().success();
}

fn create(dir: &TempDir, name: &str) {
    featflow(dir)
        .args(["feature", "create", name])
        .assert()
        .success();
}

fn transition(dir: &TempDir, name: &str, phase: &str) {
    featflow(dir)
        .args(["feature", "transition", name, phase])
        .assert()
        .success();
}

// ---------------------------------------------------------------------------
// featflow init
// ---------------------------------------------------------------------------

#[test]
fn init_creates_config_and_roots() {
    let dir = TempDir::new().unwrap();
    featflow(&dir).arg("init").assert().success();

    assert!(dir.path().join(".featflow/config.yaml").is_file());
    assert!(dir.path().join("features/wip").is_dir());
    assert!(dir.path().join("features/completed").is_dir());
    assert!(dir.path().join("features/archive").is_dir());
}

#[test]
fn init_is_idempotent() {
    let dir = TempDir::new().unwrap();
    featflow(&dir).arg("init").assert().success();
    featflow(&dir)
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("exists"));
}

#[test]
fn commands_fail_before_init() {
    let dir = TempDir::new().unwrap();
    featflow(&dir)
        .args(["feature", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("featflow init"));
}

// ---------------------------------------------------------------------------
// featflow feature create / list / show
// ---------------------------------------------------------------------------

#[test]
fn feature_create_and_list() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    create(&dir, "checkout-flow");

    assert!(dir
        .path()
        .join("features/wip/checkout-flow/_checkout-flow.md")
        .is_file());
    assert!(!dir
        .path()
        .join("features/wip/checkout-flow/.lock")
        .exists());

    featflow(&dir)
        .args(["feature", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("checkout-flow"))
        .stdout(predicate::str::contains("description"));
}

#[test]
fn feature_create_invalid_name_fails() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);

    for bad in ["Invalid_Name", "invalid name"] {
        featflow(&dir)
            .args(["feature", "create", bad])
            .assert()
            .failure()
            .stderr(predicate::str::contains("invalid feature name"));
    }
}

#[test]
fn feature_create_duplicate_fails() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    create(&dir, "dup");
    featflow(&dir)
        .args(["feature", "create", "dup"])
        .assert()
        .failure();
}

#[test]
fn feature_show_with_parent() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    featflow(&dir)
        .args([
            "feature",
            "create",
            "child",
            "--parent",
            "features/wip/base/_base.md",
            "--relationship",
            "extends checkout",
        ])
        .assert()
        .success();

    featflow(&dir)
        .args(["feature", "show", "child"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Phase:   description"))
        .stdout(predicate::str::contains("extends checkout"));
}

#[test]
fn feature_show_json() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    create(&dir, "as-json");

    let output = featflow(&dir)
        .args(["feature", "show", "as-json", "--json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let json: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(json["feature"]["name"], "as-json");
    assert_eq!(json["feature"]["phase"], "description");
    assert_eq!(json["root"], "wip");
    assert!(json["lock"].is_null());
}

#[test]
fn feature_show_corrupted_reports_path() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    create(&dir, "broken");
    std::fs::write(
        dir.path().join("features/wip/broken/_broken.md"),
        "# no frontmatter here",
    )
    .unwrap();

    featflow(&dir)
        .args(["feature", "show", "broken"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("_broken.md"));

    featflow(&dir)
        .args(["feature", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No wip features."));
}

// ---------------------------------------------------------------------------
// featflow feature transition
// ---------------------------------------------------------------------------

#[test]
fn transition_forward_succeeds() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    create(&dir, "flow");

    featflow(&dir)
        .args(["feature", "transition", "flow", "planning"])
        .assert()
        .success()
        .stdout(predicate::str::contains("from description to planning"));

    let text =
        std::fs::read_to_string(dir.path().join("features/wip/flow/_flow.md")).unwrap();
    assert!(text.contains("phase: planning"));
    assert!(!dir.path().join("features/wip/flow/.lock").exists());
}

#[test]
fn transition_skip_ahead_fails() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    create(&dir, "flow");

    featflow(&dir)
        .args(["feature", "transition", "flow", "execution"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("from description to execution"));
}

#[test]
fn transition_unknown_phase_fails() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    create(&dir, "flow");

    featflow(&dir)
        .args(["feature", "transition", "flow", "shipping"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown phase"));
}

#[test]
fn transition_blocked_by_foreign_lock_then_unlock() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    create(&dir, "held");

    let lock = "locked_at: 2099-01-01T00:00:00Z\nlocked_by: teammate\npid: 4000000\n";
    std::fs::write(dir.path().join("features/wip/held/.lock"), lock).unwrap();

    featflow(&dir)
        .args(["feature", "transition", "held", "planning"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("locked by teammate"));

    featflow(&dir)
        .args(["feature", "unlock", "held"])
        .assert()
        .success()
        .stdout(predicate::str::contains("held by teammate"));

    transition(&dir, "held", "planning");
}

// ---------------------------------------------------------------------------
// featflow feature complete / reopen / archive
// ---------------------------------------------------------------------------

#[test]
fn complete_moves_to_completed_root() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    create(&dir, "done-soon");

    featflow(&dir)
        .args(["feature", "complete", "done-soon"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("expected execution"));

    transition(&dir, "done-soon", "planning");
    transition(&dir, "done-soon", "execution");
    featflow(&dir)
        .args(["feature", "complete", "done-soon"])
        .assert()
        .success();

    assert!(!dir.path().join("features/wip/done-soon").exists());
    assert!(dir
        .path()
        .join("features/completed/done-soon/_done-soon.md")
        .is_file());

    featflow(&dir)
        .args(["feature", "list", "--completed"])
        .assert()
        .success()
        .stdout(predicate::str::contains("cleanup"));
}

#[test]
fn reopen_returns_to_wip_with_improvement() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    create(&dir, "cycle");
    for phase in ["planning", "execution"] {
        transition(&dir, "cycle", phase);
    }
    featflow(&dir)
        .args(["feature", "complete", "cycle"])
        .assert()
        .success();
    featflow(&dir)
        .args(["feature", "reopen", "cycle", "--goal", "too early"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("expected complete"));
    transition(&dir, "cycle", "complete");

    featflow(&dir)
        .args(["feature", "reopen", "cycle", "--goal", "support coupons"])
        .assert()
        .success();

    let text =
        std::fs::read_to_string(dir.path().join("features/wip/cycle/_cycle.md")).unwrap();
    assert!(text.contains("phase: description"));
    assert!(text.contains("goal: support coupons"));
    assert!(text.contains("completed: false"));

    featflow(&dir)
        .args(["feature", "finish-improvement", "cycle"])
        .assert()
        .success();
    let text =
        std::fs::read_to_string(dir.path().join("features/wip/cycle/_cycle.md")).unwrap();
    assert!(text.contains("completed: true"));

    featflow(&dir)
        .args(["feature", "finish-improvement", "cycle"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no open improvement"));
}

#[test]
fn archive_moves_to_archive_root() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    create(&dir, "old-idea");

    featflow(&dir).args(["archive", "old-idea"]).assert().success();

    assert!(!dir.path().join("features/wip/old-idea").exists());
    featflow(&dir)
        .args(["feature", "list", "--archived"])
        .assert()
        .success()
        .stdout(predicate::str::contains("old-idea"));
    featflow(&dir)
        .args(["feature", "show", "old-idea"])
        .assert()
        .failure();
}

// ---------------------------------------------------------------------------
// featflow feature paths / plans
// ---------------------------------------------------------------------------

#[test]
fn paths_are_appended() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    create(&dir, "tracked");

    featflow(&dir)
        .args([
            "feature",
            "paths",
            "tracked",
            "--code",
            "app/Models/Order.php",
            "--test",
            "tests/Unit/OrderTest.php",
        ])
        .assert()
        .success();
    featflow(&dir)
        .args(["feature", "paths", "tracked", "--code", "app/Models/Order.php"])
        .assert()
        .success();

    let output = featflow(&dir)
        .args(["feature", "show", "tracked", "--json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let json: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(json["feature"]["code_paths"].as_array().unwrap().len(), 2);
    assert_eq!(json["feature"]["test_paths"][0], "tests/Unit/OrderTest.php");
}

#[test]
fn plans_lists_plan_documents() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    create(&dir, "planned");
    let planning = dir.path().join("features/wip/planned/planning");
    std::fs::write(planning.join("api_plan_1.md"), "# plan").unwrap();
    std::fs::write(planning.join("scratch.md"), "notes").unwrap();

    featflow(&dir)
        .args(["feature", "plans", "planned"])
        .assert()
        .success()
        .stdout(predicate::str::contains("planning/api_plan_1.md"))
        .stdout(predicate::str::contains("scratch.md").not());
}
