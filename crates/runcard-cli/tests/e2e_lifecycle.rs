//! E2E CLI tests covering:
//! - Workspace setup and the not-initialized error contract
//! - Project creation, header validation and step editing
//! - Ordered check-in/out (`rc start/finish/skip/unskip`)
//! - Bulk delete with container pruning
//! - Templates and CSV export
//!
//! Each test runs `rc` as a subprocess in an isolated temp directory.

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::path::Path;
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Test Harness
// ---------------------------------------------------------------------------

/// Build a Command targeting the rc binary, rooted in `dir`.
fn rc_cmd(dir: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("rc"));
    cmd.current_dir(dir);
    cmd.env("RUNCARD_LOG", "error");
    cmd.env("XDG_CONFIG_HOME", dir.join(".config"));
    cmd.env_remove("FORMAT");
    cmd
}

fn init_workspace(dir: &Path) {
    rc_cmd(dir).args(["init"]).assert().success();
}

/// Run a command with `--json` and parse stdout, asserting success.
fn rc_json(dir: &Path, args: &[&str]) -> Value {
    let output = rc_cmd(dir)
        .args(args)
        .arg("--json")
        .output()
        .expect("rc should not crash");
    assert!(
        output.status.success(),
        "rc {args:?} failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("--json should produce valid JSON")
}

/// Run a command expected to fail and return its JSON error object.
fn rc_json_err(dir: &Path, args: &[&str]) -> Value {
    let output = rc_cmd(dir)
        .args(args)
        .arg("--json")
        .output()
        .expect("rc should not crash");
    assert!(!output.status.success(), "rc {args:?} unexpectedly succeeded");
    let json: Value =
        serde_json::from_slice(&output.stderr).expect("errors should be JSON on stderr");
    json["error"].clone()
}

/// Create a project and return its JSON.
fn create_project(dir: &Path, product_id: &str, lots: &[&str]) -> Value {
    let mut args = vec!["create", "--product-id", product_id];
    for lot in lots {
        args.push("--lot");
        args.push(lot);
    }
    rc_json(dir, &args)
}

fn str_at<'a>(value: &'a Value, pointer: &str) -> &'a str {
    value
        .pointer(pointer)
        .and_then(Value::as_str)
        .unwrap_or_else(|| panic!("missing string at {pointer} in {value}"))
}

// ---------------------------------------------------------------------------
// Setup
// ---------------------------------------------------------------------------

#[test]
fn commands_outside_a_workspace_report_not_initialized() {
    let dir = TempDir::new().expect("tempdir");
    let err = rc_json_err(dir.path(), &["list"]);
    assert_eq!(err["error_code"], "E1001");

    rc_cmd(dir.path())
        .args(["lots", "--format", "text"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("error[E1001]"))
        .stderr(predicate::str::contains("rc init"));
}

#[test]
fn init_twice_needs_force() {
    let dir = TempDir::new().expect("tempdir");
    init_workspace(dir.path());
    assert!(dir.path().join(".runcard/config.toml").exists());
    rc_cmd(dir.path()).args(["init"]).assert().failure();
    rc_cmd(dir.path()).args(["init", "--force"]).assert().success();
}

#[test]
fn sqlite_backend_round_trips_projects() {
    let dir = TempDir::new().expect("tempdir");
    rc_cmd(dir.path())
        .args(["init", "--backend", "sqlite"])
        .assert()
        .success();
    create_project(dir.path(), "P-SQL", &["L1"]);
    let shown = rc_json(dir.path(), &["show", "P-SQL"]);
    assert_eq!(str_at(&shown, "/lots/0/lotId"), "L1");
    assert!(dir.path().join(".runcard/runcard.sqlite3").exists());
}

// ---------------------------------------------------------------------------
// Projects
// ---------------------------------------------------------------------------

#[test]
fn create_requires_product_id() {
    let dir = TempDir::new().expect("tempdir");
    init_workspace(dir.path());
    let err = rc_json_err(dir.path(), &["create", "-f", "Owner=kim"]);
    assert_eq!(err["error_code"], "E2001");
    assert!(err["message"].as_str().unwrap_or("").contains("Product ID"));
}

#[test]
fn new_project_starts_with_one_empty_step_per_lot() {
    let dir = TempDir::new().expect("tempdir");
    init_workspace(dir.path());
    let project = create_project(dir.path(), "P-1", &["L1", "L2"]);
    assert_eq!(project["status"], "init");
    let lots = project["lots"].as_array().expect("lots");
    assert_eq!(lots.len(), 2);
    for lot in lots {
        let groups = lot["stresses"].as_array().expect("groups");
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0]["rowData"].as_array().map(Vec::len), Some(1));
        assert_eq!(groups[0]["rowData"][0]["startTime"], "");
    }
}

#[test]
fn header_set_and_clear() {
    let dir = TempDir::new().expect("tempdir");
    init_workspace(dir.path());
    create_project(dir.path(), "P-1", &[]);

    let set = rc_json(dir.path(), &["header", "set", "P-1", "Owner", "kim"]);
    assert_eq!(set["value"], "kim");
    let cleared = rc_json(dir.path(), &["header", "set", "P-1", "Owner"]);
    assert!(cleared["value"].is_null());

    let err = rc_json_err(dir.path(), &["header", "set", "P-1", "Product ID", ""]);
    assert_eq!(err["error_code"], "E2001");
}

#[test]
fn last_stress_group_cannot_be_removed() {
    let dir = TempDir::new().expect("tempdir");
    init_workspace(dir.path());
    let project = create_project(dir.path(), "P-1", &["L1"]);
    let lot = str_at(&project, "/lots/0/id");
    let group = str_at(&project, "/lots/0/stresses/0/id");

    let err = rc_json_err(dir.path(), &["stress", "rm", "P-1", lot, group]);
    assert_eq!(err["error_code"], "E2002");

    let added = rc_json(dir.path(), &["stress", "add", "P-1", lot]);
    assert_eq!(added["action"], "added");
    rc_json(dir.path(), &["stress", "rm", "P-1", lot, group]);
    let shown = rc_json(dir.path(), &["show", "P-1"]);
    assert_eq!(shown["lots"][0]["stresses"].as_array().map(Vec::len), Some(1));
}

// ---------------------------------------------------------------------------
// Check-in/out
// ---------------------------------------------------------------------------

#[test]
fn steps_check_in_and_out_in_order() {
    let dir = TempDir::new().expect("tempdir");
    init_workspace(dir.path());
    let project = create_project(dir.path(), "P-1", &["L1"]);
    let lot = str_at(&project, "/lots/0/id");
    let group = str_at(&project, "/lots/0/stresses/0/id");
    let first = str_at(&project, "/lots/0/stresses/0/rowData/0/_rid").to_string();
    let added = rc_json(dir.path(), &["step", "add", "P-1", lot, group]);
    let second = str_at(&added, "/rid").to_string();

    let err = rc_json_err(dir.path(), &["start", &second]);
    assert_eq!(err["error_code"], "E2003");

    let started = rc_json(dir.path(), &["start", &first, "--remark", "oven 3"]);
    assert_eq!(started["status"], "in-process");
    assert_eq!(started["step"]["execNote"], "oven 3");
    assert_eq!(rc_json(dir.path(), &["show", "P-1"])["status"], "in-process");

    rc_json(dir.path(), &["finish", &first]);
    rc_json(dir.path(), &["start", &second]);
    let finished = rc_json(dir.path(), &["finish", &second]);
    assert_eq!(finished["status"], "completed");

    let shown = rc_json(dir.path(), &["show", "P-1"]);
    assert_eq!(shown["status"], "completed");
    assert_eq!(shown["progress"]["done"], 2);

    let err = rc_json_err(dir.path(), &["finish", &second]);
    assert_eq!(err["error_code"], "E2003");
}

#[test]
fn skip_then_unskip_reopens_the_step() {
    let dir = TempDir::new().expect("tempdir");
    init_workspace(dir.path());
    create_project(dir.path(), "P-1", &["L1"]);

    let skipped = rc_json(dir.path(), &["skip", "0-0-0-0"]);
    assert_eq!(skipped["status"], "skipped");
    assert_eq!(skipped["step"]["endTime"], "SKIPPED");
    assert_eq!(rc_json(dir.path(), &["show", "P-1"])["status"], "completed");

    let unskipped = rc_json(dir.path(), &["unskip", "0-0-0-0"]);
    assert_eq!(unskipped["status"], "init");
    assert_eq!(rc_json(dir.path(), &["show", "P-1"])["status"], "init");

    let err = rc_json_err(dir.path(), &["unskip", "0-0-0-0"]);
    assert_eq!(err["error_code"], "E2003");
}

#[test]
fn stale_row_id_is_rejected() {
    let dir = TempDir::new().expect("tempdir");
    init_workspace(dir.path());
    create_project(dir.path(), "P-1", &["L1"]);
    let err = rc_json_err(dir.path(), &["start", "0-0-0-5"]);
    assert_eq!(err["error_code"], "E3006");
    let err = rc_json_err(dir.path(), &["start", "no-such-rid"]);
    assert_eq!(err["error_code"], "E3004");
}

// ---------------------------------------------------------------------------
// Bulk delete
// ---------------------------------------------------------------------------

#[test]
fn bulk_delete_prunes_empty_containers() {
    let dir = TempDir::new().expect("tempdir");
    init_workspace(dir.path());
    create_project(dir.path(), "P-1", &["L1"]);
    create_project(dir.path(), "P-2", &["L1", "L2"]);

    rc_cmd(dir.path())
        .args(["delete", "0-0-0-0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--yes"));

    let report = rc_json(dir.path(), &["delete", "0-0-0-0", "1-1-0-0", "9-0-0-0", "--yes"]);
    assert_eq!(report["stepsRemoved"], 2);
    assert_eq!(report["lotsPruned"], 2);
    assert_eq!(report["projectsPruned"], 1);
    assert_eq!(report["unmatched"][0], "9-0-0-0");

    let err = rc_json_err(dir.path(), &["show", "P-1"]);
    assert_eq!(err["error_code"], "E3001");
    let survivor = rc_json(dir.path(), &["show", "P-2"]);
    assert_eq!(survivor["lots"].as_array().map(Vec::len), Some(1));
    assert_eq!(str_at(&survivor, "/lots/0/lotId"), "L1");
}

#[test]
fn delete_by_rid() {
    let dir = TempDir::new().expect("tempdir");
    init_workspace(dir.path());
    let project = create_project(dir.path(), "P-1", &["L1"]);
    let rid = str_at(&project, "/lots/0/stresses/0/rowData/0/_rid");
    let report = rc_json(dir.path(), &["delete", "--rid", rid, "--yes"]);
    assert_eq!(report["projectsPruned"], 1);
    let listed = rc_json(dir.path(), &["list"]);
    assert_eq!(listed["total"], 0);
}

// ---------------------------------------------------------------------------
// Templates and export
// ---------------------------------------------------------------------------

#[test]
fn template_captures_shape_without_timestamps() {
    let dir = TempDir::new().expect("tempdir");
    init_workspace(dir.path());
    let project = create_project(dir.path(), "P-1", &["L1"]);
    let lot = str_at(&project, "/lots/0/id");
    rc_json(dir.path(), &["step", "set", "0-0-0-0", "stress=HTOL", "operation=168h"]);
    rc_json(dir.path(), &["start", "0-0-0-0"]);

    let saved = rc_json(dir.path(), &["template", "save", "htol", "P-1", lot]);
    assert_eq!(saved["name"], "htol");

    let created = rc_json(
        dir.path(),
        &["create", "--product-id", "P-2", "-l", "A", "-l", "B", "-t", "htol"],
    );
    for lot in created["lots"].as_array().expect("lots") {
        let step = &lot["stresses"][0]["rowData"][0];
        assert_eq!(step["stress"], "HTOL");
        assert_eq!(step["operation"], "168h");
        assert_eq!(step["startTime"], "");
    }

    let err = rc_json_err(dir.path(), &["create", "--product-id", "P-3", "-t", "nope"]);
    assert_eq!(err["error_code"], "E3005");
    let listed = rc_json(dir.path(), &["list", "-s", "P-3"]);
    assert_eq!(listed["total"], 0);

    rc_cmd(dir.path())
        .args(["template", "apply", "htol", "P-1", lot])
        .assert()
        .failure();

    let templates = rc_json(dir.path(), &["template", "list"]);
    assert_eq!(templates[0]["steps"], 1);
    rc_json(dir.path(), &["template", "rm", "htol"]);
    assert_eq!(rc_json(dir.path(), &["template", "list"]), serde_json::json!([]));
}

#[test]
fn export_writes_bom_prefixed_csv() {
    let dir = TempDir::new().expect("tempdir");
    init_workspace(dir.path());
    create_project(dir.path(), "P-1", &["L1"]);
    rc_json(dir.path(), &["step", "set", "0-0-0-0", "stress=HTOL"]);
    rc_json(dir.path(), &["skip", "0-0-0-0"]);

    let output = rc_cmd(dir.path())
        .args(["export", "P-1", "--lot", "L1"])
        .output()
        .expect("export should not crash");
    assert!(output.status.success());
    let body = String::from_utf8(output.stdout).expect("utf-8");
    assert!(body.starts_with("\u{feff}Category,Field,Value\n"));
    assert!(body.contains("Project Info,Product ID,P-1"));
    assert!(body.contains("Stress: HTOL,Step 1 Start,N/A"));
    assert!(body.contains("Stress: HTOL,Step 1 End,SKIPPED"));

    let saved = rc_json(dir.path(), &["export", "P-1", "--lot", "L1", "--save"]);
    let path = str_at(&saved, "/path");
    assert!(path.ends_with("Report_L1_P-1.csv"));
    assert!(Path::new(path).exists());
}
