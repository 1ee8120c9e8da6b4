mod common;

use common::{day_result, Backend, TestEnv};
use predicates::str::contains;
use serde_json::Value;
use std::fs;

#[test]
fn files_list_on_fresh_state() {
    let env = TestEnv::new();
    env.cmd()
        .args(["files", "list"])
        .assert()
        .success()
        .stdout(contains("Staff-Planning:"))
        .stdout(contains("No files uploaded yet."));
}

#[test]
fn check_start_lists_missing_documents() {
    let env = TestEnv::new();
    env.cmd()
        .args(["check", "start", "--three-hours"])
        .assert()
        .failure()
        .stderr(contains(
            "Missing required documents: staff-planning, child-planning, child-registration, Checking date",
        ));
}

#[test]
fn json_mode_prints_error_as_one_line() {
    let env = TestEnv::new();
    let out = env
        .cmd()
        .args(["--json", "check", "start", "--date", "2025-01-06"])
        .assert()
        .failure()
        .get_output()
        .stdout
        .clone();
    let text = String::from_utf8(out).unwrap();
    assert_eq!(text.trim_end().lines().count(), 1);
    let v: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(v["error"], "Missing required documents: staff-planning, child-planning");
}

#[test]
fn stored_documents_can_be_selected_and_bad_dates_rejected() {
    let env = TestEnv::new();
    env.cmd()
        .args(["files", "add", "staff-planning", "a1b2c3d4_rooster.pdf"])
        .assert()
        .success()
        .stdout(contains("Added a1b2c3d4 to staff-planning"));
    env.cmd()
        .args(["files", "add", "child-planning", "b1b2c3d4_kids.pdf"])
        .assert()
        .success();

    let out = env
        .cmd()
        .args(["--json", "files", "list", "staff-planning"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let v: Value = serde_json::from_slice(&out).unwrap();
    assert_eq!(v["staff-planning"][0]["objectKey"], "a1b2c3d4");
    assert_eq!(
        v["staff-planning"][0]["fileUrl"],
        "/documents/staff-planning/a1b2c3d4_rooster.pdf"
    );

    env.cmd()
        .args(["check", "start", "--date", "2025-13-40"])
        .assert()
        .failure()
        .stderr(contains("invalid check date"));
}

#[test]
fn files_remove_local_only_keeps_backend_untouched() {
    let env = TestEnv::new();
    env.cmd()
        .args(["files", "add", "staff-planning", "a1b2c3d4_rooster.pdf"])
        .assert()
        .success();
    env.cmd()
        .args(["files", "remove", "a1b2c3d4", "--local-only"])
        .assert()
        .success()
        .stdout(contains("Removed a1b2c3d4"));
    env.cmd()
        .args(["files", "list", "staff-planning"])
        .assert()
        .success()
        .stdout(contains("No files uploaded yet."));
}

#[test]
fn unsupported_upload_type_is_reported_per_file() {
    let env = TestEnv::new();
    let notes = env.write_file("notes.txt", b"hello");
    env.cmd()
        .arg("upload")
        .arg("staff-planning")
        .arg(&notes)
        .assert()
        .failure()
        .stderr(contains("Upload failed for"))
        .stderr(contains("Upload failed"));
}

fn single_json_error(stdout: &[u8]) -> String {
    let text = std::str::from_utf8(stdout).unwrap();
    assert_eq!(text.trim_end().lines().count(), 1, "{text}");
    let v: Value = serde_json::from_str(text).unwrap();
    v["error"].as_str().unwrap().to_string()
}

#[test]
fn json_upload_failure_prints_only_the_error() {
    let env = TestEnv::new();
    let notes = env.write_file("notes.txt", b"hello");
    let out = env
        .cmd()
        .args(["--json", "upload", "staff-planning"])
        .arg(&notes)
        .assert()
        .failure()
        .get_output()
        .stdout
        .clone();
    let error = single_json_error(&out);
    assert!(error.starts_with("Upload failed for "), "{error}");
    assert!(error.contains("notes.txt"), "{error}");
}

#[test]
fn json_failed_check_prints_only_the_error() {
    let env = TestEnv::new();
    let backend = Backend::start();
    let out = env
        .cmd_with(&backend)
        .args(["--json", "check", "progress", "chk-failed"])
        .assert()
        .failure()
        .get_output()
        .stdout
        .clone();
    assert_eq!(single_json_error(&out), "check chk-failed failed: failed");
}

#[test]
fn upload_then_check_end_to_end() {
    let env = TestEnv::new();
    let backend = Backend::start();
    let staff = env.write_file("rooster.pdf", b"%PDF-1.4 staff");
    let kids = env.write_file("kids.pdf", b"%PDF-1.4 kids");

    env.cmd_with(&backend)
        .arg("upload")
        .arg("staff-planning")
        .arg(&staff)
        .assert()
        .success()
        .stdout(contains("-> key00000"));
    env.cmd_with(&backend)
        .arg("upload")
        .arg("child-planning")
        .arg(&kids)
        .assert()
        .success()
        .stdout(contains("-> key00001"));

    env.cmd_with(&backend)
        .args(["check", "start", "--date", "2025-01-06", "--watch"])
        .assert()
        .success()
        .stdout(contains("Check results for 6 January 2025"))
        .stdout(contains("  BKR: Yes (1), No (1)"))
        .stdout(contains("Add 1 staff member between 07:00 and 07:15"));

    let sent = backend.last_check();
    assert_eq!(sent["date"], "06-01-2025");
    assert_eq!(sent["modules"], serde_json::json!(["bkr"]));
    assert_eq!(sent["documentKeys"], serde_json::json!(["key00000", "key00001"]));
    assert_eq!(sent["source"], "flexkids");

    let saved = env.state.join("results/chk-1.json");
    let body: Value = serde_json::from_str(&fs::read_to_string(saved).unwrap()).unwrap();
    assert_eq!(body["result"][1]["day"], "2025-01-06");

    // Without an id, progress falls back to the last started check.
    env.cmd_with(&backend)
        .args(["check", "progress"])
        .assert()
        .success()
        .stdout(contains("Check results for 6 January 2025"));
}

#[test]
fn running_check_prints_progress_line() {
    let env = TestEnv::new();
    let backend = Backend::start();
    env.cmd_with(&backend)
        .args(["check", "progress", "chk-running"])
        .assert()
        .success()
        .stdout(contains("Check chk-running: running (40%)"));
}

#[test]
fn check_list_merges_backend_ids() {
    let env = TestEnv::new();
    let backend = Backend::start();
    let ids = env.run_json(&backend, &["check", "list"]);
    assert_eq!(ids, serde_json::json!(["chk-0", "chk-1"]));
}

#[test]
fn requirements_show_stored_documents() {
    let env = TestEnv::new();
    let backend = Backend::start();
    env.cmd_with(&backend)
        .args(["files", "add", "staff-planning", "a1b2c3d4_rooster.pdf"])
        .assert()
        .success();
    env.cmd_with(&backend)
        .arg("requirements")
        .assert()
        .success()
        .stdout(contains("* a1b2c3d4  rooster.pdf"))
        .stdout(contains("No documentations"));
}

#[test]
fn vgc_list_needs_registration_then_exports() {
    let env = TestEnv::new();
    let backend = Backend::start();
    for (kind, name) in [
        ("staff-planning", "a1b2c3d4_rooster.pdf"),
        ("child-planning", "b1b2c3d4_kids.pdf"),
    ] {
        env.cmd_with(&backend)
            .args(["files", "add", kind, name])
            .assert()
            .success();
    }
    env.cmd_with(&backend)
        .args(["vgc", "create"])
        .assert()
        .failure()
        .stderr(contains("Missing required documents: child-registration"));

    env.cmd_with(&backend)
        .args(["files", "add", "child-registration", "c1b2c3d4_inschrijving.pdf"])
        .assert()
        .success();
    let csv = env.root.join("vgc-list.csv");
    env.cmd_with(&backend)
        .args(["vgc", "create", "--watch", "--export-csv"])
        .arg(&csv)
        .assert()
        .success()
        .stdout(contains("Personeel  Kinderen"))
        .stdout(contains("Bram, Cas"));
    assert_eq!(
        fs::read_to_string(&csv).unwrap(),
        "Personeel,Kinderen\nAnna,\"Bram, Cas\""
    );
}

#[test]
fn show_summarizes_saved_result_offline() {
    let env = TestEnv::new();
    let saved = env.write_file(
        "result.json",
        serde_json::to_string(&day_result()).unwrap().as_bytes(),
    );
    let csv = env.root.join("out/report.csv");
    env.cmd()
        .arg("show")
        .arg(&saved)
        .arg("--export-csv")
        .arg(&csv)
        .assert()
        .success()
        .stdout(contains("Check results for 6 January 2025"))
        .stdout(contains("BKR 07:00-07:15 (1 slice)"));
    let body = fs::read_to_string(&csv).unwrap();
    assert!(body.starts_with("From Time,To Time"), "{body}");
    assert!(!env.state.join("results").exists());
}
