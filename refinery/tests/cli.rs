//! CLI tests for the `refinery` binary.
//!
//! Spawns the binary against temporary projects and verifies exit codes and
//! the files commands leave behind.

use std::fs;
use std::process::Command;

use serde_json::json;

use refinery::core::paths::{config_path, dot_root};
use refinery::exit_codes;
use refinery::io::config::load_config;
use refinery::test_support::TestProject;

fn refinery_cmd(project: &TestProject, args: &[&str]) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_refinery"));
    cmd.arg("--project").arg(project.path()).args(args);
    cmd
}

#[test]
fn unlock_and_lock_toggle_safe_mode() {
    let project = TestProject::new().expect("project");
    let path = config_path(&dot_root(project.path()));

    let status = refinery_cmd(&project, &["unlock"]).status().expect("unlock");
    assert_eq!(status.code(), Some(exit_codes::OK));
    assert!(load_config(&path).expect("config").safe_mode_unlocked);

    let status = refinery_cmd(&project, &["lock"]).status().expect("lock");
    assert_eq!(status.code(), Some(exit_codes::OK));
    assert!(!load_config(&path).expect("config").safe_mode_unlocked);
}

#[test]
fn missing_pipeline_fails() {
    let project = TestProject::new().expect("project");
    let output = refinery_cmd(&project, &["run"]).output().expect("run");
    assert_eq!(output.status.code(), Some(exit_codes::FAILED));
    assert!(String::from_utf8_lossy(&output.stderr).contains("refinery.json"));
}

#[test]
fn empty_pipeline_succeeds() {
    let project = TestProject::new().expect("project");
    project
        .write_pipeline(&json!({"filterDefinitions": {}, "pipeline": []}))
        .expect("write");
    let status = refinery_cmd(&project, &["run"]).status().expect("run");
    assert_eq!(status.code(), Some(exit_codes::OK));
}

#[test]
fn uninstalled_remote_fails_with_install_hint() {
    let project = TestProject::new().expect("project");
    project
        .write_pipeline(&json!({
            "filterDefinitions": {"json_cleaner": {"version": "1.1.1"}},
            "pipeline": [{"filter": "json_cleaner"}]
        }))
        .expect("write");

    let output = refinery_cmd(&project, &["run"]).output().expect("run");
    assert_eq!(output.status.code(), Some(exit_codes::FAILED));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("refinery install json_cleaner"), "{stderr}");
}

#[test]
fn uninstall_requires_defined_filter() {
    let project = TestProject::new().expect("project");
    project
        .write_pipeline(&json!({
            "filterDefinitions": {"json_cleaner": {"version": "1.1.1"}},
            "pipeline": []
        }))
        .expect("write");
    let keep = project.write("src/keep.txt", "keep").expect("write");
    fs::create_dir_all(dot_root(project.path()).join("cache/filters")).expect("mkdir");

    for id in ["ghost", "../../../src", ".."] {
        let output = refinery_cmd(&project, &["uninstall", id])
            .output()
            .expect("uninstall");
        assert_eq!(output.status.code(), Some(exit_codes::FAILED));
        assert!(String::from_utf8_lossy(&output.stderr).contains("is not defined"));
    }
    assert!(keep.is_file());

    let status = refinery_cmd(&project, &["uninstall", "json_cleaner"])
        .status()
        .expect("uninstall");
    assert_eq!(status.code(), Some(exit_codes::OK));
}

#[test]
fn install_rejects_unknown_filter() {
    let project = TestProject::new().expect("project");
    project
        .write_pipeline(&json!({
            "filterDefinitions": {"tool": {"runWith": "exe", "exe": "tool.sh"}},
            "pipeline": []
        }))
        .expect("write");
    let output = refinery_cmd(&project, &["install", "ghost"])
        .output()
        .expect("install");
    assert_eq!(output.status.code(), Some(exit_codes::FAILED));
    assert!(String::from_utf8_lossy(&output.stderr).contains("'ghost'"));

    let status = refinery_cmd(&project, &["install", "tool"])
        .status()
        .expect("install");
    assert_eq!(status.code(), Some(exit_codes::OK));
}

#[cfg(unix)]
#[test]
fn exe_filter_runs_in_project_root() {
    use std::os::unix::fs::PermissionsExt;

    let project = TestProject::new().expect("project");
    let script = project
        .write(
            "tools/stamp.sh",
            "#!/bin/sh\necho \"$1\" > stamp.txt\necho \"$ROOT_DIR\" > root.txt\n",
        )
        .expect("write script");
    fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).expect("chmod");
    project
        .write_pipeline(&json!({
            "filterDefinitions": {"stamp": {"runWith": "exe", "exe": "tools/stamp.sh"}},
            "pipeline": [{"filter": "stamp", "settings": {"v": 1}}]
        }))
        .expect("write");

    let status = refinery_cmd(&project, &["check"]).status().expect("check");
    assert_eq!(status.code(), Some(exit_codes::OK));

    let status = refinery_cmd(&project, &["run"]).status().expect("run");
    assert_eq!(status.code(), Some(exit_codes::OK));
    let stamp = fs::read_to_string(project.path().join("stamp.txt")).expect("stamp");
    assert_eq!(stamp.trim(), r#"{"v":1}"#);
    let root = fs::read_to_string(project.path().join("root.txt")).expect("root");
    assert_eq!(root.trim(), project.path().display().to_string());
}
