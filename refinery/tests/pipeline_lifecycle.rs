//! Install-then-run scenarios driven through the library with fake
//! processes, git and version resolution.

use std::path::Path;

use serde_json::json;

use refinery::context::{Interrupt, RunContext};
use refinery::core::paths::{PIPELINE_FILE, venv_interpreter};
use refinery::engine::{PipelineOutcome, check_pipeline, run_pipeline};
use refinery::error::FilterError;
use refinery::install::Installer;
use refinery::io::config::RuntimeConfig;
use refinery::io::pipeline::load_pipeline;
use refinery::test_support::{
    FixedVersionResolver, RecordingProcessRunner, ScriptedFetcher, TestProject,
};

const CLEANER_MANIFEST: &str = r#"{
    "filters": [
        {"runWith": "python", "script": "clean.py"},
        {"runWith": "python", "script": "report.py", "arguments": ["--summary"]}
    ]
}"#;

fn write_pipeline(project: &TestProject, url: Option<&str>) {
    let mut cleaner = json!({"version": "latest", "venvSlot": 2});
    if let Some(url) = url {
        cleaner["url"] = json!(url);
    }
    project
        .write_pipeline(&json!({
            "dataPath": "packs/data",
            "filterDefinitions": {
                "cleaner": cleaner,
                "bake": {"runWith": "python", "script": "filters/bake.py"}
            },
            "pipeline": [
                {"filter": "cleaner", "settings": {"indent": 2}, "arguments": ["--strict"]},
                {"filter": "bake", "disabled": true},
                {"filter": "bake", "name": "Bake again"}
            ]
        }))
        .expect("write pipeline");
}

fn cleaner_fetcher() -> ScriptedFetcher {
    ScriptedFetcher::new()
        .with_file("filter.json", CLEANER_MANIFEST)
        .with_file("requirements.txt", "jsonschema\n")
        .with_file("clean.py", "")
        .with_file("report.py", "")
        .with_file("data/rules.json", "{}")
        .with_file("test/case.json", "{}")
}

/// Install the whole pipeline, then run it.
///
/// Execution sequence:
/// 1. Install: download `cleaner`, seed its data, then provision venv slot 2
///    once per nested script (venv, pip upgrade, pip install). `bake` has no
///    requirements and installs nothing.
/// 2. Run: `cleaner` runs both nested scripts with the slot 2 interpreter,
///    the disabled `bake` entry is skipped, the second `bake` runs with the
///    system interpreter.
#[test]
fn install_then_run_standard_library_filter() {
    let project = TestProject::new().expect("project");
    write_pipeline(&project, None);
    let pipeline = load_pipeline(&project.path().join(PIPELINE_FILE)).expect("load");

    let process = RecordingProcessRunner::with_programs(&["python3"]);
    let fetcher = cleaner_fetcher();
    let versions = FixedVersionResolver::new("cleaner-1.4.0");
    let config = RuntimeConfig::default();
    let installer = Installer::new(
        project.path(),
        &pipeline.data_path,
        &config.interpreter.candidates,
        &process,
        &fetcher,
        &versions,
    );
    installer
        .install_all(pipeline.definitions.values(), false)
        .expect("install");

    let download = project.dot_root().join("cache/filters/cleaner");
    assert!(download.join("filter.json").is_file());
    assert!(!download.join("test").exists());
    assert!(project.path().join("packs/data/cleaner/rules.json").is_file());
    let venv = project.dot_root().join("cache/venvs/2");
    assert!(venv_interpreter(&venv).is_file());
    assert_eq!(process.invocations().len(), 6);

    let runners = pipeline.runners().expect("runners");
    let ctx = RunContext::new(project.path(), &config, &process, Interrupt::new());
    check_pipeline(&runners, &ctx).expect("check");
    let outcome = run_pipeline(&runners, &ctx).expect("run");
    assert_eq!(outcome, PipelineOutcome::Completed);

    let calls = process.invocations();
    let runs = &calls[6..];
    assert_eq!(runs.len(), 3);
    assert_eq!(runs[0].program, venv_interpreter(&venv));
    assert_eq!(runs[0].workdir, download);
    assert_eq!(
        runs[0].args,
        vec![
            "-u".to_string(),
            download.join("clean.py").display().to_string(),
            r#"{"indent":2}"#.to_string(),
            "--strict".to_string(),
        ]
    );
    assert_eq!(
        runs[1].args[2..],
        [
            r#"{"indent":2}"#.to_string(),
            "--summary".to_string(),
            "--strict".to_string()
        ]
    );
    assert_eq!(runs[2].program, Path::new("python3"));
    assert_eq!(runs[2].workdir, project.path());
    assert!(
        runs.iter()
            .all(|run| run.project_root.as_deref() == Some(project.path()))
    );
}

#[test]
fn untrusted_source_needs_unlock_but_installs_while_locked() {
    let project = TestProject::new().expect("project");
    write_pipeline(&project, Some("github.com/someone/filters"));
    let pipeline = load_pipeline(&project.path().join(PIPELINE_FILE)).expect("load");

    let process = RecordingProcessRunner::with_programs(&["python3"]);
    let fetcher = cleaner_fetcher();
    let versions = FixedVersionResolver::new("HEAD");
    let locked = RuntimeConfig::default();
    Installer::new(
        project.path(),
        &pipeline.data_path,
        &locked.interpreter.candidates,
        &process,
        &fetcher,
        &versions,
    )
    .install_all(pipeline.definitions.values(), false)
    .expect("install");
    assert_eq!(
        fetcher.fetched(),
        vec!["github.com/someone/filters//cleaner?ref=HEAD".to_string()]
    );

    let runners = pipeline.runners().expect("runners");
    let installed = process.invocations().len();
    let ctx = RunContext::new(project.path(), &locked, &process, Interrupt::new());
    let err = run_pipeline(&runners, &ctx).unwrap_err();
    assert!(matches!(err.root_cause(), FilterError::SafeModeViolation { .. }));
    assert!(format!("{err}").contains("cleaner"));
    assert_eq!(process.invocations().len(), installed);

    let unlocked = RuntimeConfig {
        safe_mode_unlocked: true,
        ..RuntimeConfig::default()
    };
    let ctx = RunContext::new(project.path(), &unlocked, &process, Interrupt::new());
    assert_eq!(
        run_pipeline(&runners, &ctx).expect("run"),
        PipelineOutcome::Completed
    );
}

#[test]
fn run_before_install_reports_not_installed() {
    let project = TestProject::new().expect("project");
    write_pipeline(&project, None);
    let pipeline = load_pipeline(&project.path().join(PIPELINE_FILE)).expect("load");
    let runners = pipeline.runners().expect("runners");

    let process = RecordingProcessRunner::with_programs(&["python3"]);
    let config = RuntimeConfig::default();
    let ctx = RunContext::new(project.path(), &config, &process, Interrupt::new());

    let err = run_pipeline(&runners, &ctx).unwrap_err();
    assert!(matches!(err.root_cause(), FilterError::NotInstalled { .. }));
    assert!(process.invocations().is_empty());

    let err = check_pipeline(&runners, &ctx).unwrap_err();
    assert!(matches!(err.root_cause(), FilterError::NotInstalled { .. }));
}

#[test]
fn uninstall_then_reinstall_restores_cache() {
    let project = TestProject::new().expect("project");
    write_pipeline(&project, None);
    let pipeline = load_pipeline(&project.path().join(PIPELINE_FILE)).expect("load");
    let process = RecordingProcessRunner::with_programs(&["python3"]);
    let fetcher = cleaner_fetcher();
    let versions = FixedVersionResolver::new("cleaner-1.4.0");
    let config = RuntimeConfig::default();
    let installer = Installer::new(
        project.path(),
        &pipeline.data_path,
        &config.interpreter.candidates,
        &process,
        &fetcher,
        &versions,
    );
    let cleaner = pipeline.definition("cleaner").expect("cleaner");

    installer.install_filter(cleaner, false).expect("install");
    installer.uninstall("cleaner").expect("uninstall");
    assert!(!installer.cache().is_installed("cleaner"));

    installer.install_filter(cleaner, false).expect("reinstall");
    assert!(installer.cache().is_installed("cleaner"));
    assert_eq!(fetcher.fetched().len(), 2);
}
