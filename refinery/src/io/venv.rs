//! Python interpreter lookup and per-slot virtual environments.
//!
//! A Python filter gets an isolated environment only when its directory holds
//! a `requirements.txt`. Environments are keyed by slot number, so every
//! filter declaring the same slot shares one environment and its packages.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument, warn};

use crate::core::paths::{REQUIREMENTS_FILE, venv_interpreter, venv_marker, venv_path, venv_pip};
use crate::error::FilterError;
use crate::io::process::{Invocation, ProcessRunner};

/// True iff `filter_dir/requirements.txt` exists and is a regular file.
pub fn needs_venv(filter_dir: &Path) -> bool {
    fs::metadata(filter_dir.join(REQUIREMENTS_FILE))
        .map(|meta| meta.is_file())
        .unwrap_or(false)
}

/// First interpreter candidate found on `PATH`.
pub fn find_python(
    process: &dyn ProcessRunner,
    candidates: &[String],
) -> Result<PathBuf, FilterError> {
    candidates
        .iter()
        .find_map(|name| process.locate(name))
        .ok_or_else(|| FilterError::ToolNotFound {
            tool: "Python".to_string(),
            hint: "Download and install it from https://www.python.org/downloads/".to_string(),
        })
}

/// Locate the system interpreter and make sure it answers `--version`.
pub fn probe_python(
    process: &dyn ProcessRunner,
    candidates: &[String],
) -> Result<String, FilterError> {
    let python = find_python(process, candidates)?;
    let output = process.probe(&python, &["--version"])?;
    let version = output.trim_start_matches("Python ").to_string();
    debug!(%version, "found Python");
    Ok(version)
}

/// Create the environment at `venv` and install `filter_dir/requirements.txt` into it.
///
/// Upgrading pip is attempted but its failure only produces a warning. The
/// slot is marked ready only after the requirements installed.
#[instrument(skip_all, fields(venv = %venv.display(), label))]
pub fn provision_venv(
    process: &dyn ProcessRunner,
    system_python: &Path,
    venv: &Path,
    filter_dir: &Path,
    label: &str,
) -> Result<(), FilterError> {
    let marker = venv_marker(venv);
    if let Err(err) = fs::remove_file(&marker)
        && err.kind() != std::io::ErrorKind::NotFound
    {
        return Err(FilterError::DependencyInstall {
            filter: label.to_string(),
            reason: format!("could not reset {}: {err}", marker.display()),
            source: None,
        });
    }

    info!("Creating venv...");
    process
        .run(&Invocation {
            program: system_python.to_path_buf(),
            args: vec![
                "-m".to_string(),
                "venv".to_string(),
                venv.display().to_string(),
            ],
            workdir: filter_dir.to_path_buf(),
            project_root: None,
            label: label.to_string(),
        })
        .map_err(|err| dependency_error(label, "could not create venv", err))?;

    if let Err(err) = upgrade_pip(process, venv, filter_dir, label) {
        warn!(err = %err, "failed to upgrade pip in venv");
    }

    info!("Installing pip dependencies...");
    process
        .run(&Invocation {
            program: venv_pip(venv),
            args: vec![
                "install".to_string(),
                "-r".to_string(),
                REQUIREMENTS_FILE.to_string(),
            ],
            workdir: filter_dir.to_path_buf(),
            project_root: Some(filter_dir.to_path_buf()),
            label: label.to_string(),
        })
        .map_err(|err| dependency_error(label, "pip could not install requirements", err))?;

    fs::write(&marker, "").map_err(|err| FilterError::DependencyInstall {
        filter: label.to_string(),
        reason: format!("could not write {}: {err}", marker.display()),
        source: None,
    })
}

/// `python -m pip install --upgrade pip` inside the environment.
pub fn upgrade_pip(
    process: &dyn ProcessRunner,
    venv: &Path,
    filter_dir: &Path,
    label: &str,
) -> Result<(), FilterError> {
    process.run(&Invocation {
        program: venv_interpreter(venv),
        args: ["-m", "pip", "install", "--upgrade", "pip"]
            .into_iter()
            .map(str::to_string)
            .collect(),
        workdir: filter_dir.to_path_buf(),
        project_root: None,
        label: label.to_string(),
    })
}

/// Interpreter a Python filter in `filter_dir` should run with.
///
/// Filters without requirements use the system interpreter. Filters with
/// requirements use their slot's environment, which is provisioned first if
/// it was never completed.
pub fn resolve_interpreter(
    process: &dyn ProcessRunner,
    candidates: &[String],
    dot_root: &Path,
    slot: u32,
    filter_dir: &Path,
    label: &str,
) -> Result<PathBuf, FilterError> {
    if !needs_venv(filter_dir) {
        return find_python(process, candidates);
    }
    let venv = venv_path(dot_root, slot);
    let interpreter = venv_interpreter(&venv);
    if !interpreter.is_file() || !venv_marker(&venv).is_file() {
        info!(slot, "venv not provisioned yet");
        let python = find_python(process, candidates)?;
        provision_venv(process, &python, &venv, filter_dir, label)?;
    }
    debug!(venv = %venv.display(), "running Python filter using venv");
    Ok(interpreter)
}

fn dependency_error(label: &str, reason: &str, source: FilterError) -> FilterError {
    FilterError::DependencyInstall {
        filter: label.to_string(),
        reason: reason.to_string(),
        source: Some(Box::new(source)),
    }
}
