//! Deterministic locations under the hidden project root.

use std::path::{Path, PathBuf};

/// Hidden directory holding caches and runtime config.
pub const DOT_DIR: &str = ".refinery";
/// Dependency manifest that marks a Python filter as needing an environment.
pub const REQUIREMENTS_FILE: &str = "requirements.txt";
/// Manifest at the root of a downloaded remote filter.
pub const MANIFEST_FILE: &str = "filter.json";
/// Pipeline declaration at the project root.
pub const PIPELINE_FILE: &str = "refinery.json";
/// Environment variable exposing the project root to filter processes.
pub const ROOT_DIR_ENV: &str = "ROOT_DIR";

pub fn dot_root(project_root: &Path) -> PathBuf {
    project_root.join(DOT_DIR)
}

pub fn config_path(dot_root: &Path) -> PathBuf {
    dot_root.join("config.toml")
}

pub fn filters_cache(dot_root: &Path) -> PathBuf {
    dot_root.join("cache").join("filters")
}

/// `<dot_root>/cache/filters/<id>`. Its existence is the only installed marker.
pub fn download_path(dot_root: &Path, id: &str) -> PathBuf {
    filters_cache(dot_root).join(id)
}

/// `<dot_root>/cache/venvs/<slot>`. Filters declaring the same slot share it.
pub fn venv_path(dot_root: &Path, slot: u32) -> PathBuf {
    dot_root.join("cache").join("venvs").join(slot.to_string())
}

fn venv_scripts(venv: &Path) -> PathBuf {
    if cfg!(windows) {
        venv.join("Scripts")
    } else {
        venv.join("bin")
    }
}

pub fn venv_interpreter(venv: &Path) -> PathBuf {
    venv_scripts(venv).join(format!("python{}", std::env::consts::EXE_SUFFIX))
}

/// Written once the slot's requirements installed successfully.
pub fn venv_marker(venv: &Path) -> PathBuf {
    venv.join(".refinery-installed")
}

pub fn venv_pip(venv: &Path) -> PathBuf {
    venv_scripts(venv).join(format!("pip{}", std::env::consts::EXE_SUFFIX))
}
