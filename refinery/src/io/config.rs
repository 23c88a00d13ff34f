//! Runtime configuration stored under `.refinery/config.toml`.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

/// Runtime configuration (TOML).
///
/// Missing fields default to safe values: safe mode on, `python3` then
/// `python` as interpreter candidates.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RuntimeConfig {
    /// When true, remote filters from untrusted sources may run.
    pub safe_mode_unlocked: bool,

    pub interpreter: InterpreterConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct InterpreterConfig {
    /// Executable names tried in order when looking up the system Python.
    pub candidates: Vec<String>,
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        Self {
            candidates: vec!["python3".to_string(), "python".to_string()],
        }
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            safe_mode_unlocked: false,
            interpreter: InterpreterConfig::default(),
        }
    }
}

impl RuntimeConfig {
    pub fn validate(&self) -> Result<()> {
        if self.interpreter.candidates.is_empty()
            || self
                .interpreter
                .candidates
                .iter()
                .any(|name| name.trim().is_empty())
        {
            return Err(anyhow!(
                "interpreter.candidates must be a non-empty array of names"
            ));
        }
        Ok(())
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `RuntimeConfig::default()`.
pub fn load_config(path: &Path) -> Result<RuntimeConfig> {
    if !path.exists() {
        let cfg = RuntimeConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: RuntimeConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &RuntimeConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

/// Toggle safe mode, keeping every other setting.
pub fn set_unlocked(path: &Path, unlocked: bool) -> Result<RuntimeConfig> {
    let mut cfg = load_config(path)?;
    cfg.safe_mode_unlocked = unlocked;
    write_config(path, &cfg)?;
    Ok(cfg)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_returns_locked_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, RuntimeConfig::default());
        assert!(!cfg.safe_mode_unlocked);
    }

    #[test]
    fn unlock_persists_and_keeps_candidates() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join(".refinery").join("config.toml");
        fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        fs::write(
            &path,
            "[interpreter]\ncandidates = [\"python3.12\"]\n",
        )
        .expect("write");

        set_unlocked(&path, true).expect("unlock");
        let loaded = load_config(&path).expect("load");
        assert!(loaded.safe_mode_unlocked);
        assert_eq!(loaded.interpreter.candidates, vec!["python3.12"]);
    }

    #[test]
    fn empty_candidates_are_rejected() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("config.toml");
        fs::write(&path, "[interpreter]\ncandidates = []\n").expect("write");
        let err = load_config(&path).unwrap_err();
        assert!(err.to_string().contains("interpreter.candidates"));
    }
}
