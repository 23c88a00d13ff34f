//! Git adapter for fetching remote filters and resolving their versions.
//!
//! Remote filters live in subdirectories of git repositories. We keep a small,
//! explicit wrapper around `git` subprocess calls rather than linking a git
//! library.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use anyhow::{Context, Result, anyhow, bail};
use tracing::{debug, instrument};

use crate::core::locator::{Locator, remote_url};
use crate::core::version::{
    VersionSpec, head_sha, latest_release_tag, parse_ls_remote, release_tag,
};
use crate::error::FilterError;

/// Retrieves the directory a locator points at into `dest`.
pub trait Fetcher {
    /// `dest` must not exist yet; on success it holds the filter's files.
    fn fetch(&self, locator: &Locator, dest: &Path) -> Result<(), FilterError>;
}

/// Maps a `version` property onto a concrete git ref.
pub trait VersionResolver {
    fn resolve(&self, url: &str, id: &str, version: &str) -> Result<String, FilterError>;
}

/// Wrapper for executing git commands in a working directory.
#[derive(Debug, Clone)]
pub struct Git {
    workdir: PathBuf,
}

impl Git {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
        }
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    pub fn init(&self) -> Result<()> {
        self.run_checked(&["init", "--quiet"])?;
        Ok(())
    }

    /// Fetch a single ref without history and check it out.
    #[instrument(skip_all, fields(reference))]
    pub fn checkout_shallow(&self, url: &str, reference: &str) -> Result<()> {
        debug!(url, reference, "shallow fetch");
        self.run_checked(&["fetch", "--quiet", "--depth", "1", url, reference])?;
        self.run_checked(&["checkout", "--quiet", "FETCH_HEAD"])?;
        Ok(())
    }

    /// Raw `git ls-remote` output for `url`.
    pub fn ls_remote(&self, url: &str, extra: &[&str]) -> Result<String> {
        let mut args = vec!["ls-remote"];
        args.extend_from_slice(extra);
        args.push(url);
        self.run_capture(&args)
    }

    fn run_capture(&self, args: &[&str]) -> Result<String> {
        let output = self.run_checked(args)?;
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    fn run_checked(&self, args: &[&str]) -> Result<Output> {
        let output = self.run(args)?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("git {} failed: {}", args.join(" "), stderr.trim()));
        }
        Ok(output)
    }

    fn run(&self, args: &[&str]) -> Result<Output> {
        Command::new("git")
            .args(args)
            .current_dir(&self.workdir)
            .output()
            .with_context(|| format!("spawn git {}", args.join(" ")))
    }
}

/// Fetches with a shallow git checkout staged next to the destination.
pub struct GitFetcher;

impl Fetcher for GitFetcher {
    #[instrument(skip_all, fields(locator = %locator))]
    fn fetch(&self, locator: &Locator, dest: &Path) -> Result<(), FilterError> {
        fetch_into(locator, dest).map_err(|err| FilterError::Download {
            filter: locator.subdir.clone(),
            locator: locator.to_string(),
            reason: format!("{err:#}"),
        })
    }
}

fn fetch_into(locator: &Locator, dest: &Path) -> Result<()> {
    let parent = dest
        .parent()
        .with_context(|| format!("download path missing parent {}", dest.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    // Staged on the same filesystem so the final move is a rename.
    let staging = tempfile::Builder::new()
        .prefix(".fetch-")
        .tempdir_in(parent)
        .with_context(|| format!("create staging directory in {}", parent.display()))?;

    let git = Git::new(staging.path());
    git.init()?;
    git.checkout_shallow(&locator.clone_url(), &locator.reference)?;

    let source = git.workdir().join(&locator.subdir);
    if !source.is_dir() {
        bail!(
            "repository has no directory '{}' at ref '{}'",
            locator.subdir,
            locator.reference
        );
    }
    fs::rename(&source, dest)
        .with_context(|| format!("move {} to {}", source.display(), dest.display()))?;
    Ok(())
}

/// Resolves versions with `git ls-remote`.
pub struct GitVersionResolver;

impl VersionResolver for GitVersionResolver {
    #[instrument(skip_all, fields(id, version))]
    fn resolve(&self, url: &str, id: &str, version: &str) -> Result<String, FilterError> {
        let reference = match VersionSpec::parse(version) {
            VersionSpec::Release(version) => release_tag(id, &version),
            VersionSpec::Ref(reference) => reference,
            VersionSpec::Head => remote_head(url)?,
            VersionSpec::Latest => {
                let output = ls_remote(url, &["--tags"])?;
                match latest_release_tag(id, &parse_ls_remote(&output)) {
                    Some(tag) => tag,
                    None => {
                        debug!(id, "no release tags, falling back to HEAD");
                        remote_head(url)?
                    }
                }
            }
        };
        debug!(reference, "resolved version");
        Ok(reference)
    }
}

fn remote_head(url: &str) -> Result<String, FilterError> {
    let output = ls_remote(url, &[])?;
    head_sha(&parse_ls_remote(&output)).ok_or_else(|| FilterError::ExternalTool {
        tool: "git".to_string(),
        reason: format!("{} does not advertise HEAD", remote_url(url)),
    })
}

fn ls_remote(url: &str, extra: &[&str]) -> Result<String, FilterError> {
    Git::new(env::temp_dir())
        .ls_remote(&remote_url(url), extra)
        .map_err(|err| FilterError::ExternalTool {
            tool: "git".to_string(),
            reason: format!("{err:#}"),
        })
}
