//! Download cache for remote filters under `.refinery/cache/filters/<id>`.
//!
//! The presence of a filter's directory is the only installed marker: no
//! version or checksum is stored, so switching versions means a forced
//! reinstall.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{info, instrument, warn};

use crate::core::definition::{RemoteDefinition, validate_id};
use crate::core::locator::Locator;
use crate::core::paths::download_path;
use crate::error::FilterError;
use crate::io::git::{Fetcher, VersionResolver};

/// Result of a download request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadOutcome {
    Downloaded,
    /// Already present and `force` was not set; nothing changed.
    AlreadyInstalled,
}

#[derive(Debug, Clone)]
pub struct FilterCache {
    dot_root: PathBuf,
}

impl FilterCache {
    pub fn new(dot_root: impl Into<PathBuf>) -> Self {
        Self {
            dot_root: dot_root.into(),
        }
    }

    pub fn download_path(&self, id: &str) -> PathBuf {
        download_path(&self.dot_root, id)
    }

    pub fn is_installed(&self, id: &str) -> bool {
        self.download_path(id).exists()
    }

    /// Fetch the filter into the cache.
    ///
    /// Without `force` an installed filter is left untouched. With `force`
    /// the old contents are removed first.
    #[instrument(skip_all, fields(filter = %def.base.id, force))]
    pub fn download(
        &self,
        def: &RemoteDefinition,
        force: bool,
        fetcher: &dyn Fetcher,
        versions: &dyn VersionResolver,
    ) -> Result<DownloadOutcome, FilterError> {
        let id = def.base.id.as_str();
        validate_id(id)?;
        if self.is_installed(id) {
            if !force {
                warn!("Filter {id:?} already installed, skipping. Run with '--force' to force.");
                return Ok(DownloadOutcome::AlreadyInstalled);
            }
            warn!(
                "Filter {id:?} already installed, but force mode is enabled. Filter will be installed, erasing prior contents."
            );
            if let Err(err) = self.uninstall(id) {
                warn!(err = %err, "could not remove previous installation");
            }
        }

        info!("Downloading filter {id}...");
        let locator = download_locator(def, versions).map_err(|err| FilterError::Download {
            filter: id.to_string(),
            locator: format!("{}//{}?ref={}", def.url, id, def.version),
            reason: err.to_string(),
        })?;
        let dest = self.download_path(id);
        fetcher
            .fetch(&locator, &dest)
            .map_err(|err| match err {
                download @ FilterError::Download { .. } => download,
                other => FilterError::Download {
                    filter: id.to_string(),
                    locator: locator.to_string(),
                    reason: other.to_string(),
                },
            })?;

        prune_test_dir(&dest);
        info!("Filter {id} downloaded successfully.");
        Ok(DownloadOutcome::Downloaded)
    }

    /// Remove the cached filter. A missing directory is not an error, an id
    /// that is not a plain directory name is.
    ///
    /// Callers treat failures as best-effort and log them.
    pub fn uninstall(&self, id: &str) -> io::Result<()> {
        validate_id(id).map_err(|err| io::Error::new(io::ErrorKind::InvalidInput, err))?;
        match fs::remove_dir_all(self.download_path(id)) {
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }
}

/// `<url>//<id>?ref=<resolved ref>` for a remote definition.
pub fn download_locator(
    def: &RemoteDefinition,
    versions: &dyn VersionResolver,
) -> Result<Locator, FilterError> {
    let reference = versions.resolve(&def.url, &def.base.id, &def.version)?;
    Ok(Locator::new(&def.url, &def.base.id, reference))
}

/// Downloaded filters never need their `test/` folder.
fn prune_test_dir(dest: &Path) {
    let tests = dest.join("test");
    if tests.is_dir()
        && let Err(err) = fs::remove_dir_all(&tests)
    {
        warn!(err = %err, path = %tests.display(), "could not remove test folder");
    }
}
