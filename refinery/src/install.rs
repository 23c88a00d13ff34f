//! Installing filters: downloads for remote filters and Python dependencies
//! for every filter, recursively through remote manifests.
//!
//! Recursive installs are not transactional. A failure stops the remaining
//! siblings but keeps whatever was installed before it; running the install
//! again picks up where it stopped.

use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument, warn};

use crate::core::definition::{FilterDefinition, PythonDefinition, RemoteDefinition};
use crate::core::paths::{dot_root, venv_path};
use crate::error::FilterError;
use crate::io::cache::{DownloadOutcome, FilterCache};
use crate::io::data::seed_filter_data;
use crate::io::git::{Fetcher, VersionResolver};
use crate::io::manifest::{nested_definition, nested_error, read_manifest};
use crate::io::process::ProcessRunner;
use crate::io::venv::{find_python, needs_venv, provision_venv};

pub struct Installer<'a> {
    pub project_root: PathBuf,
    pub dot_root: PathBuf,
    /// Data folder of the project, seeded from downloaded filters.
    pub data_path: PathBuf,
    pub interpreters: &'a [String],
    pub process: &'a dyn ProcessRunner,
    pub fetcher: &'a dyn Fetcher,
    pub versions: &'a dyn VersionResolver,
}

impl<'a> Installer<'a> {
    pub fn new(
        project_root: &Path,
        data_path: &Path,
        interpreters: &'a [String],
        process: &'a dyn ProcessRunner,
        fetcher: &'a dyn Fetcher,
        versions: &'a dyn VersionResolver,
    ) -> Self {
        Self {
            project_root: project_root.to_path_buf(),
            dot_root: dot_root(project_root),
            data_path: project_root.join(data_path),
            interpreters,
            process,
            fetcher,
            versions,
        }
    }

    pub fn cache(&self) -> FilterCache {
        FilterCache::new(&self.dot_root)
    }

    /// Install one configured filter.
    #[instrument(skip_all, fields(filter = %def.id(), force))]
    pub fn install_filter(&self, def: &FilterDefinition, force: bool) -> Result<(), FilterError> {
        debug!(kind = def.kind(), "installing filter");
        if let FilterDefinition::Remote(remote) = def {
            let outcome = self
                .cache()
                .download(remote, force, self.fetcher, self.versions)?;
            if outcome == DownloadOutcome::Downloaded {
                self.seed_data(remote);
            }
        }
        self.install_dependencies(def, None)?;
        info!("Filter {} installed.", def.id());
        Ok(())
    }

    /// Install filters in order, stopping at the first failure.
    pub fn install_all<'d>(
        &self,
        defs: impl IntoIterator<Item = &'d FilterDefinition>,
        force: bool,
    ) -> Result<(), FilterError> {
        for def in defs {
            self.install_filter(def, force)?;
        }
        Ok(())
    }

    /// Remove a remote filter from the cache. Callers decide whether to surface the error.
    pub fn uninstall(&self, id: &str) -> std::io::Result<()> {
        self.cache().uninstall(id)
    }

    /// Install what `def` needs to run. `parent` is the remote filter whose
    /// manifest declared `def`, if any.
    pub fn install_dependencies(
        &self,
        def: &FilterDefinition,
        parent: Option<&RemoteDefinition>,
    ) -> Result<(), FilterError> {
        match def {
            FilterDefinition::Python(python) => self.install_python(python, parent),
            FilterDefinition::Exe(_) => Ok(()),
            FilterDefinition::Remote(remote) => self.install_remote(remote, parent),
        }
    }

    fn install_python(
        &self,
        def: &PythonDefinition,
        parent: Option<&RemoteDefinition>,
    ) -> Result<(), FilterError> {
        let (root, slot) = match parent {
            Some(parent) => (
                self.cache().download_path(&parent.base.id),
                parent.venv_slot,
            ),
            None => (self.project_root.clone(), def.venv_slot),
        };
        let script = root.join(&def.script);
        let filter_dir = script.parent().unwrap_or(&root);
        if !needs_venv(filter_dir) {
            debug!(filter = %def.base.id, "no requirements, nothing to install");
            return Ok(());
        }
        let python = find_python(self.process, self.interpreters)?;
        provision_venv(
            self.process,
            &python,
            &venv_path(&self.dot_root, slot),
            filter_dir,
            &def.base.id,
        )
    }

    fn install_remote(
        &self,
        def: &RemoteDefinition,
        parent: Option<&RemoteDefinition>,
    ) -> Result<(), FilterError> {
        let id = def.base.id.as_str();
        if let Some(parent) = parent {
            return Err(FilterError::ConfigParse {
                filter: id.to_string(),
                reason: format!(
                    "remote filter '{}' cannot contain other remote filters",
                    parent.base.id
                ),
            });
        }
        if !self.cache().is_installed(id) {
            return Err(FilterError::NotInstalled {
                filter: id.to_string(),
            });
        }

        let location = self.cache().download_path(id);
        for (index, declaration) in read_manifest(&location)?.iter().enumerate() {
            nested_definition(id, index, declaration)
                .and_then(|nested| self.install_dependencies(&nested, Some(def)))
                .map_err(|err| nested_error(id, index, err))?;
        }
        Ok(())
    }

    fn seed_data(&self, def: &RemoteDefinition) {
        let id = def.base.id.as_str();
        match seed_filter_data(&self.cache().download_path(id), &self.data_path, id) {
            Ok(outcome) => debug!(id, ?outcome, "data seeding"),
            Err(err) => warn!("Could not copy data of filter {id}: {err:#}"),
        }
    }
}
