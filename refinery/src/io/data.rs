//! Seeding the project's data folder from a downloaded filter's `data/`.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{debug, warn};
use walkdir::WalkDir;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedOutcome {
    /// Number of files copied.
    Seeded(usize),
    /// The project already has data for this filter; left untouched.
    AlreadyPresent,
    /// The filter ships no `data/` folder.
    NoData,
}

/// Copy `<download_dir>/data` into `<data_root>/<id>` unless the target exists.
pub fn seed_filter_data(download_dir: &Path, data_root: &Path, id: &str) -> Result<SeedOutcome> {
    let source = download_dir.join("data");
    let target = data_root.join(id);
    if target.exists() {
        warn!(
            "Filter {id} already has data in {}. Delete it and reinstall to refresh it.",
            target.display()
        );
        return Ok(SeedOutcome::AlreadyPresent);
    }
    if !source.is_dir() {
        return Ok(SeedOutcome::NoData);
    }

    let mut copied = 0;
    for entry in WalkDir::new(&source) {
        let entry = entry.with_context(|| format!("walk {}", source.display()))?;
        let relative = entry
            .path()
            .strip_prefix(&source)
            .with_context(|| format!("relativize {}", entry.path().display()))?;
        let dest = target.join(relative);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&dest)
                .with_context(|| format!("create directory {}", dest.display()))?;
        } else {
            fs::copy(entry.path(), &dest).with_context(|| {
                format!("copy {} to {}", entry.path().display(), dest.display())
            })?;
            copied += 1;
        }
    }
    debug!(id, copied, "seeded filter data");
    Ok(SeedOutcome::Seeded(copied))
}
