//! Error kinds surfaced by filter parsing, installation and execution.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum FilterError {
    #[error("filter '{filter}': missing required property '{field}'")]
    MissingField { filter: String, field: String },

    #[error("filter '{filter}': property '{field}' must be a {expected}")]
    FieldType {
        filter: String,
        field: String,
        expected: &'static str,
    },

    #[error("filter '{filter}': {reason}")]
    ConfigParse { filter: String, reason: String },

    #[error("{tool} not found. {hint}")]
    ToolNotFound { tool: String, hint: String },

    #[error("{tool} failed: {reason}")]
    ExternalTool { tool: String, reason: String },

    #[error("could not install dependencies of '{filter}': {reason}")]
    DependencyInstall {
        filter: String,
        reason: String,
        #[source]
        source: Option<Box<FilterError>>,
    },

    #[error(
        "could not download filter '{filter}' from {locator}: {reason}\n\tIs git installed?\n\tDoes that filter exist?"
    )]
    Download {
        filter: String,
        locator: String,
        reason: String,
    },

    #[error(
        "safe mode is on and filter '{filter}' comes from an untrusted source ({url}). Run `refinery unlock` to turn safe mode off"
    )]
    SafeModeViolation { filter: String, url: String },

    #[error("filter '{filter}' is not downloaded. Run `refinery install {filter}` first")]
    NotInstalled { filter: String },

    #[error("could not read manifest {}: {reason}", path.display())]
    ManifestRead { path: PathBuf, reason: String },

    #[error("{label}: {program} {reason}")]
    Subprocess {
        label: String,
        program: String,
        reason: String,
    },

    #[error("filter '{filter}', subfilter {index}")]
    Nested {
        filter: String,
        index: usize,
        #[source]
        source: Box<FilterError>,
    },

    #[error("filter '{name}' failed")]
    FilterFailed {
        name: String,
        #[source]
        source: Box<FilterError>,
    },
}

impl FilterError {
    /// Innermost error once `Nested`/`FilterFailed`/`DependencyInstall` wrappers are peeled off.
    pub fn root_cause(&self) -> &FilterError {
        match self {
            FilterError::Nested { source, .. } | FilterError::FilterFailed { source, .. } => {
                source.root_cause()
            }
            FilterError::DependencyInstall {
                source: Some(source),
                ..
            } => source.root_cause(),
            other => other,
        }
    }
}
