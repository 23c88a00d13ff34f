//! Typed filter definitions parsed from raw configuration objects.
//!
//! A definition is selected by the `runWith` discriminator: `"python"` and
//! `"exe"` name local filters, a declaration without `runWith` is a remote
//! composite filter fetched from a git repository.

use serde_json::{Map, Value};
use tracing::warn;

use crate::error::FilterError;

/// Remote filters from this repository bypass the safe-mode gate.
pub const STANDARD_LIBRARY_URL: &str = "github.com/Bedrock-OSS/regolith-filters";

/// Raw JSON object as read from a pipeline file or a remote manifest.
pub type Object = Map<String, Value>;

/// Fields shared by every definition variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefinitionBase {
    pub id: String,
    pub name: Option<String>,
    pub disabled: bool,
}

impl DefinitionBase {
    fn from_object(id: &str, obj: &Object) -> Result<Self, FilterError> {
        Ok(Self {
            id: id.to_string(),
            name: optional_str(id, obj, "name")?.map(str::to_string),
            disabled: optional_bool(id, obj, "disabled")?.unwrap_or(false),
        })
    }
}

/// Python script run by the system interpreter or by the interpreter of a
/// shared environment slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PythonDefinition {
    pub base: DefinitionBase,
    /// Script path relative to the filter's content root.
    pub script: String,
    pub venv_slot: u32,
}

impl PythonDefinition {
    pub fn from_object(id: &str, obj: &Object) -> Result<Self, FilterError> {
        Ok(Self {
            base: DefinitionBase::from_object(id, obj)?,
            script: required_str(id, obj, "script")?.to_string(),
            venv_slot: venv_slot(id, obj),
        })
    }
}

/// Executable shipped with the project (or with a remote filter).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExeDefinition {
    pub base: DefinitionBase,
    pub exe: String,
}

impl ExeDefinition {
    pub fn from_object(id: &str, obj: &Object) -> Result<Self, FilterError> {
        Ok(Self {
            base: DefinitionBase::from_object(id, obj)?,
            exe: required_str(id, obj, "exe")?.to_string(),
        })
    }
}

/// Filter package downloaded from a git repository. The package carries its
/// own `filter.json` listing the filters it runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteDefinition {
    pub base: DefinitionBase,
    pub url: String,
    pub version: String,
    /// Propagated to the Python filters enclosed by the package.
    pub venv_slot: u32,
}

impl RemoteDefinition {
    pub fn from_object(id: &str, obj: &Object) -> Result<Self, FilterError> {
        let url = optional_str(id, obj, "url")?.unwrap_or(STANDARD_LIBRARY_URL);
        let version = match obj.get("version") {
            Some(Value::String(version)) => version.clone(),
            Some(_) => {
                return Err(FilterError::FieldType {
                    filter: id.to_string(),
                    field: "version".to_string(),
                    expected: "string",
                });
            }
            None => {
                return Err(FilterError::MissingField {
                    filter: id.to_string(),
                    field: "version".to_string(),
                });
            }
        };
        Ok(Self {
            base: DefinitionBase::from_object(id, obj)?,
            url: url.to_string(),
            version,
            venv_slot: venv_slot(id, obj),
        })
    }

    pub fn is_trusted(&self) -> bool {
        self.url == STANDARD_LIBRARY_URL
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterDefinition {
    Python(PythonDefinition),
    Exe(ExeDefinition),
    Remote(RemoteDefinition),
}

impl FilterDefinition {
    /// Parse a declaration, dispatching on its `runWith` property.
    pub fn from_object(id: &str, obj: &Object) -> Result<Self, FilterError> {
        validate_id(id)?;
        match optional_str(id, obj, "runWith")? {
            Some("python") => PythonDefinition::from_object(id, obj).map(Self::Python),
            Some("exe") => ExeDefinition::from_object(id, obj).map(Self::Exe),
            Some(other) => Err(FilterError::ConfigParse {
                filter: id.to_string(),
                reason: format!("unknown runWith value '{other}' (expected 'python' or 'exe')"),
            }),
            None => RemoteDefinition::from_object(id, obj).map(Self::Remote),
        }
    }

    pub fn base(&self) -> &DefinitionBase {
        match self {
            FilterDefinition::Python(def) => &def.base,
            FilterDefinition::Exe(def) => &def.base,
            FilterDefinition::Remote(def) => &def.base,
        }
    }

    pub fn id(&self) -> &str {
        &self.base().id
    }

    pub fn kind(&self) -> &'static str {
        match self {
            FilterDefinition::Python(_) => "python",
            FilterDefinition::Exe(_) => "exe",
            FilterDefinition::Remote(_) => "remote",
        }
    }
}

/// Ids name cache directories, so they must be a single plain path component.
pub fn validate_id(id: &str) -> Result<(), FilterError> {
    if id.is_empty() || id == "." || id == ".." || id.contains(['/', '\\']) {
        return Err(FilterError::ConfigParse {
            filter: id.to_string(),
            reason: "id must be a plain directory name, not '.', '..' or a path".to_string(),
        });
    }
    Ok(())
}

pub(crate) fn required_str<'a>(
    filter: &str,
    obj: &'a Object,
    field: &str,
) -> Result<&'a str, FilterError> {
    optional_str(filter, obj, field)?.ok_or_else(|| FilterError::MissingField {
        filter: filter.to_string(),
        field: field.to_string(),
    })
}

pub(crate) fn optional_str<'a>(
    filter: &str,
    obj: &'a Object,
    field: &str,
) -> Result<Option<&'a str>, FilterError> {
    match obj.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(value)) => Ok(Some(value)),
        Some(_) => Err(type_error(filter, field, "string")),
    }
}

pub(crate) fn optional_bool(
    filter: &str,
    obj: &Object,
    field: &str,
) -> Result<Option<bool>, FilterError> {
    match obj.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Bool(value)) => Ok(Some(*value)),
        Some(_) => Err(type_error(filter, field, "boolean")),
    }
}

pub(crate) fn type_error(filter: &str, field: &str, expected: &'static str) -> FilterError {
    FilterError::FieldType {
        filter: filter.to_string(),
        field: field.to_string(),
        expected,
    }
}

/// `venvSlot` falls back to slot 0 when absent or not a non-negative integer.
fn venv_slot(filter: &str, obj: &Object) -> u32 {
    let Some(raw) = obj.get("venvSlot") else {
        return 0;
    };
    match raw.as_u64().and_then(|slot| u32::try_from(slot).ok()) {
        Some(slot) => slot,
        None => {
            warn!(filter, value = %raw, "ignoring invalid venvSlot, using slot 0");
            0
        }
    }
}
