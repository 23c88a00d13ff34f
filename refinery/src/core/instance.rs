//! Per-invocation filter configuration.

use serde_json::Value;

use super::definition::{Object, optional_bool, optional_str, type_error};
use crate::error::FilterError;

/// Configuration a pipeline entry attaches to a definition.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterInstance {
    pub name: Option<String>,
    /// Trailing command-line arguments, passed after the settings argument.
    pub arguments: Vec<String>,
    /// Serialized as one JSON argument when non-empty.
    pub settings: Object,
    pub disabled: bool,
}

impl FilterInstance {
    /// Read the generic instance fields. `filter` is only used in error messages.
    pub fn from_object(filter: &str, obj: &Object) -> Result<Self, FilterError> {
        let arguments = match obj.get("arguments") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| {
                    item.as_str()
                        .map(str::to_string)
                        .ok_or_else(|| type_error(filter, "arguments", "list of strings"))
                })
                .collect::<Result<_, _>>()?,
            Some(_) => return Err(type_error(filter, "arguments", "list of strings")),
        };
        let settings = match obj.get("settings") {
            None | Some(Value::Null) => Object::new(),
            Some(Value::Object(map)) => map.clone(),
            Some(_) => return Err(type_error(filter, "settings", "object")),
        };
        Ok(Self {
            name: optional_str(filter, obj, "name")?.map(str::to_string),
            arguments,
            settings,
            disabled: optional_bool(filter, obj, "disabled")?.unwrap_or(false),
        })
    }

    /// Settings as JSON text, or `None` when no settings are configured.
    pub fn settings_json(&self, filter: &str) -> Result<Option<String>, FilterError> {
        if self.settings.is_empty() {
            return Ok(None);
        }
        serde_json::to_string(&self.settings)
            .map(Some)
            .map_err(|err| FilterError::ConfigParse {
                filter: filter.to_string(),
                reason: format!("could not serialize settings: {err}"),
            })
    }
}
