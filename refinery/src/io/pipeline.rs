//! Project pipeline declared in `refinery.json`.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use jsonschema::Draft;
use serde_json::Value;

use crate::core::definition::{FilterDefinition, Object};
use crate::engine::FilterRunner;
use crate::error::FilterError;

const PIPELINE_SCHEMA: &str = include_str!("../../schemas/pipeline.schema.json");

/// One entry of the `pipeline` array: a definition id plus instance config.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub filter: String,
    pub config: Object,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Pipeline {
    /// Relative to the project root.
    pub data_path: PathBuf,
    pub definitions: BTreeMap<String, FilterDefinition>,
    pub steps: Vec<Step>,
}

impl Pipeline {
    pub fn definition(&self, id: &str) -> Option<&FilterDefinition> {
        self.definitions.get(id)
    }

    /// Build runnable filters for every step, in declared order.
    pub fn runners(&self) -> Result<Vec<FilterRunner>, FilterError> {
        self.steps
            .iter()
            .map(|step| {
                let definition = self.definition(&step.filter).ok_or_else(|| {
                    FilterError::ConfigParse {
                        filter: step.filter.clone(),
                        reason: "pipeline references an undefined filter".to_string(),
                    }
                })?;
                definition.create_runner(&step.config)
            })
            .collect()
    }
}

pub fn load_pipeline(path: &Path) -> Result<Pipeline> {
    let raw = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    parse_pipeline(&raw).with_context(|| format!("load {}", path.display()))
}

/// Parse and validate a pipeline: schema conformance, definition parsing and
/// step references.
pub fn parse_pipeline(raw: &str) -> Result<Pipeline> {
    let document: Value = serde_json::from_str(raw).context("parse pipeline json")?;
    let schema: Value = serde_json::from_str(PIPELINE_SCHEMA).context("parse pipeline schema")?;
    validate_schema(&document, &schema)?;

    let data_path = document
        .get("dataPath")
        .and_then(Value::as_str)
        .unwrap_or("data");

    let mut definitions = BTreeMap::new();
    if let Some(declared) = document.get("filterDefinitions").and_then(Value::as_object) {
        for (id, declaration) in declared {
            let declaration = declaration
                .as_object()
                .with_context(|| format!("filter definition {id} is not an object"))?;
            definitions.insert(id.clone(), FilterDefinition::from_object(id, declaration)?);
        }
    }

    let mut steps = Vec::new();
    for entry in document
        .get("pipeline")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
    {
        let config = entry
            .as_object()
            .context("pipeline entry is not an object")?
            .clone();
        let filter = config
            .get("filter")
            .and_then(Value::as_str)
            .context("pipeline entry is missing 'filter'")?
            .to_string();
        if !definitions.contains_key(&filter) {
            return Err(FilterError::ConfigParse {
                filter,
                reason: "pipeline references an undefined filter".to_string(),
            }
            .into());
        }
        steps.push(Step { filter, config });
    }

    Ok(Pipeline {
        data_path: PathBuf::from(data_path),
        definitions,
        steps,
    })
}

/// Validate JSON instance against a JSON Schema (Draft 2020-12).
fn validate_schema(instance: &Value, schema: &Value) -> Result<()> {
    let compiled = jsonschema::options()
        .with_draft(Draft::Draft202012)
        .build(schema)
        .context("compile json schema")?;
    let messages: Vec<String> = compiled
        .iter_errors(instance)
        .map(|err| err.to_string())
        .collect();
    if !messages.is_empty() {
        bail!("schema validation failed:\n- {}", messages.join("\n- "));
    }
    Ok(())
}
