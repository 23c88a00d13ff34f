//! Runnable filters and the sequential pipeline loop.
//!
//! A [`FilterRunner`] combines a definition with the configuration of one
//! pipeline entry. Every variant goes through the same gate: disabled filters
//! are skipped, then remote filters check trust and cache state before their
//! nested filters run.

use std::path::Path;
use std::time::Instant;

use tracing::{debug, info, instrument, warn};

use crate::context::RunContext;
use crate::core::command::{exe_args, script_args};
use crate::core::definition::{
    DefinitionBase, ExeDefinition, FilterDefinition, Object, PythonDefinition, RemoteDefinition,
};
use crate::core::instance::FilterInstance;
use crate::error::FilterError;
use crate::io::cache::FilterCache;
use crate::io::manifest::{nested_definition, nested_error, read_manifest};
use crate::io::process::Invocation;
use crate::io::venv::{probe_python, resolve_interpreter};

#[derive(Debug, Clone, PartialEq)]
pub struct PythonFilter {
    pub instance: FilterInstance,
    pub definition: PythonDefinition,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExeFilter {
    pub instance: FilterInstance,
    pub definition: ExeDefinition,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RemoteFilter {
    pub instance: FilterInstance,
    pub definition: RemoteDefinition,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FilterRunner {
    Python(PythonFilter),
    Exe(ExeFilter),
    Remote(RemoteFilter),
}

impl FilterDefinition {
    /// Attach per-invocation configuration to this definition.
    pub fn create_runner(&self, config: &Object) -> Result<FilterRunner, FilterError> {
        let instance = FilterInstance::from_object(self.id(), config)?;
        Ok(match self {
            FilterDefinition::Python(definition) => FilterRunner::Python(PythonFilter {
                instance,
                definition: definition.clone(),
            }),
            FilterDefinition::Exe(definition) => FilterRunner::Exe(ExeFilter {
                instance,
                definition: definition.clone(),
            }),
            FilterDefinition::Remote(definition) => FilterRunner::Remote(RemoteFilter {
                instance,
                definition: definition.clone(),
            }),
        })
    }
}

impl FilterRunner {
    fn parts(&self) -> (&FilterInstance, &DefinitionBase) {
        match self {
            FilterRunner::Python(f) => (&f.instance, &f.definition.base),
            FilterRunner::Exe(f) => (&f.instance, &f.definition.base),
            FilterRunner::Remote(f) => (&f.instance, &f.definition.base),
        }
    }

    fn instance_mut(&mut self) -> &mut FilterInstance {
        match self {
            FilterRunner::Python(f) => &mut f.instance,
            FilterRunner::Exe(f) => &mut f.instance,
            FilterRunner::Remote(f) => &mut f.instance,
        }
    }

    pub fn id(&self) -> &str {
        &self.parts().1.id
    }

    /// Instance name, definition name, id, or the last segment of the remote url.
    pub fn friendly_name(&self) -> String {
        let (instance, base) = self.parts();
        if let Some(name) = instance.name.as_ref().or(base.name.as_ref()) {
            return name.clone();
        }
        if !base.id.is_empty() {
            return base.id.clone();
        }
        match self {
            FilterRunner::Remote(f) => f
                .definition
                .url
                .trim_end_matches('/')
                .rsplit('/')
                .next()
                .unwrap_or_default()
                .to_string(),
            _ => String::new(),
        }
    }

    pub fn is_disabled(&self) -> bool {
        let (instance, base) = self.parts();
        instance.disabled || base.disabled
    }

    /// Verify the filter's toolchain is usable without running it.
    pub fn check(&self, ctx: &RunContext<'_>) -> Result<(), FilterError> {
        match self {
            FilterRunner::Python(_) => probe_python(ctx.process, ctx.interpreters).map(drop),
            FilterRunner::Exe(f) => f.check(ctx),
            FilterRunner::Remote(f) => f.check(ctx),
        }
    }

    /// Run the filter. Returns whether an interruption was requested while it ran.
    #[instrument(skip_all, fields(filter = %self.id()))]
    pub fn run(&self, ctx: &RunContext<'_>) -> Result<bool, FilterError> {
        let name = self.friendly_name();
        if self.is_disabled() {
            info!("Filter '{name}' is disabled, skipping.");
            return Ok(false);
        }
        info!("Running filter {name}");
        let start = Instant::now();
        match self {
            FilterRunner::Python(f) => f.run(ctx)?,
            FilterRunner::Exe(f) => f.run(ctx)?,
            FilterRunner::Remote(f) => f.run(ctx)?,
        }
        debug!(elapsed = ?start.elapsed(), "filter finished");
        Ok(ctx.is_interrupted())
    }

    /// Forward a remote filter's configuration into one of its nested filters.
    ///
    /// Arguments are appended to the nested filter's own, settings and the
    /// venv slot are replaced. Only a single level of nesting is supported.
    pub fn copy_arguments(&mut self, parent: &RemoteFilter) {
        let instance = self.instance_mut();
        instance
            .arguments
            .extend(parent.instance.arguments.iter().cloned());
        instance.settings = parent.instance.settings.clone();
        match self {
            FilterRunner::Python(f) => f.definition.venv_slot = parent.definition.venv_slot,
            FilterRunner::Remote(f) => f.definition.venv_slot = parent.definition.venv_slot,
            FilterRunner::Exe(_) => {}
        }
    }
}

impl PythonFilter {
    fn run(&self, ctx: &RunContext<'_>) -> Result<(), FilterError> {
        let id = self.definition.base.id.as_str();
        let script = ctx.absolute_location.join(&self.definition.script);
        let filter_dir = script.parent().unwrap_or(&ctx.absolute_location);
        let python = resolve_interpreter(
            ctx.process,
            ctx.interpreters,
            &ctx.dot_root,
            self.definition.venv_slot,
            filter_dir,
            id,
        )?;
        let args = script_args(
            &script,
            self.instance.settings_json(id)?,
            &self.instance.arguments,
        );
        ctx.process.run(&Invocation {
            program: python,
            args,
            workdir: ctx.absolute_location.clone(),
            project_root: Some(ctx.project_root.clone()),
            label: id.to_string(),
        })
    }
}

impl ExeFilter {
    fn program(&self, location: &Path) -> std::path::PathBuf {
        location.join(&self.definition.exe)
    }

    fn check(&self, ctx: &RunContext<'_>) -> Result<(), FilterError> {
        let program = self.program(&ctx.absolute_location);
        if !program.is_file() {
            return Err(FilterError::ToolNotFound {
                tool: program.display().to_string(),
                hint: format!(
                    "Check the 'exe' property of filter '{}'.",
                    self.definition.base.id
                ),
            });
        }
        Ok(())
    }

    fn run(&self, ctx: &RunContext<'_>) -> Result<(), FilterError> {
        let id = self.definition.base.id.as_str();
        ctx.process.run(&Invocation {
            program: self.program(&ctx.absolute_location),
            args: exe_args(self.instance.settings_json(id)?, &self.instance.arguments),
            workdir: ctx.absolute_location.clone(),
            project_root: Some(ctx.project_root.clone()),
            label: id.to_string(),
        })
    }
}

impl RemoteFilter {
    fn id(&self) -> &str {
        &self.definition.base.id
    }

    /// Nested filters listed in the downloaded manifest, configured from this filter.
    pub fn subfilters(&self, location: &Path) -> Result<Vec<FilterRunner>, FilterError> {
        read_manifest(location)?
            .iter()
            .enumerate()
            .map(|(index, declaration)| {
                let mut runner = nested_definition(self.id(), index, declaration)
                    .and_then(|definition| definition.create_runner(declaration))
                    .map_err(|err| nested_error(self.id(), index, err))?;
                runner.copy_arguments(self);
                Ok(runner)
            })
            .collect()
    }

    fn installed_location(&self, ctx: &RunContext<'_>) -> Result<std::path::PathBuf, FilterError> {
        let cache = FilterCache::new(&ctx.dot_root);
        if !cache.is_installed(self.id()) {
            return Err(FilterError::NotInstalled {
                filter: self.id().to_string(),
            });
        }
        Ok(cache.download_path(self.id()))
    }

    fn check(&self, ctx: &RunContext<'_>) -> Result<(), FilterError> {
        let location = self.installed_location(ctx)?;
        let nested_ctx = ctx.at(location.clone());
        for filter in self.subfilters(&location)? {
            filter.check(&nested_ctx)?;
        }
        Ok(())
    }

    fn run(&self, ctx: &RunContext<'_>) -> Result<(), FilterError> {
        if !self.definition.is_trusted() && !ctx.unlocked {
            return Err(FilterError::SafeModeViolation {
                filter: self.id().to_string(),
                url: self.definition.url.clone(),
            });
        }
        debug!(url = %self.definition.url, "running remote filter");
        let location = self.installed_location(ctx)?;
        let nested_ctx = ctx.at(location.clone());
        for filter in self.subfilters(&location)? {
            if filter.run(&nested_ctx)? {
                warn!("interrupted inside filter {}", self.id());
                break;
            }
        }
        Ok(())
    }
}

/// How a pipeline run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineOutcome {
    Completed,
    /// Stopped between filters after `completed` filters ran.
    Interrupted { completed: usize },
}

/// Run filters one at a time in declared order.
///
/// The interruption flag is consulted between filters only. The first
/// failure aborts the run and is wrapped with the filter's friendly name.
#[instrument(skip_all, fields(filters = runners.len()))]
pub fn run_pipeline(
    runners: &[FilterRunner],
    ctx: &RunContext<'_>,
) -> Result<PipelineOutcome, FilterError> {
    for (index, runner) in runners.iter().enumerate() {
        if ctx.is_interrupted() {
            warn!("interrupted, not starting filter {}", runner.friendly_name());
            return Ok(PipelineOutcome::Interrupted { completed: index });
        }
        let interrupted = runner.run(ctx).map_err(|err| {
            debug!(err = ?err, "filter failed");
            FilterError::FilterFailed {
                name: runner.friendly_name(),
                source: Box::new(err),
            }
        })?;
        if interrupted {
            return Ok(PipelineOutcome::Interrupted {
                completed: index + 1,
            });
        }
    }
    Ok(PipelineOutcome::Completed)
}

/// Check every filter in order, stopping at the first failure.
pub fn check_pipeline(runners: &[FilterRunner], ctx: &RunContext<'_>) -> Result<(), FilterError> {
    for runner in runners.iter().filter(|runner| !runner.is_disabled()) {
        runner
            .check(ctx)
            .map_err(|err| FilterError::FilterFailed {
                name: runner.friendly_name(),
                source: Box::new(err),
            })?;
    }
    Ok(())
}
