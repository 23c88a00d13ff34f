//! Fakes and fixtures shared by unit and integration tests.

use std::cell::RefCell;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tempfile::TempDir;

use crate::core::definition::Object;
use crate::core::locator::Locator;
use crate::core::paths::{PIPELINE_FILE, download_path, dot_root, venv_interpreter};
use crate::error::FilterError;
use crate::io::git::{Fetcher, VersionResolver};
use crate::io::process::{Invocation, ProcessRunner};

type Predicate = Box<dyn Fn(&Invocation) -> bool>;
type Hook = Box<dyn Fn(&Invocation)>;

/// Records every invocation instead of spawning it.
///
/// `python -m venv <dir>` creates the environment's interpreter file so the
/// slot looks provisioned afterwards.
pub struct RecordingProcessRunner {
    programs: Vec<String>,
    calls: RefCell<Vec<Invocation>>,
    fail_when: RefCell<Option<Predicate>>,
    on_run: RefCell<Option<Hook>>,
}

impl RecordingProcessRunner {
    /// Only `programs` are found on the fake `PATH`.
    pub fn with_programs(programs: &[&str]) -> Self {
        Self {
            programs: programs.iter().map(|p| p.to_string()).collect(),
            calls: RefCell::new(Vec::new()),
            fail_when: RefCell::new(None),
            on_run: RefCell::new(None),
        }
    }

    /// Make matching invocations (and all probes) exit non-zero.
    pub fn fail_when(&self, predicate: impl Fn(&Invocation) -> bool + 'static) {
        *self.fail_when.borrow_mut() = Some(Box::new(predicate));
    }

    /// Called after each recorded run.
    pub fn on_run(&self, hook: impl Fn(&Invocation) + 'static) {
        *self.on_run.borrow_mut() = Some(Box::new(hook));
    }

    pub fn invocations(&self) -> Vec<Invocation> {
        self.calls.borrow().clone()
    }

    fn fails(&self, invocation: &Invocation) -> bool {
        self.fail_when
            .borrow()
            .as_ref()
            .is_some_and(|predicate| predicate(invocation))
    }
}

impl ProcessRunner for RecordingProcessRunner {
    fn run(&self, invocation: &Invocation) -> Result<(), FilterError> {
        self.calls.borrow_mut().push(invocation.clone());
        if let Some(hook) = self.on_run.borrow().as_ref() {
            hook(invocation);
        }
        if self.fails(invocation) {
            return Err(FilterError::Subprocess {
                label: invocation.label.clone(),
                program: invocation.program.display().to_string(),
                reason: "exited with exit code 1".to_string(),
            });
        }
        if let [flag, module, dir] = invocation.args.as_slice()
            && flag == "-m"
            && module == "venv"
        {
            let interpreter = venv_interpreter(Path::new(dir));
            if let Some(parent) = interpreter.parent() {
                fs::create_dir_all(parent).map_err(|err| fake_error(err.to_string()))?;
            }
            fs::write(&interpreter, "").map_err(|err| fake_error(err.to_string()))?;
        }
        Ok(())
    }

    fn probe(&self, program: &Path, args: &[&str]) -> Result<String, FilterError> {
        let invocation = Invocation {
            program: program.to_path_buf(),
            args: args.iter().map(|a| a.to_string()).collect(),
            workdir: PathBuf::from("."),
            project_root: None,
            label: "probe".to_string(),
        };
        if self.fails(&invocation) {
            return Err(FilterError::ExternalTool {
                tool: program.display().to_string(),
                reason: "exited with exit code 1".to_string(),
            });
        }
        Ok("Python 3.12.1".to_string())
    }

    fn locate(&self, name: &str) -> Option<PathBuf> {
        self.programs
            .iter()
            .any(|program| program == name)
            .then(|| PathBuf::from(name))
    }
}

fn fake_error(reason: String) -> FilterError {
    FilterError::ExternalTool {
        tool: "fake".to_string(),
        reason,
    }
}

/// Writes a fixed file set into the destination of every fetch.
#[derive(Default)]
pub struct ScriptedFetcher {
    files: Vec<(String, String)>,
    failure: Option<String>,
    fetched: RefCell<Vec<String>>,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(reason: &str) -> Self {
        Self {
            failure: Some(reason.to_string()),
            ..Self::default()
        }
    }

    pub fn with_file(mut self, relative: &str, contents: &str) -> Self {
        self.files.push((relative.to_string(), contents.to_string()));
        self
    }

    /// Locators requested so far, rendered as strings.
    pub fn fetched(&self) -> Vec<String> {
        self.fetched.borrow().clone()
    }
}

impl Fetcher for ScriptedFetcher {
    fn fetch(&self, locator: &Locator, dest: &Path) -> Result<(), FilterError> {
        self.fetched.borrow_mut().push(locator.to_string());
        if let Some(reason) = &self.failure {
            return Err(FilterError::ExternalTool {
                tool: "git".to_string(),
                reason: reason.clone(),
            });
        }
        write_tree(dest, &self.files).map_err(|err| fake_error(err.to_string()))
    }
}

/// Resolves every version to the same ref.
pub struct FixedVersionResolver {
    reference: Option<String>,
}

impl FixedVersionResolver {
    pub fn new(reference: &str) -> Self {
        Self {
            reference: Some(reference.to_string()),
        }
    }

    pub fn failing() -> Self {
        Self { reference: None }
    }
}

impl VersionResolver for FixedVersionResolver {
    fn resolve(&self, url: &str, _id: &str, _version: &str) -> Result<String, FilterError> {
        self.reference
            .clone()
            .ok_or_else(|| FilterError::ExternalTool {
                tool: "git".to_string(),
                reason: format!("could not list refs of {url}"),
            })
    }
}

/// Temporary project directory.
pub struct TestProject {
    dir: TempDir,
}

impl TestProject {
    pub fn new() -> io::Result<Self> {
        Ok(Self {
            dir: tempfile::tempdir()?,
        })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn dot_root(&self) -> PathBuf {
        dot_root(self.path())
    }

    /// Write `contents` to a path relative to the project root.
    pub fn write(&self, relative: &str, contents: &str) -> io::Result<PathBuf> {
        let path = self.path().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, contents)?;
        Ok(path)
    }

    pub fn write_pipeline(&self, pipeline: &Value) -> io::Result<PathBuf> {
        self.write(PIPELINE_FILE, &pipeline.to_string())
    }

    /// Populate the download cache of `id` with a manifest.
    pub fn install_remote(&self, id: &str, manifest: &str) -> io::Result<PathBuf> {
        let dir = download_path(&self.dot_root(), id);
        write_tree(&dir, &[("filter.json".to_string(), manifest.to_string())])?;
        Ok(dir)
    }
}

/// JSON literal to object; panics on non-objects.
pub fn object(value: Value) -> Object {
    match value {
        Value::Object(map) => map,
        other => panic!("expected a JSON object, got {other}"),
    }
}

fn write_tree(dest: &Path, files: &[(String, String)]) -> io::Result<()> {
    fs::create_dir_all(dest)?;
    for (relative, contents) in files {
        let path = dest.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, contents)?;
    }
    Ok(())
}
