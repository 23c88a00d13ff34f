//! State threaded through filter execution.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::core::paths::dot_root;
use crate::io::config::RuntimeConfig;
use crate::io::process::ProcessRunner;

/// Cooperative cancellation flag shared between the signal handler and the engine.
///
/// The engine only looks at it between filters; running processes are never
/// interrupted by it.
#[derive(Debug, Clone, Default)]
pub struct Interrupt(Arc<AtomicBool>);

impl Interrupt {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Everything a filter needs to run.
#[derive(Clone)]
pub struct RunContext<'a> {
    /// Content root of the filter being run: the project root for local
    /// filters, the download directory for filters nested in a remote one.
    pub absolute_location: PathBuf,
    /// Exposed to filter processes as `ROOT_DIR`.
    pub project_root: PathBuf,
    /// `.refinery` directory holding the caches.
    pub dot_root: PathBuf,
    /// Safe mode disabled by the user.
    pub unlocked: bool,
    pub interrupt: Interrupt,
    pub interpreters: &'a [String],
    pub process: &'a dyn ProcessRunner,
}

impl<'a> RunContext<'a> {
    pub fn new(
        project_root: &Path,
        config: &'a RuntimeConfig,
        process: &'a dyn ProcessRunner,
        interrupt: Interrupt,
    ) -> Self {
        Self {
            absolute_location: project_root.to_path_buf(),
            project_root: project_root.to_path_buf(),
            dot_root: dot_root(project_root),
            unlocked: config.safe_mode_unlocked,
            interrupt,
            interpreters: &config.interpreter.candidates,
            process,
        }
    }

    /// Same context with a different content root.
    pub fn at(&self, location: PathBuf) -> Self {
        Self {
            absolute_location: location,
            ..self.clone()
        }
    }

    pub fn is_interrupted(&self) -> bool {
        self.interrupt.is_set()
    }
}
