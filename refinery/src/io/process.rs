//! Child process execution for filters and toolchain probes.
//!
//! Filters run to completion without a timeout. Their stdout/stderr are read
//! concurrently and forwarded line by line as log events prefixed with the
//! filter name.

use std::env;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::thread;

use tracing::{debug, error, info, instrument, warn};

use crate::core::paths::ROOT_DIR_ENV;
use crate::error::FilterError;

/// A fully resolved subprocess call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub workdir: PathBuf,
    /// Exposed to the child as `ROOT_DIR` when set.
    pub project_root: Option<PathBuf>,
    /// Short name used to prefix forwarded output.
    pub label: String,
}

/// Abstraction over process spawning so the engine can be driven by fakes in tests.
pub trait ProcessRunner {
    /// Run to completion; a non-zero exit status is an error.
    fn run(&self, invocation: &Invocation) -> Result<(), FilterError>;

    /// Run a short command and return its combined, trimmed output.
    fn probe(&self, program: &Path, args: &[&str]) -> Result<String, FilterError>;

    /// Resolve an executable name against `PATH`.
    fn locate(&self, name: &str) -> Option<PathBuf>;
}

/// Runs real child processes.
pub struct SubprocessRunner;

impl ProcessRunner for SubprocessRunner {
    #[instrument(skip_all, fields(label = %invocation.label))]
    fn run(&self, invocation: &Invocation) -> Result<(), FilterError> {
        let mut cmd = Command::new(&invocation.program);
        cmd.args(&invocation.args)
            .current_dir(&invocation.workdir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(root) = &invocation.project_root {
            cmd.env(ROOT_DIR_ENV, root);
        }

        debug!(
            program = %invocation.program.display(),
            args = ?invocation.args,
            workdir = %invocation.workdir.display(),
            "spawning child process"
        );
        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                error!(err = %e, "failed to spawn command");
                return Err(subprocess_error(
                    invocation,
                    format!("could not be started: {e}"),
                ));
            }
        };

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| subprocess_error(invocation, "stdout was not piped".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| subprocess_error(invocation, "stderr was not piped".to_string()))?;

        let stdout_label = invocation.label.clone();
        let stderr_label = invocation.label.clone();
        let stdout_handle =
            thread::spawn(move || forward_lines(stdout, &stdout_label, Stream::Stdout));
        let stderr_handle =
            thread::spawn(move || forward_lines(stderr, &stderr_label, Stream::Stderr));

        let status = child
            .wait()
            .map_err(|e| subprocess_error(invocation, format!("could not be awaited: {e}")))?;

        for handle in [stdout_handle, stderr_handle] {
            if handle.join().is_err() {
                warn!("output forwarding thread panicked");
            }
        }

        debug!(exit_code = ?status.code(), "command finished");
        if !status.success() {
            return Err(subprocess_error(
                invocation,
                format!("exited with {}", describe_status(status)),
            ));
        }
        Ok(())
    }

    fn probe(&self, program: &Path, args: &[&str]) -> Result<String, FilterError> {
        let tool = program.display().to_string();
        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| FilterError::ExternalTool {
                tool: tool.clone(),
                reason: format!("could not be started: {e}"),
            })?;
        let mut text = String::from_utf8_lossy(&output.stdout).to_string();
        text.push_str(&String::from_utf8_lossy(&output.stderr));
        if !output.status.success() {
            return Err(FilterError::ExternalTool {
                tool,
                reason: format!(
                    "exited with {}: {}",
                    describe_status(output.status),
                    text.trim()
                ),
            });
        }
        Ok(text.trim().to_string())
    }

    fn locate(&self, name: &str) -> Option<PathBuf> {
        let candidate = Path::new(name);
        if candidate.components().count() > 1 {
            return candidate.is_file().then(|| candidate.to_path_buf());
        }
        let path = env::var_os("PATH")?;
        env::split_paths(&path)
            .map(|dir| dir.join(format!("{name}{}", env::consts::EXE_SUFFIX)))
            .find(|full| full.is_file())
    }
}

#[derive(Debug, Clone, Copy)]
enum Stream {
    Stdout,
    Stderr,
}

/// Forward each line of `reader` to the log until EOF.
fn forward_lines<R: Read>(reader: R, label: &str, stream: Stream) {
    let mut reader = BufReader::new(reader);
    let mut line = Vec::new();
    loop {
        line.clear();
        match reader.read_until(b'\n', &mut line) {
            Ok(0) => break,
            Ok(_) => {
                let text = String::from_utf8_lossy(&line);
                let text = text.trim_end_matches(['\r', '\n']);
                match stream {
                    Stream::Stdout => info!("[{label}] {text}"),
                    Stream::Stderr => warn!("[{label}] {text}"),
                }
            }
            Err(e) => {
                warn!(err = %e, "failed to read child output");
                break;
            }
        }
    }
}

fn describe_status(status: ExitStatus) -> String {
    match status.code() {
        Some(code) => format!("exit code {code}"),
        None => "a signal".to_string(),
    }
}

fn subprocess_error(invocation: &Invocation, reason: String) -> FilterError {
    FilterError::Subprocess {
        label: invocation.label.clone(),
        program: invocation.program.display().to_string(),
        reason,
    }
}
