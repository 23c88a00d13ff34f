//! Argument vectors handed to filter subprocesses.

use std::path::Path;

/// Forces the Python interpreter to stream stdout/stderr unbuffered.
pub const UNBUFFERED_FLAG: &str = "-u";

/// `[-u, script, settings?, arguments...]`
pub fn script_args(script: &Path, settings: Option<String>, arguments: &[String]) -> Vec<String> {
    let mut args = vec![UNBUFFERED_FLAG.to_string(), script.display().to_string()];
    args.extend(settings);
    args.extend(arguments.iter().cloned());
    args
}

/// `[settings?, arguments...]`
pub fn exe_args(settings: Option<String>, arguments: &[String]) -> Vec<String> {
    let mut args: Vec<String> = settings.into_iter().collect();
    args.extend(arguments.iter().cloned());
    args
}
