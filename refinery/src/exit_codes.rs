//! Stable exit codes for refinery CLI commands.

/// Command succeeded.
pub const OK: i32 = 0;
/// Invalid configuration, failed install, or a filter failed.
pub const FAILED: i32 = 1;
/// `refinery run` stopped early after Ctrl-C.
pub const INTERRUPTED: i32 = 2;
