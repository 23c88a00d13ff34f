//! Content-build pipeline runner.
//!
//! A project declares filters in `refinery.json` and runs them in order
//! against its tree. Filters are Python scripts, executables, or remote
//! packages fetched from git that enclose their own list of filters.
//!
//! - **[`core`]**: Pure logic (definition parsing, command lines, paths,
//!   version resolution). No I/O.
//! - **[`io`]**: Side-effecting operations (processes, git, caches,
//!   environments, configuration). Behind traits where tests need fakes.
//!
//! [`engine`] runs filters and [`install`] prepares them; both combine
//! core logic with I/O.

pub mod context;
pub mod core;
pub mod engine;
pub mod error;
pub mod exit_codes;
pub mod install;
pub mod io;
pub mod logging;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
