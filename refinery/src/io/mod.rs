//! Side-effecting operations: filesystem, git, process execution.

pub mod cache;
pub mod config;
pub mod data;
pub mod git;
pub mod manifest;
pub mod pipeline;
pub mod process;
pub mod venv;
