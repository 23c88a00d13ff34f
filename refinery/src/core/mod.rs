//! Deterministic, pure logic shared by the filter engine.
//!
//! Core modules must be free of I/O side effects. They parse configuration
//! objects, compute cache locations and build argument vectors.

pub mod command;
pub mod definition;
pub mod instance;
pub mod locator;
pub mod paths;
pub mod version;
