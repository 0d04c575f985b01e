//! Subprocess management for Claude Code processes.

pub mod session;

pub use session::{LaunchSpec, OutputFormat, ProcessOutput, ProcessSession, SubprocessError};
