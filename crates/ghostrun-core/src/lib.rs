//! Ghostrun Core Library
//!
//! Shared functionality for the Ghostrun server:
//! - Normalized agent event model (`Event`, `CommandResult`, `Question`)
//! - Translation of Claude Code stream-json lines into events
//! - Slash-command whitelist and prompt construction
//! - Configuration resolution
//! - Common error types

pub mod commands;
pub mod config;
pub mod error;
pub mod event;
pub mod protocol;
pub mod tracing_init;

pub use commands::CommandWhitelist;
pub use config::Config;
pub use error::{Error, Result};
pub use event::{CommandResult, Event, EventKind, Question, QuestionOption};
