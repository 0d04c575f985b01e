use std::time::Duration;

use crate::subprocess::SubprocessError;

/// Message of the failure published when the caller goes away.
pub const DISCONNECTED_MESSAGE: &str = "Client disconnected";

/// Why an execution did not produce a result.
///
/// Undecodable protocol lines never surface here; they are logged and
/// skipped by the translator.
#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    /// The agent process could not be launched.
    #[error("Failed to start command: {0}")]
    Startup(#[source] SubprocessError),

    /// The bounded lifetime elapsed before the agent finished.
    #[error("Execution timeout")]
    Timeout { after: Duration },

    /// The caller went away or aborted.
    #[error("Client disconnected")]
    Cancelled,

    /// Stdout could not be read (oversized line or I/O error).
    #[error("Stream read error: {0}")]
    StreamRead(String),

    /// Non-zero exit without a usable result.
    #[error("Command failed: {detail}")]
    ProcessExit {
        detail: String,
        /// Whatever stdout was captured before the failure.
        partial_output: String,
    },

    /// Rejected before any process was launched.
    #[error("Command not allowed: {0}")]
    CommandNotAllowed(String),
}

impl ExecutionError {
    /// Output salvaged from a failed synchronous execution, if any.
    pub fn partial_output(&self) -> Option<&str> {
        match self {
            Self::ProcessExit { partial_output, .. } if !partial_output.is_empty() => {
                Some(partial_output)
            }
            _ => None,
        }
    }

    /// Precondition failures are the caller's fault.
    pub const fn is_rejection(&self) -> bool {
        matches!(self, Self::CommandNotAllowed(_))
    }
}
