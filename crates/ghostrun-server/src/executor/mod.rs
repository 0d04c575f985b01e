//! Execution of agent commands.
//!
//! [`Executor::run_streaming`] republishes the agent's progress as events
//! over a bounded channel; [`Executor::run_sync`] drains the agent and
//! returns one aggregated [`CommandResult`]. Both share the launch path in
//! [`crate::subprocess`] and the translator in `ghostrun_core::protocol`.

mod error;
mod streaming;
mod sync;

pub use error::{DISCONNECTED_MESSAGE, ExecutionError};

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use ghostrun_core::commands::build_prompt;
use ghostrun_core::config::ExecutorConfig;
use ghostrun_core::{CommandResult, CommandWhitelist, Event};
use tokio::sync::mpsc;

use crate::subprocess::{LaunchSpec, OutputFormat};

/// Receives every event an executor emits, in emission order.
///
/// Observers run inline on the executor task and must not block.
pub trait EventObserver: Send + Sync {
    fn observe(&self, event: &Event);
}

/// Lifecycle of one execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionState {
    Starting,
    Running,
    /// Stopped on a question; resume with a continuation request.
    Paused,
    Completed,
    Failed,
}

impl ExecutionState {
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Paused | Self::Completed | Self::Failed)
    }
}

/// What to run: a prompt in a project directory, optionally resuming a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionRequest {
    pub working_directory: PathBuf,
    pub prompt: String,
    pub resume_session: Option<String>,
}

impl ExecutionRequest {
    /// A fresh slash-command execution. Unlisted commands are rejected here,
    /// before any process exists.
    pub fn command<P: AsRef<Path>>(
        whitelist: &CommandWhitelist,
        working_directory: impl Into<PathBuf>,
        command: &str,
        args: &str,
        image_paths: &[P],
    ) -> Result<Self, ExecutionError> {
        whitelist
            .check(command)
            .map_err(|_| ExecutionError::CommandNotAllowed(command.to_string()))?;
        Ok(Self {
            working_directory: working_directory.into(),
            prompt: build_prompt(command, args, image_paths),
            resume_session: None,
        })
    }

    /// Resume `session_id`, sending the human's answer as the prompt.
    pub fn continuation(
        working_directory: impl Into<PathBuf>,
        session_id: impl Into<String>,
        answer: impl Into<String>,
    ) -> Self {
        Self {
            working_directory: working_directory.into(),
            prompt: answer.into(),
            resume_session: Some(session_id.into()),
        }
    }

    pub fn launch_spec(&self, output_format: OutputFormat) -> LaunchSpec {
        LaunchSpec {
            working_directory: self.working_directory.clone(),
            prompt: self.prompt.clone(),
            resume_session: self.resume_session.clone(),
            output_format,
        }
    }
}

/// Terminal report of a streaming execution.
#[derive(Debug)]
pub struct ExecutionOutcome {
    /// Always a terminal state.
    pub state: ExecutionState,
    /// Last session id seen (or the resumed one), empty if none.
    pub session_id: String,
    /// Final result, for `Completed` and `Paused`.
    pub result: Option<CommandResult>,
    /// Set for `Failed`.
    pub error: Option<ExecutionError>,
}

/// Launches and supervises agent processes. Cheap to clone.
#[derive(Clone)]
pub struct Executor {
    claude_bin: PathBuf,
    timeout: Duration,
    channel_capacity: usize,
    max_line_bytes: usize,
    observers: Vec<Arc<dyn EventObserver>>,
}

impl fmt::Debug for Executor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Executor")
            .field("claude_bin", &self.claude_bin)
            .field("timeout", &self.timeout)
            .field("channel_capacity", &self.channel_capacity)
            .field("max_line_bytes", &self.max_line_bytes)
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl Executor {
    pub fn new(config: &ExecutorConfig) -> Self {
        Self {
            claude_bin: config.claude_bin.clone(),
            timeout: config.timeout(),
            channel_capacity: config.channel_capacity.max(1),
            max_line_bytes: config.max_line_bytes,
            observers: Vec::new(),
        }
    }

    /// Register an observer for every event emitted from now on.
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn EventObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// A bounded event channel sized from the configuration.
    pub fn channel(&self) -> (mpsc::Sender<Event>, mpsc::Receiver<Event>) {
        mpsc::channel(self.channel_capacity)
    }

    fn observe(&self, event: &Event) {
        for observer in &self.observers {
            observer.observe(event);
        }
    }
}
