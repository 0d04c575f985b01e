//! One Claude Code process invocation.
//!
//! Builds the argument list, spawns the process in the project directory,
//! exposes stdout as a line stream, forwards stderr to the log and offers
//! idempotent kill/wait.

use std::borrow::Cow;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::{Child, ChildStdout, Command};
use tokio::task::JoinHandle;
use tokio_stream::{Stream, StreamExt};
use tokio_util::codec::{AnyDelimiterCodec, AnyDelimiterCodecError, FramedRead};
use tracing::{debug, info, warn};

/// Stderr lines kept for failure messages.
const STDERR_TAIL_LINES: usize = 20;

/// How long to wait for the stderr reader after the process exited.
const STDERR_DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

/// Output format requested from the agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// One JSON document after the process finishes.
    Json,
    /// One JSON object per line while the process runs.
    StreamJson,
}

impl OutputFormat {
    pub const fn as_arg(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::StreamJson => "stream-json",
        }
    }
}

/// Everything needed to launch one agent process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    /// Project directory the process runs in.
    pub working_directory: PathBuf,
    /// Prompt passed with `-p`.
    pub prompt: String,
    /// Session to resume; `None` or empty starts a new session.
    pub resume_session: Option<String>,
    pub output_format: OutputFormat,
}

impl LaunchSpec {
    /// Arguments for the `claude` binary, in a fixed order.
    pub fn args(&self) -> Vec<String> {
        let mut args = vec![
            "-p".to_string(),
            self.prompt.clone(),
            "--output-format".to_string(),
            self.output_format.as_arg().to_string(),
        ];
        // stream-json requires --verbose
        if self.output_format == OutputFormat::StreamJson {
            args.push("--verbose".to_string());
        }
        args.push("--permission-mode".to_string());
        args.push("bypassPermissions".to_string());
        if let Some(session) = self.resume_session.as_deref().filter(|s| !s.is_empty()) {
            args.push("--resume".to_string());
            args.push(session.to_string());
        }
        args
    }
}

/// Errors from process operations.
#[derive(Debug, thiserror::Error)]
pub enum SubprocessError {
    #[error("Failed to spawn subprocess: {reason}")]
    SpawnFailed { reason: String },

    #[error("Working directory is not a directory: {}", path.display())]
    WorkingDirectory { path: PathBuf },

    #[error("Failed to capture {0}")]
    MissingPipe(&'static str),

    #[error("Failed to wait for subprocess: {0}")]
    Wait(#[source] std::io::Error),

    #[error("Failed to kill subprocess: {0}")]
    Kill(#[source] std::io::Error),
}

/// Handle to a running agent process. Exclusively owned by one executor.
///
/// The child is killed when the session is dropped.
#[derive(Debug)]
pub struct ProcessSession {
    id: String,
    child: Child,
    status: Option<ExitStatus>,
    stderr_tail: Arc<Mutex<VecDeque<String>>>,
    stderr_task: Option<JoinHandle<()>>,
}

/// Standard output of a [`ProcessSession`].
#[derive(Debug)]
pub struct ProcessOutput {
    stdout: ChildStdout,
}

impl ProcessSession {
    /// Spawn the agent described by `spec`.
    pub fn start(
        claude_bin: &Path,
        spec: &LaunchSpec,
    ) -> Result<(Self, ProcessOutput), SubprocessError> {
        if !spec.working_directory.is_dir() {
            return Err(SubprocessError::WorkingDirectory {
                path: spec.working_directory.clone(),
            });
        }

        let mut cmd = Command::new(claude_bin);
        cmd.current_dir(&spec.working_directory)
            .args(spec.args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let id = uuid::Uuid::new_v4().to_string();
        info!(
            process_id = %id,
            claude_bin = %claude_bin.display(),
            working_dir = %spec.working_directory.display(),
            format = spec.output_format.as_arg(),
            resume_session = ?spec.resume_session,
            "Spawning claude subprocess"
        );

        let mut child = cmd.spawn().map_err(|e| SubprocessError::SpawnFailed {
            reason: e.to_string(),
        })?;

        let stdout = child
            .stdout
            .take()
            .ok_or(SubprocessError::MissingPipe("stdout"))?;

        let stderr_tail = Arc::new(Mutex::new(VecDeque::with_capacity(STDERR_TAIL_LINES)));
        let stderr_task = child.stderr.take().map(|stderr| {
            let tail = Arc::clone(&stderr_tail);
            let pid = id.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    warn!(process_id = %pid, "stderr: {}", line);
                    if let Ok(mut tail) = tail.lock() {
                        if tail.len() == STDERR_TAIL_LINES {
                            tail.pop_front();
                        }
                        tail.push_back(line);
                    }
                }
                debug!(process_id = %pid, "stderr reader finished");
            })
        });

        let session = Self {
            id,
            child,
            status: None,
            stderr_tail,
            stderr_task,
        };
        Ok((session, ProcessOutput { stdout }))
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn pid(&self) -> Option<u32> {
        self.child.id()
    }

    /// Kill the process. Calling this after the process exited, or twice,
    /// is a no-op.
    pub async fn kill(&mut self) -> Result<(), SubprocessError> {
        if self.status.is_some() {
            return Ok(());
        }
        if let Some(status) = self.child.try_wait().map_err(SubprocessError::Wait)? {
            self.status = Some(status);
            return Ok(());
        }
        match self.child.kill().await {
            Ok(()) => {
                debug!(process_id = %self.id, "Subprocess killed");
                Ok(())
            }
            // Already reaped
            Err(e) if e.kind() == std::io::ErrorKind::InvalidInput => Ok(()),
            Err(e) => Err(SubprocessError::Kill(e)),
        }
    }

    /// Wait for the process to exit. Returns the cached status on later calls.
    pub async fn wait(&mut self) -> Result<ExitStatus, SubprocessError> {
        if let Some(status) = self.status {
            return Ok(status);
        }
        let status = self.child.wait().await.map_err(SubprocessError::Wait)?;
        debug!(process_id = %self.id, ?status, "Subprocess exited");
        self.status = Some(status);
        Ok(status)
    }

    /// Kill and reap, logging instead of failing. Used on every early exit.
    pub async fn stop(&mut self) {
        if let Err(e) = self.kill().await {
            warn!(process_id = %self.id, error = %e, "Failed to kill subprocess");
        }
        if let Err(e) = self.wait().await {
            warn!(process_id = %self.id, error = %e, "Failed to reap subprocess");
        }
    }

    /// Last stderr lines, joined. Waits briefly for the stderr reader to
    /// drain once the process has exited.
    pub async fn stderr_tail(&mut self) -> String {
        if self.status.is_some() {
            if let Some(task) = self.stderr_task.take() {
                if tokio::time::timeout(STDERR_DRAIN_TIMEOUT, task).await.is_err() {
                    debug!(process_id = %self.id, "stderr reader still open after exit");
                }
            }
        }
        self.stderr_tail
            .lock()
            .map(|tail| tail.iter().map(String::as_str).collect::<Vec<_>>().join("\n"))
            .unwrap_or_default()
    }
}

impl ProcessOutput {
    /// Stdout split into lines, each at most `max_line_bytes` long.
    ///
    /// Lines are framed as raw bytes and decoded lossily, so a line that is
    /// not UTF-8 reaches the translator (and is skipped there) instead of
    /// ending the stream.
    pub fn into_lines(
        self,
        max_line_bytes: usize,
    ) -> impl Stream<Item = Result<String, AnyDelimiterCodecError>> + Unpin {
        let codec =
            AnyDelimiterCodec::new_with_max_length(b"\n".to_vec(), b"\n".to_vec(), max_line_bytes);
        FramedRead::new(self.stdout, codec).map(|chunk| chunk.map(|bytes| decode_line(&bytes)))
    }

    /// Read all of stdout. Invalid UTF-8 is replaced.
    pub async fn read_to_string(mut self) -> std::io::Result<String> {
        let mut buf = Vec::new();
        self.stdout.read_to_end(&mut buf).await?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }
}

fn decode_line(bytes: &[u8]) -> String {
    let text = String::from_utf8_lossy(bytes);
    if matches!(text, Cow::Owned(_)) {
        debug!(bytes = bytes.len(), "Replaced invalid UTF-8 in stdout line");
    }
    let line: &str = &text;
    line.strip_suffix('\r').unwrap_or(line).to_string()
}
