//! Synchronous execution: drain the agent, return one result.

use ghostrun_core::protocol::parse_result_document;
use ghostrun_core::{CommandResult, Event};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{ExecutionError, ExecutionRequest, Executor};
use crate::subprocess::{OutputFormat, ProcessSession};

impl Executor {
    /// Run `request` to completion and return its aggregated result.
    ///
    /// Output that is not a result document is returned verbatim as a
    /// completed result. A non-zero exit still yields a result when stdout
    /// parses; otherwise the error carries the captured stdout.
    pub async fn run_sync(
        &self,
        request: ExecutionRequest,
        cancel: CancellationToken,
    ) -> Result<CommandResult, ExecutionError> {
        let outcome = self.collect(&request, &cancel).await;
        match &outcome {
            Ok(result) => {
                info!(
                    session_id = %result.session_id,
                    questions = result.questions.len(),
                    completed = result.completed,
                    "Sync execution finished"
                );
                self.observe(&Event::completed(result.clone()));
            }
            Err(e) => {
                warn!(error = %e, "Sync execution failed");
                self.observe(&Event::failed(e.to_string()));
            }
        }
        outcome
    }

    async fn collect(
        &self,
        request: &ExecutionRequest,
        cancel: &CancellationToken,
    ) -> Result<CommandResult, ExecutionError> {
        let spec = request.launch_spec(OutputFormat::Json);
        let deadline = Instant::now() + self.timeout;
        let (mut session, output) =
            ProcessSession::start(&self.claude_bin, &spec).map_err(ExecutionError::Startup)?;

        let drained = tokio::select! {
            biased;
            () = cancel.cancelled() => Err(ExecutionError::Cancelled),
            () = tokio::time::sleep_until(deadline) => Err(ExecutionError::Timeout { after: self.timeout }),
            drained = async {
                let stdout = output.read_to_string().await;
                let status = session.wait().await;
                (stdout, status)
            } => Ok(drained),
        };
        let (stdout, status) = match drained {
            Ok(drained) => drained,
            Err(e) => {
                session.stop().await;
                return Err(e);
            }
        };

        let stdout = stdout.map_err(|e| ExecutionError::StreamRead(e.to_string()))?;
        let status = status.map_err(|e| ExecutionError::ProcessExit {
            detail: e.to_string(),
            partial_output: stdout.clone(),
        })?;
        debug!(
            process_id = %session.id(),
            %status,
            stdout_len = stdout.len(),
            "Agent exited"
        );

        if status.success() {
            return Ok(parse_result_document(&stdout).unwrap_or_else(|e| {
                debug!(error = %e, "Output is not a result document, returning it as text");
                CommandResult::finished(String::new(), stdout, 0.0)
            }));
        }

        if !stdout.trim().is_empty() {
            if let Ok(result) = parse_result_document(&stdout) {
                warn!(
                    process_id = %session.id(),
                    %status,
                    "Agent exited with failure but produced a result"
                );
                return Ok(result);
            }
        }

        let stderr = session.stderr_tail().await;
        let detail = if stderr.is_empty() {
            status.to_string()
        } else {
            format!("{status}: {stderr}")
        };
        Err(ExecutionError::ProcessExit {
            detail,
            partial_output: stdout,
        })
    }
}
