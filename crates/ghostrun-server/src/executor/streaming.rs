//! Streaming execution: live events over a bounded channel.
//!
//! ```text
//! Starting ──start ok──▶ Running ──question──▶ Paused
//!    │                     │ └───eof + exit──▶ Completed | Failed
//!    └──start failed──▶ Failed    └─timeout/cancel/read error──▶ Failed
//! ```
//!
//! The sender is owned by the run and dropped on return, so the channel is
//! closed exactly once on every path.

use std::future::Future;
use std::time::Duration;

use ghostrun_core::protocol::translate_line;
use ghostrun_core::{CommandResult, Event, EventKind};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_stream::StreamExt;
use tokio_util::codec::AnyDelimiterCodecError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use super::{ExecutionError, ExecutionOutcome, ExecutionRequest, ExecutionState, Executor};
use crate::subprocess::{OutputFormat, ProcessOutput, ProcessSession};

/// How long a terminal failure event may wait for a stalled consumer.
const FINAL_EVENT_GRACE: Duration = Duration::from_secs(5);

/// Why the run stopped before the agent finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Interrupt {
    /// Cancellation token fired, or the receiver was dropped.
    Cancelled,
    TimedOut,
}

impl Executor {
    /// Run `request`, publishing events to `events` until a terminal state.
    ///
    /// Cancelling `cancel` stops publishing, kills the agent and returns
    /// without waiting for the channel to drain.
    pub async fn run_streaming(
        &self,
        request: ExecutionRequest,
        events: mpsc::Sender<Event>,
        cancel: CancellationToken,
    ) -> ExecutionOutcome {
        let spec = request.launch_spec(OutputFormat::StreamJson);
        let mut run = StreamRun {
            executor: self,
            events,
            cancel,
            deadline: Instant::now() + self.timeout,
            state: ExecutionState::Starting,
            session_id: request.resume_session.unwrap_or_default(),
            final_result: None,
        };

        let (mut session, output) = match ProcessSession::start(&self.claude_bin, &spec) {
            Ok(started) => started,
            Err(e) => {
                warn!(error = %e, "Failed to start claude subprocess");
                return run.fail(ExecutionError::Startup(e)).await;
            }
        };
        run.state = ExecutionState::Running;
        info!(
            process_id = %session.id(),
            resume_session = %run.session_id,
            "Streaming execution started"
        );

        let outcome = run.drive(&mut session, output).await;
        info!(
            process_id = %session.id(),
            state = ?outcome.state,
            session_id = %outcome.session_id,
            "Streaming execution finished"
        );
        outcome
    }
}

struct StreamRun<'a> {
    executor: &'a Executor,
    events: mpsc::Sender<Event>,
    cancel: CancellationToken,
    deadline: Instant,
    state: ExecutionState,
    session_id: String,
    final_result: Option<CommandResult>,
}

impl StreamRun<'_> {
    async fn drive(
        mut self,
        session: &mut ProcessSession,
        output: ProcessOutput,
    ) -> ExecutionOutcome {
        if let Err(interrupt) = self.publish(Event::started("", "Claude CLI started")).await {
            return self.interrupted(session, interrupt).await;
        }

        let mut lines = output.into_lines(self.executor.max_line_bytes);
        loop {
            let line = match self.guard(lines.next()).await {
                Ok(Some(Ok(line))) => line,
                Ok(Some(Err(e))) => return self.read_failed(session, e).await,
                Ok(None) => break,
                Err(interrupt) => return self.interrupted(session, interrupt).await,
            };
            if line.trim().is_empty() {
                continue;
            }
            trace!(process_id = %session.id(), bytes = line.len(), "stdout line");

            for mut event in translate_line(&line) {
                if let Some(sid) = event.session_id.as_deref().filter(|s| !s.is_empty()) {
                    self.session_id = sid.to_string();
                }
                let completed = match event.kind {
                    // A question ends the run; anything after it in the line is dropped.
                    EventKind::QuestionRaised => {
                        event.inherit_session_id(&self.session_id);
                        return self.pause(session, event).await;
                    }
                    EventKind::Completed => {
                        event.inherit_session_id(&self.session_id);
                        event.result.clone()
                    }
                    _ => None,
                };
                if let Err(interrupt) = self.publish(event).await {
                    return self.interrupted(session, interrupt).await;
                }
                if completed.is_some() {
                    self.final_result = completed;
                }
            }
        }

        self.finish(session).await
    }

    /// Race `fut` against cancellation and the deadline.
    async fn guard<F: Future>(&self, fut: F) -> Result<F::Output, Interrupt> {
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(Interrupt::Cancelled),
            () = tokio::time::sleep_until(self.deadline) => Err(Interrupt::TimedOut),
            out = fut => Ok(out),
        }
    }

    async fn publish(&self, event: Event) -> Result<(), Interrupt> {
        self.executor.observe(&event);
        self.guard(self.events.send(event))
            .await?
            .map_err(|_| Interrupt::Cancelled)
    }

    async fn pause(mut self, session: &mut ProcessSession, event: Event) -> ExecutionOutcome {
        let result = event.result.clone();
        if let Err(interrupt) = self.publish(event).await {
            return self.interrupted(session, interrupt).await;
        }
        info!(
            process_id = %session.id(),
            session_id = %self.session_id,
            "Question raised, stopping agent until answered"
        );
        session.stop().await;
        self.final_result = result;
        self.state = ExecutionState::Paused;
        self.into_outcome(None)
    }

    /// Stdout closed: decide the outcome from the exit status.
    async fn finish(mut self, session: &mut ProcessSession) -> ExecutionOutcome {
        let status = match self.guard(session.wait()).await {
            Ok(Ok(status)) => status,
            Ok(Err(e)) => {
                warn!(process_id = %session.id(), error = %e, "Failed to wait for subprocess");
                if self.final_result.is_some() {
                    return self.keep_result();
                }
                return self
                    .fail(ExecutionError::ProcessExit {
                        detail: e.to_string(),
                        partial_output: String::new(),
                    })
                    .await;
            }
            Err(interrupt) => return self.interrupted(session, interrupt).await,
        };

        if status.success() {
            if self.final_result.is_none() {
                debug!(process_id = %session.id(), "No result line seen, synthesizing completion");
                let result = CommandResult::finished(self.session_id.clone(), String::new(), 0.0);
                if let Err(interrupt) = self.publish(Event::completed(result.clone())).await {
                    return self.interrupted(session, interrupt).await;
                }
                self.final_result = Some(result);
            }
            return self.keep_result();
        }

        if self.final_result.is_some() {
            warn!(
                process_id = %session.id(),
                %status,
                "Agent exited with failure after producing a result, keeping the result"
            );
            return self.keep_result();
        }

        let stderr = session.stderr_tail().await;
        let detail = if stderr.is_empty() {
            status.to_string()
        } else {
            format!("{status}: {stderr}")
        };
        warn!(process_id = %session.id(), %detail, "Agent exited with failure");
        self.fail(ExecutionError::ProcessExit {
            detail,
            partial_output: String::new(),
        })
        .await
    }

    async fn read_failed(
        self,
        session: &mut ProcessSession,
        error: AnyDelimiterCodecError,
    ) -> ExecutionOutcome {
        warn!(process_id = %session.id(), error = %error, "Failed to read agent output");
        session.stop().await;
        if self.final_result.is_some() {
            return self.keep_result();
        }
        self.fail(ExecutionError::StreamRead(error.to_string())).await
    }

    async fn interrupted(
        self,
        session: &mut ProcessSession,
        interrupt: Interrupt,
    ) -> ExecutionOutcome {
        session.stop().await;
        // A published result stays authoritative.
        if self.final_result.is_some() {
            debug!(process_id = %session.id(), ?interrupt, "Interrupted after result");
            return self.keep_result();
        }
        match interrupt {
            Interrupt::Cancelled => {
                info!(process_id = %session.id(), "Client disconnected, agent stopped");
                self.fail(ExecutionError::Cancelled).await
            }
            Interrupt::TimedOut => {
                let after = self.executor.timeout;
                warn!(process_id = %session.id(), ?after, "Execution timed out, agent stopped");
                self.fail(ExecutionError::Timeout { after }).await
            }
        }
    }

    /// Publish one `error` event and end in `Failed`.
    async fn fail(mut self, error: ExecutionError) -> ExecutionOutcome {
        let event = Event::failed(error.to_string());
        self.executor.observe(&event);
        if matches!(error, ExecutionError::Cancelled) {
            // Best effort, the consumer is most likely gone.
            let _ = self.events.try_send(event);
        } else {
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => {
                    debug!("Cancelled while publishing failure");
                }
                () = tokio::time::sleep(FINAL_EVENT_GRACE) => {
                    warn!("Consumer stalled, dropping failure event");
                }
                sent = self.events.send(event) => {
                    if sent.is_err() {
                        debug!("Consumer gone before failure event");
                    }
                }
            }
        }
        self.state = ExecutionState::Failed;
        self.into_outcome(Some(error))
    }

    fn keep_result(mut self) -> ExecutionOutcome {
        self.state = if self
            .final_result
            .as_ref()
            .is_some_and(CommandResult::is_paused)
        {
            ExecutionState::Paused
        } else {
            ExecutionState::Completed
        };
        self.into_outcome(None)
    }

    fn into_outcome(self, error: Option<ExecutionError>) -> ExecutionOutcome {
        ExecutionOutcome {
            state: self.state,
            session_id: self.session_id,
            result: self.final_result,
            error,
        }
    }
}
