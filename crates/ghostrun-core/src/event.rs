//! Normalized progress events published to callers.
//!
//! Wire shape (one JSON object per event):
//! ```text
//! {"type":"init|thinking|tool_use|text|question|complete|error",
//!  "session_id"?, "message"?, "tool_name"?, "tool_input"?, "result"?}
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::protocol::lenient;

/// Kind of a progress event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    #[serde(rename = "init")]
    Started,
    #[serde(rename = "thinking")]
    Thinking,
    #[serde(rename = "tool_use")]
    ToolInvoked,
    #[serde(rename = "text")]
    TextChunk,
    #[serde(rename = "question")]
    QuestionRaised,
    #[serde(rename = "complete")]
    Completed,
    #[serde(rename = "error")]
    Failed,
}

impl EventKind {
    /// Whether this kind ends an execution (`question`, `complete`, `error`).
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::QuestionRaised | Self::Completed | Self::Failed)
    }
}

/// One unit of progress from an execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "type")]
    pub kind: EventKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_input: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<CommandResult>,
}

impl Event {
    const fn bare(kind: EventKind) -> Self {
        Self {
            kind,
            session_id: None,
            message: None,
            tool_name: None,
            tool_input: None,
            result: None,
        }
    }

    /// `init` event. An empty session id is omitted.
    pub fn started(session_id: &str, message: impl Into<String>) -> Self {
        Self {
            session_id: non_empty(session_id),
            message: Some(message.into()),
            ..Self::bare(EventKind::Started)
        }
    }

    pub fn thinking() -> Self {
        Self {
            message: Some("Thinking...".to_string()),
            ..Self::bare(EventKind::Thinking)
        }
    }

    pub fn tool_invoked(name: &str, input: Value, summary: String) -> Self {
        Self {
            message: Some(summary),
            tool_name: Some(name.to_string()),
            tool_input: Some(input),
            ..Self::bare(EventKind::ToolInvoked)
        }
    }

    pub fn text_chunk(text: impl Into<String>) -> Self {
        Self {
            message: Some(text.into()),
            ..Self::bare(EventKind::TextChunk)
        }
    }

    /// `question` event carrying a paused result.
    pub fn question_raised(name: &str, input: Value, questions: Vec<Question>) -> Self {
        Self {
            tool_name: Some(name.to_string()),
            tool_input: Some(input),
            result: Some(CommandResult::paused(String::new(), questions)),
            ..Self::bare(EventKind::QuestionRaised)
        }
    }

    /// `complete` event wrapping `result`; the event session id mirrors the result's.
    pub fn completed(result: CommandResult) -> Self {
        Self {
            session_id: non_empty(&result.session_id),
            result: Some(result),
            ..Self::bare(EventKind::Completed)
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::bare(EventKind::Failed)
        }
    }

    /// Fill in a session id learned earlier in the stream, on both the event
    /// and its result, without overwriting one the event already carries.
    pub fn inherit_session_id(&mut self, session_id: &str) {
        if session_id.is_empty() {
            return;
        }
        if self.session_id.is_none() {
            self.session_id = Some(session_id.to_string());
        }
        if let Some(result) = self.result.as_mut() {
            if result.session_id.is_empty() {
                result.session_id = session_id.to_string();
            }
        }
    }
}

fn non_empty(s: &str) -> Option<String> {
    (!s.is_empty()).then(|| s.to_string())
}

/// Aggregate outcome of one execution.
///
/// `completed == false` always comes with at least one question.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CommandResult {
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub output: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub questions: Vec<Question>,
    #[serde(default)]
    pub completed: bool,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub cost_usd: f64,
}

#[allow(clippy::trivially_copy_pass_by_ref, clippy::float_cmp)]
fn is_zero(v: &f64) -> bool {
    *v == 0.0
}

impl CommandResult {
    /// A finished result with no pending questions.
    pub fn finished(session_id: String, output: String, cost_usd: f64) -> Self {
        Self {
            session_id,
            output,
            questions: Vec::new(),
            completed: true,
            cost_usd: cost_usd.max(0.0),
        }
    }

    /// A result paused on `questions`.
    ///
    /// An empty question list cannot express a pause, so the result is
    /// reported as finished instead.
    pub fn paused(session_id: String, questions: Vec<Question>) -> Self {
        let completed = questions.is_empty();
        Self {
            session_id,
            questions,
            completed,
            ..Self::default()
        }
    }

    /// Mark this result as waiting on `questions` (no-op when empty).
    pub fn pause_on(&mut self, questions: Vec<Question>) {
        if !questions.is_empty() {
            self.questions = questions;
            self.completed = false;
        }
    }

    pub fn is_paused(&self) -> bool {
        !self.completed && !self.questions.is_empty()
    }
}

/// A choice prompt raised by the agent via `AskUserQuestion`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Question {
    #[serde(default, deserialize_with = "lenient::value")]
    pub question: String,
    #[serde(default, deserialize_with = "lenient::value")]
    pub header: String,
    /// Presentation order; never reordered.
    #[serde(default, deserialize_with = "lenient::seq")]
    pub options: Vec<QuestionOption>,
    #[serde(
        rename = "multiSelect",
        alias = "multi_select",
        default,
        deserialize_with = "lenient::value"
    )]
    pub multi_select: bool,
}

/// One selectable option of a [`Question`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct QuestionOption {
    #[serde(default, deserialize_with = "lenient::value")]
    pub label: String,
    #[serde(default, deserialize_with = "lenient::value")]
    pub description: String,
}
