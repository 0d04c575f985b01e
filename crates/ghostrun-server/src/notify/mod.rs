//! Push notifications for finished executions.
//!
//! Notifiers subscribe to executor events as [`EventObserver`]s; they never
//! sit inside the parsing path. [`notification_for`] decides which events
//! are worth a notification.
//!
//! [`EventObserver`]: crate::executor::EventObserver

pub mod desktop;
pub mod ntfy;

pub use desktop::DesktopNotifier;
pub use ntfy::NtfyNotifier;

use ghostrun_core::protocol::truncate_chars;
use ghostrun_core::{Event, EventKind};

use crate::executor::DISCONNECTED_MESSAGE;

const COMPLETE_TITLE: &str = "Claude Code - Complete";
const QUESTION_TITLE: &str = "Claude Code - Question";
const ERROR_TITLE: &str = "Claude Code - Error";

/// Longest output excerpt put in a completion notification.
const MESSAGE_PREVIEW_CHARS: usize = 100;

/// Errors that can occur while delivering a notification.
#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    /// The HTTP client could not be built.
    #[error("Notification client error: {0}")]
    Client(String),

    /// HTTP request failed.
    #[error("Notification request error: {0}")]
    Request(String),

    /// The notification service returned a non-success status code.
    #[error("Notification API error (status {status}): {body}")]
    ApiError { status: u16, body: String },

    /// The local notifier program failed.
    #[error("Notifier command error: {0}")]
    Command(String),
}

/// Urgency of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Priority {
    Normal,
    High,
}

impl Priority {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Normal => "default",
            Self::High => "high",
        }
    }

    /// Desktop notification sound.
    pub const fn sound(self) -> &'static str {
        match self {
            Self::Normal => "default",
            Self::High => "Basso",
        }
    }

    /// Emoji tag shown next to the title.
    pub const fn tag(self) -> &'static str {
        match self {
            Self::Normal => "white_check_mark",
            Self::High => "x",
        }
    }
}

/// One notification ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub message: String,
    pub priority: Priority,
}

/// The notification for `event`, if it ends an execution.
///
/// A client disconnect is not reported: whoever would read it already left.
pub fn notification_for(event: &Event) -> Option<Notification> {
    let paused = event.result.as_ref().is_some_and(|r| r.is_paused());
    match event.kind {
        EventKind::QuestionRaised => Some(question()),
        EventKind::Completed if paused => Some(question()),
        EventKind::Completed => {
            let output = event
                .result
                .as_ref()
                .map(|r| r.output.trim())
                .unwrap_or_default();
            let message = if output.is_empty() {
                "Command completed successfully".to_string()
            } else {
                truncate_chars(output, MESSAGE_PREVIEW_CHARS)
            };
            Some(Notification {
                title: COMPLETE_TITLE.to_string(),
                message,
                priority: Priority::Normal,
            })
        }
        EventKind::Failed if event.message.as_deref() == Some(DISCONNECTED_MESSAGE) => None,
        EventKind::Failed => Some(Notification {
            title: ERROR_TITLE.to_string(),
            message: event
                .message
                .clone()
                .unwrap_or_else(|| "Command failed".to_string()),
            priority: Priority::High,
        }),
        _ => None,
    }
}

fn question() -> Notification {
    Notification {
        title: QUESTION_TITLE.to_string(),
        message: "Waiting for your answer".to_string(),
        priority: Priority::Normal,
    }
}
