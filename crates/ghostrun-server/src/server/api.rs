//! Request and response bodies.

use ghostrun_core::{CommandResult, Question};
use serde::{Deserialize, Serialize};

use crate::images::ImageAttachment;

/// `POST /api/command[/stream]`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommandRequest {
    #[serde(default)]
    pub project: String,
    #[serde(default)]
    pub command: String,
    #[serde(default)]
    pub args: String,
    #[serde(default)]
    pub images: Vec<ImageAttachment>,
}

/// `POST /api/plan[/stream]`: a command request fixed to `plan`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlanRequest {
    #[serde(default)]
    pub project: String,
    #[serde(default)]
    pub args: String,
}

/// `POST /api/{command,plan}/continue[/stream]`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContinueRequest {
    #[serde(default)]
    pub project: String,
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub answer: String,
}

/// Body of every synchronous endpoint, success or failure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommandResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub session_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub output: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub questions: Vec<Question>,
    #[serde(default)]
    pub completed: bool,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub cost_usd: f64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error: String,
}

#[allow(clippy::trivially_copy_pass_by_ref, clippy::float_cmp)]
fn is_zero(v: &f64) -> bool {
    *v == 0.0
}

impl CommandResponse {
    pub fn failure(error: impl Into<String>, partial_output: Option<&str>) -> Self {
        Self {
            error: error.into(),
            output: partial_output.unwrap_or_default().to_string(),
            ..Self::default()
        }
    }
}

impl From<CommandResult> for CommandResponse {
    fn from(result: CommandResult) -> Self {
        Self {
            success: true,
            session_id: result.session_id,
            output: result.output,
            questions: result.questions,
            completed: result.completed,
            cost_usd: result.cost_usd,
            error: String::new(),
        }
    }
}
