//! Line shapes of the stream-json protocol.

use serde::Deserialize;
use serde_json::Value;

use super::lenient;
use super::translator::ASK_USER_QUESTION;
use crate::event::{CommandResult, Question};

/// One decoded stdout line, keyed by its `type` field.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamLine {
    System(SystemLine),
    Assistant(AssistantLine),
    Result(ResultLine),
    /// `user` tool results, `stream_event` content-block framing and any
    /// type added later.
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct SystemLine {
    #[serde(default, deserialize_with = "lenient::value")]
    pub session_id: String,
    #[serde(default, deserialize_with = "lenient::value")]
    pub subtype: String,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct AssistantLine {
    #[serde(default, deserialize_with = "lenient::value")]
    pub message: AssistantBody,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct AssistantBody {
    /// Entries that fail to decode are dropped individually.
    #[serde(default, deserialize_with = "lenient::seq")]
    pub content: Vec<ContentEntry>,
}

/// One entry of an assistant message's `content` array.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentEntry {
    Text {
        #[serde(default, deserialize_with = "lenient::value")]
        text: String,
    },
    ToolUse {
        #[serde(default, deserialize_with = "lenient::value")]
        name: String,
        #[serde(default)]
        input: Value,
    },
    /// The thinking text itself is not relayed.
    Thinking,
    #[serde(other)]
    Other,
}

/// Final `result` line, also the document printed in `json` output mode.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct ResultLine {
    #[serde(default, deserialize_with = "lenient::value")]
    pub session_id: String,
    #[serde(default, deserialize_with = "lenient::value")]
    pub result: ResultPayload,
    #[serde(default, deserialize_with = "lenient::value")]
    pub cost_usd: Option<f64>,
    #[serde(default, deserialize_with = "lenient::value")]
    pub total_cost_usd: Option<f64>,
    #[serde(default, deserialize_with = "lenient::seq")]
    pub permission_denials: Vec<PermissionDenial>,
}

/// The `result` field is either the final text or a nested object.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(untagged)]
pub enum ResultPayload {
    Text(String),
    Detail(ResultDetail),
    #[default]
    Missing,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct ResultDetail {
    #[serde(default, deserialize_with = "lenient::value")]
    pub result: String,
    #[serde(default, deserialize_with = "lenient::value")]
    pub session_id: String,
    #[serde(default, deserialize_with = "lenient::value")]
    pub cost_usd: Option<f64>,
    #[serde(default, deserialize_with = "lenient::value")]
    pub total_cost_usd: Option<f64>,
    #[serde(default, deserialize_with = "lenient::seq")]
    pub permission_denials: Vec<PermissionDenial>,
}

/// A tool call the agent's own permission layer refused.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct PermissionDenial {
    #[serde(default, deserialize_with = "lenient::value")]
    pub tool_name: String,
    #[serde(default)]
    pub tool_input: Value,
}

#[derive(Default, Deserialize)]
struct QuestionsInput {
    #[serde(default, deserialize_with = "lenient::seq")]
    questions: Vec<Question>,
}

/// Questions carried by an `AskUserQuestion` tool input. Anything that is
/// not an object with a `questions` array yields none.
pub fn extract_questions(input: &Value) -> Vec<Question> {
    QuestionsInput::deserialize(input)
        .map(|parsed| parsed.questions)
        .unwrap_or_default()
}

impl ResultLine {
    /// Flatten into a [`CommandResult`].
    ///
    /// Top-level fields win over the nested `result` object; `cost_usd` is
    /// preferred over `total_cost_usd`. A denied `AskUserQuestion` call with
    /// parseable questions turns the result into a pause.
    pub fn into_result(self) -> CommandResult {
        let mut denials = self.permission_denials;
        let (output, nested_session, nested_cost, nested_total) = match self.result {
            ResultPayload::Text(text) => (text, String::new(), None, None),
            ResultPayload::Detail(detail) => {
                denials.extend(detail.permission_denials);
                (
                    detail.result,
                    detail.session_id,
                    detail.cost_usd,
                    detail.total_cost_usd,
                )
            }
            ResultPayload::Missing => (String::new(), String::new(), None, None),
        };

        let session_id = if self.session_id.is_empty() {
            nested_session
        } else {
            self.session_id
        };
        let cost = self
            .cost_usd
            .or(nested_cost)
            .or(self.total_cost_usd)
            .or(nested_total)
            .unwrap_or(0.0);

        let mut result = CommandResult::finished(session_id, output, cost);
        if let Some(questions) = denials
            .iter()
            .rev()
            .filter(|d| d.tool_name == ASK_USER_QUESTION)
            .map(|d| extract_questions(&d.tool_input))
            .find(|qs| !qs.is_empty())
        {
            result.pause_on(questions);
        }
        result
    }
}
