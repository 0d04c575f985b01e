//! Claude Code stream-json protocol.
//!
//! Each stdout line is decoded into a [`StreamLine`] keyed by its `type`
//! field and then translated into zero or more normalized [`Event`]s.
//! Decoding is tolerant: unknown types and unknown fields are ignored, and
//! wrong-typed fields fall back to their defaults.
//!
//! [`Event`]: crate::event::Event

pub mod lenient;
mod tool_summary;
mod translator;
mod types;

pub use tool_summary::{tool_summary, truncate_chars};
pub use translator::{ASK_USER_QUESTION, translate, translate_line};
pub use types::*;

use serde::Deserialize;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::event::CommandResult;

/// Decode a single stdout line.
pub fn parse_line(line: &str) -> Result<StreamLine> {
    serde_json::from_str(line).map_err(|e| Error::Protocol(e.to_string()))
}

/// Decode the single document printed in `json` output mode.
///
/// Accepts either the result object itself or an array of protocol lines, in
/// which case the last `result` entry is used.
pub fn parse_result_document(text: &str) -> Result<CommandResult> {
    let raw: Value =
        serde_json::from_str(text.trim()).map_err(|e| Error::Protocol(e.to_string()))?;

    let document = match &raw {
        Value::Object(_) => &raw,
        Value::Array(items) => items
            .iter()
            .rev()
            .find(|item| item.get("type").and_then(Value::as_str) == Some("result"))
            .ok_or_else(|| Error::Protocol("no result entry in output array".into()))?,
        _ => return Err(Error::Protocol("result document is not an object".into())),
    };

    ResultLine::deserialize(document)
        .map(ResultLine::into_result)
        .map_err(|e| Error::Protocol(e.to_string()))
}
