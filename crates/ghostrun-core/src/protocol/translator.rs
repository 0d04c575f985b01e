//! Translation of decoded protocol lines into normalized events.

use tracing::warn;

use super::parse_line;
use super::tool_summary::{tool_summary, truncate_chars};
use super::types::{ContentEntry, StreamLine, extract_questions};
use crate::event::Event;

/// Tool name the agent uses to ask the human a question.
pub const ASK_USER_QUESTION: &str = "AskUserQuestion";

/// Longest excerpt of an undecodable line written to the log.
const LOGGED_LINE_BUDGET: usize = 200;

/// Decode and translate one stdout line.
///
/// Undecodable lines are logged and yield no events.
pub fn translate_line(line: &str) -> Vec<Event> {
    match parse_line(line) {
        Ok(decoded) => translate(decoded),
        Err(e) => {
            warn!(
                error = %e,
                line = %truncate_chars(line, LOGGED_LINE_BUDGET),
                "Skipping undecodable protocol line"
            );
            Vec::new()
        }
    }
}

/// Translate one decoded line. Events keep the order of the line's content.
pub fn translate(line: StreamLine) -> Vec<Event> {
    match line {
        StreamLine::System(system) => vec![Event::started(&system.session_id, "Session started")],
        StreamLine::Assistant(assistant) => assistant
            .message
            .content
            .into_iter()
            .filter_map(translate_entry)
            .collect(),
        StreamLine::Result(result) => vec![Event::completed(result.into_result())],
        StreamLine::Other => Vec::new(),
    }
}

fn translate_entry(entry: ContentEntry) -> Option<Event> {
    match entry {
        ContentEntry::ToolUse { name, input } => {
            if name == ASK_USER_QUESTION {
                let questions = extract_questions(&input);
                if !questions.is_empty() {
                    return Some(Event::question_raised(&name, input, questions));
                }
            }
            let summary = tool_summary(&name, &input);
            Some(Event::tool_invoked(&name, input, summary))
        }
        ContentEntry::Text { text } if !text.is_empty() => Some(Event::text_chunk(text)),
        ContentEntry::Thinking => Some(Event::thinking()),
        ContentEntry::Text { .. } | ContentEntry::Other => None,
    }
}
