//! Human-readable one-line summaries of tool invocations.

use serde_json::Value;

const GREP_PATTERN_BUDGET: usize = 30;
const FETCH_URL_BUDGET: usize = 40;
const BASH_COMMAND_BUDGET: usize = 50;

/// Summarize a tool call from its name and most salient input field.
pub fn tool_summary(name: &str, input: &Value) -> String {
    let field = |key| str_field(input, key);

    match name {
        "Read" => field("file_path").map_or_else(
            || "Reading file...".to_string(),
            |p| format!("Reading: {}", shorten_path(p)),
        ),
        "Write" => field("file_path").map_or_else(
            || "Writing file...".to_string(),
            |p| format!("Writing: {}", shorten_path(p)),
        ),
        "Edit" => field("file_path").map_or_else(
            || "Editing file...".to_string(),
            |p| format!("Editing: {}", shorten_path(p)),
        ),
        "Glob" => field("pattern").map_or_else(
            || "Searching files...".to_string(),
            |p| format!("Searching: {p}"),
        ),
        "Grep" => field("pattern").map_or_else(
            || "Searching content...".to_string(),
            |p| format!("Grep: {}", truncate_chars(p, GREP_PATTERN_BUDGET)),
        ),
        "Bash" => field("command").map_or_else(
            || "Running command...".to_string(),
            |c| format!("Running: {}", truncate_chars(c, BASH_COMMAND_BUDGET)),
        ),
        "TodoWrite" => "Updating task list...".to_string(),
        "Task" => "Running sub-agent...".to_string(),
        "WebFetch" => field("url").map_or_else(
            || "Fetching web content...".to_string(),
            |u| format!("Fetching: {}", truncate_chars(u, FETCH_URL_BUDGET)),
        ),
        other => format!("Using: {other}"),
    }
}

fn str_field<'a>(input: &'a Value, key: &str) -> Option<&'a str> {
    input
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

/// Keep only the last three path components of long paths.
fn shorten_path(path: &str) -> String {
    let parts: Vec<&str> = path.split('/').collect();
    if parts.len() > 3 {
        format!(".../{}", parts[parts.len() - 3..].join("/"))
    } else {
        path.to_string()
    }
}

/// Cut `s` to at most `max` characters, marking the cut with `...`.
pub fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((cut, _)) => format!("{}...", &s[..cut]),
        None => s.to_string(),
    }
}
