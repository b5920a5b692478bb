// SPDX-License-Identifier: MIT

use ojb_transport::truncate;
use serde::Deserialize;
use serde_json::Value;

const USER_PROMPT_BUDGET: usize = 200;
const ASSISTANT_RESPONSE_BUDGET: usize = 300;

/// One line of a session transcript: a chat message with either plain-text content or an
/// array of content blocks (text, tool calls, tool results).
#[derive(Debug, Clone, Deserialize)]
pub struct TranscriptMessage {
    pub role: String,
    pub content: Value,
}

impl TranscriptMessage {
    /// The message's text, or `None` if its content is array-shaped and every block is a
    /// tool-result (not user/assistant speech).
    fn text(&self) -> Option<String> {
        match &self.content {
            Value::String(s) => Some(s.clone()),
            Value::Array(blocks) => {
                let mut text_parts = Vec::new();
                let mut saw_text_block = false;
                for block in blocks {
                    match block.get("type").and_then(Value::as_str) {
                        Some("text") => {
                            saw_text_block = true;
                            if let Some(text) = block.get("text").and_then(Value::as_str) {
                                text_parts.push(text.to_string());
                            }
                        }
                        Some("tool_result") | Some("tool_use") => {}
                        _ => {}
                    }
                }
                if saw_text_block {
                    Some(text_parts.join(""))
                } else {
                    None
                }
            }
            _ => None,
        }
    }
}

/// Result of extracting the last user/assistant exchange from a transcript (§4.7).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedSummary {
    pub last_user_prompt: Option<String>,
    pub last_response: Option<String>,
    pub truncated: bool,
    pub tags_closed: Vec<&'static str>,
    pub message_count: usize,
}

/// Parse a line-delimited transcript and extract the last user/assistant exchange.
///
/// Malformed lines are skipped (a transcript is best-effort observability input, not a spool
/// record subject to §7's reject-in-place rule). `message_count` counts every line scanned,
/// parseable or not.
pub fn extract(transcript: &str) -> ExtractedSummary {
    let messages: Vec<TranscriptMessage> =
        transcript.lines().filter_map(|line| serde_json::from_str(line).ok()).collect();
    let message_count = transcript.lines().count();

    let last_user_prompt = messages
        .iter()
        .rev()
        .find(|m| m.role == "user")
        .and_then(|m| m.text())
        .map(|text| truncate(&text, USER_PROMPT_BUDGET));

    let last_response = messages
        .iter()
        .rev()
        .find(|m| m.role == "assistant")
        .and_then(|m| m.text())
        .map(|text| truncate(&text, ASSISTANT_RESPONSE_BUDGET));

    let mut tags_closed = Vec::new();
    let mut truncated = false;
    for result in [&last_user_prompt, &last_response].into_iter().flatten() {
        truncated |= result.truncated;
        tags_closed.extend(result.tags_closed.iter().copied());
    }

    ExtractedSummary {
        last_user_prompt: last_user_prompt.map(|r| r.text),
        last_response: last_response.map(|r| r.text),
        truncated,
        tags_closed,
        message_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(role: &str, content: Value) -> String {
        serde_json::to_string(&serde_json::json!({"role": role, "content": content})).unwrap()
    }

    #[test]
    fn extracts_last_user_and_assistant_text() {
        let transcript = [
            line("user", Value::String("first question".into())),
            line("assistant", Value::String("first answer".into())),
            line("user", Value::String("second question".into())),
            line("assistant", Value::String("second answer".into())),
        ]
        .join("\n");

        let result = extract(&transcript);
        assert_eq!(result.last_user_prompt.as_deref(), Some("second question"));
        assert_eq!(result.last_response.as_deref(), Some("second answer"));
        assert_eq!(result.message_count, 4);
    }

    #[test]
    fn skips_user_messages_whose_content_is_tool_results_only() {
        let transcript = [
            line("user", Value::String("real question".into())),
            line(
                "user",
                serde_json::json!([{"type": "tool_result", "content": "file contents"}]),
            ),
        ]
        .join("\n");

        let result = extract(&transcript);
        assert_eq!(result.last_user_prompt.as_deref(), Some("real question"));
    }

    #[test]
    fn concatenates_multiple_assistant_text_blocks() {
        let transcript = line(
            "assistant",
            serde_json::json!([
                {"type": "text", "text": "part one. "},
                {"type": "tool_use", "name": "bash"},
                {"type": "text", "text": "part two."}
            ]),
        );

        let result = extract(&transcript);
        assert_eq!(result.last_response.as_deref(), Some("part one. part two."));
    }

    #[test]
    fn truncates_long_prompts_and_reports_tags_closed() {
        let long_prompt = format!("**{}", "a".repeat(250));
        let transcript = line("user", Value::String(long_prompt));

        let result = extract(&transcript);
        assert!(result.truncated);
        assert!(result.last_user_prompt.unwrap().ends_with("**\u{2026}"));
        assert_eq!(result.tags_closed, vec!["**"]);
    }

    #[test]
    fn skips_unparseable_lines_but_counts_them() {
        let transcript = format!("{}\nnot json\n{}", line("user", Value::String("q".into())), "{}");
        let result = extract(&transcript);
        assert_eq!(result.message_count, 3);
        assert_eq!(result.last_user_prompt.as_deref(), Some("q"));
    }

    #[test]
    fn empty_transcript_yields_no_snippets() {
        let result = extract("");
        assert!(result.last_user_prompt.is_none());
        assert!(result.last_response.is_none());
        assert!(!result.truncated);
        assert_eq!(result.message_count, 0);
    }
}
