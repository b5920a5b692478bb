// SPDX-License-Identifier: MIT

//! Summary extraction from a completed subprocess invocation (§4.10).
//!
//! Reduces the external assistant's raw stdout/stderr into one human-readable line for the
//! completion message `ojb-bus` renders into the tracked chat message. The same shape of
//! fallback chain the bus itself falls back to in `menu::summary_from_execution` for legacy
//! records that never populated `metadata.summary`.

const SUMMARY_CHAR_BUDGET: usize = 200;

/// `status: success` path: the JSON-`result` line, the `type/subtype` pair, the first
/// non-JSON-looking stdout line, or the literal `"Completed"` (§4.10).
pub fn summarize_success(stdout: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(stdout) {
        if let Some(result) = value.get("result").and_then(|v| v.as_str()) {
            if let Some(line) =
                result.lines().find(|l| !l.trim().is_empty() && !l.trim_start().starts_with('#'))
            {
                return truncate_chars(line, SUMMARY_CHAR_BUDGET);
            }
        }
        if let (Some(t), Some(subtype)) =
            (value.get("type").and_then(|v| v.as_str()), value.get("subtype").and_then(|v| v.as_str()))
        {
            return format!("{t}/{subtype}");
        }
    }
    if let Some(line) = stdout.lines().find(|l| {
        let trimmed = l.trim_start();
        !trimmed.is_empty() && !trimmed.starts_with('{') && !trimmed.starts_with('[')
    }) {
        return line.to_string();
    }
    "Completed".to_string()
}

/// `status: error` / `status: timeout` path: the first line of stderr, falling back to the
/// same stdout-derived summary when stderr is empty (§4.10).
pub fn summarize_failure(stdout: &str, stderr: &str) -> String {
    if let Some(line) = stderr.lines().find(|l| !l.trim().is_empty()) {
        return line.to_string();
    }
    summarize_success(stdout)
}

fn truncate_chars(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}
