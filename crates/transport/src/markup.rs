// SPDX-License-Identifier: MIT

//! Markup escaping and markup-aware truncation for the chat-transport adapter (§4.6, §4.7).
//!
//! The adapter is the *only* place that knows the transport's HTML-subset markup dialect
//! (`<b>`/`<code>`/`<i>`). Every user-derived string (prompts, responses, file names, error
//! lines) must pass through [`escape`] before interpolation into a message, and any string that
//! may be cut short must pass through [`truncate`] so an open emphasis/code run is always closed
//! in the emitted text.

/// The three emphasis/code markers this dialect recognizes, in the fixed closing order used
/// when more than one is left open (§4.6).
const MARKERS: [&str; 3] = ["**", "`", "_"];

/// Escape `&`, `<`, `>` for safe interpolation into the transport's HTML-subset markup.
///
/// Order matters: `&` is replaced first so the entities introduced by the `<`/`>` replacements
/// are not themselves re-escaped.
pub fn escape(input: &str) -> String {
    input.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

/// Result of a markup-aware truncation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Truncated {
    pub text: String,
    pub truncated: bool,
    /// Which markers (in closing order) were left open by the cut and closed by this call.
    /// Empty when `truncated` is false, or when the cut happened to land with every marker
    /// already balanced.
    pub tags_closed: Vec<&'static str>,
}

/// Truncate `input` to at most `max_chars` characters (counted, not bytes), closing any
/// emphasis/code run left open by the cut before appending an ellipsis.
///
/// A string whose length is exactly `max_chars` is returned unchanged: no ellipsis, no tag
/// closing (§8 boundary case).
pub fn truncate(input: &str, max_chars: usize) -> Truncated {
    let char_count = input.chars().count();
    if char_count <= max_chars {
        return Truncated { text: input.to_string(), truncated: false, tags_closed: Vec::new() };
    }

    let prefix: String = input.chars().take(max_chars).collect();
    let mut tags_closed = Vec::new();
    let mut closed = String::new();
    for marker in MARKERS {
        if prefix.matches(marker).count() % 2 == 1 {
            closed.push_str(marker);
            tags_closed.push(marker);
        }
    }

    Truncated { text: format!("{prefix}{closed}\u{2026}"), truncated: true, tags_closed }
}
