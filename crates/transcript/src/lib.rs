// SPDX-License-Identifier: MIT

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Session-transcript extraction (§4.7 of the design spec).
//!
//! A transcript is a line-delimited sequence of message records. The extractor walks it in
//! reverse to find the last user message whose content is text — array-shaped content whose
//! blocks are tool-results only is not user speech and must be skipped — and the last
//! assistant message's concatenated text blocks. Both are truncated through
//! [`ojb_transport::truncate`], the same markup-aware algorithm the chat-transport
//! adapter uses for outbound messages, so a snippet lifted from a transcript and one built live
//! by the adapter degrade identically.

mod extractor;

pub use extractor::{extract, ExtractedSummary, TranscriptMessage};
