// SPDX-License-Identifier: MIT

use thiserror::Error;

/// Errors surfaced by a chat-transport adapter call.
///
/// `ContentNotModified` is handled specially by the adapter: it is swallowed and reported as
/// success (§4.6, §7), never propagated to a caller.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Transport-signalled backoff with an explicit interval ("retry after N"): the adapter
    /// sleeps exactly that long before retrying (§4.6, §7).
    #[error("rate limited: retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    /// A generic rate-limit status code with no explicit interval: the adapter applies
    /// `2^attempt` backoff bounded by `max_retries` (§4.6, §7). Distinct from [`Self::Other`] so
    /// a permanent failure never gets mistaken for a rate-limit condition and retried.
    #[error("rate limited (generic)")]
    RateLimitedGeneric,

    #[error("rate limit retries exhausted after {attempts} attempts")]
    RetriesExhausted { attempts: u32 },

    #[error("edit left content unchanged")]
    ContentNotModified,

    /// Any other transport failure. Non-rate errors propagate immediately (§4.6, §7): the
    /// adapter never retries or backs off on this variant.
    #[error("transport call failed: {0}")]
    Other(String),
}
