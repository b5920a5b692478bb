// SPDX-License-Identifier: MIT

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Atomic JSON spool directories (§4.1 of the design spec).
//!
//! Every record directory in this system is an unordered queue: producers write with
//! write-temp-in-same-dir-then-rename, consumers list, read, act, then unlink. Consumers must
//! tolerate a file disappearing between list and read (a race with another consumer or the TTL
//! sweeper) — that is "already consumed," not an error.

mod atomic;
mod error;
mod record;
mod sweep;
pub mod types;

pub use atomic::write_json_atomic;
pub use error::SpoolError;
pub use record::{consume_record, list_spool_files, read_record, remove_consumed, SpoolRecord};
pub use sweep::{file_age, sweep_ttl};
pub use types::{
    AntiFeedbackMarker, CallbackAction, CallbackToken, ExecutionStatus, GitStatus, LycheeStatus,
    ProgressSnapshot, ProgressStatus, SessionSummary, Stage, TrackingRecord, WorkflowExecution,
    WorkflowSelection,
};
