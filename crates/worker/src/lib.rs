// SPDX-License-Identifier: MIT
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

//! `ojw`: the short-lived half of the two-process bus/worker split (§1, §6, §4.10). Invoked
//! once per selection or approval file, runs every requested workflow to completion, then exits.

pub mod config;
pub mod error;
pub mod marker;
pub mod runner;
pub mod summary;
pub mod subprocess;

pub use config::Config;
pub use error::WorkerError;
pub use runner::run_selection;
