// SPDX-License-Identifier: MIT

//! Root integration suite: drives the `ojb`/`ojw` crates against the testable properties and
//! end-to-end scenarios (§8). Each file under `tests/specs/` covers one area; `prelude` holds the
//! fixtures and harness shared across them.


#[path = "specs/bus_lifecycle.rs"]
mod bus_lifecycle;
#[path = "specs/worker_execution.rs"]
mod worker_execution;
#[path = "specs/spool_invariants.rs"]
mod spool_invariants;
