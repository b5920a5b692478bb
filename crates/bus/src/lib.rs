// SPDX-License-Identifier: MIT
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

//! `ojb`: the long-lived half of the two-process bus/worker split (§1, §9). Watches the spool
//! directories, renders and posts chat messages, and spawns `ojw` on button press.

pub mod bus;
pub mod callback;
pub mod config;
pub mod dedup;
pub mod error;
pub mod idle;
pub mod menu;
pub mod pidlock;
pub mod router;
pub mod scanners;
pub mod tracking;
pub mod transport_http;

pub use bus::Bus;
pub use callback::CallbackMap;
pub use config::Config;
pub use dedup::DedupStore;
pub use error::{BusError, CallbackError};
pub use pidlock::PidLock;
pub use tracking::{TrackingKey, TrackingStore};
pub use transport_http::TelegramTransport;
