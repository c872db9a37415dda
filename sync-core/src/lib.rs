//! # sync-core
//!
//! Pure session lifecycle logic for tether (no I/O, instant tests).
//!
//! This crate implements the session state machine and heartbeat health
//! rules without any network or disk I/O, enabling fast unit tests.
//!
//! ## Design Philosophy
//!
//! All modules in this crate are **pure** - they take input and produce output
//! without side effects. The actual I/O (socket, state file, lock marker) is
//! performed by `sync-client`, which interprets the actions produced here.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod health;
pub mod state;

pub use health::{ConnectionQuality, Health, HealthThresholds};
pub use state::{Action, DisconnectReason, Event, LifecycleEvent, SessionState};
