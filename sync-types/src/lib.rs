//! # sync-types
//!
//! Wire format and session record types for the tether sync session coordinator.
//!
//! This crate provides the foundational types used across all tether crates:
//! - [`Frame`], [`MessageType`] - Newline-delimited JSON frames exchanged with the server
//! - [`AuthRequest`], [`ConnectRequest`], [`ConnectAck`], [`ErrorPayload`] - Typed payloads
//! - [`ConnectionDescriptor`], [`SyncState`] - The durable record of the active session
//! - [`SessionId`], [`DeviceType`] - Identity types
//! - [`SyncError`] - Error types

#![warn(missing_docs)]
#![warn(clippy::all)]

mod descriptor;
mod error;
mod frame;
mod ids;
mod messages;

pub use descriptor::{ConnectionDescriptor, SyncState};
pub use error::SyncError;
pub use frame::{Frame, MessageType};
pub use ids::{DeviceType, SessionId};
pub use messages::{AuthRequest, ConnectAck, ConnectRequest, ErrorPayload};
