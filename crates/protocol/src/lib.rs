//! # Lanshare Protocol Library
//!
//! This crate defines the wire format spoken between the lanshare server and
//! its real-time viewers (browser tabs connected over WebSocket).
//!
//! ## Overview
//!
//! The protocol is intentionally small: viewers mutate the shared clipboard
//! or request a remote command, the server fans state-change notifications
//! back out to every connected viewer. All packets are JSON text frames.
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │   Packet (viewer -> server)             │  newEntry / delEntry /
//! │                                         │  clearClipboard / command
//! ├─────────────────────────────────────────┤
//! │   SendPacket (server -> viewer)         │  refreshClipboard / updateCLI
//! ├─────────────────────────────────────────┤
//! │   Transport (WebSocket text frames)     │
//! └─────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`messages`]: Packet definitions and JSON codecs
//! - [`error`]: Error types

pub mod error;
pub mod messages;

pub use error::{ProtocolError, Result};
pub use messages::{Packet, SendPacket};
