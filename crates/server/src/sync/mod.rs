//! Real-time sync: shared clipboard state, the broadcast hub, and the
//! per-viewer WebSocket sessions.

pub mod clipboard;
pub mod hub;
pub mod session;

pub use clipboard::{Clipboard, ClipboardEntry};
pub use hub::{SyncHub, ViewerId};
pub use session::run_session;
