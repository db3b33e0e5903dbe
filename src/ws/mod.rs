pub mod actor;
pub mod handler;
pub mod protocol;
pub mod registry;

use tokio::sync::mpsc;

/// Sender half of a WebSocket connection's channel. Any part of the system
/// can push frames to a specific client through a clone of this.
pub type ConnectionSender = mpsc::UnboundedSender<axum::extract::ws::Message>;
