use std::sync::Arc;
use std::time::Duration;

use crate::auth::TokenVerifier;
use crate::chat::messages::MessageService;
use crate::chat::rooms::RoomManager;
use crate::db::DbPool;
use crate::events::EventBus;
use crate::notify::dispatcher::NotificationDispatcher;
use crate::ws::registry::ConnectionRegistry;

/// Shared application state passed to all handlers via axum State extractor.
/// The registry and services are explicit instances constructed once at
/// process start; nothing in this crate is a module-level singleton.
#[derive(Clone)]
pub struct AppState {
    /// SQLite connection wrapped in Arc<Mutex>
    pub db: DbPool,
    /// Active WebSocket connections per user
    pub registry: Arc<ConnectionRegistry>,
    /// Event-to-notification dispatch (persist + push)
    pub notifier: Arc<NotificationDispatcher>,
    /// Order-scoped chat room manager
    pub rooms: Arc<RoomManager>,
    /// Message store and delivery
    pub chat: Arc<MessageService>,
    /// Fan-in handle for collaborator domain events
    pub events: EventBus,
    /// Token validation seam for the external auth collaborator
    pub verifier: Arc<dyn TokenVerifier>,
    /// How long an unauthenticated socket may wait for its auth frame
    pub auth_grace: Duration,
}
