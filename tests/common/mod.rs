//! Shared harness: spins up the full service on a random port with a
//! temp-dir SQLite database, and issues JWTs the way the external auth
//! collaborator would.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use jsonwebtoken::{encode, EncodingKey, Header};

use pazar_realtime::auth::{Claims, JwtVerifier};
use pazar_realtime::chat::messages::MessageService;
use pazar_realtime::chat::rooms::RoomManager;
use pazar_realtime::db;
use pazar_realtime::events::{run_event_loop, EventBus};
use pazar_realtime::notify::dispatcher::NotificationDispatcher;
use pazar_realtime::notify::store::NotificationStore;
use pazar_realtime::routes;
use pazar_realtime::state::AppState;
use pazar_realtime::ws::registry::ConnectionRegistry;

pub const TEST_SECRET: [u8; 32] = [42u8; 32];

pub struct TestApp {
    pub base_url: String,
    pub addr: SocketAddr,
    pub state: AppState,
    _tmp: tempfile::TempDir,
}

/// Start the server on 127.0.0.1:0. Auth grace is shortened so timeout
/// tests stay fast.
pub async fn spawn_app() -> TestApp {
    let tmp = tempfile::tempdir().expect("Failed to create temp dir");
    let data_dir = tmp.path().to_str().unwrap().to_string();

    let db = db::init_db(&data_dir).expect("Failed to init DB");

    let registry = Arc::new(ConnectionRegistry::new());
    let notifier = Arc::new(NotificationDispatcher::new(
        NotificationStore::new(db.clone()),
        registry.clone(),
    ));
    let rooms = Arc::new(RoomManager::new(db.clone()));
    let chat = Arc::new(MessageService::new(db.clone(), registry.clone()));

    let (events, events_rx) = EventBus::new();
    tokio::spawn(run_event_loop(events_rx, notifier.clone()));

    let state = AppState {
        db,
        registry,
        notifier,
        rooms,
        chat,
        events,
        verifier: Arc::new(JwtVerifier::new(TEST_SECRET.to_vec())),
        auth_grace: Duration::from_millis(500),
    };

    let app = routes::build_router(state.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestApp {
        base_url: format!("http://{addr}"),
        addr,
        state,
        _tmp: tmp,
    }
}

/// Issue a short-lived HS256 access token for `user_id`, signed with the
/// shared test secret.
pub fn issue_token(user_id: &str) -> String {
    let now = chrono::Utc::now().timestamp();
    let claims = Claims {
        sub: user_id.to_string(),
        iat: now,
        exp: now + 900,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(&TEST_SECRET),
    )
    .unwrap()
}
