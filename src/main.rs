use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;

use pazar_realtime::auth::{self, JwtVerifier};
use pazar_realtime::chat::messages::MessageService;
use pazar_realtime::chat::rooms::RoomManager;
use pazar_realtime::config::{generate_config_template, Config};
use pazar_realtime::db;
use pazar_realtime::events::{self, EventBus};
use pazar_realtime::notify::dispatcher::NotificationDispatcher;
use pazar_realtime::notify::store::NotificationStore;
use pazar_realtime::routes;
use pazar_realtime::state::AppState;
use pazar_realtime::ws::registry::ConnectionRegistry;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load config with layered precedence: defaults < TOML < env < CLI
    let config = Config::load()?;

    // Handle --generate-config: print template and exit
    if config.generate_config {
        print!("{}", generate_config_template());
        return Ok(());
    }

    // Initialize tracing/logging
    if config.json_logs {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "pazar_realtime=info".parse().unwrap()),
            )
            .init();
    } else {
        tracing_subscriber::fmt()
            .pretty()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "pazar_realtime=info".parse().unwrap()),
            )
            .init();
    }

    tracing::info!("pazar-realtime v{} starting", env!("CARGO_PKG_VERSION"));

    // Initialize SQLite database
    let db = db::init_db(&config.data_dir)?;

    // Shared JWT verification key (issuance lives in the auth collaborator)
    let jwt_secret = auth::load_or_generate_secret(&config.data_dir)?;

    // Wire up the core: one registry instance, explicit services around it
    let registry = Arc::new(ConnectionRegistry::new());
    let notifier = Arc::new(NotificationDispatcher::new(
        NotificationStore::new(db.clone()),
        registry.clone(),
    ));
    let rooms = Arc::new(RoomManager::new(db.clone()));
    let chat = Arc::new(MessageService::new(db.clone(), registry.clone()));

    // Event bus: collaborators publish, the loop drains into the dispatcher
    let (events, events_rx) = EventBus::new();
    tokio::spawn(events::run_event_loop(events_rx, notifier.clone()));

    let state = AppState {
        db,
        registry,
        notifier,
        rooms,
        chat,
        events,
        verifier: Arc::new(JwtVerifier::new(jwt_secret)),
        auth_grace: Duration::from_secs(config.auth_grace_secs),
    };

    let app = routes::build_router(state);

    let addr = format!("{}:{}", config.bind_address, config.port);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Listening on {}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}
