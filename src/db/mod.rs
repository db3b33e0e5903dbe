pub mod migrations;
pub mod models;

use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::CoreError;

/// Type alias for the shared database connection.
/// rusqlite is synchronous — we wrap in Arc<Mutex> for thread safety
/// with tokio::task::spawn_blocking for DB operations. The single mutex
/// also linearizes same-entity operations (sequence assignment, unread
/// counting) without any further locking.
pub type DbPool = Arc<Mutex<Connection>>;

/// Initialize the SQLite database: create data directory if needed,
/// open (or create) the database file, enable WAL mode, and run migrations.
pub fn init_db(data_dir: &str) -> Result<DbPool, Box<dyn std::error::Error>> {
    std::fs::create_dir_all(data_dir)?;

    let db_path = Path::new(data_dir).join("pazar.db");
    let mut conn = Connection::open(&db_path)?;

    // WAL for concurrent readers, foreign keys on
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;

    let migrations = migrations::migrations();
    migrations.to_latest(&mut conn)?;

    tracing::info!("Database initialized at {}", db_path.display());

    Ok(Arc::new(Mutex::new(conn)))
}

/// Lock the shared connection, mapping a poisoned mutex to the retryable
/// `StoreUnavailable` variant.
pub fn acquire(db: &DbPool) -> Result<MutexGuard<'_, Connection>, CoreError> {
    db.lock()
        .map_err(|_| CoreError::StoreUnavailable("database mutex poisoned".into()))
}
