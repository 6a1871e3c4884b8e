use std::sync::Arc;

use postbox_db::Database;

use crate::error::ApiError;

/// Tokens live this long after login. Use does not extend them.
pub const TOKEN_TTL_HOURS: i64 = 24;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub token_ttl: chrono::Duration,
}

impl AppStateInner {
    pub fn new(db: Database) -> Self {
        Self {
            db,
            token_ttl: chrono::Duration::hours(TOKEN_TTL_HOURS),
        }
    }
}

/// Run blocking work (SQLite, password hashing) off the async runtime.
pub(crate) async fn blocking<F, T>(op: &'static str, f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ApiError::internal(op, e))
}

/// Run a store call on the blocking pool. The outer error is a task
/// failure; the inner one is left for the caller to classify.
pub(crate) async fn with_db<F, T>(
    state: &AppState,
    op: &'static str,
    f: F,
) -> Result<postbox_db::Result<T>, ApiError>
where
    F: FnOnce(&Database) -> postbox_db::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    blocking(op, move || f(&state.db)).await
}
