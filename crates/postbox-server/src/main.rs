mod config;

use std::sync::Arc;

use clap::Parser;
use tower_http::timeout::TimeoutLayer;
use tracing::{info, warn};

use postbox_api::auth::hash_password;
use postbox_api::{AppState, AppStateInner, build_router};
use postbox_db::{Database, StoreError};

use crate::config::Config;

const DEMO_USERS: &[(&str, &str)] = &[("username1", "password1"), ("username2", "password2")];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "postbox=debug,postbox_api=debug,postbox_db=info,tower_http=debug".into()
            }),
        )
        .init();

    let config = Config::parse();

    let db = Database::open(&config.db_path)?;
    if config.seed_demo_users {
        seed_demo_users(&db)?;
    }

    let state: AppState = Arc::new(AppStateInner::new(db));

    let app = build_router(state).layer(TimeoutLayer::new(config.request_timeout()));

    let addr = config.listen_addr()?;
    info!("Postbox listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Existing demo users are left alone.
fn seed_demo_users(db: &Database) -> anyhow::Result<()> {
    for (username, password) in DEMO_USERS {
        let hash = hash_password(password)?;
        match db.create_user(username, &hash) {
            Ok(id) => info!(user_id = id, "Seeded demo user {}", username),
            Err(StoreError::Duplicate) => warn!("Demo user {} already exists", username),
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm =
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(s) => s,
                Err(e) => {
                    warn!("Failed to install SIGTERM handler: {}", e);
                    ctrl_c.await.ok();
                    return;
                }
            };
        tokio::select! {
            _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
