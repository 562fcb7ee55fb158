mod app;
mod auth;
mod config;
mod db;
mod error;
mod photos;
mod state;
mod storage;
mod views;

#[cfg(test)]
mod testing;

use crate::config::AppConfig;
use crate::state::AppState;
use tower_sessions_sqlx_store::PostgresStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = AppConfig::from_env()?;
    let (app_state, db) = AppState::init(config).await?;
    db.migrate().await?;

    let cfg = app_state.config.clone();
    let cleanup_cfg = cfg.clone();
    let photo_repo = app_state.photos.clone();
    let storage = app_state.storage.clone();
    tokio::spawn(async move {
        photos::cleanup::run_periodically(
            photo_repo.as_ref(),
            storage.as_ref(),
            cleanup_cfg.cleanup_interval,
            cleanup_cfg.pending_grace,
        )
        .await
    });

    let sessions = PostgresStore::new(db.pool.clone());
    sessions.migrate().await?;
    tokio::spawn(auth::session::sweep_expired(
        sessions.clone(),
        cfg.session.sweep_interval,
    ));

    let router = app::build_app(app_state.clone(), sessions)?;
    app::serve(router, &app_state.config.host, app_state.config.port).await
}

fn init_tracing() {
    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "photobox=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }
}
