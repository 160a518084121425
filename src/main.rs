use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod db;
mod error;
mod handlers;
mod keygen;
mod models;
mod shortener;

// ── Shared application state ───────────────────────────────────────────────

pub struct AppState {
    pub db: sqlx::SqlitePool,
    pub config: config::AppConfig,
}

// ── Entry point ────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env (ignore error if file is absent — env vars may already be set)
    dotenvy::dotenv().ok();

    // Initialise structured logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "url_shortener=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration from environment
    let config = config::AppConfig::from_env()?;
    tracing::info!("Loading settings for: {}", config.env_name);
    tracing::info!("Base URL: {}", config.base_url);

    let db = db::connect(&config.database_url).await?;
    tracing::info!("{} shortened URL(s) on record", db::count_urls(&db).await?);

    let bind_addr = format!("{}:{}", config.host, config.port);
    let state = Arc::new(AppState { db, config });

    // ── Serve ──────────────────────────────────────────────────────────────
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, router(state)).await?;

    Ok(())
}

// ── Router ─────────────────────────────────────────────────────────────────

fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(handlers::urls::index))
        // Liveness probe — returns 200 OK with an empty body
        .route("/health", get(|| async { axum::http::StatusCode::OK }))
        .route("/url", post(handlers::urls::create_url))
        .route(
            "/admin/:secret_key",
            get(handlers::admin::info).delete(handlers::admin::delete),
        )
        // Public key redirect — single segment, so /admin/* never reaches it
        .route("/:key", get(handlers::redirect::redirect))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
