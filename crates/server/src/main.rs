mod cookies;
mod error;
mod lichess;
mod routes;
mod storage;

use axum::{Router, extract::FromRef, routing::get};
use std::path::PathBuf;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

use lichess::Lichess;
use storage::Db;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Db,
    pub config: AppConfig,
    pub lichess: Lichess,
}

/// Server configuration loaded from environment variables. Injected through
/// Axum state so tests can substitute fixed secrets.
#[derive(Clone)]
pub struct AppConfig {
    pub base_url: String,
    pub client_id: String,
    pub redirect_uri: String,
    pub session_secret: String,
    pub scope: String,
}

impl FromRef<AppState> for Db {
    fn from_ref(state: &AppState) -> Self {
        state.db.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}

fn env_nonempty(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.is_empty())
}

fn load_config() -> AppConfig {
    let base_url = env_nonempty("BASE_URL").unwrap_or_else(|| "http://localhost:3000".into());

    let client_id = std::env::var("LICHESS_CLIENT_ID").unwrap_or_default();
    if client_id.is_empty() {
        tracing::warn!("LICHESS_CLIENT_ID not set — login will be disabled");
    }

    let session_secret = std::env::var("SESSION_SECRET").unwrap_or_default();
    if session_secret.is_empty() {
        tracing::warn!("SESSION_SECRET not set — login will be disabled");
    }

    let redirect_uri = env_nonempty("OAUTH_REDIRECT_URI")
        .unwrap_or_else(|| format!("{base_url}/oauth/callback"));
    let scope = env_nonempty("LICHESS_SCOPE")
        .unwrap_or_else(|| boardside_auth::lichess::DEFAULT_SCOPE.into());

    AppConfig {
        base_url,
        client_id,
        redirect_uri,
        session_secret,
        scope,
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "boardside_server=info,tower_http=info".into()),
        )
        .init();

    let data_dir = std::env::var("BOARDSIDE_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("data"));
    tracing::info!("data directory: {}", data_dir.display());

    let db = storage::init_db(&data_dir)?;
    tracing::info!("database initialized");

    let config = load_config();
    let state = AppState {
        db,
        config: config.clone(),
        lichess: Lichess::new(),
    };

    let mut app = Router::new()
        .route("/login", get(routes::auth::login))
        .route("/oauth/callback", get(routes::auth::callback))
        .route("/me", get(routes::auth::me))
        .route("/logout", get(routes::auth::logout))
        .route("/lichess-proxy", get(routes::proxy::lichess_proxy))
        .route("/health", get(routes::health::health));

    // Serve the chessboard UI build if present
    let web_dir = std::env::var("BOARDSIDE_WEB_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("web/dist"));
    if web_dir.exists() {
        tracing::info!("serving static files from {}", web_dir.display());
        let index_html = web_dir.join("index.html");
        app = app.fallback_service(ServeDir::new(&web_dir).fallback(ServeFile::new(index_html)));
    }

    let app = app
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state);

    tracing::info!("starting server at {}", config.base_url);

    let port = std::env::var("PORT").unwrap_or_else(|_| "3000".into());
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}")).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
