pub mod api;
pub mod auth;
pub mod cli;
pub mod client;
pub mod db;
pub mod guard;
pub mod jwt;
pub mod pages;
pub mod password;
pub mod rate_limit;

use api::create_api_router;
use axum::{
    Router,
    http::{HeaderValue, Method, header},
};
use db::Database;
use guard::GuardState;
use jwt::{TokenAuthority, TokenConfig};
use rate_limit::RateLimitSettings;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::warn;

pub struct ServerConfig {
    /// Database connection (cloneable, uses connection pool internally)
    pub db: Database,
    /// Signing secrets and token lifetimes
    pub tokens: TokenConfig,
    /// Whether to set Secure flag on cookies (should be true in production with HTTPS)
    pub secure_cookies: bool,
    /// Origin allowed to make credentialed cross-origin API calls
    pub cors_origin: Option<String>,
    pub rate_limits: RateLimitSettings,
}

impl ServerConfig {
    /// Config with default lifetimes and rate limits, no CORS and plain cookies.
    pub fn new(db: Database, tokens: TokenConfig) -> Self {
        Self {
            db,
            tokens,
            secure_cookies: false,
            cors_origin: None,
            rate_limits: RateLimitSettings::default(),
        }
    }
}

fn cors_layer(origin: &str) -> Option<CorsLayer> {
    let origin = match HeaderValue::from_str(origin) {
        Ok(origin) => origin,
        Err(e) => {
            warn!(origin = %origin, error = %e, "Ignoring unusable CORS origin");
            return None;
        }
    };

    Some(
        CorsLayer::new()
            .allow_origin(origin)
            .allow_credentials(true)
            .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
            .allow_headers([header::CONTENT_TYPE]),
    )
}

/// Create the application router with the given configuration.
pub fn create_app(config: &ServerConfig) -> Router {
    let tokens = Arc::new(TokenAuthority::new(&config.tokens));

    let api_router = create_api_router(
        config.db.clone(),
        tokens.clone(),
        config.secure_cookies,
        &config.rate_limits,
    );

    let page_routes = pages::router(GuardState {
        tokens,
        secure_cookies: config.secure_cookies,
    });

    let app = Router::new()
        .nest("/api", api_router)
        .merge(page_routes)
        .layer(TraceLayer::new_for_http());

    match config.cors_origin.as_deref().and_then(cors_layer) {
        Some(cors) => app.layer(cors),
        None => app,
    }
}

/// Run the server on the given listener. This function blocks until the server exits.
pub async fn run_server(config: ServerConfig, listener: TcpListener) -> Result<(), std::io::Error> {
    let app = create_app(&config);
    let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, make_service).await
}

/// Start the server on the given port in a background task. Use port 0 to let the OS choose a random port.
/// Returns the actual address the server is listening on.
/// Note: For production use, prefer `run_server` directly in main.
pub async fn start_server(
    config: ServerConfig,
    port: u16,
) -> Result<(tokio::task::JoinHandle<()>, SocketAddr), std::io::Error> {
    let listener = TcpListener::bind(("127.0.0.1", port)).await?;
    let local_addr = listener.local_addr()?;

    let handle = tokio::spawn(async move {
        if let Err(e) = run_server(config, listener).await {
            tracing::error!(error = %e, "Server error");
        }
    });

    Ok((handle, local_addr))
}
