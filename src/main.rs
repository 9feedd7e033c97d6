use std::net::SocketAddr;

use clap::Parser;
use tasklist::cli::{
    Args, build_config, init_logging, load_secrets, open_database, validate_cors_origin,
};
use tasklist::create_app;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    // A missing .env file is fine
    dotenvy::dotenv().ok();

    let args = Args::parse();

    init_logging(&args.log_format);

    let Some((access_secret, refresh_secret)) = load_secrets(&args) else {
        std::process::exit(1);
    };

    let Some(cors_origin) = validate_cors_origin(&args.cors_origin) else {
        std::process::exit(1);
    };

    let Some(db) = open_database(&args.database).await else {
        std::process::exit(1);
    };

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| {
            error!(address = %addr, error = %e, "Failed to bind");
            std::process::exit(1);
        });

    let local_addr = listener.local_addr().unwrap_or_else(|e| {
        error!(error = %e, "Failed to read local address");
        std::process::exit(1);
    });

    let config = build_config(&args, db, access_secret, refresh_secret, cors_origin);
    let app = create_app(&config);

    info!(
        address = %local_addr,
        secure_cookies = config.secure_cookies,
        cors_origin = config.cors_origin.as_deref().unwrap_or("disabled"),
        "Listening"
    );

    let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
    if let Err(e) = axum::serve(listener, make_service).await {
        error!(error = %e, "Server error");
        std::process::exit(1);
    }
}
