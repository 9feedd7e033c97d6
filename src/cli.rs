//! CLI argument parsing, validation, and startup helpers.

use crate::ServerConfig;
use crate::db::Database;
use crate::jwt::TokenConfig;
use crate::rate_limit::RateLimitSettings;
use clap::Parser;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use url::Url;

const MIN_SECRET_LENGTH: usize = 32;

pub const ACCESS_SECRET_ENV: &str = "ACCESS_TOKEN_SECRET";
pub const REFRESH_SECRET_ENV: &str = "REFRESH_TOKEN_SECRET";

#[derive(clap::ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "tasklist",
    about = "Multi-user task list with cookie-based access and refresh tokens"
)]
pub struct Args {
    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value = "8000")]
    pub port: u16,

    /// Path to SQLite database file (":memory:" for a throwaway database)
    #[arg(short, long, env = "DATABASE_PATH", default_value = "tasklist.db")]
    pub database: String,

    /// Access token lifetime in seconds
    #[arg(long, default_value = "300", value_parser = clap::value_parser!(u64).range(1..))]
    pub access_ttl_secs: u64,

    /// Refresh token lifetime in seconds
    #[arg(long, default_value = "604800", value_parser = clap::value_parser!(u64).range(1..))]
    pub refresh_ttl_secs: u64,

    /// Set the Secure flag on token cookies (enable behind HTTPS)
    #[arg(long, env = "SECURE_COOKIES")]
    pub secure_cookies: bool,

    /// Origin allowed to call the API with credentials. Empty disables CORS
    #[arg(long, env = "CORS_ORIGIN", default_value = "http://localhost:3000")]
    pub cors_origin: String,

    /// Login attempts per minute per client IP
    #[arg(long, default_value = "10")]
    pub login_rate_limit: u32,

    /// Registrations per minute per client IP
    #[arg(long, default_value = "5")]
    pub register_rate_limit: u32,

    /// Path to file containing the access token secret. Prefer ACCESS_TOKEN_SECRET
    #[arg(long)]
    pub access_secret_file: Option<String>,

    /// Path to file containing the refresh token secret. Prefer REFRESH_TOKEN_SECRET
    #[arg(long)]
    pub refresh_secret_file: Option<String>,

    /// Log output format
    #[arg(short, long, default_value = "pretty")]
    pub log_format: LogFormat,
}

/// Initialize logging based on the specified format. Filter from RUST_LOG, default info.
pub fn init_logging(format: &LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match format {
        LogFormat::Pretty => tracing_subscriber::fmt().with_env_filter(filter).init(),
        LogFormat::Json => tracing_subscriber::fmt().json().with_env_filter(filter).init(),
        LogFormat::Compact => tracing_subscriber::fmt()
            .compact()
            .with_env_filter(filter)
            .init(),
    }
}

/// Load a signing secret from an environment variable or a file.
/// Returns None and logs an error if the secret cannot be loaded.
pub fn load_secret(env_var: &str, secret_file: Option<&str>) -> Option<String> {
    let secret = if let Ok(secret) = std::env::var(env_var) {
        // SAFETY: called during startup before any other task reads the
        // environment, and nothing else reads this variable.
        unsafe { std::env::remove_var(env_var) };
        secret
    } else if let Some(path) = secret_file {
        match std::fs::read_to_string(path) {
            Ok(content) => content.trim().to_string(),
            Err(e) => {
                error!(path = %path, error = %e, "Failed to read secret file");
                return None;
            }
        }
    } else {
        error!(
            env = env_var,
            "Signing secret is required. Set the environment variable (recommended) or pass a secret file"
        );
        return None;
    };

    if secret.len() < MIN_SECRET_LENGTH {
        error!(
            env = env_var,
            "Secret is shorter than {} characters. Use a longer secret", MIN_SECRET_LENGTH
        );
        return None;
    }

    Some(secret)
}

/// Load both signing secrets.
pub fn load_secrets(args: &Args) -> Option<(String, String)> {
    let access = load_secret(ACCESS_SECRET_ENV, args.access_secret_file.as_deref())?;
    let refresh = load_secret(REFRESH_SECRET_ENV, args.refresh_secret_file.as_deref())?;

    if access == refresh {
        warn!("Access and refresh secrets are identical; use distinct secrets");
    }

    Some((access, refresh))
}

/// Normalize the CORS origin. Empty means disabled.
/// Returns None and logs an error if the origin is not a valid URL.
pub fn validate_cors_origin(origin: &str) -> Option<Option<String>> {
    let origin = origin.trim();
    if origin.is_empty() {
        return Some(None);
    }

    match Url::parse(origin) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => {
            Some(Some(url.origin().ascii_serialization()))
        }
        Ok(_) => {
            error!(origin = %origin, "CORS origin must be an http or https URL");
            None
        }
        Err(e) => {
            error!(origin = %origin, error = %e, "Invalid CORS origin");
            None
        }
    }
}

/// Build ServerConfig from validated arguments.
pub fn build_config(
    args: &Args,
    db: Database,
    access_secret: String,
    refresh_secret: String,
    cors_origin: Option<String>,
) -> ServerConfig {
    let mut tokens = TokenConfig::new(access_secret, refresh_secret);
    tokens.access_ttl = Duration::from_secs(args.access_ttl_secs);
    tokens.refresh_ttl = Duration::from_secs(args.refresh_ttl_secs);

    ServerConfig {
        db,
        tokens,
        secure_cookies: args.secure_cookies,
        cors_origin,
        rate_limits: RateLimitSettings {
            login_per_minute: args.login_rate_limit,
            register_per_minute: args.register_rate_limit,
        },
    }
}

/// Open the database, logging errors if it fails.
pub async fn open_database(path: &str) -> Option<Database> {
    match Database::open(path).await {
        Ok(db) => {
            info!(path = %path, "Database opened");
            Some(db)
        }
        Err(e) => {
            error!(path = %path, error = %e, "Failed to open database");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = Args::parse_from(["tasklist"]);
        assert_eq!(args.access_ttl_secs, 300);
        assert_eq!(args.refresh_ttl_secs, 604800);
        assert_eq!(args.login_rate_limit, 10);
        assert_eq!(args.register_rate_limit, 5);
    }

    #[test]
    fn test_zero_ttl_rejected() {
        assert!(Args::try_parse_from(["tasklist", "--access-ttl-secs", "0"]).is_err());
    }

    #[test]
    fn test_cors_origin() {
        assert_eq!(validate_cors_origin(""), Some(None));
        assert_eq!(
            validate_cors_origin("http://localhost:3000/"),
            Some(Some("http://localhost:3000".to_string()))
        );
        assert_eq!(validate_cors_origin("ftp://example.com"), None);
        assert_eq!(validate_cors_origin("nope"), None);
    }

    #[test]
    fn test_secret_from_file() {
        let path = std::env::temp_dir().join(format!("tasklist-secret-{}", std::process::id()));
        std::fs::write(&path, format!("{}\n", "s".repeat(40))).unwrap();

        let secret = load_secret("TASKLIST_TEST_UNSET_SECRET", path.to_str()).unwrap();
        assert_eq!(secret.len(), 40);

        std::fs::write(&path, "short").unwrap();
        assert!(load_secret("TASKLIST_TEST_UNSET_SECRET", path.to_str()).is_none());

        std::fs::remove_file(&path).ok();
    }
}
