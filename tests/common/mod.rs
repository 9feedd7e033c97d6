#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    http::{Request, Response, header},
};
use serde_json::Value;
use tasklist::{
    ServerConfig, create_app,
    db::Database,
    jwt::{TokenAuthority, TokenConfig},
    rate_limit::RateLimitSettings,
};
use tower::ServiceExt;

pub const ACCESS_SECRET: &str = "test-access-secret-0123456789abcdef";
pub const REFRESH_SECRET: &str = "test-refresh-secret-0123456789abcdef";

pub const PASSWORD: &str = "hunter22";

/// Limits high enough that ordinary tests never hit them.
pub fn relaxed_limits() -> RateLimitSettings {
    RateLimitSettings {
        login_per_minute: 1000,
        register_per_minute: 1000,
    }
}

pub fn token_config() -> TokenConfig {
    TokenConfig::new(ACCESS_SECRET, REFRESH_SECRET)
}

/// Same secrets as the app, for minting tokens in tests.
pub fn authority() -> TokenAuthority {
    TokenAuthority::new(&token_config())
}

pub struct TestApp {
    pub app: Router,
    pub db: Database,
    pub tokens: TokenAuthority,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_limits(relaxed_limits()).await
    }

    pub async fn with_limits(rate_limits: RateLimitSettings) -> Self {
        let db = Database::open(":memory:")
            .await
            .expect("Failed to open test database");
        let mut config = ServerConfig::new(db.clone(), token_config());
        config.rate_limits = rate_limits;
        Self {
            app: create_app(&config),
            db,
            tokens: authority(),
        }
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.app.clone().oneshot(request).await.unwrap()
    }

    /// Register an account through the API. Panics unless it answers 201.
    pub async fn register(&self, email: &str, name: &str) -> Value {
        let response = self
            .send(json_request(
                "POST",
                "/api/users/register",
                serde_json::json!({ "email": email, "password": PASSWORD, "name": name }),
                None,
            ))
            .await;
        assert_eq!(response.status(), 201, "registration of {} failed", email);
        body_json(response).await
    }

    /// Register and log in. Returns a Cookie header with both tokens.
    pub async fn login_new_account(&self, email: &str) -> String {
        self.register(email, "Test User").await;

        let response = self
            .send(json_request(
                "POST",
                "/api/users/login",
                serde_json::json!({ "email": email, "password": PASSWORD }),
                None,
            ))
            .await;
        assert_eq!(response.status(), 200);

        let cookies = set_cookies(&response);
        let access = cookie_value(&cookies, "accessToken").expect("no access cookie");
        let refresh = cookie_value(&cookies, "refreshToken").expect("no refresh cookie");
        format!("accessToken={}; refreshToken={}", access, refresh)
    }

    /// Account UUID for an email, as embedded in its tokens.
    pub async fn account_uuid(&self, email: &str) -> String {
        self.db
            .accounts()
            .get_by_email(email)
            .await
            .unwrap()
            .expect("account not found")
            .uuid
    }
}

pub fn json_request(method: &str, uri: &str, body: Value, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub fn empty_request(method: &str, uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

pub fn set_cookies(response: &Response<Body>) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .map(str::to_string)
        .collect()
}

/// Value of a cookie among Set-Cookie headers.
pub fn cookie_value(set_cookies: &[String], name: &str) -> Option<String> {
    set_cookies.iter().find_map(|c| {
        let (pair, _) = c.split_once(';').unwrap_or((c.as_str(), ""));
        let (key, value) = pair.split_once('=')?;
        (key == name).then(|| value.to_string())
    })
}

/// Set-Cookie header for a cookie, if any.
pub fn find_set_cookie<'a>(set_cookies: &'a [String], name: &str) -> Option<&'a str> {
    set_cookies
        .iter()
        .find(|c| c.starts_with(&format!("{}=", name)))
        .map(String::as_str)
}
