//! Static HTML shells for the page routes. The guard decides who sees them.

use axum::{
    Router,
    http::header,
    middleware,
    response::{IntoResponse, Response},
    routing::get,
};

use crate::guard::{GuardState, HOME_PATH, LOGIN_PATH, REGISTER_PATH, route_guard};

const NO_CACHE: &str = "no-cache";

const APP_HTML: &str = r#"<!doctype html>
<html lang="en">
<head><meta charset="utf-8"><title>Tasks</title></head>
<body><main id="app" data-api="/api"></main></body>
</html>
"#;

const LOGIN_HTML: &str = r#"<!doctype html>
<html lang="en">
<head><meta charset="utf-8"><title>Log in</title></head>
<body><main id="login" data-api="/api/users/login"></main></body>
</html>
"#;

const REGISTER_HTML: &str = r#"<!doctype html>
<html lang="en">
<head><meta charset="utf-8"><title>Register</title></head>
<body><main id="register" data-api="/api/users/register"></main></body>
</html>
"#;

fn html_response(body: &'static str) -> Response {
    (
        [
            (header::CONTENT_TYPE, "text/html; charset=utf-8"),
            (header::CACHE_CONTROL, NO_CACHE),
        ],
        body,
    )
        .into_response()
}

async fn app_page() -> Response {
    html_response(APP_HTML)
}

async fn login_page() -> Response {
    html_response(LOGIN_HTML)
}

async fn register_page() -> Response {
    html_response(REGISTER_HTML)
}

/// Page routes wrapped in the route guard.
pub fn router(guard: GuardState) -> Router {
    Router::new()
        .route(HOME_PATH, get(app_page))
        .route(LOGIN_PATH, get(login_page))
        .route(REGISTER_PATH, get(register_page))
        .layer(middleware::from_fn_with_state(guard, route_guard))
}
