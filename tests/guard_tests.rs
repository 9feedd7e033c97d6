//! Route guard over the page routes, driven through the full router.

mod common;

use axum::http::{StatusCode, header};
use common::{TestApp, empty_request, find_set_cookie, set_cookies};
use tasklist::jwt::{TokenKind, unix_now};

fn location(response: &axum::http::Response<axum::body::Body>) -> &str {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
}

#[tokio::test]
async fn test_anonymous_visitor() {
    let app = TestApp::new().await;

    let response = app.send(empty_request("GET", "/", None)).await;
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location(&response), "/login");
    assert!(set_cookies(&response).is_empty());

    for page in ["/login", "/register"] {
        let response = app.send(empty_request("GET", page, None)).await;
        assert_eq!(response.status(), StatusCode::OK);
        let content_type = response.headers().get(header::CONTENT_TYPE).unwrap();
        assert!(content_type.to_str().unwrap().starts_with("text/html"));
    }
}

#[tokio::test]
async fn test_logged_in_visitor() {
    let app = TestApp::new().await;
    let cookies = app.login_new_account("alice@example.com").await;

    let response = app.send(empty_request("GET", "/", Some(&cookies))).await;
    assert_eq!(response.status(), StatusCode::OK);

    for page in ["/login", "/register"] {
        let response = app.send(empty_request("GET", page, Some(&cookies))).await;
        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(location(&response), "/");
    }
}

#[tokio::test]
async fn test_expired_access_with_live_refresh() {
    let app = TestApp::new().await;
    let past = unix_now().unwrap() - 3600;
    let access = app.tokens.issue_at(TokenKind::Access, "uuid-1", past).unwrap();
    let refresh = app.tokens.issue_refresh_token("uuid-1").unwrap();
    let cookies = format!("accessToken={}; refreshToken={}", access.token, refresh.token);

    // The page loads; the client renews on its first API call
    let response = app.send(empty_request("GET", "/", Some(&cookies))).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.send(empty_request("GET", "/login", Some(&cookies))).await;
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location(&response), "/");
}

#[tokio::test]
async fn test_dead_refresh_does_not_loop() {
    let app = TestApp::new().await;
    let past = unix_now().unwrap() - 30 * 24 * 3600;
    let refresh = app
        .tokens
        .issue_at(TokenKind::Refresh, "uuid-1", past)
        .unwrap();
    let cookies = format!("refreshToken={}", refresh.token);

    let response = app.send(empty_request("GET", "/login", Some(&cookies))).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_invalid_access_without_refresh_clears_cookies() {
    let app = TestApp::new().await;

    let response = app
        .send(empty_request("GET", "/", Some("accessToken=tampered")))
        .await;
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location(&response), "/login");

    let set = set_cookies(&response);
    for name in ["accessToken", "refreshToken"] {
        let cookie = find_set_cookie(&set, name).unwrap();
        assert!(cookie.contains("Max-Age=0"));
    }
}

#[tokio::test]
async fn test_api_is_not_redirected() {
    let app = TestApp::new().await;

    // The API answers for itself
    let response = app
        .send(empty_request("GET", "/api/users/protected", None))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(response.headers().get(header::LOCATION).is_none());
}
