//! Route guard for the page routes.
//!
//! Keeps anonymous visitors out of the app pages and logged-in visitors away
//! from the login and register pages. It only steers navigation: the API
//! checks tokens on every request regardless of what the guard decided.

use axum::{
    extract::{Request, State},
    http::{HeaderMap, header},
    middleware::Next,
    response::{AppendHeaders, IntoResponse, Redirect, Response},
};
use std::sync::Arc;
use tracing::debug;

use crate::auth::{ACCESS_COOKIE_NAME, REFRESH_COOKIE_NAME, clear_cookie, get_cookie};
use crate::jwt::{TokenAuthority, TokenKind};

pub const LOGIN_PATH: &str = "/login";
pub const REGISTER_PATH: &str = "/register";
pub const HOME_PATH: &str = "/";

/// Outcome of evaluating a navigation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    Allow,
    Redirect {
        location: &'static str,
        /// Drop both token cookies along with the redirect
        clear_cookies: bool,
    },
}

impl GuardDecision {
    fn redirect(location: &'static str) -> Self {
        Self::Redirect {
            location,
            clear_cookies: false,
        }
    }
}

fn is_entry_page(path: &str) -> bool {
    path == LOGIN_PATH || path == REGISTER_PATH
}

fn is_exempt(path: &str) -> bool {
    path == "/api" || path.starts_with("/api/") || path == "/favicon.ico"
}

/// Decide what to do with a page navigation.
pub fn evaluate(tokens: &TokenAuthority, path: &str, headers: &HeaderMap) -> GuardDecision {
    if is_exempt(path) {
        return GuardDecision::Allow;
    }

    let entry = is_entry_page(path);
    let access = get_cookie(headers, ACCESS_COOKIE_NAME);

    if let Some(token) = access {
        if tokens.verify(token, TokenKind::Access).is_ok() {
            return if entry {
                GuardDecision::redirect(HOME_PATH)
            } else {
                GuardDecision::Allow
            };
        }
    }

    if let Some(refresh) = get_cookie(headers, REFRESH_COOKIE_NAME) {
        // The page loads and the session client renews on its first API call.
        // Entry pages only bounce home when that renewal can succeed.
        if entry && tokens.verify(refresh, TokenKind::Refresh).is_ok() {
            return GuardDecision::redirect(HOME_PATH);
        }
        return GuardDecision::Allow;
    }

    if entry {
        return GuardDecision::Allow;
    }

    GuardDecision::Redirect {
        location: LOGIN_PATH,
        clear_cookies: access.is_some(),
    }
}

#[derive(Clone)]
pub struct GuardState {
    pub tokens: Arc<TokenAuthority>,
    pub secure_cookies: bool,
}

/// Middleware applying [`evaluate`] to every request it wraps.
pub async fn route_guard(
    State(state): State<GuardState>,
    request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_owned();

    match evaluate(&state.tokens, &path, request.headers()) {
        GuardDecision::Allow => next.run(request).await,
        GuardDecision::Redirect {
            location,
            clear_cookies,
        } => {
            debug!(path = %path, location, clear_cookies, "Guard redirect");
            let redirect = Redirect::temporary(location);
            if clear_cookies {
                (
                    AppendHeaders([
                        (
                            header::SET_COOKIE,
                            clear_cookie(ACCESS_COOKIE_NAME, state.secure_cookies),
                        ),
                        (
                            header::SET_COOKIE,
                            clear_cookie(REFRESH_COOKIE_NAME, state.secure_cookies),
                        ),
                    ]),
                    redirect,
                )
                    .into_response()
            } else {
                redirect.into_response()
            }
        }
    }
}
