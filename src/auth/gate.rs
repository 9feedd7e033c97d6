//! Cookie-level authentication: the access-token gate and the refresh exchange.

use axum::http::HeaderMap;
use tracing::{debug, error};

use super::cookie::{ACCESS_COOKIE_NAME, REFRESH_COOKIE_NAME, get_cookie};
use super::errors::AuthError;
use crate::jwt::{IssuedToken, TokenAuthority, TokenKind};

/// Authenticate a request from its access token cookie.
/// Returns the account id embedded in the token.
pub fn authenticate_request(tokens: &TokenAuthority, headers: &HeaderMap) -> Result<String, AuthError> {
    let token = get_cookie(headers, ACCESS_COOKIE_NAME)
        .ok_or(AuthError::Unauthenticated("No token provided"))?;

    tokens
        .verify(token, TokenKind::Access)
        .map(|claims| claims.sub)
        .map_err(|e| {
            debug!(reason = %e, "Access token rejected");
            AuthError::Unauthenticated("Invalid or expired token")
        })
}

/// Exchange the refresh token cookie for a new access token.
///
/// A missing cookie is 401. A refresh token that fails verification is 403,
/// telling the client not to retry but to log in again.
pub fn refresh_access_token(
    tokens: &TokenAuthority,
    headers: &HeaderMap,
) -> Result<IssuedToken, AuthError> {
    let token = get_cookie(headers, REFRESH_COOKIE_NAME)
        .ok_or(AuthError::Unauthenticated("Refresh token missing"))?;

    let claims = tokens.verify(token, TokenKind::Refresh).map_err(|e| {
        debug!(reason = %e, "Refresh token rejected");
        AuthError::Forbidden("Invalid or expired refresh token")
    })?;

    tokens.issue_access_token(&claims.sub).map_err(|e| {
        error!(error = %e, "Failed to issue access token");
        AuthError::Internal
    })
}
