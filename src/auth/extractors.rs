//! Axum extractors for authentication.

use axum::{extract::FromRequestParts, http::request::Parts};

use super::errors::AuthError;
use super::gate::authenticate_request;
use super::state::HasAuthBackend;
use super::types::AuthenticatedAccount;
use crate::db::Account;

/// Extractor for API endpoints that require a valid access token.
/// Stateless: the token alone proves the caller's identity.
pub struct Auth(pub AuthenticatedAccount);

impl<S> FromRequestParts<S> for Auth
where
    S: HasAuthBackend + Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        authenticate_request(state.tokens(), &parts.headers)
            .map(|account_id| Auth(AuthenticatedAccount { account_id }))
    }
}

/// Extractor for endpoints that need the caller's account row.
/// Same as `Auth`, then resolves the account; a token for an account that no
/// longer exists is treated as unauthenticated.
pub struct AccountAuth(pub Account);

impl<S> FromRequestParts<S> for AccountAuth
where
    S: HasAuthBackend + Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Auth(auth) = Auth::from_request_parts(parts, state).await?;

        let account = state
            .db()
            .accounts()
            .get_by_uuid(&auth.account_id)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to get account");
                AuthError::Internal
            })?
            .ok_or(AuthError::Unauthenticated("Account not found"))?;

        Ok(AccountAuth(account))
    }
}
