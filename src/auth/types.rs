//! Authentication user types.

/// Caller authenticated by a valid access token. No database lookup.
#[derive(Debug, Clone)]
pub struct AuthenticatedAccount {
    /// Account UUID from the token subject
    pub account_id: String,
}
