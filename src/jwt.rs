//! Token issuance and verification.
//!
//! Two token kinds share one claim shape and differ in signing key and
//! lifetime:
//! - Access tokens: short-lived (5 minutes by default), authorize API calls
//! - Refresh tokens: long-lived (7 days by default), only mint access tokens
//!
//! Both are stateless. A token is valid until its embedded expiry or until
//! the signing secret changes; nothing is stored server-side.

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, errors::ErrorKind};
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Default access token lifetime: 5 minutes
pub const ACCESS_TOKEN_TTL: Duration = Duration::from_secs(5 * 60);

/// Default refresh token lifetime: 7 days
pub const REFRESH_TOKEN_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Token kind, carried in the `typ` claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::Access => "access",
            TokenKind::Refresh => "refresh",
        }
    }
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Claims embedded in both token kinds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject (account UUID)
    pub sub: String,
    /// Token kind
    #[serde(rename = "typ")]
    pub kind: TokenKind,
    /// Issued at (Unix timestamp)
    pub iat: u64,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
}

/// Secrets and lifetimes for the token authority.
#[derive(Clone)]
pub struct TokenConfig {
    pub access_secret: Vec<u8>,
    pub refresh_secret: Vec<u8>,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
}

impl TokenConfig {
    /// Config with the default lifetimes.
    pub fn new(access_secret: impl Into<Vec<u8>>, refresh_secret: impl Into<Vec<u8>>) -> Self {
        Self {
            access_secret: access_secret.into(),
            refresh_secret: refresh_secret.into(),
            access_ttl: ACCESS_TOKEN_TTL,
            refresh_ttl: REFRESH_TOKEN_TTL,
        }
    }
}

impl std::fmt::Debug for TokenConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenConfig")
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .finish_non_exhaustive()
    }
}

/// A freshly signed token.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    /// The JWT string
    pub token: String,
    /// Expiration timestamp (Unix seconds)
    pub expires_at: u64,
    /// Lifetime in seconds, used as the cookie Max-Age
    pub max_age: u64,
}

struct KeyPair {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: u64,
}

impl KeyPair {
    fn new(secret: &[u8], ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl: ttl.as_secs(),
        }
    }
}

/// Mints and verifies access and refresh tokens.
///
/// The sole source of truth for "is this caller authenticated". Built once
/// at startup and shared read-only between requests.
pub struct TokenAuthority {
    access: KeyPair,
    refresh: KeyPair,
}

impl TokenAuthority {
    pub fn new(config: &TokenConfig) -> Self {
        Self {
            access: KeyPair::new(&config.access_secret, config.access_ttl),
            refresh: KeyPair::new(&config.refresh_secret, config.refresh_ttl),
        }
    }

    fn keys(&self, kind: TokenKind) -> &KeyPair {
        match kind {
            TokenKind::Access => &self.access,
            TokenKind::Refresh => &self.refresh,
        }
    }

    /// Lifetime in seconds of tokens of the given kind.
    pub fn ttl_secs(&self, kind: TokenKind) -> u64 {
        self.keys(kind).ttl
    }

    /// Issue an access token for an account.
    pub fn issue_access_token(&self, account_id: &str) -> Result<IssuedToken, TokenError> {
        self.issue_at(TokenKind::Access, account_id, unix_now()?)
    }

    /// Issue a refresh token for an account.
    pub fn issue_refresh_token(&self, account_id: &str) -> Result<IssuedToken, TokenError> {
        self.issue_at(TokenKind::Refresh, account_id, unix_now()?)
    }

    /// Issue a token as if the current time were `now`.
    pub fn issue_at(
        &self,
        kind: TokenKind,
        account_id: &str,
        now: u64,
    ) -> Result<IssuedToken, TokenError> {
        let keys = self.keys(kind);
        let exp = now + keys.ttl;

        let claims = TokenClaims {
            sub: account_id.to_string(),
            kind,
            iat: now,
            exp,
        };

        let token = jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &keys.encoding)
            .map_err(TokenError::Encoding)?;

        Ok(IssuedToken {
            token,
            expires_at: exp,
            max_age: keys.ttl,
        })
    }

    /// Verify a token of the expected kind against the current time.
    pub fn verify(&self, token: &str, expected: TokenKind) -> Result<TokenClaims, TokenError> {
        self.verify_at(token, expected, unix_now()?)
    }

    /// Verify a token of the expected kind as if the current time were `now`.
    pub fn verify_at(
        &self,
        token: &str,
        expected: TokenKind,
        now: u64,
    ) -> Result<TokenClaims, TokenError> {
        // Expiry is checked below against `now`, not the library's clock.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_exp = false;

        let data = jsonwebtoken::decode::<TokenClaims>(token, &self.keys(expected).decoding, &validation)
            .map_err(|e| match e.kind() {
                ErrorKind::InvalidSignature => TokenError::InvalidSignature,
                _ => TokenError::Malformed(e.to_string()),
            })?;

        let claims = data.claims;
        if claims.kind != expected {
            return Err(TokenError::WrongKind {
                expected,
                found: claims.kind,
            });
        }

        if now > claims.exp {
            return Err(TokenError::Expired);
        }

        Ok(claims)
    }
}

/// Current Unix time in seconds.
pub fn unix_now() -> Result<u64, TokenError> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .map_err(|_| TokenError::Clock)
}

/// Errors that can occur while signing or verifying tokens.
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("failed to encode token: {0}")]
    Encoding(jsonwebtoken::errors::Error),
    #[error("token has expired")]
    Expired,
    #[error("token signature does not match")]
    InvalidSignature,
    #[error("malformed token: {0}")]
    Malformed(String),
    #[error("expected {expected} token, got {found} token")]
    WrongKind { expected: TokenKind, found: TokenKind },
    #[error("system clock is before the Unix epoch")]
    Clock,
}
