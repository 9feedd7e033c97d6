//! Cookie-borne token authentication.
//!
//! Dual-token system: short-lived access tokens authorize API calls and
//! long-lived refresh tokens mint new access tokens through the refresh
//! endpoint. Both are stateless. An expired access token is answered 401 and
//! renewal is left to the client; a bad refresh token is answered 403.

mod cookie;
mod errors;
mod extractors;
mod gate;
mod state;
mod types;

pub use cookie::{ACCESS_COOKIE_NAME, REFRESH_COOKIE_NAME, clear_cookie, get_cookie, token_cookie};
pub use errors::AuthError;
pub use extractors::{AccountAuth, Auth};
pub use gate::{authenticate_request, refresh_access_token};
pub use state::HasAuthBackend;
pub use types::AuthenticatedAccount;
