//! Account endpoints: registration, login, token refresh, logout.

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode, header::SET_COOKIE},
    middleware,
    response::{AppendHeaders, IntoResponse},
    routing::{get, post},
};
use serde::{Deserialize, Deserializer, Serialize};
use std::sync::Arc;
use tracing::info;
use validator::Validate;

use super::error::{ApiError, ApiJson, ResultExt, ValidatedJson, is_unique_violation};
use crate::auth::{
    ACCESS_COOKIE_NAME, Auth, REFRESH_COOKIE_NAME, clear_cookie, refresh_access_token,
    token_cookie,
};
use crate::db::Database;
use crate::impl_has_auth_backend;
use crate::jwt::TokenAuthority;
use crate::password::{hash_password, verify_password};
use crate::rate_limit::{RateLimitConfig, rate_limit_login, rate_limit_register};

const INVALID_CREDENTIALS: &str = "Invalid email or password";

/// Verified against when the email is unknown, so both login failures cost one
/// Argon2 verification. Same parameters as `Argon2::default()`.
const DUMMY_HASH: &str = "$argon2id$v=19$m=19456,t=2,p=1$gR5r918vy4aIgXcT+s0YKA$yPU2LcU/HkC+4XjgYom8eCAA9FD54HGV/sRQbAcBhO0";

#[derive(Clone)]
pub struct UsersState {
    pub db: Database,
    pub tokens: Arc<TokenAuthority>,
    pub secure_cookies: bool,
    pub rate_limit_config: Arc<RateLimitConfig>,
}

impl_has_auth_backend!(UsersState);

pub fn router(state: UsersState) -> Router {
    let login_router = Router::new()
        .route("/login", post(login))
        .with_state(state.clone())
        .layer(middleware::from_fn_with_state(
            state.rate_limit_config.clone(),
            rate_limit_login,
        ));

    let register_router = Router::new()
        .route("/register", post(register))
        .with_state(state.clone())
        .layer(middleware::from_fn_with_state(
            state.rate_limit_config.clone(),
            rate_limit_register,
        ));

    Router::new()
        .route("/refreshToken", post(refresh_token))
        .route("/logout", post(logout))
        .route("/protected", get(protected))
        .with_state(state)
        .merge(login_router)
        .merge(register_router)
}

fn trimmed<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let value = String::deserialize(deserializer)?;
    Ok(value.trim().to_string())
}

fn normalized_email<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let value = String::deserialize(deserializer)?;
    Ok(value.trim().to_lowercase())
}

#[derive(Deserialize, Validate)]
struct RegisterRequest {
    #[serde(deserialize_with = "normalized_email")]
    #[validate(
        length(max = 254, message = "Email is too long"),
        email(message = "Invalid email address")
    )]
    email: String,
    #[validate(length(
        min = 6,
        max = 128,
        message = "Password must be between 6 and 128 characters"
    ))]
    password: String,
    #[serde(deserialize_with = "trimmed")]
    #[validate(length(min = 1, max = 100, message = "Name must be between 1 and 100 characters"))]
    name: String,
}

#[derive(Deserialize)]
struct LoginRequest {
    #[serde(deserialize_with = "normalized_email")]
    email: String,
    password: String,
}

#[derive(Serialize)]
struct UserInfo {
    id: String,
    email: String,
    name: String,
}

#[derive(Serialize)]
struct RegisterResponse {
    message: &'static str,
    user: UserInfo,
}

#[derive(Serialize)]
struct MessageResponse {
    message: &'static str,
}

#[derive(Serialize)]
struct ProtectedResponse {
    message: &'static str,
    account_id: String,
}

async fn register(
    State(state): State<UsersState>,
    ValidatedJson(payload): ValidatedJson<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let RegisterRequest {
        email,
        password,
        name,
    } = payload;

    let existing = state
        .db
        .accounts()
        .get_by_email(&email)
        .await
        .db_err("Failed to look up account")?;
    if existing.is_some() {
        return Err(ApiError::bad_request("User already registered. Please login."));
    }

    // Argon2 is CPU-bound
    let password_hash = tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .internal_err("Password hashing task failed")?
        .internal_err("Failed to hash password")?;

    let uuid = uuid::Uuid::new_v4().to_string();

    // Two concurrent registrations can both pass the lookup above.
    if let Err(e) = state
        .db
        .accounts()
        .create(&uuid, &email, &password_hash, &name)
        .await
    {
        if is_unique_violation(&e) {
            return Err(ApiError::bad_request("User already registered. Please login."));
        }
        return Err(ApiError::db_error("Failed to create account", e));
    }

    info!(account_id = %uuid, "Account registered");

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message: "User registered successfully",
            user: UserInfo {
                id: uuid,
                email,
                name,
            },
        }),
    ))
}

async fn login(
    State(state): State<UsersState>,
    ApiJson(payload): ApiJson<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let account = state
        .db
        .accounts()
        .get_by_email(&payload.email)
        .await
        .db_err("Failed to look up account")?;

    let hash = match &account {
        Some(account) => account.password_hash.clone(),
        None => DUMMY_HASH.to_string(),
    };
    let password = payload.password;
    let matches = tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .internal_err("Password verification task failed")?
        .internal_err("Failed to verify password")?;

    let account = match account {
        Some(account) if matches => account,
        _ => return Err(ApiError::bad_request(INVALID_CREDENTIALS)),
    };

    let access = state
        .tokens
        .issue_access_token(&account.uuid)
        .internal_err("Failed to issue access token")?;
    let refresh = state
        .tokens
        .issue_refresh_token(&account.uuid)
        .internal_err("Failed to issue refresh token")?;

    info!(account_id = %account.uuid, "Login succeeded");

    Ok((
        AppendHeaders([
            (
                SET_COOKIE,
                token_cookie(
                    ACCESS_COOKIE_NAME,
                    &access.token,
                    access.max_age,
                    state.secure_cookies,
                ),
            ),
            (
                SET_COOKIE,
                token_cookie(
                    REFRESH_COOKIE_NAME,
                    &refresh.token,
                    refresh.max_age,
                    state.secure_cookies,
                ),
            ),
        ]),
        Json(MessageResponse {
            message: "Login success",
        }),
    ))
}

async fn refresh_token(
    State(state): State<UsersState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let access = refresh_access_token(&state.tokens, &headers)?;

    Ok((
        AppendHeaders([(
            SET_COOKIE,
            token_cookie(
                ACCESS_COOKIE_NAME,
                &access.token,
                access.max_age,
                state.secure_cookies,
            ),
        )]),
        Json(MessageResponse {
            message: "Access token generated",
        }),
    ))
}

/// Tokens are stateless, so logout only drops the cookies.
async fn logout(State(state): State<UsersState>) -> impl IntoResponse {
    (
        AppendHeaders([
            (
                SET_COOKIE,
                clear_cookie(ACCESS_COOKIE_NAME, state.secure_cookies),
            ),
            (
                SET_COOKIE,
                clear_cookie(REFRESH_COOKIE_NAME, state.secure_cookies),
            ),
        ]),
        Json(MessageResponse {
            message: "Logout successful",
        }),
    )
}

async fn protected(Auth(auth): Auth) -> impl IntoResponse {
    Json(ProtectedResponse {
        message: "testing api for protected route",
        account_id: auth.account_id,
    })
}
