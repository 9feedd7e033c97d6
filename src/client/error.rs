use reqwest::StatusCode;

/// Errors returned by [`SessionClient`](super::SessionClient).
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Renewal was refused. The login redirect hook has already run.
    #[error("session expired (renewal answered {0}), log in again")]
    SessionExpired(StatusCode),

    /// Non-2xx answer from the API, with the server's `error` message.
    #[error("API error {status}: {message}")]
    Api { status: StatusCode, message: String },
}

impl ClientError {
    /// HTTP status behind the error, if there was one.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ClientError::SessionExpired(status) | ClientError::Api { status, .. } => Some(*status),
            ClientError::Transport(e) => e.status(),
            ClientError::Url(_) => None,
        }
    }
}
