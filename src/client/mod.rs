//! Session client for the task-list API.
//!
//! Keeps the token cookies in a jar and sends them with every request. When
//! the API answers 401 the client renews the access token through the refresh
//! endpoint and resubmits the original request once. If renewal is refused,
//! the login redirect hook runs and the caller gets
//! [`ClientError::SessionExpired`].

mod error;
mod models;

use reqwest::{Method, Request, RequestBuilder, Response, StatusCode, cookie::Jar};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::{debug, warn};
use url::Url;

pub use error::ClientError;
pub use models::{
    LoginRequest, MessageResponse, Pagination, ProtectedResponse, RegisterRequest,
    RegisterResponse, RegisteredUser, Task, TaskListResponse, TaskQuery, TaskResponse, TaskUpdate,
};

use models::{CreateTask, ErrorBody};

/// Renewal endpoint, relative to the API root.
pub const REFRESH_PATH: &str = "users/refreshToken";

/// Called once renewal has failed and the user has to log in again.
pub trait LoginRedirect: Send + Sync {
    fn redirect_to_login(&self);
}

/// Default hook: there is no browser to navigate, so just log.
pub struct LogRedirect;

impl LoginRedirect for LogRedirect {
    fn redirect_to_login(&self) {
        warn!(location = crate::guard::LOGIN_PATH, "Session expired, login required");
    }
}

#[derive(Clone)]
pub struct SessionClient {
    http: reqwest::Client,
    jar: Arc<Jar>,
    base_url: Url,
    on_expired: Arc<dyn LoginRedirect>,
}

impl SessionClient {
    /// Create a client for the API rooted at `base_url` (e.g. `http://localhost:8000/api`).
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        let mut base_url = Url::parse(base_url)?;
        // Url::join replaces the last segment unless the path ends in '/'
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let jar = Arc::new(Jar::default());
        let http = reqwest::Client::builder()
            .cookie_provider(jar.clone())
            .build()?;

        Ok(Self {
            http,
            jar,
            base_url,
            on_expired: Arc::new(LogRedirect),
        })
    }

    /// Replace the hook run when the session cannot be renewed.
    pub fn with_login_redirect(mut self, hook: Arc<dyn LoginRedirect>) -> Self {
        self.on_expired = hook;
        self
    }

    /// The cookie jar holding the session tokens.
    pub fn cookie_jar(&self) -> &Arc<Jar> {
        &self.jar
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Resolve a path relative to the API root.
    pub fn url(&self, path: &str) -> Result<Url, ClientError> {
        Ok(self.base_url.join(path.trim_start_matches('/'))?)
    }

    /// Start building a request against the API. Send it with [`send`](Self::send).
    pub fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, ClientError> {
        Ok(self.http.request(method, self.url(path)?))
    }

    /// Execute a request, renewing the session and retrying once on 401.
    ///
    /// The retry's answer is returned whatever it is, including another 401.
    /// A 401 from the renewal endpoint itself, or for a request whose body
    /// cannot be cloned, is returned unchanged.
    pub async fn send(&self, request: Request) -> Result<Response, ClientError> {
        let is_renewal = request.url().path() == self.url(REFRESH_PATH)?.path();
        let retry = request.try_clone();

        let response = self.http.execute(request).await?;
        if response.status() != StatusCode::UNAUTHORIZED || is_renewal {
            return Ok(response);
        }

        let Some(retry) = retry else {
            debug!(url = %response.url(), "Got 401 for a request that cannot be replayed");
            return Ok(response);
        };

        debug!(url = %retry.url(), "Access token rejected, renewing session");
        self.renew().await?;

        Ok(self.http.execute(retry).await?)
    }

    /// Ask the server for a new access token. On failure the login hook runs.
    async fn renew(&self) -> Result<(), ClientError> {
        let url = self.url(REFRESH_PATH)?;

        match self.http.post(url).send().await {
            Ok(response) if response.status().is_success() => {
                debug!("Session renewed");
                Ok(())
            }
            Ok(response) => {
                let status = response.status();
                warn!(status = %status, "Session renewal refused");
                self.on_expired.redirect_to_login();
                Err(ClientError::SessionExpired(status))
            }
            Err(e) => {
                warn!(error = %e, "Session renewal failed");
                self.on_expired.redirect_to_login();
                Err(ClientError::Transport(e))
            }
        }
    }

    async fn call<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, ClientError> {
        let response = self.send(builder.build()?).await?;
        decode(response).await
    }

    pub async fn register(&self, body: &RegisterRequest) -> Result<RegisterResponse, ClientError> {
        self.call(self.request(Method::POST, "users/register")?.json(body))
            .await
    }

    /// Log in. On success the jar holds both token cookies.
    pub async fn login(&self, email: &str, password: &str) -> Result<MessageResponse, ClientError> {
        let body = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        };
        self.call(self.request(Method::POST, "users/login")?.json(&body))
            .await
    }

    pub async fn logout(&self) -> Result<MessageResponse, ClientError> {
        self.call(self.request(Method::POST, "users/logout")?).await
    }

    pub async fn protected(&self) -> Result<ProtectedResponse, ClientError> {
        self.call(self.request(Method::GET, "users/protected")?)
            .await
    }

    pub async fn create_task(&self, title: &str) -> Result<TaskResponse, ClientError> {
        self.call(
            self.request(Method::POST, "tasks")?
                .json(&CreateTask { title }),
        )
        .await
    }

    pub async fn list_tasks(&self, query: &TaskQuery) -> Result<TaskListResponse, ClientError> {
        self.call(self.request(Method::GET, "tasks")?.query(query))
            .await
    }

    pub async fn get_task(&self, id: i64) -> Result<TaskResponse, ClientError> {
        self.call(self.request(Method::GET, &format!("tasks/{}", id))?)
            .await
    }

    pub async fn update_task(&self, id: i64, update: &TaskUpdate) -> Result<TaskResponse, ClientError> {
        self.call(
            self.request(Method::PUT, &format!("tasks/{}", id))?
                .json(update),
        )
        .await
    }

    pub async fn toggle_task(&self, id: i64) -> Result<TaskResponse, ClientError> {
        self.call(self.request(Method::PUT, &format!("tasks/{}/toggle", id))?)
            .await
    }

    pub async fn delete_task(&self, id: i64) -> Result<MessageResponse, ClientError> {
        self.call(self.request(Method::DELETE, &format!("tasks/{}", id))?)
            .await
    }
}

/// Decode a 2xx body, or turn the `error` field of anything else into `ClientError::Api`.
async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json::<T>().await?);
    }

    let message = match response.json::<ErrorBody>().await {
        Ok(body) => body.error,
        Err(_) => status.canonical_reason().unwrap_or("Unknown error").to_string(),
    };
    Err(ClientError::Api { status, message })
}
