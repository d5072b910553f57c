use crate::db::installations::Installation;
use reqwest::header::USER_AGENT;
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use secrecy::ExposeSecret;
use std::fmt;
use std::time::Duration;

/// Header naming the user an OpenAPI call acts on behalf of.
pub const ACTING_USER_HEADER: &str = "Ones-User-ID";

/// A failed OpenAPI call.
#[derive(Debug)]
pub enum OpenApiError {
    /// The request could not be sent, timed out, or the response could not be read.
    Transport(reqwest::Error),
    /// The platform answered with a non-2xx status.
    Status { status: StatusCode, body: String },
    /// The response body did not have the expected shape.
    Decode(serde_json::Error),
}

impl OpenApiError {
    /// The HTTP status the platform answered with, if any.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            OpenApiError::Status { status, .. } => Some(*status),
            OpenApiError::Transport(e) => e.status(),
            OpenApiError::Decode(_) => None,
        }
    }
}

impl fmt::Display for OpenApiError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            OpenApiError::Transport(e) => write!(f, "request failed: {e}"),
            OpenApiError::Status { status, body } => write!(f, "status {status}: {body}"),
            OpenApiError::Decode(e) => write!(f, "unexpected response body: {e}"),
        }
    }
}

impl std::error::Error for OpenApiError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            OpenApiError::Transport(e) => Some(e),
            OpenApiError::Decode(e) => Some(e),
            OpenApiError::Status { .. } => None,
        }
    }
}

/// Authenticated access to a tenant's ONES OpenAPI.
#[async_trait::async_trait]
pub trait OpenApi: Send + Sync {
    /// Calls `path` (which includes the query string) on the installation's
    /// ONES deployment.
    ///
    /// `acting_user_id` may be empty, in which case the call is made as the
    /// app itself. A 2xx response with an empty body yields `Value::Null`.
    async fn call(
        &self,
        installation: &Installation,
        acting_user_id: &str,
        path: &str,
        method: Method,
        body: Option<&serde_json::Value>,
    ) -> Result<serde_json::Value, OpenApiError>;
}

#[derive(Clone)]
pub struct OnesClient {
    client: Client,
    /// Applied to every request, connection included.
    timeout: Duration,
}

impl OnesClient {
    pub fn new(timeout: Duration) -> Self {
        OnesClient {
            client: Client::new(),
            timeout,
        }
    }

    async fn send_req(&self, req: RequestBuilder) -> Result<serde_json::Value, OpenApiError> {
        tracing::debug!("send_req with {req:?}");
        let resp = req
            .timeout(self.timeout)
            .send()
            .await
            .map_err(OpenApiError::Transport)?;
        let status = resp.status();
        let body = resp.bytes().await.map_err(OpenApiError::Transport)?;
        if !status.is_success() {
            return Err(OpenApiError::Status {
                status,
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(serde_json::Value::Null);
        }
        serde_json::from_slice(&body).map_err(OpenApiError::Decode)
    }
}

#[async_trait::async_trait]
impl OpenApi for OnesClient {
    async fn call(
        &self,
        installation: &Installation,
        acting_user_id: &str,
        path: &str,
        method: Method,
        body: Option<&serde_json::Value>,
    ) -> Result<serde_json::Value, OpenApiError> {
        let url = format!(
            "{}{}",
            installation.ones_base_url.trim_end_matches('/'),
            path
        );
        tracing::trace!("{method} {url:?}");
        let mut req = self
            .client
            .request(method, url)
            .configure(installation, acting_user_id);
        if let Some(body) = body {
            req = req.json(body);
        }
        self.send_req(req).await
    }
}

trait RequestSend: Sized {
    fn configure(self, installation: &Installation, acting_user_id: &str) -> Self;
}

impl RequestSend for RequestBuilder {
    fn configure(self, installation: &Installation, acting_user_id: &str) -> RequestBuilder {
        // `bearer_auth` marks the header as sensitive, keeping it out of debug output.
        let req = self
            .header(USER_AGENT, "ones-auto-watcher")
            .bearer_auth(installation.access_token.expose_secret());
        if acting_user_id.is_empty() {
            req
        } else {
            req.header(ACTING_USER_HEADER, acting_user_id)
        }
    }
}
