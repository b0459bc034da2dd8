use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use std::{sync::Arc, time::Duration};

use crate::{
    errors::ApiError,
    models::{AuthResponse, Identity, LoginRequest, RegisterRequest},
};

/// Backend endpoint paths, relative to the configured base URL.
pub mod paths {
    pub const LOGIN: &str = "/api/auth/login";
    pub const REGISTER: &str = "/api/auth/register";
    pub const PROFILE: &str = "/api/auth/profile";
}

/// ApiGateway Trait
///
/// The abstract contract for every backend call the Session Store depends on. Handlers and
/// the store only see this trait, so tests can substitute a scripted gateway and count calls.
///
/// **Send + Sync + async_trait** are required to share the trait object
/// (`Arc<dyn ApiGateway>`) across tokio tasks.
#[async_trait]
pub trait ApiGateway: Send + Sync {
    // Resolves a bearer token to the profile it belongs to.
    async fn profile(&self, token: &str) -> Result<Identity, ApiError>;
    // Exchanges credentials for a token and identity.
    async fn login(&self, request: &LoginRequest) -> Result<AuthResponse, ApiError>;
    // Creates an account; the backend logs the new user in immediately.
    async fn register(&self, request: &RegisterRequest) -> Result<AuthResponse, ApiError>;
}

/// GatewayState
///
/// The concrete type used to share backend access across the application state.
pub type GatewayState = Arc<dyn ApiGateway>;

/// HttpApiGateway
///
/// The concrete implementation of `ApiGateway`, backed by the task-management REST API.
pub struct HttpApiGateway {
    client: Client,
    base_url: String,
}

/// Error body the backend sends alongside 4xx responses.
#[derive(Deserialize)]
struct BackendMessage {
    message: Option<String>,
}

impl HttpApiGateway {
    /// new
    ///
    /// Builds the reqwest client once; it pools connections for the lifetime of the shell.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Transient(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, ApiError> {
        let response = request
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| ApiError::Transient(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        // Pull the backend's message for inline display where it supplied one.
        let message = response
            .json::<BackendMessage>()
            .await
            .ok()
            .and_then(|body| body.message)
            .unwrap_or_else(|| status.to_string());

        tracing::debug!(status = %status, %message, "Backend rejected request");
        Err(classify(status, message))
    }
}

/// classify
///
/// Maps a non-success HTTP status onto the error taxonomy. Only a 401 means the credential
/// itself was rejected; a 403 is reported like any other server-side refusal and never
/// costs the client its token.
pub fn classify(status: StatusCode, message: String) -> ApiError {
    match status {
        StatusCode::UNAUTHORIZED => ApiError::Unauthorized,
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => ApiError::Validation(message),
        StatusCode::CONFLICT => ApiError::Conflict(message),
        _ => ApiError::Transient(message),
    }
}

#[async_trait]
impl ApiGateway for HttpApiGateway {
    async fn profile(&self, token: &str) -> Result<Identity, ApiError> {
        let response = self
            .send(self.client.get(self.url(paths::PROFILE)).bearer_auth(token))
            .await?;
        // A 200 with a body we cannot read is a server fault, not a rejected credential.
        response
            .json::<Identity>()
            .await
            .map_err(|e| ApiError::Transient(format!("malformed profile payload: {}", e)))
    }

    async fn login(&self, request: &LoginRequest) -> Result<AuthResponse, ApiError> {
        let response = self
            .send(self.client.post(self.url(paths::LOGIN)).json(request))
            .await?;
        response
            .json::<AuthResponse>()
            .await
            .map_err(|e| ApiError::Transient(format!("malformed login response: {}", e)))
    }

    async fn register(&self, request: &RegisterRequest) -> Result<AuthResponse, ApiError> {
        let response = self
            .send(self.client.post(self.url(paths::REGISTER)).json(request))
            .await?;
        response
            .json::<AuthResponse>()
            .await
            .map_err(|e| ApiError::Transient(format!("malformed register response: {}", e)))
    }
}
