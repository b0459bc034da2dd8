#![allow(dead_code)]

use async_trait::async_trait;
use std::{
    collections::VecDeque,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};
use taskboard_shell::{
    config::RetryPolicy,
    errors::ApiError,
    gateway::ApiGateway,
    models::{AuthResponse, Identity, LoginRequest, RegisterRequest, Role},
    session::SessionStore,
    storage::MemoryTokenStore,
};
use tokio::sync::Notify;

pub const ORIGIN: &str = "https://api.example.com";

// --- Mock Gateway ---

/// Scripted backend. Profile results are served in order; once the script runs out every
/// call fails transiently. When a gate is installed, each profile call waits for a permit
/// before answering so a test can interleave other operations.
#[derive(Default)]
pub struct MockGateway {
    profile_script: Mutex<VecDeque<Result<Identity, ApiError>>>,
    auth_result: Mutex<Option<Result<AuthResponse, ApiError>>>,
    gate: Option<Arc<Notify>>,
    profile_calls: AtomicUsize,
    auth_calls: AtomicUsize,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_profile(results: Vec<Result<Identity, ApiError>>) -> Self {
        Self {
            profile_script: Mutex::new(results.into()),
            ..Self::default()
        }
    }

    pub fn with_auth(result: Result<AuthResponse, ApiError>) -> Self {
        Self {
            auth_result: Mutex::new(Some(result)),
            ..Self::default()
        }
    }

    pub fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn profile_calls(&self) -> usize {
        self.profile_calls.load(Ordering::SeqCst)
    }

    pub fn auth_calls(&self) -> usize {
        self.auth_calls.load(Ordering::SeqCst)
    }

    fn next_auth(&self) -> Result<AuthResponse, ApiError> {
        self.auth_calls.fetch_add(1, Ordering::SeqCst);
        self.auth_result
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| Err(ApiError::Transient("no scripted auth response".into())))
    }
}

#[async_trait]
impl ApiGateway for MockGateway {
    async fn profile(&self, _token: &str) -> Result<Identity, ApiError> {
        self.profile_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        self.profile_script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ApiError::Transient("no scripted profile response".into())))
    }

    async fn login(&self, _request: &LoginRequest) -> Result<AuthResponse, ApiError> {
        self.next_auth()
    }

    async fn register(&self, _request: &RegisterRequest) -> Result<AuthResponse, ApiError> {
        self.next_auth()
    }
}

// --- Builders ---

pub fn identity(role: Role) -> Identity {
    Identity {
        id: format!("id-{}", role.as_str()),
        name: "Ada Lovelace".into(),
        email: "ada@example.com".into(),
        role,
        profile_image_url: None,
    }
}

pub fn auth_response(token: &str, role: Role) -> AuthResponse {
    AuthResponse {
        token: token.into(),
        identity: identity(role),
    }
}

/// A store wired to `gateway` and `tokens`, with no retries.
pub fn store(gateway: Arc<MockGateway>, tokens: MemoryTokenStore) -> Arc<SessionStore> {
    store_with_retry(gateway, tokens, RetryPolicy::none())
}

pub fn store_with_retry(
    gateway: Arc<MockGateway>,
    tokens: MemoryTokenStore,
    retry: RetryPolicy,
) -> Arc<SessionStore> {
    Arc::new(SessionStore::new(gateway, Arc::new(tokens), ORIGIN, retry))
}
