//! Session Store.
//!
//! Owns the single session of a running shell: the phase machine, the resolved identity
//! and every write to the persisted token slot. Other components get a cheap
//! [`SessionHandle`] and either read snapshots or [`SessionStore::subscribe`] to transitions.
//!
//! ```text
//! Initializing ──resolve──▶ Resolving ──profile ok──────────▶ Ready
//!      │                       │ ──unauthorized (erase)──▶ Unauthenticated
//!      └──no token────────────▶│ ──transient (keep token)─▶ Unauthenticated
//! Ready / Unauthenticated ──login──▶ Ready,  ──logout──▶ Unauthenticated
//! ```
//!
//! Every transition bumps a generation counter. A profile fetch remembers the generation
//! it started under and its result is dropped if the session has moved on since.

use chrono::{DateTime, Utc};
use reqwest::Url;
use std::sync::Arc;
use tokio::sync::{Mutex, watch};

use crate::{
    auth,
    config::{AppConfig, RetryPolicy},
    errors::{ApiError, SessionError},
    gateway::GatewayState,
    models::{Identity, LoginRequest, PhaseKind, RegisterRequest, Role, SessionView},
    storage::{ROLE_KEY, TOKEN_KEY, TokenStoreState},
};

/// Phase
///
/// Lifecycle state of the session. The identity lives inside `Ready`, so "identity is
/// present iff the phase is Ready" holds by construction.
#[derive(Debug, Clone, PartialEq)]
pub enum Phase {
    Initializing,
    Resolving,
    Ready(Identity),
    Unauthenticated,
}

impl Phase {
    pub fn kind(&self) -> PhaseKind {
        match self {
            Phase::Initializing => PhaseKind::Initializing,
            Phase::Resolving => PhaseKind::Resolving,
            Phase::Ready(_) => PhaseKind::Ready,
            Phase::Unauthenticated => PhaseKind::Unauthenticated,
        }
    }

    pub fn identity(&self) -> Option<&Identity> {
        match self {
            Phase::Ready(identity) => Some(identity),
            _ => None,
        }
    }

    /// True once resolution has produced an answer, either way.
    pub fn is_settled(&self) -> bool {
        matches!(self, Phase::Ready(_) | Phase::Unauthenticated)
    }
}

/// Session
///
/// An immutable snapshot of the session as published on the watch channel.
#[derive(Debug, Clone)]
pub struct Session {
    pub phase: Phase,
    pub generation: u64,
    // Last non-fatal error, kept for diagnostics only.
    pub last_error: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    fn initial() -> Self {
        Self {
            phase: Phase::Initializing,
            generation: 0,
            last_error: None,
            updated_at: Utc::now(),
        }
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.phase.identity()
    }

    pub fn role(&self) -> Option<Role> {
        self.identity().map(|identity| identity.role)
    }

    pub fn view(&self) -> SessionView {
        SessionView {
            phase: self.phase.kind(),
            identity: self.identity().cloned(),
            generation: self.generation,
            last_error: self.last_error.clone(),
            updated_at: self.updated_at,
        }
    }
}

/// SessionStore
///
/// Mediates every transition between token and identity. Construct one per process and
/// share it as a [`SessionHandle`].
pub struct SessionStore {
    state: watch::Sender<Session>,
    gateway: GatewayState,
    tokens: TokenStoreState,
    asset_origin: String,
    retry: RetryPolicy,
    // Serializes writes to the token slot together with the transition they belong to.
    writer: Mutex<()>,
}

/// SessionHandle
///
/// The shared handle passed to the route guard middleware, handlers and the navigation
/// listener.
pub type SessionHandle = Arc<SessionStore>;

impl SessionStore {
    pub fn new(
        gateway: GatewayState,
        tokens: TokenStoreState,
        asset_origin: impl Into<String>,
        retry: RetryPolicy,
    ) -> Self {
        let (state, _) = watch::channel(Session::initial());
        Self {
            state,
            gateway,
            tokens,
            asset_origin: asset_origin.into(),
            retry,
            writer: Mutex::new(()),
        }
    }

    pub fn from_config(gateway: GatewayState, tokens: TokenStoreState, config: &AppConfig) -> Self {
        Self::new(gateway, tokens, config.asset_origin.clone(), config.profile_retry)
    }

    pub fn snapshot(&self) -> Session {
        self.state.borrow().clone()
    }

    /// Receiver that observes every published transition.
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.state.subscribe()
    }

    /// The persisted bearer token, for consumers issuing their own backend calls.
    pub async fn bearer_token(&self) -> Result<Option<String>, SessionError> {
        Ok(self.tokens.get(TOKEN_KEY).await?)
    }

    /// resolve
    ///
    /// Resolves the persisted token into an identity. Runs once at startup and again on
    /// an explicit refresh. While a resolution is already in flight this returns the
    /// current snapshot without issuing a second fetch.
    ///
    /// `Unauthorized` is absorbed (the session ends up Unauthenticated and the slot is
    /// erased). A transient failure is retried per the configured policy; once retries are
    /// exhausted the session settles in Unauthenticated with the token kept and the error
    /// is returned.
    pub async fn resolve(&self) -> Result<Session, SessionError> {
        let (generation, token) = {
            let _writer = self.writer.lock().await;
            if matches!(self.state.borrow().phase, Phase::Resolving) {
                tracing::debug!("Profile resolution already in flight");
                return Ok(self.snapshot());
            }

            let token = match self.tokens.get(TOKEN_KEY).await {
                Ok(token) => token,
                Err(e) => {
                    tracing::warn!(error = %e, "Token store unreadable, treating session as signed out");
                    self.transition(Phase::Unauthenticated, Some(e.to_string()));
                    return Err(e.into());
                }
            };

            let Some(token) = token else {
                // Nothing to resolve: no network call.
                self.transition(Phase::Unauthenticated, None);
                return Ok(self.snapshot());
            };

            if auth::token_expired(&token, Utc::now()) == Some(true) {
                tracing::info!("Persisted token has expired");
                self.transition(Phase::Unauthenticated, None);
                self.erase_credentials().await?;
                return Ok(self.snapshot());
            }

            (self.transition(Phase::Resolving, None), token)
        };

        let mut attempt = 0;
        loop {
            let result = self.gateway.profile(&token).await;
            if !self.is_current(generation) {
                tracing::debug!(generation, "Discarding stale profile result");
                return Ok(self.snapshot());
            }

            match result {
                Ok(identity) => {
                    let identity = self.absolutize(identity);
                    self.settle(generation, Phase::Ready(identity), None);
                    return Ok(self.snapshot());
                }
                Err(ApiError::Unauthorized) => {
                    self.reject(generation).await?;
                    return Ok(self.snapshot());
                }
                Err(e) if e.is_transient() && attempt < self.retry.retries => {
                    let delay = self.retry.delay_for(attempt);
                    attempt += 1;
                    tracing::warn!(error = %e, attempt, delay_ms = delay.as_millis() as u64, "Profile fetch failed, retrying");
                    tokio::time::sleep(delay).await;
                    if !self.is_current(generation) {
                        return Ok(self.snapshot());
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, code = e.code(), "Profile fetch failed, keeping token");
                    self.settle(generation, Phase::Unauthenticated, Some(e.to_string()));
                    return Err(e.into());
                }
            }
        }
    }

    /// login
    ///
    /// Installs a session returned by an authentication exchange: persists the token and
    /// the advisory role, then moves to Ready. Always replaces whatever session existed and
    /// pre-empts an in-flight resolution.
    pub async fn login(&self, token: &str, identity: Identity) -> Result<Session, SessionError> {
        let identity = self.absolutize(identity);
        let _writer = self.writer.lock().await;

        self.tokens.set(TOKEN_KEY, token).await?;
        if let Err(e) = self.tokens.set(ROLE_KEY, identity.role.as_str()).await {
            tracing::warn!(error = %e, "Could not persist role hint");
        }

        self.transition(Phase::Ready(identity), None);
        Ok(self.snapshot())
    }

    /// logout
    ///
    /// Clears the in-memory session first, then erases the slot. Idempotent. A storage
    /// failure is reported but the session stays signed out.
    pub async fn logout(&self) -> Result<Session, SessionError> {
        let _writer = self.writer.lock().await;
        self.transition(Phase::Unauthenticated, None);
        self.erase_credentials().await?;
        Ok(self.snapshot())
    }

    /// update_identity
    ///
    /// Replaces the identity after a profile-affecting action and forces Ready, even over
    /// an in-flight resolution (last writer wins).
    ///
    /// Only a session that holds a token can be updated: with an empty slot, or once the
    /// session is Unauthenticated, this fails with `Unauthorized` and changes nothing.
    pub async fn update_identity(&self, identity: Identity) -> Result<Session, SessionError> {
        let identity = self.absolutize(identity);
        let _writer = self.writer.lock().await;

        if matches!(self.state.borrow().phase, Phase::Unauthenticated) {
            tracing::warn!("Identity update refused, session is signed out");
            return Err(ApiError::Unauthorized.into());
        }
        if self.tokens.get(TOKEN_KEY).await?.is_none() {
            tracing::warn!("Identity update refused, no persisted token");
            return Err(ApiError::Unauthorized.into());
        }

        if let Err(e) = self.tokens.set(ROLE_KEY, identity.role.as_str()).await {
            tracing::warn!(error = %e, "Could not persist role hint");
        }
        self.transition(Phase::Ready(identity), None);
        Ok(self.snapshot())
    }

    /// sign_in
    ///
    /// Validates the credentials, exchanges them with the backend and installs the
    /// resulting session. Any failure leaves the current session untouched.
    pub async fn sign_in(&self, request: &LoginRequest) -> Result<Session, SessionError> {
        let request = auth::validate_login(request)?;
        let response = self.gateway.login(&request).await?;
        tracing::info!(role = response.identity.role.as_str(), "Signed in");
        self.login(&response.token, response.identity).await
    }

    /// sign_up
    ///
    /// Registers a new account and signs straight into it.
    pub async fn sign_up(&self, request: &RegisterRequest) -> Result<Session, SessionError> {
        let request = auth::validate_registration(request)?;
        let response = self.gateway.register(&request).await?;
        tracing::info!(role = response.identity.role.as_str(), "Registered");
        self.login(&response.token, response.identity).await
    }

    // --- Internal transitions ---

    /// Publishes a new phase under a fresh generation and returns that generation.
    fn transition(&self, phase: Phase, last_error: Option<String>) -> u64 {
        let kind = phase.kind();
        let mut generation = 0;
        self.state.send_modify(|session| {
            session.generation += 1;
            session.phase = phase;
            session.last_error = last_error;
            session.updated_at = Utc::now();
            generation = session.generation;
        });
        tracing::info!(phase = ?kind, generation, "Session transition");
        generation
    }

    /// Completes the resolution started under `generation`, unless it has gone stale.
    fn settle(&self, generation: u64, phase: Phase, last_error: Option<String>) -> bool {
        let kind = phase.kind();
        let applied = self.state.send_if_modified(|session| {
            if session.generation != generation || !matches!(session.phase, Phase::Resolving) {
                return false;
            }
            session.phase = phase;
            session.last_error = last_error;
            session.updated_at = Utc::now();
            true
        });
        if applied {
            tracing::info!(phase = ?kind, generation, "Session resolved");
        } else {
            tracing::debug!(generation, "Resolution superseded before it settled");
        }
        applied
    }

    fn is_current(&self, generation: u64) -> bool {
        let session = self.state.borrow();
        session.generation == generation && matches!(session.phase, Phase::Resolving)
    }

    /// The backend rejected the token: sign out and erase the slot.
    async fn reject(&self, generation: u64) -> Result<(), SessionError> {
        let _writer = self.writer.lock().await;
        // A login may have replaced the token while we waited for the lock.
        if !self.settle(generation, Phase::Unauthenticated, None) {
            return Ok(());
        }
        tracing::info!("Credential rejected by backend, erasing token");
        self.erase_credentials().await
    }

    /// Removes both keys, attempting each even if the first fails. Caller holds `writer`.
    async fn erase_credentials(&self) -> Result<(), SessionError> {
        let token = self.tokens.remove(TOKEN_KEY).await;
        let role = self.tokens.remove(ROLE_KEY).await;
        token.and(role).map_err(|e| {
            tracing::error!(error = %e, "Failed to erase persisted credentials");
            e.into()
        })
    }

    fn absolutize(&self, mut identity: Identity) -> Identity {
        if let Some(reference) = identity.profile_image_url.take() {
            identity.profile_image_url = Some(absolute_image_url(&reference, &self.asset_origin));
        }
        identity
    }
}

/// absolute_image_url
///
/// Rewrites a relative image reference against `origin`. References that already start
/// with a scheme (and empty strings) are returned unchanged.
pub fn absolute_image_url(reference: &str, origin: &str) -> String {
    if reference.is_empty() || Url::parse(reference).is_ok() {
        return reference.to_string();
    }
    let origin = origin.trim_end_matches('/');
    if reference.starts_with('/') {
        format!("{}{}", origin, reference)
    } else {
        format!("{}/{}", origin, reference)
    }
}
