use std::{env, path::PathBuf, time::Duration};

/// AppConfig
///
/// Holds the shell's entire configuration state. Loaded once at startup and then shared
/// read-only with the Session Store, the API Gateway and the HTTP layer via FromRef.
#[derive(Clone, Debug)]
pub struct AppConfig {
    // Base URL of the task-management REST backend (e.g. https://tasks.example.com).
    pub api_base_url: String,
    // Origin prepended to relative profile image references.
    pub asset_origin: String,
    // Location of the durable token slot (JSON file holding `token` and `role`).
    pub token_store_path: PathBuf,
    // Address the shell's HTTP surface binds to.
    pub bind_addr: String,
    // Per-request timeout for backend calls.
    pub api_timeout: Duration,
    // Bounded retry policy for transient profile-fetch failures.
    pub profile_retry: RetryPolicy,
    // Runtime environment marker. Controls log format and fail-fast behaviour.
    pub env: Env,
}

/// Env
///
/// Defines the runtime context. Local gets permissive defaults, Production demands
/// explicit settings for everything that points at real infrastructure.
#[derive(Clone, PartialEq, Debug)]
pub enum Env {
    Local,
    Production,
}

/// RetryPolicy
///
/// How many times a transient profile-fetch failure is retried before the session settles
/// in `Unauthenticated`, and the initial delay between attempts (doubled each time).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RetryPolicy {
    pub retries: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            retries: 0,
            backoff: Duration::ZERO,
        }
    }

    /// Delay before retry number `attempt` (0-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.backoff.saturating_mul(2u32.saturating_pow(attempt))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 2,
            backoff: Duration::from_millis(250),
        }
    }
}

const LOCAL_API_BASE_URL: &str = "http://localhost:8000";
const DEFAULT_TOKEN_STORE_PATH: &str = ".taskboard/session.json";
const DEFAULT_BIND_ADDR: &str = "127.0.0.1:5173";

impl Default for AppConfig {
    /// default
    ///
    /// Provides a safe, non-panicking AppConfig instance primarily used for test setup.
    fn default() -> Self {
        Self {
            api_base_url: LOCAL_API_BASE_URL.to_string(),
            asset_origin: LOCAL_API_BASE_URL.to_string(),
            token_store_path: PathBuf::from(DEFAULT_TOKEN_STORE_PATH),
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            api_timeout: Duration::from_secs(30),
            profile_retry: RetryPolicy::default(),
            env: Env::Local,
        }
    }
}

impl AppConfig {
    /// load
    ///
    /// Reads every parameter from environment variables (call `dotenv` first).
    ///
    /// # Panics
    /// Panics in Production when `API_BASE_URL` is missing, so the shell never starts
    /// pointed at a developer backend by accident.
    pub fn load() -> Self {
        let env_str = env::var("APP_ENV").unwrap_or_else(|_| "local".to_string());
        let env = match env_str.as_str() {
            "production" => Env::Production,
            _ => Env::Local,
        };

        let api_base_url = match env {
            Env::Production => {
                env::var("API_BASE_URL").expect("FATAL: API_BASE_URL must be set in production.")
            }
            Env::Local => {
                env::var("API_BASE_URL").unwrap_or_else(|_| LOCAL_API_BASE_URL.to_string())
            }
        };
        let api_base_url = api_base_url.trim_end_matches('/').to_string();

        // Image references are served by the backend unless a CDN origin is configured.
        let asset_origin = env::var("ASSET_ORIGIN").unwrap_or_else(|_| api_base_url.clone());

        let defaults = RetryPolicy::default();
        let profile_retry = RetryPolicy {
            retries: parse_var("PROFILE_FETCH_RETRIES").unwrap_or(defaults.retries),
            backoff: parse_var("PROFILE_FETCH_BACKOFF_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.backoff),
        };

        Self {
            api_base_url,
            asset_origin,
            token_store_path: env::var("TOKEN_STORE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_TOKEN_STORE_PATH)),
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string()),
            api_timeout: Duration::from_secs(parse_var("API_TIMEOUT_SECS").unwrap_or(30)),
            profile_retry,
            env,
        }
    }
}

// Unset or unparsable values fall back to the caller's default.
fn parse_var<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|raw| raw.trim().parse().ok())
}
