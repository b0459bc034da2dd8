use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post, put},
};

/// Public Router Module
///
/// Everything reachable without a session: the root redirect, the sign-in and sign-up
/// pages, and the session endpoints the view layer drives them with.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness probe for whatever launched the shell.
        .route("/health", get(|| async { "ok" }))
        // GET /
        // Placeholder while resolving, otherwise a redirect to login or the role home.
        .route("/", get(handlers::root))
        // GET /login, /signup
        .route("/login", get(handlers::page))
        .route("/signup", get(handlers::page))
        // --- Session ---
        .route("/session", get(handlers::get_session))
        .route("/session/login", post(handlers::login))
        .route("/session/register", post(handlers::register))
        .route("/session/logout", post(handlers::logout))
        // POST /session/refresh
        // Manual retry after a transient profile-fetch failure.
        .route("/session/refresh", post(handlers::refresh))
        .route("/session/identity", put(handlers::update_identity))
        // GET /navigation
        // Current location as maintained by the navigation listener.
        .route("/navigation", get(handlers::get_navigation))
}
