use axum::{
    Router,
    extract::{FromRef, Request, State},
    http::HeaderName,
    middleware::{self, Next},
    response::Response,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Session core: token slot, backend gateway, the store and the decisions made over it.
pub mod auth;
pub mod config;
pub mod errors;
pub mod gateway;
pub mod guard;
pub mod models;
pub mod navigation;
pub mod session;
pub mod storage;

// HTTP surface of the shell.
pub mod handlers;
pub mod routes;
use routes::{ADMIN_ROLES, USER_ROLES, admin, public, user};

// --- Public Re-exports ---

pub use config::AppConfig;
pub use gateway::{GatewayState, HttpApiGateway};
pub use navigation::{History, NavigationListener, SharedHistory};
pub use session::{SessionHandle, SessionStore};
pub use storage::{FileTokenStore, MemoryTokenStore, TokenStoreState};

/// ApiDoc
///
/// OpenAPI document for the shell's session endpoints, served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::get_session, handlers::login, handlers::register, handlers::logout,
        handlers::refresh, handlers::update_identity, handlers::get_navigation
    ),
    components(
        schemas(
            models::Role, models::Identity, models::PhaseKind, models::SessionView,
            models::LoginRequest, models::RegisterRequest, models::PageView,
            models::Placeholder, models::NavigationView,
        )
    ),
    tags(
        (name = "taskboard-shell", description = "Task board session shell")
    )
)]
struct ApiDoc;

/// AppState
///
/// Everything a request can reach: the one Session Store of this process, the client
/// history the navigation listener maintains, and the loaded configuration.
#[derive(Clone)]
pub struct AppState {
    pub session: SessionHandle,
    pub history: SharedHistory,
    pub config: AppConfig,
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for SessionHandle {
    fn from_ref(app_state: &AppState) -> SessionHandle {
        app_state.session.clone()
    }
}

impl FromRef<AppState> for SharedHistory {
    fn from_ref(app_state: &AppState) -> SharedHistory {
        app_state.history.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// enforce
///
/// Runs the Route Guard for a region against the current snapshot. Only `Allow` lets the
/// request reach the page handler.
async fn enforce(
    required: &'static [models::Role],
    session: &SessionHandle,
    request: Request,
    next: Next,
) -> Response {
    let snapshot = session.snapshot();
    let outcome = guard::check(required, &snapshot);
    match handlers::outcome_response(outcome, &snapshot) {
        Some(response) => response,
        None => next.run(request).await,
    }
}

async fn admin_guard(State(session): State<SessionHandle>, request: Request, next: Next) -> Response {
    enforce(ADMIN_ROLES, &session, request, next).await
}

async fn user_guard(State(session): State<SessionHandle>, request: Request, next: Next) -> Response {
    enforce(USER_ROLES, &session, request, next).await
}

/// create_router
///
/// Assembles the shell's routing structure, applies the region guards and the
/// observability layers, and registers the application state.
pub fn create_router(state: AppState) -> Router {
    // 1. CORS Configuration
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    // 2. Base Router Assembly
    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        // Admin region: {admin}.
        .merge(
            admin::admin_routes()
                .route_layer(middleware::from_fn_with_state(state.clone(), admin_guard)),
        )
        // User region: {user, member}.
        .merge(
            user::user_routes()
                .route_layer(middleware::from_fn_with_state(state.clone(), user_guard)),
        )
        .with_state(state);

    // 3. Observability and Correlation Layers
    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Span for every request, carrying method, uri and the `x-request-id` set above so all
/// log lines of one request correlate.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
