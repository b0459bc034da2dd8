use crate::{
    AppState,
    errors::SessionError,
    guard::{self, GuardOutcome},
    models::{
        Identity, LoginRequest, NavigationView, PageView, Placeholder, RegisterRequest,
        SessionView,
    },
    routes,
    session::Session,
};
use axum::{
    Json,
    extract::State,
    http::{StatusCode, Uri},
    response::{IntoResponse, Redirect, Response},
};

// --- Guard Rendering ---

/// outcome_response
///
/// Turns a non-Allow guard outcome into the HTTP response the view layer follows.
/// Returns `None` for `Allow`, meaning the caller should render the page.
///
/// *Suspend*: `202 Accepted` with the neutral placeholder, never a redirect, so the client
/// does not flicker to the login page while the token is still being resolved.
pub fn outcome_response(outcome: GuardOutcome, session: &Session) -> Option<Response> {
    match outcome {
        GuardOutcome::Allow => None,
        GuardOutcome::Suspend => Some(
            (
                StatusCode::ACCEPTED,
                Json(Placeholder {
                    phase: session.phase.kind(),
                }),
            )
                .into_response(),
        ),
        GuardOutcome::Redirect(redirect) => Some(Redirect::to(redirect.to).into_response()),
    }
}

// --- Session Handlers ---

/// get_session
///
/// [Public Route] The current session snapshot. The token itself is never exposed.
#[utoipa::path(
    get,
    path = "/session",
    responses((status = 200, description = "Current session", body = SessionView))
)]
pub async fn get_session(State(state): State<AppState>) -> Json<SessionView> {
    Json(state.session.snapshot().view())
}

/// login
///
/// [Public Route] Validates and exchanges credentials with the backend, then installs the
/// session. On failure the previous session is left as it was.
#[utoipa::path(
    post,
    path = "/session/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Signed in", body = SessionView),
        (status = 401, description = "Credentials rejected"),
        (status = 422, description = "Invalid input"),
        (status = 502, description = "Backend unavailable")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<SessionView>, SessionError> {
    let session = state.session.sign_in(&payload).await?;
    Ok(Json(session.view()))
}

/// register
///
/// [Public Route] Creates an account and signs into it.
#[utoipa::path(
    post,
    path = "/session/register",
    request_body = RegisterRequest,
    responses(
        (status = 200, description = "Registered", body = SessionView),
        (status = 409, description = "Email already registered"),
        (status = 422, description = "Invalid input"),
        (status = 502, description = "Backend unavailable")
    )
)]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<Json<SessionView>, SessionError> {
    let session = state.session.sign_up(&payload).await?;
    Ok(Json(session.view()))
}

/// logout
///
/// [Public Route] Ends the session. Safe to call when already signed out.
#[utoipa::path(
    post,
    path = "/session/logout",
    responses((status = 200, description = "Signed out", body = SessionView))
)]
pub async fn logout(State(state): State<AppState>) -> Result<Json<SessionView>, SessionError> {
    let session = state.session.logout().await?;
    Ok(Json(session.view()))
}

/// refresh
///
/// [Public Route] Re-resolves the persisted token. This is the manual retry after the
/// backend was unreachable; the session keeps its token through such failures.
#[utoipa::path(
    post,
    path = "/session/refresh",
    responses(
        (status = 200, description = "Resolution finished", body = SessionView),
        (status = 502, description = "Backend still unavailable")
    )
)]
pub async fn refresh(State(state): State<AppState>) -> Result<Json<SessionView>, SessionError> {
    let session = state.session.resolve().await?;
    Ok(Json(session.view()))
}

/// update_identity
///
/// [Public Route] Replaces the identity after a profile-affecting action elsewhere in the
/// client. Relative image references are made absolute. Refused without a signed-in token.
#[utoipa::path(
    put,
    path = "/session/identity",
    request_body = Identity,
    responses(
        (status = 200, description = "Identity replaced", body = SessionView),
        (status = 401, description = "No signed-in session to update")
    )
)]
pub async fn update_identity(
    State(state): State<AppState>,
    Json(identity): Json<Identity>,
) -> Result<Json<SessionView>, SessionError> {
    let session = state.session.update_identity(identity).await?;
    Ok(Json(session.view()))
}

/// get_navigation
///
/// [Public Route] Where the navigation listener has left the client.
#[utoipa::path(
    get,
    path = "/navigation",
    responses((status = 200, description = "Client history", body = NavigationView))
)]
pub async fn get_navigation(State(state): State<AppState>) -> Json<NavigationView> {
    Json(state.history.lock().await.view())
}

// --- Page Handlers ---

/// root
///
/// [Public Route] The application root has no content of its own: it waits for resolution
/// or sends the client to the login page or the role's home.
pub async fn root(State(state): State<AppState>) -> Response {
    let session = state.session.snapshot();
    let outcome = guard::resolve_root(&session);
    outcome_response(outcome, &session).unwrap_or_else(|| Redirect::to(routes::LOGIN).into_response())
}

/// page
///
/// Renders the descriptor for any page in the map. Protected pages only reach this
/// handler once their region's guard has allowed the request.
pub async fn page(State(state): State<AppState>, uri: Uri) -> Response {
    let path = routes::normalize_path(uri.path());
    let Some(page) = routes::page_for(path) else {
        return StatusCode::NOT_FOUND.into_response();
    };

    state.history.lock().await.push(path);

    let session = state.session.snapshot();
    Json(PageView {
        path: path.to_string(),
        page: page.to_string(),
        identity: session.identity().cloned(),
    })
    .into_response()
}
