mod common;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode, header},
};
use common::{MockGateway, auth_response, identity, store};
use serde_json::{Value, json};
use std::sync::Arc;
use taskboard_shell::{
    AppConfig, AppState, create_router,
    models::Role,
    navigation::History,
    session::SessionHandle,
    storage::MemoryTokenStore,
};
use tokio::sync::Mutex;
use tower::ServiceExt;

// --- Setup Utilities ---

fn app_with(session: SessionHandle) -> (Router, AppState) {
    let state = AppState {
        session,
        history: Arc::new(Mutex::new(History::new("/"))),
        config: AppConfig::default(),
    };
    (create_router(state.clone()), state)
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Option<String>, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(json) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };
    let response = app.clone().oneshot(builder.body(body).unwrap()).await.unwrap();

    let status = response.status();
    let location = response
        .headers()
        .get(header::LOCATION)
        .map(|value| value.to_str().unwrap().to_string());
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, location, json)
}

// --- Tests ---

#[tokio::test]
async fn test_health_check() {
    let (app, _) = app_with(store(Arc::new(MockGateway::new()), MemoryTokenStore::new()));
    let (status, _, _) = send(&app, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_root_serves_placeholder_before_resolution() {
    let (app, _) = app_with(store(Arc::new(MockGateway::new()), MemoryTokenStore::new()));

    let (status, location, body) = send(&app, Method::GET, "/", None).await;

    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(location, None);
    assert_eq!(body["phase"], "initializing");
}

#[tokio::test]
async fn test_root_redirects_signed_out_client_to_login() {
    let session = store(Arc::new(MockGateway::new()), MemoryTokenStore::new());
    session.resolve().await.unwrap();
    let (app, _) = app_with(session);

    let (status, location, _) = send(&app, Method::GET, "/", None).await;

    assert_eq!(status, StatusCode::SEE_OTHER);
    assert_eq!(location.as_deref(), Some("/login"));
}

#[tokio::test]
async fn test_protected_page_while_resolving_is_not_redirected() {
    let session = store(Arc::new(MockGateway::new()), MemoryTokenStore::new());
    let (app, _) = app_with(session);

    let (status, location, _) = send(&app, Method::GET, "/admin/dashboard", None).await;

    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(location, None);
}

#[tokio::test]
async fn test_member_is_bounced_from_admin_region() {
    let session = store(Arc::new(MockGateway::new()), MemoryTokenStore::new());
    session.login("t", identity(Role::Member)).await.unwrap();
    let (app, _) = app_with(session);

    let (status, location, _) = send(&app, Method::GET, "/admin/users", None).await;

    assert_eq!(status, StatusCode::SEE_OTHER);
    assert_eq!(location.as_deref(), Some("/"));
}

#[tokio::test]
async fn test_member_sees_task_details_page() {
    let session = store(Arc::new(MockGateway::new()), MemoryTokenStore::new());
    session.login("t", identity(Role::Member)).await.unwrap();
    let (app, state) = app_with(session);

    let (status, _, body) = send(&app, Method::GET, "/user/task-details/66a1f0", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["page"], "task-details");
    assert_eq!(body["identity"]["role"], "member");
    assert_eq!(state.history.lock().await.current(), "/user/task-details/66a1f0");
}

#[tokio::test]
async fn test_admin_sees_admin_dashboard() {
    let session = store(Arc::new(MockGateway::new()), MemoryTokenStore::new());
    session.login("t", identity(Role::Admin)).await.unwrap();
    let (app, _) = app_with(session);

    let (status, _, body) = send(&app, Method::GET, "/admin/dashboard", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["page"], "admin-dashboard");
}

#[tokio::test]
async fn test_login_page_is_public() {
    let (app, _) = app_with(store(Arc::new(MockGateway::new()), MemoryTokenStore::new()));

    let (status, _, body) = send(&app, Method::GET, "/login", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["page"], "login");
    assert_eq!(body["identity"], Value::Null);
}

#[tokio::test]
async fn test_unknown_path_is_not_found() {
    let (app, _) = app_with(store(Arc::new(MockGateway::new()), MemoryTokenStore::new()));
    let (status, _, _) = send(&app, Method::GET, "/admin/nope", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_session_login_endpoint() {
    let gateway = Arc::new(MockGateway::with_auth(Ok(auth_response("jwt", Role::Admin))));
    let tokens = MemoryTokenStore::new();
    let (app, _) = app_with(store(gateway, tokens.clone()));

    let (status, _, body) = send(
        &app,
        Method::POST,
        "/session/login",
        Some(json!({ "email": "ada@example.com", "password": "secret1" })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["phase"], "ready");
    assert_eq!(body["identity"]["role"], "admin");
    assert!(body.get("token").is_none());
    assert_eq!(tokens.token().as_deref(), Some("jwt"));
}

#[tokio::test]
async fn test_session_login_validation_error() {
    let gateway = Arc::new(MockGateway::with_auth(Ok(auth_response("jwt", Role::Admin))));
    let (app, _) = app_with(store(gateway, MemoryTokenStore::new()));

    let (status, _, body) = send(
        &app,
        Method::POST,
        "/session/login",
        Some(json!({ "email": "ada@example.com", "password": "123" })),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "validation_error");
}

#[tokio::test]
async fn test_session_register_conflict() {
    let gateway = Arc::new(MockGateway::with_auth(Err(
        taskboard_shell::errors::ApiError::Conflict("User already exists".into()),
    )));
    let (app, _) = app_with(store(gateway, MemoryTokenStore::new()));

    let (status, _, body) = send(
        &app,
        Method::POST,
        "/session/register",
        Some(json!({ "name": "Ada", "email": "ada@example.com", "password": "secret1" })),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "conflict");
}

#[tokio::test]
async fn test_session_logout_endpoint() {
    let tokens = MemoryTokenStore::new();
    let session = store(Arc::new(MockGateway::new()), tokens.clone());
    session.login("t", identity(Role::User)).await.unwrap();
    let (app, _) = app_with(session);

    let (status, _, body) = send(&app, Method::POST, "/session/logout", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["phase"], "unauthenticated");
    assert_eq!(body["identity"], Value::Null);
    assert_eq!(tokens.token(), None);
}

#[tokio::test]
async fn test_refresh_reports_transient_failure() {
    let gateway = Arc::new(MockGateway::with_profile(vec![Err(
        taskboard_shell::errors::ApiError::Transient("timeout".into()),
    )]));
    let tokens = MemoryTokenStore::with_token("t", Role::User);
    let (app, _) = app_with(store(gateway, tokens.clone()));

    let (status, _, body) = send(&app, Method::POST, "/session/refresh", None).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"], "transient_error");
    assert_eq!(tokens.token().as_deref(), Some("t"));
}

#[tokio::test]
async fn test_identity_update_endpoint() {
    let tokens = MemoryTokenStore::with_token("t", Role::User);
    let (app, _) = app_with(store(Arc::new(MockGateway::new()), tokens));

    let (status, _, body) = send(
        &app,
        Method::PUT,
        "/session/identity",
        Some(json!({
            "_id": "u1",
            "name": "Ada",
            "email": "ada@example.com",
            "role": "user",
            "profileImageUrl": "/img/x.png"
        })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["phase"], "ready");
    assert_eq!(
        body["identity"]["profileImageUrl"],
        "https://api.example.com/img/x.png"
    );
}

#[tokio::test]
async fn test_identity_update_without_session_is_rejected() {
    let session = store(Arc::new(MockGateway::new()), MemoryTokenStore::new());
    session.resolve().await.unwrap();
    let (app, _) = app_with(session);

    let (status, _, body) = send(
        &app,
        Method::PUT,
        "/session/identity",
        Some(json!({
            "_id": "x",
            "name": "Mallory",
            "email": "m@example.com",
            "role": "admin"
        })),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthorized");

    // The admin region stays closed.
    let (status, location, _) = send(&app, Method::GET, "/admin/dashboard", None).await;
    assert_eq!(status, StatusCode::SEE_OTHER);
    assert_eq!(location.as_deref(), Some("/login"));
}

#[tokio::test]
async fn test_navigation_endpoint_reports_history() {
    let (app, state) = app_with(store(Arc::new(MockGateway::new()), MemoryTokenStore::new()));
    state.history.lock().await.push("/login");

    let (status, _, body) = send(&app, Method::GET, "/navigation", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["location"], "/login");
    assert_eq!(body["entries"], json!(["/", "/login"]));
}
