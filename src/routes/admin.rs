use crate::{AppState, handlers, routes::ADMIN_PAGES};
use axum::{Router, routing::get};

/// Admin Router Module
///
/// Pages for the `admin` role: dashboard, task management, task creation, user management.
///
/// Access Control:
/// `create_router` wraps this router in the admin guard layer. Nothing here checks roles
/// itself.
pub fn admin_routes() -> Router<AppState> {
    ADMIN_PAGES
        .iter()
        .fold(Router::new(), |router, (path, _)| router.route(path, get(handlers::page)))
}
