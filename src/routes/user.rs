use crate::{AppState, handlers, routes::USER_PAGES};
use axum::{Router, routing::get};

/// User Router Module
///
/// Pages for the `user` region (roles `user` and `member`): dashboard, assigned tasks and
/// a single task's details.
///
/// Access Control:
/// Wrapped in the user guard layer by `create_router`.
pub fn user_routes() -> Router<AppState> {
    USER_PAGES
        .iter()
        .fold(Router::new(), |router, (path, _)| router.route(path, get(handlers::page)))
        // GET /user/task-details/{id}
        .route("/user/task-details/{id}", get(handlers::page))
}
