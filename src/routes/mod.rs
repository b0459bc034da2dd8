/// Router Module Index
///
/// The client's page map, split by who may see it. Each sub-module builds the axum router
/// for one region; `create_router` layers the matching guard on top, so a page can never
/// be mounted without its access check.
use crate::models::Role;

/// Pages anyone can open: sign-in and sign-up.
pub mod public;

/// Pages for the `user` region (`user` and `member` roles).
pub mod user;

/// Pages for the `admin` region.
pub mod admin;

pub const ROOT: &str = "/";
pub const LOGIN: &str = "/login";
pub const SIGNUP: &str = "/signup";
pub const ADMIN_HOME: &str = "/admin/dashboard";
pub const USER_HOME: &str = "/user/dashboard";

/// Roles allowed into the admin region.
pub const ADMIN_ROLES: &[Role] = &[Role::Admin];
/// Roles allowed into the user region. `member` is listed for readability; the guard
/// normalizes it to `user` anyway.
pub const USER_ROLES: &[Role] = &[Role::User, Role::Member];

/// Static admin pages and the view each one renders.
pub const ADMIN_PAGES: &[(&str, &str)] = &[
    (ADMIN_HOME, "admin-dashboard"),
    ("/admin/tasks", "manage-tasks"),
    ("/admin/create-task", "create-task"),
    ("/admin/users", "manage-users"),
];

/// Static user pages and the view each one renders.
pub const USER_PAGES: &[(&str, &str)] = &[(USER_HOME, "user-dashboard"), ("/user/tasks", "my-tasks")];

const TASK_DETAILS_PREFIX: &str = "/user/task-details/";
const TASK_DETAILS_PAGE: &str = "task-details";

/// Region
///
/// Which part of the page map a location belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Region {
    Root,
    Public,
    Protected(&'static [Role]),
}

/// Strips the query/fragment and any trailing slash (except on the root).
pub fn normalize_path(path: &str) -> &str {
    let path = path.split(['?', '#']).next().unwrap_or_default();
    match path.trim_end_matches('/') {
        "" => ROOT,
        trimmed => trimmed,
    }
}

/// region_for
///
/// `None` for locations outside the page map.
pub fn region_for(path: &str) -> Option<Region> {
    let path = normalize_path(path);
    if path == ROOT {
        return Some(Region::Root);
    }
    if path == LOGIN || path == SIGNUP {
        return Some(Region::Public);
    }
    if ADMIN_PAGES.iter().any(|(p, _)| *p == path) {
        return Some(Region::Protected(ADMIN_ROLES));
    }
    if page_for(path).is_some() {
        return Some(Region::Protected(USER_ROLES));
    }
    None
}

/// page_for
///
/// The view name for a page location, if it is one.
pub fn page_for(path: &str) -> Option<&'static str> {
    let path = normalize_path(path);
    match path {
        LOGIN => return Some("login"),
        SIGNUP => return Some("signup"),
        _ => {}
    }
    if let Some((_, page)) = ADMIN_PAGES.iter().chain(USER_PAGES).find(|(p, _)| *p == path) {
        return Some(*page);
    }
    match path.strip_prefix(TASK_DETAILS_PREFIX) {
        Some(id) if !id.is_empty() && !id.contains('/') => Some(TASK_DETAILS_PAGE),
        _ => None,
    }
}
