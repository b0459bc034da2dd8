//! Route Guard.
//!
//! Pure decisions over a session snapshot: given the roles a region requires, should the
//! region render, wait, or redirect? Nothing here performs navigation or touches the store.

use crate::{
    models::Role,
    routes::{ADMIN_HOME, LOGIN, ROOT, USER_HOME},
    session::{Phase, Session},
};

/// Redirect
///
/// A navigation the caller should perform. `replace` means the current location must not
/// stay in history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Redirect {
    pub to: &'static str,
    pub replace: bool,
}

impl Redirect {
    pub const fn replace(to: &'static str) -> Self {
        Self { to, replace: true }
    }
}

/// GuardOutcome
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardOutcome {
    /// Resolution still running: show a neutral placeholder, do not redirect yet.
    Suspend,
    Redirect(Redirect),
    Allow,
}

/// check
///
/// Gates a protected region requiring one of `required`. `member` counts as `user`;
/// an unrecognised role is sent to the login page.
pub fn check(required: &[Role], session: &Session) -> GuardOutcome {
    let identity = match &session.phase {
        Phase::Initializing | Phase::Resolving => return GuardOutcome::Suspend,
        Phase::Unauthenticated => return GuardOutcome::Redirect(Redirect::replace(LOGIN)),
        Phase::Ready(identity) => identity,
    };

    let role = identity.role.normalized();
    if role == Role::Unknown {
        tracing::warn!(user_id = %identity.id, "Unrecognised role, sending to login");
        return GuardOutcome::Redirect(Redirect::replace(LOGIN));
    }

    if required.iter().any(|allowed| allowed.normalized() == role) {
        GuardOutcome::Allow
    } else {
        GuardOutcome::Redirect(Redirect::replace(ROOT))
    }
}

/// resolve_root
///
/// Where the application root leads for this session. Never `Allow`: the root itself
/// has no content.
pub fn resolve_root(session: &Session) -> GuardOutcome {
    match &session.phase {
        Phase::Initializing | Phase::Resolving => GuardOutcome::Suspend,
        Phase::Unauthenticated => GuardOutcome::Redirect(Redirect::replace(LOGIN)),
        Phase::Ready(identity) => match identity.role {
            Role::Admin => GuardOutcome::Redirect(Redirect::replace(ADMIN_HOME)),
            Role::User | Role::Member => GuardOutcome::Redirect(Redirect::replace(USER_HOME)),
            Role::Unknown => GuardOutcome::Redirect(Redirect::replace(LOGIN)),
        },
    }
}
