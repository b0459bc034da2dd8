//! Navigation Listener.
//!
//! The Session Store only changes state; this module is what turns state changes into
//! redirects. It keeps the client's history and, after every published transition,
//! re-checks the current location against the guard.

use std::sync::Arc;
use tokio::sync::{Mutex, watch};

use crate::{
    guard::{self, GuardOutcome},
    models::{NavigationView, PhaseKind},
    routes::{self, Region},
    session::Session,
};

// Root → role home → page is the longest legitimate chain.
const MAX_HOPS: usize = 4;

/// History
///
/// The client's navigation stack. Never empty.
#[derive(Debug, Clone)]
pub struct History {
    entries: Vec<String>,
}

impl History {
    pub fn new(initial: &str) -> Self {
        Self {
            entries: vec![initial.to_string()],
        }
    }

    pub fn current(&self) -> &str {
        self.entries.last().map(String::as_str).unwrap_or(routes::ROOT)
    }

    pub fn push(&mut self, path: &str) {
        if self.current() != path {
            self.entries.push(path.to_string());
        }
    }

    /// Swaps the current entry, so the replaced location cannot be returned to.
    pub fn replace(&mut self, path: &str) {
        match self.entries.last_mut() {
            Some(last) => *last = path.to_string(),
            None => self.entries.push(path.to_string()),
        }
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn view(&self) -> NavigationView {
        NavigationView {
            location: self.current().to_string(),
            entries: self.entries.clone(),
        }
    }
}

/// SharedHistory
///
/// History shared between the listener task and the page handlers.
pub type SharedHistory = Arc<Mutex<History>>;

/// decide
///
/// The guard decision for a location, or `None` when the location is outside the page map.
pub fn decide(path: &str, session: &Session) -> Option<GuardOutcome> {
    let outcome = match routes::region_for(path)? {
        Region::Root => guard::resolve_root(session),
        Region::Public => GuardOutcome::Allow,
        Region::Protected(required) => guard::check(required, session),
    };
    Some(outcome)
}

/// NavigationListener
///
/// Subscribes to the Session Store and performs the redirects its transitions imply.
pub struct NavigationListener {
    updates: watch::Receiver<Session>,
    history: SharedHistory,
    // Phase and generation of the last snapshot reacted to. The watch channel may skip
    // intermediate snapshots, so a sign-in is detected by a new Ready generation.
    last_phase: PhaseKind,
    last_generation: u64,
}

impl NavigationListener {
    pub fn new(updates: watch::Receiver<Session>, history: SharedHistory) -> Self {
        let (last_phase, last_generation) = {
            let session = updates.borrow();
            (session.phase.kind(), session.generation)
        };
        Self {
            updates,
            history,
            last_phase,
            last_generation,
        }
    }

    /// run
    ///
    /// Reacts to the current snapshot, then to every later one, until the store is dropped.
    pub async fn run(mut self) {
        loop {
            let session = self.updates.borrow_and_update().clone();
            self.react(&session).await;
            if self.updates.changed().await.is_err() {
                tracing::debug!("Session store dropped, navigation listener exiting");
                break;
            }
        }
    }

    /// react
    ///
    /// Applies the redirects `session` implies for the current location and returns the
    /// new location if it moved.
    pub async fn react(&mut self, session: &Session) -> Option<String> {
        let phase = session.phase.kind();
        let entered_ready = phase == PhaseKind::Ready
            && (self.last_phase != PhaseKind::Ready || self.last_generation != session.generation);
        self.last_phase = phase;
        self.last_generation = session.generation;

        let mut history = self.history.lock().await;
        let mut moved = None;

        for _ in 0..MAX_HOPS {
            let location = history.current().to_string();
            let outcome = match routes::region_for(&location) {
                // Freshly signed in on the sign-in/sign-up page: land on the role home.
                Some(Region::Public) if entered_ready => guard::resolve_root(session),
                Some(_) => match decide(&location, session) {
                    Some(outcome) => outcome,
                    None => break,
                },
                None => break,
            };

            match outcome {
                GuardOutcome::Redirect(redirect) if redirect.to != location => {
                    if redirect.replace {
                        history.replace(redirect.to);
                    } else {
                        history.push(redirect.to);
                    }
                    tracing::debug!(from = %location, to = redirect.to, "Navigation redirect");
                    moved = Some(redirect.to.to_string());
                }
                _ => break,
            }
        }

        moved
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replace_overwrites_the_current_entry() {
        let mut history = History::new("/");
        history.push("/admin/users");
        history.replace("/login");
        assert_eq!(history.entries(), ["/", "/login"]);
        assert_eq!(history.current(), "/login");
    }

    #[test]
    fn push_skips_duplicate_of_current() {
        let mut history = History::new("/user/tasks");
        history.push("/user/tasks");
        assert_eq!(history.entries().len(), 1);
    }
}
