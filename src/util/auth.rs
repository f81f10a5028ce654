//! Auth-expiry path shared by the wizard and the queue synchronizer.
//!
//! SYSTEM CONTEXT
//! ==============
//! When a protected call comes back `AuthExpired`, the caller hands off here:
//! log out, then navigate to the login view with the expired notice. The
//! session itself is the once-only latch: after logout there is no credential,
//! so a second concurrent 401 finds nothing to expire and does nothing.

#[cfg(test)]
#[path = "auth_test.rs"]
mod auth_test;

use std::rc::Rc;

use tracing::warn;

use crate::state::session::Session;
use crate::util::guard::{Navigator, Route};

#[derive(Clone)]
pub struct AuthExpiry {
    session: Session,
    navigator: Rc<dyn Navigator>,
}

impl AuthExpiry {
    pub fn new(session: Session, navigator: Rc<dyn Navigator>) -> Self {
        Self { session, navigator }
    }

    /// Force logout + redirect. Returns `false` when this expiry was already
    /// handled (session no longer authenticated).
    pub fn trigger(&self) -> bool {
        if !self.session.is_authenticated() {
            return false;
        }
        warn!("session expired; forcing re-authentication");
        self.session.logout();
        self.navigator.navigate(Route::Login, true);
        true
    }

    #[must_use]
    pub fn session(&self) -> &Session {
        &self.session
    }
}
