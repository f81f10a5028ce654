//! Route table and access guard.
//!
//! SYSTEM CONTEXT
//! ==============
//! Every view resolves its route through the guard before mounting, so
//! unauthenticated redirect behavior is identical everywhere.

#[cfg(test)]
#[path = "guard_test.rs"]
mod guard_test;

use crate::state::session::Session;

/// Views known to the client.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Route {
    Login,
    Register,
    /// Public kiosk intake wizard.
    Intake,
    /// Operator queue dashboard.
    Dashboard,
}

impl Route {
    #[must_use]
    pub fn path(self) -> &'static str {
        match self {
            Self::Login => "/login",
            Self::Register => "/register",
            Self::Intake => "/",
            Self::Dashboard => "/dashboard",
        }
    }

    #[must_use]
    pub fn from_path(path: &str) -> Option<Self> {
        match path.trim_end_matches('/') {
            "" => Some(Self::Intake),
            "/login" => Some(Self::Login),
            "/register" => Some(Self::Register),
            "/dashboard" => Some(Self::Dashboard),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_protected(self) -> bool {
        matches!(self, Self::Dashboard)
    }
}

/// Front-end navigation seam.
pub trait Navigator {
    /// Switch the active view. `session_expired` asks the login view to show
    /// the session-expired notice.
    fn navigate(&self, route: Route, session_expired: bool);
}

/// Outcome of resolving a requested route.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GuardDecision {
    Allow(Route),
    Redirect(Route),
}

impl GuardDecision {
    /// The route that will actually be shown.
    #[must_use]
    pub fn target(self) -> Route {
        match self {
            Self::Allow(route) | Self::Redirect(route) => route,
        }
    }
}

/// Gates protected views on session status.
#[derive(Clone, Debug)]
pub struct RouteGuard {
    session: Session,
}

impl RouteGuard {
    pub fn new(session: Session) -> Self {
        Self { session }
    }

    #[must_use]
    pub fn resolve(&self, requested: Route) -> GuardDecision {
        let authenticated = self.session.is_authenticated();
        match requested {
            route if route.is_protected() && !authenticated => GuardDecision::Redirect(Route::Login),
            Route::Login | Route::Register if authenticated => GuardDecision::Redirect(Route::Dashboard),
            route => GuardDecision::Allow(route),
        }
    }

    /// Resolve and navigate in one step; returns the route shown.
    pub fn enter(&self, requested: Route, navigator: &dyn Navigator) -> Route {
        let target = self.resolve(requested).target();
        navigator.navigate(target, false);
        target
    }
}
