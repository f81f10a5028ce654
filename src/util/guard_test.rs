use super::*;
use crate::state::session::MemoryStorage;
use crate::test_helpers::RecordingNavigator;

#[test]
fn unauthenticated_dashboard_redirects_to_login() {
    let guard = RouteGuard::new(Session::ephemeral());
    assert_eq!(guard.resolve(Route::Dashboard), GuardDecision::Redirect(Route::Login));
}

#[test]
fn authenticated_dashboard_is_allowed() {
    let guard = RouteGuard::new(Session::restore(MemoryStorage::with_token("t")));
    assert_eq!(guard.resolve(Route::Dashboard), GuardDecision::Allow(Route::Dashboard));
}

#[test]
fn intake_is_public() {
    let guard = RouteGuard::new(Session::ephemeral());
    assert_eq!(guard.resolve(Route::Intake), GuardDecision::Allow(Route::Intake));
}

#[test]
fn authenticated_login_goes_to_dashboard() {
    let guard = RouteGuard::new(Session::restore(MemoryStorage::with_token("t")));
    assert_eq!(guard.resolve(Route::Login), GuardDecision::Redirect(Route::Dashboard));
    assert_eq!(guard.resolve(Route::Register), GuardDecision::Redirect(Route::Dashboard));
}

#[test]
fn guard_follows_session_changes() {
    let session = Session::ephemeral();
    let guard = RouteGuard::new(session.clone());
    assert_eq!(guard.resolve(Route::Dashboard).target(), Route::Login);
    session.login("t");
    assert_eq!(guard.resolve(Route::Dashboard).target(), Route::Dashboard);
    session.logout();
    assert_eq!(guard.resolve(Route::Dashboard).target(), Route::Login);
}

#[test]
fn enter_navigates_to_resolved_target() {
    let guard = RouteGuard::new(Session::ephemeral());
    let navigator = RecordingNavigator::new();
    let shown = guard.enter(Route::Dashboard, &*navigator);
    assert_eq!(shown, Route::Login);
    assert_eq!(navigator.visits(), vec![(Route::Login, false)]);
}

#[test]
fn route_paths_round_trip() {
    for route in [Route::Login, Route::Register, Route::Intake, Route::Dashboard] {
        assert_eq!(Route::from_path(route.path()), Some(route));
    }
    assert_eq!(Route::from_path("/nope"), None);
}
