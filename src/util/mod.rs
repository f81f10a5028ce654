//! Cross-view helpers: route guarding and the auth-expiry path.
//!
//! SYSTEM CONTEXT
//! ==============
//! Both views must apply identical redirect behavior, so it lives here rather
//! than in each controller.

pub mod auth;
pub mod guard;
