//! Triage client library.
//!
//! SYSTEM CONTEXT
//! ==============
//! A front end for an emergency-department triage service. Patients register
//! through a step-by-step intake wizard; authenticated staff watch a live,
//! severity-ordered queue and attend or resolve patients from it.
//!
//! DESIGN
//! ======
//! - [`net`] talks to the service. The gateway attaches the stored credential
//!   and classifies failures so callers never inspect raw status codes.
//! - [`state`] holds the session, the wizard state machine and the queue
//!   replica. The session and queue replica are plain data; only the wizard's
//!   `submit` goes out, and it does so through the gateway.
//! - [`services`] drives the queue replica over time: polling,
//!   optimistic attend and reconciliation.
//! - [`util`] has the route guard and the shared auth-expiry path.
//!
//! Everything runs on one thread. Shared state uses `Rc`/`RefCell` and
//! background work is spawned onto a `tokio::task::LocalSet`.

pub mod config;
pub mod net;
pub mod services;
pub mod state;
pub mod util;

#[cfg(test)]
mod test_helpers;
