//! Client-side state: the session, the intake wizard and the queue replica.

pub mod queue;
pub mod session;
pub mod wizard;
