//! Wire layer: payload types, the request gateway and REST helpers.
//!
//! SYSTEM CONTEXT
//! ==============
//! Every call to the triage service goes through [`gateway::Gateway`], which
//! owns credential attachment and response classification. [`api`] holds one
//! thin helper per endpoint; [`http`] is the production transport.

pub mod api;
pub mod gateway;
pub mod http;
pub mod types;
