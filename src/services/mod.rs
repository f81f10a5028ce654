//! Background services driven by the async runtime.

pub mod queue_sync;
