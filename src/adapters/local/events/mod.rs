//! Delivery of processing events to the connected client.

pub mod hub;

pub use hub::{SessionChannel, SessionId, SessionRegistry};
