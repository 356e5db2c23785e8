//! Ports - Trait definitions the application layer depends on.

pub mod engine;
pub mod notifier;
pub mod storage;
