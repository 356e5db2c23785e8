use crate::domain::events::ProcessingEvent;

/// Outbound channel for job events addressed to the connected client.
#[cfg_attr(test, mockall::automock)]
pub trait EventSink: Send + Sync {
    /// Deliver `event`. Returns false when nobody received it; that is not an error.
    fn emit(&self, event: ProcessingEvent) -> bool;
}
