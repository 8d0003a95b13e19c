use crate::entities::CollectedRequest;

/// Trait for collecting the request messages the test server receives
///
/// The `Output` type is returned when the scenario shuts down.
/// This allows users to define their own collection strategy and return type.
pub trait Collector: Send + Sync {
    /// The type returned when the scenario completes
    type Output: Send;

    /// Called for every inbound request message, in arrival order per call
    fn collect(&self, request: CollectedRequest);

    /// Consume the collector and return the final output
    fn into_output(self) -> Self::Output;
}
