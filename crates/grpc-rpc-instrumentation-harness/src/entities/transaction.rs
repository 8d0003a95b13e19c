use std::time::Duration;

use super::{Attributes, Segment};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionKind {
    Web,
    Background,
}

/// An error captured on a transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TracedError {
    pub transaction_name: String,
    pub message: String,
    /// gRPC status code that caused the error
    pub code: i32,
}

/// Snapshot of a finished transaction
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    pub id: String,
    pub trace_id: String,
    /// Span id taken from an inbound `traceparent`, if one was accepted
    pub parent_span_id: Option<String>,
    pub name: String,
    pub kind: TransactionKind,
    pub duration: Duration,
    pub attributes: Attributes,
    pub trace: Segment,
    pub errors: Vec<TracedError>,
}

impl Transaction {
    pub fn is_web(&self) -> bool {
        self.kind == TransactionKind::Web
    }

    /// Find a segment anywhere in this transaction's trace
    pub fn segment(&self, name: &str) -> Option<&Segment> {
        self.trace.find(name)
    }
}
