use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use serde_json::Value;
use tonic::Code;
use uuid::Uuid;

use super::Agent;
use crate::entities::{
    Attributes, Destinations, Segment, TraceParent, TracedError, Transaction, TransactionKind,
};

/// 32 lowercase hex characters
pub(crate) fn new_trace_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// 16 lowercase hex characters. Folding both halves together covers the
/// version and variant bits of the uuid with random ones.
pub(crate) fn new_span_id() -> String {
    let (high, low) = Uuid::new_v4().as_u64_pair();
    format!("{:016x}", high ^ low)
}

/// Index of a segment opened on a [`TransactionHandle`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentId(usize);

struct OpenSegment {
    segment: Segment,
    started: Instant,
    ended: bool,
}

struct ActiveTransaction {
    id: String,
    trace_id: String,
    parent_span_id: Option<String>,
    name: String,
    kind: TransactionKind,
    started: Instant,
    root_span_id: String,
    attributes: Attributes,
    segments: Vec<OpenSegment>,
    errors: Vec<TracedError>,
    finished: Option<Transaction>,
}

impl ActiveTransaction {
    fn snapshot(&mut self) -> Transaction {
        let now = Instant::now();
        let children = self
            .segments
            .iter_mut()
            .map(|open| {
                if !open.ended {
                    open.segment.duration = now.duration_since(open.started);
                    open.ended = true;
                }
                open.segment.clone()
            })
            .collect();

        let duration = now.duration_since(self.started);
        let mut trace = Segment::new(self.name.clone(), self.root_span_id.clone());
        trace.duration = duration;
        trace.children = children;

        Transaction {
            id: self.id.clone(),
            trace_id: self.trace_id.clone(),
            parent_span_id: self.parent_span_id.clone(),
            name: self.name.clone(),
            kind: self.kind,
            duration,
            attributes: self.attributes.clone(),
            trace,
            errors: self.errors.clone(),
        }
    }
}

/// Shared handle to an in-progress transaction.
///
/// Cloned into the server call task or the client call driver; the first
/// `finish` reports the transaction to the agent, later calls return the
/// same snapshot.
#[derive(Clone)]
pub struct TransactionHandle {
    inner: Arc<Mutex<ActiveTransaction>>,
    agent: Agent,
}

impl TransactionHandle {
    pub(crate) fn start(agent: Agent, name: String, kind: TransactionKind) -> Self {
        let active = ActiveTransaction {
            id: new_span_id(),
            trace_id: new_trace_id(),
            parent_span_id: None,
            name,
            kind,
            started: Instant::now(),
            root_span_id: new_span_id(),
            attributes: Attributes::new(),
            segments: Vec::new(),
            errors: Vec::new(),
            finished: None,
        };
        Self {
            inner: Arc::new(Mutex::new(active)),
            agent,
        }
    }

    fn lock(&self) -> MutexGuard<'_, ActiveTransaction> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn agent(&self) -> &Agent {
        &self.agent
    }

    pub fn id(&self) -> String {
        self.lock().id.clone()
    }

    pub fn trace_id(&self) -> String {
        self.lock().trace_id.clone()
    }

    pub fn name(&self) -> String {
        self.lock().name.clone()
    }

    pub fn kind(&self) -> TransactionKind {
        self.lock().kind
    }

    pub fn is_finished(&self) -> bool {
        self.lock().finished.is_some()
    }

    /// Join the trace described by an inbound `traceparent`
    pub fn accept_trace_parent(&self, parent: &TraceParent) {
        let mut active = self.lock();
        active.trace_id = parent.trace_id.clone();
        active.parent_span_id = Some(parent.parent_id.clone());
    }

    pub fn add_attribute(&self, destinations: Destinations, key: impl Into<String>, value: impl Into<Value>) {
        self.lock().attributes.add(destinations, key, value);
    }

    /// Open a child segment under the transaction root; `None` once finished
    pub fn start_segment(&self, name: impl Into<String>) -> Option<SegmentId> {
        let mut active = self.lock();
        if active.finished.is_some() {
            return None;
        }
        active.segments.push(OpenSegment {
            segment: Segment::new(name, new_span_id()),
            started: Instant::now(),
            ended: false,
        });
        Some(SegmentId(active.segments.len() - 1))
    }

    pub fn segment_span_id(&self, id: SegmentId) -> Option<String> {
        self.lock()
            .segments
            .get(id.0)
            .map(|open| open.segment.span_id.clone())
    }

    pub fn add_segment_attribute(&self, id: SegmentId, key: impl Into<String>, value: impl Into<Value>) {
        if let Some(open) = self.lock().segments.get_mut(id.0) {
            open.segment
                .attributes
                .add(Destinations::SEGMENT_SCOPE, key, value);
        }
    }

    pub fn end_segment(&self, id: SegmentId) {
        if let Some(open) = self.lock().segments.get_mut(id.0) {
            if !open.ended {
                open.segment.duration = open.started.elapsed();
                open.ended = true;
            }
        }
    }

    pub fn record_error(&self, message: impl Into<String>, code: Code) {
        let mut active = self.lock();
        if active.finished.is_some() {
            return;
        }
        let error = TracedError {
            transaction_name: active.name.clone(),
            message: message.into(),
            code: i32::from(code),
        };
        active.errors.push(error);
    }

    /// End the transaction and report it to the agent exactly once
    pub fn finish(&self) -> Transaction {
        let transaction = {
            let mut active = self.lock();
            if let Some(done) = &active.finished {
                return done.clone();
            }
            let transaction = active.snapshot();
            active.finished = Some(transaction.clone());
            transaction
        };
        self.agent.transaction_finished(&transaction);
        transaction
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AgentConfig;

    fn handle() -> TransactionHandle {
        let agent = Agent::new(AgentConfig::default());
        agent.start_transaction("WebTransaction/Custom/test", TransactionKind::Web)
    }

    #[test]
    fn test_ids_are_hex() {
        let trace = new_trace_id();
        let span = new_span_id();
        assert_eq!(trace.len(), 32);
        assert_eq!(span.len(), 16);
        assert!(trace.bytes().all(|b| b.is_ascii_hexdigit()));
        assert!(span.bytes().all(|b| b.is_ascii_hexdigit()));
    }

    #[test]
    fn test_span_ids_have_no_fixed_version_nibble() {
        // Index 12 of a v4 uuid's hex form is always '4'
        let all_four = (0..64).all(|_| new_span_id().as_bytes()[12] == b'4');
        assert!(!all_four);
    }

    #[test]
    fn test_finish_reports_once() {
        let handle = handle();
        let first = handle.finish();
        let second = handle.finish();
        assert_eq!(first, second);
        assert!(handle.is_finished());
        assert_eq!(handle.agent().transactions().len(), 1);
    }

    #[test]
    fn test_segments_become_root_children() {
        let handle = handle();
        let id = handle.start_segment("External/h:1/svc/M").unwrap();
        handle.add_segment_attribute(id, "component", "gRPC");
        handle.end_segment(id);

        let tx = handle.finish();
        let segment = tx.segment("External/h:1/svc/M").unwrap();
        assert_eq!(segment.attributes.value("component"), Some(&Value::from("gRPC")));
        assert!(handle.start_segment("late").is_none());
    }

    #[test]
    fn test_accept_trace_parent() {
        let handle = handle();
        let parent = TraceParent::new("4bf92f3577b34da6a3ce929d0e0e4736", "00f067aa0ba902b7", true);
        handle.accept_trace_parent(&parent);

        let tx = handle.finish();
        assert_eq!(tx.trace_id, "4bf92f3577b34da6a3ce929d0e0e4736");
        assert_eq!(tx.parent_span_id.as_deref(), Some("00f067aa0ba902b7"));
    }

    #[test]
    fn test_errors_after_finish_are_dropped() {
        let handle = handle();
        handle.record_error("first", Code::Internal);
        let tx = handle.finish();
        handle.record_error("late", Code::Internal);

        assert_eq!(tx.errors.len(), 1);
        assert_eq!(tx.errors[0].code, 13);
        assert_eq!(handle.agent().errors().len(), 1);
    }
}
