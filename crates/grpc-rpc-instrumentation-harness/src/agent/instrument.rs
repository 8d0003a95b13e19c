use tonic::{Code, Status};

use super::{context, naming, Agent, SegmentId, TransactionHandle};
use crate::entities::{Destinations, Metadata, MethodPath, TraceParent, Transaction, TransactionKind};

/// Header carrying the W3C trace context
pub const TRACEPARENT_HEADER: &str = "traceparent";
/// Legacy trace header; sent with an empty value
pub const NEWRELIC_HEADER: &str = "newrelic";

/// Server-side recording of one inbound gRPC call as a web transaction
pub struct ServerCallRecorder {
    handle: TransactionHandle,
}

impl ServerCallRecorder {
    pub fn start(agent: &Agent, path: &MethodPath, metadata: &Metadata) -> Self {
        let handle = agent.start_transaction(naming::server_transaction_name(path), TransactionKind::Web);
        let uri = path.path();

        handle.add_attribute(Destinations::TRANS_SCOPE, "request.method", uri.clone());
        handle.add_attribute(Destinations::TRANS_SCOPE, "request.uri", uri);
        for (key, value) in metadata.iter() {
            handle.add_attribute(Destinations::TRANS_SCOPE, format!("request.headers.{key}"), value);
        }

        if agent.config().distributed_tracing.enabled {
            if let Some(parent) = metadata.get(TRACEPARENT_HEADER).and_then(TraceParent::parse) {
                handle.accept_trace_parent(&parent);
            }
        }

        Self { handle }
    }

    /// Record the final status and finish the transaction
    pub fn finish(self, status: &Status) -> Transaction {
        let code = status.code();
        self.handle
            .add_attribute(Destinations::TRANS_SCOPE, "response.status", i32::from(code));
        if self.handle.agent().config().should_record_error(code) {
            self.handle.record_error(status.message(), code);
        }
        self.handle.finish()
    }
}

/// Client-side recording of one outbound call as an external segment
pub struct ExternalCallRecorder {
    handle: TransactionHandle,
    segment: SegmentId,
}

impl ExternalCallRecorder {
    /// Open an external segment on the current transaction and inject
    /// trace headers into `metadata`. `None` outside a transaction.
    pub fn start(host: &str, port: u16, path: &MethodPath, metadata: &mut Metadata) -> Option<Self> {
        let handle = context::current_transaction()?;
        let segment = handle.start_segment(naming::external_segment_name(host, port, path))?;

        handle.add_segment_attribute(segment, "http.url", naming::external_url(host, port, path));
        handle.add_segment_attribute(segment, "procedure", path.path());
        handle.add_segment_attribute(segment, "component", naming::COMPONENT);

        if handle.agent().config().distributed_tracing.enabled {
            if let Some(span_id) = handle.segment_span_id(segment) {
                let parent = TraceParent::new(handle.trace_id(), span_id, true);
                metadata.insert(TRACEPARENT_HEADER, parent.to_string());
            }
            metadata.insert(NEWRELIC_HEADER, "");
        }

        Some(Self { handle, segment })
    }

    pub fn finish(self, status: &Status) {
        let code = status.code();
        let text = if code == Code::Ok {
            "OK".to_string()
        } else {
            status.message().to_string()
        };

        self.handle
            .add_segment_attribute(self.segment, "grpc.statusCode", i32::from(code));
        self.handle
            .add_segment_attribute(self.segment, "grpc.statusText", text);
        self.handle.end_segment(self.segment);

        if self.handle.agent().config().should_record_error(code) {
            self.handle.record_error(status.message(), code);
        }
    }
}
