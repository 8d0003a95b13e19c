mod attributes;
mod destinations;
mod execution_result;
mod handler;
mod message;
mod method;
mod metrics;
mod scenario;
mod segment;
mod service;
mod trace_context;
mod transaction;

pub use attributes::Attributes;
pub use destinations::Destinations;
pub use execution_result::CollectedRequest;
pub use handler::{
    ClientStreamFn, Handler, MessageCheckFn, RequestContext, ServerStreamFn, UnaryFn,
};
pub use message::{Message, Metadata};
pub use method::{CallShape, Method, MethodPath};
pub use metrics::{ApdexZone, MetricSpec, MetricStats, MetricsTable};
pub use scenario::Scenario;
pub use segment::Segment;
pub use service::Service;
pub use trace_context::{is_traceparent_shaped, TraceParent, TRACEPARENT_LEN};
pub use transaction::{TracedError, Transaction, TransactionKind};
