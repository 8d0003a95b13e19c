use super::{CallShape, Message, Metadata};
use std::sync::Arc;
use tonic::Status;

/// Context passed to handlers for every call
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub service: String,
    pub method: String,
    pub metadata: Metadata,
}

impl RequestContext {
    pub fn new(service: impl Into<String>, method: impl Into<String>, metadata: Metadata) -> Self {
        Self {
            service: service.into(),
            method: method.into(),
            metadata,
        }
    }
}

/// One request in, one response out. Also used per message for bidi calls.
pub type UnaryFn = Arc<dyn Fn(&RequestContext, Message) -> Result<Message, Status> + Send + Sync>;

/// One request in, a sequence of responses out
pub type ServerStreamFn =
    Arc<dyn Fn(&RequestContext, Message) -> Result<Vec<Message>, Status> + Send + Sync>;

/// Inspects each inbound message of a client stream before input ends
pub type MessageCheckFn = Arc<dyn Fn(&RequestContext, &Message) -> Result<(), Status> + Send + Sync>;

/// All inbound messages of a client stream in, one response out
pub type ClientStreamFn =
    Arc<dyn Fn(&RequestContext, Vec<Message>) -> Result<Message, Status> + Send + Sync>;

/// Server-side behaviour of a method, one variant per call shape
#[derive(Clone)]
pub enum Handler {
    Unary(UnaryFn),
    ServerStreaming(ServerStreamFn),
    ClientStreaming {
        on_message: Option<MessageCheckFn>,
        on_end: ClientStreamFn,
    },
    /// Answers every inbound message as soon as it arrives
    BidiStreaming(UnaryFn),
}

impl std::fmt::Debug for Handler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Handler").field(&self.shape()).finish()
    }
}

impl Handler {
    pub fn unary<F>(f: F) -> Self
    where
        F: Fn(&RequestContext, Message) -> Result<Message, Status> + Send + Sync + 'static,
    {
        Handler::Unary(Arc::new(f))
    }

    pub fn server_streaming<F>(f: F) -> Self
    where
        F: Fn(&RequestContext, Message) -> Result<Vec<Message>, Status> + Send + Sync + 'static,
    {
        Handler::ServerStreaming(Arc::new(f))
    }

    pub fn client_streaming<F>(f: F) -> Self
    where
        F: Fn(&RequestContext, Vec<Message>) -> Result<Message, Status> + Send + Sync + 'static,
    {
        Handler::ClientStreaming {
            on_message: None,
            on_end: Arc::new(f),
        }
    }

    pub fn bidi_streaming<F>(f: F) -> Self
    where
        F: Fn(&RequestContext, Message) -> Result<Message, Status> + Send + Sync + 'static,
    {
        Handler::BidiStreaming(Arc::new(f))
    }

    /// Attach a per-message check to a client-streaming handler.
    ///
    /// A failing check closes the call with its status without waiting for
    /// the client to end its input. Other handler kinds are returned as is.
    pub fn with_message_check<F>(self, check: F) -> Self
    where
        F: Fn(&RequestContext, &Message) -> Result<(), Status> + Send + Sync + 'static,
    {
        match self {
            Handler::ClientStreaming { on_end, .. } => Handler::ClientStreaming {
                on_message: Some(Arc::new(check)),
                on_end,
            },
            other => other,
        }
    }

    pub fn shape(&self) -> CallShape {
        match self {
            Handler::Unary(_) => CallShape::Unary,
            Handler::ServerStreaming(_) => CallShape::ServerStreaming,
            Handler::ClientStreaming { .. } => CallShape::ClientStreaming,
            Handler::BidiStreaming(_) => CallShape::BidiStreaming,
        }
    }
}
