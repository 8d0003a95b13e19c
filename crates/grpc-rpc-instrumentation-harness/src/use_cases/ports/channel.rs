use async_trait::async_trait;

use crate::entities::{Message, Metadata, MethodPath};
use crate::error::RpcError;

/// What a call handle reports back to its owner
#[derive(Debug)]
pub enum CallEvent {
    /// One response message, in delivery order
    Data(Message),
    /// The call closed with an OK status
    End,
    /// The call failed; terminal
    Error(RpcError),
}

impl CallEvent {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, CallEvent::Data(_))
    }
}

/// One in-flight RPC, owned by whoever opened it
#[async_trait]
pub trait Call: Send {
    /// Queue a request message. Fails once the peer has closed the call.
    fn write(&mut self, message: Message) -> Result<(), RpcError>;

    /// Signal end of input; further writes fail
    fn end(&mut self);

    /// Next event of the call. Once a terminal event has been returned,
    /// further calls report a protocol error.
    async fn next_event(&mut self) -> CallEvent;
}

/// Opens calls against a server
pub trait Channel: Send + Sync {
    type Call: Call;

    fn open(&self, path: &MethodPath, metadata: Metadata) -> Result<Self::Call, RpcError>;
}
