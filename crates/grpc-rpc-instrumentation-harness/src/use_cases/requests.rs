//! Request adapters: one awaitable result per call, for each call shape.
//!
//! Every adapter settles exactly once. Request messages are written in the
//! order given; replies are returned in the order the transport delivered
//! them.

use crate::entities::{Message, Metadata, MethodPath};
use crate::error::RpcError;
use crate::use_cases::ports::{Call, CallEvent, Channel};

/// A channel bound to one service
#[derive(Debug, Clone)]
pub struct ServiceClient<C> {
    channel: C,
    service: String,
    metadata: Metadata,
}

impl<C: Channel> ServiceClient<C> {
    pub fn new(channel: C, service: impl Into<String>) -> Self {
        Self {
            channel,
            service: service.into(),
            metadata: Metadata::new(),
        }
    }

    /// Metadata sent with every call
    pub fn with_metadata(mut self, key: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.metadata.insert(key, value);
        self
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn path(&self, method: &str) -> MethodPath {
        MethodPath::new(self.service.clone(), method)
    }

    pub fn open(&self, method: &str) -> Result<C::Call, RpcError> {
        self.channel.open(&self.path(method), self.metadata.clone())
    }
}

/// Write `payloads` in order; stop early if the peer already closed the call.
/// The terminal event then carries the reason.
fn write_all<'a, T, K>(call: &mut K, payloads: impl IntoIterator<Item = &'a T>)
where
    T: prost::Message + 'a,
    K: Call,
{
    for payload in payloads {
        if call.write(Message::from_prost(payload)).is_err() {
            break;
        }
    }
}

/// Wait for the single reply of a unary or client-streaming call.
/// A second reply settles the call with a protocol error.
async fn settle_single<R, K>(call: &mut K) -> Result<R, RpcError>
where
    R: prost::Message + Default,
    K: Call,
{
    let mut reply = None;
    loop {
        match call.next_event().await {
            CallEvent::Data(message) => {
                if reply.replace(message).is_some() {
                    return Err(RpcError::Protocol(
                        "more than one response on a single-response call".to_string(),
                    ));
                }
            }
            CallEvent::End => {
                let message = reply
                    .ok_or_else(|| RpcError::Protocol("call ended without a response".to_string()))?;
                return Ok(message.decode()?);
            }
            CallEvent::Error(err) => return Err(err),
        }
    }
}

/// Accumulate every reply until end; an error discards what was gathered
async fn settle_stream<R, K>(call: &mut K) -> Result<Vec<R>, RpcError>
where
    R: prost::Message + Default,
    K: Call,
{
    let mut replies = Vec::new();
    loop {
        match call.next_event().await {
            CallEvent::Data(message) => replies.push(message.decode()?),
            CallEvent::End => return Ok(replies),
            CallEvent::Error(err) => return Err(err),
        }
    }
}

pub async fn make_unary_request<C, T, R>(
    client: &ServiceClient<C>,
    method: &str,
    payload: &T,
) -> Result<R, RpcError>
where
    C: Channel,
    T: prost::Message,
    R: prost::Message + Default,
{
    let mut call = client.open(method)?;
    write_all(&mut call, [payload]);
    call.end();
    settle_single(&mut call).await
}

/// Write every payload, then end input unless `end_stream` is false.
///
/// With `end_stream` false the call only settles if the server closes it on
/// its own, e.g. by failing on a message.
pub async fn make_client_streaming_request<C, T, R>(
    client: &ServiceClient<C>,
    method: &str,
    payloads: &[T],
    end_stream: bool,
) -> Result<R, RpcError>
where
    C: Channel,
    T: prost::Message,
    R: prost::Message + Default,
{
    let mut call = client.open(method)?;
    write_all(&mut call, payloads);
    if end_stream {
        call.end();
    }
    settle_single(&mut call).await
}

pub async fn make_server_streaming_request<C, T, R>(
    client: &ServiceClient<C>,
    method: &str,
    payload: &T,
) -> Result<Vec<R>, RpcError>
where
    C: Channel,
    T: prost::Message,
    R: prost::Message + Default,
{
    let mut call = client.open(method)?;
    write_all(&mut call, [payload]);
    call.end();
    settle_stream(&mut call).await
}

/// Replies are gathered by the transport while the writes go out, and
/// returned once the server closes the call.
pub async fn make_bidi_streaming_request<C, T, R>(
    client: &ServiceClient<C>,
    method: &str,
    payloads: &[T],
) -> Result<Vec<R>, RpcError>
where
    C: Channel,
    T: prost::Message,
    R: prost::Message + Default,
{
    let mut call = client.open(method)?;
    write_all(&mut call, payloads);
    call.end();
    settle_stream(&mut call).await
}
