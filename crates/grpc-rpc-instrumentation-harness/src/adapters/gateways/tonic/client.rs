use async_trait::async_trait;
use futures::channel::mpsc;
use http_body_util::{BodyExt, StreamBody};
use hyper::body::Frame;
use hyper::header::{HeaderMap, CONTENT_TYPE, TE};
use hyper::Request;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use std::net::SocketAddr;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tonic::{Code, Status};
use tracing::debug;

use super::codec::{encode_frame, FrameDecoder};
use super::{BodySender, GrpcBody, GRPC_CONTENT_TYPE, GRPC_MESSAGE, GRPC_STATUS};
use crate::agent::ExternalCallRecorder;
use crate::entities::{Message, Metadata, MethodPath};
use crate::error::RpcError;
use crate::use_cases::ports::{Call, CallEvent, Channel};

/// HTTP/2 gRPC client channel.
///
/// Calls opened inside a transaction (see `Agent::in_transaction`) are
/// recorded as external segments of that transaction.
#[derive(Clone)]
pub struct TonicChannel {
    host: String,
    port: u16,
    client: Client<HttpConnector, GrpcBody>,
}

impl TonicChannel {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        let client = Client::builder(TokioExecutor::new())
            .http2_only(true)
            .build_http();

        Self {
            host: host.into(),
            port,
            client,
        }
    }

    pub fn connect(addr: SocketAddr) -> Self {
        Self::new(addr.ip().to_string(), addr.port())
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

impl std::fmt::Debug for TonicChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TonicChannel")
            .field("host", &self.host)
            .field("port", &self.port)
            .finish()
    }
}

impl Channel for TonicChannel {
    type Call = TonicCall;

    fn open(&self, path: &MethodPath, mut metadata: Metadata) -> Result<TonicCall, RpcError> {
        let recorder = ExternalCallRecorder::start(&self.host, self.port, path, &mut metadata);
        let (body_tx, body_rx) = mpsc::unbounded();

        let mut builder = Request::builder()
            .method(hyper::Method::POST)
            .uri(format!("http://{}:{}{}", self.host, self.port, path))
            .header(CONTENT_TYPE, GRPC_CONTENT_TYPE)
            .header(TE, "trailers");
        for (key, value) in metadata.iter() {
            builder = builder.header(key, value);
        }

        let request = match builder.body(StreamBody::new(body_rx)) {
            Ok(request) => request,
            Err(e) => {
                let err = RpcError::Transport(e.to_string());
                if let Some(recorder) = recorder {
                    recorder.finish(&status_of(&err));
                }
                return Err(err);
            }
        };

        let (events_tx, events_rx) = unbounded_channel();
        tokio::spawn(drive_call(
            self.client.clone(),
            request,
            events_tx,
            recorder,
            path.clone(),
        ));

        Ok(TonicCall {
            body_tx: Some(body_tx),
            events: events_rx,
            settled: false,
        })
    }
}

/// Handle to one call opened on a [`TonicChannel`]
pub struct TonicCall {
    body_tx: Option<BodySender>,
    events: UnboundedReceiver<CallEvent>,
    settled: bool,
}

#[async_trait]
impl Call for TonicCall {
    fn write(&mut self, message: Message) -> Result<(), RpcError> {
        let body_tx = self
            .body_tx
            .as_ref()
            .ok_or_else(|| RpcError::Protocol("write after end of input".to_string()))?;
        body_tx
            .unbounded_send(Ok(Frame::data(encode_frame(&message))))
            .map_err(|_| RpcError::Transport("call closed by peer".to_string()))
    }

    fn end(&mut self) {
        self.body_tx.take();
    }

    async fn next_event(&mut self) -> CallEvent {
        if self.settled {
            return CallEvent::Error(RpcError::Protocol("call already settled".to_string()));
        }
        let event = self
            .events
            .recv()
            .await
            .unwrap_or_else(|| CallEvent::Error(RpcError::Transport("call dropped".to_string())));
        if event.is_terminal() {
            self.settled = true;
        }
        event
    }
}

fn status_from_headers(headers: &HeaderMap) -> Option<Status> {
    let code = headers.get(GRPC_STATUS)?.to_str().ok()?.parse::<i32>().ok()?;
    let message = headers
        .get(GRPC_MESSAGE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    Some(Status::new(Code::from_i32(code), message))
}

/// Status recorded on the external segment for a failed call
fn status_of(err: &RpcError) -> Status {
    match err {
        RpcError::Status(status) => status.clone(),
        RpcError::Transport(message) => Status::new(Code::Unavailable, message.clone()),
        other => Status::new(Code::Internal, other.to_string()),
    }
}

async fn read_response(
    client: Client<HttpConnector, GrpcBody>,
    request: Request<GrpcBody>,
    events: &UnboundedSender<CallEvent>,
) -> Result<(), RpcError> {
    let response = client
        .request(request)
        .await
        .map_err(|e| RpcError::Transport(e.to_string()))?;

    if !response.status().is_success() {
        return Err(RpcError::Transport(format!(
            "unexpected HTTP status {}",
            response.status()
        )));
    }

    let header_status = status_from_headers(response.headers());
    let mut body = response.into_body();
    let mut decoder = FrameDecoder::new();
    let mut trailer_status = None;

    while let Some(frame) = body.frame().await {
        let frame = frame.map_err(|e| RpcError::Transport(e.to_string()))?;
        match frame.into_data() {
            Ok(data) => {
                decoder.extend(&data);
                while let Some(message) = decoder
                    .decode()
                    .map_err(|e| RpcError::Protocol(e.to_string()))?
                {
                    let _ = events.send(CallEvent::Data(message));
                }
            }
            Err(frame) => {
                if let Ok(trailers) = frame.into_trailers() {
                    trailer_status = status_from_headers(&trailers);
                }
            }
        }
    }

    decoder
        .finish()
        .map_err(|e| RpcError::Protocol(e.to_string()))?;

    let status = trailer_status
        .or(header_status)
        .ok_or_else(|| RpcError::Protocol("missing grpc-status".to_string()))?;

    if status.code() == Code::Ok {
        Ok(())
    } else {
        Err(RpcError::Status(status))
    }
}

async fn drive_call(
    client: Client<HttpConnector, GrpcBody>,
    request: Request<GrpcBody>,
    events: UnboundedSender<CallEvent>,
    recorder: Option<ExternalCallRecorder>,
    path: MethodPath,
) {
    let outcome = read_response(client, request, &events).await;

    // The segment is closed before the terminal event is delivered
    if let Some(recorder) = recorder {
        let status = match &outcome {
            Ok(()) => Status::new(Code::Ok, ""),
            Err(err) => status_of(err),
        };
        recorder.finish(&status);
    }

    let terminal = match outcome {
        Ok(()) => CallEvent::End,
        Err(err) => {
            debug!(path = %path, error = %err, "call failed");
            CallEvent::Error(err)
        }
    };
    let _ = events.send(terminal);
}
