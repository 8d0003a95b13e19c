use async_trait::async_trait;
use futures::channel::mpsc;
use http_body_util::{BodyExt, StreamBody};
use hyper::body::{Frame, Incoming};
use hyper::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use hyper::server::conn::http2;
use hyper::service::service_fn;
use hyper::{Request, Response};
use hyper_util::rt::{TokioExecutor, TokioIo};
use std::collections::HashMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tonic::{Code, Status};
use tracing::{debug, warn};

use super::codec::{encode_frame, FrameDecoder};
use super::{BodySender, GrpcBody, GRPC_CONTENT_TYPE, GRPC_MESSAGE, GRPC_STATUS};
use crate::agent::{Agent, ServerCallRecorder};
use crate::entities::{
    CollectedRequest, Handler, Message, Metadata, MethodPath, RequestContext, Service,
};
use crate::error::HarnessError;
use crate::use_cases::ports::{Collector, Server, ServerHandle};

/// HTTP/2 gRPC server gateway
#[derive(Clone)]
pub struct Tonic {
    addr: SocketAddr,
}

impl Tonic {
    pub fn new(addr: SocketAddr) -> Self {
        Self { addr }
    }

    pub fn bind(addr: impl Into<SocketAddr>) -> Self {
        Self::new(addr.into())
    }
}

impl Default for Tonic {
    fn default() -> Self {
        Self::new(([127, 0, 0, 1], 0).into())
    }
}

/// Type-erased collector trait for internal use
trait ErasedCollector: Send + Sync {
    fn collect(&self, request: CollectedRequest);
}

impl<C: Collector> ErasedCollector for Mutex<Option<C>> {
    fn collect(&self, request: CollectedRequest) {
        if let Ok(guard) = self.lock() {
            if let Some(ref collector) = *guard {
                collector.collect(request);
            }
        }
    }
}

/// State shared with every connection
struct ServerState {
    /// Map from "/package.Service/Method" to routes
    routes: HashMap<String, Route>,
    collector: Arc<dyn ErasedCollector>,
    agent: Agent,
}

struct Route {
    path: MethodPath,
    handler: Handler,
}

impl ServerState {
    fn new(services: Vec<Service>, collector: Arc<dyn ErasedCollector>, agent: Agent) -> Self {
        let mut routes = HashMap::new();

        for service in services {
            for method in service.methods {
                let path = MethodPath::new(service.name.clone(), method.name);
                routes.insert(
                    path.path(),
                    Route {
                        path,
                        handler: method.handler,
                    },
                );
            }
        }

        Self {
            routes,
            collector,
            agent,
        }
    }
}

/// Inbound request messages of one call, decoded as body chunks arrive
struct Inbound {
    body: Incoming,
    decoder: FrameDecoder,
    ended: bool,
    path: MethodPath,
    index: usize,
    collector: Arc<dyn ErasedCollector>,
}

impl Inbound {
    fn new(body: Incoming, path: MethodPath, collector: Arc<dyn ErasedCollector>) -> Self {
        Self {
            body,
            decoder: FrameDecoder::new(),
            ended: false,
            path,
            index: 0,
            collector,
        }
    }

    async fn next(&mut self) -> Result<Option<Message>, Status> {
        loop {
            let decoded = self
                .decoder
                .decode()
                .map_err(|e| Status::new(Code::Internal, e.to_string()))?;
            if let Some(message) = decoded {
                self.collector
                    .collect(CollectedRequest::new(&self.path, self.index, message.clone()));
                self.index += 1;
                return Ok(Some(message));
            }

            if self.ended {
                self.decoder
                    .finish()
                    .map_err(|e| Status::new(Code::Internal, e.to_string()))?;
                return Ok(None);
            }

            match self.body.frame().await {
                Some(Ok(frame)) => {
                    if let Ok(data) = frame.into_data() {
                        self.decoder.extend(&data);
                    }
                }
                Some(Err(e)) => return Err(Status::new(Code::Cancelled, e.to_string())),
                None => self.ended = true,
            }
        }
    }

    /// Discard input the client still sends after the call was closed.
    /// Dropping the body early would reset the stream before the trailers
    /// are flushed.
    async fn drain(mut self) {
        while !self.ended {
            match self.body.frame().await {
                Some(Ok(_)) => {}
                Some(Err(_)) | None => self.ended = true,
            }
        }
    }

    /// The single request message of a unary or server-streaming call
    async fn single(&mut self) -> Result<Message, Status> {
        self.next()
            .await?
            .ok_or_else(|| Status::new(Code::Internal, "missing request message"))
    }
}

fn metadata_from_headers(headers: &HeaderMap) -> Metadata {
    let mut metadata = Metadata::new();
    for (name, value) in headers {
        if let Ok(value) = value.to_str() {
            metadata.insert(name.as_str(), value);
        }
    }
    metadata
}

pub(super) fn status_trailers(status: &Status) -> HeaderMap {
    let mut trailers = HeaderMap::new();
    trailers.insert(GRPC_STATUS, HeaderValue::from(i32::from(status.code())));
    if !status.message().is_empty() {
        if let Ok(message) = HeaderValue::from_str(status.message()) {
            trailers.insert(GRPC_MESSAGE, message);
        }
    }
    trailers
}

fn send(out: &BodySender, message: &Message) {
    // The client may already be gone; the call still runs to completion
    let _ = out.unbounded_send(Ok(Frame::data(encode_frame(message))));
}

async fn dispatch(
    handler: &Handler,
    ctx: &RequestContext,
    inbound: &mut Inbound,
    out: &BodySender,
) -> Result<(), Status> {
    match handler {
        Handler::Unary(f) => {
            let request = inbound.single().await?;
            send(out, &f(ctx, request)?);
        }
        Handler::ServerStreaming(f) => {
            let request = inbound.single().await?;
            for response in f(ctx, request)? {
                send(out, &response);
            }
        }
        Handler::ClientStreaming { on_message, on_end } => {
            let mut received = Vec::new();
            while let Some(message) = inbound.next().await? {
                if let Some(check) = on_message {
                    check(ctx, &message)?;
                }
                received.push(message);
            }
            send(out, &on_end(ctx, received)?);
        }
        Handler::BidiStreaming(f) => {
            while let Some(message) = inbound.next().await? {
                send(out, &f(ctx, message)?);
            }
        }
    }
    Ok(())
}

async fn run_call(
    state: Arc<ServerState>,
    path: MethodPath,
    handler: Handler,
    metadata: Metadata,
    body: Incoming,
    out: BodySender,
) {
    let recorder = ServerCallRecorder::start(&state.agent, &path, &metadata);
    let ctx = RequestContext::new(path.service.clone(), path.method.clone(), metadata);
    let mut inbound = Inbound::new(body, path.clone(), state.collector.clone());

    let status = match dispatch(&handler, &ctx, &mut inbound, &out).await {
        Ok(()) => Status::new(Code::Ok, ""),
        Err(status) => status,
    };
    debug!(
        path = %path,
        code = ?status.code(),
        messages = inbound.index,
        "call completed"
    );

    // Finished before the trailers go out, so the client never observes
    // the end of a call whose transaction is still open
    recorder.finish(&status);
    let _ = out.unbounded_send(Ok(Frame::trailers(status_trailers(&status))));
    drop(out);
    inbound.drain().await;
}

async fn handle_grpc_request(
    state: Arc<ServerState>,
    req: Request<Incoming>,
) -> Result<Response<GrpcBody>, Infallible> {
    let (out, body) = mpsc::unbounded();
    let mut response = Response::new(StreamBody::new(body));
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(GRPC_CONTENT_TYPE));

    let route = state
        .routes
        .get(req.uri().path())
        .map(|route| (route.path.clone(), route.handler.clone()));

    let Some((path, handler)) = route else {
        // Service/method not found: trailers-only response
        warn!(path = req.uri().path(), "unimplemented method");
        let headers = response.headers_mut();
        headers.insert(GRPC_STATUS, HeaderValue::from(i32::from(Code::Unimplemented)));
        headers.insert(GRPC_MESSAGE, HeaderValue::from_static("Method not found"));
        drop(out);
        return Ok(response);
    };

    debug!(path = %path, shape = ?handler.shape(), "routing call");
    let metadata = metadata_from_headers(req.headers());
    tokio::spawn(run_call(
        state.clone(),
        path,
        handler,
        metadata,
        req.into_body(),
        out,
    ));

    Ok(response)
}

#[async_trait]
impl Server for Tonic {
    async fn start<C>(
        &self,
        services: Vec<Service>,
        collector: C,
        agent: Agent,
    ) -> Result<ServerHandle<C>, HarnessError>
    where
        C: Collector + 'static,
    {
        // Wrap collector in Mutex<Option<C>> so the handle can take it out at the end
        let collector_holder: Arc<Mutex<Option<C>>> = Arc::new(Mutex::new(Some(collector)));
        let erased_collector: Arc<dyn ErasedCollector> = collector_holder.clone();

        let state = Arc::new(ServerState::new(services, erased_collector, agent));

        let listener = TcpListener::bind(self.addr)
            .await
            .map_err(|e| HarnessError::ServerError(e.to_string()))?;

        let addr = listener
            .local_addr()
            .map_err(|e| HarnessError::ServerError(e.to_string()))?;

        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    result = listener.accept() => {
                        match result {
                            Ok((stream, peer)) => {
                                debug!(%peer, "accepted connection");
                                let state = state.clone();
                                let io = TokioIo::new(stream);

                                tokio::spawn(async move {
                                    let service = service_fn(move |req| {
                                        let state = state.clone();
                                        async move { handle_grpc_request(state, req).await }
                                    });

                                    if let Err(e) = http2::Builder::new(TokioExecutor::new())
                                        .serve_connection(io, service)
                                        .await
                                    {
                                        debug!(error = %e, "connection closed with error");
                                    }
                                });
                            }
                            Err(e) => warn!(error = %e, "failed to accept connection"),
                        }
                    }
                    _ = &mut shutdown_rx => {
                        break;
                    }
                }
            }
            debug!(%addr, "server stopped");
        });

        debug!(%addr, "server listening");
        Ok(ServerHandle::new(addr, shutdown_tx, task, collector_holder))
    }
}
