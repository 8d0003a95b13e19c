mod client;
mod codec;
mod server;

use futures::channel::mpsc;
use http_body_util::StreamBody;
use hyper::body::{Bytes, Frame};
use std::convert::Infallible;

pub use client::{TonicCall, TonicChannel};
pub use codec::{encode_frame, FrameDecoder, FrameError};
pub use server::Tonic;

pub(crate) const GRPC_CONTENT_TYPE: &str = "application/grpc";
pub(crate) const GRPC_STATUS: &str = "grpc-status";
pub(crate) const GRPC_MESSAGE: &str = "grpc-message";

type BodySender = mpsc::UnboundedSender<Result<Frame<Bytes>, Infallible>>;

/// Streaming HTTP/2 body used for both requests and responses
pub(crate) type GrpcBody = StreamBody<mpsc::UnboundedReceiver<Result<Frame<Bytes>, Infallible>>>;
