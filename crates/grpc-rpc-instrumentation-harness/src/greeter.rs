//! A `helloworld.Greeter` service covering every call shape.
//!
//! The `SayHello*` methods greet by name; the `SayError*` methods fail with
//! [`ERR_CODE`] and [`ERR_MSG`].

use tonic::{Code, Status};

use crate::entities::{Handler, Message, Method, MethodPath, RequestContext, Service};

pub const SERVICE_NAME: &str = "helloworld.Greeter";

pub const ERR_CODE: Code = Code::FailedPrecondition;
pub const ERR_MSG: &str = "Something went wrong";

#[derive(Clone, PartialEq, prost::Message)]
pub struct HelloRequest {
    #[prost(string, tag = "1")]
    pub name: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct HelloStreamRequest {
    #[prost(string, repeated, tag = "1")]
    pub name: Vec<String>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct HelloReply {
    #[prost(string, tag = "1")]
    pub message: String,
}

impl HelloRequest {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl HelloReply {
    fn greeting(name: &str) -> Self {
        Self {
            message: format!("Hello {name}"),
        }
    }
}

/// The full method path of a greeter method
pub fn path(method: &str) -> MethodPath {
    MethodPath::new(SERVICE_NAME, method)
}

fn failure() -> Status {
    Status::new(ERR_CODE, ERR_MSG)
}

fn decode<T: prost::Message + Default>(msg: &Message) -> Result<T, Status> {
    msg.decode()
        .map_err(|e| Status::new(Code::InvalidArgument, e.to_string()))
}

fn say_hello(_: &RequestContext, req: Message) -> Result<Message, Status> {
    let req: HelloRequest = decode(&req)?;
    Ok(Message::from_prost(&HelloReply::greeting(&req.name)))
}

fn say_hello_client_stream(_: &RequestContext, reqs: Vec<Message>) -> Result<Message, Status> {
    let names = reqs
        .iter()
        .map(|msg| decode::<HelloRequest>(msg).map(|req| req.name))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Message::from_prost(&HelloReply::greeting(&names.join(", "))))
}

fn say_hello_server_stream(_: &RequestContext, req: Message) -> Result<Vec<Message>, Status> {
    let req: HelloStreamRequest = decode(&req)?;
    Ok(req
        .name
        .iter()
        .map(|name| Message::from_prost(&HelloReply::greeting(name)))
        .collect())
}

/// The greeter service with all eight methods registered
pub fn service() -> Service {
    Service::new(SERVICE_NAME).with_methods([
        Method::new("SayHello", Handler::unary(say_hello)),
        Method::new(
            "SayHelloClientStream",
            Handler::client_streaming(say_hello_client_stream),
        ),
        Method::new(
            "SayHelloServerStream",
            Handler::server_streaming(say_hello_server_stream),
        ),
        Method::new("SayHelloBidiStream", Handler::bidi_streaming(say_hello)),
        Method::new("SayError", Handler::unary(|_, _| Err(failure()))),
        Method::new(
            "SayErrorClientStream",
            Handler::client_streaming(|_, _| Err(failure())).with_message_check(|_, _| Err(failure())),
        ),
        Method::new(
            "SayErrorServerStream",
            Handler::server_streaming(|_, _| Err(failure())),
        ),
        Method::new("SayErrorBidiStream", Handler::bidi_streaming(|_, _| Err(failure()))),
    ])
}
