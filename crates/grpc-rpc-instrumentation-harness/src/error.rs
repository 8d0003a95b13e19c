use thiserror::Error;

/// Errors that can occur while running a scenario
#[derive(Error, Debug)]
pub enum HarnessError {
    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Failure of a single RPC, as surfaced to the request adapters
#[derive(Error, Debug)]
pub enum RpcError {
    /// The peer closed the call with a non-OK gRPC status
    #[error("gRPC status {}: {}", .0.code(), .0.message())]
    Status(tonic::Status),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Decode error: {0}")]
    Decode(#[from] prost::DecodeError),
}

impl RpcError {
    /// The gRPC status carried by this error, if the peer sent one
    pub fn status(&self) -> Option<&tonic::Status> {
        match self {
            RpcError::Status(status) => Some(status),
            _ => None,
        }
    }
}

impl From<tonic::Status> for RpcError {
    fn from(status: tonic::Status) -> Self {
        RpcError::Status(status)
    }
}
