//! gRPC RPC Instrumentation Harness
//!
//! Drives real gRPC calls of all four shapes (unary, client streaming,
//! server streaming, bidirectional) through an instrumented server and
//! client, and asserts on what an APM agent recorded for them:
//! transaction names, attributes, metrics, external segments and
//! distributed tracing headers.
//!
//! # Example
//!
//! ```rust,no_run
//! use grpc_rpc_instrumentation_harness::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let agent = Agent::new(AgentConfig::default());
//!     let scenario = ScenarioBuilder::new()
//!         .server(Tonic::default())
//!         .collector(DefaultCollector::new())
//!         .agent(agent.clone())
//!         .service(greeter::service())
//!         .start()
//!         .await?;
//!
//!     let client = scenario.client(greeter::SERVICE_NAME);
//!     let replies: Vec<HelloReply> = make_bidi_streaming_request(
//!         &client,
//!         "SayHelloBidiStream",
//!         &[HelloRequest::new("Bob"), HelloRequest::new("Jordi")],
//!     )
//!     .await?;
//!     assert_eq!(replies.len(), 2);
//!
//!     let path = greeter::path("SayHelloBidiStream");
//!     let tx = agent
//!         .find_transaction(&server_transaction_name(&path))
//!         .expect("server transaction");
//!     assert_server_transaction(&tx, &path, Code::Ok);
//!     assert_server_metrics(&agent.metrics(), &path, Code::Ok);
//!
//!     scenario.shutdown().await?;
//!     Ok(())
//! }
//! ```

mod adapters;
pub mod agent;
pub mod config;
pub mod entities;
pub mod error;
pub mod greeter;
pub mod use_cases;

pub use agent::Agent;
pub use config::AgentConfig;
pub use error::{HarnessError, RpcError};

#[cfg(feature = "transport")]
pub use adapters::gateways::{
    encode_frame, FrameDecoder, FrameError, Tonic, TonicCall, TonicChannel,
};

/// Default collector implementation that collects requests into a Vec
pub struct DefaultCollector {
    requests: std::sync::Mutex<Vec<entities::CollectedRequest>>,
}

impl DefaultCollector {
    pub fn new() -> Self {
        Self {
            requests: std::sync::Mutex::new(Vec::new()),
        }
    }
}

impl Default for DefaultCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl use_cases::ports::Collector for DefaultCollector {
    type Output = Vec<entities::CollectedRequest>;

    fn collect(&self, request: entities::CollectedRequest) {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request);
        }
    }

    fn into_output(self) -> Self::Output {
        self.requests.into_inner().unwrap_or_default()
    }
}

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::agent::naming::{
        custom_transaction_name, external_segment_name, server_transaction_name,
    };
    pub use crate::agent::{current_transaction, Agent};
    pub use crate::config::AgentConfig;
    pub use crate::entities::{
        CollectedRequest, Destinations, Handler, Message, Metadata, Method, MethodPath,
        RequestContext, Service, Transaction, TransactionKind,
    };
    pub use crate::error::{HarnessError, RpcError};
    pub use crate::greeter::{self, HelloReply, HelloRequest, HelloStreamRequest};
    pub use crate::use_cases::assertions::*;
    pub use crate::use_cases::ports::{Channel, Collector};
    pub use crate::use_cases::{
        make_bidi_streaming_request, make_client_streaming_request, make_server_streaming_request,
        make_unary_request, RunningScenario, ScenarioBuilder, ServiceClient,
    };
    pub use crate::DefaultCollector;
    pub use tonic::{Code, Status};

    #[cfg(feature = "transport")]
    pub use crate::{Tonic, TonicChannel};
}
