use std::net::SocketAddr;

use crate::agent::Agent;
use crate::entities::{Scenario, Service};
use crate::error::HarnessError;
use crate::use_cases::ports::{Collector, Server, ServerHandle};

#[cfg(feature = "transport")]
use crate::adapters::gateways::TonicChannel;
#[cfg(feature = "transport")]
use crate::use_cases::ServiceClient;

/// Builder for creating scenarios with a fluent API
///
/// # Example
///
/// ```rust,no_run
/// use grpc_rpc_instrumentation_harness::prelude::*;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let scenario = ScenarioBuilder::new()
///         .server(Tonic::default())
///         .collector(DefaultCollector::new())
///         .agent(Agent::default())
///         .service(greeter::service())
///         .start()
///         .await?;
///
///     let client = scenario.client(greeter::SERVICE_NAME);
///     let reply: HelloReply = make_unary_request(
///         &client,
///         "SayHello",
///         &HelloRequest { name: "Bob".into() },
///     )
///     .await?;
///     assert_eq!(reply.message, "Hello Bob");
///
///     let collected = scenario.shutdown().await?;
///     assert_eq!(collected.len(), 1);
///     Ok(())
/// }
/// ```
pub struct ScenarioBuilder<S, C> {
    server: Option<S>,
    collector: Option<C>,
    agent: Option<Agent>,
    services: Vec<Service>,
}

impl ScenarioBuilder<(), ()> {
    /// Create a new scenario builder
    pub fn new() -> Self {
        Self {
            server: None,
            collector: None,
            agent: None,
            services: Vec::new(),
        }
    }
}

impl Default for ScenarioBuilder<(), ()> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S, C> ScenarioBuilder<S, C> {
    /// Set the server implementation to use
    pub fn server<NewS: Server>(self, server: NewS) -> ScenarioBuilder<NewS, C> {
        ScenarioBuilder {
            server: Some(server),
            collector: self.collector,
            agent: self.agent,
            services: self.services,
        }
    }

    /// Set the collector to use
    pub fn collector<NewC: Collector>(self, collector: NewC) -> ScenarioBuilder<S, NewC> {
        ScenarioBuilder {
            server: self.server,
            collector: Some(collector),
            agent: self.agent,
            services: self.services,
        }
    }

    /// Set the agent that records the server's transactions.
    /// Defaults to an agent with the default configuration.
    pub fn agent(mut self, agent: Agent) -> Self {
        self.agent = Some(agent);
        self
    }

    /// Add a service to the scenario
    pub fn service(mut self, service: Service) -> Self {
        self.services.push(service);
        self
    }

    /// Add multiple services to the scenario
    pub fn services(mut self, services: impl IntoIterator<Item = Service>) -> Self {
        self.services.extend(services);
        self
    }
}

impl<S: Server + 'static, C: Collector + 'static> ScenarioBuilder<S, C> {
    /// Build the scenario
    pub fn build(self) -> Result<Scenario<S, C>, HarnessError> {
        let server = self.server.ok_or_else(|| {
            HarnessError::ConfigurationError("Server must be set before building".to_string())
        })?;
        let collector = self.collector.ok_or_else(|| {
            HarnessError::ConfigurationError("Collector must be set before building".to_string())
        })?;

        Ok(Scenario {
            server,
            collector,
            agent: self.agent.unwrap_or_default(),
            services: self.services,
        })
    }

    /// Start the scenario directly from the builder
    pub async fn start(self) -> Result<RunningScenario<C>, HarnessError> {
        self.build()?.start().await
    }
}

impl<S: Server + 'static, C: Collector + 'static> Scenario<S, C> {
    /// Start the scenario's server.
    ///
    /// Returns once the server is accepting connections.
    pub async fn start(self) -> Result<RunningScenario<C>, HarnessError> {
        let handle = self
            .server
            .start(self.services, self.collector, self.agent.clone())
            .await?;

        Ok(RunningScenario {
            handle,
            agent: self.agent,
        })
    }
}

/// A started scenario: the server is up until `shutdown` or drop
pub struct RunningScenario<C: Collector> {
    handle: ServerHandle<C>,
    agent: Agent,
}

impl<C: Collector> RunningScenario<C> {
    pub fn addr(&self) -> SocketAddr {
        self.handle.addr()
    }

    pub fn agent(&self) -> &Agent {
        &self.agent
    }

    /// A client for `service` on this scenario's server
    #[cfg(feature = "transport")]
    pub fn client(&self, service: impl Into<String>) -> ServiceClient<TonicChannel> {
        ServiceClient::new(TonicChannel::connect(self.addr()), service)
    }

    /// Stop the server and return the collector's output
    pub async fn shutdown(self) -> Result<C::Output, HarnessError> {
        self.handle.shutdown().await
    }
}
