use crate::agent::Agent;
use crate::entities::Service;

/// A test scenario: server gateway, request collector, agent and services
pub struct Scenario<S, C> {
    pub(crate) server: S,
    pub(crate) collector: C,
    pub(crate) agent: Agent,
    pub(crate) services: Vec<Service>,
}
