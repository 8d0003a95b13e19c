pub mod assertions;
mod create_scenario;
pub mod ports;
mod requests;

pub use create_scenario::{RunningScenario, ScenarioBuilder};
pub use requests::{
    make_bidi_streaming_request, make_client_streaming_request, make_server_streaming_request,
    make_unary_request, ServiceClient,
};
