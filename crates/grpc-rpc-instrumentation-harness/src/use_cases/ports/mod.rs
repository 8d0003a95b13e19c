mod channel;
mod collector;
mod server;

pub use channel::{Call, CallEvent, Channel};
pub use collector::Collector;
pub use server::{Server, ServerHandle};
