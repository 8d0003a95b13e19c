use super::{Message, MethodPath};

/// A request message received by the test server
#[derive(Debug, Clone)]
pub struct CollectedRequest {
    pub service: String,
    pub method: String,
    /// Zero-based position of the message within its call
    pub index: usize,
    pub message: Message,
}

impl CollectedRequest {
    pub fn new(path: &MethodPath, index: usize, message: Message) -> Self {
        Self {
            service: path.service.clone(),
            method: path.method.clone(),
            index,
            message,
        }
    }
}
