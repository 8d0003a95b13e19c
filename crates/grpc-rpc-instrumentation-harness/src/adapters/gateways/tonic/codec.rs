//! gRPC length-prefixed message framing.
//!
//! Every message on the wire is prefixed with 5 bytes: 1 byte compression
//! flag + 4 bytes big-endian length.

use hyper::body::Bytes;
use thiserror::Error;

use crate::entities::Message;

pub const HEADER_LEN: usize = 5;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum FrameError {
    #[error("compressed messages are not supported")]
    Compressed,

    #[error("stream ended inside a message ({0} bytes left over)")]
    Truncated(usize),
}

pub fn encode_frame(message: &Message) -> Bytes {
    let mut frame = Vec::with_capacity(HEADER_LEN + message.data.len());
    frame.push(0); // No compression
    frame.extend_from_slice(&(message.data.len() as u32).to_be_bytes());
    frame.extend_from_slice(&message.data);
    Bytes::from(frame)
}

/// Reassembles messages from arbitrarily split body chunks
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buf: Vec<u8>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extend(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    /// Pop the next complete message, if the buffer holds one
    pub fn decode(&mut self) -> Result<Option<Message>, FrameError> {
        if self.buf.len() < HEADER_LEN {
            return Ok(None);
        }
        if self.buf[0] != 0 {
            return Err(FrameError::Compressed);
        }

        let len = u32::from_be_bytes([self.buf[1], self.buf[2], self.buf[3], self.buf[4]]) as usize;
        if self.buf.len() < HEADER_LEN + len {
            return Ok(None);
        }

        let data: Vec<u8> = self.buf.drain(..HEADER_LEN + len).skip(HEADER_LEN).collect();
        Ok(Some(Message::new(data)))
    }

    /// Check that nothing is left once the body has ended
    pub fn finish(&self) -> Result<(), FrameError> {
        if self.buf.is_empty() {
            Ok(())
        } else {
            Err(FrameError::Truncated(self.buf.len()))
        }
    }
}
