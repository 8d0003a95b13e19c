#[cfg(feature = "transport")]
mod tonic;

#[cfg(feature = "transport")]
pub use self::tonic::{
    encode_frame, FrameDecoder, FrameError, Tonic, TonicCall, TonicChannel,
};
