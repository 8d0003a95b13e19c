use bitflags::bitflags;

bitflags! {
    /// Bitmask of the places an attribute may be reported to
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Destinations: u8 {
        const TRANS_EVENT = 0b0000_0001;
        const TRANS_TRACE = 0b0000_0010;
        const ERROR_EVENT = 0b0000_0100;
        const BROWSER_EVENT = 0b0000_1000;
        const SPAN_EVENT = 0b0001_0000;
        const TRANS_SEGMENT = 0b0010_0000;

        /// Transaction events, transaction traces and error events
        const TRANS_SCOPE = Self::TRANS_EVENT.bits() | Self::TRANS_TRACE.bits() | Self::ERROR_EVENT.bits();
        /// Span events and segments
        const SEGMENT_SCOPE = Self::SPAN_EVENT.bits() | Self::TRANS_SEGMENT.bits();
    }
}
