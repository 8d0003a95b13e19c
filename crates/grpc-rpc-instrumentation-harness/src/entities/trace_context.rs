use std::fmt;

/// Length of a version-00 `traceparent` header value
pub const TRACEPARENT_LEN: usize = 55;

/// W3C `traceparent` header: `00-<trace id>-<parent id>-<flags>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceParent {
    pub trace_id: String,
    pub parent_id: String,
    pub sampled: bool,
}

impl TraceParent {
    pub fn new(trace_id: impl Into<String>, parent_id: impl Into<String>, sampled: bool) -> Self {
        Self {
            trace_id: trace_id.into(),
            parent_id: parent_id.into(),
            sampled,
        }
    }

    pub fn parse(header: &str) -> Option<Self> {
        let mut parts = header.trim().split('-');
        let version = parts.next()?;
        let trace_id = parts.next()?;
        let parent_id = parts.next()?;
        let flags = parts.next()?;

        if parts.next().is_some()
            || version != "00"
            || !is_lower_hex(trace_id, 32)
            || !is_lower_hex(parent_id, 16)
            || !is_lower_hex(flags, 2)
            || trace_id.bytes().all(|b| b == b'0')
            || parent_id.bytes().all(|b| b == b'0')
        {
            return None;
        }

        let flags = u8::from_str_radix(flags, 16).ok()?;
        Some(Self::new(trace_id, parent_id, flags & 0x01 == 0x01))
    }
}

impl fmt::Display for TraceParent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let flags = if self.sampled { "01" } else { "00" };
        write!(f, "00-{}-{}-{}", self.trace_id, self.parent_id, flags)
    }
}

/// Loose shape check: 55 characters drawn from `[A-Za-z0-9_-]`
pub fn is_traceparent_shaped(value: &str) -> bool {
    value.len() == TRACEPARENT_LEN
        && value
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}

fn is_lower_hex(s: &str, len: usize) -> bool {
    s.len() == len && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}
