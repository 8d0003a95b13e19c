use std::time::Duration;

use super::Attributes;

/// A timed node in a transaction trace
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub name: String,
    /// 16 hex characters, used as the W3C parent id for outbound calls
    pub span_id: String,
    pub duration: Duration,
    pub attributes: Attributes,
    pub children: Vec<Segment>,
}

impl Segment {
    pub fn new(name: impl Into<String>, span_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            span_id: span_id.into(),
            duration: Duration::ZERO,
            attributes: Attributes::new(),
            children: Vec::new(),
        }
    }

    /// Depth-first search for a segment by name, including `self`
    pub fn find(&self, name: &str) -> Option<&Segment> {
        if self.name == name {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(name))
    }

    /// All segments below this one, depth first
    pub fn descendants(&self) -> Vec<&Segment> {
        let mut out = Vec::new();
        for child in &self.children {
            out.push(child);
            out.extend(child.descendants());
        }
        out
    }
}
