use std::collections::BTreeMap;

use serde_json::Value;

use super::Destinations;

#[derive(Debug, Clone, PartialEq)]
struct Attribute {
    value: Value,
    destinations: Destinations,
}

/// Attribute map where every entry carries the destinations it may reach
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Attributes {
    entries: BTreeMap<String, Attribute>,
}

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or overwrite an attribute
    pub fn add(&mut self, destinations: Destinations, key: impl Into<String>, value: impl Into<Value>) {
        self.entries.insert(
            key.into(),
            Attribute {
                value: value.into(),
                destinations,
            },
        );
    }

    /// Attributes whose destinations intersect `mask`
    pub fn get(&self, mask: Destinations) -> BTreeMap<String, Value> {
        self.entries
            .iter()
            .filter(|(_, attr)| attr.destinations.intersects(mask))
            .map(|(key, attr)| (key.clone(), attr.value.clone()))
            .collect()
    }

    /// Raw lookup, ignoring destinations
    pub fn value(&self, key: &str) -> Option<&Value> {
        self.entries.get(key).map(|attr| &attr.value)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_get_filters_by_destination() {
        let mut attrs = Attributes::new();
        attrs.add(Destinations::TRANS_SCOPE, "request.uri", "/helloworld.Greeter/SayHello");
        attrs.add(Destinations::SPAN_EVENT, "span.only", true);

        let filtered = attrs.get(Destinations::TRANS_EVENT | Destinations::ERROR_EVENT);
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered["request.uri"], json!("/helloworld.Greeter/SayHello"));

        let spans = attrs.get(Destinations::SPAN_EVENT);
        assert_eq!(spans["span.only"], json!(true));
    }

    #[test]
    fn test_add_overwrites() {
        let mut attrs = Attributes::new();
        attrs.add(Destinations::TRANS_SCOPE, "response.status", 0);
        attrs.add(Destinations::TRANS_SCOPE, "response.status", 9);
        assert_eq!(attrs.len(), 1);
        assert_eq!(attrs.value("response.status"), Some(&json!(9)));
    }
}
