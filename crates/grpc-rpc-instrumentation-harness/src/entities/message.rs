use std::collections::BTreeMap;

/// Represents a gRPC message (request or response)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub data: Vec<u8>,
}

impl Message {
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self { data: data.into() }
    }

    pub fn empty() -> Self {
        Self { data: Vec::new() }
    }

    pub fn from_prost<T: prost::Message>(msg: &T) -> Self {
        Self {
            data: msg.encode_to_vec(),
        }
    }

    pub fn decode<T: prost::Message + Default>(&self) -> Result<T, prost::DecodeError> {
        T::decode(self.data.as_slice())
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl From<Vec<u8>> for Message {
    fn from(data: Vec<u8>) -> Self {
        Self::new(data)
    }
}

impl From<Message> for Vec<u8> {
    fn from(msg: Message) -> Self {
        msg.data
    }
}

/// Call metadata (HTTP/2 headers), keyed by lowercase name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    entries: BTreeMap<String, String>,
}

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl AsRef<str>, value: impl Into<String>) {
        self.entries
            .insert(key.as_ref().to_ascii_lowercase(), value.into());
    }

    pub fn with(mut self, key: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .get(&key.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
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

    #[derive(Clone, PartialEq, prost::Message)]
    struct Probe {
        #[prost(string, tag = "1")]
        name: String,
    }

    #[test]
    fn test_message_new() {
        let msg = Message::new(vec![1, 2, 3]);
        assert_eq!(msg.data, vec![1, 2, 3]);
    }

    #[test]
    fn test_message_empty() {
        let msg = Message::empty();
        assert!(msg.is_empty());
    }

    #[test]
    fn test_message_prost_decode() {
        let msg = Message::from_prost(&Probe {
            name: "Bob".to_string(),
        });
        let probe: Probe = msg.decode().unwrap();
        assert_eq!(probe.name, "Bob");
    }

    #[test]
    fn test_message_into_vec() {
        let msg = Message::new(vec![1, 2, 3]);
        let data: Vec<u8> = msg.into();
        assert_eq!(data, vec![1, 2, 3]);
    }

    #[test]
    fn test_metadata_keys_are_lowercased() {
        let metadata = Metadata::new().with("TraceParent", "00-abc");
        assert_eq!(metadata.get("traceparent"), Some("00-abc"));
        assert_eq!(metadata.get("TRACEPARENT"), Some("00-abc"));
        assert_eq!(metadata.len(), 1);
    }

    #[test]
    fn test_metadata_keeps_empty_values() {
        let metadata = Metadata::new().with("newrelic", "");
        assert_eq!(metadata.get("newrelic"), Some(""));
    }
}
