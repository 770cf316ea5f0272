//! Queue messages.

use crate::subpipeline::MessageAttributes;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A message received from a queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Queue-assigned message ID.
    pub id: String,
    /// Handle needed to delete this delivery.
    pub receipt_handle: String,
    /// Raw body.
    pub body: String,
    /// String message attributes.
    #[serde(default)]
    pub attributes: HashMap<String, String>,
}

impl Message {
    /// Creates a message without attributes.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        receipt_handle: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            receipt_handle: receipt_handle.into(),
            body: body.into(),
            attributes: HashMap::new(),
        }
    }

    /// Adds an attribute.
    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Parses the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_str(&self.body)
    }

    /// Returns the delete entry for this delivery.
    #[must_use]
    pub fn delete_entry(&self) -> DeleteEntry {
        DeleteEntry {
            id: self.id.clone(),
            receipt_handle: self.receipt_handle.clone(),
        }
    }
}

impl MessageAttributes for Message {
    fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }
}

/// One entry of a batch delete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteEntry {
    /// The message ID.
    pub id: String,
    /// The receipt handle of the delivery.
    pub receipt_handle: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Order {
        id: u32,
    }

    #[test]
    fn test_message_attributes() {
        let message = Message::new("m-1", "r-1", "{}").with_attribute("type", "order");
        assert_eq!(message.attribute("type"), Some("order"));
        assert_eq!(message.attribute("missing"), None);
    }

    #[test]
    fn test_json_body() {
        let message = Message::new("m-1", "r-1", r#"{"id": 7}"#);
        assert_eq!(message.json::<Order>().expect("valid json"), Order { id: 7 });
        assert!(Message::new("m-2", "r-2", "not json").json::<Order>().is_err());
    }

    #[test]
    fn test_delete_entry() {
        let entry = Message::new("m-1", "r-1", "").delete_entry();
        assert_eq!(entry, DeleteEntry { id: "m-1".into(), receipt_handle: "r-1".into() });
    }
}
