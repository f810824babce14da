//! Service record: what a reference is bound to.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use url::Url;

/// Kind of service a record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ServiceKind {
    HttpEndpoint,
    EventBus,
}

/// Descriptive metadata of a discovered service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    pub name: String,
    pub kind: ServiceKind,
    /// Base URL for HTTP endpoints, address for event bus services.
    pub location: String,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

impl Record {
    pub fn http_endpoint(name: impl Into<String>, base: &Url) -> Self {
        Self {
            name: name.into(),
            kind: ServiceKind::HttpEndpoint,
            location: base.to_string(),
            metadata: Map::new(),
        }
    }

    pub fn event_bus(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ServiceKind::EventBus,
            location: address.into(),
            metadata: Map::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_json() {
        let base = Url::parse("http://127.0.0.1:3000/api/").unwrap();
        let record = Record::http_endpoint("inventory", &base).with_metadata("zone", "eu-1");

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["kind"], "http-endpoint");
        assert_eq!(json["location"], "http://127.0.0.1:3000/api/");
        assert_eq!(json["metadata"]["zone"], "eu-1");

        let back: Record = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_metadata_optional() {
        let record: Record = serde_json::from_value(serde_json::json!({
            "name": "audit",
            "kind": "event-bus",
            "location": "audit.log",
        }))
        .unwrap();
        assert_eq!(record, Record::event_bus("audit", "audit.log"));
    }
}
