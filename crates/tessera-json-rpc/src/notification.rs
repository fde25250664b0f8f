use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::request::RequestParams;
use crate::types::JsonRpcVersion;

/// A JSON-RPC notification: a request without an id. Processed for side
/// effects only; never answered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcNotification {
    #[serde(rename = "jsonrpc")]
    pub version: JsonRpcVersion,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<RequestParams>,
}

impl JsonRpcNotification {
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            version: JsonRpcVersion::V2_0,
            method: method.into(),
            params: None,
        }
    }

    pub fn with_params(mut self, params: Map<String, Value>) -> Self {
        self.params = Some(RequestParams::Object(params));
        self
    }

    pub fn param(&self, name: &str) -> Option<&Value> {
        self.params.as_ref()?.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{from_str, json, to_string};

    #[test]
    fn test_notification_has_no_id() {
        let notification = JsonRpcNotification::new("notifications/initialized");
        let json_str = to_string(&notification).unwrap();

        assert!(!json_str.contains("\"id\""));
        assert!(json_str.contains("\"jsonrpc\":\"2.0\""));
        assert!(json_str.contains("\"method\":\"notifications/initialized\""));
    }

    #[test]
    fn test_notification_params() {
        let mut params = Map::new();
        params.insert("requestId".to_string(), json!(3));
        let notification = JsonRpcNotification::new("notifications/cancelled").with_params(params);

        let parsed: JsonRpcNotification = from_str(&to_string(&notification).unwrap()).unwrap();
        assert_eq!(parsed.param("requestId"), Some(&json!(3)));
    }
}
