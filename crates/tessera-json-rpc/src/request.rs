use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::types::{JsonRpcVersion, RequestId};

/// Parameters of a request or notification. MCP methods always use named
/// parameters, but positional arrays are still legal JSON-RPC.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestParams {
    Object(Map<String, Value>),
    Array(Vec<Value>),
}

impl RequestParams {
    /// Get a named parameter (object params only).
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            RequestParams::Object(map) => map.get(key),
            RequestParams::Array(_) => None,
        }
    }

    /// Borrow the named-parameter map, if this is one.
    pub fn as_object(&self) -> Option<&Map<String, Value>> {
        match self {
            RequestParams::Object(map) => Some(map),
            RequestParams::Array(_) => None,
        }
    }

    /// Clone into an owned map; array params become indexed keys.
    pub fn into_map(self) -> Map<String, Value> {
        match self {
            RequestParams::Object(map) => map,
            RequestParams::Array(vec) => vec
                .into_iter()
                .enumerate()
                .map(|(i, v)| (i.to_string(), v))
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            RequestParams::Object(map) => map.is_empty(),
            RequestParams::Array(vec) => vec.is_empty(),
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            RequestParams::Object(map) => Value::Object(map.clone()),
            RequestParams::Array(vec) => Value::Array(vec.clone()),
        }
    }
}

impl From<Map<String, Value>> for RequestParams {
    fn from(map: Map<String, Value>) -> Self {
        RequestParams::Object(map)
    }
}

/// A JSON-RPC request (has an id, expects a response).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    #[serde(rename = "jsonrpc")]
    pub version: JsonRpcVersion,
    pub id: RequestId,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<RequestParams>,
}

impl JsonRpcRequest {
    pub fn new(id: impl Into<RequestId>, method: impl Into<String>) -> Self {
        Self {
            version: JsonRpcVersion::V2_0,
            id: id.into(),
            method: method.into(),
            params: None,
        }
    }

    pub fn with_params(mut self, params: impl Into<RequestParams>) -> Self {
        self.params = Some(params.into());
        self
    }

    /// Get a named parameter, treating absent `params` as empty.
    pub fn param(&self, name: &str) -> Option<&Value> {
        self.params.as_ref()?.get(name)
    }

    /// The request's named parameters as an owned map (empty if absent or
    /// positional).
    pub fn params_map(&self) -> Map<String, Value> {
        match &self.params {
            Some(RequestParams::Object(map)) => map.clone(),
            _ => Map::new(),
        }
    }
}
