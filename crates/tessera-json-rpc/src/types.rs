use serde::{Deserialize, Serialize};
use std::fmt;

/// The `"jsonrpc"` field. Serializes as the literal `"2.0"` and refuses
/// anything else on deserialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum JsonRpcVersion {
    #[serde(rename = "2.0")]
    #[default]
    V2_0,
}

/// A JSON-RPC request id: string or integer, unique per client session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    Number(i64),
    String(String),
}

impl RequestId {
    /// Canonical string form, used as a map key for in-flight tracking and
    /// pending server→client futures.
    pub fn as_key(&self) -> String {
        match self {
            RequestId::Number(n) => n.to_string(),
            RequestId::String(s) => s.clone(),
        }
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestId::Number(n) => write!(f, "{}", n),
            RequestId::String(s) => write!(f, "{}", s),
        }
    }
}

impl From<i64> for RequestId {
    fn from(n: i64) -> Self {
        RequestId::Number(n)
    }
}

impl From<&str> for RequestId {
    fn from(s: &str) -> Self {
        RequestId::String(s.to_string())
    }
}

impl From<String> for RequestId {
    fn from(s: String) -> Self {
        RequestId::String(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{from_str, from_value, json, to_string};

    #[test]
    fn test_version_round_trip() {
        let v = JsonRpcVersion::V2_0;
        assert_eq!(to_string(&v).unwrap(), "\"2.0\"");
        assert!(from_str::<JsonRpcVersion>("\"1.0\"").is_err());
    }

    #[test]
    fn test_request_id_untagged() {
        assert_eq!(from_value::<RequestId>(json!(7)).unwrap(), RequestId::Number(7));
        assert_eq!(
            from_value::<RequestId>(json!("req-1")).unwrap(),
            RequestId::String("req-1".to_string())
        );
    }

    #[test]
    fn test_request_id_key() {
        assert_eq!(RequestId::Number(42).as_key(), "42");
        assert_eq!(RequestId::from("abc").as_key(), "abc");
    }
}
