//! Content blocks and tool-output translation.
//!
//! Tool handlers return arbitrary JSON; the protocol translates that into
//! the MCP `content` array. Pre-shaped content objects (text, image, audio,
//! embedded resource, resource link) pass through untouched, everything
//! else is rendered as a text block.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Who a content element is intended for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// Optional client annotations on a content element.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Annotations {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audience: Option<Vec<Role>>,
    /// Importance from 0.0 (optional) to 1.0 (required).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<f64>,
}

impl Annotations {
    pub fn audience(roles: Vec<Role>) -> Self {
        Self {
            audience: Some(roles),
            priority: None,
        }
    }

    pub fn with_priority(mut self, priority: f64) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.audience.is_none() && self.priority.is_none()
    }
}

/// Contents of one resource read, text or binary.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResourceContents {
    Text {
        uri: String,
        #[serde(rename = "mimeType", skip_serializing_if = "Option::is_none")]
        mime_type: Option<String>,
        text: String,
    },
    Blob {
        uri: String,
        #[serde(rename = "mimeType", skip_serializing_if = "Option::is_none")]
        mime_type: Option<String>,
        /// Base64-encoded binary data
        blob: String,
    },
}

/// One element of a `content` array, tagged by `type` per the MCP schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ContentBlock {
    #[serde(rename = "text")]
    Text {
        text: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        annotations: Option<Annotations>,
    },
    #[serde(rename = "image")]
    Image {
        /// Base64-encoded image data
        data: String,
        #[serde(rename = "mimeType")]
        mime_type: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        annotations: Option<Annotations>,
    },
    #[serde(rename = "audio")]
    Audio {
        /// Base64-encoded audio data
        data: String,
        #[serde(rename = "mimeType")]
        mime_type: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        annotations: Option<Annotations>,
    },
    #[serde(rename = "resource_link")]
    ResourceLink {
        uri: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        description: Option<String>,
        #[serde(rename = "mimeType", skip_serializing_if = "Option::is_none")]
        mime_type: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        annotations: Option<Annotations>,
    },
    #[serde(rename = "resource")]
    Resource {
        resource: ResourceContents,
        #[serde(skip_serializing_if = "Option::is_none")]
        annotations: Option<Annotations>,
    },
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text {
            text: text.into(),
            annotations: None,
        }
    }

    pub fn image(data: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self::Image {
            data: data.into(),
            mime_type: mime_type.into(),
            annotations: None,
        }
    }

    pub fn resource_link(uri: impl Into<String>) -> Self {
        Self::ResourceLink {
            uri: uri.into(),
            name: None,
            description: None,
            mime_type: None,
            annotations: None,
        }
    }
}

const CONTENT_TYPES: [&str; 5] = ["text", "image", "audio", "resource", "resource_link"];

fn is_content_shaped(map: &Map<String, Value>) -> bool {
    map.get("type")
        .and_then(Value::as_str)
        .map(|t| CONTENT_TYPES.contains(&t))
        .unwrap_or(false)
}

fn text_block(text: String) -> Value {
    serde_json::json!({ "type": "text", "text": text })
}

/// Translate a tool's return value into a `content` array.
///
/// - Pre-shaped content objects pass through as-is.
/// - Other objects become one text element whose body is pretty-printed
///   JSON.
/// - Arrays are flattened element by element.
/// - Scalars (including strings) become one text element carrying their
///   JSON encoding, so identical inputs always produce byte-identical
///   output.
pub fn tool_output_to_content(value: Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items.into_iter().flat_map(tool_output_to_content).collect(),
        Value::Object(map) => {
            if is_content_shaped(&map) {
                vec![Value::Object(map)]
            } else {
                let body = serde_json::to_string_pretty(&Value::Object(map))
                    .unwrap_or_else(|_| "{}".to_string());
                vec![text_block(body)]
            }
        }
        scalar => {
            let body = serde_json::to_string(&scalar).unwrap_or_else(|_| "null".to_string());
            vec![text_block(body)]
        }
    }
}

/// Like [`tool_output_to_content`] but stamps `annotations` onto every
/// produced element.
pub fn tool_output_to_annotated_content(value: Value, annotations: &Annotations) -> Vec<Value> {
    let mut content = tool_output_to_content(value);
    if annotations.is_empty() {
        return content;
    }
    // Annotations serialize to an object; both conversions are infallible
    // for this shape.
    let ann = serde_json::to_value(annotations).unwrap_or(Value::Null);
    for element in &mut content {
        if let Value::Object(map) = element {
            map.insert("annotations".to_string(), ann.clone());
        }
    }
    content
}
