//! Opaque cursor pagination for the list methods.
//!
//! Cursors encode an offset. They are opaque to clients and stable across
//! calls that do not mutate the underlying list.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde_json::{Map, Value};

use crate::{McpError, McpResult};

/// Default page size for `tools/list`, `resources/list`,
/// `resources/templates/list`, `prompts/list`, and `tasks/list`.
pub const DEFAULT_PAGE_SIZE: usize = 100;

pub fn encode_cursor(offset: usize) -> String {
    URL_SAFE_NO_PAD.encode(format!("offset:{}", offset))
}

pub fn decode_cursor(cursor: &str) -> Option<usize> {
    let decoded = URL_SAFE_NO_PAD.decode(cursor).ok()?;
    let text = String::from_utf8(decoded).ok()?;
    text.strip_prefix("offset:")?.parse().ok()
}

/// Slice `items` into one page and wrap it as `{<key>: [...], nextCursor?}`.
pub fn paginate(
    items: Vec<Value>,
    key: &str,
    cursor: Option<&str>,
    page_size: usize,
) -> McpResult<Value> {
    let offset = match cursor {
        Some(cursor) => decode_cursor(cursor)
            .ok_or_else(|| McpError::InvalidParams(format!("Invalid cursor: {}", cursor)))?,
        None => 0,
    };

    let total = items.len();
    let page: Vec<Value> = items.into_iter().skip(offset).take(page_size).collect();

    let mut result = Map::new();
    result.insert(key.to_string(), Value::Array(page));
    if offset + page_size < total {
        result.insert(
            "nextCursor".to_string(),
            Value::String(encode_cursor(offset + page_size)),
        );
    }
    Ok(Value::Object(result))
}
