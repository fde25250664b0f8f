//! Prompt message types and output translation.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One message of a prompt result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptMessage {
    pub role: String,
    pub content: Value,
}

impl PromptMessage {
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: serde_json::json!({ "type": "text", "text": text.into() }),
        }
    }
}

fn wrap_user_message(content: Value) -> Value {
    serde_json::json!({ "role": "user", "content": content })
}

/// Translate a prompt handler's return value into the `messages` array of
/// a `prompts/get` result.
///
/// - A string becomes a single user text message.
/// - A list is taken as the messages array as supplied.
/// - An object with a `messages` key is unwrapped.
/// - An object with a `role` key is a single pre-shaped message.
/// - Any other object is wrapped as one user message whose content is
///   that object.
pub fn prompt_output_to_messages(output: Value) -> Vec<Value> {
    match output {
        Value::String(text) => {
            vec![wrap_user_message(
                serde_json::json!({ "type": "text", "text": text }),
            )]
        }
        Value::Array(messages) => messages,
        Value::Object(map) => {
            if let Some(Value::Array(messages)) = map.get("messages") {
                return messages.clone();
            }
            if map.contains_key("role") {
                return vec![Value::Object(map)];
            }
            vec![wrap_user_message(Value::Object(map))]
        }
        other => {
            // Scalar fallback: render as text.
            let text = serde_json::to_string(&other).unwrap_or_else(|_| "null".to_string());
            vec![wrap_user_message(
                serde_json::json!({ "type": "text", "text": text }),
            )]
        }
    }
}

/// Wire descriptor for one declared prompt argument.
pub fn prompt_argument_descriptor(
    name: &str,
    description: Option<&str>,
    required: bool,
) -> Value {
    let mut descriptor = Map::new();
    descriptor.insert("name".to_string(), Value::String(name.to_string()));
    if let Some(description) = description {
        descriptor.insert(
            "description".to_string(),
            Value::String(description.to_string()),
        );
    }
    descriptor.insert("required".to_string(), Value::Bool(required));
    Value::Object(descriptor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_string_becomes_user_message() {
        let messages = prompt_output_to_messages(json!("Review this code"));
        assert_eq!(
            messages,
            vec![json!({
                "role": "user",
                "content": {"type": "text", "text": "Review this code"}
            })]
        );
    }

    #[test]
    fn test_message_list_passes_through() {
        let supplied = json!([
            {"role": "user", "content": {"type": "text", "text": "a"}},
            {"role": "assistant", "content": {"type": "text", "text": "b"}}
        ]);
        let messages = prompt_output_to_messages(supplied.clone());
        assert_eq!(Value::Array(messages), supplied);
    }

    #[test]
    fn test_messages_object_unwrapped() {
        let messages = prompt_output_to_messages(json!({
            "messages": [{"role": "user", "content": {"type": "text", "text": "hi"}}]
        }));
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0]["role"], "user");
    }

    #[test]
    fn test_object_with_role_is_single_message() {
        let message = json!({"role": "assistant", "content": {"type": "text", "text": "ok"}});
        let messages = prompt_output_to_messages(message.clone());
        assert_eq!(messages, vec![message]);
    }

    #[test]
    fn test_roleless_object_wrapped_as_user_content() {
        let messages = prompt_output_to_messages(json!({"type": "text", "text": "raw"}));
        assert_eq!(messages[0]["role"], "user");
        assert_eq!(messages[0]["content"]["text"], "raw");
    }
}
