//! Parameter model, schema generation, and argument coercion.
//!
//! In the statically typed world there is no runtime reflection to mine a
//! function signature for parameter types, so tools and prompts declare
//! their parameters through this small builder DSL instead. The declared
//! list drives both the published `inputSchema` and the coercion applied
//! to incoming arguments.

use serde_json::{Map, Number, Value};

use crate::{McpError, McpResult};

/// Parameter names that are injected by the framework for authenticated
/// tools and never appear in the public schema.
pub const PARAM_USER_ID: &str = "_user_id";
pub const PARAM_EXTERNAL_ACCESS_TOKEN: &str = "_external_access_token";

/// The JSON type a parameter is declared as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
}

impl ParamKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParamKind::String => "string",
            ParamKind::Integer => "integer",
            ParamKind::Number => "number",
            ParamKind::Boolean => "boolean",
            ParamKind::Array => "array",
            ParamKind::Object => "object",
        }
    }
}

/// One declared input of a tool or prompt.
#[derive(Debug, Clone)]
pub struct Parameter {
    pub name: String,
    pub kind: ParamKind,
    /// Element type for arrays, when known.
    pub items: Option<ParamKind>,
    /// Finite set of allowed string values.
    pub choices: Option<Vec<String>>,
    pub required: bool,
    pub default: Option<Value>,
    pub description: Option<String>,
}

impl Parameter {
    pub fn new(name: impl Into<String>, kind: ParamKind) -> Self {
        Self {
            name: name.into(),
            kind,
            items: None,
            choices: None,
            required: true,
            default: None,
            description: None,
        }
    }

    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, ParamKind::String)
    }

    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, ParamKind::Integer)
    }

    pub fn number(name: impl Into<String>) -> Self {
        Self::new(name, ParamKind::Number)
    }

    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, ParamKind::Boolean)
    }

    pub fn array(name: impl Into<String>, items: ParamKind) -> Self {
        let mut param = Self::new(name, ParamKind::Array);
        param.items = Some(items);
        param
    }

    pub fn object(name: impl Into<String>) -> Self {
        Self::new(name, ParamKind::Object)
    }

    /// Restrict to a finite set of string values.
    pub fn with_choices<I, S>(mut self, choices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.choices = Some(choices.into_iter().map(Into::into).collect());
        self
    }

    /// Mark optional. A parameter without a default may simply be absent
    /// at invocation time; the handler sees no entry at all, not null.
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    /// Supply a default, which also makes the parameter optional.
    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self.required = false;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Whether this parameter is an injected auth value hidden from the
    /// public schema.
    pub fn is_hidden(&self) -> bool {
        self.name == PARAM_USER_ID || self.name == PARAM_EXTERNAL_ACCESS_TOKEN
    }

    /// JSON Schema fragment for this parameter.
    pub fn to_json_schema(&self) -> Value {
        let mut schema = Map::new();
        schema.insert("type".to_string(), Value::String(self.kind.as_str().into()));
        if let Some(description) = &self.description {
            schema.insert("description".to_string(), Value::String(description.clone()));
        }
        if let Some(items) = self.items {
            schema.insert(
                "items".to_string(),
                serde_json::json!({ "type": items.as_str() }),
            );
        }
        if let Some(choices) = &self.choices {
            schema.insert(
                "enum".to_string(),
                Value::Array(choices.iter().cloned().map(Value::String).collect()),
            );
        }
        if let Some(default) = &self.default {
            schema.insert("default".to_string(), default.clone());
        }
        Value::Object(schema)
    }
}

/// Build the MCP `inputSchema` object for a parameter list. Hidden
/// (injected) parameters are excluded.
pub fn build_input_schema(params: &[Parameter]) -> Value {
    let mut properties = Map::new();
    let mut required = Vec::new();

    for param in params.iter().filter(|p| !p.is_hidden()) {
        properties.insert(param.name.clone(), param.to_json_schema());
        if param.required {
            required.push(Value::String(param.name.clone()));
        }
    }

    let mut schema = Map::new();
    schema.insert("type".to_string(), Value::String("object".into()));
    schema.insert("properties".to_string(), Value::Object(properties));
    if !required.is_empty() {
        schema.insert("required".to_string(), Value::Array(required));
    }
    Value::Object(schema)
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn type_error(param: &Parameter, value: &Value) -> McpError {
    McpError::InvalidParameterType {
        param: param.name.clone(),
        expected: param.kind.as_str().to_string(),
        actual: format!("{} ({})", type_name(value), value),
    }
}

fn coerce_integer(param: &Parameter, value: Value) -> McpResult<Value> {
    match &value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                return Ok(Value::from(i));
            }
            if let Some(f) = n.as_f64() {
                // A float is only an integer if truncation loses nothing.
                if f.fract() == 0.0 && f.is_finite() {
                    return Ok(Value::from(f as i64));
                }
            }
            Err(type_error(param, &value))
        }
        Value::Bool(b) => Ok(Value::from(*b as i64)),
        Value::String(s) => {
            if let Ok(i) = s.trim().parse::<i64>() {
                return Ok(Value::from(i));
            }
            if let Ok(f) = s.trim().parse::<f64>() {
                if f.fract() == 0.0 && f.is_finite() {
                    return Ok(Value::from(f as i64));
                }
            }
            Err(type_error(param, &value))
        }
        _ => Err(type_error(param, &value)),
    }
}

fn coerce_number(param: &Parameter, value: Value) -> McpResult<Value> {
    match &value {
        Value::Number(_) => Ok(value),
        Value::Bool(b) => Ok(Value::from(*b as i64 as f64)),
        Value::String(s) => match s.trim().parse::<f64>() {
            Ok(f) if f.is_finite() => Ok(Number::from_f64(f)
                .map(Value::Number)
                .unwrap_or(Value::Null)),
            _ => Err(type_error(param, &value)),
        },
        _ => Err(type_error(param, &value)),
    }
}

const TRUE_WORDS: [&str; 4] = ["true", "1", "yes", "on"];
const FALSE_WORDS: [&str; 4] = ["false", "0", "no", "off"];

fn coerce_boolean(param: &Parameter, value: Value) -> McpResult<Value> {
    match &value {
        Value::Bool(_) => Ok(value),
        Value::String(s) => {
            let word = s.trim().to_ascii_lowercase();
            if TRUE_WORDS.contains(&word.as_str()) {
                Ok(Value::Bool(true))
            } else if FALSE_WORDS.contains(&word.as_str()) {
                Ok(Value::Bool(false))
            } else {
                Err(type_error(param, &value))
            }
        }
        Value::Number(n) => match n.as_i64() {
            Some(0) => Ok(Value::Bool(false)),
            Some(1) => Ok(Value::Bool(true)),
            _ => Err(type_error(param, &value)),
        },
        _ => Err(type_error(param, &value)),
    }
}

fn coerce_string(value: Value) -> Value {
    match value {
        Value::String(_) => value,
        // Scalars are stringified; collections are serialized so the enum
        // check (if any) still sees a string.
        other => Value::String(
            serde_json::to_string(&other).unwrap_or_else(|_| "null".to_string()),
        ),
    }
}

fn coerce_array(param: &Parameter, value: Value) -> McpResult<Value> {
    match &value {
        Value::Array(_) => Ok(value),
        Value::String(s) => match serde_json::from_str::<Value>(s) {
            Ok(parsed @ Value::Array(_)) => Ok(parsed),
            _ => Err(type_error(param, &value)),
        },
        _ => Err(type_error(param, &value)),
    }
}

fn coerce_object(param: &Parameter, value: Value) -> McpResult<Value> {
    match &value {
        Value::Object(_) => Ok(value),
        Value::String(s) => match serde_json::from_str::<Value>(s) {
            Ok(parsed @ Value::Object(_)) => Ok(parsed),
            _ => Err(type_error(param, &value)),
        },
        _ => Err(type_error(param, &value)),
    }
}

fn check_choices(param: &Parameter, value: &Value) -> McpResult<()> {
    let Some(choices) = &param.choices else {
        return Ok(());
    };
    let accepted = value
        .as_str()
        .map(|s| choices.iter().any(|c| c == s))
        .unwrap_or(false);
    if accepted {
        Ok(())
    } else {
        Err(McpError::InvalidParams(format!(
            "Invalid value for '{}': {} is not one of [{}]",
            param.name,
            value,
            choices.join(", ")
        )))
    }
}

fn coerce(param: &Parameter, value: Value) -> McpResult<Value> {
    let coerced = match param.kind {
        ParamKind::Integer => coerce_integer(param, value)?,
        ParamKind::Number => coerce_number(param, value)?,
        ParamKind::Boolean => coerce_boolean(param, value)?,
        ParamKind::String => coerce_string(value),
        ParamKind::Array => coerce_array(param, value)?,
        ParamKind::Object => coerce_object(param, value)?,
    };
    check_choices(param, &coerced)?;
    Ok(coerced)
}

fn missing_required(param: &Parameter) -> McpError {
    let mut message = format!(
        "missing required argument '{}' (expected {})",
        param.name,
        param.kind.as_str()
    );
    if let Some(description) = &param.description {
        message.push_str(&format!(": {}", description));
    }
    McpError::MissingParameter(message)
}

/// Validate and coerce a bag of client-supplied arguments against a
/// declared parameter list.
///
/// Declared parameters are coerced to their type; absent optional ones get
/// their default or are omitted entirely; absent required ones fail.
/// Undeclared keys pass through untouched so handlers can accept
/// open-ended inputs.
pub fn validate_arguments(
    params: &[Parameter],
    arguments: &Map<String, Value>,
) -> McpResult<Map<String, Value>> {
    let mut out = Map::new();

    for param in params {
        match arguments.get(&param.name) {
            Some(value) => {
                out.insert(param.name.clone(), coerce(param, value.clone())?);
            }
            None => {
                if let Some(default) = &param.default {
                    out.insert(param.name.clone(), default.clone());
                } else if param.required {
                    return Err(missing_required(param));
                }
            }
        }
    }

    let declared: std::collections::HashSet<&str> =
        params.iter().map(|p| p.name.as_str()).collect();
    for (key, value) in arguments {
        if !declared.contains(key.as_str()) {
            out.insert(key.clone(), value.clone());
        }
    }

    Ok(out)
}
