use crate::errors::{ErrorCode, McpError};
use crate::utils::suggest::suggest;
use jsonschema::error::ValidationErrorKind;
use jsonschema::JSONSchema;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDef {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

// An unparsable catalog yields no tools; App::initialize rejects that wiring.
static TOOL_CATALOG: Lazy<Vec<ToolDef>> = Lazy::new(|| {
    let raw = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/tool_catalog.json"));
    serde_json::from_str(raw).unwrap_or_default()
});

static TOOL_VALIDATORS: Lazy<HashMap<String, JSONSchema>> = Lazy::new(|| {
    let mut map = HashMap::new();
    for tool in TOOL_CATALOG.iter() {
        if let Ok(schema) = JSONSchema::compile(&tool.input_schema) {
            map.insert(tool.name.clone(), schema);
        }
    }
    map
});

pub fn tool_catalog() -> &'static Vec<ToolDef> {
    &TOOL_CATALOG
}

pub fn tool_by_name(name: &str) -> Option<&'static ToolDef> {
    TOOL_CATALOG.iter().find(|tool| tool.name == name)
}

/// Payload for `tools/list`.
pub fn list_tools() -> Value {
    serde_json::json!({ "tools": tool_catalog() })
}

pub fn validate_tool_args(tool_name: &str, args: &Value) -> Result<(), McpError> {
    let Some(schema) = TOOL_VALIDATORS.get(tool_name) else {
        return Ok(());
    };
    if let Err(errors) = schema.validate(args) {
        let message = format_schema_errors(tool_name, args, errors);
        return Err(McpError::new(ErrorCode::InvalidParams, message));
    }
    Ok(())
}

fn format_schema_errors(tool_name: &str, args: &Value, errors: jsonschema::ErrorIterator) -> String {
    let header = match args.get("action").and_then(|v| v.as_str()) {
        Some(action) => format!("Invalid arguments for {}:{}", tool_name, action),
        None => format!("Invalid arguments for {}", tool_name),
    };
    let mut lines = vec![header];
    let mut did_you_mean = Vec::new();

    for err in errors.take(10) {
        let path = err.instance_path.to_string();
        let location = if path.is_empty() { "(root)".to_string() } else { path.clone() };
        match &err.kind {
            ValidationErrorKind::Enum { options } => {
                let allowed: Vec<String> = options
                    .as_array()
                    .map(|arr| {
                        arr.iter()
                            .map(|v| v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string()))
                            .collect()
                    })
                    .unwrap_or_default();
                lines.push(format!("- {}: expected one of {}", location, allowed.join(", ")));
                let received = value_at(args, &path).as_str().unwrap_or("").to_string();
                let candidates: Vec<&str> = allowed.iter().map(String::as_str).collect();
                did_you_mean.extend(suggest(&received, &candidates, 3));
            }
            ValidationErrorKind::Required { property } => {
                let property = property
                    .as_str()
                    .map(str::to_string)
                    .unwrap_or_else(|| property.to_string());
                lines.push(format!("- {}: missing required field '{}'", location, property));
            }
            ValidationErrorKind::AdditionalProperties { unexpected } => {
                for field in unexpected {
                    lines.push(format!("- {}: unknown field '{}'", location, field));
                }
            }
            _ => lines.push(format!("- {}: {}", location, err)),
        }
    }
    if !did_you_mean.is_empty() {
        lines.push(format!("Did you mean: {}", did_you_mean.join(", ")));
    }
    lines.join("\n")
}

fn value_at<'a>(args: &'a Value, pointer: &str) -> &'a Value {
    args.pointer(pointer).unwrap_or(&Value::Null)
}
