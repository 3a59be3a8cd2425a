//! Conversion from Arcade parameter definitions to JSON Schema.

use serde_json::{Map, Value, json};

use super::{ToolParameter, ValueSchema};

/// Builds the JSON-Schema object the model sees for a tool's parameters.
pub fn parameters_to_schema(parameters: &[ToolParameter]) -> Value {
    let mut properties = Map::new();
    let mut required = Vec::new();

    for param in parameters {
        let mut schema = value_schema(&param.value_schema);
        if let (Some(description), Some(obj)) = (&param.description, schema.as_object_mut()) {
            obj.insert("description".to_string(), json!(description));
        }
        properties.insert(param.name.clone(), schema);
        if param.required {
            required.push(Value::String(param.name.clone()));
        }
    }

    json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

fn value_schema(schema: &ValueSchema) -> Value {
    let mut out = match schema.val_type.as_str() {
        "array" => json!({
            "type": "array",
            "items": scalar_type(schema.inner_val_type.as_deref().unwrap_or("string")),
        }),
        other => scalar_type(other),
    };
    if let (Some(values), Some(obj)) = (&schema.enum_values, out.as_object_mut())
        && schema.val_type != "array"
    {
        obj.insert("enum".to_string(), json!(values));
    }
    out
}

fn scalar_type(val_type: &str) -> Value {
    match val_type {
        "string" | "integer" | "number" | "boolean" => json!({"type": val_type}),
        "json" => json!({"type": "object"}),
        // unknown types accept any value
        _ => json!({}),
    }
}
