use schemars::{schema_for, JsonSchema};
use serde::de::DeserializeOwned;

/// Trait for types usable as the forced tool-use output of an extraction call.
///
/// Automatically implemented for any type that implements `JsonSchema + DeserializeOwned`.
pub trait StructuredOutput: JsonSchema + DeserializeOwned {
    /// Generate the JSON schema sent as the tool's `input_schema`.
    ///
    /// The API requires a plain object schema: no `$schema` header, no
    /// top-level `definitions` block, every property listed in `required`.
    fn tool_schema() -> serde_json::Value {
        let schema = schema_for!(Self);
        let mut value = serde_json::to_value(schema).unwrap_or_default();

        require_all_properties(&mut value);
        inline_definitions(&mut value);

        if let serde_json::Value::Object(map) = &mut value {
            map.remove("definitions");
            map.remove("$schema");
            map.remove("title");
        }

        value
    }
}

impl<T: JsonSchema + DeserializeOwned> StructuredOutput for T {}

fn require_all_properties(value: &mut serde_json::Value) {
    match value {
        serde_json::Value::Object(map) => {
            if map.get("type") == Some(&serde_json::Value::String("object".to_string())) {
                map.insert(
                    "additionalProperties".to_string(),
                    serde_json::Value::Bool(false),
                );
                if let Some(serde_json::Value::Object(props)) = map.get("properties") {
                    let all_keys: Vec<serde_json::Value> = props
                        .keys()
                        .map(|k| serde_json::Value::String(k.clone()))
                        .collect();
                    map.insert("required".to_string(), serde_json::Value::Array(all_keys));
                }
            }
            for (_, v) in map.iter_mut() {
                require_all_properties(v);
            }
        }
        serde_json::Value::Array(arr) => {
            for item in arr.iter_mut() {
                require_all_properties(item);
            }
        }
        _ => {}
    }
}

/// Replace `$ref` pointers into `definitions` with the referenced schema.
fn inline_definitions(value: &mut serde_json::Value) {
    let definitions = match value
        .as_object()
        .and_then(|m| m.get("definitions"))
        .cloned()
    {
        Some(defs) => defs,
        None => return,
    };
    inline_refs(value, &definitions);
}

fn inline_refs(value: &mut serde_json::Value, definitions: &serde_json::Value) {
    match value {
        serde_json::Value::Object(map) => {
            if let Some(serde_json::Value::String(reference)) = map.get("$ref") {
                let name = reference.trim_start_matches("#/definitions/").to_string();
                if let Some(def) = definitions.get(&name) {
                    let mut replacement = def.clone();
                    inline_refs(&mut replacement, definitions);
                    *value = replacement;
                    return;
                }
            }
            for (_, v) in map.iter_mut() {
                inline_refs(v, definitions);
            }
        }
        serde_json::Value::Array(arr) => {
            for item in arr.iter_mut() {
                inline_refs(item, definitions);
            }
        }
        _ => {}
    }
}
