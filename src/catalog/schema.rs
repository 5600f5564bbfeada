//! Tool input schemas, translated into local validators.
//!
//! A backend schema is plain JSON. It is compiled with `jsonschema` into a
//! validator object; nothing derived from it is ever executed as code, and
//! remote `$ref`s are not fetched.

use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use crate::types::{Error, Result};

/// Cap on validation messages reported back for a single call.
const MAX_REPORTED_ERRORS: usize = 8;

/// A tool's input schema plus the validator compiled from it.
#[derive(Clone)]
pub struct InputSchema {
    raw: Value,
    validator: Arc<jsonschema::Validator>,
}

impl fmt::Debug for InputSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InputSchema").field("raw", &self.raw).finish()
    }
}

impl InputSchema {
    /// Translate a backend-supplied schema for tool `tool`.
    ///
    /// Tool arguments are always a JSON object, so the schema must be an
    /// object schema: `type` is either absent (it is filled in) or `"object"`.
    pub fn translate(tool: &str, schema: &Value) -> Result<Self> {
        let Value::Object(map) = schema else {
            return Err(Error::schema_translation(tool, "input schema is not a JSON object"));
        };

        let mut map = map.clone();
        match map.get("type") {
            None => {
                map.insert("type".to_string(), Value::String("object".to_string()));
            }
            Some(Value::String(t)) if t == "object" => {}
            Some(other) => {
                return Err(Error::schema_translation(
                    tool,
                    format!("input schema type must be \"object\", got {}", other),
                ));
            }
        }
        let raw = Value::Object(map);

        let validator = jsonschema::validator_for(&raw)
            .map_err(|e| Error::schema_translation(tool, e.to_string()))?;

        Ok(Self {
            raw,
            validator: Arc::new(validator),
        })
    }

    /// Schema as advertised to inbound clients.
    pub fn raw(&self) -> &Value {
        &self.raw
    }

    /// Check `args` against the schema; all violations are reported together.
    pub fn validate(&self, tool: &str, args: &Value) -> Result<()> {
        let errors: Vec<String> = self
            .validator
            .iter_errors(args)
            .take(MAX_REPORTED_ERRORS)
            .map(|e| {
                let path = e.instance_path.to_string();
                if path.is_empty() {
                    e.to_string()
                } else {
                    format!("{}: {}", path, e)
                }
            })
            .collect();

        if errors.is_empty() {
            Ok(())
        } else {
            Err(Error::invalid_params(format!(
                "Invalid arguments for tool {}: {}",
                tool,
                errors.join("; ")
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn open_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "filepath": {"type": "string"},
                "port": {"type": "integer", "minimum": 1}
            },
            "required": ["filepath"]
        })
    }

    #[test]
    fn test_valid_arguments_pass() {
        let schema = InputSchema::translate("open", &open_schema()).unwrap();
        assert!(schema.validate("open", &json!({"filepath": "/tmp/a.bin"})).is_ok());
        assert!(schema
            .validate("open", &json!({"filepath": "/tmp/a.bin", "port": 8080}))
            .is_ok());
    }

    #[test]
    fn test_missing_required_field_fails() {
        let schema = InputSchema::translate("open", &open_schema()).unwrap();
        match schema.validate("open", &json!({})) {
            Err(Error::InvalidParams(msg)) => {
                assert!(msg.starts_with("Invalid arguments for tool open"));
                assert!(msg.contains("filepath"));
            }
            other => panic!("expected InvalidParams, got {:?}", other),
        }
    }

    #[test]
    fn test_type_and_constraint_violations_reported_together() {
        let schema = InputSchema::translate("open", &open_schema()).unwrap();
        let err = schema
            .validate("open", &json!({"filepath": 7, "port": 0}))
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("/filepath"), "{msg}");
        assert!(msg.contains("/port"), "{msg}");
    }

    #[test]
    fn test_missing_type_defaults_to_object() {
        let schema = InputSchema::translate("t", &json!({"properties": {}})).unwrap();
        assert_eq!(schema.raw()["type"], "object");
        assert!(schema.validate("t", &json!("not an object")).is_err());
    }

    #[test]
    fn test_non_object_schema_is_rejected() {
        for bad in [json!(true), json!("string"), json!([1])] {
            assert!(matches!(
                InputSchema::translate("t", &bad),
                Err(Error::SchemaTranslation { .. })
            ));
        }
    }

    #[test]
    fn test_non_object_type_is_rejected() {
        let err = InputSchema::translate("t", &json!({"type": "array"})).unwrap_err();
        assert!(matches!(err, Error::SchemaTranslation { ref tool, .. } if tool == "t"));
    }

    #[test]
    fn test_invalid_schema_is_rejected() {
        let bad = json!({"type": "object", "properties": {"x": {"type": "no-such-type"}}});
        assert!(matches!(
            InputSchema::translate("t", &bad),
            Err(Error::SchemaTranslation { .. })
        ));
    }

    #[test]
    fn test_schema_text_is_data_not_code() {
        // Would be dangerous under any translate-by-codegen scheme.
        let hostile = json!({
            "type": "object",
            "description": "\"); process.exit(1); (\"",
            "properties": {"a": {"type": "string", "pattern": "^[a-z]+$"}}
        });
        let schema = InputSchema::translate("t", &hostile).unwrap();
        assert!(schema.validate("t", &json!({"a": "abc"})).is_ok());
        assert!(schema.validate("t", &json!({"a": "ABC"})).is_err());
    }
}
