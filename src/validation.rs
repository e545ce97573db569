//! Schema validation helpers.
//!
//! Validates a `serde_json::Value` attribute bag against a [`Schema`] before
//! it is decoded into a typed struct.
//!
//! # Example
//!
//! ```
//! use spacelift_provider::schema::{Attribute, Schema};
//! use spacelift_provider::validation::validate;
//! use serde_json::json;
//!
//! let schema = Schema::v0()
//!     .with_attribute("context_id", Attribute::optional_string().id_segment())
//!     .with_attribute("stack_id", Attribute::optional_string().id_segment())
//!     .with_attribute("name", Attribute::required_string().id_segment())
//!     .with_exactly_one_of(["context_id", "stack_id"]);
//!
//! let diagnostics = validate(&schema, &json!({"context_id": "ctx1", "name": "BACON"}));
//! assert!(diagnostics.is_empty());
//!
//! // Both owners set
//! let diagnostics = validate(
//!     &schema,
//!     &json!({"context_id": "ctx1", "stack_id": "s", "name": "BACON"}),
//! );
//! assert_eq!(diagnostics.len(), 1);
//! ```

use crate::schema::{Attribute, AttributeType, Diagnostic, DiagnosticSeverity, Schema, Validator};
use serde_json::Value;

/// Validate a JSON value against a schema.
///
/// Returns a list of diagnostics for any validation errors found.
/// An empty list means the value is valid.
///
/// # Validation Rules
///
/// - Required attributes must be present and non-null
/// - Optional attributes may be absent or null
/// - Computed attributes are skipped (provider sets these)
/// - Attribute types must match the schema
/// - String validators must hold
/// - Exactly one attribute of every `exactly_one_of` group must be set
pub fn validate(schema: &Schema, value: &Value) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();

    let obj = match value {
        Value::Object(map) => map,
        _ => {
            diagnostics.push(
                Diagnostic::error("Expected object")
                    .with_detail(format!("Got {}", value_type_name(value))),
            );
            return diagnostics;
        },
    };

    for (name, attr) in &schema.block.attributes {
        validate_attribute(attr, obj.get(name), name, &mut diagnostics);
    }

    for group in &schema.exactly_one_of {
        validate_exactly_one_of(group, obj, &mut diagnostics);
    }

    diagnostics
}

/// Validate a JSON value against a schema, returning Ok if valid or Err with diagnostics.
///
/// This is a convenience wrapper around [`validate`] that returns a Result.
pub fn validate_result(schema: &Schema, value: &Value) -> Result<(), Vec<Diagnostic>> {
    let diagnostics = validate(schema, value);
    if diagnostics.is_empty() {
        Ok(())
    } else {
        Err(diagnostics)
    }
}

/// Check if a JSON value is valid against a schema.
pub fn is_valid(schema: &Schema, value: &Value) -> bool {
    validate(schema, value).is_empty()
}

fn validate_attribute(
    attr: &Attribute,
    value: Option<&Value>,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    if attr.flags.is_computed_only() {
        return;
    }

    match value {
        None | Some(Value::Null) => {
            if attr.flags.required {
                diagnostics.push(
                    Diagnostic::error(format!("Missing required attribute '{}'", path))
                        .with_detail("This attribute is required and must be provided")
                        .with_attribute(path),
                );
            }
        },
        Some(v) => {
            let before = diagnostics.len();
            validate_attribute_type(&attr.attr_type, v, path, diagnostics);
            if diagnostics.len() == before {
                if let Some(s) = v.as_str() {
                    for validator in &attr.validators {
                        if let Some(d) = check(*validator, s, path) {
                            diagnostics.push(d);
                        }
                    }
                }
            }
        },
    }
}

fn validate_attribute_type(
    attr_type: &AttributeType,
    value: &Value,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    match attr_type {
        AttributeType::String => {
            if !value.is_string() {
                diagnostics.push(type_error(path, "string", value));
            }
        },
        AttributeType::Int64 => {
            if value.as_i64().is_none() {
                diagnostics.push(type_error(path, "int64", value));
            }
        },
        AttributeType::Bool => {
            if !value.is_boolean() {
                diagnostics.push(type_error(path, "bool", value));
            }
        },
        AttributeType::Set(element_type) => {
            // Sets travel as arrays
            if let Some(arr) = value.as_array() {
                for (i, elem) in arr.iter().enumerate() {
                    let elem_path = format!("{}.{}", path, i);
                    validate_attribute_type(element_type, elem, &elem_path, diagnostics);
                }
                if has_duplicates(arr) {
                    diagnostics.push(
                        Diagnostic::error(format!("Duplicate values in set '{}'", path))
                            .with_attribute(path),
                    );
                }
            } else {
                diagnostics.push(type_error(path, "set", value));
            }
        },
    }
}

fn check(validator: Validator, value: &str, path: &str) -> Option<Diagnostic> {
    match validator {
        Validator::NonEmpty if value.is_empty() => Some(
            Diagnostic::error(format!("Attribute '{}' must not be empty", path))
                .with_attribute(path),
        ),
        Validator::NoPathSeparator if value.contains('/') => Some(
            Diagnostic::error(format!("Attribute '{}' must not contain '/'", path))
                .with_detail(format!("Got {:?}", value))
                .with_attribute(path),
        ),
        _ => None,
    }
}

fn validate_exactly_one_of(
    group: &[String],
    obj: &serde_json::Map<String, Value>,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let set: Vec<&str> = group
        .iter()
        .filter(|name| obj.get(name.as_str()).is_some_and(|v| !v.is_null()))
        .map(String::as_str)
        .collect();

    if set.len() == 1 {
        return;
    }

    let names = group.join(", ");
    let diagnostic = if set.is_empty() {
        Diagnostic::error(format!("Exactly one of {} must be set", names))
    } else {
        Diagnostic::error(format!("Only one of {} may be set", names))
            .with_detail(format!("Got {}", set.join(", ")))
    };
    let attribute = set.first().copied().or(group.first().map(String::as_str));
    diagnostics.push(match attribute {
        Some(attr) => diagnostic.with_attribute(attr),
        None => diagnostic,
    });
}

// Helper functions

fn has_duplicates(values: &[Value]) -> bool {
    values
        .iter()
        .enumerate()
        .any(|(i, v)| values[..i].contains(v))
}

fn value_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn type_error(path: &str, expected: &str, got: &Value) -> Diagnostic {
    Diagnostic {
        severity: DiagnosticSeverity::Error,
        summary: format!("Invalid type for attribute '{}'", path),
        detail: Some(format!(
            "Expected {}, got {}",
            expected,
            value_type_name(got)
        )),
        attribute: Some(path.to_string()),
    }
}
