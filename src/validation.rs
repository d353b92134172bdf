//! Schema validation helpers.
//!
//! Validates a `serde_json::Value` configuration against a [`Schema`] before
//! any Graph call is made, producing attribute-scoped diagnostics.
//!
//! # Example
//!
//! ```
//! use msgraph_groups_provider::schema::{Schema, Attribute};
//! use msgraph_groups_provider::validation::validate;
//! use serde_json::json;
//!
//! let schema = Schema::v0()
//!     .with_attribute("display_name", Attribute::required_string())
//!     .with_attribute(
//!         "visibility",
//!         Attribute::optional_string().with_allowed_values(["Public", "Private"]),
//!     );
//!
//! let diagnostics = validate(&schema, &json!({"display_name": "Engineering"}));
//! assert!(diagnostics.is_empty());
//!
//! let diagnostics = validate(&schema, &json!({"display_name": "Engineering", "visibility": "Secret"}));
//! assert_eq!(diagnostics.len(), 1);
//! assert_eq!(diagnostics[0].attribute, Some("visibility".to_string()));
//! ```

use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::schema::{
    Attribute, AttributeType, Block, BlockNestingMode, Diagnostic, NestedBlock, Schema,
};

/// Validate a configuration against a schema. An empty result means valid.
///
/// - required attributes must be present and non-null
/// - computed-only attributes are ignored, since the provider sets them
/// - values are type-checked recursively, including object and map members
/// - `allowed_values` applies to a string or to every element of a string
///   list or set
/// - nested blocks honour their min/max item counts (a max of 0 is unbounded)
pub fn validate(schema: &Schema, value: &Value) -> Vec<Diagnostic> {
    let mut validator = Validator::default();
    validator.block(&schema.block, value, "");
    validator.diagnostics
}

/// [`validate`] as a `Result`.
pub fn validate_result(schema: &Schema, value: &Value) -> Result<(), Vec<Diagnostic>> {
    let diagnostics = validate(schema, value);
    if diagnostics.is_empty() {
        Ok(())
    } else {
        Err(diagnostics)
    }
}

/// Whether `value` passes [`validate`].
pub fn is_valid(schema: &Schema, value: &Value) -> bool {
    validate(schema, value).is_empty()
}

#[derive(Default)]
struct Validator {
    diagnostics: Vec<Diagnostic>,
}

impl Validator {
    fn error(&mut self, path: &str, summary: String, detail: Option<String>) {
        let mut diagnostic = Diagnostic::error(summary);
        if let Some(detail) = detail {
            diagnostic = diagnostic.with_detail(detail);
        }
        if !path.is_empty() {
            diagnostic = diagnostic.with_attribute(path);
        }
        self.diagnostics.push(diagnostic);
    }

    fn block(&mut self, block: &Block, value: &Value, path: &str) {
        let fields = match value {
            Value::Object(fields) => fields,
            Value::Null => return,
            other => {
                self.error(
                    path,
                    "Expected object".to_string(),
                    Some(format!("Got {}", kind(other))),
                );
                return;
            },
        };

        for (name, attr) in &block.attributes {
            self.attribute(attr, fields.get(name), &join(path, name));
        }
        for (name, nested) in &block.blocks {
            self.nested(nested, fields.get(name), &join(path, name));
        }
    }

    fn attribute(&mut self, attr: &Attribute, value: Option<&Value>, path: &str) {
        if attr.is_computed_only() {
            return;
        }

        let value = match value {
            Some(v) if !v.is_null() => v,
            _ => {
                if attr.flags.required {
                    self.error(
                        path,
                        format!("Missing required attribute '{}'", path),
                        Some("This attribute is required and must be provided".to_string()),
                    );
                }
                return;
            },
        };

        let before = self.diagnostics.len();
        self.value(&attr.attr_type, value, path);
        if self.diagnostics.len() > before {
            return;
        }
        if let Some(allowed) = &attr.allowed_values {
            match value {
                Value::Array(items) => {
                    for (i, item) in items.iter().enumerate() {
                        self.allowed(allowed, item, &format!("{}.{}", path, i));
                    }
                },
                other => self.allowed(allowed, other, path),
            }
        }
    }

    fn allowed(&mut self, allowed: &[String], value: &Value, path: &str) {
        let Some(s) = value.as_str() else {
            return;
        };
        if !allowed.iter().any(|a| a == s) {
            self.error(
                path,
                format!("Invalid value for attribute '{}'", path),
                Some(format!("Got \"{}\", expected one of: {}", s, allowed.join(", "))),
            );
        }
    }

    fn value(&mut self, attr_type: &AttributeType, value: &Value, path: &str) {
        let ok = match attr_type {
            AttributeType::String => value.is_string(),
            AttributeType::Int64 => is_int64(value),
            AttributeType::Float64 => value.is_number(),
            AttributeType::Bool => value.is_boolean(),
            AttributeType::Dynamic => true,
            AttributeType::List(element) | AttributeType::Set(element) => match value {
                Value::Array(items) => {
                    for (i, item) in items.iter().enumerate() {
                        self.value(element, item, &format!("{}.{}", path, i));
                        if matches!(attr_type, AttributeType::Set(_)) && items[..i].contains(item) {
                            self.error(
                                &format!("{}.{}", path, i),
                                format!("Duplicate element in set attribute '{}'", path),
                                Some(format!("{} appears more than once", item)),
                            );
                        }
                    }
                    true
                },
                _ => false,
            },
            AttributeType::Map(element) => match value {
                Value::Object(entries) => {
                    for (key, item) in entries {
                        self.value(element, item, &format!("{}.{}", path, key));
                    }
                    true
                },
                _ => false,
            },
            AttributeType::Object(members) => match value {
                Value::Object(fields) => {
                    self.object(members, fields, path);
                    true
                },
                _ => false,
            },
        };

        if !ok {
            self.error(
                path,
                format!("Invalid type for attribute '{}'", path),
                Some(format!("Expected {}, got {}", type_name(attr_type), kind(value))),
            );
        }
    }

    // Object members carry no flags, so absent members are fine.
    fn object(&mut self, members: &HashMap<String, AttributeType>, fields: &Map<String, Value>, path: &str) {
        for (name, member_type) in members {
            if let Some(value) = fields.get(name).filter(|v| !v.is_null()) {
                self.value(member_type, value, &join(path, name));
            }
        }
    }

    fn nested(&mut self, nested: &NestedBlock, value: Option<&Value>, path: &str) {
        let value = match value {
            Some(v) if !v.is_null() => v,
            _ => {
                if nested.min_items > 0 {
                    self.error(
                        path,
                        format!("Block '{}' requires at least {} item(s)", path, nested.min_items),
                        None,
                    );
                }
                return;
            },
        };

        let items: Vec<(String, &Value)> = match (nested.nesting_mode, value) {
            (BlockNestingMode::Single, v) => {
                self.block(&nested.block, v, path);
                return;
            },
            (BlockNestingMode::List | BlockNestingMode::Set, Value::Array(items)) => items
                .iter()
                .enumerate()
                .map(|(i, item)| (i.to_string(), item))
                .collect(),
            (BlockNestingMode::Map, Value::Object(entries)) => {
                entries.iter().map(|(k, item)| (k.clone(), item)).collect()
            },
            (mode, other) => {
                let expected = if mode == BlockNestingMode::Map { "map" } else { "list" };
                self.error(
                    path,
                    format!("Expected {} for block '{}'", expected, path),
                    Some(format!("Got {}", kind(other))),
                );
                return;
            },
        };

        let count = items.len() as u32;
        if count < nested.min_items {
            self.error(
                path,
                format!(
                    "Block '{}' requires at least {} item(s), got {}",
                    path, nested.min_items, count
                ),
                None,
            );
        }
        if nested.max_items > 0 && count > nested.max_items {
            self.error(
                path,
                format!(
                    "Block '{}' allows at most {} item(s), got {}",
                    path, nested.max_items, count
                ),
                None,
            );
        }
        for (key, item) in items {
            self.block(&nested.block, item, &format!("{}.{}", path, key));
        }
    }
}

fn join(base: &str, name: &str) -> String {
    if base.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", base, name)
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn type_name(attr_type: &AttributeType) -> &'static str {
    match attr_type {
        AttributeType::String => "string",
        AttributeType::Int64 => "int64",
        AttributeType::Float64 => "float64",
        AttributeType::Bool => "bool",
        AttributeType::List(_) => "list",
        AttributeType::Set(_) => "set",
        AttributeType::Map(_) => "map",
        AttributeType::Object(_) => "object",
        AttributeType::Dynamic => "dynamic",
    }
}

// Whole-valued floats such as `3.0` count as integers.
fn is_int64(value: &Value) -> bool {
    match value {
        Value::Number(n) if n.is_i64() => true,
        Value::Number(n) => n
            .as_f64()
            .is_some_and(|f| f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64),
        _ => false,
    }
}
