//! Configuration validation against a [`Schema`].
//!
//! Catches what the API would otherwise reject mid-apply: missing required
//! fields, wrong types, values outside an enumeration, integers below their
//! floor, and fields the resource does not know about (a compute service
//! carrying a VCL-only `acl` block, say).
//!
//! # Example
//!
//! ```
//! use fastly_provider::schema::{Attribute, Schema};
//! use fastly_provider::validation::validate;
//! use serde_json::json;
//!
//! let schema = Schema::v0()
//!     .with_attribute("name", Attribute::required_string())
//!     .with_attribute("default_ttl", Attribute::optional_int64().with_min_int(0));
//!
//! let diagnostics = validate(&schema, &json!({"name": "www", "default_ttl": 3600}));
//! assert!(diagnostics.is_empty());
//!
//! let diagnostics = validate(&schema, &json!({"name": "www", "default_ttl": -1}));
//! assert_eq!(diagnostics.len(), 1);
//! assert_eq!(diagnostics[0].attribute.as_deref(), Some("default_ttl"));
//! ```

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::schema::{Attribute, AttributeType, Block, BlockNestingMode, Diagnostic, NestedBlock, Schema};

/// Validate a configuration value against a schema.
///
/// An empty result means the value is acceptable. Computed-only attributes
/// are never checked since the provider owns them.
pub fn validate(schema: &Schema, value: &Value) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    validate_block(&schema.block, value, "", &mut diagnostics);
    diagnostics
}

/// [`validate`], as a `Result`.
pub fn validate_result(schema: &Schema, value: &Value) -> Result<(), Vec<Diagnostic>> {
    let diagnostics = validate(schema, value);
    if diagnostics.is_empty() {
        Ok(())
    } else {
        Err(diagnostics)
    }
}

/// Whether `value` passes [`validate`] without diagnostics.
pub fn is_valid(schema: &Schema, value: &Value) -> bool {
    validate(schema, value).is_empty()
}

// =============================================================================
// Blocks
// =============================================================================

fn validate_block(block: &Block, value: &Value, path: &str, diagnostics: &mut Vec<Diagnostic>) {
    let obj = match value {
        Value::Object(map) => map,
        Value::Null => return,
        _ => {
            diagnostics.push(at_path(
                Diagnostic::error("Expected object").with_detail(format!("Got {}", value_type_name(value))),
                path,
            ));
            return;
        },
    };

    for (name, attr) in &block.attributes {
        validate_attribute(attr, obj.get(name), &join_path(path, name), diagnostics);
    }

    for (name, nested) in &block.blocks {
        validate_nested_block(nested, obj.get(name), &join_path(path, name), diagnostics);
    }

    for (name, v) in obj {
        if v.is_null() || block.attributes.contains_key(name) || block.blocks.contains_key(name) {
            continue;
        }
        let name_path = join_path(path, name);
        diagnostics.push(
            Diagnostic::error(format!("Unsupported argument '{}'", name_path))
                .with_detail("This resource type does not accept this field")
                .with_attribute(name_path),
        );
    }
}

fn validate_nested_block(
    nested: &NestedBlock,
    value: Option<&Value>,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let value = match value {
        None | Some(Value::Null) => {
            if nested.min_items > 0 {
                diagnostics.push(
                    Diagnostic::error(format!(
                        "Block '{}' requires at least {} item(s)",
                        path, nested.min_items
                    ))
                    .with_attribute(path),
                );
            }
            return;
        },
        Some(v) => v,
    };

    match (nested.nesting_mode, value) {
        (BlockNestingMode::Single, v) => validate_block(&nested.block, v, path, diagnostics),
        (BlockNestingMode::List | BlockNestingMode::Set, Value::Array(items)) => {
            check_item_count(nested, items.len(), path, diagnostics);
            for (i, item) in items.iter().enumerate() {
                validate_block(&nested.block, item, &format!("{}.{}", path, i), diagnostics);
            }
        },
        (_, v) => {
            diagnostics.push(
                Diagnostic::error(format!("Expected list for block '{}'", path))
                    .with_detail(format!("Got {}", value_type_name(v)))
                    .with_attribute(path),
            );
        },
    }
}

fn check_item_count(nested: &NestedBlock, len: usize, path: &str, diagnostics: &mut Vec<Diagnostic>) {
    let len = len as u32;
    if len < nested.min_items {
        diagnostics.push(
            Diagnostic::error(format!(
                "Block '{}' requires at least {} item(s), got {}",
                path, nested.min_items, len
            ))
            .with_attribute(path),
        );
    }
    // max_items of 0 means unbounded
    if nested.max_items > 0 && len > nested.max_items {
        diagnostics.push(
            Diagnostic::error(format!(
                "Block '{}' allows at most {} item(s), got {}",
                path, nested.max_items, len
            ))
            .with_attribute(path),
        );
    }
}

// =============================================================================
// Attributes
// =============================================================================

fn validate_attribute(attr: &Attribute, value: Option<&Value>, path: &str, diagnostics: &mut Vec<Diagnostic>) {
    if attr.is_computed_only() {
        return;
    }

    let Some(v) = value.filter(|v| !v.is_null()) else {
        if attr.flags.required {
            diagnostics.push(
                Diagnostic::error(format!("Missing required attribute '{}'", path))
                    .with_detail("This attribute is required and must be provided")
                    .with_attribute(path),
            );
        }
        return;
    };

    let before = diagnostics.len();
    validate_attribute_type(&attr.attr_type, v, path, diagnostics);
    if diagnostics.len() > before {
        return;
    }

    if !attr.allowed_values.is_empty() {
        if let Some(s) = v.as_str() {
            if !attr.allowed_values.iter().any(|allowed| allowed == s) {
                diagnostics.push(
                    Diagnostic::error(format!("Invalid value for attribute '{}'", path))
                        .with_detail(format!(
                            "{:?} is not one of: {}",
                            s,
                            attr.allowed_values.join(", ")
                        ))
                        .with_attribute(path),
                );
            }
        }
    }

    if let (Some(min), Some(n)) = (attr.min_int, as_int64(v)) {
        if n < min {
            diagnostics.push(
                Diagnostic::error(format!("Value for attribute '{}' is too small", path))
                    .with_detail(format!("Expected at least {}, got {}", min, n))
                    .with_attribute(path),
            );
        }
    }
}

fn validate_attribute_type(attr_type: &AttributeType, value: &Value, path: &str, diagnostics: &mut Vec<Diagnostic>) {
    match attr_type {
        AttributeType::String => {
            if !value.is_string() {
                diagnostics.push(type_error(path, "string", value));
            }
        },
        AttributeType::Int64 => {
            if as_int64(value).is_none() {
                diagnostics.push(type_error(path, "int64", value));
            }
        },
        AttributeType::Bool => {
            if !value.is_boolean() {
                diagnostics.push(type_error(path, "bool", value));
            }
        },
        AttributeType::List(element_type) | AttributeType::Set(element_type) => match value.as_array() {
            Some(items) => {
                for (i, item) in items.iter().enumerate() {
                    validate_attribute_type(element_type, item, &format!("{}.{}", path, i), diagnostics);
                }
            },
            None => {
                let expected = if matches!(attr_type, AttributeType::Set(_)) { "set" } else { "list" };
                diagnostics.push(type_error(path, expected, value));
            },
        },
        AttributeType::Map(value_type) => match value.as_object() {
            Some(entries) => {
                for (key, v) in entries {
                    validate_attribute_type(value_type, v, &format!("{}.{}", path, key), diagnostics);
                }
            },
            None => diagnostics.push(type_error(path, "map", value)),
        },
        AttributeType::Object(fields) => match value.as_object() {
            Some(obj) => validate_object_type(fields, obj, path, diagnostics),
            None => diagnostics.push(type_error(path, "object", value)),
        },
    }
}

fn validate_object_type(
    fields: &BTreeMap<String, AttributeType>,
    obj: &Map<String, Value>,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    // Object fields carry no presence flags; only the types are checked.
    for (name, field_type) in fields {
        if let Some(value) = obj.get(name).filter(|v| !v.is_null()) {
            validate_attribute_type(field_type, value, &join_path(path, name), diagnostics);
        }
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn join_path(base: &str, name: &str) -> String {
    if base.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", base, name)
    }
}

fn at_path(diagnostic: Diagnostic, path: &str) -> Diagnostic {
    if path.is_empty() {
        diagnostic
    } else {
        diagnostic.with_attribute(path)
    }
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

/// Integers, including floats with no fractional part (`42.0`).
fn as_int64(value: &Value) -> Option<i64> {
    let Value::Number(n) = value else {
        return None;
    };
    if let Some(i) = n.as_i64() {
        return Some(i);
    }
    let f = n.as_f64()?;
    (f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64).then_some(f as i64)
}

fn type_error(path: &str, expected: &str, got: &Value) -> Diagnostic {
    Diagnostic::error(format!("Invalid type for attribute '{}'", path))
        .with_detail(format!("Expected {}, got {}", expected, value_type_name(got)))
        .with_attribute(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{AttributeFlags, DiagnosticSeverity};
    use serde_json::json;

    fn backend_block() -> Block {
        Block::new()
            .with_attribute("name", Attribute::required_string())
            .with_attribute("address", Attribute::required_string())
            .with_attribute("port", Attribute::optional_int64().with_min_int(1))
            .with_attribute("use_ssl", Attribute::optional_bool())
    }

    #[test]
    fn test_required_string() {
        let schema = Schema::v0().with_attribute("name", Attribute::required_string());

        assert!(validate(&schema, &json!({"name": "www"})).is_empty());

        let diagnostics = validate(&schema, &json!({}));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute.as_deref(), Some("name"));
        assert_eq!(diagnostics[0].severity, DiagnosticSeverity::Error);

        assert_eq!(validate(&schema, &json!({"name": null})).len(), 1);

        let diagnostics = validate(&schema, &json!({"name": 123}));
        assert!(diagnostics[0].summary.contains("Invalid type"));
    }

    #[test]
    fn test_optional_attribute() {
        let schema = Schema::v0().with_attribute("default_ttl", Attribute::optional_int64());

        assert!(validate(&schema, &json!({"default_ttl": 3600})).is_empty());
        assert!(validate(&schema, &json!({})).is_empty());
        assert!(validate(&schema, &json!({"default_ttl": null})).is_empty());
        assert_eq!(validate(&schema, &json!({"default_ttl": "an hour"})).len(), 1);
    }

    #[test]
    fn test_computed_only_skipped() {
        let schema = Schema::v0().with_attribute("active_version", Attribute::computed_int64());
        assert!(validate(&schema, &json!({})).is_empty());
        assert!(validate(&schema, &json!({"active_version": "three"})).is_empty());
    }

    #[test]
    fn test_optional_computed_checked_when_set() {
        let schema = Schema::v0().with_attribute(
            "configuration_id",
            Attribute::new(AttributeType::String, AttributeFlags::optional_computed()),
        );
        assert!(validate(&schema, &json!({})).is_empty());
        assert_eq!(validate(&schema, &json!({"configuration_id": 7})).len(), 1);
    }

    #[test]
    fn test_int64_accepts_whole_floats() {
        let schema = Schema::v0().with_attribute("port", Attribute::required_int64());
        assert!(validate(&schema, &json!({"port": 443})).is_empty());
        assert!(validate(&schema, &json!({"port": 443.0})).is_empty());
        assert_eq!(validate(&schema, &json!({"port": 443.5})).len(), 1);
        assert_eq!(validate(&schema, &json!({"port": "443"})).len(), 1);
    }

    #[test]
    fn test_bool() {
        let schema = Schema::v0().with_attribute(
            "force_destroy",
            Attribute::new(AttributeType::Bool, AttributeFlags::required()),
        );
        assert!(validate(&schema, &json!({"force_destroy": false})).is_empty());
        assert_eq!(validate(&schema, &json!({"force_destroy": "true"})).len(), 1);
    }

    #[test]
    fn test_allowed_values() {
        let schema = Schema::v0().with_attribute(
            "status",
            Attribute::required_string().with_allowed_values(&["log", "block", "score"]),
        );
        assert!(validate(&schema, &json!({"status": "block"})).is_empty());

        let diagnostics = validate(&schema, &json!({"status": "deny"}));
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].detail.as_deref().unwrap().contains("log, block, score"));
    }

    #[test]
    fn test_min_int() {
        let schema = Schema::v0()
            .with_attribute("stale_ttl", Attribute::optional_int64().with_min_int(0));
        assert!(validate(&schema, &json!({"stale_ttl": 0})).is_empty());

        let diagnostics = validate(&schema, &json!({"stale_ttl": -5}));
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].summary.contains("too small"));
    }

    #[test]
    fn test_wrong_type_reports_once() {
        let schema = Schema::v0().with_attribute(
            "status",
            Attribute::required_string().with_allowed_values(&["log"]),
        );
        assert_eq!(validate(&schema, &json!({"status": 1})).len(), 1);
    }

    #[test]
    fn test_set_of_strings() {
        let schema = Schema::v0().with_attribute(
            "domains",
            Attribute::new(AttributeType::set(AttributeType::String), AttributeFlags::optional()),
        );
        assert!(validate(&schema, &json!({"domains": ["a.example.com", "b.example.com"]})).is_empty());

        let diagnostics = validate(&schema, &json!({"domains": ["a.example.com", 7]}));
        assert_eq!(diagnostics[0].attribute.as_deref(), Some("domains.1"));

        assert_eq!(validate(&schema, &json!({"domains": "a.example.com"})).len(), 1);
    }

    #[test]
    fn test_map_values() {
        let schema = Schema::v0().with_attribute(
            "items",
            Attribute::new(AttributeType::map(AttributeType::String), AttributeFlags::optional()),
        );
        assert!(validate(&schema, &json!({"items": {"key": "value"}})).is_empty());

        let diagnostics = validate(&schema, &json!({"items": {"key": 1}}));
        assert_eq!(diagnostics[0].attribute.as_deref(), Some("items.key"));
    }

    #[test]
    fn test_object_fields() {
        let mut fields = BTreeMap::new();
        fields.insert("modsec_rule_id".to_string(), AttributeType::Int64);
        fields.insert("status".to_string(), AttributeType::String);
        let schema = Schema::v0().with_attribute(
            "rule",
            Attribute::new(AttributeType::Object(fields), AttributeFlags::optional()),
        );

        assert!(validate(&schema, &json!({"rule": {"modsec_rule_id": 1010, "status": "log"}})).is_empty());

        let diagnostics = validate(&schema, &json!({"rule": {"modsec_rule_id": "1010"}}));
        assert_eq!(diagnostics[0].attribute.as_deref(), Some("rule.modsec_rule_id"));
    }

    #[test]
    fn test_unsupported_argument() {
        let schema = Schema::v0()
            .with_attribute("name", Attribute::required_string())
            .with_block("backend", NestedBlock::set(backend_block()));

        let diagnostics = validate(&schema, &json!({"name": "www", "acl": [{"name": "blocklist"}]}));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute.as_deref(), Some("acl"));
        assert!(diagnostics[0].summary.contains("Unsupported argument"));

        // Explicit nulls are how absent fields arrive.
        assert!(validate(&schema, &json!({"name": "www", "acl": null})).is_empty());
    }

    #[test]
    fn test_nested_block_fields() {
        let schema = Schema::v0().with_block("backend", NestedBlock::set(backend_block()));

        let config = json!({"backend": [
            {"name": "origin", "address": "origin.example.com", "port": 443},
            {"name": "broken", "port": 0}
        ]});
        let diagnostics = validate(&schema, &config);
        assert_eq!(diagnostics.len(), 2);
        let paths: Vec<_> = diagnostics.iter().filter_map(|d| d.attribute.as_deref()).collect();
        assert!(paths.contains(&"backend.1.address"));
        assert!(paths.contains(&"backend.1.port"));
    }

    #[test]
    fn test_nested_unknown_field() {
        let schema = Schema::v0().with_block("backend", NestedBlock::list(backend_block()));
        let config = json!({"backend": [{"name": "o", "address": "a", "shield": "iad-va-us"}]});
        let diagnostics = validate(&schema, &config);
        assert_eq!(diagnostics[0].attribute.as_deref(), Some("backend.0.shield"));
    }

    #[test]
    fn test_block_item_limits() {
        let schema = Schema::v0().with_block(
            "domain",
            NestedBlock::set(Block::new().with_attribute("name", Attribute::required_string()))
                .with_min_items(1)
                .with_max_items(2),
        );

        let diagnostics = validate(&schema, &json!({}));
        assert!(diagnostics[0].summary.contains("at least 1"));

        assert_eq!(validate(&schema, &json!({"domain": []})).len(), 1);
        assert!(validate(&schema, &json!({"domain": [{"name": "a.example.com"}]})).is_empty());

        let three = json!({"domain": [{"name": "a"}, {"name": "b"}, {"name": "c"}]});
        assert!(validate(&schema, &three)[0].summary.contains("at most 2"));
    }

    #[test]
    fn test_single_block() {
        let schema = Schema::v0().with_block(
            "package",
            NestedBlock::single(Block::new().with_attribute("filename", Attribute::required_string())),
        );
        assert!(validate(&schema, &json!({"package": {"filename": "pkg.tar.gz"}})).is_empty());
        assert_eq!(validate(&schema, &json!({"package": {}})).len(), 1);
        assert_eq!(validate(&schema, &json!({"package": "pkg.tar.gz"})).len(), 1);
    }

    #[test]
    fn test_block_expects_list() {
        let schema = Schema::v0().with_block("backend", NestedBlock::list(backend_block()));
        let diagnostics = validate(&schema, &json!({"backend": {"name": "o"}}));
        assert!(diagnostics[0].summary.contains("Expected list"));
    }

    #[test]
    fn test_top_level_must_be_object() {
        let schema = Schema::v0();
        let diagnostics = validate(&schema, &json!("www"));
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].attribute.is_none());
        assert!(validate(&schema, &Value::Null).is_empty());
    }

    #[test]
    fn test_result_helpers() {
        let schema = Schema::v0().with_attribute("name", Attribute::required_string());
        assert!(is_valid(&schema, &json!({"name": "www"})));
        assert!(!is_valid(&schema, &json!({})));
        assert!(validate_result(&schema, &json!({"name": "www"})).is_ok());
        assert_eq!(validate_result(&schema, &json!({})).unwrap_err().len(), 1);
    }
}
