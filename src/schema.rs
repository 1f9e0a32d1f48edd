//! Schema types for provider, resource and data source structure.
//!
//! Every resource declares its shape with these builders, and every service
//! attribute handler contributes its block through
//! [`ServiceAttributeHandler::register`](crate::handlers::ServiceAttributeHandler::register).
//! The same schema drives [`validate`](crate::validation::validate), plan
//! defaults and `force_new` replacement.
//!
//! Maps are `BTreeMap` so a schema serializes in a stable order.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

// =============================================================================
// Attributes
// =============================================================================

/// Value type of an attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeType {
    /// Text.
    String,
    /// Whole number. Fastly counts, ports and thresholds are all integers.
    Int64,
    /// `true`/`false`.
    Bool,
    /// Ordered values of one type.
    List(Box<AttributeType>),
    /// Unordered unique values of one type (`domains`, `ids`).
    Set(Box<AttributeType>),
    /// String-keyed values of one type (dictionary `items`).
    Map(Box<AttributeType>),
    /// Fixed fields, each with its own type.
    Object(BTreeMap<String, AttributeType>),
}

impl AttributeType {
    /// `List(element_type)`.
    pub fn list(element_type: AttributeType) -> Self {
        Self::List(Box::new(element_type))
    }

    /// `Set(element_type)`.
    pub fn set(element_type: AttributeType) -> Self {
        Self::Set(Box::new(element_type))
    }

    /// `Map(element_type)`.
    pub fn map(element_type: AttributeType) -> Self {
        Self::Map(Box::new(element_type))
    }
}

/// Who may set an attribute, and whether its value is secret.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct AttributeFlags {
    /// Configuration must set it.
    pub required: bool,
    /// Configuration may set it.
    pub optional: bool,
    /// The API fills it in.
    pub computed: bool,
    /// Redacted by the host (`api_key`, `key_pem`, logging credentials).
    pub sensitive: bool,
}

impl AttributeFlags {
    /// Must be configured.
    pub fn required() -> Self {
        Self {
            required: true,
            ..Self::default()
        }
    }

    /// May be configured.
    pub fn optional() -> Self {
        Self {
            optional: true,
            ..Self::default()
        }
    }

    /// Read-only, set from API responses.
    pub fn computed() -> Self {
        Self {
            computed: true,
            ..Self::default()
        }
    }

    /// May be configured; when it is not, the API value is kept.
    pub fn optional_computed() -> Self {
        Self {
            optional: true,
            computed: true,
            ..Self::default()
        }
    }
}

/// One attribute of a block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    /// Value type.
    #[serde(rename = "type")]
    pub attr_type: AttributeType,
    /// Presence and sensitivity.
    #[serde(flatten)]
    pub flags: AttributeFlags,
    /// Shown in generated documentation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// A change destroys and recreates the resource.
    #[serde(default)]
    pub force_new: bool,
    /// Planned when configuration leaves the attribute unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    /// Accepted string values; empty accepts anything.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allowed_values: Vec<String>,
    /// Smallest accepted integer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_int: Option<i64>,
}

impl Attribute {
    /// An attribute with no constraints beyond its type and flags.
    pub fn new(attr_type: AttributeType, flags: AttributeFlags) -> Self {
        Self {
            attr_type,
            flags,
            description: None,
            force_new: false,
            default: None,
            allowed_values: Vec::new(),
            min_int: None,
        }
    }

    /// Required string.
    pub fn required_string() -> Self {
        Self::new(AttributeType::String, AttributeFlags::required())
    }

    /// Optional string.
    pub fn optional_string() -> Self {
        Self::new(AttributeType::String, AttributeFlags::optional())
    }

    /// Computed string (`id`, `created_at`).
    pub fn computed_string() -> Self {
        Self::new(AttributeType::String, AttributeFlags::computed())
    }

    /// Required integer.
    pub fn required_int64() -> Self {
        Self::new(AttributeType::Int64, AttributeFlags::required())
    }

    /// Optional integer.
    pub fn optional_int64() -> Self {
        Self::new(AttributeType::Int64, AttributeFlags::optional())
    }

    /// Computed integer (`active_version`).
    pub fn computed_int64() -> Self {
        Self::new(AttributeType::Int64, AttributeFlags::computed())
    }

    /// Optional boolean.
    pub fn optional_bool() -> Self {
        Self::new(AttributeType::Bool, AttributeFlags::optional())
    }

    /// Computed boolean.
    pub fn computed_bool() -> Self {
        Self::new(AttributeType::Bool, AttributeFlags::computed())
    }

    /// Optional list of strings (data source filters).
    pub fn optional_string_list() -> Self {
        Self::new(AttributeType::list(AttributeType::String), AttributeFlags::optional())
    }

    /// Computed set of strings (ID listings).
    pub fn computed_string_set() -> Self {
        Self::new(AttributeType::set(AttributeType::String), AttributeFlags::computed())
    }

    /// Attach a description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Changes replace the resource.
    pub fn with_force_new(mut self) -> Self {
        self.force_new = true;
        self
    }

    /// Value planned when configuration leaves the attribute unset.
    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    /// Only accept one of `values` (WAF rule `status`, header `action`).
    pub fn with_allowed_values(mut self, values: &[&str]) -> Self {
        self.allowed_values = values.iter().map(|v| v.to_string()).collect();
        self
    }

    /// Reject integers below `min` (WAF thresholds start at 1).
    pub fn with_min_int(mut self, min: i64) -> Self {
        self.min_int = Some(min);
        self
    }

    /// Redact the value.
    pub fn sensitive(mut self) -> Self {
        self.flags.sensitive = true;
        self
    }

    /// Set only by the provider, never by configuration.
    pub fn is_computed_only(&self) -> bool {
        self.flags.computed && !self.flags.optional && !self.flags.required
    }
}

// =============================================================================
// Blocks
// =============================================================================

/// How a nested block repeats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BlockNestingMode {
    /// At most one, given as an object.
    #[default]
    Single,
    /// Ordered repetitions (`package`, a one-element list).
    List,
    /// Unordered repetitions compared by full value (`backend`, `rule`).
    Set,
}

/// Attributes and nested blocks at one level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Block {
    /// Attributes by name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, Attribute>,
    /// Nested blocks by name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub blocks: BTreeMap<String, NestedBlock>,
    /// Shown in generated documentation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Block {
    /// An empty block.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an attribute.
    pub fn with_attribute(mut self, name: impl Into<String>, attr: Attribute) -> Self {
        self.attributes.insert(name.into(), attr);
        self
    }

    /// Add a nested block.
    pub fn with_block(mut self, name: impl Into<String>, block: NestedBlock) -> Self {
        self.blocks.insert(name.into(), block);
        self
    }

    /// Attach a description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// A block nested under a name (`backend`, `logging_s3`, `rule`, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NestedBlock {
    /// Contents of each repetition.
    #[serde(flatten)]
    pub block: Block,
    /// How the block repeats.
    #[serde(default)]
    pub nesting_mode: BlockNestingMode,
    /// Fewest repetitions accepted.
    #[serde(default)]
    pub min_items: u32,
    /// Most repetitions accepted; 0 is unbounded.
    #[serde(default)]
    pub max_items: u32,
}

impl NestedBlock {
    fn with_mode(block: Block, nesting_mode: BlockNestingMode, max_items: u32) -> Self {
        Self {
            block,
            nesting_mode,
            min_items: 0,
            max_items,
        }
    }

    /// Zero or one object.
    pub fn single(block: Block) -> Self {
        Self::with_mode(block, BlockNestingMode::Single, 1)
    }

    /// An ordered list.
    pub fn list(block: Block) -> Self {
        Self::with_mode(block, BlockNestingMode::List, 0)
    }

    /// An unordered set.
    pub fn set(block: Block) -> Self {
        Self::with_mode(block, BlockNestingMode::Set, 0)
    }

    /// Require at least `min` repetitions.
    pub fn with_min_items(mut self, min: u32) -> Self {
        self.min_items = min;
        self
    }

    /// Allow at most `max` repetitions.
    pub fn with_max_items(mut self, max: u32) -> Self {
        self.max_items = max;
        self
    }
}

// =============================================================================
// Schemas
// =============================================================================

/// Shape of one resource, data source or the provider block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Schema {
    /// State format version reported to the host.
    #[serde(default)]
    pub version: u64,
    /// Top-level attributes and blocks.
    #[serde(flatten)]
    pub block: Block,
}

impl Schema {
    /// An empty schema with state format version 0.
    pub fn v0() -> Self {
        Self::default()
    }

    /// Add a top-level attribute.
    pub fn with_attribute(mut self, name: impl Into<String>, attr: Attribute) -> Self {
        self.insert_attribute(name, attr);
        self
    }

    /// Add a top-level block.
    pub fn with_block(mut self, name: impl Into<String>, block: NestedBlock) -> Self {
        self.insert_block(name, block);
        self
    }

    /// Add a top-level attribute in place, for handlers registering into a
    /// shared service schema.
    pub fn insert_attribute(&mut self, name: impl Into<String>, attr: Attribute) {
        self.block.attributes.insert(name.into(), attr);
    }

    /// Add a top-level block in place.
    pub fn insert_block(&mut self, name: impl Into<String>, block: NestedBlock) {
        self.block.blocks.insert(name.into(), block);
    }

    /// Whether `name` is a top-level attribute or block.
    pub fn declares(&self, name: &str) -> bool {
        self.block.attributes.contains_key(name) || self.block.blocks.contains_key(name)
    }

    /// Whether changing the top-level attribute `name` replaces the resource.
    pub fn is_force_new(&self, name: &str) -> bool {
        self.block.attributes.get(name).is_some_and(|attr| attr.force_new)
    }

    /// Top-level attributes the API may fill in.
    pub fn computed_attributes(&self) -> impl Iterator<Item = &str> {
        self.block
            .attributes
            .iter()
            .filter(|(_, attr)| attr.flags.computed)
            .map(|(name, _)| name.as_str())
    }
}

/// Everything the provider serves, by type name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ProviderSchema {
    /// The `provider "fastly"` block.
    #[serde(default)]
    pub provider: Schema,
    /// Resource schemas.
    #[serde(default)]
    pub resources: BTreeMap<String, Schema>,
    /// Data source schemas.
    #[serde(default)]
    pub data_sources: BTreeMap<String, Schema>,
}

impl ProviderSchema {
    /// No provider block, resources or data sources.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the provider block schema.
    pub fn with_provider_config(mut self, schema: Schema) -> Self {
        self.provider = schema;
        self
    }

    /// Add a resource.
    pub fn with_resource(mut self, name: impl Into<String>, schema: Schema) -> Self {
        self.resources.insert(name.into(), schema);
        self
    }

    /// Add a data source.
    pub fn with_data_source(mut self, name: impl Into<String>, schema: Schema) -> Self {
        self.data_sources.insert(name.into(), schema);
        self
    }
}

// =============================================================================
// Diagnostics
// =============================================================================

/// Whether a diagnostic blocks the operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticSeverity {
    /// The operation cannot proceed.
    Error,
    /// Reported, but the operation proceeds.
    Warning,
}

/// A message for the host to show, optionally tied to an attribute path
/// such as `backend.1.port`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Error or warning.
    pub severity: DiagnosticSeverity,
    /// One-line summary.
    pub summary: String,
    /// Longer explanation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Dotted attribute path.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attribute: Option<String>,
}

impl Diagnostic {
    fn with_severity(severity: DiagnosticSeverity, summary: impl Into<String>) -> Self {
        Self {
            severity,
            summary: summary.into(),
            detail: None,
            attribute: None,
        }
    }

    /// An error.
    pub fn error(summary: impl Into<String>) -> Self {
        Self::with_severity(DiagnosticSeverity::Error, summary)
    }

    /// A warning.
    pub fn warning(summary: impl Into<String>) -> Self {
        Self::with_severity(DiagnosticSeverity::Warning, summary)
    }

    /// Add a longer explanation.
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Tie the diagnostic to an attribute path.
    pub fn with_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.attribute = Some(attribute.into());
        self
    }

    /// Whether this is an error.
    pub fn is_error(&self) -> bool {
        self.severity == DiagnosticSeverity::Error
    }
}
