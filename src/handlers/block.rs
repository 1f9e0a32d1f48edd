//! Table-driven handler for versioned set blocks.
//!
//! Most service blocks differ only in their field list: they are sets keyed
//! by `name`, listed/created/deleted through the generic block endpoints and
//! projected into state the same way. A [`BlockSpec`] captures the field list
//! and [`BlockHandler`] does the rest.
//!
//! Both sides of a diff go through [`BlockHandler::normalize`]: unknown and
//! computed fields are dropped, defaults fill missing fields, and zero values
//! of prunable fields are removed. The read side goes through
//! [`BlockHandler::flatten`], which applies the same pruning to what the API
//! returns, so a block that round-trips unchanged never shows up as a diff.

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::debug;

use super::{read_version, reconcile, RemoteCollection, ServiceAttributeHandler};
use crate::client::{
    BlockKind, CreateBlockInput, DeleteBlockInput, FastlyClient, RemoteBlock, ServiceDetail,
    ServiceType,
};
use crate::error::ProviderError;
use crate::resource_data::{as_i64, ResourceData};
use crate::schema::{Attribute, AttributeFlags, AttributeType, Block, NestedBlock, Schema};
use crate::set::BlockSet;

/// Type of a block field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    /// String.
    String,
    /// Unsigned count or size. Negative values are rejected before sending.
    Uint,
    /// Boolean.
    Bool,
    /// List of strings.
    StringList,
}

/// Who sets a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    /// Must be configured.
    Required,
    /// May be configured.
    Optional,
    /// Only ever set by the API.
    Computed,
}

/// Default for an optional field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldDefault {
    /// String default.
    Str(&'static str),
    /// Integer default.
    Int(i64),
    /// Boolean default.
    Bool(bool),
}

impl FieldDefault {
    fn to_value(self) -> Value {
        match self {
            Self::Str(s) => Value::String(s.to_string()),
            Self::Int(i) => Value::from(i),
            Self::Bool(b) => Value::Bool(b),
        }
    }
}

/// One field of a block.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldSpec {
    /// State and request field name.
    pub name: &'static str,
    /// Field name in API responses, when it differs (e.g. `id` for `acl_id`).
    pub source: &'static str,
    /// Value type.
    pub field_type: FieldType,
    /// Who sets the field.
    pub presence: Presence,
    /// Zero is a meaningful value and is never pruned.
    pub keep_zero: bool,
    /// Only exists on VCL services.
    pub vcl_only: bool,
    /// Hidden in plans and logs.
    pub sensitive: bool,
    /// Default for an unset optional field.
    pub default: Option<FieldDefault>,
    /// Closed set of accepted values (empty = any).
    pub allowed: &'static [&'static str],
    /// Human-readable description.
    pub description: &'static str,
}

impl FieldSpec {
    const fn base(name: &'static str, field_type: FieldType, presence: Presence) -> Self {
        Self {
            name,
            source: name,
            field_type,
            presence,
            keep_zero: false,
            vcl_only: false,
            sensitive: false,
            default: None,
            allowed: &[],
            description: "",
        }
    }

    /// A required field.
    pub const fn required(name: &'static str, field_type: FieldType) -> Self {
        Self::base(name, field_type, Presence::Required)
    }

    /// An optional field.
    pub const fn optional(name: &'static str, field_type: FieldType) -> Self {
        Self::base(name, field_type, Presence::Optional)
    }

    /// A field only the API sets, read from `source` in responses.
    pub const fn computed(name: &'static str, source: &'static str) -> Self {
        let mut spec = Self::base(name, FieldType::String, Presence::Computed);
        spec.source = source;
        spec
    }

    /// Never prune this field at zero.
    pub const fn keep_zero(mut self) -> Self {
        self.keep_zero = true;
        self
    }

    /// Drop this field on compute services.
    pub const fn vcl_only(mut self) -> Self {
        self.vcl_only = true;
        self
    }

    /// Mark the field sensitive.
    pub const fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    /// String default.
    pub const fn default_str(mut self, value: &'static str) -> Self {
        self.default = Some(FieldDefault::Str(value));
        self
    }

    /// Integer default.
    pub const fn default_int(mut self, value: i64) -> Self {
        self.default = Some(FieldDefault::Int(value));
        self
    }

    /// Boolean default.
    pub const fn default_bool(mut self, value: bool) -> Self {
        self.default = Some(FieldDefault::Bool(value));
        self
    }

    /// Restrict to a closed set of values.
    pub const fn one_of(mut self, values: &'static [&'static str]) -> Self {
        self.allowed = values;
        self
    }

    /// Set the description.
    pub const fn describe(mut self, description: &'static str) -> Self {
        self.description = description;
        self
    }

    /// Fields with a default or `keep_zero` keep their zero values.
    pub fn prunable(&self) -> bool {
        !self.keep_zero && self.default.is_none()
    }

    fn applies_to(&self, service_type: ServiceType) -> bool {
        !(self.vcl_only && service_type == ServiceType::Wasm)
    }

    fn attribute(&self) -> Attribute {
        let attr_type = match self.field_type {
            FieldType::String => AttributeType::String,
            FieldType::Uint => AttributeType::Int64,
            FieldType::Bool => AttributeType::Bool,
            FieldType::StringList => AttributeType::list(AttributeType::String),
        };
        let flags = match self.presence {
            Presence::Required => AttributeFlags::required(),
            Presence::Optional => AttributeFlags::optional(),
            Presence::Computed => AttributeFlags::computed(),
        };
        let mut attr = Attribute::new(attr_type, flags).with_description(self.description);
        if self.sensitive {
            attr = attr.sensitive();
        }
        if let Some(default) = self.default {
            attr = attr.with_default(default.to_value());
        }
        if !self.allowed.is_empty() {
            attr = attr.with_allowed_values(self.allowed);
        }
        if self.field_type == FieldType::Uint {
            attr = attr.with_min_int(0);
        }
        attr
    }
}

/// Field table and endpoint of one block type.
#[derive(Debug, Clone, Copy)]
pub struct BlockSpec {
    /// Schema attribute name.
    pub key: &'static str,
    /// Remote collection.
    pub kind: BlockKind,
    /// Fields in declaration order.
    pub fields: &'static [FieldSpec],
    /// Logging endpoint: compute services send `placement = "none"`.
    pub logging: bool,
    /// Human-readable description.
    pub description: &'static str,
}

/// Whether a value is the zero value of its type.
pub fn is_zero(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
    }
}

/// Remove every zero-valued entry of `map`.
pub fn prune(map: &Map<String, Value>) -> Map<String, Value> {
    map.iter()
        .filter(|(_, v)| !is_zero(v))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

/// A set-block handler driven by a [`BlockSpec`].
#[derive(Debug, Clone, Copy)]
pub struct BlockHandler {
    spec: &'static BlockSpec,
    service_type: ServiceType,
}

impl BlockHandler {
    /// Handler for `spec` on a service of `service_type`.
    pub fn new(spec: &'static BlockSpec, service_type: ServiceType) -> Self {
        Self { spec, service_type }
    }

    /// Remote collection this handler reconciles.
    pub fn kind(&self) -> BlockKind {
        self.spec.kind
    }

    fn fields(&self) -> impl Iterator<Item = &'static FieldSpec> + '_ {
        self.spec
            .fields
            .iter()
            .filter(move |f| f.applies_to(self.service_type))
    }

    /// Canonical configured form of a block: schema fields only, computed
    /// fields dropped, defaults applied, prunable zeros removed.
    pub fn normalize(&self, element: &Map<String, Value>) -> Map<String, Value> {
        let mut out = Map::new();
        for field in self.fields() {
            if field.presence == Presence::Computed {
                continue;
            }
            let value = match element.get(field.name).filter(|v| !v.is_null()) {
                Some(v) => coerce(field, v),
                None => match field.default {
                    Some(default) => default.to_value(),
                    None => continue,
                },
            };
            if field.prunable() && is_zero(&value) {
                continue;
            }
            out.insert(field.name.to_string(), value);
        }
        out
    }

    /// Project an API response into state: every applicable field read from
    /// its source name, prunable zeros removed.
    pub fn flatten(&self, remote: &RemoteBlock) -> Map<String, Value> {
        let mut out = Map::new();
        for field in self.fields() {
            let Some(value) = remote.get(field.source).filter(|v| !v.is_null()) else {
                continue;
            };
            let value = coerce(field, value);
            if field.prunable() && is_zero(&value) {
                continue;
            }
            out.insert(field.name.to_string(), value);
        }
        out
    }

    /// Request body for creating `element` (already normalized).
    pub fn build_create(&self, element: &Map<String, Value>) -> Result<RemoteBlock, ProviderError> {
        let mut fields = RemoteBlock::new();
        for field in self.fields() {
            let Some(value) = element.get(field.name) else {
                continue;
            };
            if field.field_type == FieldType::Uint {
                match as_i64(value) {
                    Some(n) if n >= 0 => {
                        fields.insert(field.name.to_string(), Value::from(n as u64));
                    },
                    _ => {
                        return Err(ProviderError::Validation(format!(
                            "{}.{} must be a non-negative integer, got {}",
                            self.spec.key, field.name, value
                        )))
                    },
                }
            } else {
                fields.insert(field.name.to_string(), value.clone());
            }
        }
        if self.spec.logging && self.service_type == ServiceType::Wasm {
            fields.insert("placement".to_string(), Value::String("none".to_string()));
        }
        Ok(fields)
    }

    fn normalized_set(&self, value: Option<&Value>) -> BlockSet {
        BlockSet::from_value(value).map_elements(|element| self.normalize(element))
    }
}

fn coerce(field: &FieldSpec, value: &Value) -> Value {
    match field.field_type {
        FieldType::Uint => as_i64(value).map(Value::from).unwrap_or_else(|| value.clone()),
        _ => value.clone(),
    }
}

/// The generic block endpoints bound to one service version.
struct VersionedBlocks<'a> {
    handler: &'a BlockHandler,
    client: &'a dyn FastlyClient,
    service_id: &'a str,
    version: u32,
}

#[async_trait]
impl RemoteCollection for VersionedBlocks<'_> {
    fn label(&self) -> &str {
        self.handler.spec.key
    }

    async fn delete(&self, element: &Map<String, Value>) -> Result<(), ProviderError> {
        let input = DeleteBlockInput {
            service_id: self.service_id.to_string(),
            version: self.version,
            name: element
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        };
        debug!(block = self.label(), name = %input.name, version = self.version, "Deleting block");
        self.client.delete_block(self.handler.kind(), &input).await?;
        Ok(())
    }

    async fn create(&self, element: &Map<String, Value>) -> Result<(), ProviderError> {
        let input = CreateBlockInput {
            service_id: self.service_id.to_string(),
            version: self.version,
            fields: self.handler.build_create(element)?,
        };
        debug!(block = self.label(), fields = ?input.fields, version = self.version, "Creating block");
        self.client.create_block(self.handler.kind(), &input).await?;
        Ok(())
    }
}

#[async_trait]
impl ServiceAttributeHandler for BlockHandler {
    fn key(&self) -> &str {
        self.spec.key
    }

    fn has_change(&self, d: &ResourceData) -> bool {
        let (old, new) = d.get_change(self.key());
        self.normalized_set(old) != self.normalized_set(new)
    }

    async fn process(
        &self,
        d: &ResourceData,
        version: u32,
        client: &dyn FastlyClient,
    ) -> Result<(), ProviderError> {
        let (old, new) = d.get_change(self.key());
        let old = self.normalized_set(old);
        let new = self.normalized_set(new);
        let target = VersionedBlocks {
            handler: self,
            client,
            service_id: d.require_id()?,
            version,
        };
        let report = reconcile(&old, &new, &target).await?;
        debug!(block = self.key(), ?report, "Reconciled block");
        Ok(())
    }

    async fn read(
        &self,
        d: &mut ResourceData,
        service: &ServiceDetail,
        client: &dyn FastlyClient,
    ) -> Result<(), ProviderError> {
        let version = read_version(service);
        let remote = client
            .list_blocks(self.kind(), &service.id, version)
            .await?;
        let flattened: Vec<Value> = remote
            .iter()
            .map(|block| Value::Object(self.flatten(block)))
            .collect();
        d.set(self.key(), Value::Array(flattened));
        Ok(())
    }

    fn register(&self, schema: &mut Schema) {
        let mut block = Block::new().with_description(self.spec.description);
        for field in self.fields() {
            block = block.with_attribute(field.name, field.attribute());
        }
        schema.insert_block(self.key(), NestedBlock::set(block));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::catalog::{ACL, BACKEND};
    use crate::handlers::logging::LOGGING_DIGITALOCEAN;
    use serde_json::json;

    fn obj(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_normalize_applies_defaults_and_prunes() {
        let handler = BlockHandler::new(&BACKEND, ServiceType::Vcl);
        let normalized = handler.normalize(&obj(json!({
            "name": "origin",
            "address": "example.com",
            "ssl_hostname": "",
            "bogus": "ignored"
        })));

        assert_eq!(normalized["port"], json!(80));
        assert_eq!(normalized["weight"], json!(100));
        assert!(!normalized.contains_key("ssl_hostname"));
        assert!(!normalized.contains_key("bogus"));
    }

    #[test]
    fn test_keep_zero_fields_survive() {
        let handler = BlockHandler::new(&BACKEND, ServiceType::Vcl);
        let normalized = handler.normalize(&obj(json!({
            "name": "origin",
            "address": "example.com",
            "weight": 0
        })));
        assert_eq!(normalized["weight"], json!(0));

        let flattened = handler.flatten(&obj(json!({
            "name": "origin",
            "address": "example.com",
            "weight": 0,
            "ssl_check_cert": false,
            "shield": ""
        })));
        assert_eq!(flattened["weight"], json!(0));
        assert_eq!(flattened["ssl_check_cert"], json!(false));
        assert!(!flattened.contains_key("shield"));
    }

    #[test]
    fn test_flatten_of_created_block_matches_prune() {
        let handler = BlockHandler::new(&LOGGING_DIGITALOCEAN, ServiceType::Vcl);
        let configured = handler.normalize(&obj(json!({
            "name": "spaces",
            "bucket_name": "logs",
            "access_key": "ak",
            "secret_key": "sk",
            "path": "",
            "public_key": ""
        })));
        let request = handler.build_create(&configured).unwrap();

        assert_eq!(handler.flatten(&request), prune(&configured));
        assert_eq!(handler.flatten(&request), configured);
    }

    #[test]
    fn test_computed_fields_are_read_not_diffed() {
        let handler = BlockHandler::new(&ACL, ServiceType::Vcl);
        let from_state = obj(json!({"name": "blocklist", "acl_id": "acl-1"}));
        let from_config = obj(json!({"name": "blocklist"}));
        assert_eq!(handler.normalize(&from_state), handler.normalize(&from_config));

        let flattened = handler.flatten(&obj(json!({"name": "blocklist", "id": "acl-1"})));
        assert_eq!(flattened, from_state);
    }

    #[test]
    fn test_has_change_ignores_computed_and_defaults() {
        let handler = BlockHandler::new(&ACL, ServiceType::Vcl);
        let d = ResourceData::new(
            Some(&json!({"acl": [{"name": "blocklist", "acl_id": "acl-1"}]})),
            &json!({"acl": [{"name": "blocklist"}]}),
        );
        assert!(!handler.has_change(&d));

        let handler = BlockHandler::new(&BACKEND, ServiceType::Vcl);
        let d = ResourceData::new(
            Some(&json!({"backend": [{"name": "o", "address": "a", "port": 80}]})),
            &json!({"backend": [{"name": "o", "address": "a"}]}),
        );
        assert!(!handler.has_change(&d));
    }

    #[test]
    fn test_compute_logging_drops_vcl_fields() {
        let handler = BlockHandler::new(&LOGGING_DIGITALOCEAN, ServiceType::Wasm);
        let configured = handler.normalize(&obj(json!({
            "name": "spaces",
            "bucket_name": "logs",
            "access_key": "ak",
            "secret_key": "sk",
            "format": "%h"
        })));
        assert!(!configured.contains_key("format"));
        assert!(!configured.contains_key("format_version"));

        let request = handler.build_create(&configured).unwrap();
        assert_eq!(request["placement"], json!("none"));

        let mut schema = Schema::v0();
        handler.register(&mut schema);
        let block = &schema.block.blocks["logging_digitalocean"].block;
        assert!(!block.attributes.contains_key("response_condition"));
        assert!(block.attributes["secret_key"].flags.sensitive);
    }

    #[test]
    fn test_build_create_rejects_negative_counts() {
        let handler = BlockHandler::new(&BACKEND, ServiceType::Vcl);
        let element = obj(json!({"name": "origin", "address": "x", "port": -1}));
        let err = handler.build_create(&element).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::ValidationFailed);
    }
}
