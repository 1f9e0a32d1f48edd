//! Resource and data source contracts, and plan computation.
//!
//! Every managed object type implements [`Resource`]; every read-only lookup
//! implements [`DataSource`]. The provider routes host calls to them by type
//! name and owns everything generic: validation, planning and the conversion
//! between JSON state and [`ResourceData`].

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::client::FastlyClient;
use crate::error::ProviderError;
use crate::handlers::block::is_zero;
use crate::resource_data::{is_unset, values_equal, ResourceData};
use crate::schema::{Block, BlockNestingMode, Diagnostic, Schema};
use crate::types::{AttributeChange, PlanResult};

/// A managed Fastly object type.
#[async_trait]
pub trait Resource: Send + Sync {
    /// Type name the host addresses this resource by.
    fn type_name(&self) -> &str;

    /// Schema of the resource.
    fn schema(&self) -> Schema;

    /// Checks schema validation cannot express. Runs after schema validation.
    fn validate(&self, _config: &Value) -> Vec<Diagnostic> {
        Vec::new()
    }

    /// Create the object and assign `d`'s ID. Leaves `d` holding the
    /// refreshed state.
    async fn create(
        &self,
        d: &mut ResourceData,
        client: &dyn FastlyClient,
    ) -> Result<(), ProviderError>;

    /// Refresh `d` from the API. Clears the ID when the object is gone.
    async fn read(&self, d: &mut ResourceData, client: &dyn FastlyClient)
        -> Result<(), ProviderError>;

    /// Push the planned changes in `d`, then refresh it.
    async fn update(
        &self,
        d: &mut ResourceData,
        client: &dyn FastlyClient,
    ) -> Result<(), ProviderError>;

    /// Destroy the object. An object that is already gone counts as deleted.
    async fn delete(&self, d: &ResourceData, client: &dyn FastlyClient)
        -> Result<(), ProviderError>;

    /// Adopt an existing object by ID.
    async fn import(&self, id: &str, client: &dyn FastlyClient) -> Result<ResourceData, ProviderError> {
        let mut d = ResourceData::from_state(&serde_json::json!({ "id": id }));
        self.read(&mut d, client).await?;
        if d.id().is_none() {
            return Err(ProviderError::NotFound(format!(
                "{} {} does not exist",
                self.type_name(),
                id
            )));
        }
        Ok(d)
    }
}

/// A read-only lookup.
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Type name the host addresses this data source by.
    fn type_name(&self) -> &str;

    /// Schema of the data source.
    fn schema(&self) -> Schema;

    /// Checks schema validation cannot express.
    fn validate(&self, _config: &Value) -> Vec<Diagnostic> {
        Vec::new()
    }

    /// Run the lookup. Returns the configuration with computed attributes
    /// and `id` filled in.
    async fn read(&self, config: &Value, client: &dyn FastlyClient) -> Result<Value, ProviderError>;
}

/// Compute the plan for one resource.
///
/// Defaults fill unset attributes of the proposed state, including those of
/// every nested block element. When a prior state exists, `id` and unset
/// computed attributes are carried over from it, and a block element whose
/// configuration matches a prior element is replaced by that element so
/// its computed fields survive. A change to a force-new attribute marks the
/// plan as a replacement, in which case nothing is carried.
pub fn plan(schema: &Schema, prior: Option<&Value>, proposed: &Value) -> PlanResult {
    let prior = prior.and_then(Value::as_object).filter(|p| !p.is_empty());
    let mut planned = proposed.as_object().cloned().unwrap_or_default();
    fill_defaults(&schema.block, &mut planned);
    let configured = planned.clone();
    plan_blocks(&schema.block, prior, &mut planned);

    let Some(prior) = prior else {
        let changes = planned
            .iter()
            .filter(|(name, value)| name.as_str() != "id" && !is_unset(Some(value)))
            .map(|(name, value)| AttributeChange::added(name.clone(), value.clone()))
            .collect();
        return PlanResult::with_changes(Value::Object(planned), changes, false);
    };

    // Unset optional+computed attributes mean "keep what the API has", so
    // they are carried before diffing.
    for name in schema.computed_attributes().chain(std::iter::once("id")) {
        if is_unset(planned.get(name)) {
            if let Some(value) = prior.get(name) {
                planned.insert(name.to_string(), value.clone());
            }
        }
    }

    let changes = diff(schema, prior, &planned);
    let requires_replace = changes.iter().any(|c| schema.is_force_new(&c.path));
    if requires_replace {
        planned = configured;
        plan_blocks(&schema.block, None, &mut planned);
    }

    PlanResult::with_changes(Value::Object(planned), changes, requires_replace)
}

fn fill_defaults(block: &Block, element: &mut Map<String, Value>) {
    for (name, attr) in &block.attributes {
        if let Some(default) = &attr.default {
            if is_unset(element.get(name)) {
                element.insert(name.clone(), default.clone());
            }
        }
    }
}

fn block_elements(value: Option<&Value>) -> Vec<&Map<String, Value>> {
    match value {
        Some(Value::Array(items)) => items.iter().filter_map(Value::as_object).collect(),
        Some(Value::Object(map)) => vec![map],
        _ => Vec::new(),
    }
}

/// Plan every nested block of `block` inside `planned`.
fn plan_blocks(block: &Block, prior: Option<&Map<String, Value>>, planned: &mut Map<String, Value>) {
    for (name, nested) in &block.blocks {
        let mut unmatched = block_elements(prior.and_then(|p| p.get(name)));
        let mut plan_element = |item: &Value| -> Value {
            let Value::Object(element) = item else {
                return item.clone();
            };
            let mut element = element.clone();
            fill_defaults(&nested.block, &mut element);
            match unmatched
                .iter()
                .position(|old| same_configuration(&nested.block, &element, old))
            {
                Some(i) => Value::Object(unmatched.swap_remove(i).clone()),
                None => Value::Object(element),
            }
        };

        let value = match (nested.nesting_mode, planned.get(name)) {
            (_, Some(Value::Array(items))) => Value::Array(items.iter().map(&mut plan_element).collect()),
            (BlockNestingMode::Single, Some(item @ Value::Object(_))) => plan_element(item),
            _ => continue,
        };
        planned.insert(name.clone(), value);
    }
}

/// Whether `prior` holds what `planned` configures. Computed-only
/// attributes are ignored, as are optional+computed ones left unset. Zero
/// values count as unset on both sides.
fn same_configuration(block: &Block, planned: &Map<String, Value>, prior: &Map<String, Value>) -> bool {
    let configured = |element: &Map<String, Value>, name: &str| -> Option<Value> {
        element.get(name).filter(|v| !is_zero(v)).cloned()
    };
    let attributes_match = block.attributes.iter().all(|(name, attr)| {
        if attr.is_computed_only() {
            return true;
        }
        let after = configured(planned, name);
        if attr.flags.computed && after.is_none() {
            return true;
        }
        values_equal(after.as_ref(), configured(prior, name).as_ref())
    });
    attributes_match
        && block
            .blocks
            .keys()
            .all(|name| values_equal(planned.get(name), prior.get(name)))
}

fn diff(schema: &Schema, prior: &Map<String, Value>, planned: &Map<String, Value>) -> Vec<AttributeChange> {
    let computed_only: Vec<&str> = schema
        .block
        .attributes
        .iter()
        .filter(|(_, attr)| attr.is_computed_only())
        .map(|(name, _)| name.as_str())
        .collect();

    let mut names: Vec<&String> = prior.keys().chain(planned.keys()).collect();
    names.sort();
    names.dedup();

    names
        .into_iter()
        .filter(|name| name.as_str() != "id" && !computed_only.contains(&name.as_str()))
        .filter_map(|name| {
            let before = prior.get(name).filter(|v| !is_unset(Some(v)));
            let after = planned.get(name).filter(|v| !is_unset(Some(v)));
            if values_equal(before, after) {
                return None;
            }
            Some(AttributeChange::new(name.clone(), before.cloned(), after.cloned()))
        })
        .collect()
}
