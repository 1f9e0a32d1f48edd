//! Old/new view of one resource instance during an operation.
//!
//! The host hands the provider JSON objects: the prior state and the planned
//! state. [`ResourceData`] wraps both so handlers can ask "did `backend`
//! change?" and write refreshed values back. Comparison is set-aware: arrays
//! compare as multisets of [`structural_hash`](crate::set::structural_hash)
//! digests, and an absent key, `null`, `[]` and `{}` all mean "unset".

use serde_json::{Map, Value};

use crate::error::ProviderError;
use crate::set::structural_hash;

/// Prior and planned attribute maps plus the resource ID.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourceData {
    id: Option<String>,
    old: Map<String, Value>,
    new: Map<String, Value>,
}

impl ResourceData {
    /// Build from a prior state (if any) and the planned state.
    pub fn new(prior: Option<&Value>, planned: &Value) -> Self {
        let old = as_map(prior);
        let new = as_map(Some(planned));
        let id = id_of(&new).or_else(|| id_of(&old));
        Self { id, old, new }
    }

    /// Build for a create: nothing exists yet.
    pub fn for_create(planned: &Value) -> Self {
        let new = as_map(Some(planned));
        Self {
            id: None,
            old: Map::new(),
            new,
        }
    }

    /// Build for read/delete/import where old and new are the same state.
    pub fn from_state(state: &Value) -> Self {
        Self::new(Some(state), state)
    }

    /// The resource ID, if one has been assigned.
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// The resource ID, or an error naming the missing attribute.
    pub fn require_id(&self) -> Result<&str, ProviderError> {
        self.id()
            .ok_or_else(|| ProviderError::MissingAttribute("id".to_string()))
    }

    /// Assign the resource ID.
    pub fn set_id(&mut self, id: impl Into<String>) {
        self.id = Some(id.into());
    }

    /// Forget the resource ID. The state becomes `null` ("gone").
    pub fn clear_id(&mut self) {
        self.id = None;
    }

    /// Planned value of an attribute. `null` reads as absent.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.new.get(key).filter(|v| !v.is_null())
    }

    /// Prior value of an attribute. `null` reads as absent.
    pub fn get_old(&self, key: &str) -> Option<&Value> {
        self.old.get(key).filter(|v| !v.is_null())
    }

    /// Planned string value.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    /// Planned boolean value.
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(Value::as_bool)
    }

    /// Planned integer value. Integral floats are accepted.
    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(as_i64)
    }

    /// Planned string value, or an error naming the attribute.
    pub fn require_str(&self, key: &str) -> Result<&str, ProviderError> {
        self.get_str(key)
            .ok_or_else(|| ProviderError::MissingAttribute(key.to_string()))
    }

    /// Prior and planned values of an attribute.
    pub fn get_change(&self, key: &str) -> (Option<&Value>, Option<&Value>) {
        (self.get_old(key), self.get(key))
    }

    /// Whether the attribute differs between prior and planned state.
    pub fn has_change(&self, key: &str) -> bool {
        let (old, new) = self.get_change(key);
        !values_equal(old, new)
    }

    /// Whether there is no prior state at all.
    pub fn is_new_resource(&self) -> bool {
        self.old.is_empty()
    }

    /// Write a refreshed value into the planned side.
    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.new.insert(key.into(), value);
    }

    /// Remove an attribute from the planned side.
    pub fn remove(&mut self, key: &str) {
        self.new.remove(key);
    }

    /// The resulting state: the planned side plus `id`, or `null` if the
    /// resource is gone.
    pub fn into_state(self) -> Value {
        match self.id {
            Some(id) => {
                let mut state = self.new;
                state.insert("id".to_string(), Value::String(id));
                Value::Object(state)
            },
            None => Value::Null,
        }
    }
}

fn as_map(value: Option<&Value>) -> Map<String, Value> {
    match value {
        Some(Value::Object(map)) => map.clone(),
        _ => Map::new(),
    }
}

fn id_of(map: &Map<String, Value>) -> Option<String> {
    map.get("id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
}

/// Read a JSON number as `i64`, accepting integral floats.
pub fn as_i64(value: &Value) -> Option<i64> {
    value.as_i64().or_else(|| {
        value
            .as_f64()
            .filter(|f| f.fract() == 0.0)
            .map(|f| f as i64)
    })
}

/// Whether a value means "unset".
pub fn is_unset(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::Array(items)) => items.is_empty(),
        Some(Value::Object(map)) => map.is_empty(),
        _ => false,
    }
}

/// Set-aware equality of two optional attribute values.
pub fn values_equal(a: Option<&Value>, b: Option<&Value>) -> bool {
    match (is_unset(a), is_unset(b)) {
        (true, true) => true,
        (true, false) | (false, true) => false,
        (false, false) => match (a, b) {
            (Some(Value::Array(left)), Some(Value::Array(right))) => {
                left.len() == right.len() && sorted_digests(left) == sorted_digests(right)
            },
            (Some(left), Some(right)) => structural_hash(left) == structural_hash(right),
            _ => false,
        },
    }
}

fn sorted_digests(items: &[Value]) -> Vec<String> {
    let mut digests: Vec<String> = items.iter().map(structural_hash).collect();
    digests.sort();
    digests
}
