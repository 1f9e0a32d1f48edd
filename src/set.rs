//! Unordered block collections with full-value equality.
//!
//! Configuration blocks behave like a mathematical set: order never matters
//! and two blocks are the same element only when every field matches. Each
//! element is keyed by [`structural_hash`], a SHA-256 over a canonical
//! encoding of the value in which object keys are sorted and integral
//! numbers are normalised (`1` and `1.0` hash alike).

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Deterministic hex digest of a JSON value.
pub fn structural_hash(value: &Value) -> String {
    let mut hasher = Sha256::new();
    write_canonical(value, &mut hasher);
    hex::encode(hasher.finalize())
}

fn write_canonical(value: &Value, hasher: &mut Sha256) {
    match value {
        Value::Null => hasher.update(b"n"),
        Value::Bool(b) => hasher.update(if *b { b"t" } else { b"f" }),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                hasher.update(format!("i{};", i));
            } else if let Some(u) = n.as_u64() {
                hasher.update(format!("i{};", u));
            } else {
                let f = n.as_f64().unwrap_or_default();
                if f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
                    hasher.update(format!("i{};", f as i64));
                } else {
                    hasher.update(format!("d{};", f));
                }
            }
        },
        Value::String(s) => {
            hasher.update(format!("s{}:", s.len()));
            hasher.update(s.as_bytes());
        },
        Value::Array(items) => {
            hasher.update(format!("a{}[", items.len()));
            for item in items {
                write_canonical(item, hasher);
            }
            hasher.update(b"]");
        },
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            hasher.update(format!("o{}{{", keys.len()));
            for key in keys {
                hasher.update(format!("{}:", key.len()));
                hasher.update(key.as_bytes());
                write_canonical(&map[key], hasher);
            }
            hasher.update(b"}");
        },
    }
}

/// A set of block maps keyed by their structural hash.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BlockSet {
    elements: BTreeMap<String, Map<String, Value>>,
}

impl BlockSet {
    /// An empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a set from a state value. Absent, null and non-array values are
    /// the empty set; non-object elements are ignored.
    pub fn from_value(value: Option<&Value>) -> Self {
        let mut set = Self::new();
        if let Some(Value::Array(items)) = value {
            for item in items {
                if let Value::Object(map) = item {
                    set.insert(map.clone());
                }
            }
        }
        set
    }

    /// Insert an element. Duplicates collapse.
    pub fn insert(&mut self, element: Map<String, Value>) {
        let key = structural_hash(&Value::Object(element.clone()));
        self.elements.insert(key, element);
    }

    /// Elements of `self` that are not in `other`.
    pub fn difference(&self, other: &BlockSet) -> Vec<Map<String, Value>> {
        self.elements
            .iter()
            .filter(|(key, _)| !other.elements.contains_key(*key))
            .map(|(_, element)| element.clone())
            .collect()
    }

    /// Whether an element with identical content is present.
    pub fn contains(&self, element: &Map<String, Value>) -> bool {
        self.elements
            .contains_key(&structural_hash(&Value::Object(element.clone())))
    }

    /// Iterate elements in hash order.
    pub fn iter(&self) -> impl Iterator<Item = &Map<String, Value>> {
        self.elements.values()
    }

    /// Number of distinct elements.
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Whether the set has no elements.
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Map every element through `f`, collapsing elements that become equal.
    pub fn map_elements<F>(&self, mut f: F) -> BlockSet
    where
        F: FnMut(&Map<String, Value>) -> Map<String, Value>,
    {
        let mut mapped = BlockSet::new();
        for element in self.iter() {
            mapped.insert(f(element));
        }
        mapped
    }
}

impl FromIterator<Map<String, Value>> for BlockSet {
    fn from_iter<I: IntoIterator<Item = Map<String, Value>>>(iter: I) -> Self {
        let mut set = BlockSet::new();
        for element in iter {
            set.insert(element);
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_hash_ignores_key_order() {
        let a = json!({"name": "A", "address": "x"});
        let b = json!({"address": "x", "name": "A"});
        assert_eq!(structural_hash(&a), structural_hash(&b));
    }

    #[test]
    fn test_hash_normalises_integral_floats() {
        assert_eq!(structural_hash(&json!(80)), structural_hash(&json!(80.0)));
        assert_ne!(structural_hash(&json!(80)), structural_hash(&json!("80")));
    }

    #[test]
    fn test_hash_distinguishes_nesting() {
        assert_ne!(
            structural_hash(&json!(["ab"])),
            structural_hash(&json!(["a", "b"]))
        );
        assert_ne!(structural_hash(&json!(null)), structural_hash(&json!(false)));
    }

    #[test]
    fn test_difference_is_full_value() {
        let old = BlockSet::from_value(Some(&json!([{"name": "A", "address": "x"}])));
        let new = BlockSet::from_value(Some(&json!([
            {"name": "A", "address": "x"},
            {"name": "B", "address": "y"}
        ])));

        assert!(old.difference(&new).is_empty());
        let added = new.difference(&old);
        assert_eq!(added, vec![obj(json!({"name": "B", "address": "y"}))]);

        let changed = BlockSet::from_value(Some(&json!([{"name": "A", "address": "z"}])));
        assert_eq!(old.difference(&changed).len(), 1);
        assert_eq!(changed.difference(&old).len(), 1);
    }

    #[test]
    fn test_from_value_tolerates_missing() {
        assert!(BlockSet::from_value(None).is_empty());
        assert!(BlockSet::from_value(Some(&Value::Null)).is_empty());
        assert_eq!(
            BlockSet::from_value(Some(&json!([{"name": "A"}, {"name": "A"}]))).len(),
            1
        );
    }

    #[test]
    fn test_contains_and_map_elements() {
        let set: BlockSet = vec![obj(json!({"name": "A", "ttl": 0}))].into_iter().collect();
        assert!(set.contains(&obj(json!({"ttl": 0, "name": "A"}))));

        let stripped = set.map_elements(|element| {
            let mut element = element.clone();
            element.remove("ttl");
            element
        });
        assert!(stripped.contains(&obj(json!({"name": "A"}))));
    }
}
