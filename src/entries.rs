//! Versionless container contents: ACL entries and dictionary items.
//!
//! ACLs and dictionaries are declared on a service version, but what they
//! hold is edited live, without cloning or activating anything. Both
//! resources are identified by `<service_id>/<container_id>`.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tracing::{debug, info, instrument, warn};

use crate::client::{AclEntry, CreateAclEntryInput, DictionaryItem, FastlyClient};
use crate::error::{ignore_not_found, ProviderError};
use crate::handlers::{reconcile, RemoteCollection};
use crate::resource::Resource;
use crate::resource_data::ResourceData;
use crate::schema::{Attribute, AttributeFlags, AttributeType, Block, NestedBlock, Schema};
use crate::set::{structural_hash, BlockSet};

fn compound_id(service_id: &str, container_id: &str) -> String {
    format!("{}/{}", service_id, container_id)
}

fn split_id(id: &str) -> Result<(&str, &str), ProviderError> {
    match id.split_once('/') {
        Some((service, container)) if !service.is_empty() && !container.is_empty() => {
            Ok((service, container))
        },
        _ => Err(ProviderError::InvalidRequest(format!(
            "expected an ID of the form <service_id>/<container_id>, got {:?}",
            id
        ))),
    }
}

// =============================================================================
// ACL entries
// =============================================================================

/// `fastly_service_acl_entries_v1`.
#[derive(Debug, Clone, Copy, Default)]
pub struct AclEntries;

fn normalize_entry(element: &Map<String, Value>) -> Map<String, Value> {
    let mut out = Map::new();
    for key in ["ip", "subnet", "comment"] {
        if let Some(value) = element.get(key).and_then(Value::as_str).filter(|v| !v.is_empty()) {
            out.insert(key.to_string(), json!(value));
        }
    }
    let negated = element.get("negated").and_then(Value::as_bool).unwrap_or(false);
    out.insert("negated".to_string(), json!(negated));
    out
}

fn flatten_entry(entry: &AclEntry) -> Value {
    let mut out = normalize_entry(&Map::from_iter([
        ("ip".to_string(), json!(entry.ip)),
        ("subnet".to_string(), json!(entry.subnet)),
        ("comment".to_string(), json!(entry.comment)),
        ("negated".to_string(), json!(entry.negated)),
    ]));
    out.insert("id".to_string(), json!(entry.id));
    Value::Object(out)
}

fn entry_set(value: Option<&Value>) -> BlockSet {
    BlockSet::from_value(value).map_elements(normalize_entry)
}

/// The live entries of one ACL.
struct AclTarget<'a> {
    client: &'a dyn FastlyClient,
    service_id: &'a str,
    acl_id: &'a str,
    /// Entry IDs from prior state, keyed by the normalized entry's hash.
    known_ids: BTreeMap<String, String>,
}

impl AclTarget<'_> {
    async fn resolve_id(&self, element: &Map<String, Value>) -> Result<Option<String>, ProviderError> {
        let key = structural_hash(&Value::Object(element.clone()));
        if let Some(id) = self.known_ids.get(&key) {
            return Ok(Some(id.clone()));
        }
        let remote = self
            .client
            .list_acl_entries(self.service_id, self.acl_id)
            .await?;
        Ok(remote
            .into_iter()
            .find(|entry| {
                structural_hash(&flatten_without_id(entry)) == key
            })
            .map(|entry| entry.id))
    }
}

fn flatten_without_id(entry: &AclEntry) -> Value {
    let mut value = flatten_entry(entry);
    if let Value::Object(map) = &mut value {
        map.remove("id");
    }
    value
}

#[async_trait]
impl RemoteCollection for AclTarget<'_> {
    fn label(&self) -> &str {
        "entry"
    }

    fn identity_field(&self) -> Option<&str> {
        Some("ip")
    }

    async fn delete(&self, element: &Map<String, Value>) -> Result<(), ProviderError> {
        let Some(entry_id) = self.resolve_id(element).await? else {
            debug!(acl_id = self.acl_id, ?element, "Entry already absent");
            return Ok(());
        };
        debug!(acl_id = self.acl_id, entry_id = %entry_id, "Deleting ACL entry");
        ignore_not_found(
            self.client
                .delete_acl_entry(self.service_id, self.acl_id, &entry_id)
                .await,
        )?;
        Ok(())
    }

    async fn create(&self, element: &Map<String, Value>) -> Result<(), ProviderError> {
        let field = |key: &str| {
            element
                .get(key)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };
        let input = CreateAclEntryInput {
            service_id: self.service_id.to_string(),
            acl_id: self.acl_id.to_string(),
            ip: field("ip"),
            subnet: field("subnet"),
            negated: element.get("negated").and_then(Value::as_bool).unwrap_or(false),
            comment: field("comment"),
        };
        debug!(?input, "Creating ACL entry");
        self.client.create_acl_entry(&input).await?;
        Ok(())
    }
}

impl AclEntries {
    async fn apply(&self, d: &mut ResourceData, client: &dyn FastlyClient) -> Result<(), ProviderError> {
        let service_id = d.require_str("service_id")?.to_string();
        let acl_id = d.require_str("acl_id")?.to_string();

        let (old, new) = d.get_change("entry");
        let known_ids = old
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(Value::as_object)
            .filter_map(|element| {
                let id = element.get("id").and_then(Value::as_str)?;
                let key = structural_hash(&Value::Object(normalize_entry(element)));
                Some((key, id.to_string()))
            })
            .collect();
        let old = entry_set(old);
        let new = entry_set(new);

        let target = AclTarget {
            client,
            service_id: &service_id,
            acl_id: &acl_id,
            known_ids,
        };
        let report = reconcile(&old, &new, &target).await?;
        info!(acl_id = %acl_id, deleted = report.deleted, created = report.created, "Reconciled ACL entries");

        d.set_id(compound_id(&service_id, &acl_id));
        self.read(d, client).await
    }
}

#[async_trait]
impl Resource for AclEntries {
    fn type_name(&self) -> &str {
        "fastly_service_acl_entries_v1"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_attribute("id", Attribute::computed_string())
            .with_attribute("service_id", Attribute::required_string().with_force_new())
            .with_attribute("acl_id", Attribute::required_string().with_force_new())
            .with_block(
                "entry",
                NestedBlock::set(
                    Block::new()
                        .with_attribute("ip", Attribute::required_string())
                        .with_attribute("subnet", Attribute::optional_string())
                        .with_attribute(
                            "negated",
                            Attribute::optional_bool().with_default(json!(false)),
                        )
                        .with_attribute("comment", Attribute::optional_string())
                        .with_attribute("id", Attribute::computed_string()),
                ),
            )
    }

    #[instrument(skip(self, d, client), name = "acl_entries.create")]
    async fn create(&self, d: &mut ResourceData, client: &dyn FastlyClient) -> Result<(), ProviderError> {
        self.apply(d, client).await
    }

    #[instrument(skip(self, d, client), name = "acl_entries.read", fields(id = ?d.id()))]
    async fn read(&self, d: &mut ResourceData, client: &dyn FastlyClient) -> Result<(), ProviderError> {
        let (service_id, acl_id) = {
            let (s, a) = split_id(d.require_id()?)?;
            (s.to_string(), a.to_string())
        };
        let entries = match client.list_acl_entries(&service_id, &acl_id).await {
            Ok(entries) => entries,
            Err(err) if err.is_not_found() => {
                warn!(acl_id = %acl_id, "ACL not found, removing from state");
                d.clear_id();
                return Ok(());
            },
            Err(err) => return Err(err.into()),
        };
        d.set("service_id", json!(service_id));
        d.set("acl_id", json!(acl_id));
        d.set("entry", Value::Array(entries.iter().map(flatten_entry).collect()));
        Ok(())
    }

    #[instrument(skip(self, d, client), name = "acl_entries.update", fields(id = ?d.id()))]
    async fn update(&self, d: &mut ResourceData, client: &dyn FastlyClient) -> Result<(), ProviderError> {
        self.apply(d, client).await
    }

    #[instrument(skip(self, d, client), name = "acl_entries.delete", fields(id = ?d.id()))]
    async fn delete(&self, d: &ResourceData, client: &dyn FastlyClient) -> Result<(), ProviderError> {
        let service_id = d.require_str("service_id")?;
        let acl_id = d.require_str("acl_id")?;
        for element in d.get("entry").and_then(Value::as_array).into_iter().flatten() {
            if let Some(entry_id) = element.get("id").and_then(Value::as_str) {
                ignore_not_found(client.delete_acl_entry(service_id, acl_id, entry_id).await)?;
            }
        }
        Ok(())
    }
}

// =============================================================================
// Dictionary items
// =============================================================================

/// `fastly_service_dictionary_items_v1`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DictionaryItems;

fn string_map(value: Option<&Value>) -> BTreeMap<String, String> {
    value
        .and_then(Value::as_object)
        .map(|map| {
            map.iter()
                .filter_map(|(k, v)| v.as_str().map(|v| (k.clone(), v.to_string())))
                .collect()
        })
        .unwrap_or_default()
}

impl DictionaryItems {
    async fn apply(&self, d: &mut ResourceData, client: &dyn FastlyClient) -> Result<(), ProviderError> {
        let service_id = d.require_str("service_id")?.to_string();
        let dictionary_id = d.require_str("dictionary_id")?.to_string();
        let (old, new) = d.get_change("items");
        let old = string_map(old);
        let new = string_map(new);

        for key in old.keys().filter(|k| !new.contains_key(*k)) {
            debug!(dictionary_id = %dictionary_id, key = %key, "Deleting dictionary item");
            ignore_not_found(
                client
                    .delete_dictionary_item(&service_id, &dictionary_id, key)
                    .await,
            )?;
        }

        for (key, value) in &new {
            let item = DictionaryItem {
                key: key.clone(),
                value: value.clone(),
            };
            match old.get(key) {
                None => {
                    debug!(dictionary_id = %dictionary_id, key = %key, "Creating dictionary item");
                    client
                        .create_dictionary_item(&service_id, &dictionary_id, &item)
                        .await?;
                },
                Some(previous) if previous != value => {
                    debug!(dictionary_id = %dictionary_id, key = %key, "Updating dictionary item");
                    client
                        .update_dictionary_item(&service_id, &dictionary_id, &item)
                        .await?;
                },
                Some(_) => {},
            }
        }

        d.set_id(compound_id(&service_id, &dictionary_id));
        self.read(d, client).await
    }
}

#[async_trait]
impl Resource for DictionaryItems {
    fn type_name(&self) -> &str {
        "fastly_service_dictionary_items_v1"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_attribute("id", Attribute::computed_string())
            .with_attribute("service_id", Attribute::required_string().with_force_new())
            .with_attribute("dictionary_id", Attribute::required_string().with_force_new())
            .with_attribute(
                "items",
                Attribute::new(
                    AttributeType::map(AttributeType::String),
                    AttributeFlags::optional(),
                ),
            )
    }

    #[instrument(skip(self, d, client), name = "dictionary_items.create")]
    async fn create(&self, d: &mut ResourceData, client: &dyn FastlyClient) -> Result<(), ProviderError> {
        self.apply(d, client).await
    }

    #[instrument(skip(self, d, client), name = "dictionary_items.read", fields(id = ?d.id()))]
    async fn read(&self, d: &mut ResourceData, client: &dyn FastlyClient) -> Result<(), ProviderError> {
        let (service_id, dictionary_id) = {
            let (s, i) = split_id(d.require_id()?)?;
            (s.to_string(), i.to_string())
        };
        let items = match client.list_dictionary_items(&service_id, &dictionary_id).await {
            Ok(items) => items,
            Err(err) if err.is_not_found() => {
                warn!(dictionary_id = %dictionary_id, "Dictionary not found, removing from state");
                d.clear_id();
                return Ok(());
            },
            Err(err) => return Err(err.into()),
        };
        let map: Map<String, Value> = items
            .into_iter()
            .map(|item| (item.key, Value::String(item.value)))
            .collect();
        d.set("service_id", json!(service_id));
        d.set("dictionary_id", json!(dictionary_id));
        d.set("items", Value::Object(map));
        Ok(())
    }

    #[instrument(skip(self, d, client), name = "dictionary_items.update", fields(id = ?d.id()))]
    async fn update(&self, d: &mut ResourceData, client: &dyn FastlyClient) -> Result<(), ProviderError> {
        self.apply(d, client).await
    }

    #[instrument(skip(self, d, client), name = "dictionary_items.delete", fields(id = ?d.id()))]
    async fn delete(&self, d: &ResourceData, client: &dyn FastlyClient) -> Result<(), ProviderError> {
        let service_id = d.require_str("service_id")?;
        let dictionary_id = d.require_str("dictionary_id")?;
        for key in string_map(d.get("items")).keys() {
            ignore_not_found(
                client
                    .delete_dictionary_item(service_id, dictionary_id, key)
                    .await,
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeFastly;
    use crate::error::ClientError;

    #[test]
    fn test_split_id() {
        assert_eq!(split_id("svc/acl").unwrap(), ("svc", "acl"));
        assert!(split_id("svc").is_err());
        assert!(split_id("/acl").is_err());
    }

    #[test]
    fn test_entry_normalization_ignores_id_and_defaults() {
        let from_state = json!([{"id": "e1", "ip": "10.0.0.1", "negated": false, "subnet": ""}]);
        let from_config = json!([{"ip": "10.0.0.1"}]);
        assert_eq!(entry_set(Some(&from_state)), entry_set(Some(&from_config)));
    }

    #[tokio::test]
    async fn test_acl_entries_lifecycle() {
        let fake = FakeFastly::new();
        let acl_id = fake.seed_acl("svc", "blocklist");

        let mut d = ResourceData::for_create(&json!({
            "service_id": "svc",
            "acl_id": acl_id,
            "entry": [{"ip": "10.0.0.1"}, {"ip": "10.0.0.2", "subnet": "24"}]
        }));
        AclEntries.create(&mut d, &fake).await.unwrap();
        assert_eq!(d.id(), Some(format!("svc/{}", acl_id).as_str()));
        assert_eq!(d.get("entry").unwrap().as_array().unwrap().len(), 2);

        let prior = d.into_state();
        let mut planned = prior.clone();
        planned["entry"] = json!([{"ip": "10.0.0.2", "subnet": "24"}]);
        let mut d = ResourceData::new(Some(&prior), &planned);
        AclEntries.update(&mut d, &fake).await.unwrap();

        assert_eq!(fake.calls_named("delete_acl_entry").len(), 1);
        assert_eq!(fake.calls_named("create_acl_entry").len(), 2);
        assert_eq!(d.get("entry").unwrap().as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_acl_entry_delete_tolerates_not_found() {
        let fake = FakeFastly::new();
        let acl_id = fake.seed_acl("svc", "blocklist");
        fake.fail_next("delete_acl_entry", ClientError::not_found("entry gone"));

        let prior = json!({
            "id": format!("svc/{}", acl_id),
            "service_id": "svc",
            "acl_id": acl_id,
            "entry": [{"id": "e-1", "ip": "10.0.0.9", "negated": false}]
        });
        let mut planned = prior.clone();
        planned["entry"] = json!([]);
        let mut d = ResourceData::new(Some(&prior), &planned);
        AclEntries.update(&mut d, &fake).await.unwrap();
        assert_eq!(fake.calls_named("delete_acl_entry").len(), 1);
    }

    #[tokio::test]
    async fn test_dictionary_item_diff() {
        let fake = FakeFastly::new();
        let dictionary_id = fake.seed_dictionary("svc", "flags");

        let mut d = ResourceData::for_create(&json!({
            "service_id": "svc",
            "dictionary_id": dictionary_id,
            "items": {"a": "1", "b": "2"}
        }));
        DictionaryItems.create(&mut d, &fake).await.unwrap();

        let prior = d.into_state();
        let mut planned = prior.clone();
        planned["items"] = json!({"b": "3", "c": "4"});
        let mut d = ResourceData::new(Some(&prior), &planned);
        DictionaryItems.update(&mut d, &fake).await.unwrap();

        assert_eq!(fake.calls_named("delete_dictionary_item").len(), 1);
        assert_eq!(fake.calls_named("update_dictionary_item").len(), 1);
        assert_eq!(fake.calls_named("create_dictionary_item").len(), 3);
        assert_eq!(d.get("items"), Some(&json!({"b": "3", "c": "4"})));
    }

    #[tokio::test]
    async fn test_read_of_missing_dictionary_clears_id() {
        let fake = FakeFastly::new();
        let mut d = ResourceData::from_state(&json!({"id": "svc/none"}));
        DictionaryItems.read(&mut d, &fake).await.unwrap();
        assert!(d.id().is_none());
    }
}
