//! The service-level WAF object of a VCL service.
//!
//! A single optional block. Its `waf_id` is what the
//! `fastly_service_waf_configuration` resource attaches rules and tuning to.

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tracing::{debug, info};

use super::{read_version, ServiceAttributeHandler};
use crate::client::{CreateWafInput, FastlyClient, ServiceDetail, UpdateWafInput, Waf};
use crate::error::{ignore_not_found, ProviderError};
use crate::resource_data::ResourceData;
use crate::schema::{Attribute, Block, NestedBlock, Schema};

/// Creates, updates or removes the service WAF.
#[derive(Debug, Clone, Copy, Default)]
pub struct ServiceWafHandler;

fn single(value: Option<&Value>) -> Option<&Map<String, Value>> {
    value
        .and_then(Value::as_array)
        .and_then(|items| items.first())
        .and_then(Value::as_object)
}

fn string_field(block: &Map<String, Value>, key: &str) -> String {
    block
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn flatten_waf(waf: &Waf) -> Map<String, Value> {
    let mut out = Map::new();
    out.insert("waf_id".to_string(), json!(waf.id));
    if !waf.response_object.is_empty() {
        out.insert("response_object".to_string(), json!(waf.response_object));
    }
    if !waf.prefetch_condition.is_empty() {
        out.insert("prefetch_condition".to_string(), json!(waf.prefetch_condition));
    }
    out.insert("disabled".to_string(), json!(waf.disabled));
    out
}

// Configured view of the block: `waf_id` is computed and `disabled` defaults
// to false, so neither alone counts as a change.
fn configured(value: Option<&Value>) -> Option<Map<String, Value>> {
    single(value).map(|block| {
        let mut out = Map::new();
        for key in ["response_object", "prefetch_condition"] {
            let value = string_field(block, key);
            if !value.is_empty() {
                out.insert(key.to_string(), json!(value));
            }
        }
        let disabled = block.get("disabled").and_then(Value::as_bool).unwrap_or(false);
        out.insert("disabled".to_string(), json!(disabled));
        out
    })
}

#[async_trait]
impl ServiceAttributeHandler for ServiceWafHandler {
    fn key(&self) -> &str {
        "waf"
    }

    fn has_change(&self, d: &ResourceData) -> bool {
        let (old, new) = d.get_change(self.key());
        configured(old) != configured(new)
    }

    async fn process(
        &self,
        d: &ResourceData,
        version: u32,
        client: &dyn FastlyClient,
    ) -> Result<(), ProviderError> {
        let service_id = d.require_id()?.to_string();
        let (old, new) = d.get_change(self.key());

        match (single(old), single(new)) {
            (None, Some(new)) => {
                let input = CreateWafInput {
                    service_id,
                    version,
                    response_object: string_field(new, "response_object"),
                    prefetch_condition: string_field(new, "prefetch_condition"),
                };
                debug!(?input, "Creating service WAF");
                let waf = client.create_waf(&input).await?;
                info!(waf_id = %waf.id, "Created service WAF");
            },
            (Some(old), Some(new)) => {
                let id = string_field(old, "waf_id");
                if id.is_empty() {
                    return Err(ProviderError::MissingAttribute("waf.waf_id".to_string()));
                }
                let changed = |key: &str| old.get(key) != new.get(key);
                let input = UpdateWafInput {
                    id,
                    service_id,
                    version,
                    response_object: changed("response_object")
                        .then(|| string_field(new, "response_object")),
                    prefetch_condition: changed("prefetch_condition")
                        .then(|| string_field(new, "prefetch_condition")),
                    disabled: Some(new.get("disabled").and_then(Value::as_bool).unwrap_or(false)),
                };
                debug!(?input, "Updating service WAF");
                client.update_waf(&input).await?;
            },
            (Some(old), None) => {
                let id = string_field(old, "waf_id");
                debug!(waf_id = %id, version, "Deleting service WAF");
                ignore_not_found(client.delete_waf(&id, version).await)?;
            },
            (None, None) => {},
        }
        Ok(())
    }

    async fn read(
        &self,
        d: &mut ResourceData,
        service: &ServiceDetail,
        client: &dyn FastlyClient,
    ) -> Result<(), ProviderError> {
        let wafs = client.list_wafs(&service.id, read_version(service)).await?;
        let blocks: Vec<Value> = wafs
            .first()
            .map(|waf| Value::Object(flatten_waf(waf)))
            .into_iter()
            .collect();
        d.set(self.key(), Value::Array(blocks));
        Ok(())
    }

    fn register(&self, schema: &mut Schema) {
        schema.insert_block(
            self.key(),
            NestedBlock::list(
                Block::new()
                    .with_attribute(
                        "response_object",
                        Attribute::required_string()
                            .with_description("Response object served when a request is blocked"),
                    )
                    .with_attribute(
                        "prefetch_condition",
                        Attribute::optional_string()
                            .with_description("Condition deciding whether the WAF runs"),
                    )
                    .with_attribute(
                        "disabled",
                        Attribute::optional_bool().with_default(json!(false)),
                    )
                    .with_attribute("waf_id", Attribute::computed_string()),
            )
            .with_max_items(1),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{CreateServiceInput, ServiceType};
    use crate::testing::FakeFastly;

    async fn vcl_service(fake: &FakeFastly) -> String {
        fake.create_service(&CreateServiceInput {
            name: "svc".into(),
            comment: String::new(),
            service_type: ServiceType::Vcl,
        })
        .await
        .unwrap()
        .id
    }

    #[tokio::test]
    async fn test_waf_create_read_delete() {
        let fake = FakeFastly::new();
        let id = vcl_service(&fake).await;

        let d = ResourceData::new(
            Some(&json!({"id": id})),
            &json!({"id": id, "waf": [{"response_object": "blocked"}]}),
        );
        ServiceWafHandler.process(&d, 1, &fake).await.unwrap();

        let detail = fake.get_service_details(&id).await.unwrap();
        let mut read = ResourceData::from_state(&json!({"id": id}));
        ServiceWafHandler.read(&mut read, &detail, &fake).await.unwrap();
        let waf = read.get("waf").unwrap()[0].clone();
        assert_eq!(waf["response_object"], "blocked");
        assert_eq!(waf["disabled"], false);
        assert!(waf["waf_id"].as_str().is_some());

        let d = ResourceData::new(Some(&json!({"id": id, "waf": [waf]})), &json!({"id": id}));
        ServiceWafHandler.process(&d, 1, &fake).await.unwrap();
        assert!(fake.list_wafs(&id, 1).await.unwrap().is_empty());
    }

    #[test]
    fn test_computed_waf_id_is_not_a_change() {
        let d = ResourceData::new(
            Some(&json!({"waf": [{"response_object": "r", "waf_id": "w1", "disabled": false}]})),
            &json!({"waf": [{"response_object": "r"}]}),
        );
        assert!(!ServiceWafHandler.has_change(&d));

        let d = ResourceData::new(
            Some(&json!({"waf": [{"response_object": "r", "waf_id": "w1"}]})),
            &json!({"waf": [{"response_object": "r", "disabled": true}]}),
        );
        assert!(ServiceWafHandler.has_change(&d));
    }

    #[tokio::test]
    async fn test_waf_update_requires_known_id() {
        let fake = FakeFastly::new();
        let d = ResourceData::new(
            Some(&json!({"id": "svc", "waf": [{"response_object": "a"}]})),
            &json!({"id": "svc", "waf": [{"response_object": "b"}]}),
        );
        let err = ServiceWafHandler.process(&d, 1, &fake).await.unwrap_err();
        assert!(matches!(err, ProviderError::MissingAttribute(_)));
    }
}
