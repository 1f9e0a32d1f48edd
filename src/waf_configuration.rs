//! `fastly_service_waf_configuration`: tuning and active rules of a WAF.
//!
//! WAF versions are independent of service versions. Every write lands on
//! the latest WAF version (cloned first when locked) and ends with a deploy,
//! which locks it. Rules are reconciled as a set with one batch call per
//! phase.

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tracing::{debug, info, instrument, warn};

use crate::client::{FastlyClient, WafActiveRule, WafRuleStatus, WafVersion, WafVersionSettings};
use crate::error::{ignore_not_found, ProviderError};
use crate::handlers::{reconcile, RemoteCollection};
use crate::resource::Resource;
use crate::resource_data::{as_i64, ResourceData};
use crate::schema::{Attribute, AttributeFlags, AttributeType, Block, NestedBlock, Schema};
use crate::set::BlockSet;
use crate::version::latest_by_number;

const STRING_SETTINGS: [&str; 7] = [
    "allowed_http_versions",
    "allowed_methods",
    "allowed_request_content_type",
    "allowed_request_content_type_charset",
    "high_risk_country_codes",
    "restricted_extensions",
    "restricted_headers",
];

const NUMERIC_SETTINGS: [&str; 20] = [
    "arg_length",
    "arg_name_length",
    "combined_file_sizes",
    "critical_anomaly_score",
    "error_anomaly_score",
    "http_violation_score_threshold",
    "inbound_anomaly_score_threshold",
    "lfi_score_threshold",
    "max_file_size",
    "max_num_args",
    "notice_anomaly_score",
    "paranoia_level",
    "php_injection_score_threshold",
    "rce_score_threshold",
    "rfi_score_threshold",
    "session_fixation_score_threshold",
    "sql_injection_score_threshold",
    "total_arg_length",
    "warning_anomaly_score",
    "xss_score_threshold",
];

const BOOL_SETTINGS: [&str; 1] = ["crs_validate_utf8_encoding"];

/// The WAF configuration resource.
#[derive(Debug, Clone, Copy, Default)]
pub struct WafConfiguration;

impl WafConfiguration {
    fn settings_from(d: &ResourceData) -> Result<WafVersionSettings, ProviderError> {
        let mut fields = Map::new();
        for name in STRING_SETTINGS
            .iter()
            .chain(NUMERIC_SETTINGS.iter())
            .chain(BOOL_SETTINGS.iter())
        {
            if let Some(value) = d.get(name) {
                fields.insert(name.to_string(), value.clone());
            }
        }
        serde_json::from_value(Value::Object(fields)).map_err(|err| {
            ProviderError::Validation(format!("invalid WAF tuning attribute: {}", err))
        })
    }

    async fn mutable_version(
        waf_id: &str,
        client: &dyn FastlyClient,
    ) -> Result<WafVersion, ProviderError> {
        let latest = latest_waf_version(waf_id, client).await?;
        if !latest.locked {
            return Ok(latest);
        }
        let cloned = client.clone_waf_version(waf_id, latest.number).await?;
        info!(waf_id, from = latest.number, to = cloned.number, "Cloned locked WAF version");
        Ok(cloned)
    }

    /// Create and update share one path: there is nothing to create, the
    /// WAF already exists on the service.
    async fn apply(&self, d: &mut ResourceData, client: &dyn FastlyClient) -> Result<(), ProviderError> {
        let waf_id = d.require_str("waf_id")?.to_string();
        let version = Self::mutable_version(&waf_id, client).await?;

        let settings = Self::settings_from(d)?;
        debug!(waf_id = %waf_id, version = version.number, ?settings, "Updating WAF version");
        client
            .update_waf_version(&waf_id, version.number, &settings)
            .await?;

        let (old, new) = d.get_change("rule");
        let old = normalized_rules(old);
        let new = normalized_rules(new);
        if old != new {
            let target = ActiveRules {
                client,
                waf_id: &waf_id,
                number: version.number,
            };
            let report = reconcile(&old, &new, &target).await?;
            debug!(waf_id = %waf_id, ?report, "Reconciled active rules");
        }

        client.deploy_waf_version(&waf_id, version.number).await?;
        info!(waf_id = %waf_id, version = version.number, "Deployed WAF version");

        d.set_id(waf_id);
        self.read(d, client).await
    }
}

/// Latest WAF version by number; ties keep the first after a descending sort.
pub async fn latest_waf_version(
    waf_id: &str,
    client: &dyn FastlyClient,
) -> Result<WafVersion, ProviderError> {
    let versions = client.list_waf_versions(waf_id).await?;
    latest_by_number(versions, |v| v.number)
        .ok_or_else(|| ProviderError::NotFound(format!("WAF {} has no versions", waf_id)))
}

fn normalize_rule(element: &Map<String, Value>) -> Map<String, Value> {
    let mut out = Map::new();
    if let Some(id) = element.get("modsec_rule_id").and_then(as_i64) {
        out.insert("modsec_rule_id".to_string(), json!(id));
    }
    if let Some(status) = element.get("status").and_then(Value::as_str) {
        out.insert("status".to_string(), json!(status));
    }
    if let Some(revision) = element.get("revision").and_then(as_i64).filter(|r| *r > 0) {
        out.insert("revision".to_string(), json!(revision));
    }
    out
}

fn normalized_rules(value: Option<&Value>) -> BlockSet {
    BlockSet::from_value(value).map_elements(normalize_rule)
}

fn flatten_rule(rule: &WafActiveRule) -> Value {
    let element = json!({
        "modsec_rule_id": rule.modsec_rule_id,
        "status": rule.status.as_str(),
        "revision": rule.revision,
    });
    match element {
        Value::Object(map) => Value::Object(normalize_rule(&map)),
        other => other,
    }
}

fn to_active_rule(element: &Map<String, Value>) -> Result<WafActiveRule, ProviderError> {
    let modsec_rule_id = element
        .get("modsec_rule_id")
        .and_then(as_i64)
        .and_then(|id| u32::try_from(id).ok())
        .ok_or_else(|| ProviderError::Validation("rule.modsec_rule_id must be a positive integer".into()))?;
    let status = element
        .get("status")
        .and_then(Value::as_str)
        .and_then(WafRuleStatus::parse)
        .ok_or_else(|| {
            ProviderError::Validation(format!(
                "rule {} status must be one of {}",
                modsec_rule_id,
                WafRuleStatus::ALL.join(", ")
            ))
        })?;
    let revision = element
        .get("revision")
        .and_then(as_i64)
        .and_then(|r| u32::try_from(r).ok())
        .unwrap_or(0);
    Ok(WafActiveRule {
        modsec_rule_id,
        revision,
        status,
    })
}

/// Active rules of one WAF version, written in batches.
struct ActiveRules<'a> {
    client: &'a dyn FastlyClient,
    waf_id: &'a str,
    number: u32,
}

#[async_trait]
impl RemoteCollection for ActiveRules<'_> {
    fn label(&self) -> &str {
        "rule"
    }

    fn identity_field(&self) -> Option<&str> {
        None
    }

    async fn delete(&self, element: &Map<String, Value>) -> Result<(), ProviderError> {
        self.delete_batch(std::slice::from_ref(element)).await
    }

    async fn create(&self, element: &Map<String, Value>) -> Result<(), ProviderError> {
        self.create_batch(std::slice::from_ref(element)).await
    }

    async fn delete_batch(&self, elements: &[Map<String, Value>]) -> Result<(), ProviderError> {
        let rules = elements
            .iter()
            .map(to_active_rule)
            .collect::<Result<Vec<_>, _>>()?;
        debug!(waf_id = self.waf_id, version = self.number, count = rules.len(), "Deleting active rules");
        ignore_not_found(
            self.client
                .delete_waf_active_rules(self.waf_id, self.number, &rules)
                .await,
        )?;
        Ok(())
    }

    async fn create_batch(&self, elements: &[Map<String, Value>]) -> Result<(), ProviderError> {
        let rules = elements
            .iter()
            .map(to_active_rule)
            .collect::<Result<Vec<_>, _>>()?;
        debug!(waf_id = self.waf_id, version = self.number, count = rules.len(), "Creating active rules");
        self.client
            .create_waf_active_rules(self.waf_id, self.number, &rules)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl Resource for WafConfiguration {
    fn type_name(&self) -> &str {
        "fastly_service_waf_configuration"
    }

    fn schema(&self) -> Schema {
        let tuning = |attr_type: AttributeType| {
            Attribute::new(attr_type, AttributeFlags::optional_computed())
        };

        let mut schema = Schema::v0()
            .with_attribute("id", Attribute::computed_string())
            .with_attribute(
                "waf_id",
                Attribute::required_string()
                    .with_force_new()
                    .with_description("ID of the service WAF this configuration tunes"),
            );
        for name in STRING_SETTINGS {
            schema.insert_attribute(name, tuning(AttributeType::String));
        }
        for name in NUMERIC_SETTINGS {
            schema.insert_attribute(name, tuning(AttributeType::Int64).with_min_int(1));
        }
        for name in BOOL_SETTINGS {
            schema.insert_attribute(name, tuning(AttributeType::Bool));
        }

        schema.with_block(
            "rule",
            NestedBlock::set(
                Block::new()
                    .with_attribute(
                        "modsec_rule_id",
                        Attribute::required_int64().with_min_int(1),
                    )
                    .with_attribute(
                        "status",
                        Attribute::required_string().with_allowed_values(&WafRuleStatus::ALL),
                    )
                    .with_attribute(
                        "revision",
                        Attribute::new(AttributeType::Int64, AttributeFlags::optional_computed())
                            .with_min_int(1),
                    ),
            ),
        )
    }

    #[instrument(skip(self, d, client), name = "waf_configuration.create")]
    async fn create(&self, d: &mut ResourceData, client: &dyn FastlyClient) -> Result<(), ProviderError> {
        self.apply(d, client).await
    }

    #[instrument(skip(self, d, client), name = "waf_configuration.read", fields(waf_id = ?d.id()))]
    async fn read(&self, d: &mut ResourceData, client: &dyn FastlyClient) -> Result<(), ProviderError> {
        let waf_id = d.require_id()?.to_string();
        let latest = match latest_waf_version(&waf_id, client).await {
            Ok(latest) => latest,
            Err(err) if err.is_not_found() && matches!(err, ProviderError::Api(_)) => {
                warn!(waf_id = %waf_id, "WAF not found, removing from state");
                d.clear_id();
                return Ok(());
            },
            Err(err) => return Err(err),
        };

        if let Value::Object(settings) = serde_json::to_value(&latest.settings)? {
            for (name, value) in settings {
                d.set(name, value);
            }
        }

        let rules = client.list_waf_active_rules(&waf_id, latest.number).await?;
        d.set("rule", Value::Array(rules.iter().map(flatten_rule).collect()));
        d.set("waf_id", json!(waf_id));
        Ok(())
    }

    #[instrument(skip(self, d, client), name = "waf_configuration.update", fields(waf_id = ?d.id()))]
    async fn update(&self, d: &mut ResourceData, client: &dyn FastlyClient) -> Result<(), ProviderError> {
        self.apply(d, client).await
    }

    #[instrument(skip(self, d, client), name = "waf_configuration.delete", fields(waf_id = ?d.id()))]
    async fn delete(&self, d: &ResourceData, client: &dyn FastlyClient) -> Result<(), ProviderError> {
        let waf_id = d.require_id()?;
        let empty = match client.create_empty_waf_version(waf_id).await {
            Ok(version) => version,
            Err(err) if err.is_not_found() => {
                warn!(waf_id, "WAF already gone");
                return Ok(());
            },
            Err(err) => return Err(err.into()),
        };
        client.deploy_waf_version(waf_id, empty.number).await?;
        info!(waf_id, version = empty.number, "Deployed empty WAF version");
        Ok(())
    }
}
