//! Read-only lookups: the WAF rule catalogue and TLS inventories.

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tracing::{debug, instrument};

use crate::client::{collect_pages, FastlyClient, ListWafRulesInput, TlsObject, TlsSubscription};
use crate::error::ProviderError;
use crate::resource::DataSource;
use crate::resource_data::as_i64;
use crate::schema::{Attribute, AttributeFlags, AttributeType, Diagnostic, Schema};
use crate::set::structural_hash;

const NO_RESULTS: &str =
    "Your query returned no results. Please change your search criteria and try again.";
const TOO_MANY_RESULTS: &str =
    "Your query returned more than one result. Please change your search criteria and try again.";

fn strings(config: &Value, key: &str) -> Vec<String> {
    config
        .get(key)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn optional_str<'a>(config: &'a Value, key: &str) -> Option<&'a str> {
    config
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

fn with_results(
    config: &Value,
    id: String,
    results: impl IntoIterator<Item = (&'static str, Value)>,
) -> Value {
    let mut out: Map<String, Value> = config.as_object().cloned().unwrap_or_default();
    out.insert("id".to_string(), Value::String(id));
    for (key, value) in results {
        out.insert(key.to_string(), value);
    }
    Value::Object(out)
}

fn ids_of<T>(items: &[T], id: impl Fn(&T) -> String) -> Vec<String> {
    let mut ids: Vec<String> = items.iter().map(id).collect();
    ids.sort();
    ids
}

// =============================================================================
// WAF rules
// =============================================================================

/// `fastly_waf_rules`.
#[derive(Debug, Clone, Copy, Default)]
pub struct WafRules;

#[async_trait]
impl DataSource for WafRules {
    fn type_name(&self) -> &str {
        "fastly_waf_rules"
    }

    fn schema(&self) -> Schema {
        let rule = AttributeType::Object(
            [
                ("modsec_rule_id".to_string(), AttributeType::Int64),
                ("latest_revision_number".to_string(), AttributeType::Int64),
                ("type".to_string(), AttributeType::String),
            ]
            .into_iter()
            .collect(),
        );
        Schema::v0()
            .with_attribute("id", Attribute::computed_string())
            .with_attribute("publishers", Attribute::optional_string_list())
            .with_attribute("tags", Attribute::optional_string_list())
            .with_attribute(
                "exclude_modsec_rule_ids",
                Attribute::new(AttributeType::list(AttributeType::Int64), AttributeFlags::optional()),
            )
            .with_attribute(
                "rules",
                Attribute::new(AttributeType::list(rule), AttributeFlags::computed()),
            )
    }

    fn validate(&self, config: &Value) -> Vec<Diagnostic> {
        config
            .get("exclude_modsec_rule_ids")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter(|id| as_i64(id).and_then(|n| u32::try_from(n).ok()).is_none())
            .map(|id| {
                Diagnostic::error("Invalid rule ID")
                    .with_detail(format!("{} is not a valid ModSecurity rule ID", id))
                    .with_attribute("exclude_modsec_rule_ids")
            })
            .collect()
    }

    #[instrument(skip(self, config, client), name = "waf_rules.read")]
    async fn read(&self, config: &Value, client: &dyn FastlyClient) -> Result<Value, ProviderError> {
        let input = ListWafRulesInput {
            publishers: strings(config, "publishers"),
            tags: strings(config, "tags"),
            exclude_modsec_rule_ids: config
                .get("exclude_modsec_rule_ids")
                .and_then(Value::as_array)
                .into_iter()
                .flatten()
                .filter_map(as_i64)
                .filter_map(|n| u32::try_from(n).ok())
                .collect(),
        };
        debug!(?input, "Listing WAF rules");
        let rules = client.list_waf_rules(&input).await?;

        let flattened: Vec<Value> = rules
            .iter()
            .map(|rule| {
                let mut element = Map::new();
                element.insert("modsec_rule_id".to_string(), json!(rule.modsec_rule_id));
                element.insert(
                    "latest_revision_number".to_string(),
                    json!(rule.revisions.iter().copied().max().unwrap_or(1)),
                );
                if !rule.rule_type.is_empty() {
                    element.insert("type".to_string(), json!(rule.rule_type));
                }
                Value::Object(element)
            })
            .collect();

        let id = structural_hash(&json!({
            "publishers": input.publishers,
            "tags": input.tags,
            "exclude_modsec_rule_ids": input.exclude_modsec_rule_ids,
        }));
        Ok(with_results(config, id, [("rules", Value::Array(flattened))]))
    }
}

// =============================================================================
// TLS ID listings
// =============================================================================

/// Which paginated TLS listing a [`TlsIds`] data source drains.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsListing {
    /// Customer-uploaded certificates.
    Certificates,
    /// Platform certificates.
    PlatformCertificates,
    /// TLS configurations.
    Configurations,
    /// TLS subscriptions.
    Subscriptions,
}

/// `fastly_tls_*_ids`: every ID of one TLS listing.
#[derive(Debug, Clone, Copy)]
pub struct TlsIds {
    listing: TlsListing,
}

impl TlsIds {
    /// A data source over `listing`.
    pub fn new(listing: TlsListing) -> Self {
        Self { listing }
    }

    async fn fetch(&self, client: &dyn FastlyClient) -> Result<Vec<String>, ProviderError> {
        let object_id = |o: &TlsObject| o.id.clone();
        let ids = match self.listing {
            TlsListing::Certificates => ids_of(
                &collect_pages(|page| client.list_custom_certificates(page)).await?,
                object_id,
            ),
            TlsListing::PlatformCertificates => ids_of(
                &collect_pages(|page| client.list_platform_certificates(page)).await?,
                object_id,
            ),
            TlsListing::Configurations => ids_of(
                &collect_pages(|page| client.list_tls_configurations(page)).await?,
                object_id,
            ),
            TlsListing::Subscriptions => ids_of(
                &collect_pages(|page| client.list_tls_subscriptions(page)).await?,
                |s: &TlsSubscription| s.id.clone(),
            ),
        };
        Ok(ids)
    }
}

#[async_trait]
impl DataSource for TlsIds {
    fn type_name(&self) -> &str {
        match self.listing {
            TlsListing::Certificates => "fastly_tls_certificate_ids",
            TlsListing::PlatformCertificates => "fastly_tls_platform_certificate_ids",
            TlsListing::Configurations => "fastly_tls_configuration_ids",
            TlsListing::Subscriptions => "fastly_tls_subscription_ids",
        }
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_attribute("id", Attribute::computed_string())
            .with_attribute("ids", Attribute::computed_string_set())
    }

    #[instrument(skip(self, config, client), fields(data_source = self.type_name()))]
    async fn read(&self, config: &Value, client: &dyn FastlyClient) -> Result<Value, ProviderError> {
        let ids = self.fetch(client).await?;
        let id = structural_hash(&json!(ids));
        Ok(with_results(config, id, [("ids", json!(ids))]))
    }
}

/// `fastly_tls_activation_ids`: activation IDs, optionally for one
/// certificate. An empty result is an error.
#[derive(Debug, Clone, Copy, Default)]
pub struct TlsActivationIds;

#[async_trait]
impl DataSource for TlsActivationIds {
    fn type_name(&self) -> &str {
        "fastly_tls_activation_ids"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_attribute("id", Attribute::computed_string())
            .with_attribute("certificate_id", Attribute::optional_string())
            .with_attribute("ids", Attribute::computed_string_set())
    }

    #[instrument(skip(self, config, client), name = "tls_activation_ids.read")]
    async fn read(&self, config: &Value, client: &dyn FastlyClient) -> Result<Value, ProviderError> {
        let certificate_id = optional_str(config, "certificate_id");
        let activations =
            collect_pages(|page| client.list_tls_activations(certificate_id, page)).await?;
        if activations.is_empty() {
            return Err(ProviderError::NotFound(NO_RESULTS.to_string()));
        }
        let ids = ids_of(&activations, |a| a.id.clone());
        let id = structural_hash(&json!(ids));
        Ok(with_results(config, id, [("ids", json!(ids))]))
    }
}

// =============================================================================
// TLS subscription
// =============================================================================

/// `fastly_tls_subscription`: one subscription, by ID or by filters.
#[derive(Debug, Clone, Copy, Default)]
pub struct TlsSubscriptionLookup;

const SUBSCRIPTION_FILTERS: [&str; 3] = ["configuration_id", "domains", "certificate_authority"];

fn subscription_matches(subscription: &TlsSubscription, config: &Value) -> bool {
    if let Some(configuration_id) = optional_str(config, "configuration_id") {
        if subscription.configuration_id != configuration_id {
            return false;
        }
    }
    if let Some(authority) = optional_str(config, "certificate_authority") {
        if subscription.certificate_authority != authority {
            return false;
        }
    }
    strings(config, "domains")
        .iter()
        .all(|domain| subscription.domains.contains(domain))
}

fn flatten_subscription(subscription: &TlsSubscription) -> Vec<(&'static str, Value)> {
    let mut domains = subscription.domains.clone();
    domains.sort();
    vec![
        ("configuration_id", json!(subscription.configuration_id)),
        ("domains", json!(domains)),
        ("certificate_authority", json!(subscription.certificate_authority)),
        ("common_name", json!(subscription.common_name)),
        ("state", json!(subscription.state)),
        ("created_at", json!(subscription.created_at)),
        ("updated_at", json!(subscription.updated_at)),
    ]
}

#[async_trait]
impl DataSource for TlsSubscriptionLookup {
    fn type_name(&self) -> &str {
        "fastly_tls_subscription"
    }

    fn schema(&self) -> Schema {
        let filter = |attr_type| Attribute::new(attr_type, AttributeFlags::optional_computed());
        Schema::v0()
            .with_attribute("id", filter(AttributeType::String))
            .with_attribute("configuration_id", filter(AttributeType::String))
            .with_attribute("domains", filter(AttributeType::set(AttributeType::String)))
            .with_attribute(
                "certificate_authority",
                filter(AttributeType::String)
                    .with_allowed_values(&["lets-encrypt", "globalsign"]),
            )
            .with_attribute("common_name", Attribute::computed_string())
            .with_attribute("state", Attribute::computed_string())
            .with_attribute("created_at", Attribute::computed_string())
            .with_attribute("updated_at", Attribute::computed_string())
    }

    fn validate(&self, config: &Value) -> Vec<Diagnostic> {
        if optional_str(config, "id").is_none() {
            return Vec::new();
        }
        SUBSCRIPTION_FILTERS
            .iter()
            .filter(|key| {
                config
                    .get(**key)
                    .map(|v| !v.is_null() && v != &json!([]) && v != &json!(""))
                    .unwrap_or(false)
            })
            .map(|key| {
                Diagnostic::error("Conflicting arguments")
                    .with_detail(format!("\"{}\" cannot be combined with \"id\"", key))
                    .with_attribute(*key)
            })
            .collect()
    }

    #[instrument(skip(self, config, client), name = "tls_subscription.read")]
    async fn read(&self, config: &Value, client: &dyn FastlyClient) -> Result<Value, ProviderError> {
        let subscription = match optional_str(config, "id") {
            Some(id) => client.get_tls_subscription(id).await?,
            None => {
                let all = collect_pages(|page| client.list_tls_subscriptions(page)).await?;
                let mut matches: Vec<TlsSubscription> = all
                    .into_iter()
                    .filter(|s| subscription_matches(s, config))
                    .collect();
                debug!(matches = matches.len(), "Filtered TLS subscriptions");
                match matches.len() {
                    0 => return Err(ProviderError::NotFound(NO_RESULTS.to_string())),
                    1 => matches.remove(0),
                    _ => return Err(ProviderError::Validation(TOO_MANY_RESULTS.to_string())),
                }
            },
        };
        let id = subscription.id.clone();
        Ok(with_results(config, id, flatten_subscription(&subscription)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{TlsActivation, WafRule};
    use crate::testing::FakeFastly;

    #[tokio::test]
    async fn test_waf_rules_latest_revision_and_type_pruning() {
        let fake = FakeFastly::new();
        fake.seed_waf_rules(vec![
            WafRule {
                modsec_rule_id: 1010090,
                rule_type: "strict".into(),
                revisions: vec![1, 3, 2],
            },
            WafRule {
                modsec_rule_id: 2029718,
                rule_type: String::new(),
                revisions: vec![],
            },
        ]);

        let config = json!({"publishers": ["owasp"]});
        let state = WafRules.read(&config, &fake).await.unwrap();
        assert_eq!(
            state["rules"],
            json!([
                {"modsec_rule_id": 1010090, "latest_revision_number": 3, "type": "strict"},
                {"modsec_rule_id": 2029718, "latest_revision_number": 1}
            ])
        );

        let again = WafRules.read(&config, &fake).await.unwrap();
        assert_eq!(state["id"], again["id"]);
        let other = WafRules.read(&json!({"publishers": ["fastly"]}), &fake).await.unwrap();
        assert_ne!(state["id"], other["id"]);
    }

    #[test]
    fn test_waf_rules_validate_exclusions() {
        assert!(WafRules.validate(&json!({"exclude_modsec_rule_ids": [1, 2]})).is_empty());
        assert_eq!(WafRules.validate(&json!({"exclude_modsec_rule_ids": [-1]})).len(), 1);
    }

    #[tokio::test]
    async fn test_tls_ids_drain_every_page() {
        let fake = FakeFastly::with_page_size(2);
        for n in 0..5 {
            fake.seed_tls_configuration(&format!("cfg-{}", n));
        }
        let state = TlsIds::new(TlsListing::Configurations)
            .read(&json!({}), &fake)
            .await
            .unwrap();
        assert_eq!(state["ids"].as_array().unwrap().len(), 5);
        // Pages 1, 2 and 3 hold data; page 4 is the empty terminator.
        assert_eq!(fake.calls_named("list_tls_configurations").len(), 4);
    }

    #[tokio::test]
    async fn test_activation_ids_empty_is_error() {
        let fake = FakeFastly::new();
        let err = TlsActivationIds.read(&json!({}), &fake).await.unwrap_err();
        assert!(err.to_string().contains("Your query returned no results"));
    }

    #[tokio::test]
    async fn test_activation_ids_filter_by_certificate() {
        let fake = FakeFastly::new();
        for (id, cert) in [("a1", "c1"), ("a2", "c2"), ("a3", "c1")] {
            fake.seed_tls_activation(TlsActivation {
                id: id.into(),
                certificate_id: cert.into(),
                configuration_id: String::new(),
                domain: format!("{}.example.com", id),
                created_at: String::new(),
            });
        }
        let state = TlsActivationIds
            .read(&json!({"certificate_id": "c1"}), &fake)
            .await
            .unwrap();
        assert_eq!(state["ids"], json!(["a1", "a3"]));
    }

    fn subscription(id: &str, configuration_id: &str, domains: &[&str]) -> TlsSubscription {
        TlsSubscription {
            id: id.into(),
            configuration_id: configuration_id.into(),
            domains: domains.iter().map(|d| d.to_string()).collect(),
            certificate_authority: "lets-encrypt".into(),
            common_name: domains[0].into(),
            state: "issued".into(),
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    #[tokio::test]
    async fn test_subscription_lookup_by_filters() {
        let fake = FakeFastly::new();
        fake.seed_tls_subscription(subscription("s1", "cfg-a", &["a.com", "b.com"]));
        fake.seed_tls_subscription(subscription("s2", "cfg-b", &["c.com"]));

        let state = TlsSubscriptionLookup
            .read(&json!({"domains": ["b.com"]}), &fake)
            .await
            .unwrap();
        assert_eq!(state["id"], "s1");
        assert_eq!(state["common_name"], "a.com");

        let err = TlsSubscriptionLookup
            .read(&json!({"certificate_authority": "lets-encrypt"}), &fake)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("more than one result"));

        let err = TlsSubscriptionLookup
            .read(&json!({"configuration_id": "cfg-z"}), &fake)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_subscription_id_conflicts_with_filters() {
        let diagnostics = TlsSubscriptionLookup.validate(&json!({"id": "s1", "domains": ["a.com"]}));
        assert_eq!(diagnostics.len(), 1);
        assert!(TlsSubscriptionLookup.validate(&json!({"id": "s1"})).is_empty());
    }
}
