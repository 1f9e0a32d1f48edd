//! Service-wide settings of a VCL service version.
//!
//! Settings are plain top-level attributes rather than a block, and they are
//! updated in place. `default_ttl = 0` is a real value: the request always
//! carries the TTL, and the handler runs on the initial version even without
//! a planned change so a configured zero is never mistaken for "unset".

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use super::{read_version, ServiceAttributeHandler};
use crate::client::{FastlyClient, ServiceDetail, UpdateSettingsInput};
use crate::error::ProviderError;
use crate::resource_data::ResourceData;
use crate::schema::{Attribute, Schema};

/// Default TTL applied when none is configured.
pub const DEFAULT_TTL: i64 = 3600;

/// Default stale-if-error window.
pub const DEFAULT_STALE_IF_ERROR_TTL: i64 = 43200;

const ATTRIBUTES: [&str; 4] = [
    "default_ttl",
    "default_host",
    "stale_if_error",
    "stale_if_error_ttl",
];

/// Handles `default_ttl`, `default_host`, `stale_if_error` and
/// `stale_if_error_ttl`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SettingsHandler;

impl SettingsHandler {
    fn non_negative(d: &ResourceData, key: &str, default: i64) -> Result<u32, ProviderError> {
        let value = d.get_i64(key).unwrap_or(default);
        u32::try_from(value)
            .map_err(|_| ProviderError::Validation(format!("{} must be between 0 and {}", key, u32::MAX)))
    }
}

#[async_trait]
impl ServiceAttributeHandler for SettingsHandler {
    fn key(&self) -> &str {
        "settings"
    }

    fn has_change(&self, d: &ResourceData) -> bool {
        ATTRIBUTES.iter().any(|key| d.has_change(key))
    }

    fn must_process(&self, d: &ResourceData, initial_version: bool) -> bool {
        initial_version || self.has_change(d)
    }

    async fn process(
        &self,
        d: &ResourceData,
        version: u32,
        client: &dyn FastlyClient,
    ) -> Result<(), ProviderError> {
        let input = UpdateSettingsInput {
            service_id: d.require_id()?.to_string(),
            version,
            default_ttl: Self::non_negative(d, "default_ttl", DEFAULT_TTL)?,
            default_host: d.get_str("default_host").map(str::to_string),
            stale_if_error: d.get_bool("stale_if_error"),
            stale_if_error_ttl: Some(Self::non_negative(
                d,
                "stale_if_error_ttl",
                DEFAULT_STALE_IF_ERROR_TTL,
            )?),
        };
        debug!(?input, "Updating service settings");
        client.update_settings(&input).await?;
        Ok(())
    }

    async fn read(
        &self,
        d: &mut ResourceData,
        service: &ServiceDetail,
        client: &dyn FastlyClient,
    ) -> Result<(), ProviderError> {
        let settings = client
            .get_settings(&service.id, read_version(service))
            .await?;
        d.set("default_ttl", json!(settings.default_ttl));
        d.set("stale_if_error", json!(settings.stale_if_error));
        d.set("stale_if_error_ttl", json!(settings.stale_if_error_ttl));
        if settings.default_host.is_empty() {
            d.remove("default_host");
        } else {
            d.set("default_host", Value::String(settings.default_host));
        }
        Ok(())
    }

    fn register(&self, schema: &mut Schema) {
        schema.insert_attribute(
            "default_ttl",
            Attribute::optional_int64()
                .with_default(json!(DEFAULT_TTL))
                .with_min_int(0)
                .with_description("Default TTL in seconds; 0 disables caching by default"),
        );
        schema.insert_attribute(
            "default_host",
            Attribute::optional_string().with_description("Default Host header"),
        );
        schema.insert_attribute(
            "stale_if_error",
            Attribute::optional_bool().with_default(json!(false)),
        );
        schema.insert_attribute(
            "stale_if_error_ttl",
            Attribute::optional_int64()
                .with_default(json!(DEFAULT_STALE_IF_ERROR_TTL))
                .with_min_int(0),
        );
    }
}
