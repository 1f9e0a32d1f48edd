//! The service resources: `fastly_service_v1` (VCL) and
//! `fastly_service_compute` (WebAssembly).
//!
//! Both are a [`ServiceDefinition`]: a service type plus an ordered list of
//! attribute handlers. Write operations resolve one mutable version, run
//! every handler that must process against it, optionally validate and
//! activate it, then read the service back. Handler order is fixed because
//! later blocks reference earlier ones by name (conditions before the blocks
//! using them, healthchecks before backends).

use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, info, instrument, warn};

use crate::client::{CreateServiceInput, FastlyClient, ServiceType, UpdateServiceInput};
use crate::error::ProviderError;
use crate::handlers::{
    catalog, logging, BlockHandler, BlockSpec, PackageHandler, ServiceAttributeHandler,
    ServiceWafHandler, SettingsHandler,
};
use crate::resource::Resource;
use crate::resource_data::ResourceData;
use crate::schema::{Attribute, Schema};
use crate::version::VersionManager;

/// Comment given to services that do not configure one.
pub const DEFAULT_COMMENT: &str = "Managed by Terraform";

/// A service resource type.
pub struct ServiceDefinition {
    type_name: &'static str,
    service_type: ServiceType,
    handlers: Vec<Box<dyn ServiceAttributeHandler>>,
}

impl std::fmt::Debug for ServiceDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceDefinition")
            .field("type_name", &self.type_name)
            .field("service_type", &self.service_type)
            .field("handlers", &self.handler_keys())
            .finish()
    }
}

impl ServiceDefinition {
    /// `fastly_service_v1`.
    pub fn vcl() -> Self {
        let block = |spec: &'static BlockSpec| -> Box<dyn ServiceAttributeHandler> {
            Box::new(BlockHandler::new(spec, ServiceType::Vcl))
        };

        let mut handlers: Vec<Box<dyn ServiceAttributeHandler>> = vec![
            Box::new(SettingsHandler),
            block(&catalog::CONDITION),
            block(&catalog::DOMAIN),
            block(&catalog::HEALTHCHECK),
            block(&catalog::BACKEND),
            block(&catalog::HEADER),
            block(&catalog::GZIP),
        ];
        handlers.extend(logging::ALL.iter().map(|spec| block(*spec)));
        handlers.extend([
            block(&catalog::RESPONSE_OBJECT),
            block(&catalog::REQUEST_SETTING),
            block(&catalog::VCL),
            block(&catalog::SNIPPET),
            block(&catalog::CACHE_SETTING),
            block(&catalog::ACL),
            block(&catalog::DICTIONARY),
            Box::new(ServiceWafHandler),
        ]);

        Self {
            type_name: "fastly_service_v1",
            service_type: ServiceType::Vcl,
            handlers,
        }
    }

    /// `fastly_service_compute`.
    pub fn compute() -> Self {
        let block = |spec: &'static BlockSpec| -> Box<dyn ServiceAttributeHandler> {
            Box::new(BlockHandler::new(spec, ServiceType::Wasm))
        };

        let mut handlers: Vec<Box<dyn ServiceAttributeHandler>> = vec![
            block(&catalog::DOMAIN),
            block(&catalog::HEALTHCHECK),
            block(&catalog::BACKEND),
        ];
        handlers.extend(logging::ALL.iter().map(|spec| block(*spec)));
        handlers.push(Box::new(PackageHandler));

        Self {
            type_name: "fastly_service_compute",
            service_type: ServiceType::Wasm,
            handlers,
        }
    }

    /// VCL or compute.
    pub fn service_type(&self) -> ServiceType {
        self.service_type
    }

    /// Handler keys in processing order.
    pub fn handler_keys(&self) -> Vec<&str> {
        self.handlers.iter().map(|h| h.key()).collect()
    }

    fn needs_version(&self, d: &ResourceData, initial_version: bool) -> bool {
        initial_version
            || d.has_change("version_comment")
            || self
                .handlers
                .iter()
                .any(|h| h.must_process(d, initial_version))
    }

    /// Shared tail of create and update.
    async fn apply(
        &self,
        d: &mut ResourceData,
        client: &dyn FastlyClient,
        initial_version: bool,
    ) -> Result<(), ProviderError> {
        let service_id = d.require_id()?.to_string();

        if !initial_version && (d.has_change("name") || d.has_change("comment")) {
            let input = UpdateServiceInput {
                service_id: service_id.clone(),
                name: d.has_change("name").then(|| d.get_str("name").unwrap_or_default().to_string()),
                comment: d
                    .has_change("comment")
                    .then(|| d.get_str("comment").unwrap_or_default().to_string()),
            };
            debug!(?input, "Updating service metadata");
            client.update_service(&input).await?;
        }

        if self.needs_version(d, initial_version) {
            let mut versions = VersionManager::new(client, service_id.clone());
            let version = versions.ensure_mutable().await?;

            if let Some(comment) = d.get_str("version_comment").filter(|c| !c.is_empty()) {
                client
                    .update_version_comment(&service_id, version.number, comment)
                    .await?;
            }

            for handler in &self.handlers {
                if handler.must_process(d, initial_version) {
                    debug!(handler = handler.key(), version = version.number, "Processing");
                    handler.process(d, version.number, client).await?;
                }
            }
            d.set("cloned_version", json!(version.number));

            if d.get_bool("activate").unwrap_or(true) {
                versions.activate(version.number).await?;
            } else {
                info!(
                    service_id = %service_id,
                    version = version.number,
                    "Leaving version inactive"
                );
            }
        }

        self.read(d, client).await
    }
}

#[async_trait]
impl Resource for ServiceDefinition {
    fn type_name(&self) -> &str {
        self.type_name
    }

    fn schema(&self) -> Schema {
        let mut schema = Schema::v0()
            .with_attribute("id", Attribute::computed_string())
            .with_attribute(
                "name",
                Attribute::required_string().with_description("Unique service name"),
            )
            .with_attribute(
                "comment",
                Attribute::optional_string().with_default(json!(DEFAULT_COMMENT)),
            )
            .with_attribute(
                "version_comment",
                Attribute::optional_string().with_description("Comment set on every new version"),
            )
            .with_attribute(
                "activate",
                Attribute::optional_bool()
                    .with_default(json!(true))
                    .with_description("Activate the version after changes are applied"),
            )
            .with_attribute("active_version", Attribute::computed_int64())
            .with_attribute(
                "cloned_version",
                Attribute::computed_int64()
                    .with_description("Version the last apply wrote to"),
            );
        for handler in &self.handlers {
            handler.register(&mut schema);
        }
        schema
    }

    #[instrument(skip(self, d, client), fields(service_type = self.service_type.as_str()))]
    async fn create(
        &self,
        d: &mut ResourceData,
        client: &dyn FastlyClient,
    ) -> Result<(), ProviderError> {
        let input = CreateServiceInput {
            name: d.require_str("name")?.to_string(),
            comment: d.get_str("comment").unwrap_or(DEFAULT_COMMENT).to_string(),
            service_type: self.service_type,
        };
        let service = client.create_service(&input).await?;
        info!(service_id = %service.id, name = %service.name, "Created service");
        d.set_id(service.id);

        self.apply(d, client, true).await
    }

    #[instrument(skip(self, d, client), fields(service_id = ?d.id()))]
    async fn read(&self, d: &mut ResourceData, client: &dyn FastlyClient) -> Result<(), ProviderError> {
        let service_id = d.require_id()?.to_string();
        let detail = match client.get_service_details(&service_id).await {
            Ok(detail) => detail,
            Err(err) if err.is_not_found() => {
                warn!(service_id = %service_id, "Service not found, removing from state");
                d.clear_id();
                return Ok(());
            },
            Err(err) => return Err(err.into()),
        };

        if detail.service_type != self.service_type {
            return Err(ProviderError::Validation(format!(
                "service {} is a {} service and cannot be managed as {}",
                service_id,
                detail.service_type.as_str(),
                self.type_name
            )));
        }

        d.set("name", json!(detail.name));
        d.set("comment", json!(detail.comment));
        d.set(
            "active_version",
            json!(detail.active_version.as_ref().map(|v| v.number).unwrap_or(0)),
        );
        if d.get("cloned_version").is_none() {
            d.set("cloned_version", json!(detail.version.number));
        }

        for handler in &self.handlers {
            handler.read(d, &detail, client).await?;
        }
        Ok(())
    }

    #[instrument(skip(self, d, client), fields(service_id = ?d.id()))]
    async fn update(
        &self,
        d: &mut ResourceData,
        client: &dyn FastlyClient,
    ) -> Result<(), ProviderError> {
        self.apply(d, client, false).await
    }

    #[instrument(skip(self, d, client), fields(service_id = ?d.id()))]
    async fn delete(&self, d: &ResourceData, client: &dyn FastlyClient) -> Result<(), ProviderError> {
        VersionManager::new(client, d.require_id()?).delete_service().await
    }
}
