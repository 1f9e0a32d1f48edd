//! The host-facing provider.
//!
//! [`ProviderService`] is the contract a host drives: schema, configure,
//! validate, plan, CRUD, import and data source reads, all in JSON.
//! [`FastlyProvider`] implements it by routing each call to the registered
//! [`Resource`] or [`DataSource`] and converting between JSON state and
//! [`ResourceData`].

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};

use crate::client::FastlyClient;
use crate::config::Config;
use crate::data_sources::{
    TlsActivationIds, TlsIds, TlsListing, TlsSubscriptionLookup, WafRules,
};
use crate::entries::{AclEntries, DictionaryItems};
use crate::error::ProviderError;
use crate::resource::{self, DataSource, Resource};
use crate::resource_data::ResourceData;
use crate::schema::{Diagnostic, ProviderSchema};
use crate::service::ServiceDefinition;
use crate::tls::{TlsActivationResource, TlsCertificateResource, TlsPrivateKey, TlsSubscriptionResource};
use crate::types::{ImportedResource, PlanResult, ProviderMetadata};
use crate::validation;
use crate::waf_configuration::WafConfiguration;

/// The operations a host invokes on a provider.
///
/// Everything except [`schema`](Self::schema), [`configure`](Self::configure),
/// [`plan`](Self::plan) and the CRUD calls has a default.
#[async_trait::async_trait]
pub trait ProviderService: Send + Sync + 'static {
    // =========================================================================
    // Schema & Metadata
    // =========================================================================

    /// The provider block, every resource and every data source.
    fn schema(&self) -> ProviderSchema;

    /// Type names served by this provider, derived from the schema.
    fn metadata(&self) -> ProviderMetadata {
        let schema = self.schema();
        ProviderMetadata {
            resources: schema.resources.keys().cloned().collect(),
            data_sources: schema.data_sources.keys().cloned().collect(),
        }
    }

    // =========================================================================
    // Provider Lifecycle
    // =========================================================================

    /// Check the provider block before configuring.
    async fn validate_provider_config(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        let _ = config;
        Ok(vec![])
    }

    /// Configure credentials and connect.
    async fn configure(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError>;

    // =========================================================================
    // Resource Operations
    // =========================================================================

    /// Check a resource configuration before planning.
    async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let _ = (resource_type, config);
        Ok(vec![])
    }

    /// Plan a create (`prior_state` is `None`) or an update.
    async fn plan(
        &self,
        resource_type: &str,
        prior_state: Option<Value>,
        proposed_state: Value,
    ) -> Result<PlanResult, ProviderError>;

    /// Create a resource from its planned state.
    async fn create(&self, resource_type: &str, planned_state: Value) -> Result<Value, ProviderError>;

    /// Refresh a resource. Returns `Value::Null` when it no longer exists.
    async fn read(&self, resource_type: &str, current_state: Value) -> Result<Value, ProviderError>;

    /// Apply a planned update.
    async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError>;

    /// Destroy a resource.
    async fn delete(&self, resource_type: &str, current_state: Value) -> Result<(), ProviderError>;

    /// Adopt existing infrastructure by ID.
    async fn import_resource(
        &self,
        resource_type: &str,
        _id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        Err(ProviderError::Unimplemented(format!(
            "import is not supported for {}",
            resource_type
        )))
    }

    // =========================================================================
    // Data Source Operations
    // =========================================================================

    /// Check a data source configuration.
    async fn validate_data_source_config(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let _ = (data_source_type, config);
        Ok(vec![])
    }

    /// Run a data source lookup.
    async fn read_data_source(&self, data_source_type: &str, config: Value) -> Result<Value, ProviderError> {
        let _ = config;
        Err(ProviderError::UnknownResource(format!(
            "unknown data source type: {}",
            data_source_type
        )))
    }
}

/// Builds a client from the resolved configuration.
pub type Connector =
    Box<dyn Fn(&Config) -> Result<Arc<dyn FastlyClient>, ProviderError> + Send + Sync>;

/// The Fastly provider.
pub struct FastlyProvider {
    resources: BTreeMap<String, Arc<dyn Resource>>,
    data_sources: BTreeMap<String, Arc<dyn DataSource>>,
    connector: Connector,
    client: RwLock<Option<Arc<dyn FastlyClient>>>,
}

impl fmt::Debug for FastlyProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FastlyProvider")
            .field("resources", &self.resources.keys().collect::<Vec<_>>())
            .field("data_sources", &self.data_sources.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

fn resources() -> Vec<Arc<dyn Resource>> {
    vec![
        Arc::new(ServiceDefinition::vcl()),
        Arc::new(ServiceDefinition::compute()),
        Arc::new(WafConfiguration),
        Arc::new(AclEntries),
        Arc::new(DictionaryItems),
        Arc::new(TlsPrivateKey),
        Arc::new(TlsCertificateResource),
        Arc::new(TlsSubscriptionResource),
        Arc::new(TlsActivationResource),
    ]
}

fn data_sources() -> Vec<Arc<dyn DataSource>> {
    vec![
        Arc::new(WafRules),
        Arc::new(TlsIds::new(TlsListing::Certificates)),
        Arc::new(TlsIds::new(TlsListing::PlatformCertificates)),
        Arc::new(TlsIds::new(TlsListing::Configurations)),
        Arc::new(TlsIds::new(TlsListing::Subscriptions)),
        Arc::new(TlsActivationIds),
        Arc::new(TlsSubscriptionLookup),
    ]
}

impl FastlyProvider {
    /// A provider that builds its client with `connector` on configure.
    pub fn new<F>(connector: F) -> Self
    where
        F: Fn(&Config) -> Result<Arc<dyn FastlyClient>, ProviderError> + Send + Sync + 'static,
    {
        Self {
            resources: resources()
                .into_iter()
                .map(|r| (r.type_name().to_string(), r))
                .collect(),
            data_sources: data_sources()
                .into_iter()
                .map(|ds| (ds.type_name().to_string(), ds))
                .collect(),
            connector: Box::new(connector),
            client: RwLock::new(None),
        }
    }

    /// A provider that is already connected to `client`. Configuring it
    /// again keeps the same client.
    pub fn with_client(client: Arc<dyn FastlyClient>) -> Self {
        let connected = client.clone();
        let provider = Self::new(move |_| Ok(connected.clone()));
        Self {
            client: RwLock::new(Some(client)),
            ..provider
        }
    }

    async fn client(&self) -> Result<Arc<dyn FastlyClient>, ProviderError> {
        self.client.read().await.clone().ok_or_else(|| {
            ProviderError::FailedPrecondition("provider has not been configured".to_string())
        })
    }

    fn resource(&self, resource_type: &str) -> Result<&Arc<dyn Resource>, ProviderError> {
        self.resources.get(resource_type).ok_or_else(|| {
            ProviderError::UnknownResource(format!("unknown resource type: {}", resource_type))
        })
    }

    fn data_source(&self, data_source_type: &str) -> Result<&Arc<dyn DataSource>, ProviderError> {
        self.data_sources.get(data_source_type).ok_or_else(|| {
            ProviderError::UnknownResource(format!(
                "unknown data source type: {}",
                data_source_type
            ))
        })
    }
}

#[async_trait::async_trait]
impl ProviderService for FastlyProvider {
    fn schema(&self) -> ProviderSchema {
        let mut schema = ProviderSchema::new().with_provider_config(Config::schema());
        for (name, resource) in &self.resources {
            schema = schema.with_resource(name.clone(), resource.schema());
        }
        for (name, data_source) in &self.data_sources {
            schema = schema.with_data_source(name.clone(), data_source.schema());
        }
        schema
    }

    async fn validate_provider_config(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        let mut diagnostics = validation::validate(&Config::schema(), &config);
        if diagnostics.iter().any(Diagnostic::is_error) {
            return Ok(diagnostics);
        }
        diagnostics.extend(Config::from_value(&config)?.validate());
        Ok(diagnostics)
    }

    #[instrument(skip(self, config), name = "provider.configure")]
    async fn configure(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        let config = Config::from_value(&config)?;
        let diagnostics = config.validate();
        if diagnostics.iter().any(Diagnostic::is_error) {
            return Ok(diagnostics);
        }
        let client = (self.connector)(&config)?;
        *self.client.write().await = Some(client);
        info!(base_url = config.base_url(), "Provider configured");
        Ok(diagnostics)
    }

    async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let resource = self.resource(resource_type)?;
        let mut diagnostics = validation::validate(&resource.schema(), &config);
        diagnostics.extend(resource.validate(&config));
        Ok(diagnostics)
    }

    #[instrument(skip(self, prior_state, proposed_state), name = "provider.plan")]
    async fn plan(
        &self,
        resource_type: &str,
        prior_state: Option<Value>,
        proposed_state: Value,
    ) -> Result<PlanResult, ProviderError> {
        let resource = self.resource(resource_type)?;
        let result = resource::plan(&resource.schema(), prior_state.as_ref(), &proposed_state);
        debug!(
            changes = result.changes.len(),
            requires_replace = result.requires_replace,
            "Planned"
        );
        Ok(result)
    }

    #[instrument(skip(self, planned_state), name = "provider.create")]
    async fn create(&self, resource_type: &str, planned_state: Value) -> Result<Value, ProviderError> {
        let resource = self.resource(resource_type)?;
        let client = self.client().await?;
        let mut d = ResourceData::for_create(&planned_state);
        resource.create(&mut d, client.as_ref()).await?;
        info!(id = ?d.id(), "Created");
        Ok(d.into_state())
    }

    #[instrument(skip(self, current_state), name = "provider.read")]
    async fn read(&self, resource_type: &str, current_state: Value) -> Result<Value, ProviderError> {
        let resource = self.resource(resource_type)?;
        if current_state.is_null() {
            return Ok(Value::Null);
        }
        let client = self.client().await?;
        let mut d = ResourceData::from_state(&current_state);
        resource.read(&mut d, client.as_ref()).await?;
        Ok(d.into_state())
    }

    #[instrument(skip(self, prior_state, planned_state), name = "provider.update")]
    async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        let resource = self.resource(resource_type)?;
        let client = self.client().await?;
        let mut d = ResourceData::new(Some(&prior_state), &planned_state);
        resource.update(&mut d, client.as_ref()).await?;
        info!(id = ?d.id(), "Updated");
        Ok(d.into_state())
    }

    #[instrument(skip(self, current_state), name = "provider.delete")]
    async fn delete(&self, resource_type: &str, current_state: Value) -> Result<(), ProviderError> {
        let resource = self.resource(resource_type)?;
        let d = ResourceData::from_state(&current_state);
        if d.id().is_none() {
            debug!("Nothing to delete");
            return Ok(());
        }
        let client = self.client().await?;
        resource.delete(&d, client.as_ref()).await?;
        info!(id = ?d.id(), "Deleted");
        Ok(())
    }

    #[instrument(skip(self), name = "provider.import")]
    async fn import_resource(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        let resource = self.resource(resource_type)?;
        let client = self.client().await?;
        let d = resource.import(id, client.as_ref()).await?;
        Ok(vec![ImportedResource::new(resource_type, d.into_state())])
    }

    async fn validate_data_source_config(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let data_source = self.data_source(data_source_type)?;
        let mut diagnostics = validation::validate(&data_source.schema(), &config);
        diagnostics.extend(data_source.validate(&config));
        Ok(diagnostics)
    }

    #[instrument(skip(self, config), name = "provider.read_data_source")]
    async fn read_data_source(&self, data_source_type: &str, config: Value) -> Result<Value, ProviderError> {
        let data_source = self.data_source(data_source_type)?;
        let client = self.client().await?;
        data_source.read(&config, client.as_ref()).await
    }
}
