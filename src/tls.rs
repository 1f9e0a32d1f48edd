//! TLS resources: private keys, certificates, managed subscriptions and
//! domain activations.

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, info, instrument, warn};

use crate::client::{
    ClientResult, CreatePrivateKeyInput, CreateTlsActivationInput, CreateTlsSubscriptionInput,
    FastlyClient, TlsCertificateInput,
};
use crate::error::{ignore_not_found, ProviderError};
use crate::resource::Resource;
use crate::resource_data::ResourceData;
use crate::schema::{Attribute, AttributeFlags, AttributeType, Schema};

/// Unwrap a fetch, clearing the ID when the object is gone.
fn found<T>(d: &mut ResourceData, result: ClientResult<T>) -> Result<Option<T>, ProviderError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(err) if err.is_not_found() => {
            warn!(id = ?d.id(), "TLS object not found, removing from state");
            d.clear_id();
            Ok(None)
        },
        Err(err) => Err(err.into()),
    }
}

/// `fastly_tls_private_key`. Keys are immutable: every input forces a new
/// resource.
#[derive(Debug, Clone, Copy, Default)]
pub struct TlsPrivateKey;

#[async_trait]
impl Resource for TlsPrivateKey {
    fn type_name(&self) -> &str {
        "fastly_tls_private_key"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_attribute("id", Attribute::computed_string())
            .with_attribute(
                "key_pem",
                Attribute::required_string()
                    .sensitive()
                    .with_force_new()
                    .with_description("PEM-encoded private key"),
            )
            .with_attribute("name", Attribute::required_string().with_force_new())
            .with_attribute("created_at", Attribute::computed_string())
            .with_attribute("key_length", Attribute::computed_int64())
            .with_attribute("key_type", Attribute::computed_string())
            .with_attribute("replace", Attribute::computed_bool())
            .with_attribute("public_key_sha1", Attribute::computed_string())
    }

    #[instrument(skip(self, d, client), name = "tls_private_key.create")]
    async fn create(&self, d: &mut ResourceData, client: &dyn FastlyClient) -> Result<(), ProviderError> {
        let input = CreatePrivateKeyInput {
            key_pem: d.require_str("key_pem")?.to_string(),
            name: d.require_str("name")?.to_string(),
        };
        let key = client.create_private_key(&input).await?;
        info!(key_id = %key.id, "Uploaded private key");
        d.set_id(key.id);
        self.read(d, client).await
    }

    #[instrument(skip(self, d, client), name = "tls_private_key.read", fields(id = ?d.id()))]
    async fn read(&self, d: &mut ResourceData, client: &dyn FastlyClient) -> Result<(), ProviderError> {
        let id = d.require_id()?.to_string();
        let result = client.get_private_key(&id).await;
        let Some(key) = found(d, result)? else {
            return Ok(());
        };
        d.set("name", json!(key.name));
        d.set("created_at", json!(key.created_at));
        d.set("key_length", json!(key.key_length));
        d.set("key_type", json!(key.key_type));
        d.set("replace", json!(key.replace));
        d.set("public_key_sha1", json!(key.public_key_sha1));
        Ok(())
    }

    async fn update(&self, _d: &mut ResourceData, _client: &dyn FastlyClient) -> Result<(), ProviderError> {
        Err(ProviderError::Unimplemented(
            "private keys cannot be updated in place".to_string(),
        ))
    }

    #[instrument(skip(self, d, client), name = "tls_private_key.delete", fields(id = ?d.id()))]
    async fn delete(&self, d: &ResourceData, client: &dyn FastlyClient) -> Result<(), ProviderError> {
        ignore_not_found(client.delete_private_key(d.require_id()?).await)?;
        Ok(())
    }
}

/// `fastly_tls_certificate`. The body and the name update in place; the
/// API never returns the body, so state keeps the configured one.
#[derive(Debug, Clone, Copy, Default)]
pub struct TlsCertificateResource;

impl TlsCertificateResource {
    fn input(d: &ResourceData) -> Result<TlsCertificateInput, ProviderError> {
        Ok(TlsCertificateInput {
            certificate_body: d.require_str("certificate_body")?.to_string(),
            name: d.get_str("name").filter(|n| !n.is_empty()).map(str::to_string),
        })
    }
}

#[async_trait]
impl Resource for TlsCertificateResource {
    fn type_name(&self) -> &str {
        "fastly_tls_certificate"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_attribute("id", Attribute::computed_string())
            .with_attribute(
                "certificate_body",
                Attribute::required_string().with_description("PEM-encoded certificate"),
            )
            .with_attribute(
                "name",
                Attribute::new(AttributeType::String, AttributeFlags::optional_computed())
                    .with_description("Defaults to the certificate's common name"),
            )
            .with_attribute("created_at", Attribute::computed_string())
            .with_attribute("updated_at", Attribute::computed_string())
            .with_attribute("issued_to", Attribute::computed_string())
            .with_attribute("issuer", Attribute::computed_string())
            .with_attribute("replace", Attribute::computed_bool())
            .with_attribute("serial_number", Attribute::computed_string())
            .with_attribute("signature_algorithm", Attribute::computed_string())
            .with_attribute("domains", Attribute::computed_string_set())
    }

    #[instrument(skip(self, d, client), name = "tls_certificate.create")]
    async fn create(&self, d: &mut ResourceData, client: &dyn FastlyClient) -> Result<(), ProviderError> {
        let certificate = client.create_custom_certificate(&Self::input(d)?).await?;
        info!(certificate_id = %certificate.id, name = %certificate.name, "Uploaded certificate");
        d.set_id(certificate.id);
        self.read(d, client).await
    }

    #[instrument(skip(self, d, client), name = "tls_certificate.read", fields(id = ?d.id()))]
    async fn read(&self, d: &mut ResourceData, client: &dyn FastlyClient) -> Result<(), ProviderError> {
        let id = d.require_id()?.to_string();
        let result = client.get_custom_certificate(&id).await;
        let Some(certificate) = found(d, result)? else {
            return Ok(());
        };
        d.set("name", json!(certificate.name));
        d.set("created_at", json!(certificate.created_at));
        d.set("updated_at", json!(certificate.updated_at));
        d.set("issued_to", json!(certificate.issued_to));
        d.set("issuer", json!(certificate.issuer));
        d.set("replace", json!(certificate.replace));
        d.set("serial_number", json!(certificate.serial_number));
        d.set("signature_algorithm", json!(certificate.signature_algorithm));
        d.set("domains", json!(certificate.domains));
        Ok(())
    }

    #[instrument(skip(self, d, client), name = "tls_certificate.update", fields(id = ?d.id()))]
    async fn update(&self, d: &mut ResourceData, client: &dyn FastlyClient) -> Result<(), ProviderError> {
        if d.has_change("certificate_body") || d.has_change("name") {
            let id = d.require_id()?.to_string();
            let input = Self::input(d)?;
            debug!(certificate_id = %id, name = ?input.name, "Replacing certificate");
            client.update_custom_certificate(&id, &input).await?;
        }
        self.read(d, client).await
    }

    #[instrument(skip(self, d, client), name = "tls_certificate.delete", fields(id = ?d.id()))]
    async fn delete(&self, d: &ResourceData, client: &dyn FastlyClient) -> Result<(), ProviderError> {
        ignore_not_found(client.delete_custom_certificate(d.require_id()?).await)?;
        Ok(())
    }
}

/// `fastly_tls_subscription`. Fastly issues and renews the certificate for
/// the listed domains. Every input forces a new subscription.
#[derive(Debug, Clone, Copy, Default)]
pub struct TlsSubscriptionResource;

/// Authorities a subscription can be issued by.
pub const CERTIFICATE_AUTHORITIES: [&str; 2] = ["lets-encrypt", "globalsign"];

#[async_trait]
impl Resource for TlsSubscriptionResource {
    fn type_name(&self) -> &str {
        "fastly_tls_subscription"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_attribute("id", Attribute::computed_string())
            .with_attribute(
                "domains",
                Attribute::new(AttributeType::list(AttributeType::String), AttributeFlags::required())
                    .with_force_new()
                    .with_description("Domains to enable TLS on"),
            )
            .with_attribute(
                "certificate_authority",
                Attribute::required_string()
                    .with_force_new()
                    .with_allowed_values(&CERTIFICATE_AUTHORITIES),
            )
            .with_attribute(
                "configuration_id",
                Attribute::new(AttributeType::String, AttributeFlags::optional_computed())
                    .with_force_new(),
            )
            .with_attribute("common_name", Attribute::computed_string())
            .with_attribute("state", Attribute::computed_string())
            .with_attribute("created_at", Attribute::computed_string())
            .with_attribute("updated_at", Attribute::computed_string())
    }

    #[instrument(skip(self, d, client), name = "tls_subscription.create")]
    async fn create(&self, d: &mut ResourceData, client: &dyn FastlyClient) -> Result<(), ProviderError> {
        let domains: Vec<String> = d
            .get("domains")
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(Value::as_str).map(str::to_string).collect())
            .unwrap_or_default();
        if domains.is_empty() {
            return Err(ProviderError::MissingAttribute("domains".to_string()));
        }
        let input = CreateTlsSubscriptionInput {
            domains,
            certificate_authority: d.require_str("certificate_authority")?.to_string(),
            configuration_id: d
                .get_str("configuration_id")
                .filter(|id| !id.is_empty())
                .map(str::to_string),
        };
        debug!(?input, "Creating TLS subscription");
        let subscription = client.create_tls_subscription(&input).await?;
        info!(
            subscription_id = %subscription.id,
            common_name = %subscription.common_name,
            "Created TLS subscription"
        );
        d.set_id(subscription.id);
        self.read(d, client).await
    }

    #[instrument(skip(self, d, client), name = "tls_subscription.read", fields(id = ?d.id()))]
    async fn read(&self, d: &mut ResourceData, client: &dyn FastlyClient) -> Result<(), ProviderError> {
        let id = d.require_id()?.to_string();
        let result = client.get_tls_subscription(&id).await;
        let Some(subscription) = found(d, result)? else {
            return Ok(());
        };
        d.set("domains", json!(subscription.domains));
        d.set("certificate_authority", json!(subscription.certificate_authority));
        d.set("configuration_id", json!(subscription.configuration_id));
        d.set("common_name", json!(subscription.common_name));
        d.set("state", json!(subscription.state));
        d.set("created_at", json!(subscription.created_at));
        d.set("updated_at", json!(subscription.updated_at));
        Ok(())
    }

    async fn update(&self, _d: &mut ResourceData, _client: &dyn FastlyClient) -> Result<(), ProviderError> {
        Err(ProviderError::Unimplemented(
            "TLS subscriptions cannot be updated in place".to_string(),
        ))
    }

    #[instrument(skip(self, d, client), name = "tls_subscription.delete", fields(id = ?d.id()))]
    async fn delete(&self, d: &ResourceData, client: &dyn FastlyClient) -> Result<(), ProviderError> {
        ignore_not_found(client.delete_tls_subscription(d.require_id()?).await)?;
        Ok(())
    }
}

/// `fastly_tls_activation`. Only the certificate can change in place.
#[derive(Debug, Clone, Copy, Default)]
pub struct TlsActivationResource;

#[async_trait]
impl Resource for TlsActivationResource {
    fn type_name(&self) -> &str {
        "fastly_tls_activation"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_attribute("id", Attribute::computed_string())
            .with_attribute(
                "certificate_id",
                Attribute::required_string().with_description("Certificate to serve"),
            )
            .with_attribute(
                "configuration_id",
                Attribute::new(AttributeType::String, AttributeFlags::optional_computed())
                    .with_force_new(),
            )
            .with_attribute("domain", Attribute::required_string().with_force_new())
            .with_attribute("created_at", Attribute::computed_string())
    }

    #[instrument(skip(self, d, client), name = "tls_activation.create")]
    async fn create(&self, d: &mut ResourceData, client: &dyn FastlyClient) -> Result<(), ProviderError> {
        let input = CreateTlsActivationInput {
            certificate_id: d.require_str("certificate_id")?.to_string(),
            configuration_id: d
                .get_str("configuration_id")
                .filter(|id| !id.is_empty())
                .map(str::to_string),
            domain: d.require_str("domain")?.to_string(),
        };
        debug!(?input, "Creating TLS activation");
        let activation = client.create_tls_activation(&input).await?;
        info!(activation_id = %activation.id, domain = %activation.domain, "Activated TLS");
        d.set_id(activation.id);
        self.read(d, client).await
    }

    #[instrument(skip(self, d, client), name = "tls_activation.read", fields(id = ?d.id()))]
    async fn read(&self, d: &mut ResourceData, client: &dyn FastlyClient) -> Result<(), ProviderError> {
        let id = d.require_id()?.to_string();
        let result = client.get_tls_activation(&id).await;
        let Some(activation) = found(d, result)? else {
            return Ok(());
        };
        d.set("certificate_id", json!(activation.certificate_id));
        d.set("configuration_id", json!(activation.configuration_id));
        d.set("domain", json!(activation.domain));
        d.set("created_at", json!(activation.created_at));
        Ok(())
    }

    #[instrument(skip(self, d, client), name = "tls_activation.update", fields(id = ?d.id()))]
    async fn update(&self, d: &mut ResourceData, client: &dyn FastlyClient) -> Result<(), ProviderError> {
        if d.has_change("certificate_id") {
            let id = d.require_id()?.to_string();
            let certificate_id = d.require_str("certificate_id")?.to_string();
            client.update_tls_activation(&id, &certificate_id).await?;
            info!(activation_id = %id, certificate_id = %certificate_id, "Switched certificate");
        }
        self.read(d, client).await
    }

    #[instrument(skip(self, d, client), name = "tls_activation.delete", fields(id = ?d.id()))]
    async fn delete(&self, d: &ResourceData, client: &dyn FastlyClient) -> Result<(), ProviderError> {
        ignore_not_found(client.delete_tls_activation(d.require_id()?).await)?;
        Ok(())
    }
}
