//! The WebAssembly package of a compute service version.

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, info};

use super::{read_version, ServiceAttributeHandler};
use crate::client::{FastlyClient, ServiceDetail, UpdatePackageInput};
use crate::error::ProviderError;
use crate::resource_data::ResourceData;
use crate::schema::{Attribute, AttributeFlags, AttributeType, Block, NestedBlock, Schema};

/// Uploads the package archive in place on the mutable version.
#[derive(Debug, Clone, Copy, Default)]
pub struct PackageHandler;

fn first_element<'a>(value: Option<&'a Value>) -> Option<&'a serde_json::Map<String, Value>> {
    value
        .and_then(Value::as_array)
        .and_then(|items| items.first())
        .and_then(Value::as_object)
}

#[async_trait]
impl ServiceAttributeHandler for PackageHandler {
    fn key(&self) -> &str {
        "package"
    }

    /// The filename always counts. The hash only counts when configured,
    /// since state holds the hash the API reported.
    fn has_change(&self, d: &ResourceData) -> bool {
        let (old, new) = d.get_change(self.key());
        let (old, new) = (first_element(old), first_element(new));
        let field = |element: Option<&serde_json::Map<String, Value>>, name: &str| {
            element
                .and_then(|e| e.get(name))
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };
        if old.is_some() != new.is_some() || field(old, "filename") != field(new, "filename") {
            return true;
        }
        match field(new, "source_code_hash") {
            Some(hash) => field(old, "source_code_hash").as_deref() != Some(hash.as_str()),
            None => false,
        }
    }

    async fn process(
        &self,
        d: &ResourceData,
        version: u32,
        client: &dyn FastlyClient,
    ) -> Result<(), ProviderError> {
        let package = first_element(d.get(self.key()))
            .ok_or_else(|| ProviderError::MissingAttribute("package".to_string()))?;
        let filename = package
            .get("filename")
            .and_then(Value::as_str)
            .ok_or_else(|| ProviderError::MissingAttribute("package.filename".to_string()))?;

        let input = UpdatePackageInput {
            service_id: d.require_id()?.to_string(),
            version,
            package_path: filename.to_string(),
        };
        debug!(?input, "Uploading package");
        let uploaded = client.update_package(&input).await?;
        info!(
            service_id = %uploaded.service_id,
            version = uploaded.version,
            hashsum = %uploaded.hashsum,
            "Uploaded package"
        );
        Ok(())
    }

    async fn read(
        &self,
        d: &mut ResourceData,
        service: &ServiceDetail,
        client: &dyn FastlyClient,
    ) -> Result<(), ProviderError> {
        let package = client
            .get_package(&service.id, read_version(service))
            .await?;

        // The API only knows the archive hash; the local filename stays as configured.
        let filename = first_element(d.get(self.key()))
            .and_then(|p| p.get("filename"))
            .cloned()
            .unwrap_or(Value::Null);
        let mut element = serde_json::Map::new();
        if !filename.is_null() {
            element.insert("filename".to_string(), filename);
        }
        if !package.hashsum.is_empty() {
            element.insert("source_code_hash".to_string(), json!(package.hashsum));
        }
        d.set(self.key(), Value::Array(vec![Value::Object(element)]));
        Ok(())
    }

    fn register(&self, schema: &mut Schema) {
        schema.insert_block(
            self.key(),
            NestedBlock::list(
                Block::new()
                    .with_attribute(
                        "filename",
                        Attribute::required_string()
                            .with_description("Path of the package archive to upload"),
                    )
                    .with_attribute(
                        "source_code_hash",
                        Attribute::new(AttributeType::String, AttributeFlags::optional_computed())
                            .with_description("Hash of the archive; a change forces an upload"),
                    ),
            )
            .with_min_items(1)
            .with_max_items(1),
        );
    }
}
