//! Service version management.
//!
//! Changes must land on an unlocked version. [`VersionManager`] resolves that
//! version once per operation, cloning the latest version when it is locked,
//! and hands the same number to every handler. It also owns activation and
//! the deactivate-then-delete teardown.

use tracing::{debug, info, warn};

use crate::client::{FastlyClient, Version};
use crate::error::{ignore_not_found, ProviderError};

/// Pick the highest-numbered item. On equal numbers the earliest item in the
/// input order wins (stable descending sort, then first).
pub fn latest_by_number<T, F>(mut items: Vec<T>, number: F) -> Option<T>
where
    F: Fn(&T) -> u32,
{
    items.sort_by(|a, b| number(b).cmp(&number(a)));
    items.into_iter().next()
}

/// Resolves and transitions the versions of one service.
pub struct VersionManager<'a> {
    client: &'a dyn FastlyClient,
    service_id: String,
    resolved: Option<Version>,
}

impl<'a> VersionManager<'a> {
    /// A manager for `service_id`.
    pub fn new(client: &'a dyn FastlyClient, service_id: impl Into<String>) -> Self {
        Self {
            client,
            service_id: service_id.into(),
            resolved: None,
        }
    }

    /// The service this manager works on.
    pub fn service_id(&self) -> &str {
        &self.service_id
    }

    /// The highest-numbered version of the service.
    pub async fn latest_version(&self) -> Result<Version, ProviderError> {
        let versions = self.client.list_versions(&self.service_id).await?;
        latest_by_number(versions, |v| v.number).ok_or_else(|| {
            ProviderError::NotFound(format!("service {} has no versions", self.service_id))
        })
    }

    /// The version this operation writes to.
    ///
    /// The first call clones the latest version if it is locked; later calls
    /// return the same version without touching the API.
    pub async fn ensure_mutable(&mut self) -> Result<Version, ProviderError> {
        if let Some(version) = &self.resolved {
            return Ok(version.clone());
        }

        let latest = self.latest_version().await?;
        let version = if latest.locked {
            let cloned = self
                .client
                .clone_version(&self.service_id, latest.number)
                .await?;
            info!(
                service_id = %self.service_id,
                from = latest.number,
                to = cloned.number,
                "Cloned locked version"
            );
            cloned
        } else {
            debug!(
                service_id = %self.service_id,
                version = latest.number,
                "Reusing unlocked version"
            );
            latest
        };

        self.resolved = Some(version.clone());
        Ok(version)
    }

    /// Validate a version, then activate it.
    ///
    /// A version the API reports as invalid (no domains, no backends, ...) is
    /// never activated; the validation messages come back as
    /// [`ProviderError::Validation`].
    pub async fn activate(&self, number: u32) -> Result<Version, ProviderError> {
        let validation = self
            .client
            .validate_version(&self.service_id, number)
            .await?;
        if !validation.valid {
            return Err(ProviderError::Validation(format!(
                "version {} of service {} is invalid: {}",
                number,
                self.service_id,
                validation.messages.join("; ")
            )));
        }

        let version = self
            .client
            .activate_version(&self.service_id, number)
            .await?;
        info!(service_id = %self.service_id, version = number, "Activated version");
        Ok(version)
    }

    /// Deactivate a version.
    pub async fn deactivate(&self, number: u32) -> Result<Version, ProviderError> {
        let version = self
            .client
            .deactivate_version(&self.service_id, number)
            .await?;
        info!(service_id = %self.service_id, version = number, "Deactivated version");
        Ok(version)
    }

    /// Deactivate the active version (if any), then delete the service.
    /// A service that is already gone counts as deleted.
    pub async fn delete_service(&self) -> Result<(), ProviderError> {
        let detail = match self.client.get_service_details(&self.service_id).await {
            Ok(detail) => detail,
            Err(err) if err.is_not_found() => {
                warn!(service_id = %self.service_id, "Service already deleted");
                return Ok(());
            },
            Err(err) => return Err(err.into()),
        };

        if let Some(active) = detail.active_version {
            self.deactivate(active.number).await?;
        }

        ignore_not_found(self.client.delete_service(&self.service_id).await)?;
        info!(service_id = %self.service_id, "Deleted service");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{CreateServiceInput, ServiceType};
    use crate::testing::FakeFastly;
    use tokio_test::{assert_err, assert_ok};

    async fn service(fake: &FakeFastly) -> String {
        fake.create_service(&CreateServiceInput {
            name: "svc".into(),
            comment: String::new(),
            service_type: ServiceType::Vcl,
        })
        .await
        .unwrap()
        .id
    }

    #[test]
    fn test_latest_by_number_prefers_first_on_ties() {
        let picked = latest_by_number(vec![(2, "a"), (3, "b"), (3, "c"), (1, "d")], |v| v.0);
        assert_eq!(picked, Some((3, "b")));
        assert_eq!(latest_by_number(Vec::<(u32, ())>::new(), |v| v.0), None);
    }

    #[tokio::test]
    async fn test_ensure_mutable_reuses_unlocked_version() {
        let fake = FakeFastly::new();
        let id = service(&fake).await;

        let mut manager = VersionManager::new(&fake, id);
        let version = assert_ok!(manager.ensure_mutable().await);
        assert_eq!(version.number, 1);
        assert_eq!(fake.calls_named("clone_version").len(), 0);
    }

    #[tokio::test]
    async fn test_ensure_mutable_clones_once() {
        let fake = FakeFastly::new();
        let id = service(&fake).await;
        fake.seed_valid_version(&id, 1);
        fake.activate_version(&id, 1).await.unwrap();

        let mut manager = VersionManager::new(&fake, id);
        let first = assert_ok!(manager.ensure_mutable().await);
        let second = assert_ok!(manager.ensure_mutable().await);

        assert_eq!(first, second);
        assert_eq!(first.number, 2);
        assert!(!first.locked);
        assert_eq!(fake.calls_named("clone_version").len(), 1);
    }

    #[tokio::test]
    async fn test_activate_rejects_invalid_version() {
        let fake = FakeFastly::new();
        let id = service(&fake).await;

        let manager = VersionManager::new(&fake, id);
        let err = assert_err!(manager.activate(1).await);
        assert_eq!(err.kind(), crate::error::ErrorKind::ValidationFailed);
        assert!(fake.calls_named("activate_version").is_empty());
    }

    #[tokio::test]
    async fn test_delete_service_deactivates_first() {
        let fake = FakeFastly::new();
        let id = service(&fake).await;
        fake.seed_valid_version(&id, 1);
        fake.activate_version(&id, 1).await.unwrap();

        let manager = VersionManager::new(&fake, id.clone());
        assert_ok!(manager.delete_service().await);
        assert_eq!(
            fake.call_names(),
            vec![
                "create_service",
                "activate_version",
                "get_service_details",
                "deactivate_version",
                "delete_service"
            ]
        );

        // Second delete finds nothing and still succeeds.
        assert_ok!(manager.delete_service().await);
    }
}
