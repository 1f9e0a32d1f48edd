//! Per-block service attribute handlers and the set-diff reconciler.
//!
//! A service resource is a fixed, ordered list of
//! [`ServiceAttributeHandler`]s. On write, each handler whose
//! [`must_process`](ServiceAttributeHandler::must_process) is true reconciles
//! its own collection against the mutable version. On read, each handler
//! lists its collection on the version being read and writes the flattened
//! result back into state.
//!
//! Errors abort the chain. Whatever earlier handlers already applied stays
//! applied; the API has no multi-call transaction.

pub mod block;
#[allow(missing_docs)]
pub mod catalog;
#[allow(missing_docs)]
pub mod logging;
pub mod package;
pub mod settings;
pub mod waf;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::client::{FastlyClient, ServiceDetail};
use crate::error::ProviderError;
use crate::resource_data::ResourceData;
use crate::schema::Schema;
use crate::set::BlockSet;

pub use block::{BlockHandler, BlockSpec, FieldSpec, FieldType};
pub use package::PackageHandler;
pub use settings::SettingsHandler;
pub use waf::ServiceWafHandler;

/// Contract every service block handler implements.
#[async_trait]
pub trait ServiceAttributeHandler: Send + Sync {
    /// Schema attribute this handler owns, e.g. `backend`.
    fn key(&self) -> &str;

    /// Whether the host planned a change to this handler's attribute.
    fn has_change(&self, d: &ResourceData) -> bool {
        d.has_change(self.key())
    }

    /// Whether `process` must run. `initial_version` is true while the
    /// service's first version is being populated.
    fn must_process(&self, d: &ResourceData, _initial_version: bool) -> bool {
        self.has_change(d)
    }

    /// Push planned changes to `version`.
    async fn process(
        &self,
        d: &ResourceData,
        version: u32,
        client: &dyn FastlyClient,
    ) -> Result<(), ProviderError>;

    /// Refresh this handler's attribute from the version being read.
    async fn read(
        &self,
        d: &mut ResourceData,
        service: &ServiceDetail,
        client: &dyn FastlyClient,
    ) -> Result<(), ProviderError>;

    /// Add this handler's attributes to the resource schema.
    fn register(&self, schema: &mut Schema);
}

/// The version reads are served from: the active one, or the latest if
/// nothing has been activated yet.
pub fn read_version(service: &ServiceDetail) -> u32 {
    service
        .active_version
        .as_ref()
        .map(|v| v.number)
        .unwrap_or(service.version.number)
}

/// A remote collection the reconciler can add to and remove from.
#[async_trait]
pub trait RemoteCollection: Send + Sync {
    /// Label used in logs.
    fn label(&self) -> &str;

    /// Field an added element must carry to be created. `None` disables the
    /// check.
    fn identity_field(&self) -> Option<&str> {
        Some("name")
    }

    /// Remove one element.
    async fn delete(&self, element: &Map<String, Value>) -> Result<(), ProviderError>;

    /// Create one element.
    async fn create(&self, element: &Map<String, Value>) -> Result<(), ProviderError>;

    /// Remove a batch. A 404 on an element means it is already gone.
    async fn delete_batch(&self, elements: &[Map<String, Value>]) -> Result<(), ProviderError> {
        for element in elements {
            match self.delete(element).await {
                Err(err) if err.is_not_found() => {
                    debug!(collection = self.label(), error = %err, "Element already gone");
                },
                other => other?,
            }
        }
        Ok(())
    }

    /// Create a batch. Stops at the first failure.
    async fn create_batch(&self, elements: &[Map<String, Value>]) -> Result<(), ProviderError> {
        for element in elements {
            self.create(element).await?;
        }
        Ok(())
    }
}

/// What a reconciliation did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Elements removed.
    pub deleted: usize,
    /// Elements created.
    pub created: usize,
    /// Added elements skipped for lacking their identity field.
    pub skipped: usize,
}

/// Bring `target` from `old` to `new`.
///
/// Every element of `old − new` is deleted, then every element of
/// `new − old` is created. Elements in both sets are left alone. An added
/// element without its identity field (absent or `""`) is skipped with a
/// warning: the host can produce such phantom elements when diffing nested
/// sets, though a genuinely misconfigured block would be masked the same way.
pub async fn reconcile(
    old: &BlockSet,
    new: &BlockSet,
    target: &dyn RemoteCollection,
) -> Result<ReconcileReport, ProviderError> {
    let to_remove = old.difference(new);
    let mut to_add = new.difference(old);
    let mut report = ReconcileReport::default();

    if let Some(field) = target.identity_field() {
        let before = to_add.len();
        to_add.retain(|element| match element.get(field).and_then(Value::as_str) {
            Some(value) if !value.is_empty() => true,
            _ => {
                warn!(
                    collection = target.label(),
                    field,
                    "Skipping added element without identity field"
                );
                false
            },
        });
        report.skipped = before - to_add.len();
    }

    if !to_remove.is_empty() {
        debug!(collection = target.label(), count = to_remove.len(), "Removing elements");
        target.delete_batch(&to_remove).await?;
        report.deleted = to_remove.len();
    }

    if !to_add.is_empty() {
        debug!(collection = target.label(), count = to_add.len(), "Adding elements");
        target.create_batch(&to_add).await?;
        report.created = to_add.len();
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ClientError;
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<String>>,
        fail_delete_with: Option<ClientError>,
    }

    #[async_trait]
    impl RemoteCollection for Recorder {
        fn label(&self) -> &str {
            "recorder"
        }

        async fn delete(&self, element: &Map<String, Value>) -> Result<(), ProviderError> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("delete {}", element["name"]));
            match &self.fail_delete_with {
                Some(err) => Err(err.clone().into()),
                None => Ok(()),
            }
        }

        async fn create(&self, element: &Map<String, Value>) -> Result<(), ProviderError> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("create {}", element["name"]));
            Ok(())
        }
    }

    fn set(value: Value) -> BlockSet {
        BlockSet::from_value(Some(&value))
    }

    #[tokio::test]
    async fn test_reconcile_only_touches_the_difference() {
        let recorder = Recorder::default();
        let old = set(json!([{"name": "A", "address": "x"}]));
        let new = set(json!([{"name": "A", "address": "x"}, {"name": "B", "address": "y"}]));

        let report = reconcile(&old, &new, &recorder).await.unwrap();
        assert_eq!(report.created, 1);
        assert_eq!(report.deleted, 0);
        assert_eq!(*recorder.calls.lock().unwrap(), vec!["create \"B\""]);
    }

    #[tokio::test]
    async fn test_reconcile_deletes_before_creating() {
        let recorder = Recorder::default();
        let old = set(json!([{"name": "A", "address": "x"}]));
        let new = set(json!([{"name": "A", "address": "z"}]));

        reconcile(&old, &new, &recorder).await.unwrap();
        assert_eq!(
            *recorder.calls.lock().unwrap(),
            vec!["delete \"A\"", "create \"A\""]
        );
    }

    #[tokio::test]
    async fn test_reconcile_skips_nameless_additions() {
        let recorder = Recorder::default();
        let new = set(json!([{"name": ""}, {"address": "x"}, {"name": "ok"}]));

        let report = reconcile(&BlockSet::new(), &new, &recorder).await.unwrap();
        assert_eq!(report.skipped, 2);
        assert_eq!(report.created, 1);
    }

    #[tokio::test]
    async fn test_reconcile_tolerates_not_found_on_delete() {
        let recorder = Recorder {
            fail_delete_with: Some(ClientError::not_found("acl gone")),
            ..Default::default()
        };
        let old = set(json!([{"name": "foo"}]));

        let report = reconcile(&old, &BlockSet::new(), &recorder).await.unwrap();
        assert_eq!(report.deleted, 1);
    }

    #[tokio::test]
    async fn test_reconcile_surfaces_other_delete_errors() {
        let recorder = Recorder {
            fail_delete_with: Some(ClientError::http(500, "boom")),
            ..Default::default()
        };
        let old = set(json!([{"name": "foo"}]));
        let new = set(json!([{"name": "bar"}]));

        let err = reconcile(&old, &new, &recorder).await.unwrap_err();
        assert!(matches!(err, ProviderError::Api(_)));
        // Creates never ran.
        assert_eq!(*recorder.calls.lock().unwrap(), vec!["delete \"foo\""]);
    }
}
