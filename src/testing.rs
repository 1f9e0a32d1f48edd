//! Test doubles and harnesses.
//!
//! [`FakeFastly`] is an in-memory [`FastlyClient`]. It models what the
//! provider relies on: versions that lock on activation, deep-copy clones,
//! server-side validation (a version needs a domain and a backend), WAF
//! versions with their active rules, versionless ACL and dictionary
//! contents, and TLS objects. Every call is recorded before it runs, so a
//! call that fails still shows up in [`FakeFastly::calls_named`].
//!
//! [`ProviderTester`] drives a [`ProviderService`] the way a host would.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use fastly_provider::testing::{FakeFastly, ProviderTester};
//! use serde_json::json;
//!
//! #[tokio::test]
//! async fn test_create_service() {
//!     let fake = Arc::new(FakeFastly::new());
//!     let tester = ProviderTester::fastly(fake.clone());
//!
//!     let state = tester
//!         .lifecycle_create("fastly_service_v1", json!({
//!             "name": "demo",
//!             "domain": [{"name": "demo.example.com"}],
//!             "backend": [{"name": "origin", "address": "origin.example.com"}]
//!         }))
//!         .await
//!         .unwrap();
//!
//!     assert_eq!(state["active_version"], 1);
//!     assert_eq!(fake.calls_named("activate_version").len(), 1);
//! }
//! ```

use std::collections::{BTreeMap, VecDeque};
use std::fmt::Debug;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde_json::{json, Value};
use sha2::{Digest, Sha256, Sha512};

use crate::client::{
    AclEntry, BlockKind, ClientResult, CreateAclEntryInput, CreateBlockInput,
    CreatePrivateKeyInput, CreateServiceInput, CreateTlsActivationInput,
    CreateTlsSubscriptionInput, CreateWafInput, DeleteBlockInput, DictionaryItem, FastlyClient,
    ListWafRulesInput, Package, PrivateKey, RemoteBlock, ServiceDetail, ServiceType, Settings,
    TlsActivation, TlsCertificate, TlsCertificateInput, TlsObject, TlsSubscription,
    UpdatePackageInput, UpdateServiceInput, UpdateSettingsInput,
    UpdateWafInput, Version, VersionValidation, Waf, WafActiveRule, WafRule, WafVersion,
    WafVersionSettings,
};
use crate::error::{ClientError, ProviderError};
use crate::provider::{FastlyProvider, ProviderService};
use crate::schema::{Diagnostic, DiagnosticSeverity, ProviderSchema};
use crate::types::{ImportedResource, PlanResult};

const DEFAULT_PAGE_SIZE: usize = 100;
const FAKE_TIMESTAMP: &str = "2024-01-01T00:00:00Z";
const DEFAULT_TLS_CONFIGURATION: &str = "tls-config-default";

// =============================================================================
// FakeFastly
// =============================================================================

/// One client call as [`FakeFastly`] saw it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeCall {
    /// Trait method name, e.g. `clone_version`.
    pub method: String,
    /// Debug rendering of the arguments.
    pub args: String,
}

#[derive(Debug, Clone)]
struct FakeVersion {
    version: Version,
    settings: Settings,
    blocks: BTreeMap<BlockKind, Vec<RemoteBlock>>,
    package: Option<Package>,
    wafs: Vec<Waf>,
    force_valid: bool,
}

impl FakeVersion {
    fn new(number: u32) -> Self {
        Self {
            version: Version {
                number,
                locked: false,
                active: false,
                comment: String::new(),
            },
            settings: Settings {
                default_ttl: 3600,
                default_host: String::new(),
                stale_if_error: false,
                stale_if_error_ttl: 43200,
            },
            blocks: BTreeMap::new(),
            package: None,
            wafs: Vec::new(),
            force_valid: false,
        }
    }

    fn has(&self, kind: BlockKind) -> bool {
        self.blocks.get(&kind).is_some_and(|blocks| !blocks.is_empty())
    }

    fn validation(&self) -> VersionValidation {
        if self.force_valid {
            return VersionValidation {
                valid: true,
                messages: Vec::new(),
            };
        }
        let mut messages = Vec::new();
        if !self.has(BlockKind::Domain) {
            messages.push("Version must have at least one domain".to_string());
        }
        if !self.has(BlockKind::Backend) {
            messages.push("Version must have at least one backend".to_string());
        }
        VersionValidation {
            valid: messages.is_empty(),
            messages,
        }
    }
}

#[derive(Debug, Clone)]
struct FakeService {
    id: String,
    name: String,
    comment: String,
    service_type: ServiceType,
    versions: BTreeMap<u32, FakeVersion>,
}

impl FakeService {
    fn detail(&self) -> ServiceDetail {
        let active_version = self
            .versions
            .values()
            .find(|v| v.version.active)
            .map(|v| v.version.clone());
        let version = self
            .versions
            .values()
            .next_back()
            .map(|v| v.version.clone())
            .unwrap_or_else(|| FakeVersion::new(1).version);
        ServiceDetail {
            id: self.id.clone(),
            name: self.name.clone(),
            comment: self.comment.clone(),
            service_type: self.service_type,
            active_version,
            version,
        }
    }

    fn next_number(&self) -> u32 {
        self.versions.keys().next_back().copied().unwrap_or(0) + 1
    }
}

#[derive(Debug, Clone)]
struct FakeWafVersion {
    version: WafVersion,
    rules: Vec<WafActiveRule>,
}

impl FakeWafVersion {
    fn new(waf_id: &str, number: u32) -> Self {
        Self {
            version: WafVersion {
                id: format!("{}-v{}", waf_id, number),
                number,
                locked: false,
                active: false,
                settings: WafVersionSettings::default(),
            },
            rules: Vec::new(),
        }
    }
}

#[derive(Debug, Default)]
struct State {
    next_id: u64,
    calls: Vec<FakeCall>,
    failures: BTreeMap<String, VecDeque<ClientError>>,
    services: BTreeMap<String, FakeService>,
    waf_versions: BTreeMap<String, Vec<FakeWafVersion>>,
    waf_rules: Vec<WafRule>,
    acls: BTreeMap<(String, String), Vec<AclEntry>>,
    dictionaries: BTreeMap<(String, String), BTreeMap<String, String>>,
    private_keys: BTreeMap<String, PrivateKey>,
    activations: Vec<TlsActivation>,
    custom_certificates: Vec<TlsCertificate>,
    platform_certificates: Vec<TlsObject>,
    configurations: Vec<TlsObject>,
    subscriptions: Vec<TlsSubscription>,
}

fn missing(what: &str, id: impl std::fmt::Display) -> ClientError {
    ClientError::not_found(format!("{} {} not found", what, id))
}

impl State {
    fn generate_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}-{}", prefix, self.next_id)
    }

    fn service(&self, id: &str) -> ClientResult<&FakeService> {
        self.services.get(id).ok_or_else(|| missing("service", id))
    }

    fn service_mut(&mut self, id: &str) -> ClientResult<&mut FakeService> {
        self.services.get_mut(id).ok_or_else(|| missing("service", id))
    }

    fn version(&self, service_id: &str, number: u32) -> ClientResult<&FakeVersion> {
        self.service(service_id)?
            .versions
            .get(&number)
            .ok_or_else(|| missing("version", number))
    }

    fn version_mut(&mut self, service_id: &str, number: u32) -> ClientResult<&mut FakeVersion> {
        self.service_mut(service_id)?
            .versions
            .get_mut(&number)
            .ok_or_else(|| missing("version", number))
    }

    /// A version that still accepts configuration writes.
    fn writable(&mut self, service_id: &str, number: u32) -> ClientResult<&mut FakeVersion> {
        let version = self.version_mut(service_id, number)?;
        if version.version.locked {
            return Err(ClientError::http(
                400,
                format!("version {} is locked", number),
            ));
        }
        Ok(version)
    }

    fn waf(&mut self, waf_id: &str) -> ClientResult<&mut Vec<FakeWafVersion>> {
        self.waf_versions
            .get_mut(waf_id)
            .ok_or_else(|| missing("WAF", waf_id))
    }

    fn waf_version(&mut self, waf_id: &str, number: u32) -> ClientResult<&mut FakeWafVersion> {
        self.waf(waf_id)?
            .iter_mut()
            .find(|v| v.version.number == number)
            .ok_or_else(|| missing("WAF version", number))
    }

    fn writable_waf_version(
        &mut self,
        waf_id: &str,
        number: u32,
    ) -> ClientResult<&mut FakeWafVersion> {
        let version = self.waf_version(waf_id, number)?;
        if version.version.locked {
            return Err(ClientError::http(
                400,
                format!("WAF version {} is locked", number),
            ));
        }
        Ok(version)
    }

    /// A new WAF whose first version is deployed with no rules.
    fn insert_waf(&mut self, waf_id: &str) {
        let mut first = FakeWafVersion::new(waf_id, 1);
        first.version.locked = true;
        first.version.active = true;
        self.waf_versions.insert(waf_id.to_string(), vec![first]);
    }

    fn acl(&mut self, service_id: &str, acl_id: &str) -> ClientResult<&mut Vec<AclEntry>> {
        self.acls
            .get_mut(&(service_id.to_string(), acl_id.to_string()))
            .ok_or_else(|| missing("ACL", acl_id))
    }

    fn dictionary(
        &mut self,
        service_id: &str,
        dictionary_id: &str,
    ) -> ClientResult<&mut BTreeMap<String, String>> {
        self.dictionaries
            .get_mut(&(service_id.to_string(), dictionary_id.to_string()))
            .ok_or_else(|| missing("dictionary", dictionary_id))
    }

    fn activation(&mut self, id: &str) -> ClientResult<&mut TlsActivation> {
        self.activations
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| missing("TLS activation", id))
    }
}

/// In-memory Fastly API.
#[derive(Debug)]
pub struct FakeFastly {
    state: Mutex<State>,
    page_size: usize,
}

impl Default for FakeFastly {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeFastly {
    /// An empty account.
    pub fn new() -> Self {
        Self::with_page_size(DEFAULT_PAGE_SIZE)
    }

    /// An empty account whose paginated listings return `page_size` items
    /// per page.
    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            state: Mutex::new(State::default()),
            page_size: page_size.max(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record a call, then fail it if a failure was queued for the method.
    fn enter(&self, method: &str, args: impl Debug) -> ClientResult<MutexGuard<'_, State>> {
        let mut state = self.lock();
        state.calls.push(FakeCall {
            method: method.to_string(),
            args: format!("{:?}", args),
        });
        if let Some(err) = state.failures.get_mut(method).and_then(VecDeque::pop_front) {
            return Err(err);
        }
        Ok(state)
    }

    fn page<T: Clone>(&self, items: &[T], page: u32) -> Vec<T> {
        let start = (page.max(1) as usize - 1) * self.page_size;
        items.iter().skip(start).take(self.page_size).cloned().collect()
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    /// Every recorded call to `method`, oldest first.
    pub fn calls_named(&self, method: &str) -> Vec<FakeCall> {
        self.lock()
            .calls
            .iter()
            .filter(|call| call.method == method)
            .cloned()
            .collect()
    }

    /// The method names of every recorded call, oldest first.
    pub fn call_names(&self) -> Vec<String> {
        self.lock().calls.iter().map(|call| call.method.clone()).collect()
    }

    /// Forget recorded calls.
    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    /// Make the next call to `method` fail with `error`. The call is still
    /// recorded.
    pub fn fail_next(&self, method: &str, error: ClientError) {
        self.lock()
            .failures
            .entry(method.to_string())
            .or_default()
            .push_back(error);
    }

    // =========================================================================
    // Seeding
    // =========================================================================

    /// Let a version pass validation whatever it contains.
    pub fn seed_valid_version(&self, service_id: &str, number: u32) {
        if let Ok(version) = self.lock().version_mut(service_id, number) {
            version.force_valid = true;
        }
    }

    /// A WAF on `service_id`'s version `number`, with a deployed, locked,
    /// empty first WAF version. The service does not have to exist.
    pub fn seed_waf(&self, service_id: &str, number: u32) -> String {
        let mut state = self.lock();
        let waf_id = state.generate_id("waf");
        if let Ok(version) = state.version_mut(service_id, number) {
            version.wafs.push(Waf {
                id: waf_id.clone(),
                response_object: String::new(),
                prefetch_condition: String::new(),
                disabled: false,
            });
        }
        state.insert_waf(&waf_id);
        waf_id
    }

    /// An empty ACL container on `service_id`.
    pub fn seed_acl(&self, service_id: &str, name: &str) -> String {
        let mut state = self.lock();
        let acl_id = state.generate_id(&format!("acl-{}", name));
        state
            .acls
            .insert((service_id.to_string(), acl_id.clone()), Vec::new());
        acl_id
    }

    /// An empty dictionary container on `service_id`.
    pub fn seed_dictionary(&self, service_id: &str, name: &str) -> String {
        let mut state = self.lock();
        let dictionary_id = state.generate_id(&format!("dict-{}", name));
        state
            .dictionaries
            .insert((service_id.to_string(), dictionary_id.clone()), BTreeMap::new());
        dictionary_id
    }

    /// Replace the WAF rule catalogue.
    pub fn seed_waf_rules(&self, rules: Vec<WafRule>) {
        self.lock().waf_rules = rules;
    }

    /// Add a TLS configuration.
    pub fn seed_tls_configuration(&self, id: &str) {
        self.lock().configurations.push(TlsObject {
            id: id.to_string(),
            name: id.to_string(),
        });
    }

    /// Add a customer-uploaded certificate.
    pub fn seed_custom_certificate(&self, id: &str) {
        self.lock().custom_certificates.push(TlsCertificate {
            id: id.to_string(),
            name: id.to_string(),
            created_at: FAKE_TIMESTAMP.to_string(),
            updated_at: FAKE_TIMESTAMP.to_string(),
            issued_to: String::new(),
            issuer: String::new(),
            replace: false,
            serial_number: String::new(),
            signature_algorithm: String::new(),
            domains: Vec::new(),
        });
    }

    /// Add a platform certificate.
    pub fn seed_platform_certificate(&self, id: &str) {
        self.lock().platform_certificates.push(TlsObject {
            id: id.to_string(),
            name: id.to_string(),
        });
    }

    /// Add a TLS activation.
    pub fn seed_tls_activation(&self, activation: TlsActivation) {
        self.lock().activations.push(activation);
    }

    /// Add a TLS subscription.
    pub fn seed_tls_subscription(&self, subscription: TlsSubscription) {
        self.lock().subscriptions.push(subscription);
    }
}

#[async_trait]
impl FastlyClient for FakeFastly {
    // =========================================================================
    // Services & Versions
    // =========================================================================

    async fn create_service(&self, input: &CreateServiceInput) -> ClientResult<ServiceDetail> {
        let mut state = self.enter("create_service", input)?;
        let id = state.generate_id("svc");
        let service = FakeService {
            id: id.clone(),
            name: input.name.clone(),
            comment: input.comment.clone(),
            service_type: input.service_type,
            versions: BTreeMap::from([(1, FakeVersion::new(1))]),
        };
        let detail = service.detail();
        state.services.insert(id, service);
        Ok(detail)
    }

    async fn get_service_details(&self, service_id: &str) -> ClientResult<ServiceDetail> {
        let state = self.enter("get_service_details", service_id)?;
        Ok(state.service(service_id)?.detail())
    }

    async fn update_service(&self, input: &UpdateServiceInput) -> ClientResult<()> {
        let mut state = self.enter("update_service", input)?;
        let service = state.service_mut(&input.service_id)?;
        if let Some(name) = &input.name {
            service.name = name.clone();
        }
        if let Some(comment) = &input.comment {
            service.comment = comment.clone();
        }
        Ok(())
    }

    async fn delete_service(&self, service_id: &str) -> ClientResult<()> {
        let mut state = self.enter("delete_service", service_id)?;
        if state.service(service_id)?.versions.values().any(|v| v.version.active) {
            return Err(ClientError::http(
                400,
                "cannot delete a service with an active version",
            ));
        }
        state.services.remove(service_id);
        Ok(())
    }

    async fn list_versions(&self, service_id: &str) -> ClientResult<Vec<Version>> {
        let state = self.enter("list_versions", service_id)?;
        Ok(state
            .service(service_id)?
            .versions
            .values()
            .map(|v| v.version.clone())
            .collect())
    }

    async fn clone_version(&self, service_id: &str, number: u32) -> ClientResult<Version> {
        let mut state = self.enter("clone_version", (service_id, number))?;
        let service = state.service_mut(service_id)?;
        let mut copy = service
            .versions
            .get(&number)
            .cloned()
            .ok_or_else(|| missing("version", number))?;
        copy.version.number = service.next_number();
        copy.version.locked = false;
        copy.version.active = false;
        let version = copy.version.clone();
        service.versions.insert(version.number, copy);
        Ok(version)
    }

    async fn update_version_comment(
        &self,
        service_id: &str,
        number: u32,
        comment: &str,
    ) -> ClientResult<Version> {
        let mut state = self.enter("update_version_comment", (service_id, number, comment))?;
        let version = state.writable(service_id, number)?;
        version.version.comment = comment.to_string();
        Ok(version.version.clone())
    }

    async fn validate_version(
        &self,
        service_id: &str,
        number: u32,
    ) -> ClientResult<VersionValidation> {
        let state = self.enter("validate_version", (service_id, number))?;
        Ok(state.version(service_id, number)?.validation())
    }

    async fn activate_version(&self, service_id: &str, number: u32) -> ClientResult<Version> {
        let mut state = self.enter("activate_version", (service_id, number))?;
        let validation = state.version(service_id, number)?.validation();
        if !validation.valid {
            return Err(ClientError::http(400, validation.messages.join("; ")));
        }
        let service = state.service_mut(service_id)?;
        for version in service.versions.values_mut() {
            version.version.active = version.version.number == number;
        }
        let version = service
            .versions
            .get_mut(&number)
            .ok_or_else(|| missing("version", number))?;
        version.version.locked = true;
        Ok(version.version.clone())
    }

    async fn deactivate_version(&self, service_id: &str, number: u32) -> ClientResult<Version> {
        let mut state = self.enter("deactivate_version", (service_id, number))?;
        let version = state.version_mut(service_id, number)?;
        version.version.active = false;
        Ok(version.version.clone())
    }

    // =========================================================================
    // Version-scoped configuration
    // =========================================================================

    async fn get_settings(&self, service_id: &str, version: u32) -> ClientResult<Settings> {
        let state = self.enter("get_settings", (service_id, version))?;
        Ok(state.version(service_id, version)?.settings.clone())
    }

    async fn update_settings(&self, input: &UpdateSettingsInput) -> ClientResult<Settings> {
        let mut state = self.enter("update_settings", input)?;
        let settings = &mut state.writable(&input.service_id, input.version)?.settings;
        settings.default_ttl = input.default_ttl;
        if let Some(host) = &input.default_host {
            settings.default_host = host.clone();
        }
        if let Some(stale) = input.stale_if_error {
            settings.stale_if_error = stale;
        }
        if let Some(ttl) = input.stale_if_error_ttl {
            settings.stale_if_error_ttl = ttl;
        }
        Ok(settings.clone())
    }

    async fn list_blocks(
        &self,
        kind: BlockKind,
        service_id: &str,
        version: u32,
    ) -> ClientResult<Vec<RemoteBlock>> {
        let state = self.enter("list_blocks", (kind, service_id, version))?;
        Ok(state
            .version(service_id, version)?
            .blocks
            .get(&kind)
            .cloned()
            .unwrap_or_default())
    }

    async fn create_block(
        &self,
        kind: BlockKind,
        input: &CreateBlockInput,
    ) -> ClientResult<RemoteBlock> {
        let mut state = self.enter("create_block", (kind, input))?;
        let name = input
            .fields
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let id = match input.fields.get("id").and_then(Value::as_str) {
            Some(id) => id.to_string(),
            None => state.generate_id(&kind.path().replace('/', "-")),
        };

        let version = state.writable(&input.service_id, input.version)?;
        let blocks = version.blocks.entry(kind).or_default();
        if blocks
            .iter()
            .any(|b| b.get("name").and_then(Value::as_str) == Some(name.as_str()))
        {
            return Err(ClientError::http(
                409,
                format!("{} {:?} already exists", kind.path(), name),
            ));
        }
        let mut block = input.fields.clone();
        block.insert("id".to_string(), json!(id));
        blocks.push(block.clone());

        let container = (input.service_id.clone(), id);
        match kind {
            BlockKind::Acl => {
                state.acls.entry(container).or_default();
            },
            BlockKind::Dictionary => {
                state.dictionaries.entry(container).or_default();
            },
            _ => {},
        }
        Ok(block)
    }

    async fn delete_block(&self, kind: BlockKind, input: &DeleteBlockInput) -> ClientResult<()> {
        let mut state = self.enter("delete_block", (kind, input))?;
        let version = state.writable(&input.service_id, input.version)?;
        let blocks = version.blocks.entry(kind).or_default();
        let before = blocks.len();
        blocks.retain(|b| b.get("name").and_then(Value::as_str) != Some(input.name.as_str()));
        if blocks.len() == before {
            return Err(missing(kind.path(), &input.name));
        }
        Ok(())
    }

    async fn get_package(&self, service_id: &str, version: u32) -> ClientResult<Package> {
        let state = self.enter("get_package", (service_id, version))?;
        let package = state.version(service_id, version)?.package.clone();
        Ok(package.unwrap_or_else(|| Package {
            service_id: service_id.to_string(),
            version,
            name: String::new(),
            hashsum: String::new(),
        }))
    }

    async fn update_package(&self, input: &UpdatePackageInput) -> ClientResult<Package> {
        let mut state = self.enter("update_package", input)?;
        let name = std::path::Path::new(&input.package_path)
            .file_stem()
            .and_then(|stem| stem.to_str())
            .map(|stem| stem.trim_end_matches(".tar").to_string())
            .unwrap_or_default();
        let package = Package {
            service_id: input.service_id.clone(),
            version: input.version,
            name,
            hashsum: hex::encode(Sha512::digest(input.package_path.as_bytes())),
        };
        state.writable(&input.service_id, input.version)?.package = Some(package.clone());
        Ok(package)
    }

    async fn list_wafs(&self, service_id: &str, version: u32) -> ClientResult<Vec<Waf>> {
        let state = self.enter("list_wafs", (service_id, version))?;
        Ok(state.version(service_id, version)?.wafs.clone())
    }

    async fn create_waf(&self, input: &CreateWafInput) -> ClientResult<Waf> {
        let mut state = self.enter("create_waf", input)?;
        let waf_id = state.generate_id("waf");
        let waf = Waf {
            id: waf_id.clone(),
            response_object: input.response_object.clone(),
            prefetch_condition: input.prefetch_condition.clone(),
            disabled: false,
        };
        state
            .writable(&input.service_id, input.version)?
            .wafs
            .push(waf.clone());
        state.insert_waf(&waf_id);
        Ok(waf)
    }

    async fn update_waf(&self, input: &UpdateWafInput) -> ClientResult<Waf> {
        let mut state = self.enter("update_waf", input)?;
        let version = state.writable(&input.service_id, input.version)?;
        let waf = version
            .wafs
            .iter_mut()
            .find(|w| w.id == input.id)
            .ok_or_else(|| missing("WAF", &input.id))?;
        if let Some(response_object) = &input.response_object {
            waf.response_object = response_object.clone();
        }
        if let Some(prefetch_condition) = &input.prefetch_condition {
            waf.prefetch_condition = prefetch_condition.clone();
        }
        if let Some(disabled) = input.disabled {
            waf.disabled = disabled;
        }
        Ok(waf.clone())
    }

    async fn delete_waf(&self, waf_id: &str, version: u32) -> ClientResult<()> {
        let mut state = self.enter("delete_waf", (waf_id, version))?;
        let holder = state
            .services
            .values_mut()
            .filter_map(|service| service.versions.get_mut(&version))
            .find(|v| v.wafs.iter().any(|w| w.id == waf_id))
            .ok_or_else(|| missing("WAF", waf_id))?;
        if holder.version.locked {
            return Err(ClientError::http(400, format!("version {} is locked", version)));
        }
        holder.wafs.retain(|w| w.id != waf_id);
        state.waf_versions.remove(waf_id);
        Ok(())
    }

    // =========================================================================
    // WAF configuration
    // =========================================================================

    async fn list_waf_versions(&self, waf_id: &str) -> ClientResult<Vec<WafVersion>> {
        let mut state = self.enter("list_waf_versions", waf_id)?;
        Ok(state.waf(waf_id)?.iter().map(|v| v.version.clone()).collect())
    }

    async fn clone_waf_version(&self, waf_id: &str, number: u32) -> ClientResult<WafVersion> {
        let mut state = self.enter("clone_waf_version", (waf_id, number))?;
        let mut copy = state.waf_version(waf_id, number)?.clone();
        let versions = state.waf(waf_id)?;
        let next = versions.iter().map(|v| v.version.number).max().unwrap_or(0) + 1;
        copy.version.id = format!("{}-v{}", waf_id, next);
        copy.version.number = next;
        copy.version.locked = false;
        copy.version.active = false;
        versions.push(copy.clone());
        Ok(copy.version)
    }

    async fn update_waf_version(
        &self,
        waf_id: &str,
        number: u32,
        settings: &WafVersionSettings,
    ) -> ClientResult<WafVersion> {
        let mut state = self.enter("update_waf_version", (waf_id, number, settings))?;
        let version = state.writable_waf_version(waf_id, number)?;

        // Only the fields present in the request change.
        let mut merged = serde_json::to_value(&version.version.settings)
            .map_err(|err| ClientError::Transport(err.to_string()))?;
        if let (Value::Object(current), Ok(Value::Object(update))) =
            (&mut merged, serde_json::to_value(settings))
        {
            current.extend(update);
        }
        version.version.settings = serde_json::from_value(merged)
            .map_err(|err| ClientError::http(400, err.to_string()))?;
        Ok(version.version.clone())
    }

    async fn deploy_waf_version(&self, waf_id: &str, number: u32) -> ClientResult<()> {
        let mut state = self.enter("deploy_waf_version", (waf_id, number))?;
        state.waf_version(waf_id, number)?;
        for version in state.waf(waf_id)? {
            version.version.active = version.version.number == number;
            if version.version.number == number {
                version.version.locked = true;
            }
        }
        Ok(())
    }

    async fn create_empty_waf_version(&self, waf_id: &str) -> ClientResult<WafVersion> {
        let mut state = self.enter("create_empty_waf_version", waf_id)?;
        let versions = state.waf(waf_id)?;
        let next = versions.iter().map(|v| v.version.number).max().unwrap_or(0) + 1;
        let empty = FakeWafVersion::new(waf_id, next);
        versions.push(empty.clone());
        Ok(empty.version)
    }

    async fn list_waf_active_rules(
        &self,
        waf_id: &str,
        number: u32,
    ) -> ClientResult<Vec<WafActiveRule>> {
        let mut state = self.enter("list_waf_active_rules", (waf_id, number))?;
        Ok(state.waf_version(waf_id, number)?.rules.clone())
    }

    async fn create_waf_active_rules(
        &self,
        waf_id: &str,
        number: u32,
        rules: &[WafActiveRule],
    ) -> ClientResult<()> {
        let mut state = self.enter("create_waf_active_rules", (waf_id, number, rules))?;
        let version = state.writable_waf_version(waf_id, number)?;
        for rule in rules {
            version.rules.retain(|r| r.modsec_rule_id != rule.modsec_rule_id);
            version.rules.push(rule.clone());
        }
        Ok(())
    }

    async fn delete_waf_active_rules(
        &self,
        waf_id: &str,
        number: u32,
        rules: &[WafActiveRule],
    ) -> ClientResult<()> {
        let mut state = self.enter("delete_waf_active_rules", (waf_id, number, rules))?;
        let version = state.writable_waf_version(waf_id, number)?;
        version
            .rules
            .retain(|r| !rules.iter().any(|gone| gone.modsec_rule_id == r.modsec_rule_id));
        Ok(())
    }

    async fn list_waf_rules(&self, input: &ListWafRulesInput) -> ClientResult<Vec<WafRule>> {
        let state = self.enter("list_waf_rules", input)?;
        Ok(state
            .waf_rules
            .iter()
            .filter(|rule| !input.exclude_modsec_rule_ids.contains(&rule.modsec_rule_id))
            .cloned()
            .collect())
    }

    // =========================================================================
    // Versionless containers
    // =========================================================================

    async fn list_acl_entries(
        &self,
        service_id: &str,
        acl_id: &str,
    ) -> ClientResult<Vec<AclEntry>> {
        let mut state = self.enter("list_acl_entries", (service_id, acl_id))?;
        Ok(state.acl(service_id, acl_id)?.clone())
    }

    async fn create_acl_entry(&self, input: &CreateAclEntryInput) -> ClientResult<AclEntry> {
        let mut state = self.enter("create_acl_entry", input)?;
        state.acl(&input.service_id, &input.acl_id)?;
        let entry = AclEntry {
            id: state.generate_id("entry"),
            ip: input.ip.clone(),
            subnet: input.subnet.clone(),
            negated: input.negated,
            comment: input.comment.clone(),
        };
        state
            .acl(&input.service_id, &input.acl_id)?
            .push(entry.clone());
        Ok(entry)
    }

    async fn delete_acl_entry(
        &self,
        service_id: &str,
        acl_id: &str,
        entry_id: &str,
    ) -> ClientResult<()> {
        let mut state = self.enter("delete_acl_entry", (service_id, acl_id, entry_id))?;
        let entries = state.acl(service_id, acl_id)?;
        let before = entries.len();
        entries.retain(|e| e.id != entry_id);
        if entries.len() == before {
            return Err(missing("ACL entry", entry_id));
        }
        Ok(())
    }

    async fn list_dictionary_items(
        &self,
        service_id: &str,
        dictionary_id: &str,
    ) -> ClientResult<Vec<DictionaryItem>> {
        let mut state = self.enter("list_dictionary_items", (service_id, dictionary_id))?;
        Ok(state
            .dictionary(service_id, dictionary_id)?
            .iter()
            .map(|(key, value)| DictionaryItem {
                key: key.clone(),
                value: value.clone(),
            })
            .collect())
    }

    async fn create_dictionary_item(
        &self,
        service_id: &str,
        dictionary_id: &str,
        item: &DictionaryItem,
    ) -> ClientResult<DictionaryItem> {
        let mut state = self.enter("create_dictionary_item", (service_id, dictionary_id, item))?;
        let items = state.dictionary(service_id, dictionary_id)?;
        if items.contains_key(&item.key) {
            return Err(ClientError::http(
                409,
                format!("dictionary item {:?} already exists", item.key),
            ));
        }
        items.insert(item.key.clone(), item.value.clone());
        Ok(item.clone())
    }

    async fn update_dictionary_item(
        &self,
        service_id: &str,
        dictionary_id: &str,
        item: &DictionaryItem,
    ) -> ClientResult<DictionaryItem> {
        let mut state = self.enter("update_dictionary_item", (service_id, dictionary_id, item))?;
        state
            .dictionary(service_id, dictionary_id)?
            .insert(item.key.clone(), item.value.clone());
        Ok(item.clone())
    }

    async fn delete_dictionary_item(
        &self,
        service_id: &str,
        dictionary_id: &str,
        key: &str,
    ) -> ClientResult<()> {
        let mut state = self.enter("delete_dictionary_item", (service_id, dictionary_id, key))?;
        state
            .dictionary(service_id, dictionary_id)?
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| missing("dictionary item", key))
    }

    // =========================================================================
    // TLS
    // =========================================================================

    async fn create_private_key(&self, input: &CreatePrivateKeyInput) -> ClientResult<PrivateKey> {
        let mut state = self.enter("create_private_key", &input.name)?;
        let mut fingerprint = hex::encode(Sha256::digest(input.key_pem.as_bytes()));
        fingerprint.truncate(40);
        let key = PrivateKey {
            id: state.generate_id("key"),
            name: input.name.clone(),
            created_at: FAKE_TIMESTAMP.to_string(),
            key_length: 2048,
            key_type: "RSA".to_string(),
            replace: false,
            public_key_sha1: fingerprint,
        };
        state.private_keys.insert(key.id.clone(), key.clone());
        Ok(key)
    }

    async fn get_private_key(&self, id: &str) -> ClientResult<PrivateKey> {
        let state = self.enter("get_private_key", id)?;
        state
            .private_keys
            .get(id)
            .cloned()
            .ok_or_else(|| missing("private key", id))
    }

    async fn delete_private_key(&self, id: &str) -> ClientResult<()> {
        let mut state = self.enter("delete_private_key", id)?;
        state
            .private_keys
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| missing("private key", id))
    }

    async fn create_tls_activation(
        &self,
        input: &CreateTlsActivationInput,
    ) -> ClientResult<TlsActivation> {
        let mut state = self.enter("create_tls_activation", input)?;
        if state.activations.iter().any(|a| a.domain == input.domain) {
            return Err(ClientError::http(
                409,
                format!("TLS is already enabled for {}", input.domain),
            ));
        }
        let activation = TlsActivation {
            id: state.generate_id("act"),
            certificate_id: input.certificate_id.clone(),
            configuration_id: input
                .configuration_id
                .clone()
                .unwrap_or_else(|| DEFAULT_TLS_CONFIGURATION.to_string()),
            domain: input.domain.clone(),
            created_at: FAKE_TIMESTAMP.to_string(),
        };
        state.activations.push(activation.clone());
        Ok(activation)
    }

    async fn get_tls_activation(&self, id: &str) -> ClientResult<TlsActivation> {
        let mut state = self.enter("get_tls_activation", id)?;
        Ok(state.activation(id)?.clone())
    }

    async fn update_tls_activation(
        &self,
        id: &str,
        certificate_id: &str,
    ) -> ClientResult<TlsActivation> {
        let mut state = self.enter("update_tls_activation", (id, certificate_id))?;
        let activation = state.activation(id)?;
        activation.certificate_id = certificate_id.to_string();
        Ok(activation.clone())
    }

    async fn delete_tls_activation(&self, id: &str) -> ClientResult<()> {
        let mut state = self.enter("delete_tls_activation", id)?;
        state.activation(id)?;
        state.activations.retain(|a| a.id != id);
        Ok(())
    }

    async fn list_tls_activations(
        &self,
        certificate_id: Option<&str>,
        page: u32,
    ) -> ClientResult<Vec<TlsActivation>> {
        let state = self.enter("list_tls_activations", (certificate_id, page))?;
        let matching: Vec<TlsActivation> = state
            .activations
            .iter()
            .filter(|a| certificate_id.map_or(true, |id| a.certificate_id == id))
            .cloned()
            .collect();
        Ok(self.page(&matching, page))
    }

    async fn list_custom_certificates(&self, page: u32) -> ClientResult<Vec<TlsObject>> {
        let state = self.enter("list_custom_certificates", page)?;
        let listed: Vec<TlsObject> = state
            .custom_certificates
            .iter()
            .map(|c| TlsObject {
                id: c.id.clone(),
                name: c.name.clone(),
            })
            .collect();
        Ok(self.page(&listed, page))
    }

    async fn list_platform_certificates(&self, page: u32) -> ClientResult<Vec<TlsObject>> {
        let state = self.enter("list_platform_certificates", page)?;
        Ok(self.page(&state.platform_certificates, page))
    }

    async fn list_tls_configurations(&self, page: u32) -> ClientResult<Vec<TlsObject>> {
        let state = self.enter("list_tls_configurations", page)?;
        Ok(self.page(&state.configurations, page))
    }

    async fn list_tls_subscriptions(&self, page: u32) -> ClientResult<Vec<TlsSubscription>> {
        let state = self.enter("list_tls_subscriptions", page)?;
        Ok(self.page(&state.subscriptions, page))
    }

    async fn get_tls_subscription(&self, id: &str) -> ClientResult<TlsSubscription> {
        let state = self.enter("get_tls_subscription", id)?;
        state
            .subscriptions
            .iter()
            .find(|s| s.id == id)
            .cloned()
            .ok_or_else(|| missing("TLS subscription", id))
    }

    async fn create_tls_subscription(
        &self,
        input: &CreateTlsSubscriptionInput,
    ) -> ClientResult<TlsSubscription> {
        let mut state = self.enter("create_tls_subscription", input)?;
        let Some(common_name) = input.domains.first() else {
            return Err(ClientError::http(400, "a subscription needs at least one domain"));
        };
        let subscription = TlsSubscription {
            id: state.generate_id("sub"),
            configuration_id: input
                .configuration_id
                .clone()
                .unwrap_or_else(|| DEFAULT_TLS_CONFIGURATION.to_string()),
            domains: input.domains.clone(),
            certificate_authority: input.certificate_authority.clone(),
            common_name: common_name.clone(),
            state: "pending".to_string(),
            created_at: FAKE_TIMESTAMP.to_string(),
            updated_at: FAKE_TIMESTAMP.to_string(),
        };
        state.subscriptions.push(subscription.clone());
        Ok(subscription)
    }

    async fn delete_tls_subscription(&self, id: &str) -> ClientResult<()> {
        let mut state = self.enter("delete_tls_subscription", id)?;
        let before = state.subscriptions.len();
        state.subscriptions.retain(|s| s.id != id);
        if state.subscriptions.len() == before {
            return Err(missing("TLS subscription", id));
        }
        Ok(())
    }

    async fn create_custom_certificate(&self, input: &TlsCertificateInput) -> ClientResult<TlsCertificate> {
        let mut state = self.enter("create_custom_certificate", &input.name)?;
        if state.private_keys.is_empty() {
            return Err(ClientError::http(400, "no private key matches this certificate"));
        }
        let id = state.generate_id("cert");
        let certificate = fake_certificate(id, input);
        state.custom_certificates.push(certificate.clone());
        Ok(certificate)
    }

    async fn get_custom_certificate(&self, id: &str) -> ClientResult<TlsCertificate> {
        let state = self.enter("get_custom_certificate", id)?;
        state
            .custom_certificates
            .iter()
            .find(|c| c.id == id)
            .cloned()
            .ok_or_else(|| missing("certificate", id))
    }

    async fn update_custom_certificate(
        &self,
        id: &str,
        input: &TlsCertificateInput,
    ) -> ClientResult<TlsCertificate> {
        let mut state = self.enter("update_custom_certificate", (id, &input.name))?;
        let certificate = state
            .custom_certificates
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| missing("certificate", id))?;
        *certificate = fake_certificate(id.to_string(), input);
        Ok(certificate.clone())
    }

    async fn delete_custom_certificate(&self, id: &str) -> ClientResult<()> {
        let mut state = self.enter("delete_custom_certificate", id)?;
        let before = state.custom_certificates.len();
        state.custom_certificates.retain(|c| c.id != id);
        if state.custom_certificates.len() == before {
            return Err(missing("certificate", id));
        }
        Ok(())
    }
}

/// Certificate metadata as the API would report it. The fake does not parse
/// X.509: the subject comes from a `CN=` line in the body, when present.
fn fake_certificate(id: String, input: &TlsCertificateInput) -> TlsCertificate {
    let issued_to = input
        .certificate_body
        .lines()
        .find_map(|line| line.trim().strip_prefix("CN="))
        .unwrap_or_default()
        .to_string();
    let mut serial_number = hex::encode(Sha256::digest(input.certificate_body.as_bytes()));
    serial_number.truncate(32);
    TlsCertificate {
        id,
        name: input.name.clone().unwrap_or_else(|| issued_to.clone()),
        created_at: FAKE_TIMESTAMP.to_string(),
        updated_at: FAKE_TIMESTAMP.to_string(),
        domains: if issued_to.is_empty() { Vec::new() } else { vec![issued_to.clone()] },
        issued_to,
        issuer: "Fake Authority".to_string(),
        replace: false,
        serial_number,
        signature_algorithm: "SHA256-RSA".to_string(),
    }
}

// =============================================================================
// ProviderTester
// =============================================================================

/// Drives a [`ProviderService`] through host-style call sequences.
///
/// ```ignore
/// let tester = ProviderTester::fastly(Arc::new(FakeFastly::new()));
/// let state = tester.lifecycle_create("fastly_tls_private_key", json!({...})).await?;
/// ```
pub struct ProviderTester<P: ProviderService> {
    provider: P,
}

impl ProviderTester<FastlyProvider> {
    /// A tester over a [`FastlyProvider`] already wired to `fake`.
    pub fn fastly(fake: Arc<FakeFastly>) -> Self {
        Self::new(FastlyProvider::with_client(fake))
    }
}

impl<P: ProviderService> ProviderTester<P> {
    /// Wrap `provider`.
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    /// The wrapped provider.
    pub fn provider(&self) -> &P {
        &self.provider
    }

    // =========================================================================
    // Schema & Metadata
    // =========================================================================

    /// The provider's schema.
    pub fn schema(&self) -> ProviderSchema {
        self.provider.schema()
    }

    /// Registered resource type names.
    pub fn resource_types(&self) -> Vec<String> {
        self.provider.metadata().resources
    }

    /// Registered data source type names.
    pub fn data_source_types(&self) -> Vec<String> {
        self.provider.metadata().data_sources
    }

    // =========================================================================
    // Provider Lifecycle
    // =========================================================================

    /// Validate the provider block; error diagnostics become `Err`.
    pub async fn validate_provider_config(&self, config: Value) -> Result<(), TestError> {
        let diagnostics = self.provider.validate_provider_config(config).await?;
        check_diagnostics(diagnostics)
    }

    /// Configure the provider; error diagnostics become `Err`.
    pub async fn configure(&self, config: Value) -> Result<(), TestError> {
        let diagnostics = self.provider.configure(config).await?;
        check_diagnostics(diagnostics)
    }

    // =========================================================================
    // Resource Operations
    // =========================================================================

    /// Validate a resource configuration; error diagnostics become `Err`.
    pub async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<(), TestError> {
        let diagnostics = self
            .provider
            .validate_resource_config(resource_type, config)
            .await?;
        check_diagnostics(diagnostics)
    }

    /// Plan a creation.
    pub async fn plan_create(
        &self,
        resource_type: &str,
        proposed_state: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.provider.plan(resource_type, None, proposed_state).await
    }

    /// Plan an update of `prior_state` towards `proposed_state`.
    pub async fn plan_update(
        &self,
        resource_type: &str,
        prior_state: Value,
        proposed_state: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.provider
            .plan(resource_type, Some(prior_state), proposed_state)
            .await
    }

    /// Create a resource from its planned state.
    pub async fn create(&self, resource_type: &str, planned_state: Value) -> Result<Value, ProviderError> {
        self.provider.create(resource_type, planned_state).await
    }

    /// Refresh a resource. `Value::Null` means it is gone.
    pub async fn read(&self, resource_type: &str, current_state: Value) -> Result<Value, ProviderError> {
        self.provider.read(resource_type, current_state).await
    }

    /// Apply a planned update.
    pub async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        self.provider
            .update(resource_type, prior_state, planned_state)
            .await
    }

    /// Destroy a resource.
    pub async fn delete(&self, resource_type: &str, current_state: Value) -> Result<(), ProviderError> {
        self.provider.delete(resource_type, current_state).await
    }

    /// Import an existing object by ID.
    pub async fn import_resource(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        self.provider.import_resource(resource_type, id).await
    }

    // =========================================================================
    // Data Source Operations
    // =========================================================================

    /// Validate a data source configuration; error diagnostics become `Err`.
    pub async fn validate_data_source_config(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<(), TestError> {
        let diagnostics = self
            .provider
            .validate_data_source_config(data_source_type, config)
            .await?;
        check_diagnostics(diagnostics)
    }

    /// Read a data source.
    pub async fn read_data_source(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Value, ProviderError> {
        self.provider.read_data_source(data_source_type, config).await
    }

    // =========================================================================
    // Lifecycle Helpers
    // =========================================================================

    /// Plan, create, then read back.
    pub async fn lifecycle_create(&self, resource_type: &str, config: Value) -> Result<Value, ProviderError> {
        let plan = self.plan_create(resource_type, config).await?;
        let created = self.create(resource_type, plan.planned_state).await?;
        self.read(resource_type, created).await
    }

    /// Plan an update from `prior_state` to `config`, apply it, then read back.
    pub async fn lifecycle_update(
        &self,
        resource_type: &str,
        prior_state: Value,
        config: Value,
    ) -> Result<Value, ProviderError> {
        let plan = self
            .plan_update(resource_type, prior_state.clone(), config)
            .await?;
        let updated = self
            .update(resource_type, prior_state, plan.planned_state)
            .await?;
        self.read(resource_type, updated).await
    }

    /// Create, update, then delete. Returns the state after the update.
    pub async fn lifecycle_crud(
        &self,
        resource_type: &str,
        initial_config: Value,
        updated_config: Value,
    ) -> Result<Value, ProviderError> {
        let created = self.lifecycle_create(resource_type, initial_config).await?;
        let updated = self
            .lifecycle_update(resource_type, created, updated_config)
            .await?;
        self.delete(resource_type, updated.clone()).await?;
        Ok(updated)
    }
}

/// Failure of a tester call that reports diagnostics.
#[derive(Debug)]
pub enum TestError {
    /// Error diagnostics were returned.
    Diagnostics(Vec<Diagnostic>),
    /// The call itself failed.
    Provider(ProviderError),
}

impl std::fmt::Display for TestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TestError::Diagnostics(diags) => {
                writeln!(f, "{} error diagnostic(s):", diags.len())?;
                for diag in diags {
                    write!(f, "  {}", diag.summary)?;
                    if let Some(detail) = &diag.detail {
                        write!(f, ": {}", detail)?;
                    }
                    if let Some(attr) = &diag.attribute {
                        write!(f, " (at {})", attr)?;
                    }
                    writeln!(f)?;
                }
                Ok(())
            },
            TestError::Provider(e) => write!(f, "provider error: {}", e),
        }
    }
}

impl std::error::Error for TestError {}

impl From<ProviderError> for TestError {
    fn from(e: ProviderError) -> Self {
        TestError::Provider(e)
    }
}

fn is_error(d: &Diagnostic) -> bool {
    matches!(d.severity, DiagnosticSeverity::Error)
}

fn check_diagnostics(diagnostics: Vec<Diagnostic>) -> Result<(), TestError> {
    let errors: Vec<_> = diagnostics.into_iter().filter(is_error).collect();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(TestError::Diagnostics(errors))
    }
}

// =========================================================================
// Assertion Helpers
// =========================================================================

fn changed_paths(plan: &PlanResult) -> Vec<&str> {
    plan.changes.iter().map(|c| c.path.as_str()).collect()
}

/// Assert the plan changes something without replacing the resource.
pub fn assert_plan_updates_in_place(plan: &PlanResult) {
    assert!(plan.has_changes(), "expected changes, got none");
    assert!(
        !plan.requires_replace,
        "expected an in-place update, but the plan replaces: {:?}",
        changed_paths(plan)
    );
}

/// Assert the plan changes nothing.
pub fn assert_plan_no_changes(plan: &PlanResult) {
    assert!(
        !plan.has_changes(),
        "expected no changes, got {:?}",
        changed_paths(plan)
    );
}

/// Assert the plan replaces the resource.
pub fn assert_plan_replaces(plan: &PlanResult) {
    assert!(
        plan.requires_replace,
        "expected a replacement, but the plan updates in place: {:?}",
        changed_paths(plan)
    );
}

/// Assert the plan touches `path`.
pub fn assert_plan_changes_attribute(plan: &PlanResult, path: &str) {
    assert!(
        changed_paths(plan).contains(&path),
        "expected '{}' to change; changed: {:?}",
        path,
        changed_paths(plan)
    );
}

/// Assert the plan leaves `path` alone.
pub fn assert_plan_does_not_change_attribute(plan: &PlanResult, path: &str) {
    assert!(
        !changed_paths(plan).contains(&path),
        "expected '{}' to stay unchanged",
        path
    );
}

/// Assert there are no error diagnostics.
pub fn assert_no_errors(diagnostics: &[Diagnostic]) {
    let errors: Vec<_> = diagnostics.iter().filter(|d| is_error(d)).map(|d| &d.summary).collect();
    assert!(errors.is_empty(), "expected no errors, got {:?}", errors);
}

/// Assert some error diagnostic's summary or detail mentions `substring`.
pub fn assert_error_contains(diagnostics: &[Diagnostic], substring: &str) {
    let found = diagnostics.iter().filter(|d| is_error(d)).any(|d| {
        d.summary.contains(substring)
            || d.detail.as_deref().is_some_and(|detail| detail.contains(substring))
    });
    assert!(
        found,
        "expected an error mentioning '{}', got {:?}",
        substring,
        diagnostics.iter().map(|d| &d.summary).collect::<Vec<_>>()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AttributeChange;
    use tokio_test::{assert_err, assert_ok};

    fn vcl(name: &str) -> CreateServiceInput {
        CreateServiceInput {
            name: name.into(),
            comment: String::new(),
            service_type: ServiceType::Vcl,
        }
    }

    #[tokio::test]
    async fn test_calls_are_recorded_even_when_failing() {
        let fake = FakeFastly::new();
        fake.fail_next("get_service_details", ClientError::http(503, "down"));

        assert_err!(fake.get_service_details("svc-x").await);
        let err = assert_err!(fake.get_service_details("svc-x").await);
        assert!(err.is_not_found());
        assert_eq!(fake.calls_named("get_service_details").len(), 2);
    }

    #[tokio::test]
    async fn test_activation_locks_and_clone_copies() {
        let fake = FakeFastly::new();
        let service = fake.create_service(&vcl("demo")).await.unwrap();
        let block = |name: &str| CreateBlockInput {
            service_id: service.id.clone(),
            version: 1,
            fields: json!({"name": name}).as_object().cloned().unwrap_or_default(),
        };
        assert_ok!(fake.create_block(BlockKind::Domain, &block("demo.example.com")).await);
        assert_ok!(fake.create_block(BlockKind::Backend, &block("origin")).await);
        assert_ok!(fake.activate_version(&service.id, 1).await);

        let err = assert_err!(fake.create_block(BlockKind::Backend, &block("other")).await);
        assert_eq!(err, ClientError::http(400, "version 1 is locked"));

        let cloned = fake.clone_version(&service.id, 1).await.unwrap();
        assert_eq!(cloned.number, 2);
        assert!(!cloned.locked);
        let backends = fake.list_blocks(BlockKind::Backend, &service.id, 2).await.unwrap();
        assert_eq!(backends.len(), 1);
        assert!(backends[0].contains_key("id"));
    }

    #[tokio::test]
    async fn test_activation_requires_domain_and_backend() {
        let fake = FakeFastly::new();
        let service = fake.create_service(&vcl("bare")).await.unwrap();

        let validation = fake.validate_version(&service.id, 1).await.unwrap();
        assert!(!validation.valid);
        assert_eq!(validation.messages.len(), 2);
        let err = assert_err!(fake.activate_version(&service.id, 1).await);
        assert_eq!(err.kind(), crate::error::ErrorKind::ValidationFailed);
    }

    #[tokio::test]
    async fn test_waf_version_settings_merge() {
        let fake = FakeFastly::new();
        let waf_id = fake.seed_waf("svc", 1);
        let clone = fake.clone_waf_version(&waf_id, 1).await.unwrap();

        let first = WafVersionSettings {
            paranoia_level: Some(2),
            ..Default::default()
        };
        let second = WafVersionSettings {
            arg_length: Some(400),
            ..Default::default()
        };
        assert_ok!(fake.update_waf_version(&waf_id, clone.number, &first).await);
        let merged = fake.update_waf_version(&waf_id, clone.number, &second).await.unwrap();
        assert_eq!(merged.settings.paranoia_level, Some(2));
        assert_eq!(merged.settings.arg_length, Some(400));

        // The seeded first version is deployed and therefore locked.
        assert_err!(fake.update_waf_version(&waf_id, 1, &first).await);
    }

    #[tokio::test]
    async fn test_pagination() {
        let fake = FakeFastly::with_page_size(2);
        for id in ["c1", "c2", "c3"] {
            fake.seed_custom_certificate(id);
        }
        assert_eq!(fake.list_custom_certificates(1).await.unwrap().len(), 2);
        assert_eq!(fake.list_custom_certificates(2).await.unwrap().len(), 1);
        assert!(fake.list_custom_certificates(3).await.unwrap().is_empty());
    }

    #[test]
    fn test_plan_assertions() {
        let plan = PlanResult::with_changes(
            json!({"name": "b"}),
            vec![AttributeChange::modified("name", json!("a"), json!("b"))],
            false,
        );
        assert_plan_updates_in_place(&plan);
        assert_plan_changes_attribute(&plan, "name");
        assert_plan_does_not_change_attribute(&plan, "comment");
        assert_plan_no_changes(&PlanResult::no_change(json!({"name": "a"})));
    }

    #[test]
    #[should_panic(expected = "expected a replacement")]
    fn test_assert_plan_replaces_fails() {
        let plan = PlanResult::with_changes(
            json!({}),
            vec![AttributeChange::added("name", json!("a"))],
            false,
        );
        assert_plan_replaces(&plan);
    }

    #[test]
    fn test_diagnostic_assertions() {
        assert_no_errors(&[Diagnostic::warning("just a warning")]);
        let diagnostics = [Diagnostic::error("Invalid value").with_detail("status must be one of log")];
        assert_error_contains(&diagnostics, "Invalid");
        assert_error_contains(&diagnostics, "must be one of");
    }

    #[test]
    #[should_panic(expected = "expected no errors")]
    fn test_assert_no_errors_fails() {
        assert_no_errors(&[Diagnostic::error("boom")]);
    }

    #[test]
    fn test_test_error_display() {
        let err = TestError::Diagnostics(vec![
            Diagnostic::error("Missing API key").with_attribute("api_key"),
            Diagnostic::error("Invalid base URL").with_detail("not http"),
        ]);
        let display = err.to_string();
        assert!(display.contains("Missing API key"));
        assert!(display.contains("api_key"));
        assert!(display.contains("not http"));
    }
}
