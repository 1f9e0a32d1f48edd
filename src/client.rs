//! The remote API surface the provider drives.
//!
//! [`FastlyClient`] is the only way the provider talks to Fastly. Every call
//! is a single request; nothing here retries. HTTP transport and
//! authentication live behind the trait, so tests plug in
//! [`FakeFastly`](crate::testing::FakeFastly) and a production binary plugs in
//! a real REST client.
//!
//! Versioned configuration blocks (backends, domains, logging endpoints, ...)
//! share one generic shape: list, create and delete, keyed by a [`BlockKind`].
//! Their payloads travel as [`RemoteBlock`] maps with the same field names the
//! state uses.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ClientError;

/// Result alias for client calls.
pub type ClientResult<T> = Result<T, ClientError>;

/// A configuration block as the API returns it: field name to value.
pub type RemoteBlock = Map<String, Value>;

/// Which flavour of service this is. Gates which blocks are legal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceType {
    /// VCL-configured delivery service.
    Vcl,
    /// Compute service running a compiled WebAssembly package.
    Wasm,
}

impl ServiceType {
    /// Wire name of the service type.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Vcl => "vcl",
            Self::Wasm => "wasm",
        }
    }
}

/// One configuration version of a service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Version {
    /// Monotonic number within the service.
    pub number: u32,
    /// Locked versions are immutable.
    pub locked: bool,
    /// Whether this version is the one serving traffic.
    pub active: bool,
    /// Free-form version comment.
    #[serde(default)]
    pub comment: String,
}

/// Service metadata as returned by the details endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceDetail {
    /// Immutable service ID.
    pub id: String,
    /// Service name.
    pub name: String,
    /// Service comment.
    #[serde(default)]
    pub comment: String,
    /// VCL or compute.
    #[serde(rename = "type")]
    pub service_type: ServiceType,
    /// The version currently serving traffic, if any.
    pub active_version: Option<Version>,
    /// The highest-numbered version.
    pub version: Version,
}

/// Input for creating a service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreateServiceInput {
    /// Service name.
    pub name: String,
    /// Service comment.
    pub comment: String,
    /// VCL or compute.
    #[serde(rename = "type")]
    pub service_type: ServiceType,
}

/// Input for renaming or re-commenting a service. Versionless.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
pub struct UpdateServiceInput {
    /// Service ID.
    pub service_id: String,
    /// New name, when changed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// New comment, when changed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

/// Outcome of a server-side version validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionValidation {
    /// Whether the version can be activated.
    pub valid: bool,
    /// Problems found, if any.
    #[serde(default)]
    pub messages: Vec<String>,
}

/// Service-wide settings for one version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Default TTL in seconds. Zero is a legal value.
    pub default_ttl: u32,
    /// Default Host header.
    #[serde(default)]
    pub default_host: String,
    /// Serve stale content on origin errors.
    #[serde(default)]
    pub stale_if_error: bool,
    /// How long stale content may be served, in seconds.
    #[serde(default)]
    pub stale_if_error_ttl: u32,
}

/// Input for updating settings. `default_ttl` is always sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdateSettingsInput {
    /// Service ID.
    pub service_id: String,
    /// Target version.
    pub version: u32,
    /// Default TTL, written even when zero.
    pub default_ttl: u32,
    /// Default Host header.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_host: Option<String>,
    /// Serve stale content on origin errors.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stale_if_error: Option<bool>,
    /// Stale window in seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stale_if_error_ttl: Option<u32>,
}

/// The versioned block collections the generic endpoints serve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockKind {
    /// Request/response/cache conditions.
    Condition,
    /// Domains served by the service.
    Domain,
    /// Origin health checks.
    Healthcheck,
    /// Origin backends.
    Backend,
    /// Header rewrites.
    Header,
    /// Gzip rules.
    Gzip,
    /// Synthetic responses.
    ResponseObject,
    /// Request settings.
    RequestSetting,
    /// Custom VCL files.
    Vcl,
    /// VCL snippets.
    Snippet,
    /// Cache settings.
    CacheSetting,
    /// Edge ACL containers.
    Acl,
    /// Edge dictionary containers.
    Dictionary,
    /// Amazon S3 logging.
    LoggingS3,
    /// Syslog logging.
    LoggingSyslog,
    /// Papertrail logging.
    LoggingPapertrail,
    /// HTTPS logging.
    LoggingHttps,
    /// DigitalOcean Spaces logging.
    LoggingDigitalocean,
    /// Rackspace Cloud Files logging.
    LoggingCloudfiles,
    /// Google BigQuery logging.
    LoggingBigquery,
}

impl BlockKind {
    /// URL path segment of the collection under `/service/{id}/version/{n}/`.
    pub fn path(&self) -> &'static str {
        match self {
            Self::Condition => "condition",
            Self::Domain => "domain",
            Self::Healthcheck => "healthcheck",
            Self::Backend => "backend",
            Self::Header => "header",
            Self::Gzip => "gzip",
            Self::ResponseObject => "response_object",
            Self::RequestSetting => "request_settings",
            Self::Vcl => "vcl",
            Self::Snippet => "snippet",
            Self::CacheSetting => "cache_settings",
            Self::Acl => "acl",
            Self::Dictionary => "dictionary",
            Self::LoggingS3 => "logging/s3",
            Self::LoggingSyslog => "logging/syslog",
            Self::LoggingPapertrail => "logging/papertrail",
            Self::LoggingHttps => "logging/https",
            Self::LoggingDigitalocean => "logging/digitalocean",
            Self::LoggingCloudfiles => "logging/cloudfiles",
            Self::LoggingBigquery => "logging/bigquery",
        }
    }
}

/// Input for creating a block on a version.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreateBlockInput {
    /// Service ID.
    pub service_id: String,
    /// Target version.
    pub version: u32,
    /// Every configured field of the block.
    pub fields: RemoteBlock,
}

/// Input for deleting a block from a version. Blocks are addressed by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeleteBlockInput {
    /// Service ID.
    pub service_id: String,
    /// Target version.
    pub version: u32,
    /// Block name.
    pub name: String,
}

/// Compute package metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
    /// Service ID.
    pub service_id: String,
    /// Version the package belongs to.
    pub version: u32,
    /// Package name from its manifest.
    #[serde(default)]
    pub name: String,
    /// SHA-512 of the uploaded archive.
    #[serde(default)]
    pub hashsum: String,
}

/// Input for uploading a compute package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdatePackageInput {
    /// Service ID.
    pub service_id: String,
    /// Target version.
    pub version: u32,
    /// Local path of the package archive.
    pub package_path: String,
}

/// A service-level WAF object, attached to one version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Waf {
    /// WAF ID.
    pub id: String,
    /// Response object served on block.
    #[serde(default)]
    pub response_object: String,
    /// Condition deciding whether the WAF runs.
    #[serde(default)]
    pub prefetch_condition: String,
    /// Whether the WAF is disabled.
    #[serde(default)]
    pub disabled: bool,
}

/// Input for creating a service-level WAF.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreateWafInput {
    /// Service ID.
    pub service_id: String,
    /// Target version.
    pub version: u32,
    /// Response object served on block.
    pub response_object: String,
    /// Condition deciding whether the WAF runs.
    pub prefetch_condition: String,
}

/// Input for updating a service-level WAF.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdateWafInput {
    /// WAF ID.
    pub id: String,
    /// Service ID.
    pub service_id: String,
    /// Target version.
    pub version: u32,
    /// New response object.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_object: Option<String>,
    /// New prefetch condition.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prefetch_condition: Option<String>,
    /// Enable or disable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disabled: Option<bool>,
}

/// Tuning fields of a WAF version. `None` means "leave as is".
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
#[allow(missing_docs)]
pub struct WafVersionSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_http_versions: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_methods: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_request_content_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_request_content_type_charset: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arg_length: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arg_name_length: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub combined_file_sizes: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub critical_anomaly_score: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crs_validate_utf8_encoding: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_anomaly_score: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub high_risk_country_codes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_violation_score_threshold: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inbound_anomaly_score_threshold: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lfi_score_threshold: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_file_size: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_num_args: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice_anomaly_score: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paranoia_level: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub php_injection_score_threshold: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rce_score_threshold: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub restricted_extensions: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub restricted_headers: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rfi_score_threshold: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_fixation_score_threshold: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sql_injection_score_threshold: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_arg_length: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning_anomaly_score: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub xss_score_threshold: Option<u32>,
}

/// One version of a WAF configuration. Versioned independently of the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WafVersion {
    /// Opaque version ID.
    pub id: String,
    /// Version number within the WAF.
    pub number: u32,
    /// Locked versions are immutable.
    pub locked: bool,
    /// Whether this version is deployed.
    pub active: bool,
    /// Tuning fields.
    #[serde(default)]
    pub settings: WafVersionSettings,
}

/// Action a WAF rule takes on a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WafRuleStatus {
    /// Log the match only.
    Log,
    /// Block the request.
    Block,
    /// Contribute to the anomaly score.
    Score,
}

impl WafRuleStatus {
    /// Every accepted status string.
    pub const ALL: [&'static str; 3] = ["log", "block", "score"];

    /// Wire name of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Log => "log",
            Self::Block => "block",
            Self::Score => "score",
        }
    }

    /// Parse a wire name.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "log" => Some(Self::Log),
            "block" => Some(Self::Block),
            "score" => Some(Self::Score),
            _ => None,
        }
    }
}

/// A rule enabled on a WAF version.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct WafActiveRule {
    /// ModSecurity rule ID.
    pub modsec_rule_id: u32,
    /// Rule revision. Zero lets the API pick the latest.
    #[serde(default)]
    pub revision: u32,
    /// Action on match.
    pub status: WafRuleStatus,
}

/// A rule from the WAF rule catalogue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WafRule {
    /// ModSecurity rule ID.
    pub modsec_rule_id: u32,
    /// Rule type, e.g. `strict` or `score`.
    #[serde(default, rename = "type")]
    pub rule_type: String,
    /// Every published revision number.
    #[serde(default)]
    pub revisions: Vec<u32>,
}

/// Filters for the WAF rule catalogue.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ListWafRulesInput {
    /// Keep rules from these publishers.
    pub publishers: Vec<String>,
    /// Keep rules carrying these tags.
    pub tags: Vec<String>,
    /// Drop these rule IDs.
    pub exclude_modsec_rule_ids: Vec<u32>,
}

/// An entry of an edge ACL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AclEntry {
    /// Entry ID.
    pub id: String,
    /// IP address.
    pub ip: String,
    /// Optional CIDR prefix length.
    #[serde(default)]
    pub subnet: String,
    /// Negate the match.
    #[serde(default)]
    pub negated: bool,
    /// Free-form comment.
    #[serde(default)]
    pub comment: String,
}

/// Input for adding an ACL entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreateAclEntryInput {
    /// Service ID.
    pub service_id: String,
    /// ACL container ID.
    pub acl_id: String,
    /// IP address.
    pub ip: String,
    /// Optional CIDR prefix length.
    pub subnet: String,
    /// Negate the match.
    pub negated: bool,
    /// Free-form comment.
    pub comment: String,
}

/// A key/value pair in an edge dictionary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DictionaryItem {
    /// Item key.
    pub key: String,
    /// Item value.
    pub value: String,
}

/// A TLS private key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrivateKey {
    /// Key ID.
    pub id: String,
    /// Customer-facing name.
    #[serde(default)]
    pub name: String,
    /// Creation timestamp.
    #[serde(default)]
    pub created_at: String,
    /// Key length in bits.
    #[serde(default)]
    pub key_length: u32,
    /// Key algorithm.
    #[serde(default)]
    pub key_type: String,
    /// Whether Fastly recommends replacing the key.
    #[serde(default)]
    pub replace: bool,
    /// SHA-1 of the public key.
    #[serde(default)]
    pub public_key_sha1: String,
}

/// Input for uploading a private key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreatePrivateKeyInput {
    /// PEM-encoded key.
    pub key_pem: String,
    /// Customer-facing name.
    pub name: String,
}

/// A TLS activation: a certificate served for one domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TlsActivation {
    /// Activation ID.
    pub id: String,
    /// Certificate being served.
    pub certificate_id: String,
    /// TLS configuration in use.
    #[serde(default)]
    pub configuration_id: String,
    /// Domain being served.
    pub domain: String,
    /// Creation timestamp.
    #[serde(default)]
    pub created_at: String,
}

/// Input for enabling TLS on a domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreateTlsActivationInput {
    /// Certificate to serve.
    pub certificate_id: String,
    /// TLS configuration; the API default when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub configuration_id: Option<String>,
    /// Domain to serve it on.
    pub domain: String,
}

/// An item of a paginated TLS listing that is only surfaced by ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TlsObject {
    /// Object ID.
    pub id: String,
    /// Display name, when the object has one.
    #[serde(default)]
    pub name: String,
}

/// A managed TLS subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TlsSubscription {
    /// Subscription ID.
    pub id: String,
    /// TLS configuration the subscription uses.
    #[serde(default)]
    pub configuration_id: String,
    /// Domains covered by the certificate.
    #[serde(default)]
    pub domains: Vec<String>,
    /// Issuing certificate authority.
    #[serde(default)]
    pub certificate_authority: String,
    /// Domain used as the certificate common name.
    #[serde(default)]
    pub common_name: String,
    /// Issuance state.
    #[serde(default)]
    pub state: String,
    /// Creation timestamp.
    #[serde(default)]
    pub created_at: String,
    /// Last update timestamp.
    #[serde(default)]
    pub updated_at: String,
}

/// Input for ordering a managed TLS subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreateTlsSubscriptionInput {
    /// Domains the certificate covers.
    pub domains: Vec<String>,
    /// `lets-encrypt` or `globalsign`.
    pub certificate_authority: String,
    /// TLS configuration; the API default when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub configuration_id: Option<String>,
}

/// A customer-uploaded certificate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TlsCertificate {
    /// Certificate ID.
    pub id: String,
    /// Customer-facing name. Defaults to the subject when not given.
    #[serde(default)]
    pub name: String,
    /// Creation timestamp.
    #[serde(default)]
    pub created_at: String,
    /// Last update timestamp.
    #[serde(default)]
    pub updated_at: String,
    /// Subject the certificate was issued to.
    #[serde(default)]
    pub issued_to: String,
    /// Issuing authority.
    #[serde(default)]
    pub issuer: String,
    /// Whether Fastly recommends replacing the certificate.
    #[serde(default)]
    pub replace: bool,
    /// Serial number.
    #[serde(default)]
    pub serial_number: String,
    /// Signature algorithm.
    #[serde(default)]
    pub signature_algorithm: String,
    /// Domains the certificate is valid for.
    #[serde(default)]
    pub domains: Vec<String>,
}

/// Input for uploading or replacing a certificate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TlsCertificateInput {
    /// PEM-encoded certificate.
    pub certificate_body: String,
    /// Customer-facing name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Asynchronous Fastly API client.
///
/// Implementations perform exactly one request per call and surface every
/// failure as a [`ClientError`]. List calls that paginate take a 1-based page
/// number and return an empty vector past the last page.
#[async_trait]
pub trait FastlyClient: Send + Sync {
    // =========================================================================
    // Services & Versions
    // =========================================================================

    /// Create a service. Version 1 exists, unlocked, afterwards.
    async fn create_service(&self, input: &CreateServiceInput) -> ClientResult<ServiceDetail>;

    /// Fetch service metadata with its active and latest versions.
    async fn get_service_details(&self, service_id: &str) -> ClientResult<ServiceDetail>;

    /// Rename or re-comment a service.
    async fn update_service(&self, input: &UpdateServiceInput) -> ClientResult<()>;

    /// Delete a service. Fails while a version is active.
    async fn delete_service(&self, service_id: &str) -> ClientResult<()>;

    /// List every version of a service.
    async fn list_versions(&self, service_id: &str) -> ClientResult<Vec<Version>>;

    /// Deep-copy a version into a new unlocked version.
    async fn clone_version(&self, service_id: &str, number: u32) -> ClientResult<Version>;

    /// Set the comment of an unlocked version.
    async fn update_version_comment(
        &self,
        service_id: &str,
        number: u32,
        comment: &str,
    ) -> ClientResult<Version>;

    /// Ask the API whether a version can be activated.
    async fn validate_version(&self, service_id: &str, number: u32)
        -> ClientResult<VersionValidation>;

    /// Activate (and lock) a version.
    async fn activate_version(&self, service_id: &str, number: u32) -> ClientResult<Version>;

    /// Deactivate a version.
    async fn deactivate_version(&self, service_id: &str, number: u32) -> ClientResult<Version>;

    // =========================================================================
    // Version-scoped configuration
    // =========================================================================

    /// Read service settings of a version.
    async fn get_settings(&self, service_id: &str, version: u32) -> ClientResult<Settings>;

    /// Write service settings of a version.
    async fn update_settings(&self, input: &UpdateSettingsInput) -> ClientResult<Settings>;

    /// List the blocks of one kind on a version.
    async fn list_blocks(
        &self,
        kind: BlockKind,
        service_id: &str,
        version: u32,
    ) -> ClientResult<Vec<RemoteBlock>>;

    /// Create a block on a version.
    async fn create_block(
        &self,
        kind: BlockKind,
        input: &CreateBlockInput,
    ) -> ClientResult<RemoteBlock>;

    /// Delete a block from a version by name.
    async fn delete_block(&self, kind: BlockKind, input: &DeleteBlockInput) -> ClientResult<()>;

    /// Read the compute package of a version.
    async fn get_package(&self, service_id: &str, version: u32) -> ClientResult<Package>;

    /// Upload a compute package to a version.
    async fn update_package(&self, input: &UpdatePackageInput) -> ClientResult<Package>;

    /// List the service-level WAFs on a version.
    async fn list_wafs(&self, service_id: &str, version: u32) -> ClientResult<Vec<Waf>>;

    /// Create a service-level WAF.
    async fn create_waf(&self, input: &CreateWafInput) -> ClientResult<Waf>;

    /// Update a service-level WAF.
    async fn update_waf(&self, input: &UpdateWafInput) -> ClientResult<Waf>;

    /// Delete a service-level WAF.
    async fn delete_waf(&self, waf_id: &str, version: u32) -> ClientResult<()>;

    // =========================================================================
    // WAF configuration
    // =========================================================================

    /// List the versions of a WAF.
    async fn list_waf_versions(&self, waf_id: &str) -> ClientResult<Vec<WafVersion>>;

    /// Clone a WAF version into a new unlocked one.
    async fn clone_waf_version(&self, waf_id: &str, number: u32) -> ClientResult<WafVersion>;

    /// Bulk-update the tuning fields of an unlocked WAF version.
    async fn update_waf_version(
        &self,
        waf_id: &str,
        number: u32,
        settings: &WafVersionSettings,
    ) -> ClientResult<WafVersion>;

    /// Deploy (and lock) a WAF version.
    async fn deploy_waf_version(&self, waf_id: &str, number: u32) -> ClientResult<()>;

    /// Create a WAF version with no rules and default tuning.
    async fn create_empty_waf_version(&self, waf_id: &str) -> ClientResult<WafVersion>;

    /// List the active rules of a WAF version.
    async fn list_waf_active_rules(
        &self,
        waf_id: &str,
        number: u32,
    ) -> ClientResult<Vec<WafActiveRule>>;

    /// Enable a batch of rules on a WAF version.
    async fn create_waf_active_rules(
        &self,
        waf_id: &str,
        number: u32,
        rules: &[WafActiveRule],
    ) -> ClientResult<()>;

    /// Disable a batch of rules on a WAF version.
    async fn delete_waf_active_rules(
        &self,
        waf_id: &str,
        number: u32,
        rules: &[WafActiveRule],
    ) -> ClientResult<()>;

    /// Query the WAF rule catalogue.
    async fn list_waf_rules(&self, input: &ListWafRulesInput) -> ClientResult<Vec<WafRule>>;

    // =========================================================================
    // Versionless containers
    // =========================================================================

    /// List the entries of an ACL.
    async fn list_acl_entries(&self, service_id: &str, acl_id: &str)
        -> ClientResult<Vec<AclEntry>>;

    /// Add an ACL entry.
    async fn create_acl_entry(&self, input: &CreateAclEntryInput) -> ClientResult<AclEntry>;

    /// Remove an ACL entry by ID.
    async fn delete_acl_entry(
        &self,
        service_id: &str,
        acl_id: &str,
        entry_id: &str,
    ) -> ClientResult<()>;

    /// List the items of a dictionary.
    async fn list_dictionary_items(
        &self,
        service_id: &str,
        dictionary_id: &str,
    ) -> ClientResult<Vec<DictionaryItem>>;

    /// Add a dictionary item.
    async fn create_dictionary_item(
        &self,
        service_id: &str,
        dictionary_id: &str,
        item: &DictionaryItem,
    ) -> ClientResult<DictionaryItem>;

    /// Replace the value of a dictionary item.
    async fn update_dictionary_item(
        &self,
        service_id: &str,
        dictionary_id: &str,
        item: &DictionaryItem,
    ) -> ClientResult<DictionaryItem>;

    /// Remove a dictionary item by key.
    async fn delete_dictionary_item(
        &self,
        service_id: &str,
        dictionary_id: &str,
        key: &str,
    ) -> ClientResult<()>;

    // =========================================================================
    // TLS
    // =========================================================================

    /// Upload a private key.
    async fn create_private_key(&self, input: &CreatePrivateKeyInput) -> ClientResult<PrivateKey>;

    /// Fetch a private key's metadata.
    async fn get_private_key(&self, id: &str) -> ClientResult<PrivateKey>;

    /// Delete a private key.
    async fn delete_private_key(&self, id: &str) -> ClientResult<()>;

    /// Enable TLS for a domain.
    async fn create_tls_activation(
        &self,
        input: &CreateTlsActivationInput,
    ) -> ClientResult<TlsActivation>;

    /// Fetch an activation.
    async fn get_tls_activation(&self, id: &str) -> ClientResult<TlsActivation>;

    /// Point an activation at another certificate.
    async fn update_tls_activation(
        &self,
        id: &str,
        certificate_id: &str,
    ) -> ClientResult<TlsActivation>;

    /// Disable TLS for a domain.
    async fn delete_tls_activation(&self, id: &str) -> ClientResult<()>;

    /// One page of activations, optionally for a single certificate.
    async fn list_tls_activations(
        &self,
        certificate_id: Option<&str>,
        page: u32,
    ) -> ClientResult<Vec<TlsActivation>>;

    /// One page of customer-uploaded certificates.
    async fn list_custom_certificates(&self, page: u32) -> ClientResult<Vec<TlsObject>>;

    /// One page of platform certificates.
    async fn list_platform_certificates(&self, page: u32) -> ClientResult<Vec<TlsObject>>;

    /// One page of TLS configurations.
    async fn list_tls_configurations(&self, page: u32) -> ClientResult<Vec<TlsObject>>;

    /// One page of TLS subscriptions.
    async fn list_tls_subscriptions(&self, page: u32) -> ClientResult<Vec<TlsSubscription>>;

    /// Fetch a subscription.
    async fn get_tls_subscription(&self, id: &str) -> ClientResult<TlsSubscription>;

    /// Order a managed certificate for a set of domains.
    async fn create_tls_subscription(
        &self,
        input: &CreateTlsSubscriptionInput,
    ) -> ClientResult<TlsSubscription>;

    /// Cancel a subscription.
    async fn delete_tls_subscription(&self, id: &str) -> ClientResult<()>;

    /// Upload a certificate. A matching private key must already exist.
    async fn create_custom_certificate(&self, input: &TlsCertificateInput) -> ClientResult<TlsCertificate>;

    /// Fetch a certificate's metadata.
    async fn get_custom_certificate(&self, id: &str) -> ClientResult<TlsCertificate>;

    /// Replace a certificate's body or rename it.
    async fn update_custom_certificate(
        &self,
        id: &str,
        input: &TlsCertificateInput,
    ) -> ClientResult<TlsCertificate>;

    /// Delete a certificate.
    async fn delete_custom_certificate(&self, id: &str) -> ClientResult<()>;
}

/// Drain a paginated listing, starting at page 1 and stopping at the first
/// empty page.
pub async fn collect_pages<T, F, Fut>(mut fetch: F) -> ClientResult<Vec<T>>
where
    F: FnMut(u32) -> Fut,
    Fut: std::future::Future<Output = ClientResult<Vec<T>>>,
{
    let mut all = Vec::new();
    let mut page = 1;
    loop {
        let batch = fetch(page).await?;
        if batch.is_empty() {
            return Ok(all);
        }
        all.extend(batch);
        page += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_service_type_wire_names() {
        assert_eq!(ServiceType::Vcl.as_str(), "vcl");
        assert_eq!(serde_json::to_value(ServiceType::Wasm).unwrap(), json!("wasm"));
    }

    #[test]
    fn test_block_kind_paths() {
        assert_eq!(BlockKind::Backend.path(), "backend");
        assert_eq!(BlockKind::RequestSetting.path(), "request_settings");
        assert_eq!(BlockKind::LoggingBigquery.path(), "logging/bigquery");
    }

    #[test]
    fn test_waf_settings_skip_unset_fields() {
        let settings = WafVersionSettings {
            paranoia_level: Some(3),
            allowed_methods: Some("GET HEAD".into()),
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_value(&settings).unwrap(),
            json!({"allowed_methods": "GET HEAD", "paranoia_level": 3})
        );
    }

    #[test]
    fn test_waf_rule_status_parse() {
        assert_eq!(WafRuleStatus::parse("block"), Some(WafRuleStatus::Block));
        assert_eq!(WafRuleStatus::parse("deny"), None);
        assert_eq!(WafRuleStatus::Score.as_str(), "score");
    }

    #[tokio::test]
    async fn test_collect_pages_stops_on_empty_page() {
        let pages = vec![vec![1, 2], vec![3], vec![]];
        let mut seen = Vec::new();
        let all = collect_pages(|page| {
            seen.push(page);
            let batch = pages[(page - 1) as usize].clone();
            async move { Ok::<_, ClientError>(batch) }
        })
        .await
        .unwrap();

        assert_eq!(all, vec![1, 2, 3]);
        assert_eq!(seen, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_collect_pages_propagates_errors() {
        let result: ClientResult<Vec<u8>> =
            collect_pages(|_| async { Err(ClientError::http(500, "boom")) }).await;
        assert_eq!(result, Err(ClientError::http(500, "boom")));
    }
}
