//! Field tables for the logging endpoints.
//!
//! `format`, `format_version`, `placement` and `response_condition` only
//! exist on VCL services; compute services drop them and always log with
//! `placement = "none"`.

use super::block::{BlockSpec, FieldSpec, FieldType};
use crate::client::BlockKind;

use FieldType::{Bool, String as Str, Uint};

const MESSAGE_TYPES: &[&str] = &["classic", "loggly", "logplex", "blank"];
const PLACEMENTS: &[&str] = &["none", "waf_debug"];

const FORMAT: FieldSpec = FieldSpec::optional("format", Str)
    .vcl_only()
    .describe("Apache-style log format");
const FORMAT_VERSION: FieldSpec = FieldSpec::optional("format_version", Uint)
    .default_int(2)
    .vcl_only();
const PLACEMENT: FieldSpec = FieldSpec::optional("placement", Str)
    .one_of(PLACEMENTS)
    .vcl_only();
const RESPONSE_CONDITION: FieldSpec = FieldSpec::optional("response_condition", Str).vcl_only();

pub static LOGGING_S3: BlockSpec = BlockSpec {
    key: "logging_s3",
    kind: BlockKind::LoggingS3,
    logging: true,
    description: "Amazon S3 logging endpoints",
    fields: &[
        FieldSpec::required("name", Str),
        FieldSpec::required("bucket_name", Str),
        FieldSpec::optional("s3_access_key", Str).sensitive(),
        FieldSpec::optional("s3_secret_key", Str).sensitive(),
        FieldSpec::optional("s3_iam_role", Str),
        FieldSpec::optional("domain", Str),
        FieldSpec::optional("path", Str),
        FieldSpec::optional("period", Uint).default_int(3600),
        FieldSpec::optional("gzip_level", Uint),
        FieldSpec::optional("timestamp_format", Str).default_str("%Y-%m-%dT%H:%M:%S.000"),
        FieldSpec::optional("redundancy", Str),
        FieldSpec::optional("server_side_encryption", Str),
        FieldSpec::optional("server_side_encryption_kms_key_id", Str),
        FieldSpec::optional("public_key", Str),
        FieldSpec::optional("message_type", Str)
            .default_str("classic")
            .one_of(MESSAGE_TYPES),
        FORMAT,
        FORMAT_VERSION,
        PLACEMENT,
        RESPONSE_CONDITION,
    ],
};

pub static LOGGING_SYSLOG: BlockSpec = BlockSpec {
    key: "logging_syslog",
    kind: BlockKind::LoggingSyslog,
    logging: true,
    description: "Syslog logging endpoints",
    fields: &[
        FieldSpec::required("name", Str),
        FieldSpec::required("address", Str),
        FieldSpec::optional("port", Uint).default_int(514),
        FieldSpec::optional("token", Str),
        FieldSpec::optional("use_tls", Bool),
        FieldSpec::optional("tls_hostname", Str),
        FieldSpec::optional("tls_ca_cert", Str),
        FieldSpec::optional("tls_client_cert", Str),
        FieldSpec::optional("tls_client_key", Str).sensitive(),
        FieldSpec::optional("message_type", Str)
            .default_str("classic")
            .one_of(MESSAGE_TYPES),
        FORMAT,
        FORMAT_VERSION,
        PLACEMENT,
        RESPONSE_CONDITION,
    ],
};

pub static LOGGING_PAPERTRAIL: BlockSpec = BlockSpec {
    key: "logging_papertrail",
    kind: BlockKind::LoggingPapertrail,
    logging: true,
    description: "Papertrail logging endpoints",
    fields: &[
        FieldSpec::required("name", Str),
        FieldSpec::required("address", Str),
        FieldSpec::required("port", Uint),
        FORMAT,
        PLACEMENT,
        RESPONSE_CONDITION,
    ],
};

pub static LOGGING_HTTPS: BlockSpec = BlockSpec {
    key: "logging_https",
    kind: BlockKind::LoggingHttps,
    logging: true,
    description: "HTTPS logging endpoints",
    fields: &[
        FieldSpec::required("name", Str),
        FieldSpec::required("url", Str),
        FieldSpec::optional("request_max_entries", Uint),
        FieldSpec::optional("request_max_bytes", Uint),
        FieldSpec::optional("content_type", Str),
        FieldSpec::optional("header_name", Str),
        FieldSpec::optional("header_value", Str),
        FieldSpec::optional("method", Str)
            .default_str("POST")
            .one_of(&["POST", "PUT"]),
        FieldSpec::optional("json_format", Str).one_of(&["0", "1", "2"]),
        FieldSpec::optional("tls_hostname", Str),
        FieldSpec::optional("tls_ca_cert", Str),
        FieldSpec::optional("tls_client_cert", Str),
        FieldSpec::optional("tls_client_key", Str).sensitive(),
        FieldSpec::optional("message_type", Str)
            .default_str("blank")
            .one_of(MESSAGE_TYPES),
        FORMAT,
        FORMAT_VERSION,
        PLACEMENT,
        RESPONSE_CONDITION,
    ],
};

pub static LOGGING_DIGITALOCEAN: BlockSpec = BlockSpec {
    key: "logging_digitalocean",
    kind: BlockKind::LoggingDigitalocean,
    logging: true,
    description: "DigitalOcean Spaces logging endpoints",
    fields: &[
        FieldSpec::required("name", Str),
        FieldSpec::required("bucket_name", Str),
        FieldSpec::required("access_key", Str).sensitive(),
        FieldSpec::required("secret_key", Str).sensitive(),
        FieldSpec::optional("domain", Str).default_str("nyc3.digitaloceanspaces.com"),
        FieldSpec::optional("public_key", Str),
        FieldSpec::optional("path", Str),
        FieldSpec::optional("period", Uint),
        FieldSpec::optional("timestamp_format", Str),
        FieldSpec::optional("gzip_level", Uint),
        FieldSpec::optional("message_type", Str)
            .default_str("classic")
            .one_of(MESSAGE_TYPES),
        FORMAT,
        FORMAT_VERSION,
        PLACEMENT,
        RESPONSE_CONDITION,
    ],
};

pub static LOGGING_CLOUDFILES: BlockSpec = BlockSpec {
    key: "logging_cloudfiles",
    kind: BlockKind::LoggingCloudfiles,
    logging: true,
    description: "Rackspace Cloud Files logging endpoints",
    fields: &[
        FieldSpec::required("name", Str),
        FieldSpec::required("bucket_name", Str),
        FieldSpec::required("user", Str),
        FieldSpec::required("access_key", Str).sensitive(),
        FieldSpec::optional("public_key", Str),
        FieldSpec::optional("path", Str),
        FieldSpec::optional("region", Str).one_of(&["DFW", "ORD", "IAD", "LON", "SYD", "HKG"]),
        FieldSpec::optional("period", Uint).default_int(3600),
        FieldSpec::optional("timestamp_format", Str).default_str("%Y-%m-%dT%H:%M:%S.000"),
        FieldSpec::optional("gzip_level", Uint),
        FieldSpec::optional("message_type", Str)
            .default_str("classic")
            .one_of(MESSAGE_TYPES),
        FORMAT,
        FORMAT_VERSION,
        PLACEMENT,
        RESPONSE_CONDITION,
    ],
};

pub static LOGGING_BIGQUERY: BlockSpec = BlockSpec {
    key: "logging_bigquery",
    kind: BlockKind::LoggingBigquery,
    logging: true,
    description: "Google BigQuery logging endpoints",
    fields: &[
        FieldSpec::required("name", Str),
        FieldSpec::required("project_id", Str),
        FieldSpec::required("dataset", Str),
        FieldSpec::required("table", Str),
        FieldSpec::required("email", Str),
        FieldSpec::required("secret_key", Str).sensitive(),
        FieldSpec::optional("template", Str),
        FORMAT,
        PLACEMENT,
        RESPONSE_CONDITION,
    ],
};

/// Every logging endpoint, in handler order.
pub static ALL: [&BlockSpec; 7] = [
    &LOGGING_S3,
    &LOGGING_SYSLOG,
    &LOGGING_PAPERTRAIL,
    &LOGGING_HTTPS,
    &LOGGING_DIGITALOCEAN,
    &LOGGING_CLOUDFILES,
    &LOGGING_BIGQUERY,
];
