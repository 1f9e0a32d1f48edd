//! Field tables for the versioned configuration blocks.

use super::block::{BlockSpec, FieldSpec, FieldType};
use crate::client::BlockKind;

use FieldType::{Bool, String as Str, StringList, Uint};

pub static CONDITION: BlockSpec = BlockSpec {
    key: "condition",
    kind: BlockKind::Condition,
    logging: false,
    description: "VCL conditions referenced by name from other blocks",
    fields: &[
        FieldSpec::required("name", Str).describe("Unique condition name"),
        FieldSpec::required("statement", Str).describe("VCL expression"),
        FieldSpec::required("type", Str).one_of(&["REQUEST", "CACHE", "RESPONSE", "PREFETCH"]),
        FieldSpec::optional("priority", Uint).default_int(10),
    ],
};

pub static DOMAIN: BlockSpec = BlockSpec {
    key: "domain",
    kind: BlockKind::Domain,
    logging: false,
    description: "Domains served by the service",
    fields: &[
        FieldSpec::required("name", Str).describe("Fully qualified domain name"),
        FieldSpec::optional("comment", Str),
    ],
};

pub static HEALTHCHECK: BlockSpec = BlockSpec {
    key: "healthcheck",
    kind: BlockKind::Healthcheck,
    logging: false,
    description: "Origin health checks",
    fields: &[
        FieldSpec::required("name", Str),
        FieldSpec::required("host", Str),
        FieldSpec::required("path", Str),
        FieldSpec::optional("check_interval", Uint).default_int(5000),
        FieldSpec::optional("expected_response", Uint).default_int(200),
        FieldSpec::optional("http_version", Str).default_str("1.1"),
        FieldSpec::optional("initial", Uint).default_int(2),
        FieldSpec::optional("method", Str).default_str("HEAD"),
        FieldSpec::optional("threshold", Uint).default_int(3),
        FieldSpec::optional("timeout", Uint).default_int(500),
        FieldSpec::optional("window", Uint).default_int(5),
    ],
};

pub static BACKEND: BlockSpec = BlockSpec {
    key: "backend",
    kind: BlockKind::Backend,
    logging: false,
    description: "Origin servers",
    fields: &[
        FieldSpec::required("name", Str),
        FieldSpec::required("address", Str).describe("Origin hostname or IP"),
        FieldSpec::optional("port", Uint).default_int(80),
        FieldSpec::optional("override_host", Str),
        FieldSpec::optional("auto_loadbalance", Bool).default_bool(true),
        FieldSpec::optional("between_bytes_timeout", Uint).default_int(10000),
        FieldSpec::optional("connect_timeout", Uint).default_int(1000),
        FieldSpec::optional("error_threshold", Uint).keep_zero(),
        FieldSpec::optional("first_byte_timeout", Uint).default_int(15000),
        FieldSpec::optional("max_conn", Uint).default_int(200),
        FieldSpec::optional("max_tls_version", Str),
        FieldSpec::optional("min_tls_version", Str),
        FieldSpec::optional("healthcheck", Str).describe("Name of a healthcheck block"),
        FieldSpec::optional("shield", Str),
        FieldSpec::optional("use_ssl", Bool),
        FieldSpec::optional("ssl_check_cert", Bool).default_bool(true),
        FieldSpec::optional("ssl_ca_cert", Str),
        FieldSpec::optional("ssl_client_cert", Str).sensitive(),
        FieldSpec::optional("ssl_client_key", Str).sensitive(),
        FieldSpec::optional("ssl_ciphers", Str),
        FieldSpec::optional("ssl_cert_hostname", Str),
        FieldSpec::optional("ssl_sni_hostname", Str),
        FieldSpec::optional("ssl_hostname", Str),
        FieldSpec::optional("request_condition", Str).vcl_only(),
        FieldSpec::optional("weight", Uint).default_int(100).keep_zero(),
    ],
};

pub static HEADER: BlockSpec = BlockSpec {
    key: "header",
    kind: BlockKind::Header,
    logging: false,
    description: "Header rewrites",
    fields: &[
        FieldSpec::required("name", Str),
        FieldSpec::required("action", Str).one_of(&["set", "append", "delete", "regex", "regex_repeat"]),
        FieldSpec::required("type", Str).one_of(&["request", "fetch", "cache", "response"]),
        FieldSpec::required("destination", Str),
        FieldSpec::optional("source", Str),
        FieldSpec::optional("ignore_if_set", Bool),
        FieldSpec::optional("regex", Str),
        FieldSpec::optional("substitution", Str),
        FieldSpec::optional("priority", Uint).default_int(100),
        FieldSpec::optional("request_condition", Str),
        FieldSpec::optional("cache_condition", Str),
        FieldSpec::optional("response_condition", Str),
    ],
};

pub static GZIP: BlockSpec = BlockSpec {
    key: "gzip",
    kind: BlockKind::Gzip,
    logging: false,
    description: "Gzip compression rules",
    fields: &[
        FieldSpec::required("name", Str),
        FieldSpec::optional("content_types", StringList),
        FieldSpec::optional("extensions", StringList),
        FieldSpec::optional("cache_condition", Str),
    ],
};

pub static RESPONSE_OBJECT: BlockSpec = BlockSpec {
    key: "response_object",
    kind: BlockKind::ResponseObject,
    logging: false,
    description: "Synthetic responses",
    fields: &[
        FieldSpec::required("name", Str),
        FieldSpec::optional("status", Uint).default_int(200),
        FieldSpec::optional("response", Str).default_str("OK"),
        FieldSpec::optional("content", Str),
        FieldSpec::optional("content_type", Str),
        FieldSpec::optional("request_condition", Str),
        FieldSpec::optional("cache_condition", Str),
    ],
};

pub static REQUEST_SETTING: BlockSpec = BlockSpec {
    key: "request_setting",
    kind: BlockKind::RequestSetting,
    logging: false,
    description: "Per-request behaviour overrides",
    fields: &[
        FieldSpec::required("name", Str),
        FieldSpec::optional("request_condition", Str),
        FieldSpec::optional("max_stale_age", Uint).default_int(60),
        FieldSpec::optional("force_miss", Bool),
        FieldSpec::optional("force_ssl", Bool),
        FieldSpec::optional("action", Str).one_of(&["lookup", "pass"]),
        FieldSpec::optional("bypass_busy_wait", Bool),
        FieldSpec::optional("hash_keys", Str),
        FieldSpec::optional("xff", Str).default_str("append"),
        FieldSpec::optional("timer_support", Bool),
        FieldSpec::optional("geo_headers", Bool),
        FieldSpec::optional("default_host", Str),
    ],
};

pub static VCL: BlockSpec = BlockSpec {
    key: "vcl",
    kind: BlockKind::Vcl,
    logging: false,
    description: "Custom VCL files",
    fields: &[
        FieldSpec::required("name", Str),
        FieldSpec::required("content", Str),
        FieldSpec::optional("main", Bool).default_bool(false),
    ],
};

pub static SNIPPET: BlockSpec = BlockSpec {
    key: "snippet",
    kind: BlockKind::Snippet,
    logging: false,
    description: "VCL snippets",
    fields: &[
        FieldSpec::required("name", Str),
        FieldSpec::required("type", Str).one_of(&[
            "init", "recv", "hash", "hit", "miss", "pass", "fetch", "error", "deliver", "log",
            "none",
        ]),
        FieldSpec::required("content", Str),
        FieldSpec::optional("priority", Uint).default_int(100),
    ],
};

pub static CACHE_SETTING: BlockSpec = BlockSpec {
    key: "cache_setting",
    kind: BlockKind::CacheSetting,
    logging: false,
    description: "Cache TTL overrides",
    fields: &[
        FieldSpec::required("name", Str),
        FieldSpec::optional("action", Str).one_of(&["cache", "pass", "restart"]),
        FieldSpec::optional("cache_condition", Str),
        FieldSpec::optional("stale_ttl", Uint),
        FieldSpec::optional("ttl", Uint),
    ],
};

pub static ACL: BlockSpec = BlockSpec {
    key: "acl",
    kind: BlockKind::Acl,
    logging: false,
    description: "Edge ACL containers; entries are managed separately",
    fields: &[
        FieldSpec::required("name", Str),
        FieldSpec::computed("acl_id", "id"),
    ],
};

pub static DICTIONARY: BlockSpec = BlockSpec {
    key: "dictionary",
    kind: BlockKind::Dictionary,
    logging: false,
    description: "Edge dictionary containers; items are managed separately",
    fields: &[
        FieldSpec::required("name", Str),
        FieldSpec::computed("dictionary_id", "id"),
        FieldSpec::optional("write_only", Bool).default_bool(false),
    ],
};
