//! ACL entries, dictionary items and WAF configurations: resources edited
//! without creating service versions.

use std::sync::Arc;

use fastly_provider::testing::{FakeFastly, ProviderTester, TestError};
use fastly_provider::{ClientError, FastlyClient, FastlyProvider};
use serde_json::{json, Value};
use tokio_test::assert_ok;

const ACL_ENTRIES: &str = "fastly_service_acl_entries_v1";
const DICTIONARY_ITEMS: &str = "fastly_service_dictionary_items_v1";
const WAF_CONFIGURATION: &str = "fastly_service_waf_configuration";

fn tester() -> (Arc<FakeFastly>, ProviderTester<FastlyProvider>) {
    let fake = Arc::new(FakeFastly::new());
    (fake.clone(), ProviderTester::fastly(fake))
}

fn entry_ips(state: &Value) -> Vec<String> {
    let mut ips: Vec<String> = state["entry"]
        .as_array()
        .into_iter()
        .flatten()
        .filter_map(|e| e["ip"].as_str().map(str::to_string))
        .collect();
    ips.sort();
    ips
}

// =============================================================================
// ACL entries
// =============================================================================

async fn acl_with_two_entries() -> (Arc<FakeFastly>, ProviderTester<FastlyProvider>, String, Value) {
    let (fake, tester) = tester();
    let acl_id = fake.seed_acl("svc-edge", "blocklist");
    let state = assert_ok!(
        tester
            .lifecycle_create(
                ACL_ENTRIES,
                json!({
                    "service_id": "svc-edge",
                    "acl_id": acl_id,
                    "entry": [
                        {"ip": "192.0.2.10", "comment": "scanner"},
                        {"ip": "198.51.100.0", "subnet": "24"}
                    ]
                }),
            )
            .await
    );
    (fake, tester, acl_id, state)
}

#[tokio::test]
async fn acl_entries_are_created_without_a_version() {
    let (fake, _tester, acl_id, state) = acl_with_two_entries().await;

    assert_eq!(state["id"], json!(format!("svc-edge/{}", acl_id)));
    assert_eq!(entry_ips(&state), vec!["192.0.2.10", "198.51.100.0"]);
    assert_eq!(fake.calls_named("create_acl_entry").len(), 2);
    assert!(fake.calls_named("clone_version").is_empty());
    assert!(fake.calls_named("activate_version").is_empty());
}

#[tokio::test]
async fn removing_an_acl_entry_deletes_only_that_entry() {
    let (fake, tester, acl_id, state) = acl_with_two_entries().await;
    fake.clear_calls();

    let config = json!({
        "service_id": "svc-edge",
        "acl_id": acl_id,
        "entry": [{"ip": "198.51.100.0", "subnet": "24"}]
    });
    let state = assert_ok!(tester.lifecycle_update(ACL_ENTRIES, state, config).await);

    assert_eq!(fake.calls_named("delete_acl_entry").len(), 1);
    assert!(fake.calls_named("create_acl_entry").is_empty());
    assert_eq!(entry_ips(&state), vec!["198.51.100.0"]);
}

#[tokio::test]
async fn acl_entry_already_gone_is_not_an_error() {
    let (fake, tester, acl_id, state) = acl_with_two_entries().await;
    fake.fail_next("delete_acl_entry", ClientError::not_found("entry not found"));

    let config = json!({
        "service_id": "svc-edge",
        "acl_id": acl_id,
        "entry": [{"ip": "198.51.100.0", "subnet": "24"}]
    });
    assert_ok!(tester.lifecycle_update(ACL_ENTRIES, state, config).await);
}

#[tokio::test]
async fn acl_entry_server_error_is_surfaced() {
    let (fake, tester, acl_id, state) = acl_with_two_entries().await;
    fake.fail_next("delete_acl_entry", ClientError::http(500, "backend unavailable"));

    let config = json!({"service_id": "svc-edge", "acl_id": acl_id, "entry": []});
    let err = tester
        .lifecycle_update(ACL_ENTRIES, state, config)
        .await
        .unwrap_err();
    assert!(!err.is_not_found());
    assert!(err.to_string().contains("backend unavailable"), "{}", err);
}

#[tokio::test]
async fn acl_entries_import_by_compound_id() {
    let (_fake, tester, acl_id, _state) = acl_with_two_entries().await;

    let imported = assert_ok!(
        tester
            .import_resource(ACL_ENTRIES, &format!("svc-edge/{}", acl_id))
            .await
    );
    assert_eq!(imported[0].state["acl_id"], json!(acl_id));
    assert_eq!(entry_ips(&imported[0].state).len(), 2);

    let err = tester.import_resource(ACL_ENTRIES, "no-slash").await.unwrap_err();
    assert!(err.to_string().contains("<service_id>/<container_id>"), "{}", err);
}

// =============================================================================
// Dictionary items
// =============================================================================

#[tokio::test]
async fn dictionary_items_diff_by_key() {
    let (fake, tester) = tester();
    let dictionary_id = fake.seed_dictionary("svc-edge", "redirects");
    let config = |items: Value| {
        json!({"service_id": "svc-edge", "dictionary_id": dictionary_id, "items": items})
    };

    let state = assert_ok!(
        tester
            .lifecycle_create(
                DICTIONARY_ITEMS,
                config(json!({"/old": "/new", "/legacy": "/"})),
            )
            .await
    );
    fake.clear_calls();

    let state = assert_ok!(
        tester
            .lifecycle_update(
                DICTIONARY_ITEMS,
                state,
                config(json!({"/old": "/newer", "/blog": "/news"})),
            )
            .await
    );

    assert_eq!(fake.calls_named("delete_dictionary_item").len(), 1);
    assert_eq!(fake.calls_named("update_dictionary_item").len(), 1);
    assert_eq!(fake.calls_named("create_dictionary_item").len(), 1);
    assert_eq!(state["items"], json!({"/blog": "/news", "/old": "/newer"}));
}

// =============================================================================
// WAF configuration
// =============================================================================

fn waf_config(waf_id: &str, status: &str) -> Value {
    json!({
        "waf_id": waf_id,
        "paranoia_level": 2,
        "rule": [
            {"modsec_rule_id": 1010090, "status": status},
            {"modsec_rule_id": 2029718, "status": "log"}
        ]
    })
}

#[tokio::test]
async fn waf_rule_status_change_is_one_batch_per_phase() {
    let (fake, tester) = tester();
    let waf_id = fake.seed_waf("svc-edge", 1);

    let state = assert_ok!(
        tester
            .lifecycle_create(WAF_CONFIGURATION, waf_config(&waf_id, "log"))
            .await
    );
    assert_eq!(state["id"], json!(waf_id));
    assert_eq!(state["paranoia_level"], json!(2));
    fake.clear_calls();

    let state = assert_ok!(
        tester
            .lifecycle_update(WAF_CONFIGURATION, state, waf_config(&waf_id, "block"))
            .await
    );

    assert_eq!(fake.calls_named("clone_waf_version").len(), 1);
    assert_eq!(fake.calls_named("delete_waf_active_rules").len(), 1);
    assert_eq!(fake.calls_named("create_waf_active_rules").len(), 1);
    assert_eq!(fake.calls_named("deploy_waf_version").len(), 1);
    assert!(fake.calls_named("clone_version").is_empty());

    let blocked = state["rule"]
        .as_array()
        .into_iter()
        .flatten()
        .find(|r| r["modsec_rule_id"] == json!(1010090))
        .map(|r| r["status"].clone());
    assert_eq!(blocked, Some(json!("block")));

    let versions = assert_ok!(fake.list_waf_versions(&waf_id).await);
    let latest = versions.iter().max_by_key(|v| v.number).map(|v| (v.number, v.active, v.locked));
    assert_eq!(latest, Some((3, true, true)));
}

#[tokio::test]
async fn waf_rule_status_is_validated() {
    let (fake, tester) = tester();
    let waf_id = fake.seed_waf("svc-edge", 1);

    match tester
        .validate_resource_config(WAF_CONFIGURATION, waf_config(&waf_id, "deny"))
        .await
    {
        Err(TestError::Diagnostics(diagnostics)) => {
            assert_eq!(diagnostics.len(), 1);
            assert_eq!(diagnostics[0].attribute.as_deref(), Some("rule.0.status"));
        },
        other => panic!("expected diagnostics, got {:?}", other),
    }

    let mut config = waf_config(&waf_id, "log");
    config["paranoia_level"] = json!(0);
    assert!(tester
        .validate_resource_config(WAF_CONFIGURATION, config)
        .await
        .is_err());
}
