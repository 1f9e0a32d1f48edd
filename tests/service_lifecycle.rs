//! End-to-end service scenarios against the in-memory Fastly account.

use std::sync::Arc;

use fastly_provider::testing::{
    assert_error_contains, assert_plan_changes_attribute, assert_plan_no_changes,
    assert_plan_updates_in_place, FakeFastly, ProviderTester, TestError,
};
use fastly_provider::FastlyClient;
use serde_json::{json, Value};
use tokio_test::{assert_err, assert_ok};

const VCL: &str = "fastly_service_v1";
const COMPUTE: &str = "fastly_service_compute";

fn tester() -> (Arc<FakeFastly>, ProviderTester<fastly_provider::FastlyProvider>) {
    let fake = Arc::new(FakeFastly::new());
    (fake.clone(), ProviderTester::fastly(fake))
}

fn www() -> Value {
    json!({
        "name": "www",
        "domain": [{"name": "www.example.com"}],
        "backend": [{"name": "origin", "address": "origin.example.com"}]
    })
}

fn with(mut config: Value, key: &str, value: Value) -> Value {
    config[key] = value;
    config
}

fn assert_no_version_calls(fake: &FakeFastly) {
    for call in ["clone_version", "create_block", "delete_block", "activate_version", "update_package"] {
        assert!(fake.calls_named(call).is_empty(), "unexpected {}: {:?}", call, fake.call_names());
    }
}

#[tokio::test]
async fn create_then_read_back_plans_no_changes() {
    let (fake, tester) = tester();
    let state = assert_ok!(tester.lifecycle_create(VCL, www()).await);

    assert_eq!(state["active_version"], json!(1));
    assert_eq!(state["comment"], json!("Managed by Terraform"));
    assert_eq!(fake.calls_named("create_block").len(), 2);

    // Refreshed backends carry every API default; the configured form
    // carries two fields.
    assert!(state["backend"][0].get("port").is_some());
    let plan = assert_ok!(tester.plan_update(VCL, state.clone(), www()).await);
    assert_plan_no_changes(&plan);
    assert_eq!(plan.planned_state["backend"], state["backend"]);

    fake.clear_calls();
    let updated = assert_ok!(tester.update(VCL, state, plan.planned_state).await);
    assert_no_version_calls(&fake);
    assert_eq!(updated["active_version"], json!(1));
}

#[tokio::test]
async fn unchanged_config_with_computed_block_fields_settles() {
    let (fake, tester) = tester();
    let mut config = www();
    config["acl"] = json!([{"name": "blocklist"}]);
    config["dictionary"] = json!([{"name": "redirects"}]);
    config["waf"] = json!([{"response_object": "blocked"}]);
    config["response_object"] = json!([{"name": "blocked", "status": 403, "response": "Forbidden"}]);

    let state = assert_ok!(tester.lifecycle_create(VCL, config.clone()).await);
    assert!(state["acl"][0].get("acl_id").is_some());
    assert!(state["waf"][0].get("waf_id").is_some());

    let plan = assert_ok!(tester.plan_update(VCL, state.clone(), config.clone()).await);
    assert_plan_no_changes(&plan);
    assert_eq!(plan.planned_state["acl"], state["acl"]);
    assert_eq!(plan.planned_state["dictionary"], state["dictionary"]);
    assert_eq!(plan.planned_state["waf"], state["waf"]);

    fake.clear_calls();
    let state = assert_ok!(tester.lifecycle_update(VCL, state, config).await);
    assert_no_version_calls(&fake);
    assert_eq!(state["active_version"], json!(1));
}

#[tokio::test]
async fn compute_rename_keeps_the_active_version() {
    let (fake, tester) = tester();
    let config = json!({
        "name": "edge-app",
        "domain": [{"name": "app.example.com"}],
        "backend": [{"name": "origin", "address": "origin.example.com"}],
        "package": [{"filename": "pkg/edge-app.tar.gz"}]
    });
    let state = assert_ok!(tester.lifecycle_create(COMPUTE, config.clone()).await);
    assert!(state["package"][0].get("source_code_hash").is_some());

    let plan = assert_ok!(tester.plan_update(COMPUTE, state.clone(), config.clone()).await);
    assert_plan_no_changes(&plan);

    fake.clear_calls();
    let state = assert_ok!(tester.lifecycle_update(COMPUTE, state, with(config, "name", json!("edge-app-v2"))).await);
    assert_no_version_calls(&fake);
    assert_eq!(fake.calls_named("update_service").len(), 1);
    assert_eq!(state["name"], json!("edge-app-v2"));
    assert_eq!(state["active_version"], json!(1));
}

#[tokio::test]
async fn compute_package_filename_change_uploads_once() {
    let (fake, tester) = tester();
    let config = json!({
        "name": "edge-app",
        "domain": [{"name": "app.example.com"}],
        "backend": [{"name": "origin", "address": "origin.example.com"}],
        "package": [{"filename": "pkg/edge-app.tar.gz"}]
    });
    let state = assert_ok!(tester.lifecycle_create(COMPUTE, config.clone()).await);
    let first_hash = state["package"][0]["source_code_hash"].clone();
    fake.clear_calls();

    let config = with(config, "package", json!([{"filename": "pkg/edge-app-v2.tar.gz"}]));
    let state = assert_ok!(tester.lifecycle_update(COMPUTE, state, config).await);

    assert_eq!(fake.calls_named("clone_version").len(), 1);
    assert_eq!(fake.calls_named("update_package").len(), 1);
    assert_eq!(state["active_version"], json!(2));
    assert_ne!(state["package"][0]["source_code_hash"], first_hash);
}

#[tokio::test]
async fn adding_a_backend_touches_only_that_backend() {
    let (fake, tester) = tester();
    let state = assert_ok!(tester.lifecycle_create(VCL, www()).await);
    fake.clear_calls();

    let config = with(
        www(),
        "backend",
        json!([
            {"name": "origin", "address": "origin.example.com"},
            {"name": "fallback", "address": "fallback.example.com", "port": 443}
        ]),
    );
    let state = assert_ok!(tester.lifecycle_update(VCL, state, config).await);

    assert_eq!(fake.calls_named("clone_version").len(), 1);
    assert_eq!(fake.calls_named("create_block").len(), 1);
    assert!(fake.calls_named("delete_block").is_empty());
    assert_eq!(fake.calls_named("activate_version").len(), 1);
    assert_eq!(state["active_version"], json!(2));
    assert_eq!(state["backend"].as_array().map(Vec::len), Some(2));
}

#[tokio::test]
async fn changing_a_backend_replaces_the_block() {
    let (fake, tester) = tester();
    let state = assert_ok!(tester.lifecycle_create(VCL, www()).await);
    fake.clear_calls();

    let config = with(
        www(),
        "backend",
        json!([{"name": "origin", "address": "origin.example.com", "port": 8080}]),
    );
    assert_ok!(tester.lifecycle_update(VCL, state, config).await);

    let names = fake.call_names();
    let delete = names.iter().position(|n| n == "delete_block");
    let create = names.iter().position(|n| n == "create_block");
    assert!(delete.is_some() && create.is_some());
    assert!(delete < create, "old block must go before the new one lands: {:?}", names);
}

#[tokio::test]
async fn one_clone_per_apply_however_many_blocks_change() {
    let (fake, tester) = tester();
    let state = assert_ok!(tester.lifecycle_create(VCL, www()).await);
    fake.clear_calls();

    let mut config = www();
    config["domain"] = json!([{"name": "www.example.com"}, {"name": "static.example.com"}]);
    config["header"] = json!([{
        "name": "cache-control",
        "action": "set",
        "type": "cache",
        "destination": "http.Cache-Control",
        "source": "\"max-age=60\""
    }]);
    config["default_ttl"] = json!(60);
    let state = assert_ok!(tester.lifecycle_update(VCL, state, config).await);

    assert_eq!(fake.calls_named("clone_version").len(), 1);
    assert_eq!(fake.calls_named("activate_version").len(), 1);
    assert_eq!(state["cloned_version"], json!(2));
    assert_eq!(state["default_ttl"], json!(60));
}

#[tokio::test]
async fn default_ttl_can_be_set_to_zero() {
    let (fake, tester) = tester();
    let state = assert_ok!(
        tester
            .lifecycle_create(VCL, with(www(), "default_ttl", json!(3400)))
            .await
    );
    assert_eq!(state["default_ttl"], json!(3400));
    fake.clear_calls();

    let config = with(www(), "default_ttl", json!(0));
    let plan = assert_ok!(tester.plan_update(VCL, state.clone(), config).await);
    assert_plan_updates_in_place(&plan);
    assert_plan_changes_attribute(&plan, "default_ttl");

    let state = assert_ok!(tester.update(VCL, state, plan.planned_state).await);
    assert_eq!(state["default_ttl"], json!(0));

    let writes = fake.calls_named("update_settings");
    assert_eq!(writes.len(), 1);
    assert!(writes[0].args.contains("default_ttl: 0"), "{}", writes[0].args);
}

#[tokio::test]
async fn inactive_apply_leaves_the_draft_unactivated() {
    let (fake, tester) = tester();
    let state = assert_ok!(tester.lifecycle_create(VCL, www()).await);
    fake.clear_calls();

    let mut config = with(www(), "activate", json!(false));
    config["domain"] = json!([{"name": "www.example.com"}, {"name": "beta.example.com"}]);
    let state = assert_ok!(tester.lifecycle_update(VCL, state, config).await);

    assert!(fake.calls_named("activate_version").is_empty());
    assert_eq!(state["active_version"], json!(1));
    assert_eq!(state["cloned_version"], json!(2));
}

#[tokio::test]
async fn rejected_version_is_not_activated() {
    let (fake, tester) = tester();
    let config = json!({"name": "no-backend", "domain": [{"name": "nb.example.com"}]});
    let plan = assert_ok!(tester.plan_create(VCL, config).await);

    let err = assert_err!(tester.create(VCL, plan.planned_state).await);
    assert!(err.to_string().contains("backend"), "{}", err);
    assert!(fake.calls_named("activate_version").is_empty());
}

#[tokio::test]
async fn delete_deactivates_then_removes() {
    let (fake, tester) = tester();
    let state = assert_ok!(tester.lifecycle_create(VCL, www()).await);
    fake.clear_calls();

    assert_ok!(tester.delete(VCL, state.clone()).await);
    assert_eq!(fake.calls_named("deactivate_version").len(), 1);
    assert_eq!(fake.calls_named("delete_service").len(), 1);

    let gone = assert_ok!(tester.read(VCL, state).await);
    assert_eq!(gone, Value::Null);
}

#[tokio::test]
async fn service_import_reads_everything_back() {
    let (_fake, tester) = tester();
    let state = assert_ok!(tester.lifecycle_create(VCL, www()).await);
    let id = state["id"].as_str().unwrap_or_default().to_string();

    let imported = assert_ok!(tester.import_resource(VCL, &id).await);
    assert_eq!(imported.len(), 1);
    assert_eq!(imported[0].state["name"], json!("www"));
    assert_eq!(imported[0].state["backend"], state["backend"]);
}

#[tokio::test]
async fn compute_rejects_vcl_only_blocks() {
    let (_fake, tester) = tester();
    let config = json!({
        "name": "edge-app",
        "domain": [{"name": "app.example.com"}],
        "backend": [{"name": "origin", "address": "origin.example.com"}],
        "package": [{"filename": "pkg/edge-app.tar.gz"}],
        "acl": [{"name": "blocklist"}]
    });

    match tester.validate_resource_config(COMPUTE, config.clone()).await {
        Err(TestError::Diagnostics(diagnostics)) => {
            assert_error_contains(&diagnostics, "Unsupported argument");
            assert_eq!(diagnostics[0].attribute.as_deref(), Some("acl"));
        },
        other => panic!("expected diagnostics, got {:?}", other),
    }

    let mut vcl = config;
    if let Some(map) = vcl.as_object_mut() {
        map.remove("package");
    }
    assert_ok!(tester.validate_resource_config(VCL, vcl).await);
}

#[tokio::test]
async fn compute_service_uploads_its_package() {
    let (fake, tester) = tester();
    let config = json!({
        "name": "edge-app",
        "domain": [{"name": "app.example.com"}],
        "backend": [{"name": "origin", "address": "origin.example.com"}],
        "package": [{"filename": "pkg/edge-app.tar.gz"}]
    });
    let state = assert_ok!(tester.lifecycle_create(COMPUTE, config).await);

    assert_eq!(fake.calls_named("update_package").len(), 1);
    assert_eq!(state["active_version"], json!(1));

    let id = state["id"].as_str().unwrap_or_default().to_string();
    let detail = assert_ok!(fake.get_service_details(&id).await);
    assert_eq!(detail.name, "edge-app");
}
