mod common;

use common::{configured_tester, graph_group, TOKEN};
use httpmock::prelude::*;
use msgraph_groups_provider::testing::{
    assert_plan_changes_attribute, assert_plan_no_changes, assert_plan_replaces,
    assert_plan_updates_in_place, ProviderTester,
};
use msgraph_groups_provider::{GraphProvider, ProviderError};
use serde_json::{json, Value};

const GROUP: &str = "msgraph_group";

fn config() -> Value {
    json!({
        "display_name": "Ops",
        "mail_nickname": "ops",
        "mail_enabled": true,
        "security_enabled": false,
        "group_types": ["Unified"],
        "owners": ["u-1"]
    })
}

#[tokio::test]
async fn test_create_binds_owners_and_keeps_plan() {
    let server = MockServer::start_async().await;
    let owner_url = format!("{}/v1.0/directoryObjects/u-1", server.base_url());
    let create = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/v1.0/groups")
                .header("authorization", format!("Bearer {}", TOKEN))
                .body_contains("\"owners@odata.bind\"")
                .body_contains(owner_url.as_str())
                .body_contains("\"mailNickname\":\"ops\"");
            then.status(201).json_body(graph_group("g-1", "Ops", "ops"));
        })
        .await;

    let tester = configured_tester(&server).await;
    let state = tester.apply_create(GROUP, config()).await.unwrap();

    create.assert_async().await;
    assert_eq!(state["id"], "g-1");
    assert_eq!(state["owners"], json!(["u-1"]));
    assert_eq!(state["visibility"], "Private");
    assert_eq!(state["mail"], "ops@contoso.com");
    assert_eq!(state["description"], "Managed in the admin center");
}

#[tokio::test]
async fn test_unconfigured_server_values_do_not_drift() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/v1.0/groups/g-1");
            then.status(200).json_body(graph_group("g-1", "Ops", "ops"));
        })
        .await;

    let tester = configured_tester(&server).await;
    let prior = json!({"id": "g-1", "owners": ["u-1"]});
    let refreshed = tester.read(GROUP, prior).await.unwrap();
    assert_eq!(refreshed["owners"], json!(["u-1"]));

    // description, visibility and classification are not configured.
    let plan = tester
        .plan_update(GROUP, refreshed.clone(), config())
        .await
        .unwrap();
    assert_plan_no_changes(&plan);
    assert_eq!(plan.planned_state["description"], "Managed in the admin center");
    assert_eq!(plan.planned_state["visibility"], "Private");
    assert_eq!(plan.planned_state["mail"], "ops@contoso.com");
}

#[tokio::test]
async fn test_update_patches_only_changed_fields() {
    let server = MockServer::start_async().await;
    let read = server
        .mock_async(|when, then| {
            when.method(GET).path("/v1.0/groups/g-1");
            then.status(200).json_body(graph_group("g-1", "Ops", "ops"));
        })
        .await;
    let patch = server
        .mock_async(|when, then| {
            when.method(httpmock::Method::PATCH)
                .path("/v1.0/groups/g-1")
                .json_body(json!({"displayName": "Ops Team"}));
            then.status(204);
        })
        .await;

    let tester = configured_tester(&server).await;
    let prior = tester
        .read(GROUP, json!({"id": "g-1", "owners": ["u-1"]}))
        .await
        .unwrap();

    let mut desired = config();
    desired["display_name"] = json!("Ops Team");
    let plan = tester
        .plan_update(GROUP, prior.clone(), desired.clone())
        .await
        .unwrap();
    assert_plan_updates_in_place(&plan);
    assert_plan_changes_attribute(&plan, "display_name");
    assert_eq!(plan.changes.len(), 1);

    let updated = tester.apply_update(GROUP, prior, desired).await.unwrap();

    read.assert_async().await;
    patch.assert_async().await;
    assert_eq!(updated["display_name"], "Ops Team");
    assert_eq!(updated["id"], "g-1");
    assert_eq!(updated["description"], "Managed in the admin center");
}

#[tokio::test]
async fn test_changing_visibility_requires_replacement() {
    let tester = ProviderTester::new(GraphProvider::new());
    let prior = json!({
        "id": "g-1",
        "display_name": "Ops",
        "mail_nickname": "ops",
        "mail_enabled": true,
        "security_enabled": false,
        "group_types": ["Unified"],
        "visibility": "Private",
        "owners": ["u-1", "u-2"]
    });

    let mut desired = config();
    desired["owners"] = json!(["u-1", "u-2"]);
    desired["visibility"] = json!("Public");
    let plan = tester.plan_update(GROUP, prior.clone(), desired).await.unwrap();
    assert_plan_replaces(&plan);
    assert_plan_changes_attribute(&plan, "visibility");
    assert_eq!(plan.changes.len(), 1);

    // Owners are a set: order does not matter.
    let mut reordered = config();
    reordered["owners"] = json!(["u-2", "u-1"]);
    let plan = tester.plan_update(GROUP, prior, reordered).await.unwrap();
    assert_plan_no_changes(&plan);
}

#[tokio::test]
async fn test_read_of_deleted_group_is_null() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/v1.0/groups/g-gone");
            then.status(404).json_body(json!({
                "error": {
                    "code": "Request_ResourceNotFound",
                    "message": "Resource 'g-gone' does not exist."
                }
            }));
        })
        .await;

    let tester = configured_tester(&server).await;
    let state = tester.read(GROUP, json!({"id": "g-gone"})).await.unwrap();
    assert!(state.is_null());
}

#[tokio::test]
async fn test_delete_tolerates_missing_group() {
    let server = MockServer::start_async().await;
    let delete = server
        .mock_async(|when, then| {
            when.method(DELETE).path("/v1.0/groups/g-1");
            then.status(404).json_body(json!({
                "error": {"code": "Request_ResourceNotFound", "message": "gone"}
            }));
        })
        .await;

    let tester = configured_tester(&server).await;
    tester
        .apply_delete(GROUP, json!({"id": "g-1", "display_name": "Ops"}))
        .await
        .unwrap();
    delete.assert_async().await;
}

#[tokio::test]
async fn test_import_group() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/v1.0/groups/g-1");
            then.status(200).json_body(graph_group("g-1", "Ops", "ops"));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/v1.0/groups/missing");
            then.status(404)
                .json_body(json!({"error": {"code": "Request_ResourceNotFound", "message": "gone"}}));
        })
        .await;

    let tester = configured_tester(&server).await;
    let imported = tester.import_resource(GROUP, "g-1").await.unwrap();
    assert_eq!(imported.len(), 1);
    assert_eq!(imported[0].resource_type, GROUP);
    assert_eq!(imported[0].state["mail_nickname"], "ops");
    assert!(imported[0].state["owners"].is_null());

    let err = tester.import_resource(GROUP, "missing").await.unwrap_err();
    assert!(matches!(err, ProviderError::NotFound(_)));
}

#[tokio::test]
async fn test_graph_errors_surface_code_and_message() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/v1.0/groups");
            then.status(400).json_body(json!({
                "error": {
                    "code": "Request_BadRequest",
                    "message": "Another object with the same value for property mailNickname already exists."
                }
            }));
        })
        .await;

    let tester = configured_tester(&server).await;
    let err = tester.apply_create(GROUP, config()).await.unwrap_err();
    let text = err.to_string();
    assert!(text.contains("Request_BadRequest"), "{}", text);
    assert!(text.contains("mailNickname already exists"), "{}", text);
}

#[tokio::test]
async fn test_validation_rejects_bad_nickname_and_dynamic_without_rule() {
    let tester = ProviderTester::new(GraphProvider::new());
    let mut bad = config();
    bad["mail_nickname"] = json!("ops team");
    bad["group_types"] = json!(["Unified", "DynamicMembership"]);

    let err = tester.validate_resource_config(GROUP, bad).await.unwrap_err();
    let text = err.to_string();
    assert!(text.contains("[mail_nickname]"), "{}", text);
    assert!(text.contains("[membership_rule]"), "{}", text);

    tester.validate_resource_config(GROUP, config()).await.unwrap();
}
