#![allow(dead_code)]

use httpmock::MockServer;
use msgraph_groups_provider::testing::ProviderTester;
use msgraph_groups_provider::GraphProvider;
use serde_json::{json, Value};

pub const TOKEN: &str = "test-token";

/// A tester whose provider talks to `server` with a static token.
pub async fn configured_tester(server: &MockServer) -> ProviderTester<GraphProvider> {
    let tester = ProviderTester::new(GraphProvider::new());
    tester
        .configure(json!({
            "access_token": TOKEN,
            "graph_endpoint": server.base_url(),
            "max_retries": 0
        }))
        .await
        .unwrap();
    tester
}

pub fn graph_group(id: &str, display_name: &str, nickname: &str) -> Value {
    json!({
        "id": id,
        "displayName": display_name,
        "description": "Managed in the admin center",
        "mailNickname": nickname,
        "mailEnabled": true,
        "securityEnabled": false,
        "groupTypes": ["Unified"],
        "visibility": "Private",
        "mail": format!("{}@contoso.com", nickname),
        "createdDateTime": "2024-03-01T09:30:00Z",
        "proxyAddresses": [format!("SMTP:{}@contoso.com", nickname)],
        "securityIdentifier": "S-1-12-1-1",
        "assignedLabels": []
    })
}

pub fn graph_team(id: &str, display_name: &str) -> Value {
    json!({
        "id": id,
        "displayName": display_name,
        "description": "Ops team",
        "visibility": "private",
        "isArchived": false,
        "webUrl": format!("https://teams.microsoft.com/l/team/{}", id),
        "internalId": "19:abc@thread.tacv2",
        "memberSettings": {
            "allowCreateUpdateChannels": true,
            "allowDeleteChannels": true
        },
        "funSettings": {
            "allowGiphy": false,
            "giphyContentRating": "strict"
        }
    })
}
