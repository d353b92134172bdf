//! Microsoft Graph resource models.
//!
//! Every field is optional: Graph omits unset properties and `$select`
//! narrows responses further. `None` fields are never serialized, so a model
//! doubles as a sparse request body.

#![allow(missing_docs)]

use serde::{Deserialize, Serialize};

/// `OData` error response from Microsoft Graph.
#[derive(Debug, Deserialize)]
pub struct ODataError {
    /// Error payload.
    pub error: ODataErrorBody,
}

/// `OData` error body.
#[derive(Debug, Deserialize)]
pub struct ODataErrorBody {
    /// Machine-readable code.
    pub code: String,
    /// Human-readable message.
    pub message: String,
}

/// A page of a Graph collection.
#[derive(Debug, Deserialize)]
pub struct ODataCollection<T> {
    /// Items on this page.
    #[serde(default = "Vec::new")]
    pub value: Vec<T>,
    /// Absolute URL of the next page.
    #[serde(rename = "@odata.nextLink")]
    pub next_link: Option<String>,
}

/// Body of a `$ref` POST adding a navigation link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ODataReference {
    /// Absolute URL of the referenced object.
    #[serde(rename = "@odata.id")]
    pub odata_id: String,
}

/// Minimal directory object (user, group, service principal, device, ...).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryObject {
    /// Object id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Concrete type, e.g. `#microsoft.graph.user`.
    #[serde(rename = "@odata.type", skip_serializing_if = "Option::is_none")]
    pub odata_type: Option<String>,
}

/// Microsoft Graph `group`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mail_nickname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mail_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub security_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_types: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visibility: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub classification: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_assignable_to_role: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub membership_rule: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub membership_rule_processing_state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preferred_data_location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preferred_language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub theme: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_date_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub renewed_date_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiration_date_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub security_identifier: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxy_addresses: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub on_premises_sync_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_labels: Option<Vec<AssignedLabel>>,
    /// Owners bound at creation, as directory object URLs.
    #[serde(rename = "owners@odata.bind", skip_serializing_if = "Option::is_none")]
    pub owners_bind: Option<Vec<String>>,
    /// Members bound at creation, as directory object URLs.
    #[serde(rename = "members@odata.bind", skip_serializing_if = "Option::is_none")]
    pub members_bind: Option<Vec<String>>,
}

/// Sensitivity label applied to a Microsoft 365 group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignedLabel {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

/// Microsoft Graph `team`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Team {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub internal_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub classification: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub specialization: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visibility: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub web_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_archived: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_date_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub member_settings: Option<TeamMemberSettings>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guest_settings: Option<TeamGuestSettings>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub messaging_settings: Option<TeamMessagingSettings>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fun_settings: Option<TeamFunSettings>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discovery_settings: Option<TeamDiscoverySettings>,
}

/// Microsoft Graph `teamMemberSettings`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamMemberSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_create_update_channels: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_create_private_channels: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_delete_channels: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_add_remove_apps: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_create_update_remove_tabs: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_create_update_remove_connectors: Option<bool>,
}

/// Microsoft Graph `teamGuestSettings`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamGuestSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_create_update_channels: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_delete_channels: Option<bool>,
}

/// Microsoft Graph `teamMessagingSettings`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamMessagingSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_user_edit_messages: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_user_delete_messages: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_owner_delete_messages: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_team_mentions: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_channel_mentions: Option<bool>,
}

/// Microsoft Graph `teamFunSettings`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamFunSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_giphy: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub giphy_content_rating: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_stickers_and_memes: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_custom_memes: Option<bool>,
}

/// Microsoft Graph `teamDiscoverySettings`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamDiscoverySettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub show_in_teams_search_and_suggestions: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_odata_error_parsing() {
        let json = r#"{
            "error": {
                "code": "Request_ResourceNotFound",
                "message": "Resource not found",
                "innerError": {"date": "2024-01-15"}
            }
        }"#;

        let error: ODataError = serde_json::from_str(json).unwrap();
        assert_eq!(error.error.code, "Request_ResourceNotFound");
        assert_eq!(error.error.message, "Resource not found");
    }

    #[test]
    fn test_collection_parsing() {
        let page: ODataCollection<DirectoryObject> = serde_json::from_value(json!({
            "value": [
                {"id": "u-1", "@odata.type": "#microsoft.graph.user"},
                {"id": "g-2", "@odata.type": "#microsoft.graph.group"}
            ],
            "@odata.nextLink": "https://graph.microsoft.com/v1.0/groups/g/members?$skiptoken=x"
        }))
        .unwrap();

        assert_eq!(page.value.len(), 2);
        assert_eq!(page.value[1].odata_type.as_deref(), Some("#microsoft.graph.group"));
        assert!(page.next_link.is_some());
    }

    #[test]
    fn test_group_parses_graph_payload() {
        let group: Group = serde_json::from_value(json!({
            "@odata.context": "https://graph.microsoft.com/v1.0/$metadata#groups/$entity",
            "id": "02bd9fd6-8f93-4758-87c3-1fb73740a315",
            "displayName": "HR Taskforce",
            "mailNickname": "HRTaskforce",
            "mailEnabled": true,
            "securityEnabled": false,
            "groupTypes": ["Unified"],
            "visibility": "Private",
            "proxyAddresses": ["SMTP:HRTaskforce@contoso.com"],
            "createdDateTime": "2024-01-15T10:00:00Z",
            "isAssignableToRole": null
        }))
        .unwrap();

        assert_eq!(group.display_name.as_deref(), Some("HR Taskforce"));
        assert_eq!(group.group_types, Some(vec!["Unified".to_string()]));
        assert_eq!(group.is_assignable_to_role, None);
    }

    #[test]
    fn test_group_request_body_is_sparse() {
        let group = Group {
            display_name: Some("Library Assist".to_string()),
            mail_enabled: Some(false),
            owners_bind: Some(vec![
                "https://graph.microsoft.com/v1.0/directoryObjects/u-1".to_string()
            ]),
            ..Default::default()
        };

        assert_eq!(
            serde_json::to_value(&group).unwrap(),
            json!({
                "displayName": "Library Assist",
                "mailEnabled": false,
                "owners@odata.bind": ["https://graph.microsoft.com/v1.0/directoryObjects/u-1"]
            })
        );
    }

    #[test]
    fn test_team_settings_round_trip_names() {
        let team = Team {
            fun_settings: Some(TeamFunSettings {
                allow_giphy: Some(true),
                giphy_content_rating: Some("strict".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };

        assert_eq!(
            serde_json::to_value(&team).unwrap(),
            json!({"funSettings": {"allowGiphy": true, "giphyContentRating": "strict"}})
        );
    }
}
