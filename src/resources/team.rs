//! `msgraph_team`: Microsoft Teams on top of an existing Microsoft 365 group.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, info, instrument};

use super::{
    changed_fields, fill_unset, found, from_state, ignore_not_found, require, segment, to_state,
    ResourceHandler,
};
use crate::error::ProviderError;
use crate::graph::{
    GraphClient, GraphResult, Team, TeamDiscoverySettings, TeamFunSettings, TeamGuestSettings,
    TeamMemberSettings, TeamMessagingSettings,
};
use crate::schema::{Attribute, AttributeFlags, AttributeType, Diagnostic, Schema};

/// Resource type name.
pub const TYPE_NAME: &str = "msgraph_team";

/// Allowed `visibility` values.
pub const VISIBILITIES: [&str; 2] = ["public", "private"];
/// Allowed `fun_settings.giphy_content_rating` values.
pub const GIPHY_RATINGS: [&str; 2] = ["strict", "moderate"];

/// `member_settings` in state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
#[allow(missing_docs)]
pub struct MemberSettingsState {
    pub allow_create_update_channels: Option<bool>,
    pub allow_create_private_channels: Option<bool>,
    pub allow_delete_channels: Option<bool>,
    pub allow_add_remove_apps: Option<bool>,
    pub allow_create_update_remove_tabs: Option<bool>,
    pub allow_create_update_remove_connectors: Option<bool>,
}

/// `guest_settings` in state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
#[allow(missing_docs)]
pub struct GuestSettingsState {
    pub allow_create_update_channels: Option<bool>,
    pub allow_delete_channels: Option<bool>,
}

/// `messaging_settings` in state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
#[allow(missing_docs)]
pub struct MessagingSettingsState {
    pub allow_user_edit_messages: Option<bool>,
    pub allow_user_delete_messages: Option<bool>,
    pub allow_owner_delete_messages: Option<bool>,
    pub allow_team_mentions: Option<bool>,
    pub allow_channel_mentions: Option<bool>,
}

/// `fun_settings` in state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
#[allow(missing_docs)]
pub struct FunSettingsState {
    pub allow_giphy: Option<bool>,
    pub giphy_content_rating: Option<String>,
    pub allow_stickers_and_memes: Option<bool>,
    pub allow_custom_memes: Option<bool>,
}

/// `discovery_settings` in state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
#[allow(missing_docs)]
pub struct DiscoverySettingsState {
    pub show_in_teams_search_and_suggestions: Option<bool>,
}

impl From<TeamMemberSettings> for MemberSettingsState {
    fn from(s: TeamMemberSettings) -> Self {
        Self {
            allow_create_update_channels: s.allow_create_update_channels,
            allow_create_private_channels: s.allow_create_private_channels,
            allow_delete_channels: s.allow_delete_channels,
            allow_add_remove_apps: s.allow_add_remove_apps,
            allow_create_update_remove_tabs: s.allow_create_update_remove_tabs,
            allow_create_update_remove_connectors: s.allow_create_update_remove_connectors,
        }
    }
}

impl From<&MemberSettingsState> for TeamMemberSettings {
    fn from(s: &MemberSettingsState) -> Self {
        Self {
            allow_create_update_channels: s.allow_create_update_channels,
            allow_create_private_channels: s.allow_create_private_channels,
            allow_delete_channels: s.allow_delete_channels,
            allow_add_remove_apps: s.allow_add_remove_apps,
            allow_create_update_remove_tabs: s.allow_create_update_remove_tabs,
            allow_create_update_remove_connectors: s.allow_create_update_remove_connectors,
        }
    }
}

impl From<TeamGuestSettings> for GuestSettingsState {
    fn from(s: TeamGuestSettings) -> Self {
        Self {
            allow_create_update_channels: s.allow_create_update_channels,
            allow_delete_channels: s.allow_delete_channels,
        }
    }
}

impl From<&GuestSettingsState> for TeamGuestSettings {
    fn from(s: &GuestSettingsState) -> Self {
        Self {
            allow_create_update_channels: s.allow_create_update_channels,
            allow_delete_channels: s.allow_delete_channels,
        }
    }
}

impl From<TeamMessagingSettings> for MessagingSettingsState {
    fn from(s: TeamMessagingSettings) -> Self {
        Self {
            allow_user_edit_messages: s.allow_user_edit_messages,
            allow_user_delete_messages: s.allow_user_delete_messages,
            allow_owner_delete_messages: s.allow_owner_delete_messages,
            allow_team_mentions: s.allow_team_mentions,
            allow_channel_mentions: s.allow_channel_mentions,
        }
    }
}

impl From<&MessagingSettingsState> for TeamMessagingSettings {
    fn from(s: &MessagingSettingsState) -> Self {
        Self {
            allow_user_edit_messages: s.allow_user_edit_messages,
            allow_user_delete_messages: s.allow_user_delete_messages,
            allow_owner_delete_messages: s.allow_owner_delete_messages,
            allow_team_mentions: s.allow_team_mentions,
            allow_channel_mentions: s.allow_channel_mentions,
        }
    }
}

impl From<TeamFunSettings> for FunSettingsState {
    fn from(s: TeamFunSettings) -> Self {
        Self {
            allow_giphy: s.allow_giphy,
            giphy_content_rating: s.giphy_content_rating,
            allow_stickers_and_memes: s.allow_stickers_and_memes,
            allow_custom_memes: s.allow_custom_memes,
        }
    }
}

impl From<&FunSettingsState> for TeamFunSettings {
    fn from(s: &FunSettingsState) -> Self {
        Self {
            allow_giphy: s.allow_giphy,
            giphy_content_rating: s.giphy_content_rating.clone(),
            allow_stickers_and_memes: s.allow_stickers_and_memes,
            allow_custom_memes: s.allow_custom_memes,
        }
    }
}

impl From<TeamDiscoverySettings> for DiscoverySettingsState {
    fn from(s: TeamDiscoverySettings) -> Self {
        Self {
            show_in_teams_search_and_suggestions: s.show_in_teams_search_and_suggestions,
        }
    }
}

impl From<&DiscoverySettingsState> for TeamDiscoverySettings {
    fn from(s: &DiscoverySettingsState) -> Self {
        Self {
            show_in_teams_search_and_suggestions: s.show_in_teams_search_and_suggestions,
        }
    }
}

/// Flat state of `msgraph_team`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
#[allow(missing_docs)]
pub struct TeamState {
    /// Team id; always equal to the backing group id.
    pub id: Option<String>,
    pub group_id: Option<String>,
    pub display_name: Option<String>,
    pub description: Option<String>,
    pub classification: Option<String>,
    pub visibility: Option<String>,
    pub specialization: Option<String>,
    pub is_archived: Option<bool>,
    pub web_url: Option<String>,
    pub internal_id: Option<String>,
    pub tenant_id: Option<String>,
    pub created_date_time: Option<String>,
    pub member_settings: Option<MemberSettingsState>,
    pub guest_settings: Option<GuestSettingsState>,
    pub messaging_settings: Option<MessagingSettingsState>,
    pub fun_settings: Option<FunSettingsState>,
    pub discovery_settings: Option<DiscoverySettingsState>,
}

impl TeamState {
    /// Transcribe a Graph team. `group_id` defaults to the team id.
    pub fn from_graph(team: Team) -> Self {
        Self {
            group_id: team.id.clone(),
            id: team.id,
            display_name: team.display_name,
            description: team.description,
            classification: team.classification,
            visibility: team.visibility,
            specialization: team.specialization,
            is_archived: team.is_archived,
            web_url: team.web_url,
            internal_id: team.internal_id,
            tenant_id: team.tenant_id,
            created_date_time: team.created_date_time,
            member_settings: team.member_settings.map(Into::into),
            guest_settings: team.guest_settings.map(Into::into),
            messaging_settings: team.messaging_settings.map(Into::into),
            fun_settings: team.fun_settings.map(Into::into),
            discovery_settings: team.discovery_settings.map(Into::into),
        }
    }

    /// The properties sent on create and `PATCH /teams/{id}`.
    pub fn to_updatable(&self) -> Team {
        Team {
            display_name: self.display_name.clone(),
            description: self.description.clone(),
            classification: self.classification.clone(),
            visibility: self.visibility.clone(),
            specialization: self.specialization.clone(),
            member_settings: self.member_settings.as_ref().map(Into::into),
            guest_settings: self.guest_settings.as_ref().map(Into::into),
            messaging_settings: self.messaging_settings.as_ref().map(Into::into),
            fun_settings: self.fun_settings.as_ref().map(Into::into),
            discovery_settings: self.discovery_settings.as_ref().map(Into::into),
            ..Default::default()
        }
    }
}

fn object(fields: &[(&str, AttributeType)]) -> AttributeType {
    AttributeType::Object(
        fields
            .iter()
            .map(|(name, ty)| (name.to_string(), ty.clone()))
            .collect::<HashMap<_, _>>(),
    )
}

fn settings_attribute(fields: &[(&str, AttributeType)], description: &str) -> Attribute {
    Attribute::new(object(fields), AttributeFlags::optional_computed())
        .use_state_for_unconfigured()
        .with_description(description)
}

/// Schema of `msgraph_team`, shared with the data source.
pub fn schema() -> Schema {
    use AttributeType::{Bool, String as Str};

    Schema::v0()
        .with_attribute(
            "id",
            Attribute::computed_string().with_description("Team id, equal to the group id."),
        )
        .with_attribute(
            "group_id",
            Attribute::required_string()
                .with_force_new()
                .with_description("Microsoft 365 group to team-enable."),
        )
        .with_attribute(
            "display_name",
            Attribute::optional_computed_string().use_state_for_unconfigured(),
        )
        .with_attribute(
            "description",
            Attribute::optional_computed_string().use_state_for_unconfigured(),
        )
        .with_attribute(
            "classification",
            Attribute::optional_computed_string().use_state_for_unconfigured(),
        )
        .with_attribute(
            "visibility",
            Attribute::optional_computed_string()
                .with_allowed_values(VISIBILITIES)
                .use_state_for_unconfigured(),
        )
        .with_attribute(
            "specialization",
            Attribute::optional_computed_string().use_state_for_unconfigured(),
        )
        .with_attribute("is_archived", Attribute::computed_bool())
        .with_attribute("web_url", Attribute::computed_string())
        .with_attribute("internal_id", Attribute::computed_string())
        .with_attribute("tenant_id", Attribute::computed_string())
        .with_attribute("created_date_time", Attribute::computed_string())
        .with_attribute(
            "member_settings",
            settings_attribute(
                &[
                    ("allow_create_update_channels", Bool),
                    ("allow_create_private_channels", Bool),
                    ("allow_delete_channels", Bool),
                    ("allow_add_remove_apps", Bool),
                    ("allow_create_update_remove_tabs", Bool),
                    ("allow_create_update_remove_connectors", Bool),
                ],
                "What members may change in the team.",
            ),
        )
        .with_attribute(
            "guest_settings",
            settings_attribute(
                &[
                    ("allow_create_update_channels", Bool),
                    ("allow_delete_channels", Bool),
                ],
                "What guests may change in the team.",
            ),
        )
        .with_attribute(
            "messaging_settings",
            settings_attribute(
                &[
                    ("allow_user_edit_messages", Bool),
                    ("allow_user_delete_messages", Bool),
                    ("allow_owner_delete_messages", Bool),
                    ("allow_team_mentions", Bool),
                    ("allow_channel_mentions", Bool),
                ],
                "Chat message permissions.",
            ),
        )
        .with_attribute(
            "fun_settings",
            settings_attribute(
                &[
                    ("allow_giphy", Bool),
                    ("giphy_content_rating", Str),
                    ("allow_stickers_and_memes", Bool),
                    ("allow_custom_memes", Bool),
                ],
                "Giphy, stickers and memes. giphy_content_rating is strict or moderate.",
            ),
        )
        .with_attribute(
            "discovery_settings",
            settings_attribute(
                &[("show_in_teams_search_and_suggestions", Bool)],
                "Whether the team shows up in search and suggestions.",
            ),
        )
}

/// Fetch a team.
pub(crate) async fn fetch_team(client: &GraphClient, id: &str) -> GraphResult<Team> {
    client.get(&format!("teams/{}", segment(id))).await
}

/// Handler for `msgraph_team`.
#[derive(Debug, Default)]
pub struct TeamResource;

#[async_trait]
impl ResourceHandler for TeamResource {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn schema(&self) -> Schema {
        schema()
    }

    fn validate(&self, config: &Value) -> Vec<Diagnostic> {
        let rating = config
            .get("fun_settings")
            .and_then(|fun| fun.get("giphy_content_rating"))
            .and_then(Value::as_str);

        match rating {
            Some(rating) if !GIPHY_RATINGS.contains(&rating) => vec![Diagnostic::error(
                "Invalid giphy_content_rating",
            )
            .with_detail(format!(
                "'{}' is not one of: {}",
                rating,
                GIPHY_RATINGS.join(", ")
            ))
            .with_attribute("fun_settings.giphy_content_rating")],
            _ => Vec::new(),
        }
    }

    #[instrument(skip(self, client, planned))]
    async fn create(&self, client: &GraphClient, planned: Value) -> Result<Value, ProviderError> {
        let plan: TeamState = from_state(planned.clone())?;
        let group_id = require(&plan.group_id, "group_id")?;

        let team: Team = client
            .put(
                &format!("groups/{}/team", segment(group_id)),
                &plan.to_updatable(),
            )
            .await?;

        let mut state = TeamState::from_graph(team);
        if state.id.is_none() {
            state.id = Some(group_id.to_string());
        }
        state.group_id = Some(group_id.to_string());
        info!(id = ?state.id, "Created team");

        let mut state = to_state(&state)?;
        fill_unset(&mut state, &planned);
        Ok(state)
    }

    #[instrument(skip(self, client, current))]
    async fn read(
        &self,
        client: &GraphClient,
        current: Value,
    ) -> Result<Option<Value>, ProviderError> {
        let current: TeamState = from_state(current)?;
        let id = require(&current.id, "id")?;

        let Some(team) = found(fetch_team(client, id).await)? else {
            debug!(id, "Team no longer exists");
            return Ok(None);
        };

        let mut state = TeamState::from_graph(team);
        if current.group_id.is_some() {
            state.group_id = current.group_id;
        }
        Ok(Some(to_state(&state)?))
    }

    #[instrument(skip(self, client, prior, planned))]
    async fn update(
        &self,
        client: &GraphClient,
        prior: Value,
        planned: Value,
    ) -> Result<Value, ProviderError> {
        let before: TeamState = from_state(prior)?;
        let after: TeamState = from_state(planned)?;
        let id = require(&before.id, "id")?;

        let changes = changed_fields(
            &serde_json::to_value(before.to_updatable())?,
            &serde_json::to_value(after.to_updatable())?,
        );
        if !changes.is_empty() {
            let fields: Vec<_> = changes.keys().cloned().collect();
            client
                .patch(&format!("teams/{}", segment(id)), &Value::Object(changes))
                .await?;
            info!(id, ?fields, "Updated team");
        }

        let team = found(fetch_team(client, id).await)?.ok_or_else(|| {
            ProviderError::NotFound(format!("Team '{}' disappeared during update", id))
        })?;
        let mut state = TeamState::from_graph(team);
        state.group_id = before.group_id.clone();
        to_state(&state)
    }

    #[instrument(skip(self, client, current))]
    async fn delete(&self, client: &GraphClient, current: Value) -> Result<(), ProviderError> {
        let current: TeamState = from_state(current)?;
        let id = require(&current.id, "id")?;
        ignore_not_found(client.delete(&format!("teams/{}", segment(id))).await)?;
        info!(id, "Deleted team");
        Ok(())
    }

    #[instrument(skip(self, client))]
    async fn import(&self, client: &GraphClient, id: &str) -> Result<Value, ProviderError> {
        let team = found(fetch_team(client, id).await)?
            .ok_or_else(|| ProviderError::NotFound(format!("Team '{}' does not exist", id)))?;
        to_state(&TeamState::from_graph(team))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::PlanModifier;
    use serde_json::json;

    #[test]
    fn test_schema_attributes() {
        let schema = schema();

        assert!(schema.block.attributes["group_id"].force_new);
        assert!(schema.block.attributes["web_url"].is_computed_only());
        assert!(matches!(
            schema.block.attributes["fun_settings"].attr_type,
            AttributeType::Object(ref fields) if fields.len() == 4
        ));
        for name in [
            "member_settings",
            "guest_settings",
            "messaging_settings",
            "fun_settings",
            "discovery_settings",
            "description",
        ] {
            assert!(schema.block.attributes[name]
                .has_plan_modifier(PlanModifier::UseStateForUnconfigured));
        }
    }

    #[test]
    fn test_state_covers_schema() {
        let value = to_state(&TeamState::default()).unwrap();
        let schema = schema();
        let mut state_keys: Vec<_> = value.as_object().unwrap().keys().cloned().collect();
        let mut schema_keys: Vec<_> = schema.block.attributes.keys().cloned().collect();
        state_keys.sort();
        schema_keys.sort();
        assert_eq!(state_keys, schema_keys);
    }

    #[test]
    fn test_from_graph() {
        let team: Team = serde_json::from_value(json!({
            "id": "g-1",
            "displayName": "Ops",
            "isArchived": false,
            "webUrl": "https://teams.microsoft.com/l/team/19%3a...",
            "memberSettings": {
                "allowCreateUpdateChannels": true,
                "allowDeleteChannels": false
            },
            "funSettings": {"allowGiphy": true, "giphyContentRating": "moderate"}
        }))
        .unwrap();

        let state = TeamState::from_graph(team);

        assert_eq!(state.id.as_deref(), Some("g-1"));
        assert_eq!(state.group_id.as_deref(), Some("g-1"));
        assert_eq!(state.is_archived, Some(false));
        let members = state.member_settings.unwrap();
        assert_eq!(members.allow_create_update_channels, Some(true));
        assert_eq!(members.allow_add_remove_apps, None);
        assert_eq!(
            state.fun_settings.unwrap().giphy_content_rating.as_deref(),
            Some("moderate")
        );
        assert!(state.guest_settings.is_none());
    }

    #[test]
    fn test_state_uses_snake_case_settings() {
        let state = TeamState {
            guest_settings: Some(GuestSettingsState {
                allow_delete_channels: Some(false),
                ..Default::default()
            }),
            ..Default::default()
        };

        let value = to_state(&state).unwrap();
        assert_eq!(
            value["guest_settings"],
            json!({"allow_create_update_channels": null, "allow_delete_channels": false})
        );

        let body = serde_json::to_value(state.to_updatable()).unwrap();
        assert_eq!(body, json!({"guestSettings": {"allowDeleteChannels": false}}));
    }

    #[test]
    fn test_update_diff_on_settings() {
        let before = TeamState {
            id: Some("g-1".to_string()),
            fun_settings: Some(FunSettingsState {
                allow_giphy: Some(true),
                giphy_content_rating: Some("moderate".to_string()),
                ..Default::default()
            }),
            description: Some("Ops".to_string()),
            ..Default::default()
        };
        let mut after = before.clone();
        if let Some(fun) = after.fun_settings.as_mut() {
            fun.giphy_content_rating = Some("strict".to_string());
        }

        let changes = changed_fields(
            &serde_json::to_value(before.to_updatable()).unwrap(),
            &serde_json::to_value(after.to_updatable()).unwrap(),
        );

        assert_eq!(
            Value::Object(changes),
            json!({"funSettings": {"allowGiphy": true, "giphyContentRating": "strict"}})
        );
    }

    #[test]
    fn test_validate_giphy_rating() {
        let resource = TeamResource;
        assert!(resource
            .validate(&json!({"group_id": "g-1", "fun_settings": {"giphy_content_rating": "strict"}}))
            .is_empty());

        let diagnostics =
            resource.validate(&json!({"group_id": "g-1", "fun_settings": {"giphy_content_rating": "spicy"}}));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(
            diagnostics[0].attribute.as_deref(),
            Some("fun_settings.giphy_content_rating")
        );
    }
}
