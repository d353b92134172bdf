//! `msgraph_group`: a Microsoft 365 or security group.

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
use crate::graph::{GraphClient, GraphResult, Group};
use crate::schema::{Attribute, AttributeFlags, AttributeType, Diagnostic, Schema};

/// Resource type name.
pub const TYPE_NAME: &str = "msgraph_group";

/// Allowed `group_types` entries.
pub const GROUP_TYPES: [&str; 2] = ["Unified", "DynamicMembership"];
/// Allowed `visibility` values.
pub const VISIBILITIES: [&str; 3] = ["Public", "Private", "HiddenMembership"];
/// Allowed `membership_rule_processing_state` values.
pub const PROCESSING_STATES: [&str; 2] = ["On", "Paused"];

const MAIL_NICKNAME_MAX_LEN: usize = 64;
const MAIL_NICKNAME_FORBIDDEN: &str = "@()\\[]\";:<>,";

/// Properties requested on every read.
pub(crate) const SELECT: &str = "id,displayName,description,mailNickname,mailEnabled,\
securityEnabled,groupTypes,visibility,classification,isAssignableToRole,membershipRule,\
membershipRuleProcessingState,preferredDataLocation,preferredLanguage,theme,mail,\
createdDateTime,renewedDateTime,expirationDateTime,securityIdentifier,proxyAddresses,\
onPremisesSyncEnabled,assignedLabels";

/// A sensitivity label in state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssignedLabelState {
    /// Label id.
    pub label_id: Option<String>,
    /// Label display name.
    pub display_name: Option<String>,
}

/// Flat state of `msgraph_group`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
#[allow(missing_docs)]
pub struct GroupState {
    pub id: Option<String>,
    pub display_name: Option<String>,
    pub description: Option<String>,
    pub mail_nickname: Option<String>,
    pub mail_enabled: Option<bool>,
    pub security_enabled: Option<bool>,
    pub group_types: Option<Vec<String>>,
    pub visibility: Option<String>,
    pub classification: Option<String>,
    pub is_assignable_to_role: Option<bool>,
    pub membership_rule: Option<String>,
    pub membership_rule_processing_state: Option<String>,
    pub preferred_data_location: Option<String>,
    pub preferred_language: Option<String>,
    pub theme: Option<String>,
    /// Owner object ids, bound at creation only.
    pub owners: Option<Vec<String>>,
    /// Member object ids, bound at creation only.
    pub members: Option<Vec<String>>,
    pub mail: Option<String>,
    pub created_date_time: Option<String>,
    pub renewed_date_time: Option<String>,
    pub expiration_date_time: Option<String>,
    pub security_identifier: Option<String>,
    pub proxy_addresses: Option<Vec<String>>,
    pub onpremises_sync_enabled: Option<bool>,
    pub assigned_labels: Option<Vec<AssignedLabelState>>,
}

impl GroupState {
    /// Transcribe a Graph group. `owners` and `members` are not part of the
    /// group object and stay unset.
    pub fn from_graph(group: Group) -> Self {
        Self {
            id: group.id,
            display_name: group.display_name,
            description: group.description,
            mail_nickname: group.mail_nickname,
            mail_enabled: group.mail_enabled,
            security_enabled: group.security_enabled,
            group_types: group.group_types,
            visibility: group.visibility,
            classification: group.classification,
            is_assignable_to_role: group.is_assignable_to_role,
            membership_rule: group.membership_rule,
            membership_rule_processing_state: group.membership_rule_processing_state,
            preferred_data_location: group.preferred_data_location,
            preferred_language: group.preferred_language,
            theme: group.theme,
            owners: None,
            members: None,
            mail: group.mail,
            created_date_time: group.created_date_time,
            renewed_date_time: group.renewed_date_time,
            expiration_date_time: group.expiration_date_time,
            security_identifier: group.security_identifier,
            proxy_addresses: group.proxy_addresses,
            onpremises_sync_enabled: group.on_premises_sync_enabled,
            assigned_labels: group.assigned_labels.map(|labels| {
                labels
                    .into_iter()
                    .map(|l| AssignedLabelState {
                        label_id: l.label_id,
                        display_name: l.display_name,
                    })
                    .collect()
            }),
        }
    }

    /// Body of `POST /groups`.
    pub fn to_create_body(&self, client: &GraphClient) -> Group {
        let bind = |ids: &Option<Vec<String>>| -> Option<Vec<String>> {
            ids.as_ref()
                .filter(|ids| !ids.is_empty())
                .map(|ids| ids.iter().map(|id| client.directory_object_url(id)).collect())
        };

        Group {
            group_types: self.group_types.clone(),
            visibility: self.visibility.clone(),
            is_assignable_to_role: self.is_assignable_to_role,
            owners_bind: bind(&self.owners),
            members_bind: bind(&self.members),
            ..self.to_updatable()
        }
    }

    /// The properties `PATCH /groups/{id}` may change.
    pub fn to_updatable(&self) -> Group {
        Group {
            display_name: self.display_name.clone(),
            description: self.description.clone(),
            mail_nickname: self.mail_nickname.clone(),
            mail_enabled: self.mail_enabled,
            security_enabled: self.security_enabled,
            classification: self.classification.clone(),
            membership_rule: self.membership_rule.clone(),
            membership_rule_processing_state: self.membership_rule_processing_state.clone(),
            preferred_data_location: self.preferred_data_location.clone(),
            preferred_language: self.preferred_language.clone(),
            theme: self.theme.clone(),
            ..Default::default()
        }
    }

    fn is_dynamic(&self) -> bool {
        self.group_types
            .as_ref()
            .is_some_and(|types| types.iter().any(|t| t == "DynamicMembership"))
    }
}

/// Schema of `msgraph_group`, shared with the data source.
pub fn schema() -> Schema {
    let mut label = HashMap::new();
    label.insert("label_id".to_string(), AttributeType::String);
    label.insert("display_name".to_string(), AttributeType::String);

    Schema::v0()
        .with_attribute(
            "id",
            Attribute::computed_string().with_description("Object id of the group."),
        )
        .with_attribute(
            "display_name",
            Attribute::required_string().with_description("Display name of the group."),
        )
        .with_attribute(
            "description",
            Attribute::optional_computed_string()
                .use_state_for_unconfigured()
                .with_description("Optional description."),
        )
        .with_attribute(
            "mail_nickname",
            Attribute::required_string().with_description("Mail alias, unique in the tenant."),
        )
        .with_attribute(
            "mail_enabled",
            Attribute::required_bool().with_description("Whether the group is mail-enabled."),
        )
        .with_attribute(
            "security_enabled",
            Attribute::required_bool().with_description("Whether the group is a security group."),
        )
        .with_attribute(
            "group_types",
            Attribute::string_set(AttributeFlags::optional_computed())
                .with_allowed_values(GROUP_TYPES)
                .use_state_for_unconfigured()
                .with_force_new()
                .with_description("`Unified` for Microsoft 365 groups, `DynamicMembership` for rule-based membership."),
        )
        .with_attribute(
            "visibility",
            Attribute::optional_computed_string()
                .with_allowed_values(VISIBILITIES)
                .use_state_for_unconfigured()
                .with_force_new(),
        )
        .with_attribute(
            "classification",
            Attribute::optional_computed_string().use_state_for_unconfigured(),
        )
        .with_attribute(
            "is_assignable_to_role",
            Attribute::optional_computed_bool()
                .use_state_for_unconfigured()
                .with_force_new()
                .with_description("Whether Entra roles can be assigned to the group."),
        )
        .with_attribute(
            "membership_rule",
            Attribute::optional_computed_string()
                .use_state_for_unconfigured()
                .with_description("Dynamic membership rule."),
        )
        .with_attribute(
            "membership_rule_processing_state",
            Attribute::optional_computed_string()
                .with_allowed_values(PROCESSING_STATES)
                .use_state_for_unconfigured(),
        )
        .with_attribute(
            "preferred_data_location",
            Attribute::optional_computed_string().use_state_for_unconfigured(),
        )
        .with_attribute(
            "preferred_language",
            Attribute::optional_computed_string().use_state_for_unconfigured(),
        )
        .with_attribute(
            "theme",
            Attribute::optional_computed_string().use_state_for_unconfigured(),
        )
        .with_attribute(
            "owners",
            Attribute::string_set(AttributeFlags::optional())
                .use_state_for_unconfigured()
                .with_force_new()
                .with_description("Owner object ids bound at creation."),
        )
        .with_attribute(
            "members",
            Attribute::string_set(AttributeFlags::optional())
                .use_state_for_unconfigured()
                .with_force_new()
                .with_description("Member object ids bound at creation. Use msgraph_group_member afterwards."),
        )
        .with_attribute("mail", Attribute::computed_string())
        .with_attribute("created_date_time", Attribute::computed_string())
        .with_attribute("renewed_date_time", Attribute::computed_string())
        .with_attribute("expiration_date_time", Attribute::computed_string())
        .with_attribute("security_identifier", Attribute::computed_string())
        .with_attribute(
            "proxy_addresses",
            Attribute::new(
                AttributeType::list(AttributeType::String),
                AttributeFlags::computed(),
            ),
        )
        .with_attribute("onpremises_sync_enabled", Attribute::computed_bool())
        .with_attribute(
            "assigned_labels",
            Attribute::new(
                AttributeType::list(AttributeType::Object(label)),
                AttributeFlags::computed(),
            ),
        )
}

/// Check a mail nickname: 1 to 64 printable ASCII characters, no spaces and
/// none of `@()\[]";:<>,`.
pub fn validate_mail_nickname(nickname: &str) -> Result<(), String> {
    if nickname.is_empty() || nickname.len() > MAIL_NICKNAME_MAX_LEN {
        return Err(format!(
            "must be between 1 and {} characters long",
            MAIL_NICKNAME_MAX_LEN
        ));
    }
    if let Some(c) = nickname
        .chars()
        .find(|c| !c.is_ascii() || c.is_ascii_control() || *c == ' ' || MAIL_NICKNAME_FORBIDDEN.contains(*c))
    {
        return Err(format!("contains invalid character {:?}", c));
    }
    Ok(())
}

/// Fetch a group with every property the state carries.
pub(crate) async fn fetch_group(client: &GraphClient, id: &str) -> GraphResult<Group> {
    client
        .get(&format!("groups/{}?$select={}", segment(id), SELECT))
        .await
}

/// Handler for `msgraph_group`.
#[derive(Debug, Default)]
pub struct GroupResource;

#[async_trait]
impl ResourceHandler for GroupResource {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn schema(&self) -> Schema {
        schema()
    }

    fn validate(&self, config: &Value) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();

        if let Some(nickname) = config.get("mail_nickname").and_then(Value::as_str) {
            if let Err(reason) = validate_mail_nickname(nickname) {
                diagnostics.push(
                    Diagnostic::error("Invalid mail_nickname")
                        .with_detail(format!("'{}' {}", nickname, reason))
                        .with_attribute("mail_nickname"),
                );
            }
        }

        let dynamic = config
            .get("group_types")
            .and_then(Value::as_array)
            .is_some_and(|types| types.iter().any(|t| t == "DynamicMembership"));
        let has_rule = config
            .get("membership_rule")
            .and_then(Value::as_str)
            .is_some_and(|rule| !rule.trim().is_empty());
        if dynamic && !has_rule {
            diagnostics.push(
                Diagnostic::error("membership_rule is required for dynamic groups")
                    .with_detail("group_types contains DynamicMembership but no membership_rule is set")
                    .with_attribute("membership_rule"),
            );
        }

        diagnostics
    }

    #[instrument(skip(self, client, planned))]
    async fn create(&self, client: &GraphClient, planned: Value) -> Result<Value, ProviderError> {
        let plan: GroupState = from_state(planned.clone())?;
        if plan.is_dynamic() && plan.membership_rule.is_none() {
            return Err(ProviderError::Validation(
                "membership_rule is required for dynamic groups".to_string(),
            ));
        }

        let created: Group = client.post("groups", &plan.to_create_body(client)).await?;
        let mut state = GroupState::from_graph(created);
        state.owners = plan.owners;
        state.members = plan.members;
        info!(id = ?state.id, display_name = ?state.display_name, "Created group");

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
        let current: GroupState = from_state(current)?;
        let id = require(&current.id, "id")?;

        let Some(group) = found(fetch_group(client, id).await)? else {
            debug!(id, "Group no longer exists");
            return Ok(None);
        };

        let mut state = GroupState::from_graph(group);
        state.owners = current.owners;
        state.members = current.members;
        Ok(Some(to_state(&state)?))
    }

    #[instrument(skip(self, client, prior, planned))]
    async fn update(
        &self,
        client: &GraphClient,
        prior: Value,
        planned: Value,
    ) -> Result<Value, ProviderError> {
        let before: GroupState = from_state(prior)?;
        let mut after: GroupState = from_state(planned)?;
        let id = require(&before.id, "id")?.to_string();

        let changes = changed_fields(
            &serde_json::to_value(before.to_updatable())?,
            &serde_json::to_value(after.to_updatable())?,
        );
        if changes.is_empty() {
            debug!(id = %id, "No updatable group properties changed");
        } else {
            let fields: Vec<_> = changes.keys().cloned().collect();
            client
                .patch(&format!("groups/{}", segment(&id)), &Value::Object(changes))
                .await?;
            info!(id = %id, ?fields, "Updated group");
        }

        after.id = Some(id);
        to_state(&after)
    }

    #[instrument(skip(self, client, current))]
    async fn delete(&self, client: &GraphClient, current: Value) -> Result<(), ProviderError> {
        let current: GroupState = from_state(current)?;
        let id = require(&current.id, "id")?;
        ignore_not_found(client.delete(&format!("groups/{}", segment(id))).await)?;
        info!(id, "Deleted group");
        Ok(())
    }

    #[instrument(skip(self, client))]
    async fn import(&self, client: &GraphClient, id: &str) -> Result<Value, ProviderError> {
        let group = found(fetch_group(client, id).await)?
            .ok_or_else(|| ProviderError::NotFound(format!("Group '{}' does not exist", id)))?;
        to_state(&GroupState::from_graph(group))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::TokenSource;
    use crate::schema::PlanModifier;
    use secrecy::SecretString;
    use serde_json::json;

    fn client() -> GraphClient {
        GraphClient::new(
            reqwest::Client::new(),
            TokenSource::Static(SecretString::from("t".to_string())),
            "https://graph.microsoft.com/v1.0",
            0,
        )
    }

    #[test]
    fn test_optional_attributes_keep_state() {
        let schema = schema();
        for (name, attr) in &schema.block.attributes {
            if attr.flags.optional {
                assert!(
                    attr.has_plan_modifier(PlanModifier::UseStateForUnconfigured),
                    "{} is missing UseStateForUnconfigured",
                    name
                );
            }
        }
    }

    #[test]
    fn test_replacement_attributes() {
        let schema = schema();
        let mut force_new: Vec<_> = schema
            .block
            .attributes
            .iter()
            .filter(|(_, attr)| attr.force_new)
            .map(|(name, _)| name.as_str())
            .collect();
        force_new.sort();

        assert_eq!(
            force_new,
            vec!["group_types", "is_assignable_to_role", "members", "owners", "visibility"]
        );
    }

    #[test]
    fn test_from_graph() {
        let group: Group = serde_json::from_value(json!({
            "id": "g-1",
            "displayName": "Ops",
            "mailNickname": "ops",
            "mailEnabled": true,
            "securityEnabled": false,
            "groupTypes": ["Unified"],
            "onPremisesSyncEnabled": null,
            "proxyAddresses": ["SMTP:ops@contoso.com"],
            "assignedLabels": [{"labelId": "l-1", "displayName": "Confidential"}]
        }))
        .unwrap();

        let state = GroupState::from_graph(group);

        assert_eq!(state.id.as_deref(), Some("g-1"));
        assert_eq!(state.group_types, Some(vec!["Unified".to_string()]));
        assert_eq!(state.proxy_addresses.as_ref().map(Vec::len), Some(1));
        assert_eq!(
            state.assigned_labels.unwrap()[0].display_name.as_deref(),
            Some("Confidential")
        );
        assert!(state.owners.is_none());
    }

    #[test]
    fn test_state_serializes_every_attribute() {
        let value = to_state(&GroupState::default()).unwrap();
        let schema = schema();
        let object = value.as_object().unwrap();

        assert_eq!(object.len(), schema.block.attributes.len());
        for name in schema.block.attributes.keys() {
            assert!(object.contains_key(name), "state lacks {}", name);
        }
    }

    #[test]
    fn test_create_body_binds_directory_objects() {
        let state = GroupState {
            display_name: Some("Ops".to_string()),
            mail_nickname: Some("ops".to_string()),
            mail_enabled: Some(false),
            security_enabled: Some(true),
            owners: Some(vec!["u-1".to_string()]),
            members: Some(vec![]),
            mail: Some("ignored@contoso.com".to_string()),
            ..Default::default()
        };

        let body = serde_json::to_value(state.to_create_body(&client())).unwrap();

        assert_eq!(
            body,
            json!({
                "displayName": "Ops",
                "mailNickname": "ops",
                "mailEnabled": false,
                "securityEnabled": true,
                "owners@odata.bind": ["https://graph.microsoft.com/v1.0/directoryObjects/u-1"]
            })
        );
    }

    #[test]
    fn test_update_body_only_has_changes() {
        let before = GroupState {
            id: Some("g-1".to_string()),
            display_name: Some("Ops".to_string()),
            description: Some("Operations".to_string()),
            theme: Some("Red".to_string()),
            ..Default::default()
        };
        let after = GroupState {
            display_name: Some("Ops".to_string()),
            description: Some("Site operations".to_string()),
            ..before.clone()
        };
        let after = GroupState { theme: None, ..after };

        let changes = changed_fields(
            &serde_json::to_value(before.to_updatable()).unwrap(),
            &serde_json::to_value(after.to_updatable()).unwrap(),
        );

        assert_eq!(
            Value::Object(changes),
            json!({"description": "Site operations", "theme": null})
        );
    }

    #[test]
    fn test_mail_nickname_rules() {
        assert!(validate_mail_nickname("ops-team_01").is_ok());
        assert!(validate_mail_nickname("").is_err());
        assert!(validate_mail_nickname(&"a".repeat(65)).is_err());
        assert!(validate_mail_nickname(&"a".repeat(64)).is_ok());
        assert!(validate_mail_nickname("ops team").is_err());
        assert!(validate_mail_nickname("ops@team").is_err());
        assert!(validate_mail_nickname("équipe").is_err());
        assert!(validate_mail_nickname("a\\b").is_err());
    }

    #[test]
    fn test_validate_dynamic_group_needs_rule() {
        let resource = GroupResource;

        let diagnostics = resource.validate(&json!({
            "display_name": "All sales",
            "mail_nickname": "allsales",
            "group_types": ["DynamicMembership"]
        }));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute.as_deref(), Some("membership_rule"));

        let diagnostics = resource.validate(&json!({
            "display_name": "All sales",
            "mail_nickname": "allsales",
            "group_types": ["DynamicMembership"],
            "membership_rule": "user.department -eq \"Sales\""
        }));
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_validate_reports_bad_nickname() {
        let diagnostics = GroupResource.validate(&json!({"mail_nickname": "a:b"}));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute.as_deref(), Some("mail_nickname"));
    }
}
