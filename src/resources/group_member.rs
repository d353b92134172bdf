//! `msgraph_group_member`: one membership link between a group and a
//! directory object.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, instrument};

use super::{found, from_state, ignore_not_found, require, segment, to_state, ResourceHandler};
use crate::error::ProviderError;
use crate::graph::{DirectoryObject, GraphClient, ODataReference};
use crate::schema::{Attribute, Schema};

/// Resource type name.
pub const TYPE_NAME: &str = "msgraph_group_member";

/// Flat state of `msgraph_group_member`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupMemberState {
    /// `<group_id>/<member_object_id>`.
    pub id: Option<String>,
    /// Group object id.
    pub group_id: Option<String>,
    /// Member object id (user, group, device or service principal).
    pub member_object_id: Option<String>,
}

impl GroupMemberState {
    /// State for a membership link.
    pub fn new(group_id: &str, member_object_id: &str) -> Self {
        Self {
            id: Some(member_id(group_id, member_object_id)),
            group_id: Some(group_id.to_string()),
            member_object_id: Some(member_object_id.to_string()),
        }
    }
}

/// Compose the resource id.
pub fn member_id(group_id: &str, member_object_id: &str) -> String {
    format!("{}/{}", group_id, member_object_id)
}

/// Split a resource id into group id and member object id.
pub fn parse_member_id(id: &str) -> Result<(&str, &str), ProviderError> {
    match id.split_once('/') {
        Some((group, member))
            if !group.is_empty() && !member.is_empty() && !member.contains('/') =>
        {
            Ok((group, member))
        },
        _ => Err(ProviderError::InvalidRequest(format!(
            "Expected '<group_id>/<member_object_id>', got '{}'",
            id
        ))),
    }
}

/// Schema of `msgraph_group_member`.
pub fn schema() -> Schema {
    Schema::v0()
        .with_attribute(
            "id",
            Attribute::computed_string().with_description("`<group_id>/<member_object_id>`."),
        )
        .with_attribute(
            "group_id",
            Attribute::required_string()
                .with_force_new()
                .with_description("Object id of the group."),
        )
        .with_attribute(
            "member_object_id",
            Attribute::required_string()
                .with_force_new()
                .with_description("Object id of the user, group, device or service principal to add."),
        )
}

async fn lookup(
    client: &GraphClient,
    group_id: &str,
    member_object_id: &str,
) -> Result<Option<DirectoryObject>, ProviderError> {
    found(
        client
            .get(&format!(
                "groups/{}/members/{}?$select=id",
                segment(group_id),
                segment(member_object_id)
            ))
            .await,
    )
}

/// Handler for `msgraph_group_member`.
#[derive(Debug, Default)]
pub struct GroupMemberResource;

#[async_trait]
impl ResourceHandler for GroupMemberResource {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn schema(&self) -> Schema {
        schema()
    }

    #[instrument(skip(self, client, planned))]
    async fn create(&self, client: &GraphClient, planned: Value) -> Result<Value, ProviderError> {
        let plan: GroupMemberState = from_state(planned)?;
        let group_id = require(&plan.group_id, "group_id")?;
        let member = require(&plan.member_object_id, "member_object_id")?;

        let reference = ODataReference {
            odata_id: client.directory_object_url(member),
        };
        client
            .post_no_content(&format!("groups/{}/members/$ref", segment(group_id)), &reference)
            .await?;
        info!(group_id, member, "Added group member");

        to_state(&GroupMemberState::new(group_id, member))
    }

    #[instrument(skip(self, client, current))]
    async fn read(
        &self,
        client: &GraphClient,
        current: Value,
    ) -> Result<Option<Value>, ProviderError> {
        let current: GroupMemberState = from_state(current)?;
        let (group_id, member) = match (&current.group_id, &current.member_object_id) {
            (Some(g), Some(m)) => (g.as_str(), m.as_str()),
            _ => parse_member_id(require(&current.id, "id")?)?,
        };

        if lookup(client, group_id, member).await?.is_none() {
            debug!(group_id, member, "Membership no longer exists");
            return Ok(None);
        }
        Ok(Some(to_state(&GroupMemberState::new(group_id, member))?))
    }

    async fn update(
        &self,
        _client: &GraphClient,
        prior: Value,
        planned: Value,
    ) -> Result<Value, ProviderError> {
        // Both inputs force replacement, so there is nothing to send.
        let prior: GroupMemberState = from_state(prior)?;
        let mut planned: GroupMemberState = from_state(planned)?;
        if planned.id.is_none() {
            planned.id = prior.id;
        }
        to_state(&planned)
    }

    #[instrument(skip(self, client, current))]
    async fn delete(&self, client: &GraphClient, current: Value) -> Result<(), ProviderError> {
        let current: GroupMemberState = from_state(current)?;
        let group_id = require(&current.group_id, "group_id")?;
        let member = require(&current.member_object_id, "member_object_id")?;

        ignore_not_found(
            client
                .delete(&format!(
                    "groups/{}/members/{}/$ref",
                    segment(group_id),
                    segment(member)
                ))
                .await,
        )?;
        info!(group_id, member, "Removed group member");
        Ok(())
    }

    #[instrument(skip(self, client))]
    async fn import(&self, client: &GraphClient, id: &str) -> Result<Value, ProviderError> {
        let (group_id, member) = parse_member_id(id)?;
        if lookup(client, group_id, member).await?.is_none() {
            return Err(ProviderError::NotFound(format!(
                "'{}' is not a member of group '{}'",
                member, group_id
            )));
        }
        to_state(&GroupMemberState::new(group_id, member))
    }
}
