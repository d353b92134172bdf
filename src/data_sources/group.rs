//! `msgraph_group` data source.

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, instrument};

use super::{filter_path, lookup_key, lookup_schema, single, DataSourceHandler};
use crate::error::ProviderError;
use crate::graph::{DirectoryObject, GraphClient, Group};
use crate::resources::group::{self as resource, fetch_group, GroupState, SELECT};
use crate::resources::{found, segment, to_state};
use crate::schema::{Diagnostic, Schema};

const LOOKUP_KEYS: [&str; 3] = ["id", "display_name", "mail_nickname"];

/// Look up a group by id, display name or mail nickname.
#[derive(Debug, Default)]
pub struct GroupDataSource;

async fn object_ids(client: &GraphClient, path: String) -> Result<Vec<String>, ProviderError> {
    let objects: Vec<DirectoryObject> = client.get_collection(&path).await?;
    Ok(objects.into_iter().filter_map(|o| o.id).collect())
}

#[async_trait]
impl DataSourceHandler for GroupDataSource {
    fn type_name(&self) -> &'static str {
        resource::TYPE_NAME
    }

    fn schema(&self) -> Schema {
        lookup_schema(resource::schema(), &LOOKUP_KEYS)
    }

    fn validate(&self, config: &Value) -> Vec<Diagnostic> {
        lookup_key(config, &LOOKUP_KEYS).err().unwrap_or_default()
    }

    #[instrument(skip(self, client, config))]
    async fn read(&self, client: &GraphClient, config: Value) -> Result<Value, ProviderError> {
        let (key, value) = lookup_key(&config, &LOOKUP_KEYS).map_err(|diagnostics| {
            ProviderError::Validation(
                diagnostics
                    .into_iter()
                    .next()
                    .and_then(|d| d.detail)
                    .unwrap_or_default(),
            )
        })?;
        debug!(key, value, "Looking up group");

        let group = match key {
            "id" => found(fetch_group(client, value).await)?
                .ok_or_else(|| ProviderError::NotFound(format!("Group '{}' does not exist", value)))?,
            _ => {
                let property = if key == "display_name" {
                    "displayName"
                } else {
                    "mailNickname"
                };
                let path = format!("{}&$select={}", filter_path("groups", property, value), SELECT);
                let matches: Vec<Group> = client.get_collection(&path).await?;
                single(matches, &format!("groups with {} '{}'", key, value))?
            },
        };

        let mut state = GroupState::from_graph(group);
        if let Some(id) = state.id.clone() {
            let id = segment(&id);
            state.owners = Some(object_ids(client, format!("groups/{}/owners?$select=id", id)).await?);
            state.members =
                Some(object_ids(client, format!("groups/{}/members?$select=id", id)).await?);
        }
        to_state(&state)
    }
}
