//! `msgraph_team` data source.

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, instrument};

use super::{filter_path, lookup_key, lookup_schema, single, DataSourceHandler};
use crate::error::ProviderError;
use crate::graph::{GraphClient, Team};
use crate::resources::team::{self as resource, fetch_team, TeamState};
use crate::resources::{found, to_state};
use crate::schema::{Diagnostic, Schema};

const LOOKUP_KEYS: [&str; 2] = ["id", "display_name"];

/// Look up a team by id or display name.
#[derive(Debug, Default)]
pub struct TeamDataSource;

#[async_trait]
impl DataSourceHandler for TeamDataSource {
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
        debug!(key, value, "Looking up team");

        let id = match key {
            "id" => value.to_string(),
            _ => {
                let matches: Vec<Team> = client
                    .get_collection(&filter_path("teams", "displayName", value))
                    .await?;
                single(matches, &format!("teams with display_name '{}'", value))?
                    .id
                    .ok_or_else(|| ProviderError::Internal("Team listing without id".to_string()))?
            },
        };

        // The listing only carries a few properties; fetch the full team.
        let team = found(fetch_team(client, &id).await)?
            .ok_or_else(|| ProviderError::NotFound(format!("Team '{}' does not exist", id)))?;
        to_state(&TeamState::from_graph(team))
    }
}
