//! The Microsoft Graph groups provider.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

use crate::config::GraphConfig;
use crate::data_sources::{DataSourceHandler, GroupDataSource, TeamDataSource};
use crate::error::ProviderError;
use crate::graph::GraphClient;
use crate::plan::plan_resource;
use crate::resources::{GroupMemberResource, GroupResource, ResourceHandler, TeamResource};
use crate::schema::{Diagnostic, DiagnosticSeverity, ProviderSchema};
use crate::server::ProviderService;
use crate::types::{ImportedResource, PlanResult};
use crate::validation::validate;

/// Provider exposing Microsoft Graph groups, teams and group memberships.
pub struct GraphProvider {
    resources: HashMap<&'static str, Arc<dyn ResourceHandler>>,
    data_sources: HashMap<&'static str, Arc<dyn DataSourceHandler>>,
    client: RwLock<Option<Arc<GraphClient>>>,
}

impl Default for GraphProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for GraphProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut resources: Vec<_> = self.resources.keys().collect();
        resources.sort();
        let mut data_sources: Vec<_> = self.data_sources.keys().collect();
        data_sources.sort();
        f.debug_struct("GraphProvider")
            .field("resources", &resources)
            .field("data_sources", &data_sources)
            .finish_non_exhaustive()
    }
}

impl GraphProvider {
    /// Provider with every built-in resource and data source registered.
    pub fn new() -> Self {
        Self::empty()
            .with_resource(GroupResource)
            .with_resource(TeamResource)
            .with_resource(GroupMemberResource)
            .with_data_source(GroupDataSource)
            .with_data_source(TeamDataSource)
    }

    /// Provider with nothing registered.
    pub fn empty() -> Self {
        Self {
            resources: HashMap::new(),
            data_sources: HashMap::new(),
            client: RwLock::new(None),
        }
    }

    /// Register a resource handler under its type name.
    pub fn with_resource(mut self, handler: impl ResourceHandler + 'static) -> Self {
        self.resources.insert(handler.type_name(), Arc::new(handler));
        self
    }

    /// Register a data source handler under its type name.
    pub fn with_data_source(mut self, handler: impl DataSourceHandler + 'static) -> Self {
        self.data_sources.insert(handler.type_name(), Arc::new(handler));
        self
    }

    /// Use an already built client instead of waiting for `configure`.
    pub fn with_client(self, client: GraphClient) -> Self {
        Self {
            client: RwLock::new(Some(Arc::new(client))),
            ..self
        }
    }

    fn resource(&self, type_name: &str) -> Result<&Arc<dyn ResourceHandler>, ProviderError> {
        self.resources
            .get(type_name)
            .ok_or_else(|| ProviderError::UnknownResource(type_name.to_string()))
    }

    fn data_source(&self, type_name: &str) -> Result<&Arc<dyn DataSourceHandler>, ProviderError> {
        self.data_sources.get(type_name).ok_or_else(|| {
            ProviderError::UnknownResource(format!("data source {}", type_name))
        })
    }

    async fn client(&self) -> Result<Arc<GraphClient>, ProviderError> {
        self.client.read().await.clone().ok_or_else(|| {
            ProviderError::Configuration("Provider has not been configured".to_string())
        })
    }
}

fn has_errors(diagnostics: &[Diagnostic]) -> bool {
    diagnostics
        .iter()
        .any(|d| d.severity == DiagnosticSeverity::Error)
}

#[async_trait::async_trait]
impl ProviderService for GraphProvider {
    fn schema(&self) -> ProviderSchema {
        let mut schema = ProviderSchema::new().with_provider_config(GraphConfig::schema());
        for (name, handler) in &self.resources {
            schema = schema.with_resource(*name, handler.schema());
        }
        for (name, handler) in &self.data_sources {
            schema = schema.with_data_source(*name, handler.schema());
        }
        schema
    }

    async fn validate_provider_config(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        let mut diagnostics = validate(&GraphConfig::schema(), &config);
        if !has_errors(&diagnostics) {
            diagnostics.extend(GraphConfig::from_value(&config)?.validate());
        }
        Ok(diagnostics)
    }

    #[instrument(skip(self, config))]
    async fn configure(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        let config = GraphConfig::from_value(&config)?;
        let diagnostics = config.validate();
        if has_errors(&diagnostics) {
            warn!(errors = diagnostics.len(), "Provider configuration is invalid");
            return Ok(diagnostics);
        }

        let client = GraphClient::from_config(&config)?;
        info!(
            endpoint = %client.base_url(),
            cloud = ?config.cloud,
            static_token = config.access_token.is_some(),
            "Configured Microsoft Graph client"
        );
        *self.client.write().await = Some(Arc::new(client));
        Ok(diagnostics)
    }

    async fn stop(&self) -> Result<(), ProviderError> {
        self.client.write().await.take();
        debug!("Dropped Graph client");
        Ok(())
    }

    async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let handler = self.resource(resource_type)?;
        let mut diagnostics = validate(&handler.schema(), &config);
        diagnostics.extend(handler.validate(&config));
        Ok(diagnostics)
    }

    async fn plan(
        &self,
        resource_type: &str,
        prior_state: Option<Value>,
        proposed_state: Value,
        config: Value,
    ) -> Result<PlanResult, ProviderError> {
        let handler = self.resource(resource_type)?;
        Ok(plan_resource(
            &handler.schema(),
            prior_state,
            proposed_state,
            &config,
        ))
    }

    async fn create(&self, resource_type: &str, planned_state: Value) -> Result<Value, ProviderError> {
        let handler = self.resource(resource_type)?;
        let client = self.client().await?;
        handler.create(&client, planned_state).await
    }

    async fn read(&self, resource_type: &str, current_state: Value) -> Result<Value, ProviderError> {
        let handler = self.resource(resource_type)?;
        let client = self.client().await?;
        // A vanished object reads as null so the host plans to recreate it.
        Ok(handler
            .read(&client, current_state)
            .await?
            .unwrap_or(Value::Null))
    }

    async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        let handler = self.resource(resource_type)?;
        let client = self.client().await?;
        handler.update(&client, prior_state, planned_state).await
    }

    async fn delete(&self, resource_type: &str, current_state: Value) -> Result<(), ProviderError> {
        let handler = self.resource(resource_type)?;
        let client = self.client().await?;
        handler.delete(&client, current_state).await
    }

    async fn import_resource(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        let handler = self.resource(resource_type)?;
        let client = self.client().await?;
        let state = handler.import(&client, id).await?;
        Ok(vec![ImportedResource::new(resource_type, state)])
    }

    async fn validate_data_source_config(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let handler = self.data_source(data_source_type)?;
        let mut diagnostics = validate(&handler.schema(), &config);
        diagnostics.extend(handler.validate(&config));
        Ok(diagnostics)
    }

    async fn read_data_source(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Value, ProviderError> {
        let handler = self.data_source(data_source_type)?;
        let client = self.client().await?;
        handler.read(&client, config).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn test_schema_lists_everything() {
        let schema = GraphProvider::new().schema();

        let mut resources: Vec<_> = schema.resources.keys().cloned().collect();
        resources.sort();
        assert_eq!(
            resources,
            vec!["msgraph_group", "msgraph_group_member", "msgraph_team"]
        );

        let mut data_sources: Vec<_> = schema.data_sources.keys().cloned().collect();
        data_sources.sort();
        assert_eq!(data_sources, vec!["msgraph_group", "msgraph_team"]);

        assert!(schema.provider.block.attributes.contains_key("client_secret"));
    }

    #[tokio::test]
    async fn test_unknown_resource() {
        let provider = GraphProvider::new();
        let err = provider
            .plan("msgraph_user", None, json!({}), json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::UnknownResource(ref t) if t == "msgraph_user"));
    }

    #[tokio::test]
    async fn test_operations_need_configuration() {
        let provider = GraphProvider::new();
        let err = assert_err!(provider.read("msgraph_group", json!({"id": "g-1"})).await);
        assert!(matches!(err, ProviderError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_configure_rejects_bad_api_version() {
        let provider = GraphProvider::new();
        let diagnostics = provider
            .configure(json!({"access_token": "token", "api_version": "v2.0"}))
            .await
            .unwrap();

        assert!(has_errors(&diagnostics));
        assert!(provider.client().await.is_err());
    }

    #[tokio::test]
    async fn test_cloud_name_checked_the_same_way_by_validate_and_configure() {
        let provider = GraphProvider::new();
        let config = json!({"access_token": "token", "cloud": "Public"});

        let diagnostics = assert_ok!(provider.validate_provider_config(config.clone()).await);
        assert!(has_errors(&diagnostics));
        assert_err!(provider.configure(config).await);

        let config = json!({"access_token": "token", "cloud": "public"});
        let diagnostics = assert_ok!(provider.validate_provider_config(config.clone()).await);
        assert!(!has_errors(&diagnostics));
        assert!(!has_errors(&assert_ok!(provider.configure(config).await)));
    }

    #[tokio::test]
    async fn test_configure_with_access_token() {
        let provider = GraphProvider::new();
        let diagnostics = provider
            .configure(json!({
                "access_token": "token",
                "graph_endpoint": "http://127.0.0.1:1",
                "api_version": "beta"
            }))
            .await
            .unwrap();

        assert!(diagnostics.is_empty());
        let client = assert_ok!(provider.client().await);
        assert_eq!(client.base_url(), "http://127.0.0.1:1/beta");

        assert_ok!(provider.stop().await);
        assert_err!(provider.client().await);
    }

    #[tokio::test]
    async fn test_validate_resource_config_combines_checks() {
        let provider = GraphProvider::new();
        let diagnostics = provider
            .validate_resource_config(
                "msgraph_group",
                json!({
                    "display_name": "Ops",
                    "mail_nickname": "ops team",
                    "mail_enabled": false,
                    "security_enabled": true,
                    "visibility": "Secret"
                }),
            )
            .await
            .unwrap();

        let attributes: Vec<_> = diagnostics
            .iter()
            .filter_map(|d| d.attribute.as_deref())
            .collect();
        assert!(attributes.contains(&"visibility"));
        assert!(attributes.contains(&"mail_nickname"));
    }

    #[tokio::test]
    async fn test_validate_data_source_config() {
        let provider = GraphProvider::new();
        assert!(provider
            .validate_data_source_config("msgraph_group", json!({"mail_nickname": "ops"}))
            .await
            .unwrap()
            .is_empty());
        assert!(has_errors(
            &provider
                .validate_data_source_config("msgraph_team", json!({}))
                .await
                .unwrap()
        ));
    }
}
