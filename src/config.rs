//! Provider configuration.
//!
//! The host sends the `provider` block as JSON. Unset credentials fall back to
//! `MSGRAPH_*` environment variables so that secrets can stay out of
//! configuration files.

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ProviderError;
use crate::schema::{Attribute, AttributeType, AttributeFlags, Diagnostic, Schema};

/// Environment variable holding the tenant id.
pub const ENV_TENANT_ID: &str = "MSGRAPH_TENANT_ID";
/// Environment variable holding the application (client) id.
pub const ENV_CLIENT_ID: &str = "MSGRAPH_CLIENT_ID";
/// Environment variable holding the client secret.
pub const ENV_CLIENT_SECRET: &str = "MSGRAPH_CLIENT_SECRET";
/// Environment variable holding a pre-acquired access token.
pub const ENV_ACCESS_TOKEN: &str = "MSGRAPH_ACCESS_TOKEN";

/// Graph API versions this provider speaks.
pub const API_VERSIONS: [&str; 2] = ["v1.0", "beta"];

const DEFAULT_MAX_RETRIES: u32 = 3;

/// Microsoft national cloud to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GraphCloud {
    /// Global Azure.
    #[default]
    Public,
    /// Azure US Government (GCC High).
    UsGovernment,
    /// Azure US Government DoD.
    UsGovernmentDod,
    /// Azure China (21Vianet).
    China,
}

impl GraphCloud {
    /// Names accepted in configuration.
    pub const NAMES: [&'static str; 4] = ["public", "usgovernment", "usgovernmentdod", "china"];

    /// Parse a configuration value. Only the exact names in [`Self::NAMES`]
    /// are accepted, matching the schema's allowed values.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "public" => Some(Self::Public),
            "usgovernment" => Some(Self::UsGovernment),
            "usgovernmentdod" => Some(Self::UsGovernmentDod),
            "china" => Some(Self::China),
            _ => None,
        }
    }

    /// Microsoft Graph root for this cloud.
    pub fn graph_endpoint(&self) -> &'static str {
        match self {
            Self::Public => "https://graph.microsoft.com",
            Self::UsGovernment => "https://graph.microsoft.us",
            Self::UsGovernmentDod => "https://dod-graph.microsoft.us",
            Self::China => "https://microsoftgraph.chinacloudapi.cn",
        }
    }

    /// Entra ID token authority for this cloud.
    pub fn login_endpoint(&self) -> &'static str {
        match self {
            Self::Public => "https://login.microsoftonline.com",
            Self::UsGovernment | Self::UsGovernmentDod => "https://login.microsoftonline.us",
            Self::China => "https://login.chinacloudapi.cn",
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawGraphConfig {
    tenant_id: Option<String>,
    client_id: Option<String>,
    client_secret: Option<String>,
    access_token: Option<String>,
    cloud: Option<String>,
    api_version: Option<String>,
    graph_endpoint: Option<String>,
    login_endpoint: Option<String>,
    max_retries: Option<u32>,
}

/// Resolved provider configuration.
#[derive(Debug)]
pub struct GraphConfig {
    /// Directory (tenant) id.
    pub tenant_id: Option<String>,
    /// Application (client) id.
    pub client_id: Option<String>,
    /// Client secret for the client-credentials flow.
    pub client_secret: Option<SecretString>,
    /// Static bearer token; takes precedence over client credentials.
    pub access_token: Option<SecretString>,
    /// National cloud.
    pub cloud: GraphCloud,
    /// Graph API version segment.
    pub api_version: String,
    /// Override of the Graph root (without version).
    pub graph_endpoint: Option<String>,
    /// Override of the token authority.
    pub login_endpoint: Option<String>,
    /// Retries for throttled or transient responses.
    pub max_retries: u32,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            tenant_id: None,
            client_id: None,
            client_secret: None,
            access_token: None,
            cloud: GraphCloud::default(),
            api_version: API_VERSIONS[0].to_string(),
            graph_endpoint: None,
            login_endpoint: None,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

impl GraphConfig {
    /// Parse the provider block, falling back to the process environment.
    pub fn from_value(value: &Value) -> Result<Self, ProviderError> {
        Self::from_value_with_env(value, |key| std::env::var(key).ok())
    }

    /// Parse the provider block with an explicit environment lookup.
    pub fn from_value_with_env<F>(value: &Value, env: F) -> Result<Self, ProviderError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let raw: RawGraphConfig = if value.is_null() {
            RawGraphConfig::default()
        } else {
            serde_json::from_value(value.clone()).map_err(|e| {
                ProviderError::Configuration(format!("Invalid provider configuration: {}", e))
            })?
        };

        let lookup = |configured: Option<String>, key: &str| {
            configured
                .filter(|v| !v.is_empty())
                .or_else(|| env(key).filter(|v| !v.is_empty()))
        };

        let cloud = match raw.cloud.as_deref() {
            None | Some("") => GraphCloud::default(),
            Some(name) => GraphCloud::parse(name).ok_or_else(|| {
                ProviderError::Configuration(format!(
                    "Unknown cloud '{}', expected one of: {}",
                    name,
                    GraphCloud::NAMES.join(", ")
                ))
            })?,
        };

        Ok(Self {
            tenant_id: lookup(raw.tenant_id, ENV_TENANT_ID),
            client_id: lookup(raw.client_id, ENV_CLIENT_ID),
            client_secret: lookup(raw.client_secret, ENV_CLIENT_SECRET).map(SecretString::from),
            access_token: lookup(raw.access_token, ENV_ACCESS_TOKEN).map(SecretString::from),
            cloud,
            api_version: raw
                .api_version
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| API_VERSIONS[0].to_string()),
            graph_endpoint: raw.graph_endpoint.filter(|v| !v.is_empty()),
            login_endpoint: raw.login_endpoint.filter(|v| !v.is_empty()),
            max_retries: raw.max_retries.unwrap_or(DEFAULT_MAX_RETRIES),
        })
    }

    /// Check that the configuration is usable.
    pub fn validate(&self) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();

        if !API_VERSIONS.contains(&self.api_version.as_str()) {
            diagnostics.push(
                Diagnostic::error(format!("Unsupported api_version '{}'", self.api_version))
                    .with_detail(format!("Expected one of: {}", API_VERSIONS.join(", ")))
                    .with_attribute("api_version"),
            );
        }

        if self.access_token.is_none() {
            let missing: Vec<_> = [
                ("tenant_id", self.tenant_id.is_none(), ENV_TENANT_ID),
                ("client_id", self.client_id.is_none(), ENV_CLIENT_ID),
                ("client_secret", self.client_secret.is_none(), ENV_CLIENT_SECRET),
            ]
            .into_iter()
            .filter(|(_, missing, _)| *missing)
            .collect();

            for (attribute, _, env) in missing {
                diagnostics.push(
                    Diagnostic::error(format!("Missing provider credential '{}'", attribute))
                        .with_detail(format!(
                            "Set '{}' or {} (or provide access_token / {})",
                            attribute, env, ENV_ACCESS_TOKEN
                        ))
                        .with_attribute(attribute),
                );
            }
        }

        if let Some(endpoint) = &self.graph_endpoint {
            if let Err(e) = url::Url::parse(endpoint) {
                diagnostics.push(
                    Diagnostic::error("Invalid graph_endpoint")
                        .with_detail(e.to_string())
                        .with_attribute("graph_endpoint"),
                );
            }
        }

        diagnostics
    }

    /// Graph root including the version segment, e.g. `https://graph.microsoft.com/v1.0`.
    pub fn graph_base_url(&self) -> String {
        format!("{}/{}", self.graph_root(), self.api_version)
    }

    /// Graph root without the version segment; also the token audience.
    pub fn graph_root(&self) -> &str {
        self.graph_endpoint
            .as_deref()
            .unwrap_or_else(|| self.cloud.graph_endpoint())
            .trim_end_matches('/')
    }

    /// Token authority root.
    pub fn login_base_url(&self) -> String {
        self.login_endpoint
            .as_deref()
            .unwrap_or_else(|| self.cloud.login_endpoint())
            .trim_end_matches('/')
            .to_string()
    }

    /// Schema of the `provider` configuration block.
    pub fn schema() -> Schema {
        Schema::v0()
            .with_attribute(
                "tenant_id",
                Attribute::optional_string().with_description(format!(
                    "Directory (tenant) id. Defaults to {}.",
                    ENV_TENANT_ID
                )),
            )
            .with_attribute(
                "client_id",
                Attribute::optional_string().with_description(format!(
                    "Application (client) id. Defaults to {}.",
                    ENV_CLIENT_ID
                )),
            )
            .with_attribute(
                "client_secret",
                Attribute::optional_string()
                    .sensitive()
                    .with_description(format!("Client secret. Defaults to {}.", ENV_CLIENT_SECRET)),
            )
            .with_attribute(
                "access_token",
                Attribute::optional_string().sensitive().with_description(format!(
                    "Pre-acquired bearer token used instead of client credentials. Defaults to {}.",
                    ENV_ACCESS_TOKEN
                )),
            )
            .with_attribute(
                "cloud",
                Attribute::optional_string()
                    .with_allowed_values(GraphCloud::NAMES)
                    .with_default(Value::String("public".into()))
                    .with_description("National cloud hosting the tenant."),
            )
            .with_attribute(
                "api_version",
                Attribute::optional_string()
                    .with_allowed_values(API_VERSIONS)
                    .with_default(Value::String(API_VERSIONS[0].into()))
                    .with_description("Microsoft Graph API version."),
            )
            .with_attribute(
                "graph_endpoint",
                Attribute::optional_string().with_description("Override of the Graph endpoint."),
            )
            .with_attribute(
                "login_endpoint",
                Attribute::optional_string().with_description("Override of the token authority."),
            )
            .with_attribute(
                "max_retries",
                Attribute::new(AttributeType::Int64, AttributeFlags::optional())
                    .with_default(Value::from(DEFAULT_MAX_RETRIES))
                    .with_description("Retries for throttled (429) or transient (5xx) responses."),
            )
    }
}
