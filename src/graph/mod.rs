//! Microsoft Graph access: authentication, HTTP client and resource models.

pub mod auth;
pub mod client;
pub mod error;
pub mod models;

pub use auth::{ClientCredentials, TokenCache, TokenSource};
pub use client::GraphClient;
pub use error::{GraphError, GraphResult};
pub use models::{
    AssignedLabel, DirectoryObject, Group, ODataCollection, ODataError, ODataReference, Team,
    TeamDiscoverySettings, TeamFunSettings, TeamGuestSettings, TeamMemberSettings,
    TeamMessagingSettings,
};

/// Quote a value for an OData `$filter` string literal.
///
/// ```
/// use msgraph_groups_provider::graph::odata_string;
///
/// assert_eq!(odata_string("O'Brien"), "'O''Brien'");
/// ```
pub fn odata_string(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}
