//! Microsoft Graph groups provider
//!
//! A provider plugin that manages Microsoft 365 groups, Microsoft Teams and
//! group memberships through the Microsoft Graph REST API, and looks up
//! existing groups and teams as data sources.
//!
//! # Overview
//!
//! - **Resources**: `msgraph_group`, `msgraph_team`, `msgraph_group_member`
//! - **Data sources**: `msgraph_group`, `msgraph_team`
//! - **Plan modifiers**: optional attributes that Graph fills in carry
//!   [`PlanModifier::UseStateForUnconfigured`](schema::PlanModifier), so
//!   leaving them out of a configuration never produces a diff
//! - **Graph client**: OAuth2 client credentials, retries on throttling and
//!   OData paging
//!
//! # Running
//!
//! ```ignore
//! use msgraph_groups_provider::{init_logging, serve, GraphProvider};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     init_logging();
//!     serve(GraphProvider::new()).await
//! }
//! ```
//!
//! # Handshake Protocol
//!
//! When the provider starts via [`serve`], it writes one line to stdout:
//!
//! ```text
//! MSGRAPH_PROVIDER|1|127.0.0.1:50051
//! ```
//!
//! Format: `MSGRAPH_PROVIDER|<protocol_version>|<address>`. The host connects
//! to that address over gRPC; everything else the provider prints goes to
//! stderr.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod data_sources;
pub mod error;
pub mod graph;
pub mod logging;
pub mod plan;
pub mod provider;
pub mod resources;
pub mod schema;
pub mod server;
pub mod testing;
pub mod types;
pub mod validation;

/// Protocol types generated from `proto/provider.proto`.
#[allow(missing_docs)]
#[allow(clippy::all)]
pub mod generated {
    tonic::include_proto!("msgraph.provider.v1");
}

pub use config::{GraphCloud, GraphConfig};
pub use error::ProviderError;
pub use logging::{init_logging, init_logging_with_default, try_init_logging};
pub use plan::{plan_resource, use_state_for_unconfigured};
pub use provider::GraphProvider;
pub use schema::ProviderSchema;
pub use server::{
    serve, serve_on, serve_on_with_options, serve_with_options, ProviderService, ServeOptions,
};
pub use types::{
    AttributeChange, ImportedResource, PlanResult, ProviderMetadata, ServerCapabilities,
    HANDSHAKE_PREFIX, PROTOCOL_VERSION,
};
pub use validation::{is_valid, validate, validate_result};

pub use async_trait::async_trait;
