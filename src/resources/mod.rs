//! Managed resources.
//!
//! Each resource pairs a schema with a flat state struct and converters
//! between that state and the Graph model it transcribes.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::ProviderError;
use crate::graph::{GraphClient, GraphError};
use crate::schema::{Diagnostic, Schema};

pub mod group;
pub mod group_member;
pub mod team;

pub use group::{GroupResource, GroupState};
pub use group_member::{GroupMemberResource, GroupMemberState};
pub use team::{TeamResource, TeamState};

/// CRUD operations of one resource type against Microsoft Graph.
#[async_trait]
pub trait ResourceHandler: Send + Sync {
    /// Type name, e.g. `msgraph_group`.
    fn type_name(&self) -> &'static str;

    /// Resource schema.
    fn schema(&self) -> Schema;

    /// Checks beyond what the schema expresses. Runs after schema validation.
    fn validate(&self, config: &Value) -> Vec<Diagnostic> {
        let _ = config;
        Vec::new()
    }

    /// Create the object and return its state.
    async fn create(&self, client: &GraphClient, planned: Value) -> Result<Value, ProviderError>;

    /// Refresh the state. `None` when the object no longer exists.
    async fn read(&self, client: &GraphClient, current: Value)
        -> Result<Option<Value>, ProviderError>;

    /// Apply the planned state and return the new state.
    async fn update(
        &self,
        client: &GraphClient,
        prior: Value,
        planned: Value,
    ) -> Result<Value, ProviderError>;

    /// Delete the object. Already-deleted objects are not an error.
    async fn delete(&self, client: &GraphClient, current: Value) -> Result<(), ProviderError>;

    /// Build the state of an existing object from its import id.
    async fn import(&self, client: &GraphClient, id: &str) -> Result<Value, ProviderError>;
}

/// Decode a state or configuration value into a typed struct.
pub(crate) fn from_state<T: DeserializeOwned + Default>(value: Value) -> Result<T, ProviderError> {
    if value.is_null() {
        return Ok(T::default());
    }
    Ok(serde_json::from_value(value)?)
}

/// Encode a typed struct as a state value.
pub(crate) fn to_state<T: Serialize>(state: &T) -> Result<Value, ProviderError> {
    Ok(serde_json::to_value(state)?)
}

/// Return a required identifier from state, or a validation error naming it.
pub(crate) fn require<'a>(value: &'a Option<String>, name: &str) -> Result<&'a str, ProviderError> {
    value
        .as_deref()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ProviderError::Validation(format!("Missing required attribute '{}'", name)))
}

/// Encode one path segment.
pub(crate) fn segment(id: &str) -> String {
    urlencoding::encode(id).into_owned()
}

/// Map a Graph 404 to `None`.
pub(crate) fn found<T>(result: Result<T, GraphError>) -> Result<Option<T>, ProviderError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Treat a Graph 404 as success.
pub(crate) fn ignore_not_found(result: Result<(), GraphError>) -> Result<(), ProviderError> {
    found(result).map(|_| ())
}

/// Top-level keys of a serialized Graph model whose value differs.
///
/// Keys present in `prior` but missing from `planned` are sent as `null` so
/// that Graph clears them.
pub(crate) fn changed_fields(prior: &Value, planned: &Value) -> Map<String, Value> {
    let empty = Map::new();
    let prior = prior.as_object().unwrap_or(&empty);
    let planned = planned.as_object().unwrap_or(&empty);

    let mut changes = Map::new();
    for (key, value) in planned {
        if prior.get(key) != Some(value) {
            changes.insert(key.clone(), value.clone());
        }
    }
    for key in prior.keys() {
        if !planned.contains_key(key) {
            changes.insert(key.clone(), Value::Null);
        }
    }
    changes
}

/// Fill attributes Graph left out of a response with the planned values.
///
/// Create responses do not always echo every property that was sent.
pub(crate) fn fill_unset(state: &mut Value, planned: &Value) {
    let (Some(state), Some(planned)) = (state.as_object_mut(), planned.as_object()) else {
        return;
    };
    for (key, value) in planned {
        if value.is_null() {
            continue;
        }
        let entry = state.entry(key.clone()).or_insert(Value::Null);
        if entry.is_null() {
            *entry = value.clone();
        }
    }
}
