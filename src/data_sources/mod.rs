//! Data sources: read-only lookups of existing groups and teams.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::ProviderError;
use crate::graph::{odata_string, GraphClient};
use crate::schema::{AttributeFlags, Diagnostic, Schema};

pub mod group;
pub mod team;

pub use group::GroupDataSource;
pub use team::TeamDataSource;

/// Read-only lookup of one object type.
#[async_trait]
pub trait DataSourceHandler: Send + Sync {
    /// Type name, e.g. `msgraph_group`.
    fn type_name(&self) -> &'static str;

    /// Data source schema.
    fn schema(&self) -> Schema;

    /// Check the lookup arguments.
    fn validate(&self, config: &Value) -> Vec<Diagnostic>;

    /// Resolve the lookup and return the full state of the match.
    async fn read(&self, client: &GraphClient, config: Value) -> Result<Value, ProviderError>;
}

/// Derive a data source schema from a resource schema.
///
/// Every attribute becomes computed; `lookup_keys` become optional and
/// computed. Plan modifiers and replacement flags do not apply to reads.
pub fn lookup_schema(resource: Schema, lookup_keys: &[&str]) -> Schema {
    let mut schema = resource;
    for (name, attr) in schema.block.attributes.iter_mut() {
        attr.flags = if lookup_keys.contains(&name.as_str()) {
            AttributeFlags::optional_computed()
        } else {
            AttributeFlags::computed()
        };
        attr.force_new = false;
        attr.plan_modifiers.clear();
        attr.allowed_values = None;
        attr.default = None;
    }
    schema
}

/// The single lookup key set in `config`, with its value.
pub(crate) fn lookup_key<'a>(
    config: &'a Value,
    lookup_keys: &[&'static str],
) -> Result<(&'static str, &'a str), Vec<Diagnostic>> {
    let set: Vec<(&'static str, &'a str)> = lookup_keys
        .iter()
        .filter_map(|key| {
            config
                .get(*key)
                .and_then(Value::as_str)
                .filter(|v| !v.is_empty())
                .map(|v| (*key, v))
        })
        .collect();

    match set.as_slice() {
        [only] => Ok(*only),
        [] => Err(vec![Diagnostic::error("No lookup argument set")
            .with_detail(format!("Set exactly one of: {}", lookup_keys.join(", ")))]),
        _ => Err(set
            .iter()
            .map(|(key, _)| {
                Diagnostic::error("Conflicting lookup arguments")
                    .with_detail(format!("Set exactly one of: {}", lookup_keys.join(", ")))
                    .with_attribute(*key)
            })
            .collect()),
    }
}

/// `<collection>?$filter=<property> eq '<value>'`, URL-encoded.
pub(crate) fn filter_path(collection: &str, property: &str, value: &str) -> String {
    let filter = format!("{} eq {}", property, odata_string(value));
    format!("{}?$filter={}", collection, urlencoding::encode(&filter))
}

/// Require exactly one match.
pub(crate) fn single<T>(mut matches: Vec<T>, what: &str) -> Result<T, ProviderError> {
    match matches.len() {
        1 => Ok(matches.remove(0)),
        0 => Err(ProviderError::NotFound(format!("No {} matched", what))),
        n => Err(ProviderError::FailedPrecondition(format!(
            "{} {} matched, expected exactly one",
            n, what
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Attribute, PlanModifier};
    use serde_json::json;

    #[test]
    fn test_lookup_schema() {
        let resource = Schema::v0()
            .with_attribute("id", Attribute::computed_string())
            .with_attribute("display_name", Attribute::required_string())
            .with_attribute(
                "visibility",
                Attribute::optional_string()
                    .with_allowed_values(["Public", "Private"])
                    .use_state_for_unconfigured()
                    .with_force_new(),
            );

        let schema = lookup_schema(resource, &["id", "display_name"]);

        let id = &schema.block.attributes["id"];
        assert!(id.flags.optional && id.flags.computed);
        let visibility = &schema.block.attributes["visibility"];
        assert!(visibility.is_computed_only());
        assert!(!visibility.force_new);
        assert!(!visibility.has_plan_modifier(PlanModifier::UseStateForUnconfigured));
        assert!(visibility.allowed_values.is_none());
    }

    #[test]
    fn test_lookup_key() {
        let keys = ["id", "display_name"];

        assert_eq!(
            lookup_key(&json!({"display_name": "Ops", "id": null}), &keys).unwrap(),
            ("display_name", "Ops")
        );
        assert_eq!(lookup_key(&json!({"id": ""}), &keys).unwrap_err().len(), 1);
        assert_eq!(
            lookup_key(&json!({"id": "g-1", "display_name": "Ops"}), &keys)
                .unwrap_err()
                .len(),
            2
        );
    }

    #[test]
    fn test_filter_path_escapes_quotes() {
        assert_eq!(
            filter_path("groups", "displayName", "O'Brien team"),
            "groups?$filter=displayName%20eq%20%27O%27%27Brien%20team%27"
        );
    }

    #[test]
    fn test_single() {
        assert_eq!(single(vec![1], "groups").unwrap(), 1);
        assert!(matches!(
            single(Vec::<i32>::new(), "groups"),
            Err(ProviderError::NotFound(_))
        ));
        assert!(matches!(
            single(vec![1, 2], "groups"),
            Err(ProviderError::FailedPrecondition(ref m)) if m.starts_with("2 groups")
        ));
    }
}
