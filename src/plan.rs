//! Plan computation and plan modifiers.
//!
//! The only decision a plan makes on its own is per attribute: when the
//! configuration leaves an attribute unset, should the planned value be the
//! proposed one (usually null) or the value already stored in state? Attributes
//! carrying [`PlanModifier::UseStateForUnconfigured`] keep the stored value, and
//! computed-only attributes always do since they can never be configured.
//!
//! The rule is value-kind agnostic, so one implementation covers string, bool,
//! number, list, set and object attributes alike.

use serde_json::{Map, Value};
use tracing::trace;

use crate::schema::{Attribute, PlanModifier, Schema};
use crate::types::{AttributeChange, PlanResult};

/// Return the prior value when the attribute is unconfigured and the prior
/// value is known, otherwise the planned value.
///
/// `None` and `Some(Value::Null)` are both treated as "not set".
///
/// ```
/// use msgraph_groups_provider::plan::use_state_for_unconfigured;
/// use serde_json::json;
///
/// let prior = json!("Private");
/// assert_eq!(use_state_for_unconfigured(Some(&prior), None, Value::Null), json!("Private"));
/// assert_eq!(
///     use_state_for_unconfigured(Some(&prior), Some(&json!("Public")), json!("Public")),
///     json!("Public"),
/// );
/// # use serde_json::Value;
/// ```
pub fn use_state_for_unconfigured(
    prior: Option<&Value>,
    config: Option<&Value>,
    planned: Value,
) -> Value {
    if is_set(config) {
        return planned;
    }
    match prior {
        Some(value) if !value.is_null() => value.clone(),
        _ => planned,
    }
}

fn is_set(value: Option<&Value>) -> bool {
    matches!(value, Some(v) if !v.is_null())
}

fn keeps_state(attr: &Attribute) -> bool {
    attr.is_computed_only() || attr.has_plan_modifier(PlanModifier::UseStateForUnconfigured)
}

/// Apply every attribute's plan modifiers to the proposed state.
///
/// With no prior state (a create) the proposed state is returned unchanged.
pub fn apply_plan_modifiers(
    schema: &Schema,
    prior_state: Option<&Value>,
    config: &Value,
    proposed: Value,
) -> Value {
    let prior = match prior_state.and_then(Value::as_object) {
        Some(prior) => prior,
        None => return proposed,
    };

    let mut planned = match proposed {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        other => return other,
    };

    for (name, attr) in &schema.block.attributes {
        if !keeps_state(attr) {
            continue;
        }
        let current = planned.remove(name).unwrap_or(Value::Null);
        let value = use_state_for_unconfigured(prior.get(name), config.get(name), current);
        if !value.is_null() {
            trace!(attribute = %name, "Planned value taken from state");
        }
        planned.insert(name.clone(), value);
    }

    Value::Object(planned)
}

/// Compute the plan for a resource from its schema.
///
/// - `prior_state == None`: create; every non-null planned attribute is added.
/// - `proposed == Null` with a prior state: destroy; every non-null prior
///   attribute is removed.
/// - otherwise: update; attributes are diffed after applying plan modifiers,
///   and a change to any `force_new` attribute requires replacement.
pub fn plan_resource(
    schema: &Schema,
    prior_state: Option<Value>,
    proposed: Value,
    config: &Value,
) -> PlanResult {
    let prior = prior_state.filter(|p| !p.is_null());

    if let (Some(prior), true) = (&prior, proposed.is_null()) {
        let changes = sorted_attributes(schema)
            .filter_map(|(name, _)| {
                prior
                    .get(name)
                    .filter(|v| !v.is_null())
                    .map(|v| AttributeChange::removed(name, v.clone()))
            })
            .collect();
        return PlanResult::with_changes(Value::Null, changes, false);
    }

    let planned = apply_plan_modifiers(schema, prior.as_ref(), config, proposed);

    let mut changes = Vec::new();
    let mut requires_replace = false;

    for (name, attr) in sorted_attributes(schema) {
        let before = prior
            .as_ref()
            .and_then(|p| p.get(name))
            .filter(|v| !v.is_null());
        let after = planned.get(name).filter(|v| !v.is_null());

        let change = match (before, after) {
            (None, None) => None,
            (None, Some(a)) => Some(AttributeChange::added(name, a.clone())),
            (Some(b), None) => {
                // Unknown computed values are filled in by the apply step.
                if attr.is_computed_only() {
                    None
                } else {
                    Some(AttributeChange::removed(name, b.clone()))
                }
            },
            (Some(b), Some(a)) if !values_equal(&attr.attr_type, b, a) => {
                Some(AttributeChange::modified(name, b.clone(), a.clone()))
            },
            _ => None,
        };

        if let Some(change) = change {
            if prior.is_some() && attr.has_plan_modifier(PlanModifier::RequiresReplace) {
                requires_replace = true;
            }
            changes.push(change);
        }
    }

    PlanResult::with_changes(planned, changes, requires_replace)
}

fn sorted_attributes(schema: &Schema) -> impl Iterator<Item = (&String, &Attribute)> {
    let mut attrs: Vec<_> = schema.block.attributes.iter().collect();
    attrs.sort_by(|a, b| a.0.cmp(b.0));
    attrs.into_iter()
}

/// Compare two values. Set attributes compare as sets of distinct elements,
/// so neither element order nor repeats matter.
fn values_equal(attr_type: &crate::schema::AttributeType, a: &Value, b: &Value) -> bool {
    use crate::schema::AttributeType;

    match (attr_type, a, b) {
        (AttributeType::Set(_), Value::Array(left), Value::Array(right)) => {
            distinct_elements(left) == distinct_elements(right)
        },
        _ => a == b,
    }
}

fn distinct_elements(items: &[Value]) -> Vec<String> {
    let mut keys: Vec<String> = items.iter().map(Value::to_string).collect();
    keys.sort();
    keys.dedup();
    keys
}
