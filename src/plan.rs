//! Schema-driven planning.
//!
//! [`plan`] compares prior state with the proposed configuration, attribute
//! by attribute, and decides what an apply would do:
//!
//! - defaults fill unset attributes;
//! - computed attributes carry over from prior state, or become unknown
//!   (`null`) when the resource is created or replaced;
//! - optional computed attributes left unset keep whatever the remote side
//!   chose for them;
//! - a change to a `force_new` attribute means replacement;
//! - a change to a checksum-gated attribute is dropped when the new value
//!   hashes to the checksum recorded in prior state. That is how write-only
//!   values, which read back as `null`, avoid a perpetual diff.

use base64::Engine as _;
use serde_json::{Map, Value};
use tracing::debug;

use crate::checksum;
use crate::error::ProviderError;
use crate::schema::{Attribute, AttributeType, ContentEncoding, DiffSuppress, Schema};
use crate::types::{AttributeChange, PlanResult};

/// Shown instead of sensitive values in planned changes.
pub const SENSITIVE_PLACEHOLDER: &str = "(sensitive value)";

/// Plan the transition from `prior` (None when creating) to `proposed`.
pub fn plan(
    schema: &Schema,
    prior: Option<&Value>,
    proposed: &Value,
) -> Result<PlanResult, ProviderError> {
    let mut planned = as_object(proposed, "proposed state")?.clone();
    apply_defaults(schema, &mut planned);

    let prior = match prior {
        Some(prior) => as_object(prior, "prior state")?,
        None => return Ok(plan_create(schema, planned)),
    };

    let mut changes = Vec::new();
    let mut requires_replace = false;
    let mut remote_defaults = Vec::new();

    for (name, attr) in &schema.block.attributes {
        if attr.flags.is_computed_only() {
            continue;
        }

        let before = prior.get(name).unwrap_or(&Value::Null);
        let after = planned.get(name).unwrap_or(&Value::Null);
        if attr.flags.is_optional_computed() && after.is_null() {
            planned.insert(name.clone(), before.clone());
            remote_defaults.push(name);
            continue;
        }
        if values_equal(&attr.attr_type, before, after) {
            continue;
        }

        if suppressed(attr, after, prior) {
            debug!(attribute = %name, "Change matches recorded checksum, suppressing");
            planned.insert(name.clone(), before.clone());
            continue;
        }

        requires_replace |= attr.force_new;
        changes.push(change(name, attr, before, after));
    }

    if requires_replace {
        for name in remote_defaults {
            planned.insert(name.clone(), Value::Null);
        }
    }

    for (name, attr) in &schema.block.attributes {
        if !attr.flags.is_computed_only() {
            continue;
        }
        let carried = if requires_replace {
            Value::Null
        } else {
            prior.get(name).cloned().unwrap_or(Value::Null)
        };
        planned.insert(name.clone(), carried);
    }

    Ok(PlanResult::with_changes(
        Value::Object(planned),
        changes,
        requires_replace,
    ))
}

fn plan_create(schema: &Schema, mut planned: Map<String, Value>) -> PlanResult {
    let mut changes = Vec::new();
    for (name, attr) in &schema.block.attributes {
        if attr.flags.is_computed_only() {
            planned.insert(name.clone(), Value::Null);
            continue;
        }
        match planned.get(name) {
            Some(Value::Null) | None => {},
            Some(value) => changes.push(AttributeChange::added(name.clone(), mask(attr, value))),
        }
    }
    PlanResult::with_changes(Value::Object(planned), changes, false)
}

fn as_object<'a>(value: &'a Value, what: &str) -> Result<&'a Map<String, Value>, ProviderError> {
    value
        .as_object()
        .ok_or_else(|| ProviderError::Validation(format!("{what} must be an object")))
}

fn apply_defaults(schema: &Schema, planned: &mut Map<String, Value>) {
    for (name, attr) in &schema.block.attributes {
        let Some(default) = &attr.default else {
            continue;
        };
        let unset = planned.get(name).map_or(true, Value::is_null);
        if unset {
            planned.insert(name.clone(), default.clone());
        }
    }
}

fn suppressed(attr: &Attribute, after: &Value, prior: &Map<String, Value>) -> bool {
    let Some(DiffSuppress::Checksum {
        checksum_attribute,
        encoding,
    }) = &attr.diff_suppress
    else {
        return false;
    };
    let (Some(value), Some(known)) = (
        after.as_str(),
        prior.get(checksum_attribute).and_then(Value::as_str),
    ) else {
        return false;
    };

    match encoding {
        ContentEncoding::Plain => checksum::matches(value, known),
        ContentEncoding::Base64 => match base64::engine::general_purpose::STANDARD.decode(value) {
            Ok(content) => checksum::matches(content, known),
            Err(_) => false,
        },
    }
}

fn values_equal(attr_type: &AttributeType, a: &Value, b: &Value) -> bool {
    match (attr_type, a, b) {
        (AttributeType::Set(_), Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().all(|v| b.contains(v)) && b.iter().all(|v| a.contains(v))
        },
        // an empty set and an unset one are the same thing
        (AttributeType::Set(_), Value::Array(items), Value::Null)
        | (AttributeType::Set(_), Value::Null, Value::Array(items)) => items.is_empty(),
        _ => a == b,
    }
}

fn mask(attr: &Attribute, value: &Value) -> Value {
    if attr.flags.sensitive && !value.is_null() {
        Value::String(SENSITIVE_PLACEHOLDER.to_string())
    } else {
        value.clone()
    }
}

fn change(name: &str, attr: &Attribute, before: &Value, after: &Value) -> AttributeChange {
    let before = (!before.is_null()).then(|| mask(attr, before));
    let after = (!after.is_null()).then(|| mask(attr, after));
    AttributeChange::new(name, before, after)
}
