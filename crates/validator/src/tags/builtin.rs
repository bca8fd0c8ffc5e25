//! Built-in rule library
//!
//! Size-like rules (`min`, `max`, `len`, `gt`, `gte`, `lt`, `lte`) compare
//! the character count of strings, the element count of arrays and maps,
//! and the value of numbers. Cross-field rules (`eqfield`, `gtfield`, ...)
//! resolve their parameter against the parent record, or against the root
//! when the parameter is a dotted path.

use std::cmp::Ordering;
use std::sync::LazyLock;

use serde_json::Value;

use super::RuleInput;
use crate::inspect;

static EMAIL_REGEX: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$"
    ).unwrap()
});

static URL_REGEX: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"^https?://[^\s/$.?#].[^\s]*$").unwrap()
});

static UUID_REGEX: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$")
        .unwrap()
});

/// Handled by the adapter itself rather than [`evaluate`].
pub(crate) const REQUIRED: &str = "required";
/// Skips the remaining rules on a zero value.
pub(crate) const OMITEMPTY: &str = "omitempty";

const NO_PARAM: &[&str] = &[
    REQUIRED, OMITEMPTY, "email", "url", "uuid", "alpha", "alphanum", "numeric",
];
const NUMERIC_PARAM: &[&str] = &["min", "max", "len", "gt", "gte", "lt", "lte"];
const TEXT_PARAM: &[&str] = &["eq", "ne", "oneof", "contains", "startswith", "endswith"];
const FIELD_PARAM: &[&str] = &[
    "eqfield", "nefield", "gtfield", "gtefield", "ltfield", "ltefield",
];

/// Validates a rule name and its parameter before any data is seen.
pub(crate) fn check(name: &str, param: Option<&str>) -> Result<(), String> {
    if NO_PARAM.contains(&name) {
        return match param {
            None => Ok(()),
            Some(_) => Err("takes no parameter".to_owned()),
        };
    }
    let param = if NUMERIC_PARAM.contains(&name)
        || TEXT_PARAM.contains(&name)
        || FIELD_PARAM.contains(&name)
    {
        param
            .filter(|p| !p.is_empty())
            .ok_or_else(|| "requires a parameter".to_owned())?
    } else {
        return Err("unknown rule".to_owned());
    };
    if NUMERIC_PARAM.contains(&name) && param.parse::<f64>().is_err() {
        return Err(format!("parameter '{param}' is not a number"));
    }
    Ok(())
}

/// Zero value: null, missing, `""`, `0`, `false`, `[]`, `{}`.
pub(crate) fn is_zero(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::Bool(b)) => !b,
        Some(Value::Number(n)) => n.as_f64() == Some(0.0),
        Some(Value::String(s)) => s.is_empty(),
        Some(Value::Array(items)) => items.is_empty(),
        Some(Value::Object(map)) => map.is_empty(),
    }
}

/// Evaluates a rule that passed [`check`]. `required` and `omitempty`
/// always pass here.
pub(crate) fn evaluate(name: &str, input: &RuleInput<'_>) -> bool {
    let value = input.value;
    let param = input.param.unwrap_or_default();
    match name {
        REQUIRED | OMITEMPTY => true,
        "email" => value.as_str().is_some_and(|s| EMAIL_REGEX.is_match(s)),
        "url" => value.as_str().is_some_and(|s| URL_REGEX.is_match(s)),
        "uuid" => value.as_str().is_some_and(|s| UUID_REGEX.is_match(s)),
        "alpha" => value
            .as_str()
            .is_some_and(|s| s.chars().all(|c| c.is_ascii_alphabetic())),
        "alphanum" => value
            .as_str()
            .is_some_and(|s| s.chars().all(|c| c.is_ascii_alphanumeric())),
        "numeric" => match value {
            Value::Number(_) => true,
            Value::String(s) => s.parse::<f64>().is_ok(),
            _ => false,
        },
        "min" => compare_size(value, param, |o| o != Ordering::Less),
        "max" => compare_size(value, param, |o| o != Ordering::Greater),
        "len" => compare_size(value, param, |o| o == Ordering::Equal),
        "gt" => compare_size(value, param, |o| o == Ordering::Greater),
        "gte" => compare_size(value, param, |o| o != Ordering::Less),
        "lt" => compare_size(value, param, |o| o == Ordering::Less),
        "lte" => compare_size(value, param, |o| o != Ordering::Greater),
        "eq" => equals_param(value, param),
        "ne" => !equals_param(value, param),
        "oneof" => {
            let rendered = render_scalar(value);
            rendered.is_some_and(|v| param.split_whitespace().any(|p| p == v))
        }
        "contains" => value.as_str().is_some_and(|s| s.contains(param)),
        "startswith" => value.as_str().is_some_and(|s| s.starts_with(param)),
        "endswith" => value.as_str().is_some_and(|s| s.ends_with(param)),
        "eqfield" => compare_field(input, |o| o == Ordering::Equal),
        "nefield" => !compare_field(input, |o| o == Ordering::Equal),
        "gtfield" => compare_field(input, |o| o == Ordering::Greater),
        "gtefield" => compare_field(input, |o| o != Ordering::Less),
        "ltfield" => compare_field(input, |o| o == Ordering::Less),
        "ltefield" => compare_field(input, |o| o != Ordering::Greater),
        _ => false,
    }
}

/// Character count, element count or numeric value.
fn measure(value: &Value) -> Option<f64> {
    match value {
        Value::String(s) => Some(s.chars().count() as f64),
        Value::Array(items) => Some(items.len() as f64),
        Value::Object(map) => Some(map.len() as f64),
        Value::Number(n) => n.as_f64(),
        Value::Bool(_) | Value::Null => None,
    }
}

fn compare_size(value: &Value, param: &str, accept: impl Fn(Ordering) -> bool) -> bool {
    let (Some(actual), Ok(bound)) = (measure(value), param.parse::<f64>()) else {
        return false;
    };
    actual.partial_cmp(&bound).is_some_and(accept)
}

fn equals_param(value: &Value, param: &str) -> bool {
    match value {
        Value::String(s) => s == param,
        Value::Bool(b) => param.parse::<bool>().is_ok_and(|p| p == *b),
        other => compare_size(other, param, |o| o == Ordering::Equal),
    }
}

fn render_scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Resolves the other operand of a cross-field rule.
pub(crate) fn other_field<'v>(input: &RuleInput<'v>) -> Option<&'v Value> {
    let param = input.param?;
    if param.contains('.') {
        inspect::lookup(input.root, param)
    } else {
        input.parent.and_then(|parent| inspect::child(parent, param))
    }
}

fn compare_field(input: &RuleInput<'_>, accept: impl Fn(Ordering) -> bool) -> bool {
    other_field(input)
        .and_then(|other| order(input.value, other))
        .is_some_and(accept)
}

/// Orders two values of the same shape; strings compare lexically so
/// RFC 3339 timestamps order chronologically.
fn order(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        (a, b) if a == b => Some(Ordering::Equal),
        _ => None,
    }
}
