//! Error types for validation failures
//!
//! Two layers live here:
//!
//! - [`FieldError`] / [`ValidationError`] describe *business* violations:
//!   one entry per failing field, produced by whichever strategy ran.
//! - [`Error`] is the crate-level error returned by every entry point. It
//!   wraps a [`ValidationError`] in [`Error::Invalid`] and otherwise carries
//!   input, resource-limit and configuration failures, which abort the call
//!   instead of being aggregated.
//!
//! [`Error::kind`] lets an API layer tell "your request failed validation"
//! (422) apart from "your request is not a well-formed record" (400).

use std::borrow::Cow;
use std::fmt;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::filter::Bound;
use crate::strategy::Strategy;

/// Open key/value bag attached to every [`FieldError`].
pub type Meta = Map<String, Value>;

/// Stable error codes shared across strategies.
pub mod codes {
    /// Record reference was `None`.
    pub const NIL_POINTER: &str = "nil_pointer";
    /// A custom check returned a plain error.
    pub const INTERFACE_ERROR: &str = "interface.error";
    /// Prefix for tag rule violations (`tag.required`, `tag.email`, ...).
    pub const TAG_PREFIX: &str = "tag.";
    /// Prefix for schema keyword violations (`schema.type`, ...).
    pub const SCHEMA_PREFIX: &str = "schema.";
    /// Prefix for custom-check violations.
    pub const INTERFACE_PREFIX: &str = "interface.";
}

/// Well-known keys in [`FieldError::meta`].
pub mod meta_keys {
    /// The offending value, or [`REDACTED`](crate::redact::REDACTED).
    pub const VALUE: &str = "value";
    /// Rule or keyword name.
    pub const TAG: &str = "tag";
    /// Rule parameter, e.g. `18` for `min=18`.
    pub const PARAM: &str = "param";
    /// Display name of the field.
    pub const FIELD: &str = "field";
    /// Kind of the offending value.
    pub const KIND: &str = "kind";
    /// Other operand of a cross-field comparison.
    pub const OTHER: &str = "other";
}

// ============================================================================
// FIELD ERROR
// ============================================================================

/// One violation on one field.
///
/// Immutable once built: strategies construct it with the builder methods
/// and hand it to the aggregator, which only ever scrubs the recorded value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldError {
    path: String,
    code: Cow<'static, str>,
    message: String,
    #[serde(skip_serializing_if = "Map::is_empty")]
    meta: Meta,
    /// Set when `message` quotes the offending value verbatim.
    #[serde(skip)]
    echoes_value: bool,
}

impl FieldError {
    /// Creates a new field error.
    ///
    /// # Examples
    ///
    /// ```
    /// use fieldcheck_validator::FieldError;
    ///
    /// let error = FieldError::new("user.email", "tag.email", "must be a valid email address");
    /// assert_eq!(error.path(), "user.email");
    /// ```
    pub fn new(
        path: impl Into<String>,
        code: impl Into<Cow<'static, str>>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            code: code.into(),
            message: message.into(),
            meta: Meta::new(),
            echoes_value: false,
        }
    }

    /// Creates an error for a custom check, namespacing `code` under `interface.`.
    ///
    /// A code that already carries the prefix is kept as is.
    pub fn custom(path: impl Into<String>, code: &str, message: impl Into<String>) -> Self {
        let code = if code.starts_with(codes::INTERFACE_PREFIX) {
            code.to_owned()
        } else {
            format!("{}{code}", codes::INTERFACE_PREFIX)
        };
        Self::new(path, code, message)
    }

    /// The error reported when the record itself is missing.
    pub fn nil_pointer() -> Self {
        Self::new("", codes::NIL_POINTER, "record is nil")
    }

    /// Adds a metadata entry.
    #[must_use = "builder methods must be chained or built"]
    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.meta.insert(key.into(), value.into());
        self
    }

    /// Records the offending value under `meta["value"]`.
    #[must_use = "builder methods must be chained or built"]
    pub fn with_value(self, value: Value) -> Self {
        self.with_meta(meta_keys::VALUE, value)
    }

    /// Marks the message as quoting the offending value.
    #[must_use = "builder methods must be chained or built"]
    pub(crate) fn echoing_value(mut self) -> Self {
        self.echoes_value = true;
        self
    }

    /// Dotted/indexed path of the field, empty for record-level errors.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Stable machine code, namespaced by strategy.
    #[must_use]
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Human-readable message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// All metadata entries.
    #[must_use]
    pub fn meta(&self) -> &Meta {
        &self.meta
    }

    /// The recorded offending value, if any.
    #[must_use]
    pub fn value(&self) -> Option<&Value> {
        self.meta.get(meta_keys::VALUE)
    }

    /// Replaces the recorded value (and any message quoting it) with `sentinel`.
    pub(crate) fn scrub(&mut self, sentinel: &str) {
        if let Some(value) = self.meta.get_mut(meta_keys::VALUE) {
            *value = Value::String(sentinel.to_owned());
        }
        if self.echoes_value {
            self.message = format!("value failed {}", self.code);
            self.echoes_value = false;
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}: {}", self.code, self.message)
        } else {
            write!(f, "[{}] {}: {}", self.path, self.code, self.message)
        }
    }
}

impl Bound for FieldError {
    fn bound_path(&self) -> &str {
        &self.path
    }
}

// ============================================================================
// VALIDATION ERROR
// ============================================================================

/// Every violation found by one validation call.
///
/// When the call ran with a `max_errors` limit, `fields().len()` never
/// exceeds it and [`is_truncated`](Self::is_truncated) reports whether
/// violations were dropped.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidationError {
    fields: Vec<FieldError>,
    truncated: bool,
}

impl ValidationError {
    /// Creates an empty error.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_parts(fields: Vec<FieldError>, truncated: bool) -> Self {
        Self { fields, truncated }
    }

    /// Field errors in report order.
    #[must_use]
    pub fn fields(&self) -> &[FieldError] {
        &self.fields
    }

    /// Number of retained field errors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true if no field errors were retained.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// True iff more violations existed than were retained.
    #[must_use]
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    /// Appends one field error.
    pub fn push(&mut self, error: FieldError) {
        self.fields.push(error);
    }

    /// Appends all errors from another validation, keeping its truncation flag.
    pub fn merge(&mut self, other: ValidationError) {
        self.truncated |= other.truncated;
        self.fields.extend(other.fields);
    }

    /// Orders entries by path, then by code.
    pub fn sort(&mut self) {
        self.fields
            .sort_by(|a, b| a.path.cmp(&b.path).then_with(|| a.code.cmp(&b.code)));
    }

    /// Iterates over the retained field errors.
    pub fn iter(&self) -> std::slice::Iter<'_, FieldError> {
        self.fields.iter()
    }

    /// Returns the first error recorded for `path`.
    #[must_use]
    pub fn field(&self, path: &str) -> Option<&FieldError> {
        self.fields.iter().find(|e| e.path == path)
    }

    /// Codes of all retained errors, in report order.
    #[must_use]
    pub fn codes(&self) -> Vec<&str> {
        self.fields.iter().map(FieldError::code).collect()
    }

    /// Consumes the error and returns its field errors.
    #[must_use]
    pub fn into_fields(self) -> Vec<FieldError> {
        self.fields
    }
}

impl Extend<FieldError> for ValidationError {
    fn extend<I: IntoIterator<Item = FieldError>>(&mut self, iter: I) {
        self.fields.extend(iter);
    }
}

impl FromIterator<FieldError> for ValidationError {
    fn from_iter<I: IntoIterator<Item = FieldError>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
            truncated: false,
        }
    }
}

impl From<FieldError> for ValidationError {
    fn from(error: FieldError) -> Self {
        Self {
            fields: vec![error],
            truncated: false,
        }
    }
}

impl IntoIterator for ValidationError {
    type Item = FieldError;
    type IntoIter = std::vec::IntoIter<FieldError>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}

impl<'a> IntoIterator for &'a ValidationError {
    type Item = &'a FieldError;
    type IntoIter = std::slice::Iter<'a, FieldError>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.iter()
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "validation failed with {} field error(s)", self.fields.len())?;
        if self.truncated {
            write!(f, " (truncated)")?;
        }
        for (i, error) in self.fields.iter().enumerate() {
            write!(f, "\n  {}. {error}", i + 1)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

// ============================================================================
// CUSTOM CHECK FAILURE
// ============================================================================

/// What a custom check returns on failure.
///
/// A plain error becomes one `interface.error` field error; a pre-built
/// [`ValidationError`] is merged field by field, keeping each entry's own
/// code, message and metadata.
#[derive(Debug)]
pub enum CheckFailure {
    /// Opaque failure reported against the whole record.
    Error(Box<dyn std::error::Error + Send + Sync>),
    /// Structured per-field failures.
    Fields(ValidationError),
}

impl CheckFailure {
    /// Wraps any error (or a message) as a record-level failure.
    ///
    /// ```
    /// use fieldcheck_validator::CheckFailure;
    ///
    /// let failure = CheckFailure::error("account is locked");
    /// assert_eq!(failure.to_string(), "account is locked");
    /// ```
    pub fn error(error: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Error(error.into())
    }
}

impl From<ValidationError> for CheckFailure {
    fn from(errors: ValidationError) -> Self {
        Self::Fields(errors)
    }
}

impl From<FieldError> for CheckFailure {
    fn from(error: FieldError) -> Self {
        Self::Fields(error.into())
    }
}

impl fmt::Display for CheckFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error(e) => write!(f, "{e}"),
            Self::Fields(errors) => write!(f, "{errors}"),
        }
    }
}

// ============================================================================
// CRATE ERROR
// ============================================================================

/// Result type for validation entry points.
pub type Result<T> = std::result::Result<T, Error>;

/// Everything a validation call can fail with.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The record was inspected and has field violations.
    #[error("{0}")]
    Invalid(ValidationError),

    /// A top-level object was expected.
    #[error("expected an object at the top level, found {found}")]
    NotAnObject {
        /// Kind of the value that was found instead
        found: &'static str,
    },

    /// Raw input could not be parsed, or the record could not be serialized.
    #[error("malformed input: {reason}")]
    MalformedInput {
        /// Parser or serializer message
        reason: String,
    },

    /// The forced strategy is not something the record supports.
    #[error("strategy '{strategy}' is not supported by record '{record}'")]
    UnsupportedStrategy {
        /// The requested strategy
        strategy: Strategy,
        /// Type name of the record
        record: &'static str,
    },

    /// Presence computation saw more fields than allowed.
    #[error("input has more than {limit} fields")]
    FieldLimitExceeded {
        /// The configured maximum
        limit: usize,
    },

    /// A tag on the record could not be interpreted.
    #[error("invalid rule '{rule}' on field '{path}': {reason}")]
    InvalidTag {
        /// Tag path the rule is attached to
        path: String,
        /// Rule name
        rule: String,
        /// What is wrong with it
        reason: String,
    },

    /// A declared schema failed to parse or compile.
    #[error("schema '{schema_id}' failed to compile: {reason}")]
    SchemaCompile {
        /// Schema identifier
        schema_id: String,
        /// Compiler message
        reason: String,
    },

    /// The validator was built with invalid options.
    #[error("invalid configuration: {message}")]
    Config {
        /// What is wrong
        message: String,
    },
}

/// Broad classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Field violations: the record is well-formed but breaks its rules.
    Validation,
    /// The input itself is unusable.
    Input,
    /// A traversal or size bound was hit.
    ResourceLimit,
    /// The validator or the record type is misconfigured.
    Configuration,
}

impl ErrorKind {
    /// HTTP status an API layer should answer with.
    #[must_use]
    pub const fn http_status(self) -> u16 {
        match self {
            Self::Validation => 422,
            Self::Input | Self::ResourceLimit => 400,
            Self::Configuration => 500,
        }
    }
}

impl Error {
    /// Classifies the error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Invalid(_) => ErrorKind::Validation,
            Self::NotAnObject { .. } | Self::MalformedInput { .. } => ErrorKind::Input,
            Self::UnsupportedStrategy { .. } => ErrorKind::Input,
            Self::FieldLimitExceeded { .. } => ErrorKind::ResourceLimit,
            Self::InvalidTag { .. } | Self::SchemaCompile { .. } | Self::Config { .. } => {
                ErrorKind::Configuration
            }
        }
    }

    /// The field violations, if this is [`Error::Invalid`].
    #[must_use]
    pub fn as_validation(&self) -> Option<&ValidationError> {
        match self {
            Self::Invalid(errors) => Some(errors),
            _ => None,
        }
    }

    /// Consumes the error, returning the field violations if any.
    #[must_use]
    pub fn into_validation(self) -> Option<ValidationError> {
        match self {
            Self::Invalid(errors) => Some(errors),
            _ => None,
        }
    }

    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}

impl From<ValidationError> for Error {
    fn from(errors: ValidationError) -> Self {
        Self::Invalid(errors)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn custom_code_is_namespaced_once() {
        assert_eq!(FieldError::custom("a", "weak", "m").code(), "interface.weak");
        assert_eq!(
            FieldError::custom("a", "interface.weak", "m").code(),
            "interface.weak"
        );
    }

    #[test]
    fn sort_orders_by_path_then_code() {
        let mut errors: ValidationError = [
            FieldError::new("b", "tag.min", ""),
            FieldError::new("a", "tag.required", ""),
            FieldError::new("a", "tag.email", ""),
        ]
        .into_iter()
        .collect();
        errors.sort();

        let order: Vec<_> = errors.iter().map(|e| (e.path(), e.code())).collect();
        assert_eq!(
            order,
            vec![("a", "tag.email"), ("a", "tag.required"), ("b", "tag.min")]
        );
    }

    #[test]
    fn merge_keeps_truncation() {
        let mut left = ValidationError::from(FieldError::new("a", "tag.min", ""));
        let right = ValidationError::from_parts(vec![FieldError::new("b", "tag.max", "")], true);
        left.merge(right);

        assert_eq!(left.len(), 2);
        assert!(left.is_truncated());
    }

    #[test]
    fn scrub_replaces_value_and_echoing_message() {
        let mut error = FieldError::new("password", "schema.minLength", "\"hunter2\" is too short")
            .with_value(json!("hunter2"))
            .echoing_value();
        error.scrub("[REDACTED]");

        assert_eq!(error.value(), Some(&json!("[REDACTED]")));
        assert!(!error.message().contains("hunter2"));
    }

    #[test]
    fn scrub_without_value_leaves_meta_alone() {
        let mut error = FieldError::new("a", "tag.required", "required");
        error.scrub("[REDACTED]");
        assert!(error.meta().is_empty());
    }

    #[test]
    fn kinds_map_to_http_statuses() {
        let invalid = Error::from(ValidationError::new());
        assert_eq!(invalid.kind().http_status(), 422);
        assert_eq!(
            Error::MalformedInput { reason: "eof".into() }.kind(),
            ErrorKind::Input
        );
        assert_eq!(
            Error::FieldLimitExceeded { limit: 1 }.kind(),
            ErrorKind::ResourceLimit
        );
        assert_eq!(Error::config("bad").kind().http_status(), 500);
    }

    #[test]
    fn serializes_for_api_bodies() {
        let errors = ValidationError::from(
            FieldError::new("age", "tag.min", "must be at least 18").with_meta("param", "18"),
        );
        let body = serde_json::to_value(&errors).unwrap();
        assert_eq!(
            body,
            json!({
                "fields": [{
                    "path": "age",
                    "code": "tag.min",
                    "message": "must be at least 18",
                    "meta": {"param": "18"}
                }],
                "truncated": false
            })
        );
    }
}
