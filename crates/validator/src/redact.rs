//! Redaction of sensitive values
//!
//! A [`Redactor`] is a predicate over field paths. The aggregator runs
//! every violation through it, whatever strategy produced the violation,
//! before the violation can reach a caller or a log line.
//!
//! A violation on a container (a schema `type` failure on `account`, say)
//! carries the whole sub-tree as its value, so the paths inside that value
//! are checked as well.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::error::FieldError;
use crate::inspect::{self, FieldWalker};

/// Sentinel written in place of a redacted value.
pub const REDACTED: &str = "[REDACTED]";

type Predicate = dyn Fn(&str) -> bool + Send + Sync;

/// Decides which field paths carry sensitive values.
#[derive(Clone, Default)]
pub struct Redactor {
    predicate: Option<Arc<Predicate>>,
}

impl Redactor {
    /// A redactor that never matches.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Redacts every path for which `predicate` returns true.
    pub fn new<F>(predicate: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        Self {
            predicate: Some(Arc::new(predicate)),
        }
    }

    /// Redacts any path containing one of `needles`, ignoring ASCII case.
    ///
    /// ```
    /// use fieldcheck_validator::Redactor;
    ///
    /// let redactor = Redactor::matching_any(["password", "token"]);
    /// assert!(redactor.matches("user.Password"));
    /// assert!(!redactor.matches("user.email"));
    /// ```
    pub fn matching_any<I, S>(needles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let needles: Vec<String> = needles
            .into_iter()
            .map(|n| n.into().to_ascii_lowercase())
            .collect();
        Self::new(move |path| {
            let path = path.to_ascii_lowercase();
            needles.iter().any(|n| path.contains(n.as_str()))
        })
    }

    /// Whether `path` is sensitive.
    #[must_use]
    pub fn matches(&self, path: &str) -> bool {
        self.predicate.as_ref().is_some_and(|p| p(path))
    }

    /// Whether `value`, found at `path`, holds a sensitive field anywhere
    /// below it.
    #[must_use]
    pub fn matches_within(&self, path: &str, value: &Value) -> bool {
        if self.predicate.is_none() {
            return false;
        }
        FieldWalker::new(value).any(|field| self.matches(&inspect::join(path, &field.path)))
    }

    /// Scrubs `error` in place if its path is sensitive or its value
    /// contains a sensitive path.
    pub fn apply(&self, error: &mut FieldError) {
        let exposed = self.matches(error.path())
            || error
                .value()
                .is_some_and(|value| self.matches_within(error.path(), value));
        if exposed {
            error.scrub(REDACTED);
        }
    }
}

impl fmt::Debug for Redactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Redactor")
            .field("predicate", &self.predicate.as_ref().map(|_| "<function>"))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn none_never_matches() {
        assert!(!Redactor::none().matches("password"));
    }

    #[test]
    fn apply_replaces_value_with_sentinel() {
        let redactor = Redactor::matching_any(["password"]);
        let mut error =
            FieldError::new("password", "tag.min", "too short").with_value(json!("hunter2"));
        redactor.apply(&mut error);
        assert_eq!(error.value(), Some(&json!(REDACTED)));
    }

    #[test]
    fn apply_scrubs_containers_holding_sensitive_fields() {
        let redactor = Redactor::matching_any(["password"]);
        let mut error = FieldError::new("account", "schema.type", "not a string")
            .with_value(json!({"login": "ann", "creds": [{"password": "hunter2"}]}));
        redactor.apply(&mut error);
        assert_eq!(error.value(), Some(&json!(REDACTED)));

        let mut error = FieldError::new("", "schema.additionalProperties", "extra fields")
            .with_value(json!({"password": "hunter2"}));
        redactor.apply(&mut error);
        assert_eq!(error.value(), Some(&json!(REDACTED)));
    }

    #[test]
    fn apply_keeps_containers_without_sensitive_fields() {
        let redactor = Redactor::matching_any(["password"]);
        let value = json!({"login": "ann", "tags": ["a"]});
        let mut error =
            FieldError::new("account", "schema.type", "not a string").with_value(value.clone());
        redactor.apply(&mut error);
        assert_eq!(error.value(), Some(&value));
    }

    #[test]
    fn apply_leaves_other_paths_alone() {
        let redactor = Redactor::new(|path| path == "ssn");
        let mut error = FieldError::new("age", "tag.min", "too small").with_value(json!(10));
        redactor.apply(&mut error);
        assert_eq!(error.value(), Some(&json!(10)));
    }
}
