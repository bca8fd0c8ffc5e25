//! Error aggregator
//!
//! Collects violations from every strategy that ran, in execution order,
//! into one [`ValidationError`]. Each violation is redacted on the way in.
//! Once `max_errors` entries are kept, further violations are counted and
//! dropped and the result is flagged as truncated; this is a reporting
//! limit only, strategies are not short-circuited.

use crate::error::{FieldError, ValidationError};
use crate::guard::ErrorBudget;
use crate::redact::Redactor;

/// Accumulates field errors for one validation call.
#[derive(Debug)]
pub struct Aggregator<'r> {
    redactor: &'r Redactor,
    budget: ErrorBudget,
    fields: Vec<FieldError>,
    truncated: bool,
    sort: bool,
}

impl<'r> Aggregator<'r> {
    /// Creates an aggregator keeping at most `max_errors` entries (0 = all).
    #[must_use]
    pub fn new(max_errors: usize, redactor: &'r Redactor) -> Self {
        Self {
            redactor,
            budget: ErrorBudget::new(max_errors),
            fields: Vec::new(),
            truncated: false,
            sort: false,
        }
    }

    /// Sorts the result by path then code in [`finish`](Self::finish).
    #[must_use]
    pub fn sorted(mut self, sort: bool) -> Self {
        self.sort = sort;
        self
    }

    /// Adds one violation.
    pub fn push(&mut self, mut error: FieldError) {
        if !self.budget.admit() {
            self.truncated = true;
            return;
        }
        self.redactor.apply(&mut error);
        self.fields.push(error);
    }

    /// Adds a whole stream of violations.
    pub fn extend<I: IntoIterator<Item = FieldError>>(&mut self, errors: I) {
        for error in errors {
            self.push(error);
        }
    }

    /// Merges a pre-built error field by field, inheriting its truncation.
    pub fn merge(&mut self, errors: ValidationError) {
        if errors.is_truncated() {
            self.truncated = true;
        }
        self.extend(errors);
    }

    /// Number of kept violations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// True if nothing was kept.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Builds the result, `None` when there is nothing to report.
    #[must_use]
    pub fn finish(self) -> Option<ValidationError> {
        if self.fields.is_empty() && !self.truncated {
            return None;
        }
        if self.truncated {
            tracing::debug!(
                kept = self.fields.len(),
                dropped = self.budget.dropped(),
                "validation errors truncated"
            );
        }
        let mut errors = ValidationError::from_parts(self.fields, self.truncated);
        if self.sort {
            errors.sort();
        }
        Some(errors)
    }
}

/// Aggregates several violation streams in order.
///
/// ```
/// use fieldcheck_validator::{FieldError, Redactor, aggregate::aggregate};
///
/// let tags = vec![FieldError::new("a", "tag.required", "required")];
/// let schema = vec![FieldError::new("b", "schema.type", "wrong type")];
/// let errors = aggregate([tags, schema], 1, &Redactor::none()).unwrap();
/// assert_eq!(errors.len(), 1);
/// assert!(errors.is_truncated());
/// ```
pub fn aggregate<S, I>(streams: S, max_errors: usize, redactor: &Redactor) -> Option<ValidationError>
where
    S: IntoIterator<Item = I>,
    I: IntoIterator<Item = FieldError>,
{
    let mut aggregator = Aggregator::new(max_errors, redactor);
    for stream in streams {
        aggregator.extend(stream);
    }
    aggregator.finish()
}
