//! Resource bounds for attacker-controlled input
//!
//! Every bound the engine enforces lives in [`Limits`]. The presence
//! analyzer charges a [`FieldBudget`] per recorded path and consults
//! [`Limits::allows_depth`] per pushed frame, the schema cache is sized by
//! `max_cached_schemas`, and the aggregator draws from an [`ErrorBudget`].

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default maximum traversal depth.
pub const DEFAULT_MAX_DEPTH: usize = 100;

/// Default maximum number of fields in one input.
pub const DEFAULT_MAX_FIELDS: usize = 10_000;

/// Default schema cache capacity.
pub const DEFAULT_MAX_CACHED_SCHEMAS: usize = 1024;

/// Numeric limits. `max_errors == 0` means unlimited; the others must be positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Limits {
    /// Maximum number of reported field errors (0 = no limit).
    pub max_errors: usize,
    /// Maximum number of paths recorded while computing presence.
    pub max_fields: usize,
    /// Maximum nesting depth descended into.
    pub max_depth: usize,
    /// Schema cache capacity.
    pub max_cached_schemas: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_errors: 0,
            max_fields: DEFAULT_MAX_FIELDS,
            max_depth: DEFAULT_MAX_DEPTH,
            max_cached_schemas: DEFAULT_MAX_CACHED_SCHEMAS,
        }
    }
}

impl Limits {
    /// Rejects limits that would make the engine unusable.
    pub fn ensure_valid(&self) -> Result<()> {
        if self.max_fields == 0 {
            return Err(Error::config("max_fields must be greater than zero"));
        }
        if self.max_depth == 0 {
            return Err(Error::config("max_depth must be greater than zero"));
        }
        if self.max_cached_schemas == 0 {
            return Err(Error::config("max_cached_schemas must be greater than zero"));
        }
        Ok(())
    }

    /// Whether a node at `depth` (root children are depth 1) may be visited.
    #[must_use]
    pub const fn allows_depth(&self, depth: usize) -> bool {
        depth <= self.max_depth
    }
}

// ============================================================================
// BUDGETS
// ============================================================================

/// Counts recorded fields against `max_fields`.
#[derive(Debug, Clone, Copy)]
pub struct FieldBudget {
    limit: usize,
    used: usize,
}

impl FieldBudget {
    /// Creates a budget with `limit` fields.
    #[must_use]
    pub const fn new(limit: usize) -> Self {
        Self { limit, used: 0 }
    }

    /// Charges one field; fails once the limit is exceeded.
    pub fn charge(&mut self) -> Result<()> {
        self.used += 1;
        if self.used > self.limit {
            return Err(Error::FieldLimitExceeded { limit: self.limit });
        }
        Ok(())
    }

    /// Fields charged so far.
    #[must_use]
    pub const fn used(&self) -> usize {
        self.used
    }
}

/// Counts reported errors against `max_errors`.
#[derive(Debug, Clone, Copy)]
pub struct ErrorBudget {
    limit: usize,
    admitted: usize,
    dropped: usize,
}

impl ErrorBudget {
    /// Creates a budget; `limit == 0` admits everything.
    #[must_use]
    pub const fn new(limit: usize) -> Self {
        Self {
            limit,
            admitted: 0,
            dropped: 0,
        }
    }

    /// Returns true if one more error may be kept.
    pub fn admit(&mut self) -> bool {
        if self.limit > 0 && self.admitted >= self.limit {
            self.dropped += 1;
            return false;
        }
        self.admitted += 1;
        true
    }

    /// Errors that were refused.
    #[must_use]
    pub const fn dropped(&self) -> usize {
        self.dropped
    }
}
