//! Call context for context-aware custom checks
//!
//! Request-scoped data (tenant, principal, feature flags) travels to a
//! record's [`ContextCheck`](crate::record::ContextCheck) through a
//! [`CallContext`]. The engine never looks inside it.
//!
//! # Examples
//!
//! ```
//! use fieldcheck_validator::CallContext;
//!
//! struct Tenant(&'static str);
//!
//! let mut ctx = CallContext::new();
//! ctx.insert("tenant", Tenant("acme"));
//! assert_eq!(ctx.get::<Tenant>("tenant").map(|t| t.0), Some("acme"));
//! ```

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

/// Typed key/value store with an optional parent.
#[derive(Debug, Default)]
pub struct CallContext {
    data: HashMap<String, Box<dyn Any + Send + Sync>>,
    parent: Option<Arc<CallContext>>,
}

impl CallContext {
    /// Creates an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a context that falls back to `parent` on lookups.
    #[must_use]
    pub fn with_parent(parent: Arc<CallContext>) -> Self {
        Self {
            data: HashMap::new(),
            parent: Some(parent),
        }
    }

    /// Stores a value under `key`.
    pub fn insert<T: Send + Sync + 'static>(&mut self, key: impl Into<String>, value: T) {
        self.data.insert(key.into(), Box::new(value));
    }

    /// Builder-style [`insert`](Self::insert).
    #[must_use = "builder methods must be chained or built"]
    pub fn with<T: Send + Sync + 'static>(mut self, key: impl Into<String>, value: T) -> Self {
        self.insert(key, value);
        self
    }

    /// Looks up `key` here, then in the parent chain.
    ///
    /// Returns `None` if the key is missing or holds a different type.
    #[must_use]
    pub fn get<T: 'static>(&self, key: &str) -> Option<&T> {
        match self.data.get(key) {
            Some(value) => value.downcast_ref::<T>(),
            None => self.parent.as_ref().and_then(|p| p.get(key)),
        }
    }

    /// Whether `key` exists here or in the parent chain.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.data.contains_key(key) || self.parent.as_ref().is_some_and(|p| p.contains(key))
    }

    /// Number of local entries (parents excluded).
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True if there are no local entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
