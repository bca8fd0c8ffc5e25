//! Compiled-schema cache
//!
//! Bounded LRU keyed by schema id. Compilation runs outside the lock, so two
//! threads missing on the same id at once may both compile; the first to
//! insert wins and the other result is dropped. Compiled matchers are
//! shared (`Arc`) and read-only after construction.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use lru::LruCache;
use parking_lot::Mutex;
use serde::Serialize;

use super::{SchemaBody, SchemaCompiler, SchemaMatcher, SchemaSource};
use crate::error::{Error, Result};

// ============================================================================
// STATS
// ============================================================================

/// Point-in-time cache counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Lookups served from the cache.
    pub hits: u64,
    /// Lookups that had to compile.
    pub misses: u64,
    /// Successful compilations.
    pub compilations: u64,
    /// Entries pushed out by capacity.
    pub evictions: u64,
    /// Entries currently cached.
    pub entries: usize,
    /// Maximum number of entries.
    pub capacity: usize,
}

impl CacheStats {
    /// Fraction of lookups served from the cache, `0.0` before any lookup.
    #[must_use]
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    compilations: AtomicU64,
    evictions: AtomicU64,
}

// ============================================================================
// CACHE
// ============================================================================

/// Thread-safe LRU of compiled schemas.
pub struct SchemaCache {
    entries: Mutex<LruCache<String, Arc<dyn SchemaMatcher>>>,
    counters: Counters,
}

impl SchemaCache {
    /// Creates a cache holding at most `capacity` schemas.
    pub fn new(capacity: usize) -> Result<Self> {
        let capacity = NonZeroUsize::new(capacity)
            .ok_or_else(|| Error::config("schema cache capacity must be greater than zero"))?;
        Ok(Self::with_capacity(capacity))
    }

    /// Creates a cache from an already-checked capacity.
    #[must_use]
    pub fn with_capacity(capacity: NonZeroUsize) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            counters: Counters::default(),
        }
    }

    /// Returns the compiled schema for `source`, compiling it on a miss.
    ///
    /// Text bodies are parsed only on a miss. Parse and compile failures
    /// are not cached.
    pub fn get_or_compile(
        &self,
        source: &SchemaSource,
        compiler: &dyn SchemaCompiler,
    ) -> Result<Arc<dyn SchemaMatcher>> {
        let id = source.id();
        if let Some(found) = self.entries.lock().get(id) {
            self.counters.hits.fetch_add(1, Ordering::Relaxed);
            tracing::trace!(schema_id = %id, "schema cache hit");
            return Ok(Arc::clone(found));
        }
        self.counters.misses.fetch_add(1, Ordering::Relaxed);

        let compile_error = |reason: String| Error::SchemaCompile {
            schema_id: id.to_owned(),
            reason,
        };
        let parsed: serde_json::Value;
        let document = match source.body() {
            SchemaBody::Json(value) => value.as_ref(),
            SchemaBody::Text(text) => {
                parsed = serde_json::from_str(text).map_err(|e| compile_error(e.to_string()))?;
                &parsed
            }
        };
        let compiled = compiler.compile(id, document).map_err(compile_error)?;
        self.counters.compilations.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(schema_id = %id, "schema compiled");

        let mut entries = self.entries.lock();
        if let Some(existing) = entries.get(id) {
            return Ok(Arc::clone(existing));
        }
        if let Some((evicted, _)) = entries.push(id.to_owned(), Arc::clone(&compiled))
            && evicted != id
        {
            self.counters.evictions.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(schema_id = %evicted, "schema evicted");
        }
        Ok(compiled)
    }

    /// Whether `id` is cached. Does not touch recency.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.entries.lock().contains(id)
    }

    /// Number of cached schemas.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// True if nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Maximum number of cached schemas.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.entries.lock().cap().get()
    }

    /// Drops every cached schema. Counters are kept.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// Snapshot of the counters.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        let entries = self.entries.lock();
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            compilations: self.counters.compilations.load(Ordering::Relaxed),
            evictions: self.counters.evictions.load(Ordering::Relaxed),
            entries: entries.len(),
            capacity: entries.cap().get(),
        }
    }
}

impl std::fmt::Debug for SchemaCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaCache")
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SchemaViolation;
    use serde_json::{Value, json};
    use std::sync::atomic::AtomicUsize;

    struct Accepting;

    impl SchemaMatcher for Accepting {
        fn violations(&self, _instance: &Value) -> Vec<SchemaViolation> {
            Vec::new()
        }
    }

    #[derive(Default)]
    struct Counting {
        calls: AtomicUsize,
    }

    impl SchemaCompiler for Counting {
        fn compile(&self, _id: &str, schema: &Value) -> std::result::Result<Arc<dyn SchemaMatcher>, String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if schema.get("broken").is_some() {
                return Err("broken schema".to_owned());
            }
            Ok(Arc::new(Accepting))
        }
    }

    fn source(id: &'static str) -> SchemaSource {
        SchemaSource::json(id, json!({"type": "object"}))
    }

    #[test]
    fn compiles_once_per_id() {
        let cache = SchemaCache::new(4).unwrap();
        let compiler = Counting::default();
        for _ in 0..3 {
            cache.get_or_compile(&source("a"), &compiler).unwrap();
        }
        assert_eq!(compiler.calls.load(Ordering::SeqCst), 1);
        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses, stats.compilations), (2, 1, 1));
        assert!((stats.hit_rate() - 2.0 / 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn evicts_least_recently_used() {
        let cache = SchemaCache::new(2).unwrap();
        let compiler = Counting::default();
        cache.get_or_compile(&source("a"), &compiler).unwrap();
        cache.get_or_compile(&source("b"), &compiler).unwrap();
        cache.get_or_compile(&source("a"), &compiler).unwrap();
        cache.get_or_compile(&source("c"), &compiler).unwrap();

        assert!(cache.contains("a"));
        assert!(!cache.contains("b"));
        assert!(cache.contains("c"));
        assert_eq!(cache.stats().evictions, 1);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn failures_are_not_cached() {
        let cache = SchemaCache::new(2).unwrap();
        let compiler = Counting::default();
        let broken = SchemaSource::json("x", json!({"broken": true}));
        for _ in 0..2 {
            let err = cache.get_or_compile(&broken, &compiler).err().unwrap();
            assert!(matches!(err, Error::SchemaCompile { ref schema_id, .. } if schema_id == "x"));
        }
        assert_eq!(compiler.calls.load(Ordering::SeqCst), 2);
        assert!(cache.is_empty());
    }

    #[test]
    fn unparsable_text_is_a_compile_error() {
        let cache = SchemaCache::new(1).unwrap();
        let err = cache
            .get_or_compile(&SchemaSource::text("bad", "{not json"), &Counting::default())
            .err().unwrap();
        assert!(matches!(err, Error::SchemaCompile { .. }));
    }

    #[test]
    fn zero_capacity_is_rejected() {
        assert!(matches!(SchemaCache::new(0), Err(Error::Config { .. })));
    }

    #[test]
    fn clear_keeps_counters() {
        let cache = SchemaCache::new(2).unwrap();
        let compiler = Counting::default();
        cache.get_or_compile(&source("a"), &compiler).unwrap();
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.stats().misses, 1);
        assert_eq!(cache.capacity(), 2);
    }
}
