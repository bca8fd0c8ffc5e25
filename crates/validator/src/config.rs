//! Validator configuration
//!
//! Three layers, narrowest last:
//!
//! - [`ValidatorConfig`]: serde-loadable defaults for one [`Validator`].
//! - [`ValidatorBuilder`]: config plus the parts that are code, not data
//!   (custom rules, message overrides, redaction predicate, schema engine).
//! - [`ValidateOptions`]: per-call overrides and inputs.
//!
//! Each call folds the first and last into an immutable snapshot before any
//! strategy runs, so concurrent calls never observe each other's options.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::context::CallContext;
use crate::error::{Error, Result};
use crate::filter::PartialMode;
use crate::guard::Limits;
use crate::presence::PresenceMap;
use crate::redact::Redactor;
use crate::schema::{JsonSchemaCompiler, SchemaCache, SchemaCompiler, SchemaSource};
use crate::strategy::Strategy;
use crate::tags::{MessageOverride, RuleInput, TagRules};
use crate::validator::Validator;

// ============================================================================
// VALIDATOR CONFIG
// ============================================================================

/// Data-only validator settings.
///
/// ```
/// use fieldcheck_validator::{Strategy, ValidatorConfig};
///
/// let config = ValidatorConfig::from_json_str(
///     r#"{"strategy": "tags", "limits": {"max_errors": 20}}"#,
/// ).unwrap();
/// assert_eq!(config.strategy, Strategy::Tags);
/// assert_eq!(config.limits.max_errors, 20);
/// assert_eq!(config.limits.max_depth, 100);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ValidatorConfig {
    /// Strategy to run; `auto` picks by capability.
    pub strategy: Strategy,
    /// With `auto`, run every supported strategy instead of the best one.
    pub run_all: bool,
    /// Sort reported errors by path, then code.
    pub sort_errors: bool,
    /// How container presence propagates in partial validation.
    pub partial_mode: PartialMode,
    /// Case-insensitive path fragments whose values are redacted.
    pub redact_fields: Vec<String>,
    /// Resource bounds.
    pub limits: Limits,
}

impl ValidatorConfig {
    /// Parses a JSON config document and checks it.
    pub fn from_json_str(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text).map_err(|e| Error::config(e.to_string()))?;
        config.ensure_valid()?;
        Ok(config)
    }

    /// Rejects settings the engine cannot run with.
    pub fn ensure_valid(&self) -> Result<()> {
        self.limits.ensure_valid()?;
        if self.redact_fields.iter().any(String::is_empty) {
            return Err(Error::config("redact_fields must not contain empty entries"));
        }
        Ok(())
    }

    pub(crate) fn effective(&self, options: &ValidateOptions<'_>) -> EffectiveConfig {
        let mut limits = self.limits;
        if let Some(max_errors) = options.max_errors {
            limits.max_errors = max_errors;
        }
        EffectiveConfig {
            strategy: options.strategy.unwrap_or(self.strategy),
            run_all: options.run_all.unwrap_or(self.run_all),
            sort_errors: options.sort_errors.unwrap_or(self.sort_errors),
            partial_mode: options.partial_mode.unwrap_or(self.partial_mode),
            limits,
        }
    }
}

/// Per-call snapshot of the settings in force.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct EffectiveConfig {
    pub strategy: Strategy,
    pub run_all: bool,
    pub sort_errors: bool,
    pub partial_mode: PartialMode,
    pub limits: Limits,
}

// ============================================================================
// VALIDATE OPTIONS
// ============================================================================

/// Per-call overrides and inputs.
///
/// ```
/// use fieldcheck_validator::{Strategy, ValidateOptions};
///
/// let raw = br#"{"email": "a@b.c"}"#;
/// let options = ValidateOptions::new()
///     .with_strategy(Strategy::Tags)
///     .with_raw(raw);
/// # let _ = options;
/// ```
#[derive(Debug, Clone, Default)]
pub struct ValidateOptions<'a> {
    pub(crate) strategy: Option<Strategy>,
    pub(crate) run_all: Option<bool>,
    pub(crate) max_errors: Option<usize>,
    pub(crate) sort_errors: Option<bool>,
    pub(crate) partial_mode: Option<PartialMode>,
    pub(crate) raw: Option<&'a [u8]>,
    pub(crate) presence: Option<&'a PresenceMap>,
    pub(crate) schema: Option<SchemaSource>,
    pub(crate) context: Option<&'a CallContext>,
}

impl<'a> ValidateOptions<'a> {
    /// No overrides.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the strategy.
    #[must_use = "builder methods must be chained or built"]
    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = Some(strategy);
        self
    }

    /// Overrides `run_all`.
    #[must_use = "builder methods must be chained or built"]
    pub fn with_run_all(mut self, run_all: bool) -> Self {
        self.run_all = Some(run_all);
        self
    }

    /// Overrides the reporting limit (0 = unlimited).
    #[must_use = "builder methods must be chained or built"]
    pub fn with_max_errors(mut self, max_errors: usize) -> Self {
        self.max_errors = Some(max_errors);
        self
    }

    /// Overrides error sorting.
    #[must_use = "builder methods must be chained or built"]
    pub fn with_sort_errors(mut self, sort: bool) -> Self {
        self.sort_errors = Some(sort);
        self
    }

    /// Overrides the partial mode.
    #[must_use = "builder methods must be chained or built"]
    pub fn with_partial_mode(mut self, mode: PartialMode) -> Self {
        self.partial_mode = Some(mode);
        self
    }

    /// Validates only the fields present in `raw` (a JSON object).
    #[must_use = "builder methods must be chained or built"]
    pub fn with_raw(mut self, raw: &'a [u8]) -> Self {
        self.raw = Some(raw);
        self
    }

    /// Validates only the fields in `presence`. Takes precedence over
    /// [`with_raw`](Self::with_raw).
    #[must_use = "builder methods must be chained or built"]
    pub fn with_presence(mut self, presence: &'a PresenceMap) -> Self {
        self.presence = Some(presence);
        self
    }

    /// Uses `schema` instead of the record's own.
    #[must_use = "builder methods must be chained or built"]
    pub fn with_schema(mut self, schema: SchemaSource) -> Self {
        self.schema = Some(schema);
        self
    }

    /// Hands `context` to context-aware custom checks.
    #[must_use = "builder methods must be chained or built"]
    pub fn with_context(mut self, context: &'a CallContext) -> Self {
        self.context = Some(context);
        self
    }

    /// Whether this call validates partially.
    #[must_use]
    pub fn is_partial(&self) -> bool {
        self.raw.is_some() || self.presence.is_some()
    }
}

// ============================================================================
// VALIDATOR BUILDER
// ============================================================================

/// Builds a [`Validator`].
///
/// ```
/// use fieldcheck_validator::{Strategy, Validator};
///
/// let validator = Validator::builder()
///     .strategy(Strategy::Tags)
///     .max_errors(10)
///     .redact_fields(["password", "token"])
///     .rule("even", |input| input.value.as_i64().is_some_and(|n| n % 2 == 0))
///     .message("required", "this field is required")
///     .build()
///     .unwrap();
/// assert_eq!(validator.config().limits.max_errors, 10);
/// ```
#[derive(Default)]
pub struct ValidatorBuilder {
    config: ValidatorConfig,
    redactor: Option<Redactor>,
    tag_rules: TagRules,
    compiler: Option<Arc<dyn SchemaCompiler>>,
    pending_error: Option<Error>,
}

impl ValidatorBuilder {
    /// Starts from the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the whole data configuration.
    #[must_use = "builder methods must be chained or built"]
    pub fn config(mut self, config: ValidatorConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the default strategy.
    #[must_use = "builder methods must be chained or built"]
    pub fn strategy(mut self, strategy: Strategy) -> Self {
        self.config.strategy = strategy;
        self
    }

    /// Runs every supported strategy under `auto`.
    #[must_use = "builder methods must be chained or built"]
    pub fn run_all(mut self, run_all: bool) -> Self {
        self.config.run_all = run_all;
        self
    }

    /// Sorts reported errors.
    #[must_use = "builder methods must be chained or built"]
    pub fn sort_errors(mut self, sort: bool) -> Self {
        self.config.sort_errors = sort;
        self
    }

    /// Sets the partial mode.
    #[must_use = "builder methods must be chained or built"]
    pub fn partial_mode(mut self, mode: PartialMode) -> Self {
        self.config.partial_mode = mode;
        self
    }

    /// Sets the reporting limit (0 = unlimited).
    #[must_use = "builder methods must be chained or built"]
    pub fn max_errors(mut self, max: usize) -> Self {
        self.config.limits.max_errors = max;
        self
    }

    /// Sets the field limit for presence computation.
    #[must_use = "builder methods must be chained or built"]
    pub fn max_fields(mut self, max: usize) -> Self {
        self.config.limits.max_fields = max;
        self
    }

    /// Sets the traversal depth limit.
    #[must_use = "builder methods must be chained or built"]
    pub fn max_depth(mut self, max: usize) -> Self {
        self.config.limits.max_depth = max;
        self
    }

    /// Sets the schema cache capacity.
    #[must_use = "builder methods must be chained or built"]
    pub fn max_cached_schemas(mut self, max: usize) -> Self {
        self.config.limits.max_cached_schemas = max;
        self
    }

    /// Redacts values on paths containing any of `fragments`.
    #[must_use = "builder methods must be chained or built"]
    pub fn redact_fields<I, S>(mut self, fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.redact_fields = fragments.into_iter().map(Into::into).collect();
        self
    }

    /// Uses a custom redaction predicate; replaces `redact_fields`.
    #[must_use = "builder methods must be chained or built"]
    pub fn redactor(mut self, redactor: Redactor) -> Self {
        self.redactor = Some(redactor);
        self
    }

    /// Registers a custom tag rule.
    #[must_use = "builder methods must be chained or built"]
    pub fn rule<F>(mut self, name: impl Into<String>, rule: F) -> Self
    where
        F: Fn(&RuleInput<'_>) -> bool + Send + Sync + 'static,
    {
        if let Err(error) = self.tag_rules.register(name, rule) {
            self.pending_error.get_or_insert(error);
        }
        self
    }

    /// Overrides the message of a tag rule.
    #[must_use = "builder methods must be chained or built"]
    pub fn message(mut self, rule: impl Into<String>, message: impl Into<MessageOverride>) -> Self {
        self.tag_rules.set_message(rule, message);
        self
    }

    /// Maps field paths to display names in tag messages.
    #[must_use = "builder methods must be chained or built"]
    pub fn field_namer<F>(mut self, namer: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        self.tag_rules.set_field_namer(namer);
        self
    }

    /// Replaces the schema engine.
    #[must_use = "builder methods must be chained or built"]
    pub fn schema_compiler(mut self, compiler: impl SchemaCompiler + 'static) -> Self {
        self.compiler = Some(Arc::new(compiler));
        self
    }

    /// Builds the validator.
    pub fn build(self) -> Result<Validator> {
        if let Some(error) = self.pending_error {
            return Err(error);
        }
        self.config.ensure_valid()?;

        let redactor = match self.redactor {
            Some(redactor) => redactor,
            None if self.config.redact_fields.is_empty() => Redactor::none(),
            None => Redactor::matching_any(self.config.redact_fields.iter().cloned()),
        };
        let schemas = SchemaCache::new(self.config.limits.max_cached_schemas)?;
        let compiler = self
            .compiler
            .unwrap_or_else(|| Arc::new(JsonSchemaCompiler));

        tracing::debug!(
            strategy = %self.config.strategy,
            run_all = self.config.run_all,
            max_errors = self.config.limits.max_errors,
            "validator built"
        );
        Ok(Validator::from_parts(
            self.config,
            redactor,
            self.tag_rules,
            compiler,
            schemas,
        ))
    }

    /// Builds the validator, panicking on invalid configuration.
    ///
    /// # Panics
    ///
    /// Panics if [`build`](Self::build) would fail.
    #[must_use]
    pub fn build_or_panic(self) -> Validator {
        match self.build() {
            Ok(validator) => validator,
            Err(error) => panic!("invalid validator configuration: {error}"),
        }
    }
}

impl std::fmt::Debug for ValidatorBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidatorBuilder")
            .field("config", &self.config)
            .field("redactor", &self.redactor)
            .field("tag_rules", &self.tag_rules)
            .field("custom_compiler", &self.compiler.is_some())
            .finish_non_exhaustive()
    }
}
