//! The validation engine
//!
//! [`Validator`] ties the pieces together for one call:
//!
//! 1. fold per-call options into the configured defaults;
//! 2. select strategies from the record's capabilities;
//! 3. compute presence when validating partially;
//! 4. run the selected adapters, feeding one aggregator;
//! 5. return `Ok(())` or [`Error::Invalid`].
//!
//! A `Validator` is immutable after construction and `Send + Sync`; share
//! one per process (see [`default_validator`]) or per configuration.

use std::num::NonZeroUsize;
use std::sync::{Arc, OnceLock};

use serde_json::Value;

use crate::aggregate::Aggregator;
use crate::config::{ValidateOptions, ValidatorBuilder, ValidatorConfig};
use crate::error::{Error, FieldError, Result, ValidationError};
use crate::filter;
use crate::inspect::FieldKind;
use crate::interface;
use crate::presence::{self, PresenceMap};
use crate::record::Record;
use crate::redact::Redactor;
use crate::schema::{JsonSchemaCompiler, SchemaCache, SchemaCompiler, SchemaViolation};
use crate::strategy::{self, StrategyKind};
use crate::tags::TagRules;

/// Multi-strategy record validator.
///
/// ```
/// use fieldcheck_validator::{tags, FieldTag, Record, Validator};
/// use serde::Serialize;
///
/// #[derive(Serialize)]
/// struct Signup {
///     email: String,
///     age: u32,
/// }
///
/// impl Record for Signup {
///     fn tags() -> Option<&'static [FieldTag]> {
///         Some(tags!["email" => "required,email", "age" => "min=18"])
///     }
/// }
///
/// let validator = Validator::new();
/// let err = validator
///     .validate(&Signup { email: "nope".into(), age: 12 })
///     .unwrap_err();
/// let errors = err.as_validation().unwrap();
/// assert_eq!(errors.codes(), ["tag.email", "tag.min"]);
/// ```
pub struct Validator {
    config: ValidatorConfig,
    redactor: Redactor,
    tag_rules: TagRules,
    compiler: Arc<dyn SchemaCompiler>,
    schemas: SchemaCache,
}

impl Validator {
    /// A validator with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a [`ValidatorBuilder`].
    #[must_use]
    pub fn builder() -> ValidatorBuilder {
        ValidatorBuilder::new()
    }

    pub(crate) fn from_parts(
        config: ValidatorConfig,
        redactor: Redactor,
        tag_rules: TagRules,
        compiler: Arc<dyn SchemaCompiler>,
        schemas: SchemaCache,
    ) -> Self {
        Self {
            config,
            redactor,
            tag_rules,
            compiler,
            schemas,
        }
    }

    /// The configured defaults.
    #[must_use]
    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    /// The compiled-schema cache.
    #[must_use]
    pub fn schema_cache(&self) -> &SchemaCache {
        &self.schemas
    }

    /// Custom rules and message overrides in force.
    #[must_use]
    pub fn tag_rules(&self) -> &TagRules {
        &self.tag_rules
    }

    // ------------------------------------------------------------------------
    // Entry points
    // ------------------------------------------------------------------------

    /// Validates the whole record.
    pub fn validate<R: Record + ?Sized>(&self, record: &R) -> Result<()> {
        self.validate_with(record, &ValidateOptions::new())
    }

    /// Validates only the fields present in `raw`, the JSON document the
    /// record was decoded from.
    ///
    /// ```
    /// use fieldcheck_validator::{tags, FieldTag, Record, Validator};
    /// use serde::Serialize;
    ///
    /// #[derive(Serialize, Default)]
    /// struct Patch {
    ///     name: String,
    ///     email: String,
    /// }
    ///
    /// impl Record for Patch {
    ///     fn tags() -> Option<&'static [FieldTag]> {
    ///         Some(tags!["name" => "required", "email" => "required,email"])
    ///     }
    /// }
    ///
    /// let raw = br#"{"email": "a@b.co"}"#;
    /// let patch = Patch { email: "a@b.co".into(), ..Patch::default() };
    /// assert!(Validator::new().validate_partial(&patch, raw).is_ok());
    /// ```
    pub fn validate_partial<R: Record + ?Sized>(&self, record: &R, raw: &[u8]) -> Result<()> {
        self.validate_with(record, &ValidateOptions::new().with_raw(raw))
    }

    /// Validates an optional record; `None` reports `nil_pointer`.
    pub fn validate_opt<R: Record + ?Sized>(&self, record: Option<&R>) -> Result<()> {
        self.validate_opt_with(record, &ValidateOptions::new())
    }

    /// [`validate_opt`](Self::validate_opt) with per-call options.
    ///
    /// A `None` record reports `nil_pointer` before any strategy is
    /// selected, so a forced strategy the record type cannot satisfy still
    /// yields the nil error.
    pub fn validate_opt_with<R: Record + ?Sized>(
        &self,
        record: Option<&R>,
        options: &ValidateOptions<'_>,
    ) -> Result<()> {
        match record {
            Some(record) => self.validate_with(record, options),
            None => Err(Error::Invalid(FieldError::nil_pointer().into())),
        }
    }

    /// Computes the presence map of `raw` under this validator's limits.
    pub fn compute_presence(&self, raw: &[u8]) -> Result<PresenceMap> {
        presence::compute_presence(raw, &self.config.limits)
    }

    /// Checks the tag rules of `R` without validating any data.
    pub fn check_tags<R: Record + ?Sized>(&self) -> Result<()> {
        R::tags().map_or(Ok(()), |tags| self.tag_rules.check(tags))
    }

    /// Validates with per-call options.
    pub fn validate_with<R: Record + ?Sized>(
        &self,
        record: &R,
        options: &ValidateOptions<'_>,
    ) -> Result<()> {
        let effective = self.config.effective(options);
        let record_name = R::record_name();

        let schema = options.schema.clone().or_else(R::schema);
        let mut capabilities = record.capabilities();
        capabilities.schema = schema.is_some();

        let kinds = strategy::select(
            capabilities,
            effective.strategy,
            effective.run_all,
            record_name,
        )?;
        tracing::debug!(
            record = record_name,
            strategy = %effective.strategy,
            run_all = effective.run_all,
            ?kinds,
            partial = options.is_partial(),
            "strategies selected"
        );

        // Input and limit errors are reported even when nothing will run.
        let computed;
        let presence = match (options.presence, options.raw) {
            (Some(presence), _) => Some(presence),
            (None, Some(raw)) => {
                computed = presence::compute_presence(raw, &effective.limits)?;
                Some(&computed)
            }
            (None, None) => None,
        };
        if kinds.is_empty() {
            return Ok(());
        }
        let scope = presence.map(|p| (p, effective.partial_mode));

        let root = if kinds
            .iter()
            .any(|k| matches!(k, StrategyKind::Tags | StrategyKind::Schema))
        {
            Some(serialize(record)?)
        } else {
            None
        };

        let mut aggregator =
            Aggregator::new(effective.limits.max_errors, &self.redactor).sorted(effective.sort_errors);

        for kind in kinds {
            match kind {
                StrategyKind::ContextMethod | StrategyKind::PlainMethod => {
                    let Some(errors) = interface::run(record, kind, options.context) else {
                        continue;
                    };
                    match scope {
                        Some((presence, mode)) => {
                            let truncated = errors.is_truncated();
                            let kept = filter::filter(errors.into_fields(), presence, mode);
                            aggregator.merge(ValidationError::from_parts(kept, truncated));
                        }
                        None => aggregator.merge(errors),
                    }
                }
                StrategyKind::Tags => {
                    let (Some(value), Some(tags)) = (root.as_ref(), R::tags()) else {
                        continue;
                    };
                    let errors =
                        self.tag_rules
                            .violations(value, tags, scope, effective.limits.max_depth)?;
                    aggregator.extend(errors);
                }
                StrategyKind::Schema => {
                    let (Some(value), Some(source)) = (root.as_ref(), schema.as_ref()) else {
                        continue;
                    };
                    let matcher = self.schemas.get_or_compile(source, self.compiler.as_ref())?;
                    let errors = matcher
                        .violations(value)
                        .into_iter()
                        .map(SchemaViolation::into_field_error);
                    match scope {
                        Some((presence, mode)) => {
                            aggregator.extend(filter::filter(errors, presence, mode));
                        }
                        None => aggregator.extend(errors),
                    }
                }
            }
        }

        match aggregator.finish() {
            Some(errors) => {
                tracing::debug!(record = record_name, errors = errors.len(), "validation failed");
                Err(Error::Invalid(errors))
            }
            None => Ok(()),
        }
    }
}

/// Serializes a record to the value the tag and schema strategies inspect.
fn serialize<R: Record + ?Sized>(record: &R) -> Result<Value> {
    let value = serde_json::to_value(record).map_err(|e| Error::MalformedInput {
        reason: e.to_string(),
    })?;
    if value.is_object() {
        Ok(value)
    } else {
        Err(Error::NotAnObject {
            found: FieldKind::of(Some(&value)).as_str(),
        })
    }
}

impl Default for Validator {
    fn default() -> Self {
        let config = ValidatorConfig::default();
        let capacity =
            NonZeroUsize::new(config.limits.max_cached_schemas).unwrap_or(NonZeroUsize::MIN);
        Self::from_parts(
            config,
            Redactor::none(),
            TagRules::new(),
            Arc::new(JsonSchemaCompiler),
            SchemaCache::with_capacity(capacity),
        )
    }
}

impl std::fmt::Debug for Validator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Validator")
            .field("config", &self.config)
            .field("redactor", &self.redactor)
            .field("tag_rules", &self.tag_rules)
            .field("schemas", &self.schemas)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// PROCESS-WIDE DEFAULT
// ============================================================================

static DEFAULT: OnceLock<Validator> = OnceLock::new();

/// The lazily-built process-wide validator with default configuration.
pub fn default_validator() -> &'static Validator {
    DEFAULT.get_or_init(Validator::new)
}

/// Validates `record` with the [`default_validator`].
pub fn validate<R: Record + ?Sized>(record: &R) -> Result<()> {
    default_validator().validate(record)
}

/// Partially validates `record` with the [`default_validator`].
pub fn validate_partial<R: Record + ?Sized>(record: &R, raw: &[u8]) -> Result<()> {
    default_validator().validate_partial(record, raw)
}
