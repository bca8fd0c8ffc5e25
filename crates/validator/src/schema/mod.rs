//! Schema strategy
//!
//! A record declares a JSON Schema through [`Record::schema`](crate::Record::schema),
//! or the caller hands one in per call. Schemas are compiled once per id and
//! kept in a [`SchemaCache`]; the compiled form is matched against the
//! record's serialized value.
//!
//! Compilation goes through [`SchemaCompiler`], so the schema engine is
//! replaceable. The default, [`JsonSchemaCompiler`], uses the `jsonschema`
//! crate with draft auto-detection.

mod cache;

use std::borrow::Cow;
use std::sync::Arc;

use jsonschema::error::ValidationErrorKind;
use serde_json::Value;

use crate::error::{FieldError, codes, meta_keys};
use crate::inspect;

pub use self::cache::{CacheStats, SchemaCache};

// ============================================================================
// SOURCES
// ============================================================================

/// Body of a schema declaration.
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaBody {
    /// JSON text, parsed on first use.
    Text(Cow<'static, str>),
    /// An already-parsed document.
    Json(Arc<Value>),
}

/// A schema plus the id it is cached under.
///
/// Two sources with the same id are assumed to be the same schema.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaSource {
    id: Cow<'static, str>,
    body: SchemaBody,
}

impl SchemaSource {
    /// A schema given as JSON text.
    ///
    /// ```
    /// use fieldcheck_validator::SchemaSource;
    ///
    /// let source = SchemaSource::text("signup.v1", r#"{"type": "object"}"#);
    /// assert_eq!(source.id(), "signup.v1");
    /// ```
    pub fn text(id: impl Into<Cow<'static, str>>, text: impl Into<Cow<'static, str>>) -> Self {
        Self {
            id: id.into(),
            body: SchemaBody::Text(text.into()),
        }
    }

    /// A schema given as a parsed document.
    pub fn json(id: impl Into<Cow<'static, str>>, document: Value) -> Self {
        Self {
            id: id.into(),
            body: SchemaBody::Json(Arc::new(document)),
        }
    }

    /// Cache key.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The declaration body.
    #[must_use]
    pub fn body(&self) -> &SchemaBody {
        &self.body
    }
}

// ============================================================================
// ENGINE SEAM
// ============================================================================

/// One schema keyword failure.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaViolation {
    /// Dotted path of the offending field.
    pub path: String,
    /// Failing keyword, e.g. `type` or `required`.
    pub keyword: String,
    /// Engine message; may quote the value.
    pub detail: String,
    /// The offending value; `None` for missing fields.
    pub value: Option<Value>,
}

impl SchemaViolation {
    /// Converts into the shared error shape (`schema.<keyword>`).
    #[must_use]
    pub fn into_field_error(self) -> FieldError {
        let error = FieldError::new(
            self.path,
            format!("{}{}", codes::SCHEMA_PREFIX, self.keyword),
            self.detail,
        )
        .with_meta(meta_keys::TAG, self.keyword)
        .echoing_value();
        match self.value {
            Some(value) => error.with_value(value),
            None => error,
        }
    }
}

/// A compiled schema.
pub trait SchemaMatcher: Send + Sync {
    /// Every violation of `instance`, in engine order.
    fn violations(&self, instance: &Value) -> Vec<SchemaViolation>;
}

/// Turns schema documents into matchers.
pub trait SchemaCompiler: Send + Sync {
    /// Compiles `schema`; the error string becomes
    /// [`Error::SchemaCompile`](crate::Error::SchemaCompile).
    fn compile(&self, id: &str, schema: &Value) -> Result<Arc<dyn SchemaMatcher>, String>;
}

// ============================================================================
// JSONSCHEMA ENGINE
// ============================================================================

/// [`SchemaCompiler`] backed by the `jsonschema` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSchemaCompiler;

struct JsonSchemaMatcher {
    validator: jsonschema::Validator,
}

impl SchemaCompiler for JsonSchemaCompiler {
    fn compile(&self, _id: &str, schema: &Value) -> Result<Arc<dyn SchemaMatcher>, String> {
        let validator = jsonschema::validator_for(schema).map_err(|e| e.to_string())?;
        Ok(Arc::new(JsonSchemaMatcher { validator }))
    }
}

impl SchemaMatcher for JsonSchemaMatcher {
    fn violations(&self, instance: &Value) -> Vec<SchemaViolation> {
        self.validator
            .iter_errors(instance)
            .map(|e| {
                let keyword = keyword_of(&e);
                let base = pointer_to_path(&e.instance_path.to_string());
                let missing = match &e.kind {
                    ValidationErrorKind::Required { property } => {
                        property.as_str().map(str::to_owned)
                    }
                    _ => None,
                };
                let detail = e.to_string();
                match missing {
                    Some(property) => SchemaViolation {
                        path: inspect::join(&base, &property),
                        keyword,
                        detail,
                        value: None,
                    },
                    None => SchemaViolation {
                        path: base,
                        keyword,
                        detail,
                        value: Some(e.instance.into_owned()),
                    },
                }
            })
            .collect()
    }
}

// A `false` subschema fails under its property name or index, not under a
// keyword, so its schema path says nothing about what rejected the value.
fn keyword_of(error: &jsonschema::ValidationError<'_>) -> String {
    if matches!(error.kind, ValidationErrorKind::FalseSchema) {
        return "false".to_owned();
    }
    error
        .schema_path
        .to_string()
        .rsplit('/')
        .find(|s| !s.is_empty())
        .unwrap_or("schema")
        .to_owned()
}

/// Converts a JSON pointer (`/items/0/price`) to a dotted path.
#[must_use]
pub fn pointer_to_path(pointer: &str) -> String {
    pointer
        .split('/')
        .skip(1)
        .map(|segment| segment.replace("~1", "/").replace("~0", "~"))
        .collect::<Vec<_>>()
        .join(".")
}
