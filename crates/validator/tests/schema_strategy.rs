//! Schema strategy and compiled-schema caching.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use fieldcheck_validator::prelude::*;
use fieldcheck_validator::schema::{SchemaMatcher, SchemaViolation};
use fieldcheck_validator::{JsonSchemaCompiler, REDACTED, SchemaCompiler};
use pretty_assertions::assert_eq;
use serde::Serialize;
use serde_json::{Value, json};

#[derive(Serialize)]
struct Invoice {
    number: String,
    total: f64,
    lines: Vec<Line>,
}

#[derive(Serialize)]
struct Line {
    qty: i64,
}

const INVOICE_SCHEMA: &str = r#"{
    "type": "object",
    "required": ["number", "total"],
    "properties": {
        "number": {"type": "string", "pattern": "^INV-[0-9]+$"},
        "total": {"type": "number", "minimum": 0},
        "lines": {
            "type": "array",
            "items": {"type": "object", "properties": {"qty": {"minimum": 1}}}
        }
    }
}"#;

impl Record for Invoice {
    fn schema() -> Option<SchemaSource> {
        Some(SchemaSource::text("invoice.v1", INVOICE_SCHEMA))
    }
}

/// Delegates to the real engine while counting compilations.
#[derive(Clone, Default)]
struct CountingCompiler {
    compiles: Arc<AtomicUsize>,
}

impl SchemaCompiler for CountingCompiler {
    fn compile(&self, id: &str, schema: &Value) -> Result<Arc<dyn SchemaMatcher>, String> {
        self.compiles.fetch_add(1, Ordering::SeqCst);
        JsonSchemaCompiler.compile(id, schema)
    }
}

fn bad_invoice() -> Invoice {
    Invoice {
        number: "42".into(),
        total: -1.0,
        lines: vec![Line { qty: 2 }, Line { qty: 0 }],
    }
}

#[test]
fn schema_violations_become_field_errors() {
    let err = Validator::new().validate(&bad_invoice()).unwrap_err();
    let errors = err.as_validation().unwrap();
    let mut found: Vec<_> = errors.iter().map(|e| (e.path(), e.code())).collect();
    found.sort_unstable();
    assert_eq!(
        found,
        [
            ("lines.1.qty", "schema.minimum"),
            ("number", "schema.pattern"),
            ("total", "schema.minimum"),
        ]
    );
    assert_eq!(errors.field("number").unwrap().value(), Some(&json!("42")));
}

#[test]
fn one_compile_per_schema_id() {
    let compiler = CountingCompiler::default();
    let validator = Validator::builder()
        .schema_compiler(compiler.clone())
        .build()
        .unwrap();
    for _ in 0..5 {
        let _ = validator.validate(&bad_invoice());
    }
    assert_eq!(compiler.compiles.load(Ordering::SeqCst), 1);
    let stats = validator.schema_cache().stats();
    assert_eq!(stats.hits, 4);
    assert_eq!(stats.entries, 1);
}

#[test]
fn least_recently_used_schema_is_evicted() {
    let compiler = CountingCompiler::default();
    let validator = Validator::builder()
        .max_cached_schemas(2)
        .schema_compiler(compiler.clone())
        .build()
        .unwrap();

    #[derive(Serialize)]
    struct Bare {
        n: i64,
    }
    impl Record for Bare {}

    let run = |id: &'static str| {
        let options = ValidateOptions::new().with_schema(SchemaSource::json(id, json!({"type": "object"})));
        validator.validate_with(&Bare { n: 1 }, &options).unwrap();
    };
    run("a");
    run("b");
    run("a");
    run("c");
    run("a");

    let cache = validator.schema_cache();
    assert!(cache.contains("a"));
    assert!(!cache.contains("b"));
    assert!(cache.contains("c"));
    assert_eq!(compiler.compiles.load(Ordering::SeqCst), 3);
    assert_eq!(cache.stats().evictions, 1);
}

#[test]
fn schema_messages_are_scrubbed_on_sensitive_paths() {
    #[derive(Serialize)]
    struct Login {
        pin: String,
    }
    impl Record for Login {
        fn schema() -> Option<SchemaSource> {
            Some(SchemaSource::json(
                "login",
                json!({"properties": {"pin": {"pattern": "^[0-9]{4}$"}}}),
            ))
        }
    }

    let validator = Validator::builder().redact_fields(["pin"]).build().unwrap();
    let err = validator.validate(&Login { pin: "abcd-secret".into() }).unwrap_err();
    let field = err.as_validation().unwrap().field("pin").unwrap();
    assert_eq!(field.value(), Some(&json!(REDACTED)));
    assert!(!field.message().contains("abcd-secret"));
}

#[test]
fn container_values_holding_sensitive_fields_are_scrubbed() {
    #[derive(Serialize)]
    struct Account {
        password: String,
        login: String,
    }
    #[derive(Serialize)]
    struct Signup {
        account: Account,
    }
    impl Record for Signup {
        fn schema() -> Option<SchemaSource> {
            Some(SchemaSource::json(
                "signup",
                json!({
                    "properties": {"account": {"type": "string"}},
                    "additionalProperties": false,
                    "required": ["account"]
                }),
            ))
        }
    }

    let validator = Validator::builder().redact_fields(["password"]).build().unwrap();
    let signup = Signup {
        account: Account {
            password: "hunter2-secret".into(),
            login: "ann".into(),
        },
    };
    let err = validator.validate(&signup).unwrap_err();
    let errors = err.as_validation().unwrap();
    let field = errors.field("account").unwrap();
    assert_eq!(field.code(), "schema.type");
    assert_eq!(field.value(), Some(&json!(REDACTED)));
    assert!(!field.message().contains("hunter2-secret"));
    assert!(!serde_json::to_string(errors).unwrap().contains("hunter2-secret"));
}

#[test]
fn broken_schema_is_a_configuration_error() {
    #[derive(Serialize)]
    struct Odd {
        x: i64,
    }
    impl Record for Odd {
        fn schema() -> Option<SchemaSource> {
            Some(SchemaSource::text("odd", "{\"type\": "))
        }
    }

    let err = Validator::new().validate(&Odd { x: 1 }).unwrap_err();
    assert!(matches!(err, Error::SchemaCompile { ref schema_id, .. } if schema_id == "odd"));
}

#[test]
fn forcing_a_missing_strategy_fails() {
    let validator = Validator::builder().strategy(Strategy::Tags).build().unwrap();
    let err = validator.validate(&bad_invoice()).unwrap_err();
    assert!(matches!(err, Error::UnsupportedStrategy { strategy: Strategy::Tags, .. }));
}

#[test]
fn custom_matchers_plug_in() {
    struct AlwaysOne;
    impl SchemaMatcher for AlwaysOne {
        fn violations(&self, _instance: &Value) -> Vec<SchemaViolation> {
            vec![SchemaViolation {
                path: "total".into(),
                keyword: "custom".into(),
                detail: "always fails".into(),
                value: None,
            }]
        }
    }
    struct Fixed;
    impl SchemaCompiler for Fixed {
        fn compile(&self, _id: &str, _schema: &Value) -> Result<Arc<dyn SchemaMatcher>, String> {
            Ok(Arc::new(AlwaysOne))
        }
    }

    let validator = Validator::builder().schema_compiler(Fixed).build().unwrap();
    let err = validator.validate(&bad_invoice()).unwrap_err();
    assert_eq!(err.as_validation().unwrap().codes(), ["schema.custom"]);
}
