//! # fieldcheck-validator
//!
//! Multi-strategy structural validation for serde records.
//!
//! A record type declares what it can be validated with by implementing
//! [`Record`]: tag rules per field, a JSON Schema, or its own custom check
//! (with or without a [`CallContext`]). A [`Validator`] picks a strategy by
//! capability, or runs all of them, and reports every violation as one
//! [`ValidationError`].
//!
//! ## Quick Start
//!
//! ```rust
//! use fieldcheck_validator::prelude::*;
//! use serde::Serialize;
//!
//! #[derive(Serialize)]
//! struct Signup {
//!     email: String,
//!     password: String,
//! }
//!
//! impl Record for Signup {
//!     fn tags() -> Option<&'static [FieldTag]> {
//!         Some(tags![
//!             "email" => "required,email",
//!             "password" => "required,min=12",
//!         ])
//!     }
//! }
//!
//! let validator = Validator::builder()
//!     .redact_fields(["password"])
//!     .build()
//!     .unwrap();
//!
//! let err = validator
//!     .validate(&Signup { email: "a@b.co".into(), password: "hunter2".into() })
//!     .unwrap_err();
//! let field = err.as_validation().unwrap().field("password").unwrap();
//! assert_eq!(field.code(), "tag.min");
//! assert_eq!(field.value(), Some(&serde_json::json!("[REDACTED]")));
//! ```
//!
//! ## Partial Validation
//!
//! [`Validator::validate_partial`] takes the raw JSON the record was decoded
//! from and evaluates only the fields the caller actually sent; see
//! [`PartialMode`] for how container presence propagates.
//!
//! ## Modules
//!
//! - [`inspect`]: dotted paths and the depth-bounded field walker
//! - [`presence`]: which fields a raw document supplied
//! - [`filter`]: narrowing constraints to supplied fields
//! - [`tags`], [`schema`]: the declarative strategies
//! - [`strategy`]: capability-driven strategy selection
//! - [`aggregate`], [`redact`]: collecting and scrubbing violations

// Error::Invalid carries the whole ValidationError; every entry point
// returns it by value.
#![allow(clippy::result_large_err)]

#[macro_use]
mod macros;

pub mod aggregate;
pub mod config;
pub mod context;
pub mod error;
pub mod filter;
pub mod guard;
pub mod inspect;
mod interface;
pub mod prelude;
pub mod presence;
pub mod record;
pub mod redact;
pub mod schema;
pub mod strategy;
pub mod tags;
mod validator;

pub use config::{ValidateOptions, ValidatorBuilder, ValidatorConfig};
pub use context::CallContext;
pub use error::{CheckFailure, Error, ErrorKind, FieldError, Result, ValidationError};
pub use filter::PartialMode;
pub use guard::Limits;
pub use presence::PresenceMap;
pub use record::{Check, ContextCheck, Record};
pub use redact::{REDACTED, Redactor};
pub use schema::{CacheStats, JsonSchemaCompiler, SchemaCompiler, SchemaSource};
pub use strategy::Strategy;
pub use tags::{FieldTag, MessageOverride, RuleInput};
pub use validator::{Validator, default_validator, validate, validate_partial};
