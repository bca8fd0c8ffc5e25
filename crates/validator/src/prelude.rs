//! Prelude module for convenient imports.
//!
//! Provides a single `use fieldcheck_validator::prelude::*;` import that
//! brings in the traits and types needed to declare and validate records.
//!
//! # Examples
//!
//! ```rust
//! use fieldcheck_validator::prelude::*;
//!
//! let validator = Validator::builder().strategy(Strategy::Tags).build().unwrap();
//! # let _ = validator;
//! ```

// ============================================================================
// DECLARING RECORDS
// ============================================================================

pub use crate::record::{Check, ContextCheck, Record};
pub use crate::schema::SchemaSource;
pub use crate::tags;
pub use crate::tags::FieldTag;

// ============================================================================
// VALIDATING
// ============================================================================

pub use crate::config::{ValidateOptions, ValidatorConfig};
pub use crate::context::CallContext;
pub use crate::filter::PartialMode;
pub use crate::strategy::Strategy;
pub use crate::validator::Validator;

// ============================================================================
// ERRORS
// ============================================================================

pub use crate::error::{CheckFailure, Error, FieldError, ValidationError};
