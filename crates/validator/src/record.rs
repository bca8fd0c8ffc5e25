//! Record capabilities
//!
//! A type opts into validation by implementing [`Record`]. Each method
//! declares one capability; the defaults declare nothing, so a record only
//! overrides what it actually supports:
//!
//! ```
//! use fieldcheck_validator::{tags, FieldTag, Record};
//! use serde::Serialize;
//!
//! #[derive(Serialize)]
//! struct Signup {
//!     email: String,
//!     age: u32,
//! }
//!
//! impl Record for Signup {
//!     fn tags() -> Option<&'static [FieldTag]> {
//!         Some(tags![
//!             "email" => "required,email",
//!             "age" => "min=18",
//!         ])
//!     }
//! }
//! ```
//!
//! Custom checks are exposed by returning `Some(self)` from
//! [`Record::as_check`] or [`Record::as_context_check`].

use serde::Serialize;

use crate::context::CallContext;
use crate::error::CheckFailure;
use crate::schema::SchemaSource;
use crate::strategy::Capabilities;
use crate::tags::FieldTag;

/// Custom validation that needs no outside data.
pub trait Check {
    /// Validates the record.
    fn check(&self) -> Result<(), CheckFailure>;
}

/// Custom validation that reads request-scoped data.
pub trait ContextCheck {
    /// Validates the record against `ctx`.
    fn check_in(&self, ctx: &CallContext) -> Result<(), CheckFailure>;
}

/// A validatable record type.
pub trait Record: Serialize {
    /// Name used in errors and logs.
    fn record_name() -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Tag rules, one entry per field pattern.
    fn tags() -> Option<&'static [FieldTag]> {
        None
    }

    /// The JSON Schema this type conforms to.
    fn schema() -> Option<SchemaSource> {
        None
    }

    /// The record's plain custom check, if it has one.
    fn as_check(&self) -> Option<&dyn Check> {
        None
    }

    /// The record's context-aware custom check, if it has one.
    fn as_context_check(&self) -> Option<&dyn ContextCheck> {
        None
    }

    /// Capabilities derived from the methods above.
    fn capabilities(&self) -> Capabilities {
        Capabilities {
            context_method: self.as_context_check().is_some(),
            plain_method: self.as_check().is_some(),
            tags: Self::tags().is_some_and(|t| !t.is_empty()),
            schema: Self::schema().is_some(),
        }
    }
}

impl<T: Record + ?Sized> Record for &T {
    fn record_name() -> &'static str {
        T::record_name()
    }

    fn tags() -> Option<&'static [FieldTag]> {
        T::tags()
    }

    fn schema() -> Option<SchemaSource> {
        T::schema()
    }

    fn as_check(&self) -> Option<&dyn Check> {
        (**self).as_check()
    }

    fn as_context_check(&self) -> Option<&dyn ContextCheck> {
        (**self).as_context_check()
    }
}

impl<T: Record + ?Sized> Record for Box<T> {
    fn record_name() -> &'static str {
        T::record_name()
    }

    fn tags() -> Option<&'static [FieldTag]> {
        T::tags()
    }

    fn schema() -> Option<SchemaSource> {
        T::schema()
    }

    fn as_check(&self) -> Option<&dyn Check> {
        (**self).as_check()
    }

    fn as_context_check(&self) -> Option<&dyn ContextCheck> {
        (**self).as_context_check()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tags;

    #[derive(Serialize)]
    struct Plain;

    impl Record for Plain {}

    #[derive(Serialize)]
    struct Checked {
        ok: bool,
    }

    impl Check for Checked {
        fn check(&self) -> Result<(), CheckFailure> {
            if self.ok {
                Ok(())
            } else {
                Err(CheckFailure::error("not ok"))
            }
        }
    }

    impl Record for Checked {
        fn tags() -> Option<&'static [FieldTag]> {
            Some(tags!["ok" => "required"])
        }

        fn as_check(&self) -> Option<&dyn Check> {
            Some(self)
        }
    }

    #[test]
    fn defaults_declare_nothing() {
        assert_eq!(Plain.capabilities(), Capabilities::default());
    }

    #[test]
    fn overrides_show_up_as_capabilities() {
        let caps = Checked { ok: true }.capabilities();
        assert!(caps.plain_method);
        assert!(caps.tags);
        assert!(!caps.context_method);
        assert!(!caps.schema);
    }

    #[test]
    fn references_and_boxes_forward() {
        let record = Checked { ok: false };
        assert_eq!((&record).capabilities(), record.capabilities());
        assert_eq!(Box::new(Checked { ok: true }).capabilities(), record.capabilities());
        assert!(<&Checked as Record>::record_name().ends_with("Checked"));
    }
}
