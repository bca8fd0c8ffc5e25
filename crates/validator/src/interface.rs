//! Interface strategy
//!
//! Runs the record's own custom check. A context-aware check is preferred
//! over a plain one; only one of them runs per call. A plain error from the
//! check becomes a single record-level `interface.error`; a
//! [`ValidationError`] is passed through field by field.

use crate::context::CallContext;
use crate::error::{CheckFailure, FieldError, ValidationError, codes};
use crate::record::Record;
use crate::strategy::StrategyKind;

/// Runs the custom check selected by `kind`.
///
/// Returns `None` when the check passed. Without a caller-supplied context,
/// a context-aware check receives an empty one.
pub(crate) fn run<R: Record + ?Sized>(
    record: &R,
    kind: StrategyKind,
    context: Option<&CallContext>,
) -> Option<ValidationError> {
    let outcome = match kind {
        StrategyKind::ContextMethod => {
            let empty;
            let ctx = match context {
                Some(ctx) => ctx,
                None => {
                    empty = CallContext::new();
                    &empty
                }
            };
            record.as_context_check()?.check_in(ctx)
        }
        StrategyKind::PlainMethod => record.as_check()?.check(),
        StrategyKind::Tags | StrategyKind::Schema => return None,
    };
    outcome.err().map(into_validation)
}

fn into_validation(failure: CheckFailure) -> ValidationError {
    match failure {
        CheckFailure::Fields(errors) => errors,
        CheckFailure::Error(error) => {
            tracing::debug!(error = %error, "custom check failed");
            FieldError::new("", codes::INTERFACE_ERROR, error.to_string())
                .echoing_value()
                .into()
        }
    }
}
