//! Macros for declaring tag rules with minimal boilerplate.
//!
//! # Available Macros
//!
//! - [`tags!`]: builds a `&'static [FieldTag]` from `path => rules` pairs
//!
//! # Examples
//!
//! ```rust
//! use fieldcheck_validator::{tags, FieldTag};
//!
//! const SIGNUP: &[FieldTag] = tags![
//!     "email" => "required,email",
//!     "age" => "omitempty,min=18",
//!     "tags.*" => "alphanum",
//! ];
//! assert_eq!(SIGNUP.len(), 3);
//! ```

// ============================================================================
// TAGS MACRO
// ============================================================================

/// Builds a static tag table.
///
/// Each entry maps a dotted field pattern (which may contain `*`) to a
/// comma-separated rule list. The table is a `const`, so the rules are
/// parsed per call but never allocated.
///
/// ```rust
/// use fieldcheck_validator::tags;
///
/// let table = tags!["name" => "required"];
/// assert_eq!(table[0].path, "name");
/// assert_eq!(table[0].rules, "required");
/// ```
#[macro_export]
macro_rules! tags {
    () => {{
        const TAGS: &[$crate::FieldTag] = &[];
        TAGS
    }};
    ($($path:expr => $rules:expr),+ $(,)?) => {{
        const TAGS: &[$crate::FieldTag] = &[
            $($crate::FieldTag::new($path, $rules)),+
        ];
        TAGS
    }};
}
