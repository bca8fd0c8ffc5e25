//! Rule list grammar
//!
//! A rule list is comma-separated; each entry is `name` or `name=param`.
//! Whitespace around entries and names is ignored. `oneof` takes a
//! space-separated list as its parameter.

use crate::error::{Error, Result};

use super::{FieldTag, builtin};

/// One parsed entry of a rule list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RuleSpec<'t> {
    pub name: &'t str,
    pub param: Option<&'t str>,
}

/// Parses and checks the rules of `tag`.
///
/// Names accepted by `is_custom` skip parameter checking; every other name
/// must be a built-in rule with a well-formed parameter.
pub(crate) fn parse(
    tag: &FieldTag,
    is_custom: impl Fn(&str) -> bool,
) -> Result<Vec<RuleSpec<'static>>> {
    let invalid = |rule: &str, reason: String| Error::InvalidTag {
        path: tag.path.to_owned(),
        rule: rule.to_owned(),
        reason,
    };

    let mut specs = Vec::new();
    for entry in tag.rules.split(',') {
        let entry = entry.trim();
        let (name, param) = match entry.split_once('=') {
            Some((name, param)) => (name.trim(), Some(param.trim())),
            None => (entry, None),
        };
        if name.is_empty() {
            return Err(invalid(entry, "empty rule name".to_owned()));
        }
        if !is_custom(name) {
            builtin::check(name, param).map_err(|reason| invalid(name, reason))?;
        }
        specs.push(RuleSpec { name, param });
    }
    Ok(specs)
}
