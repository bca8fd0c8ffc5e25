//! Tag rules
//!
//! A record declares rules per field pattern with [`tags!`](crate::tags!).
//! Patterns are dotted paths over the record's serialized form; `*` matches
//! every element of an array or every value of a map, at any position.
//!
//! Evaluation per resolved field:
//!
//! 1. `omitempty` on a zero value skips the field entirely.
//! 2. Rules run left to right and stop at the first failure.
//! 3. `required` fails on a missing or zero value; every other built-in
//!    rule passes on a missing or `null` value.
//! 4. Custom rules see every value, `null` included.
//!
//! Nested patterns resolve only below existing containers: a rule on
//! `address.city` does nothing when `address` is absent or `null`. Put
//! `required` on `address` itself to demand it.

pub(crate) mod builtin;
mod grammar;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::error::{Error, FieldError, Result, codes, meta_keys};
use crate::filter::{self, PartialMode};
use crate::inspect::{self, FieldKind, FieldWalker, WILDCARD};
use crate::presence::PresenceMap;

use self::grammar::RuleSpec;

static NULL: Value = Value::Null;

// ============================================================================
// DECLARATIONS
// ============================================================================

/// Rules attached to one field pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FieldTag {
    /// Dotted field pattern, e.g. `items.*.price`.
    pub path: &'static str,
    /// Comma-separated rule list, e.g. `required,min=1`.
    pub rules: &'static str,
}

impl FieldTag {
    /// Creates a tag. Usable in `const` context.
    #[must_use]
    pub const fn new(path: &'static str, rules: &'static str) -> Self {
        Self { path, rules }
    }
}

/// What a rule sees when it runs.
#[derive(Debug, Clone, Copy)]
pub struct RuleInput<'v> {
    /// Concrete path of the field.
    pub path: &'v str,
    /// The value, `Null` when the field is missing.
    pub value: &'v Value,
    /// Kind of `value`.
    pub kind: FieldKind,
    /// The container holding the field.
    pub parent: Option<&'v Value>,
    /// The whole record.
    pub root: &'v Value,
    /// Parameter after `=`, if any.
    pub param: Option<&'v str>,
}

/// What a message override sees when it renders.
#[derive(Debug, Clone, Copy)]
pub struct MessageInput<'a> {
    /// Rule name.
    pub rule: &'a str,
    /// Rule parameter.
    pub param: Option<&'a str>,
    /// Display name of the field.
    pub field: &'a str,
    /// Kind of the offending value.
    pub kind: FieldKind,
    /// The offending value.
    pub value: &'a Value,
}

/// A custom rule: returns `true` when the value is acceptable.
pub type RuleFn = dyn Fn(&RuleInput<'_>) -> bool + Send + Sync;

/// Maps a field path to the name shown in messages.
pub type FieldNamer = dyn Fn(&str) -> String + Send + Sync;

/// Replacement message for a rule.
#[derive(Clone)]
pub enum MessageOverride {
    /// Fixed text.
    Static(String),
    /// Rendered per violation. Treated as quoting the value, so it is
    /// scrubbed on redacted paths.
    Dynamic(Arc<dyn Fn(&MessageInput<'_>) -> String + Send + Sync>),
}

impl MessageOverride {
    /// Wraps a rendering closure.
    pub fn dynamic<F>(render: F) -> Self
    where
        F: Fn(&MessageInput<'_>) -> String + Send + Sync + 'static,
    {
        Self::Dynamic(Arc::new(render))
    }

    fn render(&self, input: &MessageInput<'_>) -> String {
        match self {
            Self::Static(text) => text.clone(),
            Self::Dynamic(render) => render(input),
        }
    }
}

impl fmt::Debug for MessageOverride {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static(text) => f.debug_tuple("Static").field(text).finish(),
            Self::Dynamic(_) => f.write_str("Dynamic(..)"),
        }
    }
}

impl From<&str> for MessageOverride {
    fn from(text: &str) -> Self {
        Self::Static(text.to_owned())
    }
}

impl From<String> for MessageOverride {
    fn from(text: String) -> Self {
        Self::Static(text)
    }
}

// ============================================================================
// REGISTRY
// ============================================================================

/// Custom rules, message overrides and field naming for tag evaluation.
#[derive(Clone, Default)]
pub struct TagRules {
    rules: HashMap<String, Arc<RuleFn>>,
    messages: HashMap<String, MessageOverride>,
    namer: Option<Arc<FieldNamer>>,
}

impl TagRules {
    /// Creates a registry with only the built-in rules.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a custom rule, replacing a built-in of the same name.
    ///
    /// `required` and `omitempty` cannot be replaced; names must be
    /// non-empty and free of `,`, `=` and whitespace.
    pub fn register<F>(&mut self, name: impl Into<String>, rule: F) -> Result<()>
    where
        F: Fn(&RuleInput<'_>) -> bool + Send + Sync + 'static,
    {
        let name = name.into();
        if name.is_empty()
            || name.contains([',', '='])
            || name.contains(char::is_whitespace)
        {
            return Err(Error::config(format!("invalid rule name '{name}'")));
        }
        if name == builtin::REQUIRED || name == builtin::OMITEMPTY {
            return Err(Error::config(format!("rule '{name}' cannot be replaced")));
        }
        self.rules.insert(name, Arc::new(rule));
        Ok(())
    }

    /// Overrides the message of a rule (built-in or custom).
    pub fn set_message(&mut self, rule: impl Into<String>, message: impl Into<MessageOverride>) {
        self.messages.insert(rule.into(), message.into());
    }

    /// Sets the function mapping paths to display names.
    pub fn set_field_namer<F>(&mut self, namer: F)
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        self.namer = Some(Arc::new(namer));
    }

    /// Whether `name` is a registered custom rule.
    #[must_use]
    pub fn is_custom(&self, name: &str) -> bool {
        self.rules.contains_key(name)
    }

    /// Checks every rule list of `tags` without evaluating anything.
    pub fn check(&self, tags: &[FieldTag]) -> Result<()> {
        for tag in tags {
            grammar::parse(tag, |name| self.is_custom(name))?;
        }
        Ok(())
    }

    /// Evaluates `tags` against `root`.
    ///
    /// With `scope`, only fields active under the presence map are
    /// evaluated. Wildcards do not descend past `max_depth` segments.
    pub(crate) fn violations(
        &self,
        root: &Value,
        tags: &[FieldTag],
        scope: Option<(&PresenceMap, PartialMode)>,
        max_depth: usize,
    ) -> Result<Vec<FieldError>> {
        let mut errors = Vec::new();
        for tag in tags {
            let specs = grammar::parse(tag, |name| self.is_custom(name))?;
            for target in resolve(root, tag.path, max_depth) {
                if let Some((presence, mode)) = scope
                    && !filter::is_active(&target.path, presence, mode)
                {
                    continue;
                }
                if let Some(error) = self.evaluate(root, &target, &specs) {
                    errors.push(error);
                }
            }
        }
        Ok(errors)
    }

    fn evaluate(&self, root: &Value, target: &Target<'_>, specs: &[RuleSpec<'_>]) -> Option<FieldError> {
        let zero = builtin::is_zero(target.value);
        if zero && specs.iter().any(|s| s.name == builtin::OMITEMPTY) {
            return None;
        }
        let value = target.value.unwrap_or(&NULL);
        let input = |param| RuleInput {
            path: &target.path,
            value,
            kind: FieldKind::of(target.value),
            parent: target.parent,
            root,
            param,
        };

        let failed = specs.iter().find(|spec| match (spec.name, self.rules.get(spec.name)) {
            (builtin::OMITEMPTY, _) => false,
            (builtin::REQUIRED, _) => zero,
            (_, Some(rule)) => !rule(&input(spec.param)),
            _ if value.is_null() => false,
            (name, None) => !builtin::evaluate(name, &input(spec.param)),
        })?;

        tracing::trace!(path = %target.path, rule = failed.name, "tag rule failed");
        Some(self.field_error(&target.path, value, failed))
    }

    fn field_error(&self, path: &str, value: &Value, spec: &RuleSpec<'_>) -> FieldError {
        let field = self
            .namer
            .as_ref()
            .map_or_else(|| path.to_owned(), |namer| namer(path));
        let kind = FieldKind::of(Some(value));
        let message_input = MessageInput {
            rule: spec.name,
            param: spec.param,
            field: &field,
            kind,
            value,
        };
        let (message, echoes) = match self.messages.get(spec.name) {
            Some(custom @ MessageOverride::Dynamic(_)) => (custom.render(&message_input), true),
            Some(custom) => (custom.render(&message_input), false),
            None => (self.default_message(&message_input), false),
        };

        let mut error = FieldError::new(path, format!("{}{}", codes::TAG_PREFIX, spec.name), message)
            .with_meta(meta_keys::TAG, spec.name)
            .with_meta(meta_keys::FIELD, field.clone())
            .with_meta(meta_keys::KIND, kind.as_str())
            .with_value(value.clone());
        if let Some(param) = spec.param {
            error = error.with_meta(meta_keys::PARAM, param);
            if spec.name.ends_with("field") && !self.is_custom(spec.name) {
                error = error.with_meta(meta_keys::OTHER, param);
            }
        }
        if echoes {
            error = error.echoing_value();
        }
        error
    }

    fn default_message(&self, input: &MessageInput<'_>) -> String {
        let field = input.field;
        let param = input.param.unwrap_or_default();
        if self.is_custom(input.rule) {
            return format!("{field} failed the '{}' rule", input.rule);
        }
        let sized = |verb: &str, noun_text: &str, noun_items: &str| match input.kind {
            FieldKind::String => format!("{field} must {verb} {param} {noun_text}"),
            FieldKind::Array | FieldKind::Object => format!("{field} must {verb} {param} {noun_items}"),
            _ => format!("{field} must {verb} {param}"),
        };
        match input.rule {
            "required" => format!("{field} is required"),
            "email" => format!("{field} must be a valid email address"),
            "url" => format!("{field} must be a valid URL"),
            "uuid" => format!("{field} must be a valid UUID"),
            "alpha" => format!("{field} must contain only letters"),
            "alphanum" => format!("{field} must contain only letters and digits"),
            "numeric" => format!("{field} must be numeric"),
            "min" => sized("be at least", "characters long", "items"),
            "max" => sized("be at most", "characters long", "items"),
            "len" => sized("be exactly", "characters long", "items"),
            "gt" => sized("be greater than", "characters long", "items"),
            "gte" => sized("be at least", "characters long", "items"),
            "lt" => sized("be less than", "characters long", "items"),
            "lte" => sized("be at most", "characters long", "items"),
            "eq" => format!("{field} must equal {param}"),
            "ne" => format!("{field} must not equal {param}"),
            "oneof" => format!("{field} must be one of [{param}]"),
            "contains" => format!("{field} must contain '{param}'"),
            "startswith" => format!("{field} must start with '{param}'"),
            "endswith" => format!("{field} must end with '{param}'"),
            "eqfield" => format!("{field} must equal {param}"),
            "nefield" => format!("{field} must not equal {param}"),
            "gtfield" => format!("{field} must be greater than {param}"),
            "gtefield" => format!("{field} must be greater than or equal to {param}"),
            "ltfield" => format!("{field} must be less than {param}"),
            "ltefield" => format!("{field} must be less than or equal to {param}"),
            other => format!("{field} failed the '{other}' rule"),
        }
    }
}

impl fmt::Debug for TagRules {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut rules: Vec<_> = self.rules.keys().collect();
        rules.sort();
        f.debug_struct("TagRules")
            .field("custom_rules", &rules)
            .field("messages", &self.messages)
            .field("field_namer", &self.namer.is_some())
            .finish()
    }
}

// ============================================================================
// PATH RESOLUTION
// ============================================================================

/// A concrete field a tag applies to.
#[derive(Debug)]
struct Target<'v> {
    path: String,
    value: Option<&'v Value>,
    parent: Option<&'v Value>,
}

/// Expands a tag pattern into concrete targets.
fn resolve<'v>(root: &'v Value, pattern: &str, max_depth: usize) -> Vec<Target<'v>> {
    let (parent_pattern, leaf) = match pattern.rfind('.') {
        Some(idx) => (&pattern[..idx], &pattern[idx + 1..]),
        None => ("", pattern),
    };

    if inspect::has_wildcard(parent_pattern) {
        return FieldWalker::matching(root, parent_pattern)
            .with_max_depth(max_depth.saturating_sub(1))
            .flat_map(|parent| expand(&parent.path, parent.value, leaf))
            .collect();
    }
    inspect::lookup(root, parent_pattern)
        .map(|parent| expand(parent_pattern, parent, leaf))
        .unwrap_or_default()
}

fn expand<'v>(parent_path: &str, parent: &'v Value, leaf: &str) -> Vec<Target<'v>> {
    if !FieldKind::of(Some(parent)).is_container() {
        return Vec::new();
    }
    if leaf != WILDCARD {
        return vec![Target {
            path: inspect::join(parent_path, leaf),
            value: inspect::child(parent, leaf),
            parent: Some(parent),
        }];
    }
    let target = |segment: &str, value| Target {
        path: inspect::join(parent_path, segment),
        value: Some(value),
        parent: Some(parent),
    };
    match parent {
        Value::Object(map) => map.iter().map(|(k, v)| target(k, v)).collect(),
        Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(i, v)| target(&i.to_string(), v))
            .collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guard::DEFAULT_MAX_DEPTH;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use serde_json::json;

    fn run(tags: &[FieldTag], root: &Value) -> Vec<FieldError> {
        TagRules::new()
            .violations(root, tags, None, DEFAULT_MAX_DEPTH)
            .unwrap()
    }

    fn codes(errors: &[FieldError]) -> Vec<(&str, &str)> {
        errors.iter().map(|e| (e.path(), e.code())).collect()
    }

    #[test]
    fn required_and_format() {
        let tags = tags!["email" => "required,email", "name" => "required"];
        let errors = run(tags, &json!({"email": "nope", "name": ""}));
        assert_eq!(codes(&errors), [("email", "tag.email"), ("name", "tag.required")]);
    }

    #[test]
    fn first_failure_wins() {
        let tags = tags!["code" => "required,len=4,alpha"];
        let errors = run(tags, &json!({"code": "12"}));
        assert_eq!(codes(&errors), [("code", "tag.len")]);
    }

    #[rstest]
    #[case(json!({}))]
    #[case(json!({"nick": null}))]
    #[case(json!({"nick": ""}))]
    fn omitempty_skips_zero(#[case] root: Value) {
        let tags = tags!["nick" => "omitempty,min=3"];
        assert!(run(tags, &root).is_empty());
    }

    #[test]
    fn missing_value_passes_non_required_rules() {
        let tags = tags!["age" => "min=18"];
        assert!(run(tags, &json!({})).is_empty());
    }

    #[test]
    fn wildcard_over_arrays() {
        let tags = tags!["items.*.price" => "gt=0"];
        let root = json!({"items": [{"price": 3}, {"price": 0}, {"price": -1}]});
        let errors = run(tags, &root);
        assert_eq!(
            codes(&errors),
            [("items.1.price", "tag.gt"), ("items.2.price", "tag.gt")]
        );
    }

    #[test]
    fn wildcard_leaf_over_maps() {
        let tags = tags!["labels.*" => "alphanum"];
        let root = json!({"labels": {"env": "prod", "team": "core-1"}});
        let errors = run(tags, &root);
        assert_eq!(codes(&errors), [("labels.team", "tag.alphanum")]);
    }

    #[test]
    fn nested_rules_need_their_container() {
        let tags = tags!["address.city" => "required"];
        assert!(run(tags, &json!({"address": null})).is_empty());
        assert!(run(tags, &json!({})).is_empty());
        let errors = run(tags, &json!({"address": {}}));
        assert_eq!(codes(&errors), [("address.city", "tag.required")]);
    }

    #[test]
    fn metadata_is_populated() {
        let tags = tags!["age" => "min=18"];
        let errors = run(tags, &json!({"age": 12}));
        let meta = errors[0].meta();
        assert_eq!(meta["tag"], json!("min"));
        assert_eq!(meta["param"], json!("18"));
        assert_eq!(meta["value"], json!(12));
        assert_eq!(meta["kind"], json!("number"));
        assert_eq!(errors[0].message(), "age must be at least 18");
    }

    #[test]
    fn cross_field_records_other() {
        let tags = tags!["end" => "gtfield=start"];
        let errors = run(tags, &json!({"start": 5, "end": 3}));
        assert_eq!(errors[0].meta()["other"], json!("start"));
        assert_eq!(errors[0].message(), "end must be greater than start");
    }

    #[test]
    fn custom_rule_overrides_builtin_and_sees_null() {
        let mut rules = TagRules::new();
        rules.register("email", |input| input.value.as_str() == Some("ok")).unwrap();
        rules.register("present", |input| !input.value.is_null()).unwrap();
        let tags = tags!["a" => "email", "b" => "present"];
        let errors = rules
            .violations(&json!({"a": "x@y.z"}), tags, None, DEFAULT_MAX_DEPTH)
            .unwrap();
        assert_eq!(codes(&errors), [("a", "tag.email"), ("b", "tag.present")]);
        assert_eq!(errors[1].message(), "b failed the 'present' rule");
    }

    #[test]
    fn reserved_and_malformed_names_are_refused() {
        let mut rules = TagRules::new();
        assert!(rules.register("required", |_| true).is_err());
        assert!(rules.register("a,b", |_| true).is_err());
        assert!(rules.register("", |_| true).is_err());
    }

    #[test]
    fn unknown_rule_aborts() {
        let tags = tags!["a" => "sparkly"];
        let err = TagRules::new()
            .violations(&json!({"a": 1}), tags, None, DEFAULT_MAX_DEPTH)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidTag { .. }));
        assert!(TagRules::new().check(tags).is_err());
    }

    #[test]
    fn message_overrides_and_display_names() {
        let mut rules = TagRules::new();
        rules.set_message("required", "please fill this in");
        rules.set_message(
            "min",
            MessageOverride::dynamic(|m| format!("{} is {} but needs {}", m.field, m.value, m.param.unwrap_or_default())),
        );
        rules.set_field_namer(|path| path.to_uppercase());

        let tags = tags!["name" => "required", "age" => "min=18"];
        let errors = rules
            .violations(&json!({"age": 3}), tags, None, DEFAULT_MAX_DEPTH)
            .unwrap();
        assert_eq!(errors[0].message(), "please fill this in");
        assert_eq!(errors[0].meta()["field"], json!("NAME"));
        assert_eq!(errors[1].message(), "AGE is 3 but needs 18");
    }

    #[test]
    fn presence_scope_limits_evaluation() {
        let tags = tags!["name" => "required", "email" => "required,email"];
        let presence = PresenceMap::from_paths(["email"]);
        let errors = TagRules::new()
            .violations(
                &json!({"email": ""}),
                tags,
                Some((&presence, PartialMode::Strict)),
                DEFAULT_MAX_DEPTH,
            )
            .unwrap();
        assert_eq!(codes(&errors), [("email", "tag.required")]);
    }

    #[test]
    fn wildcards_respect_depth_limit() {
        let tags = tags!["a.*.b" => "required"];
        let root = json!({"a": [{"b": null}]});
        let rules = TagRules::new();
        assert_eq!(rules.violations(&root, tags, None, 3).unwrap().len(), 1);
        assert!(rules.violations(&root, tags, None, 1).unwrap().is_empty());
    }
}
