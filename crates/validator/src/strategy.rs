//! Strategy selection
//!
//! The set of strategies is closed, so selection is a pure function of
//! which capabilities a record exposes plus the requested [`Strategy`].
//!
//! Priority (highest first): context-aware custom check, plain custom
//! check, tag rules, schema. The two custom-check flavours are one
//! strategy ("interface"); only the preferred one ever runs.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Strategy requested through configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Pick by priority (or run everything with `run_all`).
    #[default]
    Auto,
    /// Force tag rules.
    Tags,
    /// Force the declared schema.
    Schema,
    /// Force the record's own custom check.
    Interface,
}

impl Strategy {
    /// Stable lower-case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Tags => "tags",
            Self::Schema => "schema",
            Self::Interface => "interface",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A concrete adapter invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StrategyKind {
    /// Custom check that receives the call context.
    ContextMethod,
    /// Custom check without context.
    PlainMethod,
    /// Tag rules.
    Tags,
    /// JSON Schema.
    Schema,
}

impl StrategyKind {
    /// All kinds, highest priority first.
    pub const PRIORITY: [Self; 4] = [
        Self::ContextMethod,
        Self::PlainMethod,
        Self::Tags,
        Self::Schema,
    ];

    /// The configurable strategy this kind belongs to.
    #[must_use]
    pub const fn strategy(self) -> Strategy {
        match self {
            Self::ContextMethod | Self::PlainMethod => Strategy::Interface,
            Self::Tags => Strategy::Tags,
            Self::Schema => Strategy::Schema,
        }
    }
}

/// What a record type can be validated with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    /// Has a context-aware custom check.
    pub context_method: bool,
    /// Has a plain custom check.
    pub plain_method: bool,
    /// Declares tag rules.
    pub tags: bool,
    /// Declares (or was handed) a schema.
    pub schema: bool,
}

impl Capabilities {
    /// Whether `kind` is available.
    #[must_use]
    pub const fn supports(&self, kind: StrategyKind) -> bool {
        match kind {
            StrategyKind::ContextMethod => self.context_method,
            StrategyKind::PlainMethod => self.plain_method,
            StrategyKind::Tags => self.tags,
            StrategyKind::Schema => self.schema,
        }
    }

    /// The preferred kind for `strategy`, if available.
    #[must_use]
    pub fn resolve(&self, strategy: Strategy) -> Option<StrategyKind> {
        StrategyKind::PRIORITY
            .into_iter()
            .filter(|kind| self.supports(*kind))
            .find(|kind| strategy == Strategy::Auto || kind.strategy() == strategy)
    }
}

/// Chooses the adapters to run, in execution order.
///
/// - A forced strategy yields exactly one kind or
///   [`Error::UnsupportedStrategy`]; `run_all` is ignored.
/// - `Auto` yields the highest-priority kind, or with `run_all` one kind
///   per supported strategy in priority order.
/// - A record with no capabilities yields nothing.
pub fn select(
    capabilities: Capabilities,
    strategy: Strategy,
    run_all: bool,
    record: &'static str,
) -> Result<Vec<StrategyKind>> {
    if strategy != Strategy::Auto {
        return capabilities
            .resolve(strategy)
            .map(|kind| vec![kind])
            .ok_or(Error::UnsupportedStrategy { strategy, record });
    }

    if !run_all {
        return Ok(capabilities.resolve(Strategy::Auto).into_iter().collect());
    }

    Ok([Strategy::Interface, Strategy::Tags, Strategy::Schema]
        .into_iter()
        .filter_map(|s| capabilities.resolve(s))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    const ALL: Capabilities = Capabilities {
        context_method: true,
        plain_method: true,
        tags: true,
        schema: true,
    };

    #[rstest]
    #[case::context_wins(ALL, StrategyKind::ContextMethod)]
    #[case::plain_over_tags(
        Capabilities { context_method: false, ..ALL },
        StrategyKind::PlainMethod
    )]
    #[case::tags_over_schema(
        Capabilities { tags: true, schema: true, ..Capabilities::default() },
        StrategyKind::Tags
    )]
    #[case::schema_alone(
        Capabilities { schema: true, ..Capabilities::default() },
        StrategyKind::Schema
    )]
    fn auto_picks_by_priority(#[case] caps: Capabilities, #[case] expected: StrategyKind) {
        assert_eq!(select(caps, Strategy::Auto, false, "R").unwrap(), [expected]);
    }

    #[test]
    fn run_all_runs_one_kind_per_strategy() {
        let kinds = select(ALL, Strategy::Auto, true, "R").unwrap();
        assert_eq!(
            kinds,
            [
                StrategyKind::ContextMethod,
                StrategyKind::Tags,
                StrategyKind::Schema
            ]
        );
    }

    #[test]
    fn forced_strategy_bypasses_priority() {
        let kinds = select(ALL, Strategy::Schema, true, "R").unwrap();
        assert_eq!(kinds, [StrategyKind::Schema]);
    }

    #[test]
    fn forced_interface_prefers_context() {
        let caps = Capabilities {
            plain_method: true,
            context_method: true,
            ..Capabilities::default()
        };
        assert_eq!(
            select(caps, Strategy::Interface, false, "R").unwrap(),
            [StrategyKind::ContextMethod]
        );
    }

    #[test]
    fn forced_unsupported_strategy_fails() {
        let caps = Capabilities {
            tags: true,
            ..Capabilities::default()
        };
        let err = select(caps, Strategy::Schema, false, "Signup").unwrap_err();
        assert!(matches!(
            err,
            Error::UnsupportedStrategy {
                strategy: Strategy::Schema,
                record: "Signup"
            }
        ));
    }

    #[test]
    fn nothing_to_run() {
        assert!(select(Capabilities::default(), Strategy::Auto, true, "R")
            .unwrap()
            .is_empty());
    }
}
