//! Partial filter
//!
//! Narrows what a strategy evaluates to the fields the caller supplied.
//! Presence, not value, gates evaluation: a present field runs every
//! constraint (including `required` on an empty string), an absent one runs
//! none (including `required`).

use serde::{Deserialize, Serialize};

use crate::inspect;
use crate::presence::PresenceMap;

/// How presence of a container relates to its children.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartialMode {
    /// A constraint runs only if its own path was supplied.
    #[default]
    Strict,
    /// A nested constraint also runs when its direct container was
    /// supplied: sending `address` means sending all of `address`.
    /// Top-level constraints still need their own presence.
    NestedOnPresence,
}

/// Anything bound to a single field path.
pub trait Bound {
    /// The concrete path this item applies to; empty for the whole record.
    fn bound_path(&self) -> &str;
}

impl Bound for str {
    fn bound_path(&self) -> &str {
        self
    }
}

impl Bound for String {
    fn bound_path(&self) -> &str {
        self
    }
}

impl<T: Bound + ?Sized> Bound for &T {
    fn bound_path(&self) -> &str {
        (**self).bound_path()
    }
}

/// Whether a constraint on `path` survives partial filtering.
///
/// The empty path (record-level constraints) is always active.
#[must_use]
pub fn is_active(path: &str, presence: &PresenceMap, mode: PartialMode) -> bool {
    if path.is_empty() {
        return true;
    }
    let supplied = presence.contains(path) && inspect::ancestors(path).all(|a| presence.contains(a));
    match mode {
        PartialMode::Strict => supplied,
        PartialMode::NestedOnPresence => {
            supplied
                || inspect::parent(path).is_some_and(|parent| {
                    presence.contains(parent)
                        && inspect::ancestors(parent).all(|a| presence.contains(a))
                })
        }
    }
}

/// Keeps only the constraints whose paths are active under `presence`.
///
/// ```
/// use fieldcheck_validator::{PresenceMap, filter::{filter, PartialMode}};
///
/// let presence = PresenceMap::from_paths(["email"]);
/// let kept = filter(["name", "email"], &presence, PartialMode::Strict);
/// assert_eq!(kept, ["email"]);
/// ```
pub fn filter<C, I>(constraints: I, presence: &PresenceMap, mode: PartialMode) -> Vec<C>
where
    I: IntoIterator<Item = C>,
    C: Bound,
{
    constraints
        .into_iter()
        .filter(|c| is_active(c.bound_path(), presence, mode))
        .collect()
}

/// Terminal data fields of a presence map, sorted.
#[must_use]
pub fn leaf_paths(presence: &PresenceMap) -> Vec<&str> {
    presence.leaf_paths()
}
