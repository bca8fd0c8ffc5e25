//! Presence analyzer
//!
//! Computes which field paths a caller actually supplied, so a PATCH-style
//! update can tell "absent" from "present but zero". The traversal is
//! iterative: frames of `(path, node, depth)` live on an explicit stack and
//! depth is a counter checked against [`Limits::max_depth`], never the host
//! call stack.
//!
//! - Exceeding `max_depth` is soft: the branch stops descending and the map
//!   carries a [`DepthExceeded`] marker.
//! - Exceeding `max_fields` is hard: the call fails with
//!   [`Error::FieldLimitExceeded`] and no partial map is returned.

use std::collections::HashSet;
use std::fmt;

use serde::de::{self, Deserialize, DeserializeSeed, Deserializer, IgnoredAny, MapAccess, SeqAccess, Visitor};
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::guard::{FieldBudget, Limits};
use crate::inspect::{self, FieldKind};

/// Set of field paths explicitly supplied by the caller.
///
/// Every stored path has all of its ancestors stored too.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PresenceMap {
    paths: HashSet<String>,
    depth_exceeded: Option<DepthExceeded>,
}

/// Marker left on a [`PresenceMap`] whose traversal was cut short.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepthExceeded {
    /// The configured maximum depth.
    pub max_depth: usize,
    /// First container (in traversal order) whose children were skipped.
    pub first_path: String,
    /// Number of containers whose children were skipped.
    pub branches: usize,
}

impl PresenceMap {
    /// Builds a map from explicit paths, inserting every ancestor as well.
    ///
    /// This is the override hook for callers that know presence from
    /// elsewhere (form fields, protobuf field masks).
    ///
    /// ```
    /// use fieldcheck_validator::PresenceMap;
    ///
    /// let presence = PresenceMap::from_paths(["address.city"]);
    /// assert!(presence.contains("address"));
    /// assert!(presence.contains("address.city"));
    /// ```
    pub fn from_paths<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = HashSet::new();
        for path in paths {
            let path = path.as_ref();
            if path.is_empty() {
                continue;
            }
            set.extend(inspect::ancestors(path).map(str::to_owned));
            set.insert(path.to_owned());
        }
        Self {
            paths: set,
            depth_exceeded: None,
        }
    }

    /// Whether `path` was supplied.
    #[must_use]
    pub fn contains(&self, path: &str) -> bool {
        self.paths.contains(path)
    }

    /// Number of recorded paths.
    #[must_use]
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    /// True if nothing was supplied.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Iterates over recorded paths in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.paths.iter().map(String::as_str)
    }

    /// Set when the traversal stopped descending somewhere.
    #[must_use]
    pub fn depth_exceeded(&self) -> Option<&DepthExceeded> {
        self.depth_exceeded.as_ref()
    }

    /// Paths no other recorded path descends from, sorted.
    ///
    /// Empty objects and arrays count as leaves.
    #[must_use]
    pub fn leaf_paths(&self) -> Vec<&str> {
        let containers: HashSet<&str> = self
            .paths
            .iter()
            .filter_map(|p| inspect::parent(p))
            .collect();
        let mut leaves: Vec<&str> = self
            .paths
            .iter()
            .map(String::as_str)
            .filter(|p| !containers.contains(p))
            .collect();
        leaves.sort_unstable();
        leaves
    }
}

impl<S: AsRef<str>> FromIterator<S> for PresenceMap {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::from_paths(iter)
    }
}

// ============================================================================
// COMPUTATION
// ============================================================================

/// Parses a raw serialized record and computes its presence map.
///
/// Nesting deeper than `limits.max_depth` never fails the parse: those
/// subtrees are consumed without being built and show up as a
/// [`DepthExceeded`] marker on the returned map.
///
/// # Errors
///
/// - [`Error::MalformedInput`] if `raw` is not valid JSON
/// - [`Error::NotAnObject`] if the top-level value is not an object
/// - [`Error::FieldLimitExceeded`] past `limits.max_fields`
pub fn compute_presence(raw: &[u8], limits: &Limits) -> Result<PresenceMap> {
    let root = parse_bounded(raw, limits.max_depth).map_err(|e| Error::MalformedInput {
        reason: e.to_string(),
    })?;
    presence_from_value(&root, limits)
}

/// Parses `raw` with the parser's recursion limit off and the host stack
/// growing on demand. Containers deeper than `max_depth + 1` are skipped
/// and left as `null` placeholders.
fn parse_bounded(raw: &[u8], max_depth: usize) -> serde_json::Result<Value> {
    let mut de = serde_json::Deserializer::from_slice(raw);
    de.disable_recursion_limit();
    let root = Pruned {
        depth: 0,
        max_depth,
    }
    .deserialize(serde_stacker::Deserializer::new(&mut de))?;
    de.end()?;
    Ok(root)
}

#[derive(Clone, Copy)]
struct Pruned {
    depth: usize,
    max_depth: usize,
}

impl Pruned {
    const fn child(self) -> Self {
        Self {
            depth: self.depth + 1,
            max_depth: self.max_depth,
        }
    }

    // A container at `max_depth` still needs its children to exist so the
    // traversal can tell it was cut short; their contents are never read.
    const fn skips(self) -> bool {
        self.depth > self.max_depth.saturating_add(1)
    }
}

impl<'de> DeserializeSeed<'de> for Pruned {
    type Value = Value;

    fn deserialize<D>(self, deserializer: D) -> std::result::Result<Value, D::Error>
    where
        D: Deserializer<'de>,
    {
        if self.skips() {
            IgnoredAny::deserialize(deserializer)?;
            return Ok(Value::Null);
        }
        deserializer.deserialize_any(self)
    }
}

impl<'de> Visitor<'de> for Pruned {
    type Value = Value;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("any JSON value")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> std::result::Result<Value, E> {
        Ok(Value::Bool(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<Value, E> {
        Ok(Value::from(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<Value, E> {
        Ok(Value::from(v))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> std::result::Result<Value, E> {
        Ok(Value::from(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<Value, E> {
        Ok(Value::String(v.to_owned()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> std::result::Result<Value, E> {
        Ok(Value::String(v))
    }

    fn visit_unit<E: de::Error>(self) -> std::result::Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_none<E: de::Error>(self) -> std::result::Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_some<D>(self, deserializer: D) -> std::result::Result<Value, D::Error>
    where
        D: Deserializer<'de>,
    {
        DeserializeSeed::deserialize(self, deserializer)
    }

    fn visit_seq<A>(self, mut seq: A) -> std::result::Result<Value, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(item) = seq.next_element_seed(self.child())? {
            items.push(item);
        }
        Ok(Value::Array(items))
    }

    fn visit_map<A>(self, mut access: A) -> std::result::Result<Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut map = Map::new();
        while let Some(key) = access.next_key::<String>()? {
            let value = access.next_value_seed(self.child())?;
            map.insert(key, value);
        }
        Ok(Value::Object(map))
    }
}

struct Frame<'v> {
    path: String,
    node: &'v Value,
    depth: usize,
}

/// Computes the presence map of an already-parsed record.
pub fn presence_from_value(root: &Value, limits: &Limits) -> Result<PresenceMap> {
    if !root.is_object() {
        return Err(Error::NotAnObject {
            found: FieldKind::of(Some(root)).as_str(),
        });
    }

    let mut paths = HashSet::new();
    let mut budget = FieldBudget::new(limits.max_fields);
    let mut depth_exceeded: Option<DepthExceeded> = None;
    let mut stack = vec![Frame {
        path: String::new(),
        node: root,
        depth: 0,
    }];

    while let Some(frame) = stack.pop() {
        let has_children = match frame.node {
            Value::Object(map) => !map.is_empty(),
            Value::Array(items) => !items.is_empty(),
            _ => false,
        };
        if !has_children {
            continue;
        }
        if !limits.allows_depth(frame.depth + 1) {
            match &mut depth_exceeded {
                Some(marker) => marker.branches += 1,
                None => {
                    depth_exceeded = Some(DepthExceeded {
                        max_depth: limits.max_depth,
                        first_path: frame.path.clone(),
                        branches: 1,
                    });
                }
            }
            continue;
        }

        match frame.node {
            Value::Object(map) => {
                for (key, child) in map {
                    record(&frame, key, child, &mut paths, &mut budget, &mut stack)?;
                }
            }
            Value::Array(items) => {
                for (index, child) in items.iter().enumerate() {
                    let segment = index.to_string();
                    record(&frame, &segment, child, &mut paths, &mut budget, &mut stack)?;
                }
            }
            _ => {}
        }
    }

    if let Some(marker) = &depth_exceeded {
        tracing::warn!(
            max_depth = marker.max_depth,
            first_path = %marker.first_path,
            branches = marker.branches,
            "presence traversal truncated at depth limit"
        );
    }

    Ok(PresenceMap {
        paths,
        depth_exceeded,
    })
}

fn record<'v>(
    frame: &Frame<'v>,
    segment: &str,
    child: &'v Value,
    paths: &mut HashSet<String>,
    budget: &mut FieldBudget,
    stack: &mut Vec<Frame<'v>>,
) -> Result<()> {
    budget.charge()?;
    let path = inspect::join(&frame.path, segment);
    paths.insert(path.clone());
    if child.is_object() || child.is_array() {
        stack.push(Frame {
            path,
            node: child,
            depth: frame.depth + 1,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn sorted(map: &PresenceMap) -> Vec<&str> {
        let mut paths: Vec<_> = map.iter().collect();
        paths.sort_unstable();
        paths
    }

    #[test]
    fn records_keys_and_indices() {
        let root = json!({"name": "", "items": [{"price": 0}], "meta": null});
        let map = presence_from_value(&root, &Limits::default()).unwrap();
        assert_eq!(
            sorted(&map),
            ["items", "items.0", "items.0.price", "meta", "name"]
        );
        assert!(map.depth_exceeded().is_none());
    }

    #[test]
    fn parses_raw_bytes() {
        let map = compute_presence(br#"{"email":"a@b.com"}"#, &Limits::default()).unwrap();
        assert!(map.contains("email"));
        assert!(!map.contains("name"));
    }

    #[test]
    fn malformed_input_is_an_input_error() {
        let err = compute_presence(b"{\"email\":", &Limits::default()).unwrap_err();
        assert!(matches!(err, Error::MalformedInput { .. }));
    }

    #[test]
    fn top_level_must_be_an_object() {
        let err = compute_presence(b"[1,2]", &Limits::default()).unwrap_err();
        assert!(matches!(err, Error::NotAnObject { found: "array" }));
    }

    #[test]
    fn depth_limit_is_soft() {
        let root = json!({"a": {"b": {"c": 1}}, "x": 1});
        let limits = Limits {
            max_depth: 2,
            ..Limits::default()
        };
        let map = presence_from_value(&root, &limits).unwrap();
        assert_eq!(sorted(&map), ["a", "a.b", "x"]);
        let marker = map.depth_exceeded().unwrap();
        assert_eq!(marker.first_path, "a.b");
        assert_eq!(marker.branches, 1);
    }

    #[test]
    fn deep_raw_branch_keeps_siblings() {
        let deep = format!("{}1{}", "[".repeat(200), "]".repeat(200));
        let raw = format!(r#"{{"email":"a@b.com","deep":{deep}}}"#);
        let map = compute_presence(raw.as_bytes(), &Limits::default()).unwrap();
        assert!(map.contains("email"));
        assert!(map.contains("deep.0"));
        let marker = map.depth_exceeded().unwrap();
        assert_eq!(marker.max_depth, 100);
        assert_eq!(marker.branches, 1);
    }

    #[test]
    fn raw_parse_matches_value_traversal() {
        let raw = br#"{"a":{"b":{"c":[1,{"d":2}]}},"x":[[]]}"#;
        let limits = Limits {
            max_depth: 3,
            ..Limits::default()
        };
        let parsed: Value = serde_json::from_slice(raw).unwrap();
        assert_eq!(
            compute_presence(raw, &limits).unwrap(),
            presence_from_value(&parsed, &limits).unwrap()
        );
    }

    #[test]
    fn trailing_garbage_is_malformed() {
        let err = compute_presence(br#"{"a":1} x"#, &Limits::default()).unwrap_err();
        assert!(matches!(err, Error::MalformedInput { .. }));
    }

    #[test]
    fn field_limit_is_hard() {
        let root = json!({"a": 1, "b": 2, "c": 3});
        let limits = Limits {
            max_fields: 2,
            ..Limits::default()
        };
        assert!(matches!(
            presence_from_value(&root, &limits),
            Err(Error::FieldLimitExceeded { limit: 2 })
        ));
    }

    #[test]
    fn leaf_paths_skip_containers() {
        let map = PresenceMap::from_paths(["a.b", "a.c", "d", "tags"]);
        assert_eq!(map.leaf_paths(), ["a.b", "a.c", "d", "tags"]);
    }

    #[test]
    fn leaf_paths_are_not_fooled_by_shared_prefixes() {
        let root = json!({"a": {"b": 1}, "ab": 2});
        let map = presence_from_value(&root, &Limits::default()).unwrap();
        assert_eq!(map.leaf_paths(), ["a.b", "ab"]);
    }

    #[test]
    fn from_paths_inserts_ancestors() {
        let map: PresenceMap = ["x.y.z"].into_iter().collect();
        assert_eq!(sorted(&map), ["x", "x.y", "x.y.z"]);
    }
}
