//! Value inspector
//!
//! Records are serialized through `serde` into a [`serde_json::Value`] tree
//! and inspected here. [`FieldWalker`] lazily yields `(path, kind, value)`
//! triples in document order using an explicit frame stack; given a pattern
//! such as `items.*.price` it only descends into branches the pattern can
//! still match.
//!
//! Paths are dot-joined: object keys as-is, array elements by index
//! (`items.0.price`). The root has the empty path.

use std::fmt;

use serde_json::Value;

/// Segment that matches every element of an array or every value of a map.
pub const WILDCARD: &str = "*";

/// Shape of a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    /// `null`, or a field that is missing altogether.
    Null,
    /// `true` / `false`.
    Bool,
    /// Any JSON number.
    Number,
    /// A string.
    String,
    /// An array.
    Array,
    /// An object / map.
    Object,
}

impl FieldKind {
    /// Kind of a (possibly missing) value.
    #[must_use]
    pub fn of(value: Option<&Value>) -> Self {
        match value {
            None | Some(Value::Null) => Self::Null,
            Some(Value::Bool(_)) => Self::Bool,
            Some(Value::Number(_)) => Self::Number,
            Some(Value::String(_)) => Self::String,
            Some(Value::Array(_)) => Self::Array,
            Some(Value::Object(_)) => Self::Object,
        }
    }

    /// Lower-case name used in messages and metadata.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool => "bool",
            Self::Number => "number",
            Self::String => "string",
            Self::Array => "array",
            Self::Object => "object",
        }
    }

    /// True for arrays and objects.
    #[must_use]
    pub const fn is_container(self) -> bool {
        matches!(self, Self::Array | Self::Object)
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// PATHS
// ============================================================================

/// Appends `segment` to `parent`.
#[must_use]
pub fn join(parent: &str, segment: &str) -> String {
    if parent.is_empty() {
        segment.to_owned()
    } else {
        let mut path = String::with_capacity(parent.len() + 1 + segment.len());
        path.push_str(parent);
        path.push('.');
        path.push_str(segment);
        path
    }
}

/// Path of the enclosing container, `None` for top-level fields and the root.
#[must_use]
pub fn parent(path: &str) -> Option<&str> {
    path.rfind('.').map(|idx| &path[..idx])
}

/// Every proper ancestor of `path`, nearest first.
pub fn ancestors(path: &str) -> impl Iterator<Item = &str> {
    std::iter::successors(parent(path), |&p| parent(p))
}

/// Last segment of `path`.
#[must_use]
pub fn leaf(path: &str) -> &str {
    path.rfind('.').map_or(path, |idx| &path[idx + 1..])
}

/// Resolves a concrete child segment of a container.
#[must_use]
pub fn child<'v>(value: &'v Value, segment: &str) -> Option<&'v Value> {
    match value {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    }
}

/// Resolves a concrete dotted path below `root`.
#[must_use]
pub fn lookup<'v>(root: &'v Value, path: &str) -> Option<&'v Value> {
    if path.is_empty() {
        return Some(root);
    }
    path.split('.').try_fold(root, child)
}

/// Whether `path` contains a [`WILDCARD`] segment.
#[must_use]
pub fn has_wildcard(path: &str) -> bool {
    path.split('.').any(|s| s == WILDCARD)
}

// ============================================================================
// FIELD WALKER
// ============================================================================

/// One inspected field.
#[derive(Debug, Clone, PartialEq)]
pub struct Field<'v> {
    /// Concrete dotted path.
    pub path: String,
    /// Shape of `value`.
    pub kind: FieldKind,
    /// The sub-value.
    pub value: &'v Value,
    /// Number of segments in `path`.
    pub depth: usize,
}

struct Frame<'v> {
    path: String,
    value: &'v Value,
    depth: usize,
}

/// Lazy, depth-bounded iterator over the fields of a value.
///
/// ```
/// use fieldcheck_validator::inspect::FieldWalker;
/// use serde_json::json;
///
/// let order = json!({"items": [{"price": 1}, {"price": 2}]});
/// let prices: Vec<_> = FieldWalker::matching(&order, "items.*.price")
///     .map(|f| f.path)
///     .collect();
/// assert_eq!(prices, ["items.0.price", "items.1.price"]);
/// ```
pub struct FieldWalker<'v> {
    stack: Vec<Frame<'v>>,
    pattern: Option<Vec<String>>,
    max_depth: usize,
}

impl<'v> FieldWalker<'v> {
    /// Walks every field below `root` (the root itself is not yielded).
    #[must_use]
    pub fn new(root: &'v Value) -> Self {
        Self {
            stack: vec![Frame {
                path: String::new(),
                value: root,
                depth: 0,
            }],
            pattern: None,
            max_depth: usize::MAX,
        }
    }

    /// Walks only the fields matching a dotted pattern, which may contain `*`.
    ///
    /// An empty pattern yields the root.
    #[must_use]
    pub fn matching(root: &'v Value, pattern: &str) -> Self {
        let segments = if pattern.is_empty() {
            Vec::new()
        } else {
            pattern.split('.').map(str::to_owned).collect()
        };
        Self {
            pattern: Some(segments),
            ..Self::new(root)
        }
    }

    /// Stops descending below `max_depth` segments.
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    fn push_children(&mut self, frame: &Frame<'v>, only: Option<&str>) {
        let depth = frame.depth + 1;
        if depth > self.max_depth {
            return;
        }
        let mut children: Vec<Frame<'v>> = Vec::new();
        match (frame.value, only) {
            (Value::Object(map), None) => {
                children.extend(map.iter().map(|(k, v)| Frame {
                    path: join(&frame.path, k),
                    value: v,
                    depth,
                }));
            }
            (Value::Array(items), None) => {
                children.extend(items.iter().enumerate().map(|(i, v)| Frame {
                    path: join(&frame.path, &i.to_string()),
                    value: v,
                    depth,
                }));
            }
            (container, Some(segment)) => {
                if let Some(v) = child(container, segment) {
                    children.push(Frame {
                        path: join(&frame.path, segment),
                        value: v,
                        depth,
                    });
                }
            }
            _ => {}
        }
        // Reversed so that popping yields document order.
        self.stack.extend(children.into_iter().rev());
    }
}

impl<'v> Iterator for FieldWalker<'v> {
    type Item = Field<'v>;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(frame) = self.stack.pop() {
            match &self.pattern {
                None => {
                    self.push_children(&frame, None);
                    if frame.depth > 0 {
                        return Some(into_field(frame));
                    }
                }
                Some(segments) => {
                    if frame.depth == segments.len() {
                        return Some(into_field(frame));
                    }
                    let segment = segments[frame.depth].clone();
                    let only = (segment != WILDCARD).then_some(segment.as_str());
                    self.push_children(&frame, only);
                }
            }
        }
        None
    }
}

fn into_field(frame: Frame<'_>) -> Field<'_> {
    Field {
        kind: FieldKind::of(Some(frame.value)),
        path: frame.path,
        value: frame.value,
        depth: frame.depth,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn path_helpers() {
        assert_eq!(join("", "a"), "a");
        assert_eq!(join("a", "0"), "a.0");
        assert_eq!(parent("a.b.c"), Some("a.b"));
        assert_eq!(parent("a"), None);
        assert_eq!(leaf("a.b.c"), "c");
        assert_eq!(ancestors("a.b.c").collect::<Vec<_>>(), ["a.b", "a"]);
    }

    #[test]
    fn lookup_follows_keys_and_indices() {
        let root = json!({"items": [{"price": 3}]});
        assert_eq!(lookup(&root, "items.0.price"), Some(&json!(3)));
        assert_eq!(lookup(&root, "items.1.price"), None);
        assert_eq!(lookup(&root, "items.x"), None);
        assert_eq!(lookup(&root, ""), Some(&root));
    }

    #[test]
    fn walker_yields_every_field_in_document_order() {
        let root = json!({"a": {"b": 1}, "c": [true]});
        let fields: Vec<_> = FieldWalker::new(&root)
            .map(|f| (f.path, f.kind))
            .collect();
        assert_eq!(
            fields,
            vec![
                ("a".to_owned(), FieldKind::Object),
                ("a.b".to_owned(), FieldKind::Number),
                ("c".to_owned(), FieldKind::Array),
                ("c.0".to_owned(), FieldKind::Bool),
            ]
        );
    }

    #[test]
    fn walker_respects_max_depth() {
        let root = json!({"a": {"b": {"c": 1}}});
        let paths: Vec<_> = FieldWalker::new(&root)
            .with_max_depth(2)
            .map(|f| f.path)
            .collect();
        assert_eq!(paths, ["a", "a.b"]);
    }

    #[test]
    fn walker_matches_wildcards_over_maps_and_arrays() {
        let root = json!({"prices": {"eu": 1, "us": 2}, "tags": ["x"]});
        let paths: Vec<_> = FieldWalker::matching(&root, "prices.*")
            .map(|f| f.path)
            .collect();
        assert_eq!(paths, ["prices.eu", "prices.us"]);

        let paths: Vec<_> = FieldWalker::matching(&root, "tags.*")
            .map(|f| f.path)
            .collect();
        assert_eq!(paths, ["tags.0"]);
    }

    #[test]
    fn empty_pattern_yields_root() {
        let root = json!({"a": 1});
        let fields: Vec<_> = FieldWalker::matching(&root, "").collect();
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].path, "");
    }
}
