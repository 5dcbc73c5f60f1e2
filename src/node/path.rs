//! Paths addressing nodes inside a tree.

use std::fmt;

/// One step of a [`NodePath`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathElement {
    /// Map key.
    Key(String),
    /// List index.
    Index(usize),
}

impl From<&str> for PathElement {
    fn from(key: &str) -> Self {
        PathElement::Key(key.to_string())
    }
}

impl From<String> for PathElement {
    fn from(key: String) -> Self {
        PathElement::Key(key)
    }
}

impl From<&String> for PathElement {
    fn from(key: &String) -> Self {
        PathElement::Key(key.clone())
    }
}

impl From<usize> for PathElement {
    fn from(index: usize) -> Self {
        PathElement::Index(index)
    }
}

impl fmt::Display for PathElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathElement::Key(key) => f.write_str(key),
            PathElement::Index(index) => write!(f, "[{index}]"),
        }
    }
}

/// Sequence of keys and indices from the root to a node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct NodePath(Vec<PathElement>);

impl NodePath {
    /// The empty path, addressing the root itself.
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Append one element.
    pub fn child(mut self, element: impl Into<PathElement>) -> Self {
        self.0.push(element.into());
        self
    }

    /// Concatenate two paths.
    pub fn join(&self, other: &NodePath) -> NodePath {
        let mut elements = self.0.clone();
        elements.extend(other.0.iter().cloned());
        NodePath(elements)
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The last element, if any.
    pub fn last(&self) -> Option<&PathElement> {
        self.0.last()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PathElement> {
        self.0.iter()
    }

    /// Parse the display form, e.g. `servers[2].host`. Keys cannot contain
    /// `.` or `[`. An empty string is the root path.
    pub fn parse(text: &str) -> Option<NodePath> {
        let mut elements = Vec::new();
        if text.is_empty() {
            return Some(NodePath(elements));
        }
        for segment in text.split('.') {
            let (key, mut rest) = match segment.find('[') {
                Some(open) => segment.split_at(open),
                None => (segment, ""),
            };
            if !key.is_empty() {
                elements.push(PathElement::Key(key.to_string()));
            } else if rest.is_empty() {
                return None;
            }
            while let Some(tail) = rest.strip_prefix('[') {
                let close = tail.find(']')?;
                elements.push(PathElement::Index(tail[..close].parse().ok()?));
                rest = &tail[close + 1..];
            }
            if !rest.is_empty() {
                return None;
            }
        }
        Some(NodePath(elements))
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("<root>");
        }
        for (i, element) in self.0.iter().enumerate() {
            match element {
                PathElement::Key(key) if i > 0 => write!(f, ".{key}")?,
                other => write!(f, "{other}")?,
            }
        }
        Ok(())
    }
}

impl From<&str> for NodePath {
    fn from(key: &str) -> Self {
        NodePath::root().child(key)
    }
}

impl From<String> for NodePath {
    fn from(key: String) -> Self {
        NodePath::root().child(key)
    }
}

impl From<usize> for NodePath {
    fn from(index: usize) -> Self {
        NodePath::root().child(index)
    }
}

impl From<PathElement> for NodePath {
    fn from(element: PathElement) -> Self {
        NodePath(vec![element])
    }
}

impl From<Vec<PathElement>> for NodePath {
    fn from(elements: Vec<PathElement>) -> Self {
        NodePath(elements)
    }
}

impl<const N: usize> From<[&str; N]> for NodePath {
    fn from(keys: [&str; N]) -> Self {
        NodePath(keys.iter().map(|k| PathElement::from(*k)).collect())
    }
}

impl From<&NodePath> for NodePath {
    fn from(path: &NodePath) -> Self {
        path.clone()
    }
}

impl<'a> IntoIterator for &'a NodePath {
    type Item = &'a PathElement;
    type IntoIter = std::slice::Iter<'a, PathElement>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(NodePath::root().to_string(), "<root>");
        let path = NodePath::root().child("servers").child(2).child("host");
        assert_eq!(path.to_string(), "servers[2].host");
        assert_eq!(NodePath::from(["a", "b"]).to_string(), "a.b");
    }

    #[test]
    fn test_join() {
        let base = NodePath::from("a");
        let joined = base.join(&NodePath::from(["b", "c"]));
        assert_eq!(joined, NodePath::from(["a", "b", "c"]));
        assert_eq!(joined.last(), Some(&PathElement::Key("c".into())));
    }

    #[test]
    fn test_parse_display_form() {
        let path = NodePath::root().child("servers").child(2).child("host");
        assert_eq!(NodePath::parse("servers[2].host"), Some(path));
        assert_eq!(NodePath::parse(""), Some(NodePath::root()));
        assert_eq!(NodePath::parse("[0][1]").map(|p| p.len()), Some(2));
        assert_eq!(NodePath::parse("a..b"), None);
        assert_eq!(NodePath::parse("a[x]"), None);
        assert_eq!(NodePath::parse("a[1]b"), None);
    }
}
