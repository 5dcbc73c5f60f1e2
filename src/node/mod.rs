//! Configuration tree nodes.
//!
//! # Responsibilities
//! - Hold one of {virtual, scalar, list, map} per node
//! - Navigate by path, creating virtual intermediates lazily
//! - Convert to and from typed values through the options' serializers
//!
//! # Design Decisions
//! - Nodes own their children; copies are deep
//! - Every node carries its absolute path so errors can name it
//! - Intermediates created by navigation stay virtual until a descendant
//!   receives a value

mod options;
mod path;
mod scalar;

pub use options::ConfigurationOptions;
pub use path::{NodePath, PathElement};
pub use scalar::{Scalar, ScalarKind};

use std::any::Any;
use std::sync::Arc;

use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

use crate::error::{SerializationError, SerializationResult};
use crate::types::{downcast, DynValue, TypeToken, Typed};

#[derive(Debug, Clone)]
enum NodeValue {
    Null,
    Scalar(Scalar),
    List(Vec<ConfigNode>),
    Map(Vec<(String, ConfigNode)>),
}

/// A node in a configuration tree.
#[derive(Debug, Clone)]
pub struct ConfigNode {
    path: NodePath,
    value: NodeValue,
    comment: Option<String>,
    implicit: bool,
    options: Arc<ConfigurationOptions>,
}

impl ConfigNode {
    /// Create an empty root node.
    pub fn new(options: impl Into<Arc<ConfigurationOptions>>) -> Self {
        Self::blank(NodePath::root(), options.into())
    }

    /// Create an empty root node sharing this node's options.
    pub fn new_root(&self) -> Self {
        Self::blank(NodePath::root(), self.options.clone())
    }

    fn blank(path: NodePath, options: Arc<ConfigurationOptions>) -> Self {
        Self {
            path,
            value: NodeValue::Null,
            comment: None,
            implicit: false,
            options,
        }
    }

    pub fn path(&self) -> &NodePath {
        &self.path
    }

    /// The last element of this node's path.
    pub fn key(&self) -> Option<&PathElement> {
        self.path.last()
    }

    pub fn options(&self) -> &Arc<ConfigurationOptions> {
        &self.options
    }

    /// Whether this node holds no concrete value.
    pub fn is_virtual(&self) -> bool {
        match &self.value {
            NodeValue::Null => true,
            NodeValue::List(children) if self.implicit => children.iter().all(Self::is_virtual),
            NodeValue::Map(children) if self.implicit => {
                children.iter().all(|(_, child)| child.is_virtual())
            }
            _ => false,
        }
    }

    pub fn is_list(&self) -> bool {
        matches!(self.value, NodeValue::List(_))
    }

    pub fn is_map(&self) -> bool {
        matches!(self.value, NodeValue::Map(_))
    }

    pub fn is_scalar(&self) -> bool {
        matches!(self.value, NodeValue::Scalar(_))
    }

    /// Whether this node has any non-virtual children.
    pub fn has_children(&self) -> bool {
        match &self.value {
            NodeValue::List(children) => children.iter().any(|c| !c.is_virtual()),
            NodeValue::Map(children) => children.iter().any(|(_, c)| !c.is_virtual()),
            _ => false,
        }
    }

    pub fn scalar(&self) -> Option<&Scalar> {
        match &self.value {
            NodeValue::Scalar(scalar) => Some(scalar),
            _ => None,
        }
    }

    /// Look up a descendant without creating anything.
    pub fn child(&self, path: impl Into<NodePath>) -> Option<&ConfigNode> {
        let path = path.into();
        let mut current = self;
        for element in path.iter() {
            current = current.direct_child(element)?;
        }
        Some(current)
    }

    /// Mutable lookup of an existing descendant.
    pub fn child_mut(&mut self, path: impl Into<NodePath>) -> Option<&mut ConfigNode> {
        let path = path.into();
        let mut current = self;
        for element in path.iter() {
            current = current.direct_child_mut(element)?;
        }
        Some(current)
    }

    /// Navigate to a descendant, creating virtual intermediates on the way.
    ///
    /// Navigating by key into a scalar or list replaces it with a map;
    /// navigating by index into a scalar replaces it with a list.
    pub fn node_mut(&mut self, path: impl Into<NodePath>) -> &mut ConfigNode {
        let path = path.into();
        let mut current = self;
        for element in path.iter() {
            current = current.child_or_create(element);
        }
        current
    }

    fn direct_child(&self, element: &PathElement) -> Option<&ConfigNode> {
        match (&self.value, element) {
            (NodeValue::List(children), PathElement::Index(index)) => children.get(*index),
            (NodeValue::Map(children), PathElement::Key(key)) => {
                children.iter().find(|(k, _)| k == key).map(|(_, c)| c)
            }
            (NodeValue::Map(children), PathElement::Index(index)) => {
                let key = index.to_string();
                children.iter().find(|(k, _)| *k == key).map(|(_, c)| c)
            }
            _ => None,
        }
    }

    fn direct_child_mut(&mut self, element: &PathElement) -> Option<&mut ConfigNode> {
        match (&mut self.value, element) {
            (NodeValue::List(children), PathElement::Index(index)) => children.get_mut(*index),
            (NodeValue::Map(children), PathElement::Key(key)) => {
                children.iter_mut().find(|(k, _)| k == key).map(|(_, c)| c)
            }
            (NodeValue::Map(children), PathElement::Index(index)) => {
                let key = index.to_string();
                children.iter_mut().find(|(k, _)| *k == key).map(|(_, c)| c)
            }
            _ => None,
        }
    }

    fn child_or_create(&mut self, element: &PathElement) -> &mut ConfigNode {
        let key = match element {
            PathElement::Index(index) if !self.is_map() => return self.list_slot(*index),
            PathElement::Index(index) => index.to_string(),
            PathElement::Key(key) => key.clone(),
        };
        self.map_slot(key)
    }

    fn list_slot(&mut self, index: usize) -> &mut ConfigNode {
        let base = self.path.clone();
        let options = self.options.clone();
        let children = self.ensure_list();
        while children.len() <= index {
            let next = children.len();
            children.push(Self::blank(base.clone().child(next), options.clone()));
        }
        &mut children[index]
    }

    fn map_slot(&mut self, key: String) -> &mut ConfigNode {
        let child_path = self.path.clone().child(key.as_str());
        let options = self.options.clone();
        let children = self.ensure_map();
        let position = match children.iter().position(|(k, _)| *k == key) {
            Some(position) => position,
            None => {
                children.push((key, Self::blank(child_path, options)));
                children.len() - 1
            }
        };
        &mut children[position].1
    }

    fn ensure_list(&mut self) -> &mut Vec<ConfigNode> {
        if !self.is_list() {
            self.value = NodeValue::List(Vec::new());
            self.implicit = true;
        }
        match &mut self.value {
            NodeValue::List(children) => children,
            _ => unreachable!("node value was just replaced with a list"),
        }
    }

    fn ensure_map(&mut self) -> &mut Vec<(String, ConfigNode)> {
        if !self.is_map() {
            self.value = NodeValue::Map(Vec::new());
            self.implicit = true;
        }
        match &mut self.value {
            NodeValue::Map(children) => children,
            _ => unreachable!("node value was just replaced with a map"),
        }
    }

    /// Store a scalar, discarding any children.
    pub fn set_value(&mut self, value: impl Into<Scalar>) {
        self.value = NodeValue::Scalar(value.into());
        self.implicit = false;
    }

    /// Make this node virtual again.
    pub fn clear(&mut self) {
        self.value = NodeValue::Null;
        self.implicit = false;
    }

    /// Make this node a concrete, empty list.
    pub fn set_empty_list(&mut self) {
        self.value = NodeValue::List(Vec::new());
        self.implicit = false;
    }

    /// Make this node a concrete, empty map.
    pub fn set_empty_map(&mut self) {
        self.value = NodeValue::Map(Vec::new());
        self.implicit = false;
    }

    /// Append a new virtual element, turning this node into a list if needed.
    pub fn append_list_node(&mut self) -> &mut ConfigNode {
        let index = match &self.value {
            NodeValue::List(children) => children.len(),
            _ => 0,
        };
        let child = self.list_slot(index);
        child.clear();
        self.implicit = false;
        match &mut self.value {
            NodeValue::List(children) => &mut children[index],
            _ => unreachable!("node value is a list after appending"),
        }
    }

    /// Remove a map child, returning it.
    pub fn remove_child(&mut self, key: &str) -> Option<ConfigNode> {
        match &mut self.value {
            NodeValue::Map(children) => {
                let position = children.iter().position(|(k, _)| k == key)?;
                Some(children.remove(position).1)
            }
            _ => None,
        }
    }

    /// Keys of the non-virtual map children, in insertion order.
    pub fn keys(&self) -> Vec<String> {
        self.children_map().map(|(k, _)| k.to_string()).collect()
    }

    /// List children, or an empty slice for non-list nodes.
    pub fn children_list(&self) -> &[ConfigNode] {
        match &self.value {
            NodeValue::List(children) => children,
            _ => &[],
        }
    }

    pub fn children_list_mut(&mut self) -> &mut [ConfigNode] {
        match &mut self.value {
            NodeValue::List(children) => children,
            _ => &mut [],
        }
    }

    /// Non-virtual map children, in insertion order.
    pub fn children_map(&self) -> impl Iterator<Item = (&str, &ConfigNode)> {
        let children: &[(String, ConfigNode)] = match &self.value {
            NodeValue::Map(children) => children,
            _ => &[],
        };
        children
            .iter()
            .filter(|(_, child)| !child.is_virtual())
            .map(|(key, child)| (key.as_str(), child))
    }

    pub fn children_map_mut(&mut self) -> impl Iterator<Item = (&str, &mut ConfigNode)> {
        let children: &mut [(String, ConfigNode)] = match &mut self.value {
            NodeValue::Map(children) => children,
            _ => &mut [],
        };
        children
            .iter_mut()
            .filter(|(_, child)| !child.is_virtual())
            .map(|(key, child)| (key.as_str(), child))
    }

    /// Replace this node's content with a deep copy of `other`.
    pub fn set_node(&mut self, other: &ConfigNode) {
        self.value = other.value.clone();
        self.comment = other.comment.clone();
        self.implicit = other.implicit;
        let path = self.path.clone();
        let options = self.options.clone();
        self.rebase(path, &options);
    }

    fn rebase(&mut self, path: NodePath, options: &Arc<ConfigurationOptions>) {
        self.options = options.clone();
        match &mut self.value {
            NodeValue::List(children) => {
                for (index, child) in children.iter_mut().enumerate() {
                    child.rebase(path.clone().child(index), options);
                }
            }
            NodeValue::Map(children) => {
                for (key, child) in children.iter_mut() {
                    child.rebase(path.clone().child(key.as_str()), options);
                }
            }
            _ => {}
        }
        self.path = path;
    }

    /// Deep copy of this node re-rooted at the empty path.
    pub fn detached(&self) -> ConfigNode {
        let mut copy = self.clone();
        let options = copy.options.clone();
        copy.rebase(NodePath::root(), &options);
        copy
    }

    /// Deep copy of the whole tree using different options.
    pub fn with_options(&self, options: impl Into<Arc<ConfigurationOptions>>) -> ConfigNode {
        let mut copy = self.clone();
        let path = copy.path.clone();
        copy.rebase(path, &options.into());
        copy
    }

    pub fn comment(&self) -> Option<&str> {
        self.comment.as_deref()
    }

    pub fn set_comment(&mut self, comment: Option<String>) {
        self.comment = comment;
    }

    /// Set the comment unless one is present. Returns whether it was set.
    pub fn set_comment_if_absent(&mut self, comment: impl Into<String>) -> bool {
        if self.comment.is_some() {
            return false;
        }
        self.comment = Some(comment.into());
        true
    }

    /// Deserialize this node as `T`.
    ///
    /// Returns `Ok(None)` for a virtual node unless implicit initialization
    /// provides an empty value for `T`.
    pub fn get<T: Typed>(&mut self) -> SerializationResult<Option<T>> {
        let ty = T::type_token();
        self.get_dyn(&ty)?.map(downcast::<T>).transpose()
    }

    /// Deserialize as `T`, falling back to `default` when virtual.
    ///
    /// With `copy_defaults` the default is written into the node.
    pub fn get_or<T: Typed>(&mut self, default: T) -> SerializationResult<T> {
        if self.is_virtual() {
            if self.options.copy_defaults() {
                let ty = T::type_token();
                self.set_dyn(&ty, Some(&default))?;
            }
            return Ok(default);
        }
        Ok(self.get::<T>()?.unwrap_or(default))
    }

    /// Deserialize as `T`, failing when no value is present.
    pub fn require<T: Typed>(&mut self) -> SerializationResult<T> {
        match self.get::<T>()? {
            Some(value) => Ok(value),
            None => Err(SerializationError::message("A value is required at this path")
                .with_path(&self.path)
                .with_type(std::any::type_name::<T>())),
        }
    }

    /// Serialize `value` into this node.
    pub fn set<T: Typed>(&mut self, value: T) -> SerializationResult<()> {
        let ty = T::type_token();
        self.set_dyn(&ty, Some(&value))
    }

    /// Type-erased form of [`get`](Self::get).
    pub fn get_dyn(&mut self, ty: &TypeToken) -> SerializationResult<Option<DynValue>> {
        let serializers = self.options.serializers().clone();
        let serializer = serializers.get(ty);
        if self.is_virtual() {
            let Some(serializer) = serializer else {
                return Ok(None);
            };
            if !self.options.implicit_initialization() {
                return Ok(None);
            }
            let options = self.options.clone();
            let Some(value) = serializer.empty_value(ty, &options) else {
                return Ok(None);
            };
            if options.copy_defaults() {
                serializer
                    .serialize(ty, Some(&*value), self)
                    .map_err(|e| e.with_path(&self.path).with_type(ty.name()))?;
            }
            return Ok(Some(value));
        }
        let serializer = serializer.ok_or_else(|| {
            SerializationError::no_serializer(ty.name()).with_path(&self.path)
        })?;
        serializer
            .deserialize(ty, self)
            .map(Some)
            .map_err(|e| e.with_path(&self.path).with_type(ty.name()))
    }

    /// Type-erased form of [`set`](Self::set). `None` clears the node.
    pub fn set_dyn(&mut self, ty: &TypeToken, value: Option<&dyn Any>) -> SerializationResult<()> {
        let serializers = self.options.serializers().clone();
        match serializers.get(ty) {
            Some(serializer) => serializer
                .serialize(ty, value, self)
                .map_err(|e| e.with_path(&self.path).with_type(ty.name())),
            None if value.is_none() => {
                self.clear();
                Ok(())
            }
            None => Err(SerializationError::no_serializer(ty.name()).with_path(&self.path)),
        }
    }
}

impl PartialEq for ConfigNode {
    fn eq(&self, other: &Self) -> bool {
        if self.comment != other.comment {
            return false;
        }
        match (self.is_virtual(), other.is_virtual()) {
            (true, true) => return true,
            (false, false) => {}
            _ => return false,
        }
        match (&self.value, &other.value) {
            (NodeValue::Scalar(a), NodeValue::Scalar(b)) => a == b,
            (NodeValue::List(a), NodeValue::List(b)) => a == b,
            (NodeValue::Map(_), NodeValue::Map(_)) => {
                let mine: Vec<_> = self.children_map().collect();
                let theirs: Vec<_> = other.children_map().collect();
                mine.len() == theirs.len()
                    && mine
                        .iter()
                        .all(|(key, child)| other.child(*key).is_some_and(|c| c == *child))
            }
            _ => false,
        }
    }
}

impl Serialize for ConfigNode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match &self.value {
            NodeValue::Null => serializer.serialize_unit(),
            NodeValue::Scalar(scalar) => match scalar {
                Scalar::Bool(v) => serializer.serialize_bool(*v),
                Scalar::Byte(v) => serializer.serialize_i8(*v),
                Scalar::Short(v) => serializer.serialize_i16(*v),
                Scalar::Int(v) => serializer.serialize_i32(*v),
                Scalar::Long(v) => serializer.serialize_i64(*v),
                Scalar::Float(v) => serializer.serialize_f32(*v),
                Scalar::Double(v) => serializer.serialize_f64(*v),
                Scalar::Char(v) => serializer.serialize_char(*v),
                Scalar::String(v) => serializer.serialize_str(v),
            },
            NodeValue::List(children) => {
                let live: Vec<&ConfigNode> = children.iter().filter(|c| !c.is_virtual()).collect();
                let mut seq = serializer.serialize_seq(Some(live.len()))?;
                for child in live {
                    seq.serialize_element(child)?;
                }
                seq.end()
            }
            NodeValue::Map(_) => {
                let live: Vec<(&str, &ConfigNode)> = self.children_map().collect();
                let mut map = serializer.serialize_map(Some(live.len()))?;
                for (key, child) in live {
                    map.serialize_entry(key, child)?;
                }
                map.end()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn root() -> ConfigNode {
        ConfigNode::new(ConfigurationOptions::defaults())
    }

    #[test]
    fn test_navigation_creates_virtual_intermediates() {
        let mut node = root();
        node.node_mut(["a", "b", "c"]);
        assert!(node.is_virtual());
        assert!(node.child(["a", "b"]).is_some());

        node.node_mut(["a", "b", "c"]).set_value(5);
        assert!(!node.is_virtual());
        assert!(!node.child("a").unwrap().is_virtual());
        assert_eq!(node.child(["a", "b", "c"]).unwrap().scalar(), Some(&Scalar::Int(5)));
        assert_eq!(node.child(["a", "b", "c"]).unwrap().path().to_string(), "a.b.c");
    }

    #[test]
    fn test_clearing_leaf_makes_implicit_parents_virtual() {
        let mut node = root();
        node.node_mut(["a", "b"]).set_value("x");
        assert!(!node.is_virtual());
        node.node_mut(["a", "b"]).clear();
        assert!(node.is_virtual());
        assert!(node.keys().is_empty());
    }

    #[test]
    fn test_empty_collections_are_not_virtual() {
        let mut node = root();
        node.node_mut("list").set_empty_list();
        node.node_mut("map").set_empty_map();
        assert!(!node.child("list").unwrap().is_virtual());
        assert!(node.child("list").unwrap().is_list());
        assert!(!node.child("map").unwrap().is_virtual());
        assert!(node.child("map").unwrap().is_map());
    }

    #[test]
    fn test_list_append_and_index_paths() {
        let mut node = root();
        node.append_list_node().set_value("first");
        node.append_list_node().set_value("second");
        assert_eq!(node.children_list().len(), 2);
        assert_eq!(node.children_list()[1].path().to_string(), "[1]");
        assert_eq!(node.child(1).unwrap().scalar(), Some(&Scalar::from("second")));
    }

    #[test]
    fn test_equality_ignores_virtual_children() {
        let mut a = root();
        a.node_mut("x").set_value(true);
        let mut b = a.clone();
        b.node_mut(["ghost", "child"]);
        assert_eq!(a, b);

        b.node_mut("x").set_value(false);
        assert_ne!(a, b);
    }

    #[test]
    fn test_set_node_rebases_paths() {
        let mut source = root();
        source.node_mut(["inner", "value"]).set_value(1);
        let mut target = root();
        target.node_mut("copy").set_node(&source);
        let copied = target.child(["copy", "inner", "value"]).unwrap();
        assert_eq!(copied.path().to_string(), "copy.inner.value");
    }

    #[test]
    fn test_comments() {
        let mut node = root();
        assert!(node.set_comment_if_absent("first"));
        assert!(!node.set_comment_if_absent("second"));
        assert_eq!(node.comment(), Some("first"));
    }

    #[test]
    fn test_typed_get_and_set() {
        let mut node = root();
        node.node_mut("port").set(8080u16).unwrap();
        assert_eq!(node.node_mut("port").get::<u16>().unwrap(), Some(8080));
        assert_eq!(node.node_mut("missing").get::<String>().unwrap(), None);
        assert_eq!(node.node_mut("missing").get_or(7i32).unwrap(), 7);
        assert!(node.child("missing").map_or(true, |n| n.is_virtual()));
        assert!(node.node_mut("missing").require::<i32>().is_err());
    }

    #[test]
    fn test_get_or_copies_default_when_enabled() {
        let options = ConfigurationOptions::defaults().with_copy_defaults(true);
        let mut node = ConfigNode::new(options);
        assert_eq!(node.node_mut("name").get_or(String::from("anon")).unwrap(), "anon");
        assert_eq!(node.child("name").unwrap().scalar(), Some(&Scalar::from("anon")));
    }

    #[test]
    fn test_implicit_initialization_of_collections() {
        let mut node = root();
        let list: Option<Vec<String>> = node.node_mut("items").get().unwrap();
        assert_eq!(list, Some(Vec::new()));

        let strict = ConfigurationOptions::defaults().with_implicit_initialization(false);
        let mut node = ConfigNode::new(strict);
        let list: Option<Vec<String>> = node.node_mut("items").get().unwrap();
        assert_eq!(list, None);
    }

    #[test]
    fn test_serialize_to_json_skips_virtual() {
        let mut node = root();
        node.node_mut("a").set_value(1);
        node.node_mut(["b", "c"]);
        let json = serde_json::to_string(&node).unwrap();
        assert_eq!(json, r#"{"a":1}"#);
    }
}
