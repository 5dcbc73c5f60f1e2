//! Serializer for lists, sets and fixed-size arrays.

use std::any::Any;

use crate::error::{ErrorCollector, SerializationResult};
use crate::node::{ConfigNode, ConfigurationOptions};
use crate::serialize::{serializer_for, type_mismatch, TypeSerializer};
use crate::types::{DynValue, SeqOps, TypeKind, TypeToken};

/// Maps each list child through the element serializer.
///
/// A lone scalar is read as a one-element list; anything else that is not a
/// list reads as empty.
pub struct ListSerializer;

fn parts(ty: &TypeToken) -> SerializationResult<(&TypeToken, &SeqOps)> {
    match ty.kind() {
        TypeKind::List { element, ops }
        | TypeKind::Set { element, ops }
        | TypeKind::Array { element, ops, .. } => Ok((element, ops)),
        _ => Err(type_mismatch(ty)),
    }
}

impl TypeSerializer for ListSerializer {
    fn deserialize(&self, ty: &TypeToken, node: &mut ConfigNode) -> SerializationResult<DynValue> {
        let (element, ops) = parts(ty)?;
        let serializer = serializer_for(node, element)?;
        let mut items = Vec::new();
        let mut errors = ErrorCollector::new();
        if node.is_list() {
            for child in node.children_list_mut() {
                match serializer.deserialize(element, child) {
                    Ok(item) => items.push(item),
                    Err(e) => errors.push(e.with_path(child.path()).with_type(element.name())),
                }
            }
        } else if node.is_scalar() {
            items.push(serializer.deserialize(element, node)?);
        }
        errors.finish()?;
        (ops.create)(items)
    }

    fn serialize(
        &self,
        ty: &TypeToken,
        value: Option<&dyn Any>,
        node: &mut ConfigNode,
    ) -> SerializationResult<()> {
        let Some(value) = value else {
            node.clear();
            return Ok(());
        };
        let (element, ops) = parts(ty)?;
        let elements = (ops.elements)(value).ok_or_else(|| type_mismatch(ty))?;
        let serializer = serializer_for(node, element)?;
        node.set_empty_list();
        let mut errors = ErrorCollector::new();
        for item in elements {
            let child = node.append_list_node();
            if let Err(e) = serializer.serialize(element, Some(item), child) {
                errors.push(e.with_path(child.path()).with_type(element.name()));
            }
        }
        errors.finish()
    }

    fn empty_value(&self, ty: &TypeToken, _options: &ConfigurationOptions) -> Option<DynValue> {
        let (_, ops) = parts(ty).ok()?;
        (ops.create)(Vec::new()).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Scalar;
    use std::collections::{BTreeSet, HashSet};

    fn node() -> ConfigNode {
        ConfigNode::new(ConfigurationOptions::defaults())
    }

    #[test]
    fn test_list_round_trip() {
        let mut n = node();
        n.set(vec![1u16, 2, 3]).unwrap();
        assert!(n.is_list());
        assert_eq!(n.children_list().len(), 3);
        assert_eq!(n.get::<Vec<u16>>().unwrap(), Some(vec![1, 2, 3]));
    }

    #[test]
    fn test_scalar_reads_as_singleton() {
        let mut n = node();
        n.set_value("solo");
        assert_eq!(n.get::<Vec<String>>().unwrap(), Some(vec!["solo".to_string()]));
    }

    #[test]
    fn test_map_reads_as_empty() {
        let mut n = node();
        n.node_mut("a").set_value(1);
        assert_eq!(n.get::<Vec<String>>().unwrap(), Some(Vec::new()));
    }

    #[test]
    fn test_empty_list_stays_a_list() {
        let mut n = node();
        n.set(Vec::<String>::new()).unwrap();
        assert!(n.is_list());
        assert!(!n.is_virtual());
    }

    #[test]
    fn test_element_errors_are_aggregated() {
        let mut n = node();
        n.append_list_node().set_value("1");
        n.append_list_node().set_value("x");
        n.append_list_node().set_value("y");
        let err = n.get::<Vec<i32>>().unwrap_err();
        assert_eq!(err.path().map(|p| p.to_string()).as_deref(), Some("[1]"));
        assert_eq!(err.suppressed().len(), 1);
    }

    #[test]
    fn test_sets_and_arrays() {
        let mut n = node();
        n.set(BTreeSet::from(["b".to_string(), "a".to_string()])).unwrap();
        assert_eq!(n.children_list()[0].scalar(), Some(&Scalar::from("a")));
        let set: HashSet<String> = n.get().unwrap().unwrap();
        assert!(set.contains("a") && set.contains("b"));

        n.set([1.5f64, 2.5]).unwrap();
        assert_eq!(n.get::<[f64; 2]>().unwrap(), Some([1.5, 2.5]));
        assert!(n.get::<[f64; 3]>().is_err());
    }
}
