//! Serializer for key/value maps.

use std::any::Any;
use std::collections::HashSet;

use crate::error::{ErrorCollector, SerializationError, SerializationResult};
use crate::node::{ConfigNode, ConfigurationOptions, Scalar};
use crate::serialize::{serializer_for, type_mismatch, TypeSerializer};
use crate::types::{DynValue, MapOps, TypeKind, TypeToken};

/// Maps node children to entries, converting keys through a scratch node.
///
/// Serializing overwrites: afterwards the node's children are exactly the
/// keys of the map being written.
pub struct MapSerializer;

fn parts(ty: &TypeToken) -> SerializationResult<(&TypeToken, &TypeToken, &MapOps)> {
    match ty.kind() {
        TypeKind::Map { key, value, ops } => Ok((key, value, ops)),
        _ => Err(type_mismatch(ty)),
    }
}

impl TypeSerializer for MapSerializer {
    fn deserialize(&self, ty: &TypeToken, node: &mut ConfigNode) -> SerializationResult<DynValue> {
        let (key_ty, value_ty, ops) = parts(ty)?;
        if !node.is_map() {
            return (ops.create)(Vec::new());
        }
        let key_serializer = serializer_for(node, key_ty)?;
        let value_serializer = serializer_for(node, value_ty)?;
        let mut scratch = node.new_root();
        let mut entries = Vec::new();
        let mut errors = ErrorCollector::new();
        for (key, child) in node.children_map_mut() {
            scratch.set_value(key);
            let key = match key_serializer.deserialize(key_ty, &mut scratch) {
                Ok(key) => key,
                Err(e) => {
                    errors.push(e.with_path(child.path()).with_type(key_ty.name()));
                    continue;
                }
            };
            match value_serializer.deserialize(value_ty, child) {
                Ok(value) => entries.push((key, value)),
                Err(e) => errors.push(e.with_path(child.path()).with_type(value_ty.name())),
            }
        }
        errors.finish()?;
        (ops.create)(entries)
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
        let (key_ty, value_ty, ops) = parts(ty)?;
        let entries = (ops.entries)(value).ok_or_else(|| type_mismatch(ty))?;
        if entries.is_empty() {
            node.set_empty_map();
            return Ok(());
        }
        let key_serializer = serializer_for(node, key_ty)?;
        let value_serializer = serializer_for(node, value_ty)?;
        if !node.is_map() {
            node.set_empty_map();
        }
        let mut unvisited: HashSet<String> = node.keys().into_iter().collect();
        let mut scratch = node.new_root();
        let mut errors = ErrorCollector::new();
        for (key, value) in entries {
            scratch.clear();
            key_serializer.serialize(key_ty, Some(key), &mut scratch)?;
            let key = match scratch.scalar() {
                Some(Scalar::String(s)) => s.clone(),
                Some(other) => other.to_string(),
                None => {
                    return Err(SerializationError::message(format!(
                        "Map keys of type {} must serialize to scalars",
                        key_ty.name()
                    )))
                }
            };
            unvisited.remove(&key);
            let child = node.node_mut(key.as_str());
            if let Err(e) = value_serializer.serialize(value_ty, Some(value), child) {
                errors.push(e.with_path(child.path()).with_type(value_ty.name()));
            }
        }
        for key in unvisited {
            node.remove_child(&key);
        }
        errors.finish()
    }

    fn empty_value(&self, ty: &TypeToken, _options: &ConfigurationOptions) -> Option<DynValue> {
        let (_, _, ops) = parts(ty).ok()?;
        (ops.create)(Vec::new()).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{BTreeMap, HashMap};

    fn node() -> ConfigNode {
        ConfigNode::new(ConfigurationOptions::defaults())
    }

    #[test]
    fn test_round_trip_preserves_order_for_btree() {
        let mut n = node();
        let map = BTreeMap::from([("b".to_string(), 2i32), ("a".to_string(), 1)]);
        n.set(map.clone()).unwrap();
        assert_eq!(n.keys(), vec!["a", "b"]);
        assert_eq!(n.get::<BTreeMap<String, i32>>().unwrap(), Some(map));
    }

    #[test]
    fn test_overwrite_removes_stale_keys() {
        let mut n = node();
        n.node_mut("keep").set_value(1);
        n.node_mut("drop").set_value(2);
        let mut map: HashMap<String, i32> = n.get().unwrap().unwrap();
        map.remove("drop");
        n.set(map).unwrap();
        assert_eq!(n.keys(), vec!["keep"]);
        assert!(n.child("drop").is_none());
    }

    #[test]
    fn test_empty_map_stays_a_map() {
        let mut n = node();
        n.node_mut("x").set_value(1);
        n.set(HashMap::<String, String>::new()).unwrap();
        assert!(n.is_map());
        assert!(!n.is_virtual());
        assert!(n.keys().is_empty());
    }

    #[test]
    fn test_numeric_keys() {
        let mut n = node();
        n.set(BTreeMap::from([(10u32, true), (2, false)])).unwrap();
        assert_eq!(n.keys(), vec!["2", "10"]);
        let back: BTreeMap<u32, bool> = n.get().unwrap().unwrap();
        assert_eq!(back.get(&10), Some(&true));
    }

    #[test]
    fn test_bad_key_is_reported() {
        let mut n = node();
        n.node_mut("not-a-number").set_value(true);
        let err = n.get::<HashMap<u8, bool>>().unwrap_err();
        assert_eq!(err.path().map(|p| p.to_string()).as_deref(), Some("not-a-number"));
    }
}
