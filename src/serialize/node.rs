//! Pass-through serializer for raw subtrees.

use std::any::Any;

use crate::error::SerializationResult;
use crate::node::ConfigNode;
use crate::serialize::{type_mismatch, TypeSerializer};
use crate::types::{DynValue, TypeToken};

/// Reads a detached copy of the node; writes by deep copy.
pub struct NodeSerializer;

impl TypeSerializer for NodeSerializer {
    fn deserialize(&self, _ty: &TypeToken, node: &mut ConfigNode) -> SerializationResult<DynValue> {
        Ok(Box::new(node.detached()))
    }

    fn serialize(
        &self,
        ty: &TypeToken,
        value: Option<&dyn Any>,
        node: &mut ConfigNode,
    ) -> SerializationResult<()> {
        match value {
            Some(value) => {
                let source = value.downcast_ref::<ConfigNode>().ok_or_else(|| type_mismatch(ty))?;
                node.set_node(source);
            }
            None => node.clear(),
        }
        Ok(())
    }
}
