//! Serializer for `Option<T>`.

use std::any::Any;

use crate::error::SerializationResult;
use crate::node::{ConfigNode, ConfigurationOptions};
use crate::serialize::{serializer_for, type_mismatch, TypeSerializer};
use crate::types::{DynValue, OptionOps, TypeKind, TypeToken};

/// Virtual nodes read as `None`. `None` is handed to the inner serializer so
/// it can keep structural keys, and clears the node when none resolves.
pub struct OptionSerializer;

fn parts(ty: &TypeToken) -> SerializationResult<(&TypeToken, &OptionOps)> {
    match ty.kind() {
        TypeKind::Option { inner, ops } => Ok((inner, ops)),
        _ => Err(type_mismatch(ty)),
    }
}

impl TypeSerializer for OptionSerializer {
    fn deserialize(&self, ty: &TypeToken, node: &mut ConfigNode) -> SerializationResult<DynValue> {
        let (inner, ops) = parts(ty)?;
        if node.is_virtual() {
            return Ok((ops.none)());
        }
        let value = serializer_for(node, inner)?.deserialize(inner, node)?;
        (ops.some)(value)
    }

    fn serialize(
        &self,
        ty: &TypeToken,
        value: Option<&dyn Any>,
        node: &mut ConfigNode,
    ) -> SerializationResult<()> {
        let (inner, ops) = parts(ty)?;
        let present = match value {
            Some(value) => (ops.get)(value).ok_or_else(|| type_mismatch(ty))?,
            None => None,
        };
        match present {
            Some(inner_value) => serializer_for(node, inner)?.serialize(inner, Some(inner_value), node),
            None => match serializer_for(node, inner) {
                Ok(serializer) => serializer.serialize(inner, None, node),
                Err(_) => {
                    node.clear();
                    Ok(())
                }
            },
        }
    }

    fn empty_value(&self, ty: &TypeToken, _options: &ConfigurationOptions) -> Option<DynValue> {
        let (_, ops) = parts(ty).ok()?;
        Some((ops.none)())
    }
}
