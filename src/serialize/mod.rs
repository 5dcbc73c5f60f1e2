//! Bidirectional converters between nodes and typed values.
//!
//! # Responsibilities
//! - Define the type-erased [`TypeSerializer`] capability
//! - Provide the built-in scalar, collection, map and option converters
//! - Resolve the converter for a type through [`TypeSerializerCollection`]
//!
//! # Data Flow
//! ```text
//! node.get::<T>()
//!     → options.serializers().get(T)     (collection scan, cached)
//!     → serializer.deserialize(T, node)  (recurses for elements/fields)
//!     → downcast to T
//! ```

mod collection;
mod enums;
mod list;
mod map;
mod node;
mod numeric;
mod option;
mod scalar;

pub use collection::{TypeSerializerCollection, TypeSerializerCollectionBuilder};
pub use enums::{ConfigEnum, EnumSerializer};
pub use list::ListSerializer;
pub use map::MapSerializer;
pub use node::NodeSerializer;
pub use numeric::{Numeric, NumericSerializer};
pub use option::OptionSerializer;
pub use scalar::{
    scalar_value, BoolSerializer, CharSerializer, PathSerializer, PatternSerializer,
    ScalarAdapter, ScalarSerializer, StringSerializer, UrlSerializer, UuidSerializer,
};

use std::any::Any;
use std::sync::Arc;

use crate::error::{SerializationError, SerializationResult};
use crate::node::{ConfigNode, ConfigurationOptions};
use crate::types::{DynValue, TypeToken};

/// Converts between a node and a value of some type.
///
/// Serializers are stateless with respect to any particular node and may be
/// shared between threads and collections.
pub trait TypeSerializer: Send + Sync {
    /// Read a value of type `ty` from `node`.
    ///
    /// `node` is mutable so nested mappers can write back defaults.
    fn deserialize(&self, ty: &TypeToken, node: &mut ConfigNode) -> SerializationResult<DynValue>;

    /// Write `value` into `node`. `None` clears the node.
    fn serialize(
        &self,
        ty: &TypeToken,
        value: Option<&dyn Any>,
        node: &mut ConfigNode,
    ) -> SerializationResult<()>;

    /// Value used when a node is absent and implicit initialization is on.
    fn empty_value(&self, _ty: &TypeToken, _options: &ConfigurationOptions) -> Option<DynValue> {
        None
    }
}

impl<S: TypeSerializer + ?Sized> TypeSerializer for Arc<S> {
    fn deserialize(&self, ty: &TypeToken, node: &mut ConfigNode) -> SerializationResult<DynValue> {
        (**self).deserialize(ty, node)
    }

    fn serialize(
        &self,
        ty: &TypeToken,
        value: Option<&dyn Any>,
        node: &mut ConfigNode,
    ) -> SerializationResult<()> {
        (**self).serialize(ty, value, node)
    }

    fn empty_value(&self, ty: &TypeToken, options: &ConfigurationOptions) -> Option<DynValue> {
        (**self).empty_value(ty, options)
    }
}

/// Resolve the serializer for `ty` from the node's options.
pub fn serializer_for(
    node: &ConfigNode,
    ty: &TypeToken,
) -> SerializationResult<Arc<dyn TypeSerializer>> {
    node.options()
        .serializers()
        .get(ty)
        .ok_or_else(|| SerializationError::no_serializer(ty.name()).with_path(node.path()))
}

pub(crate) fn type_mismatch(ty: &TypeToken) -> SerializationError {
    SerializationError::message(format!("Expected a value of type {}", ty.name()))
}
