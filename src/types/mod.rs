//! Runtime type descriptors.
//!
//! # Responsibilities
//! - Describe a Rust type well enough to pick a serializer for it
//! - Carry monomorphized operations so generic serializers can build and
//!   inspect containers whose element type is only known at runtime
//!
//! # Design Decisions
//! - Values cross serializer boundaries as `Box<dyn Any + Send + Sync>`
//! - Descriptors are immutable and memoized per `TypeId`
//! - Subtyping is declared, not discovered: a token lists its supertypes

mod impls;
mod ops;

pub use ops::{AbstractOps, EnumOps, MapOps, ObjectOps, OptionOps, SeqOps};

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::{Arc, OnceLock};

use dashmap::DashMap;

use crate::error::{SerializationError, SerializationResult};

/// Owned, type-erased value.
pub type DynValue = Box<dyn Any + Send + Sync>;

/// Recover a concrete value from a [`DynValue`].
pub fn downcast<T: Any>(value: DynValue) -> SerializationResult<T> {
    value.downcast::<T>().map(|boxed| *boxed).map_err(|_| {
        SerializationError::message(format!(
            "Expected a value of type {}",
            std::any::type_name::<T>()
        ))
    })
}

/// Types that can be converted to and from configuration nodes.
pub trait Typed: Any + Send + Sync + Sized {
    /// Descriptor for this type.
    fn type_token() -> TypeToken;
}

/// Structural classification of a type.
#[derive(Clone)]
pub enum TypeKind {
    /// Leaf value (numbers, strings, identifiers).
    Scalar,
    /// `Option<T>`.
    Option { inner: TypeToken, ops: OptionOps },
    /// Growable sequence.
    List { element: TypeToken, ops: SeqOps },
    /// Unordered or sorted set.
    Set { element: TypeToken, ops: SeqOps },
    /// Fixed-length array.
    Array { element: TypeToken, len: usize, ops: SeqOps },
    /// Key/value mapping.
    Map { key: TypeToken, value: TypeToken, ops: MapOps },
    /// Unit-only enum.
    Enum(EnumOps),
    /// Struct with mapped fields.
    Object(ObjectOps),
    /// Trait object resolved through a discriminator.
    Abstract(AbstractOps),
    /// A configuration node itself.
    Node,
}

impl TypeKind {
    fn label(&self) -> &'static str {
        match self {
            TypeKind::Scalar => "scalar",
            TypeKind::Option { .. } => "option",
            TypeKind::List { .. } => "list",
            TypeKind::Set { .. } => "set",
            TypeKind::Array { .. } => "array",
            TypeKind::Map { .. } => "map",
            TypeKind::Enum(_) => "enum",
            TypeKind::Object(_) => "object",
            TypeKind::Abstract(_) => "abstract",
            TypeKind::Node => "node",
        }
    }
}

#[derive(Clone)]
struct TypeInfo {
    id: TypeId,
    name: &'static str,
    kind: TypeKind,
    supertypes: Vec<TypeId>,
}

/// Cheap, clonable descriptor of a Rust type.
#[derive(Clone)]
pub struct TypeToken(Arc<TypeInfo>);

impl TypeToken {
    fn build<T: Any>(kind: TypeKind) -> Self {
        TypeToken(Arc::new(TypeInfo {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
            kind,
            supertypes: Vec::new(),
        }))
    }

    /// Shorthand for `T::type_token()`.
    pub fn of<T: Typed>() -> Self {
        T::type_token()
    }

    /// Memoize the token for `T`, building it with `build` on first use.
    pub fn memoize<T: Any>(build: impl FnOnce() -> TypeToken) -> TypeToken {
        static CACHE: OnceLock<DashMap<TypeId, TypeToken>> = OnceLock::new();
        let cache = CACHE.get_or_init(DashMap::new);
        let id = TypeId::of::<T>();
        if let Some(token) = cache.get(&id) {
            return token.clone();
        }
        // Built outside the map lock: element tokens recurse into the cache.
        let token = build();
        cache.entry(id).or_insert(token).clone()
    }

    /// Descriptor for a leaf type.
    pub fn scalar<T: Any>() -> Self {
        Self::build::<T>(TypeKind::Scalar)
    }

    /// Descriptor for a configuration node.
    pub fn node<T: Any>() -> Self {
        Self::build::<T>(TypeKind::Node)
    }

    /// Descriptor for a unit enum.
    pub fn enumeration<E: crate::serialize::ConfigEnum>() -> Self {
        Self::build::<E>(TypeKind::Enum(EnumOps::of::<E>()))
    }

    /// Descriptor for a struct described by [`ObjectType`](crate::mapping::ObjectType).
    pub fn object<O: crate::mapping::ObjectType>() -> Self {
        Self::build::<O>(TypeKind::Object(ObjectOps::of::<O>()))
    }

    /// Descriptor for a polymorphic handle such as `Box<dyn Trait>`.
    pub fn abstract_type<A: AbstractType>() -> Self {
        Self::build::<A>(TypeKind::Abstract(AbstractOps::of::<A>()))
    }

    pub(crate) fn with_kind<T: Any>(kind: TypeKind) -> Self {
        Self::build::<T>(kind)
    }

    /// Declare `S` as a supertype, so serializers registered for `S`
    /// and its subtypes also match this type.
    pub fn with_supertype<S: Any>(mut self) -> Self {
        let info = Arc::make_mut(&mut self.0);
        let id = TypeId::of::<S>();
        if !info.supertypes.contains(&id) {
            info.supertypes.push(id);
        }
        self
    }

    pub fn id(&self) -> TypeId {
        self.0.id
    }

    /// Fully qualified type name.
    pub fn name(&self) -> &'static str {
        self.0.name
    }

    pub fn kind(&self) -> &TypeKind {
        &self.0.kind
    }

    pub fn supertypes(&self) -> &[TypeId] {
        &self.0.supertypes
    }

    /// Whether this type is `id` or declares it as a supertype.
    pub fn is_subtype_of(&self, id: TypeId) -> bool {
        self.0.id == id || self.0.supertypes.contains(&id)
    }

    pub fn is<T: Any>(&self) -> bool {
        self.0.id == TypeId::of::<T>()
    }
}

impl PartialEq for TypeToken {
    fn eq(&self, other: &Self) -> bool {
        self.0.id == other.0.id
    }
}

impl Eq for TypeToken {}

impl fmt::Debug for TypeToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeToken({} as {})", self.0.name, self.0.kind.label())
    }
}

impl fmt::Display for TypeToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.name)
    }
}

/// Polymorphic handles (typically `Box<dyn Trait>`) that expose their
/// concrete value for serialization.
pub trait AbstractType: Typed {
    /// The concrete value behind the handle.
    fn concrete(&self) -> &dyn Any;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_container_tokens_describe_elements() {
        let token = TypeToken::of::<Vec<u8>>();
        match token.kind() {
            TypeKind::List { element, .. } => assert!(element.is::<u8>()),
            other => panic!("unexpected kind {}", other.label()),
        }

        let token = TypeToken::of::<HashMap<String, Option<i32>>>();
        match token.kind() {
            TypeKind::Map { key, value, .. } => {
                assert!(key.is::<String>());
                assert!(matches!(value.kind(), TypeKind::Option { .. }));
            }
            other => panic!("unexpected kind {}", other.label()),
        }
    }

    #[test]
    fn test_memoized_tokens_are_shared() {
        let a = TypeToken::of::<Vec<String>>();
        let b = TypeToken::of::<Vec<String>>();
        assert!(Arc::ptr_eq(&a.0, &b.0));
    }

    #[test]
    fn test_supertypes() {
        struct Base;
        let token = TypeToken::scalar::<u8>().with_supertype::<Base>();
        assert!(token.is_subtype_of(TypeId::of::<Base>()));
        assert!(token.is_subtype_of(TypeId::of::<u8>()));
        assert!(!token.is_subtype_of(TypeId::of::<u16>()));
    }

    #[test]
    fn test_seq_ops_round_trip() {
        let token = TypeToken::of::<Vec<i32>>();
        let TypeKind::List { ops, .. } = token.kind() else {
            panic!("expected list");
        };
        let built = (ops.create)(vec![Box::new(1i32), Box::new(2i32)]).unwrap();
        let elements = (ops.elements)(&*built).unwrap();
        assert_eq!(elements.len(), 2);
        assert_eq!(elements[1].downcast_ref::<i32>(), Some(&2));
        assert_eq!(downcast::<Vec<i32>>(built).unwrap(), vec![1, 2]);
    }

    #[test]
    fn test_downcast_mismatch_is_an_error() {
        let value: DynValue = Box::new(5u8);
        assert!(downcast::<String>(value).is_err());
    }
}
