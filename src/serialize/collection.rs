//! Ordered, inheritable serializer registry.

use std::any::TypeId;
use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;

use crate::mapping::ObjectMapperFactory;
use crate::serialize::{
    BoolSerializer, CharSerializer, EnumSerializer, ListSerializer, MapSerializer,
    NodeSerializer, NumericSerializer, OptionSerializer, PathSerializer, PatternSerializer,
    ScalarAdapter, ScalarSerializer, StringSerializer, TypeSerializer, UrlSerializer,
    UuidSerializer,
};
use crate::types::{TypeKind, TypeToken, Typed};

type Predicate = Arc<dyn Fn(&TypeToken) -> bool + Send + Sync>;

#[derive(Clone)]
enum Matcher {
    /// The type itself and anything declaring it as a supertype.
    Subtypes(TypeId),
    /// Only the exact type.
    Exact(TypeId),
    Predicate(Predicate),
}

impl Matcher {
    fn matches(&self, ty: &TypeToken) -> bool {
        match self {
            Matcher::Subtypes(id) => ty.is_subtype_of(*id),
            Matcher::Exact(id) => ty.id() == *id,
            Matcher::Predicate(predicate) => predicate(ty),
        }
    }
}

#[derive(Clone)]
struct Registration {
    matcher: Matcher,
    serializer: Arc<dyn TypeSerializer>,
}

/// Immutable registry resolving a serializer for a type.
///
/// Entries are scanned in priority order (most recently registered first)
/// and the first match wins. The parent collection is consulted only when
/// no local entry matches. Hits are memoized per queried type.
pub struct TypeSerializerCollection {
    parent: Option<Arc<TypeSerializerCollection>>,
    entries: Vec<Registration>,
    cache: DashMap<TypeId, Arc<dyn TypeSerializer>>,
}

impl TypeSerializerCollection {
    /// Builder for a root collection.
    pub fn builder() -> TypeSerializerCollectionBuilder {
        TypeSerializerCollectionBuilder {
            parent: None,
            entries: Vec::new(),
        }
    }

    /// Builder for a collection that falls back to this one.
    pub fn child_builder(self: &Arc<Self>) -> TypeSerializerCollectionBuilder {
        TypeSerializerCollectionBuilder {
            parent: Some(self.clone()),
            entries: Vec::new(),
        }
    }

    /// The built-in serializers with a fresh object mapper factory.
    pub fn defaults() -> Arc<Self> {
        Self::defaults_with(Arc::new(ObjectMapperFactory::default()))
    }

    /// The built-in serializers, mapping objects through `factory`.
    pub fn defaults_with(factory: Arc<ObjectMapperFactory>) -> Arc<Self> {
        Self::builder()
            .register_fn(
                |ty| matches!(ty.kind(), TypeKind::Object(_) | TypeKind::Abstract(_)),
                factory,
            )
            .register_fn(|ty| matches!(ty.kind(), TypeKind::Node), NodeSerializer)
            .register_fn(|ty| matches!(ty.kind(), TypeKind::Enum(_)), EnumSerializer::new())
            .register_fn(|ty| matches!(ty.kind(), TypeKind::Option { .. }), OptionSerializer)
            .register_fn(
                |ty| {
                    matches!(
                        ty.kind(),
                        TypeKind::List { .. } | TypeKind::Set { .. } | TypeKind::Array { .. }
                    )
                },
                ListSerializer,
            )
            .register_fn(|ty| matches!(ty.kind(), TypeKind::Map { .. }), MapSerializer)
            .register_scalar(StringSerializer)
            .register_scalar(BoolSerializer)
            .register_scalar(CharSerializer)
            .register_scalar(NumericSerializer::<i8>::new())
            .register_scalar(NumericSerializer::<i16>::new())
            .register_scalar(NumericSerializer::<i32>::new())
            .register_scalar(NumericSerializer::<i64>::new())
            .register_scalar(NumericSerializer::<isize>::new())
            .register_scalar(NumericSerializer::<u8>::new())
            .register_scalar(NumericSerializer::<u16>::new())
            .register_scalar(NumericSerializer::<u32>::new())
            .register_scalar(NumericSerializer::<u64>::new())
            .register_scalar(NumericSerializer::<usize>::new())
            .register_scalar(NumericSerializer::<f32>::new())
            .register_scalar(NumericSerializer::<f64>::new())
            .register_scalar(UuidSerializer)
            .register_scalar(UrlSerializer)
            .register_scalar(PatternSerializer)
            .register_scalar(PathSerializer)
            .build()
    }

    /// Resolve the serializer for `ty`, if any collection in the chain has one.
    pub fn get(&self, ty: &TypeToken) -> Option<Arc<dyn TypeSerializer>> {
        if let Some(hit) = self.cache.get(&ty.id()) {
            return Some(hit.clone());
        }
        let found = self
            .entries
            .iter()
            .find(|entry| entry.matcher.matches(ty))
            .map(|entry| entry.serializer.clone());
        match found {
            Some(serializer) => {
                self.cache.insert(ty.id(), serializer.clone());
                Some(serializer)
            }
            None => self.parent.as_ref()?.get(ty),
        }
    }

    /// Resolve the serializer for `T`.
    pub fn get_for<T: Typed>(&self) -> Option<Arc<dyn TypeSerializer>> {
        self.get(&T::type_token())
    }

    pub fn parent(&self) -> Option<&Arc<TypeSerializerCollection>> {
        self.parent.as_ref()
    }

    /// Number of local registrations.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for TypeSerializerCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeSerializerCollection")
            .field("entries", &self.entries.len())
            .field("cached", &self.cache.len())
            .field("has_parent", &self.parent.is_some())
            .finish()
    }
}

/// Accumulates registrations for a [`TypeSerializerCollection`].
pub struct TypeSerializerCollectionBuilder {
    parent: Option<Arc<TypeSerializerCollection>>,
    entries: Vec<Registration>,
}

impl TypeSerializerCollectionBuilder {
    fn push(mut self, matcher: Matcher, serializer: Arc<dyn TypeSerializer>) -> Self {
        self.entries.push(Registration { matcher, serializer });
        self
    }

    /// Register for `T` and every type declaring `T` as a supertype.
    pub fn register<T: Typed>(self, serializer: impl TypeSerializer + 'static) -> Self {
        self.register_token(&T::type_token(), serializer)
    }

    /// Register for `token` and its subtypes.
    pub fn register_token(self, token: &TypeToken, serializer: impl TypeSerializer + 'static) -> Self {
        self.push(Matcher::Subtypes(token.id()), Arc::new(serializer))
    }

    /// Register for exactly `T`.
    pub fn register_exact<T: Typed>(self, serializer: impl TypeSerializer + 'static) -> Self {
        self.push(Matcher::Exact(T::type_token().id()), Arc::new(serializer))
    }

    /// Register a scalar serializer for exactly its value type.
    pub fn register_scalar<S: ScalarSerializer>(self, serializer: S) -> Self {
        self.register_exact::<S::Value>(ScalarAdapter(serializer))
    }

    /// Register for every type accepted by `predicate`.
    pub fn register_fn<P>(self, predicate: P, serializer: impl TypeSerializer + 'static) -> Self
    where
        P: Fn(&TypeToken) -> bool + Send + Sync + 'static,
    {
        self.push(Matcher::Predicate(Arc::new(predicate)), Arc::new(serializer))
    }

    /// Copy all registrations of `other`, keeping their relative priority.
    pub fn register_all(mut self, other: &TypeSerializerCollection) -> Self {
        self.entries.extend(other.entries.iter().rev().cloned());
        self
    }

    /// Freeze the registrations. Later registrations take priority.
    pub fn build(mut self) -> Arc<TypeSerializerCollection> {
        self.entries.reverse();
        Arc::new(TypeSerializerCollection {
            parent: self.parent,
            entries: self.entries,
            cache: DashMap::new(),
        })
    }
}
