//! Building and caching object mappers.
//!
//! # Responsibilities
//! - Discover fields, pick a resolver and attach constraints/processors
//! - Cache mappers per type
//! - Serialize object and abstract types for a [`TypeSerializerCollection`](crate::serialize::TypeSerializerCollection)
//!
//! # Design Decisions
//! - Abstract types are written with a `__class__` key naming the concrete
//!   type. Names resolve only through subtypes registered on the builder, so
//!   configuration files cannot instantiate arbitrary types

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{SerializationError, SerializationResult};
use crate::mapping::cache::{MapperCache, DEFAULT_CAPACITY};
use crate::mapping::discoverer::{FieldDiscoverer, ObjectFieldDiscoverer, RecordDiscoverer};
use crate::mapping::mapper::{FieldData, ObjectMapper, TypedMapper};
use crate::mapping::meta::{
    comment_processor, pattern_constraint, required_constraint, Comment, Constraint, Matches,
    Processor, Required,
};
use crate::mapping::naming::NamingScheme;
use crate::mapping::resolver::{self, ResolverChoice, ResolverFactory};
use crate::mapping::shape::{FieldShape, ObjectType};
use crate::node::{ConfigNode, ConfigurationOptions};
use crate::serialize::{type_mismatch, TypeSerializer};
use crate::types::{downcast, AbstractType, DynValue, TypeKind, TypeToken};

/// Key holding the concrete type name of an abstract value.
pub const CLASS_KEY: &str = "__class__";

type ConstraintFactory = Arc<
    dyn Fn(&(dyn Any + Send + Sync), &TypeToken) -> SerializationResult<Arc<dyn Constraint>>
        + Send
        + Sync,
>;
type ProcessorFactory = Arc<
    dyn Fn(&(dyn Any + Send + Sync), &TypeToken) -> SerializationResult<Arc<dyn Processor>>
        + Send
        + Sync,
>;
type Upcast = Arc<dyn Fn(DynValue) -> SerializationResult<DynValue> + Send + Sync>;

struct Subtype {
    concrete: TypeToken,
    upcast: Upcast,
}

#[derive(Default)]
struct SubtypeTable {
    by_name: HashMap<String, Subtype>,
    by_concrete: HashMap<TypeId, (String, TypeToken)>,
}

/// Creates [`ObjectMapper`]s and serializes object-kinded types.
pub struct ObjectMapperFactory {
    resolvers: Vec<ResolverFactory>,
    discoverers: Vec<Arc<dyn FieldDiscoverer>>,
    constraints: Vec<(TypeId, ConstraintFactory)>,
    processors: Vec<(TypeId, ProcessorFactory)>,
    subtypes: HashMap<TypeId, SubtypeTable>,
    cache: MapperCache,
}

impl ObjectMapperFactory {
    /// Builder preloaded with the standard resolvers, discoverers,
    /// constraints and processors.
    pub fn builder() -> ObjectMapperFactoryBuilder {
        ObjectMapperFactoryBuilder::empty()
            .add_node_resolver(resolver::key_from_setting())
            .add_node_resolver(resolver::node_from_parent())
            .add_discoverer(ObjectFieldDiscoverer)
            .add_discoverer(RecordDiscoverer)
            .add_constraint::<Required, _>(required_constraint)
            .add_constraint::<Matches, _>(pattern_constraint)
            .add_processor::<Comment, _>(comment_processor)
    }

    pub fn empty_builder() -> ObjectMapperFactoryBuilder {
        ObjectMapperFactoryBuilder::empty()
    }

    /// Mapper for `ty`, built on first request.
    pub fn get(&self, ty: &TypeToken) -> SerializationResult<Arc<ObjectMapper>> {
        if let Some(mapper) = self.cache.get(ty.id()) {
            return Ok(mapper);
        }
        let mapper = Arc::new(self.build_mapper(ty)?);
        tracing::debug!(
            ty = ty.name(),
            fields = mapper.fields().len(),
            "Built object mapper"
        );
        self.cache.insert(ty.id(), mapper.clone());
        Ok(mapper)
    }

    pub fn get_typed<V: ObjectType>(&self) -> SerializationResult<TypedMapper<V>> {
        self.get(&V::type_token()).map(TypedMapper::new)
    }

    pub fn cached_mappers(&self) -> usize {
        self.cache.len()
    }

    fn build_mapper(&self, ty: &TypeToken) -> SerializationResult<ObjectMapper> {
        let TypeKind::Object(ops) = ty.kind() else {
            return Err(SerializationError::message(format!(
                "{} is not a mappable object type",
                ty.name()
            ))
            .with_type(ty.name()));
        };
        let shape = (ops.describe)();

        let mut discovered = None;
        for discoverer in &self.discoverers {
            if let Some(found) = discoverer.discover(&shape)? {
                discovered = Some(found);
                break;
            }
        }
        let discovered = discovered.ok_or_else(|| {
            SerializationError::message(format!(
                "No field discoverer could handle {}; declare a constructor or record",
                ty.name()
            ))
            .with_type(ty.name())
        })?;

        let mut fields = Vec::with_capacity(discovered.fields.len());
        for field in discovered.fields {
            if let Some(data) = self.field_data(field)? {
                fields.push(data);
            }
        }
        Ok(ObjectMapper::new(
            ty.clone(),
            fields,
            discovered.instance,
            shape.post_processors,
        ))
    }

    fn field_data(&self, field: FieldShape) -> SerializationResult<Option<FieldData>> {
        let mut chosen = None;
        for factory in &self.resolvers {
            match factory(field.name, &field.attributes) {
                ResolverChoice::Pass => {}
                ResolverChoice::Skip => return Ok(None),
                ResolverChoice::Resolve(resolver) => {
                    chosen = Some(resolver);
                    break;
                }
            }
        }
        let Some(resolver) = chosen else {
            return Ok(None);
        };

        let mut constraints = Vec::new();
        let mut processors = Vec::new();
        for attribute in field.attributes.iter() {
            let id = Any::type_id(attribute);
            for (key, factory) in &self.constraints {
                if *key == id {
                    constraints.push(
                        factory(attribute, &field.ty).map_err(|e| e.with_type(field.ty.name()))?,
                    );
                }
            }
            for (key, factory) in &self.processors {
                if *key == id {
                    processors.push(
                        factory(attribute, &field.ty).map_err(|e| e.with_type(field.ty.name()))?,
                    );
                }
            }
        }

        Ok(Some(FieldData {
            shape: field,
            resolver,
            constraints,
            processors,
        }))
    }

    fn subtype_named(&self, ty: &TypeToken, name: &str) -> SerializationResult<&Subtype> {
        if let Some(subtype) = self
            .subtypes
            .get(&ty.id())
            .and_then(|table| table.by_name.get(name))
        {
            return Ok(subtype);
        }
        let known_elsewhere = self
            .subtypes
            .values()
            .any(|table| table.by_name.contains_key(name));
        let message = if known_elsewhere {
            format!("{name} does not extend {}", ty.name())
        } else {
            format!("Unknown class of object {name}")
        };
        Err(SerializationError::polymorphism(message))
    }

    fn deserialize_abstract(&self, ty: &TypeToken, node: &mut ConfigNode) -> SerializationResult<DynValue> {
        let name = node
            .child(CLASS_KEY)
            .and_then(ConfigNode::scalar)
            .map(ToString::to_string)
            .ok_or_else(|| {
                SerializationError::polymorphism(format!(
                    "No available configured type for instances of {}",
                    ty.name()
                ))
            })?;
        let subtype = self.subtype_named(ty, &name)?;
        let value = self.get(&subtype.concrete)?.load_dyn(node)?;
        (subtype.upcast)(value)
    }

    fn serialize_abstract(
        &self,
        ty: &TypeToken,
        concrete: &dyn Any,
        node: &mut ConfigNode,
    ) -> SerializationResult<()> {
        let (name, concrete_ty) = self
            .subtypes
            .get(&ty.id())
            .and_then(|table| table.by_concrete.get(&Any::type_id(concrete)))
            .ok_or_else(|| {
                SerializationError::polymorphism(format!(
                    "Value is not a registered subtype of {}",
                    ty.name()
                ))
            })?;
        node.node_mut(CLASS_KEY).set_value(name.as_str());
        self.get(concrete_ty)?.save_dyn(concrete, node)
    }
}

impl Default for ObjectMapperFactory {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl std::fmt::Debug for ObjectMapperFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectMapperFactory")
            .field("resolvers", &self.resolvers.len())
            .field("discoverers", &self.discoverers.len())
            .field("cached", &self.cache.len())
            .finish()
    }
}

impl TypeSerializer for ObjectMapperFactory {
    fn deserialize(&self, ty: &TypeToken, node: &mut ConfigNode) -> SerializationResult<DynValue> {
        match ty.kind() {
            TypeKind::Abstract(_) => self.deserialize_abstract(ty, node),
            _ => self.get(ty)?.load_dyn(node),
        }
    }

    fn serialize(
        &self,
        ty: &TypeToken,
        value: Option<&dyn Any>,
        node: &mut ConfigNode,
    ) -> SerializationResult<()> {
        let Some(value) = value else {
            let class = node.child(CLASS_KEY).filter(|c| !c.is_virtual()).cloned();
            node.clear();
            if let Some(class) = class {
                node.node_mut(CLASS_KEY).set_node(&class);
            }
            return Ok(());
        };
        match ty.kind() {
            TypeKind::Abstract(ops) => {
                let concrete = (ops.concrete)(value).ok_or_else(|| type_mismatch(ty))?;
                self.serialize_abstract(ty, concrete, node)
            }
            _ => self.get(ty)?.save_dyn(value, node),
        }
    }

    fn empty_value(&self, ty: &TypeToken, options: &ConfigurationOptions) -> Option<DynValue> {
        if !matches!(ty.kind(), TypeKind::Object(_)) {
            return None;
        }
        let mapper = self.get(ty).ok()?;
        if !mapper.can_create_instances() {
            return None;
        }
        let mut node = ConfigNode::new(options.clone().with_copy_defaults(false));
        mapper.load_dyn(&mut node).ok()
    }
}

/// Configures an [`ObjectMapperFactory`]. Later additions take priority.
pub struct ObjectMapperFactoryBuilder {
    naming: NamingScheme,
    resolvers: Vec<ResolverFactory>,
    discoverers: Vec<Arc<dyn FieldDiscoverer>>,
    constraints: Vec<(TypeId, ConstraintFactory)>,
    processors: Vec<(TypeId, ProcessorFactory)>,
    subtypes: HashMap<TypeId, SubtypeTable>,
    cache_capacity: usize,
}

impl ObjectMapperFactoryBuilder {
    fn empty() -> Self {
        Self {
            naming: NamingScheme::default(),
            resolvers: Vec::new(),
            discoverers: Vec::new(),
            constraints: Vec::new(),
            processors: Vec::new(),
            subtypes: HashMap::new(),
            cache_capacity: DEFAULT_CAPACITY,
        }
    }

    /// Scheme for fields without an explicit key. Always consulted last.
    pub fn naming_scheme(mut self, naming: NamingScheme) -> Self {
        self.naming = naming;
        self
    }

    pub fn add_node_resolver(mut self, factory: ResolverFactory) -> Self {
        self.resolvers.push(factory);
        self
    }

    pub fn add_discoverer(mut self, discoverer: impl FieldDiscoverer + 'static) -> Self {
        self.discoverers.push(Arc::new(discoverer));
        self
    }

    /// Attach a constraint to every field carrying an attribute of type `A`.
    pub fn add_constraint<A, F>(mut self, factory: F) -> Self
    where
        A: Any,
        F: Fn(&A, &TypeToken) -> SerializationResult<Arc<dyn Constraint>> + Send + Sync + 'static,
    {
        let erased: ConstraintFactory = Arc::new(
            move |attribute: &(dyn Any + Send + Sync), ty: &TypeToken| match attribute.downcast_ref::<A>() {
                Some(attribute) => factory(attribute, ty),
                None => Err(SerializationError::message("Attribute type mismatch")),
            },
        );
        self.constraints.push((TypeId::of::<A>(), erased));
        self
    }

    /// Attach a processor to every field carrying an attribute of type `A`.
    pub fn add_processor<A, F>(mut self, factory: F) -> Self
    where
        A: Any,
        F: Fn(&A, &TypeToken) -> SerializationResult<Arc<dyn Processor>> + Send + Sync + 'static,
    {
        let erased: ProcessorFactory = Arc::new(
            move |attribute: &(dyn Any + Send + Sync), ty: &TypeToken| match attribute.downcast_ref::<A>() {
                Some(attribute) => factory(attribute, ty),
                None => Err(SerializationError::message("Attribute type mismatch")),
            },
        );
        self.processors.push((TypeId::of::<A>(), erased));
        self
    }

    /// Allow `C` to be stored wherever `A` is expected, under `name`.
    pub fn subtype<A, C, U>(mut self, name: impl Into<String>, upcast: U) -> Self
    where
        A: AbstractType,
        C: ObjectType,
        U: Fn(C) -> A + Send + Sync + 'static,
    {
        let name = name.into();
        let concrete = C::type_token();
        let upcast: Upcast = Arc::new(move |value: DynValue| {
            downcast::<C>(value).map(|concrete| Box::new(upcast(concrete)) as DynValue)
        });
        let table = self.subtypes.entry(TypeId::of::<A>()).or_default();
        table
            .by_concrete
            .insert(concrete.id(), (name.clone(), concrete.clone()));
        table.by_name.insert(name, Subtype { concrete, upcast });
        self
    }

    pub fn cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = capacity;
        self
    }

    pub fn build(self) -> ObjectMapperFactory {
        let mut resolvers = self.resolvers;
        resolvers.reverse();
        resolvers.push(resolver::naming(self.naming));
        let mut discoverers = self.discoverers;
        discoverers.reverse();
        ObjectMapperFactory {
            resolvers,
            discoverers,
            constraints: self.constraints,
            processors: self.processors,
            subtypes: self.subtypes,
            cache: MapperCache::new(self.cache_capacity),
        }
    }
}
