//! Loading and saving mapped objects.
//!
//! # Data Flow
//! ```text
//! load:  node ─▶ resolve each field ─▶ deserialize + validate ─▶ instance factory
//!                                                                  │
//!        node ◀─ back-fill defaults for absent fields ◀────────────┘
//! save:  value ─▶ getter per field ─▶ serialize ─▶ processors
//! ```

use std::any::Any;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::error::{ErrorCollector, SerializationError, SerializationResult};
use crate::mapping::discoverer::InstanceFactory;
use crate::mapping::meta::{Constraint, Processor};
use crate::mapping::resolver::NodeResolver;
use crate::mapping::shape::{FieldShape, ObjectType, PostProcessor, RecordArgs};
use crate::node::ConfigNode;
use crate::serialize::{serializer_for, type_mismatch};
use crate::types::{downcast, DynValue, TypeToken};

/// A field with its resolver, constraints and processors attached.
pub struct FieldData {
    pub(crate) shape: FieldShape,
    pub(crate) resolver: Arc<dyn NodeResolver>,
    pub(crate) constraints: Vec<Arc<dyn Constraint>>,
    pub(crate) processors: Vec<Arc<dyn Processor>>,
}

impl FieldData {
    pub fn name(&self) -> &'static str {
        self.shape.name
    }

    pub fn ty(&self) -> &TypeToken {
        &self.shape.ty
    }

    /// The node this field maps to under `parent`, created on demand.
    pub fn resolve<'a>(&self, parent: &'a mut ConfigNode) -> Option<&'a mut ConfigNode> {
        self.resolver.resolve(parent)
    }

    fn validate(&self, value: Option<&dyn Any>) -> SerializationResult<()> {
        for constraint in &self.constraints {
            constraint.validate(value)?;
        }
        Ok(())
    }
}

struct Slot {
    value: Option<DynValue>,
    implicit: Option<DynValue>,
}

/// Type-erased mapper for one object type.
pub struct ObjectMapper {
    ty: TypeToken,
    fields: Vec<FieldData>,
    instance: InstanceFactory,
    post_processors: Vec<PostProcessor>,
}

impl std::fmt::Debug for ObjectMapper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectMapper")
            .field("type", &self.ty.name())
            .field("fields", &self.fields.iter().map(FieldData::name).collect::<Vec<_>>())
            .finish()
    }
}

impl ObjectMapper {
    pub(crate) fn new(
        ty: TypeToken,
        fields: Vec<FieldData>,
        instance: InstanceFactory,
        post_processors: Vec<PostProcessor>,
    ) -> Self {
        Self {
            ty,
            fields,
            instance,
            post_processors,
        }
    }

    pub fn mapped_type(&self) -> &TypeToken {
        &self.ty
    }

    pub fn fields(&self) -> &[FieldData] {
        &self.fields
    }

    /// Whether [`load_dyn`](Self::load_dyn) can produce new instances.
    pub fn can_create_instances(&self) -> bool {
        self.instance.can_create_instances()
    }

    /// Create a new instance from `node`.
    pub fn load_dyn(&self, node: &mut ConfigNode) -> SerializationResult<DynValue> {
        if let InstanceFactory::Populate { create: None } = &self.instance {
            return Err(self.located(
                SerializationError::message(format!(
                    "{} cannot be constructed; load into an existing instance instead",
                    self.ty.name()
                )),
                node,
            ));
        }
        let (slots, unseen) = self.load_fields(node)?;
        let mut object = match &self.instance {
            InstanceFactory::Record(record) => {
                let components = self
                    .fields
                    .iter()
                    .zip(slots)
                    .map(|(field, slot)| (field.name(), slot.value.or(slot.implicit)))
                    .collect();
                record(&mut RecordArgs::new(components)).map_err(|e| self.located(e, node))?
            }
            InstanceFactory::Populate { create } => {
                let mut object = match create {
                    Some(create) => create(),
                    None => return Err(type_mismatch(&self.ty)),
                };
                self.apply(slots, &mut *object).map_err(|e| self.located(e, node))?;
                object
            }
        };
        self.post_process(&mut *object)
            .map_err(|e| self.located(e, node))?;
        self.backfill(&unseen, &*object, node)?;
        Ok(object)
    }

    /// Overwrite the fields of `target` with the values present in `node`.
    pub fn load_into_dyn(&self, target: &mut dyn Any, node: &mut ConfigNode) -> SerializationResult<()> {
        if !self.instance.supports_in_place() {
            return Err(SerializationError::message(format!(
                "{} does not support loading into an existing instance",
                self.ty.name()
            ))
            .with_type(self.ty.name()));
        }
        let (slots, unseen) = self.load_fields(node)?;
        self.apply(slots, target).map_err(|e| self.located(e, node))?;
        self.post_process(target).map_err(|e| self.located(e, node))?;
        self.backfill(&unseen, target, node)
    }

    /// Write every field of `value` into `node`.
    pub fn save_dyn(&self, value: &dyn Any, node: &mut ConfigNode) -> SerializationResult<()> {
        for field in &self.fields {
            self.save_field(field, value, node)?;
        }
        if node.is_virtual() {
            node.set_empty_map();
        }
        Ok(())
    }

    fn located(&self, error: SerializationError, node: &ConfigNode) -> SerializationError {
        error.with_path(node.path()).with_type(self.ty.name())
    }

    fn load_fields(&self, node: &mut ConfigNode) -> SerializationResult<(Vec<Slot>, Vec<usize>)> {
        if let Some(scalar) = node.scalar() {
            return Err(SerializationError::coercion(scalar, self.ty.name())
                .with_path(node.path())
                .with_type(self.ty.name()));
        }
        if node.is_list() && !node.is_virtual() {
            return Err(SerializationError::message("Object value must be provided as a map")
                .with_path(node.path())
                .with_type(self.ty.name()));
        }

        let copy_defaults = node.options().copy_defaults();
        let mut slots = Vec::with_capacity(self.fields.len());
        let mut unseen = Vec::new();
        let mut errors = ErrorCollector::new();
        for (index, field) in self.fields.iter().enumerate() {
            let Some(target) = field.resolve(node) else {
                slots.push(Slot {
                    value: None,
                    implicit: None,
                });
                continue;
            };
            match load_field(field, target) {
                Ok(slot) => {
                    if slot.value.is_none() && copy_defaults {
                        unseen.push(index);
                    }
                    slots.push(slot);
                }
                Err(e) => {
                    errors.push(e.with_path(target.path()).with_type(field.ty().name()));
                    slots.push(Slot {
                        value: None,
                        implicit: None,
                    });
                }
            }
        }
        errors.finish()?;
        Ok((slots, unseen))
    }

    fn apply(&self, slots: Vec<Slot>, target: &mut dyn Any) -> SerializationResult<()> {
        let mut errors = ErrorCollector::new();
        for (field, slot) in self.fields.iter().zip(slots) {
            let (Some(setter), Some(value)) = (&field.shape.setter, slot.value) else {
                continue;
            };
            if let Err(e) = setter(&mut *target, value) {
                errors.push(e.with_type(field.ty().name()));
            }
        }
        errors.finish()
    }

    fn post_process(&self, object: &mut dyn Any) -> SerializationResult<()> {
        let mut errors = ErrorCollector::new();
        for process in &self.post_processors {
            if let Err(e) = process(&mut *object) {
                errors.push(e);
            }
        }
        errors.finish()
    }

    fn backfill(&self, unseen: &[usize], object: &dyn Any, node: &mut ConfigNode) -> SerializationResult<()> {
        for &index in unseen {
            self.save_field(&self.fields[index], object, node)?;
        }
        Ok(())
    }

    fn save_field(&self, field: &FieldData, object: &dyn Any, parent: &mut ConfigNode) -> SerializationResult<()> {
        let Some(target) = field.resolve(parent) else {
            return Ok(());
        };
        let value = field
            .shape
            .value_of(object)
            .ok_or_else(|| type_mismatch(&self.ty))?;
        let result = serializer_for(target, field.ty())
            .and_then(|serializer| serializer.serialize(field.ty(), Some(value), target));
        if let Err(e) = result {
            return Err(e.with_path(target.path()).with_type(field.ty().name()));
        }
        if !target.is_virtual() {
            for processor in &field.processors {
                processor.process(value, target);
            }
        }
        Ok(())
    }
}

fn load_field(field: &FieldData, target: &mut ConfigNode) -> SerializationResult<Slot> {
    let serializer = serializer_for(target, field.ty())?;
    let value = if target.is_virtual() {
        None
    } else {
        Some(serializer.deserialize(field.ty(), target)?)
    };
    field.validate(value.as_deref().map(|v| v as &dyn Any))?;
    let implicit = if value.is_none() && target.options().implicit_initialization() {
        serializer.empty_value(field.ty(), target.options())
    } else {
        None
    };
    Ok(Slot { value, implicit })
}

/// Statically typed view of an [`ObjectMapper`].
pub struct TypedMapper<V> {
    inner: Arc<ObjectMapper>,
    _marker: PhantomData<fn() -> V>,
}

impl<V> Clone for TypedMapper<V> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            _marker: PhantomData,
        }
    }
}

impl<V: ObjectType> TypedMapper<V> {
    pub(crate) fn new(inner: Arc<ObjectMapper>) -> Self {
        Self {
            inner,
            _marker: PhantomData,
        }
    }

    pub fn load(&self, node: &mut ConfigNode) -> SerializationResult<V> {
        downcast(self.inner.load_dyn(node)?)
    }

    pub fn load_into(&self, value: &mut V, node: &mut ConfigNode) -> SerializationResult<()> {
        self.inner.load_into_dyn(value, node)
    }

    pub fn save(&self, value: &V, node: &mut ConfigNode) -> SerializationResult<()> {
        self.inner.save_dyn(value, node)
    }

    pub fn can_create_instances(&self) -> bool {
        self.inner.can_create_instances()
    }

    pub fn field_names(&self) -> Vec<&'static str> {
        self.inner.fields().iter().map(FieldData::name).collect()
    }

    pub fn erased(&self) -> &Arc<ObjectMapper> {
        &self.inner
    }
}
