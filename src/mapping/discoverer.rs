//! Choosing which fields map and how instances get built.

use crate::error::SerializationResult;
use crate::mapping::shape::{Constructor, FieldShape, ObjectShape, RecordConstructor};

/// How a mapper produces instances once field values are loaded.
#[derive(Clone)]
pub enum InstanceFactory {
    /// Build in one step from all component values.
    Record(RecordConstructor),
    /// Assign loaded values onto an existing instance. Without `create`
    /// the mapper can only load into instances supplied by the caller.
    Populate { create: Option<Constructor> },
}

impl InstanceFactory {
    pub fn can_create_instances(&self) -> bool {
        match self {
            InstanceFactory::Record(_) => true,
            InstanceFactory::Populate { create } => create.is_some(),
        }
    }

    pub fn supports_in_place(&self) -> bool {
        matches!(self, InstanceFactory::Populate { .. })
    }
}

/// Fields selected by a discoverer together with their instance factory.
pub struct DiscoveredFields {
    pub fields: Vec<FieldShape>,
    pub instance: InstanceFactory,
}

/// Inspects a type's shape. Returns `None` when this strategy does not apply.
pub trait FieldDiscoverer: Send + Sync {
    fn discover(&self, shape: &ObjectShape) -> SerializationResult<Option<DiscoveredFields>>;
}

/// Types built through [`ShapeBuilder::record`](crate::mapping::ShapeBuilder::record).
pub struct RecordDiscoverer;

impl FieldDiscoverer for RecordDiscoverer {
    fn discover(&self, shape: &ObjectShape) -> SerializationResult<Option<DiscoveredFields>> {
        Ok(shape.record.as_ref().map(|record| DiscoveredFields {
            fields: shape.fields.clone(),
            instance: InstanceFactory::Record(record.clone()),
        }))
    }
}

/// Types with assignable fields, optionally with a default constructor.
pub struct ObjectFieldDiscoverer;

impl FieldDiscoverer for ObjectFieldDiscoverer {
    fn discover(&self, shape: &ObjectShape) -> SerializationResult<Option<DiscoveredFields>> {
        let fields: Vec<FieldShape> = shape
            .fields
            .iter()
            .filter(|field| field.is_settable())
            .cloned()
            .collect();
        if fields.is_empty() && shape.constructor.is_none() {
            return Ok(None);
        }
        Ok(Some(DiscoveredFields {
            fields,
            instance: InstanceFactory::Populate {
                create: shape.constructor.clone(),
            },
        }))
    }
}
