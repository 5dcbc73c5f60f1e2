//! Monomorphized operation tables for container and enum types.

use std::any::Any;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::hash::Hash;

use crate::error::{SerializationError, SerializationResult};
use crate::mapping::{ObjectShape, ObjectType};
use crate::serialize::ConfigEnum;
use crate::types::{downcast, AbstractType, DynValue, Typed};

/// Builds and inspects sequence-like containers.
#[derive(Clone, Copy)]
pub struct SeqOps {
    /// Assemble a container from type-erased elements.
    pub create: fn(Vec<DynValue>) -> SerializationResult<DynValue>,
    /// Borrow the elements of a container, in iteration order.
    pub elements: fn(&dyn Any) -> Option<Vec<&dyn Any>>,
}

fn collect_items<T: Any>(items: Vec<DynValue>) -> SerializationResult<Vec<T>> {
    items.into_iter().map(downcast::<T>).collect()
}

fn vec_create<T: Typed>(items: Vec<DynValue>) -> SerializationResult<DynValue> {
    Ok(Box::new(collect_items::<T>(items)?))
}

fn vec_elements<T: Typed>(value: &dyn Any) -> Option<Vec<&dyn Any>> {
    value
        .downcast_ref::<Vec<T>>()
        .map(|items| items.iter().map(|e| e as &dyn Any).collect())
}

fn hash_set_create<T: Typed + Eq + Hash>(items: Vec<DynValue>) -> SerializationResult<DynValue> {
    let set: HashSet<T> = collect_items::<T>(items)?.into_iter().collect();
    Ok(Box::new(set))
}

fn hash_set_elements<T: Typed + Eq + Hash>(value: &dyn Any) -> Option<Vec<&dyn Any>> {
    value
        .downcast_ref::<HashSet<T>>()
        .map(|items| items.iter().map(|e| e as &dyn Any).collect())
}

fn btree_set_create<T: Typed + Ord>(items: Vec<DynValue>) -> SerializationResult<DynValue> {
    let set: BTreeSet<T> = collect_items::<T>(items)?.into_iter().collect();
    Ok(Box::new(set))
}

fn btree_set_elements<T: Typed + Ord>(value: &dyn Any) -> Option<Vec<&dyn Any>> {
    value
        .downcast_ref::<BTreeSet<T>>()
        .map(|items| items.iter().map(|e| e as &dyn Any).collect())
}

fn array_create<T: Typed, const N: usize>(items: Vec<DynValue>) -> SerializationResult<DynValue> {
    let items = collect_items::<T>(items)?;
    let found = items.len();
    let array: [T; N] = items.try_into().map_err(|_| {
        SerializationError::coercion(
            format!("list of {found} elements"),
            format!("array of {N} elements"),
        )
    })?;
    Ok(Box::new(array))
}

fn array_elements<T: Typed, const N: usize>(value: &dyn Any) -> Option<Vec<&dyn Any>> {
    value
        .downcast_ref::<[T; N]>()
        .map(|items| items.iter().map(|e| e as &dyn Any).collect())
}

impl SeqOps {
    pub fn vec<T: Typed>() -> Self {
        Self {
            create: vec_create::<T>,
            elements: vec_elements::<T>,
        }
    }

    pub fn hash_set<T: Typed + Eq + Hash>() -> Self {
        Self {
            create: hash_set_create::<T>,
            elements: hash_set_elements::<T>,
        }
    }

    pub fn btree_set<T: Typed + Ord>() -> Self {
        Self {
            create: btree_set_create::<T>,
            elements: btree_set_elements::<T>,
        }
    }

    pub fn array<T: Typed, const N: usize>() -> Self {
        Self {
            create: array_create::<T, N>,
            elements: array_elements::<T, N>,
        }
    }
}

/// Builds and inspects `Option<T>`.
#[derive(Clone, Copy)]
pub struct OptionOps {
    pub none: fn() -> DynValue,
    pub some: fn(DynValue) -> SerializationResult<DynValue>,
    /// `None` if the value is not this option type.
    pub get: fn(&dyn Any) -> Option<Option<&dyn Any>>,
}

fn option_none<T: Typed>() -> DynValue {
    Box::new(None::<T>)
}

fn option_some<T: Typed>(value: DynValue) -> SerializationResult<DynValue> {
    Ok(Box::new(Some(downcast::<T>(value)?)))
}

fn option_get<T: Typed>(value: &dyn Any) -> Option<Option<&dyn Any>> {
    value
        .downcast_ref::<Option<T>>()
        .map(|inner| inner.as_ref().map(|v| v as &dyn Any))
}

impl OptionOps {
    pub fn of<T: Typed>() -> Self {
        Self {
            none: option_none::<T>,
            some: option_some::<T>,
            get: option_get::<T>,
        }
    }
}

/// Builds and inspects key/value maps.
#[derive(Clone, Copy)]
pub struct MapOps {
    pub create: fn(Vec<(DynValue, DynValue)>) -> SerializationResult<DynValue>,
    pub entries: fn(&dyn Any) -> Option<Vec<(&dyn Any, &dyn Any)>>,
}

fn collect_entries<K: Any, V: Any>(
    entries: Vec<(DynValue, DynValue)>,
) -> SerializationResult<Vec<(K, V)>> {
    entries
        .into_iter()
        .map(|(k, v)| Ok((downcast::<K>(k)?, downcast::<V>(v)?)))
        .collect()
}

fn hash_map_create<K: Typed + Eq + Hash, V: Typed>(
    entries: Vec<(DynValue, DynValue)>,
) -> SerializationResult<DynValue> {
    let map: HashMap<K, V> = collect_entries::<K, V>(entries)?.into_iter().collect();
    Ok(Box::new(map))
}

fn hash_map_entries<K: Typed + Eq + Hash, V: Typed>(
    value: &dyn Any,
) -> Option<Vec<(&dyn Any, &dyn Any)>> {
    value.downcast_ref::<HashMap<K, V>>().map(|map| {
        map.iter()
            .map(|(k, v)| (k as &dyn Any, v as &dyn Any))
            .collect()
    })
}

fn btree_map_create<K: Typed + Ord, V: Typed>(
    entries: Vec<(DynValue, DynValue)>,
) -> SerializationResult<DynValue> {
    let map: BTreeMap<K, V> = collect_entries::<K, V>(entries)?.into_iter().collect();
    Ok(Box::new(map))
}

fn btree_map_entries<K: Typed + Ord, V: Typed>(
    value: &dyn Any,
) -> Option<Vec<(&dyn Any, &dyn Any)>> {
    value.downcast_ref::<BTreeMap<K, V>>().map(|map| {
        map.iter()
            .map(|(k, v)| (k as &dyn Any, v as &dyn Any))
            .collect()
    })
}

impl MapOps {
    pub fn hash_map<K: Typed + Eq + Hash, V: Typed>() -> Self {
        Self {
            create: hash_map_create::<K, V>,
            entries: hash_map_entries::<K, V>,
        }
    }

    pub fn btree_map<K: Typed + Ord, V: Typed>() -> Self {
        Self {
            create: btree_map_create::<K, V>,
            entries: btree_map_entries::<K, V>,
        }
    }
}

/// Enumerates and builds the variants of a unit enum.
#[derive(Clone, Copy)]
pub struct EnumOps {
    /// Variant names in declaration order.
    pub names: fn() -> Vec<&'static str>,
    /// Build the variant at a declaration index.
    pub create: fn(usize) -> Option<DynValue>,
    pub name_of: fn(&dyn Any) -> Option<&'static str>,
}

fn enum_names<E: ConfigEnum>() -> Vec<&'static str> {
    E::variants().iter().map(|v| v.name()).collect()
}

fn enum_create<E: ConfigEnum>(index: usize) -> Option<DynValue> {
    E::variants()
        .get(index)
        .map(|variant| Box::new(*variant) as DynValue)
}

fn enum_name_of<E: ConfigEnum>(value: &dyn Any) -> Option<&'static str> {
    value.downcast_ref::<E>().map(|v| v.name())
}

impl EnumOps {
    pub fn of<E: ConfigEnum>() -> Self {
        Self {
            names: enum_names::<E>,
            create: enum_create::<E>,
            name_of: enum_name_of::<E>,
        }
    }
}

/// Lazily produces the field layout of a mapped struct.
#[derive(Clone, Copy)]
pub struct ObjectOps {
    pub describe: fn() -> ObjectShape,
}

impl ObjectOps {
    pub fn of<O: ObjectType>() -> Self {
        Self {
            describe: crate::mapping::describe::<O>,
        }
    }
}

/// Unwraps a polymorphic handle to its concrete value.
#[derive(Clone, Copy)]
pub struct AbstractOps {
    pub concrete: fn(&dyn Any) -> Option<&dyn Any>,
}

fn abstract_concrete<A: AbstractType>(value: &dyn Any) -> Option<&dyn Any> {
    value.downcast_ref::<A>().map(|handle| handle.concrete())
}

impl AbstractOps {
    pub fn of<A: AbstractType>() -> Self {
        Self {
            concrete: abstract_concrete::<A>,
        }
    }
}
