//! Unit enum serializer with lenient name lookup.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;

use crate::error::{SerializationError, SerializationResult};
use crate::node::{ConfigNode, Scalar};
use crate::serialize::{scalar_value, type_mismatch, TypeSerializer};
use crate::types::{DynValue, EnumOps, TypeKind, TypeToken, Typed};

/// Unit enums stored by variant name.
///
/// ```
/// use confnode::serialize::ConfigEnum;
/// use confnode::types::{TypeToken, Typed};
///
/// #[derive(Debug, Clone, Copy, PartialEq)]
/// enum Level { Low, High }
///
/// impl Typed for Level {
///     fn type_token() -> TypeToken { TypeToken::enumeration::<Self>() }
/// }
///
/// impl ConfigEnum for Level {
///     fn variants() -> &'static [Self] { &[Level::Low, Level::High] }
///     fn name(&self) -> &'static str {
///         match self { Level::Low => "LOW", Level::High => "HIGH" }
///     }
/// }
/// ```
pub trait ConfigEnum: Typed + Copy {
    /// All variants in declaration order.
    fn variants() -> &'static [Self];

    /// Canonical name of this variant.
    fn name(&self) -> &'static str;
}

struct EnumLookup {
    exact: HashMap<&'static str, usize>,
    /// Lower-cased, underscores removed. First declared variant wins.
    fuzzy: HashMap<String, usize>,
    names: Vec<&'static str>,
}

fn normalize(name: &str) -> String {
    name.chars()
        .filter(|c| *c != '_')
        .flat_map(char::to_lowercase)
        .collect()
}

impl EnumLookup {
    fn new(ops: &EnumOps) -> Self {
        let names = (ops.names)();
        let mut exact = HashMap::new();
        let mut fuzzy = HashMap::new();
        for (index, name) in names.iter().enumerate() {
            exact.entry(*name).or_insert(index);
            fuzzy.entry(normalize(name)).or_insert(index);
        }
        Self { exact, fuzzy, names }
    }

    fn find(&self, input: &str) -> Option<usize> {
        self.exact
            .get(input)
            .or_else(|| self.fuzzy.get(&normalize(input)))
            .copied()
    }
}

/// Serializer for every [`ConfigEnum`], caching name lookups per type.
#[derive(Default)]
pub struct EnumSerializer {
    lookups: DashMap<TypeId, Arc<EnumLookup>>,
}

impl EnumSerializer {
    pub fn new() -> Self {
        Self::default()
    }

    fn lookup(&self, ty: &TypeToken, ops: &EnumOps) -> Arc<EnumLookup> {
        self.lookups
            .entry(ty.id())
            .or_insert_with(|| Arc::new(EnumLookup::new(ops)))
            .clone()
    }
}

fn enum_ops(ty: &TypeToken) -> SerializationResult<&EnumOps> {
    match ty.kind() {
        TypeKind::Enum(ops) => Ok(ops),
        _ => Err(type_mismatch(ty)),
    }
}

impl TypeSerializer for EnumSerializer {
    fn deserialize(&self, ty: &TypeToken, node: &mut ConfigNode) -> SerializationResult<DynValue> {
        let ops = enum_ops(ty)?;
        let input = scalar_value(node)?.to_string();
        let lookup = self.lookup(ty, ops);
        lookup
            .find(input.trim())
            .and_then(ops.create)
            .ok_or_else(|| {
                SerializationError::coercion(
                    &input,
                    format!("{} (one of {})", ty.name(), lookup.names.join(", ")),
                )
            })
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
        let name = (enum_ops(ty)?.name_of)(value).ok_or_else(|| type_mismatch(ty))?;
        node.set_value(Scalar::String(name.to_string()));
        Ok(())
    }
}
