//! Locating the node a field maps to.

use std::sync::Arc;

use crate::mapping::meta::Setting;
use crate::mapping::naming::NamingScheme;
use crate::mapping::shape::Attributes;
use crate::node::ConfigNode;

/// Finds the node backing a field, relative to the object's node.
pub trait NodeResolver: Send + Sync {
    /// `None` skips the field for this operation.
    fn resolve<'a>(&self, parent: &'a mut ConfigNode) -> Option<&'a mut ConfigNode>;
}

/// The child at a fixed key.
pub struct KeyResolver(pub String);

impl NodeResolver for KeyResolver {
    fn resolve<'a>(&self, parent: &'a mut ConfigNode) -> Option<&'a mut ConfigNode> {
        Some(parent.node_mut(self.0.as_str()))
    }
}

/// The object's node itself.
pub struct ParentResolver;

impl NodeResolver for ParentResolver {
    fn resolve<'a>(&self, parent: &'a mut ConfigNode) -> Option<&'a mut ConfigNode> {
        Some(parent)
    }
}

/// Outcome of asking one resolver factory about a field.
pub enum ResolverChoice {
    /// Ask the next factory.
    Pass,
    /// Exclude the field from mapping.
    Skip,
    Resolve(Arc<dyn NodeResolver>),
}

/// Chooses a resolver from a field's name and attributes.
pub type ResolverFactory = Arc<dyn Fn(&str, &Attributes) -> ResolverChoice + Send + Sync>;

/// Use the key from a [`Setting`] attribute when one is given.
pub fn key_from_setting() -> ResolverFactory {
    Arc::new(|_name: &str, attributes: &Attributes| match attributes.get::<Setting>() {
        Some(Setting { key: Some(key), .. }) if !key.is_empty() => {
            ResolverChoice::Resolve(Arc::new(KeyResolver(key.clone())))
        }
        _ => ResolverChoice::Pass,
    })
}

/// Map fields marked [`Setting::from_parent`] onto the object's own node.
pub fn node_from_parent() -> ResolverFactory {
    Arc::new(|_name: &str, attributes: &Attributes| match attributes.get::<Setting>() {
        Some(setting) if setting.node_from_parent => ResolverChoice::Resolve(Arc::new(ParentResolver)),
        _ => ResolverChoice::Pass,
    })
}

/// Exclude every field without a [`Setting`] attribute.
pub fn only_with_setting() -> ResolverFactory {
    Arc::new(|_name: &str, attributes: &Attributes| {
        if attributes.contains::<Setting>() {
            ResolverChoice::Pass
        } else {
            ResolverChoice::Skip
        }
    })
}

/// Derive the key from the field name.
pub fn naming(scheme: NamingScheme) -> ResolverFactory {
    Arc::new(move |name: &str, _attributes: &Attributes| {
        ResolverChoice::Resolve(Arc::new(KeyResolver(scheme.coerce(name))))
    })
}
