//! In-memory backing store.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::ConfigResult;
use crate::loader::ConfigurationLoader;
use crate::node::{ConfigNode, ConfigurationOptions};

#[derive(Debug, Default)]
struct Store {
    node: Option<ConfigNode>,
    saves: usize,
}

/// Keeps the "persisted" tree in memory. Clones share the same store.
#[derive(Debug, Clone)]
pub struct MemoryLoader {
    store: Arc<Mutex<Store>>,
    options: ConfigurationOptions,
}

impl MemoryLoader {
    pub fn new(options: ConfigurationOptions) -> Self {
        Self {
            store: Arc::new(Mutex::new(Store::default())),
            options,
        }
    }

    /// Seed the store with `node`.
    pub fn with_node(self, node: ConfigNode) -> Self {
        self.replace(node);
        self
    }

    /// Replace the stored tree, as an external edit would.
    pub fn replace(&self, node: ConfigNode) {
        self.store.lock().node = Some(node.detached());
    }

    /// Copy of the stored tree, if anything has been stored.
    pub fn stored(&self) -> Option<ConfigNode> {
        self.store.lock().node.clone()
    }

    pub fn save_count(&self) -> usize {
        self.store.lock().saves
    }
}

impl Default for MemoryLoader {
    fn default() -> Self {
        Self::new(ConfigurationOptions::defaults())
    }
}

impl ConfigurationLoader for MemoryLoader {
    fn load_with(&self, options: ConfigurationOptions) -> ConfigResult<ConfigNode> {
        match &self.store.lock().node {
            Some(node) => Ok(node.with_options(options)),
            None => {
                let mut node = ConfigNode::new(options);
                node.set_empty_map();
                Ok(node)
            }
        }
    }

    fn save(&self, node: &ConfigNode) -> ConfigResult<()> {
        let mut store = self.store.lock();
        store.node = Some(node.detached());
        store.saves += 1;
        Ok(())
    }

    fn default_options(&self) -> ConfigurationOptions {
        self.options.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_store_loads_empty_map() {
        let loader = MemoryLoader::default();
        let node = loader.load().unwrap();
        assert!(node.is_map());
        assert!(!node.has_children());
    }

    #[test]
    fn test_save_then_load() {
        let loader = MemoryLoader::default();
        let mut node = loader.create_node();
        node.node_mut("a").set_value(1i32);
        loader.save(&node).unwrap();
        assert_eq!(loader.load().unwrap(), node);
        assert_eq!(loader.save_count(), 1);
    }
}
