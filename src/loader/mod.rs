//! Loading and saving whole configuration trees.
//!
//! # Responsibilities
//! - Abstract the backing store behind [`ConfigurationLoader`]
//! - Provide file loaders for TOML and JSON, and an in-memory loader
//!
//! # Design Decisions
//! - A missing file loads as an empty map so first runs can save defaults
//! - File saves go through a temporary file in the same directory and a rename

mod file;
mod format;
mod memory;

pub use file::{json, toml, FileLoader};
pub use format::{Format, JsonFormat, TomlFormat};
pub use memory::MemoryLoader;

use std::sync::Arc;

use crate::error::ConfigResult;
use crate::node::{ConfigNode, ConfigurationOptions};

/// A backing store for one configuration tree.
pub trait ConfigurationLoader: Send + Sync {
    /// Load using `options` for the returned node.
    fn load_with(&self, options: ConfigurationOptions) -> ConfigResult<ConfigNode>;

    fn save(&self, node: &ConfigNode) -> ConfigResult<()>;

    fn default_options(&self) -> ConfigurationOptions;

    fn load(&self) -> ConfigResult<ConfigNode> {
        self.load_with(self.default_options())
    }

    fn can_load(&self) -> bool {
        true
    }

    fn can_save(&self) -> bool {
        true
    }

    /// An empty node carrying this loader's default options.
    fn create_node(&self) -> ConfigNode {
        ConfigNode::new(self.default_options())
    }
}

impl<L: ConfigurationLoader + ?Sized> ConfigurationLoader for Arc<L> {
    fn load_with(&self, options: ConfigurationOptions) -> ConfigResult<ConfigNode> {
        (**self).load_with(options)
    }

    fn save(&self, node: &ConfigNode) -> ConfigResult<()> {
        (**self).save(node)
    }

    fn default_options(&self) -> ConfigurationOptions {
        (**self).default_options()
    }

    fn can_load(&self) -> bool {
        (**self).can_load()
    }

    fn can_save(&self) -> bool {
        (**self).can_save()
    }
}
