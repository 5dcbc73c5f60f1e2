//! Hierarchical configuration library.
//!
//! # Architecture Overview
//!
//! ```text
//!   file / memory ──▶ loader ──▶ ConfigNode tree ──▶ serializers ──▶ typed values
//!                        ▲             │                 ▲
//!                        │             ▼                 │
//!                  watch service   reference ──▶ value references
//!                                      │
//!                                      └──▶ update / error channels (reactive)
//! ```
//!
//! - `node`: the tree model, paths, scalars and options
//! - `types`: type descriptors used to select serializers
//! - `serialize`: the serializer registry and built-in serializers
//! - `mapping`: struct mapping with constraints, comments and polymorphism
//! - `loader`: TOML, JSON and in-memory backing stores
//! - `watch`: filesystem change notification
//! - `reactive`: publishers, subscribers and async results
//! - `reference`: reloadable references and typed value references

pub mod error;
pub mod loader;
pub mod mapping;
pub mod node;
pub mod observability;
pub mod reactive;
pub mod reference;
pub mod serialize;
pub mod types;
pub mod watch;

pub use error::{ConfigError, ConfigResult, ParsingError, SerializationError, SerializationResult};
pub use loader::{ConfigurationLoader, FileLoader, JsonFormat, MemoryLoader, TomlFormat};
pub use mapping::{ObjectMapperFactory, ObjectType, ShapeBuilder};
pub use node::{ConfigNode, ConfigurationOptions, NodePath, PathElement, Scalar, ScalarKind};
pub use reference::{ConfigurationReference, ErrorPhase, ReferenceError, ValueReference};
pub use serialize::{TypeSerializer, TypeSerializerCollection};
pub use types::{TypeToken, Typed};
pub use watch::{WatchEvent, WatchEventKind, WatchService, Watcher};
