//! Options shared by every node of a tree.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use crate::node::ScalarKind;
use crate::serialize::TypeSerializerCollection;

/// Immutable settings inherited by every node created from a root.
///
/// Modified copies are produced with the `with_*` methods.
#[derive(Clone)]
pub struct ConfigurationOptions {
    serializers: Arc<TypeSerializerCollection>,
    native_types: Option<Arc<HashSet<ScalarKind>>>,
    copy_defaults: bool,
    implicit_initialization: bool,
    header: Option<String>,
}

impl ConfigurationOptions {
    /// Options backed by the given serializers.
    pub fn new(serializers: Arc<TypeSerializerCollection>) -> Self {
        Self {
            serializers,
            native_types: None,
            copy_defaults: false,
            implicit_initialization: true,
            header: None,
        }
    }

    /// Options backed by a freshly built default serializer collection.
    pub fn defaults() -> Self {
        Self::new(TypeSerializerCollection::defaults())
    }

    pub fn serializers(&self) -> &Arc<TypeSerializerCollection> {
        &self.serializers
    }

    pub fn with_serializers(mut self, serializers: Arc<TypeSerializerCollection>) -> Self {
        self.serializers = serializers;
        self
    }

    /// Restrict the scalar kinds stored without conversion.
    pub fn with_native_types(mut self, kinds: impl IntoIterator<Item = ScalarKind>) -> Self {
        self.native_types = Some(Arc::new(kinds.into_iter().collect()));
        self
    }

    /// Accept every scalar kind natively.
    pub fn with_all_native_types(mut self) -> Self {
        self.native_types = None;
        self
    }

    /// `None` when every kind is accepted.
    pub fn native_types(&self) -> Option<&HashSet<ScalarKind>> {
        self.native_types.as_deref()
    }

    /// Whether a scalar of `kind` can be stored without conversion.
    pub fn accepts(&self, kind: ScalarKind) -> bool {
        self.native_types
            .as_ref()
            .map_or(true, |kinds| kinds.contains(&kind))
    }

    /// Whether defaults are written back into the tree when read.
    pub fn copy_defaults(&self) -> bool {
        self.copy_defaults
    }

    pub fn with_copy_defaults(mut self, copy_defaults: bool) -> Self {
        self.copy_defaults = copy_defaults;
        self
    }

    /// Whether absent values are initialized with a serializer's empty value.
    pub fn implicit_initialization(&self) -> bool {
        self.implicit_initialization
    }

    pub fn with_implicit_initialization(mut self, implicit: bool) -> Self {
        self.implicit_initialization = implicit;
        self
    }

    pub fn header(&self) -> Option<&str> {
        self.header.as_deref()
    }

    pub fn with_header(mut self, header: Option<String>) -> Self {
        self.header = header;
        self
    }
}

impl Default for ConfigurationOptions {
    fn default() -> Self {
        Self::defaults()
    }
}

impl fmt::Debug for ConfigurationOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigurationOptions")
            .field("native_types", &self.native_types)
            .field("copy_defaults", &self.copy_defaults)
            .field("implicit_initialization", &self.implicit_initialization)
            .field("header", &self.header)
            .finish_non_exhaustive()
    }
}
