//! Bounded cache of built mappers.

use std::any::TypeId;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::mapping::mapper::ObjectMapper;
use crate::observability::metrics;

pub const DEFAULT_CAPACITY: usize = 64;

/// Least-recently-used map from type to mapper. Only successfully built
/// mappers are stored; eviction happens when an insert exceeds capacity.
pub struct MapperCache {
    capacity: usize,
    inner: Mutex<CacheInner>,
}

#[derive(Default)]
struct CacheInner {
    entries: HashMap<TypeId, Arc<ObjectMapper>>,
    order: VecDeque<TypeId>,
}

impl CacheInner {
    fn touch(&mut self, id: TypeId) {
        if let Some(position) = self.order.iter().position(|entry| *entry == id) {
            self.order.remove(position);
        }
        self.order.push_back(id);
    }
}

impl MapperCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: Mutex::new(CacheInner::default()),
        }
    }

    pub fn get(&self, id: TypeId) -> Option<Arc<ObjectMapper>> {
        let mut inner = self.inner.lock();
        let mapper = inner.entries.get(&id).cloned()?;
        inner.touch(id);
        Some(mapper)
    }

    pub fn insert(&self, id: TypeId, mapper: Arc<ObjectMapper>) {
        let mut inner = self.inner.lock();
        inner.entries.insert(id, mapper);
        inner.touch(id);
        while inner.entries.len() > self.capacity {
            let Some(evicted) = inner.order.pop_front() else {
                break;
            };
            inner.entries.remove(&evicted);
            tracing::debug!(?evicted, "Evicted object mapper");
        }
        metrics::record_mapper_cache_size(inner.entries.len());
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for MapperCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
