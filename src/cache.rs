// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::{index::IndexId, node::Node};
use quick_cache::Weighter;
use quick_cache::{sync::Cache as QuickCache, Equivalent};
use std::sync::Arc;

#[derive(Eq, std::hash::Hash, PartialEq)]
struct CacheKey(IndexId, u64);

impl Equivalent<CacheKey> for (IndexId, u64) {
    fn equivalent(&self, key: &CacheKey) -> bool {
        self.0 == key.0 && self.1 == key.1
    }
}

impl From<(IndexId, u64)> for CacheKey {
    fn from((index_id, offset): (IndexId, u64)) -> Self {
        Self(index_id, offset)
    }
}

#[derive(Clone)]
struct NodeWeighter;

impl Weighter<CacheKey, Arc<Node>> for NodeWeighter {
    fn weight(&self, _: &CacheKey, node: &Arc<Node>) -> u64 {
        node.encoded_len() as u64
    }
}

/// Cache, in which decoded chain nodes are kept in-memory
/// after being read from disk
///
/// Nodes never change once written, so a cached node can never go stale;
/// only bucket heads move.
///
/// # Examples
///
/// Sharing cache between multiple indices
///
/// ```
/// # use posting_index::{Config, Cache};
/// # use std::sync::Arc;
/// #
/// // Provide 4 MB of cache capacity
/// let cache = Arc::new(Cache::with_capacity_bytes(4 * 1_000 * 1_000));
///
/// # let folder = tempfile::tempdir()?;
/// let titles = Config::new(&folder, "title").use_cache(cache.clone()).create()?;
/// let authors = Config::new(&folder, "author").use_cache(cache.clone()).create()?;
/// #
/// # Ok::<(), posting_index::Error>(())
/// ```
pub struct Cache {
    // NOTE: rustc_hash performed best: https://fjall-rs.github.io/post/fjall-2-1
    /// Concurrent cache implementation
    data: QuickCache<CacheKey, Arc<Node>, NodeWeighter, rustc_hash::FxBuildHasher>,

    /// Capacity in bytes
    capacity: u64,
}

impl Cache {
    /// Creates a new node cache with roughly `n` bytes of capacity.
    #[must_use]
    pub fn with_capacity_bytes(bytes: u64) -> Self {
        use quick_cache::sync::DefaultLifecycle;

        #[allow(clippy::default_trait_access)]
        let quick_cache = QuickCache::with(
            100_000,
            bytes,
            NodeWeighter,
            Default::default(),
            DefaultLifecycle::default(),
        );

        Self {
            data: quick_cache,
            capacity: bytes,
        }
    }

    /// Returns the amount of cached bytes.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.data.weight()
    }

    /// Returns the cache capacity in bytes.
    #[must_use]
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Returns the number of cached nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if there are no cached nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[doc(hidden)]
    pub fn insert_node(&self, index_id: IndexId, offset: u64, node: Arc<Node>) {
        if self.capacity > 0 {
            self.data.insert((index_id, offset).into(), node);
        }
    }

    #[doc(hidden)]
    #[must_use]
    pub fn get_node(&self, index_id: IndexId, offset: u64) -> Option<Arc<Node>> {
        self.data.get(&(index_id, offset))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn cache_insert_get() {
        let cache = Cache::with_capacity_bytes(1_000);
        let node = Arc::new(Node::single(b"a".to_vec(), 1, 0));

        cache.insert_node(0, 4_096, node.clone());
        assert_eq!(Some(node), cache.get_node(0, 4_096));
        assert!(cache.get_node(1, 4_096).is_none());
        assert!(cache.get_node(0, 4_097).is_none());
        assert_eq!(1, cache.len());
    }

    #[test]
    fn cache_zero_capacity_disabled() {
        let cache = Cache::with_capacity_bytes(0);
        cache.insert_node(0, 4_096, Arc::new(Node::single(b"a".to_vec(), 1, 0)));
        assert!(cache.is_empty());
    }
}
