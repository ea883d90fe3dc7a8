// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::{
    bucket_table::BucketTable,
    hash::{bucket_id, hash64},
    node::{store::NodeStore, Node},
    normalize, Cache, Config, PostingList,
};
use std::{
    path::Path,
    sync::{atomic::AtomicU64, Arc},
};

#[cfg(feature = "metrics")]
use crate::metrics::Metrics;

/// Unique identifier of an open index, scoped to the process
pub type IndexId = u64;

static INDEX_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

fn next_index_id() -> IndexId {
    INDEX_ID_COUNTER.fetch_add(1, std::sync::atomic::Ordering::Relaxed)
}

/// An open index: bucket table plus node store
///
/// Lookups only need `&self`. Inserts take `&mut self`: the append-then-publish
/// sequence is not atomic, so there must be exactly one writer.
pub struct Index {
    id: IndexId,
    name: String,

    buckets: BucketTable,
    nodes: NodeStore,

    sync_each_insert: bool,
    cache: Option<Arc<Cache>>,

    #[cfg(feature = "metrics")]
    metrics: Arc<Metrics>,
}

impl std::fmt::Debug for Index {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Index({:?}, {:?}, {:?})", self.name, self.buckets, self.nodes)
    }
}

impl Index {
    pub(crate) fn from_parts(buckets: BucketTable, nodes: NodeStore, config: &Config) -> Self {
        Self {
            id: next_index_id(),
            name: config.name.clone(),
            buckets,
            nodes,
            sync_each_insert: config.sync_each_insert,
            cache: config.cache.clone(),

            #[cfg(feature = "metrics")]
            metrics: Arc::default(),
        }
    }

    /// Opens an index from explicit file paths, with default runtime options.
    ///
    /// Bucket count and seed come from the bucket table header.
    ///
    /// # Errors
    ///
    /// Will return `Err` if an IO error occurs, or a file header is invalid.
    pub fn open<P: AsRef<Path>, Q: AsRef<Path>>(buckets_path: P, nodes_path: Q) -> crate::Result<Self> {
        let buckets_path = buckets_path.as_ref();

        let name = buckets_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        let folder = buckets_path.parent().unwrap_or_else(|| Path::new("."));

        let buckets = BucketTable::open(buckets_path, false)?;
        let nodes = NodeStore::open(nodes_path, false)?;

        Ok(Self::from_parts(buckets, nodes, &Config::new(folder, &name)))
    }

    /// Returns the process-unique index ID.
    #[must_use]
    pub fn id(&self) -> IndexId {
        self.id
    }

    /// Returns the index name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the number of buckets.
    #[must_use]
    pub fn bucket_count(&self) -> u64 {
        self.buckets.num_buckets()
    }

    /// Returns the hash seed.
    #[must_use]
    pub fn seed(&self) -> u64 {
        self.buckets.seed()
    }

    #[doc(hidden)]
    #[must_use]
    pub fn bucket_table(&self) -> &BucketTable {
        &self.buckets
    }

    #[doc(hidden)]
    #[must_use]
    pub fn node_store(&self) -> &NodeStore {
        &self.nodes
    }

    /// Returns the runtime counters.
    #[cfg(feature = "metrics")]
    #[must_use]
    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    /// Returns the bucket a raw key lands in.
    #[must_use]
    pub fn bucket_of(&self, key: &str) -> u64 {
        self.bucket_of_normalized(normalize(key).as_bytes())
    }

    pub(crate) fn bucket_of_normalized(&self, key: &[u8]) -> u64 {
        bucket_id(hash64(key, self.seed()), self.buckets.config().mask())
    }

    /// Indexes a single record offset under `key`.
    ///
    /// Always prepends a new node to the key's bucket chain; existing nodes
    /// for the same key are left as they are.
    ///
    /// Returns the offset of the new node.
    ///
    /// # Errors
    ///
    /// Will return `Err` if an IO error occurs, or the key normalizes to nothing.
    pub fn insert_one(&mut self, key: &str, offset: u64) -> crate::Result<u64> {
        self.insert_posting(key, &[offset])
    }

    /// Indexes several record offsets under `key` with a single node.
    ///
    /// # Errors
    ///
    /// Will return `Err` if an IO error occurs, or the key normalizes to nothing.
    pub fn insert_posting(&mut self, key: &str, offsets: &[u64]) -> crate::Result<u64> {
        let key = normalize(key);
        let sync = self.sync_each_insert;
        self.insert_normalized(key.into_bytes(), offsets.to_vec(), sync)
    }

    pub(crate) fn insert_normalized(
        &mut self,
        key: Vec<u8>,
        offsets: Vec<u64>,
        sync: bool,
    ) -> crate::Result<u64> {
        if key.is_empty() {
            return Err(crate::Error::EmptyKey);
        }

        let bucket = self.bucket_of_normalized(&key);
        let head = self.buckets.read_head(bucket)?;

        let node = Node {
            key,
            offsets,
            next: head,
        };

        let offset = self.nodes.append(&node)?;

        if sync {
            self.nodes.sync()?;
        }

        // NOTE: Only publish once the node is completely written
        self.buckets.write_head(bucket, offset)?;

        #[cfg(feature = "metrics")]
        self.metrics
            .nodes_written
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);

        Ok(offset)
    }

    /// Looks up all record offsets stored under `key`.
    ///
    /// See [`crate::lookup`].
    ///
    /// # Errors
    ///
    /// Will return `Err` if an IO error occurs, or a chain node is malformed.
    pub fn lookup(&self, key: &str) -> crate::Result<PostingList> {
        crate::lookup::lookup(self, key)
    }

    /// Reads a node, going through the node cache if there is one.
    ///
    /// # Errors
    ///
    /// Will return `Err` if an IO error occurs, or the node is malformed.
    pub fn read_node(&self, offset: u64) -> crate::Result<Arc<Node>> {
        #[cfg(feature = "metrics")]
        use std::sync::atomic::Ordering::Relaxed;

        if let Some(node) = self
            .cache
            .as_ref()
            .and_then(|cache| cache.get_node(self.id, offset))
        {
            #[cfg(feature = "metrics")]
            self.metrics.node_load_cached.fetch_add(1, Relaxed);

            return Ok(node);
        }

        log::trace!("load node {offset} of {:?}", self.name);

        let node = Arc::new(self.nodes.read(offset)?);

        #[cfg(feature = "metrics")]
        {
            self.metrics.node_load_io.fetch_add(1, Relaxed);
            self.metrics
                .node_bytes_read
                .fetch_add(node.encoded_len(), Relaxed);
        }

        if let Some(cache) = &self.cache {
            cache.insert_node(self.id, offset, node.clone());
        }

        Ok(node)
    }

    /// Walks the chain of a bucket, newest node first.
    ///
    /// # Errors
    ///
    /// Will return `Err` if the bucket head cannot be read.
    pub fn chain(&self, bucket_id: u64) -> crate::Result<Chain<'_>> {
        let head = self.buckets.read_head(bucket_id)?;
        Ok(self.chain_from(head))
    }

    pub(crate) fn chain_from(&self, head: u64) -> Chain<'_> {
        Chain {
            index: self,
            cursor: head,
        }
    }

    /// Flushes both index files to disk.
    ///
    /// # Errors
    ///
    /// Will return `Err` if an IO error occurs.
    pub fn sync(&self) -> crate::Result<()> {
        self.nodes.sync()?;
        self.buckets.sync()
    }
}

/// Iterator over the nodes of one bucket chain
///
/// Yields `(node offset, node)`. Stops after the first error.
pub struct Chain<'a> {
    index: &'a Index,
    cursor: u64,
}

impl Iterator for Chain<'_> {
    type Item = crate::Result<(u64, Arc<Node>)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor == 0 {
            return None;
        }

        let offset = self.cursor;

        match self.index.read_node(offset) {
            // Nodes are only ever prepended, so a chain always points backwards
            Ok(node) if node.next != 0 && node.next >= offset => {
                log::warn!(
                    "Node {offset} in {:?} points forward to {}",
                    self.index.name(),
                    node.next,
                );
                self.cursor = 0;
                Some(Err(crate::Error::InvalidOffset(node.next)))
            }
            Ok(node) => {
                self.cursor = node.next;
                Some(Ok((offset, node)))
            }
            Err(e) => {
                self.cursor = 0;
                Some(Err(e))
            }
        }
    }
}
