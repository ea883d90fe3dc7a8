// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering::Relaxed;

/// Runtime counters of one index
#[derive(Debug, Default)]
pub struct Metrics {
    /// Number of single-key lookups that were performed
    pub(crate) lookups: AtomicUsize,

    /// Number of nodes that were actually read from disk
    pub(crate) node_load_io: AtomicUsize,

    /// Number of nodes that were read from the node cache
    pub(crate) node_load_cached: AtomicUsize,

    /// Number of node bytes read from disk
    pub(crate) node_bytes_read: AtomicUsize,

    /// Number of nodes appended
    pub(crate) nodes_written: AtomicUsize,
}

#[allow(clippy::cast_precision_loss)]
impl Metrics {
    /// Number of single-key lookups performed.
    pub fn lookups(&self) -> usize {
        self.lookups.load(Relaxed)
    }

    /// Number of nodes that were read from disk.
    pub fn node_loads_io(&self) -> usize {
        self.node_load_io.load(Relaxed)
    }

    /// Number of nodes that were accessed.
    pub fn node_loads(&self) -> usize {
        self.node_load_cached.load(Relaxed) + self.node_load_io.load(Relaxed)
    }

    /// Number of node bytes read from disk.
    pub fn node_bytes_read(&self) -> usize {
        self.node_bytes_read.load(Relaxed)
    }

    /// Number of nodes appended.
    pub fn nodes_written(&self) -> usize {
        self.nodes_written.load(Relaxed)
    }

    /// Node cache efficiency in percent (0.0 - 1.0).
    pub fn node_cache_efficiency(&self) -> f64 {
        let queries = self.node_loads() as f64;
        let hits = self.node_load_cached.load(Relaxed) as f64;
        hits / queries
    }

    /// Average number of nodes visited per lookup.
    pub fn avg_chain_walk(&self) -> f64 {
        self.node_loads() as f64 / self.lookups() as f64
    }
}
