// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! A persistent, append-only inverted hash index.
//!
//! ##### About
//!
//! This crate maps normalized string keys (e.g. book titles or author names)
//! to posting lists: lists of byte offsets into an external record store,
//! such as a CSV file. The index lives in two files:
//!
//! - a fixed-size **bucket table**, holding one chain head per bucket
//! - an append-only **node store**, holding chain nodes
//!
//! A key is hashed (seeded FNV-1a over a bounded prefix, plus a finalizer)
//! to a bucket. Inserting prepends a new node to that bucket's chain;
//! nothing is ever rewritten in place, except the 8-byte bucket head.
//! Looking a key up walks the bucket chain and collects the postings of every
//! node whose stored key matches.
//!
//! Two indices over the same record store can be queried together,
//! intersecting their results (e.g. "title AND author").
//!
//! Keys are normalized before hashing: accents are stripped, letters lowercased,
//! and everything but letters and digits dropped, so `"Hello, World"` and
//! `"hello world"` are the same key.
//!
//! There is no deletion and no compaction. Chains only grow.
//!
//! # Example usage
//!
//! ```
//! use posting_index::{Config, lookup_conjunctive};
//! #
//! # let folder = tempfile::tempdir()?;
//!
//! let mut titles = Config::new(&folder, "title").create()?;
//! let mut authors = Config::new(&folder, "author").create()?;
//!
//! // Record offsets point into some external record store
//! titles.insert_one("Dune", 100)?;
//! authors.insert_one("Frank Herbert", 100)?;
//!
//! titles.insert_one("Dune", 250)?;
//! authors.insert_one("Brian Herbert", 250)?;
//!
//! assert_eq!(vec![250, 100], titles.lookup("DUNE")?.into_vec());
//!
//! let hits = lookup_conjunctive(&titles, &authors, "dune", "frank herbert")?;
//! assert_eq!(vec![100], hits.into_vec());
//!
//! // Indices are persistent
//! titles.sync()?;
//! drop(titles);
//!
//! let titles = Config::new(&folder, "title").open()?;
//! assert_eq!(2, titles.lookup("dune")?.len());
//! #
//! # Ok::<(), posting_index::Error>(())
//! ```

#![doc(html_logo_url = "https://raw.githubusercontent.com/fjall-rs/lsm-tree/main/logo.png")]
#![doc(html_favicon_url = "https://raw.githubusercontent.com/fjall-rs/lsm-tree/main/logo.png")]
#![deny(clippy::all, missing_docs, clippy::cargo)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::indexing_slicing)]
#![warn(clippy::pedantic, clippy::nursery)]
#![warn(clippy::expect_used)]
#![allow(clippy::missing_const_for_fn)]
#![warn(clippy::multiple_crate_versions)]
#![allow(clippy::option_if_let_else)]
#![warn(clippy::redundant_feature_names)]
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

#[doc(hidden)]
pub type HashMap<K, V> = std::collections::HashMap<K, V, rustc_hash::FxBuildHasher>;

#[doc(hidden)]
pub mod bucket_table;

mod builder;
mod cache;

/// Catalog of a CSV file with title and author indices
pub mod catalog;

#[doc(hidden)]
pub mod coding;

/// Configuration
pub mod config;

mod error;

#[doc(hidden)]
pub mod file;

/// Key hashing
pub mod hash;

mod index;
mod lookup;

#[cfg(feature = "metrics")]
pub(crate) mod metrics;

#[doc(hidden)]
pub mod node;

mod normalize;
mod posting;

/// Record stores
pub mod record;

/// Index verification
pub mod verify;

#[doc(hidden)]
pub use {
    bucket_table::BucketTable,
    config::PersistedConfig,
    node::{store::NodeStore, Node},
};

pub use {
    builder::{build, BuildStats, Builder},
    cache::Cache,
    catalog::{Catalog, CatalogOptions},
    config::Config,
    error::{Error, Result},
    index::{Chain, Index, IndexId},
    lookup::{lookup, lookup_conjunctive},
    normalize::{normalize, MAX_KEY_LEN},
    posting::{intersect_sorted, PostingList},
    record::{CsvSource, Field, Record, RecordSource},
    verify::{verify, Issue, VerifyReport},
};

#[cfg(feature = "metrics")]
pub use metrics::Metrics;

#[doc(hidden)]
#[must_use]
#[allow(missing_docs, clippy::missing_errors_doc, clippy::unwrap_used)]
pub fn get_tmp_folder() -> tempfile::TempDir {
    if let Ok(p) = std::env::var("PIDX_TMP_FOLDER") {
        tempfile::tempdir_in(p)
    } else {
        tempfile::tempdir()
    }
    .unwrap()
}
