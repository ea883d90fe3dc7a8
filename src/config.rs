// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::{
    bucket_table::BucketTable,
    coding::{Decode, DecodeError, Encode, EncodeError},
    file::{fsync_directory, index_paths, BUCKETS_MAGIC, HEADER_SIZE},
    node::store::NodeStore,
    Cache, Index,
};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::{
    io::{Cursor, Read, Write},
    path::{Path, PathBuf},
    sync::Arc,
};

/// Current on-disk format version of both index files
pub const FORMAT_VERSION: u16 = 1;

/// Size of one bucket slot (a little-endian u64 node offset)
pub const BUCKET_ENTRY_SIZE: u32 = 8;

/// Bucket count of a new index unless configured otherwise
pub const DEFAULT_BUCKET_COUNT: u64 = 4_096;

/// Hash seed of a new index unless configured otherwise
pub const DEFAULT_SEED: u64 = 0x0012_3456_78ab_cdef;

// magic + version + reserved + page_size + num_buckets + seed + entry_size
const CHECKSUMMED_LEN: usize = 4 + 2 + 2 + 4 + 8 + 8 + 4;

/// Everything a reader needs to hash and mask keys the way the builder did
///
/// Lives in the bucket table header, so opening an index never depends on
/// out-of-band settings.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[allow(clippy::module_name_repetitions)]
pub struct PersistedConfig {
    /// Number of bucket slots, always a power of two
    pub num_buckets: u64,

    /// Seed fed into the key hash
    pub seed: u64,
}

impl Default for PersistedConfig {
    fn default() -> Self {
        Self {
            num_buckets: DEFAULT_BUCKET_COUNT,
            seed: DEFAULT_SEED,
        }
    }
}

impl PersistedConfig {
    /// Mask that turns a hash into a bucket id.
    #[must_use]
    pub fn mask(&self) -> u64 {
        self.num_buckets - 1
    }

    /// Checks the bucket count, returning the size of the bucket slots in bytes.
    pub(crate) fn validate(&self) -> crate::Result<u64> {
        if !self.num_buckets.is_power_of_two() {
            return Err(crate::Error::InvalidBucketCount(self.num_buckets));
        }

        self.num_buckets
            .checked_mul(u64::from(BUCKET_ENTRY_SIZE))
            .and_then(|len| len.checked_add(HEADER_SIZE))
            .map(|len| len - HEADER_SIZE)
            .ok_or(crate::Error::InvalidBucketCount(self.num_buckets))
    }
}

// NOTE:
// BUCKET TABLE HEADER LAYOUT
//
// [magic; 4B]
// [version; 2B]
// [reserved; 2B]
// [page size; 4B]
// [num buckets; 8B]
// [hash seed; 8B]
// [entry size; 4B]
// [xxh3 checksum of all bytes above; 16B]
// [zero padding up to HEADER_SIZE]
impl Encode for PersistedConfig {
    fn encode_into<W: Write>(&self, writer: &mut W) -> Result<(), EncodeError> {
        let mut head = Vec::with_capacity(CHECKSUMMED_LEN);

        head.write_all(&BUCKETS_MAGIC)?;
        head.write_u16::<LittleEndian>(FORMAT_VERSION)?;
        head.write_u16::<LittleEndian>(0)?;

        #[expect(clippy::cast_possible_truncation, reason = "header size is 4 KiB")]
        head.write_u32::<LittleEndian>(HEADER_SIZE as u32)?;

        head.write_u64::<LittleEndian>(self.num_buckets)?;
        head.write_u64::<LittleEndian>(self.seed)?;
        head.write_u32::<LittleEndian>(BUCKET_ENTRY_SIZE)?;

        let checksum = xxhash_rust::xxh3::xxh3_128(&head);

        writer.write_all(&head)?;
        writer.write_u128::<LittleEndian>(checksum)?;

        Ok(())
    }
}

impl Decode for PersistedConfig {
    fn decode_from<R: Read>(reader: &mut R) -> Result<Self, DecodeError> {
        let mut head = [0u8; CHECKSUMMED_LEN];
        reader.read_exact(&mut head)?;

        let expected_checksum = reader.read_u128::<LittleEndian>()?;

        let mut cursor = Cursor::new(&head[..]);

        let mut magic = [0u8; BUCKETS_MAGIC.len()];
        cursor.read_exact(&mut magic)?;

        if magic != BUCKETS_MAGIC {
            return Err(DecodeError::InvalidHeader("BucketTable"));
        }

        let checksum = xxhash_rust::xxh3::xxh3_128(&head);
        if checksum != expected_checksum {
            log::error!(
                "Checksum mismatch for bucket table header, got={checksum}, expected={expected_checksum}",
            );
            return Err(DecodeError::ChecksumMismatch {
                got: checksum,
                expected: expected_checksum,
            });
        }

        let version = cursor.read_u16::<LittleEndian>()?;
        if version != FORMAT_VERSION {
            return Err(DecodeError::InvalidVersion(version));
        }

        let _reserved = cursor.read_u16::<LittleEndian>()?;
        let _page_size = cursor.read_u32::<LittleEndian>()?;

        let num_buckets = cursor.read_u64::<LittleEndian>()?;
        let seed = cursor.read_u64::<LittleEndian>()?;

        let entry_size = cursor.read_u32::<LittleEndian>()?;
        if entry_size != BUCKET_ENTRY_SIZE {
            return Err(DecodeError::InvalidHeader("BucketEntrySize"));
        }

        Ok(Self { num_buckets, seed })
    }
}

/// Index configuration builder
#[derive(Clone)]
pub struct Config {
    /// Persistent configuration
    ///
    /// Only used when creating an index, opening reads it from disk
    #[doc(hidden)]
    pub inner: PersistedConfig,

    /// Folder holding the index files
    #[doc(hidden)]
    pub path: PathBuf,

    /// Index name, used as file stem
    #[doc(hidden)]
    pub name: String,

    /// Whether to fsync the node store before publishing a bucket head
    #[doc(hidden)]
    pub sync_each_insert: bool,

    /// Open the files without write access
    #[doc(hidden)]
    pub read_only: bool,

    /// Node cache to use
    #[doc(hidden)]
    pub cache: Option<Arc<Cache>>,
}

impl Config {
    /// Initializes a new config for the index `name` inside `folder`.
    pub fn new<P: AsRef<Path>>(folder: P, name: &str) -> Self {
        Self {
            inner: PersistedConfig::default(),
            path: folder.as_ref().into(),
            name: name.into(),
            sync_each_insert: true,
            read_only: false,
            cache: None,
        }
    }

    /// Sets the number of buckets.
    ///
    /// More buckets mean shorter chains, at 8 bytes of disk space per bucket.
    ///
    /// Default = 4096
    ///
    /// # Panics
    ///
    /// Panics if `n` is not a power of two.
    #[must_use]
    pub fn bucket_count(mut self, n: u64) -> Self {
        assert!(n.is_power_of_two(), "bucket count must be a power of two");

        self.inner.num_buckets = n;
        self
    }

    /// Sets the hash seed.
    #[must_use]
    pub fn seed(mut self, seed: u64) -> Self {
        self.inner.seed = seed;
        self
    }

    /// If enabled, every single insert syncs the new node to disk
    /// before the bucket head is pointed at it.
    ///
    /// Bulk builds always sync once at the end instead.
    ///
    /// Default = true
    #[must_use]
    pub fn sync_each_insert(mut self, flag: bool) -> Self {
        self.sync_each_insert = flag;
        self
    }

    /// Opens the index files without write access.
    ///
    /// Default = false
    #[must_use]
    pub fn read_only(mut self, flag: bool) -> Self {
        self.read_only = flag;
        self
    }

    /// Sets the node cache.
    ///
    /// The cache may be shared between indices.
    #[must_use]
    pub fn use_cache(mut self, cache: Arc<Cache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Returns the paths of the bucket table and node store.
    #[must_use]
    pub fn paths(&self) -> (PathBuf, PathBuf) {
        index_paths(&self.path, &self.name)
    }

    /// Returns `true` if both index files exist.
    ///
    /// # Errors
    ///
    /// Will return `Err` if an IO error occurs.
    pub fn exists(&self) -> crate::Result<bool> {
        let (buckets, nodes) = self.paths();
        Ok(buckets.try_exists()? && nodes.try_exists()?)
    }

    /// Creates empty index files, truncating existing ones.
    ///
    /// # Errors
    ///
    /// Will return `Err` if an IO error occurs.
    pub fn create(self) -> crate::Result<Index> {
        self.inner.validate()?;

        std::fs::create_dir_all(&self.path)?;

        let (buckets_path, nodes_path) = self.paths();

        log::debug!(
            "Creating index {:?} at {} with {} buckets",
            self.name,
            self.path.display(),
            self.inner.num_buckets,
        );

        let buckets = BucketTable::create(&buckets_path, self.inner.num_buckets, self.inner.seed)?;
        let nodes = NodeStore::create(&nodes_path)?;

        fsync_directory(&self.path)?;

        Ok(Index::from_parts(buckets, nodes, &self))
    }

    /// Opens existing index files.
    ///
    /// Bucket count and seed are taken from disk; the values set on this
    /// config are ignored.
    ///
    /// # Errors
    ///
    /// Will return `Err` if an IO error occurs.
    pub fn open(self) -> crate::Result<Index> {
        let (buckets_path, nodes_path) = self.paths();

        let buckets = BucketTable::open(&buckets_path, self.read_only)?;
        let nodes = NodeStore::open(&nodes_path, self.read_only)?;

        Ok(Index::from_parts(buckets, nodes, &self))
    }
}
