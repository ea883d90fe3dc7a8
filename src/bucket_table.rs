// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::{
    coding::{Decode, Encode},
    config::{PersistedConfig, BUCKET_ENTRY_SIZE},
    file::{read_exact, write_all_at, HEADER_SIZE},
};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::{
    fs::{File, OpenOptions},
    path::{Path, PathBuf},
};

/// Zero-fill chunk size used when creating the table
const ZERO_CHUNK: usize = 64 * 1_024;

/// Fixed-size on-disk array of chain heads
///
/// Slot `i` holds the node store offset of the most recently inserted node
/// whose key hashes to bucket `i`, or `0` if the bucket is empty.
pub struct BucketTable {
    file: File,
    path: PathBuf,
    config: PersistedConfig,
}

impl std::fmt::Debug for BucketTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "BucketTable({}, buckets={}, seed={:#x})",
            self.path.display(),
            self.config.num_buckets,
            self.config.seed,
        )
    }
}

impl BucketTable {
    /// Creates a bucket table with all slots empty, truncating any existing file.
    ///
    /// # Errors
    ///
    /// Will return `Err` if an IO error occurs.
    pub fn create<P: AsRef<Path>>(path: P, num_buckets: u64, seed: u64) -> crate::Result<Self> {
        let path = path.as_ref();
        let config = PersistedConfig { num_buckets, seed };
        let slots_len = config.validate()?;

        let file = OpenOptions::new()
            .create(true)
            .truncate(true)
            .read(true)
            .write(true)
            .open(path)?;

        let mut header = config.encode_into_vec()?;

        #[expect(clippy::cast_possible_truncation, reason = "header size is 4 KiB")]
        header.resize(HEADER_SIZE as usize, 0);

        write_all_at(&file, &header, 0)?;

        let zeros = vec![0; ZERO_CHUNK];
        let mut remaining = slots_len;
        let mut pos = HEADER_SIZE;

        while remaining > 0 {
            #[expect(clippy::cast_possible_truncation, reason = "bounded by ZERO_CHUNK")]
            let len = remaining.min(ZERO_CHUNK as u64) as usize;

            #[expect(clippy::indexing_slicing, reason = "len <= ZERO_CHUNK")]
            write_all_at(&file, &zeros[..len], pos)?;

            pos += len as u64;
            remaining -= len as u64;
        }

        file.sync_all()?;

        Ok(Self {
            file,
            path: path.into(),
            config,
        })
    }

    /// Opens a bucket table, reading bucket count and seed from its header.
    ///
    /// # Errors
    ///
    /// Will return `Err` if an IO error occurs, or the header is invalid.
    pub fn open<P: AsRef<Path>>(path: P, read_only: bool) -> crate::Result<Self> {
        let path = path.as_ref();

        let file = OpenOptions::new()
            .read(true)
            .write(!read_only)
            .open(path)?;

        #[expect(clippy::cast_possible_truncation, reason = "header size is 4 KiB")]
        let header = read_exact(&file, 0, HEADER_SIZE as usize)?;
        let config = PersistedConfig::decode_from(&mut &header[..])?;
        let expected_len = HEADER_SIZE + config.validate()?;
        let file_len = file.metadata()?.len();

        if file_len < expected_len {
            log::warn!(
                "Bucket table {} is truncated: {file_len} < {expected_len} bytes",
                path.display(),
            );
        }

        Ok(Self {
            file,
            path: path.into(),
            config,
        })
    }

    /// Returns the persisted configuration.
    #[must_use]
    pub fn config(&self) -> &PersistedConfig {
        &self.config
    }

    /// Returns the number of buckets.
    #[must_use]
    pub fn num_buckets(&self) -> u64 {
        self.config.num_buckets
    }

    /// Returns the hash seed.
    #[must_use]
    pub fn seed(&self) -> u64 {
        self.config.seed
    }

    /// Returns the file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn slot_offset(bucket_id: u64) -> u64 {
        HEADER_SIZE + bucket_id * u64::from(BUCKET_ENTRY_SIZE)
    }

    /// Reads the chain head of a bucket.
    ///
    /// Returns `0` for an empty bucket or a bucket id beyond the table.
    ///
    /// # Errors
    ///
    /// Will return `Err` if an IO error occurs.
    pub fn read_head(&self, bucket_id: u64) -> crate::Result<u64> {
        if bucket_id >= self.config.num_buckets {
            return Ok(0);
        }

        let buf = read_exact(
            &self.file,
            Self::slot_offset(bucket_id),
            BUCKET_ENTRY_SIZE as usize,
        )?;

        Ok((&buf[..]).read_u64::<LittleEndian>()?)
    }

    /// Points a bucket at a new chain head.
    ///
    /// The node at `offset` must already be completely written.
    ///
    /// # Errors
    ///
    /// Will return `Err` if an IO error occurs, or the bucket id is out of range.
    pub fn write_head(&self, bucket_id: u64, offset: u64) -> crate::Result<()> {
        if bucket_id >= self.config.num_buckets {
            return Err(crate::Error::BucketOutOfRange(bucket_id));
        }

        let mut buf = Vec::with_capacity(BUCKET_ENTRY_SIZE as usize);
        buf.write_u64::<LittleEndian>(offset)?;

        write_all_at(&self.file, &buf, Self::slot_offset(bucket_id))?;

        Ok(())
    }

    /// Flushes the table to disk.
    ///
    /// # Errors
    ///
    /// Will return `Err` if an IO error occurs.
    pub fn sync(&self) -> crate::Result<()> {
        self.file.sync_all()?;
        Ok(())
    }
}
