// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::coding::DecodeError;
use std::{
    fs::File,
    path::{Path, PathBuf},
};

pub const BUCKETS_MAGIC: [u8; 4] = *b"PIDX";
pub const NODES_MAGIC: [u8; 4] = *b"PNOD";

/// Size of the reserved region at the start of both index files.
///
/// No node and no bucket slot ever lives inside it, so offset 0 is free to
/// act as the null pointer.
pub const HEADER_SIZE: u64 = 4_096;

pub const BUCKETS_FILE_EXT: &str = "buckets";
pub const NODES_FILE_EXT: &str = "nodes";

/// Returns the paths of the bucket table and node store for an index.
#[must_use]
pub fn index_paths(folder: &Path, name: &str) -> (PathBuf, PathBuf) {
    (
        folder.join(format!("{name}.{BUCKETS_FILE_EXT}")),
        folder.join(format!("{name}.{NODES_FILE_EXT}")),
    )
}

#[cfg(unix)]
fn pread(file: &File, buf: &mut [u8], offset: u64) -> std::io::Result<usize> {
    use std::os::unix::fs::FileExt;
    file.read_at(buf, offset)
}

#[cfg(windows)]
fn pread(file: &File, buf: &mut [u8], offset: u64) -> std::io::Result<usize> {
    use std::os::windows::fs::FileExt;
    file.seek_read(buf, offset)
}

#[cfg(unix)]
fn pwrite(file: &File, buf: &[u8], offset: u64) -> std::io::Result<usize> {
    use std::os::unix::fs::FileExt;
    file.write_at(buf, offset)
}

#[cfg(windows)]
fn pwrite(file: &File, buf: &[u8], offset: u64) -> std::io::Result<usize> {
    use std::os::windows::fs::FileExt;
    file.seek_write(buf, offset)
}

/// Reads up to `buf.len()` bytes at `offset`, stopping early only at end-of-file.
///
/// Returns the number of bytes read.
pub fn read_at_most(file: &File, buf: &mut [u8], offset: u64) -> std::io::Result<usize> {
    let mut total = 0;

    while total < buf.len() {
        #[expect(clippy::indexing_slicing, reason = "total < buf.len()")]
        match pread(file, &mut buf[total..], offset + total as u64) {
            Ok(0) => break,
            Ok(n) => total += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }

    Ok(total)
}

/// Reads exactly `len` bytes at `offset`.
///
/// A short read is reported as [`DecodeError::ShortRead`], never as partial data.
pub fn read_exact(file: &File, offset: u64, len: usize) -> Result<Vec<u8>, DecodeError> {
    let mut buf = vec![0; len];
    let got = read_at_most(file, &mut buf, offset)?;

    if got != len {
        return Err(DecodeError::ShortRead {
            offset,
            expected: len,
            got,
        });
    }

    Ok(buf)
}

/// Writes the whole buffer at `offset`.
pub fn write_all_at(file: &File, buf: &[u8], offset: u64) -> std::io::Result<()> {
    let mut total = 0;

    while total < buf.len() {
        #[expect(clippy::indexing_slicing, reason = "total < buf.len()")]
        match pwrite(file, &buf[total..], offset + total as u64) {
            Ok(0) => {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::WriteZero,
                    "failed to write whole buffer",
                ))
            }
            Ok(n) => total += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }

    Ok(())
}

#[cfg(not(target_os = "windows"))]
pub fn fsync_directory(path: &Path) -> std::io::Result<()> {
    let file = std::fs::File::open(path)?;
    debug_assert!(file.metadata()?.is_dir());
    file.sync_all()
}

#[cfg(target_os = "windows")]
pub fn fsync_directory(path: &Path) -> std::io::Result<()> {
    // Cannot fsync directory on Windows
    Ok(())
}
