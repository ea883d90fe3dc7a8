// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use super::Node;
use crate::{
    coding::{DecodeError, Encode},
    config::FORMAT_VERSION,
    file::{read_exact, write_all_at, HEADER_SIZE, NODES_MAGIC},
};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::{
    fs::{File, OpenOptions},
    io::{Read, Write},
    path::{Path, PathBuf},
};

const KEY_LEN_SIZE: usize = std::mem::size_of::<u16>();
const LIST_LEN_SIZE: usize = std::mem::size_of::<u32>();
const OFFSET_SIZE: usize = std::mem::size_of::<u64>();

/// Append-only file of chain nodes
///
/// The file starts with a reserved header region; every node lives past it,
/// so a node offset is never `0`.
pub struct NodeStore {
    file: File,
    path: PathBuf,
}

impl std::fmt::Debug for NodeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "NodeStore({})", self.path.display())
    }
}

impl NodeStore {
    /// Creates an empty node store, truncating any existing file.
    ///
    /// # Errors
    ///
    /// Will return `Err` if an IO error occurs.
    pub fn create<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let path = path.as_ref();

        let file = OpenOptions::new()
            .create(true)
            .truncate(true)
            .read(true)
            .write(true)
            .open(path)?;

        #[expect(clippy::cast_possible_truncation, reason = "header size is 4 KiB")]
        let mut header = Vec::with_capacity(HEADER_SIZE as usize);
        header.write_all(&NODES_MAGIC)?;
        header.write_u16::<LittleEndian>(FORMAT_VERSION)?;

        #[expect(clippy::cast_possible_truncation, reason = "header size is 4 KiB")]
        header.resize(HEADER_SIZE as usize, 0);

        write_all_at(&file, &header, 0)?;
        file.sync_all()?;

        Ok(Self {
            file,
            path: path.into(),
        })
    }

    /// Opens an existing node store.
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

        let header = read_exact(&file, 0, NODES_MAGIC.len() + std::mem::size_of::<u16>())?;
        let mut reader = &header[..];

        let mut magic = [0u8; NODES_MAGIC.len()];
        reader.read_exact(&mut magic)?;

        if magic != NODES_MAGIC {
            return Err(DecodeError::InvalidHeader("NodeStore").into());
        }

        let version = reader.read_u16::<LittleEndian>()?;
        if version != FORMAT_VERSION {
            return Err(DecodeError::InvalidVersion(version).into());
        }

        Ok(Self {
            file,
            path: path.into(),
        })
    }

    /// Returns the file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the current file length, header included.
    ///
    /// # Errors
    ///
    /// Will return `Err` if an IO error occurs.
    pub fn len(&self) -> crate::Result<u64> {
        Ok(self.file.metadata()?.len())
    }

    /// Returns `true` if no node was ever appended.
    ///
    /// # Errors
    ///
    /// Will return `Err` if an IO error occurs.
    pub fn is_empty(&self) -> crate::Result<bool> {
        Ok(self.len()? <= HEADER_SIZE)
    }

    /// Appends a node at end-of-file, returning the offset it was written at.
    ///
    /// The node is written with a single positioned write. If that fails,
    /// the file is cut back so no partial node remains.
    ///
    /// # Errors
    ///
    /// Will return `Err` if an IO error occurs, or the node cannot be encoded.
    pub fn append(&self, node: &Node) -> crate::Result<u64> {
        let bytes = node.encode_into_vec()?;

        let offset = self.len()?.max(HEADER_SIZE);

        if let Err(e) = write_all_at(&self.file, &bytes, offset) {
            log::error!(
                "Failed to append {} byte node to {} at {offset}: {e:?}",
                bytes.len(),
                self.path.display(),
            );

            if let Err(e) = self.file.set_len(offset) {
                log::error!("Failed to cut back {}: {e:?}", self.path.display());
            }

            return Err(e.into());
        }

        log::trace!("appended node {:?} at {offset}", String::from_utf8_lossy(&node.key));

        Ok(offset)
    }

    /// Reads the node starting at `offset`.
    ///
    /// The node is only self-describing field by field, so it is read in three
    /// steps: key length, then key and list length, then offsets and next pointer.
    /// Each step must be fully satisfied, and no step reads past end-of-file.
    ///
    /// # Errors
    ///
    /// Will return `Err` if an IO error occurs, the offset cannot address a node,
    /// or the node is malformed.
    pub fn read(&self, offset: u64) -> crate::Result<Node> {
        if offset < HEADER_SIZE {
            return Err(crate::Error::InvalidOffset(offset));
        }

        let file_len = self.len()?;
        let mut pos = offset;

        let buf = self.read_part(pos, KEY_LEN_SIZE, file_len)?;
        let key_len = (&buf[..]).read_u16::<LittleEndian>()?;
        pos += KEY_LEN_SIZE as u64;

        let head_len = usize::from(key_len) + LIST_LEN_SIZE;
        let mut key = self.read_part(pos, head_len, file_len)?;
        let list_len = (&key.split_off(key_len.into())[..]).read_u32::<LittleEndian>()?;
        pos += head_len as u64;

        let tail_len = (list_len as usize) * OFFSET_SIZE + OFFSET_SIZE;
        let buf = self.read_part(pos, tail_len, file_len)?;
        let mut reader = &buf[..];

        let offsets = (0..list_len)
            .map(|_| reader.read_u64::<LittleEndian>())
            .collect::<std::io::Result<Vec<_>>>()?;

        let next = reader.read_u64::<LittleEndian>()?;

        Ok(Node { key, offsets, next })
    }

    /// Reads one step of a node, refusing to allocate for lengths past end-of-file.
    fn read_part(&self, pos: u64, len: usize, file_len: u64) -> crate::Result<Vec<u8>> {
        let available = file_len.saturating_sub(pos);

        if (len as u64) > available {
            #[expect(clippy::cast_possible_truncation, reason = "available < len")]
            return Err(DecodeError::ShortRead {
                offset: pos,
                expected: len,
                got: available as usize,
            }
            .into());
        }

        Ok(read_exact(&self.file, pos, len)?)
    }

    /// Flushes appended nodes to disk.
    ///
    /// # Errors
    ///
    /// Will return `Err` if an IO error occurs.
    pub fn sync(&self) -> crate::Result<()> {
        self.file.sync_data()?;
        Ok(())
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn node_store_append_read() -> crate::Result<()> {
        let dir = tempfile::tempdir()?;
        let store = NodeStore::create(dir.path().join("t.nodes"))?;
        assert!(store.is_empty()?);

        let a = Node::single(b"helloworld".to_vec(), 0, 0);
        let a_offset = store.append(&a)?;
        assert_eq!(HEADER_SIZE, a_offset);

        let b = Node {
            key: b"goodbye".to_vec(),
            offsets: vec![27, 99, 1_000_000],
            next: a_offset,
        };
        let b_offset = store.append(&b)?;
        assert_eq!(HEADER_SIZE + a.encoded_len() as u64, b_offset);

        assert_eq!(a, store.read(a_offset)?);
        assert_eq!(b, store.read(b_offset)?);
        assert!(!store.is_empty()?);

        Ok(())
    }

    #[test]
    fn node_store_reopen() -> crate::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("t.nodes");

        let offset = {
            let store = NodeStore::create(&path)?;
            let offset = store.append(&Node::single(b"k".to_vec(), 5, 0))?;
            store.sync()?;
            offset
        };

        let store = NodeStore::open(&path, false)?;
        assert_eq!(Node::single(b"k".to_vec(), 5, 0), store.read(offset)?);

        // appends continue at end-of-file
        let next = store.append(&Node::single(b"j".to_vec(), 6, offset))?;
        assert!(next > offset);

        Ok(())
    }

    #[test]
    fn node_store_rejects_header_offsets() -> crate::Result<()> {
        let dir = tempfile::tempdir()?;
        let store = NodeStore::create(dir.path().join("t.nodes"))?;

        assert!(matches!(store.read(0), Err(crate::Error::InvalidOffset(0))));
        assert!(matches!(
            store.read(HEADER_SIZE - 1),
            Err(crate::Error::InvalidOffset(_))
        ));

        Ok(())
    }

    #[test]
    fn node_store_truncated_node() -> crate::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("t.nodes");
        let store = NodeStore::create(&path)?;

        let node = Node {
            key: b"truncated".to_vec(),
            offsets: vec![1, 2, 3],
            next: 0,
        };
        let offset = store.append(&node)?;

        // Longest cut first, so each `set_len` shrinks the file
        for cut in [node.encoded_len() - 1, 15, 8, 1] {
            let file = OpenOptions::new().write(true).open(&path)?;
            file.set_len(offset + cut as u64)?;

            assert!(matches!(
                store.read(offset),
                Err(crate::Error::Decode(DecodeError::ShortRead { .. }))
            ));
        }

        Ok(())
    }

    #[test]
    fn node_store_huge_list_len_is_short_read() -> crate::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("t.nodes");
        let store = NodeStore::create(&path)?;

        // key_len=1, key="x", list_len=u32::MAX, no offsets
        let mut garbage = vec![1, 0, b'x'];
        garbage.extend_from_slice(&u32::MAX.to_le_bytes());
        garbage.extend_from_slice(&[0; 8]);
        write_all_at(&std::fs::File::options().write(true).open(&path)?, &garbage, HEADER_SIZE)?;

        let err = store.read(HEADER_SIZE).unwrap_err();
        assert!(matches!(
            err,
            crate::Error::Decode(DecodeError::ShortRead { expected, .. }) if expected == (u32::MAX as usize) * 8 + 8
        ));

        Ok(())
    }

    #[test]
    fn node_store_rejects_foreign_file() -> crate::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("t.nodes");
        std::fs::write(&path, b"not a node store")?;

        assert!(matches!(
            NodeStore::open(&path, true),
            Err(crate::Error::Decode(DecodeError::InvalidHeader("NodeStore")))
        ));

        Ok(())
    }
}
