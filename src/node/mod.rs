// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

pub mod store;

use crate::coding::{Decode, DecodeError, Encode, EncodeError};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

/// Size of the fixed fields: key length, list length, next pointer
pub const NODE_OVERHEAD: usize =
    std::mem::size_of::<u16>() + std::mem::size_of::<u32>() + std::mem::size_of::<u64>();

/// A chain node: one normalized key, its posting list and the next node of the bucket
///
/// Nodes are immutable once appended; a `next` of `0` ends the chain.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Node {
    /// Normalized key bytes
    pub key: Vec<u8>,

    /// Record offsets
    pub offsets: Vec<u64>,

    /// Node store offset of the next node in the chain
    pub next: u64,
}

impl Node {
    /// Creates a node holding a single posting.
    #[must_use]
    pub fn single(key: Vec<u8>, offset: u64, next: u64) -> Self {
        Self {
            key,
            offsets: vec![offset],
            next,
        }
    }

    /// Size of the node on disk.
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        NODE_OVERHEAD + self.key.len() + self.offsets.len() * std::mem::size_of::<u64>()
    }
}

// NOTE:
// NODE LAYOUT
//
// [key len; 2B]
// [...key; ?]
// [list len; 4B]
// [...offsets; 8B each]
// [next ptr; 8B]
impl Encode for Node {
    fn encode_into<W: Write>(&self, writer: &mut W) -> Result<(), EncodeError> {
        let key_len =
            u16::try_from(self.key.len()).map_err(|_| EncodeError::KeyTooLong(self.key.len()))?;

        let list_len = u32::try_from(self.offsets.len())
            .map_err(|_| EncodeError::ListTooLong(self.offsets.len()))?;

        writer.write_u16::<LittleEndian>(key_len)?;
        writer.write_all(&self.key)?;

        writer.write_u32::<LittleEndian>(list_len)?;
        for &offset in &self.offsets {
            writer.write_u64::<LittleEndian>(offset)?;
        }

        writer.write_u64::<LittleEndian>(self.next)?;

        Ok(())
    }
}

impl Decode for Node {
    fn decode_from<R: Read>(reader: &mut R) -> Result<Self, DecodeError> {
        let key_len = reader.read_u16::<LittleEndian>()?;

        let mut key = vec![0; key_len.into()];
        reader.read_exact(&mut key)?;

        let list_len = reader.read_u32::<LittleEndian>()?;

        let offsets = (0..list_len)
            .map(|_| reader.read_u64::<LittleEndian>())
            .collect::<std::io::Result<Vec<_>>>()?;

        let next = reader.read_u64::<LittleEndian>()?;

        Ok(Self { key, offsets, next })
    }
}
