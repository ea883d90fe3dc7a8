// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

/// Number of leading key bytes that take part in hashing.
///
/// Keys sharing a longer prefix collide; the bucket chain sorts them out.
pub const PREFIX_LEN: usize = 14;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0100_0000_01b3;

/// Hashes the first [`PREFIX_LEN`] bytes of an already normalized key.
///
/// Seeded FNV-1a followed by a 3-round xorshift-multiply finalizer, because
/// plain FNV-1a diffuses poorly into the low bits used by the bucket mask.
#[must_use]
pub fn hash64(key: &[u8], seed: u64) -> u64 {
    let prefix = key.get(..PREFIX_LEN).unwrap_or(key);

    let mut h = FNV_OFFSET ^ seed;
    for &byte in prefix {
        h ^= u64::from(byte);
        h = h.wrapping_mul(FNV_PRIME);
    }

    h ^= h >> 33;
    h = h.wrapping_mul(0xff51_afd7_ed55_8ccd);
    h ^= h >> 33;
    h = h.wrapping_mul(0xc4ce_b9fe_1a85_ec53);
    h ^= h >> 33;

    h
}

/// Maps a hash to a bucket, `mask` being `num_buckets - 1`.
#[must_use]
pub fn bucket_id(hash: u64, mask: u64) -> u64 {
    hash & mask
}
