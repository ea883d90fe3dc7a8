// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Point and conjunctive lookups.

use crate::{normalize, Index, PostingList};

/// Returns every record offset indexed under `key`.
///
/// The key is normalized, hashed to its bucket, and the bucket chain is
/// walked to the end. Postings of every node whose stored key equals the
/// normalized key are concatenated in chain order, that is newest first.
/// The result is neither sorted nor deduplicated.
///
/// A key that was never inserted yields an empty list, not an error.
///
/// # Errors
///
/// Will return `Err` if an IO error occurs, or a chain node is malformed.
/// Offsets collected before the failure are discarded.
pub fn lookup(index: &Index, key: &str) -> crate::Result<PostingList> {
    lookup_normalized(index, normalize(key).as_bytes())
}

pub(crate) fn lookup_normalized(index: &Index, key: &[u8]) -> crate::Result<PostingList> {
    #[cfg(feature = "metrics")]
    index
        .metrics()
        .lookups
        .fetch_add(1, std::sync::atomic::Ordering::Relaxed);

    let bucket = index.bucket_of_normalized(key);
    let mut result = PostingList::new();

    for item in index.chain(bucket)? {
        let (_, node) = item?;

        if node.key == key {
            result.extend_from_slice(&node.offsets);
        }
    }

    log::debug!(
        "lookup {:?} in {:?} (bucket {bucket}): {} hits",
        String::from_utf8_lossy(key),
        index.name(),
        result.len(),
    );

    Ok(result)
}

/// Returns the records matching both `key_a` in index `a` and `key_b` in index `b`.
///
/// A key that normalizes to nothing counts as absent. With one key present,
/// this is [`lookup`] on its index, unchanged. With both present, both lookups
/// run and their results are intersected; the answer is ascending and free of
/// duplicates.
///
/// # Errors
///
/// Will return `Err` if both keys are absent, an IO error occurs, or a chain node is malformed.
pub fn lookup_conjunctive(
    a: &Index,
    b: &Index,
    key_a: &str,
    key_b: &str,
) -> crate::Result<PostingList> {
    let key_a = normalize(key_a);
    let key_b = normalize(key_b);

    match (key_a.is_empty(), key_b.is_empty()) {
        (true, true) => Err(crate::Error::EmptyQuery),
        (false, true) => lookup_normalized(a, key_a.as_bytes()),
        (true, false) => lookup_normalized(b, key_b.as_bytes()),
        (false, false) => {
            let hits_a = lookup_normalized(a, key_a.as_bytes())?;
            let hits_b = lookup_normalized(b, key_b.as_bytes())?;
            Ok(hits_a.intersect(hits_b))
        }
    }
}
