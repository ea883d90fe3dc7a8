// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Structural verification of an index.
//!
//! Walks every bucket chain straight from disk (bypassing the node cache)
//! and checks that:
//! - every pointer lies past the header and before end-of-file
//! - every node decodes
//! - no chain loops back onto itself, and no node sits in two chains
//! - every node's key hashes into the bucket it is chained from

use crate::{file::HEADER_SIZE, Index};

/// A structural problem found by [`verify`]
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Issue {
    /// A pointer points into the header or past end-of-file
    BadPointer {
        /// Bucket whose chain holds the pointer
        bucket: u64,

        /// Pointer value
        offset: u64,
    },

    /// A node could not be read or decoded
    Unreadable {
        /// Bucket whose chain holds the node
        bucket: u64,

        /// Node offset
        offset: u64,

        /// Error description
        error: String,
    },

    /// A chain points back to one of its own nodes
    Cycle {
        /// Bucket whose chain loops
        bucket: u64,

        /// Node that was reached twice
        offset: u64,
    },

    /// A node is reachable from two different buckets
    SharedNode {
        /// Bucket that reached the node second
        bucket: u64,

        /// Bucket that reached it first
        first_bucket: u64,

        /// Node offset
        offset: u64,
    },

    /// A node's key belongs in another bucket
    WrongBucket {
        /// Bucket whose chain holds the node
        bucket: u64,

        /// Bucket the key hashes to
        expected: u64,

        /// Node offset
        offset: u64,
    },
}

/// Summary of a verification run
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct VerifyReport {
    /// Number of buckets
    pub buckets: u64,

    /// Number of non-empty buckets
    pub buckets_used: u64,

    /// Number of reachable nodes
    pub nodes: u64,

    /// Number of postings over all reachable nodes
    pub postings: u64,

    /// Length of the longest chain
    pub longest_chain: u64,

    /// Problems found
    pub issues: Vec<Issue>,
}

impl VerifyReport {
    /// Returns `true` if no issue was found.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.issues.is_empty()
    }

    /// Average chain length of non-empty buckets.
    #[must_use]
    #[expect(clippy::cast_precision_loss)]
    pub fn avg_chain_len(&self) -> f64 {
        if self.buckets_used == 0 {
            return 0.0;
        }
        self.nodes as f64 / self.buckets_used as f64
    }
}

/// Checks the structure of an index.
///
/// Structural problems end up in the report; only failing to read the
/// bucket table or the node store size is an error.
///
/// # Errors
///
/// Will return `Err` if an IO error occurs.
pub fn verify(index: &Index) -> crate::Result<VerifyReport> {
    let nodes_len = index.node_store().len()?;

    // node offset -> bucket that reached it
    let mut visited = crate::HashMap::<u64, u64>::default();

    let mut report = VerifyReport {
        buckets: index.bucket_count(),
        ..Default::default()
    };

    for bucket in 0..index.bucket_count() {
        let mut cursor = index.bucket_table().read_head(bucket)?;
        let mut chain_len = 0;

        if cursor != 0 {
            report.buckets_used += 1;
        }

        while cursor != 0 {
            let offset = cursor;

            if offset < HEADER_SIZE || offset >= nodes_len {
                report.issues.push(Issue::BadPointer { bucket, offset });
                break;
            }

            if let Some(&first_bucket) = visited.get(&offset) {
                report.issues.push(if first_bucket == bucket {
                    Issue::Cycle { bucket, offset }
                } else {
                    Issue::SharedNode {
                        bucket,
                        first_bucket,
                        offset,
                    }
                });
                break;
            }

            visited.insert(offset, bucket);

            let node = match index.node_store().read(offset) {
                Ok(node) => node,
                Err(e) => {
                    report.issues.push(Issue::Unreadable {
                        bucket,
                        offset,
                        error: e.to_string(),
                    });
                    break;
                }
            };

            let expected = index.bucket_of_normalized(&node.key);

            if expected != bucket {
                report.issues.push(Issue::WrongBucket {
                    bucket,
                    expected,
                    offset,
                });
            }

            chain_len += 1;
            report.nodes += 1;
            report.postings += node.offsets.len() as u64;

            cursor = node.next;
        }

        report.longest_chain = report.longest_chain.max(chain_len);
    }

    if report.is_ok() {
        log::debug!("Verified index {:?}: {report:?}", index.name());
    } else {
        log::warn!(
            "Index {:?} has {} structural issue(s)",
            index.name(),
            report.issues.len(),
        );
    }

    Ok(report)
}
