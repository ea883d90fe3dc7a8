// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::{normalize, record::RecordSource, Config, Field, Index};
use std::time::Instant;

/// Counters of a build run
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct BuildStats {
    /// Number of records read from the source
    pub records: u64,

    /// Number of nodes appended, over all indices
    pub indexed: u64,

    /// Number of (record, index) pairs that were not indexed
    ///
    /// Counts missing fields, fields normalizing to nothing, and failed inserts.
    pub skipped: u64,
}

/// Builds indices from a record source
///
/// Every registered index is fed during the same pass over the source,
/// so the source is read once no matter how many indices are built.
///
/// # Examples
///
/// ```
/// # use posting_index::{Builder, Config, CsvSource, Field};
/// # let folder = tempfile::tempdir()?;
/// # let csv = folder.path().join("books.csv");
/// # std::fs::write(&csv, "title,author\nDune,Frank Herbert\n")?;
/// let source = CsvSource::open(&csv)?;
///
/// let (indices, stats) = Builder::new(&source)
///     .index(Field::Title, Config::new(&folder, "title"))
///     .index(Field::Author, Config::new(&folder, "author"))
///     .build()?;
///
/// assert_eq!(2, indices.len());
/// assert_eq!(1, stats.records);
/// assert_eq!(vec![13], indices[0].lookup("dune")?.into_vec());
/// #
/// # Ok::<(), posting_index::Error>(())
/// ```
pub struct Builder<'a, S: RecordSource + ?Sized> {
    source: &'a S,
    targets: Vec<(Field, Config)>,
}

impl<'a, S: RecordSource + ?Sized> Builder<'a, S> {
    /// Starts a build over `source`.
    #[must_use]
    pub fn new(source: &'a S) -> Self {
        Self {
            source,
            targets: Vec::new(),
        }
    }

    /// Registers an index of `field`, created from `config`.
    ///
    /// Existing files of that index are truncated once the build starts.
    #[must_use]
    pub fn index(mut self, field: Field, config: Config) -> Self {
        self.targets.push((field, config));
        self
    }

    /// Runs the build, returning the indices in registration order.
    ///
    /// A record that cannot be indexed is skipped with a warning;
    /// the build keeps going.
    ///
    /// # Errors
    ///
    /// Will return `Err` if an index cannot be created, the source cannot
    /// be opened, or the final sync fails.
    pub fn build(self) -> crate::Result<(Vec<Index>, BuildStats)> {
        let start = Instant::now();

        let mut targets = self
            .targets
            .into_iter()
            .map(|(field, config)| Ok((field, config.create()?)))
            .collect::<crate::Result<Vec<_>>>()?;

        log::info!(
            "Building {} index(es): {:?}",
            targets.len(),
            targets
                .iter()
                .map(|(field, index)| format!("{}={field}", index.name()))
                .collect::<Vec<_>>(),
        );

        let mut stats = BuildStats::default();

        for record in self.source.records()? {
            let record = match record {
                Ok(record) => record,
                Err(e) => {
                    log::warn!("Skipping unreadable record: {e:?}");
                    stats.skipped += 1;
                    continue;
                }
            };

            stats.records += 1;

            for (field, index) in &mut targets {
                let Some(value) = self.source.field(&record.line, *field) else {
                    log::trace!("record {} has no {field} field", record.offset);
                    stats.skipped += 1;
                    continue;
                };

                let key = normalize(&value);

                if key.is_empty() {
                    log::trace!("record {} has an empty {field} key", record.offset);
                    stats.skipped += 1;
                    continue;
                }

                match index.insert_normalized(key.into_bytes(), vec![record.offset], false) {
                    Ok(_) => stats.indexed += 1,
                    Err(e) => {
                        log::warn!(
                            "Skipping record {} in index {:?}: {e:?}",
                            record.offset,
                            index.name(),
                        );
                        stats.skipped += 1;
                    }
                }
            }
        }

        for (_, index) in &targets {
            index.sync()?;
        }

        log::info!(
            "Built {} index(es) in {:?}: {} records, {} indexed, {} skipped",
            targets.len(),
            start.elapsed(),
            stats.records,
            stats.indexed,
            stats.skipped,
        );

        Ok((targets.into_iter().map(|(_, index)| index).collect(), stats))
    }
}

/// Builds a single index of `field` over `source`.
///
/// # Errors
///
/// Will return `Err` if an IO error occurs.
pub fn build<S: RecordSource + ?Sized>(
    source: &S,
    field: Field,
    config: Config,
) -> crate::Result<(Index, BuildStats)> {
    let (mut indices, stats) = Builder::new(source).index(field, config).build()?;

    // One index was registered, so one comes back
    let index = indices.pop().ok_or_else(|| {
        crate::Error::Io(std::io::Error::other("build returned no index"))
    })?;

    Ok((index, stats))
}
