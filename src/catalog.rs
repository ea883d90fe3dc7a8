// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::{
    config::{DEFAULT_BUCKET_COUNT, DEFAULT_SEED},
    lookup::lookup_conjunctive,
    record::{CsvSource, RecordSource},
    Builder, Cache, Config, Field, Index,
};
use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

/// Options for [`Catalog::open_or_build`]
#[derive(Clone)]
pub struct CatalogOptions {
    title_buckets: u64,
    author_buckets: u64,
    seed: u64,
    rebuild: bool,
    cache: Option<Arc<Cache>>,
}

impl Default for CatalogOptions {
    fn default() -> Self {
        Self {
            title_buckets: DEFAULT_BUCKET_COUNT,
            author_buckets: DEFAULT_BUCKET_COUNT,
            seed: DEFAULT_SEED,
            rebuild: false,
            cache: None,
        }
    }
}

impl CatalogOptions {
    /// Sets the bucket count of the title index.
    ///
    /// # Panics
    ///
    /// Panics if `n` is not a power of two.
    #[must_use]
    pub fn title_buckets(mut self, n: u64) -> Self {
        assert!(n.is_power_of_two(), "bucket count must be a power of two");
        self.title_buckets = n;
        self
    }

    /// Sets the bucket count of the author index.
    ///
    /// # Panics
    ///
    /// Panics if `n` is not a power of two.
    #[must_use]
    pub fn author_buckets(mut self, n: u64) -> Self {
        assert!(n.is_power_of_two(), "bucket count must be a power of two");
        self.author_buckets = n;
        self
    }

    /// Sets the hash seed of both indices.
    #[must_use]
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Forces a rebuild even if the index files exist.
    #[must_use]
    pub fn rebuild(mut self, flag: bool) -> Self {
        self.rebuild = flag;
        self
    }

    /// Sets the node cache shared by both indices.
    #[must_use]
    pub fn use_cache(mut self, cache: Arc<Cache>) -> Self {
        self.cache = Some(cache);
        self
    }

    fn config(&self, folder: &Path, field: Field, buckets: u64) -> Config {
        let config = Config::new(folder, &field.name())
            .bucket_count(buckets)
            .seed(self.seed);

        match &self.cache {
            Some(cache) => config.use_cache(cache.clone()),
            None => config,
        }
    }
}

/// A CSV record file with a title index and an author index
///
/// Both indices live in one folder, named `title` and `author`.
pub struct Catalog {
    folder: PathBuf,
    source: CsvSource,
    titles: Index,
    authors: Index,
}

impl Catalog {
    /// Opens the catalog indices of `csv_path`, building both in a single pass
    /// if either one is missing.
    ///
    /// # Errors
    ///
    /// Will return `Err` if an IO error occurs, or an index file is invalid.
    pub fn open_or_build<P: AsRef<Path>, Q: AsRef<Path>>(
        folder: P,
        csv_path: Q,
        options: &CatalogOptions,
    ) -> crate::Result<Self> {
        let folder = folder.as_ref();
        let source = CsvSource::open(csv_path)?;

        let title_config = options.config(folder, Field::Title, options.title_buckets);
        let author_config = options.config(folder, Field::Author, options.author_buckets);

        let (titles, authors) =
            if !options.rebuild && title_config.exists()? && author_config.exists()? {
                log::debug!("Opening catalog indices in {}", folder.display());
                (title_config.open()?, author_config.open()?)
            } else {
                log::info!(
                    "Building catalog indices of {} in {}",
                    source.path().display(),
                    folder.display(),
                );

                let (indices, _) = Builder::new(&source)
                    .index(Field::Title, title_config)
                    .index(Field::Author, author_config)
                    .build()?;

                let mut indices = indices.into_iter();

                match (indices.next(), indices.next()) {
                    (Some(titles), Some(authors)) => (titles, authors),
                    _ => {
                        return Err(crate::Error::Io(std::io::Error::other(
                            "catalog build returned too few indices",
                        )))
                    }
                }
            };

        Ok(Self {
            folder: folder.into(),
            source,
            titles,
            authors,
        })
    }

    /// Returns the index folder.
    #[must_use]
    pub fn folder(&self) -> &Path {
        &self.folder
    }

    /// Returns the record file.
    #[must_use]
    pub fn source(&self) -> &CsvSource {
        &self.source
    }

    /// Returns the title index.
    #[must_use]
    pub fn titles(&self) -> &Index {
        &self.titles
    }

    /// Returns the author index.
    #[must_use]
    pub fn authors(&self) -> &Index {
        &self.authors
    }

    /// Returns the offsets of records matching `title` and `author`.
    ///
    /// An empty `title` or `author` matches anything, but not both.
    ///
    /// # Errors
    ///
    /// Will return `Err` if both are empty, or an IO error occurs.
    pub fn search_offsets(&self, title: &str, author: &str) -> crate::Result<Vec<u64>> {
        lookup_conjunctive(&self.titles, &self.authors, title, author).map(|hits| hits.into_vec())
    }

    /// Returns the records matching `title` and `author`.
    ///
    /// # Errors
    ///
    /// Will return `Err` if both are empty, or an IO error occurs.
    pub fn search(&self, title: &str, author: &str) -> crate::Result<Vec<String>> {
        self.search_offsets(title, author)?
            .into_iter()
            .map(|offset| {
                let line = self.source.read_record_at(offset)?;
                Ok(String::from_utf8_lossy(&line).into_owned())
            })
            .collect()
    }

    /// Appends a record to the CSV file and indexes it, returning its offset.
    ///
    /// The title index is updated before the author index.
    ///
    /// # Errors
    ///
    /// Will return `Err` if an IO error occurs. The record may then already
    /// be in the CSV file, and in the title index only; a rebuild
    /// restores consistency.
    pub fn add(&mut self, line: &str) -> crate::Result<u64> {
        let offset = self.source.append(line)?;
        let record = self.source.read_record_at(offset)?;

        for (field, index) in [
            (Field::Title, &mut self.titles),
            (Field::Author, &mut self.authors),
        ] {
            let Some(value) = self.source.field(&record, field) else {
                continue;
            };

            match index.insert_one(&value, offset) {
                Ok(_) | Err(crate::Error::EmptyKey) => {}
                Err(e) => {
                    log::error!(
                        "Record at {offset} was appended to {} but not indexed by {}: {e:?}",
                        self.source.path().display(),
                        field.name(),
                    );
                    return Err(e);
                }
            }
        }

        Ok(offset)
    }
}
