// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Record stores that indices point into.
//!
//! A record offset is the byte position of a record's first byte inside
//! its store. Indices never interpret records, they only carry offsets.

use crate::file::read_at_most;
use std::{
    fs::{File, OpenOptions},
    io::{BufRead, BufReader, Write},
    path::{Path, PathBuf},
    str::FromStr,
};

const READ_CHUNK_SIZE: usize = 4_096;

/// A record and its offset inside the record store
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Record {
    /// Byte position of the record's first byte
    pub offset: u64,

    /// Raw record bytes, without line terminator
    pub line: Vec<u8>,
}

/// Selects which part of a record is indexed
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Field {
    /// First column
    Title,

    /// Second column
    Author,

    /// Any zero-based column
    Column(usize),
}

impl Field {
    /// Zero-based column index.
    #[must_use]
    pub fn column(self) -> usize {
        match self {
            Self::Title => 0,
            Self::Author => 1,
            Self::Column(n) => n,
        }
    }

    /// Name used for the index files of this field.
    #[must_use]
    pub fn name(self) -> String {
        match self {
            Self::Title => "title".into(),
            Self::Author => "author".into(),
            Self::Column(n) => format!("column_{n}"),
        }
    }
}

impl FromStr for Field {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "title" => Ok(Self::Title),
            "author" | "author_name" => Ok(Self::Author),
            other => other
                .parse::<usize>()
                .map(Self::Column)
                .map_err(|_| crate::Error::UnknownField(s.into())),
        }
    }
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Line-oriented store of records
pub trait RecordSource {
    /// Reads the record starting at `offset`.
    ///
    /// # Errors
    ///
    /// Will return `Err` if an IO error occurs, or the offset lies beyond the store.
    fn read_record_at(&self, offset: u64) -> crate::Result<Vec<u8>>;

    /// Iterates over all records with their offsets, header line excluded.
    ///
    /// # Errors
    ///
    /// Will return `Err` if the store cannot be opened.
    fn records(&self) -> crate::Result<Box<dyn Iterator<Item = crate::Result<Record>> + '_>>;

    /// Extracts a field from a record.
    ///
    /// Returns `None` if the record has no such field.
    fn field(&self, record: &[u8], field: Field) -> Option<String>;
}

/// Comma-separated record file with a leading header line
///
/// Each line is one record. Fields may be double-quoted, with `""`
/// standing for a literal quote.
pub struct CsvSource {
    file: File,
    path: PathBuf,
}

impl std::fmt::Debug for CsvSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CsvSource({})", self.path.display())
    }
}

impl CsvSource {
    /// Opens an existing CSV file.
    ///
    /// # Errors
    ///
    /// Will return `Err` if an IO error occurs.
    pub fn open<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;

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

    /// Returns the file size in bytes.
    ///
    /// # Errors
    ///
    /// Will return `Err` if an IO error occurs.
    pub fn len(&self) -> crate::Result<u64> {
        Ok(self.file.metadata()?.len())
    }

    /// Returns `true` if the file is empty.
    ///
    /// # Errors
    ///
    /// Will return `Err` if an IO error occurs.
    pub fn is_empty(&self) -> crate::Result<bool> {
        self.len().map(|len| len == 0)
    }

    /// Appends a record line, returning its offset.
    ///
    /// A missing line terminator at the end of the file is added first,
    /// so the new record always starts on its own line.
    ///
    /// # Errors
    ///
    /// Will return `Err` if an IO error occurs.
    pub fn append(&self, line: &str) -> crate::Result<u64> {
        let line = line.trim_end_matches(['\n', '\r']);

        let mut writer = OpenOptions::new().append(true).open(&self.path)?;
        let mut offset = self.len()?;

        if offset > 0 {
            let mut last = [0; 1];
            read_at_most(&self.file, &mut last, offset - 1)?;

            if last[0] != b'\n' {
                writer.write_all(b"\n")?;
                offset += 1;
            }
        }

        let mut buf = Vec::with_capacity(line.len() + 1);
        buf.extend_from_slice(line.as_bytes());
        buf.push(b'\n');

        writer.write_all(&buf)?;
        writer.sync_data()?;

        log::trace!("appended record at {offset} to {}", self.path.display());

        Ok(offset)
    }
}

fn trim_line_end(line: &mut Vec<u8>) {
    if line.last() == Some(&b'\n') {
        line.pop();
    }
    if line.last() == Some(&b'\r') {
        line.pop();
    }
}

impl RecordSource for CsvSource {
    fn read_record_at(&self, offset: u64) -> crate::Result<Vec<u8>> {
        if offset >= self.len()? {
            return Err(crate::Error::InvalidOffset(offset));
        }

        let mut line = Vec::new();
        let mut chunk = vec![0; READ_CHUNK_SIZE];
        let mut pos = offset;

        loop {
            let n = read_at_most(&self.file, &mut chunk, pos)?;

            #[expect(clippy::indexing_slicing, reason = "n <= chunk.len()")]
            let chunk = &chunk[..n];

            if let Some(idx) = chunk.iter().position(|&b| b == b'\n') {
                #[expect(clippy::indexing_slicing, reason = "idx < chunk.len()")]
                line.extend_from_slice(&chunk[..idx]);
                break;
            }

            line.extend_from_slice(chunk);

            if n == 0 {
                break;
            }

            pos += n as u64;
        }

        trim_line_end(&mut line);
        Ok(line)
    }

    fn records(&self) -> crate::Result<Box<dyn Iterator<Item = crate::Result<Record>> + '_>> {
        let reader = BufReader::new(File::open(&self.path)?);

        let mut records = Records {
            reader,
            offset: 0,
            done: false,
        };

        // Skip header
        if let Some(Err(e)) = records.next() {
            return Err(e);
        }

        Ok(Box::new(records))
    }

    fn field(&self, record: &[u8], field: Field) -> Option<String> {
        csv_field(&String::from_utf8_lossy(record), field.column())
    }
}

struct Records {
    reader: BufReader<File>,
    offset: u64,
    done: bool,
}

impl Iterator for Records {
    type Item = crate::Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let mut line = Vec::new();

        match self.reader.read_until(b'\n', &mut line) {
            Ok(0) => {
                self.done = true;
                None
            }
            Ok(n) => {
                let offset = self.offset;
                self.offset += n as u64;

                trim_line_end(&mut line);
                Some(Ok(Record { offset, line }))
            }
            Err(e) => {
                self.done = true;
                Some(Err(e.into()))
            }
        }
    }
}

/// Returns the zero-based `index`-th field of a CSV line.
///
/// Quoted fields are unquoted. Returns `None` if the line has fewer fields.
#[must_use]
pub fn csv_field(line: &str, index: usize) -> Option<String> {
    CsvFields {
        rest: line.trim_end_matches(['\n', '\r']),
        done: false,
    }
    .nth(index)
}

struct CsvFields<'a> {
    rest: &'a str,
    done: bool,
}

impl Iterator for CsvFields<'_> {
    type Item = String;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let Some(quoted) = self.rest.strip_prefix('"') else {
            return Some(match self.rest.split_once(',') {
                Some((field, rest)) => {
                    self.rest = rest;
                    field.into()
                }
                None => {
                    self.done = true;
                    self.rest.into()
                }
            });
        };

        let mut field = String::new();
        let mut chars = quoted.char_indices().peekable();
        let mut end = quoted.len();

        while let Some((idx, c)) = chars.next() {
            if c == '"' {
                if chars.peek().map(|&(_, c)| c) == Some('"') {
                    field.push('"');
                    chars.next();
                    continue;
                }

                end = idx + 1;
                break;
            }

            field.push(c);
        }

        // Anything between the closing quote and the next comma is dropped
        #[expect(clippy::indexing_slicing, reason = "end is a char boundary")]
        match quoted[end..].split_once(',') {
            Some((_, rest)) => self.rest = rest,
            None => self.done = true,
        }

        Some(field)
    }
}
