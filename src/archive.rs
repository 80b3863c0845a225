//! ZIP archive assembly
//!
//! Entries are streamed into a file on disk in the order they are added; the
//! central directory is only written by [`ArchiveBuilder::finish`].

use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use thiserror::Error;
use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("failed to create archive {path}: {source}")]
    Create {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to start entry '{name}': {source}")]
    Entry {
        name: String,
        #[source]
        source: ZipError,
    },

    #[error("failed to write entry '{name}': {source}")]
    Write {
        name: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to finalize archive: {0}")]
    Finish(#[source] ZipError),
}

/// ZIP file being written to `path`
pub struct ArchiveBuilder {
    path: PathBuf,
    writer: ZipWriter<File>,
    entries: usize,
}

impl ArchiveBuilder {
    /// Create an empty archive at `path`, truncating anything already there
    pub fn create(path: impl Into<PathBuf>) -> Result<Self, ArchiveError> {
        let path = path.into();
        let file = File::create(&path).map_err(|source| ArchiveError::Create {
            path: path.clone(),
            source,
        })?;

        Ok(Self {
            path,
            writer: ZipWriter::new(file),
            entries: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append an entry named `name` with the contents of `reader`.
    /// Returns the number of bytes written.
    pub fn add_entry<R: Read>(&mut self, name: &str, reader: &mut R) -> Result<u64, ArchiveError> {
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        self.writer
            .start_file(name, options)
            .map_err(|source| ArchiveError::Entry {
                name: name.to_string(),
                source,
            })?;

        let written = io::copy(reader, &mut self.writer).map_err(|source| ArchiveError::Write {
            name: name.to_string(),
            source,
        })?;

        self.entries += 1;
        Ok(written)
    }

    /// Write the central directory and close the file.
    /// Returns the number of entries in the archive.
    pub fn finish(self) -> Result<usize, ArchiveError> {
        self.writer.finish().map_err(ArchiveError::Finish)?;
        Ok(self.entries)
    }
}
