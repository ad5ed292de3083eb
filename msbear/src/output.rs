// SPDX-License-Identifier: GPL-3.0-or-later

//! This module is responsible for reading and writing the JSON compilation database.
//!
//! The previous database is read once at startup. The new database is written once
//! at the end of the run. The output is written into a temporary file first, which
//! is then renamed to the final file name. This ensures that the output file is not
//! left in an inconsistent state in case of errors.

use crate::database::{Entry, EntryError};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::{fs, io};
use tempfile::NamedTempFile;
use thiserror::Error;

/// Represents errors that can occur while working with the database file.
#[derive(Debug, Error)]
pub enum SerializationError {
    #[error("Generic IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Format syntax error: {0}")]
    Syntax(#[from] serde_json::Error),
    #[error("Format semantic error: {0}")]
    Semantic(#[from] EntryError),
}

/// Represents errors that can occur while reading the previous database.
#[derive(Debug, Error)]
#[error("Failed to read the compilation database {path}: {source}")]
pub struct LoadError {
    pub path: PathBuf,
    #[source]
    pub source: SerializationError,
}

/// Reads the entries of a compilation database file.
///
/// A missing file is an empty database. Any other problem (including
/// syntax and semantic errors of the content) is an error.
pub fn load(path: &Path) -> Result<Vec<Entry>, LoadError> {
    let to_error = |source: SerializationError| LoadError { path: path.to_path_buf(), source };

    let file = match fs::File::open(path) {
        Ok(file) => file,
        Err(error) if error.kind() == io::ErrorKind::NotFound => {
            log::debug!("No previous compilation database found: {}", path.display());
            return Ok(Vec::new());
        }
        Err(error) => return Err(to_error(error.into())),
    };

    let entries: Vec<Entry> =
        serde_json::from_reader(BufReader::new(file)).map_err(|error| to_error(error.into()))?;
    let entries = entries
        .into_iter()
        .map(Entry::validate)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|error| to_error(error.into()))?;

    log::info!("Read {} entries from {}", entries.len(), path.display());
    Ok(entries)
}

/// Writes the JSON compilation database to its final location.
///
/// The writer is created before the build events are processed, so an output
/// location which can't be written is detected early. When the writer is dropped
/// without writing, the temporary file is removed.
pub struct OutputWriter {
    output: NamedTempFile,
    path: PathBuf,
}

impl OutputWriter {
    pub fn create(path: &Path) -> Result<Self, WriterCreationError> {
        let directory = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let output = NamedTempFile::new_in(directory)
            .map_err(|error| WriterCreationError::Io(path.to_path_buf(), error))?;
        log::debug!("Temporary output file: {}", output.path().display());

        Ok(Self { output, path: path.to_path_buf() })
    }

    /// Writes the entries as a pretty printed JSON array, and moves the
    /// result to the final location.
    pub fn write(self, entries: &[Entry]) -> Result<(), WriterError> {
        let Self { mut output, path } = self;

        Self::serialize(output.as_file_mut(), entries)
            .map_err(|error| WriterError::Io(path.clone(), error))?;
        output
            .persist(&path)
            .map_err(|error| WriterError::Io(path.clone(), SerializationError::Io(error.error)))?;

        log::info!("Written {} entries to {}", entries.len(), path.display());
        Ok(())
    }

    fn serialize(writer: impl Write, entries: &[Entry]) -> Result<(), SerializationError> {
        // Ensure only valid entries are serialized.
        for entry in entries {
            entry.clone().validate()?;
        }
        let mut writer = BufWriter::new(writer);
        serde_json::to_writer_pretty(&mut writer, entries)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(())
    }
}

/// Represents errors that can occur while creating an output writer.
#[derive(Error, Debug)]
pub enum WriterCreationError {
    #[error("Failed to create the output writer {0}: {1}")]
    Io(PathBuf, io::Error),
}

/// Represents errors that can occur while writing output.
#[derive(Error, Debug)]
pub enum WriterError {
    #[error("Serialization error {0}: {1}")]
    Io(PathBuf, SerializationError),
}
