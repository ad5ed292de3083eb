// SPDX-License-Identifier: GPL-3.0-or-later

//! This module provides the in-memory compilation database.
//!
//! A compilation database is a set of records which describe the compilation of the
//! source files in a given project. It describes the compiler invocation command to
//! compile a source module to an object file. The definition of the JSON compilation
//! database files is done in the LLVM project
//! [documentation](https://clang.llvm.org/docs/JSONCompilationDatabase.html).
//!
//! The records are keyed by their `directory` and `file` fields. The key is unique
//! within the database, and records are never removed.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Represents an entry of the compilation database.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    /// The working directory of the compilation. For build events this is the
    /// directory of the project file.
    pub directory: String,
    /// The main translation unit source processed by this compilation step,
    /// as it was given on the command line.
    pub file: String,
    /// The compile command argv as list of strings. `arguments[0]` is the compiler
    /// executable, the last element is the file itself.
    pub arguments: Vec<String>,
}

impl Entry {
    pub fn new(directory: impl Into<String>, file: impl Into<String>, arguments: Vec<String>) -> Self {
        Self { directory: directory.into(), file: file.into(), arguments }
    }

    /// Semantic validation of the entry.
    pub fn validate(self) -> Result<Self, EntryError> {
        if self.file.is_empty() {
            return Err(EntryError::EmptyFileName);
        }
        if self.directory.is_empty() {
            return Err(EntryError::EmptyDirectory);
        }
        if self.arguments.is_empty() {
            return Err(EntryError::ArgumentsAreMissing);
        }
        Ok(self)
    }

    fn key(&self) -> Key {
        (self.directory.clone(), self.file.clone())
    }
}

/// Represents the possible errors that can occur when validating an entry.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EntryError {
    #[error("Entry has an empty file field")]
    EmptyFileName,
    #[error("Entry has an empty directory field")]
    EmptyDirectory,
    #[error("Entry has an empty arguments field")]
    ArgumentsAreMissing,
}

/// What to do when a new entry has the same key as a stored one.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub enum MergePolicy {
    /// Replace the stored entry with the new one. (Default)
    #[default]
    #[serde(rename = "overwrite")]
    Overwrite,
    /// Keep the stored entry untouched.
    #[serde(rename = "skip-existing")]
    SkipExisting,
}

impl FromStr for MergePolicy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "overwrite" => Ok(MergePolicy::Overwrite),
            "skip-existing" => Ok(MergePolicy::SkipExisting),
            _ => Err(format!("unknown merge policy: {value} (expected: overwrite, skip-existing)")),
        }
    }
}

impl fmt::Display for MergePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MergePolicy::Overwrite => write!(f, "overwrite"),
            MergePolicy::SkipExisting => write!(f, "skip-existing"),
        }
    }
}

/// The outcome of a merge.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Merge {
    /// The key was new, the entry was appended.
    Added,
    /// The key existed, the stored entry was replaced.
    Updated,
    /// The key existed, the stored entry was kept.
    Kept,
}

type Key = (String, String);

/// The compilation database with a lookup index on the entry keys.
#[derive(Debug, Clone, Default)]
pub struct CompilationDatabase {
    entries: Vec<Entry>,
    index: HashMap<Key, usize>,
    policy: MergePolicy,
}

impl CompilationDatabase {
    pub fn new(policy: MergePolicy) -> Self {
        Self { entries: Vec::new(), index: HashMap::new(), policy }
    }

    /// Creates the database from previously persisted entries.
    ///
    /// The persisted entries are stored verbatim. When the same key appears
    /// more than once, the first entry is kept.
    pub fn from_entries(entries: impl IntoIterator<Item = Entry>, policy: MergePolicy) -> Self {
        let mut database = Self::new(policy);
        for entry in entries {
            let key = entry.key();
            if database.index.contains_key(&key) {
                log::warn!("Duplicate entry in the previous database: {} {}", key.0, key.1);
                continue;
            }
            database.index.insert(key, database.entries.len());
            database.entries.push(entry);
        }
        database
    }

    /// Merges the entry into the database according to the merge policy.
    pub fn merge(&mut self, entry: Entry) -> Merge {
        let key = entry.key();
        match self.index.get(&key) {
            Some(&position) => match self.policy {
                MergePolicy::Overwrite => {
                    self.entries[position] = entry;
                    Merge::Updated
                }
                MergePolicy::SkipExisting => Merge::Kept,
            },
            None => {
                self.index.insert(key, self.entries.len());
                self.entries.push(entry);
                Merge::Added
            }
        }
    }

    pub fn get(&self, directory: &str, file: &str) -> Option<&Entry> {
        self.index
            .get(&(directory.to_string(), file.to_string()))
            .map(|&position| &self.entries[position])
    }

    pub fn policy(&self) -> MergePolicy {
        self.policy
    }

    /// The entries in insertion order.
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<Entry> {
        self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
