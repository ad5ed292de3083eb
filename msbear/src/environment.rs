// SPDX-License-Identifier: GPL-3.0-or-later

use std::collections::HashMap;

// https://learn.microsoft.com/en-us/cpp/build/reference/cl-environment-variables
pub const KEY_MSVC__INCLUDE: &str = "INCLUDE";
// https://learn.microsoft.com/en-us/cpp/build/reference/external-external-headers-diagnostics
pub const KEY_MSVC__EXTERNAL_INCLUDE: &str = "EXTERNAL_INCLUDE";

/// The variables which contribute include directories to every invocation.
pub const INCLUDE_KEYS: [&str; 2] = [KEY_MSVC__INCLUDE, KEY_MSVC__EXTERNAL_INCLUDE];

const PATH_SEPARATOR: char = ';';

/// Checks if the variable is relevant for the compiler invocations.
///
/// Windows environment variable names are case-insensitive.
pub fn relevant_env(key: &str) -> bool {
    INCLUDE_KEYS.iter().any(|relevant| relevant.eq_ignore_ascii_case(key))
}

/// The include directories collected from the environment during a run.
///
/// The set only grows. It keeps the insertion order, and every directory is
/// stored once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IncludeSet {
    paths: Vec<String>,
}

impl IncludeSet {
    /// Adds a directory. Returns `false` if it was already present.
    pub fn insert(&mut self, path: &str) -> bool {
        if self.paths.iter().any(|existing| existing == path) {
            false
        } else {
            self.paths.push(path.to_string());
            true
        }
    }

    /// Adds the directories of a `;` separated variable value.
    ///
    /// Returns the number of new directories.
    pub fn extend_from_value(&mut self, value: &str) -> usize {
        value
            .split(PATH_SEPARATOR)
            .map(str::trim)
            .filter(|path| !path.is_empty())
            .filter(|path| self.insert(path))
            .count()
    }

    /// Adds the directories of the relevant variables from the environment.
    ///
    /// The variables are processed in the order of `INCLUDE_KEYS`.
    pub fn extend_from_environment(&mut self, environment: &HashMap<String, String>) -> usize {
        let mut added = 0;
        for key in INCLUDE_KEYS {
            let values = environment
                .iter()
                .filter(|(name, _)| name.eq_ignore_ascii_case(key))
                .map(|(_, value)| value);
            for value in values {
                added += self.extend_from_value(value);
            }
        }
        added
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.paths.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}
