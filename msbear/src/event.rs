// SPDX-License-Identifier: GPL-3.0-or-later

//! This module defines the build events and their file format.
//!
//! The build events are reported by the build system integration. The format
//! is a [JSON line format](https://jsonlines.org/), which is a sequence of JSON
//! objects separated by newlines.
//!
//! ```json
//! {"type":"environment","variables":{"INCLUDE":"C:\\inc1;C:\\inc2"}}
//! {"type":"task_command_line","task_name":"CL","command_line":"cl.exe /c a.cpp","project_file":"C:\\p\\p.vcxproj"}
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::{self, BufRead, BufReader};
use std::path::PathBuf;
use thiserror::Error;

/// The file name which stands for the standard input.
pub const STDIN: &str = "-";

/// Represents a build event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A task has executed a command.
    TaskCommandLine {
        task_name: String,
        command_line: String,
        project_file: String,
    },
    /// The environment of the build has been reported.
    Environment { variables: HashMap<String, String> },
}

/// Represents errors that can occur while reading the events.
#[derive(Debug, Error)]
pub enum EventError {
    #[error("Failed to open the event file {0}: {1}")]
    Open(PathBuf, #[source] io::Error),
    #[error("Failed to read the events: {0}")]
    Io(#[from] io::Error),
    #[error("Invalid event at line {line}: {source}")]
    Syntax {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}

/// Opens the event source, which is a file or the standard input.
pub fn open(input: &str) -> Result<Box<dyn BufRead>, EventError> {
    if input == STDIN {
        Ok(Box::new(BufReader::new(io::stdin())))
    } else {
        let file = std::fs::File::open(input).map_err(|error| EventError::Open(input.into(), error))?;
        Ok(Box::new(BufReader::new(file)))
    }
}

/// Reads the events one by one. Empty lines are skipped.
pub fn read(reader: impl BufRead) -> impl Iterator<Item = Result<Event, EventError>> {
    reader
        .lines()
        .enumerate()
        .filter(|(_, line)| line.as_ref().map_or(true, |line| !line.trim().is_empty()))
        .map(|(index, line)| {
            let line = line?;
            serde_json::from_str(&line).map_err(|source| EventError::Syntax { line: index + 1, source })
        })
}
