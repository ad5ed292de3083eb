// SPDX-License-Identifier: GPL-3.0-or-later

//! This module recognizes the semantic of the MSVC compiler invocations.
//!
//! The main abstractions are:
//! - `tokenizer`: splits the invocation string into arguments the same way as
//!   the Windows shell does.
//! - `classifier`: sorts the arguments into passthrough flags, source files and
//!   precompiled header hints, and builds the compilation database entries.
//! - `invocation`: recognizes compiler tasks and separates the compiler
//!   executable from its arguments.

pub mod classifier;
pub mod invocation;
pub mod tokenizer;

pub use classifier::{Classification, classify};
pub use invocation::{Invocation, TaskFilter};
pub use tokenizer::{TokenizeError, tokenize};

/// Returns the directory part of a path, which can use either separator.
///
/// The build events carry Windows paths regardless of the host platform, so
/// the standard library path functions are not used here. Returns `None`
/// when the path has no directory part, or the directory part is empty.
pub fn parent_directory(path: &str) -> Option<&str> {
    path.rfind(['\\', '/'])
        .map(|index| &path[..index])
        .filter(|directory| !directory.is_empty())
}
