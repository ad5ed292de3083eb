// SPDX-License-Identifier: GPL-3.0-or-later

//! Classifies the tokens of an MSVC compiler invocation.
//!
//! The classifier walks the tokens once and sorts them into:
//!
//! - passthrough arguments (options which take a value, kept verbatim),
//! - files named by the `/Tc` and `/Tp` directives,
//! - candidate files (positional arguments, resolved after the pass),
//! - precompiled header names from `/Yc` and `/Yu`.
//!
//! Everything else (unknown options, response files) is dropped. The `/link`
//! option ends the compiler arguments, nothing after it is looked at.

use super::parent_directory;
use crate::database::Entry;
use crate::environment::IncludeSet;

/// Options which consume the next token as their value.
const PARAMETERIZED_OPTIONS: [&str; 11] = [
    "D",
    "I",
    "F",
    "U",
    "FI",
    "FU",
    "analyze:log",
    "analyze:stacksize",
    "analyze:max_paths",
    "analyze:ruleset",
    "analyze:plugin",
];

/// Options which name a precompiled header.
const PRECOMPILED_HEADER_OPTIONS: [&str; 2] = ["Yc", "Yu"];

/// Options which name a file to compile regardless of its extension.
const SOURCE_FILE_OPTIONS: [&str; 2] = ["Tc", "Tp"];

/// Options which make every positional argument a source file.
const FORCE_SOURCE_OPTIONS: [&str; 2] = ["TC", "TP"];

const LINK_OPTION: &str = "link";

const SOURCE_EXTENSIONS: [&str; 3] = ["c", "cxx", "cpp"];

/// The result of the classification of one invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classification {
    /// The retained arguments, in the order of the command line.
    pub arguments: Vec<String>,
    /// The source files to compile.
    pub files: Vec<String>,
    /// The precompiled header names.
    pub pch_headers: Vec<String>,
}

impl Classification {
    /// Directories of the precompiled headers, as `/I` arguments.
    pub fn pch_include_arguments(&self) -> impl Iterator<Item = String> + '_ {
        self.pch_headers
            .iter()
            .filter_map(|header| parent_directory(header))
            .map(|directory| format!("/I{directory}"))
    }

    /// The argument vector shared by every file of the invocation.
    ///
    /// It starts with the compiler, continues with the passthrough arguments,
    /// the precompiled header directories and the environment include paths.
    pub fn common_arguments(&self, compiler: &str, includes: &IncludeSet) -> Vec<String> {
        std::iter::once(compiler.to_string())
            .chain(self.arguments.iter().cloned())
            .chain(self.pch_include_arguments())
            .chain(includes.iter().map(|path| format!("/I{path}")))
            .collect()
    }

    /// Builds one compilation database entry per source file.
    pub fn to_entries(&self, compiler: &str, directory: &str, includes: &IncludeSet) -> Vec<Entry> {
        let common = self.common_arguments(compiler, includes);
        self.files
            .iter()
            .map(|file| {
                let mut arguments = common.clone();
                arguments.push(file.clone());
                Entry::new(directory, file, arguments)
            })
            .collect()
    }
}

/// State of a single pass over the tokens.
#[derive(Debug, Default)]
struct ParseContext {
    arguments: Vec<String>,
    files: Vec<String>,
    candidates: Vec<String>,
    pch_headers: Vec<String>,
    force_source: bool,
}

impl ParseContext {
    fn add_pch_header(&mut self, header: &str) {
        let header = header.trim_matches('"');
        if !header.is_empty() {
            self.pch_headers.push(header.to_string());
        }
    }

    fn add_file(&mut self, file: &str) {
        let file = file.trim_matches('"');
        if !file.is_empty() {
            self.files.push(file.to_string());
        }
    }

    /// Promotes the candidates and returns the final classification.
    fn finish(self) -> Classification {
        let force_source = self.force_source;
        let mut files = self.files;
        files.extend(
            self.candidates
                .into_iter()
                .filter(|candidate| force_source || has_source_extension(candidate)),
        );

        Classification {
            arguments: self.arguments,
            files,
            pch_headers: self.pch_headers,
        }
    }
}

/// Classifies the compiler arguments (without the compiler executable).
pub fn classify(tokens: &[String]) -> Classification {
    let mut context = ParseContext::default();

    let mut tokens = tokens.iter().peekable();
    while let Some(token) = tokens.next() {
        let Some(name) = option_name(token) else {
            // An empty token (`""`) never names a file.
            if !token.is_empty() && !token.starts_with('@') {
                context.candidates.push(token.clone());
            }
            continue;
        };

        if PARAMETERIZED_OPTIONS.contains(&name) {
            context.arguments.push(token.clone());
            if let Some(value) = tokens.next() {
                context.arguments.push(value.clone());
            }
        } else if let Some(header) = strip_any_prefix(name, &PRECOMPILED_HEADER_OPTIONS) {
            if header.is_empty() {
                if let Some(value) = tokens.next_if(|next| option_name(next).is_none()) {
                    context.add_pch_header(value);
                }
            } else {
                context.add_pch_header(header);
            }
        } else if let Some(file) = strip_any_prefix(name, &SOURCE_FILE_OPTIONS) {
            if file.is_empty() {
                if let Some(value) = tokens.next_if(|next| option_name(next).is_none()) {
                    context.add_file(value);
                }
            } else {
                context.add_file(file);
            }
        } else if FORCE_SOURCE_OPTIONS.contains(&name) {
            context.force_source = true;
        } else if name.eq_ignore_ascii_case(LINK_OPTION) {
            break;
        } else {
            log::trace!("Dropping argument: {token}");
        }
    }

    context.finish()
}

/// Returns the option name, when the token is an option.
fn option_name(token: &str) -> Option<&str> {
    token.strip_prefix('/').or_else(|| token.strip_prefix('-'))
}

/// Returns the rest of the name after the first matching prefix.
fn strip_any_prefix<'a>(name: &'a str, prefixes: &[&str]) -> Option<&'a str> {
    prefixes.iter().find_map(|prefix| name.strip_prefix(prefix))
}

fn has_source_extension(candidate: &str) -> bool {
    candidate
        .rsplit_once('.')
        .map(|(_, extension)| SOURCE_EXTENSIONS.contains(&extension.to_lowercase().as_str()))
        .unwrap_or(false)
}
