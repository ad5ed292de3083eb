// SPDX-License-Identifier: GPL-3.0-or-later

//! Splits a compiler invocation string into argument tokens.
//!
//! The splitting follows the rules of the Windows `CommandLineToArgvW` function
//! for the arguments after the program name:
//!
//! - Outside of quotes, whitespace separates the tokens.
//! - `2n` backslashes followed by a quote produce `n` backslashes, and the quote
//!   toggles the quoted state.
//! - `2n+1` backslashes followed by a quote produce `n` backslashes and a
//!   literal quote.
//! - Backslashes which are not followed by a quote are literal.
//! - Consecutive quotes are counted. A third quote in a row produces a literal
//!   quote and leaves the quoted state, a pair of quotes leaves the quoted state.
//!
//! Build logs often break long commands into multiple lines, therefore the input
//! is normalized before splitting: every whitespace run (including newlines and
//! tabs) is replaced by a single space.

use thiserror::Error;

/// Represents the reasons why a command line can't be tokenized.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenizeError {
    #[error("Command line is empty")]
    Empty,
    #[error("Command line contains a NUL character")]
    InteriorNul,
}

/// Normalizes and splits the command line into tokens.
pub fn tokenize(command_line: &str) -> Result<Vec<String>, TokenizeError> {
    if command_line.contains('\0') {
        return Err(TokenizeError::InteriorNul);
    }
    let normalized = normalize(command_line);
    if normalized.is_empty() {
        return Err(TokenizeError::Empty);
    }
    Ok(split(&normalized))
}

/// Collapses every whitespace run into a single space and trims both ends.
pub fn normalize(command_line: &str) -> String {
    command_line.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Splits an already normalized command line.
fn split(line: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    // A token can be empty (`""`), so it is tracked separately from `current`.
    let mut in_token = false;
    let mut backslashes = 0usize;
    let mut quotes = 0usize;

    let mut chars = line.chars().peekable();
    while let Some(char) = chars.next() {
        match char {
            ' ' | '\t' if quotes == 0 => {
                if in_token {
                    tokens.push(std::mem::take(&mut current));
                    in_token = false;
                }
                backslashes = 0;
            }
            '\\' => {
                current.push('\\');
                backslashes += 1;
                in_token = true;
            }
            '"' => {
                in_token = true;
                if backslashes % 2 == 0 {
                    current.truncate(current.len() - backslashes / 2);
                    quotes += 1;
                } else {
                    current.truncate(current.len() - backslashes / 2 - 1);
                    current.push('"');
                }
                backslashes = 0;

                while chars.next_if_eq(&'"').is_some() {
                    quotes += 1;
                    if quotes == 3 {
                        current.push('"');
                        quotes = 0;
                    }
                }
                if quotes == 2 {
                    quotes = 0;
                }
            }
            _ => {
                current.push(char);
                backslashes = 0;
                in_token = true;
            }
        }
    }
    if in_token {
        tokens.push(current);
    }
    tokens
}
