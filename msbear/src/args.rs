// SPDX-License-Identifier: GPL-3.0-or-later

//! This module contains the command line interface of the application.
//!
//! The command line parsing is implemented using the `clap` library.
//! The flags which have a configuration counterpart are collected into
//! `Overrides`, these win over the configuration file and the parameter
//! string.

use crate::config::{LogDestination, Overrides};
use crate::database::MergePolicy;
use clap::builder::PossibleValuesParser;
use clap::{ArgAction, ArgMatches, Command, arg, command};
use std::path::PathBuf;

const DEFAULT_EVENT_FILE: &str = "events.json";

/// Represents the command line arguments of the application.
#[derive(Debug, PartialEq)]
pub struct Arguments {
    // The path of the configuration file.
    pub config: Option<String>,
    // The path of the event file, or `-` for the standard input.
    pub input: String,
    // The logger style parameter string.
    pub parameters: Option<String>,
    // The configuration values given as flags.
    pub overrides: Overrides,
    pub verbose: u8,
}

impl TryFrom<ArgMatches> for Arguments {
    type Error = anyhow::Error;

    fn try_from(matches: ArgMatches) -> Result<Self, Self::Error> {
        let config = matches.get_one::<String>("config").cloned();
        let input = matches
            .get_one::<String>("input")
            .cloned()
            .unwrap_or_else(|| DEFAULT_EVENT_FILE.to_string());
        let parameters = matches.get_one::<String>("parameters").cloned();
        let merge = matches
            .get_one::<String>("merge")
            .map(|value| value.parse::<MergePolicy>())
            .transpose()
            .map_err(anyhow::Error::msg)?;
        let overrides = Overrides {
            output: matches.get_one::<String>("output").map(PathBuf::from),
            custom_task: matches.get_one::<String>("custom-task").cloned(),
            log_file: matches.get_one::<String>("log-file").cloned().map(LogDestination::from),
            merge,
        };
        let verbose = matches.get_count("verbose");

        Ok(Arguments { config, input, parameters, overrides, verbose })
    }
}

/// Represents the command line interface of the application.
///
/// None of the output related flags have a default value here, because the
/// configuration file provides those.
pub fn cli() -> Command {
    command!().args(&[
        arg!(-v --verbose ... "Sets the level of verbosity").action(ArgAction::Count),
        arg!(-c --config <FILE> "Path of the config file"),
        arg!(-i --input <FILE> "Path of the event file, '-' reads the standard input")
            .default_value(DEFAULT_EVENT_FILE)
            .hide_default_value(false),
        arg!(-o --output <FILE> "Path of the result file"),
        arg!(-p --parameters <PARAMETERS> "Logger style parameters")
            .long_help("Logger style parameters: output;customtask=...;logfile=...;merge=..."),
        arg!(--"custom-task" <NAME> "Task name (substring) which is also a compiler invocation"),
        arg!(--"log-file" <DESTINATION> "Write the diagnostic messages to a file, or to 'stdout'"),
        arg!(--merge <POLICY> "How to treat the entries of an existing result file")
            .value_parser(PossibleValuesParser::new(["overwrite", "skip-existing"])),
    ])
}
