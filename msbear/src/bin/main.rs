// SPDX-License-Identifier: GPL-3.0-or-later

use anyhow::Context as AnyhowContext;
use log::LevelFilter;
use msbear::config::{LogDestination, Validator};
use msbear::{args, config, context, event, output, session};
use std::env;
use std::fs::File;
use std::process::ExitCode;

/// Driver function of the application.
fn main() -> anyhow::Result<ExitCode> {
    // Parse the command line arguments.
    let matches = args::cli().get_matches();
    let arguments = args::Arguments::try_from(matches)?;
    // Capture application context.
    let context = context::Context::capture()?;
    // Load the configuration, the logging depends on it.
    let configuration = configure(&context, &arguments)?;
    init_logging(configuration.log_file.as_ref(), arguments.verbose)?;

    // Get the package name and version from Cargo
    let pkg_name = env!("CARGO_PKG_NAME");
    let pkg_version = env!("CARGO_PKG_VERSION");
    log::info!("{pkg_name} v{pkg_version}");
    let os = env::consts::OS;
    let family = env::consts::FAMILY;
    let arch = env::consts::ARCH;
    log::info!("Running on... {family}/{os} {arch}");
    log::info!("{context}");
    log::info!("{configuration}");

    run(&context, &arguments, &configuration)?;
    log::debug!("Exit code: 0");

    Ok(ExitCode::SUCCESS)
}

/// Merges the configuration sources: file (or defaults), parameter string
/// and the command line flags. The later wins.
fn configure(
    context: &context::Context,
    arguments: &args::Arguments,
) -> anyhow::Result<config::Main> {
    let mut configuration = config::Loader::load(context, &arguments.config)?;
    if let Some(parameters) = &arguments.parameters {
        config::Overrides::from_parameters(parameters)?.apply(&mut configuration);
    }
    arguments.overrides.clone().apply(&mut configuration);
    config::Main::validate(&configuration).with_context(|| "Invalid configuration")?;

    Ok(configuration)
}

fn init_logging(destination: Option<&LogDestination>, verbose: u8) -> anyhow::Result<()> {
    let mut builder = env_logger::Builder::from_default_env();

    let mut level = match verbose {
        0 => None,
        1 => Some(LevelFilter::Info),
        2 => Some(LevelFilter::Debug),
        _ => Some(LevelFilter::Trace),
    };
    match destination {
        None => {}
        Some(LogDestination::Stdout) => {
            builder.target(env_logger::Target::Stdout);
            level = level.max(Some(LevelFilter::Debug));
        }
        Some(LogDestination::File(path)) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create the log file: {}", path.display()))?;
            builder.target(env_logger::Target::Pipe(Box::new(file)));
            level = level.max(Some(LevelFilter::Debug));
        }
    }
    if let Some(level) = level {
        builder.filter_level(level);
    }
    builder.try_init()?;

    Ok(())
}

/// Processes the build events and writes the compilation database.
///
/// The database is only written when every event was processed.
fn run(
    context: &context::Context,
    arguments: &args::Arguments,
    configuration: &config::Main,
) -> anyhow::Result<()> {
    let writer = output::OutputWriter::create(&configuration.output)?;
    let previous = output::load(&configuration.output)?;

    let mut session = session::Session::new(configuration, context, previous);
    let events = event::open(&arguments.input)?;
    for event in event::read(events) {
        session.handle(event?)?;
    }
    let (database, statistics) = session.finish();
    log::info!("{statistics}");

    writer.write(database.entries())?;
    Ok(())
}
