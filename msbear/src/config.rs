// SPDX-License-Identifier: GPL-3.0-or-later

//! This module defines the configuration of the application.
//!
//! The configuration is either loaded from a file or used with default
//! values, which are defined in the code. On top of that, the logger style
//! parameter string and the command line flags can override the values.
//!
//! The configuration file syntax is based on the YAML format.
//! The default configuration file name is `msbear.yml`.
//!
//! The configuration file location is searched in the following order:
//! 1. The current working directory
//! 2. The local configuration directory of the user
//! 3. The configuration directory of the user
//! 4. The local configuration directory of the application
//! 5. The configuration directory of the application
//!
//! ```yaml
//! schema: "1.0"
//! output: build/compile_commands.json
//! custom_task: CompileWithClangTidy
//! log_file: stdout
//! merge: skip-existing
//! ```
//!
//! The parameter string is a `;` separated list. The first item can be the
//! output file name, every other item is a `key=value` pair:
//!
//! ```text
//! compile_commands.json;customtask=MyCompile;logfile=msbear.log;merge=overwrite
//! ```

// Re-Export the types and the loader module content.
pub use loader::{ConfigError, Loader};
pub use parameters::Overrides;
pub use types::*;
pub use validation::Validator;

mod types {
    use crate::database::MergePolicy;
    use serde::Deserialize;
    use std::fmt;
    use std::path::PathBuf;

    /// Represents the application configuration.
    #[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
    #[serde(deny_unknown_fields)]
    pub struct Main {
        #[serde(deserialize_with = "validate_schema_version")]
        pub schema: String,
        #[serde(default = "default_output")]
        pub output: PathBuf,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub custom_task: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub log_file: Option<LogDestination>,
        #[serde(default)]
        pub merge: MergePolicy,
    }

    impl Default for Main {
        fn default() -> Self {
            Self {
                schema: String::from(SUPPORTED_SCHEMA_VERSION),
                output: default_output(),
                custom_task: None,
                log_file: None,
                merge: MergePolicy::default(),
            }
        }
    }

    impl fmt::Display for Main {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            writeln!(f, "Configuration:")?;
            let yaml_string = serde_yml::to_string(self).map_err(|_| fmt::Error)?;
            for line in yaml_string.lines() {
                writeln!(f, "{}", line)?;
            }
            Ok(())
        }
    }

    /// Where the diagnostic messages are written.
    #[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
    #[serde(from = "String", into = "String")]
    pub enum LogDestination {
        /// The standard output. (Configured with the `stdout` value.)
        Stdout,
        /// A file, which is truncated at startup.
        File(PathBuf),
    }

    impl From<String> for LogDestination {
        fn from(value: String) -> Self {
            if value.eq_ignore_ascii_case(STDOUT_DESTINATION) {
                LogDestination::Stdout
            } else {
                LogDestination::File(PathBuf::from(value))
            }
        }
    }

    impl From<LogDestination> for String {
        fn from(value: LogDestination) -> Self {
            match value {
                LogDestination::Stdout => STDOUT_DESTINATION.to_string(),
                LogDestination::File(path) => path.to_string_lossy().into_owned(),
            }
        }
    }

    const SUPPORTED_SCHEMA_VERSION: &str = "1.0";
    const DEFAULT_OUTPUT_FILE: &str = "compile_commands.json";
    const STDOUT_DESTINATION: &str = "stdout";

    pub(super) fn default_output() -> PathBuf {
        PathBuf::from(DEFAULT_OUTPUT_FILE)
    }

    // Custom deserialization function to validate the schema version
    fn validate_schema_version<'de, D>(deserializer: D) -> Result<String, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let schema: String = Deserialize::deserialize(deserializer)?;
        if schema != SUPPORTED_SCHEMA_VERSION {
            use serde::de::Error;
            Err(Error::custom(format!(
                "Unsupported schema version: {schema}. Expected: {SUPPORTED_SCHEMA_VERSION}"
            )))
        } else {
            Ok(schema)
        }
    }
}

pub mod parameters {
    use super::loader::ConfigError;
    use super::types::{LogDestination, Main};
    use crate::database::MergePolicy;
    use std::path::PathBuf;

    const PARAMETER_SEPARATOR: char = ';';

    const KEY_OUTPUT: &str = "output";
    const KEY_CUSTOM_TASK: &str = "customtask";
    const KEY_LOG_FILE: &str = "logfile";
    const KEY_MERGE: &str = "merge";

    /// Configuration values which replace the loaded ones when present.
    #[derive(Clone, Debug, Default, PartialEq)]
    pub struct Overrides {
        pub output: Option<PathBuf>,
        pub custom_task: Option<String>,
        pub log_file: Option<LogDestination>,
        pub merge: Option<MergePolicy>,
    }

    impl Overrides {
        /// Parses the logger style parameter string.
        ///
        /// Keys are case-insensitive. Unknown keys are rejected.
        pub fn from_parameters(parameters: &str) -> Result<Self, ConfigError> {
            let mut result = Self::default();

            let items = parameters
                .split(PARAMETER_SEPARATOR)
                .map(str::trim)
                .filter(|item| !item.is_empty());
            for (position, item) in items.enumerate() {
                let Some((key, value)) = item.split_once('=') else {
                    if position == 0 {
                        result.output = Some(PathBuf::from(item));
                        continue;
                    }
                    return Err(ConfigError::UnknownParameter { key: item.to_string() });
                };
                let value = value.trim();
                match key.trim().to_ascii_lowercase().as_str() {
                    KEY_OUTPUT => result.output = Some(PathBuf::from(value)),
                    KEY_CUSTOM_TASK => result.custom_task = Some(value.to_string()),
                    KEY_LOG_FILE => result.log_file = Some(LogDestination::from(value.to_string())),
                    KEY_MERGE => {
                        let policy = value.parse::<MergePolicy>().map_err(|reason| ConfigError::InvalidParameter {
                            key: KEY_MERGE.to_string(),
                            reason,
                        })?;
                        result.merge = Some(policy);
                    }
                    _ => return Err(ConfigError::UnknownParameter { key: key.trim().to_string() }),
                }
            }
            Ok(result)
        }

        /// Applies the present values on the configuration.
        pub fn apply(self, config: &mut Main) {
            if let Some(output) = self.output {
                config.output = output;
            }
            if let Some(custom_task) = self.custom_task {
                config.custom_task = Some(custom_task);
            }
            if let Some(log_file) = self.log_file {
                config.log_file = Some(log_file);
            }
            if let Some(merge) = self.merge {
                config.merge = merge;
            }
        }
    }

}

pub mod validation {
    use super::types::*;
    use thiserror::Error;

    /// Trait for validating configuration objects
    pub trait Validator<T> {
        type Error: std::error::Error;

        fn validate(config: &T) -> Result<(), Self::Error>;
    }

    /// Validation errors for configuration
    #[derive(Debug, Error)]
    pub enum ValidationError {
        #[error("Empty string value for field '{field}'")]
        EmptyString { field: &'static str },
        #[error("Multiple validation errors: {errors:?}")]
        Multiple { errors: Vec<ValidationError> },
    }

    impl Validator<Main> for Main {
        type Error = ValidationError;

        fn validate(config: &Main) -> Result<(), Self::Error> {
            let mut errors = Vec::new();

            if config.output.as_os_str().is_empty() {
                errors.push(ValidationError::EmptyString { field: "output" });
            }
            if config.custom_task.as_deref().is_some_and(str::is_empty) {
                errors.push(ValidationError::EmptyString { field: "custom_task" });
            }
            if let Some(LogDestination::File(path)) = &config.log_file {
                if path.as_os_str().is_empty() {
                    errors.push(ValidationError::EmptyString { field: "log_file" });
                }
            }

            match errors.len() {
                0 => Ok(()),
                1 => Err(errors.remove(0)),
                _ => Err(ValidationError::Multiple { errors }),
            }
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use std::path::PathBuf;

        #[test]
        fn test_validate_default() {
            assert!(Main::validate(&Main::default()).is_ok());
        }

        #[test]
        fn test_validate_empty_output() {
            let config = Main { output: PathBuf::new(), ..Main::default() };

            match Main::validate(&config) {
                Err(ValidationError::EmptyString { field }) => assert_eq!(field, "output"),
                other => panic!("Expected empty string validation error, got: {other:?}"),
            }
        }

        #[test]
        fn test_validate_multiple_errors() {
            let config = Main {
                output: PathBuf::new(),
                custom_task: Some(String::new()),
                log_file: Some(LogDestination::File(PathBuf::new())),
                ..Main::default()
            };

            match Main::validate(&config) {
                Err(ValidationError::Multiple { errors }) => assert_eq!(errors.len(), 3),
                other => panic!("Expected multiple validation errors, got: {other:?}"),
            }
        }
    }
}

pub mod loader {
    use super::{Main, Validator};
    use directories::{BaseDirs, ProjectDirs};
    use log::{debug, info};
    use std::fs::OpenOptions;
    use std::path::{Path, PathBuf};
    use thiserror::Error;

    const CONFIG_FILE_NAME: &str = "msbear.yml";

    pub struct Loader {}

    impl Loader {
        /// Loads the configuration from the specified file or the default locations.
        ///
        /// If the configuration file is specified, it will be used. Otherwise, the default locations
        /// will be searched for the configuration file. If the configuration file is not found, the
        /// default configuration will be returned.
        pub fn load(
            context: &crate::context::Context,
            filename: &Option<String>,
        ) -> Result<Main, ConfigError> {
            if let Some(path) = filename {
                Self::from_file(Path::new(path))
            } else {
                for location in Self::file_locations(context) {
                    debug!("Checking configuration file: {}", location.display());
                    if location.exists() {
                        return Self::from_file(location.as_path());
                    }
                }
                debug!("Configuration file not found. Using the default configuration.");
                Ok(Main::default())
            }
        }

        /// The default locations where the configuration file can be found.
        fn file_locations(context: &crate::context::Context) -> Vec<PathBuf> {
            let mut locations = Vec::new();

            locations.push(context.current_directory.clone());
            if let Some(base_dirs) = BaseDirs::new() {
                locations.push(base_dirs.config_local_dir().to_path_buf());
                locations.push(base_dirs.config_dir().to_path_buf());
            }
            if let Some(proj_dirs) = ProjectDirs::from("com.github", "rizsotto", "msbear") {
                locations.push(proj_dirs.config_local_dir().to_path_buf());
                locations.push(proj_dirs.config_dir().to_path_buf());
            }
            // filter out duplicate elements from the list
            locations.dedup();
            locations.iter().map(|p| p.join(CONFIG_FILE_NAME)).collect()
        }

        /// Loads the configuration from the specified file.
        pub fn from_file(path: &Path) -> Result<Main, ConfigError> {
            info!("Loading configuration file: {}", path.display());

            let reader = OpenOptions::new()
                .read(true)
                .open(path)
                .map_err(|source| ConfigError::FileAccess { path: path.to_path_buf(), source })?;

            let content: Main = Self::from_reader(reader)
                .map_err(|source| ConfigError::ParseError { path: path.to_path_buf(), source })?;

            Main::validate(&content)
                .map_err(|source| ConfigError::ValidationError { path: path.to_path_buf(), source })?;

            Ok(content)
        }

        /// Define the deserialization format of the config file.
        fn from_reader<R, T>(rdr: R) -> serde_yml::Result<T>
        where
            R: std::io::Read,
            T: serde::de::DeserializeOwned,
        {
            serde_yml::from_reader(rdr)
        }
    }

    /// Represents all possible configuration-related errors.
    #[derive(Debug, Error)]
    pub enum ConfigError {
        /// Error when opening or reading a configuration file.
        #[error("Failed to access configuration file '{path}': {source}")]
        FileAccess {
            path: PathBuf,
            #[source]
            source: std::io::Error,
        },
        /// Error when parsing the configuration file format.
        #[error("Failed to parse configuration from file '{path}': {source}")]
        ParseError {
            path: PathBuf,
            #[source]
            source: serde_yml::Error,
        },
        /// Error when configuration validation fails.
        #[error("Configuration validation failed '{path}': {source}")]
        ValidationError {
            path: PathBuf,
            #[source]
            source: crate::config::validation::ValidationError,
        },
        /// Error when the parameter string has an unrecognized key.
        #[error("Unknown configuration parameter: '{key}'")]
        UnknownParameter { key: String },
        /// Error when the parameter string has an invalid value.
        #[error("Invalid value for configuration parameter '{key}': {reason}")]
        InvalidParameter { key: String, reason: String },
    }

}
