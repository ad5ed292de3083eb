// SPDX-License-Identifier: GPL-3.0-or-later

use crate::environment;
use anyhow::{Context as AnyhowContext, Result};
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::path::PathBuf;

/// Application context containing runtime environment information.
///
/// The context is captured once at startup. It provides the working directory,
/// which is used to resolve relative compiler paths, and the environment, which
/// contributes the include directories of the run.
#[derive(Debug, Clone)]
pub struct Context {
    /// Current working directory when the application was invoked
    pub current_directory: PathBuf,
    /// All environment variables at startup
    pub environment: HashMap<String, String>,
}

impl Context {
    /// Capture the current application context.
    pub fn capture() -> Result<Self> {
        let current_directory =
            env::current_dir().with_context(|| "Failed to get current working directory")?;

        let environment = env::vars().collect::<HashMap<String, String>>();

        Ok(Context { current_directory, environment })
    }
}

impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Application Context:")?;
        writeln!(f, "Current Directory: {}", self.current_directory.display())?;
        writeln!(f, "Total Environment Variables: {} entries", self.environment.len())?;

        writeln!(f, "Relevant Environment Variables:")?;
        for (key, value) in &self.environment {
            if environment::relevant_env(key) {
                writeln!(f, "  {}={}", key, value)?;
            }
        }

        Ok(())
    }
}
