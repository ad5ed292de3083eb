// SPDX-License-Identifier: GPL-3.0-or-later

//! The session drives the processing of the build events.
//!
//! A session owns every piece of state of a run: the include directories
//! collected from the environment, and the compilation database. Events are
//! processed one at a time, each invocation is merged into the database before
//! the next event is looked at.

use crate::database::{CompilationDatabase, Entry, Merge};
use crate::environment::IncludeSet;
use crate::event::Event;
use crate::semantic::invocation::{project_directory, resolve_compiler};
use crate::semantic::{Invocation, TaskFilter, classify, tokenize};
use crate::{config, context};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Represents the errors which abort the whole run.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(
        "Task '{task_name}' was recognized as compiler task, \
         but '{marker}' was not found in the command line: {command_line}"
    )]
    MissingCompiler {
        task_name: String,
        command_line: String,
        marker: &'static str,
    },
}

/// Counters of the processed events.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Statistics {
    pub events: usize,
    pub events_ignored: usize,
    pub invocations: usize,
    pub invocations_rejected: usize,
    pub entries_added: usize,
    pub entries_updated: usize,
    pub entries_kept: usize,
}

impl fmt::Display for Statistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Session:")?;
        writeln!(f, "  build events: {}", self.events)?;
        writeln!(f, "  ignored events: {}", self.events_ignored)?;
        writeln!(f, "  compiler invocations: {}", self.invocations)?;
        writeln!(f, "  rejected invocations: {}", self.invocations_rejected)?;
        writeln!(f, "  new entries: {}", self.entries_added)?;
        writeln!(f, "  updated entries: {}", self.entries_updated)?;
        write!(f, "  kept entries: {}", self.entries_kept)
    }
}

pub struct Session {
    filter: TaskFilter,
    working_dir: PathBuf,
    includes: IncludeSet,
    database: CompilationDatabase,
    statistics: Statistics,
}

impl Session {
    /// Creates a session on top of the previously persisted entries.
    ///
    /// The merge policy of the database comes from the configuration.
    pub fn new(
        config: &config::Main,
        context: &context::Context,
        previous: impl IntoIterator<Item = Entry>,
    ) -> Self {
        let mut session = Self {
            filter: TaskFilter::new(config.custom_task.as_deref()),
            working_dir: context.current_directory.clone(),
            includes: IncludeSet::default(),
            database: CompilationDatabase::from_entries(previous, config.merge),
            statistics: Statistics::default(),
        };
        session.add_environment(&context.environment);
        session
    }

    /// Processes a single build event.
    pub fn handle(&mut self, event: Event) -> Result<(), SessionError> {
        self.statistics.events += 1;
        match event {
            Event::Environment { variables } => {
                self.add_environment(&variables);
                Ok(())
            }
            Event::TaskCommandLine { task_name, command_line, project_file } => {
                if self.filter.is_compiler_task(&task_name) {
                    self.compile(&task_name, &command_line, &project_file)
                } else {
                    log::debug!("Ignoring task: {task_name}");
                    self.statistics.events_ignored += 1;
                    Ok(())
                }
            }
        }
    }

    /// Adds the include directories from the environment variables.
    pub fn add_environment(&mut self, variables: &HashMap<String, String>) {
        let added = self.includes.extend_from_environment(variables);
        if added > 0 {
            log::debug!("Include directories from the environment: {:?}", self.includes);
        }
    }

    /// Processes a compiler invocation.
    ///
    /// A command line which can't be tokenized rejects this invocation only.
    /// A command line without the compiler marker is an error.
    fn compile(
        &mut self,
        task_name: &str,
        command_line: &str,
        project_file: &str,
    ) -> Result<(), SessionError> {
        let invocation =
            Invocation::parse(command_line).ok_or_else(|| SessionError::MissingCompiler {
                task_name: task_name.to_string(),
                command_line: command_line.to_string(),
                marker: crate::semantic::invocation::COMPILER_MARKER,
            })?;
        self.statistics.invocations += 1;

        let tokens = match tokenize(invocation.arguments) {
            Ok(tokens) => tokens,
            Err(error) => {
                log::warn!("Skipping invocation of {}: {error}", invocation.compiler);
                self.statistics.invocations_rejected += 1;
                return Ok(());
            }
        };
        let classification = classify(&tokens);
        log::debug!("Recognized: {classification:?}");

        let compiler = resolve_compiler(invocation.compiler, &self.working_dir);
        let directory = project_directory(project_file, &self.working_dir);
        for entry in classification.to_entries(&compiler, &directory, &self.includes) {
            match self.database.merge(entry) {
                Merge::Added => self.statistics.entries_added += 1,
                Merge::Updated => self.statistics.entries_updated += 1,
                Merge::Kept => self.statistics.entries_kept += 1,
            }
        }
        Ok(())
    }

    pub fn database(&self) -> &CompilationDatabase {
        &self.database
    }

    pub fn statistics(&self) -> &Statistics {
        &self.statistics
    }

    /// Ends the session, and returns the final database.
    pub fn finish(self) -> (CompilationDatabase, Statistics) {
        (self.database, self.statistics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MergePolicy;
    use crate::output::{OutputWriter, load};
    use tempfile::tempdir;

    fn context(environment: &[(&str, &str)]) -> context::Context {
        context::Context {
            current_directory: PathBuf::from("/work"),
            environment: environment
                .iter()
                .map(|(key, value)| (key.to_string(), value.to_string()))
                .collect(),
        }
    }

    fn session(policy: MergePolicy, environment: &[(&str, &str)]) -> Session {
        let config = config::Main { merge: policy, ..config::Main::default() };
        Session::new(&config, &context(environment), Vec::new())
    }

    fn compile(task_name: &str, command_line: &str) -> Event {
        Event::TaskCommandLine {
            task_name: task_name.to_string(),
            command_line: command_line.to_string(),
            project_file: r"C:\project\app.vcxproj".to_string(),
        }
    }

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    fn files(sut: &Session) -> Vec<&str> {
        sut.database().entries().iter().map(|entry| entry.file.as_str()).collect()
    }

    #[test]
    fn test_extension_filter() {
        let mut sut = session(MergePolicy::Overwrite, &[]);

        sut.handle(compile("CL", r"C:\VC\cl.exe /Dfoo=1 a.cpp b.txt c.c")).unwrap();

        assert_eq!(files(&sut), vec!["a.cpp", "c.c"]);
        assert_eq!(
            sut.database().get(r"C:\project", "a.cpp"),
            Some(&Entry::new(r"C:\project", "a.cpp", strings(&[r"C:\VC\cl.exe", "a.cpp"])))
        );
    }

    #[test]
    fn test_forced_source_override() {
        let mut sut = session(MergePolicy::Overwrite, &[]);

        sut.handle(compile("CL", r"C:\VC\cl.exe /TC a.cpp b.txt")).unwrap();

        assert_eq!(files(&sut), vec!["a.cpp", "b.txt"]);
    }

    #[test]
    fn test_pch_directory_synthesis() {
        let mut sut = session(MergePolicy::Overwrite, &[]);

        sut.handle(compile("CL", r"C:\VC\cl.exe /Yuinclude\pch.h a.cpp")).unwrap();

        assert_eq!(files(&sut), vec!["a.cpp"]);
        let entry = sut.database().get(r"C:\project", "a.cpp").unwrap();
        assert_eq!(entry.arguments, strings(&[r"C:\VC\cl.exe", "/Iinclude", "a.cpp"]));
    }

    #[test]
    fn test_link_truncation() {
        let mut sut = session(MergePolicy::Overwrite, &[]);

        sut.handle(compile("CL", r"C:\VC\cl.exe a.cpp /link b.obj /Dignored=1")).unwrap();

        assert_eq!(files(&sut), vec!["a.cpp"]);
        let entry = sut.database().get(r"C:\project", "a.cpp").unwrap();
        assert!(!entry.arguments.iter().any(|argument| argument.contains("ignored")));
    }

    #[test]
    fn test_environment_includes_applied_once_per_invocation() {
        let mut sut = session(MergePolicy::Overwrite, &[("INCLUDE", r"C:\inc1;C:\inc2")]);

        sut.handle(compile("CL", r"C:\VC\cl.exe /D X a.cpp")).unwrap();
        sut.handle(compile("CL", r"C:\VC\cl.exe b.cpp c.cpp")).unwrap();

        assert_eq!(
            sut.database().get(r"C:\project", "a.cpp").unwrap().arguments,
            strings(&[r"C:\VC\cl.exe", "/D", "X", r"/IC:\inc1", r"/IC:\inc2", "a.cpp"])
        );
        assert_eq!(
            sut.database().get(r"C:\project", "c.cpp").unwrap().arguments,
            strings(&[r"C:\VC\cl.exe", r"/IC:\inc1", r"/IC:\inc2", "c.cpp"])
        );
    }

    #[test]
    fn test_environment_event_extends_includes() {
        let mut sut = session(MergePolicy::Overwrite, &[("INCLUDE", r"C:\inc1")]);

        sut.handle(Event::Environment {
            variables: HashMap::from([
                ("INCLUDE".to_string(), r"C:\inc1".to_string()),
                ("EXTERNAL_INCLUDE".to_string(), r"C:\ext".to_string()),
            ]),
        })
        .unwrap();
        sut.handle(compile("CL", r"C:\VC\cl.exe a.cpp")).unwrap();

        assert_eq!(
            sut.database().get(r"C:\project", "a.cpp").unwrap().arguments,
            strings(&[r"C:\VC\cl.exe", r"/IC:\inc1", r"/IC:\ext", "a.cpp"])
        );
    }

    #[test]
    fn test_repeated_invocation_is_idempotent() {
        let mut sut = session(MergePolicy::Overwrite, &[("INCLUDE", r"C:\inc")]);
        let command_line = r#""C:\Program Files\VC\cl.exe" /I "C:\my include" /Yupch.h a.cpp b.cpp"#;

        sut.handle(compile("CL", command_line)).unwrap();
        let first = sut.database().entries().to_vec();
        sut.handle(compile("CL", command_line)).unwrap();

        assert_eq!(sut.database().entries(), first.as_slice());
        assert_eq!(sut.statistics().entries_added, 2);
        assert_eq!(sut.statistics().entries_updated, 2);
    }

    #[test]
    fn test_overwrite_policy_replaces_previous_entry() {
        let previous = Entry::new(r"C:\project", "a.cpp", strings(&["old.exe", "a.cpp"]));
        let config = config::Main::default();
        let mut sut = Session::new(&config, &context(&[]), vec![previous]);

        sut.handle(compile("CL", r"C:\VC\cl.exe a.cpp")).unwrap();

        let (database, statistics) = sut.finish();
        assert_eq!(database.entries()[0].arguments, strings(&[r"C:\VC\cl.exe", "a.cpp"]));
        assert_eq!(statistics.entries_updated, 1);
    }

    #[test]
    fn test_skip_existing_policy_keeps_previous_entry() {
        let previous = Entry::new(r"C:\project", "a.cpp", strings(&["old.exe", "a.cpp"]));
        let config = config::Main { merge: MergePolicy::SkipExisting, ..config::Main::default() };
        let mut sut = Session::new(&config, &context(&[]), vec![previous.clone()]);

        sut.handle(compile("CL", r"C:\VC\cl.exe a.cpp b.cpp")).unwrap();

        let (database, statistics) = sut.finish();
        assert_eq!(database.entries()[0], previous);
        assert_eq!(database.len(), 2);
        assert_eq!(statistics.entries_kept, 1);
        assert_eq!(statistics.entries_added, 1);
    }

    #[test]
    fn test_relative_compiler_is_resolved() {
        let mut sut = session(MergePolicy::Overwrite, &[]);

        sut.handle(compile("CL", "cl.exe a.cpp")).unwrap();

        let entry = sut.database().get(r"C:\project", "a.cpp").unwrap();
        assert_eq!(entry.arguments[0], PathBuf::from("/work").join("cl.exe").to_string_lossy());
    }

    #[test]
    fn test_other_tasks_are_ignored() {
        let mut sut = session(MergePolicy::Overwrite, &[]);

        sut.handle(compile("Link", "link.exe /out:app.exe a.obj")).unwrap();
        sut.handle(compile("Message", "cl.exe a.cpp")).unwrap();

        assert!(sut.database().is_empty());
        assert_eq!(sut.statistics().events, 2);
        assert_eq!(sut.statistics().events_ignored, 2);
    }

    #[test]
    fn test_custom_task() {
        let config =
            config::Main { custom_task: Some("Tidy".to_string()), ..config::Main::default() };
        let mut sut = Session::new(&config, &context(&[]), Vec::new());

        sut.handle(compile("ClangTidyTask", r"C:\LLVM\clang-cl.exe a.cpp")).unwrap();

        let entry = sut.database().get(r"C:\project", "a.cpp").unwrap();
        assert_eq!(entry.arguments[0], r"C:\LLVM\clang-cl.exe");
    }

    #[test]
    fn test_missing_compiler_marker_aborts() {
        let mut sut = session(MergePolicy::Overwrite, &[]);

        let result = sut.handle(compile("CL", "gcc -c a.cpp"));

        assert!(matches!(result, Err(SessionError::MissingCompiler { .. })));
        assert!(sut.database().is_empty());
    }

    #[test]
    fn test_invocation_without_arguments_is_rejected() {
        let mut sut = session(MergePolicy::Overwrite, &[]);

        sut.handle(compile("CL", r"C:\VC\cl.exe")).unwrap();

        assert!(sut.database().is_empty());
        assert_eq!(sut.statistics().invocations_rejected, 1);
    }

    #[test]
    fn test_merge_policy_comes_from_configuration() {
        let previous = Entry::new(r"C:\project", "a.cpp", strings(&["old.exe", "a.cpp"]));

        let overwrite =
            Session::new(&config::Main::default(), &context(&[]), vec![previous.clone()]);
        let config = config::Main { merge: MergePolicy::SkipExisting, ..config::Main::default() };
        let skip = Session::new(&config, &context(&[]), vec![previous]);

        assert_eq!(overwrite.database().policy(), MergePolicy::Overwrite);
        assert_eq!(skip.database().policy(), MergePolicy::SkipExisting);
    }

    #[test]
    fn test_empty_argument_with_forced_source_is_written() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("compile_commands.json");
        let mut sut = session(MergePolicy::Overwrite, &[]);

        sut.handle(compile("CL", r#"C:\VC\cl.exe /TC a.c "" b.c"#)).unwrap();
        let (database, _) = sut.finish();
        OutputWriter::create(&path).unwrap().write(database.entries()).unwrap();

        let written = load(&path).unwrap();
        let files: Vec<_> = written.iter().map(|entry| entry.file.as_str()).collect();
        assert_eq!(files, vec!["a.c", "b.c"]);
    }

    #[test]
    fn test_statistics_display() {
        let statistics =
            Statistics { events: 12, events_ignored: 4, entries_added: 7, ..Statistics::default() };

        let display = statistics.to_string();

        assert!(display.starts_with("Session:\n"));
        assert!(display.contains("  build events: 12\n"));
        assert!(display.contains("  ignored events: 4\n"));
        assert!(display.ends_with("  kept entries: 0"));
    }

    #[test]
    fn test_multiline_command_line() {
        let mut sut = session(MergePolicy::Overwrite, &[]);

        sut.handle(compile("CL", "C:\\VC\\cl.exe /c\r\n  /I\r\n  include\r\n  a.cpp\r\n")).unwrap();

        let entry = sut.database().get(r"C:\project", "a.cpp").unwrap();
        assert_eq!(entry.arguments, strings(&[r"C:\VC\cl.exe", "/I", "include", "a.cpp"]));
    }
}
