// SPDX-License-Identifier: GPL-3.0-or-later

//! Recognizes compiler invocations among the build events.
//!
//! A build event is a compiler invocation when the task name is one of the
//! known compiler task names (or matches the configured custom task). The
//! command line of such an event starts with the compiler executable, which
//! is found by the `cl.exe` marker. The rest of the command line are the
//! compiler arguments.

use super::parent_directory;
use std::path::Path;

/// The task name of the MSVC compiler task.
pub const COMPILER_TASK: &str = "CL";
/// The task name which only reports the compiler command line.
pub const COMPILER_TASK_ALTERNATE: &str = "CLCommandLine";
/// The compiler executable name, which separates the compiler from the arguments.
pub const COMPILER_MARKER: &str = "cl.exe";

/// Decides if a task name belongs to a compiler invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskFilter {
    custom_task: Option<String>,
}

impl TaskFilter {
    pub fn new(custom_task: Option<&str>) -> Self {
        Self {
            custom_task: custom_task.filter(|task| !task.is_empty()).map(str::to_string),
        }
    }

    pub fn is_compiler_task(&self, task_name: &str) -> bool {
        task_name == COMPILER_TASK
            || task_name == COMPILER_TASK_ALTERNATE
            || self
                .custom_task
                .as_deref()
                .is_some_and(|custom| task_name.contains(custom))
    }
}

/// A compiler invocation split into the compiler and its arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Invocation<'a> {
    /// The compiler executable, without quotes.
    pub compiler: &'a str,
    /// The remaining command line, not yet tokenized.
    pub arguments: &'a str,
}

impl<'a> Invocation<'a> {
    /// Splits the command line at the compiler marker.
    ///
    /// Returns `None` when the command line does not contain the marker.
    pub fn parse(command_line: &'a str) -> Option<Self> {
        // ASCII lowercase conversion keeps the byte offsets intact.
        let start = command_line.to_ascii_lowercase().find(COMPILER_MARKER)?;
        let end = start + COMPILER_MARKER.len();

        let compiler = command_line[..end].trim().trim_matches('"');
        let rest = &command_line[end..];
        let arguments = rest.strip_prefix('"').unwrap_or(rest);

        Some(Self { compiler, arguments })
    }
}

/// Resolves the compiler executable to an absolute path.
///
/// Absolute paths are kept as they are, relative paths are resolved from the
/// working directory.
pub fn resolve_compiler(compiler: &str, working_dir: &Path) -> String {
    if is_absolute(compiler) {
        compiler.to_string()
    } else {
        working_dir.join(compiler).to_string_lossy().into_owned()
    }
}

/// The directory of the project file, or the working directory when the
/// project file path has no directory part.
pub fn project_directory(project_file: &str, working_dir: &Path) -> String {
    parent_directory(project_file)
        .map(str::to_string)
        .unwrap_or_else(|| working_dir.to_string_lossy().into_owned())
}

/// Checks for Windows absolute paths (drive letter or UNC), and for absolute
/// paths of the host platform.
fn is_absolute(path: &str) -> bool {
    let bytes = path.as_bytes();
    let has_drive = bytes.len() >= 3
        && bytes[0].is_ascii_alphabetic()
        && bytes[1] == b':'
        && matches!(bytes[2], b'\\' | b'/');

    has_drive || path.starts_with(r"\\") || Path::new(path).is_absolute()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_filter_known_tasks() {
        let sut = TaskFilter::default();

        assert!(sut.is_compiler_task("CL"));
        assert!(sut.is_compiler_task("CLCommandLine"));
        assert!(!sut.is_compiler_task("cl"));
        assert!(!sut.is_compiler_task("Link"));
        assert!(!sut.is_compiler_task("MyCompileTask"));
    }

    #[test]
    fn test_task_filter_custom_task() {
        let sut = TaskFilter::new(Some("Compile"));

        assert!(sut.is_compiler_task("CL"));
        assert!(sut.is_compiler_task("MyCompileTask"));
        assert!(!sut.is_compiler_task("Link"));
    }

    #[test]
    fn test_task_filter_empty_custom_task_matches_nothing_extra() {
        let sut = TaskFilter::new(Some(""));

        assert!(!sut.is_compiler_task("Link"));
    }

    #[test]
    fn test_invocation_simple() {
        let sut = Invocation::parse("cl.exe /c a.cpp").unwrap();

        assert_eq!(sut.compiler, "cl.exe");
        assert_eq!(sut.arguments, " /c a.cpp");
    }

    #[test]
    fn test_invocation_quoted_compiler() {
        let sut = Invocation::parse(r#""C:\Program Files\MSVC\bin\CL.EXE" /c "a b.cpp""#).unwrap();

        assert_eq!(sut.compiler, r"C:\Program Files\MSVC\bin\CL.EXE");
        assert_eq!(sut.arguments, r#" /c "a b.cpp""#);
    }

    #[test]
    fn test_invocation_leading_whitespace() {
        let sut = Invocation::parse("\r\n  C:\\VC\\bin\\cl.exe\n/c a.cpp").unwrap();

        assert_eq!(sut.compiler, r"C:\VC\bin\cl.exe");
        assert_eq!(sut.arguments, "\n/c a.cpp");
    }

    #[test]
    fn test_invocation_without_marker() {
        assert_eq!(Invocation::parse("link.exe /out:a.exe a.obj"), None);
        assert_eq!(Invocation::parse(""), None);
    }

    #[test]
    fn test_resolve_compiler() {
        let working_dir = Path::new("/work");

        assert_eq!(resolve_compiler(r"C:\VC\cl.exe", working_dir), r"C:\VC\cl.exe");
        assert_eq!(resolve_compiler(r"\\server\VC\cl.exe", working_dir), r"\\server\VC\cl.exe");
        #[cfg(unix)]
        assert_eq!(resolve_compiler("/opt/msvc/cl.exe", working_dir), "/opt/msvc/cl.exe");
        assert_eq!(
            resolve_compiler("cl.exe", working_dir),
            working_dir.join("cl.exe").to_string_lossy()
        );
    }

    #[test]
    fn test_project_directory() {
        let working_dir = Path::new("/work");

        assert_eq!(project_directory(r"C:\project\app.vcxproj", working_dir), r"C:\project");
        assert_eq!(project_directory("app.vcxproj", working_dir), "/work");
    }
}
