//! Abstractions over the operating-system surfaces collectors read from.
//!
//! `FileSystem`, `CommandRunner` and `PlatformQuery` let every collector run
//! against the real host or against in-memory mocks, so grammars and
//! collectors are testable without spawning processes or touching `/proc`.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::QueryError;
use crate::metadata::MetaValue;

/// Abstraction for filesystem operations.
pub trait FileSystem: Send + Sync {
    /// Reads the entire contents of a file as a string.
    ///
    /// # Returns
    /// The file contents, or an I/O error. A missing file must be reported
    /// as `io::ErrorKind::NotFound`.
    fn read_to_string(&self, path: &Path) -> io::Result<String>;

    /// Checks if a path exists.
    fn exists(&self, path: &Path) -> bool;

    /// Lists entries in a directory.
    ///
    /// # Returns
    /// Paths of the entries in the directory, in no particular order.
    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>>;
}

/// Real filesystem implementation that delegates to `std::fs`.
#[derive(Debug, Default, Clone, Copy)]
pub struct RealFs;

impl RealFs {
    pub fn new() -> Self {
        Self
    }
}

impl FileSystem for RealFs {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        let entries = std::fs::read_dir(path)?;
        let mut paths = Vec::new();
        for entry in entries {
            paths.push(entry?.path());
        }
        Ok(paths)
    }
}

/// Captured result of a finished command.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandOutput {
    /// Exit code; `None` when the process was killed by a signal.
    pub status: Option<i32>,
    pub stdout: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }
}

/// Abstraction for running an external diagnostic tool to completion.
pub trait CommandRunner: Send + Sync {
    /// Runs `program` with `args` and waits for it.
    ///
    /// A missing executable must be reported as `io::ErrorKind::NotFound`.
    fn run(&self, program: &str, args: &[String]) -> io::Result<CommandOutput>;
}

/// Runs commands with `std::process::Command`.
#[derive(Debug, Default, Clone, Copy)]
pub struct RealCommand;

impl RealCommand {
    pub fn new() -> Self {
        Self
    }
}

impl CommandRunner for RealCommand {
    fn run(&self, program: &str, args: &[String]) -> io::Result<CommandOutput> {
        let output = Command::new(program).args(args).output()?;
        Ok(CommandOutput {
            status: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        })
    }
}

/// One record returned by a platform management query: field name → value.
pub type QueryRow = BTreeMap<String, MetaValue>;

/// Declarative platform management query port.
///
/// Backends translate `(class, filter)` into whatever the platform speaks;
/// the collectors only ever see ordered rows of named fields.
pub trait PlatformQuery: Send + Sync {
    /// Returns every record of `class` matching the optional `filter`
    /// expression, in backend order.
    fn query(&self, class: &str, filter: Option<&str>) -> Result<Vec<QueryRow>, QueryError>;
}

/// Backend for hosts without platform instrumentation.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPlatformQuery;

impl PlatformQuery for NoPlatformQuery {
    fn query(&self, _class: &str, _filter: Option<&str>) -> Result<Vec<QueryRow>, QueryError> {
        Err(QueryError::Unsupported)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_real_fs_read_to_string() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("loadavg");
        std::fs::write(&path, "0.15 0.10 0.05 1/150 1234\n").unwrap();

        let fs = RealFs::new();
        let content = fs.read_to_string(&path).unwrap();
        assert!(content.starts_with("0.15"));
    }

    #[test]
    fn test_real_fs_missing_is_not_found() {
        let fs = RealFs::new();
        let err = fs
            .read_to_string(Path::new("/nonexistent/path/12345"))
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
        assert!(!fs.exists(Path::new("/nonexistent/path/12345")));
    }

    #[test]
    fn test_real_fs_read_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("bond0"), "").unwrap();
        std::fs::write(dir.path().join("bond1"), "").unwrap();

        let fs = RealFs::new();
        let entries = fs.read_dir(dir.path()).unwrap();
        assert_eq!(entries.len(), 2);
    }

    #[test]
    fn test_real_command_missing_executable() {
        let err = RealCommand::new()
            .run("hostprobe-no-such-tool-12345", &[])
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn test_no_platform_query() {
        assert_eq!(
            NoPlatformQuery.query("Win32_BIOS", None),
            Err(QueryError::Unsupported)
        );
    }
}
