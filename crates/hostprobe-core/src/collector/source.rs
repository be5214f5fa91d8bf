//! Source reader: turns pseudo-files, command output and directory listings
//! into line streams.
//!
//! Absent sources are a normal condition (the feature is not present on this
//! host) and produce [`SourceStatus::Absent`] or [`SourceStatus::Unavailable`]
//! instead of an error. Only real read failures and fatal parse signals become
//! [`CollectError`]s.

use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, warn};

use crate::collector::grammar::LineParser;
use crate::collector::traits::{
    CommandRunner, FileSystem, NoPlatformQuery, PlatformQuery, QueryRow, RealCommand, RealFs,
};
use crate::error::{CollectError, ParseError};
use crate::metric::Emitter;

/// Outcome of a successful source read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceStatus {
    /// The source was read and every line delivered.
    Read,
    /// The file or directory does not exist on this host.
    Absent,
    /// The command is missing or exited nonzero; nothing was delivered.
    Unavailable,
}

/// Invocation of an external diagnostic tool.
///
/// The argument vector is built as: fixed arguments, then `key=value`
/// filters, then the output-format flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    program: String,
    args: Vec<String>,
    filters: Vec<(String, String)>,
    format: Vec<String>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            filters: Vec::new(),
            format: Vec::new(),
        }
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn filter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.push((key.into(), value.into()));
        self
    }

    /// Sets the output-format flag, e.g. `("-fmt", "ssv")`.
    pub fn format(mut self, flag: impl Into<String>, value: impl Into<String>) -> Self {
        self.format = vec![flag.into(), value.into()];
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Full argument vector passed to the program.
    pub fn argv(&self) -> Vec<String> {
        let mut argv = self.args.clone();
        argv.extend(self.filters.iter().map(|(k, v)| format!("{}={}", k, v)));
        argv.extend(self.format.iter().cloned());
        argv
    }

    /// Human-readable command line for logs and error messages.
    pub fn command_line(&self) -> String {
        let mut line = self.program.clone();
        for arg in self.argv() {
            line.push(' ');
            line.push_str(&arg);
        }
        line
    }
}

/// Shared entry point to every OS surface a collector reads.
pub struct SourceReader {
    fs: Arc<dyn FileSystem>,
    commands: Arc<dyn CommandRunner>,
    platform: Arc<dyn PlatformQuery>,
    /// Programs whose unavailability was already reported at `warn`.
    warned: Mutex<HashSet<String>>,
}

impl SourceReader {
    pub fn new(
        fs: Arc<dyn FileSystem>,
        commands: Arc<dyn CommandRunner>,
        platform: Arc<dyn PlatformQuery>,
    ) -> Self {
        Self {
            fs,
            commands,
            platform,
            warned: Mutex::new(HashSet::new()),
        }
    }

    /// Reader over the real host, without a platform query backend.
    pub fn real() -> Self {
        Self::new(
            Arc::new(RealFs::new()),
            Arc::new(RealCommand::new()),
            Arc::new(NoPlatformQuery),
        )
    }

    pub fn fs(&self) -> &dyn FileSystem {
        self.fs.as_ref()
    }

    /// Reads `path` and hands each line to `f`.
    ///
    /// A missing file yields `Ok(SourceStatus::Absent)`. Any other I/O error
    /// is returned as `CollectError::Io`. When `f` returns an error no more
    /// lines are delivered and the error is returned as `CollectError::Parse`.
    pub fn read_lines<F>(&self, path: &Path, mut f: F) -> Result<SourceStatus, CollectError>
    where
        F: FnMut(&str) -> Result<(), ParseError>,
    {
        let content = match self.fs.read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "source absent, skipping");
                return Ok(SourceStatus::Absent);
            }
            Err(source) => {
                return Err(CollectError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        for line in content.lines() {
            f(line).map_err(|e| CollectError::parse(path.display().to_string(), e))?;
        }
        Ok(SourceStatus::Read)
    }

    /// Drives `parser` over the file at `path`.
    ///
    /// `finish` runs only when the file was read completely. Row errors are
    /// drained into the returned vector so the caller can record them.
    pub fn parse_file<P: LineParser>(
        &self,
        path: &Path,
        parser: &mut P,
        out: &mut Emitter,
    ) -> Result<(SourceStatus, Vec<ParseError>), CollectError> {
        let status = self.read_lines(path, |line| parser.parse_line(line, out));
        let row_errors = parser.take_row_errors();
        let status = status?;
        if status == SourceStatus::Read {
            parser.finish(out);
        }
        Ok((status, row_errors))
    }

    /// Runs the command described by `spec` and hands each stdout line to `f`.
    ///
    /// A missing executable or a nonzero exit yields
    /// `Ok(SourceStatus::Unavailable)` and delivers nothing. The first such
    /// failure per program is logged at `warn`, later ones at `debug`.
    pub fn run_command<F>(&self, spec: &CommandSpec, mut f: F) -> Result<SourceStatus, CollectError>
    where
        F: FnMut(&str) -> Result<(), ParseError>,
    {
        let output = match self.commands.run(spec.program(), &spec.argv()) {
            Ok(output) => output,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                self.report_unavailable(spec, "executable not found");
                return Ok(SourceStatus::Unavailable);
            }
            Err(e) => {
                return Err(CollectError::Command {
                    program: spec.program().to_string(),
                    reason: e.to_string(),
                });
            }
        };

        if !output.success() {
            let reason = match output.status {
                Some(code) => format!("exit status {}", code),
                None => "terminated by signal".to_string(),
            };
            self.report_unavailable(spec, &reason);
            return Ok(SourceStatus::Unavailable);
        }

        for line in output.stdout.lines() {
            f(line).map_err(|e| CollectError::parse(spec.command_line(), e))?;
        }
        Ok(SourceStatus::Read)
    }

    fn report_unavailable(&self, spec: &CommandSpec, reason: &str) {
        let first = self
            .warned
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(spec.program().to_string());
        if first {
            warn!(command = %spec.command_line(), reason, "command unavailable, skipping");
        } else {
            debug!(command = %spec.command_line(), reason, "command unavailable, skipping");
        }
    }

    /// Calls `f` with the path and file name of every entry of `dir`, sorted
    /// by name.
    ///
    /// A missing directory yields `Ok(SourceStatus::Absent)`.
    pub fn for_each_entry<F>(&self, dir: &Path, mut f: F) -> Result<SourceStatus, CollectError>
    where
        F: FnMut(&Path, &str),
    {
        let mut entries: Vec<PathBuf> = match self.fs.read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %dir.display(), "directory absent, skipping");
                return Ok(SourceStatus::Absent);
            }
            Err(source) => {
                return Err(CollectError::Io {
                    path: dir.to_path_buf(),
                    source,
                });
            }
        };
        entries.sort();

        for entry in &entries {
            let Some(name) = entry.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            f(entry, name);
        }
        Ok(SourceStatus::Read)
    }

    /// Runs a platform management query.
    pub fn query(&self, class: &str, filter: Option<&str>) -> Result<Vec<QueryRow>, CollectError> {
        self.platform
            .query(class, filter)
            .map_err(|error| CollectError::Query {
                class: class.to_string(),
                error,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::mock::{MockCommand, MockFs, MockQuery};
    use crate::error::QueryError;

    fn reader(fs: MockFs, cmd: MockCommand) -> SourceReader {
        SourceReader::new(Arc::new(fs), Arc::new(cmd), Arc::new(MockQuery::new()))
    }

    #[test]
    fn test_command_spec_argv_order() {
        let spec = CommandSpec::new("omreport")
            .args(["storage", "pdisk"])
            .filter("controller", "0")
            .format("-fmt", "ssv");
        assert_eq!(spec.argv(), vec!["storage", "pdisk", "controller=0", "-fmt", "ssv"]);
        assert_eq!(spec.command_line(), "omreport storage pdisk controller=0 -fmt ssv");
    }

    #[test]
    fn test_read_lines_delivers_in_order() {
        let mut fs = MockFs::new();
        fs.add_file("/proc/loadavg", "a\nb\n");
        let r = reader(fs, MockCommand::new());

        let mut lines = Vec::new();
        let status = r
            .read_lines(Path::new("/proc/loadavg"), |l| {
                lines.push(l.to_string());
                Ok(())
            })
            .unwrap();
        assert_eq!(status, SourceStatus::Read);
        assert_eq!(lines, vec!["a", "b"]);
    }

    #[test]
    fn test_read_lines_missing_is_absent() {
        let r = reader(MockFs::new(), MockCommand::new());
        let status = r.read_lines(Path::new("/proc/net/sockstat"), |_| Ok(())).unwrap();
        assert_eq!(status, SourceStatus::Absent);
    }

    #[test]
    fn test_read_lines_permission_is_error() {
        let mut fs = MockFs::new();
        fs.fail_with("/proc/net/snmp", io::ErrorKind::PermissionDenied);
        let r = reader(fs, MockCommand::new());

        let err = r.read_lines(Path::new("/proc/net/snmp"), |_| Ok(())).unwrap_err();
        assert!(matches!(err, CollectError::Io { .. }));
    }

    #[test]
    fn test_read_lines_stops_on_fatal() {
        let mut fs = MockFs::new();
        fs.add_file("/proc/interrupts", "1\nbad\n3\n");
        let r = reader(fs, MockCommand::new());

        let mut seen = 0;
        let err = r
            .read_lines(Path::new("/proc/interrupts"), |l| {
                seen += 1;
                if l == "bad" {
                    Err(ParseError::new("unexpected value"))
                } else {
                    Ok(())
                }
            })
            .unwrap_err();
        assert_eq!(seen, 2);
        match err {
            CollectError::Parse { source_name, .. } => assert_eq!(source_name, "/proc/interrupts"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_run_command() {
        let mut cmd = MockCommand::new();
        cmd.add_output("omreport chassis -fmt ssv", "SEVERITY;COMPONENT\nOk;Fans\n");
        let r = reader(MockFs::new(), cmd);

        let spec = CommandSpec::new("omreport").args(["chassis"]).format("-fmt", "ssv");
        let mut lines = Vec::new();
        let status = r
            .run_command(&spec, |l| {
                lines.push(l.to_string());
                Ok(())
            })
            .unwrap();
        assert_eq!(status, SourceStatus::Read);
        assert_eq!(lines.len(), 2);
    }

    #[test]
    fn test_run_command_missing_or_failing_is_unavailable() {
        let mut cmd = MockCommand::new();
        cmd.add_failure("omreport chassis -fmt ssv", 255, "Ok;Fans\n");
        let r = reader(MockFs::new(), cmd);

        let spec = CommandSpec::new("omreport").args(["chassis"]).format("-fmt", "ssv");
        let mut delivered = 0;
        for _ in 0..2 {
            let status = r
                .run_command(&spec, |_| {
                    delivered += 1;
                    Ok(())
                })
                .unwrap();
            assert_eq!(status, SourceStatus::Unavailable);
        }
        assert_eq!(delivered, 0);

        let missing = CommandSpec::new("omreport").args(["system"]).format("-fmt", "ssv");
        assert_eq!(
            r.run_command(&missing, |_| Ok(())).unwrap(),
            SourceStatus::Unavailable
        );
    }

    #[test]
    fn test_for_each_entry_sorted() {
        let mut fs = MockFs::new();
        fs.add_file("/proc/net/bonding/bond1", "");
        fs.add_file("/proc/net/bonding/bond0", "");
        let r = reader(fs, MockCommand::new());

        let mut names = Vec::new();
        let status = r
            .for_each_entry(Path::new("/proc/net/bonding"), |_, name| names.push(name.to_string()))
            .unwrap();
        assert_eq!(status, SourceStatus::Read);
        assert_eq!(names, vec!["bond0", "bond1"]);

        let status = r
            .for_each_entry(Path::new("/sys/class/none"), |_, _| panic!("no entries"))
            .unwrap();
        assert_eq!(status, SourceStatus::Absent);
    }

    #[test]
    fn test_query_error_is_wrapped() {
        let mut q = MockQuery::new();
        q.add_error("Win32_BIOS", None, QueryError::Failed("access denied".into()));
        let r = SourceReader::new(Arc::new(MockFs::new()), Arc::new(MockCommand::new()), Arc::new(q));

        match r.query("Win32_BIOS", None).unwrap_err() {
            CollectError::Query { class, .. } => assert_eq!(class, "Win32_BIOS"),
            other => panic!("unexpected {:?}", other),
        }
    }
}
