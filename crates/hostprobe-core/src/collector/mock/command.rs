//! Scripted command runner and platform query backend for tests.

use std::collections::HashMap;
use std::io;
use std::sync::{Mutex, PoisonError};

use crate::collector::traits::{CommandOutput, CommandRunner, PlatformQuery, QueryRow};
use crate::error::QueryError;

/// Command runner answering from a table of canned outputs.
///
/// Invocations are keyed by the full command line (`program arg1 arg2 ...`).
/// Unknown command lines behave like a missing executable. Every call is
/// recorded so tests can assert on the exact arguments.
#[derive(Debug, Default)]
pub struct MockCommand {
    outputs: HashMap<String, CommandOutput>,
    calls: Mutex<Vec<String>>,
}

impl MockCommand {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a successful invocation.
    pub fn add_output(&mut self, command_line: &str, stdout: impl Into<String>) {
        self.outputs.insert(
            command_line.to_string(),
            CommandOutput {
                status: Some(0),
                stdout: stdout.into(),
            },
        );
    }

    /// Registers an invocation that exits with `status`.
    pub fn add_failure(&mut self, command_line: &str, status: i32, stdout: impl Into<String>) {
        self.outputs.insert(
            command_line.to_string(),
            CommandOutput {
                status: Some(status),
                stdout: stdout.into(),
            },
        );
    }

    /// Command lines seen so far, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl CommandRunner for MockCommand {
    fn run(&self, program: &str, args: &[String]) -> io::Result<CommandOutput> {
        let mut line = program.to_string();
        for arg in args {
            line.push(' ');
            line.push_str(arg);
        }
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(line.clone());

        self.outputs.get(&line).cloned().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("no such command: {}", program),
            )
        })
    }
}

/// Platform query backend answering from canned rows per `(class, filter)`.
#[derive(Debug, Default)]
pub struct MockQuery {
    rows: HashMap<(String, Option<String>), Result<Vec<QueryRow>, QueryError>>,
}

impl MockQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_rows(&mut self, class: &str, filter: Option<&str>, rows: Vec<QueryRow>) {
        self.rows.insert(
            (class.to_string(), filter.map(String::from)),
            Ok(rows),
        );
    }

    pub fn add_error(&mut self, class: &str, filter: Option<&str>, error: QueryError) {
        self.rows
            .insert((class.to_string(), filter.map(String::from)), Err(error));
    }
}

impl PlatformQuery for MockQuery {
    fn query(&self, class: &str, filter: Option<&str>) -> Result<Vec<QueryRow>, QueryError> {
        self.rows
            .get(&(class.to_string(), filter.map(String::from)))
            .cloned()
            .unwrap_or_else(|| Err(QueryError::Failed(format!("invalid class {}", class))))
    }
}

/// Builds a [`QueryRow`] from `(field, value)` pairs.
pub fn query_row<I, V>(fields: I) -> QueryRow
where
    I: IntoIterator<Item = (&'static str, V)>,
    V: Into<crate::metadata::MetaValue>,
{
    fields
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.into()))
        .collect()
}
