//! Error types for collection and parsing.
//!
//! Nothing in here is ever fatal to the process: a `CollectError` travels back
//! to the scheduler next to whatever partial result the collector produced.

use std::io;
use std::path::PathBuf;

/// Error raised by a line grammar.
///
/// Depending on where it is returned it either drops a single row (row errors
/// collected by a parser) or stops the current source (returned from a line
/// callback).
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("parse error: {message}")]
pub struct ParseError {
    pub message: String,
}

impl ParseError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self {
            message: msg.into(),
        }
    }
}

/// Error returned by a [`PlatformQuery`](crate::collector::PlatformQuery) backend.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum QueryError {
    /// No platform binding is available on this host.
    #[error("platform queries are not supported on this host")]
    Unsupported,
    /// The backend rejected or failed the query.
    #[error("{0}")]
    Failed(String),
}

/// Collector-level error. Recorded, logged and forwarded; never propagated
/// out of the scheduler.
#[derive(Debug, thiserror::Error)]
pub enum CollectError {
    /// A pseudo-file or directory exists but could not be read.
    #[error("I/O error reading {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A grammar signalled a fatal error, or recorded row errors.
    #[error("{source_name}: {error}")]
    Parse {
        source_name: String,
        error: ParseError,
    },

    /// An external command could not be spawned for a reason other than
    /// the executable being absent.
    #[error("command {program} failed: {reason}")]
    Command { program: String, reason: String },

    /// A platform management query failed; its metadata group is skipped.
    #[error("query {class} failed: {error}")]
    Query { class: String, error: QueryError },

    /// The collector panicked; caught by the scheduler.
    #[error("collector panicked: {0}")]
    Panicked(String),

    /// Several errors from one collection pass.
    #[error("{} errors: {}", .0.len(), join_errors(.0))]
    Multiple(Vec<CollectError>),
}

impl CollectError {
    /// Wraps a parse error with the name of the source it came from.
    pub fn parse(source_name: impl Into<String>, error: ParseError) -> Self {
        CollectError::Parse {
            source_name: source_name.into(),
            error,
        }
    }
}

fn join_errors(errors: &[CollectError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Accumulates the errors of one collection pass.
///
/// Collectors push every non-fatal error here and call [`ErrorList::finish`]
/// to obtain the zero-or-one aggregated error of their result.
#[derive(Debug, Default)]
pub struct ErrorList {
    errors: Vec<CollectError>,
}

impl ErrorList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, error: CollectError) {
        self.errors.push(error);
    }

    /// Records the error of a `Result`, discarding the success value.
    pub fn record<T>(&mut self, result: Result<T, CollectError>) {
        if let Err(e) = result {
            self.push(e);
        }
    }

    /// Records row errors produced by a grammar for `source_name`.
    pub fn extend_parse(&mut self, source_name: &str, errors: Vec<ParseError>) {
        for error in errors {
            self.push(CollectError::parse(source_name, error));
        }
    }

    /// Moves every error of `other` into this list.
    pub fn append(&mut self, other: ErrorList) {
        self.errors.extend(other.errors);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Collapses the list: nothing, the single error, or `Multiple`.
    pub fn finish(mut self) -> Option<CollectError> {
        match self.errors.len() {
            0 => None,
            1 => self.errors.pop(),
            _ => Some(CollectError::Multiple(self.errors)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_list_empty() {
        assert!(ErrorList::new().finish().is_none());
    }

    #[test]
    fn test_error_list_single_is_unwrapped() {
        let mut errors = ErrorList::new();
        errors.push(CollectError::parse("netstat", ParseError::new("bad row")));
        match errors.finish() {
            Some(CollectError::Parse { source_name, error }) => {
                assert_eq!(source_name, "netstat");
                assert_eq!(error.message, "bad row");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_error_list_multiple() {
        let mut errors = ErrorList::new();
        errors.extend_parse(
            "sockstat",
            vec![ParseError::new("short TCP"), ParseError::new("short UDP")],
        );
        errors.record::<()>(Err(CollectError::Panicked("boom".into())));
        errors.record(Ok(42));
        assert_eq!(errors.len(), 3);

        let err = errors.finish().unwrap();
        let text = err.to_string();
        assert!(text.starts_with("3 errors"));
        assert!(text.contains("short UDP"));
        assert!(text.contains("boom"));
    }

    #[test]
    fn test_io_error_display() {
        let err = CollectError::Io {
            path: PathBuf::from("/proc/net/snmp"),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(err.to_string().contains("/proc/net/snmp"));
    }
}
