//! Shared plumbing for line grammars.
//!
//! Every grammar is a small state machine fed one line at a time. Grammars
//! never perform I/O: the source reader drives them, and tests drive them
//! from string literals through [`parse_str`].

use crate::error::ParseError;
use crate::metric::Emitter;

/// A line-driven grammar.
pub trait LineParser {
    /// Consumes one line.
    ///
    /// Returning `Err` is a fatal signal: the reader stops feeding this
    /// source. Grammars that merely skip a bad row return `Ok(())` and keep
    /// the row error for [`LineParser::take_row_errors`].
    fn parse_line(&mut self, line: &str, out: &mut Emitter) -> Result<(), ParseError>;

    /// Called once after the last line of a source that was read completely.
    fn finish(&mut self, _out: &mut Emitter) {}

    /// Drains the non-fatal row errors recorded so far.
    fn take_row_errors(&mut self) -> Vec<ParseError> {
        Vec::new()
    }
}

/// Feeds every line of `content` into `parser` and finishes it.
///
/// Stops at the first fatal error; `finish` is not called in that case.
pub fn parse_str<P: LineParser + ?Sized>(
    parser: &mut P,
    content: &str,
    out: &mut Emitter,
) -> Result<(), ParseError> {
    for line in content.lines() {
        parser.parse_line(line, out)?;
    }
    parser.finish(out);
    Ok(())
}

/// Joins `parts` with single spaces and collapses every whitespace run.
///
/// `clean(&["  PowerEdge ", "R720"])` is `"PowerEdge R720"`.
pub fn clean(parts: &[&str]) -> String {
    parts
        .iter()
        .flat_map(|p| p.split_whitespace())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Returns true when `s` is non-empty and all ASCII digits.
pub fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

/// Returns true when `s` is non-empty and all ASCII letters or digits.
pub fn is_alnum(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_alphanumeric())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metric::{RateType, TagSet, Unit};

    struct Counter {
        seen: usize,
        finished: bool,
    }

    impl LineParser for Counter {
        fn parse_line(&mut self, line: &str, out: &mut Emitter) -> Result<(), ParseError> {
            if line == "stop" {
                return Err(ParseError::new("stop"));
            }
            self.seen += 1;
            out.add("lines", self.seen, &TagSet::new(), RateType::Gauge, Unit::Count);
            Ok(())
        }

        fn finish(&mut self, _out: &mut Emitter) {
            self.finished = true;
        }
    }

    #[test]
    fn test_parse_str_feeds_and_finishes() {
        let mut p = Counter { seen: 0, finished: false };
        let mut out = Emitter::new(TagSet::new(), 0);
        parse_str(&mut p, "a\nb\nc\n", &mut out).unwrap();
        assert_eq!(p.seen, 3);
        assert!(p.finished);
    }

    #[test]
    fn test_parse_str_stops_on_fatal() {
        let mut p = Counter { seen: 0, finished: false };
        let mut out = Emitter::new(TagSet::new(), 0);
        let err = parse_str(&mut p, "a\nstop\nc\n", &mut out).unwrap_err();
        assert_eq!(err.message, "stop");
        assert_eq!(p.seen, 1);
        assert!(!p.finished);
    }

    #[test]
    fn test_clean() {
        assert_eq!(clean(&["  Intel(R)   Xeon(R) ", "E5-2670"]), "Intel(R) Xeon(R) E5-2670");
        assert_eq!(clean(&["   "]), "");
        assert_eq!(clean(&[]), "");
    }

    #[test]
    fn test_is_digits_and_alnum() {
        assert!(is_digits("0123"));
        assert!(!is_digits(""));
        assert!(!is_digits("12a"));
        assert!(is_alnum("NMI"));
        assert!(is_alnum("42"));
        assert!(!is_alnum("PCI-MSI"));
    }
}
