//! Grammar for `omreport -fmt ssv` output.
//!
//! The output is a semicolon-separated table preceded by banner lines and a
//! header row. Rather than tracking where the table starts, every line is
//! split and checked against the expected row shape; banners, headers and
//! blank lines never match it.

use crate::collector::grammar::{LineParser, clean};
use crate::error::ParseError;
use crate::metric::Emitter;

/// Splits one ssv line and collapses the whitespace of every field.
pub fn split_ssv(line: &str) -> Vec<String> {
    line.split(';').map(|f| clean(&[f])).collect()
}

/// Maps an OpenManage status to a severity: `0` for `Ok` and
/// `Non-Critical`, `1` for anything else.
pub fn severity(status: &str) -> u32 {
    match status {
        "Ok" | "Non-Critical" => 0,
        _ => 1,
    }
}

/// Parses the number in front of `suffix`; whitespace between the two is
/// allowed.
///
/// `extract("12.5 V", "V")` is `12.5`; `extract("12.5", "V")` is an error.
pub fn extract(s: &str, suffix: &str) -> Result<f64, ParseError> {
    let number = s
        .strip_suffix(suffix)
        .ok_or_else(|| ParseError::new(format!("extract: suffix {:?} not found in {:?}", suffix, s)))?;
    number
        .trim()
        .parse()
        .map_err(|_| ParseError::new(format!("extract: not a number: {:?}", number.trim())))
}

/// Parses a `<integer> <unit>` reading such as `3600 RPM` or `25 C`.
pub fn reading(s: &str, unit: &str) -> Option<i64> {
    let mut words = s.split_whitespace();
    let (Some(value), Some(found), None) = (words.next(), words.next(), words.next()) else {
        return None;
    };
    if found != unit {
        return None;
    }
    value.parse().ok()
}

/// Which rows of a table carry data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableShape {
    /// Exactly `fields` columns, first column not equal to `sentinel`.
    Exact {
        fields: usize,
        sentinel: Option<&'static str>,
    },
    /// At least `fields` columns, first column not equal to `sentinel`.
    AtLeast {
        fields: usize,
        sentinel: &'static str,
    },
    /// Exactly `fields` columns, first column an integer index.
    Indexed { fields: usize },
}

impl TableShape {
    pub fn accepts(&self, row: &[String]) -> bool {
        match *self {
            TableShape::Exact { fields, sentinel } => {
                row.len() == fields && sentinel.is_none_or(|s| row[0] != s)
            }
            TableShape::AtLeast { fields, sentinel } => row.len() >= fields && row[0] != sentinel,
            TableShape::Indexed { fields } => row.len() == fields && row[0].parse::<i64>().is_ok(),
        }
    }
}

/// Line grammar over one ssv table: rows matching `shape` are handed to
/// `on_row`, everything else is dropped.
pub struct SsvTable<F> {
    shape: TableShape,
    on_row: F,
}

impl<F> SsvTable<F>
where
    F: FnMut(&[String], &mut Emitter),
{
    pub fn new(shape: TableShape, on_row: F) -> Self {
        Self { shape, on_row }
    }
}

impl<F> LineParser for SsvTable<F>
where
    F: FnMut(&[String], &mut Emitter),
{
    fn parse_line(&mut self, line: &str, out: &mut Emitter) -> Result<(), ParseError> {
        let row = split_ssv(line);
        if self.shape.accepts(&row) {
            (self.on_row)(&row, out);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::grammar::parse_str;
    use crate::metric::{RateType, TagSet, Unit};

    fn row(fields: &[&str]) -> Vec<String> {
        fields.iter().map(|f| f.to_string()).collect()
    }

    #[test]
    fn test_split_ssv_cleans_fields() {
        assert_eq!(
            split_ssv("0;Ok;  System   Board Fan1 ;3600 RPM"),
            row(&["0", "Ok", "System Board Fan1", "3600 RPM"])
        );
        assert_eq!(split_ssv(""), row(&[""]));
    }

    #[test]
    fn test_severity() {
        assert_eq!(severity("Ok"), 0);
        assert_eq!(severity("Non-Critical"), 0);
        assert_eq!(severity("Critical"), 1);
        assert_eq!(severity("Unknown"), 1);
        assert_eq!(severity("ok"), 1);
        assert_eq!(severity(""), 1);
    }

    #[test]
    fn test_extract() {
        assert_eq!(extract("12.5 V", "V").unwrap(), 12.5);
        assert_eq!(extract("3.3V", "V").unwrap(), 3.3);
        assert!(extract("12.5", "V").is_err());
        assert!(extract("Unknown V", "V").is_err());
    }

    #[test]
    fn test_reading() {
        assert_eq!(reading("3600 RPM", "RPM"), Some(3600));
        assert_eq!(reading("25 C", "C"), Some(25));
        assert_eq!(reading("25.0 C", "C"), None);
        assert_eq!(reading("3600", "RPM"), None);
        assert_eq!(reading("3600 RPM extra", "RPM"), None);
        assert_eq!(reading("[N/A]", "C"), None);
    }

    #[test]
    fn test_shapes() {
        let severity_pair = TableShape::Exact { fields: 2, sentinel: Some("SEVERITY") };
        assert!(severity_pair.accepts(&row(&["Ok", "Fans"])));
        assert!(!severity_pair.accepts(&row(&["SEVERITY", "COMPONENT"])));
        assert!(!severity_pair.accepts(&row(&["Ok"])));

        let by_id = TableShape::AtLeast { fields: 3, sentinel: "ID" };
        assert!(by_id.accepts(&row(&["0:0:1", "Ok", "Online", "x"])));
        assert!(!by_id.accepts(&row(&["ID", "Status", "Name"])));
        assert!(!by_id.accepts(&row(&["0", "Ok"])));

        let indexed = TableShape::Indexed { fields: 5 };
        assert!(indexed.accepts(&row(&["0", "Ok", "DIMM_A1", "[Not Occupied]", "8192 MB"])));
        assert!(!indexed.accepts(&row(&["Index", "Status", "Connector Name", "Type", "Size"])));
        assert!(!indexed.accepts(&row(&["0", "Ok", "DIMM_A1", "8192 MB"])));
    }

    #[test]
    fn test_ssv_table_skips_banner_and_header() {
        let content = "\
Health

Main System Chassis

SEVERITY;COMPONENT
Ok;Fans
Critical;Intrusion
";
        let mut table = SsvTable::new(
            TableShape::Exact { fields: 2, sentinel: Some("SEVERITY") },
            |f: &[String], out: &mut Emitter| {
                let tags = TagSet::new().with("component", &f[1]);
                out.add("hw.chassis", severity(&f[0]), &tags, RateType::Gauge, Unit::Ok);
            },
        );
        let mut out = Emitter::new(TagSet::new(), 0);
        parse_str(&mut table, content, &mut out).unwrap();

        assert_eq!(out.len(), 2);
        assert_eq!(out.find("hw.chassis", &[("component", "Intrusion")]).unwrap().value, 1.0);
    }
}
