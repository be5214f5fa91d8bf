//! Network statistics grammars: the paired header/value blocks of
//! `/proc/net/netstat` and `/proc/net/snmp`, and `/proc/net/sockstat`.

use tracing::debug;

use crate::collector::grammar::LineParser;
use crate::error::ParseError;
use crate::metric::{Emitter, RateType, TagSet, Unit};

/// Which paired-block file is being parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockFlavor {
    /// `/proc/net/netstat`: roots end in `Ext:`, stats lose a `tcp` prefix.
    Netstat,
    /// `/proc/net/snmp`: roots end in `:`.
    Snmp,
}

impl BlockFlavor {
    fn root_suffix(self) -> &'static str {
        match self {
            BlockFlavor::Netstat => "Ext:",
            BlockFlavor::Snmp => ":",
        }
    }

    fn stat_name(self, header: &str) -> String {
        let lower = header.to_lowercase();
        match self {
            BlockFlavor::Netstat => lower.strip_prefix("tcp").unwrap_or(&lower).to_string(),
            BlockFlavor::Snmp => lower,
        }
    }

    fn rate_type(self, stat: &str) -> RateType {
        match self {
            BlockFlavor::Netstat => RateType::Gauge,
            BlockFlavor::Snmp if stat.starts_with("rto") => RateType::Gauge,
            BlockFlavor::Snmp => RateType::Counter,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum BlockState {
    AwaitHeader,
    AwaitValue { headers: Vec<String> },
    /// The header was rejected; its value row is consumed and dropped.
    SkipValue,
}

/// One completed header/value pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockRecord {
    /// Lowercased first header column without its suffix (`tcp`, `ip`).
    pub root: String,
    /// `(stat, value)` for every column after the first.
    pub fields: Vec<(String, String)>,
}

/// Paired header/value block grammar.
///
/// Lines alternate between a header row naming the columns and a value row
/// holding them. A value row with a different column count, or a header with
/// fewer than two columns, drops that block with a row error. Either way the
/// block's value row is consumed, so the following blocks stay paired.
#[derive(Debug)]
pub struct PairedBlockParser {
    flavor: BlockFlavor,
    state: BlockState,
    row_errors: Vec<ParseError>,
}

impl PairedBlockParser {
    pub fn new(flavor: BlockFlavor) -> Self {
        Self {
            flavor,
            state: BlockState::AwaitHeader,
            row_errors: Vec::new(),
        }
    }

    pub fn netstat() -> Self {
        Self::new(BlockFlavor::Netstat)
    }

    pub fn snmp() -> Self {
        Self::new(BlockFlavor::Snmp)
    }

    /// Advances the state machine by one line.
    ///
    /// Returns the completed record when `line` was a matching value row.
    pub fn step(&mut self, line: &str) -> Option<BlockRecord> {
        let cols: Vec<&str> = line.split_whitespace().collect();
        if cols.is_empty() {
            return None;
        }

        match std::mem::replace(&mut self.state, BlockState::AwaitHeader) {
            BlockState::AwaitHeader => {
                if cols.len() < 2 {
                    self.row_errors.push(ParseError::new(format!(
                        "header too short: {:?}",
                        line.trim()
                    )));
                    self.state = BlockState::SkipValue;
                    return None;
                }
                self.state = BlockState::AwaitValue {
                    headers: cols.iter().map(|c| c.to_string()).collect(),
                };
                None
            }
            BlockState::SkipValue => None,
            BlockState::AwaitValue { headers } => {
                if cols.len() != headers.len() {
                    self.row_errors.push(ParseError::new(format!(
                        "{}: {} values for {} headers",
                        headers[0],
                        cols.len(),
                        headers.len()
                    )));
                    return None;
                }
                let root = headers[0]
                    .strip_suffix(self.flavor.root_suffix())
                    .unwrap_or(&headers[0])
                    .to_lowercase();
                let fields = headers[1..]
                    .iter()
                    .zip(&cols[1..])
                    .map(|(h, v)| (self.flavor.stat_name(h), v.to_string()))
                    .collect();
                Some(BlockRecord { root, fields })
            }
        }
    }
}

impl LineParser for PairedBlockParser {
    fn parse_line(&mut self, line: &str, out: &mut Emitter) -> Result<(), ParseError> {
        let Some(record) = self.step(line) else {
            return Ok(());
        };
        let none = TagSet::new();
        for (stat, value) in &record.fields {
            let name = format!("linux.net.stat.{}.{}", record.root, stat);
            out.add(&name, value, &none, self.flavor.rate_type(stat), Unit::None);
        }
        Ok(())
    }

    fn take_row_errors(&mut self) -> Vec<ParseError> {
        std::mem::take(&mut self.row_errors)
    }
}

/// `/proc/net/sockstat`: socket usage per protocol.
///
/// Each keyword row has a minimum column count; a shorter row is recorded
/// as a row error and the remaining rows still parse.
#[derive(Debug, Default)]
pub struct SockstatParser {
    row_errors: Vec<ParseError>,
}

impl SockstatParser {
    /// Minimum column count and emitted `(column, metric, unit)` triples per
    /// row keyword.
    fn layout(keyword: &str) -> Option<(usize, &'static [(usize, &'static str, Unit)])> {
        let layout: (usize, &'static [(usize, &'static str, Unit)]) = match keyword {
            "sockets:" => (3, &[(2, "used", Unit::Socket)]),
            "TCP:" => (
                11,
                &[
                    (2, "tcp_in_use", Unit::Socket),
                    (4, "tcp_orphaned", Unit::Socket),
                    (6, "tcp_time_wait", Unit::Socket),
                    (8, "tcp_allocated", Unit::None),
                    (10, "tcp_mem", Unit::None),
                ],
            ),
            "UDP:" => (
                5,
                &[(2, "udp_in_use", Unit::Socket), (4, "udp_mem", Unit::Page)],
            ),
            "UDPLITE:" => (3, &[(2, "udplite_in_use", Unit::Socket)]),
            "RAW:" => (3, &[(2, "raw_in_use", Unit::Socket)]),
            "FRAG:" => (
                5,
                &[(2, "frag_in_use", Unit::Socket), (4, "frag_mem", Unit::Byte)],
            ),
            _ => return None,
        };
        Some(layout)
    }
}

impl LineParser for SockstatParser {
    fn parse_line(&mut self, line: &str, out: &mut Emitter) -> Result<(), ParseError> {
        let cols: Vec<&str> = line.split_whitespace().collect();
        let Some(keyword) = cols.first() else {
            return Ok(());
        };
        let Some((min_cols, columns)) = Self::layout(keyword) else {
            debug!(keyword, "sockstat: ignoring unknown row");
            return Ok(());
        };
        if cols.len() < min_cols {
            self.row_errors.push(ParseError::new(format!(
                "sockstat: {} row has {} columns, expected at least {}",
                keyword.trim_end_matches(':'),
                cols.len(),
                min_cols
            )));
            return Ok(());
        }

        let none = TagSet::new();
        for &(idx, metric, unit) in columns {
            out.add(
                &format!("linux.net.sockets.{}", metric),
                cols[idx],
                &none,
                RateType::Gauge,
                unit,
            );
        }
        Ok(())
    }

    fn take_row_errors(&mut self) -> Vec<ParseError> {
        std::mem::take(&mut self.row_errors)
    }
}
