//! `/proc/diskstats` grammar and the `iostat` collector.

use tracing::debug;

use crate::collector::grammar::LineParser;
use crate::error::{ErrorList, ParseError};
use crate::metric::{CollectorResult, Emitter, RateType, TagSet, Unit};
use crate::scheduler::CollectContext;

use super::parse_into;

/// Counters of a whole-device row (14 columns), after major, minor, name.
pub const FIELDS_DISK: [&str; 11] = [
    "read_requests",       // reads completed successfully
    "read_merged",         // adjacent reads merged into one request
    "read_sectors",        // sectors read successfully
    "msec_read",           // ms spent by all reads
    "write_requests",      // writes completed successfully
    "write_merged",        // adjacent writes merged into one request
    "write_sectors",       // sectors written successfully
    "msec_write",          // ms spent by all writes
    "ios_in_progress",     // requests currently in flight
    "msec_total",          // ms during which ios_in_progress >= 1
    "msec_weighted_total", // recent I/O completion time and backlog
];

/// Counters of a partition row (7 columns) on older kernels.
pub const FIELDS_PART: [&str; 4] = ["read_issued", "read_sectors", "write_issued", "write_sectors"];

/// Parses `/proc/diskstats` rows.
///
/// Devices that never completed a read are skipped. Whole disks (minor
/// divisible by 16 on a real major) report under `linux.disk.`, everything
/// else under `linux.disk.part.`.
#[derive(Debug, Default)]
pub struct DiskstatsParser;

impl DiskstatsParser {
    fn prefix(major: &str, minor: &str) -> &'static str {
        let major: i64 = major.parse().unwrap_or(0);
        let minor: i64 = minor.parse().unwrap_or(0);
        if minor % 16 == 0 && major > 1 {
            "linux.disk."
        } else {
            "linux.disk.part."
        }
    }

    fn rate_type(field: &str) -> RateType {
        match field {
            "ios_in_progress" => RateType::Gauge,
            _ => RateType::Counter,
        }
    }
}

impl LineParser for DiskstatsParser {
    fn parse_line(&mut self, line: &str, out: &mut Emitter) -> Result<(), ParseError> {
        let values: Vec<&str> = line.split_whitespace().collect();
        if values.len() < 4 || values[3] == "0" {
            return Ok(());
        }

        let prefix = Self::prefix(values[0], values[1]);
        let tags = TagSet::new().with("dev", values[2]);

        match values.len() {
            14 => {
                let mut read_sectors = 0.0;
                let mut msec_read = 0.0;
                let mut write_sectors = 0.0;
                let mut msec_write = 0.0;
                for (field, raw) in FIELDS_DISK.iter().zip(&values[3..]) {
                    let parsed = raw.parse::<f64>().unwrap_or(0.0);
                    match *field {
                        "read_sectors" => read_sectors = parsed,
                        "msec_read" => msec_read = parsed,
                        "write_sectors" => write_sectors = parsed,
                        "msec_write" => msec_write = parsed,
                        _ => {}
                    }
                    out.add(&format!("{}{}", prefix, field), *raw, &tags, Self::rate_type(field), Unit::None);
                }
                if read_sectors != 0.0 && msec_read != 0.0 {
                    out.add(
                        &format!("{}time_per_read", prefix),
                        read_sectors / msec_read,
                        &tags,
                        RateType::Gauge,
                        Unit::None,
                    );
                }
                if write_sectors != 0.0 && msec_write != 0.0 {
                    out.add(
                        &format!("{}time_per_write", prefix),
                        write_sectors / msec_write,
                        &tags,
                        RateType::Gauge,
                        Unit::None,
                    );
                }
            }
            7 => {
                for (field, raw) in FIELDS_PART.iter().zip(&values[3..]) {
                    out.add(&format!("{}{}", prefix, field), *raw, &tags, RateType::Counter, Unit::None);
                }
            }
            n => {
                debug!(dev = values[2], columns = n, "diskstats: cannot parse row");
            }
        }
        Ok(())
    }
}

/// `iostat` collector: block device counters from `/proc/diskstats`.
pub fn collect_iostat(ctx: &CollectContext) -> CollectorResult {
    let mut out = ctx.emitter();
    let mut errors = ErrorList::new();
    parse_into(ctx, "diskstats", &mut DiskstatsParser, &mut out, &mut errors);
    CollectorResult::new(out.into_points(), errors.finish())
}
