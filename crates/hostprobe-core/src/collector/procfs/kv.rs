//! Single-line key/value grammars: `/proc/uptime`, `/proc/meminfo`,
//! `/proc/vmstat`, `/proc/loadavg` and the entropy pool counter.
//!
//! Lines that don't match the expected pattern are ignored.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::collector::grammar::LineParser;
use crate::error::ParseError;
use crate::metric::{Emitter, RateType, TagSet, Unit};

static UPTIME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\S+)\s+(\S+)").expect("valid uptime regex"));
static MEMINFO_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\w+):\s+(\d+)\s+(\w+)").expect("valid meminfo regex"));
static VMSTAT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\w+)\s+(\d+)").expect("valid vmstat regex"));
static INOUT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(.*)(in|out)").expect("valid in/out regex"));
static LOADAVG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\S+)\s+(\S+)\s+(\S+)\s+(\d+)/(\d+)\s+").expect("valid loadavg regex")
});

const UPTIME_DESC: &str = "Seconds since the system booted.";
const MEM_FREE_DESC: &str = "Free memory, including buffers and page cache.";
const MEM_USED_DESC: &str = "Memory in use, excluding buffers and page cache.";
const ENTROPY_DESC: &str = "The remaining amount of entropy available to the system. \
     If it is low or hitting zero processes might be blocked waiting for entropy.";

/// `/proc/uptime`: seconds since boot and aggregate idle seconds.
#[derive(Debug, Default)]
pub struct UptimeParser;

impl LineParser for UptimeParser {
    fn parse_line(&mut self, line: &str, out: &mut Emitter) -> Result<(), ParseError> {
        let Some(caps) = UPTIME_RE.captures(line) else {
            return Ok(());
        };
        let none = TagSet::new();
        out.add_described("linux.uptime_total", &caps[1], &none, RateType::Gauge, Unit::Second, UPTIME_DESC);
        out.add("linux.uptime_now", &caps[2], &none, RateType::Gauge, Unit::Second);
        out.add_described("os.system.uptime", &caps[1], &none, RateType::Gauge, Unit::Second, UPTIME_DESC);
        Ok(())
    }
}

/// `/proc/meminfo`: one gauge per `Key: value kB` line.
///
/// Remembers the totals it has seen so `finish` can derive the portable
/// `os.mem.*` series.
#[derive(Debug, Default)]
pub struct MeminfoParser {
    values: HashMap<String, f64>,
}

impl MeminfoParser {
    fn value(&self, key: &str) -> f64 {
        self.values.get(key).copied().unwrap_or(0.0)
    }
}

impl LineParser for MeminfoParser {
    fn parse_line(&mut self, line: &str, out: &mut Emitter) -> Result<(), ParseError> {
        let Some(caps) = MEMINFO_RE.captures(line) else {
            return Ok(());
        };
        let key = &caps[1];
        let raw = &caps[2];
        if let Ok(v) = raw.parse::<f64>() {
            self.values.insert(key.to_string(), v);
        }
        out.add(
            &format!("linux.mem.{}", key.to_lowercase()),
            raw,
            &TagSet::new(),
            RateType::Gauge,
            Unit::KiloByte,
        );
        Ok(())
    }

    fn finish(&mut self, out: &mut Emitter) {
        let total = self.value("MemTotal");
        let free = self.value("MemFree");
        let reclaimable = free + self.value("Buffers") + self.value("Cached");
        let none = TagSet::new();

        out.add("os.mem.total", total * 1024.0, &none, RateType::Gauge, Unit::Byte);
        out.add_described("os.mem.free", free * 1024.0, &none, RateType::Gauge, Unit::Byte, MEM_FREE_DESC);
        out.add_described(
            "os.mem.used",
            (total - reclaimable) * 1024.0,
            &none,
            RateType::Gauge,
            Unit::Byte,
            MEM_USED_DESC,
        );
        if total != 0.0 {
            out.add_described(
                "os.mem.percent_free",
                reclaimable / total * 100.0,
                &none,
                RateType::Gauge,
                Unit::Percent,
                MEM_FREE_DESC,
            );
        }
    }
}

/// `/proc/vmstat`: kernel VM counters.
///
/// Paging and swapping counters are split into a base name and a
/// `direction` tag (`pgpgin` becomes `linux.mem.pgpg{direction=in}`).
#[derive(Debug, Default)]
pub struct VmstatParser;

impl LineParser for VmstatParser {
    fn parse_line(&mut self, line: &str, out: &mut Emitter) -> Result<(), ParseError> {
        let Some(caps) = VMSTAT_RE.captures(line) else {
            return Ok(());
        };
        let key = &caps[1];
        let value = &caps[2];

        match key {
            "pgpgin" | "pgpgout" | "pswpin" | "pswpout" | "pgfault" | "pgmajfault" => {
                match INOUT_RE.captures(key) {
                    Some(io) => {
                        let tags = TagSet::new().with("direction", &io[2]);
                        out.add(&format!("linux.mem.{}", &io[1]), value, &tags, RateType::Counter, Unit::Page);
                    }
                    None => {
                        out.add(&format!("linux.mem.{}", key), value, &TagSet::new(), RateType::Counter, Unit::Page);
                    }
                }
            }
            _ => {
                out.add(&format!("linux.mem.{}", key), value, &TagSet::new(), RateType::Counter, Unit::None);
            }
        }
        Ok(())
    }
}

/// `/proc/loadavg`: load averages plus runnable/total scheduling entities.
#[derive(Debug, Default)]
pub struct LoadavgParser;

impl LineParser for LoadavgParser {
    fn parse_line(&mut self, line: &str, out: &mut Emitter) -> Result<(), ParseError> {
        let Some(caps) = LOADAVG_RE.captures(line) else {
            return Ok(());
        };
        let none = TagSet::new();
        out.add("linux.loadavg_1_min", &caps[1], &none, RateType::Gauge, Unit::Load);
        out.add("linux.loadavg_5_min", &caps[2], &none, RateType::Gauge, Unit::Load);
        out.add("linux.loadavg_15_min", &caps[3], &none, RateType::Gauge, Unit::Load);
        out.add("linux.loadavg_runnable", &caps[4], &none, RateType::Gauge, Unit::Process);
        out.add("linux.loadavg_total_threads", &caps[5], &none, RateType::Gauge, Unit::Process);
        Ok(())
    }
}

/// `/proc/sys/kernel/random/entropy_avail`.
#[derive(Debug, Default)]
pub struct EntropyParser;

impl LineParser for EntropyParser {
    fn parse_line(&mut self, line: &str, out: &mut Emitter) -> Result<(), ParseError> {
        out.add_described(
            "linux.entropy_avail",
            line.trim(),
            &TagSet::new(),
            RateType::Gauge,
            Unit::Entropy,
            ENTROPY_DESC,
        );
        Ok(())
    }
}
