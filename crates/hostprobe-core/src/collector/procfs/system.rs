//! `procstats` collector: system-wide kernel statistics from `/proc`.

use crate::error::ErrorList;
use crate::metric::CollectorResult;
use crate::scheduler::CollectContext;

use super::bonding::BondingParser;
use super::kv::{EntropyParser, LoadavgParser, MeminfoParser, UptimeParser, VmstatParser};
use super::net::{PairedBlockParser, SockstatParser};
use super::stat::{InterruptsParser, StatParser};
use super::{parse_into, parse_into_path};

/// Reads every system-wide `/proc` source in a fixed order.
///
/// Each source is independent: an unreadable or malformed file is recorded
/// in the result's error and the remaining files are still collected.
pub fn collect_procstats(ctx: &CollectContext) -> CollectorResult {
    let mut out = ctx.emitter();
    let mut errors = ErrorList::new();

    parse_into(ctx, "uptime", &mut UptimeParser, &mut out, &mut errors);
    parse_into(ctx, "meminfo", &mut MeminfoParser::default(), &mut out, &mut errors);
    parse_into(ctx, "vmstat", &mut VmstatParser, &mut out, &mut errors);
    parse_into(ctx, "stat", &mut StatParser::default(), &mut out, &mut errors);
    parse_into(ctx, "loadavg", &mut LoadavgParser, &mut out, &mut errors);
    parse_into(ctx, "sys/kernel/random/entropy_avail", &mut EntropyParser, &mut out, &mut errors);
    parse_into(ctx, "interrupts", &mut InterruptsParser::default(), &mut out, &mut errors);
    parse_into(ctx, "net/sockstat", &mut SockstatParser::default(), &mut out, &mut errors);
    parse_into(ctx, "net/netstat", &mut PairedBlockParser::netstat(), &mut out, &mut errors);
    parse_into(ctx, "net/snmp", &mut PairedBlockParser::snmp(), &mut out, &mut errors);

    let listed = ctx
        .sources()
        .for_each_entry(&ctx.proc_file("net/bonding"), |path, bond| {
            let mut parser = BondingParser::new(bond);
            parse_into_path(ctx, path, &mut parser, &mut out, &mut errors);
        });
    errors.record(listed);

    CollectorResult::new(out.into_points(), errors.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::mock::MockFs;
    use crate::error::CollectError;
    use std::io;

    #[test]
    fn test_procstats_typical_host() {
        let ctx = CollectContext::from_fs(MockFs::typical_host());
        let result = collect_procstats(&ctx);

        assert!(result.error.is_none(), "{:?}", result.error);
        let find = |name: &str| result.points.iter().find(|p| p.name == name);
        assert!(find("linux.uptime_total").is_some());
        assert!(find("os.mem.percent_free").is_some());
        assert!(find("linux.mem.pgpg").is_some());
        assert!(find("os.cpu").is_some());
        assert!(find("linux.loadavg_1_min").is_some());
        assert!(find("linux.entropy_avail").is_some());
        assert!(find("linux.interrupts").is_some());
        assert!(find("linux.net.sockets.tcp_in_use").is_some());
        assert!(find("linux.net.stat.tcp.timeouts").is_some());
        assert!(find("linux.net.stat.tcp.rtomin").is_some());
        assert_eq!(find("linux.net.bond.slave.count").unwrap().value, 2.0);
    }

    #[test]
    fn test_procstats_missing_files_are_silent() {
        let mut fs = MockFs::new();
        fs.add_file("/proc/loadavg", "0.15 0.10 0.05 1/150 1234\n");
        let ctx = CollectContext::from_fs(fs);

        let result = collect_procstats(&ctx);
        assert!(result.error.is_none());
        assert_eq!(result.points.len(), 5);
    }

    #[test]
    fn test_procstats_partial_on_failures() {
        let mut fs = MockFs::typical_host();
        fs.fail_with("/proc/net/snmp", io::ErrorKind::PermissionDenied);
        fs.add_file("/proc/net/sockstat", "TCP: inuse 1\nUDP: inuse 4 mem 2\n");
        let ctx = CollectContext::from_fs(fs);

        let result = collect_procstats(&ctx);
        assert!(result.is_partial());
        match result.error.unwrap() {
            CollectError::Multiple(errors) => assert_eq!(errors.len(), 2),
            other => panic!("unexpected {:?}", other),
        }
        // everything else still collected
        assert!(result.points.iter().any(|p| p.name == "linux.net.sockets.udp_in_use"));
        assert!(result.points.iter().any(|p| p.name == "linux.net.bond.slave.is_up"));
    }
}
