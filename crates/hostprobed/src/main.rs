//! hostprobed - host telemetry collector daemon.
//!
//! Runs the hostprobe collectors on their intervals and writes every metric
//! point and metadata snapshot to stdout as JSON lines.

use tikv_jemallocator::Jemalloc;
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use clap::Parser;
use serde::Serialize;
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use hostprobe_core::BUILD_SHA;
use hostprobe_core::collector::{DEFAULT_FACTORIES, FileSystem, SourceReader};
use hostprobe_core::metadata::{MetadataRecord, MetadataStore};
use hostprobe_core::metric::{MetricPoint, TagSet};
use hostprobe_core::scheduler::{CollectContext, MetricSink, Registry, Scheduler, SchedulerConfig};

/// Host telemetry collector daemon.
#[derive(Parser, Debug)]
#[command(name = "hostprobed", about = "Host telemetry collector daemon", version)]
struct Args {
    /// Default collection interval in seconds.
    #[arg(short, long, default_value = "15")]
    interval: u64,

    /// Interval of hardware health collectors in seconds.
    #[arg(long, default_value = "300")]
    hw_interval: u64,

    /// Interval of inventory metadata collection and flushing in seconds.
    #[arg(long, default_value = "3600")]
    metadata_interval: u64,

    /// Path to /proc filesystem (for testing/mocking).
    #[arg(long, default_value = "/proc")]
    proc_path: String,

    /// Host name tag. Defaults to the kernel host name.
    #[arg(long)]
    hostname: Option<String>,

    /// Extra tag added to every point (repeatable), e.g. --tag dc=ams1.
    #[arg(long = "tag", value_name = "KEY=VALUE", value_parser = parse_tag)]
    tags: Vec<(String, String)>,

    /// Only run these collectors (comma-separated names).
    #[arg(long, value_delimiter = ',')]
    only: Vec<String>,

    /// Run every collector once, print the results and exit.
    #[arg(long)]
    once: bool,

    /// List registered collectors and exit.
    #[arg(long)]
    list: bool,

    /// Increase logging verbosity (-v for debug, -vv for trace). Default is info level.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode - only show errors.
    #[arg(short, long)]
    quiet: bool,
}

/// Parses a `key=value` tag argument.
fn parse_tag(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got {:?}", s))?;
    let (key, value) = (key.trim(), value.trim());
    if key.is_empty() || value.is_empty() {
        return Err(format!("empty key or value in {:?}", s));
    }
    Ok((key.to_string(), value.to_string()))
}

/// Initializes the tracing subscriber with the appropriate log level.
/// Default level is INFO. Use -q for quiet mode (errors only).
fn init_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        Level::ERROR
    } else {
        match verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };

    let mut filter = EnvFilter::from_default_env();
    for target in ["hostprobed", "hostprobe_core"] {
        if let Ok(directive) = format!("{}={}", target, level).parse() {
            filter = filter.add_directive(directive);
        }
    }

    // Logs go to stderr; stdout carries the data.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

/// Host name from `<proc>/sys/kernel/hostname`, or `"unknown"`.
fn resolve_hostname(fs: &dyn FileSystem, proc_path: &Path, configured: Option<&str>) -> String {
    if let Some(name) = configured {
        return name.to_string();
    }
    match fs.read_to_string(&proc_path.join("sys/kernel/hostname")) {
        Ok(name) if !name.trim().is_empty() => name.trim().to_string(),
        Ok(_) => "unknown".to_string(),
        Err(e) => {
            warn!("Cannot read host name ({}), using \"unknown\"", e);
            "unknown".to_string()
        }
    }
}

/// One line of output.
#[derive(Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
enum OutputLine<'a> {
    Metric(&'a MetricPoint),
    Metadata(&'a MetadataRecord),
}

/// Writes metric points and metadata records as JSON lines.
struct JsonLinesSink<W: Write + Send> {
    out: Mutex<W>,
}

impl<W: Write + Send> JsonLinesSink<W> {
    fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    fn write_lines<'a>(&self, lines: impl Iterator<Item = OutputLine<'a>>) {
        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        for line in lines {
            let written = serde_json::to_string(&line)
                .map_err(io::Error::other)
                .and_then(|json| writeln!(out, "{}", json));
            if let Err(e) = written {
                error!("Failed to write output: {}", e);
                return;
            }
        }
        if let Err(e) = out.flush() {
            error!("Failed to flush output: {}", e);
        }
    }
}

impl<W: Write + Send> MetricSink for JsonLinesSink<W> {
    fn send_points(&self, collector: &str, points: Vec<MetricPoint>) {
        debug!("{}: writing {} points", collector, points.len());
        self.write_lines(points.iter().map(OutputLine::Metric));
    }

    fn send_metadata(&self, records: Vec<MetadataRecord>) {
        self.write_lines(records.iter().map(OutputLine::Metadata));
    }
}

fn main() {
    let args = Args::parse();
    init_logging(args.verbose, args.quiet);

    info!(
        "hostprobed {} ({}) starting",
        env!("CARGO_PKG_VERSION"),
        BUILD_SHA
    );

    let proc_path = PathBuf::from(&args.proc_path);
    let sources = SourceReader::real();
    let hostname = resolve_hostname(sources.fs(), &proc_path, args.hostname.as_deref());
    let default_tags: TagSet = std::iter::once(("host".to_string(), hostname.clone()))
        .chain(args.tags.iter().cloned())
        .collect();
    info!("Host {}, default tags {}", hostname, default_tags);

    let ctx = CollectContext::new(Arc::new(sources), Arc::new(MetadataStore::new()))
        .with_default_tags(default_tags)
        .with_proc_path(proc_path);

    let mut registry = Registry::new()
        .with_hw_interval(Duration::from_secs(args.hw_interval))
        .with_metadata_interval(Duration::from_secs(args.metadata_interval));
    registry.register_all(DEFAULT_FACTORIES);

    if !args.only.is_empty() {
        for name in registry.retain_only(&args.only) {
            warn!("Unknown collector {:?} in --only", name);
        }
    }

    let config = SchedulerConfig {
        default_interval: Duration::from_secs(args.interval),
        metadata_interval: Duration::from_secs(args.metadata_interval),
    };
    let sink = Arc::new(JsonLinesSink::new(io::stdout()));
    let scheduler = Scheduler::new(registry, ctx, sink, config);

    if args.list {
        for descriptor in scheduler.registry().iter() {
            println!(
                "{}\t{}s",
                descriptor.name(),
                scheduler.interval_of(descriptor).as_secs()
            );
        }
        return;
    }

    if scheduler.registry().is_empty() {
        error!("No collectors selected, exiting");
        return;
    }

    if args.once {
        scheduler.run_all_once();
        return;
    }

    // Setup graceful shutdown
    let stop = scheduler.stop_handle();
    if let Err(e) = ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        stop.store(true, Ordering::SeqCst);
    }) {
        warn!("Failed to set Ctrl-C handler: {}", e);
    }

    info!("Starting {} collectors", scheduler.registry().len());
    scheduler.run();
    info!("Shutdown complete");
}

#[cfg(test)]
mod tests {
    use super::*;
    use hostprobe_core::collector::MockFs;
    use hostprobe_core::metric::{RateType, Unit};

    #[test]
    fn test_parse_tag_accepts_key_value() {
        assert_eq!(parse_tag("dc=ams1"), Ok(("dc".into(), "ams1".into())));
        assert!(parse_tag("dc").is_err());
        assert!(parse_tag("=ams1").is_err());
    }

    #[test]
    fn test_args_defaults_and_lists() {
        let args = Args::try_parse_from([
            "hostprobed",
            "--tag",
            "dc=ams1",
            "--tag",
            "rack=7",
            "--only",
            "procstats,iostat",
        ])
        .unwrap();
        assert_eq!(args.interval, 15);
        assert_eq!(args.hw_interval, 300);
        assert_eq!(args.metadata_interval, 3600);
        assert_eq!(args.proc_path, "/proc");
        assert_eq!(args.tags.len(), 2);
        assert_eq!(args.only, vec!["procstats", "iostat"]);
        assert!(!args.once);
    }

    #[test]
    fn test_hostname_resolution() {
        let mut fs = MockFs::new();
        fs.add_file("/proc/sys/kernel/hostname", "web1\n");
        assert_eq!(resolve_hostname(&fs, Path::new("/proc"), None), "web1");
        assert_eq!(resolve_hostname(&fs, Path::new("/proc"), Some("db2")), "db2");
        assert_eq!(resolve_hostname(&MockFs::new(), Path::new("/proc"), None), "unknown");
    }

    #[test]
    fn test_sink_writes_json_lines() {
        let sink = JsonLinesSink::new(Vec::new());
        let point = MetricPoint {
            name: "linux.loadavg_1_min".into(),
            timestamp: 1_700_000_000,
            value: 0.15,
            tags: TagSet::new().with("host", "web1"),
            rate_type: RateType::Gauge,
            unit: Unit::Load,
            description: None,
        };
        sink.send_points("procstats", vec![point.clone(), point]);

        let out = String::from_utf8(sink.out.into_inner().unwrap()).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 2);
        let json: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(json["kind"], "metric");
        assert_eq!(json["metric"], "linux.loadavg_1_min");
        assert_eq!(json["tags"]["host"], "web1");
        assert_eq!(json["rate_type"], "gauge");
    }
}
