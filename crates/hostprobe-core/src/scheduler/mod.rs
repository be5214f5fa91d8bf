//! Per-collector interval execution.
//!
//! Every registered collector gets its own OS thread, so a collector blocked
//! on a slow command only delays itself. Within a thread invocations are
//! strictly sequential; when a run overruns its interval the missed ticks
//! are dropped rather than queued. A panicking collector is caught, reported
//! as an error result, and runs again on its next tick.
//!
//! ```text
//!   Registry ──► Scheduler ──► thread per collector ──► CollectorFn
//!                    │                                      │
//!                    │            CollectorResult ◄─────────┘
//!                    ▼
//!               MetricSink ◄── metadata flush thread ◄── MetadataStore
//! ```

mod context;
mod registry;

pub use context::CollectContext;
pub use registry::{CollectorDescriptor, CollectorFn, Factory, Registry};

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use crate::error::CollectError;
use crate::metadata::MetadataRecord;
use crate::metric::{CollectorResult, MetricPoint};

/// Longest uninterrupted sleep; bounds how long shutdown takes to notice.
const SLEEP_SLICE: Duration = Duration::from_millis(100);

/// Outbound delivery of collected data.
///
/// Implementations own transport, batching and retry; the scheduler only
/// hands data over.
pub trait MetricSink: Send + Sync {
    fn send_points(&self, collector: &str, points: Vec<MetricPoint>);
    fn send_metadata(&self, records: Vec<MetadataRecord>);
}

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Interval of collectors that don't declare their own.
    pub default_interval: Duration,
    /// How often the metadata store is flushed to the sink.
    pub metadata_interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            default_interval: Duration::from_secs(15),
            metadata_interval: Registry::DEFAULT_METADATA_INTERVAL,
        }
    }
}

pub struct Scheduler {
    registry: Registry,
    ctx: Arc<CollectContext>,
    sink: Arc<dyn MetricSink>,
    config: SchedulerConfig,
    stop: Arc<AtomicBool>,
}

impl Scheduler {
    pub fn new(
        registry: Registry,
        ctx: CollectContext,
        sink: Arc<dyn MetricSink>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            registry,
            ctx: Arc::new(ctx),
            sink,
            config,
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Flag that stops every loop once set to `true`.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Effective interval of `descriptor`.
    pub fn interval_of(&self, descriptor: &CollectorDescriptor) -> Duration {
        descriptor.interval().unwrap_or(self.config.default_interval)
    }

    /// Runs one collector synchronously and forwards its points.
    ///
    /// Returns `false` when no collector is registered under `name`.
    pub fn run_once(&self, name: &str) -> bool {
        match self.registry.get(name) {
            Some(descriptor) => {
                execute(descriptor, &self.ctx, self.sink.as_ref());
                true
            }
            None => false,
        }
    }

    /// Runs every registered collector once, in registration order, then
    /// flushes metadata.
    pub fn run_all_once(&self) {
        for descriptor in self.registry.iter() {
            execute(descriptor, &self.ctx, self.sink.as_ref());
        }
        self.flush_metadata();
    }

    /// Sends a snapshot of the metadata store, if it holds anything.
    pub fn flush_metadata(&self) {
        flush_metadata(&self.ctx, self.sink.as_ref());
    }

    /// Starts one thread per collector plus the metadata flusher and blocks
    /// until the stop flag is set and every thread has returned.
    pub fn run(self) {
        let mut handles = Vec::with_capacity(self.registry.len() + 1);

        for descriptor in self.registry.iter() {
            let interval = self.interval_of(descriptor);
            info!(
                collector = descriptor.name(),
                interval_secs = interval.as_secs_f64(),
                "starting collector"
            );
            let descriptor = descriptor.clone();
            let ctx = Arc::clone(&self.ctx);
            let sink = Arc::clone(&self.sink);
            let stop = Arc::clone(&self.stop);
            let spawned = thread::Builder::new()
                .name(format!("collector-{}", descriptor.name()))
                .spawn(move || collector_loop(&descriptor, interval, &ctx, sink.as_ref(), &stop));
            match spawned {
                Ok(handle) => handles.push(handle),
                Err(e) => error!(error = %e, "failed to spawn collector thread"),
            }
        }

        let ctx = Arc::clone(&self.ctx);
        let sink = Arc::clone(&self.sink);
        let stop = Arc::clone(&self.stop);
        let interval = self.config.metadata_interval;
        let spawned = thread::Builder::new()
            .name("metadata-flush".to_string())
            .spawn(move || metadata_loop(interval, &ctx, sink.as_ref(), &stop));
        match spawned {
            Ok(handle) => handles.push(handle),
            Err(e) => error!(error = %e, "failed to spawn metadata thread"),
        }

        for handle in handles {
            if handle.join().is_err() {
                error!("scheduler thread panicked");
            }
        }
        info!("scheduler stopped");
    }
}

/// Computes the deadline following `deadline`.
///
/// When `now` is already past one or more later ticks those ticks are
/// skipped; the returned count says how many.
pub fn next_deadline(deadline: Instant, interval: Duration, now: Instant) -> (Instant, u32) {
    if interval.is_zero() {
        return (now, 0);
    }
    let next = deadline + interval;
    if next > now {
        return (next, 0);
    }
    let behind = now.duration_since(next).as_nanos();
    let missed = u32::try_from(behind / interval.as_nanos() + 1).unwrap_or(u32::MAX);
    (next + interval * missed, missed)
}

/// Runs `descriptor` with panic protection.
pub fn run_guarded(descriptor: &CollectorDescriptor, ctx: &CollectContext) -> CollectorResult {
    match panic::catch_unwind(AssertUnwindSafe(|| descriptor.collect(ctx))) {
        Ok(result) => result,
        Err(payload) => CollectorResult::new(
            Vec::new(),
            Some(CollectError::Panicked(panic_message(payload.as_ref()))),
        ),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

fn execute(descriptor: &CollectorDescriptor, ctx: &CollectContext, sink: &dyn MetricSink) {
    let started = Instant::now();
    let result = run_guarded(descriptor, ctx);

    if let Some(err) = &result.error {
        error!(collector = descriptor.name(), error = %err, "collector error");
    }
    debug!(
        collector = descriptor.name(),
        points = result.points.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "collector finished"
    );
    if !result.points.is_empty() {
        sink.send_points(descriptor.name(), result.points);
    }
}

fn flush_metadata(ctx: &CollectContext, sink: &dyn MetricSink) {
    let records = ctx.metadata().snapshot();
    if !records.is_empty() {
        debug!(records = records.len(), "flushing metadata");
        sink.send_metadata(records);
    }
}

/// Sleeps until `deadline` in short slices. Returns `false` if the stop flag
/// was raised first.
fn sleep_until(deadline: Instant, stop: &AtomicBool) -> bool {
    loop {
        if stop.load(Ordering::SeqCst) {
            return false;
        }
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        thread::sleep((deadline - now).min(SLEEP_SLICE));
    }
}

fn collector_loop(
    descriptor: &CollectorDescriptor,
    interval: Duration,
    ctx: &CollectContext,
    sink: &dyn MetricSink,
    stop: &AtomicBool,
) {
    let mut deadline = Instant::now();
    while !stop.load(Ordering::SeqCst) {
        execute(descriptor, ctx, sink);

        let (next, skipped) = next_deadline(deadline, interval, Instant::now());
        if skipped > 0 {
            warn!(
                collector = descriptor.name(),
                skipped, "collector overran its interval, skipping missed ticks"
            );
        }
        deadline = next;
        if !sleep_until(deadline, stop) {
            break;
        }
    }
    debug!(collector = descriptor.name(), "collector stopped");
}

fn metadata_loop(interval: Duration, ctx: &CollectContext, sink: &dyn MetricSink, stop: &AtomicBool) {
    let mut deadline = Instant::now() + interval;
    while sleep_until(deadline, stop) {
        flush_metadata(ctx, sink);
        deadline = next_deadline(deadline, interval, Instant::now()).0;
    }
    // final flush on stop
    flush_metadata(ctx, sink);
}
