//! Canonical metric model.
//!
//! Collectors never build [`MetricPoint`]s directly: they hand names, raw
//! values and tags to an [`Emitter`], which parses, tags and orders them.

mod emitter;
mod tags;

pub use emitter::{Emitter, RawValue};
pub use tags::{TagSet, sanitize};

use serde::Serialize;

use crate::error::CollectError;

/// Whether a value is an instantaneous reading or a monotonically increasing
/// counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RateType {
    Gauge,
    Counter,
}

/// Unit of a metric value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Unit {
    None,
    Byte,
    KiloByte,
    Percent,
    Second,
    Volt,
    Amp,
    DegreeC,
    Rpm,
    Count,
    /// Severity status: 0 is healthy, anything else is not.
    Ok,
    Bool,
    Page,
    CentiHertz,
    Interrupt,
    ContextSwitch,
    Process,
    Load,
    Entropy,
    Socket,
}

/// One time-series sample.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricPoint {
    #[serde(rename = "metric")]
    pub name: String,
    pub timestamp: i64,
    pub value: f64,
    pub tags: TagSet,
    pub rate_type: RateType,
    pub unit: Unit,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<&'static str>,
}

/// Output of one collector invocation.
///
/// Points are in emission order. `error` is set when the pass was partial;
/// the points gathered before or around the failure are still valid.
#[derive(Debug, Default)]
pub struct CollectorResult {
    pub points: Vec<MetricPoint>,
    pub error: Option<CollectError>,
}

impl CollectorResult {
    pub fn new(points: Vec<MetricPoint>, error: Option<CollectError>) -> Self {
        Self { points, error }
    }

    pub fn is_partial(&self) -> bool {
        self.error.is_some()
    }
}
