//! Metric emitter: raw value + tags in, [`MetricPoint`] out.

use std::collections::HashSet;

use tracing::warn;

use super::{MetricPoint, RateType, TagSet, Unit};

/// A value as handed over by a parser: either already numeric or the text of
/// a field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RawValue<'a> {
    Number(f64),
    Text(&'a str),
}

impl RawValue<'_> {
    /// Parses the value. Text is trimmed before parsing.
    pub fn to_f64(&self) -> Option<f64> {
        match self {
            RawValue::Number(v) => Some(*v),
            RawValue::Text(s) => s.trim().parse().ok(),
        }
    }
}

impl From<f64> for RawValue<'_> {
    fn from(v: f64) -> Self {
        RawValue::Number(v)
    }
}

impl From<i64> for RawValue<'_> {
    fn from(v: i64) -> Self {
        RawValue::Number(v as f64)
    }
}

impl From<u64> for RawValue<'_> {
    fn from(v: u64) -> Self {
        RawValue::Number(v as f64)
    }
}

impl From<i32> for RawValue<'_> {
    fn from(v: i32) -> Self {
        RawValue::Number(v as f64)
    }
}

impl From<u32> for RawValue<'_> {
    fn from(v: u32) -> Self {
        RawValue::Number(v as f64)
    }
}

impl From<usize> for RawValue<'_> {
    fn from(v: usize) -> Self {
        RawValue::Number(v as f64)
    }
}

impl<'a> From<&'a str> for RawValue<'a> {
    fn from(s: &'a str) -> Self {
        RawValue::Text(s)
    }
}

impl<'a> From<&'a String> for RawValue<'a> {
    fn from(s: &'a String) -> Self {
        RawValue::Text(s.as_str())
    }
}

/// Collector-local output sequence.
///
/// Holds the process-wide default tags and the collection timestamp of the
/// current pass. Never shared between collectors.
#[derive(Debug)]
pub struct Emitter {
    defaults: TagSet,
    timestamp: i64,
    points: Vec<MetricPoint>,
    seen: HashSet<(String, TagSet)>,
}

impl Emitter {
    /// Creates an emitter for one pass.
    ///
    /// # Arguments
    /// * `defaults` - Tags merged into every point when absent (host identity)
    /// * `timestamp` - Collection time, unix seconds
    pub fn new(defaults: TagSet, timestamp: i64) -> Self {
        Self {
            defaults,
            timestamp,
            points: Vec::new(),
            seen: HashSet::new(),
        }
    }

    /// Adds a point without description. See [`Emitter::add_described`].
    pub fn add<'a>(
        &mut self,
        name: &str,
        value: impl Into<RawValue<'a>>,
        tags: &TagSet,
        rate_type: RateType,
        unit: Unit,
    ) -> bool {
        self.push(name, value.into(), tags, rate_type, unit, None)
    }

    /// Adds a point with a static description.
    ///
    /// Returns `false` when the value could not be parsed; the point is then
    /// omitted and no error is raised.
    pub fn add_described<'a>(
        &mut self,
        name: &str,
        value: impl Into<RawValue<'a>>,
        tags: &TagSet,
        rate_type: RateType,
        unit: Unit,
        description: &'static str,
    ) -> bool {
        self.push(name, value.into(), tags, rate_type, unit, Some(description))
    }

    fn push(
        &mut self,
        name: &str,
        value: RawValue<'_>,
        tags: &TagSet,
        rate_type: RateType,
        unit: Unit,
        description: Option<&'static str>,
    ) -> bool {
        let Some(value) = value.to_f64() else {
            return false;
        };

        let tags = tags.merge_defaults(&self.defaults);
        if !self.seen.insert((name.to_string(), tags.clone())) {
            warn!(metric = name, tags = %tags, "duplicate metric in one collection pass");
        }

        self.points.push(MetricPoint {
            name: name.to_string(),
            timestamp: self.timestamp,
            value,
            tags,
            rate_type,
            unit,
            description: description.filter(|d| !d.is_empty()),
        });
        true
    }

    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn points(&self) -> &[MetricPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Finds the first point with `name` whose tags contain every pair of
    /// `tags`. Mostly useful in tests.
    pub fn find(&self, name: &str, tags: &[(&str, &str)]) -> Option<&MetricPoint> {
        self.points.iter().find(|p| {
            p.name == name && tags.iter().all(|(k, v)| p.tags.get(k) == Some(*v))
        })
    }

    pub fn into_points(self) -> Vec<MetricPoint> {
        self.points
    }
}
