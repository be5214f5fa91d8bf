//! Explicit collector registry.
//!
//! Collectors are not self-registering: the binary passes a fixed list of
//! factory functions, each of which adds its descriptors to a [`Registry`].

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use crate::metric::CollectorResult;

use super::CollectContext;

/// A collector body. Must be callable from its own thread.
pub type CollectorFn = Arc<dyn Fn(&CollectContext) -> CollectorResult + Send + Sync>;

/// Adds one family of collectors to a registry.
pub type Factory = fn(&mut Registry);

/// A named collector and how often it runs.
#[derive(Clone)]
pub struct CollectorDescriptor {
    name: String,
    /// `None` means the scheduler's default interval.
    interval: Option<Duration>,
    func: CollectorFn,
}

impl CollectorDescriptor {
    pub fn new(name: impl Into<String>, interval: Option<Duration>, func: CollectorFn) -> Self {
        Self {
            name: name.into(),
            interval,
            func,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn interval(&self) -> Option<Duration> {
        self.interval
    }

    /// Invokes the collector body directly, without panic protection.
    pub fn collect(&self, ctx: &CollectContext) -> CollectorResult {
        (self.func)(ctx)
    }
}

impl fmt::Debug for CollectorDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollectorDescriptor")
            .field("name", &self.name)
            .field("interval", &self.interval)
            .finish_non_exhaustive()
    }
}

/// Ordered set of collector descriptors, unique by name.
#[derive(Debug)]
pub struct Registry {
    collectors: Vec<CollectorDescriptor>,
    hw_interval: Duration,
    metadata_interval: Duration,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    /// Interval of hardware health collectors unless configured otherwise.
    pub const DEFAULT_HW_INTERVAL: Duration = Duration::from_secs(5 * 60);
    /// Interval of inventory metadata collectors unless configured otherwise.
    pub const DEFAULT_METADATA_INTERVAL: Duration = Duration::from_secs(60 * 60);

    pub fn new() -> Self {
        Self {
            collectors: Vec::new(),
            hw_interval: Self::DEFAULT_HW_INTERVAL,
            metadata_interval: Self::DEFAULT_METADATA_INTERVAL,
        }
    }

    pub fn with_hw_interval(mut self, interval: Duration) -> Self {
        self.hw_interval = interval;
        self
    }

    pub fn with_metadata_interval(mut self, interval: Duration) -> Self {
        self.metadata_interval = interval;
        self
    }

    pub fn hw_interval(&self) -> Duration {
        self.hw_interval
    }

    pub fn metadata_interval(&self) -> Duration {
        self.metadata_interval
    }

    /// Runs every factory in order.
    pub fn register_all(&mut self, factories: &[Factory]) {
        for factory in factories {
            factory(self);
        }
    }

    /// Adds a descriptor. A second descriptor with an existing name is
    /// ignored.
    pub fn add(&mut self, descriptor: CollectorDescriptor) {
        if self.get(descriptor.name()).is_some() {
            warn!(collector = descriptor.name(), "duplicate collector name, ignoring");
            return;
        }
        self.collectors.push(descriptor);
    }

    pub fn get(&self, name: &str) -> Option<&CollectorDescriptor> {
        self.collectors.iter().find(|c| c.name() == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CollectorDescriptor> {
        self.collectors.iter()
    }

    pub fn names(&self) -> Vec<&str> {
        self.collectors.iter().map(|c| c.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.collectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.collectors.is_empty()
    }

    /// Keeps only the collectors named in `names`.
    ///
    /// Returns the requested names that matched nothing.
    pub fn retain_only<S: AsRef<str>>(&mut self, names: &[S]) -> Vec<String> {
        let wanted: Vec<&str> = names.iter().map(|n| n.as_ref()).collect();
        let unknown = wanted
            .iter()
            .filter(|n| self.get(n).is_none())
            .map(|n| n.to_string())
            .collect();
        self.collectors.retain(|c| wanted.contains(&c.name()));
        unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty(_: &CollectContext) -> CollectorResult {
        CollectorResult::default()
    }

    fn two_collectors(registry: &mut Registry) {
        registry.add(CollectorDescriptor::new("a", None, Arc::new(empty)));
        registry.add(CollectorDescriptor::new("b", Some(Duration::from_secs(1)), Arc::new(empty)));
    }

    #[test]
    fn test_register_all_keeps_order() {
        let mut registry = Registry::new();
        registry.register_all(&[two_collectors]);
        assert_eq!(registry.names(), vec!["a", "b"]);
        assert_eq!(registry.get("b").unwrap().interval(), Some(Duration::from_secs(1)));
    }

    #[test]
    fn test_duplicate_names_ignored() {
        let mut registry = Registry::new();
        registry.register_all(&[two_collectors, two_collectors]);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_retain_only() {
        let mut registry = Registry::new();
        registry.register_all(&[two_collectors]);
        let unknown = registry.retain_only(&["b", "zzz"]);
        assert_eq!(unknown, vec!["zzz".to_string()]);
        assert_eq!(registry.names(), vec!["b"]);
    }

    #[test]
    fn test_intervals() {
        let registry = Registry::new().with_hw_interval(Duration::from_secs(60));
        assert_eq!(registry.hw_interval(), Duration::from_secs(60));
        assert_eq!(registry.metadata_interval(), Registry::DEFAULT_METADATA_INTERVAL);
    }
}
