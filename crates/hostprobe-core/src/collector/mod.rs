//! Host telemetry collectors.
//!
//! This module provides the source readers every collector reads through,
//! the line grammars that turn raw text into field tuples, and the concrete
//! collectors built on them.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                          Collectors                          │
//! │  ┌──────────────┐  ┌────────────────┐  ┌──────────────────┐  │
//! │  │   procfs     │  │   omreport     │  │    platform      │  │
//! │  │ procstats    │  │ 13 hw health   │  │ inventory        │  │
//! │  │ iostat       │  │ tables         │  │ metadata         │  │
//! │  └──────┬───────┘  └───────┬────────┘  └────────┬─────────┘  │
//! │         │    LineParser    │                    │            │
//! │         └─────────┬────────┘                    │            │
//! │            ┌──────▼───────────────────────────────▼──────┐   │
//! │            │               SourceReader                  │   │
//! │            └──────┬─────────────┬─────────────────┬──────┘   │
//! └───────────────────┼─────────────┼─────────────────┼──────────┘
//!              ┌──────▼─────┐ ┌─────▼─────────┐ ┌─────▼─────────┐
//!              │ FileSystem │ │ CommandRunner │ │ PlatformQuery │ (traits)
//!              └──────┬─────┘ └─────┬─────────┘ └─────┬─────────┘
//!          RealFs / MockFs   RealCommand /       MockQuery /
//!                            MockCommand         external binding
//! ```
//!
//! # Testing (with MockFs)
//!
//! ```
//! use std::sync::Arc;
//! use hostprobe_core::collector::{MockCommand, MockFs, MockQuery, SourceReader};
//! use hostprobe_core::collector::procfs::collect_procstats;
//! use hostprobe_core::metadata::MetadataStore;
//! use hostprobe_core::scheduler::CollectContext;
//!
//! let sources = SourceReader::new(
//!     Arc::new(MockFs::typical_host()),
//!     Arc::new(MockCommand::new()),
//!     Arc::new(MockQuery::new()),
//! );
//! let ctx = CollectContext::new(Arc::new(sources), Arc::new(MetadataStore::new()));
//! let result = collect_procstats(&ctx);
//! assert!(!result.points.is_empty());
//! ```

pub mod grammar;
pub mod mock;
pub mod omreport;
pub mod platform;
pub mod procfs;
pub mod source;
pub mod traits;

pub use grammar::LineParser;
pub use mock::{MockCommand, MockFs, MockQuery};
pub use source::{CommandSpec, SourceReader, SourceStatus};
pub use traits::{
    CommandOutput, CommandRunner, FileSystem, NoPlatformQuery, PlatformQuery, QueryRow,
    RealCommand, RealFs,
};

use crate::scheduler::Factory;

/// Collector families registered on every host.
pub const DEFAULT_FACTORIES: &[Factory] = &[procfs::register, omreport::register];

/// Collector families that need a platform query backend.
pub const PLATFORM_FACTORIES: &[Factory] = &[platform::register];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::Registry;

    #[test]
    fn test_default_factories() {
        let mut registry = Registry::new();
        registry.register_all(DEFAULT_FACTORIES);

        assert_eq!(registry.len(), 15);
        assert_eq!(registry.get("procstats").unwrap().interval(), None);
        assert_eq!(
            registry.get("omreport_chassis").unwrap().interval(),
            Some(Registry::DEFAULT_HW_INTERVAL)
        );
        assert!(registry.get("platform_metadata").is_none());
    }
}
