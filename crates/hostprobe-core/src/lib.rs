//! hostprobe-core: data-collection core of the hostprobe agent.
//!
//! Provides:
//! - `collector`: source readers (files, commands, platform queries), line
//!   grammars and the concrete collectors built on them
//! - `metric`: canonical metric model, tag sets and the metric emitter
//! - `metadata`: process-wide store for descriptive, low-churn facts
//! - `scheduler`: collector registry and per-collector interval execution
//! - `error`: error types shared by all of the above

pub mod collector;
pub mod error;
pub mod metadata;
pub mod metric;
pub mod scheduler;

/// Short git SHA of the build, embedded by `build.rs`.
pub const BUILD_SHA: &str = env!("GIT_SHA");
