//! Everything a collector invocation may touch.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;

use crate::collector::SourceReader;
use crate::metadata::MetadataStore;
use crate::metric::{Emitter, TagSet};

/// Shared, read-only context handed to every collector call.
///
/// Cloning is cheap; all heavy state sits behind `Arc`s.
#[derive(Clone)]
pub struct CollectContext {
    sources: Arc<SourceReader>,
    metadata: Arc<MetadataStore>,
    default_tags: TagSet,
    proc_path: PathBuf,
}

impl CollectContext {
    pub fn new(sources: Arc<SourceReader>, metadata: Arc<MetadataStore>) -> Self {
        Self {
            sources,
            metadata,
            default_tags: TagSet::new(),
            proc_path: PathBuf::from("/proc"),
        }
    }

    /// Tags merged into every point when absent (host identity plus
    /// configured extras).
    pub fn with_default_tags(mut self, tags: TagSet) -> Self {
        self.default_tags = tags;
        self
    }

    pub fn with_proc_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.proc_path = path.into();
        self
    }

    pub fn sources(&self) -> &SourceReader {
        &self.sources
    }

    pub fn metadata(&self) -> &MetadataStore {
        &self.metadata
    }

    pub fn default_tags(&self) -> &TagSet {
        &self.default_tags
    }

    pub fn proc_path(&self) -> &Path {
        &self.proc_path
    }

    /// Path of a file below the proc root, e.g. `proc_file("net/snmp")`.
    pub fn proc_file(&self, relative: &str) -> PathBuf {
        self.proc_path.join(relative)
    }

    /// Fresh emitter stamped with the current time.
    pub fn emitter(&self) -> Emitter {
        Emitter::new(self.default_tags.clone(), Utc::now().timestamp())
    }
}

#[cfg(test)]
impl CollectContext {
    /// Context over an in-memory `/proc` with no commands available.
    pub(crate) fn from_fs(fs: crate::collector::mock::MockFs) -> Self {
        Self::from_parts(fs, crate::collector::mock::MockCommand::new())
    }

    pub(crate) fn from_parts(
        fs: crate::collector::mock::MockFs,
        commands: crate::collector::mock::MockCommand,
    ) -> Self {
        let sources = SourceReader::new(
            Arc::new(fs),
            Arc::new(commands),
            Arc::new(crate::collector::traits::NoPlatformQuery),
        );
        Self::new(Arc::new(sources), Arc::new(MetadataStore::new()))
    }
}
