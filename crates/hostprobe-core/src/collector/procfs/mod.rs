//! Collectors for the Linux `/proc` filesystem.
//!
//! Grammars live in their own modules and never touch the filesystem; the
//! `procstats` and `iostat` collectors drive them through the context's
//! [`SourceReader`](crate::collector::SourceReader).

pub mod bonding;
pub mod diskstats;
pub mod kv;
pub mod net;
pub mod stat;
pub mod system;

use std::path::Path;
use std::sync::Arc;

use crate::collector::grammar::LineParser;
use crate::error::ErrorList;
use crate::metric::Emitter;
use crate::scheduler::{CollectContext, CollectorDescriptor, Registry};

pub use diskstats::collect_iostat;
pub use system::collect_procstats;

/// Registers `procstats` and `iostat` at the scheduler's default interval.
pub fn register(registry: &mut Registry) {
    registry.add(CollectorDescriptor::new("procstats", None, Arc::new(collect_procstats)));
    registry.add(CollectorDescriptor::new("iostat", None, Arc::new(collect_iostat)));
}

/// Parses `<proc>/<relative>` with `parser`, recording every error.
pub(crate) fn parse_into<P: LineParser>(
    ctx: &CollectContext,
    relative: &str,
    parser: &mut P,
    out: &mut Emitter,
    errors: &mut ErrorList,
) {
    parse_into_path(ctx, &ctx.proc_file(relative), parser, out, errors);
}

pub(crate) fn parse_into_path<P: LineParser>(
    ctx: &CollectContext,
    path: &Path,
    parser: &mut P,
    out: &mut Emitter,
    errors: &mut ErrorList,
) {
    match ctx.sources().parse_file(path, parser, out) {
        Ok((_, row_errors)) => errors.extend_parse(&path.display().to_string(), row_errors),
        Err(e) => errors.push(e),
    }
}
