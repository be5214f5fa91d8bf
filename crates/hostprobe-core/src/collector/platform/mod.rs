//! Host inventory metadata from the platform management query port.
//!
//! Two groups are collected independently: system identity (OS, vendor,
//! model, memory, BIOS serial) and physical network adapters. A failed query
//! aborts only its own group for this cycle. Nothing here produces metric
//! points; everything lands in the metadata store with `overwrite = true`.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::collector::traits::QueryRow;
use crate::error::{CollectError, ErrorList};
use crate::metadata::{MetaValue, MetadataStore};
use crate::metric::{CollectorResult, TagSet};
use crate::scheduler::{CollectContext, CollectorDescriptor, Registry};

pub const OPERATING_SYSTEM: &str = "Win32_OperatingSystem";
pub const COMPUTER_SYSTEM: &str = "Win32_ComputerSystem";
pub const BIOS: &str = "Win32_BIOS";
pub const ADAPTER_CONFIGURATION: &str = "Win32_NetworkAdapterConfiguration";
pub const NETWORK_ADAPTER: &str = "Win32_NetworkAdapter";

pub const CONFIGURED_ADAPTERS: &str = "WHERE MACAddress != null";
/// Excludes virtual adapters.
pub const PHYSICAL_ADAPTERS: &str = "WHERE PhysicalAdapter=True and MACAddress <> null";

/// Registers the inventory collector at the registry's metadata interval.
///
/// Only call this when the context carries a real platform query backend.
pub fn register(registry: &mut Registry) {
    let interval = Some(registry.metadata_interval());
    registry.add(CollectorDescriptor::new(
        "platform_metadata",
        interval,
        Arc::new(collect_platform_metadata),
    ));
}

pub fn collect_platform_metadata(ctx: &CollectContext) -> CollectorResult {
    let mut errors = ErrorList::new();
    errors.record(system_identity(ctx));
    errors.record(network_adapters(ctx));
    CollectorResult::new(Vec::new(), errors.finish())
}

fn put(meta: &MetadataStore, tags: &TagSet, key: &str, value: Option<&MetaValue>) {
    if let Some(value) = value {
        meta.add_meta("", tags, key, value.clone(), true);
    }
}

/// OS version and caption, vendor, model, memory size and BIOS serial.
///
/// All three queries must succeed before anything is recorded.
fn system_identity(ctx: &CollectContext) -> Result<(), CollectError> {
    let os = ctx.sources().query(OPERATING_SYSTEM, None)?;
    let computers = ctx.sources().query(COMPUTER_SYSTEM, None)?;
    let bios = ctx.sources().query(BIOS, None)?;

    let meta = ctx.metadata();
    let tags = ctx.default_tags();
    for row in &os {
        put(meta, tags, "version", row.get("Version"));
        put(meta, tags, "versionCaption", row.get("Caption"));
    }
    for row in &computers {
        put(meta, tags, "manufacturer", row.get("Manufacturer"));
        put(meta, tags, "model", row.get("Model"));
        put(meta, tags, "memoryTotal", row.get("TotalPhysicalMemory"));
    }
    for row in &bios {
        put(meta, tags, "serialNumber", row.get("SerialNumber"));
    }
    Ok(())
}

fn interface_index(row: &QueryRow) -> Option<u64> {
    row.get("InterfaceIndex").and_then(MetaValue::as_u64)
}

/// Description, connection name, MAC, link speed and IP addresses of every
/// physical adapter, tagged `iface=Interface<index>`.
fn network_adapters(ctx: &CollectContext) -> Result<(), CollectError> {
    let configs = ctx
        .sources()
        .query(ADAPTER_CONFIGURATION, Some(CONFIGURED_ADAPTERS))?;
    let configs_by_index: HashMap<u64, &QueryRow> = configs
        .iter()
        .filter_map(|row| interface_index(row).map(|idx| (idx, row)))
        .collect();

    let adapters = ctx
        .sources()
        .query(NETWORK_ADAPTER, Some(PHYSICAL_ADAPTERS))?;

    let meta = ctx.metadata();
    for adapter in &adapters {
        let Some(index) = interface_index(adapter) else {
            debug!(adapter = ?adapter.get("Description"), "adapter without interface index, skipping");
            continue;
        };
        let tags = TagSet::new()
            .with("iface", format!("Interface{}", index))
            .merge_defaults(ctx.default_tags());

        put(meta, &tags, "description", adapter.get("Description"));
        put(meta, &tags, "name", adapter.get("NetConnectionID"));
        if let Some(mac) = adapter.get("MACAddress").and_then(MetaValue::as_str) {
            meta.add_meta("", &tags, "mac", mac.replace(':', ""), true);
        }
        let speed = adapter.get("Speed").cloned().unwrap_or(MetaValue::UInt(0));
        meta.add_meta("", &tags, "speed", speed, true);

        if let Some(addrs) = configs_by_index
            .get(&index)
            .and_then(|cfg| cfg.get("IPAddress"))
        {
            meta.add_meta("", &tags, "addr", addrs.clone(), true);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::mock::{MockCommand, MockFs, MockQuery, query_row};
    use crate::collector::source::SourceReader;
    use crate::error::QueryError;

    fn context(query: MockQuery) -> CollectContext {
        let sources = SourceReader::new(
            Arc::new(MockFs::new()),
            Arc::new(MockCommand::new()),
            Arc::new(query),
        );
        CollectContext::new(Arc::new(sources), Arc::new(MetadataStore::new()))
            .with_default_tags(TagSet::new().with("host", "web1"))
    }

    fn identity_rows(q: &mut MockQuery) {
        q.add_rows(
            OPERATING_SYSTEM,
            None,
            vec![query_row([
                ("Caption", MetaValue::from("Microsoft Windows Server 2012 R2 Standard")),
                ("Version", MetaValue::from("6.3.9600")),
            ])],
        );
        q.add_rows(
            COMPUTER_SYSTEM,
            None,
            vec![query_row([
                ("Manufacturer", MetaValue::from("Dell Inc.")),
                ("Model", MetaValue::from("PowerEdge R720")),
                ("TotalPhysicalMemory", MetaValue::from(68_624_457_728u64)),
            ])],
        );
        q.add_rows(BIOS, None, vec![query_row([("SerialNumber", "ABC1234")])]);
    }

    fn adapter_rows(q: &mut MockQuery) {
        q.add_rows(
            ADAPTER_CONFIGURATION,
            Some(CONFIGURED_ADAPTERS),
            vec![query_row([
                ("InterfaceIndex", MetaValue::from(12u64)),
                ("IPAddress", MetaValue::from("10.0.0.5,fe80::1")),
            ])],
        );
        q.add_rows(
            NETWORK_ADAPTER,
            Some(PHYSICAL_ADAPTERS),
            vec![
                query_row([
                    ("InterfaceIndex", MetaValue::from(12u64)),
                    ("Description", MetaValue::from("Intel(R) Gigabit ET Quad Port Server Adapter")),
                    ("NetConnectionID", MetaValue::from("PRI-NIC-A")),
                    ("MACAddress", MetaValue::from("00:1B:21:93:00:00")),
                    ("Speed", MetaValue::from(1_000_000_000u64)),
                ]),
                query_row([
                    ("InterfaceIndex", MetaValue::from(13u64)),
                    ("Description", MetaValue::from("Spare port")),
                    ("MACAddress", MetaValue::from("00:1B:21:93:00:01")),
                ]),
            ],
        );
    }

    #[test]
    fn test_system_identity() {
        let mut q = MockQuery::new();
        identity_rows(&mut q);
        adapter_rows(&mut q);
        let ctx = context(q);

        let result = collect_platform_metadata(&ctx);
        assert!(result.points.is_empty());
        assert!(result.error.is_none());

        let host = TagSet::new().with("host", "web1");
        let meta = ctx.metadata();
        assert_eq!(meta.get("", &host, "version"), Some(MetaValue::from("6.3.9600")));
        assert_eq!(meta.get("", &host, "model"), Some(MetaValue::from("PowerEdge R720")));
        assert_eq!(
            meta.get("", &host, "memoryTotal"),
            Some(MetaValue::UInt(68_624_457_728))
        );
        assert_eq!(meta.get("", &host, "serialNumber"), Some(MetaValue::from("ABC1234")));
    }

    #[test]
    fn test_network_adapters() {
        let mut q = MockQuery::new();
        identity_rows(&mut q);
        adapter_rows(&mut q);
        let ctx = context(q);
        collect_platform_metadata(&ctx);

        let meta = ctx.metadata();
        let nic = TagSet::new().with("iface", "Interface12").with("host", "web1");
        assert_eq!(meta.get("", &nic, "name"), Some(MetaValue::from("PRI-NIC-A")));
        assert_eq!(meta.get("", &nic, "mac"), Some(MetaValue::from("001B21930000")));
        assert_eq!(meta.get("", &nic, "speed"), Some(MetaValue::UInt(1_000_000_000)));
        assert_eq!(meta.get("", &nic, "addr"), Some(MetaValue::from("10.0.0.5,fe80::1")));

        let spare = TagSet::new().with("iface", "Interface13").with("host", "web1");
        assert_eq!(meta.get("", &spare, "speed"), Some(MetaValue::UInt(0)));
        assert_eq!(meta.get("", &spare, "name"), None);
        assert_eq!(meta.get("", &spare, "addr"), None);
    }

    #[test]
    fn test_failed_query_aborts_only_its_group() {
        let mut q = MockQuery::new();
        identity_rows(&mut q);
        adapter_rows(&mut q);
        q.add_error(BIOS, None, QueryError::Failed("access denied".into()));
        let ctx = context(q);

        let result = collect_platform_metadata(&ctx);
        match result.error {
            Some(CollectError::Query { class, .. }) => assert_eq!(class, BIOS),
            other => panic!("unexpected {:?}", other),
        }

        let host = TagSet::new().with("host", "web1");
        // identity group recorded nothing, adapters still did
        assert_eq!(ctx.metadata().get("", &host, "version"), None);
        let nic = TagSet::new().with("iface", "Interface12").with("host", "web1");
        assert!(ctx.metadata().get("", &nic, "mac").is_some());
    }

    #[test]
    fn test_register_uses_metadata_interval() {
        let mut registry = Registry::new();
        register(&mut registry);
        let descriptor = registry.get("platform_metadata").unwrap();
        assert_eq!(descriptor.interval(), Some(registry.metadata_interval()));
    }
}
