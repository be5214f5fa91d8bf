//! Dell OpenManage hardware health collectors.
//!
//! Every collector runs one `omreport ... -fmt ssv` invocation and turns the
//! matching table rows into `hw.*` severity gauges (0 healthy, 1 not) plus
//! readings where the row carries one. On hosts without OpenManage the
//! command is missing and the collectors produce nothing.

pub mod parser;

use std::sync::Arc;

use crate::collector::grammar::{LineParser, clean};
use crate::collector::source::CommandSpec;
use crate::error::ErrorList;
use crate::metric::{CollectorResult, Emitter, RateType, TagSet, Unit};
use crate::scheduler::{CollectContext, CollectorDescriptor, Registry};

use parser::{SsvTable, TableShape, extract, reading, severity};

pub const OMREPORT: &str = "omreport";

const SEVERITY_PAIR: TableShape = TableShape::Exact {
    fields: 2,
    sentinel: Some("SEVERITY"),
};
const BY_ID: TableShape = TableShape::AtLeast {
    fields: 3,
    sentinel: "ID",
};
const BY_INDEX: TableShape = TableShape::AtLeast {
    fields: 3,
    sentinel: "Index",
};
const SENSOR_ROW: TableShape = TableShape::Indexed { fields: 8 };
const SHORT_SENSOR_ROW: TableShape = TableShape::Indexed { fields: 5 };

/// Registers all OpenManage collectors at the registry's hardware interval.
pub fn register(registry: &mut Registry) {
    let interval = Some(registry.hw_interval());
    let collectors: [(&str, fn(&CollectContext) -> CollectorResult); 13] = [
        ("omreport_chassis", collect_chassis),
        ("omreport_fans", collect_fans),
        ("omreport_memory", collect_memory),
        ("omreport_processors", collect_processors),
        ("omreport_ps", collect_ps),
        ("omreport_ps_amps", collect_ps_amps),
        ("omreport_storage_battery", collect_storage_battery),
        ("omreport_storage_controller", collect_storage_controller),
        ("omreport_storage_enclosure", collect_storage_enclosure),
        ("omreport_storage_vdisk", collect_storage_vdisk),
        ("omreport_system", collect_system),
        ("omreport_temps", collect_temps),
        ("omreport_volts", collect_volts),
    ];
    for (name, func) in collectors {
        registry.add(CollectorDescriptor::new(name, interval, Arc::new(func)));
    }
}

fn omreport(args: &[&str]) -> CommandSpec {
    CommandSpec::new(OMREPORT)
        .args(args.iter().copied())
        .format("-fmt", "ssv")
}

/// Runs `spec` and feeds every row matching `shape` to `on_row`.
fn read_omreport<F>(
    ctx: &CollectContext,
    spec: &CommandSpec,
    shape: TableShape,
    out: &mut Emitter,
    errors: &mut ErrorList,
    on_row: F,
) where
    F: FnMut(&[String], &mut Emitter),
{
    let mut table = SsvTable::new(shape, on_row);
    let result = ctx
        .sources()
        .run_command(spec, |line| table.parse_line(line, out));
    errors.record(result);
}

/// Where the status and the identifying column sit in a status table.
#[derive(Debug, Clone, Copy)]
enum StatusLayout {
    /// `SEVERITY;COMPONENT`
    Component,
    /// `ID;Status;...`
    Id,
}

fn emit_status(out: &mut Emitter, metric: &str, layout: StatusLayout, row: &[String]) {
    let (status, tags) = match layout {
        StatusLayout::Component => (&row[0], TagSet::new().with("component", &row[1])),
        StatusLayout::Id => (&row[1], TagSet::new().with("id", &row[0])),
    };
    out.add(metric, severity(status), &tags, RateType::Gauge, Unit::Ok);
}

fn status_table(
    ctx: &CollectContext,
    args: &[&str],
    shape: TableShape,
    metric: &str,
    layout: StatusLayout,
) -> CollectorResult {
    let mut out = ctx.emitter();
    let mut errors = ErrorList::new();
    read_omreport(ctx, &omreport(args), shape, &mut out, &mut errors, |row, out| {
        emit_status(out, metric, layout, row)
    });
    CollectorResult::new(out.into_points(), errors.finish())
}

pub fn collect_chassis(ctx: &CollectContext) -> CollectorResult {
    status_table(ctx, &["chassis"], SEVERITY_PAIR, "hw.chassis", StatusLayout::Component)
}

pub fn collect_system(ctx: &CollectContext) -> CollectorResult {
    status_table(ctx, &["system"], SEVERITY_PAIR, "hw.system", StatusLayout::Component)
}

pub fn collect_storage_enclosure(ctx: &CollectContext) -> CollectorResult {
    status_table(ctx, &["storage", "enclosure"], BY_ID, "hw.storage.enclosure", StatusLayout::Id)
}

pub fn collect_storage_vdisk(ctx: &CollectContext) -> CollectorResult {
    status_table(ctx, &["storage", "vdisk"], BY_ID, "hw.storage.vdisk", StatusLayout::Id)
}

pub fn collect_storage_battery(ctx: &CollectContext) -> CollectorResult {
    status_table(ctx, &["storage", "battery"], BY_ID, "hw.storage.battery", StatusLayout::Id)
}

pub fn collect_ps(ctx: &CollectContext) -> CollectorResult {
    status_table(ctx, &["chassis", "pwrsupplies"], BY_INDEX, "hw.ps", StatusLayout::Id)
}

/// Storage controllers, plus the physical disks behind each of them.
pub fn collect_storage_controller(ctx: &CollectContext) -> CollectorResult {
    let mut out = ctx.emitter();
    let mut errors = ErrorList::new();
    let mut pdisk_errors = ErrorList::new();

    let controllers = omreport(&["storage", "controller"]);
    read_omreport(ctx, &controllers, BY_ID, &mut out, &mut errors, |row, out| {
        let pdisks = omreport(&["storage", "pdisk"]).filter("controller", row[0].as_str());
        read_omreport(ctx, &pdisks, BY_ID, out, &mut pdisk_errors, |disk, out| {
            emit_status(out, "hw.storage.pdisk", StatusLayout::Id, disk)
        });
        emit_status(out, "hw.storage.controller", StatusLayout::Id, row);
    });

    errors.append(pdisk_errors);
    CollectorResult::new(out.into_points(), errors.finish())
}

/// Power-supply current draw, from the `pwrmonitoring` amperage rows.
pub fn collect_ps_amps(ctx: &CollectContext) -> CollectorResult {
    let mut out = ctx.emitter();
    let mut errors = ErrorList::new();
    let shape = TableShape::Exact {
        fields: 2,
        sentinel: None,
    };
    read_omreport(
        ctx,
        &omreport(&["chassis", "pwrmonitoring"]),
        shape,
        &mut out,
        &mut errors,
        |row, out| {
            if !row[0].contains("Current") {
                return;
            }
            let label: Vec<&str> = row[0].split("Current").collect();
            let value: Vec<&str> = row[1].split_whitespace().collect();
            if label.len() < 2 || value.len() < 2 {
                return;
            }
            let tags = TagSet::new().with("id", label[0].replace(' ', ""));
            out.add("hw.chassis.current.reading", value[0], &tags, RateType::Gauge, Unit::Amp);
        },
    );
    CollectorResult::new(out.into_points(), errors.finish())
}

/// Sensor tables share the `Index;Status;Probe Name;Reading;...` layout.
fn sensor_table<F>(
    ctx: &CollectContext,
    args: &[&str],
    shape: TableShape,
    metric: &str,
    mut extra: F,
) -> CollectorResult
where
    F: FnMut(&[String], &TagSet, &mut Emitter),
{
    let mut out = ctx.emitter();
    let mut errors = ErrorList::new();
    read_omreport(ctx, &omreport(args), shape, &mut out, &mut errors, |row, out| {
        let tags = TagSet::new().with("name", &row[2]);
        out.add(metric, severity(&row[1]), &tags, RateType::Gauge, Unit::Ok);
        extra(row, &tags, out);
    });
    CollectorResult::new(out.into_points(), errors.finish())
}

pub fn collect_fans(ctx: &CollectContext) -> CollectorResult {
    sensor_table(ctx, &["chassis", "fans"], SENSOR_ROW, "hw.chassis.fan", |row, tags, out| {
        if let Some(rpm) = reading(&row[3], "RPM") {
            out.add("hw.chassis.fan.reading", rpm, tags, RateType::Gauge, Unit::Rpm);
        }
    })
}

pub fn collect_temps(ctx: &CollectContext) -> CollectorResult {
    sensor_table(ctx, &["chassis", "temps"], SHORT_SENSOR_ROW, "hw.chassis.temps", |row, tags, out| {
        if let Some(celsius) = reading(&row[3], "C") {
            out.add("hw.chassis.temps.reading", celsius, tags, RateType::Gauge, Unit::DegreeC);
        }
    })
}

pub fn collect_volts(ctx: &CollectContext) -> CollectorResult {
    sensor_table(ctx, &["chassis", "volts"], SENSOR_ROW, "hw.chassis.volts", |row, tags, out| {
        if let Ok(volts) = extract(&row[3], "V") {
            out.add("hw.chassis.volts.reading", volts, tags, RateType::Gauge, Unit::Volt);
        }
    })
}

/// Processor health; also records the CPU model as inventory metadata.
pub fn collect_processors(ctx: &CollectContext) -> CollectorResult {
    sensor_table(ctx, &["chassis", "processors"], SENSOR_ROW, "hw.chassis.processor", |row, tags, _| {
        let tags = tags.merge_defaults(ctx.default_tags());
        ctx.metadata()
            .add_meta("", &tags, "processor", clean(&[row[3].as_str(), row[4].as_str()]), true);
    })
}

/// DIMM health; also records the module size as inventory metadata.
pub fn collect_memory(ctx: &CollectContext) -> CollectorResult {
    sensor_table(ctx, &["chassis", "memory"], SHORT_SENSOR_ROW, "hw.chassis.memory", |row, tags, _| {
        let tags = tags.merge_defaults(ctx.default_tags());
        ctx.metadata()
            .add_meta("", &tags, "memory", clean(&[row[4].as_str()]), true);
    })
}
