//! Per-group column-count tables: `/proc/stat` and `/proc/interrupts`.

use std::sync::LazyLock;

use regex::Regex;

use crate::collector::grammar::{LineParser, is_alnum, is_digits};
use crate::error::ParseError;
use crate::metric::{Emitter, RateType, TagSet, Unit};

static STAT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\w+)\s+(.*)").expect("valid stat regex"));
static STAT_CPU_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"cpu(\d+)").expect("valid cpu regex"));

/// Column names of a `cpu` line, in kernel order.
pub const CPU_FIELDS: [&str; 10] = [
    "user",
    "nice",
    "system",
    "idle",
    "iowait",
    "irq",
    "softirq",
    "steal",
    "guest",
    "guest_nice",
];

fn cpu_field_desc(field: &str) -> &'static str {
    match field {
        "user" => "Normal processes executing in user mode.",
        "nice" => "Niced processes executing in user mode.",
        "system" => "Processes executing in kernel mode.",
        "idle" => "Twiddling thumbs.",
        "iowait" => "Waiting for I/O to complete.",
        "irq" => "Servicing interrupts.",
        "softirq" => "Servicing soft irqs.",
        "steal" => "Involuntary wait.",
        "guest" => "Running a guest vm.",
        "guest_nice" => "Running a niced guest vm.",
        _ => "",
    }
}

fn irq_type_desc(irq: &str) -> &'static str {
    match irq {
        "NMI" => "Non-maskable interrupts.",
        "LOC" => "Local timer interrupts.",
        "SPU" => "Spurious interrupts.",
        "PMI" => "Performance monitoring interrupts.",
        "IWI" => "IRQ work interrupts.",
        "RES" => "Rescheduling interrupts.",
        "CAL" => "Function call interrupts.",
        "TLB" => "TLB (translation lookaside buffer) shootdowns.",
        "TRM" => "Thermal event interrupts.",
        "THR" => "Threshold APIC interrupts.",
        "MCE" => "Machine check exceptions.",
        "MCP" => "Machine check polls.",
        _ => "",
    }
}

/// `/proc/stat`.
///
/// `cpu` is the aggregate line and emits `linux.cpu{type}`; `cpuN` lines
/// emit `linux.cpu.percpu{type,cpu}`. At the end of the file the aggregate
/// busy time divided by the number of per-CPU lines becomes `os.cpu`.
#[derive(Debug, Default)]
pub struct StatParser {
    num_cores: u32,
    busy: f64,
}

impl StatParser {
    fn parse_cpu(&mut self, label: &str, rest: &str, out: &mut Emitter) {
        let cpu = STAT_CPU_RE.captures(label).map(|c| c[1].to_string());
        let metric = if cpu.is_some() {
            self.num_cores += 1;
            "linux.cpu.percpu"
        } else {
            "linux.cpu"
        };

        let mut parsed = Vec::with_capacity(CPU_FIELDS.len());
        for (field, raw) in CPU_FIELDS.iter().zip(rest.split_whitespace()) {
            let Ok(value) = raw.parse::<f64>() else {
                break;
            };
            parsed.push(value);

            let mut tags = TagSet::new().with("type", field);
            if let Some(cpu) = &cpu {
                tags = tags.with("cpu", cpu);
            }
            out.add_described(metric, value, &tags, RateType::Counter, Unit::CentiHertz, cpu_field_desc(field));
        }

        if cpu.is_none() && parsed.len() >= 3 {
            self.busy = parsed[0] + parsed[1] + parsed[2];
        }
    }
}

impl LineParser for StatParser {
    fn parse_line(&mut self, line: &str, out: &mut Emitter) -> Result<(), ParseError> {
        let Some(caps) = STAT_RE.captures(line) else {
            return Ok(());
        };
        let label = caps.get(1).map_or("", |m| m.as_str());
        let rest = caps.get(2).map_or("", |m| m.as_str());
        let none = TagSet::new();

        match label {
            l if l.starts_with("cpu") => self.parse_cpu(l, rest, out),
            "intr" => {
                if let Some(total) = rest.split_whitespace().next() {
                    out.add("linux.intr", total, &none, RateType::Counter, Unit::Interrupt);
                }
            }
            "ctxt" => {
                out.add("linux.ctxt", rest, &none, RateType::Counter, Unit::ContextSwitch);
            }
            "processes" => {
                out.add_described(
                    "linux.processes",
                    rest,
                    &none,
                    RateType::Counter,
                    Unit::Process,
                    "The number of processes and threads created, which includes those created by calls to fork() and clone().",
                );
            }
            "procs_blocked" => {
                out.add_described(
                    "linux.procs_blocked",
                    rest,
                    &none,
                    RateType::Gauge,
                    Unit::Process,
                    "The number of processes currently blocked, waiting for I/O to complete.",
                );
            }
            _ => {}
        }
        Ok(())
    }

    fn finish(&mut self, out: &mut Emitter) {
        if self.num_cores != 0 && self.busy != 0.0 {
            out.add(
                "os.cpu",
                self.busy / f64::from(self.num_cores),
                &TagSet::new(),
                RateType::Gauge,
                Unit::Count,
            );
        }
    }
}

/// `/proc/interrupts`.
///
/// The first line lists the CPUs. Each later row is `LABEL: n0 n1 ... desc`.
/// Numbered IRQs are only kept for MSI network interrupts, relabelled with
/// the device name. A non-numeric value inside the CPU columns means the
/// layout is not understood and aborts the file.
#[derive(Debug, Default)]
pub struct InterruptsParser {
    num_cpus: usize,
}

impl LineParser for InterruptsParser {
    fn parse_line(&mut self, line: &str, out: &mut Emitter) -> Result<(), ParseError> {
        let cols: Vec<&str> = line.split_whitespace().collect();
        if self.num_cpus == 0 {
            self.num_cpus = cols.len();
            return Ok(());
        }
        if cols.len() < 2 {
            return Ok(());
        }

        let mut irq_type = cols[0].trim_end_matches(':');
        if !is_alnum(irq_type) {
            return Ok(());
        }
        if is_digits(irq_type) {
            let device = cols[cols.len() - 1];
            if cols[cols.len() - 2] == "PCI-MSI-edge" && device.contains("eth") {
                irq_type = device;
            } else {
                return Ok(());
            }
        }

        for (cpu, val) in cols[1..].iter().take(self.num_cpus).enumerate() {
            if !is_digits(val) {
                return Err(ParseError::new(format!("interrupts: unexpected value: {}", val)));
            }
            let tags = TagSet::new()
                .with("type", irq_type)
                .with("cpu", cpu.to_string());
            out.add_described(
                "linux.interrupts",
                *val,
                &tags,
                RateType::Gauge,
                Unit::Interrupt,
                irq_type_desc(irq_type),
            );
        }
        Ok(())
    }
}
