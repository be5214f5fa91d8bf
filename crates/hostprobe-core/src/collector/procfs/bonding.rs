//! `/proc/net/bonding/<bond>`: nested per-slave blocks.

use crate::collector::grammar::LineParser;
use crate::error::ParseError;
use crate::metric::{Emitter, RateType, TagSet, Unit};

#[derive(Debug, Clone, PartialEq, Eq)]
enum BondState {
    /// Bond-wide settings before the first slave section, or a slave
    /// section without an interface name.
    TopLevel,
    InSlave(String),
}

/// Parses one bonding status file.
///
/// Lines have the form `Label: Value`. A `Slave Interface` line opens a
/// slave section; `MII Status` inside a slave reports its link state. The
/// slave count is emitted once the whole file has been read.
#[derive(Debug)]
pub struct BondingParser {
    bond: String,
    state: BondState,
    slave_count: u32,
}

impl BondingParser {
    pub fn new(bond: impl Into<String>) -> Self {
        Self {
            bond: bond.into(),
            state: BondState::TopLevel,
            slave_count: 0,
        }
    }
}

impl LineParser for BondingParser {
    fn parse_line(&mut self, line: &str, out: &mut Emitter) -> Result<(), ParseError> {
        let Some((label, value)) = line.split_once(':') else {
            return Ok(());
        };
        let label = label.trim();
        let value = value.trim();

        if label == "Slave Interface" {
            self.slave_count += 1;
            self.state = if value.is_empty() {
                BondState::TopLevel
            } else {
                BondState::InSlave(value.to_string())
            };
        }

        if let BondState::InSlave(slave) = &self.state {
            if label == "MII Status" {
                let tags = TagSet::new().with("slave", slave).with("bond", &self.bond);
                let up = u32::from(value == "up");
                out.add_described(
                    "linux.net.bond.slave.is_up",
                    up,
                    &tags,
                    RateType::Gauge,
                    Unit::Bool,
                    "The status of a bond interface.",
                );
            }
        }
        Ok(())
    }

    fn finish(&mut self, out: &mut Emitter) {
        out.add_described(
            "linux.net.bond.slave.count",
            self.slave_count,
            &TagSet::new().with("bond", &self.bond),
            RateType::Gauge,
            Unit::Count,
            "The number of slaves on the bonded interface.",
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::grammar::parse_str;

    const BOND0: &str = "\
Ethernet Channel Bonding Driver: v3.7.1 (April 27, 2011)

Bonding Mode: IEEE 802.3ad Dynamic link aggregation
MII Status: up

Slave Interface: eth0
MII Status: up
Speed: 10000 Mbps

Slave Interface: eth1
MII Status: down
";

    #[test]
    fn test_bonding_slaves() {
        let mut out = Emitter::new(TagSet::new(), 0);
        parse_str(&mut BondingParser::new("bond0"), BOND0, &mut out).unwrap();

        // top-level MII Status is not a slave
        assert_eq!(out.len(), 3);
        let eth0 = out
            .find("linux.net.bond.slave.is_up", &[("slave", "eth0"), ("bond", "bond0")])
            .unwrap();
        assert_eq!(eth0.value, 1.0);
        let eth1 = out
            .find("linux.net.bond.slave.is_up", &[("slave", "eth1")])
            .unwrap();
        assert_eq!(eth1.value, 0.0);

        let count = out.find("linux.net.bond.slave.count", &[("bond", "bond0")]).unwrap();
        assert_eq!(count.value, 2.0);
        assert!(!count.tags.contains_key("slave"));
    }

    #[test]
    fn test_bonding_unnamed_slave_is_counted_not_reported() {
        let content = "\
Slave Interface: eth0
MII Status: up

Slave Interface:
MII Status: down
";
        let mut out = Emitter::new(TagSet::new(), 0);
        parse_str(&mut BondingParser::new("bond0"), content, &mut out).unwrap();

        assert_eq!(out.len(), 2);
        assert_eq!(
            out.find("linux.net.bond.slave.is_up", &[("slave", "eth0")]).unwrap().value,
            1.0
        );
        assert!(out.find("linux.net.bond.slave.is_up", &[("slave", "")]).is_none());
        assert_eq!(out.find("linux.net.bond.slave.count", &[]).unwrap().value, 2.0);
    }

    #[test]
    fn test_bonding_without_slaves() {
        let mut out = Emitter::new(TagSet::new(), 0);
        parse_str(&mut BondingParser::new("bond1"), "MII Status: down\n", &mut out).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out.find("linux.net.bond.slave.count", &[]).unwrap().value, 0.0);
    }
}
