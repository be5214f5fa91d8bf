//! Test doubles for the collector ports.
//!
//! `MockFs`, `MockCommand` and `MockQuery` stand in for `/proc`, external
//! tools and platform queries. `scenarios` holds ready-made host fixtures.

mod command;
mod filesystem;
mod scenarios;

pub use command::{MockCommand, MockQuery, query_row};
pub use filesystem::MockFs;
