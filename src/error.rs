//! Error taxonomy of the coupling kernel.
//!
//! Every fallible operation returns `Result<T, CouplingError>`. Only
//! `NoData` is transient: it signals that information is not available
//! *yet* and is absorbed by the negotiator during the connect phase. All
//! other variants are fatal and propagate to the caller of the composition.

use crate::component::ComponentStatus;
use std::collections::BTreeMap;
use std::fmt::Write;
use thiserror::Error;

/// Failing descriptor fields: field name -> (got, expected).
pub type FieldMismatches = BTreeMap<String, (String, String)>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CouplingError {
    // --- Transient ---
    #[error("no data available: {0}")]
    NoData(String),

    // --- Configuration ---
    #[error("metadata error in '{slot}': {msg}")]
    MetaData { slot: String, msg: String },
    #[error("incompatible metadata in '{slot}':{}", format_mismatches(.failures))]
    Incompatible { slot: String, failures: FieldMismatches },
    #[error("unconnected input '{input}' of component '{component}'")]
    UnconnectedInput { component: String, input: String },
    #[error("disallowed branching of output '{output}' of component '{component}' at '{at}'")]
    Branching { component: String, output: String, at: String },
    #[error("configuration error: {0}")]
    Config(String),

    // --- Data ---
    #[error("data mismatch in '{slot}': {msg}")]
    DataMismatch { slot: String, msg: String },
    #[error("time error in '{slot}': {msg}")]
    TimeRange { slot: String, msg: String },

    // --- Protocol ---
    #[error(
        "unexpected status {actual:?} of component '{component}', expected one of {expected:?}"
    )]
    Status { component: String, actual: ComponentStatus, expected: Vec<ComponentStatus> },
    #[error("unresolved circular coupling during connect, unconnected components: [{}]{}", .components.join(", "), format_cycles(.cycles))]
    Deadlock { components: Vec<String>, cycles: Vec<Vec<String>> },
    #[error("unresolved circular coupling during update: {}", .chain.join(" >> "))]
    CircularCoupling { chain: Vec<String> },

    // --- Component / environment ---
    #[error("component '{component}' failed: {msg}")]
    Component { component: String, msg: String },
    #[error("io error: {0}")]
    Io(String),
}

impl CouplingError {
    /// Information not available yet; retried on the next connect round.
    pub fn is_transient(&self) -> bool {
        matches!(self, CouplingError::NoData(_))
    }

    pub fn no_data(msg: impl Into<String>) -> Self { Self::NoData(msg.into()) }

    pub fn meta(slot: &str, msg: impl Into<String>) -> Self {
        Self::MetaData { slot: slot.to_string(), msg: msg.into() }
    }

    pub fn data(slot: &str, msg: impl Into<String>) -> Self {
        Self::DataMismatch { slot: slot.to_string(), msg: msg.into() }
    }

    pub fn time(slot: &str, msg: impl Into<String>) -> Self {
        Self::TimeRange { slot: slot.to_string(), msg: msg.into() }
    }
}

impl From<std::io::Error> for CouplingError {
    fn from(e: std::io::Error) -> Self { CouplingError::Io(e.to_string()) }
}

impl From<serde_json::Error> for CouplingError {
    fn from(e: serde_json::Error) -> Self { CouplingError::Config(e.to_string()) }
}

pub type Result<T> = std::result::Result<T, CouplingError>;

fn format_mismatches(failures: &FieldMismatches) -> String {
    let mut out = String::new();
    for (name, (got, expected)) in failures {
        let _ = write!(out, "\n{} - got {}, expected {}", name, got, expected);
    }
    out
}

fn format_cycles(cycles: &[Vec<String>]) -> String {
    if cycles.is_empty() {
        return String::new();
    }
    let rendered: Vec<String> = cycles.iter().map(|c| c.join(" <-> ")).collect();
    format!(", cycles: {}", rendered.join("; "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_no_data_is_transient() {
        assert!(CouplingError::no_data("x").is_transient());
        assert!(!CouplingError::meta("x", "y").is_transient());
        assert!(!CouplingError::Config("x".into()).is_transient());
    }

    #[test]
    fn test_incompatible_lists_every_field() {
        let mut failures = FieldMismatches::new();
        failures.insert("units".into(), ("s".into(), "m".into()));
        failures.insert("mask".into(), ("Flex".into(), "None".into()));
        let msg = CouplingError::Incompatible { slot: "In".into(), failures }.to_string();
        assert!(msg.contains("units - got s, expected m"), "{}", msg);
        assert!(msg.contains("mask - got Flex, expected None"), "{}", msg);
    }

    #[test]
    fn test_deadlock_names_components() {
        let e = CouplingError::Deadlock {
            components: vec!["A".into(), "B".into()],
            cycles: vec![vec!["A".into(), "B".into()]],
        };
        let msg = e.to_string();
        assert!(msg.contains("[A, B]"));
        assert!(msg.contains("A <-> B"));
    }
}
