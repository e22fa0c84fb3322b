//! Iterative descriptor and data negotiation for the connect phase.
pub mod negotiator;
pub mod rules;

pub use negotiator::{ConnectorSpec, Negotiator, Offer};
pub use rules::{evaluate, FieldValue, InfoField, InfoRule};
