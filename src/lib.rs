//! Coupling kernel for time-stepped simulation components.
//!
//! Components declare input and output slots, negotiate descriptors
//! ([`Info`]) and initial data during an iterative connect phase, and are
//! then driven by a [`Composition`] in earliest-time-first order. Adapters
//! between slots convert units, transform values and buffer samples for
//! temporal interpolation or integration.

pub mod adapter;
pub mod component;
pub mod data;
pub mod error;
pub mod modules;
pub mod negotiate;
pub mod schedule;
pub mod sdk;
pub mod slot;
pub mod time;

pub use adapter::AdapterKind;
pub use component::{Component, ComponentStatus, Context};
pub use data::{Info, Mask, Unit, Value};
pub use error::{CouplingError, Result};
pub use negotiate::{ConnectorSpec, InfoField, InfoRule, Offer};
pub use schedule::{Composition, CompositionConfig};
pub use sdk::{ConnectCx, Model, ModelComponent};
pub use slot::{InputSpec, OutputSpec, SlotGraph, SlotId};
pub use time::SimTime;
