//! Recording consumer for tests and debugging.
use crate::component::{ComponentStatus, Context};
use crate::data::{Info, Value};
use crate::error::{CouplingError, Result};
use crate::negotiate::{ConnectorSpec, Offer};
use crate::sdk::{ConnectCx, Model};
use crate::slot::InputSpec;
use crate::time::SimTime;
use indexmap::IndexMap;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// One pulled value.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub input: String,
    pub time: SimTime,
    pub value: Value,
}

pub type Records = Arc<Mutex<Vec<Record>>>;

/// Pulls every input and records the values.
///
/// Time-stepped consumers pull while connecting and on each update;
/// push-driven ones pull when a source notifies.
pub struct DebugConsumer {
    inputs: IndexMap<String, Info>,
    clock: Option<(SimTime, f64)>,
    initial_pull: bool,
    connected: bool,
    records: Records,
}

impl DebugConsumer {
    pub fn stepped(start: SimTime, step: f64) -> Self {
        Self { clock: Some((start, step)), initial_pull: true, ..Self::push_driven() }
    }

    pub fn push_driven() -> Self {
        Self {
            inputs: IndexMap::new(),
            clock: None,
            initial_pull: false,
            connected: false,
            records: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn input(mut self, name: &str, request: Info) -> Self {
        self.inputs.insert(name.to_string(), request);
        self
    }

    /// Skips pulling initial data while connecting.
    pub fn without_initial_pull(mut self) -> Self {
        self.initial_pull = false;
        self
    }

    /// Shared handle on the recorded values.
    pub fn records(&self) -> Records { Arc::clone(&self.records) }

    fn record(&self, input: &str, time: SimTime, value: Value) -> Result<()> {
        debug!(input, %time, ?value, "debug consumer");
        let mut records = self
            .records
            .lock()
            .map_err(|_| CouplingError::Component { component: "DebugConsumer".into(), msg: "poisoned record lock".into() })?;
        records.push(Record { input: input.to_string(), time, value });
        Ok(())
    }

    fn pull_all(&self, cx: &mut Context, time: SimTime) -> Result<()> {
        for name in self.inputs.keys() {
            let value = cx.pull(name, time)?;
            self.record(name, time, value)?;
        }
        Ok(())
    }
}

impl Model for DebugConsumer {
    fn initialize(&mut self, cx: &mut Context) -> Result<()> {
        let spec = if self.clock.is_some() { InputSpec::new() } else { InputSpec::notifying() };
        for name in self.inputs.keys() {
            cx.add_input(name, spec)?;
        }
        Ok(())
    }

    fn connector(&self) -> ConnectorSpec {
        if !self.initial_pull {
            return ConnectorSpec::new();
        }
        self.inputs.keys().fold(ConnectorSpec::new(), |spec, name| spec.pull(name))
    }

    fn connect(&mut self, cx: &mut ConnectCx) -> Result<ComponentStatus> {
        let offer = self.inputs.iter().fold(Offer::new(), |offer, (name, info)| offer.exchange_info(name, info.clone()));
        let status = cx.try_connect(offer)?;
        if status == ComponentStatus::Connected {
            if let Some(start) = cx.start() {
                for name in self.inputs.keys() {
                    if let Some(value) = cx.in_data(name) {
                        self.record(name, start, value.clone())?;
                    }
                }
            }
            self.connected = true;
        }
        Ok(status)
    }

    fn update(&mut self, cx: &mut Context) -> Result<()> {
        let Some((time, step)) = self.clock.as_mut() else {
            return Ok(());
        };
        *time = *time + *step;
        let time = *time;
        self.pull_all(cx, time)
    }

    fn source_changed(&mut self, cx: &mut Context, input: &str, time: SimTime) -> Result<()> {
        if !self.connected || self.clock.is_some() {
            return Ok(());
        }
        let value = cx.pull(input, time)?;
        self.record(input, time, value)
    }

    fn time(&self) -> Option<SimTime> { self.clock.map(|(t, _)| t) }
    fn next_time(&self) -> Option<SimTime> { self.clock.map(|(t, step)| t + step) }
}
