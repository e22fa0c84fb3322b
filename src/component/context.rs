//! Component-scoped view of the slot graph and the run environment.
use crate::data::{Info, Value};
use crate::error::{CouplingError, Result};
use crate::slot::{ComponentId, InputSpec, OutputSpec, SlotGraph, SlotId};
use crate::time::SimTime;
use indexmap::IndexMap;
use serde::Serialize;

/// Per-run environment shared by all components of a composition.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunEnv {
    pub name: String,
    pub start: Option<SimTime>,
    pub end: Option<SimTime>,
}

/// Named slots of one component, in declaration order.
#[derive(Debug, Clone, Default)]
pub struct ComponentIo {
    pub inputs: IndexMap<String, SlotId>,
    pub outputs: IndexMap<String, SlotId>,
    frozen: bool,
}

impl ComponentIo {
    pub fn new() -> Self { Self::default() }
    pub fn freeze(&mut self) { self.frozen = true; }
    pub fn is_frozen(&self) -> bool { self.frozen }
}

pub struct Context<'a> {
    pub graph: &'a mut SlotGraph,
    pub env: &'a RunEnv,
    id: ComponentId,
    io: &'a mut ComponentIo,
}

impl<'a> Context<'a> {
    pub fn new(graph: &'a mut SlotGraph, env: &'a RunEnv, id: ComponentId, io: &'a mut ComponentIo) -> Self {
        Self { graph, env, id, io }
    }

    pub fn id(&self) -> ComponentId { self.id }
    pub fn name(&self) -> &str { self.graph.component_name(self.id) }
    pub fn inputs(&self) -> &IndexMap<String, SlotId> { &self.io.inputs }
    pub fn outputs(&self) -> &IndexMap<String, SlotId> { &self.io.outputs }

    // --- Declaration ---

    pub fn add_input(&mut self, name: &str, spec: InputSpec) -> Result<SlotId> {
        self.check_open(name, self.io.inputs.contains_key(name))?;
        let id = self.graph.add_input(Some(self.id), name, spec);
        self.io.inputs.insert(name.to_string(), id);
        Ok(id)
    }

    pub fn add_output(&mut self, name: &str, spec: OutputSpec) -> Result<SlotId> {
        self.check_open(name, self.io.outputs.contains_key(name))?;
        let id = self.graph.add_output(Some(self.id), name, spec);
        self.io.outputs.insert(name.to_string(), id);
        Ok(id)
    }

    /// Declares an output that computes its data with `callback` when pulled.
    pub fn add_callback_output<F>(&mut self, name: &str, callback: F) -> Result<SlotId>
    where
        F: Fn(SimTime) -> Result<Value> + Send + Sync + 'static,
    {
        self.check_open(name, self.io.outputs.contains_key(name))?;
        let id = self.graph.add_callback_output(Some(self.id), name, callback);
        self.io.outputs.insert(name.to_string(), id);
        Ok(id)
    }

    fn check_open(&self, slot: &str, exists: bool) -> Result<()> {
        if self.io.is_frozen() {
            return Err(CouplingError::Config(format!(
                "can't add slot '{}' to '{}' after initialization",
                slot,
                self.name()
            )));
        }
        if exists {
            return Err(CouplingError::Config(format!("slot '{}' of '{}' declared twice", slot, self.name())));
        }
        Ok(())
    }

    // --- Lookup ---

    pub fn input(&self, name: &str) -> Result<SlotId> {
        self.io
            .inputs
            .get(name)
            .copied()
            .ok_or_else(|| CouplingError::Config(format!("component '{}' has no input '{}'", self.name(), name)))
    }

    pub fn output(&self, name: &str) -> Result<SlotId> {
        self.io
            .outputs
            .get(name)
            .copied()
            .ok_or_else(|| CouplingError::Config(format!("component '{}' has no output '{}'", self.name(), name)))
    }

    // --- Protocol by slot name ---

    pub fn ping_inputs(&mut self) -> Result<()> {
        let inputs: Vec<SlotId> = self.io.inputs.values().copied().collect();
        inputs.into_iter().try_for_each(|id| self.graph.ping(id))
    }

    pub fn push(&mut self, output: &str, value: impl Into<Value>, time: SimTime) -> Result<()> {
        let id = self.output(output)?;
        self.graph.push(id, value.into(), time)
    }

    pub fn push_info(&mut self, output: &str, info: Info) -> Result<()> {
        let id = self.output(output)?;
        self.graph.push_info(id, info)
    }

    pub fn pull(&mut self, input: &str, time: SimTime) -> Result<Value> {
        let id = self.input(input)?;
        self.graph.pull(id, time)
    }

    pub fn exchange_info(&mut self, input: &str, request: &Info) -> Result<Info> {
        let id = self.input(input)?;
        self.graph.exchange_info(id, request)
    }

    pub fn input_info(&self, input: &str) -> Result<Option<&Info>> {
        Ok(self.graph.input(self.input(input)?)?.info())
    }

    pub fn output_info(&self, output: &str) -> Result<Option<&Info>> {
        Ok(self.graph.output(self.output(output)?)?.info())
    }
}
