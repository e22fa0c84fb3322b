//! The slot graph: an arena of inputs, outputs and adapters.
//!
//! Slots reference each other by [`SlotId`] only. Protocol calls are methods
//! on the graph taking `&mut self`, so a push may recurse through notify,
//! adapter sampling and upstream pulls without shared ownership.

use super::input::{agree, InputSlot};
use super::output::OutputSlot;
use super::types::*;
use crate::adapter::{AdapterKind, AdapterSlot};
use crate::data::{Info, Value};
use crate::error::{CouplingError, Result};
use crate::time::SimTime;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, trace};

#[derive(Debug, Clone)]
pub enum Slot {
    Input(InputSlot),
    Output(OutputSlot),
    Adapter(AdapterSlot),
}

impl Slot {
    pub fn kind(&self) -> SlotKind {
        match self {
            Slot::Input(_) => SlotKind::Input,
            Slot::Output(_) => SlotKind::Output,
            Slot::Adapter(_) => SlotKind::Adapter,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Slot::Input(s) => &s.name,
            Slot::Output(s) => &s.name,
            Slot::Adapter(s) => &s.name,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SlotGraph {
    slots: Vec<Slot>,
    components: Vec<String>,
    notifications: VecDeque<Notification>,
}

impl SlotGraph {
    pub fn new() -> Self { Self::default() }
    pub fn len(&self) -> usize { self.slots.len() }
    pub fn is_empty(&self) -> bool { self.slots.is_empty() }

    // --- Registration ---

    /// Registers a component; ids follow registration order.
    pub fn register_component(&mut self, name: &str) -> ComponentId {
        let id = ComponentId::new(self.components.len());
        self.components.push(name.to_string());
        id
    }

    pub fn component_name(&self, id: ComponentId) -> &str {
        self.components.get(id.index()).map_or("?", |s| s.as_str())
    }

    fn insert(&mut self, slot: Slot) -> SlotId {
        let id = SlotId::new(self.slots.len());
        self.slots.push(slot);
        id
    }

    pub fn add_input(&mut self, owner: Option<ComponentId>, name: &str, spec: InputSpec) -> SlotId {
        self.insert(Slot::Input(InputSlot::new(name, owner, spec)))
    }

    pub fn add_output(&mut self, owner: Option<ComponentId>, name: &str, spec: OutputSpec) -> SlotId {
        self.insert(Slot::Output(OutputSlot::new(name, owner, spec)))
    }

    /// Adds an output whose data is computed by `callback` on every pull.
    pub fn add_callback_output<F>(&mut self, owner: Option<ComponentId>, name: &str, callback: F) -> SlotId
    where
        F: Fn(SimTime) -> Result<Value> + Send + Sync + 'static,
    {
        self.insert(Slot::Output(OutputSlot::with_callback(name, owner, Arc::new(callback))))
    }

    pub fn add_adapter(&mut self, name: &str, kind: AdapterKind) -> SlotId {
        self.insert(Slot::Adapter(AdapterSlot::new(name, kind)))
    }

    /// Excludes an adapter from dependency and deadlock reasoning.
    pub fn set_breaks_dependency(&mut self, adapter: SlotId) -> Result<()> {
        self.adapter_mut(adapter)?.breaks_dependency = true;
        Ok(())
    }

    /// Forbids branching anywhere downstream of an adapter.
    pub fn set_no_branch(&mut self, adapter: SlotId) -> Result<()> {
        self.adapter_mut(adapter)?.no_branch = true;
        Ok(())
    }

    /// Links `from` (output or adapter) to `to` (input or adapter) and returns `to`.
    pub fn chain(&mut self, from: SlotId, to: SlotId) -> Result<SlotId> {
        let (from_label, to_label) = (self.label(from), self.label(to));
        match self.slot_mut(to)? {
            Slot::Input(InputSlot { source, .. }) | Slot::Adapter(AdapterSlot { source, .. }) => {
                if source.is_some() {
                    return Err(CouplingError::Config(format!("'{}' already has a source", to_label)));
                }
                *source = Some(from);
            }
            Slot::Output(_) => {
                return Err(CouplingError::Config(format!("output '{}' can't be a link target", to_label)));
            }
        }
        match self.slot_mut(from)? {
            Slot::Output(OutputSlot { targets, .. }) | Slot::Adapter(AdapterSlot { targets, .. }) => {
                targets.push(to);
            }
            Slot::Input(_) => {
                return Err(CouplingError::Config(format!("input '{}' can't be a link source", from_label)));
            }
        }
        debug!(from = %from_label, to = %to_label, "chained");
        Ok(to)
    }

    // --- Access ---

    pub fn slot(&self, id: SlotId) -> Result<&Slot> {
        self.slots
            .get(id.index())
            .ok_or_else(|| CouplingError::Config(format!("unknown slot {}", id)))
    }

    fn slot_mut(&mut self, id: SlotId) -> Result<&mut Slot> {
        self.slots
            .get_mut(id.index())
            .ok_or_else(|| CouplingError::Config(format!("unknown slot {}", id)))
    }

    pub fn slots(&self) -> impl Iterator<Item = (SlotId, &Slot)> {
        self.slots.iter().enumerate().map(|(i, s)| (SlotId::new(i), s))
    }

    pub fn input(&self, id: SlotId) -> Result<&InputSlot> {
        match self.slot(id)? {
            Slot::Input(s) => Ok(s),
            other => Err(CouplingError::Config(format!("'{}' is not an input", other.name()))),
        }
    }

    fn input_mut(&mut self, id: SlotId) -> Result<&mut InputSlot> {
        match self.slot_mut(id)? {
            Slot::Input(s) => Ok(s),
            other => Err(CouplingError::Config(format!("'{}' is not an input", other.name()))),
        }
    }

    pub fn output(&self, id: SlotId) -> Result<&OutputSlot> {
        match self.slot(id)? {
            Slot::Output(s) => Ok(s),
            other => Err(CouplingError::Config(format!("'{}' is not an output", other.name()))),
        }
    }

    fn output_mut(&mut self, id: SlotId) -> Result<&mut OutputSlot> {
        match self.slot_mut(id)? {
            Slot::Output(s) => Ok(s),
            other => Err(CouplingError::Config(format!("'{}' is not an output", other.name()))),
        }
    }

    pub fn adapter(&self, id: SlotId) -> Result<&AdapterSlot> {
        match self.slot(id)? {
            Slot::Adapter(s) => Ok(s),
            other => Err(CouplingError::Config(format!("'{}' is not an adapter", other.name()))),
        }
    }

    fn adapter_mut(&mut self, id: SlotId) -> Result<&mut AdapterSlot> {
        match self.slot_mut(id)? {
            Slot::Adapter(s) => Ok(s),
            other => Err(CouplingError::Config(format!("'{}' is not an adapter", other.name()))),
        }
    }

    pub fn kind(&self, id: SlotId) -> Option<SlotKind> {
        self.slots.get(id.index()).map(Slot::kind)
    }

    pub fn source_of(&self, id: SlotId) -> Option<SlotId> {
        match self.slots.get(id.index())? {
            Slot::Input(s) => s.source,
            Slot::Adapter(s) => s.source,
            Slot::Output(_) => None,
        }
    }

    pub fn targets_of(&self, id: SlotId) -> &[SlotId] {
        match self.slots.get(id.index()) {
            Some(Slot::Output(s)) => &s.targets,
            Some(Slot::Adapter(s)) => &s.targets,
            _ => &[],
        }
    }

    pub fn owner_of(&self, id: SlotId) -> Option<ComponentId> {
        match self.slots.get(id.index())? {
            Slot::Input(s) => s.owner,
            Slot::Output(s) => s.owner,
            Slot::Adapter(_) => None,
        }
    }

    /// Human-readable slot name, `Component.slot` for component slots.
    pub fn label(&self, id: SlotId) -> String {
        match self.slots.get(id.index()) {
            Some(slot) => match self.owner_of(id) {
                Some(owner) => format!("{}.{}", self.component_name(owner), slot.name()),
                None => slot.name().to_string(),
            },
            None => format!("{}", id),
        }
    }

    // --- Traversal ---

    /// Walks backwards through adapters to the feeding output, if any.
    pub fn resolve_source(&self, input: SlotId) -> Option<SlotId> {
        let mut current = self.source_of(input)?;
        loop {
            match self.slots.get(current.index())? {
                Slot::Output(_) => return Some(current),
                Slot::Adapter(a) => current = a.source?,
                Slot::Input(_) => return None,
            }
        }
    }

    /// Feeding output of `input` and whether a dependency-breaking adapter lies in between.
    pub fn upstream_output(&self, input: SlotId) -> Option<(SlotId, bool)> {
        let mut broken = false;
        let mut current = self.source_of(input)?;
        loop {
            match self.slots.get(current.index())? {
                Slot::Output(_) => return Some((current, broken)),
                Slot::Adapter(a) => {
                    broken |= a.breaks_dependency;
                    current = a.source?;
                }
                Slot::Input(_) => return None,
            }
        }
    }

    // --- Protocol: connect ---

    /// Registers `input` with its source so the source knows its consumer count.
    pub fn ping(&mut self, input: SlotId) -> Result<()> {
        let source = self.input(input)?.source.ok_or_else(|| self.unconnected(input))?;
        self.pinged(source, input)
    }

    fn pinged(&mut self, id: SlotId, by: SlotId) -> Result<()> {
        let by_adapter = self.kind(by) == Some(SlotKind::Adapter);
        match self.slot_mut(id)? {
            Slot::Output(out) => out.pinged(by, by_adapter),
            Slot::Adapter(adapter) => {
                adapter.pinged_by.push(by);
                if adapter.pinged_by.len() > 1 {
                    return Ok(());
                }
                let source = adapter.source.ok_or_else(|| {
                    CouplingError::Config(format!("adapter '{}' has no source", adapter.name))
                })?;
                self.pinged(source, id)
            }
            Slot::Input(inp) => Err(CouplingError::Config(format!("input '{}' can't be pinged", inp.name))),
        }
    }

    /// Sets the descriptor an output offers.
    pub fn push_info(&mut self, output: SlotId, info: Info) -> Result<()> {
        trace!(output = %self.label(output), %info, "push info");
        self.output_mut(output)?.info = Some(info);
        Ok(())
    }

    /// Downstream side of the descriptor exchange (outputs and adapters).
    pub fn get_info(&mut self, id: SlotId, request: &Info) -> Result<Info> {
        trace!(slot = %self.label(id), "get info");
        match self.slot(id)?.kind() {
            SlotKind::Output => self.output_mut(id)?.exchange(request),
            SlotKind::Adapter => self.adapter_get_info(id, request),
            SlotKind::Input => Err(CouplingError::Config(format!("can't get info from input '{}'", self.label(id)))),
        }
    }

    fn adapter_get_info(&mut self, id: SlotId, request: &Info) -> Result<Info> {
        let adapter = self.adapter_mut(id)?;
        if let Some(out) = &adapter.out_info {
            if let Err(failures) = out.accepts(request, true) {
                return Err(CouplingError::Incompatible { slot: adapter.name.clone(), failures });
            }
            let agreed = out.clone();
            adapter.infos_exchanged += 1;
            return Ok(agreed);
        }

        let name = adapter.name.clone();
        let source = adapter
            .source
            .ok_or_else(|| CouplingError::Config(format!("adapter '{}' has no source", name)))?;
        let up_request = adapter.kind.upstream_request(request);

        let src_info = self.get_info(source, &up_request)?;

        let adapter = self.adapter_mut(id)?;
        let (in_info, conversion) = agree(&name, &src_info, &up_request)?;
        let out_info = adapter.kind.output_info(&name, &in_info)?;
        debug!(adapter = %name, %in_info, %out_info, "adapter info exchanged");

        adapter.conversion = conversion;
        adapter.in_info = Some(in_info);
        adapter.out_info = Some(out_info.clone());
        adapter.infos_exchanged = 1;
        Ok(out_info)
    }

    /// Upstream side of the descriptor exchange for a component input.
    pub fn exchange_info(&mut self, input: SlotId, request: &Info) -> Result<Info> {
        let inp = self.input(input)?;
        if inp.is_exchanged() {
            return Err(CouplingError::meta(&self.label(input), "input info was already exchanged"));
        }
        let source = inp.source.ok_or_else(|| self.unconnected(input))?;

        let src_info = self.get_info(source, request)?;
        let agreed = self.input_mut(input)?.accept_info(&src_info, request)?;
        debug!(input = %self.label(input), info = %agreed, "input info exchanged");
        Ok(agreed)
    }

    // --- Protocol: data ---

    /// Stores `value` in `output` and notifies every downstream target.
    pub fn push(&mut self, output: SlotId, value: Value, time: SimTime) -> Result<()> {
        trace!(output = %self.label(output), %time, "push data");
        if self.output_mut(output)?.store(value, time)? {
            self.notify(output, time)?;
        }
        Ok(())
    }

    /// Calls `source_changed(time)` on every target of `id`.
    pub fn notify(&mut self, id: SlotId, time: SimTime) -> Result<()> {
        let targets = self.targets_of(id).to_vec();
        for target in targets {
            self.source_changed(target, time)?;
        }
        Ok(())
    }

    fn source_changed(&mut self, id: SlotId, time: SimTime) -> Result<()> {
        match self.slot(id)? {
            Slot::Input(inp) => {
                trace!(input = %inp.name, %time, "source changed");
                if let (true, Some(component)) = (inp.spec.notifying, inp.owner) {
                    self.notifications.push_back(Notification { component, input: id, time });
                }
                Ok(())
            }
            Slot::Adapter(adapter) => {
                if adapter.kind.is_time_caching() {
                    let name = adapter.name.clone();
                    let source = adapter
                        .source
                        .ok_or_else(|| CouplingError::Config(format!("adapter '{}' has no source", name)))?;
                    let raw = self.get(source, time, id)?;
                    let adapter = self.adapter_mut(id)?;
                    let value = adapter.conversion.apply(raw)?;
                    adapter.kind.sample(&name, time, value)?;
                }
                self.notify(id, time)
            }
            Slot::Output(out) => Err(CouplingError::Config(format!("output '{}' has no source", out.name))),
        }
    }

    /// Data of `id` (output or adapter) at `time`, on behalf of `requester`.
    pub fn get(&mut self, id: SlotId, time: SimTime, requester: SlotId) -> Result<Value> {
        match self.slot_mut(id)? {
            Slot::Output(out) => out.serve(time, requester),
            Slot::Adapter(adapter) if adapter.kind.is_time_caching() => {
                let name = adapter.name.clone();
                adapter.kind.serve(&name, time)
            }
            Slot::Adapter(adapter) => {
                let name = adapter.name.clone();
                let source = adapter
                    .source
                    .ok_or_else(|| CouplingError::Config(format!("adapter '{}' has no source", name)))?;
                let raw = self.get(source, time, id)?;
                let adapter = self.adapter(id)?;
                let value = adapter.conversion.apply(raw)?;
                match &adapter.kind {
                    AdapterKind::Transform(t) => t.apply(value, time),
                    _ => Ok(value),
                }
            }
            Slot::Input(inp) => Err(CouplingError::Config(format!("can't get data from input '{}'", inp.name))),
        }
    }

    /// Pulls the converted, checked value for `input` at `time`.
    pub fn pull(&mut self, input: SlotId, time: SimTime) -> Result<Value> {
        let inp = self.input(input)?;
        if let (true, Some(cached)) = (inp.spec.is_static, &inp.cached) {
            return Ok(cached.clone());
        }
        let source = inp.source.ok_or_else(|| self.unconnected(input))?;

        let raw = self.get(source, time, input)?;
        let inp = self.input_mut(input)?;
        let value = inp.convert(raw)?;
        if inp.spec.is_static {
            inp.cached = Some(value.clone());
        }
        trace!(input = %self.label(input), %time, "pulled");
        Ok(value)
    }

    // --- Notifications / teardown ---

    pub fn pop_notification(&mut self) -> Option<Notification> {
        self.notifications.pop_front()
    }

    pub fn has_notifications(&self) -> bool { !self.notifications.is_empty() }

    /// Clears the buffers of all time-caching adapters.
    pub fn clear_adapters(&mut self) {
        for slot in &mut self.slots {
            if let Slot::Adapter(adapter) = slot {
                adapter.kind.clear();
            }
        }
    }

    fn unconnected(&self, input: SlotId) -> CouplingError {
        let component = self.owner_of(input).map_or("", |c| self.component_name(c)).to_string();
        let name = self.slots.get(input.index()).map_or("?", |s| s.name()).to_string();
        CouplingError::UnconnectedInput { component, input: name }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{NoDomain, Unit};
    use std::sync::Arc;

    fn info() -> Info { Info::new(Some(SimTime(0.0)), Some(Arc::new(NoDomain))) }

    /// Out -> [adapter] -> In, pinged and exchanged.
    fn wired(adapter: Option<AdapterKind>) -> (SlotGraph, SlotId, SlotId) {
        let mut g = SlotGraph::new();
        let src = g.register_component("Src");
        let dst = g.register_component("Dst");
        let out = g.add_output(Some(src), "Out", OutputSpec::new());
        let inp = g.add_input(Some(dst), "In", InputSpec::notifying());
        match adapter {
            Some(kind) => {
                let ada = g.add_adapter("Ada", kind);
                g.chain(out, ada).unwrap();
                g.chain(ada, inp).unwrap();
            }
            None => {
                g.chain(out, inp).unwrap();
            }
        }
        g.ping(inp).unwrap();
        g.push_info(out, info()).unwrap();
        g.exchange_info(inp, &Info::new(None, None)).unwrap();
        (g, out, inp)
    }

    #[test]
    fn test_chain_returns_target_and_rejects_second_source() {
        let mut g = SlotGraph::new();
        let a = g.add_output(None, "A", OutputSpec::new());
        let b = g.add_output(None, "B", OutputSpec::new());
        let inp = g.add_input(None, "In", InputSpec::new());
        assert_eq!(g.chain(a, inp).unwrap(), inp);
        assert!(g.chain(b, inp).is_err());
        assert!(g.chain(inp, a).is_err());
    }

    #[test]
    fn test_push_notifies_and_pull_reads() {
        let (mut g, out, inp) = wired(None);
        g.push(out, Value::Scalar(1.0), SimTime(0.0)).unwrap();

        let n = g.pop_notification().unwrap();
        assert_eq!(n.input, inp);
        assert_eq!(n.time, SimTime(0.0));
        assert!(g.pop_notification().is_none());
        assert_eq!(g.pull(inp, SimTime(0.0)).unwrap(), Value::Scalar(1.0));
    }

    #[test]
    fn test_exchange_twice_fails() {
        let (mut g, _, inp) = wired(None);
        let err = g.exchange_info(inp, &Info::new(None, None)).unwrap_err();
        assert!(matches!(err, CouplingError::MetaData { .. }));
    }

    #[test]
    fn test_unconnected_input() {
        let mut g = SlotGraph::new();
        let c = g.register_component("C");
        let inp = g.add_input(Some(c), "In", InputSpec::new());
        let err = g.ping(inp).unwrap_err();
        assert_eq!(err, CouplingError::UnconnectedInput { component: "C".into(), input: "In".into() });
    }

    #[test]
    fn test_linear_adapter_through_graph() {
        let (mut g, out, inp) = wired(Some(AdapterKind::linear()));
        g.push(out, Value::Scalar(0.0), SimTime(0.0)).unwrap();
        g.push(out, Value::Scalar(10.0), SimTime(10.0)).unwrap();

        assert_eq!(g.pull(inp, SimTime(5.0)).unwrap(), Value::Scalar(5.0));
        assert!(matches!(g.pull(inp, SimTime(11.0)), Err(CouplingError::TimeRange { .. })));
    }

    #[test]
    fn test_unit_conversion_through_adapter() {
        let mut g = SlotGraph::new();
        let out = g.add_output(None, "Out", OutputSpec::new());
        let ada = g.add_adapter("ToMM", AdapterKind::convert_units(Unit::parse("mm").unwrap()));
        let inp = g.add_input(None, "In", InputSpec::new());
        g.chain(out, ada).unwrap();
        g.chain(ada, inp).unwrap();
        g.ping(inp).unwrap();
        g.push_info(out, info().with_units(Unit::parse("m").unwrap())).unwrap();

        let agreed = g.exchange_info(inp, &Info::default().with_units(Unit::parse("mm").unwrap())).unwrap();
        assert_eq!(agreed.units, Some(Unit::parse("mm").unwrap()));

        g.push(out, Value::Scalar(0.25), SimTime(0.0)).unwrap();
        assert_eq!(g.pull(inp, SimTime(0.0)).unwrap(), Value::Scalar(250.0));
    }

    #[test]
    fn test_static_input_caches_first_pull() {
        let mut g = SlotGraph::new();
        let out = g.add_output(None, "Out", OutputSpec::static_());
        let inp = g.add_input(None, "In", InputSpec::static_());
        g.chain(out, inp).unwrap();
        g.ping(inp).unwrap();
        g.push_info(out, Info::new(None, Some(Arc::new(NoDomain)))).unwrap();
        g.exchange_info(inp, &Info::new(None, None)).unwrap();
        g.push(out, Value::Scalar(7.0), SimTime(0.0)).unwrap();

        assert_eq!(g.pull(inp, SimTime(3.0)).unwrap(), Value::Scalar(7.0));
        assert_eq!(g.pull(inp, SimTime(9.0)).unwrap(), Value::Scalar(7.0));
    }

    #[test]
    fn test_callback_output_pulled_without_push() {
        let mut g = SlotGraph::new();
        let out = g.add_callback_output(None, "Out", |t| Ok(Value::Scalar(t.as_f64() + 0.5)));
        let inp = g.add_input(None, "In", InputSpec::new());
        g.chain(out, inp).unwrap();
        g.ping(inp).unwrap();
        g.push_info(out, info()).unwrap();
        g.exchange_info(inp, &Info::new(None, None)).unwrap();

        assert_eq!(g.pull(inp, SimTime(2.0)).unwrap(), Value::Scalar(2.5));
        assert_eq!(g.pull(inp, SimTime(1.0)).unwrap(), Value::Scalar(1.5));
        assert!(g.push(out, Value::Scalar(0.0), SimTime(0.0)).is_err());
    }

    #[test]
    fn test_stateless_branch_shares_served_time() {
        let mut g = SlotGraph::new();
        let out = g.add_output(None, "Out", OutputSpec::new());
        let scale = g.add_adapter("Scale", AdapterKind::scale(2.0));
        let fast = g.add_input(None, "Fast", InputSpec::new());
        let slow = g.add_input(None, "Slow", InputSpec::new());
        g.chain(out, scale).unwrap();
        g.chain(scale, fast).unwrap();
        g.chain(scale, slow).unwrap();
        for inp in [fast, slow] {
            g.ping(inp).unwrap();
        }
        g.push_info(out, info()).unwrap();
        for inp in [fast, slow] {
            g.exchange_info(inp, &Info::new(None, None)).unwrap();
        }
        for t in [0.0, 1.0, 2.0] {
            g.push(out, Value::Scalar(t), SimTime(t)).unwrap();
        }

        // Both consumers count as the adapter at the output, so the faster
        // pull drops samples the slower one has not read yet.
        assert_eq!(g.pull(slow, SimTime(0.0)).unwrap(), Value::Scalar(0.0));
        assert_eq!(g.pull(fast, SimTime(2.0)).unwrap(), Value::Scalar(4.0));
        assert!(matches!(g.pull(slow, SimTime(1.0)), Err(CouplingError::TimeRange { .. })));
        assert_eq!(g.pull(slow, SimTime(2.0)).unwrap(), Value::Scalar(4.0));
    }
}
