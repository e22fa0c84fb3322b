//! Fixed-point connect engine.
//!
//! A component declares once what it needs (`ConnectorSpec`) and offers
//! whatever it knows each round (`Offer`). Every call advances as far as the
//! currently available information allows; missing information
//! (`CouplingError::NoData`) is not an error, it just ends a sub-step.

use super::rules::{evaluate, InfoRule};
use crate::component::ComponentStatus;
use crate::data::{Info, Value};
use crate::error::{CouplingError, Result};
use crate::slot::{SlotGraph, SlotId};
use crate::time::SimTime;
use indexmap::IndexMap;
use tracing::{debug, trace};

/// What a component requires to finish connecting.
#[derive(Debug, Clone)]
pub struct ConnectorSpec {
    /// Inputs whose initial data must be pulled.
    pub pull_data: Vec<String>,
    pub in_rules: IndexMap<String, Vec<InfoRule>>,
    pub out_rules: IndexMap<String, Vec<InfoRule>>,
    /// Keep offers from earlier calls.
    pub cache: bool,
}

impl Default for ConnectorSpec {
    fn default() -> Self {
        Self { pull_data: Vec::new(), in_rules: IndexMap::new(), out_rules: IndexMap::new(), cache: true }
    }
}

impl ConnectorSpec {
    pub fn new() -> Self { Self::default() }

    pub fn pull(mut self, input: &str) -> Self {
        self.pull_data.push(input.to_string());
        self
    }

    pub fn in_rule(mut self, input: &str, rule: InfoRule) -> Self {
        self.in_rules.entry(input.to_string()).or_default().push(rule);
        self
    }

    pub fn out_rule(mut self, output: &str, rule: InfoRule) -> Self {
        self.out_rules.entry(output.to_string()).or_default().push(rule);
        self
    }

    pub fn no_cache(mut self) -> Self {
        self.cache = false;
        self
    }
}

/// Information a component can provide in one connect round.
#[derive(Debug, Clone, Default)]
pub struct Offer {
    pub exchange_infos: IndexMap<String, Info>,
    pub push_infos: IndexMap<String, Info>,
    pub push_data: IndexMap<String, Value>,
}

impl Offer {
    pub fn new() -> Self { Self::default() }

    pub fn exchange_info(mut self, input: &str, request: Info) -> Self {
        self.exchange_infos.insert(input.to_string(), request);
        self
    }

    pub fn push_info(mut self, output: &str, info: Info) -> Self {
        self.push_infos.insert(output.to_string(), info);
        self
    }

    pub fn push_data(mut self, output: &str, value: impl Into<Value>) -> Self {
        self.push_data.insert(output.to_string(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.exchange_infos.is_empty() && self.push_infos.is_empty() && self.push_data.is_empty()
    }

    fn merge(&mut self, other: Offer) {
        self.exchange_infos.extend(other.exchange_infos);
        self.push_infos.extend(other.push_infos);
        self.push_data.extend(other.push_data);
    }
}

/// Turns a transient failure into "not yet", propagating everything else.
fn soft<T>(r: Result<T>) -> Result<Option<T>> {
    match r {
        Ok(v) => Ok(Some(v)),
        Err(e) if e.is_transient() => {
            trace!(reason = %e, "not available yet");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// Per-component connect state, discarded once the component is connected.
#[derive(Debug, Clone)]
pub struct Negotiator {
    component: String,
    inputs: IndexMap<String, SlotId>,
    outputs: IndexMap<String, SlotId>,
    spec: ConnectorSpec,
    cached: Offer,

    in_infos: IndexMap<String, Option<Info>>,
    out_infos: IndexMap<String, Option<Info>>,
    pulled: IndexMap<String, Option<Value>>,
    infos_pushed: IndexMap<String, bool>,
    data_pushed: IndexMap<String, bool>,
}

impl Negotiator {
    pub fn new(
        component: &str,
        inputs: &IndexMap<String, SlotId>,
        outputs: &IndexMap<String, SlotId>,
        spec: ConnectorSpec,
    ) -> Result<Self> {
        let unknown = |kind: &str, name: &str| {
            CouplingError::Config(format!("component '{}' has no {} '{}'", component, kind, name))
        };
        for name in &spec.pull_data {
            if !inputs.contains_key(name) {
                return Err(unknown("input", name));
            }
        }
        for (slot, is_input, rules) in spec
            .in_rules
            .iter()
            .map(|(n, r)| (n, true, r))
            .chain(spec.out_rules.iter().map(|(n, r)| (n, false, r)))
        {
            let own = if is_input { inputs } else { outputs };
            if !own.contains_key(slot) {
                return Err(unknown(if is_input { "input" } else { "output" }, slot));
            }
            for (peer, peer_is_input) in rules.iter().filter_map(InfoRule::peer) {
                let peers = if peer_is_input { inputs } else { outputs };
                if !peers.contains_key(peer) {
                    return Err(unknown(if peer_is_input { "input" } else { "output" }, peer));
                }
            }
        }

        Ok(Self {
            component: component.to_string(),
            inputs: inputs.clone(),
            outputs: outputs.clone(),
            in_infos: inputs.keys().map(|k| (k.clone(), None)).collect(),
            out_infos: outputs.keys().map(|k| (k.clone(), None)).collect(),
            pulled: spec.pull_data.iter().map(|k| (k.clone(), None)).collect(),
            infos_pushed: outputs.keys().map(|k| (k.clone(), false)).collect(),
            data_pushed: outputs.keys().map(|k| (k.clone(), false)).collect(),
            spec,
            cached: Offer::new(),
        })
    }

    // --- Accessors ---

    pub fn in_info(&self, input: &str) -> Option<&Info> { self.in_infos.get(input)?.as_ref() }
    pub fn out_info(&self, output: &str) -> Option<&Info> { self.out_infos.get(output)?.as_ref() }
    pub fn in_data(&self, input: &str) -> Option<&Value> { self.pulled.get(input)?.as_ref() }
    pub fn info_pushed(&self, output: &str) -> bool { self.infos_pushed.get(output).copied().unwrap_or(false) }
    pub fn data_pushed(&self, output: &str) -> bool { self.data_pushed.get(output).copied().unwrap_or(false) }

    pub fn is_connected(&self) -> bool {
        self.in_infos.values().all(Option::is_some)
            && self.out_infos.values().all(Option::is_some)
            && self.pulled.values().all(Option::is_some)
            && self.infos_pushed.values().all(|&v| v)
            && self.data_pushed.values().all(|&v| v)
    }

    /// One connect round. Returns `Connected`, `Connecting` or `ConnectingIdle`.
    pub fn connect(&mut self, graph: &mut SlotGraph, start: Option<SimTime>, offer: Offer) -> Result<ComponentStatus> {
        let offer = if self.spec.cache {
            self.cached.merge(offer);
            self.cached.clone()
        } else {
            offer
        };
        self.check_offer(&offer)?;

        let mut any_done = self.exchange_in_infos(graph, &offer)?;
        any_done |= self.pull_out_infos(graph)?;
        any_done |= self.push_out_infos(graph, &offer)?;
        any_done |= self.push_out_data(graph, start, &offer)?;
        any_done |= self.pull_in_data(graph, start)?;

        let status = if self.is_connected() {
            ComponentStatus::Connected
        } else if any_done {
            ComponentStatus::Connecting
        } else {
            ComponentStatus::ConnectingIdle
        };
        debug!(component = %self.component, ?status, "connect round");
        Ok(status)
    }

    fn check_offer(&self, offer: &Offer) -> Result<()> {
        for name in offer.exchange_infos.keys() {
            if !self.inputs.contains_key(name) {
                return Err(CouplingError::Config(format!("component '{}' has no input '{}'", self.component, name)));
            }
            if self.spec.in_rules.contains_key(name) {
                return Err(CouplingError::Config(format!(
                    "input '{}' of '{}' has both an offered info and derivation rules",
                    name, self.component
                )));
            }
        }
        for name in offer.push_infos.keys().chain(offer.push_data.keys()) {
            if !self.outputs.contains_key(name) {
                return Err(CouplingError::Config(format!("component '{}' has no output '{}'", self.component, name)));
            }
        }
        for name in offer.push_infos.keys() {
            if self.spec.out_rules.contains_key(name) {
                return Err(CouplingError::Config(format!(
                    "output '{}' of '{}' has both an offered info and derivation rules",
                    name, self.component
                )));
            }
        }
        Ok(())
    }

    // 1. Exchange outstanding input descriptors, rules first.
    fn exchange_in_infos(&mut self, graph: &mut SlotGraph, offer: &Offer) -> Result<bool> {
        let mut any_done = false;
        let pending: Vec<String> = self.in_infos.iter().filter(|(_, v)| v.is_none()).map(|(k, _)| k.clone()).collect();
        for name in pending {
            let request = match self.spec.in_rules.get(&name) {
                Some(rules) => evaluate(rules, Info::default(), &self.in_infos, &self.out_infos),
                None => offer.exchange_infos.get(&name).cloned(),
            };
            let (Some(request), Some(&slot)) = (request, self.inputs.get(&name)) else {
                continue;
            };
            if let Some(info) = soft(graph.exchange_info(slot, &request))? {
                self.in_infos.insert(name, Some(info));
                any_done = true;
            }
        }
        Ok(any_done)
    }

    // 2. Pull outstanding output descriptors agreed with downstream.
    fn pull_out_infos(&mut self, graph: &mut SlotGraph) -> Result<bool> {
        let mut any_done = false;
        for (name, info) in self.out_infos.iter_mut() {
            if info.is_some() {
                continue;
            }
            let Some(&slot) = self.outputs.get(name) else { continue };
            let out = graph.output(slot)?;
            if self.infos_pushed.get(name).copied().unwrap_or(false) && out.is_exchanged() {
                *info = out.info().cloned();
                any_done = true;
            }
        }
        Ok(any_done)
    }

    // 3. Push outstanding derived or offered output descriptors.
    fn push_out_infos(&mut self, graph: &mut SlotGraph, offer: &Offer) -> Result<bool> {
        let mut any_done = false;
        let pending: Vec<String> =
            self.infos_pushed.iter().filter(|(_, &done)| !done).map(|(k, _)| k.clone()).collect();
        for name in pending {
            let info = match self.spec.out_rules.get(&name) {
                Some(rules) => evaluate(rules, Info::default(), &self.in_infos, &self.out_infos),
                None => offer.push_infos.get(&name).cloned(),
            };
            let (Some(info), Some(&slot)) = (info, self.outputs.get(&name)) else {
                continue;
            };
            graph.push_info(slot, info)?;
            // Without consumers the pushed descriptor is final right away.
            let out = graph.output(slot)?;
            if out.is_exchanged() {
                self.out_infos.insert(name.clone(), out.info().cloned());
            }
            self.infos_pushed.insert(name, true);
            any_done = true;
        }
        Ok(any_done)
    }

    // 4. Push outstanding output data once the descriptor is out.
    fn push_out_data(&mut self, graph: &mut SlotGraph, start: Option<SimTime>, offer: &Offer) -> Result<bool> {
        let mut any_done = false;
        // Callback outputs compute on pull and never take initial data.
        for (name, &slot) in &self.outputs {
            if graph.output(slot)?.is_callback() {
                self.data_pushed.insert(name.clone(), true);
            }
        }
        for (name, value) in &offer.push_data {
            if self.data_pushed.get(name).copied().unwrap_or(true) || !self.info_pushed(name) {
                continue;
            }
            let Some(&slot) = self.outputs.get(name) else { continue };
            let time = self.connect_time(graph.output(slot)?.spec.is_static, start, name)?;
            if soft(graph.push(slot, value.clone(), time))?.is_some() {
                self.data_pushed.insert(name.clone(), true);
                any_done = true;
            }
        }
        Ok(any_done)
    }

    // 5. Pull outstanding required input data once the descriptor is exchanged.
    fn pull_in_data(&mut self, graph: &mut SlotGraph, start: Option<SimTime>) -> Result<bool> {
        let mut any_done = false;
        let pending: Vec<String> = self.pulled.iter().filter(|(_, v)| v.is_none()).map(|(k, _)| k.clone()).collect();
        for name in pending {
            if self.in_info(&name).is_none() {
                continue;
            }
            let Some(&slot) = self.inputs.get(&name) else { continue };
            let time = self.connect_time(graph.input(slot)?.spec.is_static, start, &name)?;
            if let Some(value) = soft(graph.pull(slot, time))? {
                self.pulled.insert(name, Some(value));
                any_done = true;
            }
        }
        Ok(any_done)
    }

    fn connect_time(&self, is_static: bool, start: Option<SimTime>, slot: &str) -> Result<SimTime> {
        match (start, is_static) {
            (Some(t), _) => Ok(t),
            (None, true) => Ok(SimTime::ZERO),
            (None, false) => Err(CouplingError::Config(format!(
                "component '{}' needs a start time to connect '{}'",
                self.component, slot
            ))),
        }
    }
}
