//! Output slot state and its data cache.
use super::types::{ComponentId, OutputSpec, SlotId};
use crate::data::{Info, Value};
use crate::error::{CouplingError, Result};
use crate::time::SimTime;
use indexmap::IndexMap;
use smallvec::SmallVec;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use tracing::{trace, warn};

pub type PullFn = Arc<dyn Fn(SimTime) -> Result<Value> + Send + Sync>;

/// Data source of an output that computes its value when pulled.
#[derive(Clone)]
pub struct PullCallback(pub(crate) PullFn);

impl fmt::Debug for PullCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str("PullCallback") }
}

#[derive(Debug, Clone)]
pub struct OutputSlot {
    pub name: String,
    pub owner: Option<ComponentId>,
    pub spec: OutputSpec,
    pub targets: SmallVec<[SlotId; 2]>,
    pub(crate) info: Option<Info>,
    pub(crate) infos_exchanged: usize,
    /// Pinging consumers -> last time they were served.
    pub(crate) connected: IndexMap<SlotId, Option<SimTime>>,
    pub(crate) data: VecDeque<(SimTime, Value)>,
    /// Set for callback outputs, which never buffer pushed data.
    pub(crate) callback: Option<PullCallback>,
}

impl OutputSlot {
    pub fn new(name: &str, owner: Option<ComponentId>, spec: OutputSpec) -> Self {
        Self {
            name: name.to_string(),
            owner,
            spec,
            targets: SmallVec::new(),
            info: None,
            infos_exchanged: 0,
            connected: IndexMap::new(),
            data: VecDeque::new(),
            callback: None,
        }
    }

    /// Output computing its data on every pull, for components without a time step.
    pub fn with_callback(name: &str, owner: Option<ComponentId>, callback: PullFn) -> Self {
        Self { callback: Some(PullCallback(callback)), ..Self::new(name, owner, OutputSpec::new()) }
    }

    pub fn is_callback(&self) -> bool { self.callback.is_some() }

    pub fn info(&self) -> Option<&Info> { self.info.as_ref() }

    pub fn has_targets(&self) -> bool { !self.targets.is_empty() }

    /// Every pinging consumer has exchanged its descriptor.
    pub fn is_exchanged(&self) -> bool {
        self.info.is_some() && self.infos_exchanged >= self.connected.len()
    }

    pub fn has_data(&self) -> bool { !self.data.is_empty() }

    pub fn last_time(&self) -> Option<SimTime> { self.data.back().map(|(t, _)| *t) }

    pub(crate) fn pinged(&mut self, by: SlotId, by_adapter: bool) -> Result<()> {
        if !by_adapter && self.connected.contains_key(&by) {
            return Err(CouplingError::Config(format!(
                "input {} is already connected to output '{}'",
                by, self.name
            )));
        }
        self.connected.insert(by, None);
        Ok(())
    }

    pub(crate) fn exchange(&mut self, request: &Info) -> Result<Info> {
        let name = self.name.clone();
        let is_static = self.spec.is_static;
        let infos_exchanged = self.infos_exchanged;
        let info = self
            .info
            .as_mut()
            .ok_or_else(|| CouplingError::no_data(format!("no data info available in '{}'", name)))?;

        if infos_exchanged > 0 {
            if let Err(failures) = info.accepts(request, true) {
                return Err(CouplingError::Incompatible { slot: name, failures });
            }
        }
        info.fill_from(&name, request, is_static)?;
        let agreed = info.clone();

        self.infos_exchanged += 1;
        Ok(agreed)
    }

    /// Stores a pushed value. Returns `false` if the push was skipped.
    pub(crate) fn store(&mut self, value: Value, time: SimTime) -> Result<bool> {
        if self.is_callback() {
            return Err(CouplingError::data(&self.name, "callback outputs don't accept pushed data"));
        }
        if !self.has_targets() {
            trace!(output = %self.name, "skipping push to unconnected output");
            return Ok(false);
        }
        if self.infos_exchanged < self.connected.len() || self.info.is_none() {
            return Err(CouplingError::no_data(format!(
                "can't push data to '{}' before output info was exchanged",
                self.name
            )));
        }
        if self.spec.is_static && !self.data.is_empty() {
            return Err(CouplingError::data(&self.name, "can't push data repeatedly to a static output"));
        }
        if let Some(info) = &self.info {
            info.check_value(&self.name, &value)?;
        }

        match self.data.back() {
            Some((last, _)) if !self.spec.is_static && time < *last => {
                return Err(CouplingError::time(
                    &self.name,
                    format!("push at {} is older than the latest push at {}", time, last),
                ));
            }
            Some((last, _)) if *last == time => {
                self.data.pop_back();
            }
            _ => {}
        }
        self.data.push_back((time, value));
        trace!(output = %self.name, cache = self.data.len(), "data cached");
        Ok(true)
    }

    /// Serves the value for `time` to `requester`.
    ///
    /// Callback outputs compute the value. Non-static outputs answer with the
    /// nearest cached sample inside the cached range, then drop samples no
    /// consumer can ask for anymore.
    pub(crate) fn serve(&mut self, time: SimTime, requester: SlotId) -> Result<Value> {
        if self.info.is_none() {
            return Err(CouplingError::no_data(format!("no data info available in '{}'", self.name)));
        }
        if self.infos_exchanged < self.connected.len() {
            return Err(CouplingError::no_data(format!(
                "data info was not yet exchanged in '{}'",
                self.name
            )));
        }
        if let (Some(PullCallback(callback)), Some(info)) = (&self.callback, &self.info) {
            let value = callback(time)?;
            info.check_value(&self.name, &value)?;
            return Ok(value);
        }
        let (Some((first, _)), Some((last, _))) = (self.data.front(), self.data.back()) else {
            return Err(CouplingError::no_data(format!("no data available in '{}'", self.name)));
        };

        if self.spec.is_static {
            return Ok(self.data[0].1.clone());
        }
        if time < *first || time > *last {
            return Err(CouplingError::time(
                &self.name,
                format!("requested time {} out of range [{}, {}]", time, first, last),
            ));
        }

        let (sample_time, value) = self.nearest(time);
        if sample_time != time {
            warn!(output = %self.name, requested = %time, served = %sample_time, "serving data of another time");
        }
        self.clear_served(time, requester);
        Ok(value)
    }

    /// Cached sample closest to `time`, with its timestamp.
    fn nearest(&self, time: SimTime) -> (SimTime, Value) {
        let idx = self.data.partition_point(|(t, _)| *t < time);
        let (t, v) = &self.data[idx];
        if *t == time || idx == 0 {
            return (*t, v.clone());
        }
        let (t_prev, v_prev) = &self.data[idx - 1];
        let t_half = *t_prev + (*t - *t_prev) / 2.0;
        if time < t_half { (*t_prev, v_prev.clone()) } else { (*t, v.clone()) }
    }

    fn clear_served(&mut self, time: SimTime, requester: SlotId) {
        if let Some(served) = self.connected.get_mut(&requester) {
            *served = Some(time);
        }
        let mut t_min: Option<SimTime> = None;
        for served in self.connected.values() {
            match served {
                None => return,
                Some(t) => t_min = Some(t_min.map_or(*t, |m| m.min(*t))),
            }
        }
        let Some(t_min) = t_min else { return };
        while self.data.len() > 1 && self.data[1].0 <= t_min {
            self.data.pop_front();
        }
    }
}
