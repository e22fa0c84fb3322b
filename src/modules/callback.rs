//! Push-driven transformer: recomputes its outputs whenever an input changes.
use crate::component::{ComponentStatus, Context};
use crate::data::{Info, Value};
use crate::error::Result;
use crate::negotiate::{ConnectorSpec, InfoField, InfoRule, Offer};
use crate::sdk::{ConnectCx, Model};
use crate::slot::{InputSpec, OutputSpec};
use crate::time::SimTime;
use indexmap::IndexMap;

pub type CallbackFn = Box<dyn FnMut(&IndexMap<String, Value>, SimTime) -> Result<IndexMap<String, Value>>>;

pub struct CallbackComponent {
    inputs: IndexMap<String, Info>,
    /// Output name -> input it copies its descriptor from.
    outputs: IndexMap<String, String>,
    callback: CallbackFn,
    connected: bool,
}

impl CallbackComponent {
    pub fn new<F>(callback: F) -> Self
    where
        F: FnMut(&IndexMap<String, Value>, SimTime) -> Result<IndexMap<String, Value>> + 'static,
    {
        Self { inputs: IndexMap::new(), outputs: IndexMap::new(), callback: Box::new(callback), connected: false }
    }

    pub fn input(mut self, name: &str, request: Info) -> Self {
        self.inputs.insert(name.to_string(), request);
        self
    }

    /// Adds an output whose descriptor is taken from input `like`.
    pub fn output(mut self, name: &str, like: &str) -> Self {
        self.outputs.insert(name.to_string(), like.to_string());
        self
    }
}

const ALL_FIELDS: [InfoField; 4] = [InfoField::Time, InfoField::Domain, InfoField::Units, InfoField::Mask];

impl Model for CallbackComponent {
    fn initialize(&mut self, cx: &mut Context) -> Result<()> {
        for name in self.inputs.keys() {
            cx.add_input(name, InputSpec::notifying())?;
        }
        for name in self.outputs.keys() {
            cx.add_output(name, OutputSpec::new())?;
        }
        Ok(())
    }

    fn connector(&self) -> ConnectorSpec {
        let spec = self.inputs.keys().fold(ConnectorSpec::new(), |spec, name| spec.pull(name));
        self.outputs
            .iter()
            .fold(spec, |spec, (out, like)| spec.out_rule(out, InfoRule::from_input(like, &ALL_FIELDS)))
    }

    fn connect(&mut self, cx: &mut ConnectCx) -> Result<ComponentStatus> {
        let offer = self.inputs.iter().fold(Offer::new(), |offer, (name, info)| offer.exchange_info(name, info.clone()));
        let mut status = cx.try_connect(offer)?;

        // Once every input delivered its initial value, offer the outputs.
        let ready: Option<IndexMap<String, Value>> =
            self.inputs.keys().map(|name| Some((name.clone(), cx.in_data(name)?.clone()))).collect();
        if status != ComponentStatus::Connected {
            if let (Some(values), Some(start)) = (ready, cx.start()) {
                let outputs = (self.callback)(&values, start)?;
                let offer =
                    outputs.into_iter().fold(Offer::new(), |offer, (name, value)| offer.push_data(&name, value));
                status = status.max_connect_progress(cx.try_connect(offer)?);
            }
        }
        self.connected = status == ComponentStatus::Connected;
        Ok(status)
    }

    fn source_changed(&mut self, cx: &mut Context, _input: &str, time: SimTime) -> Result<()> {
        if !self.connected {
            return Ok(());
        }
        let mut values = IndexMap::with_capacity(self.inputs.len());
        for name in self.inputs.keys() {
            values.insert(name.clone(), cx.pull(name, time)?);
        }
        for (name, value) in (self.callback)(&values, time)? {
            cx.push(&name, value, time)?;
        }
        Ok(())
    }
}
