//! Authoring layer for components.
//!
//! A [`Model`] only describes what it declares, offers and computes.
//! [`ModelComponent`] turns it into a [`Component`]: it owns the status
//! machine, the ping phase and the negotiator lifetime.
pub mod connect;

pub use connect::ConnectCx;

use crate::component::{Component, ComponentStatus, Context};
use crate::error::Result;
use crate::negotiate::{ConnectorSpec, Negotiator, Offer};
use crate::time::SimTime;
use tracing::debug;

pub trait Model {
    /// Declares inputs and outputs.
    fn initialize(&mut self, cx: &mut Context) -> Result<()>;

    /// What the negotiator has to resolve before the model is connected.
    fn connector(&self) -> ConnectorSpec { ConnectorSpec::new() }

    /// One connect round. The default offers nothing beyond the connector rules.
    fn connect(&mut self, cx: &mut ConnectCx) -> Result<ComponentStatus> { cx.try_connect(Offer::new()) }

    fn validate(&mut self, _cx: &mut Context) -> Result<()> { Ok(()) }
    fn update(&mut self, _cx: &mut Context) -> Result<()> { Ok(()) }
    fn finalize(&mut self, _cx: &mut Context) -> Result<()> { Ok(()) }

    fn source_changed(&mut self, _cx: &mut Context, _input: &str, _time: SimTime) -> Result<()> { Ok(()) }

    fn time(&self) -> Option<SimTime> { None }
    fn next_time(&self) -> Option<SimTime> { None }
    fn is_finished(&self) -> bool { false }

    fn metadata(&self) -> serde_json::Value { serde_json::Value::Null }
}

pub struct ModelComponent<M: Model> {
    name: String,
    model: M,
    status: ComponentStatus,
    negotiator: Option<Negotiator>,
}

impl<M: Model> ModelComponent<M> {
    pub fn new(name: &str, model: M) -> Self {
        Self { name: name.to_string(), model, status: ComponentStatus::Created, negotiator: None }
    }

    pub fn boxed(name: &str, model: M) -> Box<dyn Component>
    where
        M: 'static,
    {
        Box::new(Self::new(name, model))
    }

    pub fn model(&self) -> &M { &self.model }
    pub fn model_mut(&mut self) -> &mut M { &mut self.model }

    /// Marks the component failed if `r` is an error.
    fn track<T>(&mut self, r: Result<T>) -> Result<T> {
        if r.is_err() {
            self.status = ComponentStatus::Failed;
        }
        r
    }

    fn connect_round(&mut self, cx: &mut Context, start: Option<SimTime>) -> Result<ComponentStatus> {
        // 1. First call: register with sources, set up negotiation.
        if self.status == ComponentStatus::Initialized {
            cx.ping_inputs()?;
            let spec = self.model.connector();
            self.negotiator = Some(Negotiator::new(&self.name, cx.inputs(), cx.outputs(), spec)?);
            return Ok(ComponentStatus::Connecting);
        }

        // 2. Later calls: one negotiation round at the model's own time.
        let Some(mut negotiator) = self.negotiator.take() else {
            return Ok(self.status);
        };
        let start = self.model.time().or(start);
        let status = {
            let mut ccx = ConnectCx::new(cx, &mut negotiator, start);
            self.model.connect(&mut ccx)?
        };
        if status != ComponentStatus::Connected {
            self.negotiator = Some(negotiator);
        }
        Ok(status)
    }
}

impl<M: Model> Component for ModelComponent<M> {
    fn name(&self) -> &str { &self.name }
    fn status(&self) -> ComponentStatus { self.status }

    fn initialize(&mut self, cx: &mut Context) -> Result<()> {
        let r = self.model.initialize(cx);
        self.track(r)?;
        self.status = ComponentStatus::Initialized;
        Ok(())
    }

    fn connect(&mut self, cx: &mut Context, start: Option<SimTime>) -> Result<()> {
        if self.status == ComponentStatus::Connected {
            return Ok(());
        }
        let r = self.connect_round(cx, start);
        self.status = self.track(r)?;
        debug!(component = %self.name, status = %self.status, "connect");
        Ok(())
    }

    fn validate(&mut self, cx: &mut Context) -> Result<()> {
        let r = self.model.validate(cx);
        self.track(r)?;
        self.status = ComponentStatus::Validated;
        Ok(())
    }

    fn update(&mut self, cx: &mut Context) -> Result<()> {
        let r = self.model.update(cx);
        self.track(r)?;
        self.status = if self.model.is_finished() { ComponentStatus::Finished } else { ComponentStatus::Updated };
        Ok(())
    }

    fn finalize(&mut self, cx: &mut Context) -> Result<()> {
        let r = self.model.finalize(cx);
        self.track(r)?;
        self.status = ComponentStatus::Finalized;
        Ok(())
    }

    fn source_changed(&mut self, cx: &mut Context, input: &str, time: SimTime) -> Result<()> {
        let r = self.model.source_changed(cx, input, time);
        self.track(r)
    }

    fn time(&self) -> Option<SimTime> { self.model.time() }
    fn next_time(&self) -> Option<SimTime> { self.model.next_time() }
    fn metadata(&self) -> serde_json::Value { self.model.metadata() }
}
