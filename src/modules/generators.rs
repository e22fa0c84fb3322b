//! Sources: a time-stepped generator and a one-shot static source.
use crate::component::{ComponentStatus, Context};
use crate::data::{Info, Value};
use crate::error::{CouplingError, Result};
use crate::negotiate::Offer;
use crate::sdk::{ConnectCx, Model};
use crate::slot::OutputSpec;
use crate::time::SimTime;
use indexmap::IndexMap;

pub type GenerateFn = Box<dyn FnMut(SimTime) -> Value>;

/// Pushes `f(time)` to each output at start and after every step.
pub struct Generator {
    outputs: IndexMap<String, (Info, GenerateFn)>,
    time: SimTime,
    step: f64,
    offered: bool,
}

impl Generator {
    pub fn new(start: SimTime, step: f64) -> Self {
        Self { outputs: IndexMap::new(), time: start, step, offered: false }
    }

    pub fn output<F>(mut self, name: &str, info: Info, f: F) -> Self
    where
        F: FnMut(SimTime) -> Value + 'static,
    {
        self.outputs.insert(name.to_string(), (info, Box::new(f)));
        self
    }

    fn generate(&mut self) -> Vec<(String, Value)> {
        let time = self.time;
        self.outputs.iter_mut().map(|(name, (_, f))| (name.clone(), f(time))).collect()
    }
}

impl Model for Generator {
    fn initialize(&mut self, cx: &mut Context) -> Result<()> {
        if self.step.is_nan() || self.step <= 0.0 {
            return Err(CouplingError::Config(format!("generator step must be positive, got {}", self.step)));
        }
        for name in self.outputs.keys() {
            cx.add_output(name, OutputSpec::new())?;
        }
        Ok(())
    }

    fn connect(&mut self, cx: &mut ConnectCx) -> Result<ComponentStatus> {
        // Initial values are generated once; the negotiator keeps the offer.
        let mut offer = Offer::new();
        if !self.offered {
            for (name, (info, _)) in &self.outputs {
                offer = offer.push_info(name, info.clone().with_time(self.time));
            }
            for (name, value) in self.generate() {
                offer = offer.push_data(&name, value);
            }
            self.offered = true;
        }
        cx.try_connect(offer)
    }

    fn update(&mut self, cx: &mut Context) -> Result<()> {
        self.time = self.time + self.step;
        for (name, value) in self.generate() {
            cx.push(&name, value, self.time)?;
        }
        Ok(())
    }

    fn time(&self) -> Option<SimTime> { Some(self.time) }
    fn next_time(&self) -> Option<SimTime> { Some(self.time + self.step) }

    fn metadata(&self) -> serde_json::Value {
        serde_json::json!({ "step": self.step, "outputs": self.outputs.keys().collect::<Vec<_>>() })
    }
}

/// Pushes one value per static output during connect.
#[derive(Default)]
pub struct StaticSource {
    outputs: IndexMap<String, (Info, Value)>,
}

impl StaticSource {
    pub fn new() -> Self { Self::default() }

    pub fn output(mut self, name: &str, info: Info, value: impl Into<Value>) -> Self {
        self.outputs.insert(name.to_string(), (info, value.into()));
        self
    }
}

impl Model for StaticSource {
    fn initialize(&mut self, cx: &mut Context) -> Result<()> {
        for name in self.outputs.keys() {
            cx.add_output(name, OutputSpec::static_())?;
        }
        Ok(())
    }

    fn connect(&mut self, cx: &mut ConnectCx) -> Result<ComponentStatus> {
        let offer = self.outputs.iter().fold(Offer::new(), |offer, (name, (info, value))| {
            offer.push_info(name, Info { time: None, ..info.clone() }).push_data(name, value.clone())
        });
        cx.try_connect(offer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::{Component, ComponentIo, RunEnv};
    use crate::data::NoDomain;
    use crate::sdk::ModelComponent;
    use crate::slot::SlotGraph;

    #[test]
    fn test_generator_steps_time() {
        let mut graph = SlotGraph::new();
        let env = RunEnv::default();
        let mut io = ComponentIo::new();
        let id = graph.register_component("Gen");
        let mut cx = Context::new(&mut graph, &env, id, &mut io);

        let gen = Generator::new(SimTime(0.0), 2.0).output("Out", Info::default().with_domain(NoDomain), |t| {
            Value::Scalar(t.as_f64())
        });
        let mut comp = ModelComponent::new("Gen", gen);
        comp.initialize(&mut cx).unwrap();
        comp.connect(&mut cx, None).unwrap();
        comp.connect(&mut cx, None).unwrap();
        assert_eq!(comp.status(), ComponentStatus::Connected);
        comp.validate(&mut cx).unwrap();

        assert_eq!(comp.time(), Some(SimTime(0.0)));
        assert_eq!(comp.next_time(), Some(SimTime(2.0)));
        comp.update(&mut cx).unwrap();
        assert_eq!(comp.time(), Some(SimTime(2.0)));
        assert_eq!(comp.status(), ComponentStatus::Updated);
    }

    #[test]
    fn test_generator_rejects_zero_step() {
        let mut graph = SlotGraph::new();
        let env = RunEnv::default();
        let mut io = ComponentIo::new();
        let id = graph.register_component("Gen");
        let mut cx = Context::new(&mut graph, &env, id, &mut io);
        let mut comp = ModelComponent::new("Gen", Generator::new(SimTime(0.0), 0.0));
        assert!(matches!(comp.initialize(&mut cx), Err(CouplingError::Config(_))));
    }
}
