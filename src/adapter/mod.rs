//! Adapters: nodes that are an input (one source) and an output (many targets) at once.
//!
//! The set of adapter behaviours is closed: stateless transforms, time-caching
//! interpolation and time integration. All of them live as [`AdapterSlot`]s in
//! the slot graph; the graph dispatches the protocol calls to [`AdapterKind`].
pub mod integration;
pub mod time;
pub mod transform;

pub use integration::{Aggregate, TimeIntegrator};
pub use time::{Interpolation, SampleBuffer, TimeCache};
pub use transform::{Transform, TransformFn};

use crate::data::{Info, Unit, Value};
use crate::error::{CouplingError, Result};
use crate::slot::{Conversion, SlotId};
use crate::time::SimTime;
use smallvec::SmallVec;

#[derive(Debug, Clone)]
pub enum AdapterKind {
    Transform(Transform),
    Interpolate(TimeCache),
    Integrate(TimeIntegrator),
}

impl AdapterKind {
    // --- Constructors ---

    pub fn scale(k: f64) -> Self { AdapterKind::Transform(Transform::Scale(k)) }

    pub fn convert_units(target: Unit) -> Self {
        AdapterKind::Transform(Transform::convert_units(target))
    }

    pub fn callback<F>(f: F) -> Self
    where
        F: Fn(Value, SimTime) -> Result<Value> + Send + Sync + 'static,
    {
        AdapterKind::Transform(Transform::callback(f))
    }

    pub fn next() -> Self { AdapterKind::Interpolate(TimeCache::new(Interpolation::Next)) }
    pub fn previous() -> Self { AdapterKind::Interpolate(TimeCache::new(Interpolation::Previous)) }
    pub fn linear() -> Self { AdapterKind::Interpolate(TimeCache::new(Interpolation::Linear)) }
    pub fn stack() -> Self { AdapterKind::Interpolate(TimeCache::new(Interpolation::Stack)) }

    pub fn mean(step: Option<f64>) -> Result<Self> {
        Ok(AdapterKind::Integrate(TimeIntegrator::mean(step)?))
    }

    pub fn sum(step: Option<f64>) -> Result<Self> {
        Ok(AdapterKind::Integrate(TimeIntegrator::sum(step)?))
    }

    // --- Capabilities ---

    pub fn label(&self) -> &'static str {
        match self {
            AdapterKind::Transform(t) => t.label(),
            AdapterKind::Interpolate(c) => match c.mode {
                Interpolation::Next => "NextTime",
                Interpolation::Previous => "PreviousTime",
                Interpolation::Linear => "LinearTime",
                Interpolation::Stack => "StackTime",
            },
            AdapterKind::Integrate(i) => i.label(),
        }
    }

    /// Buffers samples on source change and answers requests from the buffer.
    pub fn is_time_caching(&self) -> bool { !matches!(self, AdapterKind::Transform(_)) }

    /// Default of [`AdapterSlot::no_branch`]: time-caching kinds serve a single consumer.
    pub fn no_branch(&self) -> bool { self.is_time_caching() }

    pub(crate) fn upstream_request(&self, request: &Info) -> Info {
        match self {
            AdapterKind::Transform(t) => t.upstream_request(request),
            AdapterKind::Interpolate(_) => request.clone(),
            AdapterKind::Integrate(i) => i.upstream_request(request),
        }
    }

    pub(crate) fn output_info(&mut self, name: &str, in_info: &Info) -> Result<Info> {
        match self {
            AdapterKind::Transform(t) => t.output_info(name, in_info),
            AdapterKind::Interpolate(_) => Ok(in_info.clone()),
            AdapterKind::Integrate(i) => Ok(i.output_info(in_info)),
        }
    }

    /// Records a sample pulled on source change (time-caching kinds only).
    pub(crate) fn sample(&mut self, name: &str, time: SimTime, value: Value) -> Result<()> {
        match self {
            AdapterKind::Transform(_) => Ok(()),
            AdapterKind::Interpolate(c) => c.sample(name, time, value),
            AdapterKind::Integrate(i) => i.sample(name, time, value),
        }
    }

    /// Answers a request from the buffer (time-caching kinds only).
    pub(crate) fn serve(&mut self, name: &str, time: SimTime) -> Result<Value> {
        match self {
            AdapterKind::Transform(_) => Err(CouplingError::Config(format!(
                "adapter '{}' does not buffer data",
                name
            ))),
            AdapterKind::Interpolate(c) => c.serve(name, time),
            AdapterKind::Integrate(i) => i.serve(name, time),
        }
    }

    pub(crate) fn clear(&mut self) {
        match self {
            AdapterKind::Transform(_) => {}
            AdapterKind::Interpolate(c) => c.clear(),
            AdapterKind::Integrate(i) => i.clear(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AdapterSlot {
    pub name: String,
    pub kind: AdapterKind,
    pub source: Option<SlotId>,
    pub targets: SmallVec<[SlotId; 2]>,
    /// Excluded from dependency and deadlock reasoning.
    pub breaks_dependency: bool,
    /// No branching is allowed anywhere downstream of this adapter.
    pub no_branch: bool,
    pub(crate) in_info: Option<Info>,
    pub(crate) out_info: Option<Info>,
    pub(crate) conversion: Conversion,
    pub(crate) infos_exchanged: usize,
    pub(crate) pinged_by: SmallVec<[SlotId; 2]>,
}

impl AdapterSlot {
    pub fn new(name: &str, kind: AdapterKind) -> Self {
        Self {
            name: name.to_string(),
            no_branch: kind.no_branch(),
            kind,
            source: None,
            targets: SmallVec::new(),
            breaks_dependency: false,
            in_info: None,
            out_info: None,
            conversion: Conversion::default(),
            infos_exchanged: 0,
            pinged_by: SmallVec::new(),
        }
    }

    pub fn in_info(&self) -> Option<&Info> { self.in_info.as_ref() }

    pub fn out_info(&self) -> Option<&Info> { self.out_info.as_ref() }
}
