//! Stateless adapters: one upstream pull per request, then a pure transform.
use crate::data::{Info, Unit, Value};
use crate::error::{CouplingError, Result};
use crate::time::SimTime;
use std::fmt;
use std::sync::Arc;

pub type TransformFn = Arc<dyn Fn(Value, SimTime) -> Result<Value> + Send + Sync>;

#[derive(Clone)]
pub enum Transform {
    Scale(f64),
    /// Converts to `target` units; `factor` is fixed once the upstream units are known.
    ConvertUnits { target: Unit, factor: f64 },
    Callback(TransformFn),
}

impl Transform {
    pub fn convert_units(target: Unit) -> Self {
        Transform::ConvertUnits { target, factor: 1.0 }
    }

    pub fn callback<F>(f: F) -> Self
    where
        F: Fn(Value, SimTime) -> Result<Value> + Send + Sync + 'static,
    {
        Transform::Callback(Arc::new(f))
    }

    pub fn label(&self) -> &'static str {
        match self {
            Transform::Scale(_) => "Scale",
            Transform::ConvertUnits { .. } => "ConvertUnits",
            Transform::Callback(_) => "Callback",
        }
    }

    /// Request forwarded upstream for a downstream `request`.
    pub(crate) fn upstream_request(&self, request: &Info) -> Info {
        match self {
            // Upstream keeps its own units; this adapter converts them.
            Transform::ConvertUnits { .. } => Info { units: None, ..request.clone() },
            _ => request.clone(),
        }
    }

    pub(crate) fn output_info(&mut self, name: &str, in_info: &Info) -> Result<Info> {
        match self {
            Transform::ConvertUnits { target, factor } => {
                let source = in_info.units.clone().unwrap_or_default();
                *factor = source.factor_to(target).ok_or_else(|| {
                    CouplingError::meta(name, format!("can't convert units '{}' to '{}'", source, target))
                })?;
                Ok(in_info.clone().with_units(target.clone()))
            }
            _ => Ok(in_info.clone()),
        }
    }

    pub(crate) fn apply(&self, value: Value, time: SimTime) -> Result<Value> {
        match self {
            Transform::Scale(k) => Ok(value.scaled(*k)),
            Transform::ConvertUnits { factor, .. } => Ok(value.scaled(*factor)),
            Transform::Callback(f) => f(value, time),
        }
    }
}

impl fmt::Debug for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transform::Scale(k) => write!(f, "Scale({})", k),
            Transform::ConvertUnits { target, factor } => {
                write!(f, "ConvertUnits('{}', factor={})", target, factor)
            }
            Transform::Callback(_) => f.write_str("Callback(..)"),
        }
    }
}
