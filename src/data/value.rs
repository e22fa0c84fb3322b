//! Payload carried through slots.
//!
//! Values are cheap to clone (array and stack payloads are reference counted)
//! and logically immutable once pushed: every operation returns a new value.

use super::kernel;
use crate::error::{CouplingError, Result};
use crate::time::SimTime;
use smallvec::SmallVec;
use std::sync::Arc;

pub type Shape = SmallVec<[usize; 3]>;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Scalar(f64),
    Array { shape: Shape, data: Arc<[f64]> },
    /// Ordered batch of timestamped samples, produced by the stack adapter.
    Stack(Arc<Vec<(SimTime, Value)>>),
}

impl Value {
    pub fn array(shape: &[usize], data: Vec<f64>) -> Result<Self> {
        let expected: usize = shape.iter().product();
        if expected != data.len() {
            return Err(CouplingError::data(
                "value",
                format!("shape {:?} needs {} elements, got {}", shape, expected, data.len()),
            ));
        }
        Ok(Value::Array { shape: Shape::from_slice(shape), data: data.into() })
    }

    fn from_parts(shape: Shape, data: Vec<f64>) -> Self {
        if shape.is_empty() {
            Value::Scalar(data.first().copied().unwrap_or(0.0))
        } else {
            Value::Array { shape, data: data.into() }
        }
    }

    /// Data shape; empty for scalars, `None` for stacks.
    pub fn shape(&self) -> Option<Shape> {
        match self {
            Value::Scalar(_) => Some(Shape::new()),
            Value::Array { shape, .. } => Some(shape.clone()),
            Value::Stack(_) => None,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Value::Scalar(_) => 1,
            Value::Array { data, .. } => data.len(),
            Value::Stack(items) => items.len(),
        }
    }

    pub fn is_empty(&self) -> bool { self.len() == 0 }

    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            Value::Scalar(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_slice(&self) -> Option<&[f64]> {
        match self {
            Value::Scalar(v) => Some(std::slice::from_ref(v)),
            Value::Array { data, .. } => Some(data),
            Value::Stack(_) => None,
        }
    }

    pub fn as_stack(&self) -> Option<&[(SimTime, Value)]> {
        match self {
            Value::Stack(items) => Some(items.as_slice()),
            _ => None,
        }
    }

    fn numeric(&self, op: &str) -> Result<(Shape, &[f64])> {
        match (self.shape(), self.as_slice()) {
            (Some(shape), Some(data)) => Ok((shape, data)),
            _ => Err(CouplingError::data("value", format!("cannot {} a stacked value", op))),
        }
    }

    /// `self + f * (other - self)`
    pub fn lerp(&self, other: &Value, f: f64) -> Result<Value> {
        let (shape_a, a) = self.numeric("interpolate")?;
        let (shape_b, b) = other.numeric("interpolate")?;
        if shape_a != shape_b {
            return Err(CouplingError::data(
                "value",
                format!("cannot interpolate shapes {:?} and {:?}", shape_a, shape_b),
            ));
        }
        let mut out = vec![0.0; a.len()];
        kernel::lerp(&mut out, a, b, f);
        Ok(Value::from_parts(shape_a, out))
    }

    /// Multiplies every element by `k`; stacks are scaled sample by sample.
    pub fn scaled(&self, k: f64) -> Value {
        match self {
            Value::Scalar(v) => Value::Scalar(v * k),
            Value::Array { shape, data } => {
                let mut out = vec![0.0; data.len()];
                kernel::scale(&mut out, data, k);
                Value::Array { shape: shape.clone(), data: out.into() }
            }
            Value::Stack(items) => Value::Stack(Arc::new(
                items.iter().map(|(t, v)| (*t, v.scaled(k))).collect(),
            )),
        }
    }

    /// `sum(w_i * v_i)` over equally shaped values.
    pub fn weighted_sum(terms: &[(f64, &Value)]) -> Result<Value> {
        let Some((_, first)) = terms.first() else {
            return Err(CouplingError::data("value", "empty weighted sum"));
        };
        let (shape, data) = first.numeric("sum")?;
        let mut acc = vec![0.0; data.len()];
        for (w, v) in terms {
            let (s, d) = v.numeric("sum")?;
            if s != shape {
                return Err(CouplingError::data(
                    "value",
                    format!("cannot sum shapes {:?} and {:?}", shape, s),
                ));
            }
            kernel::axpy(&mut acc, d, *w);
        }
        Ok(Value::from_parts(shape, acc))
    }

    /// Reverses the element order along `axis` (row-major layout).
    pub fn flip_axis(&self, axis: usize) -> Result<Value> {
        let (shape, data) = self.numeric("flip")?;
        if axis >= shape.len() {
            return Err(CouplingError::data(
                "value",
                format!("axis {} out of range for shape {:?}", axis, shape),
            ));
        }
        let n = shape[axis];
        let stride: usize = shape[axis + 1..].iter().product();
        let mut out = vec![0.0; data.len()];
        for (i, &x) in data.iter().enumerate() {
            let c = (i / stride) % n;
            let j = i + (n - 1 - c) * stride - c * stride;
            out[j] = x;
        }
        Ok(Value::from_parts(shape, out))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self { Value::Scalar(v) }
}
