//! Spatial domain handles.
//!
//! The kernel never looks inside a domain: it only asks for the data shape,
//! whether two domains are compatible, and which transform maps data from one
//! onto the other. Concrete grid libraries implement [`Domain`].

use super::value::{Shape, Value};
use crate::error::{CouplingError, Result};
use smallvec::SmallVec;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

pub type DomainRef = Arc<dyn Domain>;

/// Data conversion between two compatible domains.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomainTransform {
    Identity,
    FlipAxes(SmallVec<[usize; 3]>),
}

impl DomainTransform {
    pub fn is_identity(&self) -> bool {
        match self {
            DomainTransform::Identity => true,
            DomainTransform::FlipAxes(axes) => axes.is_empty(),
        }
    }

    pub fn apply(&self, value: Value) -> Result<Value> {
        match self {
            DomainTransform::Identity => Ok(value),
            DomainTransform::FlipAxes(axes) => {
                axes.iter().try_fold(value, |v, &axis| v.flip_axis(axis))
            }
        }
    }
}

pub trait Domain: fmt::Debug + Send + Sync {
    fn name(&self) -> &str;

    /// Shape of data living on this domain; `None` accepts any shape.
    fn data_shape(&self) -> Option<Shape>;

    /// Transform mapping data on `self` onto `target`, `None` if incompatible.
    fn transform_to(&self, target: &dyn Domain) -> Option<DomainTransform>;

    fn as_any(&self) -> &dyn Any;

    fn compatible_with(&self, other: &dyn Domain) -> bool {
        self.transform_to(other).is_some()
    }

    /// Compatible without any data conversion.
    fn same_as(&self, other: &dyn Domain) -> bool {
        self.transform_to(other).is_some_and(|t| t.is_identity())
    }
}

/// Domain of data without spatial structure (scalars, free arrays).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NoDomain;

impl Domain for NoDomain {
    fn name(&self) -> &str { "NoDomain" }

    fn data_shape(&self) -> Option<Shape> { None }

    fn transform_to(&self, target: &dyn Domain) -> Option<DomainTransform> {
        target.as_any().downcast_ref::<NoDomain>().map(|_| DomainTransform::Identity)
    }

    fn as_any(&self) -> &dyn Any { self }
}

/// Regular rectilinear grid of cells.
///
/// A negative spacing means the axis runs in decreasing coordinate order.
/// Two grids are compatible when they cover the same cells, possibly with
/// reversed axes.
#[derive(Debug, Clone, PartialEq)]
pub struct UniformGrid {
    pub dims: SmallVec<[usize; 3]>,
    pub origin: SmallVec<[f64; 3]>,
    pub spacing: SmallVec<[f64; 3]>,
}

impl UniformGrid {
    pub fn new(dims: &[usize], origin: &[f64], spacing: &[f64]) -> Result<Self> {
        if origin.len() != dims.len() || spacing.len() != dims.len() {
            return Err(CouplingError::Config(format!(
                "grid with {} dims needs as many origin and spacing values, got {} and {}",
                dims.len(),
                origin.len(),
                spacing.len()
            )));
        }
        Ok(Self {
            dims: SmallVec::from_slice(dims),
            origin: SmallVec::from_slice(origin),
            spacing: SmallVec::from_slice(spacing),
        })
    }

    fn is_consistent(&self) -> bool {
        self.origin.len() == self.dims.len() && self.spacing.len() == self.dims.len()
    }

    /// (lower, upper) coordinate bounds of `axis`.
    fn extent(&self, axis: usize) -> (f64, f64) {
        let a = self.origin[axis];
        let b = a + self.spacing[axis] * self.dims[axis] as f64;
        if a <= b { (a, b) } else { (b, a) }
    }
}

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-9 * a.abs().max(b.abs()).max(1.0)
}

impl Domain for UniformGrid {
    fn name(&self) -> &str { "UniformGrid" }

    fn data_shape(&self) -> Option<Shape> { Some(Shape::from_slice(&self.dims)) }

    fn transform_to(&self, target: &dyn Domain) -> Option<DomainTransform> {
        let other = target.as_any().downcast_ref::<UniformGrid>()?;
        // Hand-built grids may have mismatched axis lengths.
        if self.dims != other.dims || !self.is_consistent() || !other.is_consistent() {
            return None;
        }

        let mut flips = SmallVec::new();
        for axis in 0..self.dims.len() {
            if !close(self.spacing[axis].abs(), other.spacing[axis].abs()) {
                return None;
            }
            let (lo_a, hi_a) = self.extent(axis);
            let (lo_b, hi_b) = other.extent(axis);
            if !close(lo_a, lo_b) || !close(hi_a, hi_b) {
                return None;
            }
            if self.spacing[axis].signum() != other.spacing[axis].signum() {
                flips.push(axis);
            }
        }

        if flips.is_empty() {
            Some(DomainTransform::Identity)
        } else {
            Some(DomainTransform::FlipAxes(flips))
        }
    }

    fn as_any(&self) -> &dyn Any { self }
}
