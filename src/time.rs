//! Simulation time.
//!
//! A `SimTime` is a point on the composition's logical time axis, measured in
//! abstract time units (the integration adapters call them "seconds" when
//! they need a unit for it). Time never comes from the wall clock.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, Sub};

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SimTime(pub f64);

impl SimTime {
    pub const ZERO: SimTime = SimTime(0.0);

    #[inline(always)]
    pub fn new(t: f64) -> Self { Self(t) }

    #[inline(always)]
    pub fn as_f64(self) -> f64 { self.0 }

    /// Duration from `earlier` to `self` (negative if `earlier` is later).
    #[inline(always)]
    pub fn since(self, earlier: SimTime) -> f64 { self.0 - earlier.0 }

    /// Whether `self` is strictly before `other`.
    #[inline(always)]
    pub fn is_before(self, other: SimTime) -> bool { self < other }
}

// Total order so times can key sorts and heaps. NaN sorts after everything.
impl PartialEq for SimTime {
    fn eq(&self, other: &Self) -> bool { self.cmp(other) == Ordering::Equal }
}

impl Eq for SimTime {}

impl PartialOrd for SimTime {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> { Some(self.cmp(other)) }
}

impl Ord for SimTime {
    fn cmp(&self, other: &Self) -> Ordering { self.0.total_cmp(&other.0) }
}

impl Add<f64> for SimTime {
    type Output = SimTime;
    fn add(self, rhs: f64) -> SimTime { SimTime(self.0 + rhs) }
}

impl Sub for SimTime {
    type Output = f64;
    fn sub(self, rhs: SimTime) -> f64 { self.0 - rhs.0 }
}

impl From<f64> for SimTime {
    fn from(t: f64) -> Self { SimTime(t) }
}

impl fmt::Display for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t={}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordering_and_arithmetic() {
        let a = SimTime::new(1.5);
        let b = a + 2.0;
        assert!(a.is_before(b));
        assert_eq!(b - a, 2.0);
        assert_eq!(b.since(a), 2.0);
        assert_eq!(SimTime::from(3.5), b);
    }

    #[test]
    fn test_sort_is_total() {
        let mut times = vec![SimTime(3.0), SimTime(-1.0), SimTime(0.0), SimTime(3.0)];
        times.sort();
        assert_eq!(times, vec![SimTime(-1.0), SimTime(0.0), SimTime(3.0), SimTime(3.0)]);
    }

    #[test]
    fn test_display() {
        assert_eq!(SimTime(5.0).to_string(), "t=5");
    }
}
