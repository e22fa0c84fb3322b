//! Time-caching adapters.
//!
//! On every source change the adapter pulls eagerly and appends the sample to
//! its buffer; requests are answered lazily from the buffer. After each
//! request the buffer is trimmed to the last sample at or before the served
//! time plus everything after it.

use crate::data::Value;
use crate::error::{CouplingError, Result};
use crate::time::SimTime;
use std::collections::VecDeque;
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct SampleBuffer {
    samples: VecDeque<(SimTime, Value)>,
}

impl SampleBuffer {
    pub fn new() -> Self { Self::default() }

    pub fn len(&self) -> usize { self.samples.len() }

    pub fn is_empty(&self) -> bool { self.samples.is_empty() }

    pub fn first_time(&self) -> Option<SimTime> { self.samples.front().map(|(t, _)| *t) }

    pub fn samples(&self) -> impl Iterator<Item = &(SimTime, Value)> { self.samples.iter() }

    pub fn get(&self, i: usize) -> Option<&(SimTime, Value)> { self.samples.get(i) }

    /// Appends a sample; a sample with the newest timestamp replaces it.
    pub fn push(&mut self, name: &str, time: SimTime, value: Value) -> Result<()> {
        if let Some((last, _)) = self.samples.back() {
            if time < *last {
                return Err(CouplingError::time(
                    name,
                    format!("sample at {} is older than the newest buffered sample at {}", time, last),
                ));
            }
            if time == *last {
                self.samples.pop_back();
            }
        }
        self.samples.push_back((time, value));
        Ok(())
    }

    /// Fails unless `time` lies inside the buffered window.
    pub fn check_range(&self, name: &str, time: SimTime) -> Result<()> {
        let (Some((first, _)), Some((last, _))) = (self.samples.front(), self.samples.back()) else {
            return Err(CouplingError::no_data(format!("no data available in '{}'", name)));
        };
        if time < *first || time > *last {
            return Err(CouplingError::time(
                name,
                format!("requested time {} out of range [{}, {}]", time, first, last),
            ));
        }
        Ok(())
    }

    /// Index of the first sample with timestamp >= `time`.
    pub fn lower_bound(&self, time: SimTime) -> usize {
        self.samples.partition_point(|(t, _)| *t < time)
    }

    /// Drops every sample before the last one at or before `time`.
    pub fn trim(&mut self, time: SimTime) {
        while self.samples.len() > 1 && self.samples[1].0 <= time {
            self.samples.pop_front();
        }
    }

    pub fn clear(&mut self) { self.samples.clear(); }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interpolation {
    /// Earliest sample at or after the requested time.
    Next,
    /// Latest sample at or before the requested time.
    Previous,
    /// Linear blend of the bracketing samples.
    Linear,
    /// Every sample since the previous request.
    Stack,
}

#[derive(Debug, Clone)]
pub struct TimeCache {
    pub mode: Interpolation,
    pub(crate) buffer: SampleBuffer,
    last_served: Option<SimTime>,
}

impl TimeCache {
    pub fn new(mode: Interpolation) -> Self {
        Self { mode, buffer: SampleBuffer::new(), last_served: None }
    }

    pub fn sample(&mut self, name: &str, time: SimTime, value: Value) -> Result<()> {
        self.buffer.push(name, time, value)
    }

    pub fn serve(&mut self, name: &str, time: SimTime) -> Result<Value> {
        if let Some(last) = self.last_served {
            if time < last {
                return Err(CouplingError::time(
                    name,
                    format!("requested time {} is before the previous request at {}", time, last),
                ));
            }
        }
        self.buffer.check_range(name, time)?;

        let idx = self.buffer.lower_bound(time);
        let value = match self.mode {
            Interpolation::Next => self.at(idx)?.1.clone(),
            Interpolation::Previous => {
                let (t, v) = self.at(idx)?;
                if *t == time { v.clone() } else { self.at(idx - 1)?.1.clone() }
            }
            Interpolation::Linear => {
                let (t1, v1) = self.at(idx)?;
                if *t1 == time {
                    v1.clone()
                } else {
                    let (t0, v0) = self.at(idx - 1)?;
                    let f = (time - *t0) / (*t1 - *t0);
                    v0.lerp(v1, f)?
                }
            }
            Interpolation::Stack => {
                let since = self.last_served;
                let batch: Vec<(SimTime, Value)> = self
                    .buffer
                    .samples()
                    .filter(|(t, _)| *t <= time && since.map_or(true, |s| *t > s))
                    .cloned()
                    .collect();
                Value::Stack(Arc::new(batch))
            }
        };

        self.buffer.trim(time);
        self.last_served = Some(time);
        Ok(value)
    }

    fn at(&self, idx: usize) -> Result<&(SimTime, Value)> {
        self.buffer
            .get(idx)
            .ok_or_else(|| CouplingError::no_data("interpolation sample missing"))
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
        self.last_served = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn cache(mode: Interpolation) -> TimeCache {
        let mut c = TimeCache::new(mode);
        c.sample("A", SimTime(0.0), Value::Scalar(0.0)).unwrap();
        c.sample("A", SimTime(10.0), Value::Scalar(10.0)).unwrap();
        c
    }

    #[rstest]
    #[case(Interpolation::Next, 5.0, 10.0)]
    #[case(Interpolation::Previous, 5.0, 0.0)]
    #[case(Interpolation::Linear, 5.0, 5.0)]
    #[case(Interpolation::Linear, 2.5, 2.5)]
    #[case(Interpolation::Next, 0.0, 0.0)]
    #[case(Interpolation::Previous, 10.0, 10.0)]
    fn test_interpolation_modes(#[case] mode: Interpolation, #[case] t: f64, #[case] expected: f64) {
        let mut c = cache(mode);
        assert_eq!(c.serve("A", SimTime(t)).unwrap(), Value::Scalar(expected));
    }

    #[rstest]
    #[case(-1.0)]
    #[case(11.0)]
    fn test_linear_out_of_range(#[case] t: f64) {
        let mut c = cache(Interpolation::Linear);
        assert!(matches!(c.serve("A", SimTime(t)), Err(CouplingError::TimeRange { .. })));
    }

    #[test]
    fn test_non_monotonic_requests_fail() {
        let mut c = cache(Interpolation::Linear);
        c.serve("A", SimTime(6.0)).unwrap();
        assert!(matches!(c.serve("A", SimTime(4.0)), Err(CouplingError::TimeRange { .. })));
    }

    #[test]
    fn test_older_sample_rejected_equal_replaced() {
        let mut c = cache(Interpolation::Previous);
        assert!(c.sample("A", SimTime(5.0), Value::Scalar(1.0)).is_err());
        c.sample("A", SimTime(10.0), Value::Scalar(20.0)).unwrap();
        assert_eq!(c.serve("A", SimTime(10.0)).unwrap(), Value::Scalar(20.0));
    }

    #[test]
    fn test_trim_keeps_window() {
        let mut c = TimeCache::new(Interpolation::Linear);
        for i in 0..5 {
            c.sample("A", SimTime(i as f64), Value::Scalar(i as f64)).unwrap();
        }
        c.serve("A", SimTime(2.5)).unwrap();
        assert_eq!(c.buffer.len(), 3);
        assert_eq!(c.buffer.first_time(), Some(SimTime(2.0)));
    }

    #[test]
    fn test_stack_batches_since_last_request() {
        let mut c = TimeCache::new(Interpolation::Stack);
        for i in 0..4 {
            c.sample("A", SimTime(i as f64), Value::Scalar(i as f64)).unwrap();
        }
        let first = c.serve("A", SimTime(1.0)).unwrap();
        assert_eq!(first.as_stack().map(|s| s.len()), Some(2));

        let second = c.serve("A", SimTime(3.0)).unwrap();
        let times: Vec<f64> = second.as_stack().unwrap().iter().map(|(t, _)| t.0).collect();
        assert_eq!(times, vec![2.0, 3.0]);
    }
}
