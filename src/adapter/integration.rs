//! Time-integrating adapters (sum or time-normalised mean).
//!
//! Each request integrates the buffered samples over `(prev, time]`, where
//! `prev` is the previously served time (initially the first sample time).
//! Between two samples the signal is either blended linearly or, with a step
//! basis at fraction `s`, held at the older value before `s` and at the newer
//! value from `s` on.

use super::time::SampleBuffer;
use crate::data::{Info, Unit, Value};
use crate::error::{CouplingError, Result};
use crate::time::SimTime;

#[derive(Debug, Clone, PartialEq)]
pub enum Aggregate {
    /// Integral divided by the interval length.
    Mean,
    /// Plain integral. With `per_time` the values are rates and are weighted
    /// by elapsed time (units gain a factor of `time_unit`); otherwise they
    /// are weighted by the covered fraction of each sample interval.
    Sum { per_time: bool, initial_interval: f64, time_unit: Unit },
}

#[derive(Debug, Clone)]
pub struct TimeIntegrator {
    pub aggregate: Aggregate,
    /// Step position in `[0, 1]`; `None` blends linearly.
    pub step: Option<f64>,
    pub(crate) buffer: SampleBuffer,
    prev: Option<SimTime>,
}

impl TimeIntegrator {
    pub fn mean(step: Option<f64>) -> Result<Self> { Self::new(Aggregate::Mean, step) }

    /// Rate sum in time units of seconds (`"s"`).
    pub fn sum(step: Option<f64>) -> Result<Self> {
        Self::new(
            Aggregate::Sum { per_time: true, initial_interval: 0.0, time_unit: Unit::parse("s")? },
            step,
        )
    }

    pub fn new(aggregate: Aggregate, step: Option<f64>) -> Result<Self> {
        if let Some(s) = step {
            if !(0.0..=1.0).contains(&s) {
                return Err(CouplingError::Config(format!("step must be in [0, 1], got {}", s)));
            }
        }
        Ok(Self { aggregate, step, buffer: SampleBuffer::new(), prev: None })
    }

    pub fn label(&self) -> &'static str {
        match self.aggregate {
            Aggregate::Mean => "AvgOverTime",
            Aggregate::Sum { .. } => "SumOverTime",
        }
    }

    fn per_time(&self) -> bool {
        matches!(self.aggregate, Aggregate::Sum { per_time: true, .. })
    }

    pub(crate) fn upstream_request(&self, request: &Info) -> Info {
        if self.per_time() {
            Info { units: None, ..request.clone() }
        } else {
            request.clone()
        }
    }

    pub(crate) fn output_info(&self, in_info: &Info) -> Info {
        match &self.aggregate {
            Aggregate::Sum { per_time: true, time_unit, .. } => {
                let units = in_info.units.clone().unwrap_or_default().times(time_unit);
                in_info.clone().with_units(units)
            }
            _ => in_info.clone(),
        }
    }

    pub fn sample(&mut self, name: &str, time: SimTime, value: Value) -> Result<()> {
        self.buffer.push(name, time, value)?;
        if self.prev.is_none() {
            self.prev = Some(time);
        }
        Ok(())
    }

    pub fn serve(&mut self, name: &str, time: SimTime) -> Result<Value> {
        self.buffer.check_range(name, time)?;
        let prev = self.prev.unwrap_or(time);
        if time < prev {
            return Err(CouplingError::time(
                name,
                format!("requested time {} is before the previous request at {}", time, prev),
            ));
        }

        let value = self.integrate(prev, time)?;
        self.buffer.trim(time);
        self.prev = Some(time);
        Ok(value)
    }

    fn integrate(&self, prev: SimTime, time: SimTime) -> Result<Value> {
        let Some((t_first, v_first)) = self.buffer.get(0) else {
            return Err(CouplingError::no_data("no samples to integrate"));
        };

        if self.buffer.len() == 1 || time <= *t_first {
            return Ok(match &self.aggregate {
                Aggregate::Sum { per_time: true, initial_interval, .. } => v_first.scaled(*initial_interval),
                _ => v_first.clone(),
            });
        }

        // Weighted contributions of every sample over (prev, time].
        let mut terms: Vec<(f64, &Value)> = Vec::new();
        for i in 0..self.buffer.len() - 1 {
            let (Some((t_old, v_old)), Some((t_new, v_new))) = (self.buffer.get(i), self.buffer.get(i + 1)) else {
                break;
            };
            if prev >= *t_new {
                continue;
            }
            if time <= *t_old {
                break;
            }

            let range = *t_new - *t_old;
            let f1 = ((prev - *t_old) / range).max(0.0);
            let f2 = ((time - *t_old) / range).min(1.0);
            let (w_old, w_new) = match self.step {
                None => {
                    // Trapezoid over the linear blend between the samples.
                    let (a, b) = (f2 - f1, (f2 * f2 - f1 * f1) / 2.0);
                    (a - b, b)
                }
                Some(s) => ((f2.min(s) - f1).max(0.0), (f2 - f1.max(s)).max(0.0)),
            };

            let scale = match &self.aggregate {
                Aggregate::Sum { per_time: false, .. } => 1.0,
                _ => range,
            };
            terms.push((w_old * scale, v_old));
            terms.push((w_new * scale, v_new));
        }

        let sum = Value::weighted_sum(&terms)?;
        match self.aggregate {
            Aggregate::Mean if time > prev => Ok(sum.scaled(1.0 / (time - prev))),
            _ => Ok(sum),
        }
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
        self.prev = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(integrator: &mut TimeIntegrator, samples: &[(f64, f64)]) {
        for &(t, v) in samples {
            integrator.sample("I", SimTime(t), Value::Scalar(v)).unwrap();
        }
    }

    fn approx(v: Value, expected: f64) {
        let got = v.as_scalar().unwrap();
        assert!((got - expected).abs() < 1e-9, "got {}, expected {}", got, expected);
    }

    #[test]
    fn test_mean_of_constant_over_one_step() {
        let mut avg = TimeIntegrator::mean(None).unwrap();
        feed(&mut avg, &[(0.0, 4.0), (2.0, 4.0)]);
        approx(avg.serve("I", SimTime(2.0)).unwrap(), 4.0);
    }

    #[test]
    fn test_sum_of_constant_over_n_steps() {
        let (c, dt, n) = (3.0, 0.5, 4);
        let mut sum = TimeIntegrator::sum(None).unwrap();
        let samples: Vec<(f64, f64)> = (0..=n).map(|i| (i as f64 * dt, c)).collect();
        feed(&mut sum, &samples);
        approx(sum.serve("I", SimTime(n as f64 * dt)).unwrap(), n as f64 * c * dt);
    }

    #[test]
    fn test_linear_mean_of_ramp() {
        let mut avg = TimeIntegrator::mean(None).unwrap();
        feed(&mut avg, &[(0.0, 0.0), (10.0, 10.0)]);
        approx(avg.serve("I", SimTime(4.0)).unwrap(), 2.0);
        // Second interval (4, 10]: mean of a ramp from 4 to 10.
        approx(avg.serve("I", SimTime(10.0)).unwrap(), 7.0);
    }

    #[test]
    fn test_step_basis() {
        // Held at 0 until the midpoint, then 10.
        let mut avg = TimeIntegrator::mean(Some(0.5)).unwrap();
        feed(&mut avg, &[(0.0, 0.0), (10.0, 10.0)]);
        approx(avg.serve("I", SimTime(4.0)).unwrap(), 0.0);
        approx(avg.serve("I", SimTime(10.0)).unwrap(), 10.0 * 5.0 / 6.0);

        let mut prev_basis = TimeIntegrator::mean(Some(1.0)).unwrap();
        feed(&mut prev_basis, &[(0.0, 2.0), (1.0, 8.0)]);
        approx(prev_basis.serve("I", SimTime(1.0)).unwrap(), 2.0);
    }

    #[test]
    fn test_initial_interval_and_units() {
        let mut sum = TimeIntegrator::new(
            Aggregate::Sum { per_time: true, initial_interval: 2.0, time_unit: Unit::parse("s").unwrap() },
            None,
        )
        .unwrap();
        feed(&mut sum, &[(0.0, 5.0)]);
        approx(sum.serve("I", SimTime(0.0)).unwrap(), 10.0);

        let in_info = Info::new(None, None).with_units(Unit::parse("mm/s").unwrap());
        assert_eq!(sum.output_info(&in_info).units, Some(Unit::parse("mm").unwrap()));
        assert_eq!(sum.upstream_request(&in_info).units, None);
    }

    #[test]
    fn test_step_out_of_range_rejected() {
        assert!(TimeIntegrator::mean(Some(1.5)).is_err());
    }

    #[test]
    fn test_request_outside_buffer() {
        let mut avg = TimeIntegrator::mean(None).unwrap();
        feed(&mut avg, &[(0.0, 1.0), (1.0, 1.0)]);
        assert!(matches!(avg.serve("I", SimTime(2.0)), Err(CouplingError::TimeRange { .. })));
    }
}
