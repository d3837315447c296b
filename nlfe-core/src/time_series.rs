//! Load factor histories.
//!
//! A time series maps pseudo-time to a load factor. Series are copied on
//! retrieval from the registry, so every load pattern holds its own.

use crate::error::{Error, Result};
use crate::types::Tag;
use std::fmt::Debug;

pub trait TimeSeries: Send + Sync + Debug {
    fn tag(&self) -> Tag;

    fn class_name(&self) -> &'static str;

    /// Load factor at `time`.
    fn factor(&self, time: f64) -> f64;

    /// Time span over which the series is defined, `f64::INFINITY` if
    /// unbounded.
    fn duration(&self) -> f64 {
        f64::INFINITY
    }

    fn clone_box(&self) -> Box<dyn TimeSeries>;
}

impl Clone for Box<dyn TimeSeries> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// Constant factor.
#[derive(Debug, Clone, PartialEq)]
pub struct Constant {
    tag: Tag,
    factor: f64,
}

impl Constant {
    pub fn new(tag: Tag, factor: f64) -> Self {
        Self { tag, factor }
    }
}

impl TimeSeries for Constant {
    fn tag(&self) -> Tag {
        self.tag
    }

    fn class_name(&self) -> &'static str {
        "Constant"
    }

    fn factor(&self, _time: f64) -> f64 {
        self.factor
    }

    fn clone_box(&self) -> Box<dyn TimeSeries> {
        Box::new(self.clone())
    }
}

/// `factor * time`.
#[derive(Debug, Clone, PartialEq)]
pub struct Linear {
    tag: Tag,
    factor: f64,
}

impl Linear {
    pub fn new(tag: Tag, factor: f64) -> Self {
        Self { tag, factor }
    }
}

impl TimeSeries for Linear {
    fn tag(&self) -> Tag {
        self.tag
    }

    fn class_name(&self) -> &'static str {
        "Linear"
    }

    fn factor(&self, time: f64) -> f64 {
        self.factor * time
    }

    fn clone_box(&self) -> Box<dyn TimeSeries> {
        Box::new(self.clone())
    }
}

/// Piecewise-linear path through `(time, value)` points, scaled by
/// `factor`. Zero before the first point; after the last point either zero
/// or the last value when `use_last` is set.
#[derive(Debug, Clone, PartialEq)]
pub struct Path {
    tag: Tag,
    times: Vec<f64>,
    values: Vec<f64>,
    factor: f64,
    use_last: bool,
}

impl Path {
    /// # Errors
    ///
    /// Returns error if the lengths differ, fewer than two points are
    /// given, or times are not strictly increasing.
    pub fn new(tag: Tag, times: Vec<f64>, values: Vec<f64>, factor: f64) -> Result<Self> {
        if times.len() != values.len() || times.len() < 2 {
            return Err(Error::configuration(format!(
                "path series {tag} needs matching times and values with at least two points, got {} and {}",
                times.len(),
                values.len()
            )));
        }
        if times.windows(2).any(|w| !(w[1] > w[0])) {
            return Err(Error::configuration(format!(
                "path series {tag} times must be strictly increasing"
            )));
        }
        Ok(Self {
            tag,
            times,
            values,
            factor,
            use_last: false,
        })
    }

    /// Equally spaced path starting at `start`.
    pub fn uniform(tag: Tag, dt: f64, start: f64, values: Vec<f64>, factor: f64) -> Result<Self> {
        if !(dt > 0.0) {
            return Err(Error::configuration(format!(
                "path series {tag} needs a positive time step, got {dt}"
            )));
        }
        let times = (0..values.len()).map(|i| start + dt * i as f64).collect();
        Self::new(tag, times, values, factor)
    }

    /// Hold the last value past the end of the path.
    pub fn use_last(mut self, use_last: bool) -> Self {
        self.use_last = use_last;
        self
    }
}

impl TimeSeries for Path {
    fn tag(&self) -> Tag {
        self.tag
    }

    fn class_name(&self) -> &'static str {
        "Path"
    }

    fn factor(&self, time: f64) -> f64 {
        let n = self.times.len();
        if time < self.times[0] {
            return 0.0;
        }
        if time > self.times[n - 1] {
            return if self.use_last {
                self.factor * self.values[n - 1]
            } else {
                0.0
            };
        }
        // First segment whose end is at or past `time`
        let i = self.times.partition_point(|&t| t < time).max(1);
        let (t0, t1) = (self.times[i - 1], self.times[i]);
        let (v0, v1) = (self.values[i - 1], self.values[i]);
        self.factor * (v0 + (v1 - v0) * (time - t0) / (t1 - t0))
    }

    fn duration(&self) -> f64 {
        self.times[self.times.len() - 1] - self.times[0]
    }

    fn clone_box(&self) -> Box<dyn TimeSeries> {
        Box::new(self.clone())
    }
}
