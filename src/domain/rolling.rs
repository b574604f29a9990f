//! Rolling ratio statistics and z-score.
//!
//! Sample standard deviation (N-1 divisor) over the trailing window of N ratios.
//! Z = (ratio - mean) / stddev.
//! Warmup: the first (N-1) observations are not ready. A window whose ratios are
//! all equal (stddev == 0, up to a 1e-12 fraction of the mean) is also not ready.
//!
//! The window is a fixed-capacity ring buffer. Mean and the sum of squared
//! deviations are updated incrementally, and recomputed exactly from the buffer
//! each time the write head wraps so floating-point drift stays bounded.

use chrono::NaiveDateTime;

use super::error::PairtraderError;

pub const DEFAULT_WINDOW_SIZE: usize = 200;

/// Stddev at or below this fraction of |mean| is rounding noise, not dispersion.
const DEGENERATE_STDDEV_FRACTION: f64 = 1e-12;

/// Statistics derived from one observation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZScoreSample {
    pub timestamp: NaiveDateTime,
    pub ratio: f64,
    pub mean: f64,
    pub stddev: f64,
    /// `None` while the window is filling or degenerate.
    pub z: Option<f64>,
}

impl ZScoreSample {
    pub fn is_ready(&self) -> bool {
        self.z.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct RollingStatistics {
    buffer: Vec<f64>,
    capacity: usize,
    head: usize,
    len: usize,
    mean: f64,
    m2: f64,
    last_timestamp: Option<NaiveDateTime>,
}

impl RollingStatistics {
    /// `capacity` must be at least 2; config validation enforces this.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(2);
        RollingStatistics {
            buffer: vec![0.0; capacity],
            capacity,
            head: 0,
            len: 0,
            mean: 0.0,
            m2: 0.0,
            last_timestamp: None,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len == self.capacity
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    /// Sample standard deviation of the current window; 0 with fewer than 2 values.
    pub fn stddev(&self) -> f64 {
        if self.len < 2 {
            return 0.0;
        }
        (self.m2.max(0.0) / (self.len as f64 - 1.0)).sqrt()
    }

    /// Append a ratio and return the resulting sample.
    ///
    /// A timestamp that is not strictly after the previous one is rejected and
    /// leaves the window untouched.
    pub fn observe(
        &mut self,
        timestamp: NaiveDateTime,
        ratio: f64,
    ) -> Result<ZScoreSample, PairtraderError> {
        if let Some(previous) = self.last_timestamp {
            if timestamp <= previous {
                return Err(PairtraderError::OutOfOrderData {
                    previous,
                    current: timestamp,
                });
            }
        }
        self.last_timestamp = Some(timestamp);

        if self.is_full() {
            let evicted = self.buffer[self.head];
            self.replace(evicted, ratio);
        } else {
            self.add(ratio);
        }
        self.buffer[self.head] = ratio;
        self.head = (self.head + 1) % self.capacity;

        if self.head == 0 && self.is_full() {
            self.recompute();
        }

        let mean = self.mean;
        let stddev = self.stddev();
        let degenerate = stddev <= mean.abs() * DEGENERATE_STDDEV_FRACTION;
        let z = if self.is_full() && !degenerate {
            Some((ratio - mean) / stddev)
        } else {
            None
        };

        Ok(ZScoreSample {
            timestamp,
            ratio,
            mean,
            stddev,
            z,
        })
    }

    fn add(&mut self, x: f64) {
        self.len += 1;
        let delta = x - self.mean;
        self.mean += delta / self.len as f64;
        self.m2 += delta * (x - self.mean);
    }

    fn replace(&mut self, old: f64, new: f64) {
        let old_mean = self.mean;
        self.mean += (new - old) / self.len as f64;
        self.m2 += (new - old) * (new - self.mean + old - old_mean);
        if self.m2 < 0.0 {
            self.m2 = 0.0;
        }
    }

    fn recompute(&mut self) {
        let n = self.len as f64;
        let mean = self.buffer.iter().sum::<f64>() / n;
        self.m2 = self
            .buffer
            .iter()
            .map(|x| {
                let diff = x - mean;
                diff * diff
            })
            .sum();
        self.mean = mean;
    }
}
