//! Piecewise-linear yield curves over time-to-maturity.

use crate::types::Time;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurvePoint {
    pub bucket: i64,
    pub rate: Decimal,
}

/// Rate as a function of time-to-maturity. Buckets are relative ticks
/// (due date minus now), strictly increasing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YieldCurve {
    points: Vec<CurvePoint>,
}

impl YieldCurve {
    pub fn new(points: Vec<(i64, Decimal)>) -> Result<Self, CurveError> {
        if points.is_empty() {
            return Err(CurveError::Empty);
        }
        for (i, window) in points.windows(2).enumerate() {
            if window[1].0 <= window[0].0 {
                return Err(CurveError::UnsortedBuckets { index: i + 1 });
            }
        }
        Ok(Self {
            points: points
                .into_iter()
                .map(|(bucket, rate)| CurvePoint { bucket, rate })
                .collect(),
        })
    }

    /// Same rate at every bucket.
    pub fn flat(rate: Decimal, buckets: &[i64]) -> Result<Self, CurveError> {
        Self::new(buckets.iter().map(|&b| (b, rate)).collect())
    }

    pub fn first_bucket(&self) -> i64 {
        self.points[0].bucket
    }

    pub fn last_bucket(&self) -> i64 {
        self.points[self.points.len() - 1].bucket
    }

    /// Rate for a loan due at `due_date` as of `now`. Fails outside the
    /// curve domain; interpolates linearly on time-to-maturity between the
    /// two bracketing buckets, flat on an exact hit.
    pub fn rate(&self, due_date: Time, now: Time) -> Result<Decimal, CurveError> {
        let delta = due_date.delta(now);
        if delta < self.first_bucket() || delta > self.last_bucket() {
            return Err(CurveError::OutOfRange {
                delta,
                min: self.first_bucket(),
                max: self.last_bucket(),
            });
        }

        // index of the last bucket <= delta; domain check guarantees one exists
        let lower = self
            .points
            .iter()
            .rposition(|p| p.bucket <= delta)
            .expect("delta is within the curve domain");
        let p0 = self.points[lower];
        if p0.bucket == delta || lower + 1 == self.points.len() {
            return Ok(p0.rate);
        }
        let p1 = self.points[lower + 1];

        let span = Decimal::from(p1.bucket - p0.bucket);
        let offset = Decimal::from(delta - p0.bucket);
        Ok(p0.rate + (p1.rate - p0.rate) * offset / span)
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum CurveError {
    #[error("curve has no points")]
    Empty,

    #[error("curve buckets must be strictly increasing (violation at index {index})")]
    UnsortedBuckets { index: usize },

    #[error("time-to-maturity {delta} outside curve domain [{min}, {max}]")]
    OutOfRange { delta: i64, min: i64, max: i64 },
}
