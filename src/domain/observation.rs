//! Paired price samples and the ratio series derived from them.

use chrono::{Duration, NaiveDate, NaiveDateTime};

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// The tracked instrument pair and its sampling interval.
#[derive(Debug, Clone, PartialEq)]
pub struct PairSpec {
    pub instrument_a: String,
    pub instrument_b: String,
    pub interval: Duration,
}

/// One paired sample of the two tracked instruments.
#[derive(Debug, Clone, PartialEq)]
pub struct PricePoint {
    pub timestamp: NaiveDateTime,
    pub price_a: f64,
    pub price_b: f64,
}

impl PricePoint {
    /// price_b / price_a
    pub fn ratio(&self) -> f64 {
        self.price_b / self.price_a
    }

    pub fn to_observation(&self) -> RatioObservation {
        RatioObservation {
            timestamp: self.timestamp,
            ratio: self.ratio(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RatioObservation {
    pub timestamp: NaiveDateTime,
    pub ratio: f64,
}

pub fn to_ratio_series(points: &[PricePoint]) -> Vec<RatioObservation> {
    points.iter().map(PricePoint::to_observation).collect()
}

/// Percentage change of each leg over the last `lookback` samples.
///
/// Returns `None` when the series is shorter than `lookback + 1`.
pub fn change_pct(points: &[PricePoint], lookback: usize) -> Option<(f64, f64)> {
    if lookback == 0 || points.len() <= lookback {
        return None;
    }
    let last = points.last()?;
    let base = &points[points.len() - 1 - lookback];
    Some((
        (last.price_a / base.price_a - 1.0) * 100.0,
        (last.price_b / base.price_b - 1.0) * 100.0,
    ))
}

/// Parse `YYYY-MM-DD HH:MM:SS`, falling back to a bare `YYYY-MM-DD` at midnight.
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT)
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

pub fn format_timestamp(ts: NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}
