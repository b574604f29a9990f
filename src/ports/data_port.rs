//! Market data port.

use crate::domain::error::PairtraderError;
use crate::domain::observation::PricePoint;
use chrono::{Duration, NaiveDateTime};

pub trait MarketDataPort {
    /// Paired prices for `[start, end]`, strictly ascending by timestamp.
    fn get_paired_series(
        &self,
        instrument_a: &str,
        instrument_b: &str,
        start: NaiveDateTime,
        end: NaiveDateTime,
        interval: Duration,
    ) -> Result<Vec<PricePoint>, PairtraderError>;
}
