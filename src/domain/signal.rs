//! Z-score signal evaluation.
//!
//! Evaluation order (first match wins):
//! 1. open and |z| > stop_loss          -> STOP_LOSS
//! 2. open and |z| <= exit              -> EXIT
//! 3. flat and z < -entry, |z| <= stop  -> ENTRY_LONG_SPREAD
//! 4. flat and z > entry, |z| <= stop   -> ENTRY_SHORT_SPREAD
//! 5. otherwise                         -> NONE
//!
//! Entry is refused beyond the stop-loss band: an already extreme deviation is
//! a regime break until it contracts back inside the band.

use std::fmt;

use super::error::PairtraderError;
use super::rolling::ZScoreSample;

pub const DEFAULT_ENTRY_THRESHOLD: f64 = 2.0;
pub const DEFAULT_EXIT_THRESHOLD: f64 = 0.5;
pub const DEFAULT_STOP_LOSS_THRESHOLD: f64 = 3.5;

/// A z that rounds onto the exit threshold still exits.
const EXIT_TOLERANCE: f64 = 1e-9;

/// Which way the spread is held.
///
/// LongSpread buys instrument B and sells instrument A (the ratio is expected
/// to rise back to its mean); ShortSpread is the inverse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    LongSpread,
    ShortSpread,
}

impl Direction {
    /// +1 for LongSpread, -1 for ShortSpread.
    pub fn sign(self) -> f64 {
        match self {
            Direction::LongSpread => 1.0,
            Direction::ShortSpread => -1.0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Direction::LongSpread => "LONG_SPREAD",
            Direction::ShortSpread => "SHORT_SPREAD",
        }
    }

    pub fn parse(value: &str) -> Option<Direction> {
        match value.trim().to_uppercase().as_str() {
            "LONG_SPREAD" => Some(Direction::LongSpread),
            "SHORT_SPREAD" => Some(Direction::ShortSpread),
            _ => None,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signal {
    /// No action (NONE).
    Hold,
    EntryLongSpread,
    EntryShortSpread,
    Exit,
    StopLoss,
}

impl Signal {
    /// Direction a candidate entry would open, if this is an entry signal.
    pub fn entry_direction(self) -> Option<Direction> {
        match self {
            Signal::EntryLongSpread => Some(Direction::LongSpread),
            Signal::EntryShortSpread => Some(Direction::ShortSpread),
            _ => None,
        }
    }

    pub fn is_close(self) -> bool {
        matches!(self, Signal::Exit | Signal::StopLoss)
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Signal::Hold => "NONE",
            Signal::EntryLongSpread => "ENTRY_LONG_SPREAD",
            Signal::EntryShortSpread => "ENTRY_SHORT_SPREAD",
            Signal::Exit => "EXIT",
            Signal::StopLoss => "STOP_LOSS",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub entry: f64,
    pub exit: f64,
    pub stop_loss: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Thresholds {
            entry: DEFAULT_ENTRY_THRESHOLD,
            exit: DEFAULT_EXIT_THRESHOLD,
            stop_loss: DEFAULT_STOP_LOSS_THRESHOLD,
        }
    }
}

impl Thresholds {
    /// Require 0 <= exit < entry < stop_loss.
    pub fn validate(&self) -> Result<(), PairtraderError> {
        let finite = self.entry.is_finite() && self.exit.is_finite() && self.stop_loss.is_finite();
        if !finite {
            return Err(PairtraderError::invalid(
                "strategy",
                "thresholds",
                "thresholds must be finite numbers",
            ));
        }
        if self.exit < 0.0 {
            return Err(PairtraderError::invalid(
                "strategy",
                "exit_threshold",
                "exit_threshold must be non-negative",
            ));
        }
        if self.exit >= self.entry {
            return Err(PairtraderError::invalid(
                "strategy",
                "exit_threshold",
                "exit_threshold must be below entry_threshold",
            ));
        }
        if self.entry >= self.stop_loss {
            return Err(PairtraderError::invalid(
                "strategy",
                "stop_loss_threshold",
                "stop_loss_threshold must be above entry_threshold",
            ));
        }
        Ok(())
    }
}

pub fn evaluate(z: f64, current: Option<Direction>, thresholds: &Thresholds) -> Signal {
    let magnitude = z.abs();
    if current.is_some() {
        if magnitude > thresholds.stop_loss {
            return Signal::StopLoss;
        }
        if magnitude <= thresholds.exit + EXIT_TOLERANCE {
            return Signal::Exit;
        }
        return Signal::Hold;
    }

    if magnitude > thresholds.stop_loss {
        return Signal::Hold;
    }
    if z < -thresholds.entry {
        Signal::EntryLongSpread
    } else if z > thresholds.entry {
        Signal::EntryShortSpread
    } else {
        Signal::Hold
    }
}

/// A sample that is not ready never produces a signal.
pub fn evaluate_sample(
    sample: &ZScoreSample,
    current: Option<Direction>,
    thresholds: &Thresholds,
) -> Signal {
    match sample.z {
        Some(z) if z.is_finite() => evaluate(z, current, thresholds),
        _ => Signal::Hold,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use proptest::prelude::*;

    const OPEN: Option<Direction> = Some(Direction::ShortSpread);

    fn t() -> Thresholds {
        Thresholds::default()
    }

    #[test]
    fn flat_entry_examples() {
        assert_eq!(evaluate(2.1, None, &t()), Signal::EntryShortSpread);
        assert_eq!(evaluate(-2.1, None, &t()), Signal::EntryLongSpread);
        assert_eq!(evaluate(1.9, None, &t()), Signal::Hold);
        assert_eq!(evaluate(-4.0, None, &t()), Signal::Hold);
        assert_eq!(evaluate(4.0, None, &t()), Signal::Hold);
    }

    #[test]
    fn flat_entry_boundaries() {
        assert_eq!(evaluate(2.0, None, &t()), Signal::Hold);
        assert_eq!(evaluate(-2.0, None, &t()), Signal::Hold);
        assert_eq!(evaluate(3.5, None, &t()), Signal::EntryShortSpread);
        assert_eq!(evaluate(-3.5, None, &t()), Signal::EntryLongSpread);
    }

    #[test]
    fn flat_never_exits() {
        assert_eq!(evaluate(0.0, None, &t()), Signal::Hold);
        assert_eq!(evaluate(0.3, None, &t()), Signal::Hold);
    }

    #[test]
    fn open_examples() {
        assert_eq!(evaluate(4.0, OPEN, &t()), Signal::StopLoss);
        assert_eq!(evaluate(-4.0, OPEN, &t()), Signal::StopLoss);
        assert_eq!(evaluate(0.3, OPEN, &t()), Signal::Exit);
        assert_eq!(evaluate(1.0, OPEN, &t()), Signal::Hold);
        assert_eq!(evaluate(0.5, OPEN, &t()), Signal::Exit);
        assert_eq!(evaluate(3.5, OPEN, &t()), Signal::Hold);
    }

    #[test]
    fn open_ignores_entry_levels() {
        assert_eq!(
            evaluate(-2.5, Some(Direction::LongSpread), &t()),
            Signal::Hold
        );
        assert_eq!(evaluate(2.5, OPEN, &t()), Signal::Hold);
    }

    #[test]
    fn stop_loss_wins_when_misconfigured() {
        // exit above stop_loss: both conditions hold for |z| = 5.
        let bad = Thresholds {
            entry: 1.0,
            exit: 6.0,
            stop_loss: 3.0,
        };
        assert_eq!(evaluate(5.0, OPEN, &bad), Signal::StopLoss);
        assert!(bad.validate().is_err());
    }

    #[test]
    fn validate_accepts_defaults() {
        assert!(t().validate().is_ok());
        assert!(Thresholds {
            entry: 1.0,
            exit: 0.0,
            stop_loss: 1.5
        }
        .validate()
        .is_ok());
    }

    #[test]
    fn validate_rejects_bad_ordering() {
        let cases = [
            (2.0, -0.1, 3.5),
            (2.0, 2.0, 3.5),
            (2.0, 2.5, 3.5),
            (3.5, 0.5, 3.5),
            (4.0, 0.5, 3.5),
            (f64::NAN, 0.5, 3.5),
        ];
        for (entry, exit, stop_loss) in cases {
            let th = Thresholds {
                entry,
                exit,
                stop_loss,
            };
            assert!(
                matches!(th.validate(), Err(PairtraderError::ConfigInvalid { .. })),
                "expected rejection for {:?}",
                th
            );
        }
    }

    #[test]
    fn not_ready_sample_holds() {
        let sample = ZScoreSample {
            timestamp: NaiveDate::from_ymd_opt(2024, 1, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
            ratio: 1.0,
            mean: 1.0,
            stddev: 0.0,
            z: None,
        };
        assert_eq!(evaluate_sample(&sample, None, &t()), Signal::Hold);
        assert_eq!(evaluate_sample(&sample, OPEN, &t()), Signal::Hold);
    }

    #[test]
    fn display_names() {
        assert_eq!(Signal::Hold.to_string(), "NONE");
        assert_eq!(Signal::EntryLongSpread.to_string(), "ENTRY_LONG_SPREAD");
        assert_eq!(Signal::EntryShortSpread.to_string(), "ENTRY_SHORT_SPREAD");
        assert_eq!(Signal::Exit.to_string(), "EXIT");
        assert_eq!(Signal::StopLoss.to_string(), "STOP_LOSS");
        assert_eq!(Direction::LongSpread.to_string(), "LONG_SPREAD");
        assert_eq!(Direction::parse("short_spread"), Some(Direction::ShortSpread));
        assert_eq!(Direction::parse("flat"), None);
    }

    proptest! {
        #[test]
        fn flat_entry_iff_inside_band(z in -10.0f64..10.0) {
            let signal = evaluate(z, None, &t());
            let inside = z.abs() > 2.0 && z.abs() <= 3.5;
            prop_assert_eq!(signal.entry_direction().is_some(), inside);
            if inside {
                let expected = if z < 0.0 { Signal::EntryLongSpread } else { Signal::EntryShortSpread };
                prop_assert_eq!(signal, expected);
            } else {
                prop_assert_eq!(signal, Signal::Hold);
            }
        }

        #[test]
        fn open_never_enters(z in -10.0f64..10.0, long in any::<bool>()) {
            let dir = if long { Direction::LongSpread } else { Direction::ShortSpread };
            let signal = evaluate(z, Some(dir), &t());
            prop_assert!(signal.entry_direction().is_none());
            if z.abs() > 3.5 {
                prop_assert_eq!(signal, Signal::StopLoss);
            } else if z.abs() <= 0.5 {
                prop_assert_eq!(signal, Signal::Exit);
            } else {
                prop_assert_eq!(signal, Signal::Hold);
            }
        }

        #[test]
        fn stop_loss_precedes_exit_for_any_thresholds(
            z in -10.0f64..10.0,
            exit in 0.0f64..10.0,
            stop_loss in 0.0f64..10.0,
        ) {
            let th = Thresholds { entry: 1.0, exit, stop_loss };
            if z.abs() > stop_loss {
                prop_assert_eq!(evaluate(z, OPEN, &th), Signal::StopLoss);
            }
        }
    }
}
