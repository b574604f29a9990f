//! Transaction cost model.
//!
//! A proportional fee on traded notional. Opening or closing a pair position
//! trades both legs, so each side costs `2 * cost(notional_per_leg, fee_rate)`
//! and a full round trip costs `4 * notional_per_leg * fee_rate`.

pub const DEFAULT_FEE_RATE: f64 = 0.0015;

/// Fee for trading `notional` on one leg.
pub fn cost(notional: f64, fee_rate: f64) -> f64 {
    notional * fee_rate
}

/// Fee for trading both legs of one side (entry or exit).
pub fn pair_cost(notional_per_leg: f64, fee_rate: f64) -> f64 {
    2.0 * cost(notional_per_leg, fee_rate)
}

/// Fee for opening and later closing both legs.
pub fn round_trip_cost(notional_per_leg: f64, fee_rate: f64) -> f64 {
    2.0 * pair_cost(notional_per_leg, fee_rate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cost_is_proportional() {
        assert!((cost(2500.0, 0.0015) - 3.75).abs() < 1e-12);
        assert!((cost(0.0, 0.0015) - 0.0).abs() < f64::EPSILON);
        assert!((cost(2500.0, 0.0) - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn pair_cost_covers_both_legs() {
        assert!((pair_cost(2500.0, 0.0015) - 7.5).abs() < 1e-12);
    }

    #[test]
    fn round_trip_is_four_legs() {
        let notional = 2500.0;
        let fee = DEFAULT_FEE_RATE;
        let rt = round_trip_cost(notional, fee);
        assert!((rt - 15.0).abs() < 1e-12);
        assert!((rt - 4.0 * notional * fee).abs() < 1e-12);
    }
}
