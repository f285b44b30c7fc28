use rust_decimal::{Decimal, RoundingStrategy};
use serde::Deserialize;
use thiserror::Error;

use crate::transit::TransitLine;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FareError {
    #[error("cannot price {from} to {to} on {line}: {reason}")]
    RouteInvalid {
        line: String,
        from: String,
        to: String,
        reason: &'static str,
    },
    #[error("unknown line `{0}`")]
    UnknownLine(String),
}

/// Distance-based fare table.
///
/// The fare grows linearly with the share of the line travelled, from `min_fare` for one
/// stop to `max_fare` end to end, rounded to the nearest `step`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FareSchedule {
    pub min_fare: Decimal,
    pub max_fare: Decimal,
    pub step: Decimal,
    /// Applied by the caller on top of [`FareSchedule::fare`].
    pub discount_percent: Decimal,
}

impl Default for FareSchedule {
    fn default() -> Self {
        Self {
            min_fare: Decimal::from(5),
            max_fare: Decimal::from(30),
            step: Decimal::from(5),
            discount_percent: Decimal::from(10),
        }
    }
}

impl FareSchedule {
    /// Pre-discount fare between two stops of `line`.
    pub fn fare(&self, line: &TransitLine, from: &str, to: &str) -> Result<Decimal, FareError> {
        let invalid = |reason| FareError::RouteInvalid {
            line: line.name().to_string(),
            from: from.to_string(),
            to: to.to_string(),
            reason,
        };
        if from == to {
            return Err(invalid("origin and destination are the same stop"));
        }
        let from_index = line
            .position(from)
            .ok_or_else(|| invalid("origin is not on the line"))?;
        let to_index = line
            .position(to)
            .ok_or_else(|| invalid("destination is not on the line"))?;

        let distance = Decimal::from(from_index.abs_diff(to_index));
        let total = Decimal::from(line.stops().len() - 1);
        let share = distance
            .checked_div(total)
            .ok_or_else(|| invalid("line has a single stop"))?;
        let raw = self.min_fare + share * (self.max_fare - self.min_fare);

        let rounded = match raw.checked_div(self.step) {
            Some(steps) => {
                steps.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero) * self.step
            }
            None => raw,
        };
        Ok(rounded.max(self.min_fare).min(self.max_fare))
    }

    /// `fare` less the discount, rounded to a whole currency unit.
    pub fn discounted(&self, fare: Decimal) -> Decimal {
        let hundred = Decimal::ONE_HUNDRED;
        (fare * (hundred - self.discount_percent) / hundred)
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn line_of(stops: usize) -> TransitLine {
        TransitLine::new("test", "Test Line", (0..stops).map(|i| format!("S{i}")))
    }

    #[test]
    fn end_to_end_is_max_fare() {
        let line = line_of(12);
        let schedule = FareSchedule::default();
        let fare = schedule.fare(&line, "S0", "S11").unwrap();
        assert_eq!(fare, Decimal::from(30));
        assert_eq!(schedule.discounted(fare), Decimal::from(27));
    }

    #[test]
    fn fares_round_to_nearest_step() {
        let line = line_of(12);
        let schedule = FareSchedule::default();
        // 5 + 1/11 * 25 = 7.27 -> 5
        assert_eq!(schedule.fare(&line, "S0", "S1").unwrap(), Decimal::from(5));
        // 5 + 3/11 * 25 = 11.8 -> 10
        assert_eq!(schedule.fare(&line, "S0", "S3").unwrap(), Decimal::from(10));
        // 5 + 6/11 * 25 = 18.6 -> 20
        assert_eq!(schedule.fare(&line, "S2", "S8").unwrap(), Decimal::from(20));
        // 5 + 1/2 * 25 = 17.5, 3.5 steps rounds up -> 20
        assert_eq!(
            schedule.fare(&line_of(3), "S0", "S1").unwrap(),
            Decimal::from(20)
        );
    }

    #[test]
    fn discount_rounds_to_whole_units() {
        let schedule = FareSchedule::default();
        assert_eq!(schedule.discounted(Decimal::from(5)), Decimal::from(5)); // 4.5
        assert_eq!(schedule.discounted(Decimal::from(15)), Decimal::from(14)); // 13.5
        assert_eq!(schedule.discounted(Decimal::from(20)), Decimal::from(18));
    }

    #[test]
    fn invalid_routes() {
        let line = line_of(6);
        let schedule = FareSchedule::default();
        assert!(matches!(
            schedule.fare(&line, "S2", "S2"),
            Err(FareError::RouteInvalid { .. })
        ));
        assert!(matches!(
            schedule.fare(&line, "S2", "Nowhere"),
            Err(FareError::RouteInvalid { .. })
        ));
        assert!(matches!(
            schedule.fare(&line, "Nowhere", "S2"),
            Err(FareError::RouteInvalid { .. })
        ));
    }

    proptest! {
        #[test]
        fn fares_are_bounded_and_symmetric(stops in 2usize..40, a in 0usize..40, b in 0usize..40) {
            prop_assume!(a < stops && b < stops && a != b);
            let line = line_of(stops);
            let schedule = FareSchedule::default();
            let (from, to) = (format!("S{a}"), format!("S{b}"));

            let there = schedule.fare(&line, &from, &to).unwrap();
            let back = schedule.fare(&line, &to, &from).unwrap();
            prop_assert_eq!(there, back);
            prop_assert!(there >= schedule.min_fare && there <= schedule.max_fare);
            prop_assert_eq!(there % schedule.step, Decimal::ZERO);
        }

        #[test]
        fn same_stop_never_priced(stops in 1usize..40, a in 0usize..40) {
            prop_assume!(a < stops);
            let stop = format!("S{a}");
            prop_assert!(FareSchedule::default().fare(&line_of(stops), &stop, &stop).is_err());
        }
    }
}
