use core::fmt;

use serde::{Deserialize, Serialize, Serializer};

use crate::domain::{DomainError, DomainResult};

/// A single 1..=5 star rating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(try_from = "i64")]
pub struct Rating(u8);

impl Rating {
    pub fn new(value: i64) -> DomainResult<Self> {
        match value {
            1..=5 => Ok(Self(value as u8)),
            _ => Err(DomainError::validation(
                "Rating must be an integer between 1 and 5.",
            )),
        }
    }

    pub const fn get(self) -> i16 {
        self.0 as i16
    }
}

impl TryFrom<i64> for Rating {
    type Error = DomainError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl Serialize for Rating {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.0)
    }
}

/// A mean rating held in hundredths, so `4.25` is `RatingAverage(425)`.
///
/// Rendered as a two-decimal string (`"4.25"`) to match the `NUMERIC(3,2)` column it is
/// stored in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct RatingAverage(i64);

impl RatingAverage {
    pub const ZERO: Self = Self(0);

    pub const fn hundredths(self) -> i64 {
        self.0
    }
}

impl From<i64> for RatingAverage {
    fn from(hundredths: i64) -> Self {
        Self(hundredths)
    }
}

impl fmt::Display for RatingAverage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

impl Serialize for RatingAverage {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Mean of every rating, rounded to two places with ties going to the even digit.
///
/// Returns zero for an empty set; callers only recompute after at least one submission.
pub fn recompute_average(ratings: &[Rating]) -> RatingAverage {
    if ratings.is_empty() {
        return RatingAverage::ZERO;
    }

    let count = ratings.len() as i64;
    let sum: i64 = ratings.iter().map(|r| i64::from(r.get())).sum();

    // exact mean in hundredths is (sum * 100) / count
    let numerator = sum * 100;
    let quotient = numerator / count;
    let remainder = numerator % count;

    let rounded = match (remainder * 2).cmp(&count) {
        core::cmp::Ordering::Less => quotient,
        core::cmp::Ordering::Greater => quotient + 1,
        core::cmp::Ordering::Equal if quotient % 2 == 0 => quotient,
        core::cmp::Ordering::Equal => quotient + 1,
    };

    RatingAverage(rounded)
}

#[cfg(test)]
mod test {
    use super::*;

    fn ratings(values: &[i64]) -> Vec<Rating> {
        values.iter().map(|v| Rating::new(*v).unwrap()).collect()
    }

    #[test]
    fn test_rating_bounds() {
        assert!(Rating::new(1).is_ok());
        assert!(Rating::new(5).is_ok());

        for bad in [0, 6, -3] {
            let err = Rating::new(bad).unwrap_err();
            assert_eq!(
                err,
                DomainError::validation("Rating must be an integer between 1 and 5.")
            );
        }
    }

    #[test]
    fn test_three_four_five_averages_to_four() {
        let average = recompute_average(&ratings(&[3, 4, 5]));

        assert_eq!(average, RatingAverage(400));
        assert_eq!(average.to_string(), "4.00");
        assert_eq!(serde_json::to_string(&average).unwrap(), "\"4.00\"");
    }

    #[test]
    fn test_average_rounds_to_two_places() {
        // 13 / 3 = 4.333..
        assert_eq!(recompute_average(&ratings(&[4, 4, 5])).to_string(), "4.33");
        // 14 / 3 = 4.666..
        assert_eq!(recompute_average(&ratings(&[4, 5, 5])).to_string(), "4.67");
        // 1 / 1
        assert_eq!(recompute_average(&ratings(&[1])).to_string(), "1.00");
    }

    #[test]
    fn test_average_ties_round_to_even() {
        // 33 / 8 = 4.125 -> 4.12
        let ties_down = ratings(&[5, 5, 5, 4, 4, 4, 3, 3]);
        assert_eq!(recompute_average(&ties_down).to_string(), "4.12");

        // 35 / 8 = 4.375 -> 4.38
        let ties_up = ratings(&[5, 5, 5, 5, 4, 4, 4, 3]);
        assert_eq!(recompute_average(&ties_up).to_string(), "4.38");
    }

    #[test]
    fn test_average_tracks_every_submission() {
        let mut submitted = Vec::new();
        for value in [5, 1, 4, 2, 3, 5, 5] {
            submitted.push(Rating::new(value).unwrap());
            let sum: i64 = submitted.iter().map(|r| i64::from(r.get())).sum();
            let exact = sum as f64 / submitted.len() as f64;
            let average = recompute_average(&submitted).hundredths() as f64 / 100.0;
            assert!((average - exact).abs() <= 0.005 + f64::EPSILON);
        }
    }

    #[test]
    fn test_empty_set_is_zero() {
        assert_eq!(recompute_average(&[]).to_string(), "0.00");
    }

    #[test]
    fn test_rating_deserializes_with_validation() {
        let ok: Rating = serde_json::from_str("4").unwrap();
        assert_eq!(ok.get(), 4);
        assert!(serde_json::from_str::<Rating>("9").is_err());
    }
}
