//! Unsigned rational numbers as stored on the wire.
//!
//! Grain rates, durations and aspect ratios are stored as a pair of u32
//! values. A zero numerator or denominator is the conventional "null"
//! signal; the codec preserves whatever literal values were written and
//! leaves interpretation to consumers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// An unsigned rational `(numerator, denominator)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rational {
    pub numerator: u32,
    pub denominator: u32,
}

impl Rational {
    pub const fn new(numerator: u32, denominator: u32) -> Self {
        Self {
            numerator,
            denominator,
        }
    }

    /// The conventional null value (0/1).
    pub const fn null() -> Self {
        Self::new(0, 1)
    }

    /// True when either side is zero.
    pub fn is_null(&self) -> bool {
        self.numerator == 0 || self.denominator == 0
    }

    /// The rational as a float, or 0.0 for null values.
    pub fn as_f64(&self) -> f64 {
        if self.is_null() {
            0.0
        } else {
            self.numerator as f64 / self.denominator as f64
        }
    }

    /// The reciprocal, used to derive a per-grain duration from a rate.
    pub fn invert(&self) -> Self {
        Self::new(self.denominator, self.numerator)
    }
}

impl fmt::Display for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.numerator, self.denominator)
    }
}

/// Parses `"25"` or `"30000/1001"`.
impl FromStr for Rational {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parse = |part: &str| {
            part.trim()
                .parse::<u32>()
                .map_err(|e| format!("invalid rational {:?}: {}", s, e))
        };
        match s.split_once('/') {
            Some((num, den)) => Ok(Rational::new(parse(num)?, parse(den)?)),
            None => Ok(Rational::new(parse(s)?, 1)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ---------------------------------------------------------------
    // Null handling
    // ---------------------------------------------------------------

    #[test]
    fn test_null_when_numerator_zero() {
        assert!(Rational::new(0, 25).is_null());
    }

    #[test]
    fn test_null_when_denominator_zero() {
        assert!(Rational::new(25, 0).is_null());
    }

    #[test]
    fn test_not_null() {
        assert!(!Rational::new(25, 1).is_null());
    }

    #[test]
    fn test_literal_values_preserved() {
        // 50/2 is not reduced to 25/1
        let r = Rational::new(50, 2);
        assert_eq!(r.numerator, 50);
        assert_eq!(r.denominator, 2);
    }

    // ---------------------------------------------------------------
    // Conversions
    // ---------------------------------------------------------------

    #[test]
    fn test_as_f64() {
        assert_eq!(Rational::new(30000, 1001).as_f64(), 30000.0 / 1001.0);
        assert_eq!(Rational::new(0, 0).as_f64(), 0.0);
    }

    #[test]
    fn test_invert() {
        assert_eq!(Rational::new(25, 1).invert(), Rational::new(1, 25));
    }

    #[test]
    fn test_display() {
        assert_eq!(Rational::new(30000, 1001).to_string(), "30000/1001");
    }

    // ---------------------------------------------------------------
    // Parsing
    // ---------------------------------------------------------------

    #[test]
    fn test_parse_plain_integer() {
        assert_eq!("25".parse::<Rational>().unwrap(), Rational::new(25, 1));
    }

    #[test]
    fn test_parse_fraction() {
        assert_eq!(
            "30000/1001".parse::<Rational>().unwrap(),
            Rational::new(30000, 1001)
        );
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("abc".parse::<Rational>().is_err());
        assert!("1/x".parse::<Rational>().is_err());
    }
}
