//! Fixed-precision decimal values for grid axes.
//!
//! Completion artifacts and checkpoints are matched by formatted value, so axis
//! values are kept as scaled integers rather than `f64`. A value parsed from
//! `"7.80"` formats back to `"7.80"` at precision 2 and to `"7.8"` in compact
//! form, and compares equal to `"7.8"`.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use crate::error::ValueError;

/// Largest number of fractional digits a value may carry
pub const MAX_PRECISION: u8 = 9;

const POW10: [i64; 10] = [
    1,
    10,
    100,
    1_000,
    10_000,
    100_000,
    1_000_000,
    10_000_000,
    100_000_000,
    1_000_000_000,
];

/// A decimal number stored as `units / 10^precision`
#[derive(Debug, Clone, Copy)]
pub struct Decimal {
    units: i64,
    precision: u8,
}

impl Decimal {
    /// Build a value from its scaled integer and precision.
    ///
    /// Precision is clamped to [`MAX_PRECISION`].
    #[must_use]
    pub fn new(units: i64, precision: u8) -> Self {
        Self {
            units,
            precision: precision.min(MAX_PRECISION),
        }
    }

    /// Parse a plain decimal literal (`-0.40`, `7`, `+8.6`).
    ///
    /// Exponents, thousands separators and non-finite values are rejected.
    pub fn parse(input: &str) -> Result<Self, ValueError> {
        let s = input.trim();
        if s.is_empty() {
            return Err(ValueError::Empty);
        }

        let (negative, body) = match s.as_bytes()[0] {
            b'-' => (true, &s[1..]),
            b'+' => (false, &s[1..]),
            _ => (false, s),
        };

        let (int_part, frac_part) = match body.split_once('.') {
            Some((i, f)) => (i, f),
            None => (body, ""),
        };

        if int_part.is_empty() && frac_part.is_empty() {
            return Err(ValueError::Invalid(input.to_string()));
        }
        if !int_part.bytes().all(|b| b.is_ascii_digit())
            || !frac_part.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(ValueError::Invalid(input.to_string()));
        }
        if frac_part.len() > MAX_PRECISION as usize {
            return Err(ValueError::TooPrecise {
                input: input.to_string(),
                max: MAX_PRECISION,
            });
        }

        let precision = frac_part.len() as u8;
        let mut units: i64 = 0;
        for b in int_part.bytes().chain(frac_part.bytes()) {
            units = units
                .checked_mul(10)
                .and_then(|u| u.checked_add(i64::from(b - b'0')))
                .ok_or_else(|| ValueError::OutOfRange(input.to_string()))?;
        }

        Ok(Self {
            units: if negative { -units } else { units },
            precision,
        })
    }

    /// Scaled integer representation
    #[must_use]
    pub fn units(&self) -> i64 {
        self.units
    }

    /// Number of fractional digits this value is formatted with
    #[must_use]
    pub fn precision(&self) -> u8 {
        self.precision
    }

    /// Rescale to `precision` fractional digits, rounding half away from zero.
    pub fn with_precision(&self, precision: u8) -> Result<Self, ValueError> {
        let precision = precision.min(MAX_PRECISION);
        match precision.cmp(&self.precision) {
            Ordering::Equal => Ok(*self),
            Ordering::Greater => {
                let factor = POW10[(precision - self.precision) as usize];
                let units = self
                    .units
                    .checked_mul(factor)
                    .ok_or_else(|| ValueError::OutOfRange(self.to_string()))?;
                Ok(Self { units, precision })
            }
            Ordering::Less => {
                let factor = POW10[(self.precision - precision) as usize];
                let half = factor / 2;
                let magnitude = (self.units.abs() + half) / factor;
                let units = if self.units < 0 { -magnitude } else { magnitude };
                Ok(Self { units, precision })
            }
        }
    }

    /// The same value with trailing fractional zeros removed
    #[must_use]
    pub fn normalized(&self) -> Self {
        let mut units = self.units;
        let mut precision = self.precision;
        while precision > 0 && units % 10 == 0 {
            units /= 10;
            precision -= 1;
        }
        Self { units, precision }
    }

    /// Shortest form with at least one fractional digit (`7.0`, `-0.4`, `10.25`).
    ///
    /// This is the form external workers embed in artifact file names.
    #[must_use]
    pub fn compact(&self) -> String {
        let n = self.normalized();
        if n.precision == 0 {
            format!("{}.0", n.units)
        } else {
            n.to_string()
        }
    }

    fn widened(&self, precision: u8) -> i128 {
        i128::from(self.units) * i128::from(POW10[(precision - self.precision) as usize])
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.units < 0 { "-" } else { "" };
        let magnitude = self.units.unsigned_abs();
        if self.precision == 0 {
            return write!(f, "{sign}{magnitude}");
        }
        let scale = POW10[self.precision as usize] as u64;
        let width = self.precision as usize;
        write!(
            f,
            "{sign}{}.{:0width$}",
            magnitude / scale,
            magnitude % scale
        )
    }
}

impl FromStr for Decimal {
    type Err = ValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl PartialEq for Decimal {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Decimal {}

impl PartialOrd for Decimal {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Decimal {
    fn cmp(&self, other: &Self) -> Ordering {
        let precision = self.precision.max(other.precision);
        self.widened(precision).cmp(&other.widened(precision))
    }
}

impl Hash for Decimal {
    fn hash<H: Hasher>(&self, state: &mut H) {
        let n = self.normalized();
        n.units.hash(state);
        n.precision.hash(state);
    }
}

/// Parse a comma-separated list of values (`"6.50, 6.60, 6.70"`).
pub fn parse_list(list: &str) -> Result<Vec<Decimal>, ValueError> {
    list.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(Decimal::parse)
        .collect()
}

/// Render values as `a, b, c` at a fixed precision.
pub fn render_list(values: &[Decimal], precision: u8) -> String {
    values
        .iter()
        .map(|v| match v.with_precision(precision) {
            Ok(scaled) => scaled.to_string(),
            Err(_) => v.to_string(),
        })
        .collect::<Vec<_>>()
        .join(", ")
}
