//! Named axes and their Cartesian product.
//!
//! Combinations are produced lazily in a fixed order: the first declared axis
//! is the outermost loop and the last declared axis varies fastest, each axis
//! walking its values in ascending order.

use std::collections::BTreeSet;
use std::fmt;

use crate::error::GridError;
use crate::value::{self, Decimal};

/// One parameter dimension of the sweep
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Axis {
    name: String,
    precision: u8,
    values: Vec<Decimal>,
}

impl Axis {
    /// Create an axis, widening every value to `precision` and sorting ascending.
    ///
    /// A value with more fractional digits than `precision` is rejected unless
    /// the extra digits are zeros (`7.80` fits precision 1, `7.85` does not).
    pub fn new(
        name: impl Into<String>,
        values: impl IntoIterator<Item = Decimal>,
        precision: u8,
    ) -> Result<Self, GridError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(GridError::EmptyAxisName);
        }

        let mut scaled = Vec::new();
        for v in values {
            let scaled_value = v
                .with_precision(precision)
                .map_err(|source| GridError::InvalidValue {
                    axis: name.clone(),
                    source,
                })?;
            if scaled_value != v {
                return Err(GridError::PrecisionLoss {
                    axis: name,
                    value: v,
                    precision,
                });
            }
            scaled.push(scaled_value);
        }
        if scaled.is_empty() {
            return Err(GridError::EmptyAxis(name));
        }

        scaled.sort();
        if let Some(pair) = scaled.windows(2).find(|w| w[0] == w[1]) {
            return Err(GridError::DuplicateValue {
                axis: name,
                value: pair[0],
            });
        }

        Ok(Self {
            name,
            precision: precision.min(value::MAX_PRECISION),
            values: scaled,
        })
    }

    /// Parse a comma-separated value list into an axis
    pub fn parse(name: impl Into<String>, list: &str, precision: u8) -> Result<Self, GridError> {
        let name = name.into();
        let values = value::parse_list(list).map_err(|source| GridError::InvalidValue {
            axis: name.clone(),
            source,
        })?;
        Self::new(name, values, precision)
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn precision(&self) -> u8 {
        self.precision
    }

    /// Values in ascending order
    #[must_use]
    pub fn values(&self) -> &[Decimal] {
        &self.values
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[must_use]
    pub fn contains(&self, v: &Decimal) -> bool {
        self.values.binary_search(v).is_ok()
    }

    /// `a, b, c` at this axis's precision
    #[must_use]
    pub fn render(&self) -> String {
        value::render_list(&self.values, self.precision)
    }
}

/// One point of the grid: exactly one value per axis, in axis order
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Combination(Vec<Decimal>);

impl Combination {
    #[must_use]
    pub fn new(values: Vec<Decimal>) -> Self {
        Self(values)
    }

    #[must_use]
    pub fn values(&self) -> &[Decimal] {
        &self.0
    }

    #[must_use]
    pub fn get(&self, axis: usize) -> Option<&Decimal> {
        self.0.get(axis)
    }

    /// Values in compact form joined by `sep`
    #[must_use]
    pub fn join_compact(&self, sep: &str) -> String {
        self.0
            .iter()
            .map(Decimal::compact)
            .collect::<Vec<_>>()
            .join(sep)
    }
}

impl fmt::Display for Combination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({})", self.join_compact(", "))
    }
}

/// A set of independent axes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grid {
    axes: Vec<Axis>,
}

impl Grid {
    pub fn new(axes: Vec<Axis>) -> Result<Self, GridError> {
        if axes.is_empty() {
            return Err(GridError::NoAxes);
        }
        let mut seen = BTreeSet::new();
        for axis in &axes {
            if !seen.insert(axis.name()) {
                return Err(GridError::DuplicateAxis(axis.name().to_string()));
            }
        }
        Ok(Self { axes })
    }

    /// Axes in declaration order
    #[must_use]
    pub fn axes(&self) -> &[Axis] {
        &self.axes
    }

    #[must_use]
    pub fn axis(&self, name: &str) -> Option<&Axis> {
        self.axes.iter().find(|a| a.name() == name)
    }

    pub fn axis_index(&self, name: &str) -> Result<usize, GridError> {
        self.axes
            .iter()
            .position(|a| a.name() == name)
            .ok_or_else(|| GridError::UnknownAxis(name.to_string()))
    }

    /// Number of combinations (product of axis lengths)
    #[must_use]
    pub fn len(&self) -> usize {
        self.axes.iter().map(Axis::len).product()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// A fresh iterator over the full Cartesian product
    #[must_use]
    pub fn combinations(&self) -> Combinations<'_> {
        Combinations {
            axes: &self.axes,
            indices: vec![0; self.axes.len()],
            remaining: self.len(),
        }
    }
}

/// Lazy Cartesian product over a grid's axes
#[derive(Debug, Clone)]
pub struct Combinations<'a> {
    axes: &'a [Axis],
    indices: Vec<usize>,
    remaining: usize,
}

impl Iterator for Combinations<'_> {
    type Item = Combination;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }

        let point = self
            .indices
            .iter()
            .zip(self.axes)
            .map(|(&i, axis)| axis.values[i])
            .collect();
        self.remaining -= 1;

        // Advance like an odometer with the last axis as the lowest digit
        for (index, axis) in self.indices.iter_mut().zip(self.axes).rev() {
            *index += 1;
            if *index < axis.len() {
                break;
            }
            *index = 0;
        }

        Some(Combination(point))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for Combinations<'_> {}
