//! Age-range categories.
//!
//! Workers need a different minimum stellar mass depending on age, so the grid
//! is split along the age axis into contiguous ranges with closed upper bounds.
//! The other axes are orthogonal to this split.

use std::fmt;

use crate::error::PartitionError;
use crate::grid::{Axis, Combination, Grid};
use crate::value::Decimal;

/// Axis the default policy partitions on
pub const AGE_AXIS: &str = "genlikeliages";
/// Key the default policy's fixed parameter is written under
pub const MIN_MASS_KEY: &str = "genlikelimmin";

/// One range of the category axis and the parameter workers need for it.
///
/// `upper_bound` is inclusive; `None` means the range is open-ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryRule {
    pub upper_bound: Option<Decimal>,
    pub parameter: Decimal,
}

impl CategoryRule {
    #[must_use]
    pub fn up_to(upper_bound: Decimal, parameter: Decimal) -> Self {
        Self {
            upper_bound: Some(upper_bound),
            parameter,
        }
    }

    #[must_use]
    pub fn open(parameter: Decimal) -> Self {
        Self {
            upper_bound: None,
            parameter,
        }
    }
}

/// Range and parameter of one category, without its combinations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryBounds {
    pub index: usize,
    /// Exclusive lower bound (the previous rule's upper bound)
    pub lower: Option<Decimal>,
    /// Inclusive upper bound
    pub upper: Option<Decimal>,
    pub parameter: Decimal,
}

impl CategoryBounds {
    #[must_use]
    pub fn contains(&self, v: &Decimal) -> bool {
        self.lower.is_none_or(|lo| *v > lo) && self.upper.is_none_or(|hi| *v <= hi)
    }
}

impl fmt::Display for CategoryBounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.lower, self.upper) {
            (None, None) => write!(f, "all values"),
            (None, Some(hi)) => write!(f, "<= {hi}"),
            (Some(lo), Some(hi)) => write!(f, "({lo}, {hi}]"),
            (Some(lo), None) => write!(f, "> {lo}"),
        }
    }
}

/// A category and the combinations that fall into it, in grid order
#[derive(Debug, Clone)]
pub struct Category {
    pub bounds: CategoryBounds,
    pub combinations: Vec<Combination>,
}

impl Category {
    #[must_use]
    pub fn len(&self) -> usize {
        self.combinations.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.combinations.is_empty()
    }
}

/// Ordered, non-overlapping rules keyed on one axis
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryPolicy {
    axis: String,
    parameter_key: String,
    rules: Vec<CategoryRule>,
}

impl CategoryPolicy {
    pub fn new(
        axis: impl Into<String>,
        parameter_key: impl Into<String>,
        rules: Vec<CategoryRule>,
    ) -> Result<Self, PartitionError> {
        if rules.is_empty() {
            return Err(PartitionError::NoRules);
        }

        let last = rules.len() - 1;
        let mut previous: Option<Decimal> = None;
        for (i, rule) in rules.iter().enumerate() {
            match rule.upper_bound {
                None if i != last => return Err(PartitionError::UnboundedRuleNotLast(i)),
                None => {}
                Some(bound) => {
                    if let Some(prev) = previous.filter(|prev| bound <= *prev) {
                        return Err(PartitionError::OverlappingRules {
                            previous: prev,
                            next: bound,
                        });
                    }
                    previous = Some(bound);
                }
            }
        }

        Ok(Self {
            axis: axis.into(),
            parameter_key: parameter_key.into(),
            rules,
        })
    }

    /// Minimum-mass table: ages `<= 7.80` need 4.0, `(7.80, 8.60]` need 2.0,
    /// older ages need 0.5.
    #[must_use]
    pub fn stellar_mass() -> Self {
        let d = |units, precision| Decimal::new(units, precision);
        Self {
            axis: AGE_AXIS.to_string(),
            parameter_key: MIN_MASS_KEY.to_string(),
            rules: vec![
                CategoryRule::up_to(d(780, 2), d(40, 1)),
                CategoryRule::up_to(d(860, 2), d(20, 1)),
                CategoryRule::open(d(5, 1)),
            ],
        }
    }

    /// Name of the axis categories are keyed on
    #[must_use]
    pub fn axis(&self) -> &str {
        &self.axis
    }

    /// Parameter file key the category parameter is written under
    #[must_use]
    pub fn parameter_key(&self) -> &str {
        &self.parameter_key
    }

    #[must_use]
    pub fn rules(&self) -> &[CategoryRule] {
        &self.rules
    }

    /// Bounds of every category, in rule order
    #[must_use]
    pub fn bounds(&self) -> Vec<CategoryBounds> {
        let mut lower = None;
        self.rules
            .iter()
            .enumerate()
            .map(|(index, rule)| {
                let bounds = CategoryBounds {
                    index,
                    lower,
                    upper: rule.upper_bound,
                    parameter: rule.parameter,
                };
                lower = rule.upper_bound;
                bounds
            })
            .collect()
    }

    /// Index of the category `v` falls into.
    ///
    /// A value equal to a bound belongs to the lower category.
    #[must_use]
    pub fn category_of(&self, v: &Decimal) -> Option<usize> {
        self.rules
            .iter()
            .position(|rule| rule.upper_bound.is_none_or(|hi| *v <= hi))
    }

    /// Fail if any value of `axis` falls outside every rule
    pub fn check_covers(&self, axis: &Axis) -> Result<(), PartitionError> {
        match axis.values().iter().find(|v| self.category_of(v).is_none()) {
            Some(v) => Err(PartitionError::Uncovered {
                axis: axis.name().to_string(),
                value: *v,
            }),
            None => Ok(()),
        }
    }

    /// Assign every combination of `grid` to exactly one category.
    ///
    /// Returns one entry per rule, including empty ones, in rule order.
    pub fn partition(&self, grid: &Grid) -> Result<Vec<Category>, PartitionError> {
        let axis_index = grid.axis_index(&self.axis)?;
        self.check_covers(&grid.axes()[axis_index])?;

        let mut categories: Vec<Category> = self
            .bounds()
            .into_iter()
            .map(|bounds| Category {
                bounds,
                combinations: Vec::new(),
            })
            .collect();

        for combination in grid.combinations() {
            let value = combination.values()[axis_index];
            let index = self
                .category_of(&value)
                .ok_or_else(|| PartitionError::Uncovered {
                    axis: self.axis.clone(),
                    value,
                })?;
            categories[index].combinations.push(combination);
        }

        Ok(categories)
    }
}
