//! Worker allocation and balanced chunking.
//!
//! The worker budget is shared across categories in proportion to their
//! combination counts. Each category is then cut into that many contiguous
//! chunks whose sizes differ by at most one.

use std::collections::BTreeSet;
use std::fmt;

use crate::grid::Combination;
use crate::value::Decimal;

/// How many workers to aim for, and how many may be opened before the
/// operator must confirm
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerBudget {
    /// Target total number of workers across all categories
    pub target: usize,
    /// Launches allowed between operator confirmations
    pub hard_cap: usize,
}

impl Default for WorkerBudget {
    fn default() -> Self {
        Self {
            target: 4,
            hard_cap: 10,
        }
    }
}

/// Emitted when the effective worker count exceeds the requested budget
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BudgetWarning {
    pub requested: usize,
    pub effective: usize,
    /// Categories with at least one combination
    pub categories: usize,
}

impl fmt::Display for BudgetWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "effective worker count {} exceeds the requested budget of {}",
            self.effective, self.requested
        )?;
        if self.categories > self.requested {
            write!(
                f,
                " (each of the {} non-empty categories needs at least one worker)",
                self.categories
            )
        } else {
            write!(f, " (category shares were rounded up)")
        }
    }
}

/// Workers per category, in category order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Allocation {
    pub workers: Vec<usize>,
    pub warning: Option<BudgetWarning>,
}

impl Allocation {
    #[must_use]
    pub fn total(&self) -> usize {
        self.workers.iter().sum()
    }
}

/// Identifies one chunk: its category and its position within the category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkId {
    pub category: usize,
    pub chunk: usize,
}

impl fmt::Display for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.category, self.chunk)
    }
}

/// A non-empty slice of one category's combinations, run by one worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub id: ChunkId,
    /// The category's fixed worker parameter
    pub parameter: Decimal,
    pub combinations: Vec<Combination>,
}

impl Chunk {
    #[must_use]
    pub fn len(&self) -> usize {
        self.combinations.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.combinations.is_empty()
    }

    /// Sorted unique values present on each axis across this chunk.
    ///
    /// The product of these sets can be larger than the chunk itself; see
    /// [`Chunk::over_coverage`].
    #[must_use]
    pub fn covering_sets(&self) -> Vec<Vec<Decimal>> {
        let arity = self.combinations.first().map_or(0, |c| c.values().len());
        let mut sets = vec![BTreeSet::new(); arity];
        for combination in &self.combinations {
            for (set, v) in sets.iter_mut().zip(combination.values()) {
                set.insert(*v);
            }
        }
        sets.into_iter().map(|s| s.into_iter().collect()).collect()
    }

    /// Combinations described by the covering sets that are not part of the chunk
    #[must_use]
    pub fn over_coverage(&self) -> usize {
        if self.combinations.is_empty() {
            return 0;
        }
        let described: usize = self.covering_sets().iter().map(Vec::len).product();
        described - self.combinations.len()
    }
}

/// Splits categories into balanced chunks under a worker budget
#[derive(Debug, Clone, Copy, Default)]
pub struct ChunkBalancer {
    budget: WorkerBudget,
}

impl ChunkBalancer {
    #[must_use]
    pub fn new(budget: WorkerBudget) -> Self {
        Self { budget }
    }

    #[must_use]
    pub fn budget(&self) -> WorkerBudget {
        self.budget
    }

    /// Share the target budget across categories of the given sizes.
    ///
    /// Each non-empty category gets `round(count / total * target)` workers,
    /// rounding half up, at least one and never more than its combination
    /// count. Empty categories get none.
    #[must_use]
    pub fn allocate(&self, counts: &[usize]) -> Allocation {
        let total: usize = counts.iter().sum();
        let target = self.budget.target;

        let workers: Vec<usize> = counts
            .iter()
            .map(|&count| {
                if count == 0 {
                    return 0;
                }
                // Integer round-half-up of count * target / total
                let share = (2 * count * target + total) / (2 * total);
                share.clamp(1, count)
            })
            .collect();

        let effective: usize = workers.iter().sum();
        let warning = (effective > target).then_some(BudgetWarning {
            requested: target,
            effective,
            categories: counts.iter().filter(|&&count| count > 0).count(),
        });

        Allocation { workers, warning }
    }

    /// Cut `combinations` into `k` contiguous chunks.
    ///
    /// The first `n % k` chunks receive one extra combination. `k` is clamped
    /// to `1..=n`; an empty input yields no chunks.
    #[must_use]
    pub fn balance(
        &self,
        category: usize,
        parameter: Decimal,
        combinations: Vec<Combination>,
        k: usize,
    ) -> Vec<Chunk> {
        let n = combinations.len();
        if n == 0 {
            return Vec::new();
        }
        let k = k.clamp(1, n);
        let base = n / k;
        let extra = n % k;

        let mut rest = combinations.into_iter();
        (0..k)
            .map(|chunk| {
                let size = base + usize::from(chunk < extra);
                Chunk {
                    id: ChunkId { category, chunk },
                    parameter,
                    combinations: rest.by_ref().take(size).collect(),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn combos(n: usize) -> Vec<Combination> {
        (0..n)
            .map(|i| {
                Combination::new(vec![
                    Decimal::new(i as i64 / 4, 0),
                    Decimal::new(i as i64 % 4, 0),
                ])
            })
            .collect()
    }

    fn balancer(target: usize) -> ChunkBalancer {
        ChunkBalancer::new(WorkerBudget {
            target,
            hard_cap: 10,
        })
    }

    #[test]
    fn test_balanced_sizes_and_coverage() {
        let input = combos(23);
        let chunks = balancer(4).balance(0, Decimal::new(40, 1), input.clone(), 5);

        let sizes: Vec<usize> = chunks.iter().map(Chunk::len).collect();
        assert_eq!(sizes, vec![5, 5, 5, 4, 4]);

        let mut seen = HashSet::new();
        for chunk in &chunks {
            for c in &chunk.combinations {
                assert!(seen.insert(c.clone()), "chunks overlap on {c}");
            }
        }
        assert_eq!(seen.len(), input.len());
        assert_eq!(chunks[4].id, ChunkId { category: 0, chunk: 4 });
    }

    #[test]
    fn test_balance_is_deterministic() {
        let b = balancer(4);
        let first = b.balance(1, Decimal::new(20, 1), combos(17), 3);
        let second = b.balance(1, Decimal::new(20, 1), combos(17), 3);
        assert_eq!(first, second);
    }

    #[test]
    fn test_balance_edge_cases() {
        let b = balancer(4);
        assert!(b.balance(0, Decimal::new(5, 1), vec![], 3).is_empty());
        // More chunks than combinations collapses to one per combination
        assert_eq!(b.balance(0, Decimal::new(5, 1), combos(2), 8).len(), 2);
        assert_eq!(b.balance(0, Decimal::new(5, 1), combos(5), 0).len(), 1);
    }

    #[test]
    fn test_allocation_is_proportional() {
        let allocation = balancer(4).allocate(&[52, 16, 28]);
        assert_eq!(allocation.workers, vec![2, 1, 1]);
        assert_eq!(allocation.warning, None);

        let allocation = balancer(10).allocate(&[50, 0, 50]);
        assert_eq!(allocation.workers, vec![5, 0, 5]);
    }

    #[test]
    fn test_allocation_floor_raises_budget_with_warning() {
        let allocation = balancer(1).allocate(&[10, 10, 10]);
        assert_eq!(allocation.workers, vec![1, 1, 1]);
        assert_eq!(
            allocation.warning,
            Some(BudgetWarning {
                requested: 1,
                effective: 3,
                categories: 3,
            })
        );
        let text = allocation.warning.unwrap().to_string();
        assert!(text.contains("each of the 3 non-empty categories needs at least one worker"));
    }

    #[test]
    fn test_rounding_overshoot_is_not_blamed_on_the_floor() {
        // 1.5 rounds up to 2 for both halves
        let allocation = balancer(3).allocate(&[50, 50]);
        assert_eq!(allocation.workers, vec![2, 2]);
        let warning = allocation.warning.unwrap();
        assert_eq!(warning.categories, 2);
        let text = warning.to_string();
        assert!(text.contains("effective worker count 4 exceeds the requested budget of 3"));
        assert!(text.contains("rounded up"));
        assert!(!text.contains("at least one worker"));
    }

    #[test]
    fn test_allocation_never_exceeds_category_size() {
        let allocation = balancer(100).allocate(&[2, 98]);
        assert_eq!(allocation.workers, vec![2, 98]);
    }

    #[test]
    fn test_covering_sets_and_over_coverage() {
        // (0,3) and (1,0) reduce to {0,1} x {0,3}: two extra points
        let chunk = Chunk {
            id: ChunkId {
                category: 0,
                chunk: 0,
            },
            parameter: Decimal::new(40, 1),
            combinations: combos(5)[3..5].to_vec(),
        };
        let sets = chunk.covering_sets();
        assert_eq!(sets[0], vec![Decimal::new(0, 0), Decimal::new(1, 0)]);
        assert_eq!(sets[1], vec![Decimal::new(0, 0), Decimal::new(3, 0)]);
        assert_eq!(chunk.over_coverage(), 2);
    }
}
