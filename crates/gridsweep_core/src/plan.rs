//! Grid → categories → chunks, computed up front so the plan can be shown
//! before anything is launched.

use tracing::warn;

use crate::category::{CategoryBounds, CategoryPolicy};
use crate::chunk::{BudgetWarning, Chunk, ChunkBalancer};
use crate::error::PartitionError;
use crate::grid::Grid;

/// One category of a sweep plan
#[derive(Debug, Clone)]
pub struct CategoryPlan {
    pub bounds: CategoryBounds,
    /// Number of combinations in the category
    pub combinations: usize,
    /// Chunks in dispatch order; empty when the category has no combinations
    pub chunks: Vec<Chunk>,
}

/// Every chunk of a sweep, grouped by category
#[derive(Debug, Clone)]
pub struct SweepPlan {
    pub categories: Vec<CategoryPlan>,
    pub warning: Option<BudgetWarning>,
}

impl SweepPlan {
    /// Partition `grid` with `policy` and balance each category with `balancer`.
    pub fn build(
        grid: &Grid,
        policy: &CategoryPolicy,
        balancer: &ChunkBalancer,
    ) -> Result<Self, PartitionError> {
        let categories = policy.partition(grid)?;
        let counts: Vec<usize> = categories.iter().map(|c| c.len()).collect();
        let allocation = balancer.allocate(&counts);
        if let Some(warning) = &allocation.warning {
            warn!("{warning}");
        }

        let categories = categories
            .into_iter()
            .zip(&allocation.workers)
            .map(|(category, &workers)| {
                let combinations = category.len();
                let chunks = balancer.balance(
                    category.bounds.index,
                    category.bounds.parameter,
                    category.combinations,
                    workers,
                );
                CategoryPlan {
                    bounds: category.bounds,
                    combinations,
                    chunks,
                }
            })
            .collect();

        Ok(Self {
            categories,
            warning: allocation.warning,
        })
    }

    /// All chunks in dispatch order: category order, then chunk index
    pub fn chunks(&self) -> impl Iterator<Item = &Chunk> {
        self.categories.iter().flat_map(|c| c.chunks.iter())
    }

    #[must_use]
    pub fn chunk_count(&self) -> usize {
        self.categories.iter().map(|c| c.chunks.len()).sum()
    }

    #[must_use]
    pub fn total_combinations(&self) -> usize {
        self.categories.iter().map(|c| c.combinations).sum()
    }

    /// Human-readable summary, one line per category and per chunk
    #[must_use]
    pub fn describe(&self, axis: &str, parameter_key: &str) -> String {
        let mut out = String::new();
        for category in &self.categories {
            out.push_str(&format!(
                "{parameter_key} = {} ({axis} {}): {} combinations in {} chunk(s)\n",
                category.bounds.parameter,
                category.bounds,
                category.combinations,
                category.chunks.len()
            ));
            for chunk in &category.chunks {
                let first = chunk.combinations.first();
                let last = chunk.combinations.last();
                if let (Some(first), Some(last)) = (first, last) {
                    out.push_str(&format!(
                        "  chunk {}: {} combinations, {first} .. {last}",
                        chunk.id.chunk + 1,
                        chunk.len()
                    ));
                    let extra = chunk.over_coverage();
                    if extra > 0 {
                        out.push_str(&format!(" (axis sets describe {extra} more)"));
                    }
                    out.push('\n');
                }
            }
        }
        out.push_str(&format!(
            "total: {} combinations in {} chunk(s)\n",
            self.total_combinations(),
            self.chunk_count()
        ));
        out
    }
}
