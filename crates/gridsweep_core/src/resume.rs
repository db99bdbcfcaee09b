//! Offline diff of the checkpointed grid against completion artifacts.
//!
//! The analyzer rebuilds every combination from the checkpoint, partitions
//! them with the same policy as the forward sweep and reports, per category,
//! the axis values that still have work outstanding. It only reads.

use std::path::{Path, PathBuf};

#[cfg(feature = "parallel")]
use rayon::prelude::*;
use tracing::info;

use crate::artifact::{ArtifactIndex, ArtifactNaming};
use crate::category::{CategoryBounds, CategoryPolicy};
use crate::checkpoint::Checkpoint;
use crate::error::{RecordError, SweepError};
use crate::grid::{Combination, Grid};
use crate::mode::RunMode;
use crate::record::atomic_write;
use crate::value::{self, Decimal};

/// Outstanding work in one category
#[derive(Debug, Clone)]
pub struct CategoryOutstanding {
    pub bounds: CategoryBounds,
    /// Combinations the category holds
    pub expected: usize,
    /// Combinations without an artifact, in grid order
    pub missing: Vec<Combination>,
    /// Sorted unique missing values, one list per axis
    pub outstanding: Vec<Vec<Decimal>>,
}

impl CategoryOutstanding {
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}

/// Result of a resume analysis
#[derive(Debug, Clone)]
pub struct ResumeReport {
    pub mode: RunMode,
    pub artifact_dir: PathBuf,
    /// Axis names and precisions in grid order
    pub axes: Vec<(String, u8)>,
    pub category_axis: String,
    pub parameter_key: String,
    pub categories: Vec<CategoryOutstanding>,
    /// Distinct combinations with an artifact
    pub artifacts_found: usize,
    /// Files listed in the artifact directory
    pub scanned: usize,
    /// Files whose names did not parse as artifacts
    pub ignored: usize,
}

impl ResumeReport {
    #[must_use]
    pub fn expected(&self) -> usize {
        self.categories.iter().map(|c| c.expected).sum()
    }

    #[must_use]
    pub fn missing(&self) -> usize {
        self.categories.iter().map(|c| c.missing.len()).sum()
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.categories.iter().all(CategoryOutstanding::is_complete)
    }

    /// Plain-text report: one block per category, axis lines formatted so
    /// they can be pasted into the parameter file.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = format!(
            "Compared completion artifacts in {} against the initial {} grid: \
             {} of {} combinations outstanding.\n",
            self.artifact_dir.display(),
            self.mode,
            self.missing(),
            self.expected()
        );
        if self.ignored > 0 {
            out.push_str(&format!(
                "{} of {} file(s) in the directory were not recognised as artifacts.\n",
                self.ignored,
                self.scanned
            ));
        }
        if !self.is_complete() {
            out.push_str("Set these parameters to pick up where the sweep left off.\n");
        }

        for category in &self.categories {
            if category.expected == 0 {
                continue;
            }
            out.push('\n');
            out.push_str(&format!(
                "{} = {} ({} {}): ",
                self.parameter_key, category.bounds.parameter, self.category_axis, category.bounds
            ));
            if category.is_complete() {
                out.push_str(&format!("complete ({} combinations)\n", category.expected));
                continue;
            }
            out.push_str(&format!(
                "{} of {} outstanding\n",
                category.missing.len(),
                category.expected
            ));
            for ((name, precision), values) in self.axes.iter().zip(&category.outstanding) {
                out.push_str(&format!(
                    "{name} = {}\n",
                    value::render_list(values, *precision)
                ));
            }
        }
        out
    }

    /// Write the report into `dir` under the mode's report name
    pub fn write(&self, dir: &Path) -> Result<PathBuf, RecordError> {
        let path = dir.join(self.mode.report_file_name());
        atomic_write(&path, &self.render()).map_err(|e| RecordError::io(&path, e))?;
        Ok(path)
    }
}

pub struct ResumeAnalyzer {
    policy: CategoryPolicy,
    naming: ArtifactNaming,
}

impl ResumeAnalyzer {
    #[must_use]
    pub fn new(policy: CategoryPolicy, naming: ArtifactNaming) -> Self {
        Self { policy, naming }
    }

    /// Diff the checkpoint's grid against the artifacts in `artifact_dir`
    pub fn analyze(
        &self,
        checkpoint: &Checkpoint,
        artifact_dir: &Path,
    ) -> Result<ResumeReport, SweepError> {
        let grid = checkpoint.grid()?;
        self.analyze_grid(checkpoint.mode, &grid, artifact_dir)
    }

    pub fn analyze_grid(
        &self,
        mode: RunMode,
        grid: &Grid,
        artifact_dir: &Path,
    ) -> Result<ResumeReport, SweepError> {
        let index = self
            .naming
            .scan(artifact_dir, grid.axes().len())
            .map_err(|source| SweepError::ArtifactScan {
                path: artifact_dir.to_path_buf(),
                source,
            })?;

        let categories = self
            .policy
            .partition(grid)?
            .into_iter()
            .map(|category| {
                let expected = category.len();
                let missing = missing_in(&category.combinations, &index);
                let outstanding = unique_per_axis(&missing, grid.axes().len());
                CategoryOutstanding {
                    bounds: category.bounds,
                    expected,
                    missing,
                    outstanding,
                }
            })
            .collect::<Vec<_>>();

        let report = ResumeReport {
            mode,
            artifact_dir: artifact_dir.to_path_buf(),
            axes: grid
                .axes()
                .iter()
                .map(|a| (a.name().to_string(), a.precision()))
                .collect(),
            category_axis: self.policy.axis().to_string(),
            parameter_key: self.policy.parameter_key().to_string(),
            categories,
            artifacts_found: index.len(),
            scanned: index.scanned(),
            ignored: index.ignored(),
        };
        info!(
            mode = %mode,
            expected = report.expected(),
            missing = report.missing(),
            scanned = report.scanned,
            ignored = report.ignored,
            "resume analysis"
        );
        Ok(report)
    }
}

#[cfg(feature = "parallel")]
fn missing_in(combinations: &[Combination], index: &ArtifactIndex) -> Vec<Combination> {
    combinations
        .par_iter()
        .filter(|c| !index.contains(c))
        .cloned()
        .collect()
}

#[cfg(not(feature = "parallel"))]
fn missing_in(combinations: &[Combination], index: &ArtifactIndex) -> Vec<Combination> {
    combinations
        .iter()
        .filter(|c| !index.contains(c))
        .cloned()
        .collect()
}

fn unique_per_axis(combinations: &[Combination], arity: usize) -> Vec<Vec<Decimal>> {
    (0..arity)
        .map(|axis| {
            let mut values: Vec<Decimal> = combinations
                .iter()
                .filter_map(|c| c.get(axis).copied())
                .collect();
            values.sort();
            values.dedup();
            values
        })
        .collect()
}
