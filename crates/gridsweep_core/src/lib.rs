//! Parameter sweep scheduling library
//!
//! This crate splits a multi-dimensional parameter grid into balanced units of
//! work and hands each one to an external worker process. It supports:
//! - Exact decimal axes that format and parse without drift
//! - Category partitioning on one axis, each category with its own worker parameter
//! - Proportional worker allocation and balanced chunking
//! - Throttled dispatch with per-chunk job files and exit tracking
//! - Write-once checkpoints of the initial grid
//! - Resume analysis by diffing expected completion artifacts against a directory
//!
//! # Example
//!
//! ```ignore
//! use gridsweep_core::{ChunkBalancer, CategoryPolicy, ParamRecord, RunMode, SweepPlan};
//!
//! let base = ParamRecord::load("Params.dat".as_ref())?;
//! let mode = RunMode::detect(&base);
//! let grid = mode.grid_from(&base)?;
//! let plan = SweepPlan::build(&grid, &CategoryPolicy::stellar_mass(), &ChunkBalancer::default())?;
//! print!("{}", plan.describe("genlikeliages", "genlikelimmin"));
//! ```

#![warn(clippy::all)]

// ============================================================================
// Core modules
// ============================================================================

pub mod category;
pub mod chunk;
pub mod error;
pub mod grid;
pub mod plan;
pub mod value;

// ============================================================================
// File formats
// ============================================================================

pub mod artifact;
pub mod checkpoint;
pub mod mode;
pub mod record;
pub mod snapshot;

// ============================================================================
// Execution
// ============================================================================

pub mod dispatch;
pub mod resume;
pub mod supervise;

// ============================================================================
// Test modules
// ============================================================================

#[cfg(test)]
mod tests;

// ============================================================================
// Public re-exports for convenience
// ============================================================================

pub use artifact::{ArtifactIndex, ArtifactNaming};
pub use category::{Category, CategoryBounds, CategoryPolicy, CategoryRule};
pub use checkpoint::{Checkpoint, CheckpointStore};
pub use chunk::{Allocation, BudgetWarning, Chunk, ChunkBalancer, ChunkId, WorkerBudget};
pub use dispatch::{
    AlwaysContinue, ConfirmGate, DispatchConfig, DispatchFailure, DispatchStop, DispatchSummary,
    DryRunLauncher, Handoff, JobDispatcher, JobLaunch, LaunchRecord, Launcher, ShellLauncher,
};
pub use error::{
    CheckpointError, DispatchError, GridError, PartitionError, RecordError, Result, SweepError,
    ValueError,
};
pub use grid::{Axis, Combination, Combinations, Grid};
pub use mode::RunMode;
pub use plan::{CategoryPlan, SweepPlan};
pub use record::{ParamRecord, atomic_write};
pub use resume::{CategoryOutstanding, ResumeAnalyzer, ResumeReport};
pub use snapshot::JobSnapshot;
pub use supervise::{Supervisor, WorkerOutcome, WorkerStatus};
pub use value::Decimal;
