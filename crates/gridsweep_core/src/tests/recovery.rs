//! Tests for interrupted sweeps
//!
//! These tests verify:
//! - A checkpoint taken before dispatch survives later edits of the job file
//! - Resume reports only the values whose artifacts are missing
//! - Dispatch followed by partial completion resumes from the right place

use std::fs;
use std::path::Path;

use tempfile::tempdir;

use super::{default_grid, default_params};
use crate::artifact::ArtifactNaming;
use crate::category::CategoryPolicy;
use crate::checkpoint::CheckpointStore;
use crate::chunk::ChunkBalancer;
use crate::dispatch::{AlwaysContinue, DispatchConfig, DryRunLauncher, Handoff, JobDispatcher};
use crate::grid::{Axis, Grid};
use crate::mode::RunMode;
use crate::plan::SweepPlan;
use crate::record::ParamRecord;
use crate::resume::ResumeAnalyzer;
use crate::supervise::Supervisor;
use crate::value::Decimal;

fn analyzer() -> ResumeAnalyzer {
    ResumeAnalyzer::new(CategoryPolicy::stellar_mass(), ArtifactNaming::default())
}

fn touch(dir: &Path, name: &str) {
    fs::write(dir.join(name), b"").unwrap();
}

/// Two ages in different categories, one artifact present
#[test]
fn test_resume_lists_only_the_missing_age() {
    let dir = tempdir().unwrap();
    let store = CheckpointStore::new(dir.path(), "Params.dat");
    let base = ParamRecord::parse("genlikeliages = 7.0, 8.0\ngenlikelizs = 0.0\ngenlikeliavtildes = 0.0\n");
    let grid = RunMode::TZ.grid_from(&base).unwrap();
    store.save(&base, &grid, RunMode::TZ).unwrap();

    let artifacts = dir.path().join("output");
    fs::create_dir(&artifacts).unwrap();
    touch(&artifacts, "LookUpTable_7.0_0.0_0.0.npz");

    let checkpoint = store.load(RunMode::TZ).unwrap();
    let report = analyzer().analyze(&checkpoint, &artifacts).unwrap();

    assert_eq!(report.missing(), 1);
    let first = &report.categories[0];
    let second = &report.categories[1];
    assert!(first.is_complete());
    assert_eq!(second.outstanding[0], vec![Decimal::parse("8.0").unwrap()]);
    assert!(report.categories[2..].iter().all(|c| c.expected == 0));

    let text = report.render();
    assert!(text.contains("genlikelimmin = 2.0 (genlikeliages (7.80, 8.60]): 1 of 1 outstanding"));
    assert!(text.contains("genlikeliages = 8.00\n"));
}

#[test]
fn test_checkpoint_ignores_later_edits_to_job_file() {
    let dir = tempdir().unwrap();
    let job_file = dir.path().join("Params.dat");
    let base = default_params();
    base.save(&job_file).unwrap();

    let store = CheckpointStore::beside(&job_file);
    let grid = default_grid();
    store.save(&base, &grid, RunMode::TZ).unwrap();

    // Operator narrows the job file after the sweep started
    let mut edited = base.clone();
    edited.set("genlikeliages", "9.00");
    edited.save(&job_file).unwrap();

    let restored = store.load(RunMode::TZ).unwrap().grid().unwrap();
    assert_eq!(restored, grid);
    assert_eq!(restored.len(), 96);
}

#[test]
fn test_dispatch_then_resume_after_partial_completion() {
    let dir = tempdir().unwrap();
    let base = default_params();
    let grid = default_grid();
    let store = CheckpointStore::new(dir.path(), "Params.dat");
    store.save(&base, &grid, RunMode::TZ).unwrap();

    let plan = SweepPlan::build(&grid, &CategoryPolicy::stellar_mass(), &ChunkBalancer::default())
        .unwrap();
    let config = DispatchConfig {
        command_template: "worker".to_string(),
        handoff: Handoff::PerChunk {
            dir: dir.path().join("jobs"),
            stem: "Params".to_string(),
        },
        workdir: dir.path().to_path_buf(),
        hard_cap: 10,
        parameter_key: "genlikelimmin".to_string(),
    };
    let mut dispatcher = JobDispatcher::new(config, DryRunLauncher::new(), AlwaysContinue);
    let summary = dispatcher
        .dispatch(&base, &grid, &plan, &mut Supervisor::new())
        .unwrap();
    assert!(summary.is_complete());

    // Only the first chunk's worker finished
    let artifacts = dir.path().join("output");
    fs::create_dir(&artifacts).unwrap();
    let naming = ArtifactNaming::default();
    let first = plan.chunks().next().unwrap();
    for combination in &first.combinations {
        touch(&artifacts, &naming.file_name(combination));
    }

    let checkpoint = store.load(RunMode::TZ).unwrap();
    let report = analyzer().analyze(&checkpoint, &artifacts).unwrap();
    assert_eq!(report.expected(), 96);
    assert_eq!(report.missing(), 96 - first.len());
    assert_eq!(report.artifacts_found, first.len());

    // The rest of the first category is still outstanding
    let outstanding = &report.categories[0];
    assert_eq!(outstanding.missing.len(), 52 - first.len());
    assert!(!outstanding.missing.iter().any(|c| first.combinations.contains(c)));
}

#[test]
fn test_rotation_grid_resumes_with_four_values_per_artifact() {
    let dir = tempdir().unwrap();
    let grid = Grid::new(vec![
        Axis::parse("genlikeliages", "9.00", 2).unwrap(),
        Axis::parse("genlikelizs", "0.00", 2).unwrap(),
        Axis::parse("genlikeliavtildes", "0.0", 1).unwrap(),
        Axis::parse("genlikelirotations", "0.00, 0.40", 2).unwrap(),
    ])
    .unwrap();
    touch(dir.path(), "LookUpTable_9.0_0.0_0.0_0.4.npz");
    // Three-value names do not count for a four-axis grid
    touch(dir.path(), "LookUpTable_9.0_0.0_0.0.npz");

    let report = analyzer()
        .analyze_grid(RunMode::TZR, &grid, dir.path())
        .unwrap();
    assert_eq!(report.missing(), 1);
    assert_eq!(report.ignored, 1);
    assert_eq!(
        report.categories[2].outstanding[3],
        vec![Decimal::parse("0.0").unwrap()]
    );
    assert!(report.render().contains("genlikelirotations = 0.00\n"));
}
