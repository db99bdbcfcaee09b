//! Command handlers behind the `gridsweep` binary.
//!
//! Handlers print operator-facing progress to `out` and log details through
//! `tracing`. Every fatal check runs before the first worker is launched.

use std::io::Write;
use std::path::{Path, PathBuf};

use color_eyre::eyre::{WrapErr, bail};
use gridsweep_core::{
    AlwaysContinue, ChunkBalancer, CheckpointStore, ConfirmGate, Decimal, DispatchConfig,
    DispatchStop, DispatchSummary, DryRunLauncher, Grid, Handoff, JobDispatcher, Launcher,
    ParamRecord, ResumeAnalyzer, ResumeReport, RunMode, ShellLauncher, Supervisor, SweepPlan,
    WorkerOutcome, atomic_write,
};
use tracing::{info, warn};

use crate::session::Session;
use crate::settings::{SETTINGS_FILE_NAME, SweepSettings};
use crate::template::ParamTemplate;

/// Working directory and the settings that apply to it
#[derive(Debug, Clone)]
pub struct Workspace {
    pub workdir: PathBuf,
    pub settings: SweepSettings,
}

impl Workspace {
    #[must_use]
    pub fn new(workdir: impl Into<PathBuf>, settings: SweepSettings) -> Self {
        Self {
            workdir: workdir.into(),
            settings,
        }
    }

    /// Resolve `path` against the working directory
    #[must_use]
    pub fn resolve(&self, path: &Path) -> PathBuf {
        self.workdir.join(path)
    }

    #[must_use]
    pub fn job_file(&self) -> PathBuf {
        self.resolve(&self.settings.job_file)
    }

    #[must_use]
    pub fn artifact_dir(&self) -> PathBuf {
        self.resolve(&self.settings.artifact_dir)
    }

    /// Base parameters, their run mode and grid
    fn load_base(&self) -> color_eyre::Result<(ParamRecord, RunMode, Grid)> {
        let job_file = self.job_file();
        let base = ParamRecord::load(&job_file)
            .wrap_err("cannot read the job file; create one with `gridsweep init`")?;
        let mode = RunMode::detect(&base);
        let grid = mode
            .grid_from(&base)
            .wrap_err_with(|| format!("invalid grid in {}", job_file.display()))?;
        Ok((base, mode, grid))
    }

    fn plan(&self, grid: &Grid) -> color_eyre::Result<SweepPlan> {
        let policy = self.settings.policy()?;
        let balancer = ChunkBalancer::new(self.settings.budget());
        Ok(SweepPlan::build(grid, &policy, &balancer)?)
    }

    fn dispatch_config(&self, handoff: Handoff) -> DispatchConfig {
        DispatchConfig {
            command_template: self.settings.worker_command.clone(),
            handoff,
            workdir: self.workdir.clone(),
            hard_cap: self.settings.max_workers,
            parameter_key: self.settings.category_parameter_key.clone(),
        }
    }
}

// ============================================================================
// init
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct InitOptions {
    pub max_age: Option<Decimal>,
    pub avtildes: Option<String>,
    pub rotations: Option<String>,
    pub overrides: Vec<(String, String)>,
    /// Overwrite an existing job file
    pub force: bool,
}

/// Write a base parameter file from the defaults
pub fn init(ws: &Workspace, opts: InitOptions, out: &mut dyn Write) -> color_eyre::Result<PathBuf> {
    let path = ws.job_file();
    if path.exists() && !opts.force {
        bail!(
            "{} already exists; pass --force to overwrite it",
            path.display()
        );
    }

    let template = ParamTemplate {
        max_age: opts.max_age,
        avtildes: opts.avtildes,
        rotations: opts.rotations,
        overrides: opts.overrides,
    };
    let record = template.build()?;
    let mode = template.mode();
    let combinations = mode.grid_from(&record)?.len();
    record.save(&path)?;

    info!(path = %path.display(), mode = %mode, combinations, "job file created");
    writeln!(
        out,
        "{} has been created ({mode} sweep, {combinations} combinations).",
        path.display()
    )?;

    let settings_path = ws.workdir.join(SETTINGS_FILE_NAME);
    if !settings_path.exists() {
        ws.settings.save(&settings_path)?;
        writeln!(
            out,
            "{} has been created; set worker_command before `gridsweep run`.",
            settings_path.display()
        )?;
    }
    Ok(path)
}

// ============================================================================
// plan
// ============================================================================

/// Show how the job file would be split, without writing anything
pub fn plan(ws: &Workspace, out: &mut dyn Write) -> color_eyre::Result<SweepPlan> {
    let (_, mode, grid) = ws.load_base()?;
    show_plan(ws, mode, &grid, out)
}

fn show_plan(
    ws: &Workspace,
    mode: RunMode,
    grid: &Grid,
    out: &mut dyn Write,
) -> color_eyre::Result<SweepPlan> {
    let plan = ws.plan(grid)?;
    writeln!(out, "{mode} sweep of {} combinations", grid.len())?;
    write!(
        out,
        "{}",
        plan.describe(
            &ws.settings.category_axis,
            &ws.settings.category_parameter_key
        )
    )?;
    if let Some(warning) = &plan.warning {
        writeln!(out, "warning: {warning}")?;
    }
    Ok(plan)
}

// ============================================================================
// run
// ============================================================================

#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Log each chunk instead of launching
    pub dry_run: bool,
    /// Block until every launched worker exits
    pub wait: bool,
    /// Replace an existing checkpoint for this mode
    pub fresh_checkpoint: bool,
}

#[derive(Debug)]
pub struct RunOutcome {
    pub summary: DispatchSummary,
    /// Worker exits, when waited for
    pub outcomes: Vec<WorkerOutcome>,
}

/// Checkpoint the grid, then dispatch one worker per chunk through `sh -c`
pub fn run<G: ConfirmGate>(
    ws: &Workspace,
    opts: RunOptions,
    gate: G,
    out: &mut dyn Write,
) -> color_eyre::Result<RunOutcome> {
    run_with(ws, opts, ShellLauncher::new(), gate, out)
}

/// [`run`] with a caller-supplied launcher. Dry runs ignore `launcher`.
pub fn run_with<L: Launcher, G: ConfirmGate>(
    ws: &Workspace,
    opts: RunOptions,
    launcher: L,
    gate: G,
    out: &mut dyn Write,
) -> color_eyre::Result<RunOutcome> {
    let (base, mode, grid) = ws.load_base()?;
    let plan = show_plan(ws, mode, &grid, out)?;

    if opts.dry_run {
        // Dry runs never touch the job file itself
        let handoff = match ws.settings.handoff(&ws.workdir) {
            Handoff::Shared { path, .. } => Handoff::PerChunk {
                dir: ws.resolve(&ws.settings.jobs_dir),
                stem: path
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "Params".to_string()),
            },
            per_chunk => per_chunk,
        };
        let mut dispatcher =
            JobDispatcher::new(ws.dispatch_config(handoff), DryRunLauncher::new(), AlwaysContinue);
        let summary = dispatcher.dispatch(&base, &grid, &plan, &mut Supervisor::new())?;
        for launch in &summary.launches {
            writeln!(
                out,
                "[dry run] chunk {}: {} ({})",
                launch.chunk,
                launch.command,
                launch.job_file.display()
            )?;
        }
        return Ok(RunOutcome {
            summary,
            outcomes: Vec::new(),
        });
    }

    if ws.settings.worker_command.trim().is_empty() {
        bail!("worker_command is not set; add it to {SETTINGS_FILE_NAME}");
    }
    if let Some(open) = Session::load(&ws.workdir)? {
        bail!(
            "a {} sweep started at {} is still open; check it with `gridsweep resume` \
             or close it with `gridsweep finish`",
            open.mode,
            open.started_at
        );
    }

    let job_file = ws.job_file();
    let store = CheckpointStore::beside(&job_file);
    if opts.fresh_checkpoint && store.discard(mode)? {
        info!(mode = %mode, "discarded previous checkpoint");
    }
    let checkpoint = if store.exists(mode) {
        let path = store.path(mode);
        writeln!(out, "Keeping existing checkpoint {}", path.display())?;
        path
    } else {
        let path = store.save(&base, &grid, mode)?;
        writeln!(out, "Initial grid saved to {}", path.display())?;
        path
    };

    let mut session = Session {
        mode,
        job_file,
        checkpoint,
        artifact_dir: ws.artifact_dir(),
        started_at: jiff::Timestamp::now(),
        launched: 0,
        total_chunks: plan.chunk_count(),
    };
    session.save(&ws.workdir)?;

    let handoff = ws.settings.handoff(&ws.workdir);
    let mut supervisor = Supervisor::new();
    let mut dispatcher = JobDispatcher::new(ws.dispatch_config(handoff), launcher, gate);
    let summary = match dispatcher.dispatch(&base, &grid, &plan, &mut supervisor) {
        Ok(summary) => summary,
        Err(failure) => {
            session.launched = failure.summary.launched();
            session.save(&ws.workdir)?;
            for launch in &failure.summary.launches {
                writeln!(out, "  chunk {} is running: {}", launch.chunk, launch.command)?;
            }
            writeln!(
                out,
                "Dispatch failed after {} of {} worker(s) were launched. \
                 Run `gridsweep resume` once they finish.",
                failure.summary.launched(),
                failure.summary.total_chunks
            )?;
            return Err(failure.into());
        }
    };

    session.launched = summary.launched();
    session.save(&ws.workdir)?;

    writeln!(
        out,
        "Launched {} of {} worker(s).",
        summary.launched(),
        summary.total_chunks
    )?;
    if let DispatchStop::Declined { remaining, .. } = summary.stop {
        writeln!(
            out,
            "Stopped at the worker cap; {remaining} chunk(s) were not launched. \
             Run `gridsweep resume` once the running workers finish."
        )?;
    }

    if !opts.wait {
        return Ok(RunOutcome {
            summary,
            outcomes: Vec::new(),
        });
    }

    writeln!(out, "Waiting for {} worker(s)...", supervisor.pending())?;
    let outcomes = supervisor.wait_all();
    for outcome in &outcomes {
        writeln!(
            out,
            "  chunk {} (pid {}): {} after {}s",
            outcome.chunk,
            outcome.pid,
            outcome.status,
            outcome.elapsed.as_secs()
        )?;
    }

    let failed = outcomes.iter().filter(|o| !o.status.success()).count();
    if failed > 0 {
        warn!(failed, "sweep finished with failures");
        writeln!(
            out,
            "{failed} worker(s) failed. Run `gridsweep resume` to see what is outstanding."
        )?;
    } else if !session.is_fully_launched() {
        writeln!(
            out,
            "All {} launched worker(s) succeeded; {} chunk(s) were never launched. \
             Run `gridsweep resume` for the outstanding combinations.",
            summary.launched(),
            session.total_chunks - session.launched
        )?;
    } else {
        Session::discard(&ws.workdir)?;
        writeln!(out, "All workers succeeded.")?;
    }

    Ok(RunOutcome { summary, outcomes })
}

// ============================================================================
// resume
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct ResumeOptions {
    /// Mode to analyze; taken from the open session or the job file otherwise
    pub mode: Option<RunMode>,
    pub artifact_dir: Option<PathBuf>,
    /// Report path; defaults to the mode's report name in the working directory
    pub out_file: Option<PathBuf>,
}

/// Diff the checkpoint against completion artifacts and write a report
pub fn resume(
    ws: &Workspace,
    opts: ResumeOptions,
    out: &mut dyn Write,
) -> color_eyre::Result<ResumeReport> {
    let session = Session::load(&ws.workdir)?;
    let job_file = session
        .as_ref()
        .map(|s| s.job_file.clone())
        .unwrap_or_else(|| ws.job_file());

    let mode = match (opts.mode, &session) {
        (Some(mode), _) => mode,
        (None, Some(session)) => session.mode,
        (None, None) => RunMode::detect(
            &ParamRecord::load(&job_file).wrap_err("cannot determine the run mode; pass --mode")?,
        ),
    };
    let artifact_dir = match (opts.artifact_dir, &session) {
        (Some(dir), _) => ws.resolve(&dir),
        (None, Some(session)) => session.artifact_dir.clone(),
        (None, None) => ws.artifact_dir(),
    };

    let checkpoint = CheckpointStore::beside(&job_file).load(mode)?;
    let analyzer = ResumeAnalyzer::new(ws.settings.policy()?, ws.settings.naming());
    let report = analyzer.analyze(&checkpoint, &artifact_dir)?;

    let path = match opts.out_file {
        Some(path) => {
            let path = ws.resolve(&path);
            atomic_write(&path, &report.render())
                .wrap_err_with(|| format!("failed to write {}", path.display()))?;
            path
        }
        None => report.write(&ws.workdir)?,
    };

    write!(out, "{}", report.render())?;
    writeln!(out)?;
    writeln!(out, "Report written to {}", path.display())?;
    Ok(report)
}

// ============================================================================
// finish
// ============================================================================

/// Close the open session. Checkpoints and artifacts are kept.
pub fn finish(ws: &Workspace, out: &mut dyn Write) -> color_eyre::Result<bool> {
    let closed = Session::discard(&ws.workdir)?;
    if closed {
        writeln!(out, "Sweep session closed.")?;
    } else {
        writeln!(out, "No open sweep session.")?;
    }
    Ok(closed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridsweep_core::{DispatchError, JobLaunch};
    use std::fs;
    use std::process::Child;
    use tempfile::tempdir;

    /// Starts nothing; the `fail_at`-th launch fails when set
    struct ScriptedLauncher {
        calls: usize,
        fail_at: Option<usize>,
    }

    impl ScriptedLauncher {
        fn new(fail_at: Option<usize>) -> Self {
            Self { calls: 0, fail_at }
        }
    }

    impl Launcher for ScriptedLauncher {
        fn launch(&mut self, job: &JobLaunch<'_>) -> Result<Option<Child>, DispatchError> {
            self.calls += 1;
            if Some(self.calls) == self.fail_at {
                return Err(DispatchError::Launch {
                    command: job.command.to_string(),
                    source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
                });
            }
            Ok(None)
        }
    }

    fn workspace(dir: &Path) -> Workspace {
        Workspace::new(dir, SweepSettings::default())
    }

    fn init_default(ws: &Workspace) {
        init(ws, InitOptions::default(), &mut Vec::new()).unwrap();
    }

    #[test]
    fn test_init_refuses_to_overwrite() {
        let dir = tempdir().unwrap();
        let ws = workspace(dir.path());
        let mut out = Vec::new();
        let path = init(&ws, InitOptions::default(), &mut out).unwrap();
        assert!(path.ends_with("Params.dat"));
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("TZ sweep, 96 combinations"));
        assert!(text.contains("set worker_command"));

        // Settings are written next to the job file once and left alone after
        let settings_path = dir.path().join(SETTINGS_FILE_NAME);
        assert_eq!(
            SweepSettings::load_or_default(&settings_path).unwrap(),
            SweepSettings::default()
        );
        fs::write(&settings_path, "target_workers: 8\n").unwrap();

        assert!(init(&ws, InitOptions::default(), &mut Vec::new()).is_err());
        let opts = InitOptions {
            avtildes: Some("0.0, 0.5".to_string()),
            force: true,
            ..Default::default()
        };
        init(&ws, opts, &mut Vec::new()).unwrap();
        let record = ParamRecord::load(&path).unwrap();
        assert_eq!(RunMode::detect(&record), RunMode::TZA);
        let settings = SweepSettings::load_or_default(&settings_path).unwrap();
        assert_eq!(settings.target_workers, 8);
    }

    #[test]
    fn test_plan_prints_categories() {
        let dir = tempdir().unwrap();
        let ws = workspace(dir.path());
        init_default(&ws);

        let mut out = Vec::new();
        let plan = plan(&ws, &mut out).unwrap();
        assert_eq!(plan.chunk_count(), 4);
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("TZ sweep of 96 combinations"));
        assert!(text.contains("total: 96 combinations in 4 chunk(s)"));
    }

    #[test]
    fn test_plan_without_job_file_fails() {
        let dir = tempdir().unwrap();
        assert!(plan(&workspace(dir.path()), &mut Vec::new()).is_err());
    }

    #[test]
    fn test_dry_run_writes_job_files_only() {
        let dir = tempdir().unwrap();
        let mut ws = workspace(dir.path());
        ws.settings.worker_command = "fit {job_file}".to_string();
        init_default(&ws);

        let opts = RunOptions {
            dry_run: true,
            ..Default::default()
        };
        let mut out = Vec::new();
        let outcome = run(&ws, opts, AlwaysContinue, &mut out).unwrap();
        assert_eq!(outcome.summary.launched(), 4);
        assert!(outcome.outcomes.is_empty());
        assert!(dir.path().join("jobs/Params.0_0.dat").is_file());
        assert!(dir.path().join("jobs/Params.2_0.dat").is_file());

        // No checkpoint or session for a dry run
        assert!(!dir.path().join("Params.dat.Initial_TZ_tables").exists());
        assert_eq!(Session::load(dir.path()).unwrap(), None);
        assert!(String::from_utf8(out).unwrap().contains("[dry run] chunk 0_1"));
    }

    #[test]
    fn test_run_requires_worker_command() {
        let dir = tempdir().unwrap();
        let ws = workspace(dir.path());
        init_default(&ws);
        let err = run(&ws, RunOptions::default(), AlwaysContinue, &mut Vec::new()).unwrap_err();
        assert!(err.to_string().contains("worker_command"));
        assert!(!dir.path().join("Params.dat.Initial_TZ_tables").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_run_wait_then_resume_reports_failed_chunks() {
        let dir = tempdir().unwrap();
        let mut ws = workspace(dir.path());
        ws.settings.artifact_dir = PathBuf::from("output");
        fs::create_dir(dir.path().join("output")).unwrap();
        // Chunk 0 of every category succeeds and writes a marker, others fail
        ws.settings.worker_command =
            "test {chunk} -eq 0 && cp {job_file} output/done.{category}.dat".to_string();
        init_default(&ws);

        let opts = RunOptions {
            wait: true,
            ..Default::default()
        };
        let mut out = Vec::new();
        let outcome = run(&ws, opts, AlwaysContinue, &mut out).unwrap();
        assert_eq!(outcome.outcomes.len(), 4);
        let failed: Vec<_> = outcome
            .outcomes
            .iter()
            .filter(|o| !o.status.success())
            .map(|o| o.chunk.to_string())
            .collect();
        assert_eq!(failed, vec!["0_1"]);
        assert!(dir.path().join("output/done.0.dat").is_file());
        assert!(dir.path().join("Params.dat.Initial_TZ_tables").is_file());

        // Failure keeps the session open
        let session = Session::load(dir.path()).unwrap().unwrap();
        assert_eq!(session.launched, 4);
        assert_eq!(session.mode, RunMode::TZ);

        // No artifacts were produced, so everything is outstanding
        let report = resume(&ws, ResumeOptions::default(), &mut Vec::new()).unwrap();
        assert_eq!(report.missing(), 96);
        assert!(dir.path().join("remaining_tz_combinations.txt").is_file());

        // A second run is refused until the session is closed
        assert!(run(&ws, RunOptions::default(), AlwaysContinue, &mut Vec::new()).is_err());
        assert!(finish(&ws, &mut Vec::new()).unwrap());
        assert!(!finish(&ws, &mut Vec::new()).unwrap());
    }

    #[test]
    fn test_launch_failure_records_running_workers() {
        let dir = tempdir().unwrap();
        let mut ws = workspace(dir.path());
        ws.settings.worker_command = "fit {job_file}".to_string();
        init_default(&ws);

        let mut out = Vec::new();
        let err = run_with(
            &ws,
            RunOptions::default(),
            ScriptedLauncher::new(Some(2)),
            AlwaysContinue,
            &mut out,
        )
        .unwrap_err();
        assert!(err.to_string().contains("1 of 4 worker(s) already launched"));

        let session = Session::load(dir.path()).unwrap().unwrap();
        assert_eq!(session.launched, 1);
        assert_eq!(session.total_chunks, 4);
        assert!(!session.is_fully_launched());

        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("chunk 0_0 is running: fit"));
        assert!(text.contains("Dispatch failed after 1 of 4 worker(s) were launched."));
    }

    #[test]
    fn test_declined_sweep_keeps_session_open() {
        let dir = tempdir().unwrap();
        let mut ws = workspace(dir.path());
        ws.settings.worker_command = "fit {job_file}".to_string();
        ws.settings.max_workers = 2;
        init_default(&ws);

        let opts = RunOptions {
            wait: true,
            ..Default::default()
        };
        let mut out = Vec::new();
        let outcome = run_with(
            &ws,
            opts,
            ScriptedLauncher::new(None),
            |_: usize, _: usize| false,
            &mut out,
        )
        .unwrap();
        assert_eq!(outcome.summary.launched(), 2);
        assert!(!outcome.summary.is_complete());

        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("2 chunk(s) were not launched"));
        assert!(text.contains("All 2 launched worker(s) succeeded; 2 chunk(s) were never launched."));
        assert!(!text.contains("worker(s) failed"));

        let session = Session::load(dir.path()).unwrap().unwrap();
        assert_eq!(session.launched, 2);
    }

    #[test]
    fn test_resume_uses_explicit_options() {
        let dir = tempdir().unwrap();
        let ws = workspace(dir.path());
        init_default(&ws);

        let (base, mode, grid) = ws.load_base().unwrap();
        CheckpointStore::beside(&ws.job_file())
            .save(&base, &grid, mode)
            .unwrap();
        fs::create_dir(dir.path().join("tables")).unwrap();
        fs::write(dir.path().join("tables/LookUpTable_10.0_0.2_0.0.npz"), b"").unwrap();

        let opts = ResumeOptions {
            mode: Some(RunMode::TZ),
            artifact_dir: Some(PathBuf::from("tables")),
            out_file: Some(PathBuf::from("reports/left.txt")),
        };
        let report = resume(&ws, opts, &mut Vec::new()).unwrap();
        assert_eq!(report.missing(), 95);
        let text = fs::read_to_string(dir.path().join("reports/left.txt")).unwrap();
        assert_eq!(text, report.render());
    }

    #[test]
    fn test_resume_without_checkpoint_fails() {
        let dir = tempdir().unwrap();
        let ws = workspace(dir.path());
        init_default(&ws);
        let err = resume(&ws, ResumeOptions::default(), &mut Vec::new()).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }
}
