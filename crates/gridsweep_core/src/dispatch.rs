//! Throttled launch of one worker per chunk.
//!
//! Chunks go out in plan order. Before each launch the chunk's snapshot is
//! written where the worker will look for it; after every `hard_cap` launches
//! the [`ConfirmGate`] decides whether to keep going. Already launched workers
//! are never stopped by the dispatcher.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::chunk::{Chunk, ChunkId};
use crate::error::DispatchError;
use crate::grid::Grid;
use crate::plan::SweepPlan;
use crate::record::ParamRecord;
use crate::snapshot::{JobSnapshot, render_combinations};
use crate::supervise::Supervisor;

/// Environment variable carrying the snapshot path to the worker
pub const JOB_FILE_ENV: &str = "GRIDSWEEP_JOB_FILE";

/// How a snapshot reaches its worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Handoff {
    /// One file per chunk, `<dir>/<stem>.<category>_<chunk>.dat`
    PerChunk { dir: PathBuf, stem: String },
    /// A single file rewritten before every launch. The dispatcher sleeps
    /// `settle` after each launch so the worker can read it first.
    Shared { path: PathBuf, settle: Duration },
}

impl Handoff {
    /// Snapshot path for `chunk`
    #[must_use]
    pub fn job_file(&self, chunk: ChunkId) -> PathBuf {
        match self {
            Handoff::PerChunk { dir, stem } => dir.join(format!("{stem}.{chunk}.dat")),
            Handoff::Shared { path, .. } => path.clone(),
        }
    }

    fn settle(&self) -> Duration {
        match self {
            Handoff::PerChunk { .. } => Duration::ZERO,
            Handoff::Shared { settle, .. } => *settle,
        }
    }
}

/// Everything a [`Launcher`] needs to start one worker
#[derive(Debug)]
pub struct JobLaunch<'a> {
    pub chunk: &'a Chunk,
    /// Rendered command line
    pub command: &'a str,
    pub job_file: &'a Path,
    pub workdir: &'a Path,
}

/// Starts worker processes.
///
/// Returns the child when a real process was started, `None` when nothing was
/// spawned.
pub trait Launcher {
    fn launch(&mut self, job: &JobLaunch<'_>) -> Result<Option<Child>, DispatchError>;
}

/// Runs the command through `sh -c` in the working directory
#[derive(Debug, Clone)]
pub struct ShellLauncher {
    shell: String,
}

impl ShellLauncher {
    #[must_use]
    pub fn new() -> Self {
        Self {
            shell: "sh".to_string(),
        }
    }
}

impl Default for ShellLauncher {
    fn default() -> Self {
        Self::new()
    }
}

impl Launcher for ShellLauncher {
    fn launch(&mut self, job: &JobLaunch<'_>) -> Result<Option<Child>, DispatchError> {
        let child = Command::new(&self.shell)
            .arg("-c")
            .arg(job.command)
            .current_dir(job.workdir)
            .env(JOB_FILE_ENV, job.job_file)
            .stdin(Stdio::null())
            .spawn()
            .map_err(|source| DispatchError::Launch {
                command: job.command.to_string(),
                source,
            })?;
        Ok(Some(child))
    }
}

/// Logs what would be launched and spawns nothing
#[derive(Debug, Clone, Default)]
pub struct DryRunLauncher {
    planned: Vec<(ChunkId, String)>,
}

impl DryRunLauncher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Commands that would have run, in order
    #[must_use]
    pub fn planned(&self) -> &[(ChunkId, String)] {
        &self.planned
    }
}

impl Launcher for DryRunLauncher {
    fn launch(&mut self, job: &JobLaunch<'_>) -> Result<Option<Child>, DispatchError> {
        info!(
            chunk = %job.chunk.id,
            command = job.command,
            combinations = %render_combinations(job.chunk),
            "dry run"
        );
        self.planned.push((job.chunk.id, job.command.to_string()));
        Ok(None)
    }
}

/// Operator check-in at the worker cap
pub trait ConfirmGate {
    /// `launched` workers are out, `remaining` chunks wait. Return `false` to
    /// stop dispatching.
    fn confirm(&mut self, launched: usize, remaining: usize) -> bool;
}

/// Never pauses
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysContinue;

impl ConfirmGate for AlwaysContinue {
    fn confirm(&mut self, _launched: usize, _remaining: usize) -> bool {
        true
    }
}

impl<F> ConfirmGate for F
where
    F: FnMut(usize, usize) -> bool,
{
    fn confirm(&mut self, launched: usize, remaining: usize) -> bool {
        self(launched, remaining)
    }
}

/// Dispatcher settings
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Worker command; may use `{job_file}`, `{category}`, `{chunk}` and
    /// `{min_mass}`
    pub command_template: String,
    pub handoff: Handoff,
    pub workdir: PathBuf,
    /// Launches between operator confirmations; 0 disables the gate
    pub hard_cap: usize,
    /// Key receiving the category parameter in each snapshot
    pub parameter_key: String,
}

/// One launched (or dry-run) chunk
#[derive(Debug, Clone)]
pub struct LaunchRecord {
    pub chunk: ChunkId,
    pub job_file: PathBuf,
    pub command: String,
    pub pid: Option<u32>,
}

/// Why dispatch ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchStop {
    /// Every chunk was launched
    Completed,
    /// The operator declined to continue at the cap
    Declined { launched: usize, remaining: usize },
    /// A snapshot write or launch failed
    Failed { launched: usize, remaining: usize },
}

#[derive(Debug, Clone)]
pub struct DispatchSummary {
    pub launches: Vec<LaunchRecord>,
    pub total_chunks: usize,
    pub stop: DispatchStop,
}

impl DispatchSummary {
    #[must_use]
    pub fn launched(&self) -> usize {
        self.launches.len()
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.stop == DispatchStop::Completed
    }
}

/// Dispatch that stopped on an error, with what was launched before it
#[derive(Debug)]
pub struct DispatchFailure {
    pub summary: DispatchSummary,
    pub error: DispatchError,
}

impl fmt::Display for DispatchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({} of {} worker(s) already launched)",
            self.error,
            self.summary.launched(),
            self.summary.total_chunks
        )
    }
}

impl std::error::Error for DispatchFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

pub struct JobDispatcher<L, G> {
    config: DispatchConfig,
    launcher: L,
    gate: G,
}

impl<L: Launcher, G: ConfirmGate> JobDispatcher<L, G> {
    pub fn new(config: DispatchConfig, launcher: L, gate: G) -> Self {
        Self {
            config,
            launcher,
            gate,
        }
    }

    #[must_use]
    pub fn launcher(&self) -> &L {
        &self.launcher
    }

    /// Launch every chunk of `plan`, narrowing `base` for each one.
    ///
    /// Children are handed to `supervisor`. A write or spawn failure aborts the
    /// remaining dispatch; the returned [`DispatchFailure`] still lists the
    /// workers already started, which keep running.
    pub fn dispatch(
        &mut self,
        base: &ParamRecord,
        grid: &Grid,
        plan: &SweepPlan,
        supervisor: &mut Supervisor,
    ) -> Result<DispatchSummary, DispatchFailure> {
        let total_chunks = plan.chunk_count();
        let settle = self.config.handoff.settle();
        let mut launches = Vec::with_capacity(total_chunks);

        for (index, chunk) in plan.chunks().enumerate() {
            let remaining = total_chunks - index;
            if self.config.hard_cap > 0 && index > 0 && index % self.config.hard_cap == 0 {
                if !self.gate.confirm(index, remaining) {
                    warn!(launched = index, remaining, "dispatch stopped at worker cap");
                    return Ok(DispatchSummary {
                        launches,
                        total_chunks,
                        stop: DispatchStop::Declined {
                            launched: index,
                            remaining,
                        },
                    });
                }
            }

            match self.launch_chunk(base, grid, chunk, supervisor) {
                Ok(record) => launches.push(record),
                Err(error) => {
                    warn!(chunk = %chunk.id, launched = index, %error, "dispatch aborted");
                    return Err(DispatchFailure {
                        summary: DispatchSummary {
                            launches,
                            total_chunks,
                            stop: DispatchStop::Failed {
                                launched: index,
                                remaining,
                            },
                        },
                        error,
                    });
                }
            }

            if !settle.is_zero() && remaining > 1 {
                thread::sleep(settle);
            }
        }

        Ok(DispatchSummary {
            launches,
            total_chunks,
            stop: DispatchStop::Completed,
        })
    }

    fn launch_chunk(
        &mut self,
        base: &ParamRecord,
        grid: &Grid,
        chunk: &Chunk,
        supervisor: &mut Supervisor,
    ) -> Result<LaunchRecord, DispatchError> {
        let extra = chunk.over_coverage();
        if extra > 0 {
            warn!(
                chunk = %chunk.id,
                extra,
                "axis sets cover combinations outside the chunk"
            );
        }

        let job_file = self.config.handoff.job_file(chunk.id);
        JobSnapshot::for_chunk(base, grid, chunk, &self.config.parameter_key).write(&job_file)?;

        let command = render_command(&self.config.command_template, &job_file, chunk);
        let started = Instant::now();
        let child = self.launcher.launch(&JobLaunch {
            chunk,
            command: &command,
            job_file: &job_file,
            workdir: &self.config.workdir,
        })?;

        let pid = child.as_ref().map(Child::id);
        if let Some(child) = child {
            supervisor.watch(chunk.id, child, started);
            info!(
                category = chunk.id.category,
                chunk = chunk.id.chunk,
                pid,
                combinations = chunk.len(),
                "launched worker"
            );
        }
        Ok(LaunchRecord {
            chunk: chunk.id,
            job_file,
            command,
            pid,
        })
    }
}

/// Fill the placeholders of a worker command template
#[must_use]
pub fn render_command(template: &str, job_file: &Path, chunk: &Chunk) -> String {
    template
        .replace("{job_file}", &shell_quote(&job_file.to_string_lossy()))
        .replace("{category}", &chunk.id.category.to_string())
        .replace("{chunk}", &chunk.id.chunk.to_string())
        .replace("{min_mass}", &chunk.parameter.to_string())
}

fn shell_quote(s: &str) -> String {
    let safe = !s.is_empty()
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '/' | '.' | '_' | '-' | ':' | '+'));
    if safe {
        s.to_string()
    } else {
        format!("'{}'", s.replace('\'', r"'\''"))
    }
}
