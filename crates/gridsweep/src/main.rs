use std::path::PathBuf;

use clap::{Parser, Subcommand};
use gridsweep::commands::{self, RunOutcome};
use gridsweep::confirm::terminal_gate;
use gridsweep::settings::SETTINGS_FILE_NAME;
use gridsweep::template::parse_override;
use gridsweep::{InitOptions, ResumeOptions, RunOptions, SweepSettings, Workspace, init_logging};
use gridsweep_core::{Decimal, RunMode};

#[derive(Parser, Debug)]
#[command(name = "gridsweep", version)]
#[command(about = "Split a parameter grid into balanced worker jobs and track what is left")]
struct Args {
    /// Settings file (default: ./gridsweep.yaml in the working directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true, default_value = "info")]
    log_level: String,

    /// Log directory (default: ~/.gridsweep/)
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    /// Working directory holding the job file, checkpoints and reports
    #[arg(short, long, global = true, default_value = ".")]
    workdir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write a base parameter file from the defaults
    Init {
        /// Drop ages above this value
        #[arg(long)]
        max_age: Option<Decimal>,
        /// Extinction values to sweep (enables the TZA sweep)
        #[arg(long)]
        avtildes: Option<String>,
        /// Rotation values to sweep (enables the TZR sweep)
        #[arg(long)]
        rotations: Option<String>,
        /// Extra parameter, e.g. --set errdir=/data/errs
        #[arg(long = "set", value_name = "KEY=VALUE")]
        set_values: Vec<String>,
        /// Overwrite an existing job file
        #[arg(long)]
        force: bool,
    },
    /// Show categories and chunks without launching anything
    Plan,
    /// Checkpoint the grid and launch one worker per chunk
    Run {
        /// Write job files and print commands without launching
        #[arg(long)]
        dry_run: bool,
        /// Wait for every worker and report exit codes
        #[arg(long)]
        wait: bool,
        /// Replace the existing checkpoint for this mode
        #[arg(long)]
        fresh_checkpoint: bool,
    },
    /// Compare the checkpoint with completion artifacts and report what is left
    Resume {
        /// Run mode (TZ, TZA, TZR, TZAR)
        #[arg(long)]
        mode: Option<RunMode>,
        /// Directory holding completion artifacts
        #[arg(long)]
        artifact_dir: Option<PathBuf>,
        /// Report file
        #[arg(long = "out")]
        out_file: Option<PathBuf>,
    },
    /// Close the open sweep session
    Finish,
}

fn default_log_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".gridsweep")
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let args = Args::parse();
    let log_dir = args.log_dir.unwrap_or_else(default_log_dir);
    init_logging(&log_dir, &args.log_level)?;

    let settings_path = args
        .config
        .unwrap_or_else(|| args.workdir.join(SETTINGS_FILE_NAME));
    let settings = SweepSettings::load_or_default(&settings_path)?;
    let ws = Workspace::new(args.workdir, settings);
    let mut out = std::io::stdout();

    match args.command {
        Command::Init {
            max_age,
            avtildes,
            rotations,
            set_values,
            force,
        } => {
            let overrides = set_values
                .iter()
                .map(|s| parse_override(s))
                .collect::<color_eyre::Result<Vec<_>>>()?;
            let opts = InitOptions {
                max_age,
                avtildes,
                rotations,
                overrides,
                force,
            };
            commands::init(&ws, opts, &mut out)?;
        }
        Command::Plan => {
            commands::plan(&ws, &mut out)?;
        }
        Command::Run {
            dry_run,
            wait,
            fresh_checkpoint,
        } => {
            let opts = RunOptions {
                dry_run,
                wait,
                fresh_checkpoint,
            };
            let RunOutcome { outcomes, .. } = commands::run(&ws, opts, terminal_gate(), &mut out)?;
            if outcomes.iter().any(|o| !o.status.success()) {
                std::process::exit(1);
            }
        }
        Command::Resume {
            mode,
            artifact_dir,
            out_file,
        } => {
            let opts = ResumeOptions {
                mode,
                artifact_dir,
                out_file,
            };
            commands::resume(&ws, opts, &mut out)?;
        }
        Command::Finish => {
            commands::finish(&ws, &mut out)?;
        }
    }

    tracing::info!("gridsweep exiting");
    Ok(())
}
