//! Sweep settings loaded from `gridsweep.yaml`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use color_eyre::eyre::{WrapErr, eyre};
use gridsweep_core::category::{AGE_AXIS, MIN_MASS_KEY};
use gridsweep_core::{
    ArtifactNaming, CategoryPolicy, CategoryRule, Decimal, Handoff, WorkerBudget, atomic_write,
};
use serde::{Deserialize, Serialize};

/// Default settings file name, looked up in the working directory
pub const SETTINGS_FILE_NAME: &str = "gridsweep.yaml";

/// How job files reach workers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandoffKind {
    /// One job file per chunk under `jobs_dir`
    #[default]
    PerChunk,
    /// Rewrite `job_file` itself before every launch
    Shared,
}

/// One category rule. Values are decimal strings so they keep their precision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSettings {
    /// Inclusive upper bound; omitted for the final open-ended rule
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub up_to: Option<String>,
    pub parameter: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactSettings {
    pub prefix: String,
    pub extension: String,
}

impl Default for ArtifactSettings {
    fn default() -> Self {
        let naming = ArtifactNaming::default();
        Self {
            prefix: naming.prefix().to_string(),
            extension: naming.extension().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepSettings {
    /// Shell command run once per chunk
    pub worker_command: String,
    /// Base parameter file
    pub job_file: PathBuf,
    /// Where workers write completion artifacts
    pub artifact_dir: PathBuf,
    pub target_workers: usize,
    /// Launches between operator confirmations
    pub max_workers: usize,
    /// Delay after each launch with the shared handoff
    pub settle_secs: u64,
    pub handoff: HandoffKind,
    /// Per-chunk job files go here
    pub jobs_dir: PathBuf,
    pub category_axis: String,
    pub category_parameter_key: String,
    pub rules: Vec<RuleSettings>,
    pub artifact: ArtifactSettings,
}

impl Default for SweepSettings {
    fn default() -> Self {
        let budget = WorkerBudget::default();
        let policy = CategoryPolicy::stellar_mass();
        Self {
            worker_command: String::new(),
            job_file: PathBuf::from("Params.dat"),
            artifact_dir: PathBuf::from("."),
            target_workers: budget.target,
            max_workers: budget.hard_cap,
            settle_secs: 6,
            handoff: HandoffKind::default(),
            jobs_dir: PathBuf::from("jobs"),
            category_axis: AGE_AXIS.to_string(),
            category_parameter_key: MIN_MASS_KEY.to_string(),
            rules: policy
                .rules()
                .iter()
                .map(|rule| RuleSettings {
                    up_to: rule.upper_bound.map(|b| b.to_string()),
                    parameter: rule.parameter.to_string(),
                })
                .collect(),
            artifact: ArtifactSettings::default(),
        }
    }
}

impl SweepSettings {
    /// Load settings from `path`, or defaults if the file does not exist.
    ///
    /// A file that exists but does not parse is an error.
    pub fn load_or_default(path: &Path) -> color_eyre::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("failed to read settings {}", path.display()))?;
        serde_saphyr::from_str(&content)
            .map_err(|e| eyre!("invalid settings in {}: {e}", path.display()))
    }

    pub fn save(&self, path: &Path) -> color_eyre::Result<()> {
        let yaml =
            serde_saphyr::to_string(self).map_err(|e| eyre!("failed to serialize settings: {e}"))?;
        atomic_write(path, &yaml)
            .wrap_err_with(|| format!("failed to write settings {}", path.display()))
    }

    #[must_use]
    pub fn budget(&self) -> WorkerBudget {
        WorkerBudget {
            target: self.target_workers,
            hard_cap: self.max_workers,
        }
    }

    #[must_use]
    pub fn naming(&self) -> ArtifactNaming {
        ArtifactNaming::new(&self.artifact.prefix, &self.artifact.extension)
    }

    /// Category policy built from `rules`
    pub fn policy(&self) -> color_eyre::Result<CategoryPolicy> {
        let parse = |field: &str, s: &str| {
            Decimal::parse(s).map_err(|e| eyre!("invalid {field} {s:?} in category rules: {e}"))
        };
        let rules = self
            .rules
            .iter()
            .map(|rule| {
                let parameter = parse("parameter", &rule.parameter)?;
                Ok(match &rule.up_to {
                    Some(bound) => CategoryRule::up_to(parse("up_to", bound)?, parameter),
                    None => CategoryRule::open(parameter),
                })
            })
            .collect::<color_eyre::Result<Vec<_>>>()?;
        Ok(CategoryPolicy::new(
            &self.category_axis,
            &self.category_parameter_key,
            rules,
        )?)
    }

    /// Job file handoff, with relative paths resolved against `workdir`
    #[must_use]
    pub fn handoff(&self, workdir: &Path) -> Handoff {
        let job_file = workdir.join(&self.job_file);
        match self.handoff {
            HandoffKind::PerChunk => Handoff::PerChunk {
                dir: workdir.join(&self.jobs_dir),
                stem: job_file
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "Params".to_string()),
            },
            HandoffKind::Shared => Handoff::Shared {
                path: job_file,
                settle: Duration::from_secs(self.settle_secs),
            },
        }
    }
}
