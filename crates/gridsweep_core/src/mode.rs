//! Run modes and the parameter keys each one sweeps.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::category::AGE_AXIS;
use crate::error::RecordError;
use crate::grid::Grid;
use crate::record::ParamRecord;

pub const ZS_KEY: &str = "genlikelizs";
pub const AVTILDES_KEY: &str = "genlikeliavtildes";
pub const ROTATIONS_KEY: &str = "genlikelirotations";
/// Explicit tuple list for workers that process exactly their chunk
pub const COMBINATIONS_KEY: &str = "genlikelicombinations";
/// Enables the extinction sweep
pub const PERFECT_SAMPLE_AV_KEY: &str = "perfectsampleav";
/// Mode tag stamped into checkpoints
pub const MODE_KEY: &str = "sweepmode";

pub const AGE_PRECISION: u8 = 2;
pub const Z_PRECISION: u8 = 2;
pub const AVTILDE_PRECISION: u8 = 1;
pub const ROTATION_PRECISION: u8 = 2;

/// Which optional sweeps are active
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RunMode {
    pub extinction: bool,
    pub rotation: bool,
}

impl RunMode {
    pub const TZ: RunMode = RunMode {
        extinction: false,
        rotation: false,
    };
    pub const TZA: RunMode = RunMode {
        extinction: true,
        rotation: false,
    };
    pub const TZR: RunMode = RunMode {
        extinction: false,
        rotation: true,
    };
    pub const TZAR: RunMode = RunMode {
        extinction: true,
        rotation: true,
    };

    #[must_use]
    pub fn tag(&self) -> &'static str {
        match (self.extinction, self.rotation) {
            (false, false) => "TZ",
            (true, false) => "TZA",
            (false, true) => "TZR",
            (true, true) => "TZAR",
        }
    }

    /// Derive the mode from a base parameter file.
    ///
    /// `perfectsampleav = True` enables extinction; a rotations key enables
    /// rotation.
    #[must_use]
    pub fn detect(record: &ParamRecord) -> Self {
        Self {
            extinction: record.flag(PERFECT_SAMPLE_AV_KEY),
            rotation: record.contains(ROTATIONS_KEY),
        }
    }

    /// Checkpoint file name for a job file, e.g. `Params.dat.Initial_TZA_tables`
    #[must_use]
    pub fn checkpoint_file_name(&self, job_file_name: &str) -> String {
        format!("{job_file_name}.Initial_{}_tables", self.tag())
    }

    /// Resume report file name
    #[must_use]
    pub fn report_file_name(&self) -> &'static str {
        match (self.extinction, self.rotation) {
            (false, false) => "remaining_tz_combinations.txt",
            (true, false) => "remaining_av_combinations.txt",
            (false, true) => "remaining_rot_combinations.txt",
            (true, true) => "remaining_avrot_combinations.txt",
        }
    }

    /// Axis keys swept in this mode with their precisions, in grid order
    #[must_use]
    pub fn axis_keys(&self) -> Vec<(&'static str, u8)> {
        let mut keys = vec![
            (AGE_AXIS, AGE_PRECISION),
            (ZS_KEY, Z_PRECISION),
            (AVTILDES_KEY, AVTILDE_PRECISION),
        ];
        if self.rotation {
            keys.push((ROTATIONS_KEY, ROTATION_PRECISION));
        }
        keys
    }

    /// Build this mode's grid from a parameter file
    pub fn grid_from(&self, record: &ParamRecord) -> Result<Grid, RecordError> {
        let axes = self
            .axis_keys()
            .into_iter()
            .map(|(key, precision)| record.axis(key, precision))
            .collect::<Result<Vec<_>, _>>()?;
        Grid::new(axes).map_err(|source| RecordError::InvalidAxis {
            key: AGE_AXIS.to_string(),
            source,
        })
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Unknown mode tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownMode(pub String);

impl fmt::Display for UnknownMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown run mode {:?} (expected TZ, TZA, TZR or TZAR)", self.0)
    }
}

impl std::error::Error for UnknownMode {}

impl FromStr for RunMode {
    type Err = UnknownMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "TZ" => Ok(Self::TZ),
            "TZA" => Ok(Self::TZA),
            "TZR" => Ok(Self::TZR),
            "TZAR" => Ok(Self::TZAR),
            _ => Err(UnknownMode(s.to_string())),
        }
    }
}

impl TryFrom<String> for RunMode {
    type Error = UnknownMode;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<RunMode> for String {
    fn from(mode: RunMode) -> Self {
        mode.tag().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GridError;

    #[test]
    fn test_tags_round_trip() {
        for mode in [RunMode::TZ, RunMode::TZA, RunMode::TZR, RunMode::TZAR] {
            assert_eq!(mode.tag().parse::<RunMode>().unwrap(), mode);
        }
        assert_eq!("tza".parse::<RunMode>().unwrap(), RunMode::TZA);
        assert!("XYZ".parse::<RunMode>().is_err());
    }

    #[test]
    fn test_file_names_are_distinct_per_mode() {
        assert_eq!(
            RunMode::TZ.checkpoint_file_name("Params.dat"),
            "Params.dat.Initial_TZ_tables"
        );
        assert_eq!(
            RunMode::TZA.checkpoint_file_name("Params.dat"),
            "Params.dat.Initial_TZA_tables"
        );
        assert_eq!(RunMode::TZ.report_file_name(), "remaining_tz_combinations.txt");
        assert_eq!(RunMode::TZA.report_file_name(), "remaining_av_combinations.txt");
    }

    #[test]
    fn test_detect_from_record() {
        let record = ParamRecord::parse("perfectsampleav = False\n");
        assert_eq!(RunMode::detect(&record), RunMode::TZ);

        let record = ParamRecord::parse("perfectsampleav = True\ngenlikelirotations = 0.0, 0.4\n");
        assert_eq!(RunMode::detect(&record), RunMode::TZAR);
    }

    #[test]
    fn test_grid_from_record() {
        let record = ParamRecord::parse(
            "genlikeliages = 7.00, 8.00\ngenlikelizs = 0.00\ngenlikeliavtildes = 0.0\n\
             genlikelirotations = 0.0, 0.2\n",
        );
        let grid = RunMode::TZ.grid_from(&record).unwrap();
        assert_eq!(grid.axes().len(), 3);
        assert_eq!(grid.len(), 2);

        let grid = RunMode::TZR.grid_from(&record).unwrap();
        assert_eq!(grid.axes().len(), 4);
        assert_eq!(grid.len(), 4);
    }

    #[test]
    fn test_grid_from_rejects_values_finer_than_the_axis() {
        let record = ParamRecord::parse(
            "genlikeliages = 7.00, 8.00\ngenlikelizs = 0.00\ngenlikeliavtildes = 0.25, 0.5\n",
        );
        let err = RunMode::TZA.grid_from(&record).unwrap_err();
        assert!(matches!(
            err,
            RecordError::InvalidAxis {
                source: GridError::PrecisionLoss { .. },
                ..
            }
        ));
        assert!(err.to_string().contains("0.25"));
    }
}
