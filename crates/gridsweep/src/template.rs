//! Base parameter file generation for `gridsweep init`.

use color_eyre::eyre::{bail, eyre};
use gridsweep_core::category::{AGE_AXIS, MIN_MASS_KEY};
use gridsweep_core::mode::{
    AGE_PRECISION, AVTILDE_PRECISION, AVTILDES_KEY, PERFECT_SAMPLE_AV_KEY, ROTATION_PRECISION,
    ROTATIONS_KEY, Z_PRECISION, ZS_KEY,
};
use gridsweep_core::{Axis, Decimal, ParamRecord, RunMode};

/// Ages swept by default (log10 years)
pub const DEFAULT_AGES: &str = "6.50, 6.60, 6.70, 6.80, 6.90, 7.00, 7.10, 7.20, 7.30, 7.40, \
    7.50, 7.60, 7.80, 8.00, 8.20, 8.40, 8.60, 8.80, 9.00, 9.20, 9.40, 9.60, 9.80, 10.00";
pub const DEFAULT_ZS: &str = "-0.40, -0.20, 0.00, 0.20";
pub const DEFAULT_AVTILDES: &str = "0.0";

/// Instruments the fitting code knows about
pub const INSTRUMENTS: &[&str] = &["ACS_HRC", "ACS_WFC", "WFC3_UVIS", "WFPC2"];

/// Key order of a generated file. Unset keys are skipped.
const KEY_ORDER: &[&str] = &[
    "isodir",
    "errdir",
    "errfile",
    "datasource",
    "usegaiaplx",
    "instrument",
    "distancemodulus",
    AGE_AXIS,
    ZS_KEY,
    MIN_MASS_KEY,
    AVTILDES_KEY,
    ROTATIONS_KEY,
    "table_bluemax",
    "table_redmax",
    "mags",
    "unctype",
    PERFECT_SAMPLE_AV_KEY,
];

/// Keys owned by the generator; `--set` may not override them
const SWEPT_KEYS: &[&str] = &[AGE_AXIS, ZS_KEY, AVTILDES_KEY, ROTATIONS_KEY, PERFECT_SAMPLE_AV_KEY];

#[derive(Debug, Clone, Default)]
pub struct ParamTemplate {
    /// Drop ages above this value
    pub max_age: Option<Decimal>,
    /// Extinction values; enables the extinction sweep
    pub avtildes: Option<String>,
    /// Rotation values; enables the rotation sweep
    pub rotations: Option<String>,
    /// Additional `key = value` pairs
    pub overrides: Vec<(String, String)>,
}

impl ParamTemplate {
    #[must_use]
    pub fn mode(&self) -> RunMode {
        RunMode {
            extinction: self.avtildes.is_some(),
            rotation: self.rotations.is_some(),
        }
    }

    /// Build the parameter file
    pub fn build(&self) -> color_eyre::Result<ParamRecord> {
        let mut record = ParamRecord::new();
        record.set("isodir", "");
        record.set("datasource", "HST");
        record.set("usegaiaplx", "False");

        let ages = Axis::parse(AGE_AXIS, DEFAULT_AGES, AGE_PRECISION)?;
        let ages = match self.max_age {
            Some(max) => {
                let kept: Vec<Decimal> =
                    ages.values().iter().copied().filter(|age| *age <= max).collect();
                if kept.is_empty() {
                    bail!("no default age is <= {max}");
                }
                Axis::new(AGE_AXIS, kept, AGE_PRECISION)?
            }
            None => ages,
        };
        record.set_axis(&ages);
        record.set_axis(&Axis::parse(ZS_KEY, DEFAULT_ZS, Z_PRECISION)?);
        record.set(MIN_MASS_KEY, "4.0");

        let avtildes = self.avtildes.as_deref().unwrap_or(DEFAULT_AVTILDES);
        record.set_axis(&Axis::parse(AVTILDES_KEY, avtildes, AVTILDE_PRECISION)?);
        if let Some(rotations) = &self.rotations {
            record.set_axis(&Axis::parse(ROTATIONS_KEY, rotations, ROTATION_PRECISION)?);
        }
        record.set("unctype", "sigma");
        record.set(
            PERFECT_SAMPLE_AV_KEY,
            if self.avtildes.is_some() { "True" } else { "False" },
        );

        for (key, value) in &self.overrides {
            if SWEPT_KEYS.contains(&key.as_str()) {
                bail!("{key} is set by --max-age/--avtildes/--rotations, not --set");
            }
            let value = if key == "instrument" {
                let upper = value.to_ascii_uppercase();
                if !INSTRUMENTS.contains(&upper.as_str()) {
                    bail!(
                        "unknown instrument {value:?}; choose from {}",
                        INSTRUMENTS.join(", ")
                    );
                }
                upper
            } else {
                value.clone()
            };
            record.set(key.as_str(), value);
        }

        Ok(ordered(record))
    }
}

/// Parse a `key=value` command-line pair
pub fn parse_override(s: &str) -> color_eyre::Result<(String, String)> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| eyre!("expected key=value, got {s:?}"))?;
    let key = key.trim();
    if key.is_empty() {
        bail!("empty key in {s:?}");
    }
    Ok((key.to_string(), value.trim().to_string()))
}

/// Reorder known keys into the conventional layout; unknown keys follow
fn ordered(record: ParamRecord) -> ParamRecord {
    let mut out = ParamRecord::new();
    for key in KEY_ORDER {
        if let Some(value) = record.get(key) {
            out.set(*key, value);
        }
    }
    for (key, value) in record.iter() {
        if !out.contains(key) {
            out.set(key, value);
        }
    }
    out
}
