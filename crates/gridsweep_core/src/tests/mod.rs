//! Scenario tests for the sweep scheduler
//!
//! Tests are organized by topic:
//! - `sweep` - Grid → partition → chunk plan over the default stellar grid
//! - `recovery` - Checkpoint, dispatch and resume working together

mod recovery;

use crate::grid::Grid;
use crate::mode::RunMode;
use crate::record::ParamRecord;

pub(crate) const DEFAULT_AGES: &str = "6.50, 6.60, 6.70, 6.80, 6.90, 7.00, 7.10, 7.20, 7.30, \
    7.40, 7.50, 7.60, 7.80, 8.00, 8.20, 8.40, 8.60, 8.80, 9.00, 9.20, 9.40, 9.60, 9.80, 10.00";

/// Base parameter file with the default 24 × 4 × 1 grid
pub(crate) fn default_params() -> ParamRecord {
    ParamRecord::parse(&format!(
        "isodir = /data/isochrones/\n\
         genlikeliages = {DEFAULT_AGES}\n\
         genlikelizs = -0.40, -0.20, 0.00, 0.20\n\
         genlikeliavtildes = 0.0\n\
         genlikelimmin = 4.0\n\
         unctype = sigma\n\
         perfectsampleav = False\n"
    ))
}

pub(crate) fn default_grid() -> Grid {
    RunMode::TZ.grid_from(&default_params()).unwrap()
}
