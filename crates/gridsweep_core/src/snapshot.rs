//! Per-chunk job configuration.
//!
//! A snapshot is the base parameter file with the swept keys narrowed to one
//! chunk. The axis keys carry the chunk's covering sets, which legacy workers
//! expand into their full product. The explicit combination list names exactly
//! the chunk's tuples, so a worker that reads it does no extra work.

use std::path::Path;

use crate::chunk::Chunk;
use crate::error::RecordError;
use crate::grid::Grid;
use crate::mode::COMBINATIONS_KEY;
use crate::record::ParamRecord;

/// Separator between values of one tuple in the explicit list
pub const TUPLE_VALUE_SEPARATOR: char = ':';
/// Separator between tuples in the explicit list
pub const TUPLE_SEPARATOR: &str = "; ";

/// Job configuration for one chunk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSnapshot {
    record: ParamRecord,
}

impl JobSnapshot {
    /// Narrow `base` to `chunk`.
    ///
    /// Every key of `base` is carried over; the grid's axis keys, the category
    /// parameter key and the explicit combination list are overwritten.
    #[must_use]
    pub fn for_chunk(base: &ParamRecord, grid: &Grid, chunk: &Chunk, parameter_key: &str) -> Self {
        let mut record = base.clone();
        for (axis, values) in grid.axes().iter().zip(chunk.covering_sets()) {
            record.set_values(axis.name(), &values, axis.precision());
        }
        record.set(parameter_key, chunk.parameter.to_string());
        record.set(COMBINATIONS_KEY, render_combinations(chunk));
        Self { record }
    }

    #[must_use]
    pub fn record(&self) -> &ParamRecord {
        &self.record
    }

    pub fn write(&self, path: &Path) -> Result<(), RecordError> {
        self.record.save(path)
    }
}

/// `7.0:-0.4:0.0; 7.0:-0.2:0.0; ...` in chunk order
#[must_use]
pub fn render_combinations(chunk: &Chunk) -> String {
    let sep = TUPLE_VALUE_SEPARATOR.to_string();
    chunk
        .combinations
        .iter()
        .map(|c| c.join_compact(&sep))
        .collect::<Vec<_>>()
        .join(TUPLE_SEPARATOR)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::ChunkId;
    use crate::grid::{Axis, Combination};
    use crate::value::Decimal;

    fn d(s: &str) -> Decimal {
        Decimal::parse(s).unwrap()
    }

    #[test]
    fn test_snapshot_narrows_axes_and_keeps_other_keys() {
        let base = ParamRecord::parse(
            "isodir = /data/iso/\ngenlikeliages = 6.50, 7.00, 7.50\n\
             genlikelizs = -0.40, 0.00\ngenlikeliavtildes = 0.0\ngenlikelimmin = 4.0\n\
             unctype = sigma\n",
        );
        let grid = Grid::new(vec![
            base.axis("genlikeliages", 2).unwrap(),
            base.axis("genlikelizs", 2).unwrap(),
            Axis::parse("genlikeliavtildes", "0.0", 1).unwrap(),
        ])
        .unwrap();
        let chunk = Chunk {
            id: ChunkId {
                category: 1,
                chunk: 0,
            },
            parameter: d("2.0"),
            combinations: vec![
                Combination::new(vec![d("7.00"), d("0.00"), d("0.0")]),
                Combination::new(vec![d("7.50"), d("-0.40"), d("0.0")]),
            ],
        };

        let snapshot = JobSnapshot::for_chunk(&base, &grid, &chunk, "genlikelimmin");
        let record = snapshot.record();
        assert_eq!(record.get("isodir"), Some("/data/iso/"));
        assert_eq!(record.get("unctype"), Some("sigma"));
        assert_eq!(record.get("genlikeliages"), Some("7.00, 7.50"));
        assert_eq!(record.get("genlikelizs"), Some("-0.40, 0.00"));
        assert_eq!(record.get("genlikeliavtildes"), Some("0.0"));
        assert_eq!(record.get("genlikelimmin"), Some("2.0"));
        assert_eq!(
            record.get(COMBINATIONS_KEY),
            Some("7.0:0.0:0.0; 7.5:-0.4:0.0")
        );
    }
}
