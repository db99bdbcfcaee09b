//! Completion artifact names.
//!
//! A worker marks a combination done by writing
//! `<prefix>_<v1>_<v2>_..._<vn>.<extension>` into the output directory. The
//! directory is only ever listed, never written or opened.

use std::fs;
use std::io;
use std::path::Path;

use rustc_hash::FxHashSet;
use tracing::debug;

use crate::grid::Combination;
use crate::value::Decimal;

/// File naming convention for completion artifacts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactNaming {
    prefix: String,
    extension: String,
}

impl Default for ArtifactNaming {
    fn default() -> Self {
        Self::new("LookUpTable", "npz")
    }
}

impl ArtifactNaming {
    #[must_use]
    pub fn new(prefix: impl Into<String>, extension: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            extension: extension.into().trim_start_matches('.').to_string(),
        }
    }

    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    #[must_use]
    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Expected artifact file name for a combination
    #[must_use]
    pub fn file_name(&self, combination: &Combination) -> String {
        format!(
            "{}_{}.{}",
            self.prefix,
            combination.join_compact("_"),
            self.extension
        )
    }

    /// Values encoded in `name`, or `None` if it does not follow the pattern
    /// or does not carry exactly `arity` values.
    #[must_use]
    pub fn parse(&self, name: &str, arity: usize) -> Option<Vec<Decimal>> {
        let stem = name.strip_suffix(&self.extension)?.strip_suffix('.')?;
        let body = stem.strip_prefix(&self.prefix)?.strip_prefix('_')?;

        let values = body
            .split('_')
            .map(|part| Decimal::parse(part).ok())
            .collect::<Option<Vec<_>>>()?;
        (values.len() == arity).then_some(values)
    }

    /// List `dir` and collect the value tuples of every well-formed artifact.
    ///
    /// Names that do not parse are counted and otherwise ignored.
    pub fn scan(&self, dir: &Path, arity: usize) -> io::Result<ArtifactIndex> {
        let mut index = ArtifactIndex::default();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            if entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
                continue;
            }
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                continue;
            };
            index.scanned += 1;
            match self.parse(name, arity) {
                Some(values) => {
                    index.done.insert(values);
                }
                None => {
                    debug!(file = name, "ignoring file that is not a completion artifact");
                    index.ignored += 1;
                }
            }
        }
        Ok(index)
    }
}

/// Value tuples found in an artifact directory
#[derive(Debug, Clone, Default)]
pub struct ArtifactIndex {
    done: FxHashSet<Vec<Decimal>>,
    scanned: usize,
    ignored: usize,
}

impl ArtifactIndex {
    /// Whether an artifact for `combination` was found.
    ///
    /// Values compare numerically, so `7.00` matches `7.0`.
    #[must_use]
    pub fn contains(&self, combination: &Combination) -> bool {
        self.done.contains(combination.values())
    }

    /// Number of distinct combinations with an artifact
    #[must_use]
    pub fn len(&self) -> usize {
        self.done.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.done.is_empty()
    }

    /// Files listed
    #[must_use]
    pub fn scanned(&self) -> usize {
        self.scanned
    }

    /// Files whose names did not parse
    #[must_use]
    pub fn ignored(&self) -> usize {
        self.ignored
    }
}
