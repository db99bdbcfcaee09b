//! `key = value` parameter files.
//!
//! This is the format external workers read: one pair per line, axis values as
//! comma-separated lists at a fixed precision. Key order is preserved so a
//! rewritten file diffs cleanly against the original.

use std::fs;
use std::io::Write;
use std::path::Path;

use crate::error::RecordError;
use crate::grid::Axis;
use crate::value::{self, Decimal};

/// An ordered set of `key = value` pairs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParamRecord {
    entries: Vec<(String, String)>,
}

impl ParamRecord {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse text, skipping blank lines, `#` comments and lines without `=`.
    ///
    /// The first `=` separates key from value. A repeated key keeps its first
    /// position and its last value.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let mut record = Self::new();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if let Some((key, value)) = line.split_once('=') {
                let key = key.trim();
                if !key.is_empty() {
                    record.set(key, value.trim());
                }
            }
        }
        record
    }

    pub fn load(path: &Path) -> Result<Self, RecordError> {
        let text = fs::read_to_string(path).map_err(|e| RecordError::io(path, e))?;
        Ok(Self::parse(&text))
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn require(&self, key: &str) -> Result<&str, RecordError> {
        self.get(key)
            .ok_or_else(|| RecordError::MissingKey(key.to_string()))
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Set `key`, replacing in place if present or appending otherwise
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        let index = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(index).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Python-style boolean (`True`/`true`/`1`/`yes`)
    #[must_use]
    pub fn flag(&self, key: &str) -> bool {
        self.get(key).is_some_and(|v| {
            matches!(v.to_ascii_lowercase().as_str(), "true" | "1" | "yes" | "y")
        })
    }

    /// Read `key` as an axis of the same name
    pub fn axis(&self, key: &str, precision: u8) -> Result<Axis, RecordError> {
        let list = self.require(key)?;
        Axis::parse(key, list, precision).map_err(|source| RecordError::InvalidAxis {
            key: key.to_string(),
            source,
        })
    }

    /// Read `key` as a single decimal
    pub fn decimal(&self, key: &str) -> Result<Decimal, RecordError> {
        Decimal::parse(self.require(key)?).map_err(|source| RecordError::InvalidValue {
            key: key.to_string(),
            source,
        })
    }

    /// Write an axis under its own name
    pub fn set_axis(&mut self, axis: &Axis) {
        self.set(axis.name(), axis.render());
    }

    /// Write a value list under `key` at `precision`
    pub fn set_values(&mut self, key: &str, values: &[Decimal], precision: u8) {
        self.set(key, value::render_list(values, precision));
    }

    /// Render as file text, one `key = value` line per entry
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::new();
        for (key, value) in &self.entries {
            out.push_str(key);
            out.push_str(" = ");
            out.push_str(value);
            out.push('\n');
        }
        out
    }

    /// Write atomically: a reader sees either the old file or the new one.
    pub fn save(&self, path: &Path) -> Result<(), RecordError> {
        atomic_write(path, &self.render()).map_err(|e| RecordError::io(path, e))
    }
}

/// Write `content` to a temporary sibling, flush it, then rename over `path`.
///
/// Missing parent directories are created.
pub fn atomic_write(path: &Path, content: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let name = path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("params");
    let temp_path = path.with_file_name(format!(".{name}.tmp.{}", std::process::id()));

    let mut file = fs::File::create(&temp_path)?;
    file.write_all(content.as_bytes())?;
    file.sync_all()?;
    drop(file);

    fs::rename(&temp_path, path)
}
