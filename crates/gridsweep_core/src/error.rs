use std::fmt;
use std::io;
use std::path::PathBuf;

use crate::value::Decimal;

/// Errors from parsing a decimal literal
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueError {
    Empty,
    Invalid(String),
    TooPrecise { input: String, max: u8 },
    OutOfRange(String),
}

impl fmt::Display for ValueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueError::Empty => write!(f, "empty value"),
            ValueError::Invalid(s) => write!(f, "invalid decimal value {s:?}"),
            ValueError::TooPrecise { input, max } => {
                write!(f, "value {input:?} has more than {max} fractional digits")
            }
            ValueError::OutOfRange(s) => write!(f, "value {s:?} is out of range"),
        }
    }
}

impl std::error::Error for ValueError {}

/// Errors building axes and grids
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GridError {
    EmptyAxisName,
    EmptyAxis(String),
    DuplicateValue { axis: String, value: Decimal },
    DuplicateAxis(String),
    NoAxes,
    UnknownAxis(String),
    InvalidValue { axis: String, source: ValueError },
    PrecisionLoss { axis: String, value: Decimal, precision: u8 },
}

impl fmt::Display for GridError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GridError::EmptyAxisName => write!(f, "axis name must not be empty"),
            GridError::EmptyAxis(name) => write!(f, "axis {name} has no values"),
            GridError::DuplicateValue { axis, value } => {
                write!(f, "axis {axis} lists {value} more than once")
            }
            GridError::DuplicateAxis(name) => write!(f, "axis {name} declared more than once"),
            GridError::NoAxes => write!(f, "grid has no axes"),
            GridError::UnknownAxis(name) => write!(f, "grid has no axis named {name}"),
            GridError::InvalidValue { axis, source } => write!(f, "axis {axis}: {source}"),
            GridError::PrecisionLoss {
                axis,
                value,
                precision,
            } => write!(
                f,
                "axis {axis}: {value} has more than {precision} decimal place(s)"
            ),
        }
    }
}

impl std::error::Error for GridError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GridError::InvalidValue { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Errors validating category rules or assigning combinations to categories
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartitionError {
    NoRules,
    /// Upper bounds must strictly increase from one rule to the next
    OverlappingRules { previous: Decimal, next: Decimal },
    /// Only the last rule may be open-ended
    UnboundedRuleNotLast(usize),
    /// A value of the category axis falls outside every rule
    Uncovered { axis: String, value: Decimal },
    Grid(GridError),
}

impl fmt::Display for PartitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PartitionError::NoRules => write!(f, "no category rules defined"),
            PartitionError::OverlappingRules { previous, next } => write!(
                f,
                "category upper bound {next} does not exceed the previous bound {previous}"
            ),
            PartitionError::UnboundedRuleNotLast(i) => {
                write!(f, "category rule {i} has no upper bound but is not the last rule")
            }
            PartitionError::Uncovered { axis, value } => {
                write!(f, "{axis} value {value} is not covered by any category")
            }
            PartitionError::Grid(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for PartitionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PartitionError::Grid(e) => Some(e),
            _ => None,
        }
    }
}

impl From<GridError> for PartitionError {
    fn from(e: GridError) -> Self {
        PartitionError::Grid(e)
    }
}

/// Errors reading or writing `key = value` parameter files
#[derive(Debug)]
pub enum RecordError {
    Io { path: PathBuf, source: io::Error },
    MissingKey(String),
    InvalidAxis { key: String, source: GridError },
    InvalidValue { key: String, source: ValueError },
}

impl RecordError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        RecordError::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether this error means the file does not exist
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, RecordError::Io { source, .. } if source.kind() == io::ErrorKind::NotFound)
    }
}

impl fmt::Display for RecordError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordError::Io { path, source } => write!(f, "{}: {source}", path.display()),
            RecordError::MissingKey(key) => write!(f, "missing parameter {key}"),
            RecordError::InvalidAxis { key, source } => write!(f, "parameter {key}: {source}"),
            RecordError::InvalidValue { key, source } => write!(f, "parameter {key}: {source}"),
        }
    }
}

impl std::error::Error for RecordError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RecordError::Io { source, .. } => Some(source),
            RecordError::InvalidAxis { source, .. } => Some(source),
            RecordError::InvalidValue { source, .. } => Some(source),
            RecordError::MissingKey(_) => None,
        }
    }
}

/// Errors saving or loading the write-once checkpoint
#[derive(Debug)]
pub enum CheckpointError {
    /// No checkpoint for this mode; resume needs one
    NotFound { path: PathBuf },
    /// A checkpoint already exists and is never overwritten
    AlreadyExists { path: PathBuf },
    Record(RecordError),
}

impl fmt::Display for CheckpointError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckpointError::NotFound { path } => write!(
                f,
                "checkpoint {} not found; resume needs the checkpoint written when the sweep started",
                path.display()
            ),
            CheckpointError::AlreadyExists { path } => {
                write!(f, "checkpoint {} already exists", path.display())
            }
            CheckpointError::Record(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for CheckpointError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CheckpointError::Record(e) => Some(e),
            _ => None,
        }
    }
}

impl From<RecordError> for CheckpointError {
    fn from(e: RecordError) -> Self {
        CheckpointError::Record(e)
    }
}

/// Errors while writing job snapshots or launching workers
#[derive(Debug)]
pub enum DispatchError {
    Snapshot(RecordError),
    Launch { command: String, source: io::Error },
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchError::Snapshot(e) => write!(f, "failed to write job snapshot: {e}"),
            DispatchError::Launch { command, source } => {
                write!(f, "failed to launch worker `{command}`: {source}")
            }
        }
    }
}

impl std::error::Error for DispatchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DispatchError::Snapshot(e) => Some(e),
            DispatchError::Launch { source, .. } => Some(source),
        }
    }
}

impl From<RecordError> for DispatchError {
    fn from(e: RecordError) -> Self {
        DispatchError::Snapshot(e)
    }
}

/// Top-level error for sweep operations
#[derive(Debug)]
pub enum SweepError {
    Grid(GridError),
    Partition(PartitionError),
    Record(RecordError),
    Checkpoint(CheckpointError),
    Dispatch(DispatchError),
    /// Failed to list the artifact directory
    ArtifactScan { path: PathBuf, source: io::Error },
}

impl fmt::Display for SweepError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SweepError::Grid(e) => write!(f, "{e}"),
            SweepError::Partition(e) => write!(f, "{e}"),
            SweepError::Record(e) => write!(f, "{e}"),
            SweepError::Checkpoint(e) => write!(f, "{e}"),
            SweepError::Dispatch(e) => write!(f, "{e}"),
            SweepError::ArtifactScan { path, source } => {
                write!(f, "cannot list artifact directory {}: {source}", path.display())
            }
        }
    }
}

impl std::error::Error for SweepError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SweepError::Grid(e) => Some(e),
            SweepError::Partition(e) => Some(e),
            SweepError::Record(e) => Some(e),
            SweepError::Checkpoint(e) => Some(e),
            SweepError::Dispatch(e) => Some(e),
            SweepError::ArtifactScan { source, .. } => Some(source),
        }
    }
}

impl From<GridError> for SweepError {
    fn from(e: GridError) -> Self {
        SweepError::Grid(e)
    }
}

impl From<PartitionError> for SweepError {
    fn from(e: PartitionError) -> Self {
        SweepError::Partition(e)
    }
}

impl From<RecordError> for SweepError {
    fn from(e: RecordError) -> Self {
        SweepError::Record(e)
    }
}

impl From<CheckpointError> for SweepError {
    fn from(e: CheckpointError) -> Self {
        SweepError::Checkpoint(e)
    }
}

impl From<DispatchError> for SweepError {
    fn from(e: DispatchError) -> Self {
        SweepError::Dispatch(e)
    }
}

pub type Result<T> = std::result::Result<T, SweepError>;
