//! File logging for the `gridsweep` binary.
//!
//! Operator progress goes to stdout; everything traced by either crate lands
//! in `gridsweep.log` under the log directory.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

pub const LOG_FILE_NAME: &str = "gridsweep.log";

const ROTATED_MARKER: &[u8] = b"--- earlier gridsweep log entries trimmed ---\n";

/// Size limits applied to the log before each session
#[derive(Debug, Clone, Copy)]
struct Retention {
    /// Trim once the file is larger than this
    max_bytes: u64,
    /// Bytes of recent history kept after trimming
    keep_bytes: u64,
}

impl Retention {
    const DEFAULT: Retention = Retention {
        max_bytes: 5 * 1024 * 1024,
        keep_bytes: 1024 * 1024,
    };

    /// Cut `path` down to its last `keep_bytes`, starting at a line boundary.
    /// Returns whether anything was trimmed.
    fn apply(&self, path: &Path) -> io::Result<bool> {
        let len = match fs::metadata(path) {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e),
        };
        if len <= self.max_bytes {
            return Ok(false);
        }

        let mut tail = Vec::new();
        {
            let mut file = File::open(path)?;
            file.seek(SeekFrom::Start(len.saturating_sub(self.keep_bytes)))?;
            file.read_to_end(&mut tail)?;
        }
        let start = tail
            .iter()
            .position(|&b| b == b'\n')
            .map_or(0, |newline| newline + 1);

        let mut file = File::create(path)?;
        file.write_all(ROTATED_MARKER)?;
        file.write_all(&tail[start..])?;
        Ok(true)
    }
}

/// Log file shared by every event the subscriber formats
#[derive(Clone)]
struct SharedLog(Arc<Mutex<File>>);

impl Write for SharedLog {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).flush()
    }
}

impl<'a> MakeWriter<'a> for SharedLog {
    type Writer = SharedLog;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

fn default_filter(level: &str) -> String {
    format!("gridsweep={level},gridsweep_core={level}")
}

/// Send `tracing` output to `<log_dir>/gridsweep.log` and return its path.
///
/// `RUST_LOG` overrides `level` when set. The file is trimmed to its most
/// recent 1 MB once it passes 5 MB.
pub fn init_logging(log_dir: &Path, level: &str) -> color_eyre::Result<PathBuf> {
    fs::create_dir_all(log_dir)?;
    let log_path = log_dir.join(LOG_FILE_NAME);

    let trimmed = Retention::DEFAULT.apply(&log_path).unwrap_or_else(|e| {
        eprintln!("could not trim {}: {e}", log_path.display());
        false
    });

    let file = OpenOptions::new().create(true).append(true).open(&log_path)?;
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter(level)));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(SharedLog(Arc::new(Mutex::new(file))))
                .with_ansi(false)
                .with_thread_ids(true),
        )
        .init();

    tracing::info!(path = %log_path.display(), trimmed, "logging started");
    Ok(log_path)
}
