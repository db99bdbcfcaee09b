//! Exit tracking for launched workers.
//!
//! Each child process is moved onto its own watcher thread, which blocks on
//! `wait()` and reports back over a channel. Dropping the supervisor detaches
//! the watchers; it never kills a worker.

use std::fmt;
use std::process::{Child, ExitStatus};
use std::sync::mpsc::{Receiver, Sender, channel};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::chunk::ChunkId;

/// How a worker process ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerStatus {
    /// Exited with a code
    Exited(i32),
    /// Killed by a signal (no exit code)
    Terminated,
    /// `wait()` itself failed
    Lost(String),
}

impl WorkerStatus {
    #[must_use]
    pub fn success(&self) -> bool {
        matches!(self, WorkerStatus::Exited(0))
    }

    fn from_exit(status: ExitStatus) -> Self {
        match status.code() {
            Some(code) => WorkerStatus::Exited(code),
            None => WorkerStatus::Terminated,
        }
    }
}

impl fmt::Display for WorkerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerStatus::Exited(code) => write!(f, "exit {code}"),
            WorkerStatus::Terminated => write!(f, "terminated by signal"),
            WorkerStatus::Lost(e) => write!(f, "lost ({e})"),
        }
    }
}

/// Result of one worker launch
#[derive(Debug, Clone)]
pub struct WorkerOutcome {
    pub chunk: ChunkId,
    pub pid: u32,
    pub status: WorkerStatus,
    /// Time from launch to exit
    pub elapsed: Duration,
}

/// Collects outcomes of launched workers
pub struct Supervisor {
    outcome_tx: Sender<WorkerOutcome>,
    outcome_rx: Receiver<WorkerOutcome>,
    watched: usize,
    received: usize,
}

impl Supervisor {
    #[must_use]
    pub fn new() -> Self {
        let (outcome_tx, outcome_rx) = channel();
        Self {
            outcome_tx,
            outcome_rx,
            watched: 0,
            received: 0,
        }
    }

    /// Hand `child` to a watcher thread. `started` is the launch instant.
    pub fn watch(&mut self, chunk: ChunkId, mut child: Child, started: Instant) {
        let tx = self.outcome_tx.clone();
        let pid = child.id();
        self.watched += 1;

        thread::spawn(move || {
            let status = match child.wait() {
                Ok(status) => WorkerStatus::from_exit(status),
                Err(e) => WorkerStatus::Lost(e.to_string()),
            };
            let outcome = WorkerOutcome {
                chunk,
                pid,
                status,
                elapsed: started.elapsed(),
            };
            if outcome.status.success() {
                info!(chunk = %chunk, pid, elapsed_secs = outcome.elapsed.as_secs(), "worker finished");
            } else {
                warn!(chunk = %chunk, pid, status = %outcome.status, "worker failed");
            }
            // Receiver may be gone if the supervisor was dropped
            let _ = tx.send(outcome);
        });
    }

    /// Workers being watched
    #[must_use]
    pub fn watched(&self) -> usize {
        self.watched
    }

    /// Workers whose outcome has not been received yet
    #[must_use]
    pub fn pending(&self) -> usize {
        self.watched - self.received
    }

    /// Outcomes available now, without blocking
    pub fn try_outcomes(&mut self) -> Vec<WorkerOutcome> {
        let outcomes: Vec<_> = self.outcome_rx.try_iter().collect();
        self.received += outcomes.len();
        outcomes
    }

    /// Block until every watched worker has exited
    pub fn wait_all(&mut self) -> Vec<WorkerOutcome> {
        let mut outcomes = Vec::with_capacity(self.pending());
        while self.pending() > 0 {
            match self.outcome_rx.recv() {
                Ok(outcome) => {
                    self.received += 1;
                    outcomes.push(outcome);
                }
                // Unreachable while `self` holds a sender
                Err(_) => break,
            }
        }
        outcomes.sort_by_key(|o| o.chunk);
        outcomes
    }
}

impl Default for Supervisor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::process::Command;

    fn spawn(script: &str) -> Child {
        Command::new("sh").arg("-c").arg(script).spawn().unwrap()
    }

    fn id(chunk: usize) -> ChunkId {
        ChunkId { category: 0, chunk }
    }

    #[test]
    fn test_wait_all_collects_exit_codes() {
        let mut supervisor = Supervisor::new();
        supervisor.watch(id(1), spawn("exit 3"), Instant::now());
        supervisor.watch(id(0), spawn("exit 0"), Instant::now());
        assert_eq!(supervisor.watched(), 2);

        let outcomes = supervisor.wait_all();
        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[0].chunk, id(0));
        assert!(outcomes[0].status.success());
        assert_eq!(outcomes[1].status, WorkerStatus::Exited(3));
        assert_eq!(supervisor.pending(), 0);
        assert!(supervisor.wait_all().is_empty());
    }

    #[test]
    fn test_try_outcomes_does_not_block() {
        let mut supervisor = Supervisor::new();
        supervisor.watch(id(0), spawn("sleep 2"), Instant::now());
        assert!(supervisor.try_outcomes().is_empty());
        assert_eq!(supervisor.pending(), 1);

        let outcomes = supervisor.wait_all();
        assert_eq!(outcomes.len(), 1);
        assert!(outcomes[0].elapsed >= Duration::from_secs(1));
    }
}
