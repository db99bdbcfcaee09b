//! Command-line front end for the gridsweep scheduler
//!
//! Wraps `gridsweep_core` with the pieces an operator touches:
//! - YAML settings and the open-sweep session file
//! - Parameter file generation
//! - The confirmation prompt at the worker cap
//! - File logging with size-based rotation

// ============================================================================
// Commands
// ============================================================================

pub mod commands;
pub mod confirm;
pub mod template;

// ============================================================================
// Persistence
// ============================================================================

pub mod session;
pub mod settings;
pub mod util;

// ============================================================================
// Logging
// ============================================================================

mod logging;

pub use commands::{InitOptions, ResumeOptions, RunOptions, Workspace};
pub use logging::init_logging;
pub use session::Session;
pub use settings::SweepSettings;
