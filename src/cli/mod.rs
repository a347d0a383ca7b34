//! CLI-specific utilities for butterfly-pairs
//!
//! This module contains code specific to the command-line interface,
//! separate from the core library functionality.

pub mod control;
pub mod progress;

pub use control::spawn_stdin_control;
pub use progress::ProgressManager;
