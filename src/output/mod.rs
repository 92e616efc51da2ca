//! Output module for reporting on the identifier store
//!
//! This module handles:
//! - Loading store statistics and recent runs
//! - Printing them for the `--stats` mode

pub mod stats;

pub use stats::{load_statistics, print_statistics, StoreStatistics};
