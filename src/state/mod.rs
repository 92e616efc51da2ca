//! State module for tracking job progress
//!
//! A run moves through a fixed sequence of phases; `JobPhase` encodes the
//! legal transitions between them.

mod job_state;

pub use job_state::JobPhase;
