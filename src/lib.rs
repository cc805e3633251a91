//! Assigns persons to capacity-limited groups by ranked wishes and avoidances.
//!
//! A run builds a [`ScoreMatrix`](model::condition::ScoreMatrix) from the
//! wish lists, solves the assignment program exactly within a time budget
//! ([`solver`]), improves the incumbent with random two-person swaps
//! ([`refine`]) and summarizes the result ([`report`]). [`pipeline::run`]
//! chains the stages.

pub mod action;
pub mod cache;
pub mod config;
pub mod error;
pub mod io;
pub mod limit;
pub mod model;
pub mod pipeline;
pub mod refine;
pub mod report;
pub mod solver;

pub use config::AllocationConfig;
pub use error::AllocationError;
pub use model::entity::{Group, Person};
pub use pipeline::{run, run_with_rng, Outcome};
pub use solver::{SolveStatus, Solution};
