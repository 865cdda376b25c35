// src/exec/mod.rs

//! Process execution layer.
//!
//! - [`process`] spawns children in their own process group and implements
//!   the graceful-then-forced termination protocol.
//! - [`builder`] runs the pre-build command and the build tool for one
//!   [`BuildTask`], reporting a [`BuildOutcome`].
//! - [`backend`] provides the `BuildBackend` trait and the production
//!   `RealBuildBackend`, which tests replace with a fake.
//! - [`runner`] supervises the target program.
//! - [`artifact`] names and cleans up the output binary.
//! - [`output`] forwards child output and keeps a short tail for reports.

pub mod artifact;
pub mod backend;
pub mod builder;
pub mod output;
pub mod process;
pub mod runner;

pub use backend::{BuildBackend, RealBuildBackend};
pub use builder::{BuildFailure, BuildOutcome, BuildSpec, BuildStage, BuildTask, Builder};
pub use runner::{RunSpec, Runner, RunnerControl, RunnerHandle, RunnerState};
