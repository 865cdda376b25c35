// src/engine/mod.rs

//! Orchestration engine for pulse.
//!
//! Ties the watcher's change signals to the build backend and the runner:
//! every change cancels the previous build, starts a new one, and refreshes
//! the runner once a build succeeds.

pub mod orchestrator;

pub use orchestrator::Orchestrator;
