// src/exec/backend.rs

//! Pluggable build backend abstraction.
//!
//! The orchestrator talks to a `BuildBackend` instead of a concrete
//! [`Builder`]. This makes it easy to swap in a fake backend in tests that
//! scripts outcomes and records timing, while production builds go through
//! real subprocesses.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use super::builder::{BuildOutcome, BuildTask, Builder};

/// Trait abstracting how a build task is executed.
///
/// The returned future owns everything it needs, so the orchestrator can
/// move it into a spawned task. Implementations must honour `task.cancel`
/// by stopping work and returning [`BuildOutcome::Aborted`].
pub trait BuildBackend: Send + Sync + 'static {
    fn build(&self, task: BuildTask) -> Pin<Box<dyn Future<Output = BuildOutcome> + Send + 'static>>;
}

/// Backend running real build subprocesses through a shared [`Builder`].
#[derive(Debug, Clone)]
pub struct RealBuildBackend {
    builder: Arc<Builder>,
}

impl RealBuildBackend {
    pub fn new(builder: Builder) -> Self {
        Self {
            builder: Arc::new(builder),
        }
    }
}

impl BuildBackend for RealBuildBackend {
    fn build(&self, task: BuildTask) -> Pin<Box<dyn Future<Output = BuildOutcome> + Send + 'static>> {
        // Clone the Arc so the future doesn't borrow `self`.
        let builder = Arc::clone(&self.builder);
        Box::pin(async move { builder.build(&task).await })
    }
}
