use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::Instant;

use pulse::exec::{BuildBackend, BuildFailure, BuildOutcome, BuildStage, BuildTask};

/// What the next fake build does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FakeStep {
    /// Take this long, then succeed.
    Succeed(Duration),
    /// Take this long, then fail with exit code 1.
    Fail(Duration),
    /// Take this long, then succeed even if cancelled meanwhile. Models a
    /// build that completes just as it is superseded.
    SucceedLate(Duration),
}

/// A finished (or aborted) fake build.
#[derive(Debug, Clone)]
pub struct BuildRecord {
    pub id: u64,
    pub started: Instant,
    pub finished: Instant,
    pub outcome: BuildOutcome,
}

/// A fake build backend that:
/// - plays back a script of steps (falling back to a default step)
/// - honours cancellation by returning `Aborted`
/// - records every build and the maximum number running at once.
#[derive(Debug, Clone)]
pub struct FakeBuildBackend {
    script: Arc<Mutex<VecDeque<FakeStep>>>,
    default_step: FakeStep,
    records: Arc<Mutex<Vec<BuildRecord>>>,
    active: Arc<AtomicUsize>,
    max_active: Arc<AtomicUsize>,
}

impl FakeBuildBackend {
    pub fn new(default_step: FakeStep) -> Self {
        Self {
            script: Arc::new(Mutex::new(VecDeque::new())),
            default_step,
            records: Arc::new(Mutex::new(Vec::new())),
            active: Arc::new(AtomicUsize::new(0)),
            max_active: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Queue steps consumed by the next builds, in order.
    pub fn with_script(self, steps: impl IntoIterator<Item = FakeStep>) -> Self {
        self.script.lock().unwrap().extend(steps);
        self
    }

    pub fn records(&self) -> Vec<BuildRecord> {
        self.records.lock().unwrap().clone()
    }

    pub fn successes(&self) -> usize {
        self.records()
            .iter()
            .filter(|r| r.outcome.is_success())
            .count()
    }

    pub fn aborted(&self) -> usize {
        self.records()
            .iter()
            .filter(|r| r.outcome == BuildOutcome::Aborted)
            .count()
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }
}

impl BuildBackend for FakeBuildBackend {
    fn build(&self, task: BuildTask) -> Pin<Box<dyn Future<Output = BuildOutcome> + Send + 'static>> {
        let step = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(self.default_step);
        let records = Arc::clone(&self.records);
        let active = Arc::clone(&self.active);
        let max_active = Arc::clone(&self.max_active);

        Box::pin(async move {
            let now_active = active.fetch_add(1, Ordering::SeqCst) + 1;
            max_active.fetch_max(now_active, Ordering::SeqCst);
            let started = Instant::now();

            let (duration, succeed) = match step {
                FakeStep::Succeed(d) | FakeStep::SucceedLate(d) => (d, true),
                FakeStep::Fail(d) => (d, false),
            };
            let cancellable = !matches!(step, FakeStep::SucceedLate(_));

            let outcome = tokio::select! {
                biased;
                _ = task.cancel.cancelled(), if cancellable => BuildOutcome::Aborted,
                _ = tokio::time::sleep(duration) => {
                    if succeed {
                        BuildOutcome::Success { elapsed: duration }
                    } else {
                        BuildOutcome::Failed(BuildFailure {
                            stage: BuildStage::Compile,
                            exit_code: Some(1),
                            reason: "exit code 1".to_string(),
                            output_tail: vec!["fake compile error".to_string()],
                        })
                    }
                }
            };

            active.fetch_sub(1, Ordering::SeqCst);
            records.lock().unwrap().push(BuildRecord {
                id: task.id,
                started,
                finished: Instant::now(),
                outcome: outcome.clone(),
            });
            outcome
        })
    }
}
