// tests/orchestrator.rs

mod common;
use crate::common::{eventually, init_tracing, with_timeout};

use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use pulse::engine::Orchestrator;
use pulse::exec::{BuildOutcome, BuildSpec, RunnerControl};
use pulse::types::{ChangeSignal, StopPolicy};
use pulse_test_utils::fake_builder::{FakeBuildBackend, FakeStep};
use pulse_test_utils::recording_runner::{RecordingRunner, RunnerCall};

type TestResult = Result<(), Box<dyn Error>>;

fn spec() -> BuildSpec {
    BuildSpec {
        package: PathBuf::from("/proj"),
        output: PathBuf::from("/tmp/pulse/proj0000"),
        build_tool: vec!["go".to_string(), "build".to_string()],
        build_args: Vec::new(),
        prebuild: None,
    }
}

struct Harness {
    signals: mpsc::Sender<ChangeSignal>,
    backend: FakeBuildBackend,
    runner: RecordingRunner,
    shutdown: CancellationToken,
    task: JoinHandle<pulse::errors::Result<()>>,
}

fn start(backend: FakeBuildBackend, policy: StopPolicy) -> Harness {
    init_tracing();
    let (signals, rx) = mpsc::channel(1);
    let runner = RecordingRunner::new();
    let shutdown = CancellationToken::new();

    let orchestrator = Orchestrator::new(
        Arc::new(backend.clone()),
        runner.clone(),
        rx,
        spec(),
        shutdown.clone(),
    )
    .with_stop_policy(policy);
    let task = tokio::spawn(orchestrator.run());

    Harness {
        signals,
        backend,
        runner,
        shutdown,
        task,
    }
}

impl Harness {
    async fn change(&self) {
        self.signals.send(ChangeSignal).await.expect("orchestrator alive");
    }

    async fn finish(self) -> TestResult {
        self.shutdown.cancel();
        with_timeout(self.task).await??;
        Ok(())
    }
}

#[tokio::test(start_paused = true)]
async fn change_builds_then_refreshes_runner() -> TestResult {
    let h = start(
        FakeBuildBackend::new(FakeStep::Succeed(Duration::from_millis(200))),
        StopPolicy::Immediately,
    );

    h.change().await;
    with_timeout(h.runner.wait_for_refreshes(1)).await;

    assert_eq!(h.runner.calls(), vec![RunnerCall::Stop, RunnerCall::Refresh]);
    assert_eq!(h.backend.successes(), 1);
    h.finish().await
}

#[tokio::test(start_paused = true)]
async fn rapid_changes_cancel_previous_builds_without_overlap() -> TestResult {
    let h = start(
        FakeBuildBackend::new(FakeStep::Succeed(Duration::from_secs(1))),
        StopPolicy::Immediately,
    );

    h.change().await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    h.change().await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    h.change().await;

    with_timeout(h.runner.wait_for_refreshes(1)).await;
    tokio::time::sleep(Duration::from_secs(3)).await;

    let records = h.backend.records();
    let outcomes: Vec<_> = records.iter().map(|r| (r.id, r.outcome.is_success())).collect();
    assert_eq!(outcomes, vec![(1, false), (2, false), (3, true)]);
    assert_eq!(records[0].outcome, BuildOutcome::Aborted);
    assert_eq!(records[1].outcome, BuildOutcome::Aborted);

    // Each build starts only after its predecessor is gone.
    for pair in records.windows(2) {
        assert!(pair[0].finished <= pair[1].started);
    }
    assert_eq!(h.backend.max_concurrent(), 1);

    // One stop per change, one refresh for the surviving build.
    assert_eq!(h.runner.stops(), 3);
    assert_eq!(h.runner.refreshes(), 1);
    h.finish().await
}

#[tokio::test(start_paused = true)]
async fn failed_build_leaves_program_stopped_until_next_success() -> TestResult {
    let h = start(
        FakeBuildBackend::new(FakeStep::Succeed(Duration::from_millis(100)))
            .with_script([FakeStep::Fail(Duration::from_millis(100))]),
        StopPolicy::Immediately,
    );

    h.change().await;
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(h.runner.calls(), vec![RunnerCall::Stop]);

    h.change().await;
    with_timeout(h.runner.wait_for_refreshes(1)).await;
    assert_eq!(
        h.runner.calls(),
        vec![RunnerCall::Stop, RunnerCall::Stop, RunnerCall::Refresh]
    );
    h.finish().await
}

#[tokio::test(start_paused = true)]
async fn after_build_policy_keeps_old_program_through_failures() -> TestResult {
    let h = start(
        FakeBuildBackend::new(FakeStep::Succeed(Duration::from_millis(100)))
            .with_script([FakeStep::Fail(Duration::from_millis(100))]),
        StopPolicy::AfterBuild,
    );

    h.change().await;
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(h.runner.calls().is_empty());

    h.change().await;
    with_timeout(h.runner.wait_for_refreshes(1)).await;
    assert_eq!(h.runner.calls(), vec![RunnerCall::Refresh]);
    h.finish().await
}

#[tokio::test(start_paused = true)]
async fn shutdown_cancels_in_flight_build_and_stops_runner() -> TestResult {
    let h = start(
        FakeBuildBackend::new(FakeStep::Succeed(Duration::from_secs(10))),
        StopPolicy::Immediately,
    );

    h.change().await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    let backend = h.backend.clone();
    let runner = h.runner.clone();
    h.finish().await?;

    let records = backend.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].outcome, BuildOutcome::Aborted);
    assert_eq!(runner.refreshes(), 0);
    assert_eq!(runner.calls().last(), Some(&RunnerCall::Stop));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn closed_signal_channel_shuts_down() -> TestResult {
    let Harness {
        signals,
        runner,
        task,
        ..
    } = start(
        FakeBuildBackend::new(FakeStep::Succeed(Duration::from_millis(100))),
        StopPolicy::Immediately,
    );

    drop(signals);

    with_timeout(task).await??;
    assert_eq!(runner.calls(), vec![RunnerCall::Stop]);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn success_of_superseded_build_does_not_refresh() -> TestResult {
    let h = start(
        FakeBuildBackend::new(FakeStep::Fail(Duration::from_millis(100)))
            .with_script([FakeStep::SucceedLate(Duration::from_secs(1))]),
        StopPolicy::Immediately,
    );

    h.change().await;
    tokio::time::sleep(Duration::from_millis(200)).await;
    h.change().await;
    tokio::time::sleep(Duration::from_secs(3)).await;

    let outcomes: Vec<_> = h
        .backend
        .records()
        .iter()
        .map(|r| (r.id, r.outcome.is_success()))
        .collect();
    assert_eq!(outcomes, vec![(1, true), (2, false)]);
    assert_eq!(h.runner.calls(), vec![RunnerCall::Stop, RunnerCall::Stop]);
    h.finish().await
}

#[tokio::test(start_paused = true)]
async fn change_at_build_completion_leaves_program_stopped_after_failure() -> TestResult {
    let h = start(
        FakeBuildBackend::new(FakeStep::Fail(Duration::from_millis(100)))
            .with_script([FakeStep::Succeed(Duration::from_millis(100))]),
        StopPolicy::Immediately,
    );

    h.change().await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    h.change().await;
    tokio::time::sleep(Duration::from_secs(1)).await;

    assert_eq!(h.backend.records().len(), 2);
    assert_eq!(h.runner.calls().last(), Some(&RunnerCall::Stop));
    h.finish().await
}

/// Runner whose `refresh` takes a while before it is recorded.
#[derive(Debug, Clone)]
struct SlowRefresh {
    inner: RecordingRunner,
    delay: Duration,
}

impl RunnerControl for SlowRefresh {
    fn refresh(&self) {
        tokio::task::block_in_place(|| std::thread::sleep(self.delay));
        self.inner.refresh();
    }

    fn stop(&self) {
        self.inner.stop();
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn refresh_cannot_overtake_stop_for_a_newer_change() -> TestResult {
    init_tracing();
    let backend = FakeBuildBackend::new(FakeStep::Fail(Duration::from_millis(50)))
        .with_script([FakeStep::Succeed(Duration::from_millis(50))]);
    let recorder = RecordingRunner::new();
    let (signals, rx) = mpsc::channel(1);
    let shutdown = CancellationToken::new();

    let orchestrator = Orchestrator::new(
        Arc::new(backend.clone()),
        SlowRefresh {
            inner: recorder.clone(),
            delay: Duration::from_millis(300),
        },
        rx,
        spec(),
        shutdown.clone(),
    );
    let task = tokio::spawn(orchestrator.run());

    signals.send(ChangeSignal).await?;
    assert!(eventually(Duration::from_secs(5), || backend.records().len() == 1).await);

    // Arrives while the refresh for build #1 is still in progress.
    signals.send(ChangeSignal).await?;
    assert!(eventually(Duration::from_secs(5), || backend.records().len() == 2).await);
    assert!(eventually(Duration::from_secs(5), || recorder.stops() == 2).await);
    tokio::time::sleep(Duration::from_millis(400)).await;

    assert!(!backend.records()[1].outcome.is_success());
    assert_eq!(recorder.calls().last(), Some(&RunnerCall::Stop));

    shutdown.cancel();
    with_timeout(task).await??;
    Ok(())
}
