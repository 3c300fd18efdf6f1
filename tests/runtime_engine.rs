// tests/runtime_engine.rs

mod common;
use crate::common::fake_backend::FakeRunBackend;
use crate::common::init_tracing;

use std::error::Error;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tokio::time::{sleep, timeout, Duration};

use assetflow::engine::{
    CoreRuntime, Runtime, RuntimeEvent, RuntimeOptions, TaskName, TriggerReason,
};
use assetflow::scheduler::RunStatus;

type TestResult = Result<(), Box<dyn Error>>;
type Started = Arc<Mutex<Vec<(TaskName, TriggerReason)>>>;

fn core(exit_when_idle: bool) -> CoreRuntime {
    CoreRuntime::new(
        ["styles", "scripts", "build"].map(String::from),
        RuntimeOptions { exit_when_idle },
    )
}

fn trigger(task: &str, reason: TriggerReason) -> RuntimeEvent {
    RuntimeEvent::TaskTriggered {
        task: task.to_string(),
        reason,
    }
}

fn started_names(started: &Started) -> Vec<String> {
    started.lock().unwrap().iter().map(|(t, _)| t.clone()).collect()
}

#[tokio::test]
async fn one_shot_runtime_exits_after_the_run() -> TestResult {
    init_tracing();

    let (tx, rx) = mpsc::channel(16);
    let started = Started::default();
    let backend = FakeRunBackend::new(tx.clone(), Arc::clone(&started));

    tx.send(trigger("build", TriggerReason::Manual)).await?;
    let summary = timeout(Duration::from_secs(2), Runtime::new(core(true), rx, backend).run()).await??;

    assert_eq!(started_names(&started), ["build"]);
    assert_eq!(summary.runs, 1);
    assert!(summary.is_success());
    Ok(())
}

#[tokio::test]
async fn failed_run_is_counted() -> TestResult {
    init_tracing();

    let (tx, rx) = mpsc::channel(16);
    let started = Started::default();
    let backend = FakeRunBackend::new(tx.clone(), Arc::clone(&started)).failing("build");

    tx.send(trigger("build", TriggerReason::Manual)).await?;
    let summary = timeout(Duration::from_secs(2), Runtime::new(core(true), rx, backend).run()).await??;

    assert_eq!(summary.failed, 1);
    assert!(!summary.is_success());
    Ok(())
}

#[tokio::test]
async fn triggers_during_a_run_coalesce_into_one_follow_up() -> TestResult {
    init_tracing();

    let (tx, rx) = mpsc::channel(16);
    let started = Started::default();
    let backend = FakeRunBackend::new(tx.clone(), Arc::clone(&started)).manual_finish();
    let handle = tokio::spawn(Runtime::new(core(false), rx, backend).run());

    tx.send(trigger("styles", TriggerReason::Manual)).await?;
    for _ in 0..3 {
        tx.send(trigger("styles", TriggerReason::FileWatch)).await?;
    }
    sleep(Duration::from_millis(50)).await;
    assert_eq!(started_names(&started), ["styles"], "never two runs of one task at once");

    tx.send(RuntimeEvent::RunFinished {
        task: "styles".into(),
        status: RunStatus::Success,
    })
    .await?;
    sleep(Duration::from_millis(50)).await;
    {
        let started = started.lock().unwrap();
        assert_eq!(started.len(), 2);
        assert_eq!(started[1], ("styles".to_string(), TriggerReason::FileWatch));
    }

    tx.send(RuntimeEvent::RunFinished {
        task: "styles".into(),
        status: RunStatus::Success,
    })
    .await?;
    sleep(Duration::from_millis(50)).await;
    assert_eq!(started.lock().unwrap().len(), 2, "only one follow-up was queued");

    tx.send(RuntimeEvent::ShutdownRequested).await?;
    let summary = timeout(Duration::from_secs(2), handle).await???;
    assert_eq!(summary.runs, 2);
    Ok(())
}

#[tokio::test]
async fn different_tasks_run_concurrently() -> TestResult {
    init_tracing();

    let (tx, rx) = mpsc::channel(16);
    let started = Started::default();
    let backend = FakeRunBackend::new(tx.clone(), Arc::clone(&started)).manual_finish();
    let handle = tokio::spawn(Runtime::new(core(false), rx, backend).run());

    tx.send(trigger("styles", TriggerReason::FileWatch)).await?;
    tx.send(trigger("scripts", TriggerReason::FileWatch)).await?;
    sleep(Duration::from_millis(50)).await;
    assert_eq!(started_names(&started), ["styles", "scripts"]);

    // Shutdown waits for both in-flight runs.
    tx.send(RuntimeEvent::ShutdownRequested).await?;
    sleep(Duration::from_millis(50)).await;
    assert!(!handle.is_finished());

    for task in ["styles", "scripts"] {
        tx.send(RuntimeEvent::RunFinished {
            task: task.into(),
            status: RunStatus::Success,
        })
        .await?;
    }
    let summary = timeout(Duration::from_secs(2), handle).await???;
    assert_eq!(summary.runs, 2);
    Ok(())
}

#[tokio::test]
async fn unknown_and_post_shutdown_triggers_are_ignored() -> TestResult {
    init_tracing();

    let (tx, rx) = mpsc::channel(16);
    let started = Started::default();
    let backend = FakeRunBackend::new(tx.clone(), Arc::clone(&started)).manual_finish();
    let handle = tokio::spawn(Runtime::new(core(false), rx, backend).run());

    tx.send(trigger("deploy", TriggerReason::Manual)).await?;
    tx.send(trigger("build", TriggerReason::Manual)).await?;
    tx.send(RuntimeEvent::ShutdownRequested).await?;
    tx.send(trigger("styles", TriggerReason::FileWatch)).await?;
    tx.send(RuntimeEvent::RunFinished {
        task: "build".into(),
        status: RunStatus::Success,
    })
    .await?;

    let summary = timeout(Duration::from_secs(2), handle).await???;
    assert_eq!(started_names(&started), ["build"]);
    assert_eq!(summary.runs, 1);
    Ok(())
}
