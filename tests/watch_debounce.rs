// tests/watch_debounce.rs

mod common;
use crate::common::init_tracing;
use crate::common::transport::RecordingTransport;

use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout, Duration, Instant};

use assetflow::engine::{RuntimeEvent, TriggerReason};
use assetflow::reload::ReloadTransport;
use assetflow::types::RefreshKind;
use assetflow::watch::{compile_subscriptions, run_event_loop, WatchSubscription};

type TestResult = Result<(), Box<dyn Error>>;

const WINDOW: Duration = Duration::from_millis(100);

struct Harness {
    raw_tx: mpsc::UnboundedSender<PathBuf>,
    rt_rx: mpsc::Receiver<RuntimeEvent>,
    handle: JoinHandle<()>,
}

impl Harness {
    fn new(subs: Vec<WatchSubscription>) -> Self {
        Self::start(subs, None)
    }

    fn with_reload(subs: Vec<WatchSubscription>, transport: &RecordingTransport) -> Self {
        let transport: Arc<dyn ReloadTransport> = Arc::new(transport.clone());
        Self::start(subs, Some(transport))
    }

    fn start(subs: Vec<WatchSubscription>, reload: Option<Arc<dyn ReloadTransport>>) -> Self {
        let compiled = Arc::new(compile_subscriptions(&subs).expect("valid subscriptions"));
        let (raw_tx, raw_rx) = mpsc::unbounded_channel();
        let (rt_tx, rt_rx) = mpsc::channel(16);
        let handle = tokio::spawn(run_event_loop(
            PathBuf::from("/project"),
            compiled,
            raw_rx,
            rt_tx,
            reload,
            WINDOW,
        ));
        Self {
            raw_tx,
            rt_rx,
            handle,
        }
    }

    fn touch(&self, rel: &str) {
        self.raw_tx
            .send(PathBuf::from("/project").join(rel))
            .expect("event loop alive");
    }

    async fn next_task(&mut self) -> Option<String> {
        match timeout(Duration::from_secs(1), self.rt_rx.recv()).await {
            Ok(Some(RuntimeEvent::TaskTriggered { task, reason })) => {
                assert_eq!(reason, TriggerReason::FileWatch);
                Some(task)
            }
            Ok(Some(other)) => panic!("unexpected event {other:?}"),
            Ok(None) | Err(_) => None,
        }
    }
}

fn subscriptions() -> Vec<WatchSubscription> {
    vec![
        WatchSubscription::new(["css/**/*.scss"], ["styles"]),
        WatchSubscription::new(["**/*.scss", "js/**/*.js"], ["lint"]),
        WatchSubscription::new(["js/**/*.js"], ["scripts"]).exclude("js/vendor/**"),
    ]
}

#[tokio::test(start_paused = true)]
async fn burst_of_changes_triggers_once() -> TestResult {
    init_tracing();
    let mut h = Harness::new(subscriptions());

    h.touch("js/app.js");
    h.touch("js/app.js");
    h.touch("js/util.js");

    let mut tasks = vec![h.next_task().await, h.next_task().await];
    tasks.sort();
    assert_eq!(tasks, [Some("lint".to_string()), Some("scripts".to_string())]);
    assert_eq!(h.next_task().await, None, "the burst must collapse into one trigger per task");
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn window_is_measured_from_the_first_event() -> TestResult {
    init_tracing();
    let mut h = Harness::new(vec![WatchSubscription::new(["css/**/*.scss"], ["styles"])]);

    let start = Instant::now();
    h.touch("css/app.scss");
    sleep(Duration::from_millis(60)).await;
    h.touch("css/nav.scss");

    assert_eq!(h.next_task().await.as_deref(), Some("styles"));
    let elapsed = start.elapsed();
    assert!(elapsed >= WINDOW && elapsed < Duration::from_millis(160), "{elapsed:?}");
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn change_after_the_window_triggers_again() -> TestResult {
    init_tracing();
    let mut h = Harness::new(vec![WatchSubscription::new(["css/**/*.scss"], ["styles"])]);

    h.touch("css/app.scss");
    assert_eq!(h.next_task().await.as_deref(), Some("styles"));
    h.touch("css/app.scss");
    assert_eq!(h.next_task().await.as_deref(), Some("styles"));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn own_state_and_unmatched_paths_are_ignored() -> TestResult {
    init_tracing();
    let mut h = Harness::new(subscriptions());

    h.touch(".assetflow/cache/entries/abc.toml");
    h.touch("css/app.scss.assetflow-tmp");
    h.touch("js/vendor/jquery.js");
    h.touch("README.md");
    h.raw_tx.send(PathBuf::from("/elsewhere/css/app.scss"))?;

    assert_eq!(h.next_task().await, None);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn closing_intake_drops_pending_windows() -> TestResult {
    init_tracing();
    let Harness {
        raw_tx,
        mut rt_rx,
        handle,
    } = Harness::new(subscriptions());

    raw_tx.send(PathBuf::from("/project/css/app.scss"))?;
    drop(raw_tx);

    timeout(Duration::from_secs(1), handle).await??;
    assert!(rt_rx.recv().await.is_none());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn content_changes_reload_without_running_tasks() -> TestResult {
    init_tracing();
    let transport = RecordingTransport::new();
    let mut h = Harness::with_reload(
        vec![
            WatchSubscription::new(["css/**/*.scss"], ["styles"]),
            WatchSubscription::reload_only(["layouts/**/*", "content/**/*"], RefreshKind::Full),
        ],
        &transport,
    );

    h.touch("layouts/base.html");
    h.touch("content/post.md");
    h.touch("layouts/nav.html");

    assert_eq!(h.next_task().await, None, "content changes must not start a build");
    let sent = transport.sent();
    assert_eq!(sent.len(), 1, "the burst collapses into one reload: {sent:?}");
    assert_eq!(sent[0].kind, RefreshKind::Full);
    assert_eq!(sent[0].source, "watch");

    // Asset changes still go through the runtime.
    h.touch("css/app.scss");
    assert_eq!(h.next_task().await.as_deref(), Some("styles"));
    assert_eq!(transport.sent().len(), 1);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn content_changes_are_inert_without_a_reload_server() -> TestResult {
    init_tracing();
    let mut h = Harness::new(vec![WatchSubscription::reload_only(
        ["layouts/**/*"],
        RefreshKind::Full,
    )]);

    h.touch("layouts/base.html");
    assert_eq!(h.next_task().await, None);
    Ok(())
}
