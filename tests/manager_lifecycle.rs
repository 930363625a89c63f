//! Manager lifecycle integration tests
//!
//! These exercise the polling loop end to end with scripted in-process
//! probers: immediate first probe, ticker cadence, in-flight
//! visibility, quiescence after stop, prompt cancellation of a hanging
//! probe, restart semantics, and drop-on-full result notifications.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use pingmon::history::Sample;
use pingmon::manager::Manager;
use pingmon::probe::{ProbeError, ProbeMode, ProbeResult, Prober};
use pingmon::status::{self, StatusLevel};

/// Prober scripted for tests: fixed latency or failure, optional delay
/// before resolving, and a record of every target it was pointed at.
struct ScriptedProber {
    latency: Duration,
    delay: Duration,
    fail: bool,
    calls: AtomicUsize,
    targets: Mutex<Vec<String>>,
}

impl ScriptedProber {
    fn ok(latency: Duration) -> Arc<Self> {
        Arc::new(Self {
            latency,
            delay: Duration::ZERO,
            fail: false,
            calls: AtomicUsize::new(0),
            targets: Mutex::new(Vec::new()),
        })
    }

    fn slow(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            latency: Duration::from_millis(1),
            delay,
            fail: false,
            calls: AtomicUsize::new(0),
            targets: Mutex::new(Vec::new()),
        })
    }

    fn failing() -> Arc<Self> {
        Arc::new(Self {
            latency: Duration::ZERO,
            delay: Duration::ZERO,
            fail: true,
            calls: AtomicUsize::new(0),
            targets: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn targets(&self) -> Vec<String> {
        self.targets.lock().unwrap().clone()
    }
}

#[async_trait]
impl Prober for ScriptedProber {
    async fn probe(&self, target: &str, _timeout: Duration) -> ProbeResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.targets.lock().unwrap().push(target.to_string());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.fail {
            Err(ProbeError::Network(String::from("scripted failure")))
        } else {
            Ok(Sample::ok(self.latency))
        }
    }
}

fn manager_with(prober: Arc<ScriptedProber>, interval: Duration, capacity: usize) -> Manager {
    Manager::new(
        "test.invalid",
        interval,
        Duration::from_secs(2),
        ProbeMode::Echo,
        capacity,
    )
    .with_prober(prober)
}

#[tokio::test]
async fn first_probe_fires_immediately() {
    let prober = ScriptedProber::ok(Duration::from_millis(10));
    let manager = manager_with(prober.clone(), Duration::from_secs(60), 8);

    manager.start().await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    // Long interval, so the only possible probe is the immediate one.
    assert_eq!(prober.calls(), 1);
    assert_eq!(manager.history().len(), 1);

    manager.stop().await;
}

#[tokio::test]
async fn probes_repeat_on_the_interval() {
    let prober = ScriptedProber::ok(Duration::from_millis(10));
    let manager = manager_with(prober.clone(), Duration::from_millis(50), 32);

    manager.start().await;
    tokio::time::sleep(Duration::from_millis(400)).await;
    manager.stop().await;

    // Immediate probe plus several ticks; exact count depends on the
    // scheduler, but multiple cycles must have completed.
    assert!(prober.calls() >= 3, "expected >= 3 probes, got {}", prober.calls());
    assert_eq!(manager.history().len(), prober.calls().min(32));
}

#[tokio::test]
async fn in_flight_is_visible_while_a_probe_runs() {
    let prober = ScriptedProber::slow(Duration::from_millis(400));
    let manager = manager_with(prober, Duration::from_secs(60), 8);

    manager.start().await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    let (in_flight, elapsed_first) = manager.is_in_flight();
    assert!(in_flight);
    assert!(elapsed_first > Duration::ZERO);

    tokio::time::sleep(Duration::from_millis(100)).await;
    let (still_in_flight, elapsed_second) = manager.is_in_flight();
    assert!(still_in_flight);
    assert!(elapsed_second > elapsed_first);

    // Once the probe resolves the flag clears.
    tokio::time::sleep(Duration::from_millis(400)).await;
    let (done, elapsed) = manager.is_in_flight();
    assert!(!done);
    assert_eq!(elapsed, Duration::ZERO);

    manager.stop().await;
}

#[tokio::test]
async fn history_is_quiescent_after_stop() {
    let prober = ScriptedProber::ok(Duration::from_millis(5));
    let manager = manager_with(prober, Duration::from_millis(30), 64);

    manager.start().await;
    tokio::time::sleep(Duration::from_millis(200)).await;
    manager.stop().await;

    let settled = manager.history().len();
    assert!(settled >= 1);

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(manager.history().len(), settled);
    assert_eq!(manager.is_in_flight(), (false, Duration::ZERO));
}

#[tokio::test]
async fn stop_cancels_a_hanging_probe_promptly() {
    let prober = ScriptedProber::slow(Duration::from_secs(30));
    let manager = manager_with(prober, Duration::from_secs(60), 8);

    manager.start().await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(manager.is_in_flight().0);

    let begin = Instant::now();
    manager.stop().await;
    assert!(begin.elapsed() < Duration::from_secs(5));

    // The abandoned probe leaves no sample and no dangling flag.
    assert_eq!(manager.history().len(), 0);
    assert_eq!(manager.is_in_flight(), (false, Duration::ZERO));
}

#[tokio::test]
async fn stop_is_idempotent_and_restart_is_clean() {
    let prober = ScriptedProber::ok(Duration::from_millis(5));
    let manager = manager_with(prober.clone(), Duration::from_millis(40), 32);

    manager.start().await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    manager.stop().await;
    manager.stop().await;

    let before = prober.calls();
    manager.restart().await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    manager.stop().await;

    assert!(prober.calls() > before);
}

#[tokio::test]
async fn restart_picks_up_a_changed_target() {
    let prober = ScriptedProber::ok(Duration::from_millis(5));
    let manager = manager_with(prober.clone(), Duration::from_secs(60), 8);

    manager.start().await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    manager.set_target("other.invalid");
    // A plain write does not redirect the loop by itself.
    assert_eq!(manager.target(), "other.invalid");

    manager.restart().await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    manager.stop().await;

    let targets = prober.targets();
    assert_eq!(targets.first().map(String::as_str), Some("test.invalid"));
    assert_eq!(targets.last().map(String::as_str), Some("other.invalid"));
}

#[tokio::test]
async fn failures_become_failed_samples_not_errors() {
    let prober = ScriptedProber::failing();
    let manager = manager_with(prober.clone(), Duration::from_millis(30), 16);

    manager.start().await;
    tokio::time::sleep(Duration::from_millis(200)).await;
    manager.stop().await;

    // The loop survived several failing cycles.
    assert!(prober.calls() >= 2);

    let samples = manager.history().latest(status::LEVEL_WINDOW);
    assert!(!samples.is_empty());
    for sample in &samples {
        assert!(sample.failed);
        assert_eq!(sample.latency, Duration::ZERO);
        assert!(!sample.description.is_empty());
    }
    assert_eq!(status::derive_level(&samples, None), StatusLevel::Failed);
}

#[tokio::test]
async fn notifications_drop_when_nobody_drains_the_channel() {
    let prober = ScriptedProber::ok(Duration::from_millis(1));
    let manager = manager_with(prober, Duration::from_millis(1), 512);

    // Receiver is taken but never polled while the loop runs.
    let mut results = manager.take_results().unwrap();

    manager.start().await;
    tokio::time::sleep(Duration::from_millis(500)).await;
    manager.stop().await;

    let recorded = manager.history().len();
    let mut delivered = 0;
    while results.try_recv().is_ok() {
        delivered += 1;
    }

    // The channel buffers a bounded number of notifications; the
    // history keeps everything the loop produced.
    assert!(delivered <= 100);
    assert!(
        recorded >= delivered,
        "history ({recorded}) must cover at least the delivered notifications ({delivered})"
    );
}

#[tokio::test]
async fn results_channel_wakes_a_live_consumer() {
    let prober = ScriptedProber::ok(Duration::from_millis(7));
    let manager = manager_with(prober, Duration::from_millis(25), 16);
    let mut results = manager.take_results().unwrap();

    manager.start().await;
    let sample = tokio::time::timeout(Duration::from_secs(5), results.recv())
        .await
        .expect("a notification should arrive within the timeout")
        .expect("channel open while the manager lives");
    manager.stop().await;

    assert!(!sample.failed);
    assert_eq!(sample.latency, Duration::from_millis(7));
}

#[tokio::test]
async fn connect_probe_to_unreachable_target_records_a_failure() {
    // 203.0.113.1 (TEST-NET-3) is never routable; depending on the
    // environment the handshake either times out at the 2s budget or is
    // rejected outright. Both must surface as a failed sample.
    let manager = Manager::new(
        "203.0.113.1",
        Duration::from_secs(60),
        Duration::from_secs(2),
        ProbeMode::Connect,
        8,
    );
    let mut results = manager.take_results().unwrap();

    manager.start().await;
    let sample = tokio::time::timeout(Duration::from_secs(10), results.recv())
        .await
        .expect("probe must resolve within its timeout budget")
        .expect("channel open while the manager lives");
    manager.stop().await;

    assert!(sample.failed);
    assert_eq!(sample.latency, Duration::ZERO);
    assert!(!sample.description.is_empty());
}
