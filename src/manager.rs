//! Polling manager
//!
//! The manager owns the probe loop: a single background task that fires
//! one probe immediately, then one per interval tick, recording every
//! outcome - success or failure - as a [`Sample`] in the shared
//! [`History`]. Consumers watch three surfaces:
//!
//! - the history itself (the durable record, read via `Arc`),
//! - `is_in_flight()` for animating a probe currently under way,
//! - a bounded result channel that acts as a best-effort wake-up
//!   signal. When its buffer is full, notifications are dropped;
//!   consumers must re-read the history, never rely on the channel for
//!   completeness.
//!
//! `stop()` signals the loop over a watch channel and then awaits the
//! task's join handle, so by the time it returns no probe task is alive
//! and `restart()` cannot race two loops against the same history.

use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, instrument, trace, warn};

use crate::history::{History, Sample};
use crate::probe::{ProbeMode, Prober};

/// Fallback target when an empty one is supplied.
pub const DEFAULT_TARGET: &str = "1.1.1.1";

/// Fallback probe interval.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(1);

/// Fallback per-probe timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);

/// Buffered results before notifications start being dropped.
const RESULT_CHANNEL_CAPACITY: usize = 100;

/// Runtime-mutable probe parameters. Written by `set_target` /
/// `set_probe_mode`, read once at the start of each probe cycle.
#[derive(Debug, Clone)]
struct Settings {
    target: String,
    mode: ProbeMode,
}

/// In-flight marker, behind its own lock so pollers never contend with
/// history access.
#[derive(Debug, Default)]
struct InFlight {
    active: bool,
    since: Option<Instant>,
}

/// Everything the loop task needs, cloned out of the manager at spawn
/// time. No lock is ever held across a probe call.
struct LoopContext {
    settings: Arc<RwLock<Settings>>,
    history: Arc<History>,
    in_flight: Arc<Mutex<InFlight>>,
    result_tx: mpsc::Sender<Sample>,
    interval: Duration,
    timeout: Duration,
    prober_override: Option<Arc<dyn Prober>>,
}

/// Handle onto the running loop. Holding the watch sender keeps the
/// loop alive; dropping the manager therefore also winds the loop down.
struct ActiveLoop {
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

/// Owns the polling loop, the history, and the in-flight state.
///
/// All methods take `&self`; share the manager behind an `Arc` between
/// the control flow that starts/stops it and any readers.
pub struct Manager {
    settings: Arc<RwLock<Settings>>,
    interval: Duration,
    timeout: Duration,
    history: Arc<History>,
    in_flight: Arc<Mutex<InFlight>>,
    result_tx: mpsc::Sender<Sample>,
    result_rx: Mutex<Option<mpsc::Receiver<Sample>>>,
    active: tokio::sync::Mutex<Option<ActiveLoop>>,
    prober_override: Option<Arc<dyn Prober>>,
}

impl Manager {
    /// Create a stopped manager. Invalid parameters are normalized to
    /// defaults rather than rejected: an empty target becomes
    /// [`DEFAULT_TARGET`], zero durations become the default interval
    /// and timeout, zero capacity becomes the history default.
    pub fn new(
        target: &str,
        interval: Duration,
        timeout: Duration,
        mode: ProbeMode,
        history_capacity: usize,
    ) -> Self {
        let target = if target.trim().is_empty() {
            String::from(DEFAULT_TARGET)
        } else {
            target.trim().to_string()
        };
        let interval = if interval.is_zero() {
            DEFAULT_INTERVAL
        } else {
            interval
        };
        let timeout = if timeout.is_zero() {
            DEFAULT_TIMEOUT
        } else {
            timeout
        };

        let (result_tx, result_rx) = mpsc::channel(RESULT_CHANNEL_CAPACITY);

        Self {
            settings: Arc::new(RwLock::new(Settings { target, mode })),
            interval,
            timeout,
            history: Arc::new(History::new(history_capacity)),
            in_flight: Arc::new(Mutex::new(InFlight::default())),
            result_tx,
            result_rx: Mutex::new(Some(result_rx)),
            active: tokio::sync::Mutex::new(None),
            prober_override: None,
        }
    }

    /// Replace the mode-selected probers with a fixed one. Intended for
    /// embedders and tests that script probe outcomes; the probe mode
    /// is ignored while an override is set.
    pub fn with_prober(mut self, prober: Arc<dyn Prober>) -> Self {
        self.prober_override = Some(prober);
        self
    }

    /// The shared sample history. The manager is the only writer.
    pub fn history(&self) -> Arc<History> {
        Arc::clone(&self.history)
    }

    /// Take the receiving end of the result channel. Yields `Some` only
    /// once; the channel is a wake-up signal, not a reliable feed.
    pub fn take_results(&self) -> Option<mpsc::Receiver<Sample>> {
        self.result_rx.lock().expect("result lock poisoned").take()
    }

    pub fn target(&self) -> String {
        self.settings
            .read()
            .expect("settings lock poisoned")
            .target
            .clone()
    }

    pub fn probe_mode(&self) -> ProbeMode {
        self.settings.read().expect("settings lock poisoned").mode
    }

    /// Change the target. Takes effect at the next probe cycle of a
    /// restarted loop; an in-progress probe is never redirected.
    pub fn set_target(&self, target: &str) {
        if target.trim().is_empty() {
            warn!("ignoring empty target");
            return;
        }
        let mut settings = self.settings.write().expect("settings lock poisoned");
        settings.target = target.trim().to_string();
    }

    /// Change the probe mode. Takes effect after `restart()`.
    pub fn set_probe_mode(&self, mode: ProbeMode) {
        self.settings.write().expect("settings lock poisoned").mode = mode;
    }

    /// Whether a probe is currently under way, and for how long. The
    /// duration is only meaningful when the flag is true.
    pub fn is_in_flight(&self) -> (bool, Duration) {
        let state = self.in_flight.lock().expect("in-flight lock poisoned");
        match (state.active, state.since) {
            (true, Some(since)) => (true, since.elapsed()),
            _ => (false, Duration::ZERO),
        }
    }

    /// Launch the polling loop. No-op when already running.
    pub async fn start(&self) {
        let mut active = self.active.lock().await;
        if active.is_some() {
            warn!("start() called while already running");
            return;
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let ctx = LoopContext {
            settings: Arc::clone(&self.settings),
            history: Arc::clone(&self.history),
            in_flight: Arc::clone(&self.in_flight),
            result_tx: self.result_tx.clone(),
            interval: self.interval,
            timeout: self.timeout,
            prober_override: self.prober_override.clone(),
        };
        let task = tokio::spawn(poll_loop(ctx, shutdown_rx));
        *active = Some(ActiveLoop { shutdown_tx, task });
    }

    /// Stop the polling loop and wait for it to exit. Idempotent; safe
    /// to call when already stopped. An in-flight probe is abandoned
    /// and its in-flight marker cleared.
    pub async fn stop(&self) {
        let mut active = self.active.lock().await;
        let Some(ActiveLoop { shutdown_tx, task }) = active.take() else {
            return;
        };

        let _ = shutdown_tx.send(true);
        if let Err(e) = task.await {
            warn!("probe loop task ended abnormally: {e}");
        }
    }

    /// Stop, then start again. Because `stop()` waits for the loop to
    /// exit, the new loop can never overlap the old one.
    pub async fn restart(&self) {
        self.stop().await;
        self.start().await;
    }
}

/// Clears the in-flight flag on drop, so it is released on every exit
/// path of a probe cycle, cancellation included.
struct InFlightGuard {
    state: Arc<Mutex<InFlight>>,
}

impl InFlightGuard {
    fn arm(state: &Arc<Mutex<InFlight>>) -> Self {
        {
            let mut in_flight = state.lock().expect("in-flight lock poisoned");
            in_flight.active = true;
            in_flight.since = Some(Instant::now());
        }
        Self {
            state: Arc::clone(state),
        }
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let mut in_flight = self.state.lock().expect("in-flight lock poisoned");
        in_flight.active = false;
        in_flight.since = None;
    }
}

/// The loop task. The first tick of a tokio interval completes
/// immediately, which gives the required probe-at-start behavior.
#[instrument(skip_all)]
async fn poll_loop(ctx: LoopContext, mut shutdown_rx: watch::Receiver<bool>) {
    debug!("probe loop started");

    let mut ticker = tokio::time::interval(ctx.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown_rx.changed() => break,
            _ = ticker.tick() => {
                if probe_cycle(&ctx, &mut shutdown_rx).await {
                    break;
                }
            }
        }
    }

    debug!("probe loop stopped");
}

/// One probe cycle. Returns true when shutdown was observed mid-probe.
async fn probe_cycle(ctx: &LoopContext, shutdown_rx: &mut watch::Receiver<bool>) -> bool {
    let (target, mode) = {
        let settings = ctx.settings.read().expect("settings lock poisoned");
        (settings.target.clone(), settings.mode)
    };
    let prober = match &ctx.prober_override {
        Some(prober) => Arc::clone(prober),
        None => mode.prober(),
    };

    let _guard = InFlightGuard::arm(&ctx.in_flight);
    trace!(%target, %mode, "probing");

    let outcome = tokio::select! {
        biased;
        _ = shutdown_rx.changed() => {
            // Probe abandoned; the guard clears the in-flight flag.
            return true;
        }
        outcome = prober.probe(&target, ctx.timeout) => outcome,
    };

    let sample = match outcome {
        Ok(sample) => {
            trace!(latency_ms = sample.latency_ms(), "probe succeeded");
            sample
        }
        Err(e) => {
            warn!(%target, "probe failed: {e}");
            Sample::failure(e.to_string())
        }
    };

    ctx.history.add(sample.clone());
    if ctx.result_tx.try_send(sample).is_err() {
        // Full or no consumer. The history remains the record.
        trace!("result notification dropped");
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn construction_normalizes_invalid_parameters() {
        let manager = Manager::new("  ", Duration::ZERO, Duration::ZERO, ProbeMode::Echo, 0);
        assert_eq!(manager.target(), DEFAULT_TARGET);
        assert_eq!(manager.interval, DEFAULT_INTERVAL);
        assert_eq!(manager.timeout, DEFAULT_TIMEOUT);
        assert_eq!(
            manager.history().capacity(),
            crate::history::DEFAULT_CAPACITY
        );
    }

    #[test]
    fn settings_are_mutable_but_guarded() {
        let manager = Manager::new(
            "example.com",
            DEFAULT_INTERVAL,
            DEFAULT_TIMEOUT,
            ProbeMode::Echo,
            8,
        );

        manager.set_target("10.0.0.1");
        manager.set_probe_mode(ProbeMode::Connect);
        assert_eq!(manager.target(), "10.0.0.1");
        assert_eq!(manager.probe_mode(), ProbeMode::Connect);

        // An empty target is rejected, keeping the previous value.
        manager.set_target("   ");
        assert_eq!(manager.target(), "10.0.0.1");
    }

    #[test]
    fn not_in_flight_before_start() {
        let manager = Manager::new(
            "example.com",
            DEFAULT_INTERVAL,
            DEFAULT_TIMEOUT,
            ProbeMode::Echo,
            8,
        );
        assert_eq!(manager.is_in_flight(), (false, Duration::ZERO));
    }

    #[tokio::test]
    async fn stop_without_start_is_a_no_op() {
        let manager = Manager::new(
            "example.com",
            DEFAULT_INTERVAL,
            DEFAULT_TIMEOUT,
            ProbeMode::Echo,
            8,
        );
        manager.stop().await;
        manager.stop().await;
    }

    #[test]
    fn results_receiver_can_only_be_taken_once() {
        let manager = Manager::new(
            "example.com",
            DEFAULT_INTERVAL,
            DEFAULT_TIMEOUT,
            ProbeMode::Echo,
            8,
        );
        assert!(manager.take_results().is_some());
        assert!(manager.take_results().is_none());
    }
}
