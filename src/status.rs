//! Status derivation
//!
//! Pure mapping from recent samples (plus the elapsed time of an
//! in-flight probe, if any) to a discrete [`StatusLevel`] and to the
//! normalized vertical geometry of a sparkline. No I/O and no shared
//! state - callers pass in a window copied out of the history.

use std::time::Duration;

use crate::history::Sample;

/// Mean latency below this is considered unremarkable.
pub const ELEVATED_THRESHOLD_MS: f64 = 100.0;

/// Mean latency at or above this is considered high.
pub const HIGH_THRESHOLD_MS: f64 = 300.0;

/// Number of most-recent samples the level derivation looks at.
pub const LEVEL_WINDOW: usize = 5;

/// Number of most-recent samples plotted in the sparkline.
pub const PLOT_WINDOW: usize = 20;

/// The vertical scale never showcases latencies below this ceiling;
/// keeps a quiet link from rendering as a dramatic full-height line.
const SCALE_FLOOR_MS: f64 = 300.0;

/// Discrete classification of recent network health.
///
/// Ordered from best to worst; `Failed` dominates any latency-derived
/// level as soon as one failure is present in the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum StatusLevel {
    Neutral,
    Elevated,
    High,
    Failed,
}

/// Derive the status level from the most recent samples.
///
/// `window` is expected to be the output of `History::latest(LEVEL_WINDOW)`
/// (order does not matter for the mean). `in_flight` is the elapsed time
/// of a probe currently under way; it is blended into the mean as if it
/// were one more measurement, so a probe that has been hanging for a
/// while pushes the level up before it even resolves.
pub fn derive_level(window: &[Sample], in_flight: Option<Duration>) -> StatusLevel {
    if window.is_empty() {
        return StatusLevel::Neutral;
    }
    if window.iter().any(|s| s.failed) {
        return StatusLevel::Failed;
    }

    let mut sum_ms = in_flight.map_or(0.0, |d| d.as_secs_f64() * 1000.0);
    for sample in window {
        sum_ms += sample.latency_ms();
    }

    let avg = sum_ms / window.len() as f64;
    if avg >= HIGH_THRESHOLD_MS {
        StatusLevel::High
    } else if avg >= ELEVATED_THRESHOLD_MS {
        StatusLevel::Elevated
    } else {
        StatusLevel::Neutral
    }
}

/// One plotted point: a normalized vertical position in `0.0..=1.0`
/// where `0.0` is best (no latency) and `1.0` is worst. Failed samples
/// always sit at `1.0` and carry the `failed` marker so renderers can
/// draw them distinctly instead of interpolating them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SparkPoint {
    pub position: f64,
    pub failed: bool,
}

/// Map a chronological sample window onto sparkline geometry.
///
/// `samples` must be oldest-first (the output of `History::snapshot()`);
/// only the last [`PLOT_WINDOW`] entries are plotted. The vertical scale
/// is dynamic: its ceiling is the maximum observed latency in the
/// window, floored at 300ms, and positions are clamped so an outlier
/// never overflows the drawable range.
pub fn sparkline(samples: &[Sample]) -> Vec<SparkPoint> {
    let window = if samples.len() > PLOT_WINDOW {
        &samples[samples.len() - PLOT_WINDOW..]
    } else {
        samples
    };

    let mut ceiling_ms = SCALE_FLOOR_MS;
    for sample in window {
        if !sample.failed && sample.latency_ms() > ceiling_ms {
            ceiling_ms = sample.latency_ms();
        }
    }

    window
        .iter()
        .map(|sample| {
            if sample.failed {
                SparkPoint {
                    position: 1.0,
                    failed: true,
                }
            } else {
                SparkPoint {
                    position: (sample.latency_ms() / ceiling_ms).min(1.0),
                    failed: false,
                }
            }
        })
        .collect()
}
