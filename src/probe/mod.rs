//! Probe strategies
//!
//! A prober performs exactly one reachability check against a target and
//! reports the outcome. Two strategies exist, selected by configuration
//! value, never by runtime type inspection:
//!
//! - [`EchoProber`]: one ICMP echo request (unprivileged)
//! - [`ConnectProber`]: a TCP handshake to port 80
//!
//! Both are bounded by the caller-supplied timeout, and both abort
//! promptly when their future is dropped, which is how the manager
//! cancels an in-flight probe on shutdown.

mod connect;
mod echo;

pub use connect::ConnectProber;
pub use echo::EchoProber;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::history::Sample;

/// Closed set of probe strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeMode {
    /// ICMP echo request.
    #[default]
    Echo,

    /// TCP handshake to a well-known port.
    Connect,
}

impl ProbeMode {
    /// Instantiate the prober for this mode.
    pub fn prober(self) -> Arc<dyn Prober> {
        match self {
            ProbeMode::Echo => Arc::new(EchoProber),
            ProbeMode::Connect => Arc::new(ConnectProber::default()),
        }
    }
}

impl fmt::Display for ProbeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeMode::Echo => write!(f, "echo"),
            ProbeMode::Connect => write!(f, "connect"),
        }
    }
}

impl FromStr for ProbeMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "echo" => Ok(ProbeMode::Echo),
            "connect" => Ok(ProbeMode::Connect),
            other => Err(format!("unknown probe mode '{other}' (expected 'echo' or 'connect')")),
        }
    }
}

/// Result of a single probe attempt. The manager turns an `Err` into a
/// failed [`Sample`]; errors never escape the polling loop.
pub type ProbeResult = Result<Sample, ProbeError>;

/// One reachability check against `target`, blocking the calling task
/// for at most `timeout`.
#[async_trait]
pub trait Prober: Send + Sync {
    async fn probe(&self, target: &str, timeout: Duration) -> ProbeResult;
}

/// Errors a probe attempt can produce. All of them are transient from
/// the manager's point of view; the next tick is the retry mechanism.
#[derive(Debug)]
pub enum ProbeError {
    /// The target name could not be resolved to an address.
    Resolution(String),

    /// No answer within the allotted timeout.
    Timeout(Duration),

    /// The network said no (unreachable, refused, socket error).
    Network(String),
}

impl fmt::Display for ProbeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeError::Resolution(msg) => write!(f, "resolution failed: {}", msg),
            ProbeError::Timeout(timeout) => write!(f, "timed out after {:?}", timeout),
            ProbeError::Network(msg) => write!(f, "probe failed: {}", msg),
        }
    }
}

impl std::error::Error for ProbeError {}
