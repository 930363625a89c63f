//! TCP connect probe

use std::net::Ipv6Addr;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::net::TcpStream;
use tracing::trace;

use super::{ProbeError, ProbeResult, Prober};
use crate::history::Sample;

/// Default port the connect probe dials.
pub const CONNECT_PORT: u16 = 80;

/// Measures the wall-clock time to complete a TCP handshake to a fixed
/// port on the target, then drops the connection immediately. Useful
/// where ICMP is filtered but the target serves HTTP.
#[derive(Debug, Clone, Copy)]
pub struct ConnectProber {
    port: u16,
}

impl ConnectProber {
    /// A prober dialing an explicit port instead of [`CONNECT_PORT`].
    pub fn with_port(port: u16) -> Self {
        Self { port }
    }
}

impl Default for ConnectProber {
    fn default() -> Self {
        Self { port: CONNECT_PORT }
    }
}

#[async_trait]
impl Prober for ConnectProber {
    async fn probe(&self, target: &str, timeout: Duration) -> ProbeResult {
        let address = join_host_port(target, self.port);
        trace!(%address, "dialing");

        let start = Instant::now();
        match tokio::time::timeout(timeout, TcpStream::connect(&address)).await {
            Ok(Ok(stream)) => {
                let latency = start.elapsed();
                drop(stream);
                Ok(Sample::ok(latency))
            }
            Ok(Err(e)) => Err(ProbeError::Network(format!("{address}: {e}"))),
            Err(_) => Err(ProbeError::Timeout(timeout)),
        }
    }
}

/// IPv6 literals need brackets before a port can be appended.
fn join_host_port(host: &str, port: u16) -> String {
    if host.parse::<Ipv6Addr>().is_ok() {
        format!("[{host}]:{port}")
    } else {
        format!("{host}:{port}")
    }
}
