//! ICMP echo probe

use std::net::IpAddr;
use std::time::Duration;

use async_trait::async_trait;
use surge_ping::{Client, Config, ICMP, PingIdentifier, PingSequence, SurgeError};
use tokio::net::lookup_host;
use tracing::trace;

use super::{ProbeError, ProbeResult, Prober};
use crate::history::Sample;

const PAYLOAD: [u8; 32] = [0; 32];

/// Sends a single ICMP echo request and waits for the reply. Uses the
/// unprivileged datagram ICMP socket type, so no elevated privileges
/// are required. Latency is the round-trip time reported by the ICMP
/// layer for the reply packet.
#[derive(Debug, Default, Clone, Copy)]
pub struct EchoProber;

#[async_trait]
impl Prober for EchoProber {
    async fn probe(&self, target: &str, timeout: Duration) -> ProbeResult {
        let addr = resolve(target).await?;
        trace!(%target, %addr, "sending echo request");

        let config = match addr {
            IpAddr::V4(_) => Config::default(),
            IpAddr::V6(_) => Config::builder().kind(ICMP::V6).build(),
        };
        let client = Client::new(&config).map_err(|e| ProbeError::Network(e.to_string()))?;

        let mut pinger = client
            .pinger(addr, PingIdentifier(std::process::id() as u16))
            .await;
        pinger.timeout(timeout);

        match pinger.ping(PingSequence(0), &PAYLOAD).await {
            Ok((_reply, rtt)) => Ok(Sample::ok(rtt)),
            Err(SurgeError::Timeout { .. }) => Err(ProbeError::Timeout(timeout)),
            Err(e) => Err(ProbeError::Network(e.to_string())),
        }
    }
}

/// Resolve a host name or literal address to the first usable address.
async fn resolve(target: &str) -> Result<IpAddr, ProbeError> {
    if let Ok(addr) = target.parse::<IpAddr>() {
        return Ok(addr);
    }

    let mut addrs = lookup_host((target, 0))
        .await
        .map_err(|e| ProbeError::Resolution(format!("{target}: {e}")))?;

    addrs
        .next()
        .map(|sock| sock.ip())
        .ok_or_else(|| ProbeError::Resolution(format!("{target}: no addresses found")))
}
