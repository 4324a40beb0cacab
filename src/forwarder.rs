//! Forwarder (component D). Grounded on the teacher's
//! `DnsResolver::send_query_with_timeout` (UDP-first, TCP-on-truncation
//! against the *same* upstream) and `query_upstream`'s per-upstream retry
//! loop, but tightened per spec: a non-nil response is not automatically
//! success — only NOERROR-with-answers or NXDOMAIN counts, so SERVFAIL
//! falls through to the next upstream instead of being treated as done.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU16, Ordering};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpStream, UdpSocket};
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::dns::{DnsPacket, DnsResponseCode};
use crate::error::DnsError;

static NEXT_TXID: AtomicU16 = AtomicU16::new(1);

fn fresh_txid() -> u16 {
    NEXT_TXID.fetch_add(1, Ordering::Relaxed)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Udp,
    Tcp,
    Tls,
    Https,
}

impl Scheme {
    /// `tls://` and `https://` force TCP transport (§3).
    fn forces_tcp(self) -> bool {
        matches!(self, Scheme::Tcp | Scheme::Tls | Scheme::Https)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Upstream {
    pub address: SocketAddr,
    pub scheme: Scheme,
}

impl Upstream {
    pub fn parse(spec: &str) -> Result<Self, String> {
        let (scheme, rest) = match spec.split_once("://") {
            Some(("udp", rest)) => (Scheme::Udp, rest),
            Some(("tcp", rest)) => (Scheme::Tcp, rest),
            Some(("tls", rest)) => (Scheme::Tls, rest),
            Some(("https", rest)) => (Scheme::Https, rest),
            Some((other, _)) => return Err(format!("unknown upstream scheme {other}")),
            None => (Scheme::Udp, spec),
        };
        let address = rest
            .parse::<SocketAddr>()
            .map_err(|e| format!("invalid upstream address {rest}: {e}"))?;
        Ok(Upstream { address, scheme })
    }
}

pub type UpstreamPool = Vec<Upstream>;

pub struct Forwarder {
    pub per_attempt_timeout: Duration,
}

impl Default for Forwarder {
    fn default() -> Self {
        Self {
            per_attempt_timeout: Duration::from_secs(3),
        }
    }
}

impl Forwarder {
    pub fn new(per_attempt_timeout: Duration) -> Self {
        Self { per_attempt_timeout }
    }

    /// Tries each upstream in order, returning the first usable response.
    /// `budget` bounds the whole call; each attempt gets
    /// `min(remaining_budget, per_attempt_timeout)`.
    pub async fn forward(
        &self,
        query: &DnsPacket,
        upstreams: &[Upstream],
        budget: Duration,
    ) -> Result<DnsPacket, DnsError> {
        if upstreams.is_empty() {
            return Err(DnsError::NoUpstream);
        }

        let deadline = tokio::time::Instant::now() + budget;
        let mut last_err = DnsError::AllUpstreamsFailed;

        for upstream in upstreams {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                return Err(DnsError::UpstreamTimeout);
            }
            let attempt_budget = remaining.min(self.per_attempt_timeout);

            match self.try_upstream(query, upstream, attempt_budget).await {
                Ok(response) => return Ok(response),
                Err(err) => {
                    debug!(upstream = %upstream.address, error = %err, "upstream attempt failed, trying next");
                    last_err = err;
                }
            }
        }

        Err(last_err)
    }

    async fn try_upstream(
        &self,
        query: &DnsPacket,
        upstream: &Upstream,
        attempt_budget: Duration,
    ) -> Result<DnsPacket, DnsError> {
        let mut attempt_query = query.clone();
        attempt_query.header.id = fresh_txid();

        let response = if upstream.scheme.forces_tcp() {
            self.query_tcp(&attempt_query, upstream.address, attempt_budget)
                .await?
        } else {
            let udp_response = self
                .query_udp(&attempt_query, upstream.address, attempt_budget)
                .await?;
            if udp_response.header.tc {
                // UDP response truncated: MUST retry same upstream over TCP.
                self.query_tcp(&attempt_query, upstream.address, attempt_budget)
                    .await?
            } else {
                udp_response
            }
        };

        if response.header.id != attempt_query.header.id {
            return Err(DnsError::UpstreamTransport("transaction id mismatch".into()));
        }

        if is_usable(&response) {
            Ok(response)
        } else {
            warn!(rcode = ?response.header.rcode(), upstream = %upstream.address, "non-usable upstream response");
            Err(DnsError::UpstreamTransport(format!(
                "rcode {:?} not usable",
                response.header.rcode()
            )))
        }
    }

    async fn query_udp(
        &self,
        query: &DnsPacket,
        addr: SocketAddr,
        budget: Duration,
    ) -> Result<DnsPacket, DnsError> {
        let fut = async {
            let local: SocketAddr = if addr.is_ipv4() {
                "0.0.0.0:0".parse().unwrap()
            } else {
                "[::]:0".parse().unwrap()
            };
            let socket = UdpSocket::bind(local)
                .await
                .map_err(|e| DnsError::UpstreamTransport(e.to_string()))?;
            socket
                .connect(addr)
                .await
                .map_err(|e| DnsError::UpstreamTransport(e.to_string()))?;
            socket
                .send(&query.to_wire())
                .await
                .map_err(|e| DnsError::UpstreamTransport(e.to_string()))?;
            let mut buf = vec![0u8; 65535];
            let len = socket
                .recv(&mut buf)
                .await
                .map_err(|e| DnsError::UpstreamTransport(e.to_string()))?;
            DnsPacket::from_wire(&buf[..len]).map_err(DnsError::from)
        };
        timeout(budget, fut).await.map_err(|_| DnsError::UpstreamTimeout)?
    }

    async fn query_tcp(
        &self,
        query: &DnsPacket,
        addr: SocketAddr,
        budget: Duration,
    ) -> Result<DnsPacket, DnsError> {
        let fut = async {
            let mut stream = TcpStream::connect(addr)
                .await
                .map_err(|e| DnsError::UpstreamTransport(e.to_string()))?;
            let bytes = query.to_wire();
            let len = bytes.len() as u16;
            stream
                .write_all(&len.to_be_bytes())
                .await
                .map_err(|e| DnsError::UpstreamTransport(e.to_string()))?;
            stream
                .write_all(&bytes)
                .await
                .map_err(|e| DnsError::UpstreamTransport(e.to_string()))?;
            stream.flush().await.map_err(|e| DnsError::UpstreamTransport(e.to_string()))?;

            let mut len_buf = [0u8; 2];
            stream
                .read_exact(&mut len_buf)
                .await
                .map_err(|e| DnsError::UpstreamTransport(e.to_string()))?;
            let resp_len = u16::from_be_bytes(len_buf) as usize;
            let mut resp_buf = vec![0u8; resp_len];
            stream
                .read_exact(&mut resp_buf)
                .await
                .map_err(|e| DnsError::UpstreamTransport(e.to_string()))?;
            DnsPacket::from_wire(&resp_buf).map_err(DnsError::from)
        };
        timeout(budget, fut).await.map_err(|_| DnsError::UpstreamTimeout)?
    }
}

/// A usable response: NOERROR with >=1 answer, or authoritative NXDOMAIN.
/// SERVFAIL and everything else falls through to the next upstream.
fn is_usable(response: &DnsPacket) -> bool {
    match response.header.rcode() {
        DnsResponseCode::NoError => !response.answers.is_empty(),
        DnsResponseCode::NxDomain => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_scheme_and_defaults_to_udp() {
        let u = Upstream::parse("1.1.1.1:53").unwrap();
        assert_eq!(u.scheme, Scheme::Udp);
        let u = Upstream::parse("tcp://8.8.8.8:53").unwrap();
        assert_eq!(u.scheme, Scheme::Tcp);
        let u = Upstream::parse("tls://1.0.0.1:853").unwrap();
        assert!(u.scheme.forces_tcp());
    }

    #[test]
    fn rejects_unknown_scheme() {
        assert!(Upstream::parse("quic://1.1.1.1:53").is_err());
    }

    #[test]
    fn servfail_is_not_usable_but_nxdomain_is() {
        use crate::dns::DnsHeader;
        let mut servfail = DnsPacket::new(DnsHeader::default());
        servfail.header.set_rcode(DnsResponseCode::ServFail);
        assert!(!is_usable(&servfail));

        let mut nxdomain = DnsPacket::new(DnsHeader::default());
        nxdomain.header.set_rcode(DnsResponseCode::NxDomain);
        assert!(is_usable(&nxdomain));
    }
}
