//! Error taxonomy (§7), realized with `thiserror` the way the teacher's
//! `HeimdallError` does rather than hand-rolled `Display` impls.

use thiserror::Error;

use crate::dns::CodecError;

/// Errors a single forwarder attempt or pipeline step can raise. These
/// never escape a query: the pipeline folds them into a DNS response
/// code and, for `ErrConfig`, this type is never constructed at all
/// (config errors are their own type, see [`ConfigError`]).
#[derive(Debug, Error, Clone)]
pub enum DnsError {
    #[error("malformed request")]
    BadRequest,

    #[error("no upstream configured for route")]
    NoUpstream,

    #[error("upstream query timed out")]
    UpstreamTimeout,

    #[error("upstream transport error: {0}")]
    UpstreamTransport(String),

    #[error("all upstreams failed")]
    AllUpstreamsFailed,

    #[error("response was truncated")]
    Truncated,

    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
}

impl DnsError {
    /// Maps to the DNS response code the pipeline should send, for the
    /// variants that are ever surfaced to a client (§7 propagation rule:
    /// pipeline errors never escape as anything but an rcode).
    pub fn to_rcode(&self) -> crate::dns::DnsResponseCode {
        use crate::dns::DnsResponseCode::*;
        match self {
            DnsError::BadRequest | DnsError::Codec(_) => FormErr,
            DnsError::NoUpstream
            | DnsError::UpstreamTimeout
            | DnsError::UpstreamTransport(_)
            | DnsError::AllUpstreamsFailed => ServFail,
            DnsError::Truncated => ServFail,
        }
    }
}

#[derive(Debug, Error, Clone)]
pub enum ConfigError {
    #[error("invalid bind address {0}: {1}")]
    InvalidBindAddress(String, String),

    #[error("invalid upstream descriptor {0}")]
    InvalidUpstream(String),

    #[error("cache.min_ttl ({0}) must be <= cache.max_ttl ({1})")]
    InvalidTtlRange(u32, u32),

    #[error("subscriptions.max_concurrent must be >= 1")]
    InvalidMaxConcurrent,

    #[error("invalid integer value for {0}: {1}")]
    ParseError(String, String),
}

#[derive(Debug, Error, Clone)]
pub enum SubscriptionError {
    #[error("fetch failed: {0}")]
    Fetch(String),

    #[error("parse failed: {0}")]
    Parse(String),
}
