//! # Origin Identity Resolution
//!
//! Derives a single stable identifier for the network origin of a request
//! from whatever the transport hands us. Precedence is deterministic:
//! forwarding header first, then the direct peer address, then a literal
//! `"unknown"` sentinel.
//!
//! No IP-syntax validation happens here on purpose — the value is an opaque
//! fraud-tracking key, nothing more. A client that controls its own
//! `X-Forwarded-For` header can evade tracking entirely; that is a known,
//! accepted weakness of the model. Deployments sitting behind a verified
//! proxy chain can swap in their own [`OriginResolver`] without touching
//! any fraud logic.

use std::net::IpAddr;

use crate::model::UNKNOWN_HOUSE;

/// Sentinel origin identifier for requests whose origin could not be
/// determined at all. Shares the literal with the unattributable-household
/// sentinel; both mean "we genuinely don't know".
pub const UNKNOWN_ORIGIN: &str = UNKNOWN_HOUSE;

/// Capability seam for turning transport-level facts into a fraud-tracking
/// key. Implementations must be cheap and infallible — every single vote
/// request goes through here.
pub trait OriginResolver: Send + Sync {
    /// Resolves an origin identifier from the request's forwarding header
    /// (if any) and the transport-level peer address (if known).
    fn resolve(&self, forwarded: Option<&str>, peer: Option<IpAddr>) -> String;
}

/// Default resolver: trusts the first entry of the forwarding header.
///
/// `X-Forwarded-For` is a comma-separated chain with the original client
/// first; intermediate proxies append themselves. We take the first
/// non-empty entry and treat it as opaque.
#[derive(Debug, Default, Clone, Copy)]
pub struct ForwardedHeaderResolver;

impl OriginResolver for ForwardedHeaderResolver {
    fn resolve(&self, forwarded: Option<&str>, peer: Option<IpAddr>) -> String {
        if let Some(header) = forwarded {
            if let Some(first) = header.split(',').map(str::trim).find(|s| !s.is_empty()) {
                return first.to_string();
            }
        }
        match peer {
            Some(addr) => addr.to_string(),
            None => UNKNOWN_ORIGIN.to_string(),
        }
    }
}
