//! Request resolution and enforcement.
//!
//! # Per-request flow
//! ```text
//! nudge sync → snapshot policy → first host label
//!     → table lookup ─┐
//!     → literal decode ┴→ address | Unresolvable
//!     → allow-list     → Forward | AccessDenied
//!     → rewrite scheme, authority, Host, User-Agent
//! ```
//!
//! # Design Decisions
//! - Routing is address based: the outbound authority is the resolved IP,
//!   never a hostname that would need another DNS lookup
//! - The policy is read once so a whole decision sees one snapshot
//! - Method, path, query and body are never touched here

use std::net::{IpAddr, Ipv6Addr};
use std::sync::Arc;

use axum::body::Body;
use axum::http::header::{HeaderValue, HOST, USER_AGENT};
use axum::http::uri::{PathAndQuery, Scheme};
use axum::http::{Request, Uri};

use crate::routing::SyncManager;
use crate::security::PolicyStore;

/// How an address was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Routing table entry.
    Table,
    /// Address spelled out in the label, e.g. `10-0-0-5`.
    Literal,
}

/// An allowed forwarding decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Forward {
    pub name: String,
    pub address: IpAddr,
    pub resolution: Resolution,
    pub scheme: Scheme,
    pub port: Option<u16>,
}

impl Forward {
    /// Outbound authority: the address, bracketed for IPv6, plus the port if set.
    pub fn authority(&self) -> String {
        let host = match self.address {
            IpAddr::V4(v4) => v4.to_string(),
            IpAddr::V6(v6) => format!("[{v6}]"),
        };
        match self.port {
            Some(port) => format!("{host}:{port}"),
            None => host,
        }
    }
}

/// Why a request is not forwarded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Denial {
    #[error("request carries no virtual host")]
    MissingHost,
    #[error("unable to resolve '{name}'")]
    Unresolvable { name: String },
    #[error("access to {address} ('{name}') denied")]
    AccessDenied { name: String, address: IpAddr },
    #[error("cannot build outbound URI for {address}")]
    InvalidTarget { address: IpAddr },
}

impl Denial {
    /// Short label for logs and metrics.
    pub fn outcome(&self) -> &'static str {
        match self {
            Denial::MissingHost => "missing_host",
            Denial::Unresolvable { .. } => "unresolvable",
            Denial::AccessDenied { .. } => "denied",
            Denial::InvalidTarget { .. } => "invalid_target",
        }
    }
}

/// Strip an optional `:port` and return the first dot-separated label.
///
/// Bracketed IPv6 hosts are returned whole; they never name a target.
pub fn target_name(virtual_host: &str) -> &str {
    let host = if virtual_host.starts_with('[') {
        virtual_host
    } else {
        match virtual_host.rsplit_once(':') {
            Some((host, port)) if !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()) => host,
            _ => virtual_host,
        }
    };
    host.split('.').next().unwrap_or(host)
}

/// Decode an address spelled inside a label.
///
/// `10-0-0-5` decodes to `10.0.0.5`; `fd00--1` decodes to `fd00::1`.
pub fn decode_literal(label: &str) -> Option<IpAddr> {
    if let Ok(ip) = label.replace('-', ".").parse::<IpAddr>() {
        return Some(ip);
    }
    label
        .replace('-', ":")
        .parse::<Ipv6Addr>()
        .ok()
        .map(IpAddr::V6)
}

/// Resolve `name` through the table first, then as a literal.
pub fn resolve(name: &str, lookup: impl Fn(&str) -> Option<IpAddr>) -> Option<(IpAddr, Resolution)> {
    if let Some(ip) = lookup(name) {
        return Some((ip, Resolution::Table));
    }
    decode_literal(name).map(|ip| (ip, Resolution::Literal))
}

/// Virtual host of a request: the Host header, else the URI authority.
pub fn virtual_host<B>(req: &Request<B>) -> Option<&str> {
    req.headers()
        .get(HOST)
        .and_then(|h| h.to_str().ok())
        .or_else(|| req.uri().authority().map(|a| a.as_str()))
        .filter(|h| !h.is_empty())
}

/// Turns inbound requests into authorized outbound ones for one listener.
#[derive(Debug, Clone)]
pub struct Director {
    sync: SyncManager,
    policy: Arc<PolicyStore>,
}

impl Director {
    pub fn new(sync: SyncManager, policy: Arc<PolicyStore>) -> Self {
        Self { sync, policy }
    }

    pub fn listen_addr(&self) -> &str {
        self.policy.listen_addr()
    }

    /// Decide where a request for `virtual_host` goes, if anywhere.
    pub fn decide(&self, virtual_host: &str) -> Result<Forward, Denial> {
        self.sync.request_refresh();
        let policy = self.policy.current();

        let name = target_name(virtual_host);
        let (address, resolution) = resolve(name, |n| self.sync.lookup(n)).ok_or_else(|| {
            Denial::Unresolvable {
                name: name.to_string(),
            }
        })?;

        if !policy.permits(address) {
            return Err(Denial::AccessDenied {
                name: name.to_string(),
                address,
            });
        }

        Ok(Forward {
            name: name.to_string(),
            address,
            resolution,
            scheme: policy.scheme(),
            port: policy.backend_port(),
        })
    }

    /// Decide and rewrite a request for forwarding.
    pub fn direct(&self, req: Request<Body>) -> Result<Request<Body>, Denial> {
        let Some(host) = virtual_host(&req).map(str::to_owned) else {
            // Every inbound request nudges the sync, even one we reject here.
            self.sync.request_refresh();
            tracing::warn!(listen_addr = %self.listen_addr(), "Request without virtual host rejected");
            return Err(Denial::MissingHost);
        };

        let forward = match self.decide(&host) {
            Ok(forward) => forward,
            Err(denial) => {
                tracing::warn!(
                    listen_addr = %self.listen_addr(),
                    host = %host,
                    outcome = denial.outcome(),
                    reason = %denial,
                    "Request not forwarded"
                );
                return Err(denial);
            }
        };

        tracing::debug!(
            listen_addr = %self.listen_addr(),
            host = %host,
            address = %forward.address,
            resolution = ?forward.resolution,
            "Forwarding request"
        );

        rewrite(req, &host, &forward)
    }
}

/// Point `req` at the resolved backend, preserving everything else.
fn rewrite(req: Request<Body>, host: &str, forward: &Forward) -> Result<Request<Body>, Denial> {
    let invalid = || Denial::InvalidTarget {
        address: forward.address,
    };
    let (mut parts, body) = req.into_parts();

    let path_and_query = parts
        .uri
        .path_and_query()
        .cloned()
        .unwrap_or_else(|| PathAndQuery::from_static("/"));
    parts.uri = Uri::builder()
        .scheme(forward.scheme.clone())
        .authority(forward.authority())
        .path_and_query(path_and_query)
        .build()
        .map_err(|_| invalid())?;

    if !parts.headers.contains_key(HOST) {
        let value = HeaderValue::from_str(host).map_err(|_| invalid())?;
        parts.headers.insert(HOST, value);
    }
    if !parts.headers.contains_key(USER_AGENT) {
        parts.headers.insert(USER_AGENT, HeaderValue::from_static(""));
    }

    Ok(Request::from_parts(parts, body))
}
