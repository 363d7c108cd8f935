//! Per-listener access policy with atomic hot-swap.
//!
//! A [`Policy`] is an immutable snapshot built from a [`RouterConfig`]
//! template. The [`PolicyStore`] holds the live snapshot behind an
//! `ArcSwap`: readers take a cheap `Arc` clone, writers build a complete
//! replacement and publish it with one store. Every CIDR block is parsed
//! before anything is published, so a failed update leaves the current
//! snapshot untouched.

use std::net::IpAddr;
use std::sync::Arc;

use arc_swap::ArcSwap;
use axum::http::uri::Scheme;
use serde::Serialize;

use crate::config::RouterConfig;
use crate::security::cidr::{CidrBlock, CidrParseError};

/// Error raised when a policy template is rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PolicyError {
    #[error("invalid allowed target '{block}': {source}")]
    InvalidBlock {
        block: String,
        #[source]
        source: CidrParseError,
    },
}

/// Immutable access-control and backend settings for one listener.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Policy {
    allowed_blocks: Vec<CidrBlock>,
    allow_arbitrary_target: bool,
    backend_tls: bool,
    backend_port: Option<u16>,
}

impl Policy {
    /// Parse a template into a snapshot. Fails on the first malformed block.
    pub fn from_template(template: &RouterConfig) -> Result<Self, PolicyError> {
        let allowed_blocks = template
            .allowed_targets
            .iter()
            .map(|block| {
                block.parse::<CidrBlock>().map_err(|source| PolicyError::InvalidBlock {
                    block: block.clone(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            allowed_blocks,
            allow_arbitrary_target: template.allow_arbitrary_target,
            backend_tls: template.backend_https,
            backend_port: template.backend_port,
        })
    }

    /// Whether a request resolved to `ip` may be forwarded.
    pub fn permits(&self, ip: IpAddr) -> bool {
        self.allow_arbitrary_target || self.allowed_blocks.iter().any(|b| b.contains(ip))
    }

    pub fn allowed_blocks(&self) -> &[CidrBlock] {
        &self.allowed_blocks
    }

    pub fn allow_arbitrary_target(&self) -> bool {
        self.allow_arbitrary_target
    }

    pub fn backend_tls(&self) -> bool {
        self.backend_tls
    }

    pub fn backend_port(&self) -> Option<u16> {
        self.backend_port
    }

    /// Outbound scheme.
    pub fn scheme(&self) -> Scheme {
        if self.backend_tls {
            Scheme::HTTPS
        } else {
            Scheme::HTTP
        }
    }
}

/// Holds the live policy of one listener.
#[derive(Debug)]
pub struct PolicyStore {
    listen_addr: String,
    current: ArcSwap<Policy>,
}

impl PolicyStore {
    /// Validate the template and build the initial store.
    pub fn create(template: &RouterConfig) -> Result<Self, PolicyError> {
        let policy = Policy::from_template(template)?;
        Ok(Self {
            listen_addr: template.listen_addr.clone(),
            current: ArcSwap::from_pointee(policy),
        })
    }

    /// Replace the policy with one built from `template`.
    ///
    /// On error the previous snapshot stays in place.
    pub fn update(&self, template: &RouterConfig) -> Result<(), PolicyError> {
        let policy = Policy::from_template(template)?;
        self.current.store(Arc::new(policy));
        tracing::debug!(listen_addr = %self.listen_addr, "Policy snapshot swapped");
        Ok(())
    }

    /// Current snapshot. Never blocks.
    pub fn current(&self) -> Arc<Policy> {
        self.current.load_full()
    }

    pub fn listen_addr(&self) -> &str {
        &self.listen_addr
    }
}
