//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Reject duplicate listen addresses
//! - Check every address, URL and CIDR block parses
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted at startup; reloads validate per listener

use std::collections::HashSet;

use crate::config::schema::{parse_listen_addr, GatewayConfig};
use crate::routing::source::table_endpoint;
use crate::security::{Policy, PolicyError};

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("duplicate listen address '{0}'")]
    DuplicateListener(String),
    #[error("invalid listen address '{0}'")]
    InvalidListenAddr(String),
    #[error("router '{listen_addr}': {source}")]
    InvalidPolicy {
        listen_addr: String,
        #[source]
        source: PolicyError,
    },
    #[error("invalid control address '{0}'")]
    InvalidControlAddr(String),
    #[error("invalid metrics address '{0}'")]
    InvalidMetricsAddr(String),
    #[error("invalid remote config path '{0}'")]
    InvalidRemoteSource(String),
    #[error("sync.min_delay_secs must be greater than zero")]
    ZeroSyncDelay,
    #[error("sync.max_body_bytes must be greater than zero")]
    ZeroBodyLimit,
}

/// Validate a parsed configuration.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let mut seen = HashSet::new();

    for router in &config.routers {
        if !seen.insert(router.listen_addr.as_str()) {
            errors.push(ValidationError::DuplicateListener(router.listen_addr.clone()));
        }
        if parse_listen_addr(&router.listen_addr).is_none() {
            errors.push(ValidationError::InvalidListenAddr(router.listen_addr.clone()));
        }
        if let Err(source) = Policy::from_template(router) {
            errors.push(ValidationError::InvalidPolicy {
                listen_addr: router.listen_addr.clone(),
                source,
            });
        }
    }

    if let Some(control) = &config.control {
        if parse_listen_addr(control).is_none() {
            errors.push(ValidationError::InvalidControlAddr(control.clone()));
        }
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<std::net::SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidMetricsAddr(
            config.observability.metrics_address.clone(),
        ));
    }

    if let Some(remote) = &config.remote_config_path {
        if table_endpoint(remote).is_err() {
            errors.push(ValidationError::InvalidRemoteSource(remote.clone()));
        }
    }

    if config.sync.min_delay_secs == 0 {
        errors.push(ValidationError::ZeroSyncDelay);
    }
    if config.sync.max_body_bytes == 0 {
        errors.push(ValidationError::ZeroBodyLimit);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RouterConfig;

    fn router(addr: &str, blocks: &[&str]) -> RouterConfig {
        RouterConfig {
            allowed_targets: blocks.iter().map(|b| b.to_string()).collect(),
            ..RouterConfig::new(addr)
        }
    }

    #[test]
    fn valid_config_passes() {
        let config = GatewayConfig {
            remote_config_path: Some("http://config.internal".into()),
            control: Some("127.0.0.1:9000".into()),
            routers: vec![router("127.0.0.1:8080", &["10.0.0.0/8"]), router(":8081", &[])],
            ..Default::default()
        };
        assert_eq!(validate_config(&config), Ok(()));
    }

    #[test]
    fn duplicate_listeners_are_rejected() {
        let config = GatewayConfig {
            routers: vec![router("127.0.0.1:8080", &[]), router("127.0.0.1:8080", &[])],
            ..Default::default()
        };
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![ValidationError::DuplicateListener("127.0.0.1:8080".into())]
        );
    }

    #[test]
    fn all_errors_are_reported() {
        let mut config = GatewayConfig {
            remote_config_path: Some("not a url".into()),
            control: Some("nowhere".into()),
            routers: vec![router("bogus", &["10.0.0.0/99"])],
            ..Default::default()
        };
        config.sync.min_delay_secs = 0;

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 5);
        assert!(errors.contains(&ValidationError::InvalidListenAddr("bogus".into())));
        assert!(errors.contains(&ValidationError::InvalidControlAddr("nowhere".into())));
        assert!(errors.contains(&ValidationError::InvalidRemoteSource("not a url".into())));
        assert!(errors.contains(&ValidationError::ZeroSyncDelay));
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::InvalidPolicy { listen_addr, .. } if listen_addr == "bogus")));
    }
}
