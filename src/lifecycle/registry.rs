//! Listener registry.
//!
//! Maps each configured listen address to the policy store its server
//! reads from. Built once at startup; the set of listeners never changes
//! afterwards, only the policies inside them.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;

use crate::config::RouterConfig;
use crate::observability::metrics;
use crate::security::{PolicyError, PolicyStore};

/// Error building the registry at startup.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("duplicate listen address '{0}'")]
    DuplicateListener(String),
    #[error("unable to load router config ({listen_addr}): {source}")]
    Policy {
        listen_addr: String,
        #[source]
        source: PolicyError,
    },
}

/// A listener whose policy update was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReloadFailure {
    pub listen_addr: String,
    pub error: String,
}

/// Per-listener outcome of a reload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReloadReport {
    /// Listeners whose policy was swapped.
    pub updated: Vec<String>,
    /// Listeners that kept their previous policy.
    pub failed: Vec<ReloadFailure>,
    /// Entries naming listeners that are not running.
    pub ignored: Vec<String>,
}

/// Listen address → policy store.
#[derive(Debug, Default)]
pub struct ListenerRegistry {
    listeners: BTreeMap<String, Arc<PolicyStore>>,
}

impl ListenerRegistry {
    /// Build one policy store per router. Duplicate addresses are fatal.
    pub fn from_config(routers: &[RouterConfig]) -> Result<Self, RegistryError> {
        let mut listeners = BTreeMap::new();

        for router in routers {
            if listeners.contains_key(&router.listen_addr) {
                return Err(RegistryError::DuplicateListener(router.listen_addr.clone()));
            }
            let store = PolicyStore::create(router).map_err(|source| RegistryError::Policy {
                listen_addr: router.listen_addr.clone(),
                source,
            })?;
            listeners.insert(router.listen_addr.clone(), Arc::new(store));
        }

        Ok(Self { listeners })
    }

    pub fn get(&self, listen_addr: &str) -> Option<&Arc<PolicyStore>> {
        self.listeners.get(listen_addr)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<PolicyStore>)> {
        self.listeners.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Refresh the policies of listeners that already exist.
    ///
    /// Unknown listeners are never started and missing ones are never
    /// stopped. A failure on one listener does not affect the others.
    pub fn apply(&self, routers: &[RouterConfig]) -> ReloadReport {
        let mut report = ReloadReport::default();

        for router in routers {
            let Some(store) = self.listeners.get(&router.listen_addr) else {
                tracing::debug!(listen_addr = %router.listen_addr, "Ignoring router that is not running");
                report.ignored.push(router.listen_addr.clone());
                continue;
            };

            match store.update(router) {
                Ok(()) => {
                    tracing::info!(listen_addr = %router.listen_addr, "Router configuration updated");
                    metrics::record_policy_reload(&router.listen_addr, "ok");
                    report.updated.push(router.listen_addr.clone());
                }
                Err(e) => {
                    tracing::warn!(listen_addr = %router.listen_addr, error = %e, "Unable to update router configuration");
                    metrics::record_policy_reload(&router.listen_addr, "error");
                    report.failed.push(ReloadFailure {
                        listen_addr: router.listen_addr.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        report
    }
}
