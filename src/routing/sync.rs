//! Background synchronization of the routing table.
//!
//! # Responsibilities
//! - Fetch the table from the remote source and publish it atomically
//! - Rate-limit fetches to one per minimum delay window
//! - Coalesce refresh requests arriving while a fetch or delay is pending
//!
//! # Loop
//! ```text
//! fetch → validate → publish → sleep(min_delay) → wait for signal → fetch ...
//! ```
//! The signal slot has capacity one: extra requests while a signal is
//! already pending are dropped, so any burst collapses into one fetch.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use crate::config::SyncConfig;
use crate::observability::metrics;
use crate::routing::source::{SyncError, TableSource};
use crate::routing::table::{InvalidEntry, NameTable, SharedTable};

/// Tunables for the sync loop.
#[derive(Debug, Clone, Copy)]
pub struct SyncSettings {
    pub min_delay: Duration,
}

impl From<&SyncConfig> for SyncSettings {
    fn from(config: &SyncConfig) -> Self {
        Self {
            min_delay: Duration::from_secs(config.min_delay_secs),
        }
    }
}

/// Outcome of one successful sync cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    /// Entries in the published table.
    pub published: usize,
    /// Entries dropped because their address was not an IP literal.
    pub dropped: Vec<InvalidEntry>,
}

/// Handle used by request paths: nudge a refresh, read the table.
#[derive(Debug, Clone)]
pub struct SyncManager {
    table: Arc<SharedTable>,
    signal: mpsc::Sender<()>,
}

impl SyncManager {
    /// Create the handle and the worker that drives the sync loop.
    ///
    /// With `source == None` the worker never runs and the table stays empty.
    pub fn new(
        source: Option<Arc<dyn TableSource>>,
        settings: SyncSettings,
    ) -> (Self, SyncWorker) {
        let (signal, signals) = mpsc::channel(1);
        let table = Arc::new(SharedTable::default());

        let manager = Self {
            table: table.clone(),
            signal,
        };
        let worker = SyncWorker {
            table,
            source,
            signals,
            settings,
        };
        (manager, worker)
    }

    /// Ask for a refresh soon. Never blocks; a no-op if one is already pending.
    pub fn request_refresh(&self) {
        let _ = self.signal.try_send(());
    }

    pub fn lookup(&self, name: &str) -> Option<IpAddr> {
        self.table.lookup(name)
    }

    pub fn snapshot(&self) -> Arc<NameTable> {
        self.table.snapshot()
    }

    /// A handle over a fixed table, with no worker behind it.
    #[cfg(test)]
    pub(crate) fn preloaded(table: NameTable) -> Self {
        let (signal, _) = mpsc::channel(1);
        Self {
            table: Arc::new(SharedTable::new(table)),
            signal,
        }
    }

    /// Like [`SyncManager::preloaded`], but hands back the refresh receiver.
    #[cfg(test)]
    pub(crate) fn preloaded_with_signals(table: NameTable) -> (Self, mpsc::Receiver<()>) {
        let (signal, signals) = mpsc::channel(1);
        let manager = Self {
            table: Arc::new(SharedTable::new(table)),
            signal,
        };
        (manager, signals)
    }
}

/// Owns the receiving end of the refresh signal and the remote source.
#[derive(Debug)]
pub struct SyncWorker {
    table: Arc<SharedTable>,
    source: Option<Arc<dyn TableSource>>,
    signals: mpsc::Receiver<()>,
    settings: SyncSettings,
}

impl SyncWorker {
    /// Spawn the sync loop. Returns `None` when no remote source is configured.
    pub fn start(self, shutdown: broadcast::Receiver<()>) -> Option<JoinHandle<()>> {
        if self.source.is_none() {
            tracing::info!("No remote routing table source configured, sync disabled");
            return None;
        }
        Some(tokio::spawn(self.run(shutdown)))
    }

    async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(
            min_delay_secs = self.settings.min_delay.as_secs(),
            "Routing table sync starting"
        );

        loop {
            if let Err(e) = self.sync_once().await {
                tracing::warn!(error = %e, "Routing table sync failed, keeping previous table");
            }

            tokio::select! {
                _ = tokio::time::sleep(self.settings.min_delay) => {}
                _ = shutdown.recv() => break,
            }

            tokio::select! {
                signal = self.signals.recv() => {
                    if signal.is_none() {
                        break;
                    }
                }
                _ = shutdown.recv() => break,
            }
        }

        tracing::info!("Routing table sync stopped");
    }

    /// Run one fetch → validate → publish cycle.
    ///
    /// On error the current table is left as is.
    pub async fn sync_once(&self) -> Result<SyncReport, SyncError> {
        let Some(source) = &self.source else {
            return Ok(SyncReport {
                published: self.table.snapshot().len(),
                dropped: Vec::new(),
            });
        };

        let raw: HashMap<String, String> = match source.fetch().await {
            Ok(raw) => raw,
            Err(e) => {
                metrics::record_sync(e.kind());
                return Err(e);
            }
        };

        let (table, dropped) = NameTable::from_raw(raw);
        for entry in &dropped {
            tracing::warn!(name = %entry.name, address = %entry.address, "Dropping routing table entry with invalid address");
        }

        let published = table.len();
        self.table.publish(table);

        metrics::record_sync("ok");
        metrics::record_table_size(published);
        metrics::record_invalid_entries(dropped.len());
        tracing::info!(entries = published, dropped = dropped.len(), "Routing table updated");

        Ok(SyncReport { published, dropped })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use crate::lifecycle::Shutdown;

    /// Replays scripted responses, repeating the last one.
    #[derive(Debug)]
    struct ScriptedSource {
        calls: AtomicUsize,
        script: Mutex<Vec<Option<Vec<(&'static str, &'static str)>>>>,
    }

    impl ScriptedSource {
        fn new(script: Vec<Option<Vec<(&'static str, &'static str)>>>) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                script: Mutex::new(script),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TableSource for ScriptedSource {
        async fn fetch(&self) -> Result<HashMap<String, String>, SyncError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut script = self.script.lock().unwrap();
            let next = if script.len() > 1 {
                script.remove(0)
            } else {
                script[0].clone()
            };
            match next {
                Some(pairs) => Ok(pairs
                    .into_iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect()),
                None => Err(serde_json::from_str::<serde_json::Value>("{")
                    .unwrap_err()
                    .into()),
            }
        }
    }

    fn settings() -> SyncSettings {
        SyncSettings {
            min_delay: Duration::from_secs(60),
        }
    }

    #[tokio::test]
    async fn without_source_the_loop_never_runs() {
        let (manager, worker) = SyncManager::new(None, settings());
        let shutdown = Shutdown::new();

        assert!(worker.start(shutdown.subscribe()).is_none());
        manager.request_refresh();
        manager.request_refresh();
        assert!(manager.snapshot().is_empty());
    }

    #[tokio::test]
    async fn sync_publishes_valid_entries_only() {
        let source = ScriptedSource::new(vec![Some(vec![
            ("foo", "203.0.113.5"),
            ("broken", "999.1.1.1"),
        ])]);
        let (manager, worker) = SyncManager::new(Some(source), settings());

        let report = worker.sync_once().await.unwrap();
        assert_eq!(report.published, 1);
        assert_eq!(report.dropped.len(), 1);
        assert_eq!(report.dropped[0].name, "broken");
        assert_eq!(manager.lookup("foo"), Some("203.0.113.5".parse().unwrap()));
        assert_eq!(manager.lookup("broken"), None);
    }

    #[tokio::test]
    async fn failed_fetch_keeps_previous_table() {
        let source = ScriptedSource::new(vec![Some(vec![("foo", "10.0.0.1")]), None]);
        let (manager, worker) = SyncManager::new(Some(source), settings());

        worker.sync_once().await.unwrap();
        let before = manager.snapshot();

        let err = worker.sync_once().await.unwrap_err();
        assert_eq!(err.kind(), "parse_error");
        assert!(Arc::ptr_eq(&before, &manager.snapshot()));
        assert_eq!(manager.lookup("foo"), Some("10.0.0.1".parse().unwrap()));
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_bursts_collapse_into_one_fetch_per_window() {
        let source = ScriptedSource::new(vec![Some(vec![("foo", "10.0.0.1")])]);
        let (manager, worker) = SyncManager::new(Some(source.clone()), settings());
        let shutdown = Shutdown::new();
        let handle = worker.start(shutdown.subscribe()).unwrap();

        // Initial fetch happens right away.
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(source.calls(), 1);
        assert_eq!(manager.lookup("foo"), Some("10.0.0.1".parse().unwrap()));

        for _ in 0..100 {
            manager.request_refresh();
        }
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(source.calls(), 1);

        // Delay elapsed: the pending signal triggers exactly one more fetch.
        tokio::time::sleep(Duration::from_secs(31)).await;
        assert_eq!(source.calls(), 2);

        // No further signals, so the loop stays parked.
        tokio::time::sleep(Duration::from_secs(600)).await;
        assert_eq!(source.calls(), 2);

        shutdown.trigger();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn signal_after_delay_triggers_fetch() {
        let source = ScriptedSource::new(vec![Some(vec![("foo", "10.0.0.1")])]);
        let (manager, worker) = SyncManager::new(Some(source.clone()), settings());
        let shutdown = Shutdown::new();
        let handle = worker.start(shutdown.subscribe()).unwrap();

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(source.calls(), 1);

        manager.request_refresh();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(source.calls(), 2);

        shutdown.trigger();
        handle.await.unwrap();
    }
}
