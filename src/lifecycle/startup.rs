//! Gateway startup.
//!
//! Order: sync loop → policy stores → listeners → control interface →
//! config watcher and SIGHUP reload. Every listener is bound before
//! [`Gateway::start`] returns, so a bind failure aborts startup.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use notify::RecommendedWatcher;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::admin::{serve_control, ControlState};
use crate::config::watcher::ConfigWatcher;
use crate::config::{parse_listen_addr, ConfigError, GatewayConfig};
use crate::http::{backend_client, Director, HttpServer};
use crate::lifecycle::registry::{ListenerRegistry, RegistryError};
use crate::lifecycle::shutdown::Shutdown;
use crate::lifecycle::signals::spawn_hangup_reload;
use crate::routing::source::SourceError;
use crate::routing::{HttpTableSource, SyncManager, SyncSettings, TableSource};

/// Fatal startup failure.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error("invalid address '{0}'")]
    InvalidAddr(String),
    #[error("unable to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid routing table source: {0}")]
    Source(#[from] SourceError),
    #[error("unable to watch config file: {0}")]
    Watch(#[from] notify::Error),
}

/// A running gateway.
pub struct Gateway {
    shutdown: Shutdown,
    listeners: BTreeMap<String, SocketAddr>,
    control_addr: Option<SocketAddr>,
    registry: Arc<ListenerRegistry>,
    sync: SyncManager,
    tasks: Vec<JoinHandle<()>>,
    _watcher: Option<RecommendedWatcher>,
}

impl Gateway {
    /// Start every subsystem described by `config`.
    ///
    /// `config_path` is the file policy reloads read from.
    pub async fn start(config: GatewayConfig, config_path: &Path) -> Result<Self, StartupError> {
        let shutdown = Shutdown::new();
        let mut tasks = Vec::new();

        let source = match &config.remote_config_path {
            Some(base) => {
                let source = HttpTableSource::new(
                    base,
                    Duration::from_secs(config.sync.fetch_timeout_secs),
                    config.sync.max_body_bytes,
                )?;
                tracing::info!(endpoint = %source.endpoint(), "Routing table source configured");
                Some(Arc::new(source) as Arc<dyn TableSource>)
            }
            None => None,
        };
        let (sync, worker) = SyncManager::new(source, SyncSettings::from(&config.sync));
        tasks.extend(worker.start(shutdown.subscribe()));

        let registry = Arc::new(ListenerRegistry::from_config(&config.routers)?);
        let client = backend_client(&config.timeouts);

        let mut listeners = BTreeMap::new();
        for (listen_addr, store) in registry.iter() {
            let listener = bind(listen_addr).await?;
            let local = listener
                .local_addr()
                .map_err(|source| StartupError::Bind {
                    addr: listen_addr.to_string(),
                    source,
                })?;
            listeners.insert(listen_addr.to_string(), local);

            let director = Director::new(sync.clone(), store.clone());
            let server = HttpServer::new(director, client.clone(), &config.timeouts);
            let rx = shutdown.subscribe();
            let name = listen_addr.to_string();
            tasks.push(tokio::spawn(async move {
                if let Err(e) = server.run(listener, rx).await {
                    tracing::error!(listen_addr = %name, error = %e, "Listener failed");
                }
            }));
        }

        let mut control_addr = None;
        if let Some(addr) = &config.control {
            let listener = bind(addr).await?;
            control_addr = listener.local_addr().ok();

            let state = ControlState {
                registry: registry.clone(),
                sync: sync.clone(),
                config_path: Arc::new(config_path.to_path_buf()),
                api_key: config.control_api_key.as_deref().map(Arc::from),
            };
            let rx = shutdown.subscribe();
            tasks.push(tokio::spawn(async move {
                if let Err(e) = serve_control(listener, state, rx).await {
                    tracing::error!(error = %e, "Control interface failed");
                }
            }));
        }

        let watcher = if config.watch_config {
            Some(watch_config(config_path, registry.clone(), &shutdown, &mut tasks)?)
        } else {
            None
        };

        tasks.extend(spawn_hangup_reload(
            config_path.to_path_buf(),
            registry.clone(),
            shutdown.subscribe(),
        ));

        tracing::info!(listeners = listeners.len(), "Gateway started");

        Ok(Self {
            shutdown,
            listeners,
            control_addr,
            registry,
            sync,
            tasks,
            _watcher: watcher,
        })
    }

    /// Bound address of the listener configured as `listen_addr`.
    pub fn listener_addr(&self, listen_addr: &str) -> Option<SocketAddr> {
        self.listeners.get(listen_addr).copied()
    }

    pub fn control_addr(&self) -> Option<SocketAddr> {
        self.control_addr
    }

    pub fn registry(&self) -> &Arc<ListenerRegistry> {
        &self.registry
    }

    pub fn sync(&self) -> &SyncManager {
        &self.sync
    }

    /// Stop accepting, drain in-flight requests and wait for every task.
    pub async fn shutdown(self) {
        tracing::info!("Gateway shutting down");
        self.shutdown.trigger();
        for task in self.tasks {
            let _ = task.await;
        }
        tracing::info!("Gateway stopped");
    }
}

async fn bind(addr: &str) -> Result<TcpListener, StartupError> {
    let socket = parse_listen_addr(addr).ok_or_else(|| StartupError::InvalidAddr(addr.to_string()))?;
    TcpListener::bind(socket)
        .await
        .map_err(|source| StartupError::Bind {
            addr: addr.to_string(),
            source,
        })
}

fn watch_config(
    path: &Path,
    registry: Arc<ListenerRegistry>,
    shutdown: &Shutdown,
    tasks: &mut Vec<JoinHandle<()>>,
) -> Result<RecommendedWatcher, notify::Error> {
    let (watcher, mut updates) = ConfigWatcher::new(path);
    let handle = watcher.run()?;
    let mut rx = shutdown.subscribe();

    tasks.push(tokio::spawn(async move {
        loop {
            tokio::select! {
                update = updates.recv() => match update {
                    Some(config) => {
                        registry.apply(&config.routers);
                    }
                    None => break,
                },
                _ = rx.recv() => break,
            }
        }
    }));

    Ok(handle)
}
