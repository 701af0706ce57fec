//! Core service façade and bootstrap helpers.
//!
//! This crate wires host-provided bridge implementations (audio engine, file
//! fetcher, key/value store, network monitor) and the host's catalog clients
//! into the shared Rust core. Desktop apps typically enable the
//! `desktop-shims` feature (which depends on `bridge-desktop`) and call
//! [`bootstrap_desktop`].
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_service::{CoreDependencies, CoreService};
//!
//! let service = CoreService::new(config, CoreDependencies::new(engine, fetcher, store, catalog))?;
//!
//! // Forward native player callbacks
//! let engine_events = service.engine_events();
//! engine_events.engine(EngineEvent::RemotePlay);
//!
//! service.player().create_session(request).await?;
//! service.downloads().download_song("song-1", None).await?;
//! ```

pub mod error;

pub use error::{CoreError, Result};

use std::sync::Arc;

use bridge_traits::{
    network::NetworkMonitor,
    playback::AudioEngine,
    storage::{FileFetcher, KeyValueStore},
};
use core_download::DownloadManager;
use core_library::{CatalogProvider, CatalogResolver, OfflineCache, QueryCache};
use core_playback::{
    dispatcher::{self, DomainEventSender, EventDispatcher},
    PlayerController, PlayerStore, TrackMapper,
};
use core_runtime::config::CoreConfig;
use core_runtime::events::{CoreEvent, EventBus, Receiver};
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Aggregated handle to all bridge dependencies the core requires.
pub struct CoreDependencies {
    pub engine: Arc<dyn AudioEngine>,
    pub file_fetcher: Arc<dyn FileFetcher>,
    pub key_value_store: Arc<dyn KeyValueStore>,
    pub catalog: Arc<dyn CatalogProvider>,
    /// Without a monitor the connectivity class keeps its default.
    pub network_monitor: Option<Arc<dyn NetworkMonitor>>,
}

impl CoreDependencies {
    /// Construct a dependency bundle from explicit bridge handles.
    pub fn new(
        engine: Arc<dyn AudioEngine>,
        file_fetcher: Arc<dyn FileFetcher>,
        key_value_store: Arc<dyn KeyValueStore>,
        catalog: Arc<dyn CatalogProvider>,
    ) -> Self {
        Self {
            engine,
            file_fetcher,
            key_value_store,
            catalog,
            network_monitor: None,
        }
    }

    pub fn with_network_monitor(mut self, monitor: Arc<dyn NetworkMonitor>) -> Self {
        self.network_monitor = Some(monitor);
        self
    }
}

struct ServiceInner {
    config: CoreConfig,
    events: EventBus,
    offline: OfflineCache,
    resolver: CatalogResolver,
    controller: PlayerController,
    downloads: DownloadManager,
    domain: DomainEventSender,
    shutdown: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

/// Primary façade exposed to host applications.
#[derive(Clone)]
pub struct CoreService {
    inner: Arc<ServiceInner>,
}

impl CoreService {
    /// Build every component and start the background tasks.
    ///
    /// Must be called inside a tokio runtime.
    ///
    /// # Errors
    ///
    /// Fails when the configuration does not validate.
    pub fn new(config: CoreConfig, deps: CoreDependencies) -> Result<Self> {
        config.validate()?;

        let events = EventBus::new(config.event_buffer_size);
        let offline = OfflineCache::new(Arc::clone(&deps.key_value_store));
        let resolver = CatalogResolver::new(
            offline.clone(),
            Arc::new(QueryCache::default()),
            Arc::clone(&deps.file_fetcher),
        );

        let store = Arc::new(PlayerStore::new());
        let mapper = Arc::new(TrackMapper::new(
            Arc::clone(&store),
            Arc::clone(&deps.catalog),
            resolver.clone(),
            config.playback.clone(),
        ));
        let (domain, inbox) = dispatcher::channel();
        let controller = PlayerController::new(
            Arc::clone(&deps.engine),
            store,
            mapper,
            events.clone(),
            domain.clone(),
        );

        let downloads = DownloadManager::new(Arc::clone(&deps.catalog), resolver.clone())
            .with_event_bus(events.clone());

        let dispatcher = EventDispatcher::new(inbox, controller.clone());
        let shutdown = dispatcher.shutdown_token();
        let mut tasks = vec![dispatcher.spawn()];
        if let Some(monitor) = deps.network_monitor {
            tasks.push(tokio::spawn(forward_connectivity(
                monitor,
                domain.clone(),
                shutdown.clone(),
            )));
        }

        info!(
            servers = config.servers.len(),
            active_server = ?config.active_server_id,
            "Core service started"
        );

        Ok(Self {
            inner: Arc::new(ServiceInner {
                config,
                events,
                offline,
                resolver,
                controller,
                downloads,
                domain,
                shutdown,
                tasks: Mutex::new(tasks),
            }),
        })
    }

    pub fn config(&self) -> &CoreConfig {
        &self.inner.config
    }

    pub fn player(&self) -> &PlayerController {
        &self.inner.controller
    }

    pub fn downloads(&self) -> &DownloadManager {
        &self.inner.downloads
    }

    pub fn offline_cache(&self) -> &OfflineCache {
        &self.inner.offline
    }

    pub fn resolver(&self) -> &CatalogResolver {
        &self.inner.resolver
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.inner.events
    }

    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.inner.events.subscribe()
    }

    /// Sender the host uses to forward audio engine callbacks.
    pub fn engine_events(&self) -> DomainEventSender {
        self.inner.domain.clone()
    }

    /// Drop everything downloaded from a server.
    ///
    /// Files already on disk are left for the host to clean up.
    pub async fn reset_offline_cache(&self, server_id: &str) -> Result<()> {
        self.inner.offline.reset(server_id).await?;
        Ok(())
    }

    /// Stop the dispatcher, the network forwarder and both lanes.
    pub fn shutdown(&self) {
        self.inner.shutdown.cancel();
        self.inner.controller.shutdown();
        self.inner.downloads.shutdown();
        for task in self.inner.tasks.lock().drain(..) {
            task.abort();
        }
        info!("Core service stopped");
    }
}

/// Report the current class, then every change, until shutdown.
async fn forward_connectivity(
    monitor: Arc<dyn NetworkMonitor>,
    domain: DomainEventSender,
    shutdown: CancellationToken,
) {
    match monitor.get_network_info().await {
        Ok(info) => {
            domain.connectivity(info.connectivity_class());
        }
        Err(e) => warn!(error = %e, "Initial network probe failed"),
    }

    let mut changes = match monitor.subscribe_changes().await {
        Ok(changes) => changes,
        Err(e) => {
            warn!(error = %e, "Network change stream unavailable");
            return;
        }
    };

    loop {
        let info = tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            info = changes.next() => match info {
                Some(info) => info,
                None => break,
            },
        };
        let class = info.connectivity_class();
        debug!(class = class.as_str(), "Network change");
        if !domain.connectivity(class) {
            break;
        }
    }
    debug!("Network forwarding stopped");
}

/// Convenience bootstrapper for desktop hosts.
///
/// Opens the SQLite offline cache at `config.storage.cache_db_path`, stores
/// files under `config.storage.files_dir` and probes connectivity with the
/// desktop network monitor.
///
/// ```rust,ignore
/// let core = core_service::bootstrap_desktop(config, engine, catalog).await?;
/// core.player().play().await?;
/// ```
#[cfg(all(feature = "desktop-shims", not(target_arch = "wasm32")))]
pub async fn bootstrap_desktop(
    config: CoreConfig,
    engine: Arc<dyn AudioEngine>,
    catalog: Arc<dyn CatalogProvider>,
) -> Result<CoreService> {
    use bridge_desktop::{DesktopNetworkMonitor, HttpFileFetcher, SqliteKeyValueStore};

    let store = SqliteKeyValueStore::new(config.storage.cache_db_path.clone())
        .await
        .map_err(|err| CoreError::InitializationFailed(err.to_string()))?;
    let fetcher = HttpFileFetcher::new(config.storage.files_dir.clone())?;

    let deps = CoreDependencies::new(engine, Arc::new(fetcher), Arc::new(store), catalog)
        .with_network_monitor(Arc::new(DesktopNetworkMonitor::new()));
    CoreService::new(config, deps)
}
