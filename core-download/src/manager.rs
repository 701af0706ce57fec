//! # Download Manager
//!
//! Accepts download requests and runs them one at a time.
//!
//! ## Overview
//!
//! The `DownloadManager` is the entry point UI code talks to. It:
//! - Resolves the active server and its catalog client
//! - Skips songs that are already downloaded or already queued
//! - Records the job in the server's pending queue
//! - Runs the [`DownloadPipeline`] on a dedicated single-concurrency lane
//! - Removes the job once it settles and publishes the outcome
//!
//! The download lane is independent of the playback command lane, so a slow
//! transfer never delays a play or skip.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_download::DownloadManager;
//!
//! let manager = DownloadManager::new(catalog, resolver).with_event_bus(bus);
//! manager.download_song("song-1", Some("playlist-7")).await?;
//!
//! for job in manager.active_jobs() {
//!     println!("{} {:?}", job.id, job.fraction());
//! }
//! ```

use crate::error::{DownloadError, Result};
use crate::job::{DownloadJob, DownloadJobId, DownloadQueues};
use crate::pipeline::DownloadPipeline;
use core_library::catalog::CatalogProvider;
use core_library::resolver::CatalogResolver;
use core_runtime::events::{CoreEvent, DownloadEvent, EventBus};
use core_runtime::SerialQueue;
use std::sync::Arc;
use tracing::{debug, info, instrument};

const LANE_NAME: &str = "downloads";

/// Offline download queue. Clones share the same lane and queues.
#[derive(Clone)]
pub struct DownloadManager {
    catalog: Arc<dyn CatalogProvider>,
    resolver: CatalogResolver,
    pipeline: DownloadPipeline,
    queues: Arc<DownloadQueues>,
    lane: SerialQueue,
    event_bus: Option<EventBus>,
}

impl DownloadManager {
    /// Create a manager and spawn its download lane.
    ///
    /// Must be called inside a tokio runtime.
    pub fn new(catalog: Arc<dyn CatalogProvider>, resolver: CatalogResolver) -> Self {
        let queues = Arc::new(DownloadQueues::new());
        Self {
            catalog,
            pipeline: DownloadPipeline::new(resolver.clone(), Arc::clone(&queues)),
            resolver,
            queues,
            lane: SerialQueue::new(LANE_NAME),
            event_bus: None,
        }
    }

    /// Publish queue, progress and outcome events.
    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.pipeline = self.pipeline.with_event_bus(event_bus.clone());
        self.event_bus = Some(event_bus);
        self
    }

    // ========================================================================
    // Requests
    // ========================================================================

    /// Queue a song from the active server for offline playback.
    ///
    /// Returns the queued job, or `None` when the song is already downloaded
    /// or already queued. The download itself runs in the background.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::NoActiveServer`] when no server is active.
    #[instrument(skip(self))]
    pub async fn download_song(
        &self,
        song_id: &str,
        playlist_id: Option<&str>,
    ) -> Result<Option<DownloadJob>> {
        let server_id = self
            .catalog
            .active_server_id()
            .ok_or(DownloadError::NoActiveServer)?;
        let id = DownloadJobId::new(server_id, song_id);

        if self.queues.contains(&id) {
            debug!(job = %id, "Already queued");
            return Ok(None);
        }
        if self.is_downloaded(&id.server_id, song_id).await? {
            debug!(job = %id, "Already downloaded");
            return Ok(None);
        }

        let job = DownloadJob::new(id.clone(), playlist_id.map(String::from));
        // Another request may have queued it while the cache was checked
        if !self.queues.push(job.clone()) {
            return Ok(None);
        }
        info!(job = %id, "Download queued");
        self.emit(DownloadEvent::Queued {
            server_id: id.server_id.clone(),
            song_id: id.song_id.clone(),
        });

        let manager = self.clone();
        self.lane
            .enqueue("download", async move { manager.execute(id).await });
        Ok(Some(job))
    }

    /// Runs on the lane. The job leaves its queue whatever the outcome.
    async fn execute(&self, id: DownloadJobId) -> Result<()> {
        let queued = QueuedJob {
            queues: Arc::clone(&self.queues),
            id,
        };
        let outcome = match self.catalog.client(&queued.id.server_id) {
            Some(client) => self.pipeline.run(&queued.id, client.as_ref()).await,
            None => Err(DownloadError::UnknownServer(queued.id.server_id.clone())),
        };
        let id = queued.id.clone();
        drop(queued);

        let DownloadJobId { server_id, song_id } = id;
        match outcome {
            Ok(()) => {
                self.emit(DownloadEvent::Completed { server_id, song_id });
                Ok(())
            }
            Err(e) => {
                self.emit(DownloadEvent::Failed {
                    server_id,
                    song_id,
                    message: e.to_string(),
                });
                Err(e)
            }
        }
    }

    fn emit(&self, event: DownloadEvent) {
        if let Some(bus) = &self.event_bus {
            bus.emit(CoreEvent::Download(event)).ok();
        }
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Pending and running jobs for a server, in request order.
    pub fn jobs(&self, server_id: &str) -> Vec<DownloadJob> {
        self.queues.jobs(server_id)
    }

    /// Jobs for the active server.
    pub fn active_jobs(&self) -> Vec<DownloadJob> {
        self.catalog
            .active_server_id()
            .map(|server_id| self.jobs(&server_id))
            .unwrap_or_default()
    }

    /// Whether the song has a local file recorded in the offline cache.
    pub async fn is_downloaded(&self, server_id: &str, song_id: &str) -> Result<bool> {
        Ok(self
            .resolver
            .offline()
            .is_downloaded(server_id, song_id)
            .await?)
    }

    /// Wait until every download queued so far has settled.
    pub async fn flush(&self) -> Result<()> {
        self.lane.run(async {}).await?;
        Ok(())
    }

    /// Stop the lane after the running download. Queued jobs are dropped.
    pub fn shutdown(&self) {
        self.lane.shutdown();
    }
}

/// Removes the job from its queue when dropped, including during a panic
/// unwinding out of the pipeline.
struct QueuedJob {
    queues: Arc<DownloadQueues>,
    id: DownloadJobId,
}

impl Drop for QueuedJob {
    fn drop(&mut self) {
        self.queues.remove(&self.id);
    }
}
