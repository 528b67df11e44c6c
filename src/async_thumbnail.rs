// Background work for listings: directory enumeration and thumbnail jobs

use crate::domain::collection::enumerate;
use crate::domain::EntryId;
use crate::error::{DragboxError, Result};
use crate::thumbnail::{self, ThumbnailSize};
use image::RgbaImage;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;
use tokio::sync::mpsc;

/// Worker pool shared by every collection of a session.
///
/// Cloning is cheap; the runtime stays alive while any clone does.
#[derive(Clone)]
pub struct ThumbnailPool {
    runtime: Arc<Runtime>,
}

impl ThumbnailPool {
    pub fn new() -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .thread_name("dragbox-worker")
            .enable_time()
            .build()
            .map_err(|e| DragboxError::Runtime(format!("Failed to create tokio runtime: {}", e)))?;

        Ok(Self {
            runtime: Arc::new(runtime),
        })
    }
}

/// Finished background work, delivered to the collection's owning thread
pub(crate) enum BackgroundEvent {
    Listing {
        generation: u64,
        result: Result<Vec<String>>,
    },
    Thumbnail {
        id: EntryId,
        thumbnail: Option<RgbaImage>,
    },
}

/// Per-collection channel of finished jobs.
///
/// Jobs run unordered on the pool and are never cancelled; the receiving
/// side decides whether a result still applies.
pub(crate) struct BackgroundQueue {
    pool: ThumbnailPool,
    event_tx: mpsc::UnboundedSender<BackgroundEvent>,
    event_rx: mpsc::UnboundedReceiver<BackgroundEvent>,
}

impl BackgroundQueue {
    pub(crate) fn new(pool: ThumbnailPool) -> Self {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        Self {
            pool,
            event_tx,
            event_rx,
        }
    }

    pub(crate) fn pool(&self) -> &ThumbnailPool {
        &self.pool
    }

    pub(crate) fn spawn_thumbnail(&self, id: EntryId, path: PathBuf, size: ThumbnailSize) {
        self.spawn_thumbnail_job(id, move || thumbnail::generate(&path, size));
    }

    /// Runs `job` on the pool and always delivers an event for `id`, with
    /// no thumbnail if the job panics
    fn spawn_thumbnail_job<F>(&self, id: EntryId, job: F)
    where
        F: FnOnce() -> Option<RgbaImage> + Send + 'static,
    {
        let event_tx = self.event_tx.clone();
        self.pool.runtime.spawn_blocking(move || {
            let thumbnail = panic::catch_unwind(AssertUnwindSafe(job)).unwrap_or_else(|_| {
                tracing::warn!("Thumbnail job for {id:?} panicked");
                None
            });
            // The collection may be gone; nothing to deliver to then
            let _ = event_tx.send(BackgroundEvent::Thumbnail { id, thumbnail });
        });
    }

    pub(crate) fn spawn_listing(&self, generation: u64, directory: Arc<Path>) {
        let event_tx = self.event_tx.clone();
        self.pool.runtime.spawn_blocking(move || {
            let result = enumerate(&directory);
            let _ = event_tx.send(BackgroundEvent::Listing { generation, result });
        });
    }

    pub(crate) fn try_next(&mut self) -> Option<BackgroundEvent> {
        self.event_rx.try_recv().ok()
    }

    /// Blocks the calling thread for up to `timeout` waiting for one event.
    ///
    /// Must not be called from inside an async task.
    pub(crate) fn next_timeout(&mut self, timeout: Duration) -> Option<BackgroundEvent> {
        let event_rx = &mut self.event_rx;
        self.pool.runtime.block_on(async move {
            tokio::time::timeout(timeout, event_rx.recv())
                .await
                .ok()
                .flatten()
        })
    }
}
