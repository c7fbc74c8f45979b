use std::path::PathBuf;
use std::thread;

use crossbeam_channel::{Sender, bounded, unbounded};

use crate::{ChunkStore, DiskBackend, MemoryBackend, Settings, StoreBackend, StoreError};

type Job = Box<dyn FnOnce(&mut dyn StoreBackend) + Send>;

/// Handle to the storage worker thread. Every backend call runs on that one
/// thread in submission order, so a read issued after a write observes it.
/// Clones share the worker; it exits once the last clone is dropped.
#[derive(Clone)]
pub struct Storage {
    tx: Sender<Job>,
}

impl Storage {
    pub fn new(backend: impl StoreBackend) -> Self {
        let (tx, rx) = unbounded::<Job>();
        thread::spawn(move || {
            let mut backend = backend;
            while let Ok(job) = rx.recv() {
                job(&mut backend);
            }
            log::debug!("storage worker stopped");
        });
        Self { tx }
    }

    pub fn memory() -> Self {
        Self::new(MemoryBackend::new())
    }

    pub fn disk(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        Ok(Self::new(DiskBackend::open(root)?))
    }

    /// Per-world handle sharing this worker.
    pub fn world(&self, world_id: &str) -> ChunkStore {
        ChunkStore::new(self.clone(), world_id)
    }

    pub(crate) fn submit(
        &self,
        job: impl FnOnce(&mut dyn StoreBackend) + Send + 'static,
    ) -> Result<(), StoreError> {
        self.tx
            .send(Box::new(job))
            .map_err(|_| StoreError::Unavailable)
    }

    /// Runs `f` on the worker and waits for its result.
    pub(crate) fn call<T: Send + 'static>(
        &self,
        f: impl FnOnce(&mut dyn StoreBackend) -> Result<T, StoreError> + Send + 'static,
    ) -> Result<T, StoreError> {
        let (reply_tx, reply_rx) = bounded(1);
        self.submit(move |backend| {
            let _ = reply_tx.send(f(backend));
        })?;
        reply_rx.recv().map_err(|_| StoreError::Unavailable)?
    }

    /// Stored settings, or defaults when none were saved.
    pub fn load_settings(&self) -> Result<Settings, StoreError> {
        Ok(self.call(|b| b.get_settings())?.unwrap_or_default())
    }

    pub fn save_settings(&self, settings: &Settings) -> Result<(), StoreError> {
        let settings = settings.clone();
        self.call(move |b| b.put_settings(&settings))
    }
}
