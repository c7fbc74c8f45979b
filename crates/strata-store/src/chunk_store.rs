use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use crossbeam_channel::{Receiver, Sender, unbounded};
use hashbrown::HashMap;
use strata_chunk::{ChunkCoord, ChunkRecord};

use crate::{
    Debounce, SAVE_DEBOUNCE, SlotInfo, SlotRecord, Storage, StoreBackend, StoreError, WorldExport,
    check_slot,
};

/// Completed asynchronous load. `ticket` echoes the value passed to
/// [`ChunkStore::request_load`] so the owner can discard stale results.
#[derive(Debug)]
pub struct LoadResult {
    pub coord: ChunkCoord,
    pub ticket: u64,
    pub data: Result<Option<Vec<u8>>, StoreError>,
}

/// Persistence for one world id.
///
/// Saves are staged in memory (latest buffer per chunk wins) and written as
/// one batch when the debounce window opened by the first staged save
/// elapses. Reads consult the stage before the backend.
pub struct ChunkStore {
    world_id: Arc<str>,
    storage: Storage,
    stage: HashMap<ChunkCoord, Vec<u8>>,
    debounce: Debounce,
    loads_tx: Sender<LoadResult>,
    loads_rx: Receiver<LoadResult>,
}

fn write_batch(
    backend: &mut dyn StoreBackend,
    world: &str,
    batch: Vec<(ChunkCoord, Vec<u8>)>,
) -> Result<(), StoreError> {
    let mut first_err = None;
    for (coord, data) in batch {
        if let Err(e) = backend.put_chunk(world, coord, &data) {
            log::warn!("failed to save chunk {coord} of world {world}: {e}");
            first_err.get_or_insert(e);
        }
    }
    first_err.map_or(Ok(()), Err)
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

impl ChunkStore {
    pub fn new(storage: Storage, world_id: &str) -> Self {
        let (loads_tx, loads_rx) = unbounded();
        Self {
            world_id: Arc::from(world_id),
            storage,
            stage: HashMap::new(),
            debounce: Debounce::new(SAVE_DEBOUNCE),
            loads_tx,
            loads_rx,
        }
    }

    #[inline]
    pub fn world_id(&self) -> &str {
        &self.world_id
    }

    #[inline]
    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    /// Starts a load; the result shows up in [`ChunkStore::drain_loads`].
    pub fn request_load(&self, coord: ChunkCoord, ticket: u64) {
        if let Some(staged) = self.stage.get(&coord) {
            let _ = self.loads_tx.send(LoadResult {
                coord,
                ticket,
                data: Ok(Some(staged.clone())),
            });
            return;
        }
        let world = Arc::clone(&self.world_id);
        let tx = self.loads_tx.clone();
        let submitted = self.storage.submit(move |b| {
            let data = b.get_chunk(&world, coord);
            let _ = tx.send(LoadResult { coord, ticket, data });
        });
        if let Err(e) = submitted {
            let _ = self.loads_tx.send(LoadResult {
                coord,
                ticket,
                data: Err(e),
            });
        }
    }

    pub fn drain_loads(&self) -> Vec<LoadResult> {
        self.loads_rx.try_iter().collect()
    }

    pub fn load_blocking(&self, coord: ChunkCoord) -> Result<Option<Vec<u8>>, StoreError> {
        if let Some(staged) = self.stage.get(&coord) {
            return Ok(Some(staged.clone()));
        }
        let world = Arc::clone(&self.world_id);
        self.storage.call(move |b| b.get_chunk(&world, coord))
    }

    /// Stages `data` for `coord` and arms the debounce if idle.
    pub fn queue_save(&mut self, coord: ChunkCoord, data: &[u8], now: Instant) {
        self.stage.insert(coord, data.to_vec());
        self.debounce.arm(now);
    }

    /// Flushes the stage if the debounce deadline has passed. Returns true when it fired.
    pub fn poll(&mut self, now: Instant) -> bool {
        if self.debounce.poll(now) {
            self.flush_async();
            true
        } else {
            false
        }
    }

    #[inline]
    pub fn pending_saves(&self) -> usize {
        self.stage.len()
    }

    fn take_batch(&mut self) -> Vec<(ChunkCoord, Vec<u8>)> {
        self.debounce.cancel();
        self.stage.drain().collect()
    }

    /// Hands the stage to the worker without waiting.
    pub fn flush_async(&mut self) {
        let batch = self.take_batch();
        if batch.is_empty() {
            return;
        }
        let world = Arc::clone(&self.world_id);
        let n = batch.len();
        if let Err(e) = self.storage.submit(move |b| {
            let _ = write_batch(b, &world, batch);
        }) {
            log::warn!("dropping {n} staged chunk saves for {}: {e}", self.world_id);
        }
    }

    /// Writes the stage and waits until every earlier write has landed.
    pub fn flush(&mut self) -> Result<(), StoreError> {
        let batch = self.take_batch();
        let world = Arc::clone(&self.world_id);
        self.storage.call(move |b| write_batch(b, &world, batch))
    }

    /// Everything in the backend for this world. Staged saves are not included.
    pub fn export(&self) -> Result<WorldExport, StoreError> {
        let world = Arc::clone(&self.world_id);
        let chunks = self.storage.call(move |b| b.list_chunks(&world))?;
        Ok(WorldExport {
            world_id: self.world_id.to_string(),
            chunks: chunks
                .into_iter()
                .map(|(c, data)| ChunkRecord {
                    cx: c.cx,
                    cy: c.cy,
                    cz: c.cz,
                    data,
                })
                .collect(),
        })
    }

    /// Writes every record of `export` under this world id, ignoring the
    /// export's own id. Nothing is written unless every record is valid.
    pub fn import(&mut self, export: &WorldExport) -> Result<usize, StoreError> {
        export.validate()?;
        for rec in &export.chunks {
            self.stage.remove(&rec.coord());
        }
        let world = Arc::clone(&self.world_id);
        let batch: Vec<_> = export
            .chunks
            .iter()
            .map(|r| (r.coord(), r.data.clone()))
            .collect();
        let n = batch.len();
        self.storage.call(move |b| write_batch(b, &world, batch))?;
        log::info!("imported {n} chunks into world {}", self.world_id);
        Ok(n)
    }

    pub fn import_json(&mut self, text: &str) -> Result<usize, StoreError> {
        self.import(&WorldExport::from_json(text)?)
    }

    pub fn list_slots(&self) -> Result<Vec<SlotInfo>, StoreError> {
        let world = Arc::clone(&self.world_id);
        self.storage.call(move |b| b.list_slots(&world))
    }

    pub fn save_slot(&self, slot: u8, payload: WorldExport) -> Result<SlotInfo, StoreError> {
        check_slot(slot)?;
        let record = SlotRecord {
            payload,
            saved_at: now_millis(),
        };
        let info = SlotInfo {
            slot,
            saved_at: Some(record.saved_at),
        };
        let world = Arc::clone(&self.world_id);
        self.storage.call(move |b| b.put_slot(&world, slot, &record))?;
        Ok(info)
    }

    pub fn load_slot(&self, slot: u8) -> Result<Option<WorldExport>, StoreError> {
        check_slot(slot)?;
        let world = Arc::clone(&self.world_id);
        let rec = self.storage.call(move |b| b.get_slot(&world, slot))?;
        Ok(rec.map(|r| r.payload))
    }

    pub fn delete_slot(&self, slot: u8) -> Result<(), StoreError> {
        check_slot(slot)?;
        let world = Arc::clone(&self.world_id);
        self.storage.call(move |b| b.delete_slot(&world, slot))
    }

    /// Drops staged saves, then removes every stored chunk and slot of this world.
    pub fn clear_world(&mut self) -> Result<(), StoreError> {
        self.take_batch();
        let world = Arc::clone(&self.world_id);
        self.storage.call(move |b| b.clear_world(&world))
    }
}

impl Drop for ChunkStore {
    fn drop(&mut self) {
        if !self.stage.is_empty() {
            self.flush_async();
        }
    }
}
