use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use hashbrown::HashMap;
use strata_chunk::ChunkCoord;

use crate::{Settings, SlotInfo, SlotRecord, StoreBackend, StoreError};

/// Volatile backend. Counts chunk writes so callers can observe batching.
#[derive(Default)]
pub struct MemoryBackend {
    chunks: HashMap<(String, ChunkCoord), Vec<u8>>,
    slots: HashMap<(String, u8), SlotRecord>,
    settings: Option<Settings>,
    writes: Arc<AtomicUsize>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared counter of `put_chunk` calls.
    pub fn write_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.writes)
    }
}

impl StoreBackend for MemoryBackend {
    fn get_chunk(&self, world: &str, coord: ChunkCoord) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.chunks.get(&(world.to_string(), coord)).cloned())
    }

    fn put_chunk(
        &mut self,
        world: &str,
        coord: ChunkCoord,
        data: &[u8],
    ) -> Result<(), StoreError> {
        self.writes.fetch_add(1, Ordering::Relaxed);
        self.chunks.insert((world.to_string(), coord), data.to_vec());
        Ok(())
    }

    fn list_chunks(&self, world: &str) -> Result<Vec<(ChunkCoord, Vec<u8>)>, StoreError> {
        let mut out: Vec<_> = self
            .chunks
            .iter()
            .filter(|((w, _), _)| w == world)
            .map(|((_, c), d)| (*c, d.clone()))
            .collect();
        out.sort_by_key(|(c, _)| *c);
        Ok(out)
    }

    fn get_slot(&self, world: &str, slot: u8) -> Result<Option<SlotRecord>, StoreError> {
        Ok(self.slots.get(&(world.to_string(), slot)).cloned())
    }

    fn put_slot(&mut self, world: &str, slot: u8, record: &SlotRecord) -> Result<(), StoreError> {
        self.slots.insert((world.to_string(), slot), record.clone());
        Ok(())
    }

    fn delete_slot(&mut self, world: &str, slot: u8) -> Result<(), StoreError> {
        self.slots.remove(&(world.to_string(), slot));
        Ok(())
    }

    fn list_slots(&self, world: &str) -> Result<Vec<SlotInfo>, StoreError> {
        let mut out: Vec<_> = self
            .slots
            .iter()
            .filter(|((w, _), _)| w == world)
            .map(|((_, slot), rec)| SlotInfo {
                slot: *slot,
                saved_at: Some(rec.saved_at),
            })
            .collect();
        out.sort_by_key(|s| s.slot);
        Ok(out)
    }

    fn clear_world(&mut self, world: &str) -> Result<(), StoreError> {
        self.chunks.retain(|(w, _), _| w != world);
        self.slots.retain(|(w, _), _| w != world);
        Ok(())
    }

    fn get_settings(&self) -> Result<Option<Settings>, StoreError> {
        Ok(self.settings.clone())
    }

    fn put_settings(&mut self, settings: &Settings) -> Result<(), StoreError> {
        self.settings = Some(settings.clone());
        Ok(())
    }
}
