use strata_chunk::ChunkCoord;

use crate::{Settings, SlotInfo, SlotRecord, StoreError};

/// Key/value persistence used by the storage worker. Chunk keys are
/// `(world id, chunk coordinate)`; slots are keyed by `(world id, slot)`;
/// settings are one global record.
pub trait StoreBackend: Send + 'static {
    fn get_chunk(&self, world: &str, coord: ChunkCoord) -> Result<Option<Vec<u8>>, StoreError>;
    fn put_chunk(&mut self, world: &str, coord: ChunkCoord, data: &[u8])
    -> Result<(), StoreError>;
    fn list_chunks(&self, world: &str) -> Result<Vec<(ChunkCoord, Vec<u8>)>, StoreError>;

    fn get_slot(&self, world: &str, slot: u8) -> Result<Option<SlotRecord>, StoreError>;
    fn put_slot(&mut self, world: &str, slot: u8, record: &SlotRecord) -> Result<(), StoreError>;
    fn delete_slot(&mut self, world: &str, slot: u8) -> Result<(), StoreError>;
    fn list_slots(&self, world: &str) -> Result<Vec<SlotInfo>, StoreError>;

    /// Removes every chunk and slot of `world`.
    fn clear_world(&mut self, world: &str) -> Result<(), StoreError>;

    fn get_settings(&self) -> Result<Option<Settings>, StoreError>;
    fn put_settings(&mut self, settings: &Settings) -> Result<(), StoreError>;
}
