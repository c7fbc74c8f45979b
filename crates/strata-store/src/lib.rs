//! Chunk persistence: storage backends, a single I/O worker, and per-world
//! handles that debounce writes.
#![forbid(unsafe_code)]

mod backend;
mod chunk_store;
mod debounce;
mod disk;
mod error;
mod memory;
mod records;
mod storage;

pub use backend::StoreBackend;
pub use chunk_store::{ChunkStore, LoadResult};
pub use debounce::Debounce;
pub use disk::DiskBackend;
pub use error::StoreError;
pub use memory::MemoryBackend;
pub use records::{Settings, SlotInfo, SlotRecord, WorldExport};
pub use storage::Storage;

use std::time::Duration;

/// Delay between the first staged write and the batch flush.
pub const SAVE_DEBOUNCE: Duration = Duration::from_millis(250);

/// Valid save slot numbers.
pub const SLOTS: std::ops::RangeInclusive<u8> = 1..=3;

pub(crate) fn check_slot(slot: u8) -> Result<(), StoreError> {
    if SLOTS.contains(&slot) {
        Ok(())
    } else {
        Err(StoreError::InvalidSlot(slot))
    }
}
