use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("chunk ({cx}, {cy}, {cz}) has {len} bytes")]
    InvalidChunk { cx: i32, cy: i32, cz: i32, len: usize },

    #[error("slot {0} is out of range")]
    InvalidSlot(u8),

    #[error("storage worker is gone")]
    Unavailable,
}
