use serde::{Deserialize, Serialize};
use strata_chunk::{CHUNK_VOLUME, ChunkRecord};

use crate::StoreError;

/// Portable dump of every stored chunk of one world.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldExport {
    #[serde(rename = "worldId")]
    pub world_id: String,
    pub chunks: Vec<ChunkRecord>,
}

impl WorldExport {
    pub fn to_json(&self) -> Result<String, StoreError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(text: &str) -> Result<Self, StoreError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Fails on the first record whose buffer is not exactly one chunk.
    pub fn validate(&self) -> Result<(), StoreError> {
        match self.chunks.iter().find(|c| c.data.len() != CHUNK_VOLUME) {
            Some(bad) => Err(StoreError::InvalidChunk {
                cx: bad.cx,
                cy: bad.cy,
                cz: bad.cz,
                len: bad.data.len(),
            }),
            None => Ok(()),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotRecord {
    pub payload: WorldExport,
    /// Milliseconds since the Unix epoch.
    #[serde(rename = "savedAt")]
    pub saved_at: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotInfo {
    pub slot: u8,
    #[serde(rename = "savedAt")]
    pub saved_at: Option<u64>,
}

/// Process-wide user settings. Missing fields take their defaults.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub fov: f32,
    #[serde(rename = "sens")]
    pub sensitivity: f32,
    pub fog: f32,
    #[serde(rename = "worldSeed")]
    pub world_seed: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            fov: 75.0,
            sensitivity: 0.0018,
            fog: 180.0,
            world_seed: None,
        }
    }
}
