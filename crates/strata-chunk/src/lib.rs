//! Chunk buffers, chunk coordinates and the world -> chunk mapping.
#![forbid(unsafe_code)]

mod chunk_coord;
pub mod encoding;

pub use chunk_coord::{
    ChunkCoord, MAX_CHUNK, MIN_CHUNK, chunk_coord, local_coord, split_world,
};

use serde::{Deserialize, Serialize};
use strata_blocks::{AIR, MaterialId};

/// Voxels per chunk edge.
pub const CHUNK_SIZE: usize = 32;
/// Voxels (and bytes) per chunk buffer.
pub const CHUNK_VOLUME: usize = CHUNK_SIZE * CHUNK_SIZE * CHUNK_SIZE;

/// Dense `CHUNK_SIZE³` grid of material ids.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChunkBuf {
    pub coord: ChunkCoord,
    pub blocks: Box<[MaterialId]>,
}

impl ChunkBuf {
    pub fn empty(coord: ChunkCoord) -> Self {
        Self {
            coord,
            blocks: vec![AIR; CHUNK_VOLUME].into_boxed_slice(),
        }
    }

    /// Wraps `bytes`, padding with air or truncating to `CHUNK_VOLUME`.
    pub fn from_bytes(coord: ChunkCoord, bytes: Vec<u8>) -> Self {
        let mut b = bytes;
        if b.len() != CHUNK_VOLUME {
            b.resize(CHUNK_VOLUME, AIR);
        }
        ChunkBuf {
            coord,
            blocks: b.into_boxed_slice(),
        }
    }

    /// Like [`ChunkBuf::from_bytes`] but rejects buffers of the wrong length.
    pub fn try_from_bytes(coord: ChunkCoord, bytes: Vec<u8>) -> Option<Self> {
        (bytes.len() == CHUNK_VOLUME).then(|| Self::from_bytes(coord, bytes))
    }

    #[inline]
    pub fn idx(x: usize, y: usize, z: usize) -> usize {
        x + y * CHUNK_SIZE + z * CHUNK_SIZE * CHUNK_SIZE
    }

    #[inline]
    pub fn get_local(&self, x: usize, y: usize, z: usize) -> MaterialId {
        self.blocks[Self::idx(x, y, z)]
    }

    #[inline]
    pub fn set_local(&mut self, x: usize, y: usize, z: usize, id: MaterialId) {
        self.blocks[Self::idx(x, y, z)] = id;
    }

    /// World position of local voxel `(0,0,0)`.
    #[inline]
    pub fn origin(&self) -> (i32, i32, i32) {
        self.coord.origin()
    }

    #[inline]
    pub fn contains_world(&self, wx: i32, wy: i32, wz: i32) -> bool {
        split_world(wx, wy, wz).0 == self.coord
    }

    #[inline]
    pub fn get_world(&self, wx: i32, wy: i32, wz: i32) -> Option<MaterialId> {
        let (coord, (lx, ly, lz)) = split_world(wx, wy, wz);
        (coord == self.coord).then(|| self.get_local(lx, ly, lz))
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.blocks
    }

    #[inline]
    pub fn has_non_air(&self) -> bool {
        self.blocks.iter().any(|&b| b != AIR)
    }

    #[inline]
    pub fn is_all_air(&self) -> bool {
        !self.has_non_air()
    }
}

/// Self-describing `{cx, cy, cz, data}` entry used by exports and by the wire protocol.
/// `data` is base64 text in every serialized form.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub cx: i32,
    pub cy: i32,
    pub cz: i32,
    #[serde(with = "encoding::base64_bytes")]
    pub data: Vec<u8>,
}

impl ChunkRecord {
    #[inline]
    pub fn coord(&self) -> ChunkCoord {
        ChunkCoord::new(self.cx, self.cy, self.cz)
    }
}

impl From<&ChunkBuf> for ChunkRecord {
    fn from(buf: &ChunkBuf) -> Self {
        ChunkRecord {
            cx: buf.coord.cx,
            cy: buf.coord.cy,
            cz: buf.coord.cz,
            data: buf.blocks.to_vec(),
        }
    }
}
