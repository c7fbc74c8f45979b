use strata_blocks::{AIR, BEDROCK, DIRT, GRASS, STONE, WOOD};
use strata_chunk::{CHUNK_SIZE, ChunkBuf, ChunkCoord};

use crate::seed::hash_seed;
use crate::{MIN_HEIGHT, in_vertical_bounds, structure};

const BASE_HEIGHT: f64 = 62.0;
const STONE_DEPTH: i32 = 3;
const WOOD_PATCH_THRESHOLD: f64 = 0.7;

/// Seeded terrain sampler. Holds no other state, so clones on different
/// threads (or machines) produce identical chunks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TerrainGen {
    seed: u32,
}

impl TerrainGen {
    pub fn new(seed: u32) -> Self {
        Self { seed }
    }

    pub fn from_seed_str(seed: &str) -> Self {
        Self::new(hash_seed(seed))
    }

    #[inline]
    pub fn seed(&self) -> u32 {
        self.seed
    }

    /// Pseudo-random value in `[0, 1)` for an integer column.
    pub fn hash2d(&self, x: i32, z: i32) -> f64 {
        let seed = f64::from(self.seed);
        let s = ((f64::from(x) + seed * 0.01) * 127.1 + (f64::from(z) + seed * 0.02) * 311.7)
            .sin()
            * 43_758.545_312_3;
        s - s.floor()
    }

    fn smooth_noise(&self, x: i32, z: i32) -> f64 {
        let seed = f64::from(self.seed);
        let sx = f64::from(x) + seed * 0.1;
        let sz = f64::from(z) + seed * 0.1;
        let n = (sx * 0.12).sin() + (sz * 0.12).cos() + ((sx + sz) * 0.07).sin();
        n * 0.5
    }

    /// Surface height (topmost solid layer) of column `(wx, wz)`.
    pub fn height_at(&self, wx: i32, wz: i32) -> i32 {
        let seed = f64::from(self.seed);
        let hills = self.smooth_noise(wx, wz);
        let bumps = ((f64::from(wx) + seed) * 0.03).sin() * ((f64::from(wz) - seed) * 0.03).cos();
        (BASE_HEIGHT + hills * 4.0 + bumps * 3.0).floor() as i32
    }

    /// Column material at world height `wy` given the column's surface height.
    pub fn column_material(&self, wx: i32, wy: i32, wz: i32, surface: i32) -> u8 {
        if !in_vertical_bounds(wy) {
            return AIR;
        }
        if wy == MIN_HEIGHT {
            return BEDROCK;
        }
        if wy > surface {
            return AIR;
        }
        let depth = surface - wy;
        match depth {
            0 => GRASS,
            1 if self.hash2d(wx, wz) > WOOD_PATCH_THRESHOLD => WOOD,
            d if d > STONE_DEPTH => STONE,
            _ => DIRT,
        }
    }

    pub fn generate(&self, coord: ChunkCoord) -> ChunkBuf {
        let mut buf = ChunkBuf::empty(coord);
        self.fill(&mut buf);
        buf
    }

    /// Overwrites every voxel of `buf` with generated content. Chunks that
    /// are not addressable are left untouched.
    pub fn fill(&self, buf: &mut ChunkBuf) {
        if !buf.coord.is_addressable() {
            return;
        }
        let (x0, y0, z0) = buf.origin();
        for lz in 0..CHUNK_SIZE {
            for lx in 0..CHUNK_SIZE {
                let wx = x0 + lx as i32;
                let wz = z0 + lz as i32;
                let h = self.height_at(wx, wz);
                for ly in 0..CHUNK_SIZE {
                    let wy = y0 + ly as i32;
                    buf.set_local(lx, ly, lz, self.column_material(wx, wy, wz, h));
                }
            }
        }
        let chunk_seed = self.hash2d(buf.coord.cx, buf.coord.cz);
        structure::stamp_hut(self, buf, chunk_seed);
    }
}
