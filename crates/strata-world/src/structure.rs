use strata_blocks::{METAL, WOOD};
use strata_chunk::{CHUNK_SIZE, ChunkBuf};

use crate::terrain::TerrainGen;

/// Chunks whose column hash exceeds this get a hut.
pub const STRUCTURE_THRESHOLD: f64 = 0.82;

/// Stamps a hollow metal-framed wooden box centred on the chunk footprint.
/// Only the part that falls inside `buf` is written, so vertically adjacent
/// chunks each stamp their own slice of the same hut.
pub(crate) fn stamp_hut(terrain: &TerrainGen, buf: &mut ChunkBuf, chunk_seed: f64) {
    if chunk_seed < STRUCTURE_THRESHOLD {
        return;
    }
    let size = 6 + (chunk_seed * 4.0).floor() as i32;
    let height = 6 + (chunk_seed * 6.0).floor() as i32;
    let (x0, y0, z0) = buf.origin();
    let half = CHUNK_SIZE as f64 / 2.0 - f64::from(size) / 2.0;
    let base_x = (f64::from(x0) + half).floor() as i32;
    let base_z = (f64::from(z0) + half).floor() as i32;
    let base_y = terrain.height_at(base_x, base_z);
    let s = CHUNK_SIZE as i32;

    for y in 0..height {
        for z in 0..size {
            for x in 0..size {
                let lx = base_x + x - x0;
                let ly = base_y + y - y0;
                let lz = base_z + z - z0;
                if !(0..s).contains(&lx) || !(0..s).contains(&ly) || !(0..s).contains(&lz) {
                    continue;
                }
                let frame = x == 0 || z == 0 || x == size - 1 || z == size - 1 || y == height - 1;
                let id = if frame { METAL } else { WOOD };
                buf.set_local(lx as usize, ly as usize, lz as usize, id);
            }
        }
    }
}
