//! Deterministic terrain generation and the world's vertical bounds.
#![forbid(unsafe_code)]

mod seed;
mod structure;
mod terrain;

pub use seed::{DEFAULT_SEED, hash_seed};
pub use terrain::TerrainGen;

/// Lowest editable layer; always bedrock.
pub const MIN_HEIGHT: i32 = 0;
/// Highest editable layer.
pub const MAX_HEIGHT: i32 = 255;

#[inline]
pub fn in_vertical_bounds(wy: i32) -> bool {
    (MIN_HEIGHT..=MAX_HEIGHT).contains(&wy)
}
