//! Material catalog shared by generation, meshing and editing.
#![forbid(unsafe_code)]

pub mod material;

pub use material::{Material, MaterialId, MaterialTable};

/// Empty space.
pub const AIR: MaterialId = 0;
pub const DIRT: MaterialId = 1;
pub const STONE: MaterialId = 2;
pub const WOOD: MaterialId = 3;
pub const METAL: MaterialId = 4;
pub const GRASS: MaterialId = 5;
/// Transient marker for a placed, not yet detonated bomb. Never meshed.
pub const BOMB: MaterialId = 6;
/// Floor material at the bottom of the world. Cannot be cleared.
pub const BEDROCK: MaterialId = 7;
