//! World / chunk manager: residency, edits, remeshing and persistence glue,
//! plus the ray cast and tools built on top of it.
#![forbid(unsafe_code)]

mod options;
pub mod raycast;
pub mod tools;
mod world;

pub use options::WorldOptions;
pub use raycast::{RayHit, raycast_voxels};
pub use world::{EditHook, VoxelEdit, World};
