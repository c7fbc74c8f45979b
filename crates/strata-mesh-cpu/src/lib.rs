//! CPU surface extraction: one quad per visible voxel face.
#![forbid(unsafe_code)]

mod build;
mod face;
mod mesh_build;
mod neighbors;

pub use build::{ChunkMesh, build_chunk_mesh};
pub use face::Face;
pub use mesh_build::MeshBuild;
pub use neighbors::{NeighborQuery, NoNeighbors};
