use strata_blocks::{AIR, MaterialId};

/// Occupancy lookup for voxels just outside the chunk being meshed.
/// Implementations must not create or generate chunks.
pub trait NeighborQuery {
    fn voxel(&self, wx: i32, wy: i32, wz: i32) -> MaterialId;
}

impl<F> NeighborQuery for F
where
    F: Fn(i32, i32, i32) -> MaterialId,
{
    #[inline]
    fn voxel(&self, wx: i32, wy: i32, wz: i32) -> MaterialId {
        self(wx, wy, wz)
    }
}

/// Treats everything outside the chunk as air.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoNeighbors;

impl NeighborQuery for NoNeighbors {
    #[inline]
    fn voxel(&self, _wx: i32, _wy: i32, _wz: i32) -> MaterialId {
        AIR
    }
}
