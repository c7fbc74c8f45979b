use serde::{Deserialize, Serialize};

use crate::CHUNK_SIZE;

const S: i32 = CHUNK_SIZE as i32;

/// Lowest chunk index on any axis. Chunks from [`MIN_CHUNK`] to [`MAX_CHUNK`]
/// have every voxel, and the one-voxel border around them, inside `i32`.
pub const MIN_CHUNK: i32 = i32::MIN / S + 1;
/// Highest chunk index on any axis.
pub const MAX_CHUNK: i32 = i32::MAX / S - 1;

#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct ChunkCoord {
    pub cx: i32,
    pub cy: i32,
    pub cz: i32,
}

impl ChunkCoord {
    #[inline]
    pub const fn new(cx: i32, cy: i32, cz: i32) -> Self {
        Self { cx, cy, cz }
    }

    /// Chunk containing world voxel `(wx, wy, wz)`.
    #[inline]
    pub fn containing(wx: i32, wy: i32, wz: i32) -> Self {
        Self::new(chunk_coord(wx), chunk_coord(wy), chunk_coord(wz))
    }

    /// True when every axis lies in `MIN_CHUNK..=MAX_CHUNK`.
    #[inline]
    pub fn is_addressable(self) -> bool {
        let range = MIN_CHUNK..=MAX_CHUNK;
        range.contains(&self.cx) && range.contains(&self.cy) && range.contains(&self.cz)
    }

    /// Saturates at the `i32` limits.
    #[inline]
    pub fn offset(self, dx: i32, dy: i32, dz: i32) -> Self {
        Self {
            cx: self.cx.saturating_add(dx),
            cy: self.cy.saturating_add(dy),
            cz: self.cz.saturating_add(dz),
        }
    }

    /// World position of the chunk's minimum corner; clamped to the `i32`
    /// limits for coordinates that are not addressable.
    #[inline]
    pub fn origin(self) -> (i32, i32, i32) {
        (
            self.cx.saturating_mul(S),
            self.cy.saturating_mul(S),
            self.cz.saturating_mul(S),
        )
    }

    #[inline]
    pub fn checked_origin(self) -> Option<(i32, i32, i32)> {
        Some((
            self.cx.checked_mul(S)?,
            self.cy.checked_mul(S)?,
            self.cz.checked_mul(S)?,
        ))
    }

    /// Chebyshev (max-axis) distance in chunks, saturating at `i32::MAX`.
    #[inline]
    pub fn chebyshev(self, other: ChunkCoord) -> i32 {
        let d = self
            .cx
            .abs_diff(other.cx)
            .max(self.cy.abs_diff(other.cy))
            .max(self.cz.abs_diff(other.cz));
        i32::try_from(d).unwrap_or(i32::MAX)
    }

    #[inline]
    pub fn distance_sq(self, other: ChunkCoord) -> i64 {
        let dx = i64::from(self.cx) - i64::from(other.cx);
        let dy = i64::from(self.cy) - i64::from(other.cy);
        let dz = i64::from(self.cz) - i64::from(other.cz);
        dx * dx + dy * dy + dz * dz
    }
}

impl From<(i32, i32, i32)> for ChunkCoord {
    fn from(value: (i32, i32, i32)) -> Self {
        Self::new(value.0, value.1, value.2)
    }
}

impl From<ChunkCoord> for (i32, i32, i32) {
    fn from(value: ChunkCoord) -> Self {
        (value.cx, value.cy, value.cz)
    }
}

impl std::fmt::Display for ChunkCoord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {}, {})", self.cx, self.cy, self.cz)
    }
}

/// Floor division of a world coordinate by the chunk size.
#[inline]
pub fn chunk_coord(v: i32) -> i32 {
    v.div_euclid(S)
}

/// Position of a world coordinate inside its chunk, always in `0..CHUNK_SIZE`.
#[inline]
pub fn local_coord(v: i32) -> usize {
    v.rem_euclid(S) as usize
}

#[inline]
pub fn split_world(wx: i32, wy: i32, wz: i32) -> (ChunkCoord, (usize, usize, usize)) {
    (
        ChunkCoord::containing(wx, wy, wz),
        (local_coord(wx), local_coord(wy), local_coord(wz)),
    )
}
