use strata_blocks::{AIR, BOMB, MaterialTable};
use strata_chunk::{CHUNK_SIZE, ChunkBuf, ChunkCoord};
use strata_geom::{Aabb, Vec3};

use crate::face::Face;
use crate::mesh_build::MeshBuild;
use crate::neighbors::NeighborQuery;

/// Surface of one chunk in chunk-local units; place it at `coord.origin()`.
#[derive(Clone, Debug, PartialEq)]
pub struct ChunkMesh {
    pub coord: ChunkCoord,
    pub mesh: MeshBuild,
    pub bbox: Aabb,
}

impl ChunkMesh {
    #[inline]
    pub fn face_count(&self) -> usize {
        self.mesh.quad_count()
    }
}

/// Emits a quad for every face of a solid voxel whose neighbour is air.
/// Neighbours outside `buf` come from `neighbors`. Air and bomb voxels emit
/// nothing. Returns `None` when no face is visible or the chunk is not
/// addressable.
pub fn build_chunk_mesh(
    buf: &ChunkBuf,
    neighbors: &impl NeighborQuery,
    materials: &MaterialTable,
) -> Option<ChunkMesh> {
    if !buf.coord.is_addressable() {
        return None;
    }
    let s = CHUNK_SIZE as i32;
    let (x0, y0, z0) = buf.origin();
    let mut mesh = MeshBuild::default();
    let mut bbox: Option<Aabb> = None;

    for y in 0..s {
        for z in 0..s {
            for x in 0..s {
                let id = buf.get_local(x as usize, y as usize, z as usize);
                if id == AIR || id == BOMB {
                    continue;
                }
                let rgb = materials.color(id);
                let origin = Vec3::new(x as f32, y as f32, z as f32);
                for face in Face::ALL {
                    let (dx, dy, dz) = face.delta();
                    let (nx, ny, nz) = (x + dx, y + dy, z + dz);
                    let inside = (0..s).contains(&nx) && (0..s).contains(&ny) && (0..s).contains(&nz);
                    let neighbor = if inside {
                        buf.get_local(nx as usize, ny as usize, nz as usize)
                    } else {
                        neighbors.voxel(x0 + nx, y0 + ny, z0 + nz)
                    };
                    if neighbor != AIR {
                        continue;
                    }
                    mesh.add_face(face, origin, rgb);
                    let far = origin + Vec3::new(1.0, 1.0, 1.0);
                    bbox = Some(match bbox {
                        Some(b) => b.expanded_to(origin).expanded_to(far),
                        None => Aabb::new(origin, far),
                    });
                }
            }
        }
    }

    let bbox = bbox?;
    Some(ChunkMesh {
        coord: buf.coord,
        mesh,
        bbox,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::neighbors::NoNeighbors;
    use strata_blocks::{DIRT, STONE};

    fn single(id: u8, at: (usize, usize, usize)) -> ChunkBuf {
        let mut buf = ChunkBuf::empty(ChunkCoord::new(0, 0, 0));
        buf.set_local(at.0, at.1, at.2, id);
        buf
    }

    #[test]
    fn isolated_voxel_has_six_faces() {
        let buf = single(STONE, (4, 5, 6));
        let m = build_chunk_mesh(&buf, &NoNeighbors, MaterialTable::builtin()).unwrap();
        assert_eq!(m.face_count(), 6);
        assert_eq!(m.mesh.vertex_count(), 24);
        assert_eq!(m.bbox, Aabb::new(Vec3::new(4., 5., 6.), Vec3::new(5., 6., 7.)));
    }

    #[test]
    fn empty_chunk_yields_none() {
        let buf = ChunkBuf::empty(ChunkCoord::new(1, 1, 1));
        assert!(build_chunk_mesh(&buf, &NoNeighbors, MaterialTable::builtin()).is_none());
    }

    #[test]
    fn bomb_only_chunk_yields_none() {
        let buf = single(BOMB, (0, 0, 0));
        assert!(build_chunk_mesh(&buf, &NoNeighbors, MaterialTable::builtin()).is_none());
    }

    #[test]
    fn shared_face_is_culled() {
        let mut buf = single(DIRT, (3, 3, 3));
        buf.set_local(4, 3, 3, DIRT);
        let m = build_chunk_mesh(&buf, &NoNeighbors, MaterialTable::builtin()).unwrap();
        assert_eq!(m.face_count(), 10);
    }

    #[test]
    fn edge_of_the_grid_is_skipped() {
        let mut buf = ChunkBuf::empty(ChunkCoord::new(i32::MIN / CHUNK_SIZE as i32, 0, 0));
        buf.set_local(0, 0, 0, STONE);
        assert!(build_chunk_mesh(&buf, &NoNeighbors, MaterialTable::builtin()).is_none());
    }

    #[test]
    fn colors_come_from_material_table() {
        let buf = single(DIRT, (0, 0, 0));
        let table = MaterialTable::builtin();
        let m = build_chunk_mesh(&buf, &NoNeighbors, table).unwrap();
        assert_eq!(&m.mesh.col[..3], &table.color(DIRT));
    }
}
