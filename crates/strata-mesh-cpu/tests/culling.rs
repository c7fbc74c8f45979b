use std::collections::HashMap;

use proptest::prelude::*;
use strata_blocks::{AIR, BOMB, MaterialTable, STONE};
use strata_chunk::{CHUNK_SIZE, ChunkBuf, ChunkCoord, split_world};
use strata_mesh_cpu::{Face, NoNeighbors, build_chunk_mesh};
use strata_world::TerrainGen;

#[test]
fn solid_neighbor_across_chunk_border_culls_face() {
    let mut buf = ChunkBuf::empty(ChunkCoord::new(0, 0, 0));
    let edge = CHUNK_SIZE - 1;
    buf.set_local(edge, 2, 2, STONE);
    let s = CHUNK_SIZE as i32;
    // the +X neighbour lives in chunk (1,0,0)
    let beyond = move |wx: i32, wy: i32, wz: i32| {
        if (wx, wy, wz) == (s, 2, 2) { STONE } else { AIR }
    };
    let m = build_chunk_mesh(&buf, &beyond, MaterialTable::builtin()).unwrap();
    assert_eq!(m.face_count(), 5);
    let open = build_chunk_mesh(&buf, &NoNeighbors, MaterialTable::builtin()).unwrap();
    assert_eq!(open.face_count(), 6);
}

#[test]
fn bomb_neighbor_culls_like_any_non_air() {
    let mut buf = ChunkBuf::empty(ChunkCoord::new(0, 0, 0));
    buf.set_local(1, 1, 1, STONE);
    buf.set_local(1, 2, 1, BOMB);
    let m = build_chunk_mesh(&buf, &NoNeighbors, MaterialTable::builtin()).unwrap();
    assert_eq!(m.face_count(), 5);
}

#[test]
fn rebuilding_unchanged_chunk_is_identical() {
    let g = TerrainGen::from_seed_str("mesh");
    let coord = ChunkCoord::new(0, 1, 0);
    let buf = g.generate(coord);
    let around: HashMap<ChunkCoord, ChunkBuf> = [
        (1, 0, 0),
        (-1, 0, 0),
        (0, 1, 0),
        (0, -1, 0),
        (0, 0, 1),
        (0, 0, -1),
    ]
    .into_iter()
    .map(|(dx, dy, dz)| {
        let c = coord.offset(dx, dy, dz);
        (c, g.generate(c))
    })
    .collect();
    let query = |wx: i32, wy: i32, wz: i32| {
        let (c, (lx, ly, lz)) = split_world(wx, wy, wz);
        around.get(&c).map_or(AIR, |b| b.get_local(lx, ly, lz))
    };
    let a = build_chunk_mesh(&buf, &query, MaterialTable::builtin());
    let b = build_chunk_mesh(&buf, &query, MaterialTable::builtin());
    assert_eq!(a, b);
}

#[test]
fn full_chunk_only_shows_its_hull() {
    let mut buf = ChunkBuf::empty(ChunkCoord::new(0, 0, 0));
    buf.blocks.fill(STONE);
    let m = build_chunk_mesh(&buf, &NoNeighbors, MaterialTable::builtin()).unwrap();
    assert_eq!(m.face_count(), 6 * CHUNK_SIZE * CHUNK_SIZE);
}

fn exposed_faces(solid: &[(usize, usize, usize)]) -> usize {
    let set: std::collections::HashSet<_> = solid.iter().copied().collect();
    let mut n = 0;
    for &(x, y, z) in &set {
        for face in Face::ALL {
            let (dx, dy, dz) = face.delta();
            let (nx, ny, nz) = (x as i32 + dx, y as i32 + dy, z as i32 + dz);
            let covered = nx >= 0
                && ny >= 0
                && nz >= 0
                && set.contains(&(nx as usize, ny as usize, nz as usize));
            if !covered {
                n += 1;
            }
        }
    }
    n
}

proptest! {
    #[test]
    fn face_count_matches_exposed_faces(
        solid in proptest::collection::vec((0usize..6, 0usize..6, 0usize..6), 0..40)
    ) {
        let mut buf = ChunkBuf::empty(ChunkCoord::new(2, -1, 3));
        for &(x, y, z) in &solid {
            buf.set_local(x, y, z, STONE);
        }
        let faces = build_chunk_mesh(&buf, &NoNeighbors, MaterialTable::builtin())
            .map_or(0, |m| m.face_count());
        prop_assert_eq!(faces, exposed_faces(&solid));
    }
}
