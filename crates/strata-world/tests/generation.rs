use proptest::prelude::*;
use strata_blocks::{AIR, BEDROCK, GRASS, METAL};
use strata_chunk::{CHUNK_SIZE, ChunkCoord};
use strata_world::{MIN_HEIGHT, TerrainGen, hash_seed};

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    // same seed + coordinate always yields identical bytes
    #[test]
    fn generation_is_deterministic(seed in ".{0,12}", cx in -64i32..64, cy in -1i32..4, cz in -64i32..64) {
        let coord = ChunkCoord::new(cx, cy, cz);
        let a = TerrainGen::from_seed_str(&seed).generate(coord);
        let b = TerrainGen::new(hash_seed(&seed)).generate(coord);
        prop_assert_eq!(a, b);
    }
}

#[test]
fn bedrock_floor_covers_chunk_zero() {
    let g = TerrainGen::from_seed_str("floor");
    let buf = g.generate(ChunkCoord::new(3, 0, -2));
    for z in 0..CHUNK_SIZE {
        for x in 0..CHUNK_SIZE {
            assert_eq!(buf.get_local(x, MIN_HEIGHT as usize, z), BEDROCK);
        }
    }
}

#[test]
fn chunks_below_bounds_are_empty() {
    let g = TerrainGen::from_seed_str("deep");
    assert!(g.generate(ChunkCoord::new(0, -1, 0)).is_all_air());
    assert!(g.generate(ChunkCoord::new(0, 8, 0)).is_all_air());
}

#[test]
fn surface_is_grass_capped() {
    let g = TerrainGen::from_seed_str("surface");
    let h = g.height_at(5, 9);
    let buf = g.generate(ChunkCoord::containing(5, h, 9));
    assert_eq!(buf.get_world(5, h, 9), Some(GRASS));
    if let Some(above) = buf.get_world(5, h + 1, 9) {
        assert_eq!(above, AIR);
    }
}

#[test]
fn some_chunk_gets_a_hut() {
    let g = TerrainGen::from_seed_str("huts");
    let coord = (-40..40)
        .flat_map(|cx| (-40..40).map(move |cz| (cx, cz)))
        .find(|&(cx, cz)| g.hash2d(cx, cz) > 0.9)
        .expect("a high-seed chunk in range");
    // the hut may straddle the cy=1 / cy=2 boundary
    let has_metal = (1..=2).any(|cy| {
        let buf = g.generate(ChunkCoord::new(coord.0, cy, coord.1));
        buf.blocks.iter().any(|&b| b == METAL)
    });
    assert!(has_metal);
}

#[test]
fn different_seeds_differ() {
    let coord = ChunkCoord::new(0, 1, 0);
    let a = TerrainGen::from_seed_str("one").generate(coord);
    let b = TerrainGen::from_seed_str("two").generate(coord);
    assert_ne!(a, b);
}
