//! Dig, build and bomb tools operating on a [`World`].

use strata_blocks::{AIR, BOMB, MaterialId, MaterialTable};
use strata_geom::Vec3;

use crate::{RayHit, World};

/// Radius of a detonating bomb's blast, in voxels.
pub const EXPLOSION_RADIUS: f32 = 3.6;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tool {
    Pickaxe,
    Blaster,
    BombPlacer,
}

impl Tool {
    /// Dig radius of the primary action.
    #[inline]
    pub fn radius(self) -> f32 {
        match self {
            Tool::Pickaxe => 0.7,
            Tool::Blaster => 1.5,
            Tool::BombPlacer => 0.9,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Tool::Pickaxe => "Pickaxe",
            Tool::Blaster => "Blaster",
            Tool::BombPlacer => "Bomb",
        }
    }
}

/// Clears every voxel whose integer coordinate lies within `radius` of
/// `center`. Returns how many writes were accepted.
fn clear_sphere(world: &mut World, center: Vec3, radius: f32) -> usize {
    let r2 = radius * radius;
    let lo = (center - Vec3::new(radius, radius, radius)).voxel();
    let hi = (center + Vec3::new(radius, radius, radius)).voxel();
    let mut cleared = 0;
    for y in lo.1..=hi.1 {
        for z in lo.2..=hi.2 {
            for x in lo.0..=hi.0 {
                let d = Vec3::new(x as f32, y as f32, z as f32) - center;
                if d.dot(d) <= r2 && world.set_voxel(x, y, z, AIR) {
                    cleared += 1;
                }
            }
        }
    }
    cleared
}

pub fn carve_sphere(world: &mut World, center: (i32, i32, i32), radius: f32) -> usize {
    let c = Vec3::new(center.0 as f32, center.1 as f32, center.2 as f32);
    clear_sphere(world, c, radius)
}

/// Builds `id` on the face of `hit` the ray entered through.
pub fn place_adjacent(world: &mut World, hit: &RayHit, id: MaterialId) -> bool {
    let (x, y, z) = hit.adjacent();
    world.set_voxel(x, y, z, id)
}

/// Selected tool plus the selected build material.
#[derive(Clone, Copy, Debug)]
pub struct Toolbelt {
    tool: Tool,
    material_index: usize,
}

impl Default for Toolbelt {
    fn default() -> Self {
        // stone
        Self {
            tool: Tool::Pickaxe,
            material_index: 1,
        }
    }
}

impl Toolbelt {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn tool(&self) -> Tool {
        self.tool
    }

    pub fn select(&mut self, tool: Tool) {
        self.tool = tool;
    }

    /// Steps through the placeable materials, wrapping in both directions.
    pub fn cycle_material(&mut self, delta: i32) {
        let n = MaterialTable::builtin().placeable().count() as i64;
        if n == 0 {
            return;
        }
        self.material_index = (self.material_index as i64 + i64::from(delta)).rem_euclid(n) as usize;
    }

    pub fn current_material(&self) -> MaterialId {
        let table = MaterialTable::builtin();
        table
            .placeable()
            .nth(self.material_index)
            .or_else(|| table.placeable().next())
            .map_or(AIR, |m| m.id)
    }

    /// Digs around the hit voxel with the current tool's radius.
    pub fn apply_primary(&self, world: &mut World, hit: Option<&RayHit>) -> bool {
        let Some(hit) = hit else {
            return false;
        };
        carve_sphere(world, hit.voxel, self.tool.radius());
        true
    }

    /// Builds the current material next to the hit voxel.
    pub fn apply_secondary(&self, world: &mut World, hit: Option<&RayHit>) -> bool {
        hit.is_some_and(|h| place_adjacent(world, h, self.current_material()))
    }
}

/// Bombs placed in the world and waiting for detonation.
#[derive(Clone, Debug, Default)]
pub struct Explosions {
    bombs: Vec<(i32, i32, i32)>,
}

impl Explosions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> &[(i32, i32, i32)] {
        &self.bombs
    }

    /// Marks an empty voxel as a bomb. Occupied voxels are refused.
    pub fn place_bomb(&mut self, world: &mut World, at: (i32, i32, i32)) -> bool {
        if world.voxel(at.0, at.1, at.2) != AIR {
            return false;
        }
        if !world.set_voxel(at.0, at.1, at.2, BOMB) {
            return false;
        }
        self.bombs.push(at);
        true
    }

    /// Clears every bomb and blasts a sphere around each. Returns the bomb count.
    pub fn detonate_all(&mut self, world: &mut World) -> usize {
        let bombs = std::mem::take(&mut self.bombs);
        for &(x, y, z) in &bombs {
            world.set_voxel(x, y, z, AIR);
            clear_sphere(world, Vec3::voxel_center(x, y, z), EXPLOSION_RADIUS);
        }
        if !bombs.is_empty() {
            log::debug!("detonated {} bombs", bombs.len());
        }
        bombs.len()
    }
}
