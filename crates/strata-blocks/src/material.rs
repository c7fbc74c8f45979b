use std::collections::HashMap;
use std::sync::OnceLock;

use crate::{AIR, BEDROCK, BOMB, DIRT, GRASS, METAL, STONE, WOOD};

/// Material identifier stored in every voxel. `0` is empty.
pub type MaterialId = u8;

#[derive(Clone, Debug, PartialEq)]
pub struct Material {
    pub id: MaterialId,
    pub name: String,
    /// Flat linear RGB in `[0, 1]`.
    pub color: [f32; 3],
    /// Whether the player can build with it.
    pub placeable: bool,
}

/// Ordered, immutable catalog of materials.
#[derive(Clone, Debug)]
pub struct MaterialTable {
    materials: Vec<Material>,
    by_name: HashMap<String, MaterialId>,
}

const fn rgb(hex: u32) -> [f32; 3] {
    [
        ((hex >> 16) & 0xff) as f32 / 255.0,
        ((hex >> 8) & 0xff) as f32 / 255.0,
        (hex & 0xff) as f32 / 255.0,
    ]
}

const BUILTIN: [(MaterialId, &str, u32); 8] = [
    (AIR, "air", 0x000000),
    (DIRT, "dirt", 0x8b5a2b),
    (STONE, "stone", 0x7f8796),
    (WOOD, "wood", 0xb1824a),
    (METAL, "metal", 0x9fb8c6),
    (GRASS, "grass", 0x4e9c54),
    (BOMB, "bomb", 0xff5f52),
    (BEDROCK, "bedrock", 0x3a3a40),
];

impl MaterialTable {
    /// Catalog used by every world in the process.
    pub fn builtin() -> &'static MaterialTable {
        static TABLE: OnceLock<MaterialTable> = OnceLock::new();
        TABLE.get_or_init(|| {
            let materials: Vec<Material> = BUILTIN
                .iter()
                .map(|&(id, name, hex)| Material {
                    id,
                    name: name.to_string(),
                    color: rgb(hex),
                    placeable: !matches!(id, AIR | BOMB | BEDROCK),
                })
                .collect();
            let by_name = materials
                .iter()
                .map(|m| (m.name.clone(), m.id))
                .collect();
            MaterialTable { materials, by_name }
        })
    }

    #[inline]
    pub fn get(&self, id: MaterialId) -> Option<&Material> {
        self.materials.get(id as usize)
    }

    pub fn id_by_name(&self, name: &str) -> Option<MaterialId> {
        self.by_name.get(name).copied()
    }

    /// Color for `id`, falling back to the empty material's color for unknown ids.
    #[inline]
    pub fn color(&self, id: MaterialId) -> [f32; 3] {
        self.get(id).unwrap_or(&self.materials[0]).color
    }

    pub fn len(&self) -> usize {
        self.materials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Material> {
        self.materials.iter()
    }

    /// Materials a player may place, in catalog order.
    pub fn placeable(&self) -> impl Iterator<Item = &Material> {
        self.materials.iter().filter(|m| m.placeable)
    }
}
