use strata_geom::Vec3;

use crate::face::Face;

/// Flat vertex/index arrays ready for upload.
#[derive(Default, Clone, Debug, PartialEq)]
pub struct MeshBuild {
    pub pos: Vec<f32>,
    pub norm: Vec<f32>,
    pub col: Vec<f32>,
    pub idx: Vec<u32>,
}

impl MeshBuild {
    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.pos.len() / 3
    }

    #[inline]
    pub fn quad_count(&self) -> usize {
        self.idx.len() / 6
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.idx.is_empty()
    }

    /// Appends the unit quad for `face` of the voxel whose minimum corner is `origin`.
    pub fn add_face(&mut self, face: Face, origin: Vec3, rgb: [f32; 3]) {
        let base = self.vertex_count() as u32;
        let n = face.normal();
        for c in face.corners() {
            self.pos
                .extend_from_slice(&[origin.x + c[0], origin.y + c[1], origin.z + c[2]]);
            self.norm.extend_from_slice(&[n.x, n.y, n.z]);
            self.col.extend_from_slice(&rgb);
        }
        self.idx
            .extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }
}
