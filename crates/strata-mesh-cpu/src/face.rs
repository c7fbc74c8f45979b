use strata_geom::Vec3;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Face {
    PosX,
    NegX,
    PosY,
    NegY,
    PosZ,
    NegZ,
}

impl Face {
    pub const ALL: [Face; 6] = [
        Face::PosX,
        Face::NegX,
        Face::PosY,
        Face::NegY,
        Face::PosZ,
        Face::NegZ,
    ];

    /// Integer grid step out of this face.
    #[inline]
    pub fn delta(self) -> (i32, i32, i32) {
        match self {
            Face::PosX => (1, 0, 0),
            Face::NegX => (-1, 0, 0),
            Face::PosY => (0, 1, 0),
            Face::NegY => (0, -1, 0),
            Face::PosZ => (0, 0, 1),
            Face::NegZ => (0, 0, -1),
        }
    }

    #[inline]
    pub fn normal(self) -> Vec3 {
        let (x, y, z) = self.delta();
        Vec3::new(x as f32, y as f32, z as f32)
    }

    /// Unit-cube corners of this face, counter-clockwise seen from outside.
    #[inline]
    pub fn corners(self) -> [[f32; 3]; 4] {
        match self {
            Face::PosX => [[1., 0., 0.], [1., 1., 0.], [1., 1., 1.], [1., 0., 1.]],
            Face::NegX => [[0., 0., 1.], [0., 1., 1.], [0., 1., 0.], [0., 0., 0.]],
            Face::PosY => [[0., 1., 1.], [1., 1., 1.], [1., 1., 0.], [0., 1., 0.]],
            Face::NegY => [[0., 0., 0.], [1., 0., 0.], [1., 0., 1.], [0., 0., 1.]],
            Face::PosZ => [[1., 0., 1.], [1., 1., 1.], [0., 1., 1.], [0., 0., 1.]],
            Face::NegZ => [[0., 0., 0.], [0., 1., 0.], [1., 1., 0.], [1., 0., 0.]],
        }
    }
}
