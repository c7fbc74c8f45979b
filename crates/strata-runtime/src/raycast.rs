use strata_blocks::{AIR, MaterialId};
use strata_geom::Vec3;

/// Hard cap on DDA steps regardless of distance.
pub const MAX_STEPS: usize = 512;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RayHit {
    /// Voxel that was hit.
    pub voxel: (i32, i32, i32),
    /// Outward normal of the face the ray entered through; zero when the
    /// ray starts inside a solid voxel.
    pub normal: (i32, i32, i32),
    pub id: MaterialId,
    pub distance: f32,
}

impl RayHit {
    /// Empty voxel on the entered face, where a build lands.
    #[inline]
    pub fn adjacent(&self) -> (i32, i32, i32) {
        (
            self.voxel.0 + self.normal.0,
            self.voxel.1 + self.normal.1,
            self.voxel.2 + self.normal.2,
        )
    }
}

#[inline]
fn inv_or_max(v: f32) -> f32 {
    if v.abs() < 1e-8 { f32::MAX } else { 1.0 / v.abs() }
}

#[inline]
fn step_of(v: f32) -> i32 {
    if v > 0.0 {
        1
    } else if v < 0.0 {
        -1
    } else {
        0
    }
}

/// First non-air voxel along `dir` from `origin` within `max_dist`.
/// `voxel_at` must not create chunks.
pub fn raycast_voxels<F>(origin: Vec3, dir: Vec3, max_dist: f32, mut voxel_at: F) -> Option<RayHit>
where
    F: FnMut(i32, i32, i32) -> MaterialId,
{
    let len = dir.length();
    if len < 1e-6 {
        return None;
    }
    let d = dir / len;

    let (mut vx, mut vy, mut vz) = origin.voxel();
    let (stepx, stepy, stepz) = (step_of(d.x), step_of(d.y), step_of(d.z));

    let (invx, invy, invz) = (inv_or_max(d.x), inv_or_max(d.y), inv_or_max(d.z));
    let tdx = if stepx == 0 { f32::MAX } else { invx };
    let tdy = if stepy == 0 { f32::MAX } else { invy };
    let tdz = if stepz == 0 { f32::MAX } else { invz };

    let fx = origin.x - origin.x.floor();
    let fy = origin.y - origin.y.floor();
    let fz = origin.z - origin.z.floor();
    let first = |step: i32, frac: f32, inv: f32| match step {
        1 => (1.0 - frac) * inv,
        -1 => frac * inv,
        _ => f32::MAX,
    };
    let mut tmx = first(stepx, fx, invx);
    let mut tmy = first(stepy, fy, invy);
    let mut tmz = first(stepz, fz, invz);

    let mut normal = (0, 0, 0);
    let mut t = 0.0f32;

    for _ in 0..MAX_STEPS {
        if t > max_dist {
            break;
        }
        let id = voxel_at(vx, vy, vz);
        if id != AIR {
            return Some(RayHit {
                voxel: (vx, vy, vz),
                normal,
                id,
                distance: t,
            });
        }
        if tmx < tmy {
            if tmx < tmz {
                vx += stepx;
                t = tmx;
                tmx += tdx;
                normal = (-stepx, 0, 0);
            } else {
                vz += stepz;
                t = tmz;
                tmz += tdz;
                normal = (0, 0, -stepz);
            }
        } else if tmy < tmz {
            vy += stepy;
            t = tmy;
            tmy += tdy;
            normal = (0, -stepy, 0);
        } else {
            vz += stepz;
            t = tmz;
            tmz += tdz;
            normal = (0, 0, -stepz);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_blocks::STONE;

    fn floor_at(y0: i32) -> impl FnMut(i32, i32, i32) -> MaterialId {
        move |_x, y, _z| if y <= y0 { STONE } else { AIR }
    }

    #[test]
    fn straight_down_hits_top_face() {
        let hit = raycast_voxels(
            Vec3::new(0.5, 10.5, 0.5),
            Vec3::new(0.0, -1.0, 0.0),
            20.0,
            floor_at(3),
        )
        .unwrap();
        assert_eq!(hit.voxel, (0, 3, 0));
        assert_eq!(hit.normal, (0, 1, 0));
        assert_eq!(hit.adjacent(), (0, 4, 0));
        assert_eq!(hit.id, STONE);
        assert!((hit.distance - 6.5).abs() < 1e-4);
    }

    #[test]
    fn misses_beyond_max_distance() {
        let hit = raycast_voxels(
            Vec3::new(0.5, 10.5, 0.5),
            Vec3::new(0.0, -1.0, 0.0),
            3.0,
            floor_at(3),
        );
        assert!(hit.is_none());
    }

    #[test]
    fn negative_x_march_reports_positive_normal() {
        let wall = |x: i32, _y: i32, _z: i32| if x <= -5 { STONE } else { AIR };
        let hit = raycast_voxels(Vec3::new(0.5, 0.5, 0.5), Vec3::new(-1.0, 0.0, 0.0), 10.0, wall)
            .unwrap();
        assert_eq!(hit.voxel, (-5, 0, 0));
        assert_eq!(hit.normal, (1, 0, 0));
    }

    #[test]
    fn zero_direction_is_none() {
        assert!(raycast_voxels(Vec3::ZERO, Vec3::ZERO, 10.0, floor_at(0)).is_none());
    }
}
