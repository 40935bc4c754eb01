//! Axis-aligned bounding boxes and frustum intersection tests.

use glam::{Mat4, Vec3, Vec4};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisAlignedBox {
    pub min: Vec3,
    pub max: Vec3,
}

impl AxisAlignedBox {
    pub const INVALID: AxisAlignedBox =
        AxisAlignedBox { min: Vec3::splat(f32::MAX), max: Vec3::splat(f32::MIN) };

    /// An unbounded box, used for directional lights (§4.8 phase 6).
    pub const INFINITE: AxisAlignedBox =
        AxisAlignedBox { min: Vec3::splat(f32::NEG_INFINITY), max: Vec3::splat(f32::INFINITY) };

    pub fn from_min_max(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    pub fn from_center_half_extent(center: Vec3, half_extent: Vec3) -> Self {
        Self { min: center - half_extent, max: center + half_extent }
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn half_extent(&self) -> Vec3 {
        (self.max - self.min) * 0.5
    }

    pub fn is_valid(&self) -> bool {
        self.min.x <= self.max.x && self.min.y <= self.max.y && self.min.z <= self.max.z
    }

    pub fn union(&self, other: &AxisAlignedBox) -> AxisAlignedBox {
        AxisAlignedBox { min: self.min.min(other.min), max: self.max.max(other.max) }
    }

    pub fn encapsulate(&mut self, point: Vec3) {
        self.min = self.min.min(point);
        self.max = self.max.max(point);
    }

    /// Transforms the eight corners by `m` and rebuilds an AABB around them (§4.8 phase 5).
    pub fn transformed(&self, m: &Mat4) -> AxisAlignedBox {
        let mut result = AxisAlignedBox::INVALID;
        for dx in [self.min.x, self.max.x] {
            for dy in [self.min.y, self.max.y] {
                for dz in [self.min.z, self.max.z] {
                    let corner = m.transform_point3(Vec3::new(dx, dy, dz));
                    result.encapsulate(corner);
                }
            }
        }
        result
    }

    /// AND-of-half-space containment test (§9 open question): true iff every axis interval
    /// contains `point`.
    pub fn contains_point(&self, point: Vec3) -> bool {
        point.x >= self.min.x
            && point.x <= self.max.x
            && point.y >= self.min.y
            && point.y <= self.max.y
            && point.z >= self.min.z
            && point.z <= self.max.z
    }

    /// The corner furthest along `normal`, used by the plane-extent frustum test (§4.9).
    fn positive_vertex(&self, normal: Vec3) -> Vec3 {
        Vec3::new(
            if normal.x >= 0.0 { self.max.x } else { self.min.x },
            if normal.y >= 0.0 { self.max.y } else { self.min.y },
            if normal.z >= 0.0 { self.max.z } else { self.min.z },
        )
    }

    /// True iff the box is not entirely on the negative side of any frustum plane. Each plane
    /// is `(normal, distance)` with `dot(normal, p) + distance >= 0` meaning "inside" (§4.9,
    /// §9: AND-of-half-space, not the OR-of-disjunctions form the source used).
    pub fn intersects_frustum(&self, frustum: &Frustum) -> bool {
        for plane in &frustum.planes {
            let normal = plane.truncate();
            let furthest = self.positive_vertex(normal);
            if normal.dot(furthest) + plane.w < 0.0 {
                return false;
            }
        }
        true
    }
}

impl Default for AxisAlignedBox {
    fn default() -> Self {
        AxisAlignedBox::INVALID
    }
}

/// Six half-spaces `(nx, ny, nz, d)` with the interior defined by `dot(n, p) + d >= 0`,
/// extracted from a view-projection matrix (§4.8 phase 7, §9 frustum-plane chirality).
#[derive(Debug, Clone, Copy)]
pub struct Frustum {
    /// Left, right, bottom, top, near, far.
    pub planes: [Vec4; 6],
}

impl Frustum {
    /// Gribb/Hartmann plane extraction from an untransposed view-projection matrix, consistent
    /// with the reversed-Z + `Greater`/`GreaterEqual` depth convention used everywhere else in
    /// this crate's camera math.
    pub fn from_view_projection(vp: &Mat4) -> Self {
        let row0 = vp.row(0);
        let row1 = vp.row(1);
        let row2 = vp.row(2);
        let row3 = vp.row(3);

        let left = (row3 + row0).normalize_plane();
        let right = (row3 - row0).normalize_plane();
        let bottom = (row3 + row1).normalize_plane();
        let top = (row3 - row1).normalize_plane();
        let near = row2.normalize_plane();
        let far = (row3 - row2).normalize_plane();

        Self { planes: [left, right, bottom, top, near, far] }
    }
}

trait NormalizePlane {
    fn normalize_plane(self) -> Vec4;
}

impl NormalizePlane for Vec4 {
    fn normalize_plane(self) -> Vec4 {
        let len = self.truncate().length();
        if len > 1e-8 {
            self / len
        } else {
            self
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn union_grows_to_cover_both_boxes() {
        let a = AxisAlignedBox::from_min_max(Vec3::ZERO, Vec3::ONE);
        let b = AxisAlignedBox::from_min_max(Vec3::splat(-1.0), Vec3::splat(0.5));
        let u = a.union(&b);
        assert_eq!(u.min, Vec3::splat(-1.0));
        assert_eq!(u.max, Vec3::ONE);
    }

    #[test]
    fn transformed_translates_box() {
        let b = AxisAlignedBox::from_center_half_extent(Vec3::ZERO, Vec3::splat(1.0));
        let m = Mat4::from_translation(Vec3::new(10.0, 0.0, 0.0));
        let t = b.transformed(&m);
        assert!((t.center() - Vec3::new(10.0, 0.0, 0.0)).length() < 1e-5);
    }

    #[test]
    fn box_in_front_of_camera_intersects_frustum() {
        let proj = Mat4::perspective_rh(60f32.to_radians(), 1.0, 0.1, 100.0);
        let view = Mat4::look_at_rh(Vec3::new(0.0, 0.0, -5.0), Vec3::ZERO, Vec3::Y);
        let frustum = Frustum::from_view_projection(&(proj * view));
        let visible = AxisAlignedBox::from_center_half_extent(Vec3::ZERO, Vec3::splat(0.5));
        assert!(visible.intersects_frustum(&frustum));
    }

    #[test]
    fn box_far_to_the_side_is_culled() {
        let proj = Mat4::perspective_rh(60f32.to_radians(), 1.0, 0.1, 100.0);
        let view = Mat4::look_at_rh(Vec3::new(0.0, 0.0, -5.0), Vec3::ZERO, Vec3::Y);
        let frustum = Frustum::from_view_projection(&(proj * view));
        let offscreen = AxisAlignedBox::from_center_half_extent(
            Vec3::new(500.0, 0.0, 0.0),
            Vec3::splat(0.5),
        );
        assert!(!offscreen.intersects_frustum(&frustum));
    }
}
