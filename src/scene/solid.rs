use glam::{Mat4, Quat, Vec3};

use crate::selection::{Selectable, Volume};
use crate::util::math::Aabb;
use crate::util::space::{rigid_rotation, snap_to_grid};

/// A convex brush: shared vertex positions plus polygon faces indexing them.
/// Faces wind counter-clockwise when seen from outside.
#[derive(Debug, Clone, PartialEq)]
pub struct Solid {
    pub vertices: Vec<Vec3>,
    pub faces: Vec<Vec<u32>>,
    pub volume: Volume,
    /// Accumulated rotation since creation; the brush's local frame.
    pub orientation: Quat,
    deleted: bool,
}

impl Solid {
    pub fn new(vertices: Vec<Vec3>, faces: Vec<Vec<u32>>, volume: Volume) -> Self {
        Self {
            vertices,
            faces,
            volume,
            orientation: Quat::IDENTITY,
            deleted: false,
        }
    }

    /// Axis-aligned box brush spanning `min`..`max`.
    pub fn cuboid(min: Vec3, max: Vec3) -> Self {
        let vertices = Aabb::new(min, max).corners().to_vec();
        let faces = vec![
            vec![0, 3, 2, 1], // -Z
            vec![4, 5, 6, 7], // +Z
            vec![0, 1, 5, 4], // -Y
            vec![3, 7, 6, 2], // +Y
            vec![0, 4, 7, 3], // -X
            vec![1, 2, 6, 5], // +X
        ];
        Self::new(vertices, faces, Volume::Solid)
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    /// Fan-triangulated faces with their normals. Out-of-range indices and
    /// degenerate faces are skipped.
    pub fn triangles(&self) -> Vec<([Vec3; 3], Vec3)> {
        let mut tris = Vec::new();
        for face in &self.faces {
            let Some(points) = face
                .iter()
                .map(|&i| self.vertices.get(i as usize).copied())
                .collect::<Option<Vec<_>>>()
            else {
                continue;
            };
            if points.len() < 3 {
                continue;
            }
            let normal = (points[1] - points[0]).cross(points[2] - points[0]).normalize_or_zero();
            for i in 1..points.len() - 1 {
                tris.push(([points[0], points[i], points[i + 1]], normal));
            }
        }
        tris
    }

    /// Unique edges as vertex index pairs, for outlines.
    pub fn edges(&self) -> Vec<(u32, u32)> {
        let mut edges = Vec::new();
        for face in &self.faces {
            for (i, &a) in face.iter().enumerate() {
                let b = face[(i + 1) % face.len()];
                let edge = (a.min(b), a.max(b));
                if !edges.contains(&edge) {
                    edges.push(edge);
                }
            }
        }
        edges
    }
}

impl Selectable for Solid {
    fn selection_bounds(&self) -> Option<Aabb> {
        Aabb::from_points(self.vertices.iter().copied())
    }

    fn selection_transform(&mut self, matrix: &Mat4) {
        for v in &mut self.vertices {
            *v = matrix.transform_point3(*v);
        }
        self.orientation = (rigid_rotation(matrix) * self.orientation).normalize();
    }

    fn selection_delete(&mut self) {
        self.deleted = true;
    }

    /// Move the brush so its bounds' minimum corner lands on the grid.
    fn selection_align_to_grid(&mut self, grid_size: Vec3) {
        let Some(bounds) = self.selection_bounds() else { return };
        let offset = snap_to_grid(bounds.min, grid_size) - bounds.min;
        for v in &mut self.vertices {
            *v += offset;
        }
    }

    fn selection_set_volume(&mut self, volume: Volume) {
        self.volume = volume;
    }

    fn selection_orientation(&self) -> Quat {
        self.orientation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cuboid_faces_point_outward() {
        let solid = Solid::cuboid(Vec3::ZERO, Vec3::splat(64.0));
        let center = Vec3::splat(32.0);
        let tris = solid.triangles();
        assert_eq!(tris.len(), 12);
        for (tri, normal) in tris {
            let face_center = (tri[0] + tri[1] + tri[2]) / 3.0;
            assert!(normal.dot(face_center - center) > 0.0);
        }
        assert_eq!(solid.edges().len(), 12);
    }

    #[test]
    fn transform_moves_vertices_and_tracks_rotation() {
        let mut solid = Solid::cuboid(Vec3::ZERO, Vec3::ONE);
        solid.selection_transform(&Mat4::from_translation(Vec3::new(5.0, 0.0, 0.0)));
        assert_eq!(solid.selection_bounds().unwrap().min, Vec3::new(5.0, 0.0, 0.0));

        let spin = Quat::from_rotation_y(0.5);
        solid.selection_transform(&Mat4::from_quat(spin));
        assert!(solid.orientation.abs_diff_eq(spin, 1e-5));
    }

    #[test]
    fn local_stretch_keeps_orientation() {
        let turn = Quat::from_rotation_y(0.6);
        let mut solid = Solid::cuboid(Vec3::ZERO, Vec3::splat(64.0));
        solid.selection_transform(&Mat4::from_quat(turn));

        let frame = Mat4::from_quat(turn);
        let stretch = frame * Mat4::from_scale(Vec3::new(2.0, 1.0, 1.0)) * frame.inverse();
        solid.selection_transform(&stretch);
        solid.selection_transform(&stretch);
        assert!(solid.orientation.abs_diff_eq(turn, 1e-5));
    }

    #[test]
    fn align_to_grid_snaps_min_corner() {
        let mut solid = Solid::cuboid(Vec3::new(3.0, -5.0, 70.0), Vec3::new(67.0, 59.0, 134.0));
        solid.selection_align_to_grid(Vec3::splat(64.0));
        let bounds = solid.selection_bounds().unwrap();
        assert_eq!(bounds.min, Vec3::new(0.0, 0.0, 64.0));
        assert_eq!(bounds.size(), Vec3::splat(64.0));
    }

    #[test]
    fn delete_marks_and_volume_sets() {
        let mut solid = Solid::cuboid(Vec3::ZERO, Vec3::ONE);
        solid.selection_set_volume(Volume::Hollow);
        assert_eq!(solid.volume, Volume::Hollow);
        assert!(!solid.is_deleted());
        solid.selection_delete();
        assert!(solid.is_deleted());
    }

    #[test]
    fn bad_indices_are_skipped() {
        let solid = Solid::new(vec![Vec3::ZERO, Vec3::X, Vec3::Y], vec![vec![0, 1, 9], vec![0, 1, 2]], Volume::Solid);
        assert_eq!(solid.triangles().len(), 1);
    }
}
