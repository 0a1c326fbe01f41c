use std::collections::BTreeMap;

use glam::{Mat4, Quat, Vec3};

use crate::selection::{Selectable, Volume};
use crate::util::math::Aabb;
use crate::util::space::{rigid_rotation, snap_to_grid};

/// Half-size of the box drawn and picked for a point entity.
pub const ENTITY_HALF_EXTENT: f32 = 8.0;

/// An entity placed at a single point (lights, spawn points, props).
#[derive(Debug, Clone, PartialEq)]
pub struct PointEntity {
    pub classname: String,
    pub origin: Vec3,
    pub orientation: Quat,
    pub properties: BTreeMap<String, String>,
    deleted: bool,
}

impl PointEntity {
    pub fn new(classname: impl Into<String>, origin: Vec3) -> Self {
        Self {
            classname: classname.into(),
            origin,
            orientation: Quat::IDENTITY,
            properties: BTreeMap::new(),
            deleted: false,
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted
    }
}

impl Selectable for PointEntity {
    fn selection_bounds(&self) -> Option<Aabb> {
        let half = Vec3::splat(ENTITY_HALF_EXTENT);
        Some(Aabb::new(self.origin - half, self.origin + half))
    }

    fn selection_transform(&mut self, matrix: &Mat4) {
        self.origin = matrix.transform_point3(self.origin);
        self.orientation = (rigid_rotation(matrix) * self.orientation).normalize();
    }

    fn selection_delete(&mut self) {
        self.deleted = true;
    }

    fn selection_align_to_grid(&mut self, grid_size: Vec3) {
        self.origin = snap_to_grid(self.origin, grid_size);
    }

    // Point entities have no volume.
    fn selection_set_volume(&mut self, _volume: Volume) {}

    fn selection_orientation(&self) -> Quat {
        self.orientation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec4;

    #[test]
    fn scale_moves_origin_but_not_box() {
        let mut entity = PointEntity::new("light", Vec3::new(10.0, 0.0, 0.0));
        entity.selection_transform(&Mat4::from_scale(Vec3::splat(2.0)));
        assert_eq!(entity.origin, Vec3::new(20.0, 0.0, 0.0));
        assert_eq!(entity.selection_bounds().unwrap().size(), Vec3::splat(16.0));
    }

    #[test]
    fn sheared_step_does_not_turn_entity() {
        let mut entity = PointEntity::new("light", Vec3::ZERO);
        let shear = Mat4::from_cols(Vec4::X, Vec4::new(0.5, 1.0, 0.0, 0.0), Vec4::Z, Vec4::W);
        entity.selection_transform(&shear);
        assert_eq!(entity.orientation, Quat::IDENTITY);

        let turn = Quat::from_rotation_x(-0.3);
        entity.selection_transform(&Mat4::from_quat(turn));
        assert!(entity.orientation.abs_diff_eq(turn, 1e-5));
    }

    #[test]
    fn aligns_origin_to_grid() {
        let mut entity = PointEntity::new("info_player_start", Vec3::new(13.0, 30.0, -17.0));
        entity.selection_align_to_grid(Vec3::new(16.0, 16.0, 0.0));
        assert_eq!(entity.origin, Vec3::new(16.0, 32.0, -17.0));
    }
}
