mod registry;
mod set;

pub use registry::Registry;
pub use set::Selection;

use std::num::NonZeroU32;

use glam::{Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};

use crate::util::math::Aabb;

/// Stable identity of a selectable object. Zero is reserved for "nothing",
/// which is what the identity buffer holds for background pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SelectionId(NonZeroU32);

impl SelectionId {
    /// Interpret a raw identity-buffer value. Returns `None` for 0.
    pub fn from_raw(raw: u32) -> Option<Self> {
        NonZeroU32::new(raw).map(Self)
    }

    pub fn get(self) -> u32 {
        self.0.get()
    }
}

impl std::fmt::Display for SelectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Brush volume classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Volume {
    #[default]
    Solid,
    Hollow,
}

/// Capabilities every object that can be picked and manipulated in the viewport provides.
pub trait Selectable {
    /// World-space bounds, or `None` if the object has no spatial extent.
    fn selection_bounds(&self) -> Option<Aabb>;

    /// Apply an affine transform (world space) to the object.
    fn selection_transform(&mut self, matrix: &Mat4);

    /// Remove the object from its owning map. The owner destroys it at the
    /// start of the next frame.
    fn selection_delete(&mut self);

    fn selection_align_to_grid(&mut self, grid_size: Vec3);

    fn selection_set_volume(&mut self, volume: Volume);

    /// Orientation of the object's local frame, used by local-space handles.
    fn selection_orientation(&self) -> Quat {
        Quat::IDENTITY
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Minimal selectable used across the selection, picking and viewport tests.
    #[derive(Debug, Clone, PartialEq)]
    pub struct Marker {
        pub position: Vec3,
        pub volume: Volume,
        pub deleted: bool,
    }

    impl Marker {
        pub fn at(position: Vec3) -> Self {
            Self { position, volume: Volume::Solid, deleted: false }
        }
    }

    impl Selectable for Marker {
        fn selection_bounds(&self) -> Option<Aabb> {
            Some(Aabb::new(self.position - Vec3::ONE, self.position + Vec3::ONE))
        }

        fn selection_transform(&mut self, matrix: &Mat4) {
            self.position = matrix.transform_point3(self.position);
        }

        fn selection_delete(&mut self) {
            self.deleted = true;
        }

        fn selection_align_to_grid(&mut self, grid_size: Vec3) {
            self.position = crate::util::space::snap_to_grid(self.position, grid_size);
        }

        fn selection_set_volume(&mut self, volume: Volume) {
            self.volume = volume;
        }
    }

    #[test]
    fn zero_is_not_an_id() {
        assert!(SelectionId::from_raw(0).is_none());
        assert_eq!(SelectionId::from_raw(7).map(SelectionId::get), Some(7));
    }
}
