//! Coordinate-space conversion and grid snapping used by the viewport handles
//! and the editor camera. Everything here is pure.

use glam::{Mat3, Mat4, Quat, Vec3};

/// Frame of reference a manipulation delta is expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Space {
    #[default]
    World,
    Local,
}

impl Space {
    pub const ALL: [Space; 2] = [Space::World, Space::Local];

    pub fn label(self) -> &'static str {
        match self {
            Space::World => "World",
            Space::Local => "Local",
        }
    }
}

/// Rotation-and-origin frame for handles centred at `pivot`. In local space
/// the frame follows `orientation`, in world space it is axis aligned.
pub fn handle_frame(space: Space, pivot: Vec3, orientation: Quat) -> Mat4 {
    match space {
        Space::World => Mat4::from_translation(pivot),
        Space::Local => Mat4::from_rotation_translation(orientation, pivot),
    }
}

/// Express a world-space delta transform in the coordinate frame `frame`.
pub fn world_to_local(delta: &Mat4, frame: &Mat4) -> Mat4 {
    frame.inverse() * *delta * *frame
}

/// Express a delta given in the coordinate frame `frame` in world space.
pub fn local_to_world(delta: &Mat4, frame: &Mat4) -> Mat4 {
    *frame * *delta * frame.inverse()
}

/// The rotation carried by `matrix` when its linear part is a rotation with
/// uniform scale. Anything else (shear, per-axis scale, mirroring) has no
/// single rotation and yields the identity.
pub fn rigid_rotation(matrix: &Mat4) -> Quat {
    let linear = Mat3::from_mat4(*matrix);
    let lengths = Vec3::new(linear.x_axis.length(), linear.y_axis.length(), linear.z_axis.length());
    let scale = lengths.max_element();
    if scale <= f32::EPSILON || linear.determinant() <= 0.0 {
        return Quat::IDENTITY;
    }
    let tolerance = scale * scale * 1e-4;
    let orthogonal = linear.x_axis.dot(linear.y_axis).abs() <= tolerance
        && linear.y_axis.dot(linear.z_axis).abs() <= tolerance
        && linear.z_axis.dot(linear.x_axis).abs() <= tolerance;
    if !orthogonal || scale - lengths.min_element() > scale * 1e-4 {
        return Quat::IDENTITY;
    }
    Quat::from_mat3(&(linear * (1.0 / scale))).normalize()
}

/// Round `value` to the nearest multiple of `step`. A step of zero (or less)
/// means the axis is unconstrained and the value passes through.
pub fn snap_value(value: f32, step: f32) -> f32 {
    if step > 0.0 && step.is_finite() {
        (value / step).round() * step
    } else {
        value
    }
}

/// Per-axis [`snap_value`].
pub fn snap_to_grid(value: Vec3, grid_size: Vec3) -> Vec3 {
    Vec3::new(
        snap_value(value.x, grid_size.x),
        snap_value(value.y, grid_size.y),
        snap_value(value.z, grid_size.z),
    )
}

/// Snap a scale ratio so that an object of size `extent` grows or shrinks by
/// whole grid steps. Axes with no extent or no grid keep the raw ratio.
pub fn snap_scale(ratio: Vec3, extent: Vec3, grid_size: Vec3) -> Vec3 {
    let axis = |r: f32, e: f32, g: f32| {
        if e.abs() <= f32::EPSILON || g <= 0.0 {
            return r;
        }
        let grown = snap_value(e * (r - 1.0), g);
        // Never collapse an object to zero thickness.
        ((e + grown) / e).max(g.min(e) / e)
    };
    Vec3::new(
        axis(ratio.x, extent.x, grid_size.x),
        axis(ratio.y, extent.y, grid_size.y),
        axis(ratio.z, extent.z, grid_size.z),
    )
}

/// Wrap an angle in degrees into (-180, 180].
pub fn angle_normalize(degrees: f32) -> f32 {
    let mut angle = degrees % 360.0;
    if angle > 180.0 {
        angle -= 360.0;
    }
    if angle <= -180.0 {
        angle += 360.0;
    }
    angle
}

/// Clamp a pitch in degrees into `[min, max]`. Swapped bounds are tolerated.
pub fn clamp_pitch(pitch: f32, min: f32, max: f32) -> f32 {
    let (lo, hi) = if min <= max { (min, max) } else { (max, min) };
    pitch.clamp(lo, hi)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-4
    }

    #[test]
    fn normalize_known_values() {
        assert!(approx(angle_normalize(370.0), 10.0));
        assert!(approx(angle_normalize(-185.0), 175.0));
        assert!(approx(angle_normalize(180.0), 180.0));
        assert!(approx(angle_normalize(-180.0), 180.0));
        assert!(approx(angle_normalize(720.0), 0.0));
    }

    #[test]
    fn normalize_output_range_and_no_op_in_range() {
        let mut a = -2000.0;
        while a < 2000.0 {
            let n = angle_normalize(a);
            assert!(n > -180.0 && n <= 180.0, "{a} -> {n}");
            a += 7.3;
        }
        for v in [-179.5, -90.0, 0.0, 45.25, 180.0] {
            assert_eq!(angle_normalize(v), v);
        }
    }

    #[test]
    fn pitch_is_clamped() {
        assert_eq!(clamp_pitch(120.0, -89.0, 89.0), 89.0);
        assert_eq!(clamp_pitch(-95.0, -89.0, 89.0), -89.0);
        assert_eq!(clamp_pitch(12.5, -89.0, 89.0), 12.5);
        assert_eq!(clamp_pitch(120.0, 89.0, -89.0), 89.0);
    }

    #[test]
    fn rigid_rotation_ignores_shape_changes() {
        let turn = Quat::from_rotation_y(0.6);
        let rigid = Mat4::from_scale_rotation_translation(Vec3::splat(2.0), turn, Vec3::new(5.0, 0.0, 1.0));
        assert!(rigid_rotation(&rigid).abs_diff_eq(turn, 1e-5));

        // Stretching along a turned axis is not a rotation, even though
        // decomposing it would report one.
        let stretch = local_to_world(&Mat4::from_scale(Vec3::new(2.0, 1.0, 1.0)), &Mat4::from_quat(turn));
        assert_eq!(rigid_rotation(&stretch), Quat::IDENTITY);
        assert_eq!(rigid_rotation(&Mat4::from_scale(Vec3::new(-1.0, 1.0, 1.0))), Quat::IDENTITY);
        assert_eq!(rigid_rotation(&Mat4::from_translation(Vec3::X)), Quat::IDENTITY);
    }

    #[test]
    fn snap_rounds_per_axis() {
        let snapped = snap_to_grid(Vec3::new(33.0, 95.0, -20.0), Vec3::new(64.0, 64.0, 16.0));
        assert_eq!(snapped, Vec3::new(64.0, 64.0, -16.0));
    }

    #[test]
    fn snap_is_idempotent() {
        let grid = Vec3::new(8.0, 0.25, 64.0);
        for v in [Vec3::new(13.7, -0.61, 100.0), Vec3::new(-3.9, 7.77, -31.9)] {
            let once = snap_to_grid(v, grid);
            assert_eq!(snap_to_grid(once, grid), once);
        }
    }

    #[test]
    fn zero_grid_disables_axis() {
        let v = Vec3::new(13.7, -0.61, 5.5);
        let snapped = snap_to_grid(v, Vec3::new(0.0, 1.0, 0.0));
        assert_eq!(snapped.x, 13.7);
        assert_eq!(snapped.y, -1.0);
        assert_eq!(snapped.z, 5.5);
    }

    #[test]
    fn scale_snaps_extent_change_to_grid() {
        // 64 units wide, dragged to 1.3x (83.2) -> nearest 16-step growth is +16.
        let ratio = snap_scale(Vec3::new(1.3, 1.0, 1.0), Vec3::splat(64.0), Vec3::splat(16.0));
        assert!(approx(ratio.x, 80.0 / 64.0));
        assert_eq!(ratio.y, 1.0);
        // Shrinking to nothing keeps one grid step.
        let ratio = snap_scale(Vec3::splat(0.01), Vec3::splat(64.0), Vec3::splat(16.0));
        assert!(approx(ratio.x, 0.25));
    }

    #[test]
    fn local_round_trip() {
        let frame = handle_frame(
            Space::Local,
            Vec3::new(10.0, 0.0, -4.0),
            Quat::from_rotation_y(0.7),
        );
        let delta = Mat4::from_translation(Vec3::new(0.0, 3.0, 1.0));
        let world = local_to_world(&delta, &frame);
        let back = world_to_local(&world, &frame);
        assert!(back.abs_diff_eq(delta, 1e-4));
    }

    #[test]
    fn local_translation_follows_orientation() {
        let frame = handle_frame(Space::Local, Vec3::ZERO, Quat::from_rotation_y(std::f32::consts::FRAC_PI_2));
        let world = local_to_world(&Mat4::from_translation(Vec3::X), &frame);
        let moved = world.transform_point3(Vec3::ZERO);
        assert!(moved.abs_diff_eq(Vec3::new(0.0, 0.0, -1.0), 1e-5));
    }
}
