use glam::{Mat4, Vec2, Vec3};

use crate::render::vertex::LineVertex;
use crate::util::picking::{project_to_screen, Ray};
use crate::viewport::Tool;

// Axis colors: X=Red, Y=Green, Z=Blue
const AXIS_COLORS: [[f32; 4]; 3] = [
    [1.0, 0.2, 0.2, 1.0],
    [0.2, 1.0, 0.2, 1.0],
    [0.3, 0.5, 1.0, 1.0],
];
const HIGHLIGHT_COLOR: [f32; 4] = [1.0, 1.0, 0.3, 1.0];
const CENTER_COLOR: [f32; 4] = [0.9, 0.9, 0.9, 1.0];

/// Hit radius around handle lines, in pixels.
const HIT_THRESHOLD: f32 = 12.0;
const RING_SEGMENTS: usize = 48;
const RING_RADIUS: f32 = 0.85;

/// Which gizmo axis or plane the user is interacting with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GizmoAxis {
    X,
    Y,
    Z,
    XY,
    XZ,
    YZ,
    /// All three axes at once (uniform scale).
    All,
}

impl GizmoAxis {
    /// Index of the single axis this handle constrains to, if any.
    pub fn index(self) -> Option<usize> {
        match self {
            GizmoAxis::X => Some(0),
            GizmoAxis::Y => Some(1),
            GizmoAxis::Z => Some(2),
            _ => None,
        }
    }

    /// Index of the axis normal to a plane handle.
    pub fn plane_normal_index(self) -> Option<usize> {
        match self {
            GizmoAxis::YZ => Some(0),
            GizmoAxis::XZ => Some(1),
            GizmoAxis::XY => Some(2),
            _ => None,
        }
    }

    /// Per-axis mask in handle space.
    pub fn mask(self) -> Vec3 {
        match self {
            GizmoAxis::X => Vec3::X,
            GizmoAxis::Y => Vec3::Y,
            GizmoAxis::Z => Vec3::Z,
            GizmoAxis::XY => Vec3::new(1.0, 1.0, 0.0),
            GizmoAxis::XZ => Vec3::new(1.0, 0.0, 1.0),
            GizmoAxis::YZ => Vec3::new(0.0, 1.0, 1.0),
            GizmoAxis::All => Vec3::ONE,
        }
    }
}

/// The kind of edit a handle performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleOp {
    Translate,
    Rotate,
    Scale,
}

/// A specific handle under the pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandleHit {
    pub op: HandleOp,
    pub axis: GizmoAxis,
}

/// Where the handles sit on screen for one frame.
#[derive(Debug, Clone, Copy)]
pub struct GizmoGeometry {
    pub center: Vec3,
    /// Handle-space axes in world space.
    pub basis: [Vec3; 3],
    /// Axes as drawn: `basis`, each possibly flipped to face the camera.
    pub axes: [Vec3; 3],
    pub scale: f32,
}

impl GizmoGeometry {
    /// `frame` carries the pivot in its translation and the handle orientation
    /// in its rotation.
    pub fn new(frame: &Mat4, camera_pos: Vec3, allow_axis_flip: bool) -> Self {
        let center = frame.w_axis.truncate();
        let basis = [
            frame.transform_vector3(Vec3::X).normalize_or(Vec3::X),
            frame.transform_vector3(Vec3::Y).normalize_or(Vec3::Y),
            frame.transform_vector3(Vec3::Z).normalize_or(Vec3::Z),
        ];
        let to_camera = camera_pos - center;
        let axes = basis.map(|axis| {
            if allow_axis_flip && axis.dot(to_camera) < 0.0 { -axis } else { axis }
        });
        Self {
            center,
            basis,
            axes,
            scale: gizmo_scale(center, camera_pos),
        }
    }

    fn plane_corners(&self, ai: usize, bi: usize) -> [Vec3; 4] {
        let psize = self.scale * 0.12;
        let poff = self.scale * 0.25;
        let (a, b, c) = (self.axes[ai], self.axes[bi], self.center);
        [
            c + a * poff + b * poff,
            c + a * (poff + psize) + b * poff,
            c + a * (poff + psize) + b * (poff + psize),
            c + a * poff + b * (poff + psize),
        ]
    }

    fn ring_point(&self, axis: usize, segment: usize) -> Vec3 {
        let (p1, p2) = perpendiculars(self.basis[axis]);
        let a = std::f32::consts::TAU * segment as f32 / RING_SEGMENTS as f32;
        self.center + (p1 * a.cos() + p2 * a.sin()) * self.scale * RING_RADIUS
    }
}

const PLANES: [(usize, usize, GizmoAxis); 3] = [
    (0, 1, GizmoAxis::XY),
    (0, 2, GizmoAxis::XZ),
    (1, 2, GizmoAxis::YZ),
];
const AXIS_IDS: [GizmoAxis; 3] = [GizmoAxis::X, GizmoAxis::Y, GizmoAxis::Z];

/// Compute the gizmo visual scale so it appears constant on screen.
pub fn gizmo_scale(center: Vec3, camera_pos: Vec3) -> f32 {
    let dist = center.distance(camera_pos);
    dist * 0.15
}

/// Generate line vertices for the handles of `tool`.
pub fn build_gizmo_lines(
    geometry: &GizmoGeometry,
    tool: Tool,
    hovered: Option<HandleHit>,
    active: Option<HandleHit>,
) -> Vec<LineVertex> {
    let mut verts = Vec::new();
    let lit = |hit: HandleHit| hovered == Some(hit) || active == Some(hit);

    if matches!(tool, Tool::Translate | Tool::Universal) {
        push_arrows(&mut verts, geometry, |i| {
            if lit(HandleHit { op: HandleOp::Translate, axis: AXIS_IDS[i] }) {
                HIGHLIGHT_COLOR
            } else {
                AXIS_COLORS[i]
            }
        });
        for &(ai, bi, pa) in &PLANES {
            let color = if lit(HandleHit { op: HandleOp::Translate, axis: pa }) {
                [1.0, 1.0, 0.3, 0.8]
            } else {
                plane_color(pa)
            };
            let corners = geometry.plane_corners(ai, bi);
            for j in 0..4 {
                verts.push(lv(corners[j], color));
                verts.push(lv(corners[(j + 1) % 4], color));
            }
        }
    }

    if matches!(tool, Tool::Rotate | Tool::Universal) {
        for i in 0..3 {
            let color = if lit(HandleHit { op: HandleOp::Rotate, axis: AXIS_IDS[i] }) {
                HIGHLIGHT_COLOR
            } else {
                AXIS_COLORS[i]
            };
            for s in 0..RING_SEGMENTS {
                verts.push(lv(geometry.ring_point(i, s), color));
                verts.push(lv(geometry.ring_point(i, s + 1), color));
            }
        }
    }

    if tool == Tool::Scale {
        let scale = geometry.scale;
        for i in 0..3 {
            let color = if lit(HandleHit { op: HandleOp::Scale, axis: AXIS_IDS[i] }) {
                HIGHLIGHT_COLOR
            } else {
                AXIS_COLORS[i]
            };
            let axis = geometry.axes[i];
            let tip = geometry.center + axis * scale;

            // Shaft
            verts.push(lv(geometry.center, color));
            verts.push(lv(tip, color));

            // Small square at tip
            push_square(&mut verts, tip, axis, scale * 0.05, color);
        }

        // Uniform handle at the centre, facing along the averaged axes
        let color = if lit(HandleHit { op: HandleOp::Scale, axis: GizmoAxis::All }) {
            HIGHLIGHT_COLOR
        } else {
            CENTER_COLOR
        };
        let facing = (geometry.axes[0] + geometry.axes[1] + geometry.axes[2]).normalize_or(Vec3::Y);
        push_square(&mut verts, geometry.center, facing, scale * 0.08, color);
    }

    verts
}

/// Hit-test the handles of `tool` in screen space. `mouse_pos` is relative to
/// the viewport's top-left corner.
pub fn hit_test(
    mouse_pos: Vec2,
    geometry: &GizmoGeometry,
    tool: Tool,
    view_proj: Mat4,
    screen_size: Vec2,
) -> Option<HandleHit> {
    let project = |p: Vec3| project_to_screen(p, view_proj, screen_size);
    let center_2d = project(geometry.center)?;

    if matches!(tool, Tool::Translate | Tool::Universal) {
        // Plane handles are smaller, so they take priority when overlapping
        for &(ai, bi, pa) in &PLANES {
            let corners = geometry.plane_corners(ai, bi);
            if let (Some(c0), Some(c1), Some(c2), Some(c3)) = (
                project(corners[0]),
                project(corners[1]),
                project(corners[2]),
                project(corners[3]),
            ) && point_in_quad_2d(mouse_pos, c0, c1, c2, c3)
            {
                return Some(HandleHit { op: HandleOp::Translate, axis: pa });
            }
        }
    }

    if tool == Tool::Scale && mouse_pos.distance(center_2d) < HIT_THRESHOLD {
        return Some(HandleHit { op: HandleOp::Scale, axis: GizmoAxis::All });
    }

    let mut best: Option<HandleHit> = None;
    let mut best_dist = HIT_THRESHOLD;

    if matches!(tool, Tool::Translate | Tool::Scale | Tool::Universal) {
        let op = if tool == Tool::Scale { HandleOp::Scale } else { HandleOp::Translate };
        for i in 0..3 {
            let tip = geometry.center + geometry.axes[i] * geometry.scale;
            if let Some(tip_2d) = project(tip) {
                let d = point_to_segment_dist(mouse_pos, center_2d, tip_2d);
                if d < best_dist {
                    best_dist = d;
                    best = Some(HandleHit { op, axis: AXIS_IDS[i] });
                }
            }
        }
    }

    if matches!(tool, Tool::Rotate | Tool::Universal) {
        for i in 0..3 {
            for s in 0..RING_SEGMENTS {
                if let (Some(s0), Some(s1)) = (
                    project(geometry.ring_point(i, s)),
                    project(geometry.ring_point(i, s + 1)),
                ) {
                    let d = point_to_segment_dist(mouse_pos, s0, s1);
                    if d < best_dist {
                        best_dist = d;
                        best = Some(HandleHit { op: HandleOp::Rotate, axis: AXIS_IDS[i] });
                    }
                }
            }
        }
    }

    best
}

/// Project mouse ray onto a constraint axis, returning the world-space point on the axis.
pub fn project_ray_onto_axis(
    ray: &Ray,
    origin: Vec3,
    axis: Vec3,
    camera_forward: Vec3,
) -> Option<Vec3> {
    let plane_normal = constraint_plane_normal(axis, camera_forward);
    let t = ray.intersect_plane(origin, plane_normal)?;
    let point = ray.point_at(t);
    let along = (point - origin).dot(axis);
    Some(origin + axis * along)
}

/// Project mouse ray onto a constraint plane, returning the world-space point.
pub fn project_ray_onto_plane(
    ray: &Ray,
    origin: Vec3,
    plane_normal: Vec3,
) -> Option<Vec3> {
    let t = ray.intersect_plane(origin, plane_normal)?;
    Some(ray.point_at(t))
}

/// Compute the angle from origin in the plane perpendicular to the axis.
pub fn compute_angle_on_axis(point: Vec3, origin: Vec3, axis: Vec3) -> f32 {
    let (p1, p2) = perpendiculars(axis);
    let rel = point - origin;
    let x = rel.dot(p1);
    let y = rel.dot(p2);
    y.atan2(x)
}

/// Get the normal of the best constraint plane containing the axis.
fn constraint_plane_normal(axis: Vec3, camera_forward: Vec3) -> Vec3 {
    let cross = camera_forward.cross(axis);
    if cross.length_squared() < 1e-6 {
        // Camera looking down the axis, so pick any perpendicular
        let fallback = if axis.x.abs() < 0.9 { Vec3::X } else { Vec3::Y };
        fallback.cross(axis).normalize()
    } else {
        cross.cross(axis).normalize()
    }
}

// --- helpers ---

fn push_arrows(verts: &mut Vec<LineVertex>, geometry: &GizmoGeometry, color_of: impl Fn(usize) -> [f32; 4]) {
    let scale = geometry.scale;
    for i in 0..3 {
        let color = color_of(i);
        let axis = geometry.axes[i];
        let tip = geometry.center + axis * scale;

        // Shaft
        verts.push(lv(geometry.center, color));
        verts.push(lv(tip, color));

        // Arrow head cone
        let head_len = scale * 0.2;
        let head_rad = scale * 0.06;
        let base = geometry.center + axis * (scale - head_len);
        let (p1, p2) = perpendiculars(axis);
        let offsets = [p1 * head_rad, -p1 * head_rad, p2 * head_rad, -p2 * head_rad];
        for off in &offsets {
            verts.push(lv(tip, color));
            verts.push(lv(base + *off, color));
        }
        for j in 0..4 {
            verts.push(lv(base + offsets[j], color));
            verts.push(lv(base + offsets[(j + 1) % 4], color));
        }
    }
}

fn push_square(verts: &mut Vec<LineVertex>, center: Vec3, normal: Vec3, half: f32, color: [f32; 4]) {
    let (p1, p2) = perpendiculars(normal);
    let corners = [
        center + p1 * half + p2 * half,
        center - p1 * half + p2 * half,
        center - p1 * half - p2 * half,
        center + p1 * half - p2 * half,
    ];
    for j in 0..4 {
        verts.push(lv(corners[j], color));
        verts.push(lv(corners[(j + 1) % 4], color));
    }
}

fn plane_color(plane: GizmoAxis) -> [f32; 4] {
    match plane {
        GizmoAxis::XY => [0.4, 0.4, 1.0, 0.5],
        GizmoAxis::XZ => [0.4, 1.0, 0.4, 0.5],
        GizmoAxis::YZ => [1.0, 0.4, 0.4, 0.5],
        _ => [0.5, 0.5, 0.5, 0.5],
    }
}

pub(crate) fn perpendiculars(axis: Vec3) -> (Vec3, Vec3) {
    let ref_vec = if axis.y.abs() < 0.9 { Vec3::Y } else { Vec3::X };
    let p1 = axis.cross(ref_vec).normalize();
    let p2 = axis.cross(p1).normalize();
    (p1, p2)
}

fn lv(pos: Vec3, color: [f32; 4]) -> LineVertex {
    LineVertex {
        position: pos.into(),
        color,
    }
}

/// Distance from a point to a line segment in 2D.
fn point_to_segment_dist(p: Vec2, a: Vec2, b: Vec2) -> f32 {
    let ab = b - a;
    let len_sq = ab.length_squared();
    if len_sq < 1e-6 {
        return p.distance(a);
    }
    let t = ((p - a).dot(ab) / len_sq).clamp(0.0, 1.0);
    let proj = a + ab * t;
    p.distance(proj)
}

/// Test if a 2D point is inside a convex quad (4 vertices in order).
fn point_in_quad_2d(p: Vec2, a: Vec2, b: Vec2, c: Vec2, d: Vec2) -> bool {
    point_in_tri_2d(p, a, b, c) || point_in_tri_2d(p, a, c, d)
}

fn point_in_tri_2d(p: Vec2, a: Vec2, b: Vec2, c: Vec2) -> bool {
    let v0 = c - a;
    let v1 = b - a;
    let v2 = p - a;
    let d00 = v0.dot(v0);
    let d01 = v0.dot(v1);
    let d02 = v0.dot(v2);
    let d11 = v1.dot(v1);
    let d12 = v1.dot(v2);
    let denom = d00 * d11 - d01 * d01;
    // Edge-on quads project to a line
    if denom.abs() < 1e-6 {
        return false;
    }
    let inv = 1.0 / denom;
    let u = (d11 * d02 - d01 * d12) * inv;
    let v = (d00 * d12 - d01 * d02) * inv;
    u >= 0.0 && v >= 0.0 && u + v <= 1.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (GizmoGeometry, Mat4, Vec2) {
        let camera_pos = Vec3::new(0.0, 0.0, 100.0);
        let view = Mat4::look_at_rh(camera_pos, Vec3::ZERO, Vec3::Y);
        let proj = Mat4::perspective_rh(1.2, 1.0, 1.0, 1000.0);
        let geometry = GizmoGeometry::new(&Mat4::IDENTITY, camera_pos, true);
        (geometry, proj * view, Vec2::new(400.0, 400.0))
    }

    #[test]
    fn axis_flip_points_axes_toward_camera() {
        let frame = Mat4::IDENTITY;
        let geometry = GizmoGeometry::new(&frame, Vec3::new(-10.0, 5.0, -10.0), true);
        assert_eq!(geometry.axes[0], Vec3::NEG_X);
        assert_eq!(geometry.axes[1], Vec3::Y);
        assert_eq!(geometry.axes[2], Vec3::NEG_Z);
        assert_eq!(geometry.basis[0], Vec3::X);

        let unflipped = GizmoGeometry::new(&frame, Vec3::new(-10.0, 5.0, -10.0), false);
        assert_eq!(unflipped.axes, unflipped.basis);
    }

    #[test]
    fn hits_x_arrow_shaft() {
        let (geometry, vp, size) = setup();
        let tip = project_to_screen(geometry.center + Vec3::X * geometry.scale * 0.6, vp, size).unwrap();
        let hit = hit_test(tip, &geometry, Tool::Translate, vp, size);
        assert_eq!(hit, Some(HandleHit { op: HandleOp::Translate, axis: GizmoAxis::X }));
    }

    #[test]
    fn scale_centre_is_uniform_handle() {
        let (geometry, vp, size) = setup();
        let center = project_to_screen(geometry.center, vp, size).unwrap();
        let hit = hit_test(center, &geometry, Tool::Scale, vp, size);
        assert_eq!(hit, Some(HandleHit { op: HandleOp::Scale, axis: GizmoAxis::All }));
    }

    #[test]
    fn far_from_handles_misses() {
        let (geometry, vp, size) = setup();
        assert_eq!(hit_test(Vec2::new(5.0, 5.0), &geometry, Tool::Universal, vp, size), None);
    }

    #[test]
    fn rotate_ring_is_hit_on_its_circle() {
        let (geometry, vp, size) = setup();
        // The Z ring lies in the view plane for a camera on +Z.
        let on_ring = project_to_screen(geometry.ring_point(2, 5), vp, size).unwrap();
        let hit = hit_test(on_ring, &geometry, Tool::Rotate, vp, size);
        assert_eq!(hit, Some(HandleHit { op: HandleOp::Rotate, axis: GizmoAxis::Z }));
    }

    #[test]
    fn angle_on_axis_quarter_turn() {
        let (p1, p2) = perpendiculars(Vec3::Y);
        let a0 = compute_angle_on_axis(p1, Vec3::ZERO, Vec3::Y);
        let a1 = compute_angle_on_axis(p2, Vec3::ZERO, Vec3::Y);
        assert!((a1 - a0 - std::f32::consts::FRAC_PI_2).abs() < 1e-5);
    }
}
