use glam::{Mat4, Quat, Vec2, Vec3};

use crate::render::gizmo::{self, GizmoAxis, GizmoGeometry, HandleHit, HandleOp};
use crate::render::vertex::LineVertex;
use crate::util::picking::Ray;
use crate::util::space::{angle_normalize, local_to_world, snap_scale, snap_to_grid, snap_value};
use crate::viewport::Tool;

/// Grid increments applied while dragging.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Snap {
    pub grid: Vec3,
    pub rotation_degrees: f32,
}

/// Everything the handles need to know about the current frame.
#[derive(Debug, Clone, Copy)]
pub struct HandleSetup {
    pub tool: Tool,
    /// Pivot in the translation, handle orientation in the rotation.
    pub frame: Mat4,
    pub camera_position: Vec3,
    pub camera_forward: Vec3,
    pub view_proj: Mat4,
    /// Viewport size in pixels.
    pub screen_size: Vec2,
    pub allow_axis_flip: bool,
    /// Selection extent along the handle axes, read when a scale drag starts.
    pub extent: Vec3,
    pub snap: Option<Snap>,
}

#[derive(Debug, Clone, Copy)]
struct HandleDrag {
    hit: HandleHit,
    /// Handle frame frozen at drag start.
    frame: Mat4,
    start_point: Vec3,
    start_angle: f32,
    start_distance: f32,
    /// Selection extent at drag start. Scale snapping measures against this,
    /// not the extent the selection has grown to since.
    extent: Vec3,
    /// World transform already applied to the selection.
    applied: Mat4,
}

/// On-screen transform handles for the current selection.
#[derive(Debug, Default)]
pub struct Handles {
    setup: Option<HandleSetup>,
    geometry: Option<GizmoGeometry>,
    hovered: Option<HandleHit>,
    drag: Option<HandleDrag>,
}

impl Handles {
    pub fn new() -> Self {
        Self::default()
    }

    /// Place the handles for this frame. `mouse` is relative to the viewport's
    /// top-left corner, or `None` when the pointer may not interact.
    pub fn begin(&mut self, setup: HandleSetup, mouse: Option<Vec2>) {
        let geometry = GizmoGeometry::new(&setup.frame, setup.camera_position, setup.allow_axis_flip);
        if self.drag.is_none() {
            self.hovered = mouse.and_then(|m| {
                gizmo::hit_test(m, &geometry, setup.tool, setup.view_proj, setup.screen_size)
            });
        }
        self.setup = Some(setup);
        self.geometry = Some(geometry);
    }

    /// Hide the handles; cancels any drag in progress.
    pub fn end(&mut self) {
        self.setup = None;
        self.geometry = None;
        self.hovered = None;
        self.drag = None;
    }

    pub fn is_mouse_over(&self) -> bool {
        self.hovered.is_some() || self.drag.is_some()
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    /// Start dragging the hovered handle. Returns false if nothing is hovered
    /// or the pointer ray misses the constraint.
    pub fn begin_drag(&mut self, mouse: Vec2) -> bool {
        let (Some(setup), Some(geometry), Some(hit)) = (self.setup, self.geometry, self.hovered) else {
            return false;
        };
        let ray = Ray::from_screen(mouse, setup.screen_size, setup.view_proj);
        let Some(start_point) = constrain(&ray, hit, &geometry, setup.camera_forward) else {
            return false;
        };

        let axis = hit.axis.index().map(|i| geometry.basis[i]);
        let start_angle = match (hit.op, axis) {
            (HandleOp::Rotate, Some(axis)) => gizmo::compute_angle_on_axis(start_point, geometry.center, axis),
            _ => 0.0,
        };
        log::debug!("handle drag start: {:?} {:?}", hit.op, hit.axis);
        self.drag = Some(HandleDrag {
            hit,
            frame: setup.frame,
            start_point,
            start_angle,
            start_distance: (start_point - geometry.center).length().max(1e-3),
            extent: setup.extent,
            applied: Mat4::IDENTITY,
        });
        true
    }

    /// Continue the drag. Returns the world transform to apply on top of what
    /// earlier calls already returned, or `None` if nothing changed.
    pub fn drag(&mut self, mouse: Vec2) -> Option<Mat4> {
        let setup = self.setup?;
        let drag = self.drag.as_mut()?;
        let (_, rotation, pivot) = drag.frame.to_scale_rotation_translation();
        let basis = [rotation * Vec3::X, rotation * Vec3::Y, rotation * Vec3::Z];
        let ray = Ray::from_screen(mouse, setup.screen_size, setup.view_proj);

        let frozen = GizmoGeometry {
            center: pivot,
            basis,
            axes: basis,
            scale: 1.0,
        };
        let current = constrain(&ray, drag.hit, &frozen, setup.camera_forward)?;

        let local = match drag.hit.op {
            HandleOp::Translate => {
                let mut offset = (rotation.inverse() * (current - drag.start_point)) * drag.hit.axis.mask();
                if let Some(snap) = setup.snap {
                    offset = snap_to_grid(offset, snap.grid);
                }
                Mat4::from_translation(offset)
            }
            HandleOp::Rotate => {
                let i = drag.hit.axis.index()?;
                let angle = gizmo::compute_angle_on_axis(current, pivot, basis[i]) - drag.start_angle;
                let mut degrees = angle_normalize(angle.to_degrees());
                if let Some(snap) = setup.snap {
                    degrees = snap_value(degrees, snap.rotation_degrees);
                }
                let local_axis = [Vec3::X, Vec3::Y, Vec3::Z][i];
                Mat4::from_quat(Quat::from_axis_angle(local_axis, degrees.to_radians()))
            }
            HandleOp::Scale => {
                let ratio = (current - pivot).length().max(1e-3) / drag.start_distance;
                let mask = drag.hit.axis.mask();
                let mut factor = Vec3::ONE + mask * (ratio - 1.0);
                if let Some(snap) = setup.snap {
                    factor = snap_scale(factor, drag.extent, snap.grid);
                }
                Mat4::from_scale(factor)
            }
        };

        let total = local_to_world(&local, &drag.frame);
        if total.abs_diff_eq(drag.applied, 1e-5) {
            return None;
        }
        let step = total * drag.applied.inverse();
        drag.applied = total;
        Some(step)
    }

    pub fn end_drag(&mut self) -> bool {
        let ended = self.drag.take().is_some();
        if ended {
            log::debug!("handle drag end");
        }
        ended
    }

    /// Line geometry for the handles, empty when hidden.
    pub fn lines(&self) -> Vec<LineVertex> {
        match (self.setup, self.geometry) {
            (Some(setup), Some(geometry)) => {
                let active = self.drag.map(|d| d.hit);
                gizmo::build_gizmo_lines(&geometry, setup.tool, self.hovered, active)
            }
            _ => Vec::new(),
        }
    }
}

/// World point where the pointer ray meets the handle's constraint.
fn constrain(ray: &Ray, hit: HandleHit, geometry: &GizmoGeometry, camera_forward: Vec3) -> Option<Vec3> {
    let center = geometry.center;
    match (hit.op, hit.axis) {
        (HandleOp::Rotate, axis) => {
            let i = axis.index()?;
            gizmo::project_ray_onto_plane(ray, center, geometry.basis[i])
        }
        (_, GizmoAxis::All) => gizmo::project_ray_onto_plane(ray, center, -camera_forward),
        (_, axis) => {
            if let Some(i) = axis.index() {
                gizmo::project_ray_onto_axis(ray, center, geometry.basis[i], camera_forward)
            } else {
                let n = axis.plane_normal_index()?;
                gizmo::project_ray_onto_plane(ray, center, geometry.basis[n])
            }
        }
    }
}
