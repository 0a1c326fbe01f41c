use glam::{Mat4, UVec2, Vec2, Vec3, Vec4Swizzles};

use crate::selection::{Registry, SelectionId};

/// A ray in 3D space with origin and direction.
#[derive(Debug, Clone, Copy)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
}

impl Ray {
    /// Create a ray from screen coordinates (pixels) through the camera.
    /// `screen_pos` is in pixels from top-left, `screen_size` is viewport width/height.
    pub fn from_screen(
        screen_pos: Vec2,
        screen_size: Vec2,
        view_proj: Mat4,
    ) -> Self {
        // Convert screen coords to NDC (-1..1)
        let ndc_x = (2.0 * screen_pos.x / screen_size.x) - 1.0;
        let ndc_y = 1.0 - (2.0 * screen_pos.y / screen_size.y); // Y is flipped

        let inv_vp = view_proj.inverse();

        // wgpu clip space depth runs 0..1
        let near_point = inv_vp.project_point3(Vec3::new(ndc_x, ndc_y, 0.0));
        let far_point = inv_vp.project_point3(Vec3::new(ndc_x, ndc_y, 1.0));

        let direction = (far_point - near_point).normalize();

        Self {
            origin: near_point,
            direction,
        }
    }

    /// Intersect ray with an infinite plane defined by a point and normal.
    /// Returns distance along ray if hit, None if parallel.
    pub fn intersect_plane(&self, plane_point: Vec3, plane_normal: Vec3) -> Option<f32> {
        let denom = plane_normal.dot(self.direction);
        if denom.abs() < 1e-7 {
            return None;
        }
        let t = (plane_point - self.origin).dot(plane_normal) / denom;
        if t > 0.0 { Some(t) } else { None }
    }

    pub fn point_at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }
}

/// Project a 3D point to 2D screen coordinates.
/// Returns None if the point is behind the camera.
pub fn project_to_screen(pos: Vec3, view_proj: Mat4, screen_size: Vec2) -> Option<Vec2> {
    let clip = view_proj * pos.extend(1.0);
    if clip.w <= 0.0 {
        return None;
    }
    let ndc = clip.xyz() / clip.w;
    Some(Vec2::new(
        (ndc.x + 1.0) * 0.5 * screen_size.x,
        (1.0 - ndc.y) * 0.5 * screen_size.y,
    ))
}

/// Per-pixel map from screen location to the raw `SelectionId` of the
/// topmost visible object (0 for background), produced by the selection pass.
pub trait IdentityBuffer {
    fn size(&self) -> UVec2;

    /// Raw id under `pixel`. Pixels outside the buffer read as background.
    fn sample(&self, pixel: UVec2) -> u32;
}

/// Identity buffer held in system memory.
#[cfg(test)]
#[derive(Debug, Clone)]
pub struct CpuIdentityBuffer {
    size: UVec2,
    ids: Vec<u32>,
}

#[cfg(test)]
impl CpuIdentityBuffer {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            size: UVec2::new(width, height),
            ids: vec![0; (width as usize) * (height as usize)],
        }
    }

    pub fn set(&mut self, pixel: UVec2, id: u32) {
        if let Some(index) = self.index(pixel) {
            self.ids[index] = id;
        }
    }

    /// Write `id` into every pixel of `[min, max)`, clipped to the buffer.
    pub fn fill_rect(&mut self, min: UVec2, max: UVec2, id: u32) {
        let max = max.min(self.size);
        for y in min.y..max.y {
            for x in min.x..max.x {
                self.set(UVec2::new(x, y), id);
            }
        }
    }

    fn index(&self, pixel: UVec2) -> Option<usize> {
        (pixel.x < self.size.x && pixel.y < self.size.y)
            .then(|| pixel.y as usize * self.size.x as usize + pixel.x as usize)
    }
}

#[cfg(test)]
impl IdentityBuffer for CpuIdentityBuffer {
    fn size(&self) -> UVec2 {
        self.size
    }

    fn sample(&self, pixel: UVec2) -> u32 {
        self.index(pixel).map_or(0, |index| self.ids[index])
    }
}

/// What the identity buffer says is under a screen point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pick {
    /// Nothing was drawn there.
    Background,
    /// An id was drawn but its object has been destroyed since.
    Stale(u32),
    Object(SelectionId),
}

impl Pick {
    pub fn id(self) -> Option<SelectionId> {
        match self {
            Pick::Object(id) => Some(id),
            Pick::Background | Pick::Stale(_) => None,
        }
    }
}

/// Sample `buffer` at `point` (viewport-relative pixels) and resolve the id
/// through `registry`.
pub fn pick<T, B>(buffer: &B, registry: &Registry<T>, point: UVec2) -> Pick
where
    B: IdentityBuffer + ?Sized,
{
    match buffer.sample(point) {
        0 => Pick::Background,
        raw => match registry.lookup_raw(raw) {
            Some((id, _)) => Pick::Object(id),
            None => Pick::Stale(raw),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn background_and_out_of_range_read_zero() {
        let buffer = CpuIdentityBuffer::new(4, 4);
        assert_eq!(buffer.sample(UVec2::new(1, 1)), 0);
        assert_eq!(buffer.sample(UVec2::new(10, 1)), 0);
    }

    #[test]
    fn resolves_live_objects() {
        let mut registry = Registry::new();
        let a = registry.register("a");
        let b = registry.register("b");
        let mut buffer = CpuIdentityBuffer::new(8, 8);
        buffer.fill_rect(UVec2::ZERO, UVec2::new(4, 8), a.get());
        buffer.fill_rect(UVec2::new(4, 0), UVec2::new(8, 8), b.get());

        assert_eq!(pick(&buffer, &registry, UVec2::new(1, 3)).id(), Some(a));
        assert_eq!(pick(&buffer, &registry, UVec2::new(6, 3)).id(), Some(b));
    }

    #[test]
    fn destroyed_object_is_not_picked() {
        let mut registry = Registry::new();
        let ids: Vec<_> = (0..5).map(|i| registry.register(i)).collect();
        let doomed = ids[4];
        let mut buffer = CpuIdentityBuffer::new(2, 2);
        buffer.set(UVec2::new(0, 0), doomed.get());
        registry.unregister(doomed);

        assert_eq!(pick(&buffer, &registry, UVec2::ZERO), Pick::Stale(5));
        assert_eq!(pick(&buffer, &registry, UVec2::ZERO).id(), None);
        assert_eq!(pick(&buffer, &registry, UVec2::new(1, 1)), Pick::Background);
    }

    #[test]
    fn screen_projection_round_trips_through_ray() {
        let view = Mat4::look_at_rh(Vec3::new(0.0, 0.0, 10.0), Vec3::ZERO, Vec3::Y);
        let proj = Mat4::perspective_rh(1.0, 1.0, 0.1, 100.0);
        let vp = proj * view;
        let size = Vec2::new(200.0, 200.0);
        let p = Vec3::new(1.0, 2.0, 0.0);
        let screen = project_to_screen(p, vp, size).unwrap();
        let ray = Ray::from_screen(screen, size, vp);
        let t = ray.intersect_plane(Vec3::ZERO, Vec3::Z).unwrap();
        assert!(ray.point_at(t).abs_diff_eq(p, 1e-3));
    }
}
