use glam::Vec3;

use crate::render::vertex::LineVertex;

/// Cells drawn on each side of the origin.
const HALF_EXTENT: i32 = 32;

/// Grid lines on the XZ plane, rebuilt when the grid spacing changes.
pub struct GridRenderer {
    pub vertex_buffer: wgpu::Buffer,
    pub vertex_count: u32,
    spacing: Vec3,
    color: [f32; 4],
}

impl GridRenderer {
    pub fn new(device: &wgpu::Device) -> Self {
        let vertex_count = ((HALF_EXTENT * 2 + 1) * 4) as u32;
        let vertex_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("grid_vertex_buffer"),
            size: (std::mem::size_of::<LineVertex>() * vertex_count as usize) as u64,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        Self {
            vertex_buffer,
            vertex_count,
            spacing: Vec3::ZERO,
            color: [0.0; 4],
        }
    }

    /// Re-upload only if the spacing or colour changed.
    pub fn upload(&mut self, queue: &wgpu::Queue, spacing: Vec3, color: [f32; 4]) {
        if spacing == self.spacing && color == self.color {
            return;
        }
        let verts = build_grid_vertices(HALF_EXTENT, spacing, color);
        queue.write_buffer(&self.vertex_buffer, 0, bytemuck::cast_slice(&verts));
        self.spacing = spacing;
        self.color = color;
    }
}

/// Lines along X and Z through every multiple of the spacing. Zero spacing
/// on an axis falls back to one unit. Both axis lines through the origin are
/// tinted.
pub fn build_grid_vertices(half_extent: i32, spacing: Vec3, color: [f32; 4]) -> Vec<LineVertex> {
    let cell_x = if spacing.x > 0.0 { spacing.x } else { 1.0 };
    let cell_z = if spacing.z > 0.0 { spacing.z } else { 1.0 };
    let extent_x = half_extent as f32 * cell_x;
    let extent_z = half_extent as f32 * cell_z;
    let axis_color_x = [0.7, 0.2, 0.2, 1.0];
    let axis_color_z = [0.2, 0.2, 0.7, 1.0];

    let mut verts = Vec::with_capacity(((half_extent * 2 + 1) * 4) as usize);
    for i in -half_extent..=half_extent {
        // Line along Z axis (varies X)
        let x = i as f32 * cell_x;
        let c = if i == 0 { axis_color_z } else { color };
        verts.push(LineVertex { position: [x, 0.0, -extent_z], color: c });
        verts.push(LineVertex { position: [x, 0.0, extent_z], color: c });

        // Line along X axis (varies Z)
        let z = i as f32 * cell_z;
        let c = if i == 0 { axis_color_x } else { color };
        verts.push(LineVertex { position: [-extent_x, 0.0, z], color: c });
        verts.push(LineVertex { position: [extent_x, 0.0, z], color: c });
    }

    verts
}
