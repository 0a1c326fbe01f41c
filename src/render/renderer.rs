use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use glam::{UVec2, Vec3};
use wgpu::util::DeviceExt;

use crate::render::camera::Camera;
use crate::render::geometry::build_scene_geometry;
use crate::render::grid::GridRenderer;
use crate::render::vertex::{LineVertex, MeshVertex};
use crate::scene::Map;
use crate::settings::DisplaySettings;
use crate::util::picking::IdentityBuffer;

const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;
const COLOR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;
const DEPTH_VIS_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;
const IDENTITY_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::R32Uint;

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
struct CameraUniform {
    view_proj: [[f32; 4]; 4],
    /// x = near, y = far.
    planes: [f32; 4],
}

/// Offscreen images the viewport window shows and picks from.
struct ViewportTargets {
    size: UVec2,
    color_view: wgpu::TextureView,
    depth_view: wgpu::TextureView,
    depth_vis_view: wgpu::TextureView,
    identity_texture: wgpu::Texture,
    identity_view: wgpu::TextureView,
    depth_bind_group: wgpu::BindGroup,
}

/// What to draw into the viewport targets this frame.
pub struct ViewportScene<'a> {
    pub map: &'a Map,
    pub camera: &'a Camera,
    pub display: &'a DisplaySettings,
    /// Grid spacing, or `None` when the grid is hidden.
    pub grid: Option<Vec3>,
    pub handle_lines: &'a [LineVertex],
}

pub struct Renderer {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub surface: wgpu::Surface<'static>,
    pub surface_format: wgpu::TextureFormat,
    pub config: wgpu::SurfaceConfiguration,

    camera_buffer: wgpu::Buffer,
    camera_bind_group: wgpu::BindGroup,
    depth_bind_group_layout: wgpu::BindGroupLayout,

    mesh_pipeline: wgpu::RenderPipeline,
    selection_pipeline: wgpu::RenderPipeline,
    line_pipeline: wgpu::RenderPipeline,
    overlay_pipeline: wgpu::RenderPipeline,
    depth_pipeline: wgpu::RenderPipeline,
    grid: GridRenderer,

    targets: Option<ViewportTargets>,
}

impl Renderer {
    pub async fn new(window: Arc<winit::window::Window>) -> Self {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });

        let surface = instance.create_surface(window.clone()).expect("failed to create surface");

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .expect("no suitable GPU adapter found");

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                ..Default::default()
            })
            .await
            .expect("failed to create device");

        let size = window.inner_size();
        let caps = surface.get_capabilities(&adapter);
        let surface_format = caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .copied()
            .unwrap_or(caps.formats[0]);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode: caps.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let camera_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("camera_uniform"),
            size: std::mem::size_of::<CameraUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let camera_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("camera_bgl"),
                entries: &[wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                }],
            });

        let camera_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("camera_bg"),
            layout: &camera_bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: camera_buffer.as_entire_binding(),
            }],
        });

        let depth_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("depth_vis_bgl"),
                entries: &[wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Depth,
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                }],
            });

        let camera_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("camera_pipeline_layout"),
            bind_group_layouts: &[&camera_bind_group_layout],
            push_constant_ranges: &[],
        });

        // Shaded map geometry
        let mesh_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("mesh_shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/mesh.wgsl").into()),
        });
        let mesh_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("mesh_pipeline"),
            layout: Some(&camera_layout),
            vertex: wgpu::VertexState {
                module: &mesh_shader,
                entry_point: Some("vs_main"),
                buffers: &[MeshVertex::LAYOUT],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &mesh_shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: COLOR_FORMAT,
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            // Winding flips with camera handedness.
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                cull_mode: None,
                ..Default::default()
            },
            depth_stencil: Some(depth_state(true, wgpu::CompareFunction::Less)),
            multisample: Default::default(),
            multiview: None,
            cache: None,
        });

        // Identity pass: same geometry, object ids instead of colour
        let selection_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("selection_shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/selection.wgsl").into()),
        });
        let selection_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("selection_pipeline"),
            layout: Some(&camera_layout),
            vertex: wgpu::VertexState {
                module: &selection_shader,
                entry_point: Some("vs_main"),
                buffers: &[MeshVertex::LAYOUT],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &selection_shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: IDENTITY_FORMAT,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                cull_mode: None,
                ..Default::default()
            },
            depth_stencil: Some(depth_state(true, wgpu::CompareFunction::Less)),
            multisample: Default::default(),
            multiview: None,
            cache: None,
        });

        let line_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("line_shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/line.wgsl").into()),
        });
        let line_pipeline = Self::create_line_pipeline(
            &device,
            &camera_layout,
            &line_shader,
            "line_pipeline",
            depth_state(true, wgpu::CompareFunction::Less),
        );
        // Selection outlines and handles draw over everything
        let overlay_pipeline = Self::create_line_pipeline(
            &device,
            &camera_layout,
            &line_shader,
            "overlay_pipeline",
            depth_state(false, wgpu::CompareFunction::Always),
        );

        let depth_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("depth_vis_shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/depth.wgsl").into()),
        });
        let depth_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("depth_vis_pipeline_layout"),
            bind_group_layouts: &[&camera_bind_group_layout, &depth_bind_group_layout],
            push_constant_ranges: &[],
        });
        let depth_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("depth_vis_pipeline"),
            layout: Some(&depth_layout),
            vertex: wgpu::VertexState {
                module: &depth_shader,
                entry_point: Some("vs_main"),
                buffers: &[],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &depth_shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: DEPTH_VIS_FORMAT,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: None,
            multisample: Default::default(),
            multiview: None,
            cache: None,
        });

        let grid = GridRenderer::new(&device);

        Self {
            device,
            queue,
            surface,
            surface_format,
            config,
            camera_buffer,
            camera_bind_group,
            depth_bind_group_layout,
            mesh_pipeline,
            selection_pipeline,
            line_pipeline,
            overlay_pipeline,
            depth_pipeline,
            grid,
            targets: None,
        }
    }

    fn create_line_pipeline(
        device: &wgpu::Device,
        layout: &wgpu::PipelineLayout,
        shader: &wgpu::ShaderModule,
        label: &str,
        depth_stencil: wgpu::DepthStencilState,
    ) -> wgpu::RenderPipeline {
        device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(label),
            layout: Some(layout),
            vertex: wgpu::VertexState {
                module: shader,
                entry_point: Some("vs_main"),
                buffers: &[LineVertex::LAYOUT],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: COLOR_FORMAT,
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::LineList,
                ..Default::default()
            },
            depth_stencil: Some(depth_stencil),
            multisample: Default::default(),
            multiview: None,
            cache: None,
        })
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.config.width = width;
        self.config.height = height;
        self.surface.configure(&self.device, &self.config);
    }

    /// Recreate the viewport targets at `size`. Zero-sized requests are ignored.
    pub fn resize_targets(&mut self, size: UVec2) {
        if size.x == 0 || size.y == 0 {
            return;
        }
        let color = self.create_target("viewport_color", size, COLOR_FORMAT, wgpu::TextureUsages::TEXTURE_BINDING);
        let depth = self.create_target("viewport_depth", size, DEPTH_FORMAT, wgpu::TextureUsages::TEXTURE_BINDING);
        let depth_vis = self.create_target("viewport_depth_vis", size, DEPTH_VIS_FORMAT, wgpu::TextureUsages::TEXTURE_BINDING);
        let identity = self.create_target("viewport_identity", size, IDENTITY_FORMAT, wgpu::TextureUsages::COPY_SRC);

        let depth_view = depth.create_view(&Default::default());
        let depth_bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("depth_vis_bg"),
            layout: &self.depth_bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(&depth_view),
            }],
        });

        self.targets = Some(ViewportTargets {
            size,
            color_view: color.create_view(&Default::default()),
            depth_view,
            depth_vis_view: depth_vis.create_view(&Default::default()),
            identity_view: identity.create_view(&Default::default()),
            identity_texture: identity,
            depth_bind_group,
        });
        log::debug!("viewport targets resized to {}x{}", size.x, size.y);
    }

    fn create_target(
        &self,
        label: &str,
        size: UVec2,
        format: wgpu::TextureFormat,
        extra_usage: wgpu::TextureUsages,
    ) -> wgpu::Texture {
        self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: size.x,
                height: size.y,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | extra_usage,
            view_formats: &[],
        })
    }

    /// Shaded scene image, for presenting in the viewport.
    pub fn color_view(&self) -> Option<&wgpu::TextureView> {
        self.targets.as_ref().map(|t| &t.color_view)
    }

    /// Linearised depth image, for presenting in the viewport.
    pub fn depth_vis_view(&self) -> Option<&wgpu::TextureView> {
        self.targets.as_ref().map(|t| &t.depth_vis_view)
    }

    /// Render the identity, scene and depth-visualisation passes. Does nothing
    /// until the targets exist.
    pub fn render_viewport(&mut self, scene: &ViewportScene<'_>, bg_color: [f32; 3]) {
        let Some(targets) = &self.targets else { return };

        let uniform = CameraUniform {
            view_proj: scene.camera.view_projection().to_cols_array_2d(),
            planes: [scene.camera.near, scene.camera.far, 0.0, 0.0],
        };
        self.queue.write_buffer(&self.camera_buffer, 0, bytemuck::bytes_of(&uniform));
        if let Some(spacing) = scene.grid {
            self.grid.upload(&self.queue, spacing, scene.display.grid_color);
        }

        let geometry = build_scene_geometry(scene.map, scene.display);
        let mesh_buffer = (!geometry.triangles.is_empty()).then(|| {
            self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("map_triangles"),
                contents: bytemuck::cast_slice(&geometry.triangles),
                usage: wgpu::BufferUsages::VERTEX,
            })
        });
        let mut overlay = geometry.outlines;
        overlay.extend_from_slice(scene.handle_lines);
        let overlay_buffer = (!overlay.is_empty()).then(|| {
            self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("overlay_lines"),
                contents: bytemuck::cast_slice(&overlay),
                usage: wgpu::BufferUsages::VERTEX,
            })
        });
        let triangle_count = geometry.triangles.len() as u32;

        let mut encoder = self.device.create_command_encoder(
            &wgpu::CommandEncoderDescriptor { label: Some("viewport_encoder") },
        );

        // Identity pass first, so picking this frame sees current geometry
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("selection_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &targets.identity_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(depth_attachment(&targets.depth_view)),
                ..Default::default()
            });
            if let Some(buffer) = &mesh_buffer {
                pass.set_pipeline(&self.selection_pipeline);
                pass.set_bind_group(0, &self.camera_bind_group, &[]);
                pass.set_vertex_buffer(0, buffer.slice(..));
                pass.draw(0..triangle_count, 0..1);
            }
        }

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("scene_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &targets.color_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: bg_color[0] as f64,
                            g: bg_color[1] as f64,
                            b: bg_color[2] as f64,
                            a: 1.0,
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(depth_attachment(&targets.depth_view)),
                ..Default::default()
            });
            pass.set_bind_group(0, &self.camera_bind_group, &[]);

            if scene.grid.is_some() {
                pass.set_pipeline(&self.line_pipeline);
                pass.set_vertex_buffer(0, self.grid.vertex_buffer.slice(..));
                pass.draw(0..self.grid.vertex_count, 0..1);
            }
            if let Some(buffer) = &mesh_buffer {
                pass.set_pipeline(&self.mesh_pipeline);
                pass.set_vertex_buffer(0, buffer.slice(..));
                pass.draw(0..triangle_count, 0..1);
            }
            if let Some(buffer) = &overlay_buffer {
                pass.set_pipeline(&self.overlay_pipeline);
                pass.set_vertex_buffer(0, buffer.slice(..));
                pass.draw(0..overlay.len() as u32, 0..1);
            }
        }

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("depth_vis_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &targets.depth_vis_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                ..Default::default()
            });
            pass.set_pipeline(&self.depth_pipeline);
            pass.set_bind_group(0, &self.camera_bind_group, &[]);
            pass.set_bind_group(1, &targets.depth_bind_group, &[]);
            pass.draw(0..3, 0..1);
        }

        self.queue.submit(std::iter::once(encoder.finish()));
    }
}

/// Reads single pixels back from the identity target.
impl IdentityBuffer for Renderer {
    fn size(&self) -> UVec2 {
        self.targets.as_ref().map_or(UVec2::ZERO, |t| t.size)
    }

    fn sample(&self, pixel: UVec2) -> u32 {
        let Some(targets) = &self.targets else { return 0 };
        if pixel.x >= targets.size.x || pixel.y >= targets.size.y {
            return 0;
        }

        // One texel, padded to the required row alignment.
        let readback = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("pick_readback"),
            size: wgpu::COPY_BYTES_PER_ROW_ALIGNMENT as u64,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });
        let mut encoder = self.device.create_command_encoder(
            &wgpu::CommandEncoderDescriptor { label: Some("pick_encoder") },
        );
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &targets.identity_texture,
                mip_level: 0,
                origin: wgpu::Origin3d { x: pixel.x, y: pixel.y, z: 0 },
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &readback,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT),
                    rows_per_image: Some(1),
                },
            },
            wgpu::Extent3d { width: 1, height: 1, depth_or_array_layers: 1 },
        );
        self.queue.submit(std::iter::once(encoder.finish()));

        let slice = readback.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        if let Err(e) = self.device.poll(wgpu::PollType::Wait) {
            log::warn!("pick readback poll failed: {e}");
            return 0;
        }
        match rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                log::warn!("pick readback failed: {e}");
                return 0;
            }
            Err(_) => return 0,
        }

        let id = {
            let data = slice.get_mapped_range();
            bytemuck::pod_read_unaligned::<u32>(&data[..4])
        };
        readback.unmap();
        id
    }
}

fn depth_state(write: bool, compare: wgpu::CompareFunction) -> wgpu::DepthStencilState {
    wgpu::DepthStencilState {
        format: DEPTH_FORMAT,
        depth_write_enabled: write,
        depth_compare: compare,
        stencil: Default::default(),
        bias: Default::default(),
    }
}

fn depth_attachment(view: &wgpu::TextureView) -> wgpu::RenderPassDepthStencilAttachment<'_> {
    wgpu::RenderPassDepthStencilAttachment {
        view,
        depth_ops: Some(wgpu::Operations {
            load: wgpu::LoadOp::Clear(1.0),
            store: wgpu::StoreOp::Store,
        }),
        stencil_ops: None,
    }
}
