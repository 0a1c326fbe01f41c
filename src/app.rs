use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use winit::application::ApplicationHandler;
use winit::event::{DeviceEvent, DeviceId, WindowEvent};
use winit::event_loop::ActiveEventLoop;
use winit::window::{CursorGrabMode, Window, WindowAttributes, WindowId};

use crate::input::InputState;
use crate::render::vertex::LineVertex;
use crate::render::{Renderer, ViewportScene};
use crate::scene::Map;
use crate::settings::Settings;
use crate::ui::{UiAction, ViewportFrame, ViewportTextures};
use crate::util::picking::IdentityBuffer;
use crate::viewport::{CursorMode, Viewport, ViewportCommand};

/// Top-level application state.
pub struct App {
    gpu: Option<GpuState>,
    map: Map,
    input: InputState,
    viewport: Viewport,
    settings: Settings,
    /// Handle lines produced by the last viewport update, drawn next frame.
    handle_lines: Vec<LineVertex>,
    /// Where the current map was last opened from or saved to.
    map_path: Option<PathBuf>,
    last_frame: Instant,
}

/// Everything that requires the window to exist.
struct GpuState {
    window: Arc<Window>,
    renderer: Renderer,
    egui_state: egui_winit::State,
    egui_renderer: egui_wgpu::Renderer,
    textures: ViewportTextures,
}

impl App {
    pub fn new() -> Self {
        let settings = Settings::load();
        Self {
            gpu: None,
            map: Map::demo(),
            input: InputState::new(),
            viewport: Viewport::new(&settings),
            settings,
            handle_lines: Vec::new(),
            map_path: None,
            last_frame: Instant::now(),
        }
    }

    fn shutdown(&mut self, event_loop: &ActiveEventLoop) {
        self.viewport.store_settings(&mut self.settings);
        self.settings.save();
        log::info!("settings saved, exiting");
        event_loop.exit();
    }

    fn title(&self) -> String {
        match self.map_path.as_ref().and_then(|p| p.file_name()) {
            Some(name) => format!("Chisel - {}", name.to_string_lossy()),
            None => "Chisel".to_string(),
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.gpu.is_some() {
            return;
        }

        let attrs = WindowAttributes::default()
            .with_title(self.title())
            .with_inner_size(winit::dpi::LogicalSize::new(1280u32, 720u32));
        let window = Arc::new(event_loop.create_window(attrs).expect("failed to create window"));

        let renderer = pollster::block_on(Renderer::new(window.clone()));

        let egui_ctx = egui::Context::default();
        let egui_state = egui_winit::State::new(
            egui_ctx,
            egui::ViewportId::ROOT,
            &window,
            Some(window.scale_factor() as f32),
            None,
            None,
        );
        let egui_renderer = egui_wgpu::Renderer::new(
            &renderer.device,
            renderer.surface_format,
            None,
            1,
            false,
        );

        self.gpu = Some(GpuState {
            window,
            renderer,
            egui_state,
            egui_renderer,
            textures: ViewportTextures::default(),
        });
        self.last_frame = Instant::now();
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        let Some(gpu) = &mut self.gpu else { return };

        let _ = gpu.egui_state.on_window_event(&gpu.window, &event);

        match &event {
            WindowEvent::CloseRequested => {
                self.shutdown(event_loop);
                return;
            }
            WindowEvent::Resized(new_size) => {
                gpu.renderer.resize(new_size.width, new_size.height);
            }
            WindowEvent::RedrawRequested => {
                self.redraw(event_loop);
            }
            _ => {}
        }

        // The viewport decides for itself whether egui is in the way.
        self.input.handle_event(&event);

        if let Some(gpu) = &self.gpu {
            gpu.window.request_redraw();
        }
    }

    fn device_event(&mut self, _event_loop: &ActiveEventLoop, _device_id: DeviceId, event: DeviceEvent) {
        self.input.handle_device_event(&event);
    }
}

impl App {
    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let now = Instant::now();
        let delta_time = now.duration_since(self.last_frame).as_secs_f32();
        self.last_frame = now;

        // Deferred deletions land before anything can pick them.
        let destroyed = self.map.collect_deleted();
        if destroyed > 0 {
            log::debug!("destroyed {destroyed} object(s)");
        }

        let Some(gpu) = &mut self.gpu else { return };

        let output = match gpu.renderer.surface.get_current_texture() {
            Ok(output) => output,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                let size = gpu.window.inner_size();
                gpu.renderer.resize(size.width, size.height);
                return;
            }
            Err(e) => {
                log::error!("surface error: {e}");
                return;
            }
        };
        let view = output.texture.create_view(&wgpu::TextureViewDescriptor::default());

        let display = &self.settings.display;
        gpu.renderer.render_viewport(
            &ViewportScene {
                map: &self.map,
                camera: &self.viewport.camera,
                display,
                grid: self.viewport.grid.show.then_some(self.viewport.grid.size),
                handle_lines: &self.handle_lines,
            },
            display.bg_color,
        );

        // Run egui; the viewport update happens inside
        let raw_input = gpu.egui_state.take_egui_input(&gpu.window);
        let egui_ctx = gpu.egui_state.egui_ctx().clone();
        let mut ui_result = None;
        let full_output = egui_ctx.run(raw_input, |ctx| {
            ui_result = Some(crate::ui::draw_ui(
                ctx,
                &mut self.viewport,
                &mut self.map,
                ViewportFrame {
                    input: &self.input,
                    identity: Some(&gpu.renderer as &dyn IdentityBuffer),
                    delta_time,
                },
                &gpu.textures,
            ));
        });
        gpu.egui_state.handle_platform_output(&gpu.window, full_output.platform_output);

        let mut action = UiAction::None;
        if let Some(result) = ui_result {
            action = result.action;
            self.handle_lines = result.viewport.handle_lines;
            for command in result.viewport.commands {
                match command {
                    ViewportCommand::ResizeTarget(size) => {
                        gpu.renderer.resize_targets(size);
                        sync_viewport_textures(gpu);
                    }
                    ViewportCommand::SetCursor(mode) => apply_cursor(&gpu.window, mode),
                    ViewportCommand::Present { .. } => {}
                }
            }
        }

        let paint_jobs = egui_ctx.tessellate(full_output.shapes, full_output.pixels_per_point);
        let screen_descriptor = egui_wgpu::ScreenDescriptor {
            size_in_pixels: [gpu.renderer.config.width, gpu.renderer.config.height],
            pixels_per_point: full_output.pixels_per_point,
        };

        for (id, delta) in &full_output.textures_delta.set {
            gpu.egui_renderer.update_texture(&gpu.renderer.device, &gpu.renderer.queue, *id, delta);
        }

        {
            let mut encoder = gpu.renderer.device.create_command_encoder(
                &wgpu::CommandEncoderDescriptor { label: Some("egui_encoder") },
            );

            gpu.egui_renderer.update_buffers(
                &gpu.renderer.device,
                &gpu.renderer.queue,
                &mut encoder,
                &paint_jobs,
                &screen_descriptor,
            );

            {
                let pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("egui_pass"),
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        view: &view,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                            store: wgpu::StoreOp::Store,
                        },
                    })],
                    depth_stencil_attachment: None,
                    ..Default::default()
                });
                let mut pass = pass.forget_lifetime();
                gpu.egui_renderer.render(&mut pass, &paint_jobs, &screen_descriptor);
            }

            gpu.renderer.queue.submit(std::iter::once(encoder.finish()));
        }

        output.present();

        for id in &full_output.textures_delta.free {
            gpu.egui_renderer.free_texture(id);
        }

        self.input.begin_frame();
        self.apply_action(action, event_loop);
    }

    fn apply_action(&mut self, action: UiAction, event_loop: &ActiveEventLoop) {
        match action {
            UiAction::None => {}
            UiAction::OpenMap => self.open_map(),
            UiAction::SaveMapAs => self.save_map_as(),
            UiAction::Quit => self.shutdown(event_loop),
            UiAction::DeleteSelection => self.map.delete_selected(),
            UiAction::ClearSelection => self.map.clear_selection(),
            UiAction::AlignToGrid => self.map.align_selected_to_grid(self.viewport.grid.size),
            UiAction::SetVolume(volume) => self.map.set_selected_volume(volume),
        }
    }

    fn open_map(&mut self) {
        let file = rfd::FileDialog::new()
            .add_filter("Chisel Map", &["json"])
            .set_title("Open Map")
            .pick_file();
        let Some(path) = file else { return };

        match crate::io::load_map(&path, &self.map) {
            Ok(map) => {
                log::info!("opened {} ({} objects)", path.display(), map.objects().len());
                self.map = map;
                self.map_path = Some(path);
                self.update_title();
            }
            Err(e) => log::error!("failed to open map: {e}"),
        }
    }

    fn save_map_as(&mut self) {
        let mut dialog = rfd::FileDialog::new()
            .add_filter("Chisel Map", &["json"])
            .set_title("Save Map As");
        if let Some(name) = self.map_path.as_ref().and_then(|p| p.file_name()) {
            dialog = dialog.set_file_name(name.to_string_lossy());
        }
        let Some(path) = dialog.save_file() else { return };

        match crate::io::save_map(&self.map, &path) {
            Ok(()) => {
                log::info!("saved {}", path.display());
                self.map_path = Some(path);
                self.update_title();
            }
            Err(e) => log::error!("failed to save map: {e}"),
        }
    }

    fn update_title(&self) {
        if let Some(gpu) = &self.gpu {
            gpu.window.set_title(&self.title());
        }
    }
}

/// Point the egui textures at the renderer's current viewport images.
fn sync_viewport_textures(gpu: &mut GpuState) {
    let device = &gpu.renderer.device;
    let pairs = [
        (gpu.renderer.color_view(), &mut gpu.textures.shaded),
        (gpu.renderer.depth_vis_view(), &mut gpu.textures.depth),
    ];
    for (view, slot) in pairs {
        let Some(view) = view else { continue };
        match *slot {
            Some(id) => gpu.egui_renderer.update_egui_texture_from_wgpu_texture(
                device,
                view,
                wgpu::FilterMode::Linear,
                id,
            ),
            None => {
                *slot = Some(gpu.egui_renderer.register_native_texture(
                    device,
                    view,
                    wgpu::FilterMode::Linear,
                ));
            }
        }
    }
}

fn apply_cursor(window: &Window, mode: CursorMode) {
    match mode {
        CursorMode::Locked => {
            // Not every platform can lock; confining is the closest fallback.
            if window.set_cursor_grab(CursorGrabMode::Locked).is_err()
                && let Err(e) = window.set_cursor_grab(CursorGrabMode::Confined)
            {
                log::warn!("could not grab cursor: {e}");
            }
            window.set_cursor_visible(false);
        }
        CursorMode::Normal => {
            if let Err(e) = window.set_cursor_grab(CursorGrabMode::None) {
                log::warn!("could not release cursor: {e}");
            }
            window.set_cursor_visible(true);
        }
    }
}
