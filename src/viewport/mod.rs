mod handles;

use handles::{HandleSetup, Handles, Snap};

use glam::{Mat4, UVec2, Vec2, Vec3};
use winit::event::MouseButton;
use winit::keyboard::KeyCode;

use crate::input::InputState;
use crate::render::Camera;
use crate::render::vertex::LineVertex;
use crate::scene::Map;
use crate::settings::{CameraSettings, Settings};
use crate::util::picking::{self, IdentityBuffer, Pick};
use crate::util::space::{handle_frame, Space};

/// Active manipulation tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tool {
    #[default]
    Translate,
    Rotate,
    Scale,
    Universal,
}

impl Tool {
    pub const ALL: [Tool; 4] = [Tool::Translate, Tool::Rotate, Tool::Scale, Tool::Universal];

    pub fn label(self) -> &'static str {
        match self {
            Tool::Translate => "Translate",
            Tool::Rotate => "Rotate",
            Tool::Scale => "Scale",
            Tool::Universal => "Universal",
        }
    }
}

/// Which render target the viewport shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DrawMode {
    #[default]
    Shaded,
    Depth,
}

impl DrawMode {
    pub const ALL: [DrawMode; 2] = [DrawMode::Shaded, DrawMode::Depth];

    pub fn label(self) -> &'static str {
        match self {
            DrawMode::Shaded => "Shaded",
            DrawMode::Depth => "Depth",
        }
    }
}

/// Screen rectangle of the viewport image, in window pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ViewRect {
    pub min: Vec2,
    pub size: Vec2,
}

impl ViewRect {
    pub fn contains(&self, point: Vec2) -> bool {
        let max = self.min + self.size;
        point.x >= self.min.x && point.y >= self.min.y && point.x < max.x && point.y < max.y
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    pub show: bool,
    pub snap: bool,
    pub size: Vec3,
    /// Keep all three axes at the same size.
    pub uniform: bool,
}

impl Grid {
    /// Menu label: a single size when all axes agree, else all three.
    pub fn label(&self) -> String {
        let size = self.size;
        if self.uniform || (size.x == size.y && size.y == size.z) {
            format!("Grid {}", self.size.x)
        } else {
            format!("Grid {} {} {}", self.size.x, self.size.y, self.size.z)
        }
    }

    pub fn set_uniform_size(&mut self, size: f32) {
        self.size = Vec3::splat(size.max(0.0));
    }
}

/// Cursor state the window should be in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorMode {
    Normal,
    /// Hidden and held in place for mouse-look.
    Locked,
}

/// Side effects for the shell to carry out after a viewport update.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ViewportCommand {
    /// Render targets should match the new drawing area.
    ResizeTarget(UVec2),
    /// Show the last rendered image for `mode` in `rect`.
    Present { mode: DrawMode, rect: ViewRect },
    SetCursor(CursorMode),
}

/// What the presentation layer learned about the viewport this frame.
#[derive(Debug, Clone, Copy, Default)]
pub struct ViewportUi {
    /// Size of the drawing area in pixels.
    pub available: Vec2,
    /// Top-left of the drawing area in window pixels.
    pub origin: Vec2,
    pub tool_clicked: Option<Tool>,
    /// Pointer is over a menu, toolbar or popup.
    pub blocking: bool,
    /// A text field has keyboard focus.
    pub keyboard_captured: bool,
}

pub struct FrameInput<'a> {
    pub ui: ViewportUi,
    pub input: &'a InputState,
    /// Identity buffer rendered earlier this frame, if any.
    pub identity: Option<&'a dyn IdentityBuffer>,
    pub delta_time: f32,
}

#[derive(Debug, Default)]
pub struct ViewportOutput {
    pub commands: Vec<ViewportCommand>,
    pub handle_lines: Vec<LineVertex>,
}

/// Per-window manipulation controller: camera navigation, picking and
/// handle-driven edits of the selection.
pub struct Viewport {
    pub tool: Tool,
    pub space: Space,
    pub allow_axis_flip: bool,
    pub grid: Grid,
    pub rotation_snap_degrees: f32,
    pub draw_mode: DrawMode,
    pub camera: Camera,
    pub camera_settings: CameraSettings,
    popup_open: bool,
    target_size: UVec2,
    rect: ViewRect,
    look_engaged: bool,
    handles: Handles,
}

impl Viewport {
    pub fn new(settings: &Settings) -> Self {
        let mut camera = Camera::new();
        camera.fov_degrees = settings.camera.fov_degrees;
        camera.near = settings.camera.near_plane;
        camera.far = settings.camera.far_plane;
        camera.right_handed = settings.camera.right_handed;
        Self {
            tool: Tool::default(),
            space: Space::default(),
            allow_axis_flip: true,
            grid: Grid {
                show: settings.grid.show,
                snap: settings.grid.snap,
                size: Vec3::from_array(settings.grid.size),
                uniform: settings.grid.uniform,
            },
            rotation_snap_degrees: settings.grid.rotation_snap_degrees,
            draw_mode: DrawMode::default(),
            camera,
            camera_settings: settings.camera.clone(),
            popup_open: false,
            target_size: UVec2::ZERO,
            rect: ViewRect::default(),
            look_engaged: false,
            handles: Handles::new(),
        }
    }

    /// Write the tunables edited through the viewport menus back into `settings`.
    pub fn store_settings(&self, settings: &mut Settings) {
        settings.camera = self.camera_settings.clone();
        settings.camera.fov_degrees = self.camera.fov_degrees;
        settings.grid.show = self.grid.show;
        settings.grid.snap = self.grid.snap;
        settings.grid.size = self.grid.size.to_array();
        settings.grid.uniform = self.grid.uniform;
        settings.grid.rotation_snap_degrees = self.rotation_snap_degrees;
    }

    pub fn rect(&self) -> ViewRect {
        self.rect
    }

    pub fn target_size(&self) -> UVec2 {
        self.target_size
    }

    pub fn is_looking(&self) -> bool {
        self.look_engaged
    }

    /// Run one frame of interaction.
    pub fn update(&mut self, map: &mut Map, frame: &FrameInput<'_>) -> ViewportOutput {
        let mut out = ViewportOutput::default();

        // Collapsed window: leave everything as it was.
        let size = frame.ui.available.max(Vec2::ZERO).as_uvec2();
        if size.x == 0 || size.y == 0 {
            return out;
        }
        if size != self.target_size {
            self.target_size = size;
            self.camera.set_aspect(size.x as f32, size.y as f32);
            out.commands.push(ViewportCommand::ResizeTarget(size));
        }

        self.rect = ViewRect { min: frame.ui.origin, size: size.as_vec2() };
        out.commands.push(ViewportCommand::Present { mode: self.draw_mode, rect: self.rect });

        if let Some(tool) = frame.ui.tool_clicked
            && tool != self.tool
        {
            log::info!("tool: {}", tool.label());
            self.tool = tool;
        }
        self.popup_open = frame.ui.blocking;

        let input = frame.input;
        let in_rect = self.rect.contains(input.mouse_pos);
        let local_mouse = input.mouse_pos - self.rect.min;
        let can_point = in_rect && !self.popup_open && !self.look_engaged;

        self.place_handles(map, can_point.then_some(local_mouse));

        if input.button_down(MouseButton::Left) && can_point {
            if !map.selection().is_empty() && self.handles.is_mouse_over() {
                self.handles.begin_drag(local_mouse);
            } else if let Some(buffer) = frame.identity {
                self.pick(map, buffer, local_mouse, input.ctrl_held());
            }
        }

        if self.handles.is_dragging() {
            if input.button_held(MouseButton::Left) {
                if let Some(step) = self.handles.drag(local_mouse) {
                    map.transform_selected(&step);
                }
            } else {
                self.handles.end_drag();
            }
        }

        self.navigate(frame, in_rect, &mut out);

        if !frame.ui.keyboard_captured {
            self.edit_keys(map, input);
        }

        out.handle_lines = self.handles.lines();
        out
    }

    fn place_handles(&mut self, map: &Map, mouse: Option<Vec2>) {
        let Some(bounds) = map.selection_bounds() else {
            self.handles.end();
            return;
        };
        let orientation = match self.space {
            Space::World => glam::Quat::IDENTITY,
            Space::Local => map.primary_orientation(),
        };
        let frame = handle_frame(self.space, bounds.center(), orientation);
        let extent = bounds.transformed(&Mat4::from_quat(orientation.inverse())).size();
        let setup = HandleSetup {
            tool: self.tool,
            frame,
            camera_position: self.camera.position,
            camera_forward: self.camera.forward(),
            view_proj: self.camera.view_projection(),
            screen_size: self.rect.size,
            allow_axis_flip: self.allow_axis_flip,
            extent,
            snap: self.grid.snap.then_some(Snap {
                grid: self.grid.size,
                rotation_degrees: self.rotation_snap_degrees,
            }),
        };
        self.handles.begin(setup, mouse);
    }

    /// Plain click replaces the selection, Ctrl+click toggles, empty space
    /// clears. A stale id leaves the selection alone.
    fn pick(&mut self, map: &mut Map, buffer: &dyn IdentityBuffer, mouse: Vec2, toggle: bool) {
        let pixel = mouse.max(Vec2::ZERO).as_uvec2();
        let hit = picking::pick(buffer, map.objects(), pixel);
        if let Pick::Stale(raw) = hit {
            log::warn!("pick hit destroyed object #{raw}");
            return;
        }
        match hit.id() {
            Some(id) => {
                log::debug!("picked {id}");
                if toggle {
                    map.toggle(id);
                } else {
                    map.replace_selection(id);
                }
            }
            None if !toggle => map.clear_selection(),
            None => {}
        }
    }

    fn navigate(&mut self, frame: &FrameInput<'_>, in_rect: bool, out: &mut ViewportOutput) {
        let input = frame.input;
        let look_held = input.button_held(MouseButton::Right) || input.key_held(KeyCode::KeyZ);

        if self.look_engaged && !look_held {
            self.look_engaged = false;
            out.commands.push(ViewportCommand::SetCursor(CursorMode::Normal));
        }

        let allowed = (in_rect || self.look_engaged)
            && !self.popup_open
            && !input.ctrl_held()
            && !frame.ui.keyboard_captured;
        if !allowed {
            return;
        }

        let engage = input.button_down(MouseButton::Right) || input.key_just_pressed(KeyCode::KeyZ);
        if engage && !self.look_engaged {
            self.look_engaged = true;
            out.commands.push(ViewportCommand::SetCursor(CursorMode::Locked));
        }

        let settings = &self.camera_settings;
        if self.look_engaged {
            let motion = input.mouse_motion * settings.sensitivity;
            self.camera.look(
                motion.x * settings.m_yaw,
                -motion.y * settings.m_pitch,
                settings.pitch_down,
                settings.pitch_up,
            );
        }

        let axis = |positive: KeyCode, negative: KeyCode| {
            input.key_held(positive) as i32 as f32 - input.key_held(negative) as i32 as f32
        };
        let wish = Vec2::new(axis(KeyCode::KeyW, KeyCode::KeyS), axis(KeyCode::KeyD, KeyCode::KeyA));
        if wish != Vec2::ZERO {
            let step = wish.normalize() * settings.max_speed * frame.delta_time;
            self.camera.fly(step.x, step.y);
        }
    }

    fn edit_keys(&mut self, map: &mut Map, input: &InputState) {
        if map.selection().is_empty() {
            return;
        }
        if input.key_just_pressed(KeyCode::Delete) {
            log::info!("deleting {} object(s)", map.selection().len());
            map.delete_selected();
        } else if input.key_just_pressed(KeyCode::Escape) {
            map.clear_selection();
        } else if input.ctrl_held() && input.key_just_pressed(KeyCode::KeyB) {
            map.align_selected_to_grid(self.grid.size);
        }
    }
}
