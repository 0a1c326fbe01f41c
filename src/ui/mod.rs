use glam::Vec2;

use crate::input::InputState;
use crate::scene::Map;
use crate::selection::Volume;
use crate::util::picking::IdentityBuffer;
use crate::util::space::Space;
use crate::viewport::{
    DrawMode, FrameInput, Tool, ViewRect, Viewport, ViewportCommand, ViewportOutput, ViewportUi,
};

/// Actions the UI wants the app to execute (can't borrow mutably inside egui closures).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UiAction {
    None,
    OpenMap,
    SaveMapAs,
    Quit,
    DeleteSelection,
    ClearSelection,
    AlignToGrid,
    SetVolume(Volume),
}

/// egui handles for the renderer's viewport images.
#[derive(Debug, Clone, Copy, Default)]
pub struct ViewportTextures {
    pub shaded: Option<egui::TextureId>,
    pub depth: Option<egui::TextureId>,
}

impl ViewportTextures {
    fn for_mode(&self, mode: DrawMode) -> Option<egui::TextureId> {
        match mode {
            DrawMode::Shaded => self.shaded,
            DrawMode::Depth => self.depth,
        }
    }
}

/// Per-frame inputs the viewport needs besides egui itself.
pub struct ViewportFrame<'a> {
    pub input: &'a InputState,
    pub identity: Option<&'a dyn IdentityBuffer>,
    pub delta_time: f32,
}

pub struct UiResult {
    pub action: UiAction,
    pub viewport: ViewportOutput,
}

/// Draw the main menu and the viewport, running one controller update.
pub fn draw_ui(
    ctx: &egui::Context,
    viewport: &mut Viewport,
    map: &mut Map,
    frame: ViewportFrame<'_>,
    textures: &ViewportTextures,
) -> UiResult {
    let mut action = UiAction::None;
    let has_selection = !map.selection().is_empty();

    let menu_bar = egui::TopBottomPanel::top("menu_bar").show(ctx, |ui| {
        egui::MenuBar::new().ui(ui, |ui| {
            ui.menu_button("File", |ui| {
                if ui.button("Open...").clicked() {
                    action = UiAction::OpenMap;
                    ui.close();
                }
                if ui.button("Save As...").clicked() {
                    action = UiAction::SaveMapAs;
                    ui.close();
                }
                ui.separator();
                if ui.button("Quit").clicked() {
                    action = UiAction::Quit;
                    ui.close();
                }
            });
            ui.menu_button("Edit", |ui| {
                if ui.add_enabled(has_selection, egui::Button::new("Delete  Del")).clicked() {
                    action = UiAction::DeleteSelection;
                    ui.close();
                }
                if ui.add_enabled(has_selection, egui::Button::new("Clear Selection  Esc")).clicked() {
                    action = UiAction::ClearSelection;
                    ui.close();
                }
                if ui.add_enabled(has_selection, egui::Button::new("Align to Grid  Ctrl+B")).clicked() {
                    action = UiAction::AlignToGrid;
                    ui.close();
                }
                ui.separator();
                ui.add_enabled_ui(has_selection, |ui| {
                    ui.menu_button("Set Volume", |ui| {
                        for (volume, label) in [(Volume::Solid, "Solid"), (Volume::Hollow, "Hollow")] {
                            if ui.button(label).clicked() {
                                action = UiAction::SetVolume(volume);
                                ui.close();
                            }
                        }
                    });
                });
            });
        });
    });
    let mut blocking = menu_bar.response.contains_pointer();

    let mut viewport_output = ViewportOutput::default();
    egui::CentralPanel::default()
        .frame(egui::Frame::NONE)
        .show(ctx, |ui| {
            let mut tool_clicked = None;
            let toolbar = egui::Frame::side_top_panel(ui.style()).show(ui, |ui| {
                ui.horizontal(|ui| {
                    viewport_menus(ui, viewport);
                    ui.separator();
                    for tool in Tool::ALL {
                        if ui.selectable_label(viewport.tool == tool, tool.label()).clicked() {
                            tool_clicked = Some(tool);
                        }
                    }
                });
            });
            blocking |= toolbar.response.contains_pointer();
            blocking |= ctx.memory(|m| m.any_popup_open());

            let area = ui.available_rect_before_wrap();
            ui.allocate_rect(area, egui::Sense::hover());

            // Controller works in physical pixels, like the winit cursor.
            let ppp = ctx.pixels_per_point();
            let viewport_ui = ViewportUi {
                available: Vec2::new(area.width(), area.height()) * ppp,
                origin: Vec2::new(area.min.x, area.min.y) * ppp,
                tool_clicked,
                blocking,
                keyboard_captured: ctx.wants_keyboard_input(),
            };
            viewport_output = viewport.update(
                map,
                &FrameInput {
                    ui: viewport_ui,
                    input: frame.input,
                    identity: frame.identity,
                    delta_time: frame.delta_time,
                },
            );

            for command in &viewport_output.commands {
                if let ViewportCommand::Present { mode, rect } = *command
                    && let Some(texture) = textures.for_mode(mode)
                {
                    ui.painter().image(
                        texture,
                        to_egui_rect(rect, ppp),
                        egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0)),
                        egui::Color32::WHITE,
                    );
                }
            }
        });

    UiResult { action, viewport: viewport_output }
}

/// Space, grid, draw mode and camera menus above the viewport image.
fn viewport_menus(ui: &mut egui::Ui, viewport: &mut Viewport) {
    egui::ComboBox::from_id_salt("space")
        .selected_text(viewport.space.label())
        .show_ui(ui, |ui| {
            for space in Space::ALL {
                ui.selectable_value(&mut viewport.space, space, space.label());
            }
        });
    ui.checkbox(&mut viewport.allow_axis_flip, "Axis Flip");

    ui.menu_button(viewport.grid.label(), |ui| {
        let grid = &mut viewport.grid;
        ui.checkbox(&mut grid.show, "Show Grid");
        ui.checkbox(&mut grid.snap, "Snap to Grid");
        if ui.checkbox(&mut grid.uniform, "Uniform").changed() && grid.uniform {
            grid.set_uniform_size(grid.size.x);
        }
        if grid.uniform {
            let mut size = grid.size.x;
            if ui.add(egui::DragValue::new(&mut size).range(0.0..=4096.0).prefix("size: ")).changed() {
                grid.set_uniform_size(size);
            }
        } else {
            ui.horizontal(|ui| {
                ui.add(egui::DragValue::new(&mut grid.size.x).range(0.0..=4096.0).prefix("x:"));
                ui.add(egui::DragValue::new(&mut grid.size.y).range(0.0..=4096.0).prefix("y:"));
                ui.add(egui::DragValue::new(&mut grid.size.z).range(0.0..=4096.0).prefix("z:"));
            });
        }
        ui.add(
            egui::DragValue::new(&mut viewport.rotation_snap_degrees)
                .range(1.0..=90.0)
                .prefix("rotation: ")
                .suffix("°"),
        );
    });

    egui::ComboBox::from_id_salt("draw_mode")
        .selected_text(viewport.draw_mode.label())
        .show_ui(ui, |ui| {
            for mode in DrawMode::ALL {
                ui.selectable_value(&mut viewport.draw_mode, mode, mode.label());
            }
        });

    ui.menu_button("Camera", |ui| {
        ui.add(egui::Slider::new(&mut viewport.camera.fov_degrees, 30.0..=120.0).text("FOV"));
        ui.add(egui::Slider::new(&mut viewport.camera_settings.max_speed, 50.0..=4000.0).text("Speed"));
        ui.add(
            egui::Slider::new(&mut viewport.camera_settings.sensitivity, 0.5..=20.0).text("Sensitivity"),
        );
    });
}

fn to_egui_rect(rect: ViewRect, pixels_per_point: f32) -> egui::Rect {
    let min = rect.min / pixels_per_point;
    let size = rect.size / pixels_per_point;
    egui::Rect::from_min_size(egui::pos2(min.x, min.y), egui::vec2(size.x, size.y))
}
