use std::collections::HashSet;

use glam::Vec2;
use winit::event::{DeviceEvent, ElementState, MouseButton, WindowEvent};
use winit::keyboard::{KeyCode, PhysicalKey};

/// Tracks current input state (keys held, mouse position, etc.)
///
/// Window events update it as they arrive; `begin_frame` clears the
/// one-frame edges once the frame has consumed them.
#[derive(Debug, Clone, Default)]
pub struct InputState {
    /// Cursor position in window pixels.
    pub mouse_pos: Vec2,
    /// Raw pointer motion since the last frame. Keeps reporting while the cursor is locked.
    pub mouse_motion: Vec2,
    pub buttons_held: HashSet<MouseButton>,
    /// True for one frame when button first pressed
    pub buttons_pressed: HashSet<MouseButton>,
    pub keys_held: HashSet<KeyCode>,
    pub keys_just_pressed: HashSet<KeyCode>,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Call at the start of each frame to clear per-frame state.
    pub fn begin_frame(&mut self) {
        self.mouse_motion = Vec2::ZERO;
        self.buttons_pressed.clear();
        self.keys_just_pressed.clear();
    }

    pub fn handle_event(&mut self, event: &WindowEvent) {
        match event {
            WindowEvent::CursorMoved { position, .. } => {
                self.mouse_pos = Vec2::new(position.x as f32, position.y as f32);
            }
            WindowEvent::MouseInput { state, button, .. } => {
                self.set_button(*button, *state == ElementState::Pressed);
            }
            WindowEvent::KeyboardInput { event, .. } => {
                if let PhysicalKey::Code(key) = event.physical_key {
                    self.set_key(key, event.state == ElementState::Pressed);
                }
            }
            WindowEvent::Focused(false) => {
                // Releases that happen while unfocused never reach us
                self.buttons_held.clear();
                self.keys_held.clear();
            }
            _ => {}
        }
    }

    pub fn handle_device_event(&mut self, event: &DeviceEvent) {
        if let DeviceEvent::MouseMotion { delta } = event {
            self.mouse_motion += Vec2::new(delta.0 as f32, delta.1 as f32);
        }
    }

    pub fn set_button(&mut self, button: MouseButton, pressed: bool) {
        if pressed {
            if self.buttons_held.insert(button) {
                self.buttons_pressed.insert(button);
            }
        } else {
            self.buttons_held.remove(&button);
        }
    }

    pub fn set_key(&mut self, key: KeyCode, pressed: bool) {
        if pressed {
            if self.keys_held.insert(key) {
                self.keys_just_pressed.insert(key);
            }
        } else {
            self.keys_held.remove(&key);
        }
    }

    pub fn button_held(&self, button: MouseButton) -> bool {
        self.buttons_held.contains(&button)
    }

    pub fn button_down(&self, button: MouseButton) -> bool {
        self.buttons_pressed.contains(&button)
    }

    pub fn key_held(&self, key: KeyCode) -> bool {
        self.keys_held.contains(&key)
    }

    pub fn key_just_pressed(&self, key: KeyCode) -> bool {
        self.keys_just_pressed.contains(&key)
    }

    pub fn ctrl_held(&self) -> bool {
        self.key_held(KeyCode::ControlLeft) || self.key_held(KeyCode::ControlRight)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn press_edge_lasts_one_frame() {
        let mut input = InputState::new();
        input.set_button(MouseButton::Left, true);
        assert!(input.button_down(MouseButton::Left));
        assert!(input.button_held(MouseButton::Left));

        input.begin_frame();
        input.set_button(MouseButton::Left, true);
        assert!(!input.button_down(MouseButton::Left), "key repeat is not a new press");

        input.set_button(MouseButton::Left, false);
        assert!(!input.button_held(MouseButton::Left));
        input.begin_frame();
        assert!(!input.button_down(MouseButton::Left));
    }

    #[test]
    fn device_motion_accumulates_until_frame_start() {
        let mut input = InputState::new();
        input.handle_device_event(&DeviceEvent::MouseMotion { delta: (3.0, -1.0) });
        input.handle_device_event(&DeviceEvent::MouseMotion { delta: (2.0, 4.0) });
        assert_eq!(input.mouse_motion, Vec2::new(5.0, 3.0));
        input.begin_frame();
        assert_eq!(input.mouse_motion, Vec2::ZERO);
    }

    #[test]
    fn keys_track_held_and_edges() {
        let mut input = InputState::new();
        input.set_key(KeyCode::KeyW, true);
        assert!(input.key_just_pressed(KeyCode::KeyW));
        input.begin_frame();
        assert!(input.key_held(KeyCode::KeyW));
        assert!(!input.key_just_pressed(KeyCode::KeyW));
        input.set_key(KeyCode::KeyW, false);
        assert!(!input.key_held(KeyCode::KeyW));
    }
}
