use std::collections::HashSet;

use winit::event::{ElementState, MouseScrollDelta, WindowEvent};
use winit::keyboard::{KeyCode, PhysicalKey};

/// Pixels per wheel notch, used to bring trackpad deltas to line units.
const PIXELS_PER_LINE: f32 = 120.0;

/// Convert a winit wheel delta to a page-style vertical delta.
///
/// Positive means "scroll down" (wheel towards the user), which walks the
/// preset list forwards. winit reports the opposite sign.
pub fn wheel_delta_y(delta: &MouseScrollDelta) -> f32 {
    match delta {
        MouseScrollDelta::LineDelta(_, y) => -*y,
        MouseScrollDelta::PixelDelta(pos) => -(pos.y as f32) / PIXELS_PER_LINE,
    }
}

/// Tracks keyboard state and the wheel events seen this frame.
///
/// Wheel events are kept individually rather than summed: each one is a
/// separate request to move one preset.
#[derive(Default)]
pub struct Input {
    keys_down: HashSet<KeyCode>,
    keys_pressed: HashSet<KeyCode>,
    wheel: Vec<f32>,
}

impl Input {
    pub fn new() -> Self {
        Self::default()
    }

    /// Call at the start of each frame to reset per-frame state.
    pub fn begin_frame(&mut self) {
        self.keys_pressed.clear();
        self.wheel.clear();
    }

    /// Process a window event and update input state.
    pub fn handle_event(&mut self, event: &WindowEvent) {
        match event {
            WindowEvent::KeyboardInput { event, .. } => {
                if let PhysicalKey::Code(key) = event.physical_key {
                    self.key_event(key, event.state);
                }
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let dy = wheel_delta_y(delta);
                if dy != 0.0 {
                    self.wheel.push(dy);
                }
            }
            _ => {}
        }
    }

    fn key_event(&mut self, key: KeyCode, state: ElementState) {
        match state {
            ElementState::Pressed => {
                if self.keys_down.insert(key) {
                    self.keys_pressed.insert(key);
                }
            }
            ElementState::Released => {
                self.keys_down.remove(&key);
            }
        }
    }

    /// Returns true if the key is currently held down.
    pub fn key_down(&self, key: KeyCode) -> bool {
        self.keys_down.contains(&key)
    }

    /// Returns true if the key was pressed this frame.
    pub fn key_pressed(&self, key: KeyCode) -> bool {
        self.keys_pressed.contains(&key)
    }

    /// Wheel deltas received since the last [`begin_frame`](Self::begin_frame), oldest first.
    pub fn wheel_events(&self) -> &[f32] {
        &self.wheel
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use winit::dpi::PhysicalPosition;

    #[test]
    fn wheel_towards_user_is_positive() {
        assert_eq!(wheel_delta_y(&MouseScrollDelta::LineDelta(0.0, -1.0)), 1.0);
        assert_eq!(wheel_delta_y(&MouseScrollDelta::LineDelta(0.0, 3.0)), -3.0);
        let px = MouseScrollDelta::PixelDelta(PhysicalPosition::new(0.0, -240.0));
        assert_eq!(wheel_delta_y(&px), 2.0);
    }

    #[test]
    fn key_press_is_reported_once() {
        let mut input = Input::new();
        input.key_event(KeyCode::Escape, ElementState::Pressed);
        assert!(input.key_pressed(KeyCode::Escape));
        input.begin_frame();
        input.key_event(KeyCode::Escape, ElementState::Pressed);
        assert!(input.key_down(KeyCode::Escape));
        assert!(!input.key_pressed(KeyCode::Escape));
        input.key_event(KeyCode::Escape, ElementState::Released);
        assert!(!input.key_down(KeyCode::Escape));
    }
}
