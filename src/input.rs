//! Keyboard state shared between the window event handler and the frame loop.

use std::collections::HashSet;

use winit::{
    event::{ElementState, KeyEvent, WindowEvent},
    keyboard::{KeyCode, PhysicalKey},
};

/// Set of physical keys that are currently held down.
///
/// Only the last press/release per key is remembered, key repeats are
/// idempotent.
#[derive(Clone, Debug, Default)]
pub struct KeyState {
    pressed: HashSet<KeyCode>,
}

impl KeyState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, code: KeyCode, state: ElementState) {
        match state {
            ElementState::Pressed => {
                self.pressed.insert(code);
            }
            ElementState::Released => {
                self.pressed.remove(&code);
            }
        }
    }

    pub fn is_pressed(&self, code: KeyCode) -> bool {
        self.pressed.contains(&code)
    }

    /// Records keyboard input. Returns `true` if the event was a key event
    /// with a known physical key code.
    pub fn handle_window_event(&mut self, event: &WindowEvent) -> bool {
        match event {
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(code),
                        state,
                        ..
                    },
                ..
            } => {
                self.set(*code, *state);
                true
            }
            // Releases can get lost while the window is unfocused
            WindowEvent::Focused(false) => {
                self.pressed.clear();
                false
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn press_and_release_are_tracked_per_key() {
        let mut keys = KeyState::new();
        assert!(!keys.is_pressed(KeyCode::Space));

        keys.set(KeyCode::Space, ElementState::Pressed);
        keys.set(KeyCode::KeyW, ElementState::Pressed);
        assert!(keys.is_pressed(KeyCode::Space));
        assert!(keys.is_pressed(KeyCode::KeyW));

        keys.set(KeyCode::Space, ElementState::Released);
        assert!(!keys.is_pressed(KeyCode::Space));
        assert!(keys.is_pressed(KeyCode::KeyW));
    }

    #[test]
    fn repeated_presses_need_a_single_release() {
        let mut keys = KeyState::new();
        keys.set(KeyCode::Space, ElementState::Pressed);
        keys.set(KeyCode::Space, ElementState::Pressed);
        keys.set(KeyCode::Space, ElementState::Released);
        assert!(!keys.is_pressed(KeyCode::Space));
    }

    #[test]
    fn losing_focus_releases_everything() {
        let mut keys = KeyState::new();
        keys.set(KeyCode::Space, ElementState::Pressed);
        assert!(!keys.handle_window_event(&WindowEvent::Focused(false)));
        assert!(!keys.is_pressed(KeyCode::Space));
    }
}
