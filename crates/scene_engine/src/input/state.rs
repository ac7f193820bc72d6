//! Per-frame input accumulation

use std::collections::HashSet;

use glfw::{Action, WindowEvent};

use crate::foundation::math::Vec2;

use super::keys::{Key, MouseButton};
use super::source::InputSource;

/// Held keys and buttons plus motion accumulated since the last
/// [`InputState::end_frame`]
#[derive(Debug, Clone, Default)]
pub struct InputState {
    keys_down: HashSet<Key>,
    keys_pressed: HashSet<Key>,
    buttons_down: HashSet<MouseButton>,
    cursor: Option<Vec2>,
    cursor_delta: Vec2,
    scroll: f32,
}

impl InputState {
    /// Nothing held, no motion
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one window event
    pub fn handle_event(&mut self, event: &WindowEvent) {
        match *event {
            WindowEvent::Key(key, _, action, _) => {
                if let Some(key) = Key::from_glfw(key) {
                    self.set_key(key, action != Action::Release);
                }
            }
            WindowEvent::MouseButton(button, action, _) => {
                if let Some(button) = MouseButton::from_glfw(button) {
                    self.set_mouse_button(button, action == Action::Press);
                }
            }
            WindowEvent::CursorPos(x, y) => self.set_cursor_position(Vec2::new(x as f32, y as f32)),
            WindowEvent::Scroll(_, y) => self.add_scroll(y as f32),
            _ => {}
        }
    }

    /// Press or release a key
    pub fn set_key(&mut self, key: Key, down: bool) {
        if down {
            if self.keys_down.insert(key) {
                self.keys_pressed.insert(key);
            }
        } else {
            self.keys_down.remove(&key);
        }
    }

    /// Press or release a mouse button
    pub fn set_mouse_button(&mut self, button: MouseButton, down: bool) {
        if down {
            self.buttons_down.insert(button);
        } else {
            self.buttons_down.remove(&button);
        }
    }

    /// Move the cursor; the first position after startup produces no delta
    pub fn set_cursor_position(&mut self, position: Vec2) {
        if let Some(previous) = self.cursor {
            self.cursor_delta += position - previous;
        }
        self.cursor = Some(position);
    }

    /// Add relative cursor motion
    pub fn add_cursor_delta(&mut self, delta: Vec2) {
        self.cursor_delta += delta;
    }

    /// Add scroll steps (positive scrolls away from the user)
    pub fn add_scroll(&mut self, steps: f32) {
        self.scroll += steps;
    }

    /// Key went down during this frame
    pub fn was_pressed(&self, key: Key) -> bool {
        self.keys_pressed.contains(&key)
    }

    /// Forget per-frame motion and edge events; held state persists
    pub fn end_frame(&mut self) {
        self.keys_pressed.clear();
        self.cursor_delta = Vec2::zeros();
        self.scroll = 0.0;
    }
}

impl InputSource for InputState {
    fn is_key_down(&self, key: Key) -> bool {
        self.keys_down.contains(&key)
    }

    fn is_mouse_down(&self, button: MouseButton) -> bool {
        self.buttons_down.contains(&button)
    }

    fn cursor_delta(&self) -> Vec2 {
        self.cursor_delta
    }

    fn scroll_delta(&self) -> f32 {
        self.scroll
    }

    fn cursor_position(&self) -> Option<Vec2> {
        self.cursor
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_cursor_delta_accumulates_until_end_frame() {
        let mut state = InputState::new();
        state.set_cursor_position(Vec2::new(10.0, 10.0));
        assert_relative_eq!(state.cursor_delta(), Vec2::zeros());

        state.set_cursor_position(Vec2::new(15.0, 10.0));
        state.set_cursor_position(Vec2::new(20.0, 12.0));
        assert_relative_eq!(state.cursor_delta(), Vec2::new(10.0, 2.0));

        state.end_frame();
        assert_relative_eq!(state.cursor_delta(), Vec2::zeros());
    }

    #[test]
    fn test_key_press_edge() {
        let mut state = InputState::new();
        state.set_key(Key::R, true);
        assert!(state.was_pressed(Key::R));
        state.end_frame();
        assert!(!state.was_pressed(Key::R));
        assert!(state.is_key_down(Key::R));

        // Repeats do not produce a new edge
        state.set_key(Key::R, true);
        assert!(!state.was_pressed(Key::R));
    }

    #[test]
    fn test_glfw_events_are_translated() {
        let mut state = InputState::new();
        state.handle_event(&WindowEvent::MouseButton(
            glfw::MouseButton::Button2,
            Action::Press,
            glfw::Modifiers::empty(),
        ));
        state.handle_event(&WindowEvent::Scroll(0.0, -2.0));
        assert!(state.is_mouse_down(MouseButton::Right));
        assert_relative_eq!(state.scroll_delta(), -2.0);
    }
}
