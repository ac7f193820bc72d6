//! Input providers handed to camera controllers

use crate::foundation::math::Vec2;

use super::keys::{Key, MouseButton};
use super::state::InputState;

/// Read-only view of the input relevant to one consumer
pub trait InputSource {
    /// Key currently held
    fn is_key_down(&self, key: Key) -> bool;

    /// Button currently held
    fn is_mouse_down(&self, button: MouseButton) -> bool;

    /// Cursor motion this frame in pixels
    fn cursor_delta(&self) -> Vec2;

    /// Scroll steps this frame
    fn scroll_delta(&self) -> f32;

    /// Cursor position in the source's own coordinates
    fn cursor_position(&self) -> Option<Vec2>;
}

/// The whole window
#[derive(Debug, Clone, Copy)]
pub struct DirectInput<'a> {
    state: &'a InputState,
}

impl<'a> DirectInput<'a> {
    /// Wrap the window's accumulated state
    pub fn new(state: &'a InputState) -> Self {
        Self { state }
    }
}

impl InputSource for DirectInput<'_> {
    fn is_key_down(&self, key: Key) -> bool {
        self.state.is_key_down(key)
    }

    fn is_mouse_down(&self, button: MouseButton) -> bool {
        self.state.is_mouse_down(button)
    }

    fn cursor_delta(&self) -> Vec2 {
        self.state.cursor_delta()
    }

    fn scroll_delta(&self) -> f32 {
        self.state.scroll_delta()
    }

    fn cursor_position(&self) -> Option<Vec2> {
        self.state.cursor_position()
    }
}

/// Pixel rectangle inside the window
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    /// Left edge
    pub x: f32,
    /// Top edge
    pub y: f32,
    /// Width
    pub width: f32,
    /// Height
    pub height: f32,
}

impl Viewport {
    /// Point lies inside the rectangle (right and bottom edges excluded)
    pub fn contains(&self, point: Vec2) -> bool {
        point.x >= self.x
            && point.y >= self.y
            && point.x < self.x + self.width
            && point.y < self.y + self.height
    }
}

/// Input restricted to a viewport: nothing is reported while the cursor is
/// outside it and positions are relative to its top-left corner
#[derive(Debug, Clone, Copy)]
pub struct ViewportInput<'a> {
    state: &'a InputState,
    viewport: Viewport,
}

impl<'a> ViewportInput<'a> {
    /// Wrap the window state with a viewport rectangle
    pub fn new(state: &'a InputState, viewport: Viewport) -> Self {
        Self { state, viewport }
    }

    /// Cursor is over the viewport
    pub fn is_hovered(&self) -> bool {
        self.state
            .cursor_position()
            .is_some_and(|cursor| self.viewport.contains(cursor))
    }
}

impl InputSource for ViewportInput<'_> {
    fn is_key_down(&self, key: Key) -> bool {
        self.is_hovered() && self.state.is_key_down(key)
    }

    fn is_mouse_down(&self, button: MouseButton) -> bool {
        self.is_hovered() && self.state.is_mouse_down(button)
    }

    fn cursor_delta(&self) -> Vec2 {
        if self.is_hovered() {
            self.state.cursor_delta()
        } else {
            Vec2::zeros()
        }
    }

    fn scroll_delta(&self) -> f32 {
        if self.is_hovered() {
            self.state.scroll_delta()
        } else {
            0.0
        }
    }

    fn cursor_position(&self) -> Option<Vec2> {
        self.state
            .cursor_position()
            .filter(|cursor| self.viewport.contains(*cursor))
            .map(|cursor| cursor - Vec2::new(self.viewport.x, self.viewport.y))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn right_half() -> Viewport {
        Viewport {
            x: 400.0,
            y: 0.0,
            width: 400.0,
            height: 600.0,
        }
    }

    #[test]
    fn test_viewport_input_ignored_outside() {
        let mut state = InputState::new();
        state.set_cursor_position(Vec2::new(100.0, 100.0));
        state.set_mouse_button(MouseButton::Left, true);
        state.add_scroll(1.0);

        let input = ViewportInput::new(&state, right_half());
        assert!(!input.is_mouse_down(MouseButton::Left));
        assert_relative_eq!(input.scroll_delta(), 0.0);
        assert!(input.cursor_position().is_none());

        assert!(DirectInput::new(&state).is_mouse_down(MouseButton::Left));
    }

    #[test]
    fn test_viewport_positions_are_relative() {
        let mut state = InputState::new();
        state.set_cursor_position(Vec2::new(450.0, 20.0));
        let input = ViewportInput::new(&state, right_half());
        assert_relative_eq!(input.cursor_position().unwrap(), Vec2::new(50.0, 20.0));
    }
}
