//! Keys and buttons the engine reacts to

/// Keyboard keys used by controllers and the viewer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    /// Move forward
    W,
    /// Strafe left
    A,
    /// Move backward
    S,
    /// Strafe right
    D,
    /// Move down
    Q,
    /// Move up
    E,
    /// Reload scene
    R,
    /// Toggle input routing
    Tab,
    /// Recompile pipeline
    F5,
    /// Quit
    Escape,
    /// Speed modifier
    LeftShift,
}

impl Key {
    /// Map a GLFW key, `None` for keys the engine ignores
    pub fn from_glfw(key: glfw::Key) -> Option<Self> {
        Some(match key {
            glfw::Key::W => Self::W,
            glfw::Key::A => Self::A,
            glfw::Key::S => Self::S,
            glfw::Key::D => Self::D,
            glfw::Key::Q => Self::Q,
            glfw::Key::E => Self::E,
            glfw::Key::R => Self::R,
            glfw::Key::Tab => Self::Tab,
            glfw::Key::F5 => Self::F5,
            glfw::Key::Escape => Self::Escape,
            glfw::Key::LeftShift => Self::LeftShift,
            _ => return None,
        })
    }
}

/// Mouse buttons
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseButton {
    /// Primary button
    Left,
    /// Secondary button
    Right,
    /// Wheel button
    Middle,
}

impl MouseButton {
    /// Map a GLFW button
    pub fn from_glfw(button: glfw::MouseButton) -> Option<Self> {
        match button {
            glfw::MouseButton::Button1 => Some(Self::Left),
            glfw::MouseButton::Button2 => Some(Self::Right),
            glfw::MouseButton::Button3 => Some(Self::Middle),
            _ => None,
        }
    }
}
