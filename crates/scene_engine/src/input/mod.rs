//! Input sources for camera controllers
//!
//! Window events are accumulated into an [`InputState`] once per frame. Camera
//! controllers never read the window directly; they receive an
//! [`InputSource`], either the whole window ([`DirectInput`]) or a viewport
//! rectangle inside it ([`ViewportInput`]).

pub mod keys;
pub mod source;
pub mod state;

pub use keys::{Key, MouseButton};
pub use source::{DirectInput, InputSource, Viewport, ViewportInput};
pub use state::InputState;
