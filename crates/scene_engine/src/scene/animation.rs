//! Keyframe storage for imported animations
//!
//! Clips are kept as data only; nothing samples or plays them back.

use crate::ecs::EntityHandle;
use crate::foundation::math::{Quat, Vec3};

/// How values between keyframes are derived
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interpolation {
    /// Linear (slerp for rotations)
    Linear,
    /// Hold the previous value
    Step,
    /// Hermite spline with in/out tangents stored around each value
    CubicSpline,
}

/// Values of one channel, one entry per keyframe
/// (three per keyframe for [`Interpolation::CubicSpline`])
#[derive(Debug, Clone, PartialEq)]
pub enum Keyframes {
    /// Translation track
    Translation(Vec<Vec3>),
    /// Rotation track
    Rotation(Vec<Quat>),
    /// Scale track
    Scale(Vec<Vec3>),
}

impl Keyframes {
    /// Number of stored values
    pub fn len(&self) -> usize {
        match self {
            Self::Translation(values) | Self::Scale(values) => values.len(),
            Self::Rotation(values) => values.len(),
        }
    }

    /// True when no values are stored
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One animated property of one entity
#[derive(Debug, Clone, PartialEq)]
pub struct AnimationChannel {
    /// Animated entity
    pub target: EntityHandle,
    /// Interpolation mode
    pub interpolation: Interpolation,
    /// Keyframe times in seconds, ascending
    pub times: Vec<f32>,
    /// Keyframe values
    pub keyframes: Keyframes,
}

/// Named set of channels
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AnimationClip {
    /// Display name
    pub name: String,
    /// Channels of the clip
    pub channels: Vec<AnimationChannel>,
}

impl AnimationClip {
    /// Time of the last keyframe over all channels
    pub fn duration(&self) -> f32 {
        self.channels
            .iter()
            .filter_map(|channel| channel.times.last().copied())
            .fold(0.0, f32::max)
    }
}
