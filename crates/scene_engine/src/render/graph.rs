//! Pass resource declarations and state tracking
//!
//! Passes declare which image resources they read and write. Before a pass
//! records, [`ResourceTracker::transitions_for`] compares the declared
//! states against the current ones and returns the minimal list of
//! [`Transition`]s, which the pipeline records as image barriers.

use ash::vk;

/// Image resources shared between passes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceId {
    /// Directional light depth map
    ShadowMap,
    /// Lit HDR color
    BaseColor,
    /// View-space normals
    Normal,
    /// Metallic, roughness and ior
    Specular,
    /// Scene depth
    Depth,
    /// Screen-space reflection color
    Reflection,
    /// Presentable image of the current frame
    Output,
}

impl ResourceId {
    /// Every resource, in tracker slot order
    pub const ALL: [Self; 7] = [
        Self::ShadowMap,
        Self::BaseColor,
        Self::Normal,
        Self::Specular,
        Self::Depth,
        Self::Reflection,
        Self::Output,
    ];

    const fn slot(self) -> usize {
        self as usize
    }

    /// Depth images use the depth aspect
    pub const fn is_depth(self) -> bool {
        matches!(self, Self::ShadowMap | Self::Depth)
    }
}

/// Usage state of an image between passes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ResourceState {
    /// Contents undefined (fresh image or discarded)
    #[default]
    Undefined,
    /// Written as a color attachment
    ColorAttachment,
    /// Written as a depth attachment
    DepthAttachment,
    /// Sampled color image
    ShaderRead,
    /// Sampled depth image
    DepthShaderRead,
    /// Handed to the presentation engine
    Present,
}

impl ResourceState {
    /// Image layout of the state
    pub const fn layout(self) -> vk::ImageLayout {
        match self {
            Self::Undefined => vk::ImageLayout::UNDEFINED,
            Self::ColorAttachment => vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            Self::DepthAttachment => vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
            Self::ShaderRead => vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            Self::DepthShaderRead => vk::ImageLayout::DEPTH_STENCIL_READ_ONLY_OPTIMAL,
            Self::Present => vk::ImageLayout::PRESENT_SRC_KHR,
        }
    }

    /// Memory accesses performed in the state
    pub fn access_mask(self) -> vk::AccessFlags {
        match self {
            Self::Undefined | Self::Present => vk::AccessFlags::empty(),
            Self::ColorAttachment => vk::AccessFlags::COLOR_ATTACHMENT_READ | vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
            Self::DepthAttachment => {
                vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE
            }
            Self::ShaderRead | Self::DepthShaderRead => vk::AccessFlags::SHADER_READ,
        }
    }

    /// Pipeline stages that touch the image in the state
    pub fn stage_mask(self) -> vk::PipelineStageFlags {
        match self {
            Self::Undefined => vk::PipelineStageFlags::TOP_OF_PIPE,
            Self::Present => vk::PipelineStageFlags::BOTTOM_OF_PIPE,
            Self::ColorAttachment => vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
            Self::DepthAttachment => {
                vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS | vk::PipelineStageFlags::LATE_FRAGMENT_TESTS
            }
            Self::ShaderRead | Self::DepthShaderRead => vk::PipelineStageFlags::FRAGMENT_SHADER,
        }
    }
}

/// How a pass uses a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceAccess {
    /// Resource used
    pub resource: ResourceId,
    /// State the pass needs it in
    pub state: ResourceState,
}

impl ResourceAccess {
    /// Written as an attachment
    pub const fn write(resource: ResourceId) -> Self {
        let state = if resource.is_depth() {
            ResourceState::DepthAttachment
        } else {
            ResourceState::ColorAttachment
        };
        Self { resource, state }
    }

    /// Sampled in a shader
    pub const fn read(resource: ResourceId) -> Self {
        let state = if resource.is_depth() {
            ResourceState::DepthShaderRead
        } else {
            ResourceState::ShaderRead
        };
        Self { resource, state }
    }
}

/// State change of one resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    /// Resource changing state
    pub resource: ResourceId,
    /// Current state
    pub from: ResourceState,
    /// Requested state
    pub to: ResourceState,
}

impl Transition {
    /// Image barrier for `image`
    pub fn image_barrier(&self, image: vk::Image) -> vk::ImageMemoryBarrier {
        let aspect_mask = if self.resource.is_depth() {
            vk::ImageAspectFlags::DEPTH
        } else {
            vk::ImageAspectFlags::COLOR
        };
        vk::ImageMemoryBarrier::builder()
            .old_layout(self.from.layout())
            .new_layout(self.to.layout())
            .src_access_mask(self.from.access_mask())
            .dst_access_mask(self.to.access_mask())
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .image(image)
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask,
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count: 1,
            })
            .build()
    }

    /// Stages to wait on and to block
    pub fn stages(&self) -> (vk::PipelineStageFlags, vk::PipelineStageFlags) {
        (self.from.stage_mask(), self.to.stage_mask())
    }
}

/// Current state of every shared image
#[derive(Debug, Clone, Default)]
pub struct ResourceTracker {
    states: [ResourceState; ResourceId::ALL.len()],
}

impl ResourceTracker {
    /// Every resource undefined
    pub fn new() -> Self {
        Self::default()
    }

    /// State of a resource
    pub fn state(&self, resource: ResourceId) -> ResourceState {
        self.states[resource.slot()]
    }

    /// Transitions needed before a pass with `accesses` records; the
    /// tracker assumes they are recorded and advances its states
    pub fn transitions_for(&mut self, accesses: &[ResourceAccess]) -> Vec<Transition> {
        accesses
            .iter()
            .filter_map(|access| self.transition_to(access.resource, access.state))
            .collect()
    }

    /// Move one resource into `state`, if it is not there already
    pub fn transition_to(&mut self, resource: ResourceId, state: ResourceState) -> Option<Transition> {
        let from = self.states[resource.slot()];
        if from == state {
            return None;
        }
        self.states[resource.slot()] = state;
        Some(Transition {
            resource,
            from,
            to: state,
        })
    }

    /// Forget the contents of a resource (recreated image or new frame)
    pub fn reset(&mut self, resource: ResourceId) {
        self.states[resource.slot()] = ResourceState::Undefined;
    }

    /// Forget every resource
    pub fn reset_all(&mut self) {
        self.states = Default::default();
    }

    /// Final transition of the frame: output to present
    pub fn finish(&mut self) -> Option<Transition> {
        self.transition_to(ResourceId::Output, ResourceState::Present)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_moves_to_attachment_state() {
        let mut tracker = ResourceTracker::new();
        let transitions = tracker.transitions_for(&[
            ResourceAccess::write(ResourceId::BaseColor),
            ResourceAccess::write(ResourceId::Depth),
        ]);

        assert_eq!(transitions.len(), 2);
        assert_eq!(transitions[0].from, ResourceState::Undefined);
        assert_eq!(transitions[0].to, ResourceState::ColorAttachment);
        assert_eq!(transitions[1].to, ResourceState::DepthAttachment);
    }

    #[test]
    fn test_read_after_write_moves_to_shader_read() {
        let mut tracker = ResourceTracker::new();
        tracker.transitions_for(&[ResourceAccess::write(ResourceId::ShadowMap)]);
        let transitions = tracker.transitions_for(&[ResourceAccess::read(ResourceId::ShadowMap)]);

        assert_eq!(
            transitions,
            vec![Transition {
                resource: ResourceId::ShadowMap,
                from: ResourceState::DepthAttachment,
                to: ResourceState::DepthShaderRead,
            }]
        );
        let barrier = transitions[0].image_barrier(vk::Image::null());
        assert_eq!(barrier.old_layout, vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL);
        assert_eq!(barrier.dst_access_mask, vk::AccessFlags::SHADER_READ);
        assert_eq!(barrier.subresource_range.aspect_mask, vk::ImageAspectFlags::DEPTH);
    }

    #[test]
    fn test_no_redundant_transitions() {
        let mut tracker = ResourceTracker::new();
        let write = [ResourceAccess::write(ResourceId::BaseColor)];
        assert_eq!(tracker.transitions_for(&write).len(), 1);
        assert!(tracker.transitions_for(&write).is_empty());
    }

    #[test]
    fn test_finish_presents_output_once() {
        let mut tracker = ResourceTracker::new();
        tracker.transitions_for(&[ResourceAccess::write(ResourceId::Output)]);
        let present = tracker.finish().unwrap();
        assert_eq!(present.from, ResourceState::ColorAttachment);
        assert_eq!(present.to.layout(), vk::ImageLayout::PRESENT_SRC_KHR);
        assert!(tracker.finish().is_none());

        tracker.reset(ResourceId::Output);
        assert_eq!(tracker.state(ResourceId::Output), ResourceState::Undefined);
    }
}
