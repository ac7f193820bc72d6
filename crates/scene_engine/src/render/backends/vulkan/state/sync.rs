//! Frame slot synchronization
//!
//! Each frame slot owns an acquire semaphore, a present semaphore and a
//! fence guarding its command buffer. A slot is reused only after
//! [`FrameSync::wait_until_free`] returned.

use ash::{vk, Device};

use crate::render::backends::vulkan::{VulkanError, VulkanResult};

/// Binary semaphore ordering work between queue operations
pub struct Semaphore {
    device: Device,
    handle: vk::Semaphore,
}

impl Semaphore {
    /// Unsignalled semaphore
    pub fn new(device: Device) -> VulkanResult<Self> {
        let handle = unsafe {
            device
                .create_semaphore(&vk::SemaphoreCreateInfo::default(), None)
                .map_err(VulkanError::Api)?
        };
        Ok(Self { device, handle })
    }

    /// Raw handle
    pub fn handle(&self) -> vk::Semaphore {
        self.handle
    }
}

impl Drop for Semaphore {
    fn drop(&mut self) {
        unsafe { self.device.destroy_semaphore(self.handle, None) };
    }
}

/// Fence the host waits on
pub struct Fence {
    device: Device,
    handle: vk::Fence,
}

impl Fence {
    /// Fence, optionally created in the signalled state
    pub fn new(device: Device, signaled: bool) -> VulkanResult<Self> {
        let mut flags = vk::FenceCreateFlags::empty();
        if signaled {
            flags |= vk::FenceCreateFlags::SIGNALED;
        }
        let handle = unsafe {
            device
                .create_fence(&vk::FenceCreateInfo::builder().flags(flags), None)
                .map_err(VulkanError::Api)?
        };
        Ok(Self { device, handle })
    }

    /// Block until signalled or `timeout_ns` elapsed
    pub fn wait(&self, timeout_ns: u64) -> VulkanResult<()> {
        unsafe {
            self.device
                .wait_for_fences(&[self.handle], true, timeout_ns)
                .map_err(VulkanError::Api)
        }
    }

    /// Back to unsignalled
    pub fn reset(&self) -> VulkanResult<()> {
        unsafe { self.device.reset_fences(&[self.handle]).map_err(VulkanError::Api) }
    }

    /// Raw handle
    pub fn handle(&self) -> vk::Fence {
        self.handle
    }
}

impl Drop for Fence {
    fn drop(&mut self) {
        unsafe { self.device.destroy_fence(self.handle, None) };
    }
}

/// Synchronization objects of one frame slot
pub struct FrameSync {
    device: Device,
    acquired: Semaphore,
    finished: Semaphore,
    submitted: Fence,
}

impl FrameSync {
    /// Objects for one slot; the fence starts signalled so the first wait
    /// returns at once
    pub fn new(device: Device) -> VulkanResult<Self> {
        Ok(Self {
            acquired: Semaphore::new(device.clone())?,
            finished: Semaphore::new(device.clone())?,
            submitted: Fence::new(device.clone(), true)?,
            device,
        })
    }

    /// Block until the slot's previous submission completed
    pub fn wait_until_free(&self) -> VulkanResult<()> {
        self.submitted.wait(u64::MAX)
    }

    /// Signalled by image acquisition
    pub fn acquire_semaphore(&self) -> vk::Semaphore {
        self.acquired.handle()
    }

    /// Signalled by [`FrameSync::submit`], waited on by presentation
    pub fn present_semaphore(&self) -> vk::Semaphore {
        self.finished.handle()
    }

    /// Submit `command_buffer` to `queue`.
    ///
    /// Color output waits for the acquired image; completion signals the
    /// present semaphore and the slot fence.
    pub fn submit(&self, queue: vk::Queue, command_buffer: vk::CommandBuffer) -> VulkanResult<()> {
        let wait = [self.acquired.handle()];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let signal = [self.finished.handle()];
        let command_buffers = [command_buffer];
        let submit = vk::SubmitInfo::builder()
            .wait_semaphores(&wait)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal)
            .build();

        self.submitted.reset()?;
        unsafe {
            self.device
                .queue_submit(queue, &[submit], self.submitted.handle())
                .map_err(VulkanError::Api)
        }
    }
}
