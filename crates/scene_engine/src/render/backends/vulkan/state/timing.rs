//! GPU pass timing with timestamp queries
//!
//! Each frame slot owns `2 * passes` queries: a begin and an end stamp per
//! pass. Results are read back after the slot's fence has been waited on,
//! and only for slots whose stamps reached a successful submit.

use ash::{vk, Device};

use crate::render::backends::vulkan::{GpuDevice, VulkanError, VulkanResult};

/// Timestamp query pool shared by all frame slots
pub struct TimestampQueries {
    device: Device,
    pool: vk::QueryPool,
    passes: u32,
    period_ns: f32,
    submitted: SubmittedSlots,
}

impl TimestampQueries {
    /// Create queries for `slots` frames of `passes` passes, or `None` when
    /// the device cannot time graphics work
    pub fn new(gpu: &GpuDevice, slots: usize, passes: usize) -> VulkanResult<Option<Self>> {
        let Some(period_ns) = gpu.timestamp_period else {
            log::info!("Timestamp queries unsupported, pass timings disabled");
            return Ok(None);
        };

        let passes = passes as u32;
        let create_info = vk::QueryPoolCreateInfo::builder()
            .query_type(vk::QueryType::TIMESTAMP)
            .query_count(2 * passes * slots as u32);
        let pool = unsafe { gpu.device.create_query_pool(&create_info, None).map_err(VulkanError::Api)? };

        Ok(Some(Self {
            device: gpu.device.clone(),
            pool,
            passes,
            period_ns,
            submitted: SubmittedSlots::new(slots),
        }))
    }

    fn first_query(&self, slot: usize) -> u32 {
        slot as u32 * 2 * self.passes
    }

    /// Reset the slot's queries; record before any stamp of the frame.
    ///
    /// The slot stays unreadable until [`TimestampQueries::mark_submitted`].
    pub fn reset(&mut self, command_buffer: vk::CommandBuffer, slot: usize) {
        unsafe {
            self.device
                .cmd_reset_query_pool(command_buffer, self.pool, self.first_query(slot), 2 * self.passes);
        }
        self.submitted.recording(slot);
    }

    /// The command buffer holding the slot's stamps was submitted
    pub fn mark_submitted(&mut self, slot: usize) {
        self.submitted.submitted(slot);
    }

    /// Stamp the start of `pass`
    pub fn begin(&self, command_buffer: vk::CommandBuffer, slot: usize, pass: usize) {
        let query = self.first_query(slot) + 2 * pass as u32;
        unsafe {
            self.device
                .cmd_write_timestamp(command_buffer, vk::PipelineStageFlags::TOP_OF_PIPE, self.pool, query);
        }
    }

    /// Stamp the end of `pass`
    pub fn end(&self, command_buffer: vk::CommandBuffer, slot: usize, pass: usize) {
        let query = self.first_query(slot) + 2 * pass as u32 + 1;
        unsafe {
            self.device
                .cmd_write_timestamp(command_buffer, vk::PipelineStageFlags::BOTTOM_OF_PIPE, self.pool, query);
        }
    }

    /// Milliseconds per pass of the last completed frame in `slot`
    pub fn read(&self, slot: usize) -> VulkanResult<Option<Vec<f32>>> {
        if !self.submitted.is_readable(slot) {
            return Ok(None);
        }
        let mut stamps = vec![0u64; 2 * self.passes as usize];
        let result = unsafe {
            self.device.get_query_pool_results(
                self.pool,
                self.first_query(slot),
                2 * self.passes,
                &mut stamps,
                vk::QueryResultFlags::TYPE_64,
            )
        };
        match result {
            Ok(()) => Ok(Some(ticks_to_ms(&stamps, self.period_ns))),
            Err(vk::Result::NOT_READY) => Ok(None),
            Err(error) => Err(VulkanError::Api(error)),
        }
    }
}

impl Drop for TimestampQueries {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_query_pool(self.pool, None);
        }
    }
}

/// Per slot: whether the last recorded stamps were submitted
#[derive(Debug, Clone)]
struct SubmittedSlots(Vec<bool>);

impl SubmittedSlots {
    fn new(slots: usize) -> Self {
        Self(vec![false; slots])
    }

    fn recording(&mut self, slot: usize) {
        self.0[slot] = false;
    }

    fn submitted(&mut self, slot: usize) {
        self.0[slot] = true;
    }

    fn is_readable(&self, slot: usize) -> bool {
        self.0[slot]
    }
}

/// Convert begin/end tick pairs into milliseconds
fn ticks_to_ms(stamps: &[u64], period_ns: f32) -> Vec<f32> {
    stamps
        .chunks_exact(2)
        .map(|pair| pair[1].saturating_sub(pair[0]) as f32 * period_ns / 1_000_000.0)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_ticks_to_ms_pairs() {
        let ms = ticks_to_ms(&[100, 2_100_100, 50, 40], 0.5);
        assert_eq!(ms.len(), 2);
        assert_relative_eq!(ms[0], 1.0);
        // A wrapped counter never yields negative time
        assert_relative_eq!(ms[1], 0.0);
    }

    #[test]
    fn test_slot_readable_only_after_submit() {
        let mut slots = SubmittedSlots::new(2);
        assert!(!slots.is_readable(0));

        slots.recording(0);
        assert!(!slots.is_readable(0));
        slots.submitted(0);
        assert!(slots.is_readable(0));
        assert!(!slots.is_readable(1));

        // Recording failed before the next submit
        slots.recording(0);
        assert!(!slots.is_readable(0));
    }
}
