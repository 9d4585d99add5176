// SPDX-License-Identifier: CEPL-1.0
use ash::vk;

pub const DEFAULT_FRAMES_IN_FLIGHT: usize = 2;
pub const DEFAULT_PREFERRED_IMAGE_COUNT: u32 = 4;

/// Knobs of the presentation core. Validation and image usage are orthogonal:
/// either can be changed without touching the other.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PresentConfig {
    pub frames_in_flight: usize,
    pub preferred_image_count: u32,
    /// Enable `VK_LAYER_KHRONOS_validation` and a debug messenger routed to `tracing`.
    pub validation: bool,
    /// Usage flags for swapchain images. Caller policy; the core only forwards them.
    pub image_usage: vk::ImageUsageFlags,
}

impl Default for PresentConfig {
    fn default() -> Self {
        Self {
            frames_in_flight: DEFAULT_FRAMES_IN_FLIGHT,
            preferred_image_count: DEFAULT_PREFERRED_IMAGE_COUNT,
            validation: cfg!(debug_assertions),
            image_usage: vk::ImageUsageFlags::COLOR_ATTACHMENT,
        }
    }
}

impl PresentConfig {
    /// The ring needs at least one slot and the swapchain at least one image.
    pub fn sanitized(mut self) -> Self {
        self.frames_in_flight = self.frames_in_flight.max(1);
        self.preferred_image_count = self.preferred_image_count.max(1);
        self
    }
}
