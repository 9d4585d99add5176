// SPDX-License-Identifier: CEPL-1.0
//! Ordered release of GPU objects.
//!
//! Each component pushes an [`Owned`] entry right after a creation call
//! succeeds. Unwinding pops entries last-in first-out, so a failure half way
//! through construction releases exactly what exists, and a normal shutdown
//! releases everything in the reverse of creation order.
use ash::vk;
use tracing::{debug, warn};

use crate::error::ResourceKind;
use crate::gpu::Gpu;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Owned {
    Instance,
    DebugMessenger(vk::DebugUtilsMessengerEXT),
    Surface(vk::SurfaceKHR),
    Device,
    CommandPool(vk::CommandPool),
    Swapchain(vk::SwapchainKHR),
    ImageView(vk::ImageView),
    CommandBuffers {
        pool: vk::CommandPool,
        buffers: Vec<vk::CommandBuffer>,
    },
    RenderPass(vk::RenderPass),
    PipelineLayout(vk::PipelineLayout),
    Pipeline(vk::Pipeline),
    Framebuffer(vk::Framebuffer),
    Semaphore(vk::Semaphore),
    Fence(vk::Fence),
    Buffer(vk::Buffer),
    DeviceMemory(vk::DeviceMemory),
}

impl Owned {
    pub fn kind(&self) -> ResourceKind {
        match self {
            Owned::Instance => ResourceKind::Instance,
            Owned::DebugMessenger(_) => ResourceKind::DebugMessenger,
            Owned::Surface(_) => ResourceKind::Surface,
            Owned::Device => ResourceKind::Device,
            Owned::CommandPool(_) => ResourceKind::CommandPool,
            Owned::Swapchain(_) => ResourceKind::Swapchain,
            Owned::ImageView(_) => ResourceKind::ImageView,
            Owned::CommandBuffers { .. } => ResourceKind::CommandBuffer,
            Owned::RenderPass(_) => ResourceKind::RenderPass,
            Owned::PipelineLayout(_) => ResourceKind::PipelineLayout,
            Owned::Pipeline(_) => ResourceKind::Pipeline,
            Owned::Framebuffer(_) => ResourceKind::Framebuffer,
            Owned::Semaphore(_) => ResourceKind::Semaphore,
            Owned::Fence(_) => ResourceKind::Fence,
            Owned::Buffer(_) => ResourceKind::Buffer,
            Owned::DeviceMemory(_) => ResourceKind::DeviceMemory,
        }
    }

    fn release<G: Gpu + ?Sized>(self, gpu: &mut G) {
        match self {
            Owned::Instance => gpu.destroy_instance(),
            Owned::DebugMessenger(m) => gpu.destroy_debug_messenger(m),
            Owned::Device => gpu.destroy_device(),
            other => other.release_shared(gpu),
        }
    }

    fn release_shared<G: Gpu + ?Sized>(self, gpu: &G) {
        match self {
            Owned::Surface(s) => gpu.destroy_surface(s),
            Owned::CommandPool(p) => gpu.destroy_command_pool(p),
            Owned::Swapchain(s) => gpu.destroy_swapchain(s),
            Owned::ImageView(v) => gpu.destroy_image_view(v),
            Owned::CommandBuffers { pool, buffers } => gpu.free_command_buffers(pool, &buffers),
            Owned::RenderPass(r) => gpu.destroy_render_pass(r),
            Owned::PipelineLayout(l) => gpu.destroy_pipeline_layout(l),
            Owned::Pipeline(p) => gpu.destroy_pipeline(p),
            Owned::Framebuffer(f) => gpu.destroy_framebuffer(f),
            Owned::Semaphore(s) => gpu.destroy_semaphore(s),
            Owned::Fence(f) => gpu.destroy_fence(f),
            Owned::Buffer(b) => gpu.destroy_buffer(b),
            Owned::DeviceMemory(m) => gpu.free_memory(m),
            Owned::Instance | Owned::DebugMessenger(_) | Owned::Device => {
                warn!("{} cannot be released through a shared backend", self.kind());
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct TeardownStack {
    entries: Vec<Owned>,
}

impl TeardownStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, owned: Owned) {
        self.entries.push(owned);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Kinds currently held, oldest first.
    pub fn kinds(&self) -> Vec<ResourceKind> {
        self.entries.iter().map(Owned::kind).collect()
    }

    /// Release everything, newest first. Leaves the stack empty, so a second
    /// call is a no-op.
    pub fn unwind<G: Gpu + ?Sized>(&mut self, gpu: &mut G) {
        while let Some(owned) = self.entries.pop() {
            debug!("release {}", owned.kind());
            owned.release(gpu);
        }
    }

    /// Same as [`unwind`](Self::unwind) for stacks that hold only device-level
    /// objects, whose destroy calls need no exclusive access to the backend.
    pub fn unwind_shared<G: Gpu + ?Sized>(&mut self, gpu: &G) {
        while let Some(owned) = self.entries.pop() {
            debug!("release {}", owned.kind());
            owned.release_shared(gpu);
        }
    }
}

#[cfg(test)]
#[path = "teardown_tests.rs"]
mod tests;
