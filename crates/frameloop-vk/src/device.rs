// SPDX-License-Identifier: CEPL-1.0
//! Device context: instance, surface, device, queue and command pool.
use std::ffi::CStr;

use ash::prelude::VkResult;
use ash::vk;
use tracing::{debug, info};

use crate::config::PresentConfig;
use crate::error::{PresentError, PresentResult, ResourceKind, SurfaceQuery};
use crate::gpu::{Gpu, InstanceDesc};
use crate::teardown::{Owned, TeardownStack};

pub const APPLICATION_NAME: &CStr = c"frameloop";
pub const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";

/// Owns the backend and every instance/device level object. Everything else
/// in the crate borrows it.
pub struct DeviceContext<G: Gpu> {
    gpu: G,
    instance: vk::Instance,
    debug_messenger: Option<vk::DebugUtilsMessengerEXT>,
    surface: vk::SurfaceKHR,
    physical_device: vk::PhysicalDevice,
    device: vk::Device,
    queue: vk::Queue,
    queue_family: u32,
    command_pool: vk::CommandPool,
    stack: TeardownStack,
}

impl<G: Gpu> DeviceContext<G> {
    /// Bring up everything from the instance to the command pool.
    ///
    /// `surface_factory` runs once the instance exists and before any queue
    /// family is considered, so present support is checked against the real
    /// surface. On failure, whatever was already created is released before
    /// the error is returned.
    pub fn initialize<F>(
        gpu: G,
        config: &PresentConfig,
        required_extensions: &[&CStr],
        surface_factory: F,
    ) -> PresentResult<Self>
    where
        F: FnOnce(&G) -> VkResult<vk::SurfaceKHR>,
    {
        let mut ctx = Self {
            gpu,
            instance: vk::Instance::null(),
            debug_messenger: None,
            surface: vk::SurfaceKHR::null(),
            physical_device: vk::PhysicalDevice::null(),
            device: vk::Device::null(),
            queue: vk::Queue::null(),
            queue_family: 0,
            command_pool: vk::CommandPool::null(),
            stack: TeardownStack::new(),
        };
        // An early return drops `ctx`, which unwinds what has been pushed so far.
        ctx.bring_up(config, required_extensions, surface_factory)?;
        Ok(ctx)
    }

    fn bring_up<F>(
        &mut self,
        config: &PresentConfig,
        required_extensions: &[&CStr],
        surface_factory: F,
    ) -> PresentResult<()>
    where
        F: FnOnce(&G) -> VkResult<vk::SurfaceKHR>,
    {
        let mut extensions = required_extensions.to_vec();
        let mut layers = Vec::new();
        if config.validation {
            extensions.push(ash::ext::debug_utils::NAME);
            layers.push(VALIDATION_LAYER);
        }
        let desc = InstanceDesc {
            application_name: APPLICATION_NAME,
            extensions: &extensions,
            layers: &layers,
        };
        self.instance = self
            .gpu
            .create_instance(&desc)
            .map_err(PresentError::creation(ResourceKind::Instance))?;
        self.stack.push(Owned::Instance);

        if config.validation {
            let messenger = self
                .gpu
                .create_debug_messenger()
                .map_err(PresentError::creation(ResourceKind::DebugMessenger))?;
            self.stack.push(Owned::DebugMessenger(messenger));
            self.debug_messenger = Some(messenger);
        }

        self.surface =
            surface_factory(&self.gpu).map_err(PresentError::creation(ResourceKind::Surface))?;
        self.stack.push(Owned::Surface(self.surface));

        let (physical, family) = select_queue_family(&self.gpu, self.surface)?;
        self.physical_device = physical;
        self.queue_family = family;

        self.device = self
            .gpu
            .create_device(physical, family)
            .map_err(PresentError::creation(ResourceKind::Device))?;
        self.stack.push(Owned::Device);
        self.queue = self.gpu.device_queue(family);

        self.command_pool = self
            .gpu
            .create_command_pool(family)
            .map_err(PresentError::creation(ResourceKind::CommandPool))?;
        self.stack.push(Owned::CommandPool(self.command_pool));

        info!(
            "device ready (queue family {family}, validation {})",
            if config.validation { "on" } else { "off" }
        );
        Ok(())
    }

    pub fn gpu(&self) -> &G {
        &self.gpu
    }

    pub fn instance(&self) -> vk::Instance {
        self.instance
    }

    pub fn debug_messenger(&self) -> Option<vk::DebugUtilsMessengerEXT> {
        self.debug_messenger
    }

    pub fn surface(&self) -> vk::SurfaceKHR {
        self.surface
    }

    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.physical_device
    }

    pub fn device(&self) -> vk::Device {
        self.device
    }

    pub fn queue(&self) -> vk::Queue {
        self.queue
    }

    pub fn queue_family(&self) -> u32 {
        self.queue_family
    }

    pub fn command_pool(&self) -> vk::CommandPool {
        self.command_pool
    }

    pub fn is_live(&self) -> bool {
        !self.stack.is_empty()
    }

    /// Release command pool, device, surface, debug messenger and instance, in
    /// that order. Dependents must already be gone. Calling it twice is harmless.
    pub fn shutdown(&mut self) {
        if self.stack.is_empty() {
            return;
        }
        debug!("device context shutdown");
        self.stack.unwind(&mut self.gpu);
    }
}

impl<G: Gpu> Drop for DeviceContext<G> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// First physical device with a queue family that has queues, graphics, and
/// present support for `surface`.
pub fn select_queue_family<G: Gpu + ?Sized>(
    gpu: &G,
    surface: vk::SurfaceKHR,
) -> PresentResult<(vk::PhysicalDevice, u32)> {
    let physical_devices = gpu
        .enumerate_physical_devices()
        .map_err(PresentError::query(SurfaceQuery::PhysicalDevices))?;
    if physical_devices.is_empty() {
        return Err(PresentError::NoSuitableDevice);
    }
    for physical in physical_devices {
        let families = gpu.queue_family_properties(physical);
        for (i, family) in families.iter().enumerate() {
            let index = i as u32;
            if family.queue_count == 0 || !family.queue_flags.contains(vk::QueueFlags::GRAPHICS) {
                continue;
            }
            let present = gpu
                .surface_support(physical, index, surface)
                .map_err(PresentError::query(SurfaceQuery::PresentSupport))?;
            if present {
                return Ok((physical, index));
            }
        }
    }
    Err(PresentError::NoSuitableQueueFamily)
}

#[cfg(test)]
#[path = "device_tests.rs"]
mod tests;
