// SPDX-License-Identifier: CEPL-1.0
//! Host-written pixels copied straight into the swapchain images.
//!
//! One frame of texels lives in a host visible staging buffer. Every image's
//! command buffer moves the image to `TRANSFER_DST_OPTIMAL`, copies the buffer
//! in and hands the image back for presentation. No render pass is used, so
//! the swapchain must be created with `TRANSFER_DST` usage.
use ash::prelude::VkResult;
use ash::vk;
use tracing::{debug, info};

use crate::chain::{ContentRecorder, ContentSetup, RecordTarget};
use crate::error::{PresentError, PresentResult, ResourceKind};
use crate::gpu::Gpu;
use crate::teardown::{Owned, TeardownStack};

/// Fills tightly packed texels for a frame of the given extent and format.
pub type PixelFill = Box<dyn FnMut(vk::Extent2D, vk::Format, &mut [u8])>;

/// First memory type allowed by `type_bits` that has all of `flags`.
pub fn find_memory_type(
    props: &vk::PhysicalDeviceMemoryProperties,
    type_bits: u32,
    flags: vk::MemoryPropertyFlags,
) -> Option<u32> {
    let count = (props.memory_type_count as usize).min(props.memory_types.len());
    props.memory_types[..count]
        .iter()
        .enumerate()
        .find(|(i, t)| type_bits & (1 << i) != 0 && t.property_flags.contains(flags))
        .map(|(i, _)| i as u32)
}

/// Texel size for the 8-bit four channel formats a fill can write.
pub fn bytes_per_pixel(format: vk::Format) -> Option<usize> {
    match format {
        vk::Format::B8G8R8A8_UNORM
        | vk::Format::B8G8R8A8_SRGB
        | vk::Format::R8G8B8A8_UNORM
        | vk::Format::R8G8B8A8_SRGB => Some(4),
        _ => None,
    }
}

#[derive(Clone, Copy, Debug)]
struct Staging {
    buffer: vk::Buffer,
    extent: vk::Extent2D,
    format: vk::Format,
}

/// Uploads a host-generated image to every swapchain image.
///
/// The staging buffer is rebuilt when the extent or format of a new swapchain
/// generation differs from the last one.
pub struct PixelUpload {
    fill: PixelFill,
    staging: Option<Staging>,
    stack: TeardownStack,
}

impl PixelUpload {
    pub fn new(fill: impl FnMut(vk::Extent2D, vk::Format, &mut [u8]) + 'static) -> Self {
        Self {
            fill: Box::new(fill),
            staging: None,
            stack: TeardownStack::new(),
        }
    }

    /// Red across, green down.
    pub fn gradient() -> Self {
        Self::new(|extent, format, pixels| {
            let bgra = matches!(format, vk::Format::B8G8R8A8_UNORM | vk::Format::B8G8R8A8_SRGB);
            let w = extent.width.max(1) as usize;
            let h = extent.height.max(1) as usize;
            for (i, px) in pixels.chunks_exact_mut(4).enumerate() {
                let r = ((i % w) * 255 / w) as u8;
                let g = ((i / w) * 255 / h) as u8;
                let b = 96;
                px.copy_from_slice(&if bgra { [b, g, r, 255] } else { [r, g, b, 255] });
            }
        })
    }

    fn allocate<G: Gpu + ?Sized>(
        &mut self,
        gpu: &G,
        setup: &ContentSetup,
        bpp: usize,
    ) -> PresentResult<Staging> {
        let size = setup.extent.width as usize * setup.extent.height as usize * bpp;

        let buffer = gpu
            .create_buffer(size as u64, vk::BufferUsageFlags::TRANSFER_SRC)
            .map_err(PresentError::creation(ResourceKind::Buffer))?;
        self.stack.push(Owned::Buffer(buffer));

        let req = gpu.buffer_memory_requirements(buffer);
        let props = gpu.memory_properties(setup.physical_device);
        let host = vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT;
        let index = find_memory_type(&props, req.memory_type_bits, host)
            .ok_or(PresentError::ContentSetup("no host visible coherent memory type"))?;

        let memory = gpu
            .allocate_memory(req.size, index)
            .map_err(PresentError::creation(ResourceKind::DeviceMemory))?;
        self.stack.push(Owned::DeviceMemory(memory));
        gpu.bind_buffer_memory(buffer, memory)
            .map_err(PresentError::creation(ResourceKind::DeviceMemory))?;

        let mut pixels = vec![0u8; size];
        (self.fill)(setup.extent, setup.format, &mut pixels);
        gpu.write_memory(memory, &pixels)
            .map_err(PresentError::creation(ResourceKind::DeviceMemory))?;

        info!(
            "staging buffer {}x{} ({} bytes, memory type {index})",
            setup.extent.width, setup.extent.height, size
        );
        Ok(Staging {
            buffer,
            extent: setup.extent,
            format: setup.format,
        })
    }
}

impl<G: Gpu + ?Sized> ContentRecorder<G> for PixelUpload {
    fn prepare(&mut self, gpu: &G, setup: &ContentSetup) -> PresentResult<()> {
        if !setup.usage.contains(vk::ImageUsageFlags::TRANSFER_DST) {
            return Err(PresentError::ContentSetup(
                "swapchain images lack TRANSFER_DST usage",
            ));
        }
        let bpp = bytes_per_pixel(setup.format)
            .ok_or(PresentError::ContentSetup("swapchain format is not 8-bit RGBA or BGRA"))?;

        if let Some(s) = self.staging {
            if s.extent == setup.extent && s.format == setup.format {
                debug!("staging buffer reused");
                return Ok(());
            }
        }
        ContentRecorder::<G>::release(self, gpu);

        match self.allocate(gpu, setup, bpp) {
            Ok(staging) => {
                self.staging = Some(staging);
                Ok(())
            }
            Err(e) => {
                self.stack.unwind_shared(gpu);
                Err(e)
            }
        }
    }

    fn record(&mut self, gpu: &G, t: &RecordTarget) -> VkResult<()> {
        let staging = self.staging.ok_or(vk::Result::ERROR_INITIALIZATION_FAILED)?;
        let cb = t.command_buffer;
        gpu.cmd_transition_image(
            cb,
            t.image,
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        );
        gpu.cmd_copy_buffer_to_image(cb, staging.buffer, t.image, t.extent);
        gpu.cmd_transition_image(
            cb,
            t.image,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            vk::ImageLayout::PRESENT_SRC_KHR,
        );
        Ok(())
    }

    fn release(&mut self, gpu: &G) {
        self.staging = None;
        self.stack.unwind_shared(gpu);
    }
}

#[cfg(test)]
#[path = "upload_tests.rs"]
mod tests;
