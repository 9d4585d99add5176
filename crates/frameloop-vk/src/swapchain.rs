// SPDX-License-Identifier: CEPL-1.0
//! Swapchain, its images and views, and one command buffer per image.
use ash::vk;
use frameloop_render::RenderSize;
use tracing::{debug, info};

use crate::config::PresentConfig;
use crate::device::DeviceContext;
use crate::error::{PresentError, PresentResult, ResourceKind, SurfaceQuery};
use crate::gpu::{Gpu, SwapchainDesc};
use crate::teardown::{Owned, TeardownStack};

pub const PREFERRED_FORMAT: vk::SurfaceFormatKHR = vk::SurfaceFormatKHR {
    format: vk::Format::B8G8R8A8_UNORM,
    color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
};

/// IMMEDIATE, then MAILBOX, then FIFO (always available).
pub fn choose_present_mode(modes: &[vk::PresentModeKHR]) -> vk::PresentModeKHR {
    [vk::PresentModeKHR::IMMEDIATE, vk::PresentModeKHR::MAILBOX]
        .into_iter()
        .find(|m| modes.contains(m))
        .unwrap_or(vk::PresentModeKHR::FIFO)
}

/// A lone `UNDEFINED` entry means the surface takes anything.
/// `formats` must not be empty.
pub fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> vk::SurfaceFormatKHR {
    match formats {
        [only] if only.format == vk::Format::UNDEFINED => PREFERRED_FORMAT,
        _ => formats
            .iter()
            .copied()
            .find(|f| {
                f.format == PREFERRED_FORMAT.format && f.color_space == PREFERRED_FORMAT.color_space
            })
            .or_else(|| formats.first().copied())
            .unwrap_or(PREFERRED_FORMAT),
    }
}

/// `max_image_count == 0` means the driver sets no upper bound.
pub fn choose_image_count(caps: &vk::SurfaceCapabilitiesKHR, preferred: u32) -> u32 {
    let count = if caps.max_image_count == 0 {
        preferred
    } else {
        preferred.min(caps.max_image_count)
    };
    count.max(caps.min_image_count)
}

pub fn extent_from_caps(caps: &vk::SurfaceCapabilitiesKHR, want: RenderSize) -> vk::Extent2D {
    if caps.current_extent.width != u32::MAX {
        caps.current_extent
    } else {
        vk::Extent2D {
            width: want
                .width
                .clamp(caps.min_image_extent.width, caps.max_image_extent.width),
            height: want
                .height
                .clamp(caps.min_image_extent.height, caps.max_image_extent.height),
        }
    }
}

/// One swapchain generation. Image, view and command-buffer counts are equal
/// and never change; recreation builds a new `SwapchainState`.
#[derive(Debug)]
pub struct SwapchainState {
    swapchain: vk::SwapchainKHR,
    format: vk::SurfaceFormatKHR,
    extent: vk::Extent2D,
    present_mode: vk::PresentModeKHR,
    usage: vk::ImageUsageFlags,
    images: Vec<vk::Image>,
    views: Vec<vk::ImageView>,
    command_buffers: Vec<vk::CommandBuffer>,
    stack: TeardownStack,
}

impl SwapchainState {
    /// Fails with [`PresentError::ZeroArea`] before creating anything when the
    /// surface currently has no area.
    pub fn create<G: Gpu>(
        ctx: &DeviceContext<G>,
        config: &PresentConfig,
        size: RenderSize,
    ) -> PresentResult<Self> {
        let gpu = ctx.gpu();
        let (physical, surface) = (ctx.physical_device(), ctx.surface());

        let caps = gpu
            .surface_capabilities(physical, surface)
            .map_err(PresentError::query(SurfaceQuery::Capabilities))?;
        let modes = gpu
            .surface_present_modes(physical, surface)
            .map_err(PresentError::query(SurfaceQuery::PresentModes))?;
        let formats = gpu
            .surface_formats(physical, surface)
            .map_err(PresentError::query(SurfaceQuery::Formats))?;
        if formats.is_empty() {
            return Err(PresentError::SurfaceQueryFailure {
                query: SurfaceQuery::NoFormats,
                result: None,
            });
        }

        let extent = extent_from_caps(&caps, size);
        if extent.width == 0 || extent.height == 0 {
            return Err(PresentError::ZeroArea);
        }

        let desc = SwapchainDesc {
            surface,
            image_count: choose_image_count(&caps, config.preferred_image_count),
            format: choose_surface_format(&formats),
            extent,
            usage: config.image_usage,
            present_mode: choose_present_mode(&modes),
            pre_transform: caps.current_transform,
        };

        let mut state = Self {
            swapchain: vk::SwapchainKHR::null(),
            format: desc.format,
            extent,
            present_mode: desc.present_mode,
            usage: desc.usage,
            images: Vec::new(),
            views: Vec::new(),
            command_buffers: Vec::new(),
            stack: TeardownStack::new(),
        };
        if let Err(e) = state.populate(ctx, &desc) {
            state.stack.unwind_shared(gpu);
            return Err(e);
        }

        info!(
            "swapchain ready ({}x{}, {} images, {:?}, fmt 0x{:x})",
            extent.width,
            extent.height,
            state.images.len(),
            state.present_mode,
            state.format.format.as_raw()
        );
        Ok(state)
    }

    fn populate<G: Gpu>(&mut self, ctx: &DeviceContext<G>, desc: &SwapchainDesc) -> PresentResult<()> {
        let gpu = ctx.gpu();

        // The surface can change between the capability query and creation.
        self.swapchain = gpu.create_swapchain(desc).map_err(|e| match e {
            vk::Result::ERROR_OUT_OF_DATE_KHR => PresentError::SurfaceOutOfDate,
            e => PresentError::creation(ResourceKind::Swapchain)(e),
        })?;
        self.stack.push(Owned::Swapchain(self.swapchain));

        self.images = gpu
            .swapchain_images(self.swapchain)
            .map_err(PresentError::creation(ResourceKind::Swapchain))?;

        self.views.reserve(self.images.len());
        for &image in &self.images {
            let view = gpu
                .create_image_view(image, self.format.format)
                .map_err(PresentError::creation(ResourceKind::ImageView))?;
            self.stack.push(Owned::ImageView(view));
            self.views.push(view);
        }

        let pool = ctx.command_pool();
        self.command_buffers = gpu
            .allocate_command_buffers(pool, self.images.len() as u32)
            .map_err(PresentError::creation(ResourceKind::CommandBuffer))?;
        self.stack.push(Owned::CommandBuffers {
            pool,
            buffers: self.command_buffers.clone(),
        });
        Ok(())
    }

    /// Free command buffers, destroy views (newest first), then the swapchain.
    /// Render targets built on this state must already be torn down.
    pub fn destroy<G: Gpu>(&mut self, ctx: &DeviceContext<G>) {
        if self.stack.is_empty() {
            return;
        }
        debug!("swapchain destroy");
        self.stack.unwind_shared(ctx.gpu());
        self.images.clear();
        self.views.clear();
        self.command_buffers.clear();
        self.swapchain = vk::SwapchainKHR::null();
    }

    pub fn is_live(&self) -> bool {
        !self.stack.is_empty()
    }

    pub fn handle(&self) -> vk::SwapchainKHR {
        self.swapchain
    }

    pub fn format(&self) -> vk::SurfaceFormatKHR {
        self.format
    }

    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    pub fn present_mode(&self) -> vk::PresentModeKHR {
        self.present_mode
    }

    pub fn usage(&self) -> vk::ImageUsageFlags {
        self.usage
    }

    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    pub fn images(&self) -> &[vk::Image] {
        &self.images
    }

    pub fn views(&self) -> &[vk::ImageView] {
        &self.views
    }

    pub fn command_buffers(&self) -> &[vk::CommandBuffer] {
        &self.command_buffers
    }
}

#[cfg(test)]
#[path = "swapchain_tests.rs"]
mod tests;
