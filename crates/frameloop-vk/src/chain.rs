// SPDX-License-Identifier: CEPL-1.0
//! The current swapchain generation and its render targets, rebuilt together
//! whenever the surface changes.
use ash::prelude::VkResult;
use ash::vk;
use frameloop_render::RenderSize;
use tracing::{debug, info, warn};

use crate::config::PresentConfig;
use crate::device::DeviceContext;
use crate::error::{FramePhase, PresentError, PresentResult};
use crate::gpu::Gpu;
use crate::swapchain::SwapchainState;
use crate::targets::{RenderTargets, ShaderCode};

/// Everything a content producer needs to record one swapchain image.
#[derive(Clone, Copy, Debug)]
pub struct RecordTarget {
    pub command_buffer: vk::CommandBuffer,
    pub image_index: u32,
    pub image: vk::Image,
    pub image_view: vk::ImageView,
    pub framebuffer: vk::Framebuffer,
    pub render_pass: vk::RenderPass,
    pub pipeline: vk::Pipeline,
    pub extent: vk::Extent2D,
}

/// The swapchain generation a content producer is about to record for.
#[derive(Clone, Copy, Debug)]
pub struct ContentSetup {
    pub physical_device: vk::PhysicalDevice,
    pub format: vk::Format,
    pub extent: vk::Extent2D,
    pub usage: vk::ImageUsageFlags,
    pub image_count: usize,
}

/// Records the commands for one swapchain image. Called between
/// `begin_command_buffer` and `end_command_buffer`, once per image, after
/// start-up and after every recreation.
pub trait ContentRecorder<G: Gpu + ?Sized> {
    /// Runs before the images of a generation are recorded, with the device
    /// idle. Objects created here belong to the recorder until `release`.
    fn prepare(&mut self, _gpu: &G, _setup: &ContentSetup) -> PresentResult<()> {
        Ok(())
    }

    fn record(&mut self, gpu: &G, target: &RecordTarget) -> VkResult<()>;

    /// Destroy whatever `prepare` created. The device is idle.
    fn release(&mut self, _gpu: &G) {}
}

/// Clears to a fixed colour and draws one triangle from `gl_VertexIndex`.
#[derive(Clone, Copy, Debug)]
pub struct Triangle {
    pub clear: [f32; 4],
}

impl Default for Triangle {
    fn default() -> Self {
        Self {
            clear: [0.02, 0.02, 0.04, 1.0],
        }
    }
}

impl<G: Gpu + ?Sized> ContentRecorder<G> for Triangle {
    fn record(&mut self, gpu: &G, t: &RecordTarget) -> VkResult<()> {
        gpu.cmd_begin_render_pass(t.command_buffer, t.render_pass, t.framebuffer, t.extent, self.clear);
        gpu.cmd_bind_pipeline(t.command_buffer, t.pipeline);
        gpu.cmd_draw(t.command_buffer, 3, 1);
        gpu.cmd_end_render_pass(t.command_buffer);
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChainState {
    /// Swapchain and render targets exist.
    Stable,
    /// The surface has no area or changed while the swapchain was built;
    /// nothing exists and recreation is retried on the next tick.
    NoArea,
    /// The last recreation failed; nothing exists.
    Fatal,
}

pub struct SwapchainChain<G: Gpu> {
    config: PresentConfig,
    shaders: ShaderCode,
    content: Box<dyn ContentRecorder<G>>,
    swapchain: Option<SwapchainState>,
    targets: Option<RenderTargets>,
    state: ChainState,
}

impl<G: Gpu> SwapchainChain<G> {
    /// Build the first generation without recording it; call
    /// [`record_all`](Self::record_all) once the rest of the frame machinery
    /// exists. A zero-area surface is not an error: the chain starts in
    /// [`ChainState::NoArea`].
    pub fn build(
        ctx: &DeviceContext<G>,
        config: &PresentConfig,
        shaders: ShaderCode,
        content: Box<dyn ContentRecorder<G>>,
        size: RenderSize,
    ) -> PresentResult<Self> {
        let mut chain = Self {
            config: *config,
            shaders,
            content,
            swapchain: None,
            targets: None,
            state: ChainState::NoArea,
        };
        chain.populate(ctx, size, false)?;
        Ok(chain)
    }

    pub fn state(&self) -> ChainState {
        self.state
    }

    pub fn swapchain(&self) -> Option<&SwapchainState> {
        self.swapchain.as_ref()
    }

    pub fn targets(&self) -> Option<&RenderTargets> {
        self.targets.as_ref()
    }

    /// Number of images in the current generation, zero when none exists.
    pub fn image_count(&self) -> usize {
        self.swapchain.as_ref().map_or(0, SwapchainState::image_count)
    }

    /// Tear the current generation down and build a new one for `size`.
    ///
    /// Waits for the device to go idle first, so no command buffer or image of
    /// the old generation is in use. Returns [`ChainState::NoArea`] without
    /// creating anything when `size` has no area.
    pub fn recreate(&mut self, ctx: &DeviceContext<G>, size: RenderSize) -> PresentResult<ChainState> {
        ctx.gpu()
            .device_wait_idle()
            .map_err(PresentError::frame(FramePhase::DeviceIdle))?;
        self.destroy_generation(ctx);

        if size.is_zero_area() {
            debug!("surface {size} has no area, deferring swapchain");
            self.state = ChainState::NoArea;
            return Ok(self.state);
        }
        self.populate(ctx, size, true)?;
        if self.state == ChainState::Stable {
            info!("swapchain recreated for {size}");
        }
        Ok(self.state)
    }

    fn populate(&mut self, ctx: &DeviceContext<G>, size: RenderSize, record: bool) -> PresentResult<()> {
        match self.try_populate(ctx, size, record) {
            Ok(()) => {
                self.state = ChainState::Stable;
                Ok(())
            }
            Err(e) if e.is_recoverable() => {
                debug!("swapchain deferred: {e}");
                self.destroy(ctx);
                self.state = ChainState::NoArea;
                Ok(())
            }
            Err(e) => {
                warn!("swapchain build failed: {e}");
                self.destroy(ctx);
                self.state = ChainState::Fatal;
                Err(e)
            }
        }
    }

    fn try_populate(
        &mut self,
        ctx: &DeviceContext<G>,
        size: RenderSize,
        record: bool,
    ) -> PresentResult<()> {
        if size.is_zero_area() {
            return Err(PresentError::ZeroArea);
        }
        let swapchain = self
            .swapchain
            .insert(SwapchainState::create(ctx, &self.config, size)?);
        self.targets = Some(RenderTargets::build(ctx, swapchain, &self.shaders)?);
        if record {
            self.record_all(ctx)?;
        }
        Ok(())
    }

    /// Record every per-image command buffer through the content producer.
    /// The caller guarantees none of them is pending on the GPU.
    pub fn record_all(&mut self, ctx: &DeviceContext<G>) -> PresentResult<()> {
        let (Some(swapchain), Some(targets)) = (&self.swapchain, &self.targets) else {
            return Ok(());
        };
        let gpu = ctx.gpu();
        let setup = ContentSetup {
            physical_device: ctx.physical_device(),
            format: swapchain.format().format,
            extent: swapchain.extent(),
            usage: swapchain.usage(),
            image_count: swapchain.image_count(),
        };
        self.content.prepare(gpu, &setup)?;
        for (i, &command_buffer) in swapchain.command_buffers().iter().enumerate() {
            let target = RecordTarget {
                command_buffer,
                image_index: i as u32,
                image: swapchain.images()[i],
                image_view: swapchain.views()[i],
                framebuffer: targets.framebuffers()[i],
                render_pass: targets.render_pass(),
                pipeline: targets.pipeline(),
                extent: swapchain.extent(),
            };
            gpu.begin_command_buffer(command_buffer)
                .map_err(PresentError::Recording)?;
            self.content
                .record(gpu, &target)
                .map_err(PresentError::Recording)?;
            gpu.end_command_buffer(command_buffer)
                .map_err(PresentError::Recording)?;
        }
        Ok(())
    }

    /// Content objects, render targets, then the swapchain. Leaves the chain
    /// empty.
    pub fn destroy(&mut self, ctx: &DeviceContext<G>) {
        self.content.release(ctx.gpu());
        self.destroy_generation(ctx);
    }

    /// Content objects survive so the next generation can reuse them.
    fn destroy_generation(&mut self, ctx: &DeviceContext<G>) {
        if let Some(mut targets) = self.targets.take() {
            targets.teardown(ctx);
        }
        if let Some(mut swapchain) = self.swapchain.take() {
            swapchain.destroy(ctx);
        }
    }
}

#[cfg(test)]
#[path = "chain_tests.rs"]
mod tests;
