// SPDX-License-Identifier: CEPL-1.0
//! The presentation loop: start-up in order, one frame per tick, shutdown in
//! exact reverse.
use std::ffi::CStr;
use std::time::{Duration, Instant};

use ash::prelude::VkResult;
use ash::vk;
use frameloop_render::{ShaderSource, WindowSignals};
use tracing::{debug, info, warn};

use crate::chain::{ChainState, ContentRecorder, SwapchainChain};
use crate::config::PresentConfig;
use crate::device::DeviceContext;
use crate::error::{FramePhase, PresentError, PresentResult};
use crate::gpu::Gpu;
use crate::sync::{FrameStatus, FrameSync};
use crate::targets::ShaderCode;

const FPS_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug)]
pub struct LoopState {
    /// A resize was reported and the swapchain has not been rebuilt since.
    pub dirty: bool,
    pub running: bool,
    pub frames_drawn: u64,
    fps_frames: u32,
    fps_since: Instant,
}

impl Default for LoopState {
    fn default() -> Self {
        Self {
            dirty: false,
            running: true,
            frames_drawn: 0,
            fps_frames: 0,
            fps_since: Instant::now(),
        }
    }
}

impl LoopState {
    fn frame_drawn(&mut self) {
        self.frames_drawn += 1;
        self.fps_frames += 1;
        let elapsed = self.fps_since.elapsed();
        if elapsed >= FPS_INTERVAL {
            info!("{:.1} FPS", f64::from(self.fps_frames) / elapsed.as_secs_f64());
            self.fps_frames = 0;
            self.fps_since = Instant::now();
        }
    }
}

pub struct Presenter<G: Gpu> {
    // Released explicitly in `shutdown`, before `ctx`.
    sync: Option<FrameSync>,
    chain: Option<SwapchainChain<G>>,
    ctx: DeviceContext<G>,
    state: LoopState,
}

impl<G: Gpu> Presenter<G> {
    /// Device context, shader load, swapchain, render targets, frame sync,
    /// then the first recording. Whatever fails, everything built before it is
    /// released before the error is returned.
    pub fn new<F, S, W>(
        gpu: G,
        config: &PresentConfig,
        required_extensions: &[&CStr],
        surface_factory: F,
        shaders: &S,
        content: Box<dyn ContentRecorder<G>>,
        window: &W,
    ) -> PresentResult<Self>
    where
        F: FnOnce(&G) -> VkResult<vk::SurfaceKHR>,
        S: ShaderSource + ?Sized,
        W: WindowSignals + ?Sized,
    {
        let config = config.sanitized();
        let ctx = DeviceContext::initialize(gpu, &config, required_extensions, surface_factory)?;
        let shaders = ShaderCode::load(shaders)?;
        let chain = SwapchainChain::build(&ctx, &config, shaders, content, window.framebuffer_size())?;

        let mut presenter = Self {
            sync: None,
            chain: Some(chain),
            ctx,
            state: LoopState::default(),
        };
        // From here on an early return drops `presenter`, which runs `shutdown`.
        presenter.sync = Some(FrameSync::create(&presenter.ctx, config.frames_in_flight)?);
        if let Some(chain) = presenter.chain.as_mut() {
            chain.record_all(&presenter.ctx)?;
        }
        info!(
            "presenter ready ({} frames in flight)",
            config.frames_in_flight
        );
        Ok(presenter)
    }

    pub fn context(&self) -> &DeviceContext<G> {
        &self.ctx
    }

    pub fn loop_state(&self) -> &LoopState {
        &self.state
    }

    pub fn chain_state(&self) -> Option<ChainState> {
        self.chain.as_ref().map(SwapchainChain::state)
    }

    /// One loop iteration. Returns `Ok(false)` once the window asked to close.
    pub fn tick<W: WindowSignals + ?Sized>(&mut self, window: &mut W) -> PresentResult<bool> {
        let poll = window.poll_events();
        if poll.close_requested {
            self.state.running = false;
            return Ok(false);
        }
        self.state.dirty |= poll.resized;

        let (Some(chain), Some(sync)) = (self.chain.as_mut(), self.sync.as_mut()) else {
            return Ok(false);
        };

        if self.state.dirty || chain.state() == ChainState::NoArea {
            if chain.recreate(&self.ctx, window.framebuffer_size())? == ChainState::NoArea {
                // Keep `dirty` so the next tick retries.
                return Ok(true);
            }
            self.state.dirty = false;
            sync.forget_images();
        }

        if sync.draw_frame(&self.ctx, chain, &*window)? == FrameStatus::Drawn {
            self.state.frame_drawn();
        }
        Ok(true)
    }

    /// Tick until the window closes or a frame fails, then wait for the device
    /// to go idle.
    pub fn run<W: WindowSignals + ?Sized>(&mut self, window: &mut W) -> PresentResult<()> {
        self.state.running = true;
        while self.state.running {
            if !self.tick(window)? {
                break;
            }
        }
        debug!("loop finished after {} frames", self.state.frames_drawn);
        self.ctx
            .gpu()
            .device_wait_idle()
            .map_err(PresentError::frame(FramePhase::DeviceIdle))
    }

    /// Device idle, then frame sync, render targets, swapchain and the device
    /// context. Safe to call more than once.
    pub fn shutdown(&mut self) {
        if !self.ctx.is_live() {
            return;
        }
        if let Err(e) = self.ctx.gpu().device_wait_idle() {
            warn!("device idle wait before shutdown failed: {e}");
        }
        if let Some(mut sync) = self.sync.take() {
            sync.destroy(&self.ctx);
        }
        if let Some(mut chain) = self.chain.take() {
            chain.destroy(&self.ctx);
        }
        self.ctx.shutdown();
        info!("presenter shut down");
    }
}

impl<G: Gpu> Drop for Presenter<G> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
#[path = "presenter_tests.rs"]
mod tests;
