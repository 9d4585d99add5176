// SPDX-License-Identifier: CEPL-1.0
//! Frames in flight.
//!
//! A ring of `F` slots, each holding an image-available semaphore, a
//! render-finished semaphore and a fence created signaled. One call to
//! [`FrameSync::draw_frame`] advances the ring by one and drives that slot
//! through wait, acquire, submit and present.
//!
//! The slot fence is reset only right before the submission that will signal
//! it again. A frame abandoned between the wait and the submit (out-of-date
//! surface, zero area) therefore leaves the fence signaled, and the next visit
//! to the slot cannot block forever.
use ash::vk;
use frameloop_render::WindowSignals;
use tracing::{debug, trace};

use crate::chain::{ChainState, SwapchainChain};
use crate::device::DeviceContext;
use crate::error::{FramePhase, PresentError, PresentResult, ResourceKind};
use crate::gpu::{FrameSubmit, Gpu};
use crate::teardown::{Owned, TeardownStack};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameStatus {
    /// The frame was submitted (and presented, unless presentation asked for
    /// a recreation).
    Drawn,
    /// Nothing was submitted; the surface had to be rebuilt and has no area yet.
    Skipped,
}

#[derive(Clone, Copy, Debug)]
struct Slot {
    image_available: vk::Semaphore,
    render_finished: vk::Semaphore,
    in_flight: vk::Fence,
}

#[derive(Debug)]
pub struct FrameSync {
    slots: Vec<Slot>,
    index: usize,
    // Fence of the last submission that used each swapchain image.
    image_fences: Vec<vk::Fence>,
    stack: TeardownStack,
}

impl FrameSync {
    /// Create `frames_in_flight` slots (at least one). The ring starts at the
    /// last slot so the first frame uses slot 0.
    pub fn create<G: Gpu>(ctx: &DeviceContext<G>, frames_in_flight: usize) -> PresentResult<Self> {
        let count = frames_in_flight.max(1);
        let mut sync = Self {
            slots: Vec::with_capacity(count),
            index: count - 1,
            image_fences: Vec::new(),
            stack: TeardownStack::new(),
        };
        if let Err(e) = sync.populate(ctx.gpu(), count) {
            sync.stack.unwind_shared(ctx.gpu());
            return Err(e);
        }
        debug!("frame sync ready ({count} frames in flight)");
        Ok(sync)
    }

    fn populate<G: Gpu>(&mut self, gpu: &G, count: usize) -> PresentResult<()> {
        for _ in 0..count {
            let image_available = gpu
                .create_semaphore()
                .map_err(PresentError::creation(ResourceKind::Semaphore))?;
            self.stack.push(Owned::Semaphore(image_available));
            let render_finished = gpu
                .create_semaphore()
                .map_err(PresentError::creation(ResourceKind::Semaphore))?;
            self.stack.push(Owned::Semaphore(render_finished));
            let in_flight = gpu
                .create_fence(true)
                .map_err(PresentError::creation(ResourceKind::Fence))?;
            self.stack.push(Owned::Fence(in_flight));
            self.slots.push(Slot {
                image_available,
                render_finished,
                in_flight,
            });
        }
        Ok(())
    }

    pub fn frames_in_flight(&self) -> usize {
        self.slots.len()
    }

    /// Slot used by the most recent frame.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Drop per-image fence tracking. Call whenever the swapchain image set
    /// changes; the device is idle at that point, so nothing is lost.
    pub fn forget_images(&mut self) {
        self.image_fences.clear();
    }

    /// Render and present one frame.
    ///
    /// Out-of-date or suboptimal surfaces are rebuilt through `chain` using
    /// the window's current framebuffer size; those are not errors. Every
    /// other failure is returned and ends the loop.
    pub fn draw_frame<G: Gpu, W: WindowSignals + ?Sized>(
        &mut self,
        ctx: &DeviceContext<G>,
        chain: &mut SwapchainChain<G>,
        window: &W,
    ) -> PresentResult<FrameStatus> {
        if self.slots.is_empty() {
            return Ok(FrameStatus::Skipped);
        }
        let gpu = ctx.gpu();
        self.index = (self.index + 1) % self.slots.len();
        let slot = self.slots[self.index];

        gpu.wait_for_fence(slot.in_flight, u64::MAX)
            .map_err(PresentError::frame(FramePhase::FenceWait))?;

        let image_index = loop {
            let Some(swapchain) = chain.swapchain() else {
                return Ok(FrameStatus::Skipped);
            };
            match gpu.acquire_next_image(swapchain.handle(), u64::MAX, slot.image_available) {
                Ok((index, suboptimal)) => {
                    if suboptimal {
                        trace!("acquire reported suboptimal surface");
                    }
                    break index;
                }
                Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                    debug!("acquire: surface out of date");
                    if self.rebuild(ctx, chain, window)? == ChainState::NoArea {
                        return Ok(FrameStatus::Skipped);
                    }
                }
                Err(r) => return Err(PresentError::frame(FramePhase::Acquire)(r)),
            }
        };

        let (swapchain_handle, command_buffer) = match chain.swapchain() {
            Some(sc) => (sc.handle(), sc.command_buffers()[image_index as usize]),
            None => return Ok(FrameStatus::Skipped),
        };

        // The image may still be in use by a submission from another slot.
        if self.image_fences.len() != chain.image_count() {
            self.image_fences = vec![vk::Fence::null(); chain.image_count()];
        }
        let previous = self.image_fences[image_index as usize];
        if previous != vk::Fence::null() && previous != slot.in_flight {
            gpu.wait_for_fence(previous, u64::MAX)
                .map_err(PresentError::frame(FramePhase::FenceWait))?;
        }
        self.image_fences[image_index as usize] = slot.in_flight;

        gpu.reset_fence(slot.in_flight)
            .map_err(PresentError::frame(FramePhase::FenceReset))?;
        gpu.queue_submit(
            ctx.queue(),
            &FrameSubmit {
                command_buffer,
                wait: slot.image_available,
                wait_stage: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
                signal: slot.render_finished,
                fence: slot.in_flight,
            },
        )
        .map_err(PresentError::frame(FramePhase::Submit))?;

        match gpu.queue_present(ctx.queue(), swapchain_handle, image_index, slot.render_finished) {
            Ok(false) => {}
            Ok(true) => {
                debug!("present: surface suboptimal");
                self.rebuild(ctx, chain, window)?;
            }
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                debug!("present: surface out of date");
                self.rebuild(ctx, chain, window)?;
            }
            Err(r) => return Err(PresentError::frame(FramePhase::Present)(r)),
        }
        Ok(FrameStatus::Drawn)
    }

    fn rebuild<G: Gpu, W: WindowSignals + ?Sized>(
        &mut self,
        ctx: &DeviceContext<G>,
        chain: &mut SwapchainChain<G>,
        window: &W,
    ) -> PresentResult<ChainState> {
        let state = chain.recreate(ctx, window.framebuffer_size())?;
        self.forget_images();
        Ok(state)
    }

    /// Destroy every semaphore and fence. The device must be idle.
    pub fn destroy<G: Gpu>(&mut self, ctx: &DeviceContext<G>) {
        if self.stack.is_empty() {
            return;
        }
        self.stack.unwind_shared(ctx.gpu());
        self.slots.clear();
        self.image_fences.clear();
    }
}

#[cfg(test)]
#[path = "sync_tests.rs"]
mod tests;
