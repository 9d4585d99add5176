// SPDX-License-Identifier: CEPL-1.0
#![deny(unsafe_op_in_unsafe_fn)]
//! Vulkan presentation core.
//!
//! Components, leaves first: [`DeviceContext`], [`SwapchainState`],
//! [`RenderTargets`], [`FrameSync`], and the loop driver [`Presenter`], which
//! owns them all and rebuilds the swapchain through [`SwapchainChain`] when the
//! surface changes. Content is recorded through a [`ContentRecorder`]: a
//! [`Triangle`] drawn in a render pass, or a [`PixelUpload`] copied in with
//! transfers. Every GPU call goes through the [`Gpu`] trait.

mod ash_gpu;
mod chain;
mod config;
mod device;
mod error;
mod gpu;
mod presenter;
mod swapchain;
mod sync;
mod targets;
mod teardown;
mod upload;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use ash_gpu::AshGpu;
pub use chain::{
    ChainState, ContentRecorder, ContentSetup, RecordTarget, SwapchainChain, Triangle,
};
pub use config::{PresentConfig, DEFAULT_FRAMES_IN_FLIGHT, DEFAULT_PREFERRED_IMAGE_COUNT};
pub use device::{select_queue_family, DeviceContext, APPLICATION_NAME, VALIDATION_LAYER};
pub use error::{FramePhase, PresentError, PresentResult, ResourceKind, SurfaceQuery};
pub use gpu::{FrameSubmit, Gpu, InstanceDesc, PipelineDesc, SwapchainDesc};
pub use presenter::{LoopState, Presenter};
pub use swapchain::{
    choose_image_count, choose_present_mode, choose_surface_format, extent_from_caps,
    SwapchainState, PREFERRED_FORMAT,
};
pub use sync::{FrameStatus, FrameSync};
pub use targets::{RenderTargets, ShaderCode};
pub use teardown::{Owned, TeardownStack};
pub use upload::{bytes_per_pixel, find_memory_type, PixelFill, PixelUpload};

pub use ash::vk;
