// SPDX-License-Identifier: CEPL-1.0
use std::fmt;
use std::io;

use ash::vk;
use frameloop_render::ShaderStage;
use thiserror::Error;

/// Every kind of GPU object the core creates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKind {
    Instance,
    DebugMessenger,
    Surface,
    Device,
    CommandPool,
    Swapchain,
    ImageView,
    CommandBuffer,
    RenderPass,
    ShaderModule,
    PipelineLayout,
    Pipeline,
    Framebuffer,
    Semaphore,
    Fence,
    Buffer,
    DeviceMemory,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 17] = [
        ResourceKind::Instance,
        ResourceKind::DebugMessenger,
        ResourceKind::Surface,
        ResourceKind::Device,
        ResourceKind::CommandPool,
        ResourceKind::Swapchain,
        ResourceKind::ImageView,
        ResourceKind::CommandBuffer,
        ResourceKind::RenderPass,
        ResourceKind::ShaderModule,
        ResourceKind::PipelineLayout,
        ResourceKind::Pipeline,
        ResourceKind::Framebuffer,
        ResourceKind::Semaphore,
        ResourceKind::Fence,
        ResourceKind::Buffer,
        ResourceKind::DeviceMemory,
    ];

    pub const fn name(&self) -> &'static str {
        match self {
            ResourceKind::Instance => "instance",
            ResourceKind::DebugMessenger => "debug messenger",
            ResourceKind::Surface => "surface",
            ResourceKind::Device => "device",
            ResourceKind::CommandPool => "command pool",
            ResourceKind::Swapchain => "swapchain",
            ResourceKind::ImageView => "image view",
            ResourceKind::CommandBuffer => "command buffer",
            ResourceKind::RenderPass => "render pass",
            ResourceKind::ShaderModule => "shader module",
            ResourceKind::PipelineLayout => "pipeline layout",
            ResourceKind::Pipeline => "pipeline",
            ResourceKind::Framebuffer => "framebuffer",
            ResourceKind::Semaphore => "semaphore",
            ResourceKind::Fence => "fence",
            ResourceKind::Buffer => "buffer",
            ResourceKind::DeviceMemory => "device memory",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Steady-state operations whose failure ends the loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FramePhase {
    FenceWait,
    FenceReset,
    Acquire,
    Submit,
    Present,
    DeviceIdle,
}

impl fmt::Display for FramePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FramePhase::FenceWait => "fence wait",
            FramePhase::FenceReset => "fence reset",
            FramePhase::Acquire => "image acquire",
            FramePhase::Submit => "queue submit",
            FramePhase::Present => "queue present",
            FramePhase::DeviceIdle => "device idle wait",
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SurfaceQuery {
    Capabilities,
    PresentModes,
    Formats,
    NoFormats,
    PhysicalDevices,
    PresentSupport,
}

impl fmt::Display for SurfaceQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SurfaceQuery::Capabilities => "surface capabilities",
            SurfaceQuery::PresentModes => "surface present modes",
            SurfaceQuery::Formats => "surface formats",
            SurfaceQuery::NoFormats => "surface reports no formats",
            SurfaceQuery::PhysicalDevices => "physical device enumeration",
            SurfaceQuery::PresentSupport => "queue family present support",
        })
    }
}

pub type PresentResult<T> = Result<T, PresentError>;

#[derive(Debug, Error)]
pub enum PresentError {
    #[error("failed to create {kind}: {result}")]
    ResourceCreation {
        kind: ResourceKind,
        result: vk::Result,
    },

    #[error("no Vulkan physical device is available")]
    NoSuitableDevice,

    #[error("no queue family supports both graphics and presentation to the surface")]
    NoSuitableQueueFamily,

    #[error("surface query failed: {query}{}", .result.map(|r| format!(" ({r})")).unwrap_or_default())]
    SurfaceQueryFailure {
        query: SurfaceQuery,
        result: Option<vk::Result>,
    },

    #[error("failed to load {stage} shader bytecode")]
    ShaderLoad {
        stage: ShaderStage,
        #[source]
        source: io::Error,
    },

    /// The content producer cannot work with the current swapchain images.
    #[error("content setup failed: {0}")]
    ContentSetup(&'static str),

    #[error("command buffer recording failed: {0}")]
    Recording(vk::Result),

    #[error("{phase} failed: {result}")]
    Frame {
        phase: FramePhase,
        result: vk::Result,
    },

    #[error("surface is out of date")]
    SurfaceOutOfDate,

    #[error("surface is suboptimal")]
    SurfaceSuboptimal,

    #[error("surface has zero area")]
    ZeroArea,
}

impl PresentError {
    pub fn creation(kind: ResourceKind) -> impl FnOnce(vk::Result) -> PresentError {
        move |result| PresentError::ResourceCreation { kind, result }
    }

    pub fn frame(phase: FramePhase) -> impl FnOnce(vk::Result) -> PresentError {
        move |result| PresentError::Frame { phase, result }
    }

    pub fn query(query: SurfaceQuery) -> impl FnOnce(vk::Result) -> PresentError {
        move |result| PresentError::SurfaceQueryFailure {
            query,
            result: Some(result),
        }
    }

    /// Conditions the loop driver absorbs by recreating the swapchain.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            PresentError::SurfaceOutOfDate | PresentError::SurfaceSuboptimal | PresentError::ZeroArea
        )
    }

    /// Underlying Vulkan status, when the failure came from an API call.
    pub fn vk_result(&self) -> Option<vk::Result> {
        match self {
            PresentError::ResourceCreation { result, .. }
            | PresentError::Frame { result, .. }
            | PresentError::Recording(result) => Some(*result),
            PresentError::SurfaceQueryFailure { result, .. } => *result,
            _ => None,
        }
    }

    /// Negative status identifying the failing phase, numbered in the order the
    /// phases are first reached during start-up and then the frame loop.
    ///
    /// | code | phase |
    /// |---|---|
    /// | -1 | instance |
    /// | -2 | debug messenger |
    /// | -3 | surface |
    /// | -4 | physical device enumeration |
    /// | -5 | no physical device |
    /// | -6 | queue family present support query |
    /// | -7 | no graphics+present queue family |
    /// | -8 | logical device |
    /// | -9 | command pool |
    /// | -10 | shader load |
    /// | -11 | surface capabilities, present modes, formats |
    /// | -12 | swapchain |
    /// | -13 | image view |
    /// | -14 | command buffer |
    /// | -15 | render pass |
    /// | -16 | shader module |
    /// | -17 | pipeline layout |
    /// | -18 | pipeline |
    /// | -19 | framebuffer |
    /// | -20 | semaphore |
    /// | -21 | fence |
    /// | -22 | content setup |
    /// | -23 | buffer |
    /// | -24 | device memory |
    /// | -25 | command recording |
    /// | -26 .. -31 | fence wait, fence reset, acquire, submit, present, device idle |
    /// | -32 .. -34 | out of date, suboptimal, zero area |
    pub fn code(&self) -> i32 {
        match self {
            PresentError::ResourceCreation { kind, .. } => match kind {
                ResourceKind::Instance => -1,
                ResourceKind::DebugMessenger => -2,
                ResourceKind::Surface => -3,
                ResourceKind::Device => -8,
                ResourceKind::CommandPool => -9,
                ResourceKind::Swapchain => -12,
                ResourceKind::ImageView => -13,
                ResourceKind::CommandBuffer => -14,
                ResourceKind::RenderPass => -15,
                ResourceKind::ShaderModule => -16,
                ResourceKind::PipelineLayout => -17,
                ResourceKind::Pipeline => -18,
                ResourceKind::Framebuffer => -19,
                ResourceKind::Semaphore => -20,
                ResourceKind::Fence => -21,
                ResourceKind::Buffer => -23,
                ResourceKind::DeviceMemory => -24,
            },
            PresentError::SurfaceQueryFailure { query, .. } => match query {
                SurfaceQuery::PhysicalDevices => -4,
                SurfaceQuery::PresentSupport => -6,
                SurfaceQuery::Capabilities
                | SurfaceQuery::PresentModes
                | SurfaceQuery::Formats
                | SurfaceQuery::NoFormats => -11,
            },
            PresentError::NoSuitableDevice => -5,
            PresentError::NoSuitableQueueFamily => -7,
            PresentError::ShaderLoad { .. } => -10,
            PresentError::ContentSetup(_) => -22,
            PresentError::Recording(_) => -25,
            PresentError::Frame { phase, .. } => match phase {
                FramePhase::FenceWait => -26,
                FramePhase::FenceReset => -27,
                FramePhase::Acquire => -28,
                FramePhase::Submit => -29,
                FramePhase::Present => -30,
                FramePhase::DeviceIdle => -31,
            },
            PresentError::SurfaceOutOfDate => -32,
            PresentError::SurfaceSuboptimal => -33,
            PresentError::ZeroArea => -34,
        }
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
