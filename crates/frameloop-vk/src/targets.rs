// SPDX-License-Identifier: CEPL-1.0
//! Render pass, pipeline and framebuffers derived from one swapchain generation.
use std::io::Cursor;

use ash::util::read_spv;
use ash::vk;
use frameloop_render::{ShaderSource, ShaderStage};
use tracing::debug;

use crate::device::DeviceContext;
use crate::error::{PresentError, PresentResult, ResourceKind};
use crate::gpu::{Gpu, PipelineDesc};
use crate::swapchain::SwapchainState;
use crate::teardown::{Owned, TeardownStack};

/// SPIR-V words for the two pipeline stages, loaded once at start-up and
/// reused for every pipeline rebuild.
#[derive(Clone, Debug, Default)]
pub struct ShaderCode {
    pub vertex: Vec<u32>,
    pub fragment: Vec<u32>,
}

impl ShaderCode {
    pub fn load<S: ShaderSource + ?Sized>(source: &S) -> PresentResult<Self> {
        Ok(Self {
            vertex: load_stage(source, ShaderStage::Vertex)?,
            fragment: load_stage(source, ShaderStage::Fragment)?,
        })
    }
}

fn load_stage<S: ShaderSource + ?Sized>(source: &S, stage: ShaderStage) -> PresentResult<Vec<u32>> {
    let bytes = source
        .load(stage)
        .map_err(|source| PresentError::ShaderLoad { stage, source })?;
    read_spv(&mut Cursor::new(&bytes[..])).map_err(|source| PresentError::ShaderLoad { stage, source })
}

#[derive(Debug)]
pub struct RenderTargets {
    render_pass: vk::RenderPass,
    layout: vk::PipelineLayout,
    pipeline: vk::Pipeline,
    framebuffers: Vec<vk::Framebuffer>,
    stack: TeardownStack,
}

impl RenderTargets {
    pub fn build<G: Gpu>(
        ctx: &DeviceContext<G>,
        swapchain: &SwapchainState,
        shaders: &ShaderCode,
    ) -> PresentResult<Self> {
        let mut targets = Self {
            render_pass: vk::RenderPass::null(),
            layout: vk::PipelineLayout::null(),
            pipeline: vk::Pipeline::null(),
            framebuffers: Vec::new(),
            stack: TeardownStack::new(),
        };
        if let Err(e) = targets.populate(ctx.gpu(), swapchain, shaders) {
            targets.stack.unwind_shared(ctx.gpu());
            return Err(e);
        }
        debug!(
            "render targets ready ({} framebuffers)",
            targets.framebuffers.len()
        );
        Ok(targets)
    }

    fn populate<G: Gpu>(
        &mut self,
        gpu: &G,
        swapchain: &SwapchainState,
        shaders: &ShaderCode,
    ) -> PresentResult<()> {
        self.render_pass = gpu
            .create_render_pass(swapchain.format().format)
            .map_err(PresentError::creation(ResourceKind::RenderPass))?;
        self.stack.push(Owned::RenderPass(self.render_pass));

        // Shader modules live only for the duration of pipeline creation and
        // are never on the teardown stack.
        let vertex = gpu
            .create_shader_module(&shaders.vertex)
            .map_err(PresentError::creation(ResourceKind::ShaderModule))?;
        let fragment = match gpu.create_shader_module(&shaders.fragment) {
            Ok(m) => m,
            Err(r) => {
                gpu.destroy_shader_module(vertex);
                return Err(PresentError::creation(ResourceKind::ShaderModule)(r));
            }
        };

        let pipeline = self.build_pipeline(gpu, swapchain.extent(), vertex, fragment);
        gpu.destroy_shader_module(fragment);
        gpu.destroy_shader_module(vertex);
        pipeline?;

        self.framebuffers.reserve(swapchain.views().len());
        for &view in swapchain.views() {
            let fb = gpu
                .create_framebuffer(self.render_pass, view, swapchain.extent())
                .map_err(PresentError::creation(ResourceKind::Framebuffer))?;
            self.stack.push(Owned::Framebuffer(fb));
            self.framebuffers.push(fb);
        }
        Ok(())
    }

    fn build_pipeline<G: Gpu>(
        &mut self,
        gpu: &G,
        extent: vk::Extent2D,
        vertex: vk::ShaderModule,
        fragment: vk::ShaderModule,
    ) -> PresentResult<()> {
        self.layout = gpu
            .create_pipeline_layout()
            .map_err(PresentError::creation(ResourceKind::PipelineLayout))?;
        self.stack.push(Owned::PipelineLayout(self.layout));

        self.pipeline = gpu
            .create_graphics_pipeline(&PipelineDesc {
                render_pass: self.render_pass,
                layout: self.layout,
                vertex,
                fragment,
                extent,
            })
            .map_err(PresentError::creation(ResourceKind::Pipeline))?;
        self.stack.push(Owned::Pipeline(self.pipeline));
        Ok(())
    }

    /// Framebuffers (newest first), pipeline, layout, render pass. Must run
    /// before the swapchain these targets were built from is destroyed.
    pub fn teardown<G: Gpu>(&mut self, ctx: &DeviceContext<G>) {
        if self.stack.is_empty() {
            return;
        }
        self.stack.unwind_shared(ctx.gpu());
        self.framebuffers.clear();
        self.pipeline = vk::Pipeline::null();
        self.layout = vk::PipelineLayout::null();
        self.render_pass = vk::RenderPass::null();
    }

    pub fn is_live(&self) -> bool {
        !self.stack.is_empty()
    }

    pub fn render_pass(&self) -> vk::RenderPass {
        self.render_pass
    }

    pub fn pipeline_layout(&self) -> vk::PipelineLayout {
        self.layout
    }

    pub fn pipeline(&self) -> vk::Pipeline {
        self.pipeline
    }

    pub fn framebuffers(&self) -> &[vk::Framebuffer] {
        &self.framebuffers
    }
}

#[cfg(test)]
#[path = "targets_tests.rs"]
mod tests;
