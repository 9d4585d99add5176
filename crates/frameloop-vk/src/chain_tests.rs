// SPDX-License-Identifier: CEPL-1.0
use super::*;
use crate::error::ResourceKind;
use crate::mock::{context, MockCall, MockGpu, MockShaders};

fn chain(ctx: &DeviceContext<MockGpu>, size: RenderSize) -> PresentResult<SwapchainChain<MockGpu>> {
    let shaders = ShaderCode::load(&MockShaders::default())?;
    SwapchainChain::build(
        ctx,
        &PresentConfig::default(),
        shaders,
        Box::new(Triangle::default()),
        size,
    )
}

fn draws(gpu: &MockGpu) -> usize {
    gpu.calls()
        .iter()
        .filter(|c| matches!(c, MockCall::Draw { vertex_count: 3, .. }))
        .count()
}

#[test]
fn record_all_covers_every_image() {
    let gpu = MockGpu::new();
    let ctx = context(&gpu);
    let mut chain = chain(&ctx, RenderSize::new(640, 480)).unwrap();

    assert_eq!(chain.state(), ChainState::Stable);
    assert_eq!(chain.image_count(), 4);
    assert_eq!(draws(&gpu), 0);
    chain.record_all(&ctx).unwrap();
    assert_eq!(draws(&gpu), 4);
    chain.destroy(&ctx);
    assert_eq!(gpu.live_of(ResourceKind::Swapchain), 0);
}

#[test]
fn zero_area_then_recovery() {
    let gpu = MockGpu::new();
    let ctx = context(&gpu);
    let mut chain = chain(&ctx, RenderSize::new(640, 480)).unwrap();

    let state = chain.recreate(&ctx, RenderSize::new(0, 480)).unwrap();
    assert_eq!(state, ChainState::NoArea);
    assert!(chain.swapchain().is_none());
    assert!(chain.targets().is_none());
    assert_eq!(gpu.live_of(ResourceKind::Swapchain), 0);
    assert_eq!(gpu.live_of(ResourceKind::Framebuffer), 0);

    gpu.clear_calls();
    let state = chain.recreate(&ctx, RenderSize::new(800, 600)).unwrap();
    assert_eq!(state, ChainState::Stable);
    assert_eq!(gpu.created_of(ResourceKind::Swapchain), 1);
    assert_eq!(draws(&gpu), 4);
    assert_eq!(
        chain.swapchain().unwrap().extent(),
        vk::Extent2D {
            width: 800,
            height: 600
        }
    );
    chain.destroy(&ctx);
}

#[test]
fn recreate_idles_before_destroying() {
    let gpu = MockGpu::new();
    let ctx = context(&gpu);
    let mut chain = chain(&ctx, RenderSize::new(64, 64)).unwrap();

    gpu.clear_calls();
    chain.recreate(&ctx, RenderSize::new(128, 128)).unwrap();
    let calls = gpu.calls();
    assert_eq!(calls.first(), Some(&MockCall::DeviceWaitIdle));

    // Old targets go before the old swapchain, and both before anything new.
    let first_swapchain_destroy = calls
        .iter()
        .position(|c| matches!(c, MockCall::Destroy(ResourceKind::Swapchain, _)))
        .unwrap();
    let last_framebuffer_destroy = calls
        .iter()
        .rposition(|c| matches!(c, MockCall::Destroy(ResourceKind::Framebuffer, _)))
        .unwrap();
    let first_create = calls
        .iter()
        .position(|c| matches!(c, MockCall::Create(..)))
        .unwrap();
    assert!(last_framebuffer_destroy < first_swapchain_destroy);
    assert!(first_swapchain_destroy < first_create);
    chain.destroy(&ctx);
}

#[test]
fn failed_recreation_is_fatal_and_leaves_nothing() {
    let gpu = MockGpu::new();
    let ctx = context(&gpu);
    let mut chain = chain(&ctx, RenderSize::new(64, 64)).unwrap();
    let baseline = gpu.live_count()
        - gpu.live_of(ResourceKind::Swapchain)
        - gpu.live_of(ResourceKind::ImageView)
        - gpu.live_of(ResourceKind::CommandBuffer)
        - gpu.live_of(ResourceKind::RenderPass)
        - gpu.live_of(ResourceKind::PipelineLayout)
        - gpu.live_of(ResourceKind::Pipeline)
        - gpu.live_of(ResourceKind::Framebuffer);

    // The second pipeline ever created is the one the recreation builds.
    gpu.fail_create(ResourceKind::Pipeline, 1);
    let err = chain.recreate(&ctx, RenderSize::new(96, 96)).unwrap_err();
    assert_eq!(err.code(), -18);
    assert_eq!(chain.state(), ChainState::Fatal);
    assert_eq!(gpu.live_count(), baseline);
}

#[test]
fn zero_area_at_start_is_not_an_error() {
    let gpu = MockGpu::new();
    let ctx = context(&gpu);
    let chain = chain(&ctx, RenderSize::new(0, 0)).unwrap();
    assert_eq!(chain.state(), ChainState::NoArea);
    assert_eq!(gpu.created_of(ResourceKind::Swapchain), 0);
}

#[test]
fn surface_change_during_creation_defers_instead_of_failing() {
    let gpu = MockGpu::new();
    let ctx = context(&gpu);
    let mut chain = chain(&ctx, RenderSize::new(64, 64)).unwrap();
    let baseline = gpu.live_count()
        - gpu.live_of(ResourceKind::Swapchain)
        - gpu.live_of(ResourceKind::ImageView)
        - gpu.live_of(ResourceKind::CommandBuffer)
        - gpu.live_of(ResourceKind::RenderPass)
        - gpu.live_of(ResourceKind::PipelineLayout)
        - gpu.live_of(ResourceKind::Pipeline)
        - gpu.live_of(ResourceKind::Framebuffer);

    gpu.fail_create_with(ResourceKind::Swapchain, 1, vk::Result::ERROR_OUT_OF_DATE_KHR);
    let state = chain.recreate(&ctx, RenderSize::new(96, 96)).unwrap();
    assert_eq!(state, ChainState::NoArea);
    assert!(chain.swapchain().is_none());
    assert_eq!(gpu.live_count(), baseline);

    assert_eq!(
        chain.recreate(&ctx, RenderSize::new(96, 96)).unwrap(),
        ChainState::Stable
    );
    assert_eq!(draws(&gpu), 4);
    chain.destroy(&ctx);
    assert!(gpu.violations().is_empty(), "{:?}", gpu.violations());
}
