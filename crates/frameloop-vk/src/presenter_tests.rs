// SPDX-License-Identifier: CEPL-1.0
use super::*;
use crate::chain::{ContentRecorder, Triangle};
use crate::error::ResourceKind;
use crate::mock::{MockCall, MockGpu, MockShaders, MockWindow};
use crate::upload::PixelUpload;
use frameloop_render::ShaderStage;

fn presenter_with(
    gpu: &MockGpu,
    window: &MockWindow,
    shaders: MockShaders,
) -> PresentResult<Presenter<MockGpu>> {
    build(
        gpu,
        window,
        shaders,
        vk::ImageUsageFlags::COLOR_ATTACHMENT,
        Box::new(Triangle::default()),
    )
}

fn build(
    gpu: &MockGpu,
    window: &MockWindow,
    shaders: MockShaders,
    image_usage: vk::ImageUsageFlags,
    content: Box<dyn ContentRecorder<MockGpu>>,
) -> PresentResult<Presenter<MockGpu>> {
    let config = PresentConfig {
        validation: true,
        image_usage,
        ..PresentConfig::default()
    };
    Presenter::new(
        gpu.clone(),
        &config,
        &[],
        |g| g.create_surface(),
        &shaders,
        content,
        window,
    )
}

/// Uploads pixels instead of drawing, so every kind of object gets created.
fn pixel_presenter(gpu: &MockGpu, window: &MockWindow) -> PresentResult<Presenter<MockGpu>> {
    build(
        gpu,
        window,
        MockShaders::default(),
        vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::TRANSFER_DST,
        Box::new(PixelUpload::gradient()),
    )
}

fn presenter(gpu: &MockGpu, window: &MockWindow) -> PresentResult<Presenter<MockGpu>> {
    presenter_with(gpu, window, MockShaders::default())
}

fn lifecycle(calls: Vec<MockCall>) -> Vec<(bool, ResourceKind, u64)> {
    calls
        .into_iter()
        .filter_map(|c| match c {
            MockCall::Create(k, h) => Some((true, k, h)),
            MockCall::Destroy(k, h) => Some((false, k, h)),
            _ => None,
        })
        .filter(|&(_, k, _)| k != ResourceKind::ShaderModule)
        .collect()
}

// =============================================================================
// Construction and teardown
// =============================================================================

#[test]
fn shutdown_is_exact_reverse_of_construction() {
    let gpu = MockGpu::new();
    let window = MockWindow::new(640, 480);
    let presenter = presenter(&gpu, &window).unwrap();

    let created = lifecycle(gpu.calls());
    assert!(created.iter().all(|&(create, _, _)| create));
    gpu.clear_calls();

    drop(presenter);

    let destroyed: Vec<_> = lifecycle(gpu.calls())
        .into_iter()
        .map(|(create, k, h)| {
            assert!(!create, "created {k} during shutdown");
            (true, k, h)
        })
        .collect();
    let mut expected = created;
    expected.reverse();
    assert_eq!(destroyed, expected);
    assert_eq!(gpu.live_count(), 0);
    assert!(gpu.violations().is_empty(), "{:?}", gpu.violations());
}

#[test]
fn construction_order() {
    let gpu = MockGpu::new();
    let window = MockWindow::new(64, 64);
    let _presenter = presenter(&gpu, &window).unwrap();

    let mut kinds: Vec<ResourceKind> = lifecycle(gpu.calls())
        .into_iter()
        .map(|(_, k, _)| k)
        .collect();
    kinds.dedup();
    assert_eq!(
        kinds,
        vec![
            ResourceKind::Instance,
            ResourceKind::DebugMessenger,
            ResourceKind::Surface,
            ResourceKind::Device,
            ResourceKind::CommandPool,
            ResourceKind::Swapchain,
            ResourceKind::ImageView,
            ResourceKind::CommandBuffer,
            ResourceKind::RenderPass,
            ResourceKind::PipelineLayout,
            ResourceKind::Pipeline,
            ResourceKind::Framebuffer,
            ResourceKind::Semaphore,
            ResourceKind::Fence,
            ResourceKind::Semaphore,
            ResourceKind::Fence,
        ]
    );
    // First recording happens after the frame sync exists.
    let calls = gpu.calls();
    let last_fence = calls
        .iter()
        .rposition(|c| matches!(c, MockCall::Create(ResourceKind::Fence, _)))
        .unwrap();
    let first_begin = calls
        .iter()
        .position(|c| matches!(c, MockCall::Begin(_)))
        .unwrap();
    assert!(last_fence < first_begin);
}

#[test]
fn every_creation_phase_rolls_back_completely() {
    for kind in ResourceKind::ALL {
        let gpu = MockGpu::new();
        let window = MockWindow::new(64, 64);
        gpu.fail_create(kind, 0);

        let err = pixel_presenter(&gpu, &window).err().expect("construction should fail");
        assert!(
            matches!(err, PresentError::ResourceCreation { kind: k, .. } if k == kind),
            "{kind}: {err}"
        );
        assert_eq!(gpu.live_count(), 0, "{kind} failure leaked objects");
        assert!(gpu.violations().is_empty(), "{kind}: {:?}", gpu.violations());
    }
}

#[test]
fn later_failures_roll_back_too() {
    for (kind, nth) in [
        (ResourceKind::ImageView, 3),
        (ResourceKind::Framebuffer, 2),
        (ResourceKind::Semaphore, 3),
        (ResourceKind::Fence, 1),
    ] {
        let gpu = MockGpu::new();
        let window = MockWindow::new(64, 64);
        gpu.fail_create(kind, nth);
        assert!(presenter(&gpu, &window).is_err(), "{kind}#{nth}");
        assert_eq!(gpu.live_count(), 0, "{kind}#{nth} failure leaked objects");
    }
}

#[test]
fn shader_load_failure_rolls_back_device() {
    let gpu = MockGpu::new();
    let window = MockWindow::new(64, 64);
    let err = presenter_with(
        &gpu,
        &window,
        MockShaders {
            missing: Some(ShaderStage::Vertex),
        },
    )
    .err()
    .unwrap();
    assert_eq!(err.code(), -10);
    assert_eq!(gpu.live_count(), 0);
    assert_eq!(gpu.created_of(ResourceKind::Swapchain), 0);
}

#[test]
fn recording_failure_rolls_back_everything() {
    let gpu = MockGpu::new();
    gpu.configure(|s| s.fail_record = Some(vk::Result::ERROR_OUT_OF_HOST_MEMORY));
    let window = MockWindow::new(64, 64);
    let err = presenter(&gpu, &window).err().unwrap();
    assert_eq!(err.code(), -25);
    assert_eq!(gpu.live_count(), 0);
}

#[test]
fn shutdown_twice_is_harmless() {
    let gpu = MockGpu::new();
    let window = MockWindow::new(64, 64);
    let mut presenter = presenter(&gpu, &window).unwrap();
    presenter.shutdown();
    let after = gpu.calls().len();
    presenter.shutdown();
    drop(presenter);
    assert_eq!(gpu.calls().len(), after);
}

// =============================================================================
// Loop
// =============================================================================

#[test]
fn run_until_close() {
    let gpu = MockGpu::new();
    let mut window = MockWindow::new(200, 100);
    window.close_after = Some(5);
    let mut presenter = presenter(&gpu, &window).unwrap();

    presenter.run(&mut window).unwrap();
    assert_eq!(presenter.loop_state().frames_drawn, 5);
    assert!(!presenter.loop_state().running);
    assert_eq!(gpu.calls().last(), Some(&MockCall::DeviceWaitIdle));
    assert!(gpu.violations().is_empty(), "{:?}", gpu.violations());
}

#[test]
fn resize_triggers_one_recreation() {
    let gpu = MockGpu::new();
    let mut window = MockWindow::new(200, 100);
    let mut presenter = presenter(&gpu, &window).unwrap();

    assert!(presenter.tick(&mut window).unwrap());
    window.resize(400, 300);
    assert!(presenter.tick(&mut window).unwrap());
    assert!(presenter.tick(&mut window).unwrap());

    assert_eq!(gpu.created_of(ResourceKind::Swapchain), 2);
    assert!(!presenter.loop_state().dirty);
    assert_eq!(presenter.loop_state().frames_drawn, 3);
    assert_eq!(
        gpu.last_swapchain().unwrap().extent,
        vk::Extent2D {
            width: 400,
            height: 300
        }
    );
}

#[test]
fn minimized_window_skips_until_restored() {
    let gpu = MockGpu::new();
    let mut window = MockWindow::new(200, 100);
    let mut presenter = presenter(&gpu, &window).unwrap();
    presenter.tick(&mut window).unwrap();

    window.resize(0, 0);
    for _ in 0..3 {
        assert!(presenter.tick(&mut window).unwrap());
        assert_eq!(presenter.chain_state(), Some(ChainState::NoArea));
        assert!(presenter.loop_state().dirty);
    }
    assert_eq!(presenter.loop_state().frames_drawn, 1);
    assert_eq!(gpu.live_of(ResourceKind::Swapchain), 0);

    window.resize(300, 300);
    assert!(presenter.tick(&mut window).unwrap());
    assert_eq!(presenter.chain_state(), Some(ChainState::Stable));
    assert!(!presenter.loop_state().dirty);
    assert_eq!(presenter.loop_state().frames_drawn, 2);
    assert!(gpu.violations().is_empty(), "{:?}", gpu.violations());
}

#[test]
fn zero_area_at_start_then_first_frame() {
    let gpu = MockGpu::new();
    let mut window = MockWindow::new(0, 0);
    let mut presenter = presenter(&gpu, &window).unwrap();
    assert_eq!(presenter.chain_state(), Some(ChainState::NoArea));

    window.size = frameloop_render::RenderSize::new(32, 32);
    presenter.tick(&mut window).unwrap();
    assert_eq!(presenter.chain_state(), Some(ChainState::Stable));
    assert_eq!(presenter.loop_state().frames_drawn, 1);
}

#[test]
fn fatal_frame_error_ends_run_and_drop_cleans_up() {
    let gpu = MockGpu::new();
    let mut window = MockWindow::new(64, 64);
    let mut presenter = presenter(&gpu, &window).unwrap();
    gpu.configure(|s| s.present_script.push_back(Err(vk::Result::ERROR_DEVICE_LOST)));

    let err = presenter.run(&mut window).unwrap_err();
    assert_eq!(err.code(), -30);
    drop(presenter);
    assert_eq!(gpu.live_count(), 0);
}
