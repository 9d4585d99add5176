// SPDX-License-Identifier: CEPL-1.0
use super::*;
use ash::vk::Handle;
use crate::chain::{ChainState, SwapchainChain};
use crate::config::PresentConfig;
use crate::device::DeviceContext;
use crate::mock::{context, MockCall, MockGpu, MockShaders};
use crate::targets::ShaderCode;
use frameloop_render::RenderSize;

fn transfer_config() -> PresentConfig {
    PresentConfig {
        image_usage: vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::TRANSFER_DST,
        ..PresentConfig::default()
    }
}

fn pixel_chain(
    ctx: &DeviceContext<MockGpu>,
    config: &PresentConfig,
    size: RenderSize,
) -> SwapchainChain<MockGpu> {
    let shaders = ShaderCode::load(&MockShaders::default()).unwrap();
    SwapchainChain::build(ctx, config, shaders, Box::new(PixelUpload::gradient()), size).unwrap()
}

fn copies(gpu: &MockGpu) -> Vec<(u64, u64)> {
    gpu.calls()
        .into_iter()
        .filter_map(|c| match c {
            MockCall::CopyBufferToImage { buffer, image, .. } => Some((buffer, image)),
            _ => None,
        })
        .collect()
}

fn props(types: &[vk::MemoryPropertyFlags]) -> vk::PhysicalDeviceMemoryProperties {
    let mut props = vk::PhysicalDeviceMemoryProperties {
        memory_type_count: types.len() as u32,
        ..Default::default()
    };
    for (slot, &flags) in props.memory_types.iter_mut().zip(types) {
        slot.property_flags = flags;
    }
    props
}

#[test]
fn memory_type_must_be_allowed_and_have_every_flag() {
    let host = vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT;
    let p = props(&[
        vk::MemoryPropertyFlags::DEVICE_LOCAL,
        vk::MemoryPropertyFlags::HOST_VISIBLE,
        host | vk::MemoryPropertyFlags::HOST_CACHED,
        host,
    ]);
    assert_eq!(find_memory_type(&p, 0b1111, host), Some(2));
    assert_eq!(find_memory_type(&p, 0b1011, host), Some(3));
    assert_eq!(find_memory_type(&p, 0b0011, host), None);
    assert_eq!(
        find_memory_type(&p, u32::MAX, vk::MemoryPropertyFlags::DEVICE_LOCAL),
        Some(0)
    );

    // Entries past the reported count do not exist.
    let mut p = p;
    p.memory_type_count = 2;
    assert_eq!(find_memory_type(&p, u32::MAX, host), None);
}

#[test]
fn only_eight_bit_rgba_layouts_are_fillable() {
    assert_eq!(bytes_per_pixel(vk::Format::B8G8R8A8_UNORM), Some(4));
    assert_eq!(bytes_per_pixel(vk::Format::R8G8B8A8_SRGB), Some(4));
    assert_eq!(bytes_per_pixel(vk::Format::A2B10G10R10_UNORM_PACK32), None);
    assert_eq!(bytes_per_pixel(vk::Format::R16G16B16A16_SFLOAT), None);
}

#[test]
fn gradient_writes_channels_in_format_order() {
    let extent = vk::Extent2D {
        width: 2,
        height: 2,
    };
    let mut upload = PixelUpload::gradient();

    let mut bgra = vec![0u8; 16];
    (upload.fill)(extent, vk::Format::B8G8R8A8_UNORM, &mut bgra);
    let mut rgba = vec![0u8; 16];
    (upload.fill)(extent, vk::Format::R8G8B8A8_UNORM, &mut rgba);

    // Second texel of the first row: red ramps across.
    assert_eq!(&bgra[4..8], &[96, 0, 127, 255]);
    assert_eq!(&rgba[4..8], &[127, 0, 96, 255]);
    // First texel of the second row: green ramps down.
    assert_eq!(&rgba[8..12], &[0, 127, 96, 255]);
}

#[test]
fn records_one_copy_per_image_with_transfer_dst() {
    let gpu = MockGpu::new();
    let ctx = context(&gpu);
    let baseline = gpu.live_count();
    let mut chain = pixel_chain(&ctx, &transfer_config(), RenderSize::new(640, 480));

    gpu.clear_calls();
    chain.record_all(&ctx).unwrap();

    let images = chain.swapchain().unwrap().images().to_vec();
    let copies = copies(&gpu);
    assert_eq!(copies.len(), images.len());
    let buffer = copies[0].0;
    assert!(copies.iter().all(|&(b, _)| b == buffer));
    let copied: Vec<u64> = copies.iter().map(|&(_, image)| image).collect();
    let expected: Vec<u64> = images.iter().map(|i| i.as_raw()).collect();
    assert_eq!(copied, expected);

    let calls = gpu.calls();
    let transitions = calls
        .iter()
        .filter(|c| matches!(c, MockCall::Transition { .. }))
        .count();
    assert_eq!(transitions, 2 * images.len());
    assert!(!calls.iter().any(|c| matches!(c, MockCall::Draw { .. })));
    assert!(calls.contains(&MockCall::WriteMemory {
        memory: calls
            .iter()
            .find_map(|c| match c {
                MockCall::Create(ResourceKind::DeviceMemory, h) => Some(*h),
                _ => None,
            })
            .unwrap(),
        len: 640 * 480 * 4,
    }));

    // Each image leaves its copy ready to present.
    let first_image = images[0].as_raw();
    let layouts: Vec<_> = calls
        .iter()
        .filter_map(|c| match c {
            MockCall::Transition { image, from, to } if *image == first_image => Some((*from, *to)),
            _ => None,
        })
        .collect();
    assert_eq!(
        layouts,
        vec![
            (vk::ImageLayout::UNDEFINED, vk::ImageLayout::TRANSFER_DST_OPTIMAL),
            (vk::ImageLayout::TRANSFER_DST_OPTIMAL, vk::ImageLayout::PRESENT_SRC_KHR),
        ]
    );

    assert_eq!(gpu.live_of(ResourceKind::Buffer), 1);
    assert_eq!(gpu.live_of(ResourceKind::DeviceMemory), 1);
    chain.destroy(&ctx);
    assert_eq!(gpu.live_count(), baseline);
    assert!(gpu.violations().is_empty(), "{:?}", gpu.violations());
}

#[test]
fn images_without_transfer_dst_are_rejected() {
    let gpu = MockGpu::new();
    let ctx = context(&gpu);
    let baseline = gpu.live_count();
    let mut chain = pixel_chain(&ctx, &PresentConfig::default(), RenderSize::new(64, 64));

    let err = chain.record_all(&ctx).unwrap_err();
    assert!(matches!(err, PresentError::ContentSetup(_)), "{err}");
    assert_eq!(err.code(), -22);
    assert_eq!(gpu.created_of(ResourceKind::Buffer), 0);
    chain.destroy(&ctx);
    assert_eq!(gpu.live_count(), baseline);
}

#[test]
fn staging_failures_roll_back() {
    for kind in [ResourceKind::Buffer, ResourceKind::DeviceMemory] {
        let gpu = MockGpu::new();
        let ctx = context(&gpu);
        let baseline = gpu.live_count();
        let mut chain = pixel_chain(&ctx, &transfer_config(), RenderSize::new(64, 64));
        gpu.fail_create(kind, 0);

        let err = chain.record_all(&ctx).unwrap_err();
        assert!(
            matches!(err, PresentError::ResourceCreation { kind: k, .. } if k == kind),
            "{kind}: {err}"
        );
        assert_eq!(gpu.live_of(ResourceKind::Buffer), 0, "{kind}");
        assert_eq!(gpu.live_of(ResourceKind::DeviceMemory), 0, "{kind}");
        chain.destroy(&ctx);
        assert_eq!(gpu.live_count(), baseline, "{kind}");
        assert!(gpu.violations().is_empty(), "{kind}: {:?}", gpu.violations());
    }
}

#[test]
fn no_host_coherent_memory_releases_the_buffer() {
    let gpu = MockGpu::new();
    gpu.configure(|s| {
        s.memory_types = vec![
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
            vk::MemoryPropertyFlags::HOST_VISIBLE,
        ]
    });
    let ctx = context(&gpu);
    let mut chain = pixel_chain(&ctx, &transfer_config(), RenderSize::new(64, 64));

    let err = chain.record_all(&ctx).unwrap_err();
    assert!(matches!(err, PresentError::ContentSetup(_)), "{err}");
    assert_eq!(gpu.created_of(ResourceKind::Buffer), 1);
    assert_eq!(gpu.live_of(ResourceKind::Buffer), 0);
    assert_eq!(gpu.created_of(ResourceKind::DeviceMemory), 0);
    chain.destroy(&ctx);
}

#[test]
fn staging_follows_the_swapchain_extent() {
    let gpu = MockGpu::new();
    let ctx = context(&gpu);
    let baseline = gpu.live_count();
    let mut chain = pixel_chain(&ctx, &transfer_config(), RenderSize::new(64, 64));
    chain.record_all(&ctx).unwrap();
    assert_eq!(gpu.created_of(ResourceKind::Buffer), 1);

    // Same extent: the buffer is kept.
    chain.recreate(&ctx, RenderSize::new(64, 64)).unwrap();
    assert_eq!(gpu.created_of(ResourceKind::Buffer), 1);
    assert_eq!(gpu.live_of(ResourceKind::Buffer), 1);

    // New extent: the old buffer and memory go before the new ones exist.
    gpu.clear_calls();
    assert_eq!(
        chain.recreate(&ctx, RenderSize::new(128, 32)).unwrap(),
        ChainState::Stable
    );
    let calls = gpu.calls();
    let freed = calls
        .iter()
        .position(|c| matches!(c, MockCall::Destroy(ResourceKind::Buffer, _)))
        .unwrap();
    let created = calls
        .iter()
        .position(|c| matches!(c, MockCall::Create(ResourceKind::Buffer, _)))
        .unwrap();
    assert!(freed < created);
    assert!(calls.contains(&MockCall::WriteMemory {
        memory: calls
            .iter()
            .find_map(|c| match c {
                MockCall::Create(ResourceKind::DeviceMemory, h) => Some(*h),
                _ => None,
            })
            .unwrap(),
        len: 128 * 32 * 4,
    }));
    assert_eq!(gpu.live_of(ResourceKind::Buffer), 1);
    assert_eq!(gpu.live_of(ResourceKind::DeviceMemory), 1);

    chain.destroy(&ctx);
    assert_eq!(gpu.live_count(), baseline);
    assert!(gpu.violations().is_empty(), "{:?}", gpu.violations());
}
