// SPDX-License-Identifier: CEPL-1.0
use super::*;
use std::collections::HashSet;

fn every_error() -> Vec<PresentError> {
    let mut all: Vec<PresentError> = ResourceKind::ALL
        .iter()
        .map(|&kind| PresentError::ResourceCreation {
            kind,
            result: vk::Result::ERROR_OUT_OF_HOST_MEMORY,
        })
        .collect();
    all.extend([
        PresentError::NoSuitableDevice,
        PresentError::NoSuitableQueueFamily,
        PresentError::SurfaceQueryFailure {
            query: SurfaceQuery::PhysicalDevices,
            result: Some(vk::Result::ERROR_INITIALIZATION_FAILED),
        },
        PresentError::SurfaceQueryFailure {
            query: SurfaceQuery::PresentSupport,
            result: Some(vk::Result::ERROR_SURFACE_LOST_KHR),
        },
        PresentError::SurfaceQueryFailure {
            query: SurfaceQuery::NoFormats,
            result: None,
        },
        PresentError::ContentSetup("swapchain images lack TRANSFER_DST usage"),
        PresentError::ShaderLoad {
            stage: ShaderStage::Vertex,
            source: io::Error::new(io::ErrorKind::NotFound, "missing"),
        },
        PresentError::Recording(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY),
    ]);
    for phase in [
        FramePhase::FenceWait,
        FramePhase::FenceReset,
        FramePhase::Acquire,
        FramePhase::Submit,
        FramePhase::Present,
        FramePhase::DeviceIdle,
    ] {
        all.push(PresentError::Frame {
            phase,
            result: vk::Result::ERROR_DEVICE_LOST,
        });
    }
    all.extend([
        PresentError::SurfaceOutOfDate,
        PresentError::SurfaceSuboptimal,
        PresentError::ZeroArea,
    ]);
    all
}

#[test]
fn codes_are_negative_and_distinct() {
    let errors = every_error();
    let codes: HashSet<i32> = errors.iter().map(PresentError::code).collect();
    assert_eq!(codes.len(), errors.len());
    assert!(codes.iter().all(|&c| c < 0));
}

#[test]
fn start_up_phases_are_numbered_in_order() {
    let code = |kind| {
        PresentError::ResourceCreation {
            kind,
            result: vk::Result::ERROR_UNKNOWN,
        }
        .code()
    };
    assert_eq!(code(ResourceKind::Instance), -1);
    assert_eq!(code(ResourceKind::Surface), -3);
    assert_eq!(PresentError::NoSuitableDevice.code(), -5);
    assert_eq!(PresentError::NoSuitableQueueFamily.code(), -7);
    assert!(code(ResourceKind::Device) > code(ResourceKind::CommandPool));
    assert!(code(ResourceKind::Swapchain) > code(ResourceKind::Fence));
    assert!(code(ResourceKind::Fence) > code(ResourceKind::Buffer));
}

#[test]
fn queue_family_selection_queries_precede_device_creation() {
    let query = |query| PresentError::SurfaceQueryFailure { query, result: None }.code();
    let device = PresentError::creation(ResourceKind::Device)(vk::Result::ERROR_UNKNOWN).code();
    let swapchain = PresentError::creation(ResourceKind::Swapchain)(vk::Result::ERROR_UNKNOWN).code();

    // Enumeration, then the device check, then per-family support, then the device.
    assert!(query(SurfaceQuery::PhysicalDevices) > PresentError::NoSuitableDevice.code());
    assert!(PresentError::NoSuitableDevice.code() > query(SurfaceQuery::PresentSupport));
    assert!(query(SurfaceQuery::PresentSupport) > PresentError::NoSuitableQueueFamily.code());
    assert!(PresentError::NoSuitableQueueFamily.code() > device);

    // The swapchain queries run right before swapchain creation.
    for q in [
        SurfaceQuery::Capabilities,
        SurfaceQuery::PresentModes,
        SurfaceQuery::Formats,
        SurfaceQuery::NoFormats,
    ] {
        assert_eq!(query(q), swapchain + 1, "{q:?}");
    }
}

#[test]
fn only_surface_conditions_are_recoverable() {
    for err in every_error() {
        let expected = matches!(
            err,
            PresentError::SurfaceOutOfDate | PresentError::SurfaceSuboptimal | PresentError::ZeroArea
        );
        assert_eq!(err.is_recoverable(), expected, "{err}");
    }
}

#[test]
fn messages_name_the_failing_object() {
    let err = PresentError::creation(ResourceKind::ImageView)(vk::Result::ERROR_OUT_OF_HOST_MEMORY);
    assert!(err.to_string().contains("image view"));
    assert_eq!(err.vk_result(), Some(vk::Result::ERROR_OUT_OF_HOST_MEMORY));

    let err = PresentError::SurfaceQueryFailure {
        query: SurfaceQuery::NoFormats,
        result: None,
    };
    assert_eq!(err.to_string(), "surface query failed: surface reports no formats");
    assert_eq!(err.vk_result(), None);
}
