// SPDX-License-Identifier: CEPL-1.0
use super::*;
use crate::mock::{MockCall, MockGpu};

#[test]
fn unwind_releases_newest_first() {
    let gpu = MockGpu::new();
    let mut stack = TeardownStack::new();

    let pool = gpu.create_command_pool(0).unwrap();
    stack.push(Owned::CommandPool(pool));
    let sem = gpu.create_semaphore().unwrap();
    stack.push(Owned::Semaphore(sem));
    let fence = gpu.create_fence(true).unwrap();
    stack.push(Owned::Fence(fence));

    assert_eq!(
        stack.kinds(),
        vec![
            ResourceKind::CommandPool,
            ResourceKind::Semaphore,
            ResourceKind::Fence
        ]
    );

    gpu.clear_calls();
    stack.unwind_shared(&gpu);

    let kinds: Vec<_> = gpu
        .calls()
        .into_iter()
        .filter_map(|c| match c {
            MockCall::Destroy(k, _) => Some(k),
            _ => None,
        })
        .collect();
    assert_eq!(
        kinds,
        vec![
            ResourceKind::Fence,
            ResourceKind::Semaphore,
            ResourceKind::CommandPool
        ]
    );
    assert!(stack.is_empty());
    assert_eq!(gpu.live_count(), 0);
}

#[test]
fn second_unwind_is_noop() {
    let mut gpu = MockGpu::new();
    let mut stack = TeardownStack::new();
    let sem = gpu.create_semaphore().unwrap();
    stack.push(Owned::Semaphore(sem));

    stack.unwind(&mut gpu);
    let after_first = gpu.calls().len();
    stack.unwind(&mut gpu);

    assert_eq!(gpu.calls().len(), after_first);
    assert!(gpu.violations().is_empty());
}

#[test]
fn command_buffers_free_as_one_entry() {
    let gpu = MockGpu::new();
    let mut stack = TeardownStack::new();
    let pool = gpu.create_command_pool(0).unwrap();
    stack.push(Owned::CommandPool(pool));
    let buffers = gpu.allocate_command_buffers(pool, 3).unwrap();
    stack.push(Owned::CommandBuffers { pool, buffers });

    assert_eq!(stack.len(), 2);
    assert_eq!(gpu.live_of(ResourceKind::CommandBuffer), 3);

    stack.unwind_shared(&gpu);
    assert_eq!(gpu.live_count(), 0);
}

#[test]
fn instance_scope_entries_need_exclusive_unwind() {
    let mut gpu = MockGpu::new();
    let desc = crate::gpu::InstanceDesc {
        application_name: c"test",
        extensions: &[],
        layers: &[],
    };
    gpu.create_instance(&desc).unwrap();

    let mut stack = TeardownStack::new();
    stack.push(Owned::Instance);
    stack.unwind_shared(&gpu);
    // The shared path cannot destroy the instance; it logs and drops the entry.
    assert_eq!(gpu.live_of(ResourceKind::Instance), 1);

    stack.push(Owned::Instance);
    stack.unwind(&mut gpu);
    assert_eq!(gpu.live_of(ResourceKind::Instance), 0);
}
