// SPDX-License-Identifier: CEPL-1.0
//! Instrumented in-memory backend.
//!
//! `MockGpu` hands out fresh handles, logs every create/destroy in order,
//! tracks which objects are alive, can be told to fail the n-th creation of a
//! given kind, and simulates the GPU timeline closely enough to catch fence
//! misuse: a submission stays pending until its fence is waited on (or the
//! device is idled), and touching a pending command buffer is recorded as a
//! violation. Buffers and memory are sized, so host writes and bindings that
//! do not fit are violations too.
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::rc::Rc;

use ash::prelude::VkResult;
use ash::vk::{self, Handle};

use frameloop_render::{RenderSize, ShaderSource, ShaderStage, WindowPoll, WindowSignals};

use crate::error::ResourceKind;
use crate::gpu::{FrameSubmit, Gpu, InstanceDesc, PipelineDesc, SwapchainDesc};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MockCall {
    Create(ResourceKind, u64),
    Destroy(ResourceKind, u64),
    DeviceWaitIdle,
    WaitFence(u64),
    ResetFence(u64),
    Acquire { swapchain: u64, semaphore: u64 },
    Submit { command_buffer: u64, fence: u64 },
    Present { swapchain: u64, image_index: u32 },
    Begin(u64),
    End(u64),
    Draw { command_buffer: u64, vertex_count: u32 },
    WriteMemory { memory: u64, len: usize },
    Transition {
        image: u64,
        from: vk::ImageLayout,
        to: vk::ImageLayout,
    },
    CopyBufferToImage {
        command_buffer: u64,
        buffer: u64,
        image: u64,
    },
}

#[derive(Clone, Debug)]
pub struct MockQueueFamily {
    pub flags: vk::QueueFlags,
    pub queue_count: u32,
    pub present: bool,
}

impl MockQueueFamily {
    pub fn graphics_present() -> Self {
        Self {
            flags: vk::QueueFlags::GRAPHICS | vk::QueueFlags::TRANSFER,
            queue_count: 1,
            present: true,
        }
    }
}

#[derive(Debug)]
pub struct MockState {
    next_handle: u64,
    calls: Vec<MockCall>,
    live: BTreeMap<(ResourceKind, u64), ()>,
    created: HashMap<ResourceKind, usize>,
    failures: HashMap<(ResourceKind, usize), vk::Result>,
    instance: Option<u64>,
    device: Option<u64>,

    pub physical_devices: Vec<Vec<MockQueueFamily>>,
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    pub formats: Vec<vk::SurfaceFormatKHR>,
    pub present_modes: Vec<vk::PresentModeKHR>,
    pub acquire_script: VecDeque<VkResult<(u32, bool)>>,
    pub present_script: VecDeque<VkResult<bool>>,
    pub fail_submit: Option<vk::Result>,
    pub fail_record: Option<vk::Result>,
    /// One entry per memory type, in index order.
    pub memory_types: Vec<vk::MemoryPropertyFlags>,

    buffers: HashMap<u64, u64>,
    memories: HashMap<u64, (u64, u32)>,
    swapchains: HashMap<u64, SwapchainDesc>,
    last_swapchain: Option<SwapchainDesc>,
    next_image: u32,
    fences: HashMap<u64, bool>,
    pending: Vec<(u64, u64)>,
    violations: Vec<String>,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            next_handle: 0x1000,
            calls: Vec::new(),
            live: BTreeMap::new(),
            created: HashMap::new(),
            failures: HashMap::new(),
            instance: None,
            device: None,
            physical_devices: vec![vec![MockQueueFamily::graphics_present()]],
            capabilities: vk::SurfaceCapabilitiesKHR {
                min_image_count: 2,
                max_image_count: 8,
                current_extent: vk::Extent2D {
                    width: u32::MAX,
                    height: u32::MAX,
                },
                min_image_extent: vk::Extent2D {
                    width: 1,
                    height: 1,
                },
                max_image_extent: vk::Extent2D {
                    width: 4096,
                    height: 4096,
                },
                max_image_array_layers: 1,
                current_transform: vk::SurfaceTransformFlagsKHR::IDENTITY,
                ..Default::default()
            },
            formats: vec![vk::SurfaceFormatKHR {
                format: vk::Format::B8G8R8A8_UNORM,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            }],
            present_modes: vec![vk::PresentModeKHR::FIFO],
            acquire_script: VecDeque::new(),
            present_script: VecDeque::new(),
            fail_submit: None,
            fail_record: None,
            memory_types: vec![
                vk::MemoryPropertyFlags::DEVICE_LOCAL,
                vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
            ],
            buffers: HashMap::new(),
            memories: HashMap::new(),
            swapchains: HashMap::new(),
            last_swapchain: None,
            next_image: 0,
            fences: HashMap::new(),
            pending: Vec::new(),
            violations: Vec::new(),
        }
    }
}

impl MockState {
    fn create(&mut self, kind: ResourceKind) -> VkResult<u64> {
        let nth = self.created.entry(kind).or_insert(0);
        let index = *nth;
        *nth += 1;
        if let Some(result) = self.failures.remove(&(kind, index)) {
            return Err(result);
        }
        self.next_handle += 1;
        let raw = self.next_handle;
        self.live.insert((kind, raw), ());
        self.calls.push(MockCall::Create(kind, raw));
        Ok(raw)
    }

    fn destroy(&mut self, kind: ResourceKind, raw: u64) {
        if self.live.remove(&(kind, raw)).is_none() {
            self.violations
                .push(format!("destroyed {kind} {raw:#x} that is not alive"));
        }
        self.calls.push(MockCall::Destroy(kind, raw));
    }

    fn is_pending(&self, command_buffer: u64) -> bool {
        self.pending.iter().any(|&(cb, _)| cb == command_buffer)
    }
}

/// Cloning shares the underlying state, so a test can keep one clone for
/// inspection while the other is moved into the code under test.
#[derive(Clone, Debug, Default)]
pub struct MockGpu {
    state: Rc<RefCell<MockState>>,
}

impl MockGpu {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adjust the simulated driver before (or between) runs.
    pub fn configure(&self, f: impl FnOnce(&mut MockState)) {
        f(&mut self.state.borrow_mut());
    }

    /// Make the `nth` (0-based, counted from the start) creation of `kind` fail.
    pub fn fail_create(&self, kind: ResourceKind, nth: usize) {
        self.fail_create_with(kind, nth, vk::Result::ERROR_OUT_OF_DEVICE_MEMORY);
    }

    pub fn fail_create_with(&self, kind: ResourceKind, nth: usize, result: vk::Result) {
        self.state.borrow_mut().failures.insert((kind, nth), result);
    }

    /// Stands in for a window-system surface factory.
    pub fn create_surface(&self) -> VkResult<vk::SurfaceKHR> {
        let raw = self.state.borrow_mut().create(ResourceKind::Surface)?;
        Ok(vk::SurfaceKHR::from_raw(raw))
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.state.borrow().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.borrow_mut().calls.clear();
    }

    pub fn live_count(&self) -> usize {
        self.state.borrow().live.len()
    }

    pub fn live_of(&self, kind: ResourceKind) -> usize {
        self.state
            .borrow()
            .live
            .keys()
            .filter(|(k, _)| *k == kind)
            .count()
    }

    pub fn created_of(&self, kind: ResourceKind) -> usize {
        self.state
            .borrow()
            .calls
            .iter()
            .filter(|c| matches!(c, MockCall::Create(k, _) if *k == kind))
            .count()
    }

    pub fn violations(&self) -> Vec<String> {
        self.state.borrow().violations.clone()
    }

    pub fn last_swapchain(&self) -> Option<SwapchainDesc> {
        self.state.borrow().last_swapchain
    }
}

impl Gpu for MockGpu {
    fn create_instance(&mut self, _desc: &InstanceDesc<'_>) -> VkResult<vk::Instance> {
        let mut s = self.state.borrow_mut();
        let raw = s.create(ResourceKind::Instance)?;
        s.instance = Some(raw);
        Ok(vk::Instance::from_raw(raw))
    }

    fn destroy_instance(&mut self) {
        let mut s = self.state.borrow_mut();
        if let Some(raw) = s.instance.take() {
            s.destroy(ResourceKind::Instance, raw);
        }
    }

    fn create_debug_messenger(&mut self) -> VkResult<vk::DebugUtilsMessengerEXT> {
        let raw = self.state.borrow_mut().create(ResourceKind::DebugMessenger)?;
        Ok(vk::DebugUtilsMessengerEXT::from_raw(raw))
    }

    fn destroy_debug_messenger(&mut self, messenger: vk::DebugUtilsMessengerEXT) {
        self.state
            .borrow_mut()
            .destroy(ResourceKind::DebugMessenger, messenger.as_raw());
    }

    fn destroy_surface(&self, surface: vk::SurfaceKHR) {
        self.state
            .borrow_mut()
            .destroy(ResourceKind::Surface, surface.as_raw());
    }

    fn enumerate_physical_devices(&self) -> VkResult<Vec<vk::PhysicalDevice>> {
        let count = self.state.borrow().physical_devices.len();
        Ok((0..count)
            .map(|i| vk::PhysicalDevice::from_raw(i as u64 + 1))
            .collect())
    }

    fn queue_family_properties(
        &self,
        physical: vk::PhysicalDevice,
    ) -> Vec<vk::QueueFamilyProperties> {
        let s = self.state.borrow();
        s.physical_devices
            .get(physical.as_raw() as usize - 1)
            .map(|families| {
                families
                    .iter()
                    .map(|f| vk::QueueFamilyProperties {
                        queue_flags: f.flags,
                        queue_count: f.queue_count,
                        ..Default::default()
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    fn surface_support(
        &self,
        physical: vk::PhysicalDevice,
        queue_family: u32,
        _surface: vk::SurfaceKHR,
    ) -> VkResult<bool> {
        let s = self.state.borrow();
        Ok(s.physical_devices
            .get(physical.as_raw() as usize - 1)
            .and_then(|families| families.get(queue_family as usize))
            .is_some_and(|f| f.present))
    }

    fn surface_capabilities(
        &self,
        _physical: vk::PhysicalDevice,
        _surface: vk::SurfaceKHR,
    ) -> VkResult<vk::SurfaceCapabilitiesKHR> {
        Ok(self.state.borrow().capabilities)
    }

    fn surface_formats(
        &self,
        _physical: vk::PhysicalDevice,
        _surface: vk::SurfaceKHR,
    ) -> VkResult<Vec<vk::SurfaceFormatKHR>> {
        Ok(self.state.borrow().formats.clone())
    }

    fn surface_present_modes(
        &self,
        _physical: vk::PhysicalDevice,
        _surface: vk::SurfaceKHR,
    ) -> VkResult<Vec<vk::PresentModeKHR>> {
        Ok(self.state.borrow().present_modes.clone())
    }

    fn memory_properties(
        &self,
        _physical: vk::PhysicalDevice,
    ) -> vk::PhysicalDeviceMemoryProperties {
        let s = self.state.borrow();
        let mut props = vk::PhysicalDeviceMemoryProperties::default();
        for (slot, &flags) in props.memory_types.iter_mut().zip(&s.memory_types) {
            slot.property_flags = flags;
        }
        props.memory_type_count = s.memory_types.len().min(vk::MAX_MEMORY_TYPES) as u32;
        props
    }

    fn create_device(
        &mut self,
        _physical: vk::PhysicalDevice,
        _queue_family: u32,
    ) -> VkResult<vk::Device> {
        let mut s = self.state.borrow_mut();
        let raw = s.create(ResourceKind::Device)?;
        s.device = Some(raw);
        Ok(vk::Device::from_raw(raw))
    }

    fn destroy_device(&mut self) {
        let mut s = self.state.borrow_mut();
        if let Some(raw) = s.device.take() {
            s.destroy(ResourceKind::Device, raw);
        }
    }

    fn device_queue(&self, queue_family: u32) -> vk::Queue {
        vk::Queue::from_raw(0x100 + u64::from(queue_family))
    }

    fn device_wait_idle(&self) -> VkResult<()> {
        let mut s = self.state.borrow_mut();
        s.calls.push(MockCall::DeviceWaitIdle);
        let pending = std::mem::take(&mut s.pending);
        for (_, fence) in pending {
            s.fences.insert(fence, true);
        }
        Ok(())
    }

    fn create_command_pool(&self, _queue_family: u32) -> VkResult<vk::CommandPool> {
        let raw = self.state.borrow_mut().create(ResourceKind::CommandPool)?;
        Ok(vk::CommandPool::from_raw(raw))
    }

    fn destroy_command_pool(&self, pool: vk::CommandPool) {
        self.state
            .borrow_mut()
            .destroy(ResourceKind::CommandPool, pool.as_raw());
    }

    fn allocate_command_buffers(
        &self,
        _pool: vk::CommandPool,
        count: u32,
    ) -> VkResult<Vec<vk::CommandBuffer>> {
        let mut s = self.state.borrow_mut();
        let mut buffers = Vec::with_capacity(count as usize);
        for _ in 0..count {
            match s.create(ResourceKind::CommandBuffer) {
                Ok(raw) => buffers.push(raw),
                Err(e) => {
                    // vkAllocateCommandBuffers is all-or-nothing.
                    for &raw in buffers.iter().rev() {
                        s.live.remove(&(ResourceKind::CommandBuffer, raw));
                        s.calls.pop();
                    }
                    return Err(e);
                }
            }
        }
        Ok(buffers
            .into_iter()
            .map(vk::CommandBuffer::from_raw)
            .collect())
    }

    fn free_command_buffers(&self, _pool: vk::CommandPool, buffers: &[vk::CommandBuffer]) {
        let mut s = self.state.borrow_mut();
        for cb in buffers.iter().rev() {
            if s.is_pending(cb.as_raw()) {
                let msg = format!("freed command buffer {:#x} while pending", cb.as_raw());
                s.violations.push(msg);
            }
            s.destroy(ResourceKind::CommandBuffer, cb.as_raw());
        }
    }

    fn create_swapchain(&self, desc: &SwapchainDesc) -> VkResult<vk::SwapchainKHR> {
        let mut s = self.state.borrow_mut();
        let raw = s.create(ResourceKind::Swapchain)?;
        s.swapchains.insert(raw, *desc);
        s.last_swapchain = Some(*desc);
        s.next_image = 0;
        Ok(vk::SwapchainKHR::from_raw(raw))
    }

    fn destroy_swapchain(&self, swapchain: vk::SwapchainKHR) {
        let mut s = self.state.borrow_mut();
        s.swapchains.remove(&swapchain.as_raw());
        s.destroy(ResourceKind::Swapchain, swapchain.as_raw());
    }

    fn swapchain_images(&self, swapchain: vk::SwapchainKHR) -> VkResult<Vec<vk::Image>> {
        let s = self.state.borrow();
        let desc = s
            .swapchains
            .get(&swapchain.as_raw())
            .ok_or(vk::Result::ERROR_SURFACE_LOST_KHR)?;
        Ok((0..desc.image_count)
            .map(|i| vk::Image::from_raw((swapchain.as_raw() << 8) | u64::from(i)))
            .collect())
    }

    fn create_image_view(&self, _image: vk::Image, _format: vk::Format) -> VkResult<vk::ImageView> {
        let raw = self.state.borrow_mut().create(ResourceKind::ImageView)?;
        Ok(vk::ImageView::from_raw(raw))
    }

    fn destroy_image_view(&self, view: vk::ImageView) {
        self.state
            .borrow_mut()
            .destroy(ResourceKind::ImageView, view.as_raw());
    }

    fn create_render_pass(&self, _color_format: vk::Format) -> VkResult<vk::RenderPass> {
        let raw = self.state.borrow_mut().create(ResourceKind::RenderPass)?;
        Ok(vk::RenderPass::from_raw(raw))
    }

    fn destroy_render_pass(&self, render_pass: vk::RenderPass) {
        self.state
            .borrow_mut()
            .destroy(ResourceKind::RenderPass, render_pass.as_raw());
    }

    fn create_shader_module(&self, _code: &[u32]) -> VkResult<vk::ShaderModule> {
        let raw = self.state.borrow_mut().create(ResourceKind::ShaderModule)?;
        Ok(vk::ShaderModule::from_raw(raw))
    }

    fn destroy_shader_module(&self, module: vk::ShaderModule) {
        self.state
            .borrow_mut()
            .destroy(ResourceKind::ShaderModule, module.as_raw());
    }

    fn create_pipeline_layout(&self) -> VkResult<vk::PipelineLayout> {
        let raw = self.state.borrow_mut().create(ResourceKind::PipelineLayout)?;
        Ok(vk::PipelineLayout::from_raw(raw))
    }

    fn destroy_pipeline_layout(&self, layout: vk::PipelineLayout) {
        self.state
            .borrow_mut()
            .destroy(ResourceKind::PipelineLayout, layout.as_raw());
    }

    fn create_graphics_pipeline(&self, _desc: &PipelineDesc) -> VkResult<vk::Pipeline> {
        let raw = self.state.borrow_mut().create(ResourceKind::Pipeline)?;
        Ok(vk::Pipeline::from_raw(raw))
    }

    fn destroy_pipeline(&self, pipeline: vk::Pipeline) {
        self.state
            .borrow_mut()
            .destroy(ResourceKind::Pipeline, pipeline.as_raw());
    }

    fn create_framebuffer(
        &self,
        _render_pass: vk::RenderPass,
        _view: vk::ImageView,
        _extent: vk::Extent2D,
    ) -> VkResult<vk::Framebuffer> {
        let raw = self.state.borrow_mut().create(ResourceKind::Framebuffer)?;
        Ok(vk::Framebuffer::from_raw(raw))
    }

    fn destroy_framebuffer(&self, framebuffer: vk::Framebuffer) {
        self.state
            .borrow_mut()
            .destroy(ResourceKind::Framebuffer, framebuffer.as_raw());
    }

    fn create_semaphore(&self) -> VkResult<vk::Semaphore> {
        let raw = self.state.borrow_mut().create(ResourceKind::Semaphore)?;
        Ok(vk::Semaphore::from_raw(raw))
    }

    fn destroy_semaphore(&self, semaphore: vk::Semaphore) {
        self.state
            .borrow_mut()
            .destroy(ResourceKind::Semaphore, semaphore.as_raw());
    }

    fn create_fence(&self, signaled: bool) -> VkResult<vk::Fence> {
        let mut s = self.state.borrow_mut();
        let raw = s.create(ResourceKind::Fence)?;
        s.fences.insert(raw, signaled);
        Ok(vk::Fence::from_raw(raw))
    }

    fn destroy_fence(&self, fence: vk::Fence) {
        let mut s = self.state.borrow_mut();
        s.fences.remove(&fence.as_raw());
        s.destroy(ResourceKind::Fence, fence.as_raw());
    }

    fn create_buffer(&self, size: u64, _usage: vk::BufferUsageFlags) -> VkResult<vk::Buffer> {
        let mut s = self.state.borrow_mut();
        let raw = s.create(ResourceKind::Buffer)?;
        s.buffers.insert(raw, size);
        Ok(vk::Buffer::from_raw(raw))
    }

    fn destroy_buffer(&self, buffer: vk::Buffer) {
        let mut s = self.state.borrow_mut();
        s.buffers.remove(&buffer.as_raw());
        s.destroy(ResourceKind::Buffer, buffer.as_raw());
    }

    fn buffer_memory_requirements(&self, buffer: vk::Buffer) -> vk::MemoryRequirements {
        let s = self.state.borrow();
        let size = s.buffers.get(&buffer.as_raw()).copied().unwrap_or(0);
        vk::MemoryRequirements {
            size: size.next_multiple_of(256),
            alignment: 256,
            memory_type_bits: (1u32 << s.memory_types.len().min(31)) - 1,
        }
    }

    fn allocate_memory(&self, size: u64, memory_type_index: u32) -> VkResult<vk::DeviceMemory> {
        let mut s = self.state.borrow_mut();
        if memory_type_index as usize >= s.memory_types.len() {
            s.violations.push(format!(
                "allocated from memory type {memory_type_index} that does not exist"
            ));
        }
        let raw = s.create(ResourceKind::DeviceMemory)?;
        s.memories.insert(raw, (size, memory_type_index));
        Ok(vk::DeviceMemory::from_raw(raw))
    }

    fn free_memory(&self, memory: vk::DeviceMemory) {
        let mut s = self.state.borrow_mut();
        s.memories.remove(&memory.as_raw());
        s.destroy(ResourceKind::DeviceMemory, memory.as_raw());
    }

    fn bind_buffer_memory(&self, buffer: vk::Buffer, memory: vk::DeviceMemory) -> VkResult<()> {
        let mut s = self.state.borrow_mut();
        let needed = s.buffers.get(&buffer.as_raw()).copied();
        let have = s.memories.get(&memory.as_raw()).map(|&(size, _)| size);
        match (needed, have) {
            (Some(needed), Some(have)) if have >= needed => {}
            _ => s.violations.push(format!(
                "bound buffer {:#x} to memory {:#x} that cannot hold it",
                buffer.as_raw(),
                memory.as_raw()
            )),
        }
        Ok(())
    }

    fn write_memory(&self, memory: vk::DeviceMemory, data: &[u8]) -> VkResult<()> {
        let mut s = self.state.borrow_mut();
        let raw = memory.as_raw();
        s.calls.push(MockCall::WriteMemory {
            memory: raw,
            len: data.len(),
        });
        let host = vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT;
        match s.memories.get(&raw).copied() {
            None => s
                .violations
                .push(format!("wrote memory {raw:#x} that is not alive")),
            Some((size, _)) if (data.len() as u64) > size => s.violations.push(format!(
                "wrote {} bytes into memory {raw:#x} of {size}",
                data.len()
            )),
            Some((_, index)) => {
                let flags = s.memory_types.get(index as usize).copied().unwrap_or_default();
                if !flags.contains(host) {
                    s.violations
                        .push(format!("mapped memory {raw:#x} that is not host coherent"));
                }
            }
        }
        Ok(())
    }

    fn wait_for_fence(&self, fence: vk::Fence, _timeout: u64) -> VkResult<()> {
        let mut s = self.state.borrow_mut();
        let raw = fence.as_raw();
        s.calls.push(MockCall::WaitFence(raw));
        let signaled = s.fences.get(&raw).copied().unwrap_or(false);
        let has_work = s.pending.iter().any(|&(_, f)| f == raw);
        if !signaled && !has_work {
            // A real driver would block forever here.
            s.violations
                .push(format!("waited on unsignaled fence {raw:#x} with no work queued"));
        }
        s.pending.retain(|&(_, f)| f != raw);
        s.fences.insert(raw, true);
        Ok(())
    }

    fn reset_fence(&self, fence: vk::Fence) -> VkResult<()> {
        let mut s = self.state.borrow_mut();
        let raw = fence.as_raw();
        s.calls.push(MockCall::ResetFence(raw));
        if s.pending.iter().any(|&(_, f)| f == raw) {
            s.violations
                .push(format!("reset fence {raw:#x} while its submission is pending"));
        }
        s.fences.insert(raw, false);
        Ok(())
    }

    fn acquire_next_image(
        &self,
        swapchain: vk::SwapchainKHR,
        _timeout: u64,
        signal: vk::Semaphore,
    ) -> VkResult<(u32, bool)> {
        let mut s = self.state.borrow_mut();
        s.calls.push(MockCall::Acquire {
            swapchain: swapchain.as_raw(),
            semaphore: signal.as_raw(),
        });
        if let Some(scripted) = s.acquire_script.pop_front() {
            return scripted;
        }
        let count = s
            .swapchains
            .get(&swapchain.as_raw())
            .map(|d| d.image_count)
            .ok_or(vk::Result::ERROR_SURFACE_LOST_KHR)?;
        let index = s.next_image % count.max(1);
        s.next_image = s.next_image.wrapping_add(1);
        Ok((index, false))
    }

    fn queue_submit(&self, _queue: vk::Queue, submit: &FrameSubmit) -> VkResult<()> {
        let mut s = self.state.borrow_mut();
        let cb = submit.command_buffer.as_raw();
        let fence = submit.fence.as_raw();
        s.calls.push(MockCall::Submit {
            command_buffer: cb,
            fence,
        });
        if let Some(result) = s.fail_submit {
            return Err(result);
        }
        if s.fences.get(&fence).copied().unwrap_or(false) {
            s.violations
                .push(format!("submitted with fence {fence:#x} still signaled"));
        }
        if s.is_pending(cb) {
            s.violations.push(format!(
                "command buffer {cb:#x} resubmitted before its fence was observed"
            ));
        }
        s.pending.push((cb, fence));
        Ok(())
    }

    fn queue_present(
        &self,
        _queue: vk::Queue,
        swapchain: vk::SwapchainKHR,
        image_index: u32,
        _wait: vk::Semaphore,
    ) -> VkResult<bool> {
        let mut s = self.state.borrow_mut();
        s.calls.push(MockCall::Present {
            swapchain: swapchain.as_raw(),
            image_index,
        });
        s.present_script.pop_front().unwrap_or(Ok(false))
    }

    fn begin_command_buffer(&self, command_buffer: vk::CommandBuffer) -> VkResult<()> {
        let mut s = self.state.borrow_mut();
        let cb = command_buffer.as_raw();
        s.calls.push(MockCall::Begin(cb));
        if let Some(result) = s.fail_record {
            return Err(result);
        }
        if s.is_pending(cb) {
            s.violations
                .push(format!("recorded command buffer {cb:#x} while pending"));
        }
        Ok(())
    }

    fn end_command_buffer(&self, command_buffer: vk::CommandBuffer) -> VkResult<()> {
        self.state
            .borrow_mut()
            .calls
            .push(MockCall::End(command_buffer.as_raw()));
        Ok(())
    }

    fn cmd_begin_render_pass(
        &self,
        _command_buffer: vk::CommandBuffer,
        _render_pass: vk::RenderPass,
        _framebuffer: vk::Framebuffer,
        _extent: vk::Extent2D,
        _clear: [f32; 4],
    ) {
    }

    fn cmd_bind_pipeline(&self, _command_buffer: vk::CommandBuffer, _pipeline: vk::Pipeline) {}

    fn cmd_draw(&self, command_buffer: vk::CommandBuffer, vertex_count: u32, _instance_count: u32) {
        self.state.borrow_mut().calls.push(MockCall::Draw {
            command_buffer: command_buffer.as_raw(),
            vertex_count,
        });
    }

    fn cmd_end_render_pass(&self, _command_buffer: vk::CommandBuffer) {}

    fn cmd_transition_image(
        &self,
        _command_buffer: vk::CommandBuffer,
        image: vk::Image,
        from: vk::ImageLayout,
        to: vk::ImageLayout,
    ) {
        self.state.borrow_mut().calls.push(MockCall::Transition {
            image: image.as_raw(),
            from,
            to,
        });
    }

    fn cmd_copy_buffer_to_image(
        &self,
        command_buffer: vk::CommandBuffer,
        buffer: vk::Buffer,
        image: vk::Image,
        _extent: vk::Extent2D,
    ) {
        let mut s = self.state.borrow_mut();
        if !s.buffers.contains_key(&buffer.as_raw()) {
            s.violations
                .push(format!("copied from buffer {:#x} that is not alive", buffer.as_raw()));
        }
        s.calls.push(MockCall::CopyBufferToImage {
            command_buffer: command_buffer.as_raw(),
            buffer: buffer.as_raw(),
            image: image.as_raw(),
        });
    }
}

/// Serves a minimal valid SPIR-V header for every stage, except `missing`.
#[derive(Clone, Copy, Debug, Default)]
pub struct MockShaders {
    pub missing: Option<ShaderStage>,
}

impl ShaderSource for MockShaders {
    fn load(&self, stage: ShaderStage) -> std::io::Result<Vec<u8>> {
        if self.missing == Some(stage) {
            return Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no {stage} shader"),
            ));
        }
        let words: [u32; 5] = [0x0723_0203, 0x0001_0000, 0, 1, 0];
        Ok(words.iter().flat_map(|w| w.to_le_bytes()).collect())
    }
}

/// Scripted window: resize it between ticks, or let it ask to close after a
/// number of polls.
#[derive(Clone, Debug, Default)]
pub struct MockWindow {
    pub size: RenderSize,
    pub resized: bool,
    pub close_after: Option<usize>,
    pub polls: usize,
}

impl MockWindow {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            size: RenderSize::new(width, height),
            ..Default::default()
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.size = RenderSize::new(width, height);
        self.resized = true;
    }
}

impl WindowSignals for MockWindow {
    fn poll_events(&mut self) -> WindowPoll {
        self.polls += 1;
        WindowPoll {
            close_requested: self.close_after.is_some_and(|n| self.polls > n),
            resized: std::mem::take(&mut self.resized),
        }
    }

    fn framebuffer_size(&self) -> RenderSize {
        self.size
    }
}

/// A device context over `gpu` with validation off.
#[cfg(test)]
pub(crate) fn context(gpu: &MockGpu) -> crate::DeviceContext<MockGpu> {
    let config = crate::PresentConfig {
        validation: false,
        ..Default::default()
    };
    crate::DeviceContext::initialize(gpu.clone(), &config, &[], |g| g.create_surface())
        .expect("mock device context")
}
