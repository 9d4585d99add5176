// SPDX-License-Identifier: CEPL-1.0
use std::ffi::{c_void, CStr};

use ash::ext::debug_utils;
use ash::khr::{surface, swapchain};
use ash::prelude::VkResult;
use ash::{vk, Entry};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use tracing::{debug, error, info, warn};

use crate::gpu::{FrameSubmit, Gpu, InstanceDesc, PipelineDesc, SwapchainDesc};

const ENGINE_NAME: &CStr = c"frameloop";
const ENTRY_POINT: &CStr = c"main";

// Returned when a call needs an instance or device that does not exist yet.
const NOT_READY: vk::Result = vk::Result::ERROR_INITIALIZATION_FAILED;

struct InstanceFns {
    instance: ash::Instance,
    surface: surface::Instance,
    debug: Option<debug_utils::Instance>,
}

struct DeviceFns {
    device: ash::Device,
    swapchain: swapchain::Device,
}

/// Backend that talks to the Vulkan loader through `ash`.
pub struct AshGpu {
    entry: Entry,
    instance: Option<InstanceFns>,
    device: Option<DeviceFns>,
}

impl AshGpu {
    /// Load the system Vulkan loader.
    pub fn new() -> Result<Self, ash::LoadingError> {
        // SAFETY: the loader is kept alive by `entry` for as long as any function pointer from it is used.
        let entry = unsafe { Entry::load()? };
        Ok(Self {
            entry,
            instance: None,
            device: None,
        })
    }

    /// Instance extensions the window system needs for surface creation.
    pub fn surface_extensions(display: &dyn HasDisplayHandle) -> VkResult<Vec<&'static CStr>> {
        let dh = display
            .display_handle()
            .map_err(|_| vk::Result::ERROR_EXTENSION_NOT_PRESENT)?
            .as_raw();
        let names = ash_window::enumerate_required_extensions(dh)?;
        // SAFETY: ash-window returns pointers to static NUL-terminated strings.
        Ok(names.iter().map(|&p| unsafe { CStr::from_ptr(p) }).collect())
    }

    /// Create a presentation surface for a window. Needs a live instance, so it
    /// is meant to be called from the surface factory handed to
    /// `DeviceContext::initialize`.
    pub fn create_window_surface(
        &self,
        display: &dyn HasDisplayHandle,
        window: &dyn HasWindowHandle,
    ) -> VkResult<vk::SurfaceKHR> {
        let inst = self.inst()?;
        let dh = display
            .display_handle()
            .map_err(|_| vk::Result::ERROR_SURFACE_LOST_KHR)?
            .as_raw();
        let wh = window
            .window_handle()
            .map_err(|_| vk::Result::ERROR_SURFACE_LOST_KHR)?
            .as_raw();
        // SAFETY: both handles stay valid for the lifetime of the surface; the
        // caller destroys the surface before the window.
        unsafe { ash_window::create_surface(&self.entry, &inst.instance, dh, wh, None) }
    }

    fn inst(&self) -> VkResult<&InstanceFns> {
        self.instance.as_ref().ok_or(NOT_READY)
    }

    fn dev(&self) -> VkResult<&DeviceFns> {
        self.device.as_ref().ok_or(NOT_READY)
    }
}

unsafe extern "system" fn debug_callback(
    severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    _types: vk::DebugUtilsMessageTypeFlagsEXT,
    data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
    _user: *mut c_void,
) -> vk::Bool32 {
    if data.is_null() {
        return vk::FALSE;
    }
    // SAFETY: the layer passes a valid callback struct for the duration of the call.
    let msg = unsafe {
        let p = (*data).p_message;
        if p.is_null() {
            return vk::FALSE;
        }
        CStr::from_ptr(p).to_string_lossy()
    };
    if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
        error!("[vulkan] {msg}");
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
        warn!("[vulkan] {msg}");
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::INFO) {
        info!("[vulkan] {msg}");
    } else {
        debug!("[vulkan] {msg}");
    }
    vk::FALSE
}

impl Gpu for AshGpu {
    fn create_instance(&mut self, desc: &InstanceDesc<'_>) -> VkResult<vk::Instance> {
        let app_info = vk::ApplicationInfo {
            s_type: vk::StructureType::APPLICATION_INFO,
            p_application_name: desc.application_name.as_ptr(),
            application_version: 0,
            p_engine_name: ENGINE_NAME.as_ptr(),
            engine_version: 0,
            api_version: vk::API_VERSION_1_0,
            ..Default::default()
        };
        let exts: Vec<_> = desc.extensions.iter().map(|e| e.as_ptr()).collect();
        let layers: Vec<_> = desc.layers.iter().map(|l| l.as_ptr()).collect();
        let create_info = vk::InstanceCreateInfo {
            s_type: vk::StructureType::INSTANCE_CREATE_INFO,
            p_application_info: &app_info,
            enabled_extension_count: exts.len() as u32,
            pp_enabled_extension_names: exts.as_ptr(),
            enabled_layer_count: layers.len() as u32,
            pp_enabled_layer_names: layers.as_ptr(),
            ..Default::default()
        };
        // SAFETY: every pointer in `create_info` outlives the call.
        let instance = unsafe { self.entry.create_instance(&create_info, None)? };
        let handle = instance.handle();
        let surface = surface::Instance::new(&self.entry, &instance);
        self.instance = Some(InstanceFns {
            instance,
            surface,
            debug: None,
        });
        Ok(handle)
    }

    fn destroy_instance(&mut self) {
        if let Some(inst) = self.instance.take() {
            // SAFETY: every child object has been released by the teardown stack.
            unsafe { inst.instance.destroy_instance(None) };
        }
    }

    fn create_debug_messenger(&mut self) -> VkResult<vk::DebugUtilsMessengerEXT> {
        let entry = &self.entry;
        let inst = self.instance.as_mut().ok_or(NOT_READY)?;
        let loader = debug_utils::Instance::new(entry, &inst.instance);
        let ci = vk::DebugUtilsMessengerCreateInfoEXT {
            s_type: vk::StructureType::DEBUG_UTILS_MESSENGER_CREATE_INFO_EXT,
            message_severity: vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE
                | vk::DebugUtilsMessageSeverityFlagsEXT::INFO
                | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
            message_type: vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            pfn_user_callback: Some(debug_callback),
            ..Default::default()
        };
        // SAFETY: the instance was created with VK_EXT_debug_utils enabled.
        let messenger = unsafe { loader.create_debug_utils_messenger(&ci, None)? };
        inst.debug = Some(loader);
        Ok(messenger)
    }

    fn destroy_debug_messenger(&mut self, messenger: vk::DebugUtilsMessengerEXT) {
        if let Some(loader) = self.instance.as_mut().and_then(|i| i.debug.take()) {
            // SAFETY: `messenger` came from this loader.
            unsafe { loader.destroy_debug_utils_messenger(messenger, None) };
        }
    }

    fn destroy_surface(&self, surface: vk::SurfaceKHR) {
        if let Ok(inst) = self.inst() {
            // SAFETY: the swapchain built on this surface is already gone.
            unsafe { inst.surface.destroy_surface(surface, None) };
        }
    }

    fn enumerate_physical_devices(&self) -> VkResult<Vec<vk::PhysicalDevice>> {
        let inst = self.inst()?;
        // SAFETY: the instance is live.
        unsafe { inst.instance.enumerate_physical_devices() }
    }

    fn queue_family_properties(
        &self,
        physical: vk::PhysicalDevice,
    ) -> Vec<vk::QueueFamilyProperties> {
        match self.inst() {
            // SAFETY: `physical` was enumerated from this instance.
            Ok(inst) => unsafe {
                inst.instance
                    .get_physical_device_queue_family_properties(physical)
            },
            Err(_) => Vec::new(),
        }
    }

    fn surface_support(
        &self,
        physical: vk::PhysicalDevice,
        queue_family: u32,
        surface: vk::SurfaceKHR,
    ) -> VkResult<bool> {
        let inst = self.inst()?;
        unsafe {
            inst.surface
                .get_physical_device_surface_support(physical, queue_family, surface)
        }
    }

    fn surface_capabilities(
        &self,
        physical: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> VkResult<vk::SurfaceCapabilitiesKHR> {
        let inst = self.inst()?;
        unsafe {
            inst.surface
                .get_physical_device_surface_capabilities(physical, surface)
        }
    }

    fn surface_formats(
        &self,
        physical: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> VkResult<Vec<vk::SurfaceFormatKHR>> {
        let inst = self.inst()?;
        unsafe { inst.surface.get_physical_device_surface_formats(physical, surface) }
    }

    fn surface_present_modes(
        &self,
        physical: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> VkResult<Vec<vk::PresentModeKHR>> {
        let inst = self.inst()?;
        unsafe {
            inst.surface
                .get_physical_device_surface_present_modes(physical, surface)
        }
    }

    fn memory_properties(
        &self,
        physical: vk::PhysicalDevice,
    ) -> vk::PhysicalDeviceMemoryProperties {
        match self.inst() {
            // SAFETY: `physical` was enumerated from this instance.
            Ok(inst) => unsafe {
                inst.instance
                    .get_physical_device_memory_properties(physical)
            },
            Err(_) => vk::PhysicalDeviceMemoryProperties::default(),
        }
    }

    fn create_device(
        &mut self,
        physical: vk::PhysicalDevice,
        queue_family: u32,
    ) -> VkResult<vk::Device> {
        let inst = self.inst()?;
        let priorities = [1.0_f32];
        let qinfo = vk::DeviceQueueCreateInfo {
            s_type: vk::StructureType::DEVICE_QUEUE_CREATE_INFO,
            queue_family_index: queue_family,
            queue_count: 1,
            p_queue_priorities: priorities.as_ptr(),
            ..Default::default()
        };
        let device_exts = [swapchain::NAME.as_ptr()];
        let dinfo = vk::DeviceCreateInfo {
            s_type: vk::StructureType::DEVICE_CREATE_INFO,
            queue_create_info_count: 1,
            p_queue_create_infos: &qinfo,
            enabled_extension_count: device_exts.len() as u32,
            pp_enabled_extension_names: device_exts.as_ptr(),
            ..Default::default()
        };
        // SAFETY: `physical` belongs to this instance; pointers outlive the call.
        let device = unsafe { inst.instance.create_device(physical, &dinfo, None)? };
        let swapchain = swapchain::Device::new(&inst.instance, &device);
        let handle = device.handle();
        self.device = Some(DeviceFns { device, swapchain });
        Ok(handle)
    }

    fn destroy_device(&mut self) {
        if let Some(dev) = self.device.take() {
            // SAFETY: all device children have been released.
            unsafe { dev.device.destroy_device(None) };
        }
    }

    fn device_queue(&self, queue_family: u32) -> vk::Queue {
        match self.dev() {
            Ok(dev) => unsafe { dev.device.get_device_queue(queue_family, 0) },
            Err(_) => vk::Queue::null(),
        }
    }

    fn device_wait_idle(&self) -> VkResult<()> {
        let dev = self.dev()?;
        unsafe { dev.device.device_wait_idle() }
    }

    fn create_command_pool(&self, queue_family: u32) -> VkResult<vk::CommandPool> {
        let dev = self.dev()?;
        let info = vk::CommandPoolCreateInfo {
            s_type: vk::StructureType::COMMAND_POOL_CREATE_INFO,
            flags: vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER,
            queue_family_index: queue_family,
            ..Default::default()
        };
        unsafe { dev.device.create_command_pool(&info, None) }
    }

    fn destroy_command_pool(&self, pool: vk::CommandPool) {
        if let Ok(dev) = self.dev() {
            unsafe { dev.device.destroy_command_pool(pool, None) };
        }
    }

    fn allocate_command_buffers(
        &self,
        pool: vk::CommandPool,
        count: u32,
    ) -> VkResult<Vec<vk::CommandBuffer>> {
        let dev = self.dev()?;
        let info = vk::CommandBufferAllocateInfo {
            s_type: vk::StructureType::COMMAND_BUFFER_ALLOCATE_INFO,
            command_pool: pool,
            level: vk::CommandBufferLevel::PRIMARY,
            command_buffer_count: count,
            ..Default::default()
        };
        unsafe { dev.device.allocate_command_buffers(&info) }
    }

    fn free_command_buffers(&self, pool: vk::CommandPool, buffers: &[vk::CommandBuffer]) {
        if buffers.is_empty() {
            return;
        }
        if let Ok(dev) = self.dev() {
            unsafe { dev.device.free_command_buffers(pool, buffers) };
        }
    }

    fn create_swapchain(&self, desc: &SwapchainDesc) -> VkResult<vk::SwapchainKHR> {
        let dev = self.dev()?;
        let info = vk::SwapchainCreateInfoKHR {
            s_type: vk::StructureType::SWAPCHAIN_CREATE_INFO_KHR,
            surface: desc.surface,
            min_image_count: desc.image_count,
            image_format: desc.format.format,
            image_color_space: desc.format.color_space,
            image_extent: desc.extent,
            image_array_layers: 1,
            image_usage: desc.usage,
            image_sharing_mode: vk::SharingMode::EXCLUSIVE,
            pre_transform: desc.pre_transform,
            composite_alpha: vk::CompositeAlphaFlagsKHR::OPAQUE,
            present_mode: desc.present_mode,
            clipped: vk::TRUE,
            ..Default::default()
        };
        unsafe { dev.swapchain.create_swapchain(&info, None) }
    }

    fn destroy_swapchain(&self, swapchain: vk::SwapchainKHR) {
        if let Ok(dev) = self.dev() {
            unsafe { dev.swapchain.destroy_swapchain(swapchain, None) };
        }
    }

    fn swapchain_images(&self, swapchain: vk::SwapchainKHR) -> VkResult<Vec<vk::Image>> {
        let dev = self.dev()?;
        unsafe { dev.swapchain.get_swapchain_images(swapchain) }
    }

    fn create_image_view(&self, image: vk::Image, format: vk::Format) -> VkResult<vk::ImageView> {
        let dev = self.dev()?;
        let sub = vk::ImageSubresourceRange {
            aspect_mask: vk::ImageAspectFlags::COLOR,
            base_mip_level: 0,
            level_count: 1,
            base_array_layer: 0,
            layer_count: 1,
        };
        let info = vk::ImageViewCreateInfo {
            s_type: vk::StructureType::IMAGE_VIEW_CREATE_INFO,
            image,
            view_type: vk::ImageViewType::TYPE_2D,
            format,
            subresource_range: sub,
            ..Default::default()
        };
        unsafe { dev.device.create_image_view(&info, None) }
    }

    fn destroy_image_view(&self, view: vk::ImageView) {
        if let Ok(dev) = self.dev() {
            unsafe { dev.device.destroy_image_view(view, None) };
        }
    }

    fn create_render_pass(&self, color_format: vk::Format) -> VkResult<vk::RenderPass> {
        let dev = self.dev()?;
        let color_att = vk::AttachmentDescription {
            format: color_format,
            samples: vk::SampleCountFlags::TYPE_1,
            load_op: vk::AttachmentLoadOp::CLEAR,
            store_op: vk::AttachmentStoreOp::STORE,
            stencil_load_op: vk::AttachmentLoadOp::DONT_CARE,
            stencil_store_op: vk::AttachmentStoreOp::DONT_CARE,
            initial_layout: vk::ImageLayout::UNDEFINED,
            final_layout: vk::ImageLayout::PRESENT_SRC_KHR,
            ..Default::default()
        };
        let att_ref = vk::AttachmentReference {
            attachment: 0,
            layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        };
        let subpass = vk::SubpassDescription {
            pipeline_bind_point: vk::PipelineBindPoint::GRAPHICS,
            color_attachment_count: 1,
            p_color_attachments: &att_ref,
            ..Default::default()
        };
        // The acquire semaphore is waited at color output, so the layout
        // transition has to wait there too.
        let dependency = vk::SubpassDependency {
            src_subpass: vk::SUBPASS_EXTERNAL,
            dst_subpass: 0,
            src_stage_mask: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
            dst_stage_mask: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
            src_access_mask: vk::AccessFlags::empty(),
            dst_access_mask: vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
            ..Default::default()
        };
        let rp_info = vk::RenderPassCreateInfo {
            s_type: vk::StructureType::RENDER_PASS_CREATE_INFO,
            attachment_count: 1,
            p_attachments: &color_att,
            subpass_count: 1,
            p_subpasses: &subpass,
            dependency_count: 1,
            p_dependencies: &dependency,
            ..Default::default()
        };
        unsafe { dev.device.create_render_pass(&rp_info, None) }
    }

    fn destroy_render_pass(&self, render_pass: vk::RenderPass) {
        if let Ok(dev) = self.dev() {
            unsafe { dev.device.destroy_render_pass(render_pass, None) };
        }
    }

    fn create_shader_module(&self, code: &[u32]) -> VkResult<vk::ShaderModule> {
        let dev = self.dev()?;
        let info = vk::ShaderModuleCreateInfo {
            s_type: vk::StructureType::SHADER_MODULE_CREATE_INFO,
            p_code: code.as_ptr(),
            code_size: std::mem::size_of_val(code),
            ..Default::default()
        };
        unsafe { dev.device.create_shader_module(&info, None) }
    }

    fn destroy_shader_module(&self, module: vk::ShaderModule) {
        if let Ok(dev) = self.dev() {
            unsafe { dev.device.destroy_shader_module(module, None) };
        }
    }

    fn create_pipeline_layout(&self) -> VkResult<vk::PipelineLayout> {
        let dev = self.dev()?;
        let info = vk::PipelineLayoutCreateInfo {
            s_type: vk::StructureType::PIPELINE_LAYOUT_CREATE_INFO,
            ..Default::default()
        };
        unsafe { dev.device.create_pipeline_layout(&info, None) }
    }

    fn destroy_pipeline_layout(&self, layout: vk::PipelineLayout) {
        if let Ok(dev) = self.dev() {
            unsafe { dev.device.destroy_pipeline_layout(layout, None) };
        }
    }

    fn create_graphics_pipeline(&self, desc: &PipelineDesc) -> VkResult<vk::Pipeline> {
        let dev = self.dev()?;
        let stages = [
            vk::PipelineShaderStageCreateInfo {
                s_type: vk::StructureType::PIPELINE_SHADER_STAGE_CREATE_INFO,
                stage: vk::ShaderStageFlags::VERTEX,
                module: desc.vertex,
                p_name: ENTRY_POINT.as_ptr(),
                ..Default::default()
            },
            vk::PipelineShaderStageCreateInfo {
                s_type: vk::StructureType::PIPELINE_SHADER_STAGE_CREATE_INFO,
                stage: vk::ShaderStageFlags::FRAGMENT,
                module: desc.fragment,
                p_name: ENTRY_POINT.as_ptr(),
                ..Default::default()
            },
        ];

        // Vertices come from gl_VertexIndex.
        let vertex_input = vk::PipelineVertexInputStateCreateInfo {
            s_type: vk::StructureType::PIPELINE_VERTEX_INPUT_STATE_CREATE_INFO,
            ..Default::default()
        };
        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo {
            s_type: vk::StructureType::PIPELINE_INPUT_ASSEMBLY_STATE_CREATE_INFO,
            topology: vk::PrimitiveTopology::TRIANGLE_LIST,
            ..Default::default()
        };
        let viewport = vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: desc.extent.width as f32,
            height: desc.extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        };
        let scissor = vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent: desc.extent,
        };
        let viewport_state = vk::PipelineViewportStateCreateInfo {
            s_type: vk::StructureType::PIPELINE_VIEWPORT_STATE_CREATE_INFO,
            viewport_count: 1,
            p_viewports: &viewport,
            scissor_count: 1,
            p_scissors: &scissor,
            ..Default::default()
        };
        let raster = vk::PipelineRasterizationStateCreateInfo {
            s_type: vk::StructureType::PIPELINE_RASTERIZATION_STATE_CREATE_INFO,
            polygon_mode: vk::PolygonMode::FILL,
            cull_mode: vk::CullModeFlags::NONE,
            front_face: vk::FrontFace::CLOCKWISE,
            line_width: 1.0,
            ..Default::default()
        };
        let multisample = vk::PipelineMultisampleStateCreateInfo {
            s_type: vk::StructureType::PIPELINE_MULTISAMPLE_STATE_CREATE_INFO,
            rasterization_samples: vk::SampleCountFlags::TYPE_1,
            ..Default::default()
        };
        let color_blend_att = vk::PipelineColorBlendAttachmentState {
            color_write_mask: vk::ColorComponentFlags::RGBA,
            blend_enable: vk::FALSE,
            ..Default::default()
        };
        let color_blend = vk::PipelineColorBlendStateCreateInfo {
            s_type: vk::StructureType::PIPELINE_COLOR_BLEND_STATE_CREATE_INFO,
            attachment_count: 1,
            p_attachments: &color_blend_att,
            ..Default::default()
        };
        let pipeline_info = vk::GraphicsPipelineCreateInfo {
            s_type: vk::StructureType::GRAPHICS_PIPELINE_CREATE_INFO,
            stage_count: stages.len() as u32,
            p_stages: stages.as_ptr(),
            p_vertex_input_state: &vertex_input,
            p_input_assembly_state: &input_assembly,
            p_viewport_state: &viewport_state,
            p_rasterization_state: &raster,
            p_multisample_state: &multisample,
            p_color_blend_state: &color_blend,
            layout: desc.layout,
            render_pass: desc.render_pass,
            subpass: 0,
            ..Default::default()
        };
        let pipelines = unsafe {
            dev.device.create_graphics_pipelines(
                vk::PipelineCache::null(),
                std::slice::from_ref(&pipeline_info),
                None,
            )
        }
        .map_err(|(_, err)| err)?;
        pipelines
            .into_iter()
            .next()
            .ok_or(vk::Result::ERROR_UNKNOWN)
    }

    fn destroy_pipeline(&self, pipeline: vk::Pipeline) {
        if let Ok(dev) = self.dev() {
            unsafe { dev.device.destroy_pipeline(pipeline, None) };
        }
    }

    fn create_framebuffer(
        &self,
        render_pass: vk::RenderPass,
        view: vk::ImageView,
        extent: vk::Extent2D,
    ) -> VkResult<vk::Framebuffer> {
        let dev = self.dev()?;
        let fb_info = vk::FramebufferCreateInfo {
            s_type: vk::StructureType::FRAMEBUFFER_CREATE_INFO,
            render_pass,
            attachment_count: 1,
            p_attachments: &view,
            width: extent.width,
            height: extent.height,
            layers: 1,
            ..Default::default()
        };
        unsafe { dev.device.create_framebuffer(&fb_info, None) }
    }

    fn destroy_framebuffer(&self, framebuffer: vk::Framebuffer) {
        if let Ok(dev) = self.dev() {
            unsafe { dev.device.destroy_framebuffer(framebuffer, None) };
        }
    }

    fn create_semaphore(&self) -> VkResult<vk::Semaphore> {
        let dev = self.dev()?;
        let info = vk::SemaphoreCreateInfo {
            s_type: vk::StructureType::SEMAPHORE_CREATE_INFO,
            ..Default::default()
        };
        unsafe { dev.device.create_semaphore(&info, None) }
    }

    fn destroy_semaphore(&self, semaphore: vk::Semaphore) {
        if let Ok(dev) = self.dev() {
            unsafe { dev.device.destroy_semaphore(semaphore, None) };
        }
    }

    fn create_fence(&self, signaled: bool) -> VkResult<vk::Fence> {
        let dev = self.dev()?;
        let flags = if signaled {
            vk::FenceCreateFlags::SIGNALED
        } else {
            vk::FenceCreateFlags::empty()
        };
        let info = vk::FenceCreateInfo {
            s_type: vk::StructureType::FENCE_CREATE_INFO,
            flags,
            ..Default::default()
        };
        unsafe { dev.device.create_fence(&info, None) }
    }

    fn destroy_fence(&self, fence: vk::Fence) {
        if let Ok(dev) = self.dev() {
            unsafe { dev.device.destroy_fence(fence, None) };
        }
    }

    fn create_buffer(&self, size: u64, usage: vk::BufferUsageFlags) -> VkResult<vk::Buffer> {
        let dev = self.dev()?;
        let info = vk::BufferCreateInfo {
            s_type: vk::StructureType::BUFFER_CREATE_INFO,
            size,
            usage,
            sharing_mode: vk::SharingMode::EXCLUSIVE,
            ..Default::default()
        };
        unsafe { dev.device.create_buffer(&info, None) }
    }

    fn destroy_buffer(&self, buffer: vk::Buffer) {
        if let Ok(dev) = self.dev() {
            unsafe { dev.device.destroy_buffer(buffer, None) };
        }
    }

    fn buffer_memory_requirements(&self, buffer: vk::Buffer) -> vk::MemoryRequirements {
        match self.dev() {
            Ok(dev) => unsafe { dev.device.get_buffer_memory_requirements(buffer) },
            Err(_) => vk::MemoryRequirements::default(),
        }
    }

    fn allocate_memory(&self, size: u64, memory_type_index: u32) -> VkResult<vk::DeviceMemory> {
        let dev = self.dev()?;
        let info = vk::MemoryAllocateInfo {
            s_type: vk::StructureType::MEMORY_ALLOCATE_INFO,
            allocation_size: size,
            memory_type_index,
            ..Default::default()
        };
        unsafe { dev.device.allocate_memory(&info, None) }
    }

    fn free_memory(&self, memory: vk::DeviceMemory) {
        if let Ok(dev) = self.dev() {
            unsafe { dev.device.free_memory(memory, None) };
        }
    }

    fn bind_buffer_memory(&self, buffer: vk::Buffer, memory: vk::DeviceMemory) -> VkResult<()> {
        let dev = self.dev()?;
        unsafe { dev.device.bind_buffer_memory(buffer, memory, 0) }
    }

    fn write_memory(&self, memory: vk::DeviceMemory, data: &[u8]) -> VkResult<()> {
        let dev = self.dev()?;
        // SAFETY: the allocation is host visible, at least `data.len()` bytes and
        // not mapped elsewhere. Coherent memory needs no flush before unmapping.
        unsafe {
            let ptr = dev
                .device
                .map_memory(memory, 0, vk::WHOLE_SIZE, vk::MemoryMapFlags::empty())?;
            std::ptr::copy_nonoverlapping(data.as_ptr(), ptr.cast::<u8>(), data.len());
            dev.device.unmap_memory(memory);
        }
        Ok(())
    }

    fn wait_for_fence(&self, fence: vk::Fence, timeout: u64) -> VkResult<()> {
        let dev = self.dev()?;
        unsafe { dev.device.wait_for_fences(&[fence], true, timeout) }
    }

    fn reset_fence(&self, fence: vk::Fence) -> VkResult<()> {
        let dev = self.dev()?;
        unsafe { dev.device.reset_fences(&[fence]) }
    }

    fn acquire_next_image(
        &self,
        swapchain: vk::SwapchainKHR,
        timeout: u64,
        signal: vk::Semaphore,
    ) -> VkResult<(u32, bool)> {
        let dev = self.dev()?;
        unsafe {
            dev.swapchain
                .acquire_next_image(swapchain, timeout, signal, vk::Fence::null())
        }
    }

    fn queue_submit(&self, queue: vk::Queue, submit: &FrameSubmit) -> VkResult<()> {
        let dev = self.dev()?;
        let info = vk::SubmitInfo {
            s_type: vk::StructureType::SUBMIT_INFO,
            wait_semaphore_count: 1,
            p_wait_semaphores: &submit.wait,
            p_wait_dst_stage_mask: &submit.wait_stage,
            command_buffer_count: 1,
            p_command_buffers: &submit.command_buffer,
            signal_semaphore_count: 1,
            p_signal_semaphores: &submit.signal,
            ..Default::default()
        };
        unsafe {
            dev.device
                .queue_submit(queue, std::slice::from_ref(&info), submit.fence)
        }
    }

    fn queue_present(
        &self,
        queue: vk::Queue,
        swapchain: vk::SwapchainKHR,
        image_index: u32,
        wait: vk::Semaphore,
    ) -> VkResult<bool> {
        let dev = self.dev()?;
        let present = vk::PresentInfoKHR {
            s_type: vk::StructureType::PRESENT_INFO_KHR,
            wait_semaphore_count: 1,
            p_wait_semaphores: &wait,
            swapchain_count: 1,
            p_swapchains: &swapchain,
            p_image_indices: &image_index,
            ..Default::default()
        };
        unsafe { dev.swapchain.queue_present(queue, &present) }
    }

    fn begin_command_buffer(&self, command_buffer: vk::CommandBuffer) -> VkResult<()> {
        let dev = self.dev()?;
        let begin = vk::CommandBufferBeginInfo {
            s_type: vk::StructureType::COMMAND_BUFFER_BEGIN_INFO,
            ..Default::default()
        };
        unsafe { dev.device.begin_command_buffer(command_buffer, &begin) }
    }

    fn end_command_buffer(&self, command_buffer: vk::CommandBuffer) -> VkResult<()> {
        let dev = self.dev()?;
        unsafe { dev.device.end_command_buffer(command_buffer) }
    }

    fn cmd_begin_render_pass(
        &self,
        command_buffer: vk::CommandBuffer,
        render_pass: vk::RenderPass,
        framebuffer: vk::Framebuffer,
        extent: vk::Extent2D,
        clear: [f32; 4],
    ) {
        let Ok(dev) = self.dev() else { return };
        let clears = [vk::ClearValue {
            color: vk::ClearColorValue { float32: clear },
        }];
        let rp_begin = vk::RenderPassBeginInfo {
            s_type: vk::StructureType::RENDER_PASS_BEGIN_INFO,
            render_pass,
            framebuffer,
            render_area: vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent,
            },
            clear_value_count: clears.len() as u32,
            p_clear_values: clears.as_ptr(),
            ..Default::default()
        };
        unsafe {
            dev.device
                .cmd_begin_render_pass(command_buffer, &rp_begin, vk::SubpassContents::INLINE)
        };
    }

    fn cmd_bind_pipeline(&self, command_buffer: vk::CommandBuffer, pipeline: vk::Pipeline) {
        if let Ok(dev) = self.dev() {
            unsafe {
                dev.device
                    .cmd_bind_pipeline(command_buffer, vk::PipelineBindPoint::GRAPHICS, pipeline)
            };
        }
    }

    fn cmd_draw(&self, command_buffer: vk::CommandBuffer, vertex_count: u32, instance_count: u32) {
        if let Ok(dev) = self.dev() {
            unsafe {
                dev.device
                    .cmd_draw(command_buffer, vertex_count, instance_count, 0, 0)
            };
        }
    }

    fn cmd_end_render_pass(&self, command_buffer: vk::CommandBuffer) {
        if let Ok(dev) = self.dev() {
            unsafe { dev.device.cmd_end_render_pass(command_buffer) };
        }
    }

    fn cmd_transition_image(
        &self,
        command_buffer: vk::CommandBuffer,
        image: vk::Image,
        from: vk::ImageLayout,
        to: vk::ImageLayout,
    ) {
        let Ok(dev) = self.dev() else { return };
        let (src_stage, src_access_mask, dst_stage, dst_access_mask) = transition_masks(from, to);
        let barrier = vk::ImageMemoryBarrier {
            s_type: vk::StructureType::IMAGE_MEMORY_BARRIER,
            src_access_mask,
            dst_access_mask,
            old_layout: from,
            new_layout: to,
            src_queue_family_index: vk::QUEUE_FAMILY_IGNORED,
            dst_queue_family_index: vk::QUEUE_FAMILY_IGNORED,
            image,
            subresource_range: color_range(),
            ..Default::default()
        };
        unsafe {
            dev.device.cmd_pipeline_barrier(
                command_buffer,
                src_stage,
                dst_stage,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                std::slice::from_ref(&barrier),
            )
        };
    }

    fn cmd_copy_buffer_to_image(
        &self,
        command_buffer: vk::CommandBuffer,
        buffer: vk::Buffer,
        image: vk::Image,
        extent: vk::Extent2D,
    ) {
        let Ok(dev) = self.dev() else { return };
        let region = vk::BufferImageCopy {
            buffer_offset: 0,
            buffer_row_length: 0,
            buffer_image_height: 0,
            image_subresource: vk::ImageSubresourceLayers {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                mip_level: 0,
                base_array_layer: 0,
                layer_count: 1,
            },
            image_offset: vk::Offset3D { x: 0, y: 0, z: 0 },
            image_extent: vk::Extent3D {
                width: extent.width,
                height: extent.height,
                depth: 1,
            },
        };
        unsafe {
            dev.device.cmd_copy_buffer_to_image(
                command_buffer,
                buffer,
                image,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                std::slice::from_ref(&region),
            )
        };
    }
}

fn color_range() -> vk::ImageSubresourceRange {
    vk::ImageSubresourceRange {
        aspect_mask: vk::ImageAspectFlags::COLOR,
        base_mip_level: 0,
        level_count: 1,
        base_array_layer: 0,
        layer_count: 1,
    }
}

/// Stages and access masks around a layout change. The first transition of a
/// frame waits on colour output so it chains after the acquire semaphore.
fn transition_masks(
    from: vk::ImageLayout,
    to: vk::ImageLayout,
) -> (
    vk::PipelineStageFlags,
    vk::AccessFlags,
    vk::PipelineStageFlags,
    vk::AccessFlags,
) {
    match (from, to) {
        (vk::ImageLayout::UNDEFINED, vk::ImageLayout::TRANSFER_DST_OPTIMAL) => (
            vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
            vk::AccessFlags::empty(),
            vk::PipelineStageFlags::TRANSFER,
            vk::AccessFlags::TRANSFER_WRITE,
        ),
        (vk::ImageLayout::TRANSFER_DST_OPTIMAL, vk::ImageLayout::PRESENT_SRC_KHR) => (
            vk::PipelineStageFlags::TRANSFER,
            vk::AccessFlags::TRANSFER_WRITE,
            vk::PipelineStageFlags::BOTTOM_OF_PIPE,
            vk::AccessFlags::empty(),
        ),
        _ => (
            vk::PipelineStageFlags::ALL_COMMANDS,
            vk::AccessFlags::MEMORY_WRITE,
            vk::PipelineStageFlags::ALL_COMMANDS,
            vk::AccessFlags::MEMORY_READ | vk::AccessFlags::MEMORY_WRITE,
        ),
    }
}

impl Drop for AshGpu {
    fn drop(&mut self) {
        // Owners release everything first; this only catches a backend dropped mid-setup.
        if self.device.is_some() || self.instance.is_some() {
            warn!("AshGpu dropped with live instance or device; destroying");
        }
        self.destroy_device();
        self.destroy_instance();
    }
}
