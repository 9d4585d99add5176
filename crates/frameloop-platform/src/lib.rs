// SPDX-License-Identifier: CEPL-1.0
#![deny(unsafe_op_in_unsafe_fn)]
//! Desktop window for the presentation loop.
//!
//! winit normally owns the thread through `run_app`; here the event loop is
//! pumped once per loop iteration instead, so the caller keeps control of the
//! frame cadence and only sees [`WindowSignals`].
use std::mem;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use frameloop_render::{RenderSize, WindowPoll, WindowSignals};
use raw_window_handle::{
    DisplayHandle, HandleError, HasDisplayHandle, HasWindowHandle, WindowHandle,
};
use tracing::{debug, info, warn};
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::platform::pump_events::{EventLoopExtPumpEvents, PumpStatus};
use winit::window::{Fullscreen, Window, WindowId};

/// How long `open` waits per pump while the platform brings the window up.
const OPEN_PUMP: Duration = Duration::from_millis(10);
const OPEN_ATTEMPTS: u32 = 500;

#[derive(Clone, Debug)]
pub struct WindowOptions {
    pub title: String,
    pub size: RenderSize,
    /// Borderless fullscreen on the current monitor. Fullscreen windows are
    /// not resizable.
    pub fullscreen: bool,
}

impl Default for WindowOptions {
    fn default() -> Self {
        Self {
            title: "frameloop".to_string(),
            size: RenderSize::new(1280, 720),
            fullscreen: false,
        }
    }
}

pub struct DesktopWindow {
    // Dropped before the event loop.
    state: WindowState,
    event_loop: EventLoop<()>,
}

impl DesktopWindow {
    /// Create the event loop and pump it until the window exists.
    pub fn open(options: WindowOptions) -> Result<Self> {
        let mut event_loop = EventLoop::new().context("failed to create winit EventLoop")?;
        let mut state = WindowState::new(options);

        for _ in 0..OPEN_ATTEMPTS {
            let status = event_loop.pump_app_events(Some(OPEN_PUMP), &mut state);
            if let Some(err) = state.error.take() {
                return Err(err);
            }
            if state.window.is_some() {
                // Events seen while opening are not a resize.
                state.resized = false;
                return Ok(Self { state, event_loop });
            }
            if let PumpStatus::Exit(code) = status {
                return Err(anyhow!("event loop exited with {code} before the window opened"));
            }
        }
        Err(anyhow!("window did not open after {OPEN_ATTEMPTS} event pumps"))
    }

    pub fn window(&self) -> Option<&Window> {
        self.state.window.as_ref()
    }
}

impl WindowSignals for DesktopWindow {
    fn poll_events(&mut self) -> WindowPoll {
        if let PumpStatus::Exit(code) = self
            .event_loop
            .pump_app_events(Some(Duration::ZERO), &mut self.state)
        {
            debug!("event loop exited ({code})");
            self.state.close_requested = true;
        }
        self.state.take_poll()
    }

    fn framebuffer_size(&self) -> RenderSize {
        self.state.size
    }
}

impl HasDisplayHandle for DesktopWindow {
    fn display_handle(&self) -> Result<DisplayHandle<'_>, HandleError> {
        self.state
            .window
            .as_ref()
            .ok_or(HandleError::Unavailable)?
            .display_handle()
    }
}

impl HasWindowHandle for DesktopWindow {
    fn window_handle(&self) -> Result<WindowHandle<'_>, HandleError> {
        self.state
            .window
            .as_ref()
            .ok_or(HandleError::Unavailable)?
            .window_handle()
    }
}

struct WindowState {
    options: WindowOptions,
    window: Option<Window>,
    size: RenderSize,
    resized: bool,
    close_requested: bool,
    error: Option<anyhow::Error>,
}

impl WindowState {
    fn new(options: WindowOptions) -> Self {
        Self {
            size: options.size,
            options,
            window: None,
            resized: false,
            close_requested: false,
            error: None,
        }
    }

    /// Returns whether the size actually changed.
    fn record_resize(&mut self, size: RenderSize) -> bool {
        if size == self.size {
            return false;
        }
        debug!("resized {} -> {}", self.size, size);
        self.size = size;
        self.resized = true;
        true
    }

    fn take_poll(&mut self) -> WindowPoll {
        WindowPoll {
            close_requested: self.close_requested,
            resized: mem::take(&mut self.resized),
        }
    }

    fn create_window(&self, event_loop: &ActiveEventLoop) -> Result<Window> {
        let opts = &self.options;
        let mut attrs = Window::default_attributes()
            .with_title(opts.title.clone())
            .with_inner_size(PhysicalSize::new(opts.size.width, opts.size.height));
        if opts.fullscreen {
            attrs = attrs
                .with_fullscreen(Some(Fullscreen::Borderless(None)))
                .with_resizable(false);
        }
        event_loop
            .create_window(attrs)
            .context("failed to create window")
    }
}

impl ApplicationHandler for WindowState {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        event_loop.set_control_flow(ControlFlow::Poll);
        if self.window.is_some() {
            return;
        }
        match self.create_window(event_loop) {
            Ok(window) => {
                let size = window.inner_size();
                self.size = RenderSize::new(size.width, size.height);
                info!(
                    "window \"{}\" opened at {} (fullscreen={})",
                    self.options.title, self.size, self.options.fullscreen
                );
                self.window = Some(window);
            }
            Err(e) => {
                self.error = Some(e);
                event_loop.exit();
            }
        }
    }

    fn window_event(
        &mut self,
        _event_loop: &ActiveEventLoop,
        window_id: WindowId,
        event: WindowEvent,
    ) {
        if let Some(window) = &self.window {
            if window_id != window.id() {
                return;
            }
        }

        match event {
            WindowEvent::CloseRequested => {
                info!("CloseRequested");
                self.close_requested = true;
            }
            WindowEvent::Resized(new_size) => {
                self.record_resize(RenderSize::new(new_size.width, new_size.height));
            }
            WindowEvent::Destroyed => {
                warn!("window destroyed by the platform");
                self.close_requested = true;
            }
            _ => {}
        }
    }
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
