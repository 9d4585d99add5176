// SPDX-License-Identifier: CEPL-1.0
//! Contracts between the presentation core and the collaborators it does not own:
//! the window that supplies framebuffer sizes and resize notifications, and the
//! asset loader that supplies shader bytecode.
use std::fmt;
use std::io;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RenderSize {
    pub width: u32,
    pub height: u32,
}

impl RenderSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// A minimized window reports a zero dimension; nothing can be presented to it.
    pub const fn is_zero_area(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl fmt::Display for RenderSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// What one call to [`WindowSignals::poll_events`] observed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WindowPoll {
    pub close_requested: bool,
    /// The framebuffer size changed since the previous poll.
    pub resized: bool,
}

pub trait WindowSignals {
    /// Drain pending window events without blocking.
    fn poll_events(&mut self) -> WindowPoll;

    /// Current framebuffer size in pixels.
    fn framebuffer_size(&self) -> RenderSize;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl ShaderStage {
    pub const ALL: [ShaderStage; 2] = [ShaderStage::Vertex, ShaderStage::Fragment];

    pub const fn name(&self) -> &'static str {
        match self {
            ShaderStage::Vertex => "vertex",
            ShaderStage::Fragment => "fragment",
        }
    }
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Supplies raw SPIR-V bytecode for each pipeline stage.
pub trait ShaderSource {
    fn load(&self, stage: ShaderStage) -> io::Result<Vec<u8>>;
}

impl<T: ShaderSource + ?Sized> ShaderSource for &T {
    fn load(&self, stage: ShaderStage) -> io::Result<Vec<u8>> {
        (**self).load(stage)
    }
}
