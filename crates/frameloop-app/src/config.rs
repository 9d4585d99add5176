// SPDX-License-Identifier: CEPL-1.0
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use frameloop_platform::WindowOptions;
use frameloop_render::RenderSize;
use frameloop_vk::{vk, PresentConfig, DEFAULT_FRAMES_IN_FLIGHT, DEFAULT_PREFERRED_IMAGE_COUNT};
use serde::Deserialize;
use tracing::info;

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct WindowCfg {
    pub width: u32,
    pub height: u32,
    pub title: String,
    pub fullscreen: bool,
}

impl Default for WindowCfg {
    fn default() -> Self {
        WindowCfg {
            width: 1280,
            height: 720,
            title: "frameloop".to_string(),
            fullscreen: false,
        }
    }
}

/// What each swapchain image shows.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    /// A triangle drawn over `clear_color`.
    #[default]
    Triangle,
    /// A host-generated gradient copied into the images; needs `transfer_dst`.
    Pixels,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct RenderCfg {
    pub frames_in_flight: usize,
    pub preferred_image_count: u32,
    /// `None` follows the build profile.
    pub validation: Option<bool>,
    pub clear_color: [f32; 4],
    /// Also allow transfers into swapchain images.
    pub transfer_dst: bool,
    pub content: ContentKind,
    /// Directory holding `present.vert.spv` and `present.frag.spv`. Without it
    /// the embedded shaders are used when the build compiled them.
    pub shader_dir: Option<PathBuf>,
}

impl Default for RenderCfg {
    fn default() -> Self {
        RenderCfg {
            frames_in_flight: DEFAULT_FRAMES_IN_FLIGHT,
            preferred_image_count: DEFAULT_PREFERRED_IMAGE_COUNT,
            validation: None,
            clear_color: default_clear(),
            transfer_dst: false,
            content: ContentKind::Triangle,
            shader_dir: None,
        }
    }
}

fn default_clear() -> [f32; 4] {
    [0.02, 0.02, 0.04, 1.0]
}

#[derive(Debug, Deserialize, Default, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct AppCfg {
    pub window: WindowCfg,
    pub render: RenderCfg,
}

impl AppCfg {
    pub fn parse(text: &str) -> Result<Self> {
        let cfg: AppCfg = toml::from_str(text).context("invalid configuration")?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// A missing file yields the defaults; an unreadable or malformed one is an error.
    pub fn load(path: &Path) -> Result<Self> {
        match fs::read_to_string(path) {
            Ok(text) => {
                let cfg = Self::parse(&text).with_context(|| format!("in {}", path.display()))?;
                info!("loaded {}", path.display());
                Ok(cfg)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                info!("{} not found, using defaults", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(e).with_context(|| format!("failed to read {}", path.display())),
        }
    }

    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            self.render.frames_in_flight >= 1,
            "render.frames_in_flight must be at least 1"
        );
        anyhow::ensure!(
            self.render.preferred_image_count >= 1,
            "render.preferred_image_count must be at least 1"
        );
        anyhow::ensure!(
            !self.window.title.is_empty(),
            "window.title must not be empty"
        );
        anyhow::ensure!(
            self.render.content != ContentKind::Pixels || self.render.transfer_dst,
            "render.content = \"pixels\" requires render.transfer_dst = true"
        );
        Ok(())
    }

    pub fn present_config(&self) -> PresentConfig {
        let mut image_usage = vk::ImageUsageFlags::COLOR_ATTACHMENT;
        if self.render.transfer_dst {
            image_usage |= vk::ImageUsageFlags::TRANSFER_DST;
        }
        PresentConfig {
            frames_in_flight: self.render.frames_in_flight,
            preferred_image_count: self.render.preferred_image_count,
            validation: self.render.validation.unwrap_or(cfg!(debug_assertions)),
            image_usage,
        }
    }

    pub fn window_options(&self) -> WindowOptions {
        WindowOptions {
            title: self.window.title.clone(),
            size: RenderSize::new(self.window.width, self.window.height),
            fullscreen: self.window.fullscreen,
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
