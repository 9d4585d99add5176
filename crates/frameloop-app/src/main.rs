// SPDX-License-Identifier: CEPL-1.0
#![deny(unsafe_op_in_unsafe_fn)]
use std::fmt;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use frameloop_core::init_tracing;
use frameloop_platform::DesktopWindow;
use frameloop_vk::{
    vk, AshGpu, ContentRecorder, PixelUpload, PresentError, Presenter, ResourceKind, Triangle,
};
use tracing::{error, info};

mod config;
mod shaders;

use config::{AppCfg, ContentKind};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// TOML configuration; a missing file means defaults
    #[arg(long, default_value = "frameloop.toml")]
    config: PathBuf,
    /// Enable the Vulkan validation layer
    #[arg(long, conflicts_with = "no_validation")]
    validation: bool,
    /// Disable the Vulkan validation layer
    #[arg(long)]
    no_validation: bool,
    /// Borderless fullscreen
    #[arg(long)]
    fullscreen: bool,
    #[arg(long)]
    frames_in_flight: Option<usize>,
    /// Directory with present.vert.spv and present.frag.spv
    #[arg(long)]
    shader_dir: Option<PathBuf>,
}

/// Failures outside the presentation core, tagged for the exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Config,
    Window,
}

impl Stage {
    const fn exit_code(self) -> u8 {
        match self {
            Stage::Config => 64,
            Stage::Window => 69,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Config => "bad configuration",
            Stage::Window => "window unavailable",
        })
    }
}

fn exit_code(err: &anyhow::Error) -> u8 {
    if let Some(e) = err.downcast_ref::<PresentError>() {
        return u8::try_from(e.code().unsigned_abs()).unwrap_or(1);
    }
    err.downcast_ref::<Stage>().map_or(1, |s| s.exit_code())
}

fn apply_overrides(cfg: &mut AppCfg, args: &Args) {
    if args.validation {
        cfg.render.validation = Some(true);
    }
    if args.no_validation {
        cfg.render.validation = Some(false);
    }
    if args.fullscreen {
        cfg.window.fullscreen = true;
    }
    if let Some(n) = args.frames_in_flight {
        cfg.render.frames_in_flight = n;
    }
    if let Some(dir) = &args.shader_dir {
        cfg.render.shader_dir = Some(dir.clone());
    }
}

fn content(cfg: &AppCfg) -> Box<dyn ContentRecorder<AshGpu>> {
    match cfg.render.content {
        ContentKind::Triangle => Box::new(Triangle {
            clear: cfg.render.clear_color,
        }),
        ContentKind::Pixels => Box::new(PixelUpload::gradient()),
    }
}

fn run(args: &Args) -> Result<()> {
    let mut cfg = AppCfg::load(&args.config).context(Stage::Config)?;
    apply_overrides(&mut cfg, args);
    cfg.validate().context(Stage::Config)?;

    let present = cfg.present_config();
    info!(
        "frames in flight = {}, validation = {}, content = {:?}",
        present.frames_in_flight, present.validation, cfg.render.content
    );
    let shaders = shaders::select(cfg.render.shader_dir.clone());

    let mut window = DesktopWindow::open(cfg.window_options()).context(Stage::Window)?;
    let extensions = AshGpu::surface_extensions(&window).context(Stage::Window)?;

    let gpu = AshGpu::new().map_err(|e| {
        error!("failed to load the Vulkan loader: {e}");
        PresentError::ResourceCreation {
            kind: ResourceKind::Instance,
            result: vk::Result::ERROR_INITIALIZATION_FAILED,
        }
    })?;

    // Declared after `window` so it is dropped first.
    let mut presenter = Presenter::new(
        gpu,
        &present,
        &extensions,
        |gpu: &AshGpu| gpu.create_window_surface(&window, &window),
        &*shaders,
        content(&cfg),
        &window,
    )?;

    presenter.run(&mut window)?;
    info!("{} frames presented", presenter.loop_state().frames_drawn);
    Ok(())
}

fn main() -> ExitCode {
    init_tracing();
    let args = Args::parse();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            ExitCode::from(exit_code(&e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes() {
        let e = anyhow::Error::from(PresentError::NoSuitableDevice);
        assert_eq!(
            i32::from(exit_code(&e)),
            -PresentError::NoSuitableDevice.code()
        );

        let e = anyhow::anyhow!("parse failure").context(Stage::Config);
        assert_eq!(exit_code(&e), 64);

        let e = anyhow::anyhow!("no display").context(Stage::Window);
        assert_eq!(exit_code(&e), 69);

        assert_eq!(exit_code(&anyhow::anyhow!("other")), 1);
    }

    #[test]
    fn present_error_survives_context() {
        let e = anyhow::Error::from(PresentError::NoSuitableQueueFamily).context("starting up");
        assert_eq!(
            i32::from(exit_code(&e)),
            -PresentError::NoSuitableQueueFamily.code()
        );
    }

    #[test]
    fn cli_overrides_config() {
        let args = Args::parse_from([
            "frameloop",
            "--no-validation",
            "--fullscreen",
            "--frames-in-flight",
            "3",
            "--shader-dir",
            "spv",
        ]);
        let mut cfg = AppCfg::default();
        apply_overrides(&mut cfg, &args);
        assert_eq!(cfg.render.validation, Some(false));
        assert!(cfg.window.fullscreen);
        assert_eq!(cfg.render.frames_in_flight, 3);
        assert_eq!(cfg.render.shader_dir, Some(PathBuf::from("spv")));
    }

    #[test]
    fn validation_flags_conflict() {
        assert!(Args::try_parse_from(["frameloop", "--validation", "--no-validation"]).is_err());
    }

    #[test]
    fn zero_frames_in_flight_from_cli_is_rejected() {
        let args = Args::parse_from(["frameloop", "--frames-in-flight", "0"]);
        let mut cfg = AppCfg::default();
        apply_overrides(&mut cfg, &args);
        assert!(cfg.validate().is_err());
    }
}
