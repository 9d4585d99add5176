// SPDX-License-Identifier: CEPL-1.0
use std::fs;
use std::io;
use std::path::PathBuf;

use frameloop_render::{ShaderSource, ShaderStage};

/// Default location of the compiled shaders when no embedded copy exists.
pub const DEFAULT_SHADER_DIR: &str = "shaders";

fn file_name(stage: ShaderStage) -> &'static str {
    match stage {
        ShaderStage::Vertex => "present.vert.spv",
        ShaderStage::Fragment => "present.frag.spv",
    }
}

/// Reads precompiled SPIR-V from a directory.
#[derive(Debug, Clone)]
pub struct ShaderDir {
    pub dir: PathBuf,
}

impl ShaderSource for ShaderDir {
    fn load(&self, stage: ShaderStage) -> io::Result<Vec<u8>> {
        let path = self.dir.join(file_name(stage));
        fs::read(&path).map_err(|e| io::Error::new(e.kind(), format!("{}: {e}", path.display())))
    }
}

#[cfg(feature = "compile-shaders")]
pub struct Embedded;

#[cfg(feature = "compile-shaders")]
impl ShaderSource for Embedded {
    fn load(&self, stage: ShaderStage) -> io::Result<Vec<u8>> {
        let bytes: &[u8] = match stage {
            ShaderStage::Vertex => include_bytes!(concat!(env!("OUT_DIR"), "/present.vert.spv")),
            ShaderStage::Fragment => include_bytes!(concat!(env!("OUT_DIR"), "/present.frag.spv")),
        };
        Ok(bytes.to_vec())
    }
}

/// An explicit directory wins; otherwise the embedded shaders, falling back to
/// [`DEFAULT_SHADER_DIR`] in builds without them.
pub fn select(dir: Option<PathBuf>) -> Box<dyn ShaderSource> {
    match dir {
        Some(dir) => Box::new(ShaderDir { dir }),
        #[cfg(feature = "compile-shaders")]
        None => Box::new(Embedded),
        #[cfg(not(feature = "compile-shaders"))]
        None => Box::new(ShaderDir {
            dir: PathBuf::from(DEFAULT_SHADER_DIR),
        }),
    }
}
