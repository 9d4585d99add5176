// SPDX-License-Identifier: CEPL-1.0
use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed=shaders/present.vert");
    println!("cargo:rerun-if-changed=shaders/present.frag");

    #[cfg(feature = "compile-shaders")]
    compile::run()?;

    Ok(())
}

#[cfg(feature = "compile-shaders")]
mod compile {
    use std::error::Error;
    use std::{env, fs, path::PathBuf};

    const STAGES: [(&str, shaderc::ShaderKind); 2] = [
        ("present.vert", shaderc::ShaderKind::Vertex),
        ("present.frag", shaderc::ShaderKind::Fragment),
    ];

    pub fn run() -> Result<(), Box<dyn Error>> {
        let out = PathBuf::from(env::var("OUT_DIR")?);
        let comp = shaderc::Compiler::new().expect("shaderc compiler");
        let mut opts = shaderc::CompileOptions::new().expect("shaderc options");
        opts.set_target_env(
            shaderc::TargetEnv::Vulkan,
            shaderc::EnvVersion::Vulkan1_0 as u32,
        );
        opts.set_optimization_level(shaderc::OptimizationLevel::Performance);

        for (name, kind) in STAGES {
            let src = fs::read_to_string(PathBuf::from("shaders").join(name))?;
            let spv = comp.compile_into_spirv(&src, kind, name, "main", Some(&opts))?;
            fs::write(out.join(format!("{name}.spv")), spv.as_binary_u8())?;
        }
        Ok(())
    }
}
