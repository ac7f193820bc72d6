// build.rs
// Compiles the GLSL shaders in resources/shaders to target/shaders/<name>.spv

use std::env;
use std::path::{Path, PathBuf};
use std::process::Command;

const SHADER_EXTENSIONS: [&str; 2] = ["vert", "frag"];

fn main() {
    println!("cargo:rerun-if-changed=../../resources/shaders");
    println!("cargo:rerun-if-env-changed=VULKAN_SDK");
    println!("cargo:rerun-if-env-changed=SKIP_SHADERS");

    if env::var("SKIP_SHADERS").is_ok() {
        eprintln!("info: Skipping shader compilation (SKIP_SHADERS set)");
        return;
    }

    let Some(glslc) = find_glslc() else {
        println!("cargo:warning=glslc not found (set VULKAN_SDK or add it to PATH), shaders not compiled");
        return;
    };

    let shader_dir = PathBuf::from("../../resources/shaders");
    let target_dir = PathBuf::from("../../target/shaders");
    if let Err(e) = std::fs::create_dir_all(&target_dir) {
        println!("cargo:warning=Failed to create {}: {}", target_dir.display(), e);
        return;
    }

    let entries = match std::fs::read_dir(&shader_dir) {
        Ok(entries) => entries,
        Err(_) => {
            eprintln!("info: No shader directory found at: {:?}", shader_dir);
            return;
        }
    };

    let mut compiled_count = 0;
    for entry in entries.flatten() {
        let path = entry.path();
        let is_shader = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| SHADER_EXTENSIONS.contains(&ext));
        let Some(file_name) = path.file_name().and_then(|name| name.to_str()) else {
            continue;
        };
        if !is_shader {
            continue;
        }

        // forward.vert -> forward.vert.spv
        let out_file = target_dir.join(format!("{}.spv", file_name));
        if !needs_compile(&path, &out_file) {
            eprintln!("info: Shader {} is up to date", file_name);
            continue;
        }

        match Command::new(&glslc).arg(&path).arg("-o").arg(&out_file).status() {
            Ok(status) if status.success() => {
                eprintln!("info: Compiled {} -> {}", file_name, out_file.display());
                compiled_count += 1;
            }
            Ok(status) => {
                panic!("glslc failed for {} with exit code {}", file_name, status.code().unwrap_or(-1));
            }
            Err(e) => {
                panic!("Failed to run glslc for {}: {}", file_name, e);
            }
        }
    }

    if compiled_count > 0 {
        eprintln!("info: Successfully compiled {} shader(s)", compiled_count);
    } else {
        eprintln!("info: All shaders are up to date");
    }
}

fn find_glslc() -> Option<PathBuf> {
    if let Ok(sdk) = env::var("VULKAN_SDK") {
        let glslc = if cfg!(target_os = "windows") {
            Path::new(&sdk).join("Bin").join("glslc.exe")
        } else {
            Path::new(&sdk).join("bin").join("glslc")
        };
        if glslc.exists() {
            return Some(glslc);
        }
    }

    // Fall back to PATH
    Command::new("glslc")
        .arg("--version")
        .output()
        .ok()
        .filter(|output| output.status.success())
        .map(|_| PathBuf::from("glslc"))
}

fn needs_compile(source: &Path, output: &Path) -> bool {
    let modified = |path: &Path| std::fs::metadata(path).and_then(|meta| meta.modified()).ok();
    match (modified(source), modified(output)) {
        (Some(src), Some(dst)) => src > dst,
        _ => true,
    }
}
