//! C-to-bytecode toolchain bridge (spec.md §6, an external collaborator
//! named only by its interface contract -- "thin adapters over OS/
//! toolchain facilities" per spec.md §1).
//!
//! Shells out to a C compiler configured to emit LLVM IR, then an
//! assembler to lower that IR to the verifier-compatible object file,
//! mirroring how the teacher's bridges invoke external binaries
//! (`ip`/`tc` exec netlink syscalls directly; this crate's equivalent
//! external facility is a compiler pipeline instead of a socket) via
//! plain `std::process::Command` with stderr captured into the
//! diagnostic log on nonzero exit.

use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::{logged, Error, Result};

const DEFAULT_COMPILER: &str = "/usr/bin/clang";
const DEFAULT_ASSEMBLER: &str = "/usr/bin/llc";

/// Paths and toggles governing one `compile_c_to_bytecode` call.
#[derive(Debug, Clone, Default)]
pub struct ToolchainPaths {
    pub obj_path: Option<PathBuf>,
    pub ir_path: Option<PathBuf>,
    pub compiler_path: Option<PathBuf>,
    pub assembler_path: Option<PathBuf>,
}

/// The paths the toolchain actually produced, once defaults are resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileOutput {
    pub obj_path: PathBuf,
    pub ir_path: PathBuf,
}

/// Compile `c_path` to a verifier-compatible object file. Missing
/// `obj_path`/`ir_path` are derived from `c_path` by substituting its
/// trailing `.c` with `.o`/`.ll`; missing compiler/assembler paths
/// default to `/usr/bin/clang`/`/usr/bin/llc` (spec.md §6).
#[tracing::instrument(skip(paths))]
pub fn compile_c_to_bytecode(c_path: impl AsRef<Path>, paths: ToolchainPaths) -> Result<CompileOutput> {
    logged(try_compile(c_path.as_ref(), paths))
}

fn try_compile(c_path: &Path, paths: ToolchainPaths) -> Result<CompileOutput> {
    let ir_path = paths.ir_path.unwrap_or_else(|| with_extension(c_path, "ll"));
    let obj_path = paths.obj_path.unwrap_or_else(|| with_extension(c_path, "o"));
    let compiler = paths.compiler_path.unwrap_or_else(|| PathBuf::from(DEFAULT_COMPILER));
    let assembler = paths.assembler_path.unwrap_or_else(|| PathBuf::from(DEFAULT_ASSEMBLER));

    run(
        Command::new(&compiler)
            .args(["-O2", "-target", "bpf", "-emit-llvm", "-c", "-g"])
            .arg(c_path)
            .arg("-o")
            .arg(&ir_path),
        &compiler,
    )?;

    run(
        Command::new(&assembler)
            .arg("-march=bpf")
            .arg("-filetype=obj")
            .arg(&ir_path)
            .arg("-o")
            .arg(&obj_path),
        &assembler,
    )?;

    Ok(CompileOutput { obj_path, ir_path })
}

fn with_extension(c_path: &Path, ext: &str) -> PathBuf {
    c_path.with_extension(ext)
}

fn run(cmd: &mut Command, program: &Path) -> Result<()> {
    let output = cmd.output().map_err(|e| Error::Toolchain(format!("{}: {e}", program.display())))?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::Toolchain(format!(
            "{} exited with {}: {}",
            program.display(),
            output.status,
            stderr.trim()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_obj_and_ir_paths_from_c_path() {
        // Exercises path derivation without invoking a real compiler by
        // calling the pure helper directly.
        assert_eq!(with_extension(Path::new("/tmp/out.c"), "o"), PathBuf::from("/tmp/out.o"));
        assert_eq!(with_extension(Path::new("/tmp/out.c"), "ll"), PathBuf::from("/tmp/out.ll"));
    }

    #[test]
    fn missing_compiler_binary_surfaces_toolchain_error() {
        let dir = std::env::temp_dir().join(format!("pflower-toolchain-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let c_path = dir.join("prog.c");
        std::fs::write(&c_path, "int main(void) { return 0; }").unwrap();

        let paths = ToolchainPaths {
            compiler_path: Some(PathBuf::from("/nonexistent/clang-does-not-exist")),
            ..Default::default()
        };
        let err = compile_c_to_bytecode(&c_path, paths).unwrap_err();
        assert!(matches!(err, Error::Toolchain(_)));
        std::fs::remove_dir_all(&dir).ok();
    }
}
