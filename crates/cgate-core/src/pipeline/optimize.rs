use std::ffi::OsStr;
use std::io;
use std::path::{Path, PathBuf};

use crate::pipeline::stage::CommandSpec;
use crate::util::template::literal_path;

/// Size optimizer executable, part of binaryen.
pub const OPTIMIZER: &str = "wasm-opt";

pub const INSTALL_HINT: &str = "\
wasm-opt not found! Make sure the binary is in your PATH environment.
It shrinks the contract's Wasm binary and lowers sign-extension
instructions, which the target runtime does not support.
wasm-opt is part of the binaryen package:
* Debian/Ubuntu: apt-get install binaryen
* Homebrew: brew install binaryen
* Arch Linux: pacman -S binaryen
* Windows: binary releases at https://github.com/WebAssembly/binaryen/releases";

/// Look for the optimizer in the directories of a `PATH`-style value.
///
/// Only files the current user may execute are considered, so a stray
/// non-executable `wasm-opt` falls through to the unoptimized copy.
pub fn find_optimizer(path_var: Option<&OsStr>) -> Option<PathBuf> {
    let file_name = if cfg!(windows) {
        format!("{OPTIMIZER}.exe")
    } else {
        OPTIMIZER.to_string()
    };

    std::env::split_paths(path_var?)
        .map(|dir| dir.join(&file_name))
        .find(|candidate| is_executable(candidate))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    std::fs::metadata(path)
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

pub fn optimize_command(optimizer: &Path, input: &Path, output: &Path) -> CommandSpec {
    CommandSpec::new(optimizer.display().to_string())
        .arg(literal_path(input))
        .args(["--signext-lowering", "-O3", "--strip-debug", "-o"])
        .arg(literal_path(output))
}

/// Publish the unoptimized artifact when no optimizer is available.
pub fn fallback_copy(input: &Path, output: &Path) -> io::Result<u64> {
    std::fs::copy(input, output)
}
