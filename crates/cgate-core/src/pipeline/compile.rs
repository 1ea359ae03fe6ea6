use crate::pipeline::config::{BuildConfig, Profile};
use crate::pipeline::stage::CommandSpec;
use crate::util::template::literal_path;

pub const RUSTFLAGS: &str = "RUSTFLAGS";

/// Lets the stable toolchain accept the `-Z` flags the build needs.
pub const RUSTC_BOOTSTRAP: &str = "RUSTC_BOOTSTRAP";

pub fn rustflags(stack_size: u32) -> String {
    format!("-C link-arg=-zstack-size={stack_size} -Clinker-plugin-lto")
}

/// The compiler invocation for a contract build.
///
/// The stack-size link argument and the bootstrap flag are always set
/// together and only on this child process.
pub fn compile_command(config: &BuildConfig) -> CommandSpec {
    let mut cmd = CommandSpec::new("cargo")
        .arg("build")
        .arg(format!("--target={}", config.target_triple))
        .arg(format!("--target-dir={}", literal_path(&config.target_dir())))
        .arg("-Zbuild-std")
        .arg("--no-default-features");

    if config.profile == Profile::Release {
        cmd = cmd.arg("--release");
    }

    cmd.arg("-Zbuild-std-features=panic_immediate_abort")
        .current_dir(&config.project.root)
        .env(RUSTFLAGS, rustflags(config.stack_size))
        .env(RUSTC_BOOTSTRAP, "1")
}
