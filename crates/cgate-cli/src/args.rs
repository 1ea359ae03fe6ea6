use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};

use cgate_core::pipeline::config::{DEFAULT_STACK_SIZE, DEFAULT_TARGET_TRIPLE};

#[derive(Debug, Parser)]
#[command(
    name = "cgate",
    version,
    about = "Build smart contracts to WASM behind an import-section gate"
)]
pub struct Args {
    /// Enable debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Scaffold a new contract project
    Init {
        /// Name of the project directory and package
        project_name: String,
    },

    /// Compile, validate, optimize and generate the ABI
    Build(BuildArgs),

    /// Compile, validate and optimize only
    BuildContract(BuildArgs),

    /// Generate the ABI for an already built contract
    GenerateAbi {
        /// Project directory
        #[arg(long, default_value = ".")]
        dir_name: PathBuf,
    },

    /// Check an existing .wasm artifact against the import policy
    Check {
        /// Path to the .wasm artifact
        wasm_path: PathBuf,

        /// JSON policy file; defaults to allowing the `env` module
        #[arg(long)]
        policy: Option<PathBuf>,

        /// Output format
        #[arg(long, default_value = "text")]
        format: OutputFormat,
    },
}

#[derive(Debug, Clone, ClapArgs)]
pub struct BuildArgs {
    /// Project directory
    #[arg(long, default_value = ".")]
    pub dir_name: PathBuf,

    /// Build without optimizations
    #[arg(short, long)]
    pub debug: bool,

    /// Link-time stack size in bytes
    #[arg(short, long, default_value_t = DEFAULT_STACK_SIZE)]
    pub stack_size: u32,

    /// Compilation target triple
    #[arg(long, default_value = DEFAULT_TARGET_TRIPLE)]
    pub target: String,

    /// JSON policy file; overrides [package.metadata.cgate]
    #[arg(long)]
    pub policy: Option<PathBuf>,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Text,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_defaults() {
        let args = Args::parse_from(["cgate", "build"]);

        match args.command {
            Command::Build(build) => {
                assert_eq!(build.dir_name, PathBuf::from("."));
                assert!(!build.debug);
                assert_eq!(build.stack_size, 8192);
                assert_eq!(build.target, "wasm32-wasip1");
                assert!(build.policy.is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn build_contract_short_flags() {
        let args = Args::parse_from([
            "cgate",
            "build-contract",
            "-d",
            "-s",
            "16384",
            "--dir-name",
            "token",
        ]);

        match args.command {
            Command::BuildContract(build) => {
                assert!(build.debug);
                assert_eq!(build.stack_size, 16384);
                assert_eq!(build.dir_name, PathBuf::from("token"));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn rejects_non_numeric_stack_size() {
        assert!(Args::try_parse_from(["cgate", "build", "--stack-size", "big"]).is_err());
    }

    #[test]
    fn init_requires_name() {
        assert!(Args::try_parse_from(["cgate", "init"]).is_err());
    }
}
