//! CLI definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use assemblage::ops::GenerateRequest;
use assemblage::util::GenerateOptions;

/// Assemblage - a meta-build generator for C and C++
#[derive(Parser)]
#[command(name = "assemblage")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(flatten)]
    pub spec: SpecArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate the ninja build graph
    Generate,

    /// Generate if needed, then run ninja
    Build,

    /// Remove the temp directory
    Clean,

    /// Show the discovered toolchain
    Probe(ProbeArgs),
}

#[derive(Args)]
pub struct ProbeArgs {
    /// Print the result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Spec selection and generation options shared by every command.
#[derive(Args, Debug, Clone, Default)]
pub struct SpecArgs {
    /// Spec file (defaults to ./build.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Change to this directory before doing anything
    #[arg(short = 'C', long, global = true)]
    pub change_dir: Option<PathBuf>,

    /// Regenerate the graph even if one exists
    #[arg(short, long, global = true)]
    pub force_generate: bool,

    /// Directory for the graph and build outputs
    #[arg(short = 'T', long, global = true)]
    pub temp_path: Option<PathBuf>,

    /// C compiler name, searched on PATH
    #[arg(long, global = true)]
    pub cc_exec: Option<String>,

    /// C++ compiler name, searched on PATH
    #[arg(long, global = true)]
    pub cpp_exec: Option<String>,

    #[arg(long, global = true)]
    pub as_exec: Option<String>,

    #[arg(long, global = true)]
    pub ar_exec: Option<String>,

    #[arg(long, global = true)]
    pub ld_exec: Option<String>,

    #[arg(long, global = true)]
    pub objcopy_exec: Option<String>,

    /// C compiler path, used as is
    #[arg(long, global = true)]
    pub cc_path: Option<PathBuf>,

    /// C++ compiler path, used as is
    #[arg(long, global = true)]
    pub cpp_path: Option<PathBuf>,

    #[arg(long, global = true)]
    pub as_path: Option<PathBuf>,

    #[arg(long, global = true)]
    pub ar_path: Option<PathBuf>,

    #[arg(long, global = true)]
    pub ld_path: Option<PathBuf>,

    #[arg(long, global = true)]
    pub objcopy_path: Option<PathBuf>,

    /// Search toolchain executables below this root instead of PATH
    #[arg(short = 'X', long, global = true)]
    pub cross_compile_root: Option<PathBuf>,

    /// Target system, e.g. `linux` or `windows`
    #[arg(long, global = true)]
    pub system: Option<String>,

    #[arg(long, global = true)]
    pub os: Option<String>,

    #[arg(long, global = true)]
    pub arch: Option<String>,

    #[arg(long, global = true)]
    pub abi: Option<String>,

    /// Extra flags for the C compile rules
    #[arg(long, global = true, allow_hyphen_values = true)]
    pub cc_flags: Option<String>,

    /// Extra flags for the C++ compile rules
    #[arg(long, global = true, allow_hyphen_values = true)]
    pub cpp_flags: Option<String>,

    /// Extra flags for the link rule
    #[arg(long, global = true, allow_hyphen_values = true)]
    pub ld_flags: Option<String>,

    /// Use the compilers without discovering their magic flags
    #[arg(long, global = true)]
    pub no_probe: bool,

    /// Seconds to wait for each probe
    #[arg(long, global = true)]
    pub probe_timeout: Option<u64>,

    /// Number of parallel ninja jobs
    #[arg(short, long, global = true)]
    pub jobs: Option<u32>,
}

impl SpecArgs {
    /// Apply `--change-dir` and turn the options into a request.
    pub fn into_request(self) -> anyhow::Result<GenerateRequest> {
        use anyhow::Context as _;

        if let Some(dir) = &self.change_dir {
            std::env::set_current_dir(dir)
                .with_context(|| format!("failed to change directory to {}", dir.display()))?;
        }

        let options = GenerateOptions {
            force_generate: self.force_generate.then_some(true),
            temp_path: self.temp_path,
            cc_exec: self.cc_exec,
            cpp_exec: self.cpp_exec,
            as_exec: self.as_exec,
            ar_exec: self.ar_exec,
            ld_exec: self.ld_exec,
            objcopy_exec: self.objcopy_exec,
            cc_path: self.cc_path,
            cpp_path: self.cpp_path,
            as_path: self.as_path,
            ar_path: self.ar_path,
            ld_path: self.ld_path,
            objcopy_path: self.objcopy_path,
            cross_compile_root: self.cross_compile_root,
            system: self.system,
            os: self.os,
            arch: self.arch,
            abi: self.abi,
            cc_flags: self.cc_flags,
            cpp_flags: self.cpp_flags,
            ld_flags: self.ld_flags,
            no_probe: self.no_probe.then_some(true),
            probe_timeout: self.probe_timeout,
            jobs: self.jobs,
        };

        Ok(GenerateRequest {
            config: self.config,
            options,
        })
    }
}
