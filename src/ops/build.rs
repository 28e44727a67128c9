//! Implementation of `assemblage build`.

use std::path::Path;
use std::process::ExitStatus;

use anyhow::Result;

use crate::ops::generate::{generate_loaded, GenerateRequest, LoadedSpec};
use crate::util::process::ProcessBuilder;

/// Generate the graph if needed, then run `ninja` on it.
///
/// Returns ninja's exit status.
pub fn build(request: &GenerateRequest) -> Result<ExitStatus> {
    let loaded = LoadedSpec::load(request)?;
    let jobs = jobs(&loaded)?;
    let generated = generate_loaded(loaded)?;

    let cmd = ninja_command(&generated.graph_path, jobs);
    tracing::info!("running `{}`", cmd.display_command());
    cmd.status()
}

/// `__jobs`, or the available parallelism.
fn jobs(loaded: &LoadedSpec) -> Result<u32> {
    let configured = loaded
        .ctx
        .get("__jobs")?
        .and_then(|v| v.as_int())
        .and_then(|j| u32::try_from(j).ok())
        .filter(|&j| j > 0);
    Ok(configured.unwrap_or_else(|| {
        std::thread::available_parallelism()
            .map(|n| n.get() as u32)
            .unwrap_or(1)
    }))
}

fn ninja_command(graph: &Path, jobs: u32) -> ProcessBuilder {
    ProcessBuilder::new("ninja")
        .arg("-f")
        .arg(graph)
        .arg("-j")
        .arg(jobs.to_string())
}
