//! Implementation of `assemblage clean`.

use std::path::PathBuf;

use anyhow::Result;

use crate::ops::generate::{GenerateRequest, LoadedSpec};
use crate::util::fs::remove_dir_all_if_exists;

/// Remove the temp directory, graph included. Returns the removed path.
pub fn clean(request: &GenerateRequest) -> Result<PathBuf> {
    let loaded = LoadedSpec::load(request)?;
    let temp_root = loaded.temp_root()?;
    tracing::info!("removing {}", temp_root.display());
    remove_dir_all_if_exists(&temp_root)?;
    Ok(temp_root)
}
