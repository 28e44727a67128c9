//! Implementation of `assemblage probe`.

use anyhow::{Context as _, Result};

use crate::builder::toolchain::Toolchain;
use crate::ops::generate::{GenerateRequest, LoadedSpec};

/// Discover the toolchain the spec would be generated with.
pub fn probe(request: &GenerateRequest) -> Result<Toolchain> {
    let loaded = LoadedSpec::load(request)?;
    Toolchain::detect(&loaded.ctx).context("toolchain discovery failed")
}
