//! `assemblage build` command

use anyhow::Result;

use assemblage::ops::{build, GenerateRequest};

pub fn execute(request: &GenerateRequest) -> Result<i32> {
    let status = build(request)?;
    if !status.success() {
        eprintln!("error: ninja exited with {}", status);
    }
    Ok(status.code().unwrap_or(1))
}
