//! `assemblage clean` command

use anyhow::Result;

use assemblage::ops::{clean, GenerateRequest};

pub fn execute(request: &GenerateRequest) -> Result<i32> {
    let removed = clean(request)?;
    eprintln!("     Removed {}", removed.display());
    Ok(0)
}
