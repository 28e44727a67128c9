//! `assemblage generate` command

use anyhow::Result;

use assemblage::ops::{generate, GenerateRequest};

pub fn execute(request: &GenerateRequest) -> Result<i32> {
    let generated = generate(request)?;

    if generated.regenerated {
        eprintln!("   Generated {}", generated.graph_path.display());
    } else {
        eprintln!(
            "  Up to date {} (use --force-generate to regenerate)",
            generated.graph_path.display()
        );
    }
    Ok(0)
}
