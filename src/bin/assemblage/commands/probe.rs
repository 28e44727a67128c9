//! `assemblage probe` command

use anyhow::Result;

use crate::cli::ProbeArgs;
use assemblage::builder::toolchain::Tool;
use assemblage::ops::{probe, GenerateRequest};

pub fn execute(request: &GenerateRequest, args: ProbeArgs) -> Result<i32> {
    let toolchain = probe(request)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&toolchain)?);
        return Ok(0);
    }

    println!("Toolchain:");
    println!();
    let roles: [(&str, &Tool); 8] = [
        ("cc", &toolchain.c.compile),
        ("cc_s", &toolchain.c.compile_asm),
        ("as_c", &toolchain.c.assemble),
        ("cpp", &toolchain.cpp.compile),
        ("cpp_s", &toolchain.cpp.compile_asm),
        ("as_cpp", &toolchain.cpp.assemble),
        ("ld", &toolchain.ld),
        ("ld_shared", &toolchain.ld_shared),
    ];
    for (role, tool) in roles {
        println!("  {:<9} {}", role, tool.exec.display());
        let flags = tool.magic_flags();
        if !flags.is_empty() {
            println!("            {}", flags);
        }
    }
    println!("  {:<9} {}", "ar", toolchain.ar.display());
    match &toolchain.objcopy {
        Some(objcopy) => println!("  {:<9} {}", "objcopy", objcopy.display()),
        None => println!("  {:<9} not found", "objcopy"),
    }

    println!();
    println!(
        "  Assemble stage: {}",
        if toolchain.assemble_stage { "yes" } else { "no" }
    );
    Ok(0)
}
