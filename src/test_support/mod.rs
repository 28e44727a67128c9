//! Test utilities for assemblage unit tests.
//!
//! Fake compiler drivers are small shell scripts that answer `-###` the way
//! real drivers do, so probing can be exercised deterministically.

pub mod fixtures;

use std::path::{Path, PathBuf};

use crate::core::Context;

pub use fixtures::*;

/// Shape of a fake driver's dry-run output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FakeDriver {
    /// One sub-command line that re-invokes the driver (clang-like).
    SingleLine,
    /// Separate compiler, assembler and linker sub-commands (gcc-like).
    TwoStage,
}

const ARG_LOOP: &str = r##"mode=link
in=
out=
shared=
while [ $# -gt 0 ]; do
  case "$1" in
    -c) mode=obj ;;
    -S) mode=asm ;;
    -o) shift; out="$1" ;;
    -shared) shared=-shared ;;
    -*) ;;
    *) in="$1" ;;
  esac
  shift
done
base=$(basename "$in")
case "$in" in
  *.cpp) lang=c++ ;;
  *) lang=c ;;
esac
"##;

const SINGLE_LINE: &str = r##"case "$mode" in
  obj) echo "\"$0\" \"-cc1\" \"-emit-obj\" \"-triple\" \"x86_64-fake\" \"-main-file-name\" \"$base\" \"-o\" \"$out\" \"-x\" \"$lang\" \"$in\"" >&2 ;;
  asm) echo "\"$0\" \"-cc1\" \"-S\" \"-triple\" \"x86_64-fake\" \"-main-file-name\" \"$base\" \"-o\" \"$out\" \"-x\" \"$lang\" \"$in\"" >&2 ;;
  link) echo "\"$0\" \"-fake-link\" $shared \"-o\" \"$out\" \"crt1.o\" \"$in\" \"-lc\" \"crtn.o\"" >&2 ;;
esac
exit 0"##;

const TWO_STAGE: &str = r##"dir=$(dirname "$0")
case "$mode" in
  obj)
    echo "COLLECT_GCC_OPTIONS='-c' '-o' '$out'" >&2
    echo " \"$dir/cc1\" -quiet \"$in\" -dumpbase \"$base\" -o /tmp/cc$$.s" >&2
    echo " \"$dir/as\" --64 -o \"$out\" /tmp/cc$$.s" >&2 ;;
  asm)
    echo "COLLECT_GCC_OPTIONS='-S' '-o' '$out'" >&2
    echo " \"$dir/cc1\" -quiet \"$in\" -dumpbase \"$base\" -o \"$out\"" >&2 ;;
  link)
    if [ -n "$shared" ]; then start="crti.o crtbeginS.o"; else start=crt1.o; fi
    echo "COLLECT_GCC_OPTIONS='-o' '$out'" >&2
    echo " \"$dir/collect2\" $shared -o \"$out\" $start \"$in\" -lc crtn.o" >&2 ;;
esac
exit 0"##;

/// Write an executable `/bin/sh` script, creating parent directories.
#[cfg(unix)]
pub fn write_script(path: &Path, body: &str) {
    use std::os::unix::fs::PermissionsExt;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).unwrap();
}

/// Write a fake driver named `name` into `dir`. Two-stage drivers also get
/// `cc1`, `as` and `collect2` stubs next to them.
#[cfg(unix)]
pub fn write_fake_driver(dir: &Path, name: &str, kind: FakeDriver) -> PathBuf {
    let path = dir.join(name);
    let body = match kind {
        FakeDriver::SingleLine => format!("{}{}", ARG_LOOP, SINGLE_LINE),
        FakeDriver::TwoStage => {
            for stub in ["cc1", "as", "collect2"] {
                write_script(&dir.join(stub), "exit 0");
            }
            format!("{}{}", ARG_LOOP, TWO_STAGE)
        }
    };
    write_script(&path, &body);
    path
}

/// A context with fake `cc`, `c++` and `ar` under `dir/bin` and the temp
/// path at `dir/build`.
#[cfg(unix)]
pub fn fake_toolchain_context(dir: &Path, kind: FakeDriver) -> Context {
    let bin = dir.join("bin");
    let cc = write_fake_driver(&bin, "cc", kind);
    let cpp = write_fake_driver(&bin, "c++", kind);
    let ar = bin.join("ar");
    write_script(&ar, "exit 0");

    let mut ctx = Context::new();
    ctx.set("__cc_path", cc.display().to_string());
    ctx.set("__cpp_path", cpp.display().to_string());
    ctx.set("__ar_path", ar.display().to_string());
    ctx.set("__temp_path", dir.join("build").display().to_string());
    ctx
}
