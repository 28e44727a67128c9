//! Dependency resolution.
//!
//! Turns a target's `dependencies` list into link inputs, implicit inputs
//! and extra flags. Each reference is tried, in order, as:
//!
//! 1. `@plugin:<name>[//<param>]`, answered by the plugin registry
//! 2. a glob matching files on disk
//! 3. the name of another target in the same section, optionally written
//!    as `lib<name>` or `<name>.a`
//!
//! A reference that matches a file is a file even when a target of the same
//! name exists.

pub mod errors;
pub mod resolve;

pub use errors::DependencyError;
pub use resolve::DependencyResolver;

use crate::util::shell_words;

/// Plugin references start with this.
pub const PLUGIN_PREFIX: &str = "@plugin:";

/// A classified dependency reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DependencyRef<'a> {
    Plugin { name: &'a str, param: &'a str },
    /// A file glob or a target name
    Named(&'a str),
}

impl<'a> DependencyRef<'a> {
    /// Classify a reference. `None` means a malformed plugin reference.
    pub fn parse(reference: &'a str) -> Option<Self> {
        match reference.strip_prefix(PLUGIN_PREFIX) {
            Some(rest) => {
                let (name, param) = rest.split_once("//").unwrap_or((rest, ""));
                (!name.is_empty()).then_some(DependencyRef::Plugin { name, param })
            }
            None => Some(DependencyRef::Named(reference)),
        }
    }
}

/// What a dependency list contributes to a target.
///
/// Flags are kept as unquoted tokens; [`ResolvedDeps::cflags_text`] and
/// friends render them for a shell.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedDeps {
    /// Extra link inputs, after the target's own objects
    pub link_inputs: Vec<String>,
    /// Files the link step waits for without naming them
    pub implicit: Vec<String>,
    pub cflags: Vec<String>,
    pub cppflags: Vec<String>,
    pub ldflags: Vec<String>,
}

impl ResolvedDeps {
    /// Add a compile flag for both languages.
    fn compile_flag(&mut self, flag: String) {
        self.cppflags.push(flag.clone());
        self.cflags.push(flag);
    }

    fn implicit(&mut self, path: String) {
        if !self.implicit.contains(&path) {
            self.implicit.push(path);
        }
    }

    pub fn cflags_text(&self) -> String {
        shell_words::join(&self.cflags)
    }

    pub fn cppflags_text(&self) -> String {
        shell_words::join(&self.cppflags)
    }

    pub fn ldflags_text(&self) -> String {
        shell_words::join(&self.ldflags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plugin_refs() {
        assert_eq!(
            DependencyRef::parse("@plugin:pkg-config//zlib"),
            Some(DependencyRef::Plugin {
                name: "pkg-config",
                param: "zlib"
            })
        );
        assert_eq!(
            DependencyRef::parse("@plugin:llvm-config"),
            Some(DependencyRef::Plugin {
                name: "llvm-config",
                param: ""
            })
        );
        assert_eq!(DependencyRef::parse("@plugin://zlib"), None);
        assert_eq!(DependencyRef::parse("libutil.a"), Some(DependencyRef::Named("libutil.a")));
    }

    #[test]
    fn test_flags_render_quoted() {
        let mut deps = ResolvedDeps::default();
        deps.compile_flag("-I/opt/my lib/include".into());
        deps.ldflags.push("-lz".into());
        assert_eq!(deps.cflags_text(), "'-I/opt/my lib/include'");
        assert_eq!(deps.cppflags_text(), deps.cflags_text());
        assert_eq!(deps.ldflags_text(), "-lz");
    }
}
