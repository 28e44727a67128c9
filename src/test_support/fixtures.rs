//! Test fixtures for common test scenarios.

use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// Spec with a static library `util` and an executable `app` using it.
pub const UTIL_APP_SPEC: &str = r#"
[[target]]
name = "util"
type = "static_library"
sources = ["util.c"]

[[target]]
name = "app"
type = "executable"
sources = ["main.c"]
dependencies = ["util"]
"#;

/// A throwaway project directory.
#[derive(Debug)]
pub struct ProjectFixture {
    dir: TempDir,
}

impl ProjectFixture {
    pub fn new() -> Self {
        ProjectFixture {
            dir: TempDir::new().unwrap(),
        }
    }

    /// Project root.
    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Write a file relative to the root, creating parent directories.
    pub fn file(&self, rel: &str, contents: &str) -> PathBuf {
        let path = self.dir.path().join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, contents).unwrap();
        path
    }

    /// Write `build.toml` at the root.
    pub fn spec(&self, contents: &str) -> PathBuf {
        self.file("build.toml", contents)
    }

    /// The util/app project with its sources.
    pub fn util_app() -> Self {
        let fixture = ProjectFixture::new();
        fixture.spec(UTIL_APP_SPEC);
        fixture.file("util.c", "int util(void) { return 1; }\n");
        fixture.file("main.c", "int util(void);\nint main(void) { return util(); }\n");
        fixture
    }
}

impl Default for ProjectFixture {
    fn default() -> Self {
        Self::new()
    }
}
