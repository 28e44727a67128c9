//! CLI integration tests for assemblage.
//!
//! These tests drive the binary against throwaway projects with a fake
//! toolchain made of shell scripts, so they only run on unix.

#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::prelude::*;
use tempfile::TempDir;

const UTIL_APP_SPEC: &str = r#"
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

/// Get the assemblage binary command.
fn assemblage() -> Command {
    Command::cargo_bin("assemblage").unwrap()
}

fn write(path: &Path, contents: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, contents).unwrap();
}

fn script(path: &Path) -> PathBuf {
    write(path, "#!/bin/sh\nexit 0\n");
    fs::set_permissions(path, fs::Permissions::from_mode(0o755)).unwrap();
    path.to_path_buf()
}

/// A project directory with a fake `cc`, `c++` and `ar` under `tools/`.
struct Project {
    dir: TempDir,
}

impl Project {
    fn new(spec: &str) -> Self {
        let dir = TempDir::new().unwrap();
        write(&dir.path().join("build.toml"), spec);
        for tool in ["cc", "c++", "ar"] {
            script(&dir.path().join("tools").join(tool));
        }
        Project { dir }
    }

    fn util_app() -> Self {
        let project = Project::new(UTIL_APP_SPEC);
        project.file("util.c", "int util(void) { return 1; }\n");
        project.file("main.c", "int util(void);\nint main(void) { return util(); }\n");
        project
    }

    fn root(&self) -> &Path {
        self.dir.path()
    }

    fn file(&self, rel: &str, contents: &str) {
        write(&self.root().join(rel), contents);
    }

    fn graph(&self) -> PathBuf {
        self.root().join("build/build.ninja")
    }

    /// `assemblage <command>` in the project with the fake toolchain.
    fn cmd(&self, command: &str) -> Command {
        let tools = self.root().join("tools");
        let mut cmd = assemblage();
        cmd.current_dir(self.root())
            .arg(command)
            .arg("--no-probe")
            .arg("--cc-path")
            .arg(tools.join("cc"))
            .arg("--cpp-path")
            .arg(tools.join("c++"))
            .arg("--ar-path")
            .arg(tools.join("ar"));
        cmd
    }
}

// ============================================================================
// assemblage generate
// ============================================================================

#[test]
fn test_generate_util_app() {
    let project = Project::util_app();

    project
        .cmd("generate")
        .assert()
        .success()
        .stderr(predicate::str::contains("Generated"));

    let graph = fs::read_to_string(project.graph()).unwrap();
    assert!(graph.contains("pool __link_pool"));
    assert!(graph.contains("rule __cc"));
    assert!(graph.contains("rule __ar"));
    assert!(graph.contains("util.c.o: __cc "));
    assert!(graph.contains("libutil.a: __ar "));
    assert!(graph.contains("bin/app: __ld "));
    assert!(graph.contains("build util: phony "));
    assert!(graph.contains("build app: phony "));
}

#[test]
fn test_generate_reuses_existing_graph() {
    let project = Project::util_app();
    project.file("build/build.ninja", "# stale\n");

    project
        .cmd("generate")
        .assert()
        .success()
        .stderr(predicate::str::contains("Up to date"));
    assert_eq!(fs::read_to_string(project.graph()).unwrap(), "# stale\n");

    project.cmd("generate").arg("--force-generate").assert().success();
    assert!(fs::read_to_string(project.graph())
        .unwrap()
        .contains("rule __ld"));
}

#[test]
fn test_missing_rule_fails_without_graph() {
    let project = Project::new(
        r#"
[[target]]
name = "app"
type = "executable"
sources = ["main.rs"]
"#,
    );
    project.file("main.rs", "fn main() {}\n");

    project
        .cmd("generate")
        .assert()
        .failure()
        .stderr(predicate::str::contains("main.rs"))
        .stderr(predicate::str::contains("rule_map"));

    assert!(!project.graph().exists());
}

#[test]
fn test_unresolved_dependency_reported() {
    let project = Project::new(
        r#"
[[target]]
name = "app"
type = "executable"
sources = ["main.c"]
dependencies = ["nothing-here"]
"#,
    );
    project.file("main.c", "int main(void) { return 0; }\n");

    project
        .cmd("generate")
        .assert()
        .failure()
        .stderr(predicate::str::contains("nothing-here"));
}

#[test]
fn test_missing_spec_file() {
    let tmp = TempDir::new().unwrap();

    assemblage()
        .arg("generate")
        .current_dir(tmp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("config file not found"));
}

#[test]
fn test_variables_emitted_reserved_keys_not() {
    let project = Project::new("greeting = \"hello {name}\"\nname = \"world\"\n__secret = \"hidden\"\n");

    project.cmd("generate").assert().success();

    let graph = fs::read_to_string(project.graph()).unwrap();
    assert!(graph.contains("greeting = hello world"));
    assert!(!graph.contains("__secret"));
    assert!(!graph.contains("hidden"));
}

#[test]
fn test_ninja_include() {
    let project = Project::util_app();
    project.file("build.toml", &format!("include = \"extra\"\n{}", UTIL_APP_SPEC));
    project.file("extra.ninja", "build extra: phony\n");

    project.cmd("generate").assert().success();

    let graph = fs::read_to_string(project.graph()).unwrap();
    let lines: Vec<&str> = graph.lines().collect();
    let includes: Vec<usize> = lines
        .iter()
        .enumerate()
        .filter(|(_, l)| l.starts_with("include "))
        .map(|(i, _)| i)
        .collect();
    assert_eq!(includes.len(), 1);
    assert!(lines[includes[0]].ends_with("extra.ninja"));
    let last_build = lines.iter().rposition(|l| l.starts_with("build ")).unwrap();
    assert!(last_build < includes[0]);
}

#[test]
fn test_change_dir_and_config() {
    let project = Project::util_app();
    fs::rename(project.root().join("build.toml"), project.root().join("project.toml")).unwrap();

    let tools = project.root().join("tools");
    assemblage()
        .current_dir(std::env::temp_dir())
        .arg("generate")
        .arg("-C")
        .arg(project.root())
        .arg("--config")
        .arg("project.toml")
        .arg("--no-probe")
        .arg("--cc-path")
        .arg(tools.join("cc"))
        .arg("--cpp-path")
        .arg(tools.join("c++"))
        .arg("--ar-path")
        .arg(tools.join("ar"))
        .assert()
        .success();

    assert!(project.graph().exists());
}

// ============================================================================
// assemblage clean / probe
// ============================================================================

#[test]
fn test_clean_removes_temp_dir() {
    let project = Project::util_app();
    project.cmd("generate").assert().success();
    assert!(project.graph().exists());

    project
        .cmd("clean")
        .assert()
        .success()
        .stderr(predicate::str::contains("Removed"));
    assert!(!project.root().join("build").exists());
}

#[test]
fn test_probe_json() {
    let project = Project::new("");

    project
        .cmd("probe")
        .arg("--json")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"assemble_stage\": false"));
}

#[test]
fn test_probe_missing_compiler() {
    let project = Project::new("");

    assemblage()
        .current_dir(project.root())
        .args(["probe", "--no-probe", "--cc-path", "tools/missing-cc"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("missing-cc"));
}
