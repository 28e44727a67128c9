//! Ninja syntax writer.

use std::fmt::Write as _;

use super::{BuildOptions, GraphSink, RuleOptions};

/// Renders graph directives as a `build.ninja` file.
#[derive(Debug, Default)]
pub struct NinjaWriter {
    out: String,
}

impl NinjaWriter {
    pub fn new() -> Self {
        NinjaWriter { out: String::new() }
    }

    /// Leading comment line.
    pub fn comment(&mut self, text: &str) {
        for line in text.lines() {
            let _ = writeln!(self.out, "# {}", line);
        }
    }

    /// The rendered file contents.
    pub fn finish(self) -> String {
        self.out
    }

    fn line(&mut self, indent: usize, text: &str) {
        for _ in 0..indent {
            self.out.push_str("  ");
        }
        self.out.push_str(text);
        self.out.push('\n');
    }

    fn scoped(&mut self, name: &str, value: &str) {
        self.line(1, &format!("{} = {}", name, value));
    }
}

/// Escape a path for use in a build line.
pub fn escape_path(path: &str) -> String {
    path.replace('$', "$$").replace(' ', "$ ").replace(':', "$:")
}

/// Escape a value so ninja reads it literally.
pub fn escape(value: &str) -> String {
    value.replace('$', "$$")
}

fn paths(items: &[String]) -> String {
    items
        .iter()
        .map(|p| escape_path(p))
        .collect::<Vec<_>>()
        .join(" ")
}

impl GraphSink for NinjaWriter {
    fn variable(&mut self, name: &str, value: &str) {
        self.line(0, &format!("{} = {}", name, value));
    }

    fn pool(&mut self, name: &str, depth: i64) {
        self.line(0, &format!("pool {}", name));
        self.scoped("depth", &depth.to_string());
        self.out.push('\n');
    }

    fn rule(&mut self, name: &str, command: &str, options: &RuleOptions) {
        self.line(0, &format!("rule {}", name));
        self.scoped("command", command);
        if let Some(ref v) = options.description {
            self.scoped("description", v);
        }
        if let Some(ref v) = options.depfile {
            self.scoped("depfile", v);
        }
        if options.generator {
            self.scoped("generator", "1");
        }
        if let Some(ref v) = options.pool {
            self.scoped("pool", v);
        }
        if options.restat {
            self.scoped("restat", "1");
        }
        if let Some(ref v) = options.rspfile {
            self.scoped("rspfile", v);
        }
        if let Some(ref v) = options.rspfile_content {
            self.scoped("rspfile_content", v);
        }
        if let Some(ref v) = options.deps {
            self.scoped("deps", v);
        }
        self.out.push('\n');
    }

    fn build(&mut self, outputs: &[String], rule: &str, options: &BuildOptions) {
        let mut head = format!("build {}", paths(outputs));
        if !options.implicit_outputs.is_empty() {
            head.push_str(" | ");
            head.push_str(&paths(&options.implicit_outputs));
        }
        head.push_str(": ");
        head.push_str(rule);
        if !options.inputs.is_empty() {
            head.push(' ');
            head.push_str(&paths(&options.inputs));
        }
        if !options.implicit.is_empty() {
            head.push_str(" | ");
            head.push_str(&paths(&options.implicit));
        }
        if !options.order_only.is_empty() {
            head.push_str(" || ");
            head.push_str(&paths(&options.order_only));
        }
        self.line(0, &head);
        for (name, value) in &options.variables {
            self.scoped(name, value);
        }
    }

    fn include(&mut self, path: &str) {
        self.line(0, &format!("include {}", escape_path(path)));
    }

    fn subninja(&mut self, path: &str) {
        self.line(0, &format!("subninja {}", escape_path(path)));
    }

    fn default(&mut self, names: &[String]) {
        self.line(0, &format!("default {}", paths(names)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_and_pool() {
        let mut w = NinjaWriter::new();
        w.pool("__link_pool", 1);
        w.rule(
            "__ld",
            "cc $__ld_flags -o $out $in",
            &RuleOptions {
                description: Some("link $out".into()),
                pool: Some("__link_pool".into()),
                ..Default::default()
            },
        );
        let out = w.finish();
        assert!(out.contains("pool __link_pool\n  depth = 1\n"));
        assert!(out.contains("rule __ld\n  command = cc $__ld_flags -o $out $in\n"));
        assert!(out.contains("  pool = __link_pool\n"));
        assert!(!out.contains("generator"));
    }

    #[test]
    fn test_build_line() {
        let mut w = NinjaWriter::new();
        w.build(
            &["out dir/app".to_string()],
            "__ld",
            &BuildOptions::default()
                .inputs(["a.o", "b.o"])
                .implicit(["lib/libutil.a"])
                .variable("__ld_flags", "-lutil"),
        );
        let out = w.finish();
        assert_eq!(
            out,
            "build out$ dir/app: __ld a.o b.o | lib/libutil.a\n  __ld_flags = -lutil\n"
        );
    }

    #[test]
    fn test_escape_path() {
        assert_eq!(escape_path("C:/x y/$z"), "C$:/x$ y/$$z");
    }
}
