//! Magic-flag discovery.
//!
//! A compiler driver asked to "show, don't run" (`-###`) prints the real
//! sub-commands it would execute. Running it twice on differently named
//! inputs and keeping only what both runs agree on leaves the flags the
//! toolchain always passes, with `$in`/`$out` marking where the input and
//! output go.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::util::process::ProcessBuilder;
use crate::util::shell_words;

use super::detect::ExecSearch;
use super::ProbeError;

/// Placeholder for the input file in discovered command lines.
pub const IN: &str = "$in";
/// Placeholder for the output file in discovered command lines.
pub const OUT: &str = "$out";

/// Tokens dropped together with their value.
const NON_PORTABLE_WITH_VALUE: &[&str] = &[
    "-main-file-name",
    "-resource-dir",
    "-dumpbase",
    "-dumpbase-ext",
    "-dumpdir",
    "-auxbase",
    "-auxbase-strip",
];

/// Tokens dropped on their own.
const NON_PORTABLE: &[&str] = &["-dynamic", "-static"];

/// One probe invocation shape.
#[derive(Debug, Clone)]
pub struct ProbeRequest<'a> {
    /// Driver to run
    pub driver: &'a Path,
    /// Input file extension, without the dot
    pub in_ext: &'a str,
    /// Output file extension, without the dot
    pub out_ext: &'a str,
    /// Flags selecting the driver mode (`-c`, `-S`, nothing for link)
    pub mode_flags: &'a [&'a str],
    /// Contents of the scratch input files
    pub source: &'a str,
}

/// The real command a driver runs for one probe shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Discovered {
    /// Resolved sub-command executable
    pub exec: PathBuf,
    /// Remaining arguments; may contain [`IN`] and [`OUT`]
    pub args: Vec<String>,
}

/// Run the two-probe comparison and pick the real sub-command.
pub fn detect_magic_flags(
    req: &ProbeRequest<'_>,
    scratch_root: &Path,
    search: &ExecSearch,
    timeout: Duration,
) -> Result<Discovered, ProbeError> {
    crate::util::fs::ensure_dir(scratch_root).map_err(|e| ProbeError::Scratch(format!("{:#}", e)))?;
    let scratch = tempfile::Builder::new()
        .prefix("probe-")
        .tempdir_in(scratch_root)
        .map_err(|e| ProbeError::Scratch(e.to_string()))?;

    let a = Scratch::create(scratch.path(), "helloA", req)?;
    let b = Scratch::create(&scratch.path().join("helloB"), "helloB", req)?;

    let lines_a = run_probe(req, &a, timeout)?;
    let lines_b = run_probe(req, &b, timeout)?;

    let stripped = strip(&lines_a, &lines_b);
    let candidates = locate(&stripped);
    tracing::debug!(
        "probe of {} found {} candidate line(s)",
        req.driver.display(),
        candidates.len()
    );

    let chosen = choose(&candidates, search).ok_or_else(|| ProbeError::NoCandidate {
        driver: req.driver.to_path_buf(),
        output: lines_a
            .iter()
            .map(|l| l.join(" "))
            .collect::<Vec<_>>()
            .join("\n"),
    })?;

    Ok(chosen)
}

struct Scratch {
    input: String,
    output: String,
}

impl Scratch {
    fn create(dir: &Path, stem: &str, req: &ProbeRequest<'_>) -> Result<Self, ProbeError> {
        std::fs::create_dir_all(dir).map_err(|e| ProbeError::Scratch(e.to_string()))?;
        let input = dir.join(format!("{}.{}", stem, req.in_ext));
        let output = dir.join(format!("{}.{}", stem, req.out_ext));
        std::fs::write(&input, req.source).map_err(|e| ProbeError::Scratch(e.to_string()))?;
        Ok(Scratch {
            input: input.display().to_string(),
            output: output.display().to_string(),
        })
    }
}

/// Run one probe and return its output as normalized token lines.
fn run_probe(
    req: &ProbeRequest<'_>,
    scratch: &Scratch,
    timeout: Duration,
) -> Result<Vec<Vec<String>>, ProbeError> {
    let cmd = ProcessBuilder::new(req.driver)
        .args(req.mode_flags)
        .args([scratch.input.as_str(), "-o", scratch.output.as_str(), "-###"]);
    tracing::debug!("probing: {}", cmd.display_command());

    let output = cmd.exec_with_timeout(timeout)?;
    let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
    text.push('\n');
    text.push_str(&String::from_utf8_lossy(&output.stderr));

    if !output.status.success() {
        return Err(ProbeError::Failed {
            driver: req.driver.to_path_buf(),
            code: output.status.code(),
            output: text,
        });
    }

    Ok(tokenize(&text, &scratch.input, &scratch.output))
}

/// Split captured output into token lines, replacing the scratch input and
/// output paths with placeholders so both probes line up.
pub fn tokenize(text: &str, input: &str, output: &str) -> Vec<Vec<String>> {
    text.lines()
        .filter(|l| !l.trim().is_empty())
        .filter_map(|line| match shell_words::split(line) {
            Ok(words) => Some(words),
            Err(e) => {
                tracing::debug!("skipping probe line: {}", e);
                None
            }
        })
        .map(|words| {
            words
                .into_iter()
                .map(|w| {
                    if w == input {
                        IN.to_string()
                    } else if w == output {
                        OUT.to_string()
                    } else {
                        w
                    }
                })
                .collect()
        })
        .collect()
}

/// Pair lines of both probes and keep their common skeleton.
pub fn strip(a: &[Vec<String>], b: &[Vec<String>]) -> Vec<Vec<String>> {
    a.iter()
        .zip(b.iter())
        .map(|(la, lb)| {
            let la = split_assignment(la);
            let lb = split_assignment(lb);
            if la.len() <= lb.len() {
                common_subsequence(&la, &lb)
            } else {
                common_subsequence(&lb, &la)
            }
        })
        .collect()
}

/// A leading `KEY=value` token becomes `value` followed by the rest.
fn split_assignment(line: &[String]) -> Vec<String> {
    let Some((first, rest)) = line.split_first() else {
        return Vec::new();
    };
    let assignment = first.split_once('=').filter(|(key, _)| {
        !key.is_empty()
            && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
            && !key.starts_with(|c: char| c.is_ascii_digit())
    });
    match assignment {
        Some((_, value)) => {
            let mut out = Vec::with_capacity(line.len());
            if !value.is_empty() {
                out.push(value.to_string());
            }
            out.extend(rest.iter().cloned());
            out
        }
        None => line.to_vec(),
    }
}

/// Longest common subsequence of two token lists, in order.
pub fn common_subsequence(a: &[String], b: &[String]) -> Vec<String> {
    let (n, m) = (a.len(), b.len());
    let mut table = vec![vec![0usize; m + 1]; n + 1];
    for i in (0..n).rev() {
        for j in (0..m).rev() {
            table[i][j] = if a[i] == b[j] {
                table[i + 1][j + 1] + 1
            } else {
                table[i + 1][j].max(table[i][j + 1])
            };
        }
    }

    let mut out = Vec::with_capacity(table[0][0]);
    let (mut i, mut j) = (0, 0);
    while i < n && j < m {
        if a[i] == b[j] {
            out.push(a[i].clone());
            i += 1;
            j += 1;
        } else if table[i + 1][j] >= table[i][j + 1] {
            i += 1;
        } else {
            j += 1;
        }
    }
    out
}

/// Lines that write the probe output, with the `-o $out` pair removed.
pub fn locate(lines: &[Vec<String>]) -> Vec<Vec<String>> {
    lines
        .iter()
        .filter_map(|line| {
            let pos = line
                .windows(2)
                .position(|w| w[0] == "-o" && w[1] == OUT)?;
            let mut rest = line[..pos].to_vec();
            rest.extend(line[pos + 2..].iter().cloned());
            Some(filter_non_portable(rest))
        })
        .filter(|line| !line.is_empty())
        .collect()
}

/// Drop tokens that only make sense for the probed file or host.
pub fn filter_non_portable(tokens: Vec<String>) -> Vec<String> {
    let mut out = Vec::with_capacity(tokens.len());
    let mut iter = tokens.into_iter().peekable();
    while let Some(tok) = iter.next() {
        if NON_PORTABLE.contains(&tok.as_str()) {
            continue;
        }
        if NON_PORTABLE_WITH_VALUE.contains(&tok.as_str()) {
            let takes_value = iter
                .peek()
                .is_some_and(|next| !next.starts_with('-') && next != IN && next != OUT);
            if takes_value {
                iter.next();
            }
            continue;
        }
        out.push(tok);
    }
    out
}

/// First candidate whose command resolves to a real executable, else the
/// last candidate.
fn choose(candidates: &[Vec<String>], search: &ExecSearch) -> Option<Discovered> {
    let resolve = |tok: &str| -> Option<PathBuf> {
        let path = Path::new(tok);
        if path.is_file() {
            return Some(path.to_path_buf());
        }
        search.find(tok)
    };

    for line in candidates {
        if let Some(exec) = resolve(&line[0]) {
            return Some(Discovered {
                exec,
                args: line[1..].to_vec(),
            });
        }
    }

    candidates.last().map(|line| Discovered {
        exec: PathBuf::from(&line[0]),
        args: line[1..].to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(s: &str) -> Vec<String> {
        s.split_whitespace().map(String::from).collect()
    }

    #[test]
    fn test_common_subsequence_keeps_order() {
        let a = words("cc1 -quiet $in -dumpbase helloA.c -O2 -o $out");
        let b = words("cc1 -quiet $in -dumpbase helloB.c -O2 -o $out");
        assert_eq!(
            common_subsequence(&a, &b),
            words("cc1 -quiet $in -dumpbase -O2 -o $out")
        );
    }

    #[test]
    fn test_split_assignment() {
        let line = words("COLLECT_GCC_OPTIONS=-c -o $out");
        assert_eq!(split_assignment(&line), words("-c -o $out"));
        let line = words("-DX=1 foo");
        assert_eq!(split_assignment(&line), line);
    }

    #[test]
    fn test_tokenize_normalizes_paths() {
        let text = "\"/usr/bin/as\" --64 -o \"/t/helloA.o\" /tmp/ccX.s\n\n";
        let lines = tokenize(text, "/t/helloA.c", "/t/helloA.o");
        assert_eq!(lines, vec![words("/usr/bin/as --64 -o $out /tmp/ccX.s")]);
    }

    #[test]
    fn test_locate_and_filter() {
        let stripped = vec![
            words("cc1 -quiet $in -o /tmp/x.s"),
            words("as --64 -static -o $out"),
            words("ld -main-file-name foo -o $out -resource-dir /lib/clang $in -lc"),
        ];
        let candidates = locate(&stripped);
        assert_eq!(candidates, vec![words("as --64"), words("ld $in -lc")]);
    }

    #[test]
    fn test_choose_prefers_resolvable() {
        let tmp = tempfile::TempDir::new().unwrap();
        let real = tmp.path().join("real-cc");
        std::fs::write(&real, "").unwrap();

        let candidates = vec![
            words("-c -mtune=generic"),
            vec![real.display().to_string(), "-x".into(), "c".into()],
            words("last-one -q"),
        ];
        let chosen = choose(&candidates, &ExecSearch::default()).unwrap();
        assert_eq!(chosen.exec, real);
        assert_eq!(chosen.args, words("-x c"));

        let fallback = choose(&candidates[2..], &ExecSearch::default()).unwrap();
        assert_eq!(fallback.exec, PathBuf::from("last-one"));
    }

    #[cfg(unix)]
    #[test]
    fn test_detect_magic_flags_with_fake_driver() {
        use crate::test_support::{write_fake_driver, FakeDriver};

        let tmp = tempfile::TempDir::new().unwrap();
        let driver = write_fake_driver(tmp.path(), "cc", FakeDriver::SingleLine);
        let scratch = tmp.path().join("scratch");
        let req = ProbeRequest {
            driver: &driver,
            in_ext: "c",
            out_ext: "o",
            mode_flags: &["-c"],
            source: "int main(void) { return 0; }\n",
        };

        let first = detect_magic_flags(&req, &scratch, &ExecSearch::default(), Duration::from_secs(10))
            .unwrap();
        let second = detect_magic_flags(&req, &scratch, &ExecSearch::default(), Duration::from_secs(10))
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(first.exec, driver);
        assert_eq!(first.args, words("-cc1 -emit-obj -triple x86_64-fake -x c $in"));
    }

    #[cfg(unix)]
    #[test]
    fn test_failing_driver_is_fatal() {
        use crate::test_support::write_script;

        let tmp = tempfile::TempDir::new().unwrap();
        let driver = tmp.path().join("broken-cc");
        write_script(&driver, "echo boom >&2\nexit 3");
        let req = ProbeRequest {
            driver: &driver,
            in_ext: "c",
            out_ext: "o",
            mode_flags: &["-c"],
            source: "",
        };
        let err = detect_magic_flags(
            &req,
            &tmp.path().join("scratch"),
            &ExecSearch::default(),
            Duration::from_secs(10),
        )
        .unwrap_err();
        assert!(matches!(err, ProbeError::Failed { code: Some(3), .. }));
    }
}
