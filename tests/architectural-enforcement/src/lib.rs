//! Architectural Enforcement Integration Tests
//!
//! This package scans the workspace sources and enforces:
//! - No thread sleeps, and timer sleeps only where pacing or backoff lives
//! - No blocking file I/O outside the synchronous config loader
//! - No `unwrap()`/`expect()` in production code
//! - The core crate stays free of terminal crates
//!
//! Test modules (everything from the first `#[cfg(test)]` on) are ignored.

use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

/// Source trees that ship in the binary
pub const PRODUCTION_TREES: &[&str] = &["companion/core/src", "tui/src"];

/// A production source file with its test module cut off
#[derive(Debug, Clone)]
pub struct SourceFile {
    /// Path relative to the workspace root, with `/` separators
    pub path: String,
    /// Code up to the first `#[cfg(test)]`
    pub production: String,
}

impl SourceFile {
    /// Non-comment lines with their 1-based line numbers
    pub fn code_lines(&self) -> impl Iterator<Item = (usize, &str)> {
        self.production
            .lines()
            .enumerate()
            .map(|(i, line)| (i + 1, line))
            .filter(|(_, line)| !line.trim_start().starts_with("//"))
    }

    /// Lines containing `needle`, formatted as `path:line: text`
    #[must_use]
    pub fn find(&self, needle: &str) -> Vec<String> {
        self.code_lines()
            .filter(|(_, line)| line.contains(needle))
            .map(|(n, line)| format!("{}:{}: {}", self.path, n, line.trim()))
            .collect()
    }
}

/// Workspace root, two levels above this package
#[must_use]
pub fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .ancestors()
        .nth(2)
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf)
}

/// Strip the `#[cfg(test)]` module and anything after it
#[must_use]
pub fn production_part(source: &str) -> &str {
    match source.find("#[cfg(test)]") {
        Some(at) => &source[..at],
        None => source,
    }
}

/// All `.rs` files under the production trees
///
/// # Panics
///
/// Panics if a source file cannot be read.
#[must_use]
pub fn production_sources() -> Vec<SourceFile> {
    let root = workspace_root();
    let mut files = Vec::new();
    for tree in PRODUCTION_TREES {
        for entry in WalkDir::new(root.join(tree))
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.path().extension().is_some_and(|ext| ext == "rs"))
        {
            let text = fs::read_to_string(entry.path())
                .unwrap_or_else(|e| panic!("reading {}: {e}", entry.path().display()));
            let path = entry
                .path()
                .strip_prefix(&root)
                .unwrap_or(entry.path())
                .to_string_lossy()
                .replace('\\', "/");
            files.push(SourceFile {
                path,
                production: production_part(&text).to_string(),
            });
        }
    }
    files.sort_by(|a, b| a.path.cmp(&b.path));
    files
}

/// Every hit of any `needles` outside the `allowed` paths
#[must_use]
pub fn violations(files: &[SourceFile], needles: &[&str], allowed: &[&str]) -> Vec<String> {
    files
        .iter()
        .filter(|f| !allowed.contains(&f.path.as_str()))
        .flat_map(|f| needles.iter().flat_map(move |n| f.find(n)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_production_part_cuts_tests() {
        let src = "fn a() {}\n#[cfg(test)]\nmod tests { fn b() { x.unwrap(); } }\n";
        assert_eq!(production_part(src), "fn a() {}\n");
        assert_eq!(production_part("fn a() {}"), "fn a() {}");
    }

    #[test]
    fn test_comment_lines_are_skipped() {
        let file = SourceFile {
            path: "x.rs".to_string(),
            production: "// x.unwrap()\n/// y.unwrap()\nlet z = w.unwrap();\n".to_string(),
        };
        assert_eq!(file.find(".unwrap()"), vec!["x.rs:3: let z = w.unwrap();"]);
    }

    #[test]
    fn test_allowed_paths_are_exempt() {
        let files = vec![
            SourceFile {
                path: "a.rs".to_string(),
                production: "sleep(d)".to_string(),
            },
            SourceFile {
                path: "b.rs".to_string(),
                production: "sleep(d)".to_string(),
            },
        ];
        assert_eq!(violations(&files, &["sleep("], &["a.rs"]), vec!["b.rs:1: sleep(d)"]);
    }
}
