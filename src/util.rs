#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Toolchain discovery and file-system helpers.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use glob::glob;
use which::which;

/// Finds the Python interpreter.
///
/// An explicitly configured interpreter wins; otherwise `python3` and then
/// `python` are looked up on `PATH`.
pub fn python_path(preferred: Option<&str>) -> Result<PathBuf> {
    if let Some(name) = preferred {
        return which(name)
            .or_else(|_| {
                let path = PathBuf::from(name);
                if path.is_file() { Ok(path) } else { Err(anyhow!("not a file")) }
            })
            .with_context(|| format!("Cannot find the configured Python interpreter ({name})"));
    }

    which("python3")
        .or_else(|_| which("python"))
        .context("Cannot find a Python interpreter on path (python3 or python)")
}

/// Finds a program on `PATH`, describing the failure for reports.
pub fn program_path(program: &str) -> Result<PathBuf, String> {
    which(program).map_err(|e| format!("`{program}` not found on PATH ({e})"))
}

/// A glob utility function to find paths to files with certain extension
///
/// * `extension`: the file extension to find paths for
/// * `search_depth`: how many folders deep to search for
/// * `root_dir`: the root directory where search starts
pub fn find_files(extension: &str, search_depth: i8, root_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut pattern = root_dir.to_path_buf();

    for _ in 0..search_depth {
        pattern.push("**");
    }

    pattern.push(format!("*.{extension}"));
    let pattern = pattern
        .to_str()
        .context("Could not convert root_dir to string")?
        .to_string();

    let mut found: Vec<PathBuf> = glob(&pattern)
        .context("Could not create glob")?
        .filter_map(Result::ok)
        .collect();
    found.sort();
    Ok(found)
}

/// Escapes control characters the way a Python string literal would show
/// them, for echoing student input back in messages.
pub fn escape_input(text: &str) -> String {
    text.chars().flat_map(char::escape_default).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_is_shown_escaped() {
        assert_eq!(escape_input("3\n4\n"), "3\\n4\\n");
        assert_eq!(escape_input("tab\there"), "tab\\there");
    }

    #[test]
    fn missing_programs_are_described() {
        let err = program_path("gradekit-no-such-tool").expect_err("missing");
        assert!(err.contains("gradekit-no-such-tool"));
    }
}
