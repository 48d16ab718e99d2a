#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Locations of the student's files and the instructor's scaffolding.

use std::path::{Path, PathBuf};

use anyhow::Result;
use itertools::Itertools;

use crate::{config::GraderConfig, error::InfrastructureError, util::find_files};

/// The directories one grading run works against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    /// Directory holding the student's files.
    root:       PathBuf,
    /// Instructor scaffolding directory.
    source_dir: PathBuf,
}

impl Submission {
    /// Creates a submission rooted at `root` with scaffolding in `source_dir`.
    pub fn new(root: impl Into<PathBuf>, source_dir: impl Into<PathBuf>) -> Self {
        Self {
            root:       root.into(),
            source_dir: source_dir.into(),
        }
    }

    /// Uses the directories named by `config`.
    pub fn from_config(config: &GraderConfig) -> Self {
        Self::new(&config.submission_dir, &config.source_dir)
    }

    /// Directory holding the student's files.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Instructor scaffolding directory.
    pub fn source_dir(&self) -> &Path {
        &self.source_dir
    }

    /// Resolves a submitted file name; absolute paths are returned unchanged.
    pub fn path(&self, name: impl AsRef<Path>) -> PathBuf {
        self.root.join(name)
    }

    /// Resolves a scaffolding file name.
    pub fn source_path(&self, name: impl AsRef<Path>) -> PathBuf {
        self.source_dir.join(name)
    }

    /// Reads a scaffolding file, such as recorded input or expected output.
    pub fn read_scaffolding(&self, name: impl AsRef<Path>) -> Result<String, InfrastructureError> {
        let path = self.source_path(name);
        std::fs::read_to_string(&path).map_err(|source| InfrastructureError::Io { path, source })
    }

    /// The requested names that are not present as files, in request order
    /// and without duplicates.
    pub fn missing_files<I, S>(&self, names: I) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        names
            .into_iter()
            .map(|n| n.as_ref().to_string())
            .unique()
            .filter(|n| !self.path(n).is_file())
            .collect()
    }

    /// Every Python file in the submission, sorted.
    pub fn python_files(&self) -> Result<Vec<PathBuf>> {
        find_files("py", 1, &self.root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_files_keep_request_order() {
        let dir = std::env::temp_dir().join(format!("gradekit-sub-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).expect("mkdir");
        std::fs::write(dir.join("a.py"), "x = 1\n").expect("write");

        let submission = Submission::new(&dir, &dir);
        assert_eq!(submission.missing_files(["c.py", "a.py", "b.py", "c.py"]), vec!["c.py", "b.py"]);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn scaffolding_is_read_from_the_source_dir() {
        let base = std::env::temp_dir().join(format!("gradekit-sub-{}", uuid::Uuid::new_v4()));
        let (root, source) = (base.join("submission"), base.join("source"));
        std::fs::create_dir_all(&root).expect("mkdir");
        std::fs::create_dir_all(&source).expect("mkdir");
        std::fs::write(source.join("expected.txt"), "Hello, Ada!\n").expect("write");

        let submission = Submission::new(&root, &source);
        assert_eq!(submission.read_scaffolding("expected.txt").expect("read"), "Hello, Ada!\n");
        assert!(matches!(
            submission.read_scaffolding("absent.txt"),
            Err(InfrastructureError::Io { .. })
        ));

        let _ = std::fs::remove_dir_all(&base);
    }
}
