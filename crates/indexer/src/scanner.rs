use crate::classifier::ChangeClassifier;
use std::path::{Path, PathBuf};

/// Workspace file scanner, gitignore aware. Used to seed a full re-index and
/// for the monitor's initial watched-file count.
pub struct FileScanner {
    root: PathBuf,
}

impl FileScanner {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Walk the workspace and return every file the classifier accepts,
    /// sorted for deterministic seeding.
    #[must_use]
    pub fn scan(&self, classifier: &ChangeClassifier) -> Vec<PathBuf> {
        let mut files = Vec::new();
        let walker = ignore::WalkBuilder::new(&self.root)
            .hidden(true)
            .git_ignore(true)
            .build();

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    log::debug!("Scan skipped an entry: {err}");
                    continue;
                }
            };
            if !entry.file_type().is_some_and(|t| t.is_file()) {
                continue;
            }
            let size = match entry.metadata() {
                Ok(meta) => meta.len(),
                Err(_) => continue,
            };
            if classifier.should_process(entry.path(), size) {
                files.push(entry.into_path());
            }
        }

        files.sort();
        files
    }
}
