use crate::error::{IndexerError, Result};
use crate::monitor::FileMonitorConfig;
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use ignore::gitignore::{Gitignore, GitignoreBuilder};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

/// Directories that are never worth indexing, regardless of ignore files.
const IGNORED_DIRS: &[&str] = &[
    ".git",
    ".hg",
    ".svn",
    ".codeindex",
    "target",
    "node_modules",
    "dist",
    "build",
    "out",
];

const BINARY_EXTENSIONS: &[&str] = &[
    "exe", "dll", "so", "dylib", "bin", "o", "a", "class", "wasm", "png", "jpg", "jpeg", "gif",
    "ico", "bmp", "webp", "pdf", "zip", "gz", "tar", "bz2", "xz", "7z", "jar", "woff", "woff2",
    "ttf", "otf", "eot", "mp3", "mp4", "avi", "mov", "sqlite", "db",
];

const SNIFF_BYTES: usize = 1024;

/// Pure filter deciding whether a change is eligible for indexing.
///
/// Classification never fails: anything that cannot be read or stat'd is
/// treated as "do not process".
pub struct ChangeClassifier {
    root: PathBuf,
    patterns: Option<GlobSet>,
    ignore: Option<Gitignore>,
    max_file_size: u64,
    skip_binary_files: bool,
}

impl ChangeClassifier {
    pub fn new(root: impl AsRef<Path>, config: &FileMonitorConfig) -> Result<Self> {
        let root = root.as_ref().to_path_buf();

        let patterns = if config.patterns.is_empty() {
            None
        } else {
            let mut builder = GlobSetBuilder::new();
            for pattern in &config.patterns {
                let glob = GlobBuilder::new(pattern).build().map_err(|e| {
                    IndexerError::MalformedConfig(format!("bad glob pattern {pattern:?}: {e}"))
                })?;
                builder.add(glob);
            }
            Some(builder.build().map_err(|e| {
                IndexerError::MalformedConfig(format!("glob set build failed: {e}"))
            })?)
        };

        let ignore = if config.respect_ignore_file {
            let mut builder = GitignoreBuilder::new(&root);
            builder.add(root.join(".gitignore"));
            match builder.build() {
                Ok(gitignore) => Some(gitignore),
                Err(e) => {
                    log::warn!("Failed to read workspace ignore file: {e}");
                    None
                }
            }
        } else {
            None
        };

        Ok(Self {
            root,
            patterns,
            ignore,
            max_file_size: config.max_file_size,
            skip_binary_files: config.skip_binary_files,
        })
    }

    /// Decide whether a create/modify for `path` should reach the index.
    #[must_use]
    pub fn should_process(&self, path: &Path, size_bytes: u64) -> bool {
        let relative = path.strip_prefix(&self.root).unwrap_or(path);

        if let Some(first) = relative.components().next() {
            let first = first.as_os_str().to_string_lossy().to_lowercase();
            if IGNORED_DIRS.iter().any(|dir| first == *dir) {
                return false;
            }
        }

        if let Some(ignore) = &self.ignore {
            if ignore
                .matched_path_or_any_parents(relative, false)
                .is_ignore()
            {
                return false;
            }
        }

        if let Some(patterns) = &self.patterns {
            if !patterns.is_match(relative) {
                return false;
            }
        }

        if size_bytes > self.max_file_size {
            return false;
        }

        if self.skip_binary_files && is_binary(path) {
            return false;
        }

        true
    }
}

/// Extension table first, content sniff as the fallback. An unreadable file
/// counts as binary so it is never processed.
fn is_binary(path: &Path) -> bool {
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        let ext = ext.to_lowercase();
        if BINARY_EXTENSIONS.iter().any(|known| ext == *known) {
            return true;
        }
    }

    let mut head = [0u8; SNIFF_BYTES];
    match File::open(path).and_then(|mut file| file.read(&mut head)) {
        Ok(read) => head[..read].contains(&0),
        Err(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::FileMonitorConfig;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn classifier(root: &Path, config: &FileMonitorConfig) -> ChangeClassifier {
        ChangeClassifier::new(root, config).unwrap()
    }

    #[test]
    fn rejects_oversized_files() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("big.rs");
        std::fs::write(&path, "fn main() {}").unwrap();

        let config = FileMonitorConfig {
            max_file_size: 4,
            ..FileMonitorConfig::default()
        };
        let classifier = classifier(dir.path(), &config);

        assert_eq!(classifier.should_process(&path, 5), false);
        assert_eq!(classifier.should_process(&path, 4), true);
    }

    #[test]
    fn rejects_binary_by_extension_and_content() {
        let dir = TempDir::new().unwrap();
        let image = dir.path().join("logo.png");
        std::fs::write(&image, [0x89u8, 0x50, 0x4e, 0x47]).unwrap();
        let blob = dir.path().join("data.dat");
        std::fs::write(&blob, [0u8, 1, 2, 3]).unwrap();
        let text = dir.path().join("notes.txt");
        std::fs::write(&text, "plain text").unwrap();

        let classifier = classifier(dir.path(), &FileMonitorConfig::default());

        assert_eq!(classifier.should_process(&image, 4), false);
        assert_eq!(classifier.should_process(&blob, 4), false);
        assert_eq!(classifier.should_process(&text, 10), true);
    }

    #[test]
    fn rejects_missing_file_when_sniffing() {
        let dir = TempDir::new().unwrap();
        let classifier = classifier(dir.path(), &FileMonitorConfig::default());
        assert_eq!(
            classifier.should_process(&dir.path().join("gone.xyz"), 1),
            false
        );
    }

    #[test]
    fn respects_workspace_ignore_file() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(".gitignore"), "generated/\n*.log\n").unwrap();
        std::fs::create_dir(dir.path().join("generated")).unwrap();
        let ignored = dir.path().join("generated/out.rs");
        std::fs::write(&ignored, "fn x() {}").unwrap();
        let logged = dir.path().join("run.log");
        std::fs::write(&logged, "hello").unwrap();
        let kept = dir.path().join("main.rs");
        std::fs::write(&kept, "fn main() {}").unwrap();

        let classifier = classifier(dir.path(), &FileMonitorConfig::default());

        assert_eq!(classifier.should_process(&ignored, 9), false);
        assert_eq!(classifier.should_process(&logged, 5), false);
        assert_eq!(classifier.should_process(&kept, 12), true);
    }

    #[test]
    fn ignore_file_not_consulted_when_disabled() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(".gitignore"), "*.log\n").unwrap();
        let logged = dir.path().join("run.log");
        std::fs::write(&logged, "hello").unwrap();

        let config = FileMonitorConfig {
            respect_ignore_file: false,
            ..FileMonitorConfig::default()
        };
        let classifier = classifier(dir.path(), &config);

        assert_eq!(classifier.should_process(&logged, 5), true);
    }

    #[test]
    fn rejects_built_in_noise_directories() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("node_modules/pkg")).unwrap();
        let vendored = dir.path().join("node_modules/pkg/index.js");
        std::fs::write(&vendored, "module.exports = 1;").unwrap();

        let classifier = classifier(dir.path(), &FileMonitorConfig::default());
        assert_eq!(classifier.should_process(&vendored, 19), false);
    }

    #[test]
    fn include_patterns_gate_eligibility() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("src/lib.rs");
        std::fs::create_dir(dir.path().join("src")).unwrap();
        std::fs::write(&source, "pub fn f() {}").unwrap();
        let readme = dir.path().join("README.md");
        std::fs::write(&readme, "# readme").unwrap();

        let config = FileMonitorConfig {
            patterns: vec!["*.rs".to_string()],
            ..FileMonitorConfig::default()
        };
        let classifier = classifier(dir.path(), &config);

        assert_eq!(classifier.should_process(&source, 13), true);
        assert_eq!(classifier.should_process(&readme, 8), false);
    }

    #[test]
    fn bad_glob_is_a_config_error() {
        let dir = TempDir::new().unwrap();
        let config = FileMonitorConfig {
            patterns: vec!["src/{".to_string()],
            ..FileMonitorConfig::default()
        };
        assert!(ChangeClassifier::new(dir.path(), &config).is_err());
    }
}
