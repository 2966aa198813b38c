use jwalk::WalkDir;
use log::{debug, info, warn};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use crate::error::{DatasetError, DatasetResult};

/// Map from file base name to its location under a source root.
///
/// Built once per batch so that resolving a record never walks the tree again.
/// When several files share a base name the lexically smallest path wins.
#[derive(Debug, Clone, Default)]
pub struct FileIndex {
    root: PathBuf,
    files: HashMap<String, PathBuf>,
    duplicates: usize,
}

impl FileIndex {
    /// Index every regular file under `root`.
    pub fn build(root: &Path) -> DatasetResult<Self> {
        Self::scan(root, |_| true)
    }

    /// Index only the files whose base name is in `names`.
    pub fn build_for(root: &Path, names: &HashSet<&str>) -> DatasetResult<Self> {
        Self::scan(root, |name| names.contains(name))
    }

    fn scan(root: &Path, wanted: impl Fn(&str) -> bool) -> DatasetResult<Self> {
        if !root.is_dir() {
            return Err(DatasetError::Io {
                path: root.to_path_buf(),
                source: std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "source root is not a directory",
                ),
            });
        }

        let mut index = FileIndex {
            root: root.to_path_buf(),
            ..Default::default()
        };

        let entries = WalkDir::new(root)
            .skip_hidden(false)
            .sort(true)
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!("Skipping unreadable entry under {}: {}", root.display(), e);
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file());

        for entry in entries {
            let name = match entry.file_name().to_str() {
                Some(name) => name.to_string(),
                None => continue,
            };
            if !wanted(&name) {
                continue;
            }
            index.insert(name, entry.path());
        }

        info!(
            "Indexed {} files under {}",
            index.files.len(),
            root.display()
        );
        if index.duplicates > 0 {
            warn!(
                "{} duplicate file names under {}; the lexically first path is used",
                index.duplicates,
                root.display()
            );
        }
        Ok(index)
    }

    fn insert(&mut self, name: String, path: PathBuf) {
        match self.files.get_mut(&name) {
            Some(existing) => {
                self.duplicates += 1;
                debug!(
                    "Duplicate file name {}: {} and {}",
                    name,
                    existing.display(),
                    path.display()
                );
                if path < *existing {
                    *existing = path;
                }
            }
            None => {
                self.files.insert(name, path);
            }
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn resolve(&self, name: &str) -> Option<&Path> {
        self.files.get(name).map(PathBuf::as_path)
    }

    /// Like [`resolve`](Self::resolve), but a miss is a [`DatasetError::MissingSourceFile`].
    pub fn require(&self, name: &str) -> DatasetResult<&Path> {
        self.resolve(name)
            .ok_or_else(|| DatasetError::MissingSourceFile {
                name: name.to_string(),
            })
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Number of files skipped because their base name was already indexed.
    pub fn duplicates(&self) -> usize {
        self.duplicates
    }
}
