use log::info;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::{DatasetError, DatasetResult};
use crate::types::{CategoryMap, OutputDirs, Split};
use crate::utils::ensure_directory;

/// File name of the dataset manifest consumed by the trainer.
pub const MANIFEST_FILE: &str = "dataset.yaml";

/// Set up the directory structure for YOLO dataset output
///
/// Creates `images/{train,val,test}` and `labels/{train,val,test}` under
/// `base`. Directories that already exist are kept as they are.
pub fn scaffold(base: &Path) -> DatasetResult<OutputDirs> {
    let images_dir = base.join("images");
    let labels_dir = base.join("labels");
    let dir = |root: &Path, split: Split| ensure_directory(&root.join(split.as_str()));

    Ok(OutputDirs {
        base_dir: ensure_directory(base)?,
        train_images_dir: dir(&images_dir, Split::Train)?,
        val_images_dir: dir(&images_dir, Split::Val)?,
        test_images_dir: dir(&images_dir, Split::Test)?,
        train_labels_dir: dir(&labels_dir, Split::Train)?,
        val_labels_dir: dir(&labels_dir, Split::Val)?,
        test_labels_dir: dir(&labels_dir, Split::Test)?,
    })
}

/// Image directories of each split, relative to the manifest's `path`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitPaths {
    pub train: String,
    pub val: String,
    pub test: Option<String>,
}

impl SplitPaths {
    /// `images/<split>`, the layout produced by [`scaffold`].
    pub fn yolo_layout() -> Self {
        Self {
            train: "images/train".to_string(),
            val: "images/val".to_string(),
            test: Some("images/test".to_string()),
        }
    }

    /// `<split>/images`, the layout produced by the aggregator.
    pub fn split_first_layout() -> Self {
        Self {
            train: "train/images".to_string(),
            val: "val/images".to_string(),
            test: None,
        }
    }
}

/// Dataset descriptor written next to the images.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetManifest {
    pub path: PathBuf,
    pub splits: SplitPaths,
    pub names: Vec<(usize, String)>,
}

impl DatasetManifest {
    pub fn new(path: PathBuf, splits: SplitPaths, categories: &CategoryMap) -> Self {
        Self {
            path,
            splits,
            names: categories
                .iter()
                .map(|(id, name)| (id, name.to_string()))
                .collect(),
        }
    }

    pub fn class_count(&self) -> usize {
        self.names.len()
    }

    pub fn to_yaml(&self) -> String {
        let mut yaml_content = format!(
            "path: {}\ntrain: {}\nval: {}\n",
            quote_scalar(&self.path.to_string_lossy()),
            self.splits.train,
            self.splits.val
        );
        match &self.splits.test {
            Some(test) => yaml_content.push_str(&format!("test: {}\n", test)),
            None => yaml_content.push_str("test:\n"),
        }
        yaml_content.push_str(&format!("\nnc: {}\n", self.class_count()));
        yaml_content.push_str("names:\n");
        for (id, name) in &self.names {
            yaml_content.push_str(&format!("    {}: {}\n", id, yaml_scalar(name)));
        }
        yaml_content
    }
}

// Single-quoted YAML scalar; the only escape is a doubled quote.
fn quote_scalar(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

// Plain scalar when YAML reads it back unchanged, quoted otherwise.
fn yaml_scalar(value: &str) -> String {
    let indicator = value.starts_with(|c: char| "-?:,[]{}#&*!|>'\"%@`".contains(c));
    let needs_quotes = value.is_empty()
        || indicator
        || value.trim() != value
        || value.contains(": ")
        || value.contains(" #")
        || value.ends_with(':')
        || value.chars().any(char::is_control);
    if needs_quotes {
        quote_scalar(value)
    } else {
        value.to_string()
    }
}

/// Write `dataset.yaml` under `base`, replacing any existing manifest.
///
/// The content goes to a temporary sibling first and is renamed into place.
pub fn write_manifest(
    base: &Path,
    categories: &CategoryMap,
    splits: SplitPaths,
) -> DatasetResult<PathBuf> {
    let absolute_path = fs::canonicalize(base).map_err(DatasetError::io(base))?;
    let manifest = DatasetManifest::new(absolute_path, splits, categories);

    let manifest_path = base.join(MANIFEST_FILE);
    let tmp_path = base.join(format!(".{}.tmp", MANIFEST_FILE));
    {
        let mut writer =
            BufWriter::new(File::create(&tmp_path).map_err(DatasetError::io(&tmp_path))?);
        writer
            .write_all(manifest.to_yaml().as_bytes())
            .and_then(|_| writer.flush())
            .map_err(DatasetError::io(&tmp_path))?;
    }
    fs::rename(&tmp_path, &manifest_path).map_err(DatasetError::io(&manifest_path))?;

    info!("Wrote dataset manifest {}", manifest_path.display());
    Ok(manifest_path)
}
