//! Builds one training pool out of several already-materialized YOLO folders.

use glob::glob;
use jwalk::WalkDir;
use log::{info, warn};
use rand::rngs::StdRng;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{DatasetError, DatasetResult};
use crate::io::{write_manifest, SplitPaths};
use crate::split::sample_even_quota;
use crate::types::{get_image_extensions_set, CategoryMap};
use crate::utils::{create_progress_bar, ensure_directory, label_file_name};

/// An image folder and the folder holding its same-named label files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFolder {
    pub images: PathBuf,
    pub labels: PathBuf,
}

impl SourceFolder {
    pub fn new(images: impl Into<PathBuf>, labels: impl Into<PathBuf>) -> Self {
        Self {
            images: images.into(),
            labels: labels.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplingPolicy {
    /// Every image of every source folder.
    CopyAll,
    /// This many images in total, split evenly across source folders.
    EvenQuota(usize),
}

/// Parameters for one aggregation run
#[derive(Debug, Clone)]
pub struct AggregateParams<'a> {
    pub sources: &'a [SourceFolder],
    pub val_images: &'a Path,
    pub val_labels: &'a Path,
    pub dest: &'a Path,
    pub policy: SamplingPolicy,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct AggregationReport {
    pub train_images: usize,
    pub train_labels: usize,
    pub val_files: usize,
    pub manifest: PathBuf,
}

/// Layout written under the aggregation destination.
#[derive(Debug, Clone)]
struct AggregateDirs {
    train_images: PathBuf,
    train_labels: PathBuf,
    val_images: PathBuf,
    val_labels: PathBuf,
}

impl AggregateDirs {
    fn create(dest: &Path) -> DatasetResult<Self> {
        Ok(Self {
            train_images: ensure_directory(&dest.join("train/images"))?,
            train_labels: ensure_directory(&dest.join("train/labels"))?,
            val_images: ensure_directory(&dest.join("val/images"))?,
            val_labels: ensure_directory(&dest.join("val/labels"))?,
        })
    }
}

fn require_dir(path: &Path) -> DatasetResult<()> {
    if path.is_dir() {
        Ok(())
    } else {
        Err(DatasetError::Io {
            path: path.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "not a directory"),
        })
    }
}

/// List the image files directly inside `folder`, sorted by path.
///
/// Files without an image extension (class lists, `.DS_Store`, ...) are not
/// part of the pool and never need a label.
pub fn list_images(folder: &Path) -> DatasetResult<Vec<PathBuf>> {
    require_dir(folder)?;
    let pattern = format!(
        "{}/*",
        glob::Pattern::escape(&folder.to_string_lossy())
    );
    let extensions = get_image_extensions_set();

    let mut images: Vec<PathBuf> = glob(&pattern)
        .map_err(|e| DatasetError::InvalidArgument(format!("bad folder pattern: {}", e)))?
        .filter_map(|entry| match entry {
            Ok(path) => Some(path),
            Err(e) => {
                warn!("Skipping unreadable entry: {}", e);
                None
            }
        })
        .filter(|path| path.is_file())
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| extensions.contains(&ext.to_lowercase()))
        })
        .collect();
    images.sort();
    Ok(images)
}

/// Merge several source folders into `dest/train`, copy the validation folders
/// into `dest/val` and write the dataset manifest.
///
/// Infeasible quotas and missing validation folders are rejected before
/// anything is copied. An image whose label file is missing aborts the run
/// before that image is copied. Only image files are taken from the source
/// folders; see [`list_images`].
pub fn aggregate(
    params: &AggregateParams,
    categories: &CategoryMap,
    rng: &mut StdRng,
) -> DatasetResult<AggregationReport> {
    let pools = params
        .sources
        .iter()
        .map(|source| list_images(&source.images))
        .collect::<DatasetResult<Vec<_>>>()?;

    let selected = match params.policy {
        SamplingPolicy::CopyAll => pools,
        SamplingPolicy::EvenQuota(total) => sample_even_quota(&pools, total, rng)?,
    };
    for val_dir in [params.val_images, params.val_labels] {
        require_dir(val_dir)?;
    }

    let dirs = AggregateDirs::create(params.dest)?;
    let mut report = AggregationReport::default();

    for (source, images) in params.sources.iter().zip(&selected) {
        let label = source
            .images
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "Source".to_string());
        let pb = create_progress_bar(images.len() as u64, &label);
        for image in images {
            copy_pair(image, &source.labels, &dirs)?;
            report.train_images += 1;
            report.train_labels += 1;
            pb.inc(1);
        }
        pb.finish_with_message(format!("{} copied", label));
    }
    info!(
        "Copied {} training images from {} source folders",
        report.train_images,
        params.sources.len()
    );

    report.val_files += copy_tree(params.val_images, &dirs.val_images)?;
    report.val_files += copy_tree(params.val_labels, &dirs.val_labels)?;
    info!("Merged {} validation files", report.val_files);

    report.manifest = write_manifest(params.dest, categories, SplitPaths::split_first_layout())?;
    Ok(report)
}

fn copy_pair(image: &Path, labels_dir: &Path, dirs: &AggregateDirs) -> DatasetResult<()> {
    let image_name = image
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let label_name = label_file_name(&image_name);
    let label = labels_dir.join(&label_name);
    if !label.is_file() {
        return Err(DatasetError::MissingLabel {
            image: image.to_path_buf(),
            label,
        });
    }

    fs::copy(image, dirs.train_images.join(&image_name)).map_err(DatasetError::io(image))?;
    fs::copy(&label, dirs.train_labels.join(&label_name)).map_err(DatasetError::io(&label))?;
    Ok(())
}

/// Recursively copy `src` into `dst`, keeping files already in `dst`
/// unless `src` has one with the same relative path.
pub fn copy_tree(src: &Path, dst: &Path) -> DatasetResult<usize> {
    require_dir(src)?;
    ensure_directory(dst)?;

    let mut copied = 0;
    for entry in WalkDir::new(src).skip_hidden(false).sort(true) {
        let entry = entry.map_err(|e| DatasetError::Io {
            path: src.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::Other, e.to_string()),
        })?;
        let path = entry.path();
        let relative = match path.strip_prefix(src) {
            Ok(relative) if !relative.as_os_str().is_empty() => relative.to_path_buf(),
            _ => continue,
        };
        let target = dst.join(relative);
        if entry.file_type().is_dir() {
            ensure_directory(&target)?;
        } else if entry.file_type().is_file() {
            fs::copy(&path, &target).map_err(DatasetError::io(&path))?;
            copied += 1;
        }
    }
    Ok(copied)
}
