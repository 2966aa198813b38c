use indicatif::{ProgressBar, ProgressStyle};
use log::info;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::{DatasetError, DatasetResult};

/// Create a progress bar with the given length and label
pub fn create_progress_bar(len: u64, label: &str) -> ProgressBar {
    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(&format!(
                "{{spinner:.green}} [{}] [{{elapsed_precise}}] [{{bar:40.cyan/blue}}] {{pos}}/{{len}} ({{eta}})",
                label
            ))
            .progress_chars("#>-"),
    );
    pb
}

/// Create a directory (and its parents) if it does not exist yet.
///
/// Existing directories and their contents are left alone.
pub fn ensure_directory(path: &Path) -> DatasetResult<PathBuf> {
    fs::create_dir_all(path).map_err(DatasetError::io(path))?;
    Ok(path.to_path_buf())
}

/// Use `seed` when given, otherwise derive one from the wall clock.
///
/// The chosen value is logged so a run can be repeated with `--seed`.
pub fn resolve_seed(seed: Option<u64>) -> u64 {
    let seed = seed.unwrap_or_else(|| {
        let now = chrono::Utc::now();
        now.timestamp_nanos_opt()
            .map(|nanos| nanos as u64)
            .unwrap_or_else(|| now.timestamp() as u64)
    });
    info!("Using random seed {}", seed);
    seed
}

pub fn seeded_rng(seed: Option<u64>) -> StdRng {
    StdRng::seed_from_u64(resolve_seed(seed))
}

/// Serialize `value` as JSON with 4-space indentation.
pub fn write_pretty_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> DatasetResult<()> {
    let file = File::create(path).map_err(DatasetError::io(path))?;
    let mut writer = BufWriter::new(file);
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut writer, formatter);
    value
        .serialize(&mut serializer)
        .map_err(DatasetError::json(path))?;
    writer.flush().map_err(DatasetError::io(path))
}

/// Copy `src` to `dst`, or rename it when `move_file` is set.
///
/// Renames that cross filesystems fall back to copy and delete.
pub fn transfer_file(src: &Path, dst: &Path, move_file: bool) -> DatasetResult<()> {
    if move_file {
        if fs::rename(src, dst).is_ok() {
            return Ok(());
        }
        fs::copy(src, dst).map_err(DatasetError::io(src))?;
        fs::remove_file(src).map_err(DatasetError::io(src))
    } else {
        fs::copy(src, dst).map_err(DatasetError::io(src))?;
        Ok(())
    }
}

/// Label file name for an image: the sanitized stem with a `.txt` extension.
pub fn label_file_name(image_name: &str) -> String {
    let stem = Path::new(image_name)
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| image_name.to_string());
    format!(
        "{}.{}",
        sanitize_filename::sanitize(stem),
        crate::types::LABEL_EXTENSION
    )
}
