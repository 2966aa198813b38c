use log::{debug, info};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

use crate::conversion::convert_to_yolo_format;
use crate::error::{DatasetError, DatasetResult};
use crate::index::FileIndex;
use crate::types::{AnnotationRecord, CategoryMap, MaterializationReport, ReducedRecord};
use crate::utils::{
    create_progress_bar, ensure_directory, label_file_name, transfer_file, write_pretty_json,
};

/// How image files reach the destination tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransferMode {
    #[default]
    Copy,
    /// Rename out of the source tree. Meant for one-time reorganization only.
    Move,
}

/// Label artifact derived from each record.
#[derive(Debug, Clone, Copy)]
pub enum LabelArtifact<'a> {
    /// One YOLO `.txt` per record in this directory, only for records whose image was found.
    Yolo(&'a Path),
    /// One `{name, labels}` JSON array written to this file after the batch.
    ReducedJson(&'a Path),
    /// Images only.
    None,
}

/// Parameters for materializing one batch of records
#[derive(Debug, Clone, Copy)]
pub struct MaterializeParams<'a> {
    pub index: &'a FileIndex,
    pub images_dir: &'a Path,
    pub labels: LabelArtifact<'a>,
    pub categories: &'a CategoryMap,
    pub transfer: TransferMode,
    /// Progress bar label.
    pub label: &'a str,
}

/// Copy each record's image out of `source_root` and write its YOLO label file.
///
/// The source tree is walked once for the whole batch.
pub fn materialize(
    records: &[AnnotationRecord],
    source_root: &Path,
    images_dir: &Path,
    labels_dir: &Path,
    categories: &CategoryMap,
) -> DatasetResult<MaterializationReport> {
    let names: HashSet<&str> = records.iter().map(|r| r.name.as_str()).collect();
    let index = FileIndex::build_for(source_root, &names)?;
    materialize_with(
        records,
        &MaterializeParams {
            index: &index,
            images_dir,
            labels: LabelArtifact::Yolo(labels_dir),
            categories,
            transfer: TransferMode::Copy,
            label: "Materialize",
        },
    )
}

/// Materialize a batch against a prebuilt index.
///
/// Missing images are counted in the report rather than failing the batch.
pub fn materialize_with(
    records: &[AnnotationRecord],
    params: &MaterializeParams,
) -> DatasetResult<MaterializationReport> {
    ensure_directory(params.images_dir)?;
    if let LabelArtifact::Yolo(labels_dir) = params.labels {
        ensure_directory(labels_dir)?;
    }

    let mut report = MaterializationReport::default();
    let mut reduced: Vec<ReducedRecord> = Vec::new();
    let pb = create_progress_bar(records.len() as u64, params.label);

    for record in records {
        report.processed += 1;
        let found = match params.index.require(&record.name) {
            Ok(src) => {
                let dst = params.images_dir.join(sanitize_filename::sanitize(&record.name));
                transfer_file(src, &dst, params.transfer == TransferMode::Move)?;
                report.copied += 1;
                true
            }
            Err(DatasetError::MissingSourceFile { name }) => {
                debug!("Image not found for record: {}", name);
                report.missing += 1;
                false
            }
            Err(e) => return Err(e),
        };

        match params.labels {
            LabelArtifact::Yolo(labels_dir) if found => {
                if write_yolo_label(record, labels_dir, params.categories, &mut report)? {
                    report.label_files += 1;
                }
            }
            LabelArtifact::ReducedJson(_) => reduced.push(record.reduced()),
            _ => {}
        }
        pb.inc(1);
    }
    pb.finish_with_message(format!("{} processing complete", params.label));

    if let LabelArtifact::ReducedJson(path) = params.labels {
        write_pretty_json(path, &reduced)?;
        info!("Wrote {} reduced records to {}", reduced.len(), path.display());
    }

    Ok(report)
}

/// Write YOLO label files for `records` without touching any image.
pub fn write_label_files(
    records: &[AnnotationRecord],
    labels_dir: &Path,
    categories: &CategoryMap,
) -> DatasetResult<MaterializationReport> {
    ensure_directory(labels_dir)?;
    let mut report = MaterializationReport::default();
    let pb = create_progress_bar(records.len() as u64, "Labels");
    for record in records {
        report.processed += 1;
        if write_yolo_label(record, labels_dir, categories, &mut report)? {
            report.label_files += 1;
        }
        pb.inc(1);
    }
    pb.finish_with_message("Label conversion complete");
    Ok(report)
}

// Returns whether a file was written; records with no qualifying label get none.
fn write_yolo_label(
    record: &AnnotationRecord,
    labels_dir: &Path,
    categories: &CategoryMap,
    report: &mut MaterializationReport,
) -> DatasetResult<bool> {
    let conversion = convert_to_yolo_format(record, categories);
    report.dropped_labels += conversion.dropped;
    report.invalid_dimensions += conversion.invalid_dimensions;

    match conversion.contents() {
        Some(contents) => {
            let path = labels_dir.join(label_file_name(&record.name));
            fs::write(&path, contents).map_err(DatasetError::io(&path))?;
            Ok(true)
        }
        None => Ok(false),
    }
}
