use log::info;
use rand::rngs::StdRng;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::error::DatasetResult;
use crate::index::FileIndex;
use crate::io::{scaffold, write_manifest, SplitPaths};
use crate::materialize::{materialize_with, LabelArtifact, MaterializeParams, TransferMode};
use crate::split::split_by_ratio;
use crate::store;
use crate::types::{AnnotationRecord, CategoryMap, MaterializationReport, Split, SplitData};

/// Inputs of the store-to-YOLO conversion.
#[derive(Debug, Clone)]
pub struct ConvertParams<'a> {
    pub store: &'a Path,
    pub images_root: &'a Path,
    pub output: &'a Path,
    pub train_ratio: f64,
    pub val_ratio: f64,
}

#[derive(Debug, Clone)]
pub struct ConversionOutcome {
    pub train: MaterializationReport,
    pub val: MaterializationReport,
    pub test: MaterializationReport,
    pub manifest: PathBuf,
}

impl ConversionOutcome {
    pub fn get(&self, split: Split) -> &MaterializationReport {
        match split {
            Split::Train => &self.train,
            Split::Val => &self.val,
            Split::Test => &self.test,
        }
    }

    pub fn total(&self) -> MaterializationReport {
        let mut total = MaterializationReport::default();
        for split in Split::ALL {
            total.merge(self.get(split));
        }
        total
    }
}

/// Main dataset processing pipeline
///
/// Loads the store, splits it by ratio, materializes every split into a
/// YOLO layout under `output` and writes the manifest last.
pub fn process_dataset(
    params: &ConvertParams,
    categories: &CategoryMap,
    rng: &mut StdRng,
) -> DatasetResult<ConversionOutcome> {
    let records = store::load(params.store)?;
    info!("Read and parsed {} records.", records.len());

    let split_data = split_by_ratio(records, params.train_ratio, params.val_ratio, rng)?;
    info!(
        "Split into {} train, {} val and {} test records",
        split_data.train.len(),
        split_data.val.len(),
        split_data.test.len()
    );

    convert_split(&split_data, params.images_root, params.output, categories)
}

/// Materialize an already split record set into a YOLO layout under `output`.
pub fn convert_split(
    split_data: &SplitData<AnnotationRecord>,
    images_root: &Path,
    output: &Path,
    categories: &CategoryMap,
) -> DatasetResult<ConversionOutcome> {
    let output_dirs = scaffold(output)?;

    let names: HashSet<&str> = Split::ALL
        .iter()
        .flat_map(|&split| split_data.get(split))
        .map(|record| record.name.as_str())
        .collect();
    let index = FileIndex::build_for(images_root, &names)?;

    let run = |split: Split| -> DatasetResult<MaterializationReport> {
        let report = materialize_with(
            split_data.get(split),
            &MaterializeParams {
                index: &index,
                images_dir: output_dirs.images_dir(split),
                labels: LabelArtifact::Yolo(output_dirs.labels_dir(split)),
                categories,
                transfer: TransferMode::Copy,
                label: split.label(),
            },
        )?;
        report.print_summary(split.label());
        Ok(report)
    };
    let train = run(Split::Train)?;
    let val = run(Split::Val)?;
    let test = run(Split::Test)?;

    info!("Creating dataset.yaml file...");
    let manifest = write_manifest(output, categories, SplitPaths::yolo_layout())?;

    let outcome = ConversionOutcome {
        train,
        val,
        test,
        manifest,
    };
    outcome.total().print_summary("Conversion");
    info!("Conversion process completed successfully.");
    Ok(outcome)
}
