//! Reorganizing raw BDD100K images into per-condition and per-split folders,
//! each with a reduced `{name, labels}` JSON file.

use log::info;
use rand::rngs::StdRng;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use crate::error::DatasetResult;
use crate::index::FileIndex;
use crate::materialize::{materialize_with, LabelArtifact, MaterializeParams, TransferMode};
use crate::split::split_in_two;
use crate::types::{AnnotationRecord, CategoryMap, MaterializationReport, TimeOfDay};

/// Per-group outcome, keyed by output folder name.
pub type GroupReports = BTreeMap<String, MaterializationReport>;

/// Name of the reduced JSON file written next to a group folder.
pub fn reduced_json_name(group: &str) -> String {
    format!("{} labels.json", group)
}

fn index_records(records: &[AnnotationRecord], images_root: &Path) -> DatasetResult<FileIndex> {
    let names: HashSet<&str> = records.iter().map(|r| r.name.as_str()).collect();
    FileIndex::build_for(images_root, &names)
}

fn materialize_group(
    records: &[AnnotationRecord],
    group: &str,
    index: &FileIndex,
    output: &Path,
    categories: &CategoryMap,
    transfer: TransferMode,
) -> DatasetResult<MaterializationReport> {
    let json_path = output.join(reduced_json_name(group));
    let report = materialize_with(
        records,
        &MaterializeParams {
            index,
            images_dir: &output.join(group),
            labels: LabelArtifact::ReducedJson(&json_path),
            categories,
            transfer,
            label: group,
        },
    )?;
    report.print_summary(group);
    Ok(report)
}

/// Group images into `<output>/<time of day>/` folders.
///
/// Each group also gets `<output>/<time of day> labels.json`. Records whose
/// image cannot be found still appear in their group's JSON.
pub fn organize_by_time_of_day(
    records: &[AnnotationRecord],
    images_root: &Path,
    output: &Path,
    categories: &CategoryMap,
    transfer: TransferMode,
) -> DatasetResult<GroupReports> {
    let index = index_records(records, images_root)?;

    let mut groups: BTreeMap<String, Vec<AnnotationRecord>> = BTreeMap::new();
    for record in records {
        let group = record.time_of_day();
        if group == TimeOfDay::Unknown {
            log::debug!("No time of day for {}", record.name);
        }
        groups
            .entry(group.folder_name())
            .or_default()
            .push(record.clone());
    }
    info!(
        "Organizing {} records into {} time-of-day groups",
        records.len(),
        groups.len()
    );

    let mut reports = GroupReports::new();
    for (group, members) in &groups {
        let report = materialize_group(members, group, &index, output, categories, transfer)?;
        reports.insert(group.clone(), report);
    }
    Ok(reports)
}

/// Split records into `test` and `val` folders.
///
/// The first `floor(test_ratio * n)` shuffled records go to `test`, the rest
/// to `val`. Writes `test labels.json` and `val labels.json` under `output`.
pub fn split_val_test(
    records: &[AnnotationRecord],
    images_root: &Path,
    output: &Path,
    test_ratio: f64,
    categories: &CategoryMap,
    rng: &mut StdRng,
) -> DatasetResult<GroupReports> {
    let (test, val) = split_in_two(records.to_vec(), test_ratio, rng)?;
    let index = index_records(records, images_root)?;

    let mut reports = GroupReports::new();
    for (group, members) in [("test", &test), ("val", &val)] {
        let report = materialize_group(
            members,
            group,
            &index,
            output,
            categories,
            TransferMode::Copy,
        )?;
        reports.insert(group.to_string(), report);
    }
    Ok(reports)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use std::fs;

    fn record(name: &str, timeofday: Option<&str>) -> AnnotationRecord {
        let mut record = AnnotationRecord::new(name, vec![]);
        if let Some(value) = timeofday {
            record
                .attributes
                .insert("timeofday".to_string(), serde_json::json!(value));
        }
        record
    }

    #[test]
    fn groups_by_normalized_time_of_day() {
        let src = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        for name in ["a.jpg", "b.jpg", "c.jpg", "d.jpg"] {
            fs::write(src.path().join(name), name).unwrap();
        }
        let records = vec![
            record("a.jpg", Some("daytime")),
            record("b.jpg", Some("undefined")),
            record("c.jpg", Some("dawn/dusk")),
            record("d.jpg", Some("night")),
            record("e.jpg", None),
        ];
        let categories = CategoryMap::bdd100k().unwrap();
        let reports = organize_by_time_of_day(
            &records,
            src.path(),
            out.path(),
            &categories,
            TransferMode::Copy,
        )
        .unwrap();

        let groups: Vec<&str> = reports.keys().map(String::as_str).collect();
        assert_eq!(groups, vec!["dawn&dusk", "daytime", "night", "unknown"]);
        assert_eq!(reports["night"].copied, 2);
        assert_eq!(reports["unknown"].missing, 1);
        assert!(out.path().join("night/b.jpg").exists());
        assert!(out.path().join("dawn&dusk/c.jpg").exists());
        assert!(out.path().join("night labels.json").exists());
        assert!(out.path().join("unknown labels.json").exists());
        assert!(src.path().join("a.jpg").exists());
    }

    #[test]
    fn val_test_split_writes_both_groups() {
        let src = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let records: Vec<AnnotationRecord> = (0..10)
            .map(|i| {
                let name = format!("{}.jpg", i);
                fs::write(src.path().join(&name), b"x").unwrap();
                record(&name, Some("daytime"))
            })
            .collect();
        let categories = CategoryMap::bdd100k().unwrap();
        let mut rng = StdRng::seed_from_u64(3);
        let reports =
            split_val_test(&records, src.path(), out.path(), 0.8, &categories, &mut rng).unwrap();

        assert_eq!(reports["test"].copied, 8);
        assert_eq!(reports["val"].copied, 2);
        assert_eq!(fs::read_dir(out.path().join("test")).unwrap().count(), 8);
        let val: serde_json::Value = serde_json::from_str(
            &fs::read_to_string(out.path().join("val labels.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(val.as_array().unwrap().len(), 2);
    }
}
