//! Loading BDD100K-style annotation stores.

use log::debug;
use serde_json::Value;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::error::{DatasetError, DatasetResult};
use crate::types::AnnotationRecord;

/// Read a JSON array of per-image annotation records.
///
/// The top level must be an array and every element an object with a string
/// `name`; anything else is reported as [`DatasetError::MalformedStore`].
pub fn load(path: &Path) -> DatasetResult<Vec<AnnotationRecord>> {
    // Parse JSON directly from the file stream
    let file = File::open(path).map_err(DatasetError::io(path))?;
    let value: Value =
        serde_json::from_reader(BufReader::new(file)).map_err(|e| DatasetError::MalformedStore {
            path: path.to_path_buf(),
            msg: e.to_string(),
        })?;

    let records = parse_records(value).map_err(|msg| DatasetError::MalformedStore {
        path: path.to_path_buf(),
        msg,
    })?;
    debug!("Loaded {} records from {}", records.len(), path.display());
    Ok(records)
}

fn parse_records(value: Value) -> Result<Vec<AnnotationRecord>, String> {
    let items = match value {
        Value::Array(items) => items,
        other => return Err(format!("expected a list of records, found {}", kind(&other))),
    };

    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            match item.get("name") {
                Some(Value::String(_)) => {}
                Some(_) => return Err(format!("record {} has a non-string `name`", index)),
                None => return Err(format!("record {} has no `name`", index)),
            }
            serde_json::from_value(item).map_err(|e| format!("record {}: {}", index, e))
        })
        .collect()
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_store(contents: &str) -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("labels.json");
        fs::write(&path, contents).unwrap();
        (dir, path)
    }

    #[test]
    fn loads_records() {
        let (_dir, path) = write_store(
            r#"[
                {"name": "a.jpg", "attributes": {"timeofday": "night"},
                 "labels": [{"category": "car", "box2d": {"x1": 1, "y1": 2, "x2": 3, "y2": 4}}]},
                {"name": "b.jpg", "width": 640, "height": 480}
            ]"#,
        );
        let records = load(&path).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].labels[0].box2d.unwrap().x2, 3.0);
        assert_eq!(records[1].image_size(), (640.0, 480.0));
    }

    #[test]
    fn rejects_non_list() {
        let (_dir, path) = write_store(r#"{"name": "a.jpg"}"#);
        assert!(matches!(load(&path), Err(DatasetError::MalformedStore { .. })));
    }

    #[test]
    fn rejects_record_without_name() {
        let (_dir, path) = write_store(r#"[{"name": "a.jpg"}, {"labels": []}]"#);
        match load(&path) {
            Err(DatasetError::MalformedStore { msg, .. }) => assert!(msg.contains("record 1")),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn negative_dimensions_only_drop_that_records_labels() {
        let (_dir, path) = write_store(
            r#"[
                {"name": "a.jpg", "width": -1, "height": 720,
                 "labels": [{"category": "car", "box2d": {"x1": 1, "y1": 2, "x2": 3, "y2": 4}}]},
                {"name": "b.jpg",
                 "labels": [{"category": "car", "box2d": {"x1": 110, "y1": 100, "x2": 210, "y2": 300}}]}
            ]"#,
        );
        let records = load(&path).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].image_size(), (-1.0, 720.0));

        let categories = crate::types::CategoryMap::bdd100k().unwrap();
        let bad = crate::conversion::convert_to_yolo_format(&records[0], &categories);
        assert!(bad.contents().is_none());
        assert_eq!(bad.invalid_dimensions, 1);

        let good = crate::conversion::convert_to_yolo_format(&records[1], &categories);
        assert_eq!(
            good.contents().as_deref(),
            Some("2 0.125000 0.277778 0.078125 0.277778")
        );
    }

    #[test]
    fn rejects_invalid_json() {
        let (_dir, path) = write_store("[{");
        assert!(matches!(load(&path), Err(DatasetError::MalformedStore { .. })));
    }
}
