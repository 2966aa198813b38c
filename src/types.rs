use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::path::PathBuf;
use std::sync::OnceLock;

use crate::error::{DatasetError, DatasetResult};

// Supported image formats
pub const IMG_FORMATS: &[&str] = &[
    "bmp", "dng", "jpeg", "jpg", "mpo", "png", "tif", "tiff", "webp", "pfm",
];

// Precomputed HashSet of image extensions for fast lookup
pub static IMAGE_EXTENSIONS_SET: OnceLock<HashSet<String>> = OnceLock::new();

/// Get the image extensions set
pub fn get_image_extensions_set() -> &'static HashSet<String> {
    IMAGE_EXTENSIONS_SET.get_or_init(|| IMG_FORMATS.iter().map(|ext| ext.to_lowercase()).collect())
}

/// Image size assumed for records that carry no `width`/`height`.
pub const DEFAULT_IMAGE_WIDTH: f64 = 1280.0;
pub const DEFAULT_IMAGE_HEIGHT: f64 = 720.0;

/// The ten BDD100K detection categories, in class-id order.
pub const BDD100K_CATEGORIES: &[&str] = &[
    "bike",
    "bus",
    "car",
    "motor",
    "person",
    "rider",
    "traffic light",
    "traffic sign",
    "train",
    "truck",
];

/// Extension used for YOLO label files.
pub const LABEL_EXTENSION: &str = "txt";

// Corner-format box in pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Box2d {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

// One annotated object. Fields other than `category`/`box2d` are carried
// through untouched so reduced JSON output keeps them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectLabel {
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub box2d: Option<Box2d>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ObjectLabel {
    pub fn new(category: impl Into<String>, box2d: Option<Box2d>) -> Self {
        Self {
            category: category.into(),
            box2d,
            extra: serde_json::Map::new(),
        }
    }
}

// One entry per image in a BDD100K-style store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationRecord {
    pub name: String,
    #[serde(default)]
    pub attributes: HashMap<String, serde_json::Value>,
    // Signed; non-positive sizes are rejected per label at conversion.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    #[serde(default)]
    pub labels: Vec<ObjectLabel>,
}

impl AnnotationRecord {
    pub fn new(name: impl Into<String>, labels: Vec<ObjectLabel>) -> Self {
        Self {
            name: name.into(),
            attributes: HashMap::new(),
            width: None,
            height: None,
            labels,
        }
    }

    /// Image size in pixels, falling back to 1280x720.
    pub fn image_size(&self) -> (f64, f64) {
        (
            self.width.unwrap_or(DEFAULT_IMAGE_WIDTH),
            self.height.unwrap_or(DEFAULT_IMAGE_HEIGHT),
        )
    }

    pub fn time_of_day(&self) -> TimeOfDay {
        match self.attributes.get("timeofday").and_then(|v| v.as_str()) {
            Some(value) => TimeOfDay::parse(value),
            None => TimeOfDay::Unknown,
        }
    }

    /// The `{name, labels}` projection written to reduced JSON files.
    pub fn reduced(&self) -> ReducedRecord<'_> {
        ReducedRecord {
            name: &self.name,
            labels: &self.labels,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ReducedRecord<'a> {
    pub name: &'a str,
    pub labels: &'a [ObjectLabel],
}

/// Time-of-day bucket used to group images into sub-folders.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TimeOfDay {
    Daytime,
    Night,
    DawnDusk,
    Unknown,
    Other(String),
}

impl TimeOfDay {
    /// `"undefined"` images are filed with the night ones.
    pub fn parse(value: &str) -> Self {
        match value {
            "daytime" => TimeOfDay::Daytime,
            "night" | "undefined" => TimeOfDay::Night,
            "dawn/dusk" => TimeOfDay::DawnDusk,
            "unknown" => TimeOfDay::Unknown,
            other => TimeOfDay::Other(other.to_string()),
        }
    }

    pub fn folder_name(&self) -> String {
        match self {
            TimeOfDay::Daytime => "daytime".to_string(),
            TimeOfDay::Night => "night".to_string(),
            TimeOfDay::DawnDusk => "dawn&dusk".to_string(),
            TimeOfDay::Unknown => "unknown".to_string(),
            TimeOfDay::Other(value) => sanitize_filename::sanitize(value),
        }
    }
}

/// Named partition of a dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Split {
    Train,
    Val,
    Test,
}

impl Split {
    pub const ALL: [Split; 3] = [Split::Train, Split::Val, Split::Test];

    pub fn as_str(&self) -> &'static str {
        match self {
            Split::Train => "train",
            Split::Val => "val",
            Split::Test => "test",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Split::Train => "Train",
            Split::Val => "Val",
            Split::Test => "Test",
        }
    }
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable category name to class id table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryMap {
    by_name: HashMap<String, usize>,
    by_id: BTreeMap<usize, String>,
}

impl CategoryMap {
    /// Build a map from explicit `(name, id)` pairs, rejecting duplicate names or ids.
    pub fn from_pairs<I, S>(pairs: I) -> DatasetResult<Self>
    where
        I: IntoIterator<Item = (S, usize)>,
        S: Into<String>,
    {
        let mut by_name = HashMap::new();
        let mut by_id = BTreeMap::new();
        for (name, id) in pairs {
            let name = name.into();
            if by_name.contains_key(&name) {
                return Err(DatasetError::InvalidCategoryMap(format!(
                    "duplicate category name '{}'",
                    name
                )));
            }
            if let Some(existing) = by_id.get(&id) {
                return Err(DatasetError::InvalidCategoryMap(format!(
                    "class id {} assigned to both '{}' and '{}'",
                    id, existing, name
                )));
            }
            by_name.insert(name.clone(), id);
            by_id.insert(id, name);
        }
        Ok(Self { by_name, by_id })
    }

    /// Ids follow the position of each name in `names`.
    pub fn from_names<I, S>(names: I) -> DatasetResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::from_pairs(names.into_iter().enumerate().map(|(id, name)| (name, id)))
    }

    pub fn bdd100k() -> DatasetResult<Self> {
        Self::from_names(BDD100K_CATEGORIES.iter().copied())
    }

    pub fn id(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    pub fn name(&self, id: usize) -> Option<&str> {
        self.by_id.get(&id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// `(id, name)` pairs ordered by id.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &str)> {
        self.by_id.iter().map(|(id, name)| (*id, name.as_str()))
    }
}

// Struct to hold the paths to the output directories for train/val/test splits
#[derive(Debug, Clone)]
pub struct OutputDirs {
    pub base_dir: PathBuf,
    pub train_images_dir: PathBuf,
    pub val_images_dir: PathBuf,
    pub test_images_dir: PathBuf,
    pub train_labels_dir: PathBuf,
    pub val_labels_dir: PathBuf,
    pub test_labels_dir: PathBuf,
}

impl OutputDirs {
    pub fn images_dir(&self, split: Split) -> &PathBuf {
        match split {
            Split::Train => &self.train_images_dir,
            Split::Val => &self.val_images_dir,
            Split::Test => &self.test_images_dir,
        }
    }

    pub fn labels_dir(&self, split: Split) -> &PathBuf {
        match split {
            Split::Train => &self.train_labels_dir,
            Split::Val => &self.val_labels_dir,
            Split::Test => &self.test_labels_dir,
        }
    }
}

// Struct to hold the split datasets for training, validation, and testing
#[derive(Debug, Clone, PartialEq)]
pub struct SplitData<T> {
    pub train: Vec<T>,
    pub val: Vec<T>,
    pub test: Vec<T>,
}

impl<T> SplitData<T> {
    pub fn get(&self, split: Split) -> &[T] {
        match split {
            Split::Train => &self.train,
            Split::Val => &self.val,
            Split::Test => &self.test,
        }
    }

    pub fn len(&self) -> usize {
        self.train.len() + self.val.len() + self.test.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// Counters collected while materializing a batch of records
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MaterializationReport {
    pub processed: usize,
    pub copied: usize,
    pub missing: usize,
    pub label_files: usize,
    pub dropped_labels: usize,
    pub invalid_dimensions: usize,
}

impl MaterializationReport {
    pub fn merge(&mut self, other: &MaterializationReport) {
        self.processed += other.processed;
        self.copied += other.copied;
        self.missing += other.missing;
        self.label_files += other.label_files;
        self.dropped_labels += other.dropped_labels;
        self.invalid_dimensions += other.invalid_dimensions;
    }

    pub fn print_summary(&self, title: &str) {
        log::info!("=== {} Summary ===", title);
        log::info!("Records processed: {}", self.processed);
        log::info!("Images copied: {}", self.copied);
        log::info!("Images missing: {}", self.missing);
        log::info!("Label files written: {}", self.label_files);
        log::info!(
            "Labels dropped (unknown category or no box): {}",
            self.dropped_labels
        );
        log::info!(
            "Labels dropped (invalid image dimensions): {}",
            self.invalid_dimensions
        );

        let total_skipped = self.missing + self.invalid_dimensions;
        if total_skipped > 0 {
            log::warn!(
                "Total skipped items: {} (missing image: {}, invalid dimensions: {})",
                total_skipped,
                self.missing,
                self.invalid_dimensions
            );
        }
    }
}
