//! BDD100K to YOLO dataset converter
//!
//! This library turns BDD100K JSON annotation stores into YOLO detection
//! datasets: label conversion, train/val/test splitting, image
//! materialization, time-of-day grouping and multi-folder aggregation.

pub mod aggregate;
pub mod capability;
pub mod config;
pub mod conversion;
pub mod dataset;
pub mod error;
pub mod index;
pub mod io;
pub mod materialize;
pub mod organize;
pub mod split;
pub mod store;
pub mod tuning;
pub mod types;
pub mod utils;

// Re-export commonly used types and functions
pub use aggregate::{aggregate, AggregateParams, SamplingPolicy, SourceFolder};
pub use config::{Args, Command};
pub use conversion::{convert_to_yolo_format, to_normalized_center_box, CenterBox};
pub use dataset::{convert_split, process_dataset, ConversionOutcome, ConvertParams};
pub use error::{DatasetError, DatasetResult};
pub use io::{scaffold, write_manifest, DatasetManifest, SplitPaths};
pub use materialize::{materialize, write_label_files, TransferMode};
pub use organize::{organize_by_time_of_day, split_val_test};
pub use types::{
    AnnotationRecord, Box2d, CategoryMap, MaterializationReport, ObjectLabel, OutputDirs, Split,
    SplitData, TimeOfDay,
};
