use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::str::FromStr;

use crate::aggregate::{SamplingPolicy, SourceFolder};
use crate::error::{DatasetError, DatasetResult};

/// Command-line arguments for preparing BDD100K data for YOLO training.
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Split an annotation store and build a YOLO dataset with a manifest
    Convert(ConvertArgs),
    /// Write YOLO label files for every record of a store, without images
    Labels(LabelsArgs),
    /// Group images and reduced JSON by time of day
    Organize(OrganizeArgs),
    /// Split a store into `test` and `val` folders with reduced JSON
    ValTest(ValTestArgs),
    /// Merge several YOLO folders into one training set
    Aggregate(AggregateArgs),
}

#[derive(clap::Args, Debug, Clone)]
pub struct ConvertArgs {
    /// BDD100K JSON annotation store
    #[arg(short = 's', long = "store")]
    pub store: PathBuf,

    /// Directory searched recursively for the images
    #[arg(short = 'i', long = "images")]
    pub images: PathBuf,

    /// Output directory for the YOLO dataset
    #[arg(short = 'o', long = "output")]
    pub output: PathBuf,

    /// Proportion of the dataset to use for training
    #[arg(long = "train_ratio", default_value_t = 0.7, value_parser = validate_size)]
    pub train_ratio: f64,

    /// Proportion of the dataset to use for validation
    #[arg(long = "val_ratio", default_value_t = 0.2, value_parser = validate_size)]
    pub val_ratio: f64,

    /// Seed for random shuffling; derived from the clock when omitted
    #[arg(long = "seed")]
    pub seed: Option<u64>,
}

#[derive(clap::Args, Debug, Clone)]
pub struct LabelsArgs {
    /// BDD100K JSON annotation store
    #[arg(short = 's', long = "store")]
    pub store: PathBuf,

    /// Directory receiving the `.txt` label files
    #[arg(short = 'o', long = "output")]
    pub output: PathBuf,
}

#[derive(clap::Args, Debug, Clone)]
pub struct OrganizeArgs {
    /// BDD100K JSON annotation store
    #[arg(short = 's', long = "store")]
    pub store: PathBuf,

    /// Directory searched recursively for the images
    #[arg(short = 'i', long = "images")]
    pub images: PathBuf,

    /// Output directory receiving one folder per time of day
    #[arg(short = 'o', long = "output")]
    pub output: PathBuf,

    /// Move images instead of copying them
    #[arg(long = "move")]
    pub move_files: bool,
}

#[derive(clap::Args, Debug, Clone)]
pub struct ValTestArgs {
    /// BDD100K JSON annotation store
    #[arg(short = 's', long = "store")]
    pub store: PathBuf,

    /// Directory searched recursively for the images
    #[arg(short = 'i', long = "images")]
    pub images: PathBuf,

    /// Output directory receiving `test/` and `val/`
    #[arg(short = 'o', long = "output")]
    pub output: PathBuf,

    /// Proportion of the records assigned to the test folder
    #[arg(long = "test_ratio", default_value_t = 0.8, value_parser = validate_size)]
    pub test_ratio: f64,

    /// Seed for random shuffling; derived from the clock when omitted
    #[arg(long = "seed")]
    pub seed: Option<u64>,
}

#[derive(clap::Args, Debug, Clone)]
pub struct AggregateArgs {
    /// Source image folder; repeat once per source
    #[arg(long = "image_folder", required = true)]
    pub image_folders: Vec<PathBuf>,

    /// Label folder matching each `--image_folder`, in the same order
    #[arg(long = "label_folder", required = true)]
    pub label_folders: Vec<PathBuf>,

    /// Validation image folder copied as a whole
    #[arg(long = "val_images")]
    pub val_images: PathBuf,

    /// Validation label folder copied as a whole
    #[arg(long = "val_labels")]
    pub val_labels: PathBuf,

    /// Output dataset directory
    #[arg(short = 'o', long = "output")]
    pub output: PathBuf,

    /// Copy every image or sample an even share from each folder
    #[arg(long = "mode", value_enum, default_value = "sample")]
    pub mode: Mode,

    /// Total number of images to sample in `sample` mode
    #[arg(long = "size", default_value_t = 512)]
    pub size: usize,

    /// Seed for sampling; derived from the clock when omitted
    #[arg(long = "seed")]
    pub seed: Option<u64>,
}

// Aggregation mode
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug)]
pub enum Mode {
    All,
    Sample,
}

impl AggregateArgs {
    pub fn sources(&self) -> DatasetResult<Vec<SourceFolder>> {
        if self.image_folders.len() != self.label_folders.len() {
            return Err(DatasetError::InvalidArgument(format!(
                "{} image folders but {} label folders",
                self.image_folders.len(),
                self.label_folders.len()
            )));
        }
        Ok(self
            .image_folders
            .iter()
            .zip(&self.label_folders)
            .map(|(images, labels)| SourceFolder::new(images, labels))
            .collect())
    }

    pub fn policy(&self) -> SamplingPolicy {
        match self.mode {
            Mode::All => SamplingPolicy::CopyAll,
            Mode::Sample => SamplingPolicy::EvenQuota(self.size),
        }
    }
}

// Validate that the size is between 0.0 and 1.0
fn validate_size(s: &str) -> Result<f64, String> {
    match f64::from_str(s) {
        Ok(val) if (0.0..=1.0).contains(&val) => Ok(val),
        _ => Err("SIZE must be between 0.0 and 1.0".to_string()),
    }
}
