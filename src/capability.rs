//! Boundaries to the external detector framework.
//!
//! Training, export and inference are never implemented here; callers inject
//! an implementation of [`Trainer`] or [`Detector`].

use std::error::Error;
use std::path::{Path, PathBuf};

use crate::tuning::Hyperparameters;
use crate::types::{Box2d, CategoryMap};

/// Error type returned by capability implementations.
pub type CapabilityError = Box<dyn Error + Send + Sync>;

/// Result of one training run.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainedModel<M> {
    pub model: M,
    /// mAP@50-95 on the validation split.
    pub metric: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Onnx { opset: u32, simplify: bool },
    TorchScript,
}

impl Default for ExportFormat {
    fn default() -> Self {
        ExportFormat::Onnx {
            opset: 12,
            simplify: true,
        }
    }
}

pub trait Trainer {
    type Model;

    /// Train on the dataset described by `manifest`.
    fn train(
        &mut self,
        manifest: &Path,
        params: &Hyperparameters,
        epochs: u32,
    ) -> Result<TrainedModel<Self::Model>, CapabilityError>;

    /// Write `model` in `format` and return the produced file.
    fn export(&self, model: &Self::Model, format: ExportFormat)
        -> Result<PathBuf, CapabilityError>;
}

/// One tracked object in a frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    pub bbox: Box2d,
    pub class_id: usize,
    /// `None` until the tracker has assigned an id.
    pub track_id: Option<u64>,
}

pub trait Detector {
    type Frame;

    fn predict_and_track(&mut self, frame: &Self::Frame) -> Result<Vec<Detection>, CapabilityError>;
}

/// Detections paired with their category names, for overlays.
///
/// Detections without a track id or with an unknown class are skipped.
pub fn named_detections<'a>(
    detections: &'a [Detection],
    categories: &'a CategoryMap,
) -> Vec<(&'a str, &'a Detection)> {
    detections
        .iter()
        .filter(|d| d.track_id.is_some())
        .filter_map(|d| categories.name(d.class_id).map(|name| (name, d)))
        .collect()
}

/// Runs detection on every `stride`-th frame only.
#[derive(Debug, Clone)]
pub struct FrameStride {
    stride: u64,
    count: u64,
}

impl FrameStride {
    pub fn new(stride: u64) -> Self {
        Self {
            stride: stride.max(1),
            count: 0,
        }
    }

    /// Count a frame and report whether it should go to the detector.
    pub fn tick(&mut self) -> bool {
        self.count += 1;
        self.count % self.stride == 0
    }
}

impl Default for FrameStride {
    fn default() -> Self {
        Self::new(2)
    }
}

/// Feed the frames picked by `stride` through `detector`.
pub fn detect_frames<D, I>(
    detector: &mut D,
    frames: I,
    stride: &mut FrameStride,
) -> Result<Vec<Vec<Detection>>, CapabilityError>
where
    D: Detector,
    I: IntoIterator<Item = D::Frame>,
{
    let mut results = Vec::new();
    for frame in frames {
        if stride.tick() {
            results.push(detector.predict_and_track(&frame)?);
        }
    }
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedDetector;

    impl Detector for FixedDetector {
        type Frame = u32;

        fn predict_and_track(&mut self, frame: &u32) -> Result<Vec<Detection>, CapabilityError> {
            Ok(vec![Detection {
                bbox: Box2d {
                    x1: 0.0,
                    y1: 0.0,
                    x2: 1.0,
                    y2: 1.0,
                },
                class_id: *frame as usize,
                track_id: Some(u64::from(*frame)),
            }])
        }
    }

    #[test]
    fn every_second_frame_is_processed() {
        let mut detector = FixedDetector;
        let mut stride = FrameStride::default();
        let results = detect_frames(&mut detector, 1..=6, &mut stride).unwrap();
        let classes: Vec<usize> = results.iter().map(|d| d[0].class_id).collect();
        assert_eq!(classes, vec![2, 4, 6]);
    }

    #[test]
    fn detections_are_named_through_the_category_map() {
        let categories = CategoryMap::bdd100k().unwrap();
        let bbox = Box2d {
            x1: 0.0,
            y1: 0.0,
            x2: 1.0,
            y2: 1.0,
        };
        let detections = vec![
            Detection {
                bbox,
                class_id: 2,
                track_id: Some(1),
            },
            Detection {
                bbox,
                class_id: 42,
                track_id: Some(2),
            },
            Detection {
                bbox,
                class_id: 4,
                track_id: None,
            },
        ];
        let named = named_detections(&detections, &categories);
        assert_eq!(named.len(), 1);
        assert_eq!(named[0].0, "car");
    }
}
