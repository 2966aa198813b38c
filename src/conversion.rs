use log::debug;

use crate::error::{DatasetError, DatasetResult};
use crate::types::{AnnotationRecord, Box2d, CategoryMap};

/// Normalized center-format box: `(x_center, y_center, width, height)` in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CenterBox {
    pub x_center: f64,
    pub y_center: f64,
    pub width: f64,
    pub height: f64,
}

impl CenterBox {
    /// Map back to pixel corners for an image of `image_width` x `image_height`.
    pub fn to_corners(&self, image_width: f64, image_height: f64) -> Box2d {
        let half_w = self.width * image_width / 2.0;
        let half_h = self.height * image_height / 2.0;
        let cx = self.x_center * image_width;
        let cy = self.y_center * image_height;
        Box2d {
            x1: cx - half_w,
            y1: cy - half_h,
            x2: cx + half_w,
            y2: cy + half_h,
        }
    }
}

/// Convert a corner-format pixel box into a normalized center-format box.
pub fn to_normalized_center_box(
    corners: &Box2d,
    image_width: f64,
    image_height: f64,
) -> DatasetResult<CenterBox> {
    let valid = |v: f64| v.is_finite() && v > 0.0;
    if !valid(image_width) || !valid(image_height) {
        return Err(DatasetError::InvalidDimensions {
            width: image_width,
            height: image_height,
        });
    }

    Ok(CenterBox {
        x_center: (corners.x1 + corners.x2) / 2.0 / image_width,
        y_center: (corners.y1 + corners.y2) / 2.0 / image_height,
        width: (corners.x2 - corners.x1) / image_width,
        height: (corners.y2 - corners.y1) / image_height,
    })
}

/// YOLO lines produced for one record, plus what was left out.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct LabelConversion {
    pub lines: Vec<String>,
    /// Labels with an unknown category or no `box2d`.
    pub dropped: usize,
    /// Labels skipped because the image size was zero.
    pub invalid_dimensions: usize,
}

impl LabelConversion {
    /// Label file contents, or `None` when no label qualified.
    pub fn contents(&self) -> Option<String> {
        if self.lines.is_empty() {
            None
        } else {
            Some(self.lines.join("\n"))
        }
    }
}

/// Convert a record's labels to YOLO bounding-box lines
pub fn convert_to_yolo_format(
    record: &AnnotationRecord,
    categories: &CategoryMap,
) -> LabelConversion {
    let (width, height) = record.image_size();
    let mut conversion = LabelConversion {
        lines: Vec::with_capacity(record.labels.len()),
        ..Default::default()
    };

    for label in &record.labels {
        let (class_id, corners) = match (categories.id(&label.category), label.box2d.as_ref()) {
            (Some(class_id), Some(corners)) => (class_id, corners),
            _ => {
                conversion.dropped += 1;
                continue;
            }
        };

        match to_normalized_center_box(corners, width, height) {
            Ok(b) => conversion.lines.push(format!(
                "{} {:.6} {:.6} {:.6} {:.6}",
                class_id, b.x_center, b.y_center, b.width, b.height
            )),
            Err(e) => {
                debug!("Skipping label in {}: {}", record.name, e);
                conversion.invalid_dimensions += 1;
            }
        }
    }

    conversion
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ObjectLabel;

    fn round4(v: f64) -> f64 {
        (v * 10_000.0).round() / 10_000.0
    }

    #[test]
    fn converts_known_box() {
        let corners = Box2d {
            x1: 100.0,
            y1: 100.0,
            x2: 200.0,
            y2: 300.0,
        };
        let b = to_normalized_center_box(&corners, 1280.0, 720.0).unwrap();
        assert_eq!(round4(b.x_center), 0.1172);
        assert_eq!(round4(b.y_center), 0.2778);
        assert_eq!(round4(b.width), 0.0781);
        assert_eq!(round4(b.height), 0.2778);
    }

    #[test]
    fn conversion_round_trips() {
        let corners = Box2d {
            x1: 13.5,
            y1: 240.25,
            x2: 977.0,
            y2: 701.75,
        };
        let back = to_normalized_center_box(&corners, 1280.0, 720.0)
            .unwrap()
            .to_corners(1280.0, 720.0);
        for (a, b) in [
            (corners.x1, back.x1),
            (corners.y1, back.y1),
            (corners.x2, back.x2),
            (corners.y2, back.y2),
        ] {
            assert!((a - b).abs() < 1e-9, "{} != {}", a, b);
        }
    }

    #[test]
    fn zero_dimensions_are_rejected() {
        let corners = Box2d {
            x1: 0.0,
            y1: 0.0,
            x2: 1.0,
            y2: 1.0,
        };
        assert!(matches!(
            to_normalized_center_box(&corners, 0.0, 720.0),
            Err(DatasetError::InvalidDimensions { .. })
        ));
        assert!(to_normalized_center_box(&corners, 1280.0, 0.0).is_err());
    }

    #[test]
    fn unknown_categories_and_boxless_labels_are_dropped() {
        let categories = CategoryMap::bdd100k().unwrap();
        let corners = Box2d {
            x1: 10.0,
            y1: 10.0,
            x2: 30.0,
            y2: 20.0,
        };
        let record = AnnotationRecord::new(
            "a.jpg",
            vec![
                ObjectLabel::new("car", Some(corners)),
                ObjectLabel::new("lane", Some(corners)),
                ObjectLabel::new("drivable area", None),
                ObjectLabel::new("person", None),
            ],
        );
        let conversion = convert_to_yolo_format(&record, &categories);
        assert_eq!(conversion.lines, vec!["2 0.015625 0.020833 0.015625 0.013889"]);
        assert_eq!(conversion.dropped, 3);
    }

    #[test]
    fn zero_sized_image_counts_invalid_dimensions() {
        let categories = CategoryMap::bdd100k().unwrap();
        let mut record = AnnotationRecord::new(
            "a.jpg",
            vec![ObjectLabel::new(
                "bus",
                Some(Box2d {
                    x1: 1.0,
                    y1: 1.0,
                    x2: 2.0,
                    y2: 2.0,
                }),
            )],
        );
        record.width = Some(0.0);
        let conversion = convert_to_yolo_format(&record, &categories);
        assert!(conversion.contents().is_none());
        assert_eq!(conversion.invalid_dimensions, 1);
    }
}
