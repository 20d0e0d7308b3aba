//! COCO person-keypoints style JSON writer.
//!
//! Renders parsed records the way COCO keypoint tooling expects them:
//!
//! - bboxes as `[x, y, width, height]` (the records keep XYXY)
//! - keypoints flattened to `[x1, y1, v1, x2, y2, v2, ...]`
//! - one `pepper` category carrying the keypoint names and an empty skeleton
//!
//! Group ids are only unique per image, so annotations get fresh ids
//! `1..=n` in document order and the group id is kept as `group_id`.
//! Images whose annotations are absent still appear under `images`.

use std::io::Write;

use serde::Serialize;
use serde_json::Value;

use super::model::{ImageAnnotations, ImageRecord, InstanceAnnotation, KeypointLayout};
use crate::error::PepperError;

#[derive(Debug, Serialize)]
struct CocoKeypointDataset<'a> {
    images: Vec<&'a ImageRecord>,
    annotations: Vec<CocoAnnotation>,
    categories: [CocoCategory; 1],
}

#[derive(Debug, Serialize)]
struct CocoCategory {
    id: u64,
    name: &'static str,
    supercategory: &'static str,
    keypoints: [&'static str; KeypointLayout::NUM_KEYPOINTS],
    skeleton: Vec<[u32; 2]>,
}

#[derive(Debug, Serialize)]
struct CocoAnnotation {
    id: u64,
    group_id: u64,
    image_id: u64,
    category_id: u64,
    segmentation: Option<Vec<Vec<f64>>>,
    area: f64,
    /// COCO bbox format: [x, y, width, height] with (x,y) as top-left corner
    bbox: [f64; 4],
    iscrowd: u8,
    /// Flattened `[x, y, v, ...]`; `v` is written as an integer flag.
    keypoints: Vec<Value>,
    num_keypoints: usize,
}

impl CocoAnnotation {
    fn new(id: u64, ann: &InstanceAnnotation) -> Self {
        let (x, y, w, h) = ann.bbox.to_xywh();
        let keypoints = ann
            .keypoints
            .iter()
            .flat_map(|kp| {
                [
                    Value::from(kp.x),
                    Value::from(kp.y),
                    Value::from(kp.visibility.as_u8()),
                ]
            })
            .collect();

        Self {
            id,
            group_id: ann.id.as_u64(),
            image_id: ann.image_id.as_u64(),
            category_id: ann.category_id,
            segmentation: ann.segmentation.clone(),
            area: ann.area,
            bbox: [x, y, w, h],
            iscrowd: ann.iscrowd,
            keypoints,
            num_keypoints: ann.num_keypoints,
        }
    }
}

fn to_coco<'a>(
    images: &'a [ImageRecord],
    annotations: &'a [ImageAnnotations],
) -> CocoKeypointDataset<'a> {
    let annotations = annotations
        .iter()
        .flatten()
        .flatten()
        .zip(1u64..)
        .map(|(ann, id)| CocoAnnotation::new(id, ann))
        .collect();

    CocoKeypointDataset {
        images: images.iter().collect(),
        annotations,
        categories: [CocoCategory {
            id: KeypointLayout::CATEGORY_ID,
            name: KeypointLayout::CATEGORY_NAME,
            supercategory: KeypointLayout::CATEGORY_NAME,
            keypoints: KeypointLayout::KEYPOINT_NAMES,
            skeleton: Vec::new(),
        }],
    }
}

/// Serialize records to a pretty-printed COCO keypoint JSON string.
pub fn to_coco_keypoints_string(
    images: &[ImageRecord],
    annotations: &[ImageAnnotations],
) -> Result<String, PepperError> {
    Ok(serde_json::to_string_pretty(&to_coco(images, annotations))?)
}

/// Write records as pretty-printed COCO keypoint JSON.
pub fn write_coco_keypoints<W: Write>(
    writer: W,
    images: &[ImageRecord],
    annotations: &[ImageAnnotations],
) -> Result<(), PepperError> {
    serde_json::to_writer_pretty(writer, &to_coco(images, annotations))?;
    Ok(())
}
